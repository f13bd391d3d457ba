//! Git provider client capability for Herald.
//!
//! Provides the `ScmClient` trait that plugins use to read and mutate remote
//! issue state, a `GitHubClient` adapter over the GitHub REST API, and a
//! `FakeScmClient` that keeps state in memory and records every call.

mod client;
mod fake;
mod github;

pub use client::*;
pub use fake::{FakeScmClient, ScmCall, ScmOperation};
pub use github::GitHubClient;
