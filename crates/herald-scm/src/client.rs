use std::sync::Arc;

use async_trait::async_trait;

use herald_types::{Comment, IssueRef, Label, Result};

// ---------------------------------------------------------------------------
// ScmClient
// ---------------------------------------------------------------------------

/// The subset of a git provider's API that plugins may use.
///
/// Every call is a synchronous remote operation keyed by the issue it touches.
/// Failures are reported to the caller; implementations decide whether to
/// retry internally, Herald itself never does.
#[async_trait]
pub trait ScmClient: Send + Sync {
    async fn get_labels(&self, issue: &IssueRef) -> Result<Vec<Label>>;
    async fn add_label(&self, issue: &IssueRef, label: &str) -> Result<()>;
    async fn remove_label(&self, issue: &IssueRef, label: &str) -> Result<()>;
    async fn create_comment(&self, issue: &IssueRef, body: &str) -> Result<()>;
    async fn list_comments(&self, issue: &IssueRef) -> Result<Vec<Comment>>;
    async fn delete_comment(&self, issue: &IssueRef, comment_id: u64) -> Result<()>;

    /// Login the bot posts under. Credentials may rotate, so callers resolve
    /// this whenever they need it rather than holding on to it.
    async fn bot_name(&self) -> Result<String>;

    /// Provider identifier used in logs (e.g. "github").
    fn name(&self) -> &str;
}

/// A provider client shared between concurrently running handlers.
pub type SharedScmClient = Arc<dyn ScmClient>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
