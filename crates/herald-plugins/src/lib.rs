//! Plugin registry, event dispatcher, and built-in plugins for Herald.
//!
//! This crate implements the routing core: a frozen registry of plugins keyed
//! by event category, a dispatcher that runs every enabled plugin for an event
//! with failure isolation, the per-invocation `Agent` handle, comment pruning,
//! and the built-in `hold` and `help` label plugins.

pub mod agent;
pub mod config;
pub mod dispatcher;
pub mod events;
pub mod handler;
pub mod plugin_help;
pub mod plugins;
pub mod pruner;
pub mod registry;
pub mod response;

pub use agent::Agent;
pub use config::{ConfigAgent, Configuration};
pub use dispatcher::{DispatchReport, Dispatcher, PluginReport, PluginStatus};
pub use events::{DispatchEvent, EventEmitter};
pub use handler::{
    CategoryHandler, GenericCommentHandler, HelpProducer, IssueHandler, Plugin,
    PullRequestHandler, PushHandler, ReviewHandler,
};
pub use plugin_help::{HelpAggregate, HelpCommand, PluginHelp};
pub use pruner::{body_contains, CommentPruner, PruneReport};
pub use registry::{PluginRegistry, PluginRegistryBuilder, RegisteredHandler};
pub use response::{format_response, format_response_raw, DEFAULT_ABOUT};

use herald_types::Result;

/// Registry holding every built-in plugin.
pub fn default_registry() -> Result<PluginRegistry> {
    plugins::builtin_plugins()?
        .into_iter()
        .try_fold(PluginRegistry::builder(), |builder, plugin| builder.register(plugin))
        .map(PluginRegistryBuilder::build)
}
