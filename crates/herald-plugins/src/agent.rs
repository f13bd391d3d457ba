//! Per-invocation handle given to a plugin handler.

use serde::de::DeserializeOwned;

use herald_scm::{ScmClient, SharedScmClient};
use herald_types::{HeraldError, IssueRef, NormalizedEvent, PluginConfigBlock, Result};

use crate::config::Configuration;
use crate::pruner::CommentPruner;
use crate::response::{format_response_raw, DEFAULT_ABOUT};

/// Everything one handler invocation may use.
///
/// Built fresh by the dispatcher for every (event, plugin) pair and dropped
/// when the handler returns.
pub struct Agent {
    plugin: String,
    issue: IssueRef,
    scm: SharedScmClient,
    span: tracing::Span,
    plugin_config: Option<PluginConfigBlock>,
    about: String,
}

impl Agent {
    pub fn new(
        plugin: &str,
        event: &NormalizedEvent,
        scm: SharedScmClient,
        config: &Configuration,
    ) -> Self {
        let span = tracing::info_span!(
            "plugin",
            plugin = %plugin,
            org = %event.org,
            repo = %event.repo,
            number = event.number,
        );
        Self {
            plugin: plugin.to_string(),
            issue: event.issue_ref(),
            scm,
            span,
            plugin_config: config.plugin_config(plugin).cloned(),
            about: config
                .about
                .clone()
                .unwrap_or_else(|| DEFAULT_ABOUT.to_string()),
        }
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn issue(&self) -> &IssueRef {
        &self.issue
    }

    pub fn scm(&self) -> &dyn ScmClient {
        self.scm.as_ref()
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    pub fn comment_pruner(&self) -> CommentPruner {
        CommentPruner::new(self.scm.clone(), self.issue.clone())
    }

    pub fn plugin_config(&self) -> Option<&PluginConfigBlock> {
        self.plugin_config.as_ref()
    }

    /// Deserialize the plugin's option block, falling back to defaults when
    /// the configuration has none.
    pub fn options<T: DeserializeOwned + Default>(&self) -> Result<T> {
        match self.plugin_config {
            None => Ok(T::default()),
            Some(ref block) => serde_json::from_value(block.clone()).map_err(|e| {
                HeraldError::InvalidConfig(format!("options for plugin '{}': {e}", self.plugin))
            }),
        }
    }

    /// Reply to the event's comment, quoting it and appending the configured footer.
    pub fn reply_to(&self, event: &NormalizedEvent, message: &str) -> String {
        format_response_raw(
            &event.body,
            &event.issue_link,
            &event.author,
            message,
            &self.about,
        )
    }
}
