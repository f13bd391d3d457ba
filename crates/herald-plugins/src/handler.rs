//! Per-category handler capabilities and the plugin descriptor.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use herald_types::{EventCategory, HandlerOutcome, NormalizedEvent, Result};

use crate::agent::Agent;
use crate::config::Configuration;
use crate::plugin_help::PluginHelp;

// ---------------------------------------------------------------------------
// Capability traits, one per event category
// ---------------------------------------------------------------------------

#[async_trait]
pub trait GenericCommentHandler: Send + Sync {
    async fn handle_generic_comment(
        &self,
        agent: &Agent,
        event: &NormalizedEvent,
    ) -> Result<HandlerOutcome>;
}

#[async_trait]
pub trait IssueHandler: Send + Sync {
    async fn handle_issue(&self, agent: &Agent, event: &NormalizedEvent) -> Result<HandlerOutcome>;
}

#[async_trait]
pub trait PullRequestHandler: Send + Sync {
    async fn handle_pull_request(
        &self,
        agent: &Agent,
        event: &NormalizedEvent,
    ) -> Result<HandlerOutcome>;
}

#[async_trait]
pub trait PushHandler: Send + Sync {
    async fn handle_push(&self, agent: &Agent, event: &NormalizedEvent) -> Result<HandlerOutcome>;
}

#[async_trait]
pub trait ReviewHandler: Send + Sync {
    async fn handle_review(&self, agent: &Agent, event: &NormalizedEvent)
        -> Result<HandlerOutcome>;
}

// ---------------------------------------------------------------------------
// CategoryHandler
// ---------------------------------------------------------------------------

/// A handler tagged with the category it serves.
#[derive(Clone)]
pub enum CategoryHandler {
    GenericComment(Arc<dyn GenericCommentHandler>),
    Issue(Arc<dyn IssueHandler>),
    PullRequest(Arc<dyn PullRequestHandler>),
    Push(Arc<dyn PushHandler>),
    Review(Arc<dyn ReviewHandler>),
}

impl CategoryHandler {
    pub fn category(&self) -> EventCategory {
        match self {
            Self::GenericComment(_) => EventCategory::GenericComment,
            Self::Issue(_) => EventCategory::Issue,
            Self::PullRequest(_) => EventCategory::PullRequest,
            Self::Push(_) => EventCategory::Push,
            Self::Review(_) => EventCategory::Review,
        }
    }

    pub async fn invoke(&self, agent: &Agent, event: &NormalizedEvent) -> Result<HandlerOutcome> {
        match self {
            Self::GenericComment(h) => h.handle_generic_comment(agent, event).await,
            Self::Issue(h) => h.handle_issue(agent, event).await,
            Self::PullRequest(h) => h.handle_pull_request(agent, event).await,
            Self::Push(h) => h.handle_push(agent, event).await,
            Self::Review(h) => h.handle_review(agent, event).await,
        }
    }
}

impl fmt::Debug for CategoryHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CategoryHandler({})", self.category())
    }
}

// ---------------------------------------------------------------------------
// Plugin
// ---------------------------------------------------------------------------

/// Produces a plugin's help given the configuration and the repositories
/// (`org` or `org/repo` keys) that enable it.
pub type HelpProducer = Arc<dyn Fn(&Configuration, &[String]) -> Result<PluginHelp> + Send + Sync>;

/// A named automation unit: its handlers plus its help producer.
#[derive(Clone)]
pub struct Plugin {
    name: String,
    handlers: Vec<CategoryHandler>,
    help: HelpProducer,
}

impl Plugin {
    pub fn new(
        name: impl Into<String>,
        help: impl Fn(&Configuration, &[String]) -> Result<PluginHelp> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            handlers: Vec::new(),
            help: Arc::new(help),
        }
    }

    pub fn on_generic_comment(mut self, handler: impl GenericCommentHandler + 'static) -> Self {
        self.handlers
            .push(CategoryHandler::GenericComment(Arc::new(handler)));
        self
    }

    pub fn on_issue(mut self, handler: impl IssueHandler + 'static) -> Self {
        self.handlers.push(CategoryHandler::Issue(Arc::new(handler)));
        self
    }

    pub fn on_pull_request(mut self, handler: impl PullRequestHandler + 'static) -> Self {
        self.handlers
            .push(CategoryHandler::PullRequest(Arc::new(handler)));
        self
    }

    pub fn on_push(mut self, handler: impl PushHandler + 'static) -> Self {
        self.handlers.push(CategoryHandler::Push(Arc::new(handler)));
        self
    }

    pub fn on_review(mut self, handler: impl ReviewHandler + 'static) -> Self {
        self.handlers.push(CategoryHandler::Review(Arc::new(handler)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handlers(&self) -> &[CategoryHandler] {
        &self.handlers
    }

    pub fn help(&self) -> &HelpProducer {
        &self.help
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("handlers", &self.handlers)
            .finish()
    }
}
