//! Shared types, errors, events, and outcomes for the Herald webhook bot.
//!
//! This crate provides the foundational types used across all other Herald crates:
//! - `HeraldError`: unified error taxonomy
//! - `NormalizedEvent`: provider-agnostic webhook event consumed by plugins
//! - `IssueRef`, `Label`, `Comment`: remote issue state as seen by the provider client
//! - `HandlerOutcome`: structured result of running one plugin handler

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unified error type for all Herald subsystems.
#[derive(Debug, thiserror::Error)]
pub enum HeraldError {
    // === Provider Errors ===
    #[error("Provider call {operation} returned HTTP {status}: {message}")]
    ProviderError {
        operation: String,
        status: u16,
        message: String,
        retryable: bool,
    },

    #[error("Rate limited during {operation}, retry after {retry_after_ms}ms")]
    RateLimited {
        operation: String,
        retry_after_ms: u64,
    },

    #[error("Authentication failed for {operation}")]
    AuthError { operation: String },

    // === Plugin Errors ===
    #[error("Plugin '{name}' is already registered for category '{category}'")]
    RegistrationConflict {
        category: EventCategory,
        name: String,
    },

    #[error("Plugin '{plugin}' failed: {message}")]
    HandlerError { plugin: String, message: String },

    #[error("Invalid command pattern '/{command}': {message}")]
    InvalidCommand { command: String, message: String },

    // === Configuration Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl HeraldError {
    /// Returns `true` if the error is transient and a later delivery may succeed.
    ///
    /// Herald never retries on its own; this is reported so that logs and the
    /// provider client can tell transient failures from permanent ones.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HeraldError::RateLimited { .. } | HeraldError::ProviderError { retryable: true, .. }
        )
    }

    /// Returns `true` if the error comes from a provider call.
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            HeraldError::ProviderError { .. }
                | HeraldError::RateLimited { .. }
                | HeraldError::AuthError { .. }
        )
    }
}

/// A convenience alias for `Result<T, HeraldError>`.
pub type Result<T> = std::result::Result<T, HeraldError>;

// ---------------------------------------------------------------------------
// EventCategory / EventAction
// ---------------------------------------------------------------------------

/// The kind of webhook event a handler subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// A comment on an issue or pull request, or the body of a new one.
    GenericComment,
    Issue,
    PullRequest,
    Push,
    Review,
}

impl EventCategory {
    pub const ALL: [EventCategory; 5] = [
        EventCategory::GenericComment,
        EventCategory::Issue,
        EventCategory::PullRequest,
        EventCategory::Push,
        EventCategory::Review,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::GenericComment => "generic_comment",
            EventCategory::Issue => "issue",
            EventCategory::PullRequest => "pull_request",
            EventCategory::Push => "push",
            EventCategory::Review => "review",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    Created,
    Edited,
    Deleted,
    Opened,
    Closed,
    Reopened,
    Labeled,
    Unlabeled,
    Synchronized,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueState {
    Open,
    Closed,
    #[serde(other)]
    Unknown,
}

// ---------------------------------------------------------------------------
// IssueRef
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IssueRef {
    pub org: String,
    pub repo: String,
    pub number: u64,
    pub is_pull_request: bool,
}

impl IssueRef {
    pub fn new(
        org: impl Into<String>,
        repo: impl Into<String>,
        number: u64,
        is_pull_request: bool,
    ) -> Self {
        Self {
            org: org.into(),
            repo: repo.into(),
            number,
            is_pull_request,
        }
    }
}

impl fmt::Display for IssueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.org, self.repo, self.number)
    }
}

// ---------------------------------------------------------------------------
// NormalizedEvent
// ---------------------------------------------------------------------------

/// A provider-agnostic webhook event.
///
/// Produced by the normalization layer in front of the dispatcher and consumed
/// read-only by plugins. Deliveries are at-least-once: the same event may
/// arrive twice, or out of order with respect to events on other issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub category: EventCategory,
    pub org: String,
    pub repo: String,
    pub number: u64,
    #[serde(default)]
    pub is_pull_request: bool,
    pub action: EventAction,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub author: String,
    pub issue_state: IssueState,
    #[serde(default)]
    pub issue_link: String,
    /// Provider delivery identifier (e.g. the `X-GitHub-Delivery` header), when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_id: Option<String>,
}

impl NormalizedEvent {
    /// Build a generic-comment event with sensible defaults for the remaining fields.
    pub fn comment(
        org: impl Into<String>,
        repo: impl Into<String>,
        number: u64,
        is_pull_request: bool,
        body: impl Into<String>,
    ) -> Self {
        let org = org.into();
        let repo = repo.into();
        let kind = if is_pull_request { "pull" } else { "issues" };
        let issue_link = format!("https://github.com/{org}/{repo}/{kind}/{number}");
        Self {
            category: EventCategory::GenericComment,
            org,
            repo,
            number,
            is_pull_request,
            action: EventAction::Created,
            body: body.into(),
            author: String::new(),
            issue_state: IssueState::Open,
            issue_link,
            delivery_id: None,
        }
    }

    pub fn issue_ref(&self) -> IssueRef {
        IssueRef::new(&self.org, &self.repo, self.number, self.is_pull_request)
    }

    pub fn is_open(&self) -> bool {
        self.issue_state == IssueState::Open
    }
}

impl fmt::Display for NormalizedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{} ({})", self.org, self.repo, self.number, self.category)?;
        if let Some(ref id) = self.delivery_id {
            write!(f, " delivery {id}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Remote state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: None,
            description: None,
        }
    }
}

/// Case-insensitive label membership, matching how providers compare label names.
pub fn has_label(name: &str, labels: &[Label]) -> bool {
    labels.iter().any(|l| l.name.eq_ignore_ascii_case(name))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub author: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// HandlerOutcome
// ---------------------------------------------------------------------------

/// A remote mutation a handler actually performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AppliedAction {
    LabelAdded { label: String },
    LabelRemoved { label: String },
    CommentCreated,
    CommentsPruned { marker: String, deleted: usize },
}

/// What a handler did, plus any step failures it chose to tolerate.
///
/// A handler that cannot proceed at all returns `Err` instead; `errors` holds
/// failures of individual steps after which the handler kept going.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerOutcome {
    pub actions: Vec<AppliedAction>,
    pub errors: Vec<String>,
}

impl HandlerOutcome {
    /// An outcome with no actions, used when the event does not concern the handler.
    pub fn noop() -> Self {
        Self::default()
    }

    pub fn record(&mut self, action: AppliedAction) {
        self.actions.push(action);
    }

    pub fn record_error(&mut self, error: impl fmt::Display) {
        self.errors.push(error.to_string());
    }

    pub fn is_noop(&self) -> bool {
        self.actions.is_empty() && self.errors.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Free-form configuration block addressed to a single plugin.
pub type PluginConfigBlock = serde_json::Value;

/// Plugin option blocks keyed by plugin name.
pub type PluginConfigMap = HashMap<String, PluginConfigBlock>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_provider_error() {
        let err = HeraldError::ProviderError {
            operation: "add_label".into(),
            status: 500,
            message: "internal server error".into(),
            retryable: true,
        };
        assert_eq!(
            err.to_string(),
            "Provider call add_label returned HTTP 500: internal server error"
        );
    }

    #[test]
    fn error_display_registration_conflict() {
        let err = HeraldError::RegistrationConflict {
            category: EventCategory::GenericComment,
            name: "hold".into(),
        };
        assert_eq!(
            err.to_string(),
            "Plugin 'hold' is already registered for category 'generic_comment'"
        );
    }

    #[test]
    fn error_display_handler_error() {
        let err = HeraldError::HandlerError {
            plugin: "help".into(),
            message: "labels unavailable".into(),
        };
        assert_eq!(err.to_string(), "Plugin 'help' failed: labels unavailable");
    }

    #[test]
    fn retryable_rate_limited() {
        let err = HeraldError::RateLimited {
            operation: "get_labels".into(),
            retry_after_ms: 1000,
        };
        assert!(err.is_retryable());
        assert!(err.is_provider_error());
    }

    #[test]
    fn not_retryable_auth_error() {
        let err = HeraldError::AuthError {
            operation: "bot_name".into(),
        };
        assert!(!err.is_retryable());
        assert!(err.is_provider_error());
    }

    #[test]
    fn config_error_is_not_provider_error() {
        let err = HeraldError::InvalidConfig("bad key".into());
        assert!(!err.is_provider_error());
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: HeraldError = json_err.into();
        assert!(matches!(err, HeraldError::Json(_)));
    }

    // --- Events ---

    #[test]
    fn event_deserializes_from_normalized_json() {
        let json = r#"{
            "category": "generic_comment",
            "org": "acme",
            "repo": "widget",
            "number": 42,
            "is_pull_request": true,
            "action": "created",
            "body": "/hold",
            "author": "alice",
            "issue_state": "open",
            "issue_link": "https://github.com/acme/widget/pull/42"
        }"#;
        let event: NormalizedEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.category, EventCategory::GenericComment);
        assert_eq!(event.action, EventAction::Created);
        assert!(event.is_open());
        assert_eq!(event.issue_ref(), IssueRef::new("acme", "widget", 42, true));
        assert!(event.delivery_id.is_none());
    }

    #[test]
    fn unknown_action_and_state_fall_back() {
        let json = r#"{
            "category": "issue",
            "org": "acme",
            "repo": "widget",
            "number": 1,
            "action": "transferred",
            "issue_state": "locked"
        }"#;
        let event: NormalizedEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.action, EventAction::Other);
        assert_eq!(event.issue_state, IssueState::Unknown);
        assert!(!event.is_open());
        assert!(event.body.is_empty());
    }

    #[test]
    fn event_display_includes_delivery() {
        let mut event = NormalizedEvent::comment("acme", "widget", 7, false, "hi");
        assert_eq!(event.to_string(), "acme/widget#7 (generic_comment)");
        event.delivery_id = Some("abc-123".into());
        assert_eq!(event.to_string(), "acme/widget#7 (generic_comment) delivery abc-123");
    }

    #[test]
    fn comment_constructor_builds_issue_link() {
        let issue = NormalizedEvent::comment("acme", "widget", 3, false, "");
        assert_eq!(issue.issue_link, "https://github.com/acme/widget/issues/3");
        let pr = NormalizedEvent::comment("acme", "widget", 4, true, "");
        assert_eq!(pr.issue_link, "https://github.com/acme/widget/pull/4");
    }

    #[test]
    fn category_serializes_to_snake_case() {
        assert_eq!(
            serde_json::to_string(&EventCategory::PullRequest).unwrap(),
            "\"pull_request\""
        );
        for category in EventCategory::ALL {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.as_str()));
        }
    }

    // --- Labels ---

    #[test]
    fn has_label_ignores_case() {
        let labels = vec![Label::new("Help"), Label::new("good-first-issue")];
        assert!(has_label("help", &labels));
        assert!(has_label("GOOD-FIRST-ISSUE", &labels));
        assert!(!has_label("hold", &labels));
        assert!(!has_label("hold", &[]));
    }

    #[test]
    fn issue_ref_display() {
        let r = IssueRef::new("acme", "widget", 42, true);
        assert_eq!(r.to_string(), "acme/widget#42");
    }

    // --- HandlerOutcome ---

    #[test]
    fn outcome_noop_is_empty() {
        let o = HandlerOutcome::noop();
        assert!(o.is_noop());
        assert!(!o.has_errors());
    }

    #[test]
    fn outcome_records_actions_and_errors() {
        let mut o = HandlerOutcome::noop();
        o.record(AppliedAction::LabelAdded { label: "hold".into() });
        o.record_error("comment failed");
        assert!(!o.is_noop());
        assert!(o.has_errors());
        assert_eq!(o.errors, vec!["comment failed".to_string()]);
    }

    #[test]
    fn applied_action_serializes_with_kind_tag() {
        let json = serde_json::to_value(AppliedAction::CommentsPruned {
            marker: "needs help".into(),
            deleted: 2,
        })
        .unwrap();
        assert_eq!(json["kind"], "comments_pruned");
        assert_eq!(json["deleted"], 2);
    }
}
