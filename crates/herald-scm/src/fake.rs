//! In-memory provider that records every call.
//!
//! Used by tests to assert exactly which remote mutations a plugin performed,
//! and by the CLI for dry runs against a seeded label set.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use herald_types::{has_label, Comment, HeraldError, IssueRef, Label, Result};

use crate::ScmClient;

/// One recorded call against the fake, in invocation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScmCall {
    GetLabels { issue: IssueRef },
    AddLabel { issue: IssueRef, label: String },
    RemoveLabel { issue: IssueRef, label: String },
    CreateComment { issue: IssueRef, body: String },
    ListComments { issue: IssueRef },
    DeleteComment { issue: IssueRef, comment_id: u64 },
    BotName,
}

impl ScmCall {
    pub fn operation(&self) -> ScmOperation {
        match self {
            ScmCall::GetLabels { .. } => ScmOperation::GetLabels,
            ScmCall::AddLabel { .. } => ScmOperation::AddLabel,
            ScmCall::RemoveLabel { .. } => ScmOperation::RemoveLabel,
            ScmCall::CreateComment { .. } => ScmOperation::CreateComment,
            ScmCall::ListComments { .. } => ScmOperation::ListComments,
            ScmCall::DeleteComment { .. } => ScmOperation::DeleteComment,
            ScmCall::BotName => ScmOperation::BotName,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScmOperation {
    GetLabels,
    AddLabel,
    RemoveLabel,
    CreateComment,
    ListComments,
    DeleteComment,
    BotName,
}

impl ScmOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScmOperation::GetLabels => "get_labels",
            ScmOperation::AddLabel => "add_label",
            ScmOperation::RemoveLabel => "remove_label",
            ScmOperation::CreateComment => "create_comment",
            ScmOperation::ListComments => "list_comments",
            ScmOperation::DeleteComment => "delete_comment",
            ScmOperation::BotName => "bot_name",
        }
    }
}

#[derive(Debug, Default)]
struct IssueData {
    labels: Vec<Label>,
    comments: Vec<Comment>,
}

#[derive(Debug)]
struct FakeState {
    bot_name: String,
    issues: HashMap<IssueRef, IssueData>,
    calls: Vec<ScmCall>,
    next_comment_id: u64,
    failing: HashSet<ScmOperation>,
    undeletable: HashSet<u64>,
}

// ---------------------------------------------------------------------------
// FakeScmClient
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct FakeScmClient {
    state: Mutex<FakeState>,
}

impl FakeScmClient {
    pub fn new(bot_name: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(FakeState {
                bot_name: bot_name.into(),
                issues: HashMap::new(),
                calls: Vec::new(),
                next_comment_id: 1,
                failing: HashSet::new(),
                undeletable: HashSet::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        // A panicking handler must not poison the fake for its siblings.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // --- Seeding ---

    /// Replace the labels on `issue` without recording a call.
    pub fn set_labels(&self, issue: &IssueRef, labels: &[&str]) {
        let mut state = self.lock();
        state.issues.entry(issue.clone()).or_default().labels =
            labels.iter().map(|l| Label::new(*l)).collect();
    }

    /// Seed a comment on `issue` without recording a call. Returns its id.
    pub fn seed_comment(&self, issue: &IssueRef, author: &str, body: &str) -> u64 {
        let mut state = self.lock();
        let id = state.next_comment_id;
        state.next_comment_id += 1;
        state.issues.entry(issue.clone()).or_default().comments.push(Comment {
            id,
            author: author.to_string(),
            body: body.to_string(),
            created_at: Some(Utc::now()),
        });
        id
    }

    /// Simulate credential rotation.
    pub fn set_bot_name(&self, name: impl Into<String>) {
        self.lock().bot_name = name.into();
    }

    /// Make every subsequent call of `operation` fail with an HTTP 500.
    pub fn fail_operation(&self, operation: ScmOperation) {
        self.lock().failing.insert(operation);
    }

    /// Make deletion of one specific comment fail.
    pub fn fail_comment_deletion(&self, comment_id: u64) {
        self.lock().undeletable.insert(comment_id);
    }

    // --- Inspection ---

    pub fn calls(&self) -> Vec<ScmCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Number of recorded calls of the given kind.
    pub fn count(&self, operation: ScmOperation) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    /// Recorded mutations only (reads and identity lookups filtered out).
    pub fn mutations(&self) -> Vec<ScmCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| {
                !matches!(
                    c.operation(),
                    ScmOperation::GetLabels | ScmOperation::ListComments | ScmOperation::BotName
                )
            })
            .cloned()
            .collect()
    }

    pub fn labels_on(&self, issue: &IssueRef) -> Vec<String> {
        self.lock()
            .issues
            .get(issue)
            .map(|d| d.labels.iter().map(|l| l.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn comments_on(&self, issue: &IssueRef) -> Vec<Comment> {
        self.lock()
            .issues
            .get(issue)
            .map(|d| d.comments.clone())
            .unwrap_or_default()
    }

    fn begin(&self, call: ScmCall) -> Result<MutexGuard<'_, FakeState>> {
        let mut state = self.lock();
        let operation = call.operation();
        state.calls.push(call);
        if state.failing.contains(&operation) {
            return Err(HeraldError::ProviderError {
                operation: operation.as_str().into(),
                status: 500,
                message: "injected failure".into(),
                retryable: true,
            });
        }
        Ok(state)
    }
}

fn not_found(operation: ScmOperation, what: String) -> HeraldError {
    HeraldError::ProviderError {
        operation: operation.as_str().into(),
        status: 404,
        message: what,
        retryable: false,
    }
}

#[async_trait]
impl ScmClient for FakeScmClient {
    async fn get_labels(&self, issue: &IssueRef) -> Result<Vec<Label>> {
        let state = self.begin(ScmCall::GetLabels {
            issue: issue.clone(),
        })?;
        Ok(state
            .issues
            .get(issue)
            .map(|d| d.labels.clone())
            .unwrap_or_default())
    }

    async fn add_label(&self, issue: &IssueRef, label: &str) -> Result<()> {
        let mut state = self.begin(ScmCall::AddLabel {
            issue: issue.clone(),
            label: label.to_string(),
        })?;
        let data = state.issues.entry(issue.clone()).or_default();
        if !has_label(label, &data.labels) {
            data.labels.push(Label::new(label));
        }
        Ok(())
    }

    async fn remove_label(&self, issue: &IssueRef, label: &str) -> Result<()> {
        let mut state = self.begin(ScmCall::RemoveLabel {
            issue: issue.clone(),
            label: label.to_string(),
        })?;
        let data = state.issues.entry(issue.clone()).or_default();
        let before = data.labels.len();
        data.labels.retain(|l| !l.name.eq_ignore_ascii_case(label));
        if data.labels.len() == before {
            return Err(not_found(
                ScmOperation::RemoveLabel,
                format!("label '{label}' is not on {issue}"),
            ));
        }
        Ok(())
    }

    async fn create_comment(&self, issue: &IssueRef, body: &str) -> Result<()> {
        let mut state = self.begin(ScmCall::CreateComment {
            issue: issue.clone(),
            body: body.to_string(),
        })?;
        let id = state.next_comment_id;
        state.next_comment_id += 1;
        let author = state.bot_name.clone();
        state.issues.entry(issue.clone()).or_default().comments.push(Comment {
            id,
            author,
            body: body.to_string(),
            created_at: Some(Utc::now()),
        });
        Ok(())
    }

    async fn list_comments(&self, issue: &IssueRef) -> Result<Vec<Comment>> {
        let state = self.begin(ScmCall::ListComments {
            issue: issue.clone(),
        })?;
        Ok(state
            .issues
            .get(issue)
            .map(|d| d.comments.clone())
            .unwrap_or_default())
    }

    async fn delete_comment(&self, issue: &IssueRef, comment_id: u64) -> Result<()> {
        let mut state = self.begin(ScmCall::DeleteComment {
            issue: issue.clone(),
            comment_id,
        })?;
        if state.undeletable.contains(&comment_id) {
            return Err(HeraldError::ProviderError {
                operation: ScmOperation::DeleteComment.as_str().into(),
                status: 500,
                message: format!("injected failure deleting comment {comment_id}"),
                retryable: true,
            });
        }
        let data = state.issues.entry(issue.clone()).or_default();
        let before = data.comments.len();
        data.comments.retain(|c| c.id != comment_id);
        if data.comments.len() == before {
            return Err(not_found(
                ScmOperation::DeleteComment,
                format!("comment {comment_id} does not exist on {issue}"),
            ));
        }
        Ok(())
    }

    async fn bot_name(&self) -> Result<String> {
        let state = self.begin(ScmCall::BotName)?;
        Ok(state.bot_name.clone())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
