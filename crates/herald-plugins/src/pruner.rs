//! Deletion of stale bot comments.

use herald_scm::SharedScmClient;
use herald_types::{Comment, IssueRef, Result};

/// What a pruning pass deleted, and which deletions failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Bot identity the pass was scoped to.
    pub bot: String,
    pub deleted: Vec<u64>,
    pub failed: Vec<(u64, String)>,
}

impl PruneReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Deletes bot-authored comments on one issue that satisfy a predicate.
///
/// The author check is applied here, before the predicate is consulted, so a
/// predicate can only narrow the selection. The bot identity is resolved on
/// every call.
#[derive(Clone)]
pub struct CommentPruner {
    scm: SharedScmClient,
    issue: IssueRef,
}

impl CommentPruner {
    pub fn new(scm: SharedScmClient, issue: IssueRef) -> Self {
        Self { scm, issue }
    }

    pub fn issue(&self) -> &IssueRef {
        &self.issue
    }

    pub async fn prune_comments<F>(&self, should_prune: F) -> Result<PruneReport>
    where
        F: Fn(&Comment) -> bool + Send + Sync,
    {
        let bot = self.scm.bot_name().await?;
        let comments = self.scm.list_comments(&self.issue).await?;

        let mut report = PruneReport {
            bot,
            ..PruneReport::default()
        };
        for comment in &comments {
            if comment.author != report.bot || !should_prune(comment) {
                continue;
            }
            match self.scm.delete_comment(&self.issue, comment.id).await {
                Ok(()) => report.deleted.push(comment.id),
                Err(e) => {
                    tracing::warn!(
                        issue = %self.issue,
                        comment_id = comment.id,
                        error = %e,
                        "Failed to delete comment"
                    );
                    report.failed.push((comment.id, e.to_string()));
                }
            }
        }

        tracing::debug!(
            issue = %self.issue,
            bot = %report.bot,
            scanned = comments.len(),
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "Pruned comments"
        );
        Ok(report)
    }
}

/// Predicate selecting comments whose body contains `marker`.
pub fn body_contains(marker: &str) -> impl Fn(&Comment) -> bool + Send + Sync + '_ {
    move |comment: &Comment| comment.body.contains(marker)
}
