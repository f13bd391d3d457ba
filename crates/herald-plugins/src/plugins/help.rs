//! `help`: manages the `help` and `good-first-issue` labels on open issues,
//! posting an explanatory comment when a label is applied and pruning it
//! when the label goes away.

use async_trait::async_trait;
use serde::Deserialize;

use herald_command::CommandMatcher;
use herald_types::{
    has_label, AppliedAction, EventAction, HandlerOutcome, NormalizedEvent, Result,
};

use crate::agent::Agent;
use crate::config::Configuration;
use crate::handler::{GenericCommentHandler, Plugin};
use crate::plugin_help::{HelpCommand, PluginHelp};
use crate::pruner::body_contains;

pub const PLUGIN_NAME: &str = "help";
pub const HELP_LABEL: &str = "help";
pub const GOOD_FIRST_ISSUE_LABEL: &str = "good-first-issue";
pub const DEFAULT_GUIDELINES_URL: &str =
    "https://git.k8s.io/community/contributors/guide/help-wanted.md";

/// First sentence of the help comment; used to find it again for pruning.
pub const HELP_MARKER: &str = "This request has been marked as needing help from a contributor.";
pub const GOOD_FIRST_ISSUE_MARKER: &str =
    "This request has been marked as suitable for new contributors.";

#[derive(Debug, Default, Deserialize)]
struct HelpOptions {
    #[serde(default)]
    guidelines_url: Option<String>,
}

impl HelpOptions {
    fn guidelines_url(&self) -> &str {
        self.guidelines_url.as_deref().unwrap_or(DEFAULT_GUIDELINES_URL)
    }
}

fn help_message(guidelines_url: &str) -> String {
    format!(
        "{HELP_MARKER}\n\n\
         Please ensure the request meets the requirements listed [here]({guidelines_url}).\n\n\
         If this request no longer meets these requirements, the label can be removed\n\
         by commenting with the `/remove-help` command.\n"
    )
}

fn good_first_issue_message(guidelines_url: &str) -> String {
    format!(
        "{GOOD_FIRST_ISSUE_MARKER}\n\n\
         Please ensure the request meets the requirements listed \
         [here]({guidelines_url}#good-first-issue).\n\n\
         If this request no longer meets these requirements, the label can be removed\n\
         by commenting with the `/remove-good-first-issue` command.\n"
    )
}

pub struct HelpPlugin {
    help: CommandMatcher,
    remove_help: CommandMatcher,
    good_first_issue: CommandMatcher,
    remove_good_first_issue: CommandMatcher,
}

impl HelpPlugin {
    pub fn new() -> Result<Self> {
        Ok(Self {
            help: CommandMatcher::bare("help")?,
            remove_help: CommandMatcher::bare("remove-help")?,
            good_first_issue: CommandMatcher::bare("good-first-issue")?,
            remove_good_first_issue: CommandMatcher::bare("remove-good-first-issue")?,
        })
    }
}

// Provider failures past the initial label read are recorded on the outcome
// and the remaining steps still run.
struct Steps<'a> {
    agent: &'a Agent,
    outcome: HandlerOutcome,
}

impl Steps<'_> {
    async fn add_label(&mut self, label: &str) {
        match self.agent.scm().add_label(self.agent.issue(), label).await {
            Ok(()) => self.outcome.record(AppliedAction::LabelAdded {
                label: label.to_string(),
            }),
            Err(e) => {
                tracing::error!(label, error = %e, "Failed to add label");
                self.outcome.record_error(format!("add label '{label}': {e}"));
            }
        }
    }

    async fn remove_label(&mut self, label: &str) {
        match self.agent.scm().remove_label(self.agent.issue(), label).await {
            Ok(()) => self.outcome.record(AppliedAction::LabelRemoved {
                label: label.to_string(),
            }),
            Err(e) => {
                tracing::error!(label, error = %e, "Failed to remove label");
                self.outcome.record_error(format!("remove label '{label}': {e}"));
            }
        }
    }

    async fn comment(&mut self, body: &str) {
        match self.agent.scm().create_comment(self.agent.issue(), body).await {
            Ok(()) => self.outcome.record(AppliedAction::CommentCreated),
            Err(e) => {
                tracing::error!(error = %e, "Failed to create comment");
                self.outcome.record_error(format!("create comment: {e}"));
            }
        }
    }

    async fn prune(&mut self, marker: &str) {
        match self
            .agent
            .comment_pruner()
            .prune_comments(body_contains(marker))
            .await
        {
            Ok(report) => {
                for (id, error) in &report.failed {
                    self.outcome
                        .record_error(format!("delete comment {id}: {error}"));
                }
                self.outcome.record(AppliedAction::CommentsPruned {
                    marker: marker.to_string(),
                    deleted: report.deleted.len(),
                });
            }
            Err(e) => {
                tracing::error!(marker, error = %e, "Failed to prune comments");
                self.outcome.record_error(format!("prune comments: {e}"));
            }
        }
    }
}

#[async_trait]
impl GenericCommentHandler for HelpPlugin {
    async fn handle_generic_comment(
        &self,
        agent: &Agent,
        event: &NormalizedEvent,
    ) -> Result<HandlerOutcome> {
        if event.is_pull_request || !event.is_open() || event.action != EventAction::Created {
            return Ok(HandlerOutcome::noop());
        }

        let body = event.body.as_str();
        let wants_remove_help = self.remove_help.is_match(body);
        let wants_good_first_issue = self.good_first_issue.is_match(body);
        let wants_help = self.help.is_match(body);
        let wants_remove_good_first_issue = self.remove_good_first_issue.is_match(body);
        let any_command =
            wants_remove_help || wants_good_first_issue || wants_help || wants_remove_good_first_issue;
        if !any_command {
            return Ok(HandlerOutcome::noop());
        }

        let options: HelpOptions = agent.options()?;
        let labels = agent.scm().get_labels(agent.issue()).await?;
        let has_help = has_label(HELP_LABEL, &labels);
        let has_good_first_issue = has_label(GOOD_FIRST_ISSUE_LABEL, &labels);

        let mut steps = Steps {
            agent,
            outcome: HandlerOutcome::noop(),
        };

        if has_help && wants_remove_help {
            steps.remove_label(HELP_LABEL).await;
            steps.prune(HELP_MARKER).await;
            if has_good_first_issue {
                steps.remove_label(GOOD_FIRST_ISSUE_LABEL).await;
                steps.prune(GOOD_FIRST_ISSUE_MARKER).await;
            }
        } else if !has_good_first_issue && wants_good_first_issue {
            let message = good_first_issue_message(options.guidelines_url());
            steps.comment(&agent.reply_to(event, &message)).await;
            steps.add_label(GOOD_FIRST_ISSUE_LABEL).await;
            if !has_help {
                steps.add_label(HELP_LABEL).await;
            }
        } else if !has_help && wants_help {
            let message = help_message(options.guidelines_url());
            steps.comment(&agent.reply_to(event, &message)).await;
            steps.add_label(HELP_LABEL).await;
        } else if has_good_first_issue && wants_remove_good_first_issue {
            steps.remove_label(GOOD_FIRST_ISSUE_LABEL).await;
            steps.prune(GOOD_FIRST_ISSUE_MARKER).await;
        } else {
            tracing::debug!(has_help, has_good_first_issue, "Labels already in requested state");
        }

        Ok(steps.outcome)
    }
}

pub fn help(_config: &Configuration, _enabled_repos: &[String]) -> Result<PluginHelp> {
    let mut help = PluginHelp::new(format!(
        "The help plugin provides commands that add or remove the '{HELP_LABEL}' and the \
         '{GOOD_FIRST_ISSUE_LABEL}' labels from issues."
    ));
    help.add_command(HelpCommand {
        usage: "/[remove-](help|good-first-issue)".into(),
        description: format!(
            "Applies or removes the '{HELP_LABEL}' and '{GOOD_FIRST_ISSUE_LABEL}' labels to an issue."
        ),
        featured: false,
        who_can_use: "Anyone can trigger this command on an issue.".into(),
        examples: vec![
            "/help".into(),
            "/remove-help".into(),
            "/good-first-issue".into(),
            "/remove-good-first-issue".into(),
        ],
    });
    Ok(help)
}

pub fn plugin() -> Result<Plugin> {
    Ok(Plugin::new(PLUGIN_NAME, help).on_generic_comment(HelpPlugin::new()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use herald_scm::{FakeScmClient, ScmCall, ScmOperation};
    use herald_types::{HeraldError, IssueRef, IssueState};

    fn issue() -> IssueRef {
        IssueRef::new("acme", "widget", 3, false)
    }

    fn event(body: &str) -> NormalizedEvent {
        let mut event = NormalizedEvent::comment("acme", "widget", 3, false, body);
        event.author = "dana".into();
        event
    }

    async fn run_event(fake: &Arc<FakeScmClient>, event: NormalizedEvent) -> Result<HandlerOutcome> {
        run_with(fake, event, &Configuration::default()).await
    }

    async fn run_with(
        fake: &Arc<FakeScmClient>,
        event: NormalizedEvent,
        config: &Configuration,
    ) -> Result<HandlerOutcome> {
        let agent = Agent::new(PLUGIN_NAME, &event, fake.clone(), config);
        HelpPlugin::new()
            .unwrap()
            .handle_generic_comment(&agent, &event)
            .await
    }

    async fn run(fake: &Arc<FakeScmClient>, body: &str) -> HandlerOutcome {
        run_event(fake, event(body)).await.unwrap()
    }

    #[tokio::test]
    async fn help_comments_then_labels() {
        let fake = Arc::new(FakeScmClient::new("herald-bot"));

        let outcome = run(&fake, "/help").await;

        assert_eq!(
            outcome.actions,
            vec![
                AppliedAction::CommentCreated,
                AppliedAction::LabelAdded { label: "help".into() },
            ]
        );
        let comments = fake.comments_on(&issue());
        assert_eq!(comments.len(), 1);
        assert!(comments[0].body.starts_with("@dana: "));
        assert!(comments[0].body.contains(HELP_MARKER));
        assert!(comments[0].body.contains(DEFAULT_GUIDELINES_URL));
    }

    #[tokio::test]
    async fn good_first_issue_adds_both_labels_with_single_comment() {
        let fake = Arc::new(FakeScmClient::new("herald-bot"));

        let outcome = run(&fake, "/good-first-issue").await;

        assert_eq!(
            outcome.actions,
            vec![
                AppliedAction::CommentCreated,
                AppliedAction::LabelAdded { label: "good-first-issue".into() },
                AppliedAction::LabelAdded { label: "help".into() },
            ]
        );
        let comments = fake.comments_on(&issue());
        assert_eq!(comments.len(), 1);
        assert!(comments[0].body.contains(GOOD_FIRST_ISSUE_MARKER));
        assert!(!comments[0].body.contains(HELP_MARKER));
    }

    #[tokio::test]
    async fn good_first_issue_keeps_existing_help_label() {
        let fake = Arc::new(FakeScmClient::new("herald-bot"));
        fake.set_labels(&issue(), &["help"]);

        let outcome = run(&fake, "/good-first-issue").await;

        assert_eq!(fake.count(ScmOperation::AddLabel), 1);
        assert!(outcome
            .actions
            .contains(&AppliedAction::LabelAdded { label: "good-first-issue".into() }));
    }

    #[tokio::test]
    async fn remove_help_cascades_to_good_first_issue() {
        let fake = Arc::new(FakeScmClient::new("herald-bot"));
        fake.set_labels(&issue(), &["help", "good-first-issue"]);
        fake.seed_comment(&issue(), "herald-bot", HELP_MARKER);
        fake.seed_comment(&issue(), "herald-bot", GOOD_FIRST_ISSUE_MARKER);
        fake.seed_comment(&issue(), "someone", HELP_MARKER);

        let outcome = run(&fake, "/remove-help").await;

        assert!(fake.labels_on(&issue()).is_empty());
        assert_eq!(
            outcome.actions,
            vec![
                AppliedAction::LabelRemoved { label: "help".into() },
                AppliedAction::CommentsPruned {
                    marker: HELP_MARKER.into(),
                    deleted: 1
                },
                AppliedAction::LabelRemoved { label: "good-first-issue".into() },
                AppliedAction::CommentsPruned {
                    marker: GOOD_FIRST_ISSUE_MARKER.into(),
                    deleted: 1
                },
            ]
        );
        let remaining = fake.comments_on(&issue());
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].author, "someone");
    }

    #[tokio::test]
    async fn remove_good_first_issue_does_not_cascade() {
        let fake = Arc::new(FakeScmClient::new("herald-bot"));
        fake.set_labels(&issue(), &["help", "good-first-issue"]);

        let outcome = run(&fake, "/remove-good-first-issue").await;

        assert_eq!(fake.labels_on(&issue()), vec!["help".to_string()]);
        assert_eq!(outcome.actions.len(), 2);
        assert_eq!(fake.count(ScmOperation::RemoveLabel), 1);
    }

    #[tokio::test]
    async fn remove_help_takes_precedence_over_other_commands() {
        let fake = Arc::new(FakeScmClient::new("herald-bot"));
        fake.set_labels(&issue(), &["help"]);

        run(&fake, "/good-first-issue\n/remove-help").await;

        assert!(fake.labels_on(&issue()).is_empty());
        assert_eq!(fake.count(ScmOperation::CreateComment), 0);
    }

    #[tokio::test]
    async fn requested_state_already_holds() {
        let fake = Arc::new(FakeScmClient::new("herald-bot"));
        fake.set_labels(&issue(), &["help"]);
        assert!(run(&fake, "/help").await.is_noop());

        fake.clear_calls();
        fake.set_labels(&issue(), &[]);
        assert!(run(&fake, "/remove-help").await.is_noop());
        assert!(run(&fake, "/remove-good-first-issue").await.is_noop());
        assert!(fake.mutations().is_empty());
    }

    #[tokio::test]
    async fn pull_requests_closed_issues_and_edits_are_ignored() {
        let fake = Arc::new(FakeScmClient::new("herald-bot"));

        let mut on_pr = event("/help");
        on_pr.is_pull_request = true;
        let mut closed = event("/help");
        closed.issue_state = IssueState::Closed;
        let mut edited = event("/help");
        edited.action = EventAction::Edited;

        for e in [on_pr, closed, edited] {
            assert!(run_event(&fake, e).await.unwrap().is_noop());
        }
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn no_command_skips_label_read() {
        let fake = Arc::new(FakeScmClient::new("herald-bot"));
        assert!(run(&fake, "can someone help with this?").await.is_noop());
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn label_read_failure_aborts() {
        let fake = Arc::new(FakeScmClient::new("herald-bot"));
        fake.fail_operation(ScmOperation::GetLabels);

        let err = run_event(&fake, event("/help")).await.unwrap_err();
        assert!(matches!(err, HeraldError::ProviderError { .. }));
        assert!(fake.mutations().is_empty());
    }

    #[tokio::test]
    async fn comment_failure_is_recorded_and_label_still_added() {
        let fake = Arc::new(FakeScmClient::new("herald-bot"));
        fake.fail_operation(ScmOperation::CreateComment);

        let outcome = run(&fake, "/help").await;

        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].contains("create comment"));
        assert_eq!(fake.labels_on(&issue()), vec!["help".to_string()]);
    }

    #[tokio::test]
    async fn prune_failure_is_recorded_and_cascade_continues() {
        let fake = Arc::new(FakeScmClient::new("herald-bot"));
        fake.set_labels(&issue(), &["help", "good-first-issue"]);
        fake.fail_operation(ScmOperation::BotName);

        let outcome = run(&fake, "/remove-help").await;

        assert_eq!(outcome.errors.len(), 2);
        assert!(fake.labels_on(&issue()).is_empty());
        assert!(!fake
            .calls()
            .iter()
            .any(|c| matches!(c, ScmCall::DeleteComment { .. })));
    }

    #[tokio::test]
    async fn guidelines_url_is_configurable() {
        let fake = Arc::new(FakeScmClient::new("herald-bot"));
        let config = Configuration::from_json(
            r#"{"plugin_config": {"help": {"guidelines_url": "https://example.com/contrib"}}}"#,
        )
        .unwrap();

        run_with(&fake, event("/good-first-issue"), &config)
            .await
            .unwrap();

        let comments = fake.comments_on(&issue());
        assert!(comments[0]
            .body
            .contains("(https://example.com/contrib#good-first-issue)"));
    }

    #[test]
    fn help_lists_every_command() {
        let help = help(&Configuration::default(), &[]).unwrap();
        assert_eq!(help.commands.len(), 1);
        assert_eq!(help.commands[0].examples.len(), 4);
    }
}
