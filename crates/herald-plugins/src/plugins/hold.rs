//! `hold`: lets anyone add or remove a label that keeps a pull request from
//! merging automatically, without withdrawing approval.

use async_trait::async_trait;
use serde::Deserialize;

use herald_command::{CommandPair, Directive};
use herald_types::{has_label, AppliedAction, EventAction, HandlerOutcome, NormalizedEvent, Result};

use crate::agent::Agent;
use crate::config::Configuration;
use crate::handler::{GenericCommentHandler, Plugin};
use crate::plugin_help::{HelpCommand, PluginHelp};

pub const PLUGIN_NAME: &str = "hold";
pub const DEFAULT_LABEL: &str = "hold";

#[derive(Debug, Default, Deserialize)]
struct HoldOptions {
    #[serde(default)]
    label: Option<String>,
}

impl HoldOptions {
    fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(DEFAULT_LABEL)
    }
}

pub struct HoldPlugin {
    command: CommandPair,
}

impl HoldPlugin {
    pub fn new() -> Result<Self> {
        Ok(Self {
            command: CommandPair::with_cancel("hold", "cancel")?,
        })
    }
}

#[async_trait]
impl GenericCommentHandler for HoldPlugin {
    async fn handle_generic_comment(
        &self,
        agent: &Agent,
        event: &NormalizedEvent,
    ) -> Result<HandlerOutcome> {
        if event.action != EventAction::Created {
            return Ok(HandlerOutcome::noop());
        }
        let wants_label = match self.command.resolve(&event.body) {
            Directive::Set => true,
            Directive::Cancel => false,
            Directive::None => return Ok(HandlerOutcome::noop()),
        };

        let options: HoldOptions = agent.options()?;
        let label = options.label();
        let issue = agent.issue();
        let labels = agent.scm().get_labels(issue).await?;
        let present = has_label(label, &labels);

        let mut outcome = HandlerOutcome::noop();
        match (present, wants_label) {
            (true, false) => {
                tracing::info!(label, %issue, "Removing hold label");
                agent.scm().remove_label(issue, label).await?;
                outcome.record(AppliedAction::LabelRemoved {
                    label: label.to_string(),
                });
            }
            (false, true) => {
                tracing::info!(label, %issue, "Adding hold label");
                agent.scm().add_label(issue, label).await?;
                outcome.record(AppliedAction::LabelAdded {
                    label: label.to_string(),
                });
            }
            _ => tracing::debug!(label, %issue, present, "Hold label already in requested state"),
        }
        Ok(outcome)
    }
}

pub fn help(config: &Configuration, _enabled_repos: &[String]) -> Result<PluginHelp> {
    let options: HoldOptions = match config.plugin_config(PLUGIN_NAME) {
        Some(block) => serde_json::from_value(block.clone())?,
        None => HoldOptions::default(),
    };
    let label = options.label();
    let command = CommandPair::with_cancel("hold", "cancel")?;

    let mut help = PluginHelp::new(format!(
        "The hold plugin allows anyone to add or remove the '{label}' label from a pull \
         request in order to temporarily prevent it from merging without withholding approval."
    ));
    help.add_command(HelpCommand {
        usage: "/hold [cancel]".into(),
        description: format!(
            "Adds or removes the `{label}` label, which indicates that the pull request \
             should not be merged automatically."
        ),
        featured: false,
        who_can_use: format!("Anyone can use the /hold command to add or remove the '{label}' label."),
        examples: vec![command.set().usage(), command.cancel().usage()],
    });
    Ok(help)
}

pub fn plugin() -> Result<Plugin> {
    Ok(Plugin::new(PLUGIN_NAME, help).on_generic_comment(HoldPlugin::new()?))
}
