//! Help descriptors that plugins publish for documentation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One command a plugin understands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpCommand {
    pub usage: String,
    pub description: String,
    #[serde(default)]
    pub featured: bool,
    pub who_can_use: String,
    #[serde(default)]
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginHelp {
    pub description: String,
    /// Per-repository configuration notes, keyed by `org` or `org/repo`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, String>,
    /// Event categories the plugin handles; filled in by the registry.
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub commands: Vec<HelpCommand>,
}

impl PluginHelp {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn add_command(&mut self, command: HelpCommand) {
        self.commands.push(command);
    }
}

/// Help for every registered plugin together with where each one is enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpAggregate {
    pub all_repos: Vec<String>,
    pub repo_plugins: BTreeMap<String, Vec<String>>,
    pub plugin_help: BTreeMap<String, PluginHelp>,
}

impl HelpAggregate {
    /// Commands marked as featured, paired with the plugin that owns them.
    pub fn featured_commands(&self) -> Vec<(&str, &HelpCommand)> {
        self.plugin_help
            .iter()
            .flat_map(|(name, help)| {
                help.commands
                    .iter()
                    .filter(|c| c.featured)
                    .map(move |c| (name.as_str(), c))
            })
            .collect()
    }
}
