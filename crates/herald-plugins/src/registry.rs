//! Frozen catalogue of plugins, keyed by event category.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use herald_types::{EventCategory, HeraldError, Result};

use crate::config::Configuration;
use crate::handler::{CategoryHandler, HelpProducer, Plugin};
use crate::plugin_help::HelpAggregate;

/// A handler registered under a plugin name.
#[derive(Debug, Clone)]
pub struct RegisteredHandler {
    pub name: String,
    pub handler: CategoryHandler,
}

// ---------------------------------------------------------------------------
// PluginRegistryBuilder
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct PluginRegistryBuilder {
    handlers: HashMap<EventCategory, Vec<RegisteredHandler>>,
    help: BTreeMap<String, HelpProducer>,
}

impl PluginRegistryBuilder {
    /// Add every handler of `plugin`. Nothing is added if any of its
    /// (category, name) pairs is already taken.
    pub fn register(mut self, plugin: Plugin) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for handler in plugin.handlers() {
            let category = handler.category();
            let taken = self
                .handlers
                .get(&category)
                .is_some_and(|list| list.iter().any(|h| h.name == plugin.name()));
            if taken || !seen.insert(category) {
                return Err(HeraldError::RegistrationConflict {
                    category,
                    name: plugin.name().to_string(),
                });
            }
        }

        for handler in plugin.handlers() {
            self.handlers
                .entry(handler.category())
                .or_default()
                .push(RegisteredHandler {
                    name: plugin.name().to_string(),
                    handler: handler.clone(),
                });
        }
        self.help
            .entry(plugin.name().to_string())
            .or_insert_with(|| plugin.help().clone());

        tracing::debug!(
            plugin = %plugin.name(),
            categories = ?seen,
            "Registered plugin"
        );
        Ok(self)
    }

    pub fn build(self) -> PluginRegistry {
        PluginRegistry {
            handlers: self.handlers,
            help: self.help,
        }
    }
}

// ---------------------------------------------------------------------------
// PluginRegistry
// ---------------------------------------------------------------------------

/// Read-only after `build()`; share it behind an `Arc`.
pub struct PluginRegistry {
    handlers: HashMap<EventCategory, Vec<RegisteredHandler>>,
    help: BTreeMap<String, HelpProducer>,
}

impl PluginRegistry {
    pub fn builder() -> PluginRegistryBuilder {
        PluginRegistryBuilder::default()
    }

    pub fn handlers_for(&self, category: EventCategory) -> &[RegisteredHandler] {
        self.handlers
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Registered plugin names in sorted order.
    pub fn plugin_names(&self) -> Vec<&str> {
        self.help.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.help.contains_key(name)
    }

    pub fn categories_of(&self, name: &str) -> Vec<EventCategory> {
        EventCategory::ALL
            .iter()
            .copied()
            .filter(|c| self.handlers_for(*c).iter().any(|h| h.name == name))
            .collect()
    }

    /// Enablement entries naming a plugin that is not registered, as
    /// `(config key, plugin name)` pairs.
    pub fn unknown_plugins(&self, config: &Configuration) -> Vec<(String, String)> {
        config
            .plugins
            .iter()
            .flat_map(|(key, names)| {
                names
                    .iter()
                    .filter(|n| !self.contains(n))
                    .map(move |n| (key.clone(), n.clone()))
            })
            .collect()
    }

    /// Collect help from every registered plugin. `known_repos` lists
    /// repositories the caller knows about beyond the configuration keys.
    pub fn aggregate_help(&self, config: &Configuration, known_repos: &[String]) -> HelpAggregate {
        let all_repos: BTreeSet<String> = config
            .plugins
            .keys()
            .cloned()
            .chain(known_repos.iter().cloned())
            .collect();

        let mut aggregate = HelpAggregate {
            all_repos: all_repos.iter().cloned().collect(),
            repo_plugins: config.plugins.clone(),
            plugin_help: BTreeMap::new(),
        };

        for (name, producer) in &self.help {
            let enabled: Vec<String> = all_repos
                .iter()
                .filter(|key| config.enables_key(key, name))
                .cloned()
                .collect();
            match producer(config, &enabled) {
                Ok(mut help) => {
                    help.events = self
                        .categories_of(name)
                        .iter()
                        .map(|c| c.as_str().to_string())
                        .collect();
                    aggregate.plugin_help.insert(name.clone(), help);
                }
                Err(e) => {
                    tracing::warn!(plugin = %name, error = %e, "Help producer failed; skipping");
                }
            }
        }
        aggregate
    }
}

impl std::fmt::Debug for PluginRegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistryBuilder")
            .field("plugins", &self.help.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.plugin_names())
            .finish()
    }
}
