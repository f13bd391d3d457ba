//! Plugin enablement and option configuration, plus a hot-swappable holder.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use herald_types::{HeraldError, PluginConfigBlock, PluginConfigMap, Result};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Which plugins run where, and the option block handed to each plugin.
///
/// Keys of `plugins` are either an org (`"acme"`) or a single repository
/// (`"acme/widget"`). The enabled set for a repository is the union of both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub plugins: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub plugin_config: PluginConfigMap,
    /// Footer appended to bot responses; a built-in text is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
}

impl Configuration {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate_keys()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_json(&raw).map_err(|e| match e {
            HeraldError::Json(err) => {
                HeraldError::InvalidConfig(format!("{}: {err}", path.display()))
            }
            other => other,
        })?;
        tracing::debug!(
            path = %path.display(),
            entries = config.plugins.len(),
            "Loaded plugin configuration"
        );
        Ok(config)
    }

    /// Reject enablement keys that are neither `org` nor `org/repo`.
    pub fn validate_keys(&self) -> Result<()> {
        for key in self.plugins.keys() {
            let segments: Vec<&str> = key.split('/').collect();
            let well_formed = segments.len() <= 2
                && segments
                    .iter()
                    .all(|s| !s.is_empty() && !s.chars().any(char::is_whitespace));
            if !well_formed {
                return Err(HeraldError::InvalidConfig(format!(
                    "plugin key '{key}' must be 'org' or 'org/repo'"
                )));
            }
        }
        Ok(())
    }

    /// Plugins enabled for a repository. Absent entries contribute nothing.
    pub fn enabled_plugins(&self, org: &str, repo: &str) -> BTreeSet<String> {
        let full = format!("{org}/{repo}");
        [org, full.as_str()]
            .iter()
            .filter_map(|key| self.plugins.get(*key))
            .flatten()
            .cloned()
            .collect()
    }

    /// Whether `plugin` is enabled under a configuration key, which may name
    /// an org or an `org/repo`.
    pub fn enables_key(&self, key: &str, plugin: &str) -> bool {
        match key.split_once('/') {
            Some((org, repo)) => self.enabled_plugins(org, repo).contains(plugin),
            None => self
                .plugins
                .get(key)
                .map(|names| names.iter().any(|n| n == plugin))
                .unwrap_or(false),
        }
    }

    pub fn plugin_config(&self, plugin: &str) -> Option<&PluginConfigBlock> {
        self.plugin_config.get(plugin)
    }

    /// Every plugin name referenced by an enablement entry, sorted.
    pub fn referenced_plugins(&self) -> BTreeSet<&str> {
        self.plugins.values().flatten().map(String::as_str).collect()
    }
}

// ---------------------------------------------------------------------------
// ConfigAgent
// ---------------------------------------------------------------------------

/// Holds the current configuration snapshot.
///
/// Readers take an `Arc` once per dispatch and keep it for the whole
/// dispatch; `replace` swaps the snapshot wholesale.
#[derive(Debug, Default)]
pub struct ConfigAgent {
    current: RwLock<Arc<Configuration>>,
}

impl ConfigAgent {
    pub fn new(config: Configuration) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    pub fn snapshot(&self) -> Arc<Configuration> {
        let guard = self.current.read().unwrap_or_else(|p| p.into_inner());
        Arc::clone(&guard)
    }

    pub fn replace(&self, config: Configuration) {
        let mut guard = self.current.write().unwrap_or_else(|p| p.into_inner());
        *guard = Arc::new(config);
        tracing::info!(entries = guard.plugins.len(), "Plugin configuration replaced");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
