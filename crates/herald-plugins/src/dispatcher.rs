//! Event dispatcher: routes one normalized event to every plugin that is
//! registered for its category and enabled for its repository.
//!
//! Each matched handler runs as its own tokio task with a fresh [`Agent`].
//! Errors and panics are caught at the task boundary, logged, and recorded
//! in the [`DispatchReport`]; they never reach the caller or other handlers.

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use herald_scm::SharedScmClient;
use herald_types::{AppliedAction, EventCategory, HandlerOutcome, NormalizedEvent};

use crate::agent::Agent;
use crate::config::ConfigAgent;
use crate::events::{DispatchEvent, EventEmitter};
use crate::registry::PluginRegistry;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginStatus {
    Succeeded,
    /// The handler finished but tolerated one or more step failures.
    PartiallyFailed,
    Failed,
    Panicked,
}

/// How one plugin fared on one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginReport {
    pub plugin: String,
    pub category: EventCategory,
    pub status: PluginStatus,
    pub actions: Vec<AppliedAction>,
    /// Why the handler failed or panicked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Non-fatal step failures the handler reported.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub step_errors: Vec<String>,
    pub duration_ms: u64,
}

impl PluginReport {
    fn completed(
        plugin: String,
        category: EventCategory,
        outcome: HandlerOutcome,
        duration_ms: u64,
    ) -> Self {
        let status = if outcome.has_errors() {
            PluginStatus::PartiallyFailed
        } else {
            PluginStatus::Succeeded
        };
        Self {
            plugin,
            category,
            status,
            actions: outcome.actions,
            error: None,
            step_errors: outcome.errors,
            duration_ms,
        }
    }

    fn faulted(
        plugin: String,
        category: EventCategory,
        status: PluginStatus,
        error: String,
        duration_ms: u64,
    ) -> Self {
        Self {
            plugin,
            category,
            status,
            actions: Vec::new(),
            error: Some(error),
            step_errors: Vec::new(),
            duration_ms,
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(self.status, PluginStatus::Failed | PluginStatus::Panicked)
    }
}

/// Result of dispatching one event. Informational only; nothing about it
/// affects acknowledgement of the delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub dispatch_id: Uuid,
    pub event: String,
    pub received_at: DateTime<Utc>,
    /// One entry per matched plugin, ordered by plugin name.
    pub plugins: Vec<PluginReport>,
    pub duration_ms: u64,
}

impl DispatchReport {
    pub fn plugin(&self, name: &str) -> Option<&PluginReport> {
        self.plugins.iter().find(|p| p.plugin == name)
    }

    pub fn ran(&self, name: &str) -> bool {
        self.plugin(name).is_some()
    }

    pub fn faults(&self) -> usize {
        self.plugins.iter().filter(|p| p.is_fault()).count()
    }

    pub fn actions(&self) -> impl Iterator<Item = (&str, &AppliedAction)> {
        self.plugins
            .iter()
            .flat_map(|p| p.actions.iter().map(move |a| (p.plugin.as_str(), a)))
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct Dispatcher {
    registry: Arc<PluginRegistry>,
    config: Arc<ConfigAgent>,
    scm: SharedScmClient,
    events: Option<EventEmitter>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<PluginRegistry>,
        config: Arc<ConfigAgent>,
        scm: SharedScmClient,
    ) -> Self {
        Self {
            registry,
            config,
            scm,
            events: None,
        }
    }

    pub fn with_events(mut self, emitter: EventEmitter) -> Self {
        self.events = Some(emitter);
        self
    }

    /// Names of the plugins an event would be routed to right now.
    pub fn matched_plugins(&self, event: &NormalizedEvent) -> Vec<String> {
        let config = self.config.snapshot();
        let enabled = config.enabled_plugins(&event.org, &event.repo);
        let mut names: Vec<String> = self
            .registry
            .handlers_for(event.category)
            .iter()
            .filter(|h| enabled.contains(&h.name))
            .map(|h| h.name.clone())
            .collect();
        names.sort();
        names
    }

    pub async fn dispatch(&self, event: NormalizedEvent) -> DispatchReport {
        let dispatch_id = Uuid::new_v4();
        let received_at = Utc::now();
        let started = Instant::now();
        let event = Arc::new(event);

        let config = self.config.snapshot();
        let enabled = config.enabled_plugins(&event.org, &event.repo);
        let candidates: Vec<_> = self
            .registry
            .handlers_for(event.category)
            .iter()
            .filter(|h| enabled.contains(&h.name))
            .collect();

        tracing::info!(
            dispatch_id = %dispatch_id,
            event = %event,
            enabled = enabled.len(),
            matched = candidates.len(),
            "Dispatching event"
        );
        self.emit(DispatchEvent::DispatchStarted {
            dispatch_id: dispatch_id.to_string(),
            event: event.to_string(),
            plugins: candidates.iter().map(|h| h.name.clone()).collect(),
        });

        let mut tasks = Vec::with_capacity(candidates.len());
        for registered in candidates {
            let agent = Agent::new(&registered.name, &event, self.scm.clone(), &config);
            let span = agent.span().clone();
            let handler = registered.handler.clone();
            let task_event = Arc::clone(&event);
            self.emit(DispatchEvent::PluginStarted {
                dispatch_id: dispatch_id.to_string(),
                plugin: registered.name.clone(),
            });
            let handle = tokio::spawn(
                async move {
                    let started = Instant::now();
                    let result = handler.invoke(&agent, &task_event).await;
                    (result, elapsed_ms(started))
                }
                .instrument(span),
            );
            tasks.push((
                registered.name.clone(),
                registered.handler.category(),
                Instant::now(),
                handle,
            ));
        }

        let mut plugins = Vec::with_capacity(tasks.len());
        for (name, category, spawned, handle) in tasks {
            let joined = handle.await;
            // A panicked task never returns its own timing.
            let duration_ms = match &joined {
                Ok((_, ms)) => *ms,
                Err(_) => elapsed_ms(spawned),
            };
            let report = match joined.map(|(result, _)| result) {
                Ok(Ok(outcome)) => {
                    for step_error in &outcome.errors {
                        tracing::warn!(
                            plugin = %name,
                            event = %event,
                            error = %step_error,
                            "Plugin step failed"
                        );
                    }
                    PluginReport::completed(name, category, outcome, duration_ms)
                }
                Ok(Err(e)) => {
                    tracing::error!(plugin = %name, event = %event, error = %e, "Plugin failed");
                    PluginReport::faulted(
                        name,
                        category,
                        PluginStatus::Failed,
                        e.to_string(),
                        duration_ms,
                    )
                }
                Err(join_err) => {
                    let (status, message) = if join_err.is_panic() {
                        (PluginStatus::Panicked, panic_message(join_err.into_panic()))
                    } else {
                        (PluginStatus::Failed, "handler task was cancelled".to_string())
                    };
                    tracing::error!(
                        plugin = %name,
                        event = %event,
                        error = %message,
                        "Plugin task aborted"
                    );
                    PluginReport::faulted(name, category, status, message, duration_ms)
                }
            };

            match report.error {
                Some(ref error) => self.emit(DispatchEvent::PluginFailed {
                    dispatch_id: dispatch_id.to_string(),
                    plugin: report.plugin.clone(),
                    error: error.clone(),
                }),
                None => self.emit(DispatchEvent::PluginCompleted {
                    dispatch_id: dispatch_id.to_string(),
                    plugin: report.plugin.clone(),
                    actions: report.actions.len(),
                    duration_ms,
                }),
            }
            plugins.push(report);
        }
        plugins.sort_by(|a, b| a.plugin.cmp(&b.plugin));

        let duration_ms = elapsed_ms(started);
        let failed = plugins.iter().filter(|p| p.is_fault()).count();
        self.emit(DispatchEvent::DispatchCompleted {
            dispatch_id: dispatch_id.to_string(),
            succeeded: plugins.len() - failed,
            failed,
            duration_ms,
        });
        tracing::info!(
            dispatch_id = %dispatch_id,
            event = %event,
            plugins = plugins.len(),
            failed,
            duration_ms,
            "Dispatch complete"
        );

        DispatchReport {
            dispatch_id,
            event: event.to_string(),
            received_at,
            plugins,
            duration_ms,
        }
    }

    fn emit(&self, event: DispatchEvent) {
        if let Some(ref emitter) = self.events {
            emitter.emit(event);
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic with non-string payload".to_string()
    }
}
