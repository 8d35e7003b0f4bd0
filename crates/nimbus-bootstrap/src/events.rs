//! Event dispatch to listeners registered during bootstrap.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use nimbus_core::error::AppError;
use nimbus_core::result::AppResult;

use crate::container::AppContainers;

/// A named event with an arbitrary JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub payload: Value,
}

impl Event {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

#[async_trait]
pub trait EventListener: Send + Sync + fmt::Debug {
    async fn handle(&self, event: &Event) -> AppResult<()>;
}

/// How a listener is stored in an app container. Listener services are
/// registered as a `ListenerService` value and resolved on dispatch.
pub type ListenerService = Arc<dyn EventListener>;

#[derive(Debug, Clone)]
enum ListenerTarget {
    Direct(ListenerService),
    /// Resolved from the app container at dispatch time.
    Service { app_id: String, service: String },
}

#[derive(Debug, Clone)]
struct ListenerEntry {
    target: ListenerTarget,
    priority: i32,
}

/// Event name → listeners, highest priority first. Listeners with equal
/// priority run in registration order.
#[derive(Debug, Default)]
pub struct EventDispatcher {
    listeners: HashMap<String, Vec<ListenerEntry>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, event: &str, entry: ListenerEntry) -> AppResult<()> {
        if event.is_empty() {
            return Err(AppError::registration("Event name must not be empty"));
        }
        let entries = self.listeners.entry(event.to_string()).or_default();
        entries.push(entry);
        entries.sort_by_key(|e| Reverse(e.priority));
        Ok(())
    }

    pub fn add_listener(
        &mut self,
        event: &str,
        listener: ListenerService,
        priority: i32,
    ) -> AppResult<()> {
        self.insert(
            event,
            ListenerEntry {
                target: ListenerTarget::Direct(listener),
                priority,
            },
        )
    }

    /// Adds a listener that lives in an app container.
    pub fn add_service_listener(
        &mut self,
        event: &str,
        app_id: &str,
        service: &str,
        priority: i32,
    ) -> AppResult<()> {
        if service.is_empty() {
            return Err(AppError::registration("Listener service must not be empty"));
        }
        self.insert(
            event,
            ListenerEntry {
                target: ListenerTarget::Service {
                    app_id: app_id.to_string(),
                    service: service.to_string(),
                },
                priority,
            },
        )
    }

    pub fn has_listeners(&self, event: &str) -> bool {
        self.listeners.get(event).is_some_and(|l| !l.is_empty())
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.get(event).map_or(0, Vec::len)
    }

    fn resolve(target: &ListenerTarget, containers: &AppContainers) -> AppResult<ListenerService> {
        match target {
            ListenerTarget::Direct(listener) => Ok(Arc::clone(listener)),
            ListenerTarget::Service { app_id, service } => {
                let container = containers.get(app_id).ok_or_else(|| {
                    AppError::not_found(format!("App {app_id} is not loaded"))
                })?;
                let listener = container.get_as::<ListenerService>(service)?;
                Ok(Arc::clone(&*listener))
            }
        }
    }

    /// Runs every listener of `event.name` in order. A listener that fails
    /// to resolve or returns an error is logged and skipped. Returns the
    /// number of listeners that handled the event.
    pub async fn dispatch(&self, event: &Event, containers: &AppContainers) -> usize {
        let Some(entries) = self.listeners.get(&event.name) else {
            return 0;
        };
        debug!(event = %event.name, listeners = entries.len(), "Dispatching event");

        let mut handled = 0;
        for entry in entries {
            let listener = match Self::resolve(&entry.target, containers) {
                Ok(listener) => listener,
                Err(e) => {
                    warn!(event = %event.name, error = %e, "Could not resolve event listener");
                    continue;
                }
            };
            match listener.handle(event).await {
                Ok(()) => handled += 1,
                Err(e) => {
                    error!(
                        event = %event.name,
                        listener = ?listener,
                        error = %e,
                        "Event listener failed"
                    );
                }
            }
        }
        handled
    }
}
