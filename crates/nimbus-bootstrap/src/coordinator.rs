//! Drives app registration at boot.

use std::fmt;
use std::sync::Arc;

use tracing::{error, info};

use nimbus_core::error::AppError;
use nimbus_core::result::AppResult;

use crate::container::{AppContainers, ServiceContainer};
use crate::context::{AppRegistrationContext, RegistrationContext};
use crate::events::{Event, EventDispatcher};
use crate::registry::{CrashReporterRegistry, DashboardManager};

/// Implemented by every app that takes part in bootstrap.
pub trait AppBootstrap: Send + Sync + fmt::Debug {
    fn app_id(&self) -> &str;

    /// Records the app's extension points. Nothing registered here is
    /// usable until the coordinator has delegated it.
    fn register(&self, context: &mut AppRegistrationContext<'_>) -> AppResult<()>;
}

#[derive(Debug, Default)]
pub struct Coordinator {
    apps: Vec<Arc<dyn AppBootstrap>>,
    registration: RegistrationContext,
    containers: AppContainers,
    dispatcher: EventDispatcher,
    crash_reporters: CrashReporterRegistry,
    dashboard: DashboardManager,
    registered: bool,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_app(&mut self, app: Arc<dyn AppBootstrap>) -> AppResult<()> {
        if self.registered {
            return Err(AppError::registration(format!(
                "App {} was added after registration ran",
                app.app_id()
            )));
        }
        if self.apps.iter().any(|a| a.app_id() == app.app_id()) {
            return Err(AppError::conflict(format!(
                "App {} is already registered",
                app.app_id()
            )));
        }
        self.apps.push(app);
        Ok(())
    }

    /// Runs every app's `register`, creates the app containers and drains
    /// the ledger into them. An app whose `register` fails keeps whatever
    /// it recorded before the failure.
    pub fn run_registration(&mut self) -> AppResult<()> {
        if self.registered {
            return Err(AppError::registration("Apps have already been registered"));
        }
        self.registered = true;

        for app in &self.apps {
            let mut context = self.registration.for_app(app.app_id());
            if let Err(e) = app.register(&mut context) {
                error!(app_id = %app.app_id(), error = %e, "Error during app registration");
            }
            self.containers
                .entry(app.app_id().to_string())
                .or_insert_with(|| ServiceContainer::new(app.app_id()));
        }

        self.registration
            .delegate_capability_registrations(&mut self.containers);
        self.registration
            .delegate_crash_reporter_registrations(&mut self.crash_reporters);
        self.registration
            .delegate_dashboard_panel_registrations(&mut self.dashboard);
        self.registration
            .delegate_container_registrations(&mut self.containers);
        self.registration
            .delegate_event_listener_registrations(&mut self.dispatcher);

        info!(apps = self.apps.len(), "App registration complete");
        Ok(())
    }

    /// Registrations that stay in the ledger after delegation.
    pub fn registration_context(&self) -> &RegistrationContext {
        &self.registration
    }

    pub fn container(&self, app_id: &str) -> Option<&ServiceContainer> {
        self.containers.get(app_id)
    }

    pub fn containers(&self) -> &AppContainers {
        &self.containers
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn crash_reporters(&self) -> &CrashReporterRegistry {
        &self.crash_reporters
    }

    pub fn dashboard(&self) -> &DashboardManager {
        &self.dashboard
    }

    pub async fn dispatch(&self, event: &Event) -> usize {
        self.dispatcher.dispatch(event, &self.containers).await
    }
}
