//! Built-in apps taking part in bootstrap.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use nimbus_bootstrap::{
    AppBootstrap, AppRegistrationContext, Event, EventListener, ListenerService, Service,
};
use nimbus_core::config::sharing::SharingConfig;
use nimbus_core::result::AppResult;

pub const SHARING_APP_ID: &str = "files_sharing";
pub const SHARE_CREATED_EVENT: &str = "share.created";
const SHARE_LOGGER_SERVICE: &str = "ShareCreatedLogger";

/// Logs every created share.
#[derive(Debug)]
pub struct ShareCreatedLogger;

#[async_trait]
impl EventListener for ShareCreatedLogger {
    async fn handle(&self, event: &Event) -> AppResult<()> {
        info!(payload = %event.payload, "Share created");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SharingApp {
    config: SharingConfig,
}

impl SharingApp {
    pub fn new(config: SharingConfig) -> Self {
        Self { config }
    }
}

impl AppBootstrap for SharingApp {
    fn app_id(&self) -> &str {
        SHARING_APP_ID
    }

    fn register(&self, context: &mut AppRegistrationContext<'_>) -> AppResult<()> {
        context.register_capability("SharingCapabilities");
        context.register_parameter("share_folder", json!(self.config.share_folder));
        context.register_parameter("api_enabled", json!(self.config.api_enabled));
        context.register_service(
            SHARE_LOGGER_SERVICE,
            |_| {
                let listener: ListenerService = Arc::new(ShareCreatedLogger);
                let service: Service = Arc::new(listener);
                Ok(service)
            },
            true,
        );
        context.register_event_listener(SHARE_CREATED_EVENT, SHARE_LOGGER_SERVICE, 0);
        Ok(())
    }
}

/// Apps registered at every boot.
pub fn builtin_apps(sharing: &SharingConfig) -> Vec<Arc<dyn AppBootstrap>> {
    vec![Arc::new(SharingApp::new(sharing.clone()))]
}

#[cfg(test)]
mod tests {
    use nimbus_bootstrap::Coordinator;

    use super::*;

    #[tokio::test]
    async fn test_sharing_app_registration() {
        let mut coordinator = Coordinator::new();
        for app in builtin_apps(&SharingConfig::default()) {
            coordinator.register_app(app).unwrap();
        }
        coordinator.run_registration().unwrap();

        let container = coordinator.container(SHARING_APP_ID).unwrap();
        assert_eq!(container.parameter("share_folder"), Some(&json!("/")));
        assert!(container.has(SHARE_LOGGER_SERVICE));
        assert_eq!(container.capabilities(), ["SharingCapabilities".to_string()]);

        let event = Event::new(SHARE_CREATED_EVENT, json!({ "id": 1 }));
        assert_eq!(coordinator.dispatch(&event).await, 1);
    }
}
