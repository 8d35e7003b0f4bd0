//! The registration ledger filled by apps during bootstrap.
//!
//! Apps never touch the ledger directly. [`RegistrationContext::for_app`]
//! hands out an [`AppRegistrationContext`] that stamps every entry with the
//! registering app's id. Once containers exist the `delegate_*` methods
//! drain the queues into their destinations.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error};

use nimbus_core::error::AppError;
use nimbus_core::result::AppResult;

use crate::container::{AppContainers, Service, ServiceContainer};
use crate::events::EventDispatcher;
use crate::registration::{
    AliasRegistration, EventListenerRegistration, ExtensionKind, MiddlewareRegistration,
    ParameterRegistration, PreviewProviderRegistration, SensitiveMethodsRegistration,
    ServiceFactoryRegistration, ServiceRegistration,
};
use crate::registry::{CrashReporterRegistry, DashboardManager};

/// The only app allowed to provide the Talk backend.
pub const TALK_APP_ID: &str = "spreed";

#[derive(Debug, Default)]
pub struct RegistrationContext {
    extensions: BTreeMap<ExtensionKind, Vec<ServiceRegistration>>,
    services: Vec<ServiceFactoryRegistration>,
    aliases: Vec<AliasRegistration>,
    parameters: Vec<ParameterRegistration>,
    event_listeners: Vec<EventListenerRegistration>,
    middlewares: Vec<MiddlewareRegistration>,
    preview_providers: Vec<PreviewProviderRegistration>,
    sensitive_methods: Vec<SensitiveMethodsRegistration>,
    talk_backend: Option<ServiceRegistration>,
    config_lexicons: HashMap<String, String>,
}

/// Registration scoped to one app: the app id plus a borrow of the ledger.
#[derive(Debug)]
pub struct AppRegistrationContext<'a> {
    app_id: String,
    ledger: &'a mut RegistrationContext,
}

impl AppRegistrationContext<'_> {
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    fn register(&mut self, kind: ExtensionKind, class: impl Into<String>) {
        self.ledger
            .extensions
            .entry(kind)
            .or_default()
            .push(ServiceRegistration::new(self.app_id.clone(), class));
    }

    /// Registers a service built by `factory` in this app's container.
    pub fn register_service<F>(&mut self, name: impl Into<String>, factory: F, shared: bool)
    where
        F: Fn(&ServiceContainer) -> AppResult<Service> + Send + Sync + 'static,
    {
        self.ledger.services.push(ServiceFactoryRegistration {
            app_id: self.app_id.clone(),
            name: name.into(),
            factory: Arc::new(factory),
            shared,
        });
    }

    pub fn register_service_alias(&mut self, alias: impl Into<String>, target: impl Into<String>) {
        self.ledger.aliases.push(AliasRegistration {
            app_id: self.app_id.clone(),
            alias: alias.into(),
            target: target.into(),
        });
    }

    pub fn register_parameter(&mut self, name: impl Into<String>, value: Value) {
        self.ledger.parameters.push(ParameterRegistration {
            app_id: self.app_id.clone(),
            name: name.into(),
            value,
        });
    }

    pub fn register_event_listener(
        &mut self,
        event: impl Into<String>,
        listener: impl Into<String>,
        priority: i32,
    ) {
        self.ledger.event_listeners.push(EventListenerRegistration {
            app_id: self.app_id.clone(),
            event: event.into(),
            listener: listener.into(),
            priority,
        });
    }

    pub fn register_middleware(&mut self, class: impl Into<String>, global: bool) {
        self.ledger.middlewares.push(MiddlewareRegistration {
            app_id: self.app_id.clone(),
            class: class.into(),
            global,
        });
    }

    pub fn register_preview_provider(
        &mut self,
        class: impl Into<String>,
        mime_type_regex: impl Into<String>,
    ) {
        self.ledger
            .preview_providers
            .push(PreviewProviderRegistration {
                app_id: self.app_id.clone(),
                class: class.into(),
                mime_type_regex: mime_type_regex.into(),
            });
    }

    pub fn register_sensitive_methods<I, S>(&mut self, class: impl Into<String>, methods: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ledger
            .sensitive_methods
            .push(SensitiveMethodsRegistration {
                app_id: self.app_id.clone(),
                class: class.into(),
                methods: methods.into_iter().map(Into::into).collect(),
            });
    }

    /// Only [`TALK_APP_ID`] may register a Talk backend, and only once.
    pub fn register_talk_backend(&mut self, class: impl Into<String>) -> AppResult<()> {
        if self.app_id != TALK_APP_ID {
            return Err(AppError::registration(format!(
                "App {} is not allowed to register a Talk backend",
                self.app_id
            )));
        }
        if self.ledger.talk_backend.is_some() {
            return Err(AppError::registration("Talk backend was already registered"));
        }
        self.ledger.talk_backend = Some(ServiceRegistration::new(self.app_id.clone(), class));
        Ok(())
    }

    /// One lexicon per app; a second registration replaces the first.
    pub fn register_config_lexicon(&mut self, class: impl Into<String>) {
        self.ledger
            .config_lexicons
            .insert(self.app_id.clone(), class.into());
    }
}

/// Generates the typed register method and the matching getter for every
/// extension point that is registered by class name alone.
macro_rules! extension_registrations {
    ($($register:ident, $getter:ident => $kind:ident;)*) => {
        impl AppRegistrationContext<'_> {
            $(
                pub fn $register(&mut self, class: impl Into<String>) {
                    self.register(ExtensionKind::$kind, class);
                }
            )*
        }

        impl RegistrationContext {
            $(
                pub fn $getter(&self) -> &[ServiceRegistration] {
                    self.registrations(ExtensionKind::$kind)
                }
            )*
        }
    };
}

extension_registrations! {
    register_capability, capabilities => Capability;
    register_crash_reporter, crash_reporters => CrashReporter;
    register_dashboard_panel, dashboard_panels => DashboardPanel;
    register_search_provider, search_providers => SearchProvider;
    register_alternative_login, alternative_logins => AlternativeLogin;
    register_initial_state_provider, initial_states => InitialState;
    register_well_known_handler, well_known_handlers => WellKnownHandler;
    register_speech_to_text_provider, speech_to_text_providers => SpeechToTextProvider;
    register_text_processing_provider, text_processing_providers => TextProcessingProvider;
    register_text_to_image_provider, text_to_image_providers => TextToImageProvider;
    register_template_provider, template_providers => TemplateProvider;
    register_translation_provider, translation_providers => TranslationProvider;
    register_notifier_service, notifier_services => Notifier;
    register_two_factor_provider, two_factor_providers => TwoFactorProvider;
    register_calendar_provider, calendar_providers => CalendarProvider;
    register_reference_provider, reference_providers => ReferenceProvider;
    register_profile_link_action, profile_link_actions => ProfileLinkAction;
    register_calendar_resource_backend, calendar_resource_backends => CalendarResourceBackend;
    register_calendar_room_backend, calendar_room_backends => CalendarRoomBackend;
    register_team_resource_provider, team_resource_providers => TeamResourceProvider;
    register_user_migrator, user_migrators => UserMigrator;
    register_public_share_template_provider, public_share_template_providers => PublicShareTemplateProvider;
    register_setup_check, setup_checks => SetupCheck;
    register_declarative_settings, declarative_settings => DeclarativeSettings;
    register_task_processing_provider, task_processing_providers => TaskProcessingProvider;
    register_task_processing_task_type, task_processing_task_types => TaskProcessingTaskType;
    register_file_conversion_provider, file_conversion_providers => FileConversionProvider;
    register_mail_provider, mail_providers => MailProvider;
}

impl RegistrationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_app(&mut self, app_id: impl Into<String>) -> AppRegistrationContext<'_> {
        AppRegistrationContext {
            app_id: app_id.into(),
            ledger: self,
        }
    }

    pub fn registrations(&self, kind: ExtensionKind) -> &[ServiceRegistration] {
        self.extensions.get(&kind).map_or(&[][..], Vec::as_slice)
    }

    fn take(&mut self, kind: ExtensionKind) -> Vec<ServiceRegistration> {
        self.extensions.remove(&kind).unwrap_or_default()
    }

    pub fn delegate_capability_registrations(&mut self, containers: &mut AppContainers) {
        for registration in self.take(ExtensionKind::Capability) {
            let Some(container) = containers.get_mut(&registration.app_id) else {
                error!(
                    app_id = %registration.app_id,
                    capability = %registration.service,
                    "Could not register capability: app is not loaded"
                );
                continue;
            };
            if let Err(e) = container.register_capability(&registration.service) {
                error!(
                    app_id = %registration.app_id,
                    capability = %registration.service,
                    error = %e,
                    "Error during capability registration"
                );
            }
        }
    }

    pub fn delegate_crash_reporter_registrations(&mut self, registry: &mut CrashReporterRegistry) {
        for registration in self.take(ExtensionKind::CrashReporter) {
            if let Err(e) = registry.register_lazy(&registration.service) {
                error!(
                    app_id = %registration.app_id,
                    reporter = %registration.service,
                    error = %e,
                    "Error during crash reporter registration"
                );
            }
        }
    }

    pub fn delegate_dashboard_panel_registrations(&mut self, dashboard: &mut DashboardManager) {
        for registration in self.take(ExtensionKind::DashboardPanel) {
            if let Err(e) = dashboard.lazy_register_widget(&registration.service, &registration.app_id)
            {
                error!(
                    app_id = %registration.app_id,
                    panel = %registration.service,
                    error = %e,
                    "Error during dashboard registration"
                );
            }
        }
    }

    pub fn delegate_event_listener_registrations(&mut self, dispatcher: &mut EventDispatcher) {
        for registration in std::mem::take(&mut self.event_listeners) {
            if let Err(e) = dispatcher.add_service_listener(
                &registration.event,
                &registration.app_id,
                &registration.listener,
                registration.priority,
            ) {
                error!(
                    app_id = %registration.app_id,
                    event = %registration.event,
                    listener = %registration.listener,
                    error = %e,
                    "Error during event listener registration"
                );
            }
        }
    }

    /// Services first, then aliases, then parameters.
    pub fn delegate_container_registrations(&mut self, containers: &mut AppContainers) {
        for registration in std::mem::take(&mut self.services) {
            let result = Self::container_of(containers, &registration.app_id).and_then(|c| {
                c.register_service(&registration.name, registration.factory, registration.shared)
            });
            if let Err(e) = result {
                error!(
                    app_id = %registration.app_id,
                    service = %registration.name,
                    error = %e,
                    "Error during service registration"
                );
            }
        }

        for registration in std::mem::take(&mut self.aliases) {
            let result = Self::container_of(containers, &registration.app_id)
                .and_then(|c| c.register_alias(&registration.alias, &registration.target));
            if let Err(e) = result {
                error!(
                    app_id = %registration.app_id,
                    alias = %registration.alias,
                    target = %registration.target,
                    error = %e,
                    "Error during service alias registration"
                );
            }
        }

        for registration in std::mem::take(&mut self.parameters) {
            let result = Self::container_of(containers, &registration.app_id)
                .and_then(|c| c.register_parameter(&registration.name, registration.value));
            if let Err(e) = result {
                error!(
                    app_id = %registration.app_id,
                    parameter = %registration.name,
                    error = %e,
                    "Error during service parameter registration"
                );
            }
        }
        debug!("Container registrations delegated");
    }

    fn container_of<'c>(
        containers: &'c mut AppContainers,
        app_id: &str,
    ) -> AppResult<&'c mut ServiceContainer> {
        containers
            .get_mut(app_id)
            .ok_or_else(|| AppError::not_found(format!("App {app_id} is not loaded")))
    }

    pub fn middlewares(&self) -> &[MiddlewareRegistration] {
        &self.middlewares
    }

    pub fn preview_providers(&self) -> &[PreviewProviderRegistration] {
        &self.preview_providers
    }

    pub fn sensitive_methods(&self) -> &[SensitiveMethodsRegistration] {
        &self.sensitive_methods
    }

    pub fn event_listeners(&self) -> &[EventListenerRegistration] {
        &self.event_listeners
    }

    pub fn talk_backend(&self) -> Option<&ServiceRegistration> {
        self.talk_backend.as_ref()
    }

    pub fn config_lexicon(&self, app_id: &str) -> Option<&str> {
        self.config_lexicons.get(app_id).map(String::as_str)
    }

    pub fn config_lexicons(&self) -> &HashMap<String, String> {
        &self.config_lexicons
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, EventListener, ListenerService};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn containers(apps: &[&str]) -> AppContainers {
        apps.iter()
            .map(|app| (app.to_string(), ServiceContainer::new(*app)))
            .collect()
    }

    #[test]
    fn test_registrations_are_stamped_with_app_id() {
        let mut ledger = RegistrationContext::new();
        {
            let mut files = ledger.for_app("files");
            files.register_search_provider("FilesSearch");
            files.register_middleware("FilesMiddleware", true);
        }
        ledger.for_app("mail").register_search_provider("MailSearch");

        let providers = ledger.search_providers();
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0], ServiceRegistration::new("files", "FilesSearch"));
        assert_eq!(providers[1].app_id, "mail");
        assert!(ledger.middlewares()[0].global);
        assert!(ledger.notifier_services().is_empty());
    }

    #[test]
    fn test_talk_backend_restricted_to_spreed() {
        let mut ledger = RegistrationContext::new();
        assert!(ledger.for_app("files").register_talk_backend("Backend").is_err());
        assert!(ledger.talk_backend().is_none());

        ledger.for_app(TALK_APP_ID).register_talk_backend("TalkBackend").unwrap();
        assert!(ledger.for_app(TALK_APP_ID).register_talk_backend("Other").is_err());
        assert_eq!(ledger.talk_backend().unwrap().service, "TalkBackend");
    }

    #[test]
    fn test_config_lexicon_per_app() {
        let mut ledger = RegistrationContext::new();
        ledger.for_app("files").register_config_lexicon("FilesLexicon");
        ledger.for_app("files").register_config_lexicon("FilesLexiconV2");
        assert_eq!(ledger.config_lexicon("files"), Some("FilesLexiconV2"));
        assert_eq!(ledger.config_lexicon("mail"), None);
    }

    #[test]
    fn test_capability_delegation_skips_unloaded_apps() {
        let mut ledger = RegistrationContext::new();
        ledger.for_app("files").register_capability("FilesCapabilities");
        ledger.for_app("ghost").register_capability("GhostCapabilities");
        ledger.for_app("files").register_capability("FilesCapabilities");

        let mut containers = containers(&["files"]);
        ledger.delegate_capability_registrations(&mut containers);

        assert_eq!(
            containers["files"].capabilities(),
            ["FilesCapabilities".to_string()]
        );
        assert!(ledger.capabilities().is_empty());
    }

    #[test]
    fn test_container_delegation_order() {
        let mut ledger = RegistrationContext::new();
        {
            let mut app = ledger.for_app("files");
            // Alias registered before its service still resolves.
            app.register_service_alias("Alias", "Counter");
            app.register_parameter("start", Value::from(7));
            app.register_service(
                "Counter",
                |c: &ServiceContainer| {
                    let start = c.parameter("start").and_then(Value::as_u64).unwrap_or(0);
                    Ok(Arc::new(AtomicUsize::new(start as usize)) as Service)
                },
                true,
            );
            app.register_service("", |_: &ServiceContainer| Ok(Arc::new(()) as Service), true);
        }
        ledger
            .for_app("ghost")
            .register_service("Ghost", |_: &ServiceContainer| Ok(Arc::new(()) as Service), true);

        let mut containers = containers(&["files"]);
        ledger.delegate_container_registrations(&mut containers);

        let counter = containers["files"].get_as::<AtomicUsize>("Alias").unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 7);
        assert!(!containers.contains_key("ghost"));
    }

    #[test]
    fn test_crash_reporter_and_dashboard_delegation() {
        let mut ledger = RegistrationContext::new();
        ledger.for_app("sentry").register_crash_reporter("Reporter");
        ledger.for_app("other").register_crash_reporter("Reporter");
        ledger.for_app("files").register_dashboard_panel("RecentFiles");

        let mut reporters = CrashReporterRegistry::new();
        let mut dashboard = DashboardManager::new();
        ledger.delegate_crash_reporter_registrations(&mut reporters);
        ledger.delegate_dashboard_panel_registrations(&mut dashboard);

        assert_eq!(reporters.reporters(), ["Reporter".to_string()]);
        assert_eq!(dashboard.widgets()[0].app_id, "files");
        assert!(ledger.crash_reporters().is_empty());
        assert!(ledger.dashboard_panels().is_empty());
    }

    #[derive(Debug)]
    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl EventListener for Counting {
        async fn handle(&self, _event: &Event) -> AppResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_event_listener_delegation() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut ledger = RegistrationContext::new();
        {
            let hits = hits.clone();
            let mut app = ledger.for_app("activity");
            app.register_service(
                "Listener",
                move |_: &ServiceContainer| {
                    let listener: ListenerService = Arc::new(Counting(hits.clone()));
                    Ok(Arc::new(listener) as Service)
                },
                true,
            );
            app.register_event_listener("share.created", "Listener", 0);
            app.register_event_listener("", "Listener", 0);
        }

        let mut containers = containers(&["activity"]);
        let mut dispatcher = EventDispatcher::new();
        ledger.delegate_container_registrations(&mut containers);
        ledger.delegate_event_listener_registrations(&mut dispatcher);

        assert!(ledger.event_listeners().is_empty());
        assert_eq!(dispatcher.listener_count("share.created"), 1);
        let handled = dispatcher
            .dispatch(&Event::new("share.created", Value::Null), &containers)
            .await;
        assert_eq!(handled, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
