//! Entries of the registration ledger.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::container::ServiceFactory;

/// Extension points registered by class name only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionKind {
    Capability,
    CrashReporter,
    DashboardPanel,
    SearchProvider,
    AlternativeLogin,
    InitialState,
    WellKnownHandler,
    SpeechToTextProvider,
    TextProcessingProvider,
    TextToImageProvider,
    TemplateProvider,
    TranslationProvider,
    Notifier,
    TwoFactorProvider,
    CalendarProvider,
    ReferenceProvider,
    ProfileLinkAction,
    CalendarResourceBackend,
    CalendarRoomBackend,
    TeamResourceProvider,
    UserMigrator,
    PublicShareTemplateProvider,
    SetupCheck,
    DeclarativeSettings,
    TaskProcessingProvider,
    TaskProcessingTaskType,
    FileConversionProvider,
    MailProvider,
}

impl fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_value(self) {
            Ok(Value::String(name)) => f.write_str(&name),
            _ => write!(f, "{self:?}"),
        }
    }
}

/// An app's registration of a class for some extension point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceRegistration {
    pub app_id: String,
    pub service: String,
}

impl ServiceRegistration {
    pub fn new(app_id: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            service: service.into(),
        }
    }
}

/// A service built by a factory inside the app's container.
#[derive(Clone)]
pub struct ServiceFactoryRegistration {
    pub app_id: String,
    pub name: String,
    pub factory: ServiceFactory,
    /// Shared services are built once and cached.
    pub shared: bool,
}

impl fmt::Debug for ServiceFactoryRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceFactoryRegistration")
            .field("app_id", &self.app_id)
            .field("name", &self.name)
            .field("factory", &"<factory>")
            .field("shared", &self.shared)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasRegistration {
    pub app_id: String,
    pub alias: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterRegistration {
    pub app_id: String,
    pub name: String,
    pub value: Value,
}

/// A listener service subscribed to an event. Higher priorities run first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventListenerRegistration {
    pub app_id: String,
    pub event: String,
    pub listener: String,
    pub priority: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MiddlewareRegistration {
    pub app_id: String,
    pub class: String,
    /// Runs for every app's controllers, not only the registering app's.
    pub global: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewProviderRegistration {
    pub app_id: String,
    pub class: String,
    pub mime_type_regex: String,
}

/// Controller methods whose parameters must not be logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensitiveMethodsRegistration {
    pub app_id: String,
    pub class: String,
    pub methods: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_kind_display() {
        assert_eq!(ExtensionKind::Capability.to_string(), "capability");
        assert_eq!(
            ExtensionKind::PublicShareTemplateProvider.to_string(),
            "public_share_template_provider"
        );
    }
}
