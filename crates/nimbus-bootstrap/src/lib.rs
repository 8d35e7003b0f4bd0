//! # nimbus-bootstrap
//!
//! Registration of optional apps. During bootstrap every app records its
//! extension points (capabilities, services, event listeners, providers)
//! in the shared [`RegistrationContext`] through a per-app
//! [`AppRegistrationContext`]. Once the app containers exist the
//! [`Coordinator`] drains the ledger into them:
//!
//! - capabilities, services, aliases and parameters go into each app's
//!   [`ServiceContainer`]
//! - event listeners go into the [`EventDispatcher`]
//! - crash reporters and dashboard panels go into their registries
//!
//! A failing item is logged and skipped; it never aborts the batch.

pub mod container;
pub mod context;
pub mod coordinator;
pub mod events;
pub mod registration;
pub mod registry;

pub use container::{AppContainers, Service, ServiceContainer, ServiceFactory};
pub use context::{AppRegistrationContext, RegistrationContext, TALK_APP_ID};
pub use coordinator::{AppBootstrap, Coordinator};
pub use events::{Event, EventDispatcher, EventListener, ListenerService};
pub use registration::{
    AliasRegistration, EventListenerRegistration, ExtensionKind, MiddlewareRegistration,
    ParameterRegistration, PreviewProviderRegistration, SensitiveMethodsRegistration,
    ServiceFactoryRegistration, ServiceRegistration,
};
pub use registry::{CrashReporterRegistry, DashboardManager, DashboardWidget};
