//! Per-app service containers.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

use nimbus_core::result::AppResult;
use nimbus_core::error::AppError;

/// A type-erased service instance.
pub type Service = Arc<dyn Any + Send + Sync>;

/// Builds a service. The container is passed in so factories can resolve
/// their own dependencies.
pub type ServiceFactory = Arc<dyn Fn(&ServiceContainer) -> AppResult<Service> + Send + Sync>;

/// Containers of all loaded apps, keyed by app id.
pub type AppContainers = HashMap<String, ServiceContainer>;

#[derive(Clone)]
struct FactoryEntry {
    factory: ServiceFactory,
    shared: bool,
}

/// Services, aliases, parameters and capabilities of one app.
pub struct ServiceContainer {
    app_id: String,
    factories: HashMap<String, FactoryEntry>,
    aliases: HashMap<String, String>,
    parameters: HashMap<String, Value>,
    capabilities: Vec<String>,
    /// Instances of shared services built so far.
    instances: DashMap<String, Service>,
}

impl ServiceContainer {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            factories: HashMap::new(),
            aliases: HashMap::new(),
            parameters: HashMap::new(),
            capabilities: Vec::new(),
            instances: DashMap::new(),
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Registers a service factory. A later registration under the same
    /// name replaces the earlier one.
    pub fn register_service(
        &mut self,
        name: &str,
        factory: ServiceFactory,
        shared: bool,
    ) -> AppResult<()> {
        if name.is_empty() {
            return Err(AppError::registration("Service name must not be empty"));
        }
        self.instances.remove(name);
        if self
            .factories
            .insert(name.to_string(), FactoryEntry { factory, shared })
            .is_some()
        {
            debug!(app_id = %self.app_id, service = %name, "Service registration replaced");
        }
        Ok(())
    }

    pub fn register_alias(&mut self, alias: &str, target: &str) -> AppResult<()> {
        if alias.is_empty() || target.is_empty() {
            return Err(AppError::registration("Alias and target must not be empty"));
        }
        if alias == target {
            return Err(AppError::registration(format!(
                "Service {alias} cannot be an alias of itself"
            )));
        }
        self.aliases.insert(alias.to_string(), target.to_string());
        Ok(())
    }

    pub fn register_parameter(&mut self, name: &str, value: Value) -> AppResult<()> {
        if name.is_empty() {
            return Err(AppError::registration("Parameter name must not be empty"));
        }
        self.parameters.insert(name.to_string(), value);
        Ok(())
    }

    pub fn register_capability(&mut self, class: &str) -> AppResult<()> {
        if class.is_empty() {
            return Err(AppError::registration("Capability class must not be empty"));
        }
        if self.capabilities.iter().any(|c| c == class) {
            return Err(AppError::conflict(format!(
                "Capability {class} is already registered for app {}",
                self.app_id
            )));
        }
        self.capabilities.push(class.to_string());
        Ok(())
    }

    /// Follows aliases to the name a factory is registered under.
    fn resolve_name<'a>(&'a self, name: &'a str) -> AppResult<&'a str> {
        let mut current = name;
        let mut seen = HashSet::new();
        while let Some(target) = self.aliases.get(current) {
            if !seen.insert(current) {
                return Err(AppError::registration(format!(
                    "Alias cycle while resolving {name}"
                )));
            }
            current = target;
        }
        Ok(current)
    }

    pub fn has(&self, name: &str) -> bool {
        self.resolve_name(name)
            .map(|n| self.factories.contains_key(n))
            .unwrap_or(false)
    }

    /// Resolves a service by name or alias. Shared services are built on
    /// first use and cached.
    pub fn get(&self, name: &str) -> AppResult<Service> {
        let resolved = self.resolve_name(name)?;

        if let Some(instance) = self.instances.get(resolved) {
            return Ok(Arc::clone(instance.value()));
        }

        let entry = self.factories.get(resolved).ok_or_else(|| {
            AppError::not_found(format!(
                "Service {name} is not registered in app {}",
                self.app_id
            ))
        })?;

        // No map guard is held here: factories may resolve other services.
        let service = (entry.factory)(self)?;
        if !entry.shared {
            return Ok(service);
        }
        let cached = self
            .instances
            .entry(resolved.to_string())
            .or_insert(service);
        Ok(Arc::clone(cached.value()))
    }

    /// Resolves a service and downcasts it to `T`.
    pub fn get_as<T: Any + Send + Sync>(&self, name: &str) -> AppResult<Arc<T>> {
        self.get(name)?.downcast::<T>().map_err(|_| {
            AppError::internal(format!(
                "Service {name} of app {} has an unexpected type",
                self.app_id
            ))
        })
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }
}

impl fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut services: Vec<_> = self.factories.keys().collect();
        services.sort();
        f.debug_struct("ServiceContainer")
            .field("app_id", &self.app_id)
            .field("services", &services)
            .field("aliases", &self.aliases)
            .field("parameters", &self.parameters)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Greeter(String);

    fn greeter_factory(counter: Arc<AtomicUsize>) -> ServiceFactory {
        Arc::new(move |_: &ServiceContainer| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Greeter("hello".into())) as Service)
        })
    }

    #[test]
    fn test_shared_service_is_built_once() {
        let built = Arc::new(AtomicUsize::new(0));
        let mut container = ServiceContainer::new("files");
        container
            .register_service("greeter", greeter_factory(built.clone()), true)
            .unwrap();

        let first = container.get_as::<Greeter>("greeter").unwrap();
        let second = container.get_as::<Greeter>("greeter").unwrap();
        assert_eq!(first.0, "hello");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unshared_service_is_built_every_time() {
        let built = Arc::new(AtomicUsize::new(0));
        let mut container = ServiceContainer::new("files");
        container
            .register_service("greeter", greeter_factory(built.clone()), false)
            .unwrap();

        container.get("greeter").unwrap();
        container.get("greeter").unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_alias_resolution() {
        let mut container = ServiceContainer::new("files");
        container
            .register_service("greeter", greeter_factory(Arc::default()), true)
            .unwrap();
        container.register_alias("hello", "greeter").unwrap();
        container.register_alias("hi", "hello").unwrap();

        assert!(container.has("hi"));
        assert_eq!(container.get_as::<Greeter>("hi").unwrap().0, "hello");
    }

    #[test]
    fn test_alias_cycle_is_an_error() {
        let mut container = ServiceContainer::new("files");
        container.register_alias("a", "b").unwrap();
        container.register_alias("b", "a").unwrap();

        assert!(container.get("a").is_err());
        assert!(!container.has("a"));
        assert!(container.register_alias("c", "c").is_err());
    }

    #[test]
    fn test_factory_resolves_dependencies() {
        let mut container = ServiceContainer::new("files");
        container
            .register_parameter("greeting", Value::String("hey".into()))
            .unwrap();
        container
            .register_service(
                "greeter",
                Arc::new(|c: &ServiceContainer| {
                    let greeting = c
                        .parameter("greeting")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    Ok(Arc::new(Greeter(greeting)) as Service)
                }),
                true,
            )
            .unwrap();
        container
            .register_service(
                "loud",
                Arc::new(|c: &ServiceContainer| {
                    let inner = c.get_as::<Greeter>("greeter")?;
                    Ok(Arc::new(Greeter(inner.0.to_uppercase())) as Service)
                }),
                true,
            )
            .unwrap();

        assert_eq!(container.get_as::<Greeter>("loud").unwrap().0, "HEY");
    }

    #[test]
    fn test_missing_and_mistyped_services() {
        let mut container = ServiceContainer::new("files");
        container
            .register_service("greeter", greeter_factory(Arc::default()), true)
            .unwrap();

        assert!(container.get("nope").is_err());
        assert!(container.get_as::<String>("greeter").is_err());
    }

    #[test]
    fn test_capabilities_reject_duplicates() {
        let mut container = ServiceContainer::new("files");
        container.register_capability("FilesCapabilities").unwrap();
        assert!(container.register_capability("FilesCapabilities").is_err());
        assert_eq!(container.capabilities(), ["FilesCapabilities".to_string()]);
    }
}
