use std::any::{Any, TypeId};
use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::config::ServerConfig;

// ---------------------------------------------------------------------------
// ServiceContext
// ---------------------------------------------------------------------------

/// Context provided to services during initialization.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    pub config: Arc<ServerConfig>,
}

impl ServiceContext {
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

// ---------------------------------------------------------------------------
// ManagedService trait
// ---------------------------------------------------------------------------

/// Lifecycle-managed service.
///
/// Services are initialized in registration order and shut down in reverse
/// registration order. The `Any` bound enables `ServiceRegistry::get::<T>()`.
#[async_trait]
pub trait ManagedService: Send + Sync + Any {
    /// Unique name of this service (e.g. `"mapping"`).
    fn name(&self) -> &'static str;

    async fn init(&self, ctx: &ServiceContext) -> anyhow::Result<()>;

    /// Drops runtime state so the service can be initialized again.
    async fn reset(&self) -> anyhow::Result<()>;

    /// Shut down the service. If `terminate` is true, skip graceful cleanup.
    async fn shutdown(&self, terminate: bool) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// ServiceRegistry
// ---------------------------------------------------------------------------

/// Registry for lifecycle-managed services, addressable by name or by type.
pub struct ServiceRegistry {
    by_name: DashMap<&'static str, Arc<dyn ManagedService>>,
    by_type: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    /// Registration order for deterministic init/shutdown sequencing.
    order: RwLock<Vec<&'static str>>,
}

impl ServiceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_name: DashMap::new(),
            by_type: DashMap::new(),
            order: RwLock::new(Vec::new()),
        }
    }

    /// Registers a service and returns the shared handle to it.
    ///
    /// Registering a second service under an existing name replaces the
    /// first but keeps its original position in the lifecycle order.
    pub fn register<T: ManagedService>(&self, service: T) -> Arc<T> {
        let name = service.name();
        let arc = Arc::new(service);
        let previous = self.by_name.insert(name, arc.clone());
        self.by_type.insert(TypeId::of::<T>(), arc.clone());
        if previous.is_none() {
            self.order.write().push(name);
        }
        arc
    }

    pub fn get<T: ManagedService>(&self) -> Option<Arc<T>> {
        self.by_type
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.value().clone().downcast::<T>().ok())
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn ManagedService>> {
        self.by_name.get(name).map(|entry| entry.value().clone())
    }

    /// Service names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.order.read().clone()
    }

    /// Initializes all services in registration order, stopping at the first
    /// failure.
    ///
    /// # Errors
    ///
    /// The failing service's error, annotated with its name.
    pub async fn init_all(&self, ctx: &ServiceContext) -> anyhow::Result<()> {
        for name in self.names() {
            if let Some(service) = self.get_by_name(name) {
                service
                    .init(ctx)
                    .await
                    .with_context(|| format!("failed to initialize service `{name}`"))?;
                info!(service = name, "service initialized");
            }
        }
        Ok(())
    }

    /// Resets all services in registration order.
    ///
    /// # Errors
    ///
    /// The failing service's error, annotated with its name.
    pub async fn reset_all(&self) -> anyhow::Result<()> {
        for name in self.names() {
            if let Some(service) = self.get_by_name(name) {
                service
                    .reset()
                    .await
                    .with_context(|| format!("failed to reset service `{name}`"))?;
            }
        }
        Ok(())
    }

    /// Shuts down all services in reverse registration order.
    ///
    /// Every service is asked to shut down even if an earlier one fails.
    ///
    /// # Errors
    ///
    /// The first shutdown failure.
    pub async fn shutdown_all(&self, terminate: bool) -> anyhow::Result<()> {
        let mut first_error = None;
        for name in self.names().into_iter().rev() {
            let Some(service) = self.get_by_name(name) else {
                continue;
            };
            if let Err(err) = service.shutdown(terminate).await {
                warn!(service = name, error = %err, "service shutdown failed");
                first_error
                    .get_or_insert(err.context(format!("failed to shut down service `{name}`")));
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    type Log = Arc<parking_lot::Mutex<Vec<String>>>;

    /// Records lifecycle calls; optionally fails one of them.
    struct Recorder {
        label: &'static str,
        log: Log,
        fail_init: bool,
        fail_shutdown: bool,
        resets: AtomicU32,
    }

    impl Recorder {
        fn new(label: &'static str, log: Log) -> Self {
            Self {
                label,
                log,
                fail_init: false,
                fail_shutdown: false,
                resets: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ManagedService for Recorder {
        fn name(&self) -> &'static str {
            self.label
        }

        async fn init(&self, _ctx: &ServiceContext) -> anyhow::Result<()> {
            self.log.lock().push(format!("init:{}", self.label));
            if self.fail_init {
                anyhow::bail!("schema directory unreadable");
            }
            Ok(())
        }

        async fn reset(&self) -> anyhow::Result<()> {
            self.resets.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn shutdown(&self, _terminate: bool) -> anyhow::Result<()> {
            self.log.lock().push(format!("shutdown:{}", self.label));
            if self.fail_shutdown {
                anyhow::bail!("flush failed");
            }
            Ok(())
        }
    }

    struct Catalogs;

    #[async_trait]
    impl ManagedService for Catalogs {
        fn name(&self) -> &'static str {
            "catalogs"
        }
        async fn init(&self, _ctx: &ServiceContext) -> anyhow::Result<()> {
            Ok(())
        }
        async fn reset(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn shutdown(&self, _terminate: bool) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn log() -> Log {
        Arc::new(parking_lot::Mutex::new(Vec::new()))
    }

    fn ctx() -> ServiceContext {
        ServiceContext::new(ServerConfig::default())
    }

    #[test]
    fn register_returns_the_shared_handle() {
        let registry = ServiceRegistry::new();
        let handle = registry.register(Catalogs);
        let looked_up = registry.get::<Catalogs>().unwrap();
        assert!(Arc::ptr_eq(&handle, &looked_up));
        assert_eq!(registry.get_by_name("catalogs").unwrap().name(), "catalogs");
    }

    #[test]
    fn lookups_of_unregistered_services_are_none() {
        let registry = ServiceRegistry::new();
        assert!(registry.get_by_name("mapping").is_none());
        assert!(registry.get::<Catalogs>().is_none());
    }

    #[test]
    fn reregistering_keeps_original_position() {
        let registry = ServiceRegistry::new();
        let log = log();
        registry.register(Recorder::new("mapping", log.clone()));
        registry.register(Catalogs);
        registry.register(Recorder::new("mapping", log));
        assert_eq!(registry.names(), vec!["mapping", "catalogs"]);
    }

    #[tokio::test]
    async fn init_and_shutdown_follow_registration_order() {
        let log = log();
        let registry = ServiceRegistry::new();
        registry.register(Recorder::new("config", log.clone()));
        registry.register(Recorder::new("mapping", log.clone()));

        registry.init_all(&ctx()).await.unwrap();
        registry.shutdown_all(false).await.unwrap();

        assert_eq!(
            log.lock().clone(),
            vec!["init:config", "init:mapping", "shutdown:mapping", "shutdown:config"]
        );
    }

    #[tokio::test]
    async fn init_stops_at_first_failure_with_context() {
        let log = log();
        let registry = ServiceRegistry::new();
        registry.register(Recorder {
            fail_init: true,
            ..Recorder::new("mapping", log.clone())
        });
        registry.register(Recorder::new("later", log.clone()));

        let err = registry.init_all(&ctx()).await.unwrap_err();
        assert!(err.to_string().contains("`mapping`"));
        assert_eq!(log.lock().clone(), vec!["init:mapping"]);
    }

    #[tokio::test]
    async fn shutdown_continues_past_failures() {
        let log = log();
        let registry = ServiceRegistry::new();
        registry.register(Recorder::new("first", log.clone()));
        registry.register(Recorder {
            fail_shutdown: true,
            ..Recorder::new("second", log.clone())
        });

        let err = registry.shutdown_all(true).await.unwrap_err();
        assert!(err.to_string().contains("`second`"));
        assert_eq!(log.lock().clone(), vec!["shutdown:second", "shutdown:first"]);
    }

    #[tokio::test]
    async fn reset_all_reaches_every_service() {
        let registry = ServiceRegistry::new();
        let recorder = registry.register(Recorder::new("mapping", log()));
        registry.reset_all().await.unwrap();
        assert_eq!(recorder.resets.load(Ordering::SeqCst), 1);
    }
}
