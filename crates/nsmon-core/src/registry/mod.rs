//! Plugin-based provider registry
//!
//! The registry allows zone sources, resolvers, notifiers and history stores
//! to be registered dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nsmon_core::registry::ProviderRegistry;
//! use nsmon_core::config::ZoneSourceConfig;
//!
//! let registry = ProviderRegistry::with_builtins();
//! nsmon_zone_cloudflare::register(&registry);
//!
//! let config = ZoneSourceConfig::Cloudflare { ... };
//! let source = registry.create_zone_source(&config)?;
//! ```
//!
//! ## Registration
//!
//! Plugin crates register themselves during initialization:
//!
//! ```rust,ignore
//! // In nsmon-zone-cloudflare crate
//! pub fn register(registry: &ProviderRegistry) {
//!     registry.register_zone_source("cloudflare", Box::new(CloudflareFactory));
//! }
//! ```

use crate::checker::LogNotifierFactory;
use crate::config::{
    HistoryStoreConfig, NotifierConfig, ResolverConfig, RetentionConfig, ZoneSourceConfig,
};
use crate::error::{Error, Result};
use crate::history::{FileHistoryStoreFactory, MemoryHistoryStoreFactory};
use crate::traits::{HistoryStore, NameserverResolver, Notifier, ZoneSource};
use crate::traits::{HistoryStoreFactory, NotifierFactory, ResolverFactory, ZoneSourceFactory};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Provider registry for plugin-based capability creation
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered zone source factories
    zone_sources: RwLock<HashMap<String, Box<dyn ZoneSourceFactory>>>,

    /// Registered resolver factories
    resolvers: RwLock<HashMap<String, Box<dyn ResolverFactory>>>,

    /// Registered notifier factories
    notifiers: RwLock<HashMap<String, Box<dyn NotifierFactory>>>,

    /// Registered history store factories
    history_stores: RwLock<HashMap<String, Arc<dyn HistoryStoreFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the implementations that live in this crate
    ///
    /// Registers the `file` and `memory` history stores and the `log` notifier.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_history_store("file", Box::new(FileHistoryStoreFactory));
        registry.register_history_store("memory", Box::new(MemoryHistoryStoreFactory));
        registry.register_notifier("log", Box::new(LogNotifierFactory));
        registry
    }

    /// Register a zone source factory
    ///
    /// # Parameters
    ///
    /// - `name`: Zone source type name (e.g., "cloudflare", "delegation")
    /// - `factory`: Factory object for creating zone source instances
    pub fn register_zone_source(
        &self,
        name: impl Into<String>,
        factory: Box<dyn ZoneSourceFactory>,
    ) {
        let mut sources = self.zone_sources.write().unwrap();
        sources.insert(name.into(), factory);
    }

    /// Register a resolver factory
    pub fn register_resolver(&self, name: impl Into<String>, factory: Box<dyn ResolverFactory>) {
        let mut resolvers = self.resolvers.write().unwrap();
        resolvers.insert(name.into(), factory);
    }

    /// Register a notifier factory
    pub fn register_notifier(&self, name: impl Into<String>, factory: Box<dyn NotifierFactory>) {
        let mut notifiers = self.notifiers.write().unwrap();
        notifiers.insert(name.into(), factory);
    }

    /// Register a history store factory
    pub fn register_history_store(
        &self,
        name: impl Into<String>,
        factory: Box<dyn HistoryStoreFactory>,
    ) {
        let mut stores = self.history_stores.write().unwrap();
        stores.insert(name.into(), Arc::from(factory));
    }

    /// Create a zone source from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn ZoneSource>)`: Created zone source instance
    /// - `Err(Error)`: If the type is not registered or creation fails
    pub fn create_zone_source(&self, config: &ZoneSourceConfig) -> Result<Box<dyn ZoneSource>> {
        let source_type = config.type_name();
        let sources = self.zone_sources.read().unwrap();

        let factory = sources
            .get(source_type)
            .ok_or_else(|| Error::config(format!("Unknown zone source type: {}", source_type)))?;

        factory.create(config)
    }

    /// Create a nameserver resolver from configuration
    pub fn create_resolver(
        &self,
        config: &ResolverConfig,
    ) -> Result<Box<dyn NameserverResolver>> {
        let resolver_type = config.type_name();
        let resolvers = self.resolvers.read().unwrap();

        let factory = resolvers
            .get(resolver_type)
            .ok_or_else(|| Error::config(format!("Unknown resolver type: {}", resolver_type)))?;

        factory.create(config)
    }

    /// Create a notifier from configuration
    pub fn create_notifier(&self, config: &NotifierConfig) -> Result<Box<dyn Notifier>> {
        let notifier_type = config.type_name();
        let notifiers = self.notifiers.read().unwrap();

        let factory = notifiers
            .get(notifier_type)
            .ok_or_else(|| Error::config(format!("Unknown notifier type: {}", notifier_type)))?;

        factory.create(config)
    }

    /// Create a history store from configuration
    ///
    /// The retention settings are merged into the JSON handed to the factory.
    pub async fn create_history_store(
        &self,
        config: &HistoryStoreConfig,
        retention: &RetentionConfig,
    ) -> Result<Box<dyn HistoryStore>> {
        let store_type = config.type_name();
        let stores = self.history_stores.read().unwrap();

        let factory = stores
            .get(store_type)
            .ok_or_else(|| Error::config(format!("Unknown history store type: {}", store_type)))?
            .clone();

        // Release the lock before calling async create
        drop(stores);

        factory.create(&history_factory_config(config, retention)?).await
    }

    /// List all registered zone source types
    pub fn list_zone_sources(&self) -> Vec<String> {
        let sources = self.zone_sources.read().unwrap();
        sources.keys().cloned().collect()
    }

    /// List all registered resolver types
    pub fn list_resolvers(&self) -> Vec<String> {
        let resolvers = self.resolvers.read().unwrap();
        resolvers.keys().cloned().collect()
    }

    /// List all registered notifier types
    pub fn list_notifiers(&self) -> Vec<String> {
        let notifiers = self.notifiers.read().unwrap();
        notifiers.keys().cloned().collect()
    }

    /// List all registered history store types
    pub fn list_history_stores(&self) -> Vec<String> {
        let stores = self.history_stores.read().unwrap();
        stores.keys().cloned().collect()
    }

    /// Check if a zone source type is registered
    pub fn has_zone_source(&self, name: &str) -> bool {
        let sources = self.zone_sources.read().unwrap();
        sources.contains_key(name)
    }

    /// Check if a resolver type is registered
    pub fn has_resolver(&self, name: &str) -> bool {
        let resolvers = self.resolvers.read().unwrap();
        resolvers.contains_key(name)
    }

    /// Check if a notifier type is registered
    pub fn has_notifier(&self, name: &str) -> bool {
        let notifiers = self.notifiers.read().unwrap();
        notifiers.contains_key(name)
    }

    /// Check if a history store type is registered
    pub fn has_history_store(&self, name: &str) -> bool {
        let stores = self.history_stores.read().unwrap();
        stores.contains_key(name)
    }
}

/// JSON handed to a history store factory, with retention filled in
///
/// Retention goes through [`RetentionConfig::policy`] so out-of-range ages are
/// clamped the same way for every store.
fn history_factory_config(
    config: &HistoryStoreConfig,
    retention: &RetentionConfig,
) -> Result<serde_json::Value> {
    let mut config_json = match config {
        HistoryStoreConfig::Custom { config, .. } => config.clone(),
        other => serde_json::to_value(other)?,
    };

    let policy = retention.policy();
    if let Some(object) = config_json.as_object_mut() {
        object
            .entry("max_entries")
            .or_insert_with(|| policy.max_entries.into());
        object
            .entry("max_age_days")
            .or_insert_with(|| policy.max_age.num_days().into());
    }

    Ok(config_json)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockZoneSourceFactory;

    impl ZoneSourceFactory for MockZoneSourceFactory {
        fn create(&self, _config: &ZoneSourceConfig) -> Result<Box<dyn ZoneSource>> {
            Err(Error::not_found("Mock zone source not implemented"))
        }
    }

    #[test]
    fn test_registry_registration() {
        let registry = ProviderRegistry::new();
        assert!(!registry.has_zone_source("mock"));

        registry.register_zone_source("mock", Box::new(MockZoneSourceFactory));

        assert!(registry.has_zone_source("mock"));
        assert!(registry.list_zone_sources().contains(&"mock".to_string()));
    }

    #[test]
    fn test_unknown_type_is_a_config_error() {
        let registry = ProviderRegistry::with_builtins();
        let err = registry
            .create_zone_source(&ZoneSourceConfig::Delegation)
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));
        assert!(registry.create_notifier(&NotifierConfig::Log).is_ok());
    }

    #[tokio::test]
    async fn test_builtin_history_stores() {
        let registry = ProviderRegistry::with_builtins();
        assert!(registry.has_history_store("file"));

        let store = registry
            .create_history_store(&HistoryStoreConfig::Memory, &RetentionConfig::default())
            .await
            .unwrap();
        assert!(store.list_zones().await.unwrap().is_empty());
    }

    #[test]
    fn test_history_factory_config_uses_retention_policy() {
        let retention = RetentionConfig {
            max_entries: 7,
            max_age_days: u64::MAX,
        };
        let json = history_factory_config(&HistoryStoreConfig::Memory, &retention).unwrap();

        assert_eq!(json["type"], "memory");
        assert_eq!(json["max_entries"], 7);
        assert_eq!(
            json["max_age_days"].as_i64(),
            Some(chrono::Duration::MAX.num_days())
        );

        let custom = HistoryStoreConfig::Custom {
            factory: "redis".to_string(),
            config: serde_json::json!({"url": "redis://localhost", "max_entries": 3}),
        };
        let json = history_factory_config(&custom, &RetentionConfig::default()).unwrap();
        assert_eq!(json["max_entries"], 3);
        assert_eq!(json["max_age_days"], 30);
    }

    struct MockResolverFactory;

    impl ResolverFactory for MockResolverFactory {
        fn create(&self, _config: &ResolverConfig) -> Result<Box<dyn NameserverResolver>> {
            Err(Error::resolver("Mock resolver not implemented"))
        }
    }

    #[test]
    fn test_resolver_registration() {
        let registry = ProviderRegistry::new();
        let err = registry
            .create_resolver(&ResolverConfig::System)
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));

        registry.register_resolver("system", Box::new(MockResolverFactory));
        assert!(registry.has_resolver("system"));
        assert!(registry.list_resolvers().contains(&"system".to_string()));
        assert!(matches!(
            registry.create_resolver(&ResolverConfig::System).err(),
            Some(Error::Resolver(_))
        ));
    }
}
