// # Zone Source Trait
//
// Defines the interface for listing hosted zones and their delegated nameservers.
//
// ## Implementations
//
// - Cloudflare API v4: `nsmon-zone-cloudflare` crate
// - Public DNS delegation (NS lookup): `nsmon-resolver-hickory` crate
//
// ## Usage
//
// ```rust,ignore
// use nsmon_core::ZoneSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* ZoneSource implementation */;
//
//     for zone in source.list_zones(None).await? {
//         let nameservers = source.get_nameservers(&zone).await?;
//         println!("{zone}: {nameservers:?}");
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// Trait for zone listing implementations
///
/// # Trust Level: Untrusted (Plugin)
///
/// ## Allowed Capabilities
/// - ✅ Perform network I/O against the provider API
/// - ✅ Map provider errors onto [`crate::Error`]
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off internally (the next scheduled tick is the retry)
/// - ❌ Cache results across calls
/// - ❌ Spawn background tasks
/// - ❌ Touch the history store
#[async_trait]
pub trait ZoneSource: Send + Sync {
    /// List the zones visible to this source
    ///
    /// # Parameters
    ///
    /// - `filter`: Optional zone name to match exactly
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<String>)`: Normalized zone names
    /// - `Err(Error)`: Listing failed (auth, throttling, network)
    async fn list_zones(&self, filter: Option<&str>) -> Result<Vec<String>, crate::Error>;

    /// Get the nameserver hostnames currently delegated for a zone
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<String>)`: Nameserver hostnames, in provider order
    /// - `Err(Error::NotFound)`: The zone is unknown to this source
    /// - `Err(Error)`: Any other listing failure
    async fn get_nameservers(&self, zone: &str) -> Result<Vec<String>, crate::Error>;

    /// Get the source name (for logging)
    fn source_name(&self) -> &'static str;
}

/// Helper trait for constructing zone sources from configuration
pub trait ZoneSourceFactory: Send + Sync {
    /// Create a ZoneSource instance from configuration
    fn create(
        &self,
        config: &crate::config::ZoneSourceConfig,
    ) -> Result<Box<dyn ZoneSource>, crate::Error>;
}
