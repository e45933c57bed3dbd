// # hickory DNS capabilities
//
// Two capabilities backed by `hickory-resolver`:
//
// - [`HickoryResolver`]: `NameserverResolver` doing single A or AAAA lookups,
//   against the system configuration or explicit upstream resolvers
// - [`DelegationZoneSource`]: `ZoneSource` reading a zone's NS RRset from
//   public DNS, for zones whose provider has no API the monitor speaks
//
// ## Architectural Constraints
//
// Both types are single-shot. The only caching is whatever hickory does on
// its own; nothing is retried here because the checker's next tick is the retry.
//
// ## Error Mapping
//
// | hickory outcome                  | Result                   |
// |----------------------------------|--------------------------|
// | answer                           | `Ok(addresses)`          |
// | NOERROR/NODATA, NXDOMAIN         | `Ok(vec![])` (resolver)  |
// | NXDOMAIN / no NS records         | `Err(NotFound)` (source) |
// | anything else (timeout, SERVFAIL)| `Err(Resolver)`          |

use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::{ResolveError, TokioResolver};
use nsmon_core::config::{ResolverConfig as ResolverSettings, ZoneSourceConfig};
use nsmon_core::model::normalize_hostname;
use nsmon_core::traits::{
    NameserverResolver, RecordType, ResolverFactory, ZoneSource, ZoneSourceFactory,
};
use nsmon_core::{Error, Result};
use std::net::IpAddr;
use std::sync::Arc;

/// Build a tokio resolver from the host's resolv.conf
fn system_resolver() -> Result<TokioResolver> {
    let builder = TokioResolver::builder_tokio()
        .map_err(|e| Error::config(format!("Failed to read system resolver config: {}", e)))?;
    Ok(builder.build())
}

fn configured_resolver(config: ResolverConfig) -> TokioResolver {
    TokioResolver::builder_with_config(config, TokioConnectionProvider::default()).build()
}

/// Whether hickory is telling us the name simply has no such data
fn is_empty_answer(err: &ResolveError) -> bool {
    err.is_no_records_found() || err.is_nx_domain()
}

/// A/AAAA resolver backed by hickory
#[derive(Clone)]
pub struct HickoryResolver {
    inner: Arc<TokioResolver>,
}

impl std::fmt::Debug for HickoryResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HickoryResolver").finish_non_exhaustive()
    }
}

impl HickoryResolver {
    /// Use the system resolver configuration
    pub fn from_system_conf() -> Result<Self> {
        Ok(Self {
            inner: Arc::new(system_resolver()?),
        })
    }

    /// Use an explicit upstream configuration
    pub fn with_config(config: ResolverConfig) -> Self {
        Self {
            inner: Arc::new(configured_resolver(config)),
        }
    }

    /// Query the given recursive resolvers on port 53
    pub fn with_upstream(nameservers: &[IpAddr]) -> Self {
        let group = NameServerConfigGroup::from_ips_clear(nameservers, 53, true);
        Self::with_config(ResolverConfig::from_parts(None, Vec::new(), group))
    }
}

#[async_trait]
impl NameserverResolver for HickoryResolver {
    async fn resolve(&self, hostname: &str, record_type: RecordType) -> Result<Vec<IpAddr>> {
        let name = format!("{}.", normalize_hostname(hostname));

        let result = match record_type {
            RecordType::A => self
                .inner
                .ipv4_lookup(name.as_str())
                .await
                .map(|lookup| lookup.iter().map(|a| IpAddr::V4(a.0)).collect::<Vec<_>>()),
            RecordType::Aaaa => self
                .inner
                .ipv6_lookup(name.as_str())
                .await
                .map(|lookup| lookup.iter().map(|aaaa| IpAddr::V6(aaaa.0)).collect::<Vec<_>>()),
        };

        match result {
            Ok(addresses) => {
                tracing::trace!(hostname, %record_type, count = addresses.len(), "Resolved");
                Ok(addresses)
            }
            Err(e) if is_empty_answer(&e) => Ok(Vec::new()),
            Err(e) => Err(Error::resolver(format!(
                "{} lookup for {} failed: {}",
                record_type, hostname, e
            ))),
        }
    }
}

/// Zone source reading delegations from public DNS
///
/// It cannot enumerate zones, so `list_zones` only echoes the filter back
/// when that name has an NS RRset.
#[derive(Clone)]
pub struct DelegationZoneSource {
    inner: Arc<TokioResolver>,
}

impl std::fmt::Debug for DelegationZoneSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegationZoneSource").finish_non_exhaustive()
    }
}

impl DelegationZoneSource {
    /// Use the system resolver configuration
    pub fn from_system_conf() -> Result<Self> {
        Ok(Self {
            inner: Arc::new(system_resolver()?),
        })
    }

    /// Use an explicit upstream configuration
    pub fn with_config(config: ResolverConfig) -> Self {
        Self {
            inner: Arc::new(configured_resolver(config)),
        }
    }
}

#[async_trait]
impl ZoneSource for DelegationZoneSource {
    async fn list_zones(&self, filter: Option<&str>) -> Result<Vec<String>> {
        let Some(zone) = filter else {
            return Err(Error::invalid_input(
                "DNS delegation cannot enumerate zones without a filter",
            ));
        };

        match self.get_nameservers(zone).await {
            Ok(_) => Ok(vec![normalize_hostname(zone)]),
            Err(Error::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn get_nameservers(&self, zone: &str) -> Result<Vec<String>> {
        let zone = normalize_hostname(zone);
        let fqdn = format!("{}.", zone);

        match self.inner.ns_lookup(fqdn.as_str()).await {
            Ok(lookup) => {
                let nameservers: Vec<String> = lookup
                    .iter()
                    .map(|ns| normalize_hostname(&ns.0.to_utf8()))
                    .collect();
                tracing::debug!(zone = %zone, ?nameservers, "Fetched delegation");
                Ok(nameservers)
            }
            Err(e) if is_empty_answer(&e) => {
                Err(Error::not_found(format!("No NS records for zone: {}", zone)))
            }
            Err(e) => Err(Error::zone_source(format!(
                "NS lookup for {} failed: {}",
                zone, e
            ))),
        }
    }

    fn source_name(&self) -> &'static str {
        "delegation"
    }
}

/// Factory for the DNS delegation zone source
pub struct DelegationFactory;

impl ZoneSourceFactory for DelegationFactory {
    fn create(&self, config: &ZoneSourceConfig) -> Result<Box<dyn ZoneSource>> {
        match config {
            ZoneSourceConfig::Delegation => Ok(Box::new(DelegationZoneSource::from_system_conf()?)),
            _ => Err(Error::config("Invalid config for delegation zone source")),
        }
    }
}

/// Factory for the `system` and `upstream` resolvers
pub struct HickoryResolverFactory;

impl ResolverFactory for HickoryResolverFactory {
    fn create(&self, config: &ResolverSettings) -> Result<Box<dyn NameserverResolver>> {
        match config {
            ResolverSettings::System => Ok(Box::new(HickoryResolver::from_system_conf()?)),
            ResolverSettings::Upstream { nameservers } if !nameservers.is_empty() => {
                Ok(Box::new(HickoryResolver::with_upstream(nameservers)))
            }
            ResolverSettings::Upstream { .. } => Err(Error::config(
                "Upstream resolver needs at least one nameserver",
            )),
            _ => Err(Error::config("Invalid config for hickory resolver")),
        }
    }
}

/// Register the delegation zone source and the hickory resolvers with a registry
pub fn register(registry: &nsmon_core::ProviderRegistry) {
    registry.register_zone_source("delegation", Box::new(DelegationFactory));
    registry.register_resolver("system", Box::new(HickoryResolverFactory));
    registry.register_resolver("upstream", Box::new(HickoryResolverFactory));
}
