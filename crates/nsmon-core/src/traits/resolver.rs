// # Nameserver Resolver Trait
//
// Resolves a nameserver hostname to its A or AAAA addresses.
//
// "The host has no record of this type" is a successful empty answer. Every
// other failure is an error, which the checker records as an *unresolved*
// nameserver rather than aborting the check.

use async_trait::async_trait;
use std::net::IpAddr;

/// Address record type to resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// IPv6 address record
    Aaaa,
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordType::A => f.write_str("A"),
            RecordType::Aaaa => f.write_str("AAAA"),
        }
    }
}

/// Trait for DNS resolution implementations
///
/// Implementations must be single-shot: no retry loops and no caching beyond
/// what the underlying resolver does on its own.
#[async_trait]
pub trait NameserverResolver: Send + Sync {
    /// Resolve one record type for a hostname
    ///
    /// # Returns
    ///
    /// - `Ok(addresses)`: Possibly empty if the host has no such record
    /// - `Err(Error::Resolver)`: The lookup failed
    async fn resolve(
        &self,
        hostname: &str,
        record_type: RecordType,
    ) -> Result<Vec<IpAddr>, crate::Error>;
}

/// Helper trait for constructing resolvers from configuration
pub trait ResolverFactory: Send + Sync {
    /// Create a NameserverResolver instance from configuration
    fn create(
        &self,
        config: &crate::config::ResolverConfig,
    ) -> Result<Box<dyn NameserverResolver>, crate::Error>;
}
