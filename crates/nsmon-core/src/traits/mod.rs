//! Core traits for the nameserver monitor
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`ZoneSource`]: List zones and their delegated nameservers
//! - [`NameserverResolver`]: Resolve nameserver hostnames to addresses
//! - [`Notifier`]: Deliver alerts and resolution follow-ups
//! - [`HistoryStore`]: Current snapshot and bounded change log per zone

pub mod history_store;
pub mod notifier;
pub mod resolver;
pub mod zone_source;

pub use history_store::{AckOutcome, HistoryStore, HistoryStoreFactory, ZoneGuard};
pub use notifier::{Notifier, NotifierFactory};
pub use resolver::{NameserverResolver, RecordType, ResolverFactory};
pub use zone_source::{ZoneSource, ZoneSourceFactory};
