// # nsmon-core
//
// Core library for the hosted-zone nameserver monitor.
//
// ## Architecture Overview
//
// This library owns the change-detection and history-reconciliation core:
// - **ZoneSource**: Trait for listing zones and their delegated nameservers
// - **NameserverResolver**: Trait for resolving nameserver hostnames to A/AAAA addresses
// - **Notifier**: Trait for delivering alerts and resolution follow-ups
// - **HistoryStore**: Trait for the per-zone current snapshot and bounded change log
// - **compare**: Pure snapshot comparator
// - **ZoneChecker**: One check of one zone (fetch → compare → record → notify)
// - **ZoneScheduler**: One independent timer per zone
// - **AckHandler**: Resolution callbacks → acknowledged history entries
// - **ProviderRegistry**: Plugin-based registry for capability implementations
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Detection logic is separate from cloud/DNS/chat integrations
// 2. **Per-Zone Isolation**: A slow or failing zone never delays another zone
// 3. **Plugin-Based**: Capabilities are registered dynamically, no hard-coded if-else
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Restart Safety**: Persisted history means a restart never re-baselines a zone

pub mod ack;
pub mod checker;
pub mod compare;
pub mod config;
pub mod error;
pub mod history;
pub mod model;
pub mod registry;
pub mod scheduler;
pub mod traits;

// Re-export core types for convenience
pub use ack::{AckHandler, AckResult};
pub use checker::{CheckEvent, CheckOutcome, LogNotifier, ZoneChecker};
pub use compare::compare;
pub use config::{
    MonitorConfig, NotifierConfig, Priority, ResolverConfig, ZoneConfig, ZoneSourceConfig,
};
pub use error::{Error, Result};
pub use history::{FileHistoryStore, MemoryHistoryStore, RetentionPolicy};
pub use model::{
    AckState, AlertPayload, ChangeResult, HistoryEntry, NameserverChange, NameserverRecord,
    ZoneSnapshot,
};
pub use registry::ProviderRegistry;
pub use scheduler::ZoneScheduler;
pub use traits::{HistoryStore, NameserverResolver, Notifier, ZoneSource};
