//! Test doubles and common utilities for architecture contract tests
//!
//! The doubles are scriptable from the test body and count every call, so a
//! test can change what the "world" looks like between two checks and then
//! assert on what the core did about it.

#![allow(dead_code)]

use nsmon_core::error::{Error, Result};
use nsmon_core::model::{AlertPayload, HistoryEntry};
use nsmon_core::traits::{HistoryStore, NameserverResolver, Notifier, RecordType, ZoneSource};
use nsmon_core::{ZoneChecker, ZoneConfig};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How long a "hanging" call sleeps; always longer than any test timeout
pub const HANG: Duration = Duration::from_secs(3600);

/// Scripted answer for one zone or nameserver
#[derive(Debug, Clone)]
pub enum Script<T> {
    Answer(T),
    Fail(String),
    Hang,
}

/// A zone source whose answers are set by the test
#[derive(Default)]
pub struct ScriptedZoneSource {
    zones: Mutex<HashMap<String, Script<Vec<String>>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedZoneSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delegate `zone` to the given nameservers
    pub fn set_nameservers(&self, zone: &str, nameservers: &[&str]) {
        self.zones.lock().unwrap().insert(
            zone.to_string(),
            Script::Answer(nameservers.iter().map(|ns| ns.to_string()).collect()),
        );
    }

    /// Make listing `zone` fail
    pub fn fail(&self, zone: &str, message: &str) {
        self.zones
            .lock()
            .unwrap()
            .insert(zone.to_string(), Script::Fail(message.to_string()));
    }

    /// Make listing `zone` never return
    pub fn hang(&self, zone: &str) {
        self.zones.lock().unwrap().insert(zone.to_string(), Script::Hang);
    }

    /// Number of get_nameservers() calls for `zone`
    pub fn call_count(&self, zone: &str) -> usize {
        self.calls.lock().unwrap().get(zone).copied().unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl ZoneSource for ScriptedZoneSource {
    async fn list_zones(&self, filter: Option<&str>) -> Result<Vec<String>> {
        let zones = self.zones.lock().unwrap();
        let mut names: Vec<String> = zones
            .keys()
            .filter(|zone| filter.is_none_or(|f| f == zone.as_str()))
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }

    async fn get_nameservers(&self, zone: &str) -> Result<Vec<String>> {
        *self.calls.lock().unwrap().entry(zone.to_string()).or_default() += 1;

        let script = self.zones.lock().unwrap().get(zone).cloned();
        match script {
            Some(Script::Answer(nameservers)) => Ok(nameservers),
            Some(Script::Fail(message)) => Err(Error::rate_limited(message)),
            Some(Script::Hang) => {
                tokio::time::sleep(HANG).await;
                Ok(vec![])
            }
            None => Err(Error::not_found(format!("Zone not found: {}", zone))),
        }
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// A resolver whose answers are set by the test
#[derive(Default)]
pub struct ScriptedResolver {
    hosts: Mutex<HashMap<String, Script<Vec<IpAddr>>>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `hostname` to these addresses (A and AAAA split by family)
    pub fn set(&self, hostname: &str, addresses: &[&str]) {
        self.hosts
            .lock()
            .unwrap()
            .insert(hostname.to_string(), Script::Answer(ips(addresses)));
    }

    /// Make every lookup for `hostname` fail
    pub fn fail(&self, hostname: &str) {
        self.hosts
            .lock()
            .unwrap()
            .insert(hostname.to_string(), Script::Fail("SERVFAIL".to_string()));
    }

    /// Make every lookup for `hostname` never return
    pub fn hang(&self, hostname: &str) {
        self.hosts.lock().unwrap().insert(hostname.to_string(), Script::Hang);
    }

    /// Delay every answer by `delay`
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Number of resolve() calls
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl NameserverResolver for ScriptedResolver {
    async fn resolve(&self, hostname: &str, record_type: RecordType) -> Result<Vec<IpAddr>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let script = self.hosts.lock().unwrap().get(hostname).cloned();
        match script {
            Some(Script::Answer(addresses)) => Ok(addresses
                .into_iter()
                .filter(|ip| match record_type {
                    RecordType::A => ip.is_ipv4(),
                    RecordType::Aaaa => ip.is_ipv6(),
                })
                .collect()),
            Some(Script::Fail(message)) => Err(Error::resolver(message)),
            Some(Script::Hang) => {
                tokio::time::sleep(HANG).await;
                Ok(vec![])
            }
            None => Err(Error::resolver(format!("NXDOMAIN: {}", hostname))),
        }
    }
}

/// A notifier that records every payload it is given
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<AlertPayload>>,
    resolutions: Mutex<Vec<(String, String)>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delivery fail from now on
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Alerts delivered so far
    pub fn sent(&self) -> Vec<AlertPayload> {
        self.sent.lock().unwrap().clone()
    }

    /// (entry id, actor) pairs of resolution follow-ups delivered so far
    pub fn resolutions(&self) -> Vec<(String, String)> {
        self.resolutions.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, payload: &AlertPayload) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::notifier("webhook returned 500"));
        }
        self.sent.lock().unwrap().push(payload.clone());
        Ok(())
    }

    async fn send_resolution(&self, entry: &HistoryEntry, actor: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::notifier("webhook returned 500"));
        }
        self.resolutions
            .lock()
            .unwrap()
            .push((entry.id.clone(), actor.to_string()));
        Ok(())
    }

    fn notifier_name(&self) -> &'static str {
        "recording"
    }
}

/// Parse a list of addresses
pub fn ips(addresses: &[&str]) -> Vec<IpAddr> {
    addresses
        .iter()
        .map(|ip| ip.parse().expect("valid test address"))
        .collect()
}

/// Everything a checker test needs, shared with the checker
pub struct Harness {
    pub source: Arc<ScriptedZoneSource>,
    pub resolver: Arc<ScriptedResolver>,
    pub notifier: Arc<RecordingNotifier>,
    pub store: Arc<dyn HistoryStore>,
}

impl Harness {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self {
            source: Arc::new(ScriptedZoneSource::new()),
            resolver: Arc::new(ScriptedResolver::new()),
            notifier: Arc::new(RecordingNotifier::new()),
            store,
        }
    }

    pub fn with_memory_store() -> Self {
        Self::new(Arc::new(nsmon_core::MemoryHistoryStore::new()))
    }

    /// A checker wired to this harness's doubles
    pub fn checker(&self) -> ZoneChecker {
        ZoneChecker::new(
            self.source.clone(),
            self.resolver.clone(),
            self.store.clone(),
            self.notifier.clone(),
        )
    }
}

/// Zone configuration with a fixed poll interval
pub fn zone(name: &str, interval_secs: u64) -> ZoneConfig {
    ZoneConfig::new(name)
        .with_environment("prod")
        .with_poll_interval(Duration::from_secs(interval_secs))
}
