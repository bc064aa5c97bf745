//! Test doubles and common utilities for contract tests
//!
//! The in-memory provider behaves like a small authoritative provider: it
//! owns zones and records, counts calls, and can be told to fail.

#![allow(dead_code)]

use ddns_core::config::{DdnsConfig, DesiredState};
use ddns_core::error::{Error, Result};
use ddns_core::traits::{
    DnsProvider, DnsRecord, IpSource, RecordParams, RecordRef, RecordType, ZoneRef,
};
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// An IP source that always returns the same address
pub struct FixedIpSource {
    ip: Ipv4Addr,
    discover_call_count: Arc<AtomicUsize>,
}

impl FixedIpSource {
    pub fn new(ip: Ipv4Addr) -> Self {
        Self {
            ip,
            discover_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get the number of times discover() was called
    pub fn discover_call_count(&self) -> usize {
        self.discover_call_count.load(Ordering::SeqCst)
    }

    /// Create a new FixedIpSource that shares counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            ip: other.ip,
            discover_call_count: Arc::clone(&other.discover_call_count),
        }
    }
}

#[async_trait::async_trait]
impl IpSource for FixedIpSource {
    async fn discover(&self) -> Result<Ipv4Addr> {
        self.discover_call_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.ip)
    }

    fn source_name(&self) -> &'static str {
        "fixed"
    }
}

/// An IP source that walks through a list of addresses, repeating the last
pub struct SequenceIpSource {
    ips: Mutex<VecDeque<Ipv4Addr>>,
    last: Mutex<Option<Ipv4Addr>>,
}

impl SequenceIpSource {
    pub fn new(ips: impl IntoIterator<Item = Ipv4Addr>) -> Self {
        Self {
            ips: Mutex::new(ips.into_iter().collect()),
            last: Mutex::new(None),
        }
    }
}

#[async_trait::async_trait]
impl IpSource for SequenceIpSource {
    async fn discover(&self) -> Result<Ipv4Addr> {
        let next = self.ips.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(ip) = next {
            *last = Some(ip);
        }
        last.ok_or_else(|| Error::discovery("sequence exhausted"))
    }

    fn source_name(&self) -> &'static str {
        "sequence"
    }
}

/// An IP source that always fails
pub struct FailingIpSource;

#[async_trait::async_trait]
impl IpSource for FailingIpSource {
    async fn discover(&self) -> Result<Ipv4Addr> {
        Err(Error::discovery("could not determine IP address: not-an-ip"))
    }

    fn source_name(&self) -> &'static str {
        "failing"
    }
}

#[derive(Default)]
struct ProviderState {
    zones: Vec<ZoneRef>,
    records: Vec<(String, DnsRecord)>,
    next_id: usize,
    mutations: Vec<RecordParams>,
    fail_listing: Option<String>,
    fail_mutations: Option<String>,
}

/// An in-memory DnsProvider that tracks calls
pub struct InMemoryProvider {
    state: Arc<Mutex<ProviderState>>,
    list_zones_call_count: Arc<AtomicUsize>,
    list_records_call_count: Arc<AtomicUsize>,
    create_call_count: Arc<AtomicUsize>,
    update_call_count: Arc<AtomicUsize>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ProviderState::default())),
            list_zones_call_count: Arc::new(AtomicUsize::new(0)),
            list_records_call_count: Arc::new(AtomicUsize::new(0)),
            create_call_count: Arc::new(AtomicUsize::new(0)),
            update_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Provider holding a single zone with the given name
    pub fn with_zone(zone: &str) -> Self {
        let provider = Self::new();
        provider.add_zone(&format!("zone-{zone}"), zone);
        provider
    }

    /// Create a new InMemoryProvider that shares state with an existing one
    pub fn sharing_state_with(other: &Self) -> Self {
        Self {
            state: Arc::clone(&other.state),
            list_zones_call_count: Arc::clone(&other.list_zones_call_count),
            list_records_call_count: Arc::clone(&other.list_records_call_count),
            create_call_count: Arc::clone(&other.create_call_count),
            update_call_count: Arc::clone(&other.update_call_count),
        }
    }

    pub fn add_zone(&self, id: &str, name: &str) {
        self.state.lock().unwrap().zones.push(ZoneRef {
            id: id.to_string(),
            name: name.to_string(),
        });
    }

    /// Insert an A record directly, bypassing the call counters
    pub fn seed_record(&self, zone_id: &str, fqdn: &str, content: &str, proxied: bool) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("rec-{}", state.next_id);
        state.records.push((
            zone_id.to_string(),
            DnsRecord {
                id: id.clone(),
                name: fqdn.to_string(),
                record_type: "A".to_string(),
                content: content.to_string(),
                proxied,
            },
        ));
        id
    }

    /// All records currently stored for a name
    pub fn records_named(&self, fqdn: &str) -> Vec<DnsRecord> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|(_, r)| r.name == fqdn)
            .map(|(_, r)| r.clone())
            .collect()
    }

    /// Payloads of every create/update call, in order
    pub fn mutations(&self) -> Vec<RecordParams> {
        self.state.lock().unwrap().mutations.clone()
    }

    pub fn fail_listing_with(&self, message: &str) {
        self.state.lock().unwrap().fail_listing = Some(message.to_string());
    }

    pub fn fail_mutations_with(&self, message: &str) {
        self.state.lock().unwrap().fail_mutations = Some(message.to_string());
    }

    pub fn list_zones_call_count(&self) -> usize {
        self.list_zones_call_count.load(Ordering::SeqCst)
    }

    pub fn list_records_call_count(&self) -> usize {
        self.list_records_call_count.load(Ordering::SeqCst)
    }

    pub fn create_call_count(&self) -> usize {
        self.create_call_count.load(Ordering::SeqCst)
    }

    pub fn update_call_count(&self) -> usize {
        self.update_call_count.load(Ordering::SeqCst)
    }

    pub fn mutation_count(&self) -> usize {
        self.create_call_count() + self.update_call_count()
    }
}

fn absolute_name(name: &str, zone: &str) -> String {
    if name == zone || name.ends_with(&format!(".{zone}")) {
        name.to_string()
    } else {
        format!("{name}.{zone}")
    }
}

#[async_trait::async_trait]
impl DnsProvider for InMemoryProvider {
    async fn list_zones(&self, name_filter: &str) -> Result<Vec<ZoneRef>> {
        self.list_zones_call_count.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        if let Some(message) = &state.fail_listing {
            return Err(Error::auth(message.clone()));
        }
        // Loose substring match, like some real provider APIs
        Ok(state
            .zones
            .iter()
            .filter(|z| z.name.contains(name_filter))
            .cloned()
            .collect())
    }

    async fn list_records(
        &self,
        zone_id: &str,
        record_type: RecordType,
        name: &str,
    ) -> Result<Vec<DnsRecord>> {
        self.list_records_call_count.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        if let Some(message) = &state.fail_listing {
            return Err(Error::auth(message.clone()));
        }
        Ok(state
            .records
            .iter()
            .filter(|(z, r)| z == zone_id && r.record_type == record_type.as_str() && r.name == name)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn create_record(&self, zone_id: &str, params: &RecordParams) -> Result<RecordRef> {
        self.create_call_count.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.fail_mutations {
            return Err(Error::rate_limited(message.clone()));
        }

        let zone_name = state
            .zones
            .iter()
            .find(|z| z.id == zone_id)
            .map(|z| z.name.clone())
            .ok_or_else(|| Error::not_found(format!("zone {zone_id}")))?;

        state.next_id += 1;
        let id = format!("rec-{}", state.next_id);
        let name = absolute_name(&params.name, &zone_name);
        state.records.push((
            zone_id.to_string(),
            DnsRecord {
                id: id.clone(),
                name: name.clone(),
                record_type: params.record_type.as_str().to_string(),
                content: params.content.clone(),
                proxied: params.proxied,
            },
        ));
        state.mutations.push(params.clone());

        Ok(RecordRef { id, name })
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        params: &RecordParams,
    ) -> Result<RecordRef> {
        self.update_call_count.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.fail_mutations {
            return Err(Error::rate_limited(message.clone()));
        }

        let zone_name = state
            .zones
            .iter()
            .find(|z| z.id == zone_id)
            .map(|z| z.name.clone())
            .ok_or_else(|| Error::not_found(format!("zone {zone_id}")))?;
        let name = absolute_name(&params.name, &zone_name);

        let (_, record) = state
            .records
            .iter_mut()
            .find(|(z, r)| z == zone_id && r.id == record_id)
            .ok_or_else(|| Error::not_found(format!("record {record_id}")))?;

        record.name = name.clone();
        record.record_type = params.record_type.as_str().to_string();
        record.content = params.content.clone();
        record.proxied = params.proxied;
        state.mutations.push(params.clone());

        Ok(RecordRef {
            id: record_id.to_string(),
            name,
        })
    }

    fn provider_name(&self) -> &'static str {
        "in-memory"
    }
}

pub fn ip(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

/// Helper to create a minimal DdnsConfig for testing
pub fn minimal_config(name: &str, zone: &str, proxied: bool) -> DdnsConfig {
    let mut config = DdnsConfig::new(DesiredState::new(name, zone, proxied));
    config.engine.interval = Duration::from_secs(300);
    config.engine.event_channel_capacity = 256;
    config
}
