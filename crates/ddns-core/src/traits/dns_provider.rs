// # DNS Provider Trait
//
// Defines the narrow capability set the core needs from a remote
// authoritative DNS provider: list zones, list records, create, update.
//
// ## Implementations
//
// - Cloudflare: `ddns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::DnsProvider;
// use ddns_core::traits::RecordType;
//
// let zones = provider.list_zones("example.com").await?;
// let records = provider
//     .list_records(&zones[0].id, RecordType::A, "home.example.com")
//     .await?;
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// TTL value meaning "provider chooses" (Cloudflare's automatic TTL)
pub const TTL_AUTO: u32 = 1;

/// Provider-side zone reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRef {
    /// Opaque zone identifier
    pub id: String,
    /// Zone name as reported by the provider
    pub name: String,
}

/// DNS record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// IPv4 address record
    A,
}

impl RecordType {
    /// Wire/API representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record as currently stored by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Opaque record identifier
    pub id: String,
    /// Fully-qualified record name
    pub name: String,
    /// Record type reported by the provider (e.g. "A")
    #[serde(rename = "type")]
    pub record_type: String,
    /// Record content (the address, for A records)
    pub content: String,
    /// Whether the provider proxies traffic for this record
    #[serde(default)]
    pub proxied: bool,
}

/// Full set of fields written by a create or update call
///
/// Updates are full replacements: every field here is sent, so drift in any
/// of them is corrected in one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordParams {
    /// Record name (relative to the zone, or the zone itself for the apex)
    pub name: String,
    /// Record type
    #[serde(rename = "type")]
    pub record_type: RecordType,
    /// Record content
    pub content: String,
    /// Proxy flag
    pub proxied: bool,
    /// TTL in seconds, [`TTL_AUTO`] for automatic
    pub ttl: u32,
    /// Free-form audit comment
    pub comment: String,
}

/// Reference to a record returned by a mutating call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRef {
    /// Opaque record identifier
    pub id: String,
    /// Fully-qualified record name
    pub name: String,
}

/// Trait for DNS provider implementations
///
/// # Contract
///
/// - One API call per method invocation.
/// - No retry, no backoff, no caching between calls.
/// - Never decides whether an update is needed; that is the engine's job.
/// - Transport/auth/listing failures are returned as errors; the caller
///   classifies them.
///
/// Implementations must be thread-safe.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// List zones whose name matches `name_filter`
    ///
    /// Providers may match loosely; callers must verify the returned name.
    async fn list_zones(&self, name_filter: &str) -> Result<Vec<ZoneRef>, crate::Error>;

    /// List records of `record_type` in a zone, filtered by exact name
    async fn list_records(
        &self,
        zone_id: &str,
        record_type: RecordType,
        name: &str,
    ) -> Result<Vec<DnsRecord>, crate::Error>;

    /// Create a new record
    async fn create_record(
        &self,
        zone_id: &str,
        params: &RecordParams,
    ) -> Result<RecordRef, crate::Error>;

    /// Replace every field of an existing record
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        params: &RecordParams,
    ) -> Result<RecordRef, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
