//! Record resolver
//!
//! Maps a zone name to the provider's zone reference, then an FQDN to the
//! single A record the daemon manages (if any). Nothing is cached: both
//! lookups are repeated on every tick.

use crate::error::{Error, Result};
use crate::traits::{DnsProvider, DnsRecord, RecordType, ZoneRef};
use tracing::{debug, warn};

/// Looks up zones and records through a [`DnsProvider`]
pub struct RecordResolver<'a> {
    provider: &'a dyn DnsProvider,
}

impl<'a> RecordResolver<'a> {
    /// Create a resolver over a provider
    pub fn new(provider: &'a dyn DnsProvider) -> Self {
        Self { provider }
    }

    /// Resolve a zone name to the provider's zone reference
    ///
    /// Fails with [`Error::ZoneNotFound`] when the provider returns nothing
    /// and [`Error::ZoneMismatch`] when the first zone returned is not the
    /// one requested. Some provider APIs match zone names loosely, so a
    /// successful call is not enough.
    pub async fn resolve_zone(&self, zone_name: &str) -> Result<ZoneRef> {
        let zones = self
            .provider
            .list_zones(zone_name)
            .await
            .map_err(|e| self.wrap("listing zones", e))?;

        let zone = zones
            .into_iter()
            .next()
            .ok_or_else(|| Error::zone_not_found(zone_name))?;

        if !same_name(&zone.name, zone_name) {
            return Err(Error::zone_mismatch(zone_name, zone.name));
        }

        debug!(zone = %zone.name, zone_id = %zone.id, "resolved zone");
        Ok(zone)
    }

    /// Find the A record named exactly `fqdn` in a zone
    ///
    /// Returns the first exact match. Additional matches are reported with a
    /// warning and otherwise ignored.
    pub async fn find_record(&self, zone: &ZoneRef, fqdn: &str) -> Result<Option<DnsRecord>> {
        let records = self
            .provider
            .list_records(&zone.id, RecordType::A, fqdn)
            .await
            .map_err(|e| self.wrap("listing DNS records", e))?;

        let mut matches = records
            .into_iter()
            .filter(|r| r.record_type == RecordType::A.as_str() && same_name(&r.name, fqdn));

        let Some(first) = matches.next() else {
            debug!(fqdn, "no existing A record");
            return Ok(None);
        };

        let extra = matches.count();
        if extra > 0 {
            warn!(
                fqdn,
                chosen_id = %first.id,
                ignored = extra,
                "multiple A records match, using the first one"
            );
        }

        debug!(fqdn, record_id = %first.id, content = %first.content, proxied = first.proxied, "found A record");
        Ok(Some(first))
    }

    fn wrap(&self, operation: &str, err: Error) -> Error {
        match err {
            // Already classified by the provider as a provider failure
            Error::Provider { provider, message } => {
                Error::provider(provider, format!("{operation}: {message}"))
            }
            other => Error::provider(self.provider.provider_name(), format!("{operation}: {other}")),
        }
    }
}

/// DNS names compare case-insensitively, ignoring a trailing root dot
fn same_name(a: &str, b: &str) -> bool {
    let a = a.strip_suffix('.').unwrap_or(a);
    let b = b.strip_suffix('.').unwrap_or(b);
    a.eq_ignore_ascii_case(b)
}
