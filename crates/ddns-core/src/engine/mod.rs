//! Convergence engine
//!
//! The engine compares the desired record state against what the provider
//! currently holds and issues at most one mutating call to close the gap.
//!
//! ## Flow
//!
//! ```text
//!            ┌────────────────┐
//!  zone ───▶ │ RecordResolver │ ──▶ ZoneRef, Option<DnsRecord>
//!            └────────────────┘
//!                                      │
//!                                      ▼
//!                               ┌──────────────┐
//!   DesiredState, ip ─────────▶ │   decide()   │ ──▶ NoOp | Create | Update(id)
//!                               └──────────────┘
//!                                      │
//!                                      ▼
//!                              ┌──────────────┐
//!                              │ DnsProvider  │  (0 or 1 call)
//!                              └──────────────┘
//! ```

use crate::config::DesiredState;
use crate::error::{Error, Result};
use crate::resolver::RecordResolver;
use crate::traits::{DnsProvider, DnsRecord, RecordParams, RecordType, TTL_AUTO};
use chrono::SecondsFormat;
use std::fmt;
use std::net::Ipv4Addr;
use tracing::{debug, info};

/// What a reconciliation has to do to converge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvergenceDecision {
    /// Record already matches
    NoOp,
    /// No record exists yet
    Create,
    /// Record exists but differs; carries its provider id
    Update(String),
}

impl ConvergenceDecision {
    /// Whether executing this decision calls the provider
    pub fn is_mutation(&self) -> bool {
        !matches!(self, ConvergenceDecision::NoOp)
    }
}

impl fmt::Display for ConvergenceDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvergenceDecision::NoOp => f.write_str("no-op"),
            ConvergenceDecision::Create => f.write_str("create"),
            ConvergenceDecision::Update(id) => write!(f, "update({id})"),
        }
    }
}

/// Decide how to converge `observed` towards `desired` and `ip`
///
/// Both the address and the proxy flag must match for a no-op. A record
/// whose content is not an IPv4 address never matches.
pub fn decide(
    desired: &DesiredState,
    observed: Option<&DnsRecord>,
    ip: Ipv4Addr,
) -> ConvergenceDecision {
    let Some(record) = observed else {
        return ConvergenceDecision::Create;
    };

    let same_ip = record.content.parse::<Ipv4Addr>().is_ok_and(|c| c == ip);
    if same_ip && record.proxied == desired.proxied {
        ConvergenceDecision::NoOp
    } else {
        ConvergenceDecision::Update(record.id.clone())
    }
}

/// Result of one reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Decision taken
    pub decision: ConvergenceDecision,
    /// Record that was observed before acting, if any
    pub previous: Option<DnsRecord>,
    /// Fully-qualified record name
    pub fqdn: String,
    /// Address written (or confirmed)
    pub ip: Ipv4Addr,
    /// True when the mutation was skipped because of dry-run mode
    pub dry_run: bool,
}

/// Runs one resolve → decide → execute pass against a provider
pub struct Reconciler<'a> {
    provider: &'a dyn DnsProvider,
    dry_run: bool,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler over a provider
    pub fn new(provider: &'a dyn DnsProvider) -> Self {
        Self {
            provider,
            dry_run: false,
        }
    }

    /// Skip mutating calls and only log what would change
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Converge the provider's record towards `desired` with address `ip`
    ///
    /// Issues exactly one create/update call when the record diverges and
    /// none when it already matches. Failures are returned, never retried.
    pub async fn reconcile(&self, desired: &DesiredState, ip: Ipv4Addr) -> Result<ReconcileOutcome> {
        let resolver = RecordResolver::new(self.provider);
        let fqdn = desired.fqdn();

        let zone = resolver.resolve_zone(&desired.zone).await?;
        let observed = resolver.find_record(&zone, &fqdn).await?;

        let decision = decide(desired, observed.as_ref(), ip);
        debug!(%fqdn, %decision, "convergence decision");

        let outcome = ReconcileOutcome {
            decision: decision.clone(),
            previous: observed,
            fqdn,
            ip,
            dry_run: self.dry_run && decision.is_mutation(),
        };

        if !decision.is_mutation() {
            info!(fqdn = %outcome.fqdn, %ip, "IP address has not changed");
            return Ok(outcome);
        }

        let params = record_params(desired, ip);

        if self.dry_run {
            info!(
                fqdn = %outcome.fqdn,
                %decision,
                payload = %serde_json::to_string(&params)?,
                "[DRY-RUN] would modify DNS record"
            );
            return Ok(outcome);
        }

        match &decision {
            ConvergenceDecision::Create => {
                let created = self
                    .provider
                    .create_record(&zone.id, &params)
                    .await
                    .map_err(|e| Error::mutation("creating DNS record", e.to_string()))?;
                info!(fqdn = %outcome.fqdn, record_id = %created.id, %ip, proxied = params.proxied, "created DNS record");
            }
            ConvergenceDecision::Update(record_id) => {
                self.provider
                    .update_record(&zone.id, record_id, &params)
                    .await
                    .map_err(|e| Error::mutation("updating DNS record", e.to_string()))?;
                info!(
                    fqdn = %outcome.fqdn,
                    %record_id,
                    %ip,
                    previous = outcome.previous.as_ref().map(|r| r.content.as_str()).unwrap_or_default(),
                    proxied = params.proxied,
                    "updated DNS record"
                );
            }
            ConvergenceDecision::NoOp => {}
        }

        Ok(outcome)
    }
}

/// Build the full-replace payload for create/update
fn record_params(desired: &DesiredState, ip: Ipv4Addr) -> RecordParams {
    RecordParams {
        name: desired.record_name().to_string(),
        record_type: RecordType::A,
        content: ip.to_string(),
        proxied: desired.proxied,
        ttl: TTL_AUTO,
        comment: format!(
            "Updated by ddnsd on {}",
            chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
        ),
    }
}

/// Events emitted by the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Scheduler started
    Started {
        /// Fully-qualified record name being managed
        fqdn: String,
    },

    /// Public IP discovered
    IpDiscovered {
        /// Discovered address
        ip: Ipv4Addr,
    },

    /// A reconciliation tick completed
    Reconciled {
        /// Tick number, starting at 1
        tick: u64,
        /// What the tick did
        decision: ConvergenceDecision,
    },

    /// Scheduler stopped without error
    Stopped {
        /// Human-readable reason
        reason: String,
    },
}
