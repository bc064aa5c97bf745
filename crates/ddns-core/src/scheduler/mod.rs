//! Polling scheduler
//!
//! Drives the [`Reconciler`] once immediately and then on a fixed interval
//! until the shutdown future resolves, or stops after the first pass in
//! one-shot mode.
//!
//! ## States
//!
//! ```text
//! Idle ──run_until()──▶ Running ──shutdown──────▶ Stopped(Signal)
//!                          │    ──once done─────▶ Stopped(OneShot)
//!                          └────any error───────▶ Err(_)  (fatal)
//! ```
//!
//! Ticks never overlap: the loop waits on either the timer or the shutdown
//! future, and only between completed reconciliations. Shutdown never
//! interrupts a reconciliation that is already running.

use crate::config::{DdnsConfig, DesiredState, IpRefresh};
use crate::engine::{EngineEvent, Reconciler};
use crate::error::Result;
use crate::traits::{DnsProvider, IpSource};
use std::future::Future;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Why the scheduler stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Shutdown future resolved
    Signal,
    /// One-shot mode finished its single pass
    OneShot,
}

/// Summary of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Number of reconciliations performed
    pub ticks: u64,
    /// Why the run ended
    pub stop_reason: StopReason,
    /// Last address used for reconciliation
    pub last_ip: Ipv4Addr,
}

/// Reconciliation scheduler
///
/// Owns the IP source and the provider. Errors are returned to the caller,
/// which decides what to do with the process.
pub struct Scheduler {
    /// IP source for discovering the public address
    ip_source: Box<dyn IpSource>,

    /// DNS provider holding the record
    provider: Box<dyn DnsProvider>,

    /// Target record state
    desired: DesiredState,

    /// Interval between reconciliations
    interval: Duration,

    /// Stop after the first reconciliation
    once: bool,

    /// IP discovery policy
    ip_refresh: IpRefresh,

    /// Skip mutating calls
    dry_run: bool,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl Scheduler {
    /// Create a new scheduler
    ///
    /// Validates the configuration before anything touches the network.
    ///
    /// # Returns
    ///
    /// A tuple of (scheduler, event_receiver) where event_receiver yields engine events
    pub fn new(
        ip_source: Box<dyn IpSource>,
        provider: Box<dyn DnsProvider>,
        config: DdnsConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let scheduler = Self {
            ip_source,
            provider,
            desired: config.desired,
            interval: config.engine.interval,
            once: config.engine.once,
            ip_refresh: config.engine.ip_refresh,
            dry_run: config.engine.dry_run,
            event_tx: tx,
        };

        Ok((scheduler, rx))
    }

    /// Run until `shutdown` resolves (or after one pass in one-shot mode)
    ///
    /// # Returns
    ///
    /// - `Ok(RunSummary)`: Clean stop
    /// - `Err(Error)`: First discovery or reconciliation failure
    pub async fn run_until<F>(&self, shutdown: F) -> Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        self.emit_event(EngineEvent::Started {
            fqdn: self.desired.fqdn(),
        });

        let mut ip = self.discover().await?;
        let mut ticks = 0;

        self.tick(&mut ticks, ip).await?;

        if self.once {
            return Ok(self.stopped(ticks, StopReason::OneShot, ip));
        }

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutting down due to signal");
                    return Ok(self.stopped(ticks, StopReason::Signal, ip));
                }

                _ = ticker.tick() => {
                    if self.ip_refresh == IpRefresh::EveryTick {
                        ip = self.discover().await?;
                    }
                    self.tick(&mut ticks, ip).await?;
                }
            }
        }
    }

    async fn discover(&self) -> Result<Ipv4Addr> {
        let ip = self.ip_source.discover().await?;
        info!(source = self.ip_source.source_name(), %ip, "discovered public IP");
        self.emit_event(EngineEvent::IpDiscovered { ip });
        Ok(ip)
    }

    async fn tick(&self, ticks: &mut u64, ip: Ipv4Addr) -> Result<()> {
        *ticks += 1;
        debug!(tick = *ticks, %ip, "reconciling");

        let outcome = Reconciler::new(self.provider.as_ref())
            .with_dry_run(self.dry_run)
            .reconcile(&self.desired, ip)
            .await?;

        self.emit_event(EngineEvent::Reconciled {
            tick: *ticks,
            decision: outcome.decision,
        });
        Ok(())
    }

    fn stopped(&self, ticks: u64, stop_reason: StopReason, last_ip: Ipv4Addr) -> RunSummary {
        let reason = match stop_reason {
            StopReason::Signal => "Shutdown signal",
            StopReason::OneShot => "One-shot run complete",
        };
        self.emit_event(EngineEvent::Stopped {
            reason: reason.to_string(),
        });

        RunSummary {
            ticks,
            stop_reason,
            last_ip,
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // Never block the loop on a slow consumer
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
