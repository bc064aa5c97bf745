// # ddns-core
//
// Core library for the single-record dynamic DNS daemon.
//
// ## Architecture Overview
//
// This library keeps one A record at a remote DNS provider pointed at the
// host's public IPv4 address:
// - **IpSource**: Trait for discovering the current public address
// - **DnsProvider**: Trait for the provider's zone/record API
// - **RecordResolver**: Zone and record lookup with exact-name checks
// - **Reconciler**: Decides no-op/create/update and performs at most one mutation
// - **Scheduler**: Runs the reconciler immediately, then on an interval
//
// ## Design Principles
//
// 1. **Stateless between ticks**: the provider is the only source of truth
// 2. **Fail fast**: every error is returned to the caller, nothing retries
// 3. **Library-First**: the daemon is a thin driver over this crate
// 4. **Idempotency**: reconciling twice with the same inputs mutates at most once

pub mod traits;
pub mod engine;
pub mod resolver;
pub mod scheduler;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{IpSource, DnsProvider};
pub use engine::{ConvergenceDecision, EngineEvent, ReconcileOutcome, Reconciler, decide};
pub use resolver::RecordResolver;
pub use scheduler::{RunSummary, Scheduler, StopReason};
pub use config::{DdnsConfig, DesiredState, EngineConfig, IpRefresh};
pub use error::{Error, Result};
