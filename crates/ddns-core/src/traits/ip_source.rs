// # IP Source Trait
//
// Defines the interface for discovering the host's current public IPv4 address.
//
// ## Implementations
//
// - DNS who-am-I (TXT/CHAOS query): `ddns-ip-whoami` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::IpSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* IpSource implementation */;
//
//     let ip = source.discover().await?;
//     println!("public address: {ip}");
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Trait for IP source implementations
///
/// # Contract
///
/// - One network exchange per call, no retry. Retry policy belongs to
///   whoever drives the scheduler; the scheduler itself fails fast.
/// - Any failure (transport error, empty answer, payload that is not an
///   IPv4 address) is reported as [`crate::Error::Discovery`].
/// - Implementations must not spawn tasks.
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Discover the current public IPv4 address
    async fn discover(&self) -> Result<Ipv4Addr, crate::Error>;

    /// Short identifier used in log output
    fn source_name(&self) -> &'static str;
}
