//! Error types for the DDNS system
//!
//! This module defines all error types used throughout the crate.
//! Every error reaching the scheduler is fatal for the run; nothing here
//! carries retry hints.

use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DDNS system
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (raised before any network activity)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Public IP discovery failed
    #[error("IP discovery failed: {0}")]
    Discovery(String),

    /// The provider returned no zone for the requested name
    #[error("Zone not found: {0}")]
    ZoneNotFound(String),

    /// The provider returned a zone whose name is not the requested one
    #[error("Zone mismatch: requested {requested}, provider returned {returned}")]
    ZoneMismatch {
        /// Zone name we asked for
        requested: String,
        /// Zone name the provider answered with
        returned: String,
    },

    /// Provider-side failure while reading zones or records
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Create or update rejected by the provider
    #[error("{operation} failed: {message}")]
    Mutation {
        /// "creating DNS record" or "updating DNS record"
        operation: String,
        /// Error message
        message: String,
    },

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Resource not found at the provider
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network-related errors
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an IP discovery error
    pub fn discovery(msg: impl Into<String>) -> Self {
        Self::Discovery(msg.into())
    }

    /// Create a "zone not found" error
    pub fn zone_not_found(zone: impl Into<String>) -> Self {
        Self::ZoneNotFound(zone.into())
    }

    /// Create a zone mismatch error
    pub fn zone_mismatch(requested: impl Into<String>, returned: impl Into<String>) -> Self {
        Self::ZoneMismatch {
            requested: requested.into(),
            returned: returned.into(),
        }
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a mutation error
    pub fn mutation(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Mutation {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Short category label for the fatal log line ("config", "discovery", ...)
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::Discovery(_) => "discovery",
            Error::ZoneNotFound(_) | Error::ZoneMismatch { .. } => "zone",
            Error::Mutation { .. } => "mutation",
            Error::Provider { .. }
            | Error::Authentication(_)
            | Error::RateLimited(_)
            | Error::NotFound(_)
            | Error::Json(_) => "provider",
            Error::Network(_) => "network",
        }
    }
}
