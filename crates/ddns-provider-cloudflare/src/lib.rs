// # Cloudflare DNS Provider
//
// Cloudflare API v4 implementation of `DnsProvider`.
//
// ## Endpoints
//
// - List zones: GET `/zones?name=...`
// - List DNS records: GET `/zones/:zone_id/dns_records?type=A&name=...`
// - Create DNS record: POST `/zones/:zone_id/dns_records`
// - Update DNS record: PUT `/zones/:zone_id/dns_records/:record_id`
//
// Every call is a single HTTP request. There is no retry, backoff or caching
// here; the scheduler fails fast and the process supervisor restarts it.
//
// ## Security
//
// - The API token never appears in logs or in `Debug` output
// - An empty token is rejected at construction

use async_trait::async_trait;
use ddns_core::traits::{DnsProvider, DnsRecord, RecordParams, RecordRef, RecordType, ZoneRef};
use ddns_core::{Error, Result};
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER_NAME: &str = "cloudflare";

/// Cloudflare DNS provider
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// NEVER log this value
    api_token: String,

    /// API root, overridable for tests
    base_url: String,

    client: reqwest::Client,
}

// Hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Standard v4 response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ZoneResult {
    id: String,
    name: String,
}

impl From<ZoneResult> for ZoneRef {
    fn from(zone: ZoneResult) -> Self {
        ZoneRef {
            id: zone.id,
            name: zone.name,
        }
    }
}

impl CloudflareProvider {
    /// Create a provider talking to the public Cloudflare API
    ///
    /// The token needs Zone:Read and DNS:Edit permissions on the target zone.
    pub fn new(api_token: impl Into<String>) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .user_agent(concat!("ddnsd/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
        })
    }

    /// Point the provider at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and unwrap the envelope's `result`
    async fn call<T: DeserializeOwned>(&self, what: &str, request: RequestBuilder) -> Result<T> {
        let response = request
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER_NAME, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::provider(PROVIDER_NAME, format!("failed to read response: {}", e)))?;

        debug!(%status, what, "Cloudflare API response");

        // Prefer the API's own error text when the body is an envelope
        let envelope = serde_json::from_str::<Envelope<T>>(&body);

        if !status.is_success() {
            let detail = match &envelope {
                Ok(env) if !env.errors.is_empty() => describe_errors(&env.errors),
                _ => body.trim().to_string(),
            };
            return Err(map_status(status, what, &detail));
        }

        let envelope = envelope.map_err(|e| {
            Error::provider(PROVIDER_NAME, format!("failed to parse {} response: {}", what, e))
        })?;

        if !envelope.success {
            return Err(Error::provider(
                PROVIDER_NAME,
                format!("{} rejected: {}", what, describe_errors(&envelope.errors)),
            ));
        }

        envelope.result.ok_or_else(|| {
            Error::provider(PROVIDER_NAME, format!("{} response has no result", what))
        })
    }
}

fn describe_errors(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "unknown error".to_string();
    }
    errors
        .iter()
        .map(|e| format!("{} (code {})", e.message, e.code))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Map a non-success HTTP status to an error
fn map_status(status: StatusCode, what: &str, detail: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "{}: invalid API token or insufficient permissions ({}): {}",
            what, status, detail
        )),
        404 => Error::not_found(format!("{}: {}", what, detail)),
        409 => Error::provider(
            PROVIDER_NAME,
            format!("{}: conflict ({}): {}", what, status, detail),
        ),
        429 => Error::rate_limited(format!("{}: {}", what, detail)),
        500..=599 => Error::provider(
            PROVIDER_NAME,
            format!("{}: Cloudflare server error ({}): {}", what, status, detail),
        ),
        _ => Error::provider(PROVIDER_NAME, format!("{} failed ({}): {}", what, status, detail)),
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn list_zones(&self, name_filter: &str) -> Result<Vec<ZoneRef>> {
        debug!(zone = name_filter, "listing zones");

        let request = self
            .client
            .get(self.url("/zones"))
            .query(&[("name", name_filter)]);

        let zones: Vec<ZoneResult> = self.call("zone lookup", request).await?;
        Ok(zones.into_iter().map(ZoneRef::from).collect())
    }

    async fn list_records(
        &self,
        zone_id: &str,
        record_type: RecordType,
        name: &str,
    ) -> Result<Vec<DnsRecord>> {
        debug!(zone_id, name, %record_type, "listing DNS records");

        let request = self
            .client
            .get(self.url(&format!("/zones/{}/dns_records", zone_id)))
            .query(&[("type", record_type.as_str()), ("name", name)]);

        self.call("record lookup", request).await
    }

    async fn create_record(&self, zone_id: &str, params: &RecordParams) -> Result<RecordRef> {
        debug!(zone_id, name = %params.name, content = %params.content, "creating DNS record");

        let request = self
            .client
            .post(self.url(&format!("/zones/{}/dns_records", zone_id)))
            .json(params);

        let record: DnsRecord = self.call("record create", request).await?;
        Ok(RecordRef {
            id: record.id,
            name: record.name,
        })
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        params: &RecordParams,
    ) -> Result<RecordRef> {
        debug!(zone_id, record_id, content = %params.content, "updating DNS record");

        let request = self
            .client
            .put(self.url(&format!("/zones/{}/dns_records/{}", zone_id, record_id)))
            .json(params);

        let record: DnsRecord = self.call("record update", request).await?;
        Ok(RecordRef {
            id: record.id,
            name: record.name,
        })
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}
