// # Cloudflare Zone Source
//
// This crate provides a Cloudflare-backed `ZoneSource` for the nameserver monitor.
//
// Cloudflare reports the nameservers it has assigned to each zone in the
// `name_servers` field of the zone object, so one `GET /zones?name=...` per
// check is all the monitor needs.
//
// ## Architectural Constraints
//
// ### Trust Level: Untrusted (Zone Source)
//
// **Allowed Capabilities**:
// - ✅ Perform HTTP/HTTPS API calls to the Cloudflare API only
// - ✅ Parse provider-specific responses
//
// **Forbidden Capabilities**:
// - ❌ Spawn tasks or threads
// - ❌ Implement retry logic (the next scheduled tick is the retry)
// - ❌ Cache zone data between calls
// - ❌ Access the history store
//
// ## Security Requirements
//
// - API token NEVER appears in logs or Debug output
// - Source MUST fail fast if token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones?name=...&account.id=...&page=...&per_page=...`

use async_trait::async_trait;
use nsmon_core::config::ZoneSourceConfig;
use nsmon_core::model::normalize_hostname;
use nsmon_core::traits::{ZoneSource, ZoneSourceFactory};
use nsmon_core::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Zones requested per page when listing
const PAGE_SIZE: u32 = 50;

/// Cloudflare zone source
///
/// Stateless and single-shot: every call is one or more GET requests and
/// nothing is remembered between calls.
pub struct CloudflareZoneSource {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Account ID to restrict listing to (optional)
    account_id: Option<String>,

    /// API base URL (overridable for tests)
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareZoneSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareZoneSource")
            .field("api_token", &"<REDACTED>")
            .field("account_id", &self.account_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Envelope shared by every Cloudflare v4 response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
struct CloudflareZone {
    name: String,
    #[serde(default)]
    name_servers: Vec<String>,
}

impl CloudflareZoneSource {
    /// Create a new Cloudflare zone source
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:Read permission
    /// - `account_id`: Optional account ID to restrict listing
    ///
    /// # Security
    ///
    /// The API token will NEVER be logged or displayed in error messages.
    pub fn new(api_token: impl Into<String>, account_id: Option<String>) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            account_id,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
        })
    }

    /// Point the source at a different API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Fetch one page of zones
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /zones?page=1&per_page=50[&name=example.com][&account.id=...]
    /// Authorization: Bearer <token>
    /// ```
    async fn fetch_zones(
        &self,
        name: Option<&str>,
        page: u32,
    ) -> Result<(Vec<CloudflareZone>, u32)> {
        let mut query: Vec<(&str, String)> = vec![
            ("page", page.to_string()),
            ("per_page", PAGE_SIZE.to_string()),
        ];
        if let Some(name) = name {
            query.push(("name", name.to_string()));
        }
        if let Some(account_id) = &self.account_id {
            query.push(("account.id", account_id.clone()));
        }

        let url = format!("{}/zones", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .query(&query)
            .send()
            .await
            .map_err(|e| Error::provider("cloudflare", format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(map_status(status.as_u16(), &error_text, name));
        }

        let body: ApiResponse<Vec<CloudflareZone>> = response.json().await.map_err(|e| {
            Error::provider("cloudflare", format!("Failed to parse response: {}", e))
        })?;

        if !body.success {
            let detail = body
                .errors
                .iter()
                .map(|e| format!("{} ({})", e.message, e.code))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(Error::provider("cloudflare", format!("API reported failure: {}", detail)));
        }

        let total_pages = body.result_info.map(|info| info.total_pages).unwrap_or(1);
        Ok((body.result.unwrap_or_default(), total_pages))
    }
}

/// Map a non-success HTTP status onto the core error taxonomy
fn map_status(status: u16, error_text: &str, zone: Option<&str>) -> Error {
    match status {
        401 | 403 => Error::auth(format!(
            "Cloudflare rejected the API token or it lacks Zone:Read permission. Status: {}",
            status
        )),
        404 => Error::not_found(format!("Zone not found: {}", zone.unwrap_or("(all)"))),
        429 => Error::rate_limited(format!(
            "Cloudflare rate limit exceeded. Status: {}",
            status
        )),
        500..=599 => Error::provider(
            "cloudflare",
            format!("Cloudflare server error (transient): {} - {}", status, error_text),
        ),
        _ => Error::provider(
            "cloudflare",
            format!("Zone listing failed: {} - {}", status, error_text),
        ),
    }
}

#[async_trait]
impl ZoneSource for CloudflareZoneSource {
    async fn list_zones(&self, filter: Option<&str>) -> Result<Vec<String>> {
        let filter = filter.map(normalize_hostname);
        let mut zones = Vec::new();
        let mut page = 1;

        loop {
            let (batch, total_pages) = self.fetch_zones(filter.as_deref(), page).await?;
            zones.extend(batch.into_iter().map(|zone| normalize_hostname(&zone.name)));
            if page >= total_pages {
                break;
            }
            page += 1;
        }

        tracing::debug!("Cloudflare listed {} zones", zones.len());
        Ok(zones)
    }

    async fn get_nameservers(&self, zone: &str) -> Result<Vec<String>> {
        let zone = normalize_hostname(zone);
        let (zones, _) = self.fetch_zones(Some(&zone), 1).await?;

        let found = zones
            .into_iter()
            .find(|candidate| normalize_hostname(&candidate.name) == zone)
            .ok_or_else(|| Error::not_found(format!("Zone not found: {}", zone)))?;

        tracing::debug!(
            zone = %zone,
            nameservers = ?found.name_servers,
            "Fetched Cloudflare nameservers"
        );
        Ok(found.name_servers)
    }

    fn source_name(&self) -> &'static str {
        "cloudflare"
    }
}

/// Factory for creating Cloudflare zone sources
pub struct CloudflareFactory;

impl ZoneSourceFactory for CloudflareFactory {
    fn create(&self, config: &ZoneSourceConfig) -> Result<Box<dyn ZoneSource>> {
        match config {
            ZoneSourceConfig::Cloudflare {
                api_token,
                account_id,
            } => Ok(Box::new(CloudflareZoneSource::new(
                api_token.clone(),
                account_id.clone(),
            )?)),
            _ => Err(Error::config("Invalid config for Cloudflare zone source")),
        }
    }
}

/// Register the Cloudflare zone source with a registry
///
/// # Example
///
/// ```rust
/// use nsmon_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// nsmon_zone_cloudflare::register(&registry);
/// assert!(registry.has_zone_source("cloudflare"));
/// ```
pub fn register(registry: &nsmon_core::ProviderRegistry) {
    registry.register_zone_source("cloudflare", Box::new(CloudflareFactory));
}
