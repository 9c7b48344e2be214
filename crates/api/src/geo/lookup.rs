//! External IP-geolocation service.

use std::time::Duration;

use async_trait::async_trait;
use bazaar_core::session::UNKNOWN;
use serde::Deserialize;

use super::{GeoError, GeoLocation};

/// Something that can locate a public IP address.
#[async_trait]
pub trait GeoLookup: Send + Sync {
    async fn lookup(&self, ip: &str) -> Result<GeoLocation, GeoError>;
}

/// Read-only HTTP client for an ip-api style service.
///
/// Issues `GET {base_url}/{ip}` and expects
/// `{"city": ..., "country": ..., "lat": ..., "lon": ...}`. A body with
/// `"status": "fail"` is reported as [`GeoError::Rejected`].
pub struct HttpGeoLookup {
    client: reqwest::Client,
    base_url: String,
}

/// Wire format of the lookup response. Every field is optional so partial
/// answers degrade to placeholders instead of failing the parse.
#[derive(Debug, Deserialize)]
struct LookupResponse {
    status: Option<String>,
    message: Option<String>,
    city: Option<String>,
    country: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

impl HttpGeoLookup {
    /// Build a client with a per-request `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GeoError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Reuse an existing [`reqwest::Client`] (connection pooling).
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl GeoLookup for HttpGeoLookup {
    async fn lookup(&self, ip: &str) -> Result<GeoLocation, GeoError> {
        let response = self
            .client
            .get(format!("{}/{ip}", self.base_url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeoError::Status {
                status: status.as_u16(),
            });
        }

        let body: LookupResponse = response.json().await?;
        if body.status.as_deref() == Some("fail") {
            return Err(GeoError::Rejected(
                body.message.unwrap_or_else(|| "lookup failed".into()),
            ));
        }

        Ok(GeoLocation {
            city: non_empty_or_unknown(body.city),
            country: non_empty_or_unknown(body.country),
            latitude: body.lat.unwrap_or_default(),
            longitude: body.lon.unwrap_or_default(),
        })
    }
}

fn non_empty_or_unknown(value: Option<String>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}
