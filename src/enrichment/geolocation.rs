use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use serde::Deserialize;
use std::time::Duration;

use crate::error_handling::types::EnrichmentError;
use crate::storage::types::GeolocationRecord;

/// External geolocation lookup, one address per request.
#[async_trait]
pub trait GeoProvider: Send + Sync {
    async fn lookup(&self, address: &str) -> Result<GeolocationRecord, EnrichmentError>;
}

/// Response shape of the ip-api JSON interface. A non-"success" status is a
/// recoverable per-address failure.
#[derive(Debug, Deserialize)]
struct GeoResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default, rename = "countryCode")]
    country_code: Option<String>,
    #[serde(default, rename = "regionName")]
    region_name: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    isp: Option<String>,
    #[serde(default)]
    org: Option<String>,
    #[serde(default, rename = "as")]
    asn: Option<String>,
    #[serde(default)]
    reverse: Option<String>,
}

/// HTTP client against an ip-api style endpoint.
pub struct IpApiClient {
    client: reqwest::Client,
    endpoint: String,
}

impl IpApiClient {
    const FIELDS: &'static str =
        "status,message,country,countryCode,regionName,city,lat,lon,timezone,isp,org,as,reverse";

    pub fn new(endpoint: String) -> Result<Self, EnrichmentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| EnrichmentError::RequestFailed(e.to_string()))?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl GeoProvider for IpApiClient {
    async fn lookup(&self, address: &str) -> Result<GeolocationRecord, EnrichmentError> {
        let url = format!("{}{}?fields={}", self.endpoint, address, Self::FIELDS);
        debug!("geolocation lookup for {}", address);
        let response: GeoResponse = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EnrichmentError::RequestFailed(e.to_string()))?
            .json()
            .await
            .map_err(|e| EnrichmentError::BadResponse(e.to_string()))?;
        if response.status != "success" {
            return Err(EnrichmentError::LookupFailed(format!(
                "{}: {}",
                address,
                response.message.unwrap_or_else(|| "no message".into())
            )));
        }
        Ok(GeolocationRecord {
            address: address.to_string(),
            country: response.country,
            country_code: response.country_code,
            region: response.region_name,
            city: response.city,
            latitude: response.lat,
            longitude: response.lon,
            timezone: response.timezone,
            isp: response.isp,
            org: response.org,
            asn: response.asn,
            hostname: response.reverse.filter(|h| !h.is_empty()),
            last_updated: Some(Utc::now()),
        })
    }
}
