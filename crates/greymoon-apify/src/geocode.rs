//! Reverse geocoding through Nominatim, throttled to its one-request-per-second policy.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::{Geocoder, Place, SourceError};

pub const NOMINATIM_REVERSE_URL: &str = "https://nominatim.openstreetmap.org/reverse";

/// Hands out request slots at least `interval` apart. Callers queue in the
/// order they reserve.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    pub fn per_second() -> Self {
        Self::new(Duration::from_secs(1))
    }

    /// Reserve the next free slot and sleep until it opens.
    pub async fn acquire(&self) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(reserved) if reserved > now => reserved,
                _ => now,
            };
            *next = Some(slot + self.interval);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<ReverseAddress>,
}

#[derive(Debug, Deserialize)]
struct ReverseAddress {
    state: Option<String>,
    postcode: Option<String>,
}

pub struct NominatimGeocoder {
    client: reqwest::Client,
    endpoint: String,
    limiter: RateLimiter,
}

impl NominatimGeocoder {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: NOMINATIM_REVERSE_URL.to_string(),
            limiter: RateLimiter::per_second(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn reverse(&self, lat: f64, lon: f64) -> Result<Place, SourceError> {
        self.limiter.acquire().await;
        let url = format!(
            "{}?format=jsonv2&lat={lat}&lon={lon}&accept-language=en",
            self.endpoint
        );
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Api {
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }
        let body: ReverseResponse = resp.json().await?;
        let place = body
            .address
            .map(|address| Place {
                state: address.state,
                zip_code: address.postcode,
            })
            .unwrap_or_default();
        debug!(lat, lon, state = ?place.state, zip = ?place.zip_code, "reverse geocoded");
        Ok(place)
    }
}
