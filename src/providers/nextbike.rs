//! nextbike live feed client
//!
//! The `nextbike-live.json` endpoint returns a snapshot of every station
//! ("place") of the requested domains, grouped by country and city:
//!
//! ```text
//! { "countries": [ { "country_name": "Germany",
//!     "cities": [ { "name": "Leipzig",
//!       "places": [ { "number": 4011, "bike_numbers": ["20091"],
//!                     "lat": 51.34, "lng": 12.37 } ] } ] } ] }
//! ```
//!
//! Only the fields above are modelled. Anything else in the payload is
//! ignored, and missing or `null` fields decode to their zero value.

use bytes::Bytes;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct FeedSnapshot {
    #[serde(default, deserialize_with = "null_as_default")]
    pub countries: Vec<Country>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Country {
    #[serde(rename = "country_name", default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cities: Vec<City>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct City {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub places: Vec<Place>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Place {
    #[serde(default, deserialize_with = "null_as_default")]
    pub number: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bike_numbers: Vec<String>,
    #[serde(rename = "lat", default, deserialize_with = "null_as_default")]
    pub latitude: f64,
    #[serde(rename = "lng", default, deserialize_with = "null_as_default")]
    pub longitude: f64,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Decode a raw feed body
pub fn parse_feed(body: &[u8]) -> Result<FeedSnapshot, NextbikeError> {
    serde_json::from_slice(body).map_err(NextbikeError::ParseError)
}

#[derive(Debug, Clone)]
pub struct NextbikeClient {
    client: reqwest::Client,
    endpoint: String,
}

impl NextbikeClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, NextbikeError> {
        // `timeout` bounds the whole exchange, including reading the body
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(NextbikeError::ClientError)?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Issue one GET and return the body as-is. No retries.
    pub async fn fetch_raw(&self) -> Result<Bytes, NextbikeError> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(NextbikeError::NetworkError)?;

        tracing::debug!(status = %response.status(), "Received feed response");

        // `bytes()` consumes the response, so the connection is released on
        // both the success and the error path.
        response.bytes().await.map_err(NextbikeError::BodyError)
    }

    /// Fetch and decode the current snapshot
    pub async fn fetch_snapshot(&self) -> Result<FeedSnapshot, NextbikeError> {
        tracing::debug!("Fetching feed");
        let body = self.fetch_raw().await?;

        tracing::debug!(bytes = body.len(), "Decoding feed");
        parse_feed(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body_preview = %String::from_utf8_lossy(&body).chars().take(200).collect::<String>(),
                "Failed to parse nextbike response"
            );
            e
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NextbikeError {
    #[error("Failed to build HTTP client: {0}")]
    ClientError(#[source] reqwest::Error),
    #[error("Network error: {0}")]
    NetworkError(#[source] reqwest::Error),
    #[error("Failed to read response body: {0}")]
    BodyError(#[source] reqwest::Error),
    #[error("Failed to parse feed: {0}")]
    ParseError(#[source] serde_json::Error),
}
