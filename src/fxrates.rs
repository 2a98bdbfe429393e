use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Currency codes are owned by the upstream API, so they stay open strings
/// with a handful of designated well-known values.
pub type Currency = String;

pub const VES: &str = "VES";
pub const SOURCE_BCV: &str = "BCV";
pub const RATE_TYPE_MID: &str = "MID";

/// HTTP client for the fxrates API.
pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExchangeRate {
    pub base: Currency,
    pub target: Currency,
    pub rate: f64,
    pub rate_type: String,
    pub source: String,
    pub as_of: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    pub total: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrenciesResponse {
    pub results: Vec<Currency>,
}

impl Client {
    /// Creates a client with the request timeout applied to every call.
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self { http, base_url })
    }

    /// Fetches the exchange rate candidates for a specific currency pair.
    pub async fn rate(&self, base: &str, target: &str) -> Result<Page<ExchangeRate>, Error> {
        let path = format!(
            "/v1/rates/{}/{}",
            urlencoding::encode(base),
            urlencoding::encode(target)
        );

        self.get(&path).await
    }

    /// Fetches all exchange rates for a base currency.
    pub async fn rates(&self, base: &str) -> Result<Page<ExchangeRate>, Error> {
        let path = format!("/v1/rates/{}", urlencoding::encode(base));

        self.get(&path).await
    }

    /// Fetches the list of supported currencies.
    pub async fn currencies(&self) -> Result<CurrenciesResponse, Error> {
        self.get("/v1/currencies").await
    }

    /// Checks that the API is reachable and healthy.
    pub async fn health(&self) -> Result<(), Error> {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(Error::Unhealthy(response.status().as_u16()));
        }

        Ok(())
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(Error::Status(response.status().as_u16()));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| Error::Parse(e.to_string()))
    }
}

#[derive(Debug)]
pub enum Error {
    Http(String),
    Status(u16),
    Unhealthy(u16),
    Parse(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Http(e) => write!(f, "unable to execute request: {e}"),
            Error::Status(code) => write!(f, "unexpected status code: {code}"),
            Error::Unhealthy(code) => write!(f, "unhealthy status code: {code}"),
            Error::Parse(e) => write!(f, "unable to decode response: {e}"),
        }
    }
}

impl std::error::Error for Error {}
