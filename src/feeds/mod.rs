//! External data sources: fetch-and-decode wrappers over remote providers.
//!
//! Sources go through the generic [`HttpFetch`] collaborator so the decode
//! and failure-mapping logic can be exercised without a network.

mod news;
mod weather;

pub use news::NewsSource;
pub use weather::WeatherSource;

use std::time::Duration;

use futures_util::future::BoxFuture;

use crate::core::panel::Payload;
use crate::error::{ControlError, Result};

/// A raw HTTP response: status plus body text.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Generic HTTP fetch capability.
pub trait HttpFetch: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str, timeout: Duration) -> BoxFuture<'a, Result<HttpResponse>>;
}

/// Production fetcher over a single shared `reqwest::Client`.
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ncp/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl HttpFetch for ReqwestFetcher {
    fn fetch<'a>(&'a self, url: &'a str, timeout: Duration) -> BoxFuture<'a, Result<HttpResponse>> {
        Box::pin(async move {
            let response = self.client.get(url).timeout(timeout).send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok(HttpResponse { status, body })
        })
    }
}

/// One remote data provider bound to its parameters.
pub trait ExternalSource: Send + Sync {
    fn fetch(&self) -> BoxFuture<'_, Result<Payload>>;
}

/// Map an HTTP status to the shared failure taxonomy: 429 is rate limited
/// (recorded as Remote, stretched backoff), other non-2xx are Remote.
pub(crate) fn check_status(response: &HttpResponse, provider: &str) -> Result<()> {
    match response.status {
        200..=299 => Ok(()),
        429 => Err(ControlError::rate_limited(format!(
            "{} returned HTTP 429",
            provider
        ))),
        status => Err(ControlError::remote(format!(
            "{} returned HTTP {}",
            provider, status
        ))),
    }
}
