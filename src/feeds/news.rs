//! Top headlines from NewsAPI.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Deserialize;
use url::Url;

use super::{check_status, ExternalSource, HttpFetch};
use crate::core::panel::{Headline, Payload};
use crate::error::{ControlError, Result};

const ENDPOINT: &str = "https://newsapi.org/v2/top-headlines";
const PROVIDER: &str = "newsapi";

pub struct NewsSource {
    fetcher: Arc<dyn HttpFetch>,
    url: String,
    max_headlines: usize,
    timeout: Duration,
}

impl NewsSource {
    pub fn new(
        fetcher: Arc<dyn HttpFetch>,
        api_key: &str,
        country: &str,
        max_headlines: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let url = Url::parse_with_params(
            ENDPOINT,
            &[("country", country), ("apiKey", api_key)],
        )
        .map_err(|e| ControlError::registry(format!("news: invalid parameters: {}", e)))?;
        Ok(Self {
            fetcher,
            url: url.into(),
            max_headlines,
            timeout,
        })
    }
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    status: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    source: Option<ArticleSource>,
}

#[derive(Debug, Deserialize)]
struct ArticleSource {
    name: Option<String>,
}

/// NewsAPI reports provider-level errors in-band with HTTP 200; a
/// `rateLimited` code gets the same stretched backoff as HTTP 429.
fn decode_headlines(max_headlines: usize, body: &str) -> Result<Vec<Headline>> {
    let response: NewsResponse = serde_json::from_str(body)
        .map_err(|e| ControlError::decode(format!("news payload: {}", e)))?;

    if response.status != "ok" {
        let detail = response
            .message
            .or(response.code.clone())
            .unwrap_or_else(|| "unknown provider error".to_string());
        if response.code.as_deref() == Some("rateLimited") {
            return Err(ControlError::rate_limited(format!("{}: {}", PROVIDER, detail)));
        }
        return Err(ControlError::remote(format!("{}: {}", PROVIDER, detail)));
    }

    let headlines = response
        .articles
        .into_iter()
        .filter_map(|article| {
            let title = article.title.filter(|t| !t.trim().is_empty())?;
            let url = article.url?;
            Some(Headline {
                title,
                description: article.description,
                url,
                source: article.source.and_then(|s| s.name),
            })
        })
        .take(max_headlines)
        .collect();
    Ok(headlines)
}

impl ExternalSource for NewsSource {
    fn fetch(&self) -> BoxFuture<'_, Result<Payload>> {
        Box::pin(async move {
            let response = self.fetcher.fetch(&self.url, self.timeout).await?;
            check_status(&response, PROVIDER)?;
            let headlines = decode_headlines(self.max_headlines, &response.body)?;
            Ok(Payload::Headlines(headlines))
        })
    }
}
