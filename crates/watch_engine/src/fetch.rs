use std::time::Duration;

use engine_logging::{engine_debug, engine_info};
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use watch_core::{Episode, Item};

use crate::decode::decode_page;
use crate::listing::{parse_detail_episode, parse_listing};
use crate::{FailureKind, FetchError};

/// Sent with every request; the catalog site rejects obvious bots.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub user_agent: String,
    pub allowed_content_types: Vec<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            allowed_content_types: vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
            ],
        }
    }
}

/// Where listings and detail pages come from.
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    /// Items of one listing view, in display order.
    async fn fetch_listing(&self, url: &str) -> Result<Vec<Item>, FetchError>;

    /// Episode marker from an item's detail page.
    async fn fetch_episode(&self, item_url: &str) -> Result<Episode, FetchError>;
}

struct Page {
    html: String,
    final_url: Url,
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { settings, client })
    }

    fn is_content_type_allowed(&self, content_type: &str) -> bool {
        let ct = content_type.split(';').next().unwrap_or(content_type).trim();
        self.settings
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ct))
    }

    async fn fetch_page(&self, url: &str) -> Result<Page, FetchError> {
        let parsed = Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        if let Some(ct) = content_type.as_deref() {
            if !self.is_content_type_allowed(ct) {
                return Err(FetchError::new(
                    FailureKind::UnsupportedContentType {
                        content_type: ct.to_string(),
                    },
                    "unsupported content type",
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        engine_debug!("Fetched {} ({} bytes)", final_url, bytes.len());
        Ok(Page {
            html: decode_page(&bytes, content_type.as_deref()),
            final_url,
        })
    }
}

#[async_trait::async_trait]
impl CatalogSource for ReqwestFetcher {
    async fn fetch_listing(&self, url: &str) -> Result<Vec<Item>, FetchError> {
        let page = self.fetch_page(url).await?;
        let items = parse_listing(&page.html, Some(&page.final_url));

        let unknown = items
            .iter()
            .filter(|i| i.episode == Episode::Unknown)
            .count();
        let known = items
            .iter()
            .filter(|i| matches!(i.episode, Episode::Number(_)))
            .count();
        engine_info!(
            "Listing {}: {} items ({} with episode numbers, {} with unknown markers)",
            url,
            items.len(),
            known,
            unknown
        );
        Ok(items)
    }

    async fn fetch_episode(&self, item_url: &str) -> Result<Episode, FetchError> {
        let page = self.fetch_page(item_url).await?;
        let episode = parse_detail_episode(&page.html);
        engine_debug!("Detail page {} reports episode {}", item_url, episode);
        Ok(episode)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
