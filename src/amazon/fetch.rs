use crate::amazon::extract::{ProductInfo, extract_from_html};
use crate::amazon::link::{ProductReference, canonicalize};
use crate::http::build_browser_client;
use reqwest::Client;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("not a product link: {0}")]
    InvalidLink(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("HTTP {0}")]
    Status(u16),
}

#[derive(Debug, Clone)]
pub struct ScrapedProduct {
    pub reference: ProductReference,
    pub info: ProductInfo,
}

#[derive(Debug, Clone)]
pub struct ProductScraper {
    http: Client,
    origin_override: Option<String>,
}

impl ProductScraper {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: build_browser_client(timeout),
            origin_override: None,
        }
    }

    /// Fetches pages from `origin` instead of the product's own host. The
    /// canonical URL reported back is unchanged.
    #[cfg(test)]
    pub fn with_origin(timeout: Duration, origin: impl Into<String>) -> Self {
        Self {
            http: build_browser_client(timeout),
            origin_override: Some(origin.into().trim_end_matches('/').to_string()),
        }
    }

    /// Best effort: every failure is logged and reported as `None`.
    pub async fn extract(&self, url: &str) -> Option<ScrapedProduct> {
        match self.try_extract(url).await {
            Ok(product) => {
                info!(
                    target = "affilink.scraper",
                    asin = %product.reference.asin,
                    title = %product.info.title,
                    has_price = product.info.price.is_some(),
                    has_image = product.info.image_url.is_some(),
                    "product extracted"
                );
                Some(product)
            }
            Err(err) => {
                warn!(target = "affilink.scraper", url = %url, error = %err, "product extraction failed");
                None
            }
        }
    }

    pub async fn try_extract(&self, url: &str) -> Result<ScrapedProduct, ScrapeError> {
        let reference =
            canonicalize(url).ok_or_else(|| ScrapeError::InvalidLink(url.to_string()))?;
        let started = Instant::now();
        let html = self.fetch_page(&reference).await?;
        crate::metrics::stage_elapsed("fetch_product_page", started.elapsed().as_millis());
        let info = extract_from_html(&html);
        Ok(ScrapedProduct { reference, info })
    }

    async fn fetch_page(&self, reference: &ProductReference) -> Result<String, ScrapeError> {
        let target = match &self.origin_override {
            Some(origin) => format!("{origin}/dp/{}", reference.asin),
            None => reference.canonical_url.clone(),
        };
        let response = self
            .http
            .get(target)
            .send()
            .await
            .map_err(|err| ScrapeError::Request(err.to_string()))?;
        if !response.status().is_success() {
            return Err(ScrapeError::Status(response.status().as_u16()));
        }
        response
            .text()
            .await
            .map_err(|err| ScrapeError::Request(err.to_string()))
    }
}
