use crate::http::build_client;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
enum ShortenError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("unexpected response body: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone)]
struct Provider {
    name: &'static str,
    endpoint: String,
    expected_host: &'static str,
    extra_query: &'static [(&'static str, &'static str)],
    http: Client,
}

impl Provider {
    async fn shorten(&self, url: &str) -> Result<String, ShortenError> {
        let mut query: Vec<(&str, &str)> = self.extra_query.to_vec();
        query.push(("url", url));
        let response = self
            .http
            .get(&self.endpoint)
            .query(&query)
            .send()
            .await
            .map_err(|err| ShortenError::Request(err.to_string()))?;
        if !response.status().is_success() {
            return Err(ShortenError::Status(response.status().as_u16()));
        }
        let body = response
            .text()
            .await
            .map_err(|err| ShortenError::Request(err.to_string()))?;
        let candidate = body.trim();
        if candidate.starts_with("http") && candidate.contains(self.expected_host) {
            Ok(candidate.to_string())
        } else {
            Err(ShortenError::Rejected(candidate.chars().take(120).collect()))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShortLink {
    pub url: String,
    /// `tinyurl`, `isgd`, or `none` when the long URL came back unchanged.
    pub provider: &'static str,
}

/// TinyURL first, is.gd second, the long URL itself last.
#[derive(Debug, Clone)]
pub struct UrlShortener {
    primary: Provider,
    fallback: Provider,
}

impl UrlShortener {
    pub fn new(tinyurl_endpoint: impl Into<String>, isgd_endpoint: impl Into<String>) -> Self {
        Self {
            primary: Provider {
                name: "tinyurl",
                endpoint: tinyurl_endpoint.into(),
                expected_host: "tinyurl.com",
                extra_query: &[],
                http: build_client(Duration::from_secs(10)),
            },
            fallback: Provider {
                name: "isgd",
                endpoint: isgd_endpoint.into(),
                expected_host: "is.gd",
                extra_query: &[("format", "simple")],
                http: build_client(Duration::from_secs(5)),
            },
        }
    }

    pub async fn shorten(&self, url: &str) -> ShortLink {
        for provider in [&self.primary, &self.fallback] {
            match provider.shorten(url).await {
                Ok(short) => {
                    info!(
                        target = "affilink.shortener",
                        provider = provider.name,
                        short = %short,
                        "url shortened"
                    );
                    crate::metrics::inc_shortener(provider.name);
                    return ShortLink {
                        url: short,
                        provider: provider.name,
                    };
                }
                Err(err) => warn!(
                    target = "affilink.shortener",
                    provider = provider.name,
                    error = %err,
                    "shortener failed"
                ),
            }
        }
        crate::metrics::inc_shortener("none");
        ShortLink {
            url: url.to_string(),
            provider: "none",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LONG: &str = "https://amazon.in/dp/B08N5WRWNW?tag=budgetlooks08-21";

    async fn shortener_for(primary: &MockServer, fallback: &MockServer) -> UrlShortener {
        UrlShortener::new(
            format!("{}/api-create.php", primary.uri()),
            format!("{}/create.php", fallback.uri()),
        )
    }

    #[tokio::test]
    async fn primary_success_skips_fallback() {
        let primary = MockServer::start().await;
        let fallback = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api-create.php"))
            .and(query_param("url", LONG))
            .respond_with(ResponseTemplate::new(200).set_body_string("https://tinyurl.com/abc123\n"))
            .mount(&primary)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&fallback)
            .await;

        let link = shortener_for(&primary, &fallback).await.shorten(LONG).await;
        assert_eq!(link.url, "https://tinyurl.com/abc123");
        assert_eq!(link.provider, "tinyurl");
    }

    #[tokio::test]
    async fn wrong_host_falls_back_to_secondary() {
        let primary = MockServer::start().await;
        let fallback = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("https://evil.example/x"))
            .mount(&primary)
            .await;
        Mock::given(method("GET"))
            .and(path("/create.php"))
            .and(query_param("format", "simple"))
            .and(query_param("url", LONG))
            .respond_with(ResponseTemplate::new(200).set_body_string("https://is.gd/xyz"))
            .expect(1)
            .mount(&fallback)
            .await;

        let link = shortener_for(&primary, &fallback).await.shorten(LONG).await;
        assert_eq!(link.url, "https://is.gd/xyz");
        assert_eq!(link.provider, "isgd");
    }

    #[tokio::test]
    async fn both_failing_returns_original() {
        let primary = MockServer::start().await;
        let fallback = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Error"))
            .mount(&primary)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("https://is.gd/xyz"))
            .mount(&fallback)
            .await;

        let link = shortener_for(&primary, &fallback).await.shorten(LONG).await;
        assert_eq!(link.url, LONG);
        assert_eq!(link.provider, "none");
    }

    #[tokio::test]
    async fn unreachable_providers_return_original() {
        let shortener = UrlShortener::new("http://127.0.0.1:9/api", "http://127.0.0.1:9/create");
        let link = shortener.shorten(LONG).await;
        assert_eq!(link.url, LONG);
        assert_eq!(link.provider, "none");
    }
}
