//! Expansion of shortened share links (e.g. `163cn.tv/xxxx`) into the URL they
//! redirect to, so the URL matchers see the real track link.

use crate::error::{PlatformError, Result};
use async_trait::async_trait;
use reqwest::{StatusCode, Url, header};
use std::time::Duration;

#[async_trait]
pub trait ShortLinkResolver: Send + Sync {
    /// First short link found in `text`, if any.
    fn find<'a>(&self, text: &'a str) -> Option<&'a str>;

    /// Redirect target of `url`.
    async fn expand(&self, url: &str) -> Result<String>;
}

pub struct HttpShortLinkResolver {
    http: reqwest::Client,
    domains: Vec<String>,
}

impl HttpShortLinkResolver {
    pub fn new(domains: Vec<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            domains: domains
                .into_iter()
                .map(|d| d.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        })
    }
}

#[async_trait]
impl ShortLinkResolver for HttpShortLinkResolver {
    fn find<'a>(&self, text: &'a str) -> Option<&'a str> {
        find_short_link(text, &self.domains)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn expand(&self, url: &str) -> Result<String> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_redirection() {
            if status == StatusCode::NOT_FOUND {
                return Err(PlatformError::NotFound(format!("short link {url}")));
            }
            return Err(PlatformError::Unavailable(format!(
                "short link {url} answered {status} without a redirect"
            )));
        }
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                PlatformError::Unavailable(format!("short link {url} redirect has no location"))
            })?;
        let base = Url::parse(url).map_err(|e| PlatformError::Http(e.to_string()))?;
        let target = base
            .join(location)
            .map_err(|e| PlatformError::Http(e.to_string()))?;
        Ok(target.to_string())
    }
}

/// Finds the first `http(s)` URL in `text` whose host is one of `domains` or a
/// subdomain of one.
pub fn find_short_link<'a>(text: &'a str, domains: &[String]) -> Option<&'a str> {
    text.split_whitespace().find(|token| {
        if !(token.starts_with("http://") || token.starts_with("https://")) {
            return false;
        }
        let Ok(url) = Url::parse(token) else {
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        domains
            .iter()
            .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
    })
}
