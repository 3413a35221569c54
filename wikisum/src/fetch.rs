//! Article text retrieval.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use common::WikipediaConfig;
use reqwest::{header, Client, StatusCode};
use scraper::{ElementRef, Html, Node, Selector};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::reference::{normalize, NormalizedReference, ReferenceError};
use crate::text::collapse_whitespace;

const CONTENT_SELECTORS: [&str; 2] = ["div#mw-content-text div.mw-parser-output", "div#mw-content-text"];

const NOISE_SELECTOR: &str = "table.infobox, table.navbox, table.vertical-navbox, table.sidebar, \
    div.navbox, div.reflist, ol.references, sup.reference, span.reference, style, script";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("redirect target rejected: {0}")]
    Redirect(#[source] ReferenceError),
    #[error("redirect response missing Location header")]
    MissingLocation,
    #[error("too many redirects (limit {0})")]
    TooManyRedirects(usize),
    #[error("article fetch failed with status: {0}")]
    Status(StatusCode),
    #[error("article exceeded the maximum allowed size of {0} bytes")]
    TooLarge(usize),
    #[error("article fetch timed out")]
    Timeout,
    #[error("article fetch failed: {0}")]
    Http(String),
    #[error("could not locate the main article content")]
    NoContent,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Http(err.to_string())
        }
    }
}

/// Source of article text for a canonical reference.
#[async_trait::async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Plain article text, paragraphs separated by blank lines.
    async fn fetch(&self, reference: &NormalizedReference) -> Result<String, FetchError>;
}

/// Fetches live Wikipedia pages. Redirects are followed by hand so every hop is
/// re-validated against the allowed host family.
pub struct WikipediaFetcher {
    client: Client,
    max_content_bytes: usize,
    max_redirects: usize,
    origin: Option<String>,
}

impl WikipediaFetcher {
    pub fn new(config: &WikipediaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            client,
            max_content_bytes: config.max_content_bytes,
            max_redirects: config.max_redirects,
            origin: None,
        })
    }

    /// Send requests to `origin` (e.g. `http://127.0.0.1:1234`) instead of the article's
    /// own host. Paths and redirect validation are unchanged.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into().trim_end_matches('/').to_string());
        self
    }

    fn request_url(&self, reference: &NormalizedReference) -> String {
        match &self.origin {
            Some(origin) => {
                let path = Url::parse(reference.as_str())
                    .map(|u| u.path().to_string())
                    .unwrap_or_default();
                format!("{origin}{path}")
            }
            None => reference.to_string(),
        }
    }

    async fn fetch_html(&self, reference: &NormalizedReference) -> Result<String, FetchError> {
        let mut current = reference.clone();

        for _ in 0..=self.max_redirects {
            let response = self.client.get(self.request_url(&current)).send().await?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or(FetchError::MissingLocation)?;
                let next = Url::parse(current.as_str())
                    .and_then(|base| base.join(location))
                    .map_err(|_| FetchError::Redirect(ReferenceError::Malformed))?;
                current = normalize(next.as_str()).map_err(FetchError::Redirect)?;
                debug!("fetch: following redirect to {}", current);
                continue;
            }

            if !status.is_success() {
                return Err(FetchError::Status(status));
            }

            return self.read_limited(response).await;
        }

        Err(FetchError::TooManyRedirects(self.max_redirects))
    }

    async fn read_limited(&self, mut response: reqwest::Response) -> Result<String, FetchError> {
        if let Some(length) = response.content_length() {
            if length as usize > self.max_content_bytes {
                return Err(FetchError::TooLarge(self.max_content_bytes));
            }
        }

        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            body.extend_from_slice(&chunk);
            if body.len() > self.max_content_bytes {
                return Err(FetchError::TooLarge(self.max_content_bytes));
            }
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[async_trait::async_trait]
impl ContentFetcher for WikipediaFetcher {
    async fn fetch(&self, reference: &NormalizedReference) -> Result<String, FetchError> {
        let html = self.fetch_html(reference).await?;
        let text = extract_article_text(&html).ok_or(FetchError::NoContent)?;
        info!(
            "fetch: extracted {} words from {}",
            text.split_whitespace().count(),
            reference
        );
        Ok(text)
    }
}

/// Paragraph text of the main content area, with infoboxes, navigation, reference lists
/// and citation markers removed. `None` when the page has no content area.
pub fn extract_article_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    let content = CONTENT_SELECTORS.iter().find_map(|s| {
        let selector = Selector::parse(s).ok()?;
        document.select(&selector).next()
    })?;

    let noise: HashSet<_> = match Selector::parse(NOISE_SELECTOR) {
        Ok(selector) => content.select(&selector).map(|el| el.id()).collect(),
        Err(_) => {
            warn!("fetch: invalid noise selector");
            HashSet::new()
        }
    };
    let paragraph = Selector::parse("p").ok()?;

    let paragraph_text = |p: ElementRef<'_>| {
        let mut buffer = String::new();
        for node in p.descendants() {
            let in_noise = node
                .ancestors()
                .take_while(|a| a.id() != p.id())
                .any(|a| noise.contains(&a.id()));
            if in_noise {
                continue;
            }
            match node.value() {
                Node::Text(text) => buffer.push_str(text),
                // line breaks separate words; collapse_whitespace trims the extras
                Node::Element(el) if el.name() == "br" => buffer.push(' '),
                _ => {}
            }
        }
        collapse_whitespace(&strip_citation_markers(&buffer))
    };

    let paragraphs: Vec<String> = content
        .select(&paragraph)
        .filter(|p| !p.ancestors().any(|a| noise.contains(&a.id())))
        .map(paragraph_text)
        .filter(|text| !text.is_empty())
        .collect();

    Some(paragraphs.join("\n\n"))
}

/// Drop `[12]`-style citation markers.
fn strip_citation_markers(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('[') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let digits = tail.bytes().take_while(u8::is_ascii_digit).count();
        if digits > 0 && tail[digits..].starts_with(']') {
            rest = &tail[digits + 1..];
        } else {
            out.push('[');
            rest = tail;
        }
    }
    out.push_str(rest);
    out
}
