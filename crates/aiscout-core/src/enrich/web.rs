//! Plain-HTTP web page fetcher.
//!
//! The in-tree `WebFetcher` implementation: fetches the page with reqwest
//! and extracts readable text with `scraper`. A headless-browser fetcher can
//! replace it behind the same trait for script-heavy pages.

use std::sync::OnceLock;
use std::time::Duration;

use scraper::{Html, Selector};

use super::{WebFetcher, WebPage};
use crate::error::EnrichError;

fn title_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("title").expect("title selector must parse"))
}

fn text_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("article p, main p, p, h1, h2, h3, li").expect("text selector must parse"))
}

/// Fetches article pages over plain HTTP.
pub struct HttpWebFetcher {
    client: reqwest::Client,
}

impl HttpWebFetcher {
    /// Create a fetcher with the given request timeout.
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpWebFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait::async_trait]
impl WebFetcher for HttpWebFetcher {
    async fn fetch(&self, url: &str) -> Result<Option<WebPage>, EnrichError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| EnrichError::WebFetch {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnrichError::WebFetch {
                url: url.to_string(),
                message: format!("HTTP {}", status.as_u16()),
            });
        }

        let body = response.text().await.map_err(|e| EnrichError::WebFetch {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let (title, content) = extract_text(&body);
        if content.is_empty() {
            return Ok(None);
        }

        Ok(Some(WebPage {
            title,
            link: url.to_string(),
            content,
        }))
    }
}

/// Pull a title and readable body text out of an HTML document.
fn extract_text(html: &str) -> (String, String) {
    let document = Html::parse_document(html);

    let title = document
        .select(title_selector())
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let mut paragraphs = Vec::new();
    for element in document.select(text_selector()) {
        let text: String = element.text().collect::<String>().trim().to_string();
        if !text.is_empty() {
            paragraphs.push(text);
        }
    }
    paragraphs.dedup();

    (title, paragraphs.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn extract_text_pulls_title_and_paragraphs() {
        let html = "<html><head><title>My Post</title></head>\
                    <body><p>First paragraph.</p><p>Second.</p></body></html>";
        let (title, content) = extract_text(html);
        assert_eq!(title, "My Post");
        assert_eq!(content, "First paragraph.\nSecond.");
    }

    #[test]
    fn extract_text_empty_document() {
        let (title, content) = extract_text("<html><body></body></html>");
        assert!(title.is_empty());
        assert!(content.is_empty());
    }

    #[tokio::test]
    async fn fetch_returns_cleaned_page() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/post"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<html><head><title>Release</title></head>\
                 <body><p>We shipped a model.</p></body></html>",
            ))
            .mount(&server)
            .await;

        let fetcher = HttpWebFetcher::default();
        let page = fetcher
            .fetch(&format!("{}/post", server.uri()))
            .await
            .expect("fetch")
            .expect("page");

        assert_eq!(page.title, "Release");
        assert!(page.content.contains("We shipped a model."));
    }

    #[tokio::test]
    async fn fetch_empty_body_yields_none() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/empty"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let fetcher = HttpWebFetcher::default();
        let page = fetcher
            .fetch(&format!("{}/empty", server.uri()))
            .await
            .expect("fetch");

        assert!(page.is_none());
    }

    #[tokio::test]
    async fn fetch_http_error_maps_to_web_fetch_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpWebFetcher::default();
        let err = fetcher
            .fetch(&format!("{}/gone", server.uri()))
            .await
            .unwrap_err();

        match err {
            EnrichError::WebFetch { message, .. } => assert!(message.contains("404")),
            other => panic!("expected WebFetch, got: {other}"),
        }
    }
}
