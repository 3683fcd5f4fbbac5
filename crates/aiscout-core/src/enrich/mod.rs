//! Embedded-content enrichment.
//!
//! Extracts outbound links from a post, fetches article text through the
//! `WebFetcher` seam and video transcripts through the `Transcriber` seam,
//! and assembles the `extra_content` / `extra_urls` pair consumed by the
//! Organize stage. The two traits are the boundaries to the external
//! collaborators (headless-browser fetcher, transcription engine); the
//! in-tree defaults are `HttpWebFetcher` and `NullTranscriber`.

pub mod links;
pub mod video;
mod web;

pub use web::HttpWebFetcher;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::EnrichError;

/// Maximum article content length carried into a post.
const MAX_CONTENT_LENGTH: usize = 50_000;

/// A cleaned web page returned by a `WebFetcher`.
#[derive(Debug, Clone)]
pub struct WebPage {
    /// Page title.
    pub title: String,
    /// The fetched URL.
    pub link: String,
    /// Cleaned text content.
    pub content: String,
}

/// Seam to the external web-page-to-text collaborator.
#[async_trait::async_trait]
pub trait WebFetcher: Send + Sync {
    /// Fetch and clean a page. `Ok(None)` means the page had no usable text.
    async fn fetch(&self, url: &str) -> Result<Option<WebPage>, EnrichError>;
}

/// Seam to the external video transcription collaborator.
///
/// Implementations may write artifacts (srt/txt/json) under `output_dir`.
/// A silent video surfaces as `EnrichError::NoAudioStream`, which callers
/// map to an empty transcript.
#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe the video at `video_url`.
    async fn transcribe(&self, video_url: &str, output_dir: &Path) -> Result<String, EnrichError>;
}

/// What kind of embedded resource a fetch produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddedKind {
    /// Full article text.
    Blog,
    /// Video transcript.
    Subtitle,
}

/// One fetched embedded resource.
#[derive(Debug, Clone)]
pub struct EmbeddedContent {
    /// The source URL.
    pub url: String,
    /// Resource kind.
    pub kind: EmbeddedKind,
    /// Resource title, when known.
    pub title: String,
    /// Fetched text (possibly empty for silent videos).
    pub content: String,
}

/// Facade over link classification and the external fetchers.
///
/// Per-URL failures are logged and never abort the sibling URLs or the
/// parent post.
pub struct ContentFetcher {
    web: Arc<dyn WebFetcher>,
    transcriber: Arc<dyn Transcriber>,
    raw_dir: PathBuf,
}

impl ContentFetcher {
    /// Create a facade writing transcription artifacts under `raw_dir`.
    pub fn new(web: Arc<dyn WebFetcher>, transcriber: Arc<dyn Transcriber>, raw_dir: PathBuf) -> Self {
        Self {
            web,
            transcriber,
            raw_dir,
        }
    }

    /// Extract, classify and fetch all embedded content of a text blob.
    ///
    /// Returns the fetched resources and the union of article + video +
    /// media URLs in that order (first-occurrence deduplicated).
    pub async fn fetch_embedded(&self, text: &str, title: &str) -> (Vec<EmbeddedContent>, Vec<String>) {
        if text.is_empty() {
            return (Vec::new(), Vec::new());
        }

        let classified = links::categorize(text);
        let mut results = Vec::new();

        for url in &classified.videos {
            if let Some(content) = self.fetch_video(url, title).await {
                results.push(content);
            }
        }

        for url in &classified.articles {
            match self.web.fetch(url).await {
                Ok(Some(page)) => {
                    results.push(EmbeddedContent {
                        url: url.clone(),
                        kind: EmbeddedKind::Blog,
                        title: page.title,
                        content: truncate_chars(&page.content, MAX_CONTENT_LENGTH),
                    });
                }
                Ok(None) => {
                    tracing::debug!(url = %url, "article fetch returned no content");
                }
                Err(e) => {
                    tracing::info!(url = %url, error = %e, "article fetch failed");
                }
            }
        }

        (results, classified.all_urls())
    }

    /// Transcribe a single video URL.
    ///
    /// Returns `None` for silent-video URL patterns (never invokes the
    /// transcriber) and for unresolvable URLs. A transcriber "no audio"
    /// error maps to an empty transcript.
    pub async fn fetch_video(&self, url: &str, title: &str) -> Option<EmbeddedContent> {
        if video::is_silent_video(url) {
            tracing::info!(url = %url, "skipping silent video (url pattern)");
            return None;
        }

        let (video_id, video_url) = video::resolve_video(url, title);
        let output_dir = self.raw_dir.join(&video_id);

        let transcript = match self.transcriber.transcribe(&video_url, &output_dir).await {
            Ok(text) => text,
            Err(EnrichError::NoAudioStream { .. }) => {
                tracing::info!(url = %url, "skipping silent video (no audio stream)");
                String::new()
            }
            Err(e) => {
                tracing::info!(url = %url, error = %e, "transcription failed");
                String::new()
            }
        };

        Some(EmbeddedContent {
            url: url.to_string(),
            kind: EmbeddedKind::Subtitle,
            title: title.to_string(),
            content: transcript,
        })
    }

    /// Join fetched resources into the `extra_content` blob.
    pub fn render_extra_content(contents: &[EmbeddedContent]) -> String {
        let parts: Vec<String> = contents
            .iter()
            .filter(|c| !c.content.is_empty())
            .map(|c| {
                let label = match c.kind {
                    EmbeddedKind::Blog => "Blog",
                    EmbeddedKind::Subtitle => "Subtitle",
                };
                format!("[{label}] {}", c.content)
            })
            .collect();
        parts.join("\n\n")
    }
}

/// Truncate to `max` characters, appending an ellipsis marker when cut.
fn truncate_chars(s: &str, max: usize) -> String {
    let mut taken: String = s.chars().take(max).collect();
    if taken.len() < s.len() {
        taken.push_str("...");
    }
    taken
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::video::NullTranscriber;
    use std::sync::Mutex;

    struct StubWebFetcher {
        pages: Mutex<std::collections::HashMap<String, WebPage>>,
        fail_all: bool,
    }

    impl StubWebFetcher {
        fn with_page(url: &str, content: &str) -> Self {
            let mut pages = std::collections::HashMap::new();
            pages.insert(
                url.to_string(),
                WebPage {
                    title: "stub".to_string(),
                    link: url.to_string(),
                    content: content.to_string(),
                },
            );
            Self {
                pages: Mutex::new(pages),
                fail_all: false,
            }
        }

        fn failing() -> Self {
            Self {
                pages: Mutex::new(std::collections::HashMap::new()),
                fail_all: true,
            }
        }
    }

    #[async_trait::async_trait]
    impl WebFetcher for StubWebFetcher {
        async fn fetch(&self, url: &str) -> Result<Option<WebPage>, EnrichError> {
            if self.fail_all {
                return Err(EnrichError::WebFetch {
                    url: url.to_string(),
                    message: "stub failure".to_string(),
                });
            }
            Ok(self.pages.lock().unwrap().get(url).cloned())
        }
    }

    struct SilentTranscriber;

    #[async_trait::async_trait]
    impl Transcriber for SilentTranscriber {
        async fn transcribe(&self, video_url: &str, _dir: &Path) -> Result<String, EnrichError> {
            Err(EnrichError::NoAudioStream {
                url: video_url.to_string(),
            })
        }
    }

    fn fetcher_with(web: Arc<dyn WebFetcher>, transcriber: Arc<dyn Transcriber>) -> ContentFetcher {
        ContentFetcher::new(web, transcriber, std::env::temp_dir().join("aiscout-test-raw"))
    }

    #[tokio::test]
    async fn fetch_embedded_collects_articles_and_urls() {
        let web = Arc::new(StubWebFetcher::with_page(
            "https://blog.example/p",
            "article body",
        ));
        let fetcher = fetcher_with(web, Arc::new(NullTranscriber));

        let (contents, urls) = fetcher
            .fetch_embedded(
                "see https://blog.example/p and https://pbs.twimg.com/media/a.jpg",
                "post",
            )
            .await;

        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].kind, EmbeddedKind::Blog);
        assert_eq!(contents[0].content, "article body");
        assert_eq!(
            urls,
            vec!["https://blog.example/p", "https://pbs.twimg.com/media/a.jpg"]
        );
    }

    #[tokio::test]
    async fn fetch_embedded_survives_fetch_failures() {
        let fetcher = fetcher_with(Arc::new(StubWebFetcher::failing()), Arc::new(NullTranscriber));

        let (contents, urls) = fetcher
            .fetch_embedded("see https://blog.example/broken", "post")
            .await;

        assert!(contents.is_empty());
        assert_eq!(urls, vec!["https://blog.example/broken"]);
    }

    #[tokio::test]
    async fn fetch_video_skips_silent_pattern_without_transcriber() {
        let fetcher = fetcher_with(Arc::new(StubWebFetcher::failing()), Arc::new(SilentTranscriber));

        let content = fetcher
            .fetch_video("https://video.twimg.com/tweet_video/abc.mp4", "t")
            .await;
        assert!(content.is_none());
    }

    #[tokio::test]
    async fn fetch_video_maps_no_audio_to_empty_transcript() {
        let fetcher = fetcher_with(Arc::new(StubWebFetcher::failing()), Arc::new(SilentTranscriber));

        let content = fetcher
            .fetch_video("https://cdn.example/clip.mp4", "demo")
            .await
            .expect("content");
        assert!(content.content.is_empty());
        assert_eq!(content.kind, EmbeddedKind::Subtitle);
    }

    #[test]
    fn render_extra_content_labels_and_skips_empty() {
        let contents = vec![
            EmbeddedContent {
                url: "a".to_string(),
                kind: EmbeddedKind::Blog,
                title: String::new(),
                content: "article".to_string(),
            },
            EmbeddedContent {
                url: "b".to_string(),
                kind: EmbeddedKind::Subtitle,
                title: String::new(),
                content: String::new(),
            },
            EmbeddedContent {
                url: "c".to_string(),
                kind: EmbeddedKind::Subtitle,
                title: String::new(),
                content: "transcript".to_string(),
            },
        ];
        assert_eq!(
            ContentFetcher::render_extra_content(&contents),
            "[Blog] article\n\n[Subtitle] transcript"
        );
    }

    #[test]
    fn truncate_chars_caps_long_content() {
        let long = "x".repeat(60_000);
        let cut = truncate_chars(&long, MAX_CONTENT_LENGTH);
        assert_eq!(cut.len(), MAX_CONTENT_LENGTH + 3);
        assert!(cut.ends_with("..."));

        let short = truncate_chars("hello", MAX_CONTENT_LENGTH);
        assert_eq!(short, "hello");
    }
}
