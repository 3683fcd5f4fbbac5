//! Enrich stage: embedded-content expansion per source family.

use std::sync::Arc;

use crate::enrich::ContentFetcher;
use crate::types::{EnrichedPost, RawPost, SourceKind};

/// Per-item enrichment logic shared by the stage workers.
pub(crate) struct Enricher {
    fetcher: Arc<ContentFetcher>,
}

impl Enricher {
    pub(crate) fn new(fetcher: Arc<ContentFetcher>) -> Self {
        Self { fetcher }
    }

    /// Enrich one post.
    ///
    /// X posts get their embedded articles fetched and videos transcribed;
    /// video-platform posts get their own link transcribed; everything else
    /// passes through untouched. Enrichment failures degrade to empty
    /// extras, never to a dropped post.
    pub(crate) async fn enrich(&self, post: RawPost) -> EnrichedPost {
        match post.source_type {
            SourceKind::X => {
                let (contents, urls) = self.fetcher.fetch_embedded(&post.content, &post.title).await;
                if !contents.is_empty() || !urls.is_empty() {
                    tracing::info!(
                        title = %truncate_title(&post.title),
                        items = contents.len(),
                        urls = urls.len(),
                        "enriched X post"
                    );
                }
                EnrichedPost {
                    extra_content: ContentFetcher::render_extra_content(&contents),
                    extra_urls: urls,
                    post,
                }
            }
            SourceKind::YouTube => {
                let transcript = self
                    .fetcher
                    .fetch_video(&post.link, &post.title)
                    .await
                    .map(|c| c.content)
                    .unwrap_or_default();
                if !transcript.is_empty() {
                    tracing::info!(
                        title = %truncate_title(&post.title),
                        chars = transcript.len(),
                        "enriched video post"
                    );
                }
                EnrichedPost {
                    extra_content: transcript,
                    extra_urls: Vec::new(),
                    post,
                }
            }
            SourceKind::Weixin | SourceKind::Web => EnrichedPost::passthrough(post),
        }
    }
}

fn truncate_title(title: &str) -> String {
    title.chars().take(30).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::video::NullTranscriber;
    use crate::enrich::{WebFetcher, WebPage};
    use crate::error::EnrichError;
    use std::path::Path;

    struct OnePageFetcher;

    #[async_trait::async_trait]
    impl WebFetcher for OnePageFetcher {
        async fn fetch(&self, url: &str) -> Result<Option<WebPage>, EnrichError> {
            Ok(Some(WebPage {
                title: "page".to_string(),
                link: url.to_string(),
                content: "article text".to_string(),
            }))
        }
    }

    fn enricher() -> Enricher {
        Enricher::new(Arc::new(ContentFetcher::new(
            Arc::new(OnePageFetcher),
            Arc::new(NullTranscriber),
            std::env::temp_dir().join("aiscout-enrich-test"),
        )))
    }

    fn post(kind: SourceKind, content: &str) -> RawPost {
        RawPost {
            title: "title".to_string(),
            date: "2026-08-01".to_string(),
            link: "https://example.com/post".to_string(),
            source_type: kind,
            source_name: "src".to_string(),
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn x_posts_get_article_enrichment() {
        let enriched = enricher()
            .enrich(post(
                SourceKind::X,
                "<p>see <a href=\"https://blog.example/p\">https://blog.example/p</a></p>",
            ))
            .await;

        assert_eq!(enriched.extra_content, "[Blog] article text");
        assert_eq!(enriched.extra_urls, vec!["https://blog.example/p"]);
    }

    #[tokio::test]
    async fn weixin_posts_pass_through() {
        let enriched = enricher()
            .enrich(post(SourceKind::Weixin, "<p>https://blog.example/p</p>"))
            .await;

        assert!(enriched.extra_content.is_empty());
        assert!(enriched.extra_urls.is_empty());
    }

    #[tokio::test]
    async fn posts_without_urls_get_empty_extras() {
        let enriched = enricher().enrich(post(SourceKind::X, "<p>plain text</p>")).await;
        assert!(enriched.extra_content.is_empty());
        assert!(enriched.extra_urls.is_empty());
    }

    #[tokio::test]
    async fn youtube_posts_use_own_link_for_transcript() {
        // NullTranscriber yields an empty transcript; the post still flows.
        let enriched = enricher()
            .enrich(post(SourceKind::YouTube, "video description"))
            .await;
        assert!(enriched.extra_content.is_empty());
        assert_eq!(enriched.post.content, "video description");
    }
}
