//! RSS/Atom feed fetching and normalization.
//!
//! `FeedClient` fetches a feed over HTTP, parses it with `feed-rs`, and
//! normalizes each surviving entry into a `RawPost`. Normalization resolves
//! the content-vs-description quirk of upstream feeds: micro-blog feeds carry
//! valid HTML in the entry content, while bridge and video feeds only have a
//! usable description.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::FeedError;
use crate::types::{RawPost, SourceKind};

/// Default per-feed HTTP timeout.
const FEED_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP feed fetcher with date-window filtering.
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: reqwest::Client,
    days_lookback: i64,
}

impl FeedClient {
    /// Create a feed client keeping items from the last `days_lookback` days.
    pub fn new(days_lookback: i64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(FEED_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            days_lookback,
        }
    }

    /// Fetch a feed and normalize its in-window entries.
    ///
    /// Entries without a publish timestamp are skipped; entries older than
    /// the lookback window are dropped. A feed that parses but has no
    /// surviving entries yields an empty vector, not an error.
    pub async fn fetch(
        &self,
        url: &str,
        kind: SourceKind,
        source_name: &str,
    ) -> Result<Vec<RawPost>, FeedError> {
        tracing::info!(source = %source_name, kind = %kind, url = %url, "fetching feed");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let feed = feed_rs::parser::parse(&body[..]).map_err(|e| FeedError::Parse {
            message: e.to_string(),
        })?;

        let now = Utc::now();
        let mut posts = Vec::new();

        for entry in feed.entries {
            let Some(published) = entry.published else {
                // No publish timestamp: never substitute the fetch time.
                tracing::debug!(source = %source_name, "skipping entry without publish date");
                continue;
            };

            if !self.in_window(now, published) {
                continue;
            }

            let Some(link) = entry.links.first().map(|l| l.href.clone()) else {
                tracing::debug!(source = %source_name, "skipping entry without link");
                continue;
            };

            let title = entry
                .title
                .as_ref()
                .map(|t| t.content.clone())
                .unwrap_or_default();

            let content = select_content(
                kind,
                entry.content.as_ref().and_then(|c| c.body.clone()),
                entry.summary.as_ref().map(|s| s.content.clone()),
            );

            posts.push(RawPost {
                title,
                date: published.format("%Y-%m-%d").to_string(),
                link,
                source_type: kind,
                source_name: source_name.to_string(),
                content,
            });
        }

        tracing::info!(source = %source_name, posts = posts.len(), "feed normalized");
        Ok(posts)
    }

    fn in_window(&self, now: DateTime<Utc>, published: DateTime<Utc>) -> bool {
        now.signed_duration_since(published).num_days() <= self.days_lookback
    }
}

/// Pick the body for a normalized post.
///
/// Micro-blog feeds carry valid HTML in the entry content; for every other
/// family the content list is unreliable and the description is
/// authoritative.
fn select_content(kind: SourceKind, content: Option<String>, summary: Option<String>) -> String {
    match kind {
        SourceKind::Weixin => content.or(summary).unwrap_or_default(),
        SourceKind::X | SourceKind::YouTube | SourceKind::Web => {
            summary.or(content).unwrap_or_default()
        }
    }
}
