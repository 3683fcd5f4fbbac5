//! Tweet data model and the adapter into the common pipeline.
//!
//! `Tweet` is the flat record produced by the GraphQL parser. The adapter
//! renders each tweet into a `RawPost` whose content is a small synthetic
//! HTML document, so the Enrich stage's link extractor works on scraped
//! tweets exactly as it does on bridge RSS content.

use chrono::{DateTime, Utc};

use crate::types::{RawPost, SourceKind};

/// Media attachment of a tweet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TweetMedia {
    /// Media kind: `photo`, `video` or `animated_gif`.
    pub kind: String,
    /// Direct media URL (highest-bitrate mp4 variant for videos).
    pub url: String,
    /// Thumbnail URL.
    pub preview_url: String,
    /// Accessibility description.
    pub alt_text: String,
    /// Media width in pixels.
    pub width: u32,
    /// Media height in pixels.
    pub height: u32,
    /// Video duration in milliseconds.
    pub duration_ms: u64,
}

/// A parsed tweet.
#[derive(Debug, Clone, Default)]
pub struct Tweet {
    /// Tweet id.
    pub id: String,
    /// Full text (note-tweet text for long-form posts).
    pub text: String,
    /// Publish time, UTC. `None` when the date was unparseable.
    pub created_at: Option<DateTime<Utc>>,
    /// Author user id.
    pub user_id: String,
    /// Author handle (without @).
    pub username: String,
    /// Author display name.
    pub display_name: String,

    /// Reply count.
    pub reply_count: u64,
    /// Retweet count.
    pub retweet_count: u64,
    /// Like count.
    pub like_count: u64,
    /// View count.
    pub view_count: u64,
    /// Bookmark count.
    pub bookmark_count: u64,
    /// Quote count.
    pub quote_count: u64,

    /// External URLs from the tweet body (expanded).
    pub urls: Vec<String>,
    /// Media attachments.
    pub media: Vec<TweetMedia>,

    /// Whether this is a retweet.
    pub is_retweet: bool,
    /// Whether this quotes another tweet.
    pub is_quote: bool,
    /// The quoted tweet, when present.
    pub quoted_tweet: Option<Box<Tweet>>,
    /// The retweeted tweet, when present.
    pub retweeted_tweet: Option<Box<Tweet>>,

    /// Id of the tweet this replies to.
    pub in_reply_to_id: Option<String>,
    /// Handle of the user this replies to.
    pub in_reply_to_username: Option<String>,
    /// Conversation thread id.
    pub conversation_id: Option<String>,

    /// Language code.
    pub lang: String,
    /// Publishing client name.
    pub client_source: String,
}

impl Tweet {
    /// Permanent link to the tweet.
    pub fn permalink(&self) -> String {
        format!("https://x.com/{}/status/{}", self.username, self.id)
    }

    /// Publish date as `YYYY-MM-DD`, empty when unknown.
    pub fn date_str(&self) -> String {
        self.created_at
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    }

    /// Render the tweet as a synthetic HTML document.
    ///
    /// Body text in a `<p>` with URLs wrapped in `<a>` tags, media as
    /// `<img>`/`<video>` elements, and any quoted tweet as a
    /// `<blockquote>`. The shape matches what the bridge used to emit, so
    /// downstream link extraction is shared.
    pub fn content_html(&self) -> String {
        let mut text = escape_html(&self.text);
        let mut trailing = Vec::new();

        for url in &self.urls {
            let escaped = escape_html(url);
            let anchor = format!("<a href=\"{escaped}\">{escaped}</a>");
            if text.contains(&escaped) {
                text = text.replace(&escaped, &anchor);
            } else {
                // Shortened in the body; append the expanded link.
                trailing.push(anchor);
            }
        }

        let mut parts = vec![format!("<p>{text}</p>")];
        parts.extend(trailing);

        for m in &self.media {
            match m.kind.as_str() {
                "photo" => parts.push(format!("<img src=\"{}\" />", escape_html(&m.url))),
                "video" | "animated_gif" => {
                    parts.push(format!("<video src=\"{}\"></video>", escape_html(&m.url)));
                }
                _ => {}
            }
        }

        if let Some(quoted) = &self.quoted_tweet {
            let preview: String = quoted.text.chars().take(200).collect();
            parts.push(format!(
                "<blockquote><p><b>@{}</b>: {}</p><a href=\"{}\">{}</a></blockquote>",
                escape_html(&quoted.username),
                escape_html(&preview),
                escape_html(&quoted.permalink()),
                escape_html(&quoted.permalink()),
            ));
        }

        parts.join("\n")
    }

    /// Convert into the pipeline's `RawPost` shape.
    pub fn to_raw_post(&self, source_name: &str) -> RawPost {
        let title = if self.is_retweet {
            if let Some(rt) = &self.retweeted_tweet {
                let preview: String = rt.text.chars().take(80).collect();
                format!("RT @{}: {}", rt.username, preview)
            } else {
                self.text.chars().take(100).collect()
            }
        } else if self.text.is_empty() {
            "(No text)".to_string()
        } else {
            self.text.chars().take(100).collect()
        };

        RawPost {
            title,
            date: self.date_str(),
            link: self.permalink(),
            source_type: SourceKind::X,
            source_name: source_name.to_string(),
            content: self.content_html(),
        }
    }
}

/// Minimal HTML escaping for the synthetic document.
fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
