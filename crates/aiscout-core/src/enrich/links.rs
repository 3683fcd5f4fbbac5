//! URL extraction and classification for embedded content.
//!
//! Splits the outbound links of a post into articles (fetch full text),
//! videos (transcribe), media (collect but do not fetch), and platform
//! self-references (ignore).

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

/// Video platform canonical domains.
const YOUTUBE_DOMAINS: &[&str] = &["youtube.com", "youtu.be", "m.youtube.com"];

/// Known video-attachment CDN of the X platform.
const VIDEO_DOMAINS: &[&str] = &["video.twimg.com"];

/// Path extensions treated as direct video files.
const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".mov", ".webm", ".mkv"];

/// Media/image CDNs: collected as URLs but never fetched.
const MEDIA_DOMAINS: &[&str] = &["twimg.com", "pbs.twimg.com"];

/// The platform itself, its shortener, and its image host: self-references.
const SELF_DOMAINS: &[&str] = &["twitter.com", "x.com", "t.co", "pic.twitter.com"];

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"https?://[^\s<>"{}|\\^`\[\]]+"#).expect("url regex must compile")
    })
}

/// Outbound links of a post, classified.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClassifiedLinks {
    /// Blog/article pages to fetch.
    pub articles: Vec<String>,
    /// Video URLs to transcribe.
    pub videos: Vec<String>,
    /// Media resources, collected but not fetched.
    pub media: Vec<String>,
}

impl ClassifiedLinks {
    /// All collected URLs in article, video, media order.
    pub fn all_urls(&self) -> Vec<String> {
        let mut urls = self.articles.clone();
        urls.extend(self.videos.iter().cloned());
        urls.extend(self.media.iter().cloned());
        urls
    }
}

/// Extract all URLs from a text blob, deduplicated in first-occurrence order.
///
/// Trailing sentence punctuation is trimmed from each match.
pub fn extract_urls(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut seen = std::collections::HashSet::new();
    let mut urls = Vec::new();
    for m in url_re().find_iter(text) {
        let url = m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?']);
        if seen.insert(url.to_string()) {
            urls.push(url.to_string());
        }
    }
    urls
}

/// Extract and classify the URLs of a text blob.
pub fn categorize(text: &str) -> ClassifiedLinks {
    let mut links = ClassifiedLinks::default();

    for raw in extract_urls(text) {
        let Ok(parsed) = Url::parse(&raw) else {
            continue;
        };
        let Some(host) = parsed.host_str().map(str::to_lowercase) else {
            continue;
        };
        let path = parsed.path().to_lowercase();

        let is_video = host_matches_any(&host, YOUTUBE_DOMAINS)
            || host_matches_any(&host, VIDEO_DOMAINS)
            || VIDEO_EXTENSIONS.iter().any(|ext| path.ends_with(ext));

        if is_video {
            links.videos.push(raw);
        } else if host_matches_any(&host, MEDIA_DOMAINS) {
            links.media.push(raw);
        } else if host_matches_any(&host, SELF_DOMAINS) {
            // Platform self-reference, ignored entirely.
        } else {
            links.articles.push(raw);
        }
    }

    links
}

/// Exact or dot-boundary suffix match against a domain table.
fn host_matches_any(host: &str, domains: &[&str]) -> bool {
    domains
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{d}")))
}
