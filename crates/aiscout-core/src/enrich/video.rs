//! Video URL handling for the enrichment layer.
//!
//! Derives stable video ids for transcript storage, recognizes non-video
//! platform pages, and knows which URL shapes are silent (GIF-to-MP4)
//! videos that must never reach the transcriber.

use std::path::Path;

use md5::{Digest, Md5};
use url::Url;

use crate::error::EnrichError;

/// URL path fragments of known silent videos (GIF-style, no audio track).
const SILENT_VIDEO_PATTERNS: &[&str] = &["/tweet_video/"];

/// Video platform paths that are not individual videos.
const NON_VIDEO_PATHS: &[&str] = &["/streams", "/live", "/channel/", "/c/", "/user/"];

/// Whether a URL matches a known silent-video pattern.
pub fn is_silent_video(url: &str) -> bool {
    SILENT_VIDEO_PATTERNS.iter().any(|p| url.contains(p))
}

/// Extract a YouTube video id from a URL, if it points at a single video.
///
/// Handles `youtu.be/<id>`, `youtube.com/watch?v=<id>` and
/// `youtube.com/embed/<id>`. Channel pages, live hubs and user pages yield
/// `None`.
pub fn extract_youtube_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();

    if !host.contains("youtube.com") && !host.contains("youtu.be") {
        return None;
    }

    let path = parsed.path();
    if NON_VIDEO_PATHS.iter().any(|p| path.contains(p)) {
        return None;
    }

    if host.contains("youtu.be") {
        let id = path.trim_start_matches('/');
        if id.is_empty() {
            return None;
        }
        return Some(id.split('/').next().unwrap_or(id).to_string());
    }

    if path.starts_with("/watch") {
        return parsed
            .query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned());
    }

    if let Some(rest) = path.strip_prefix("/embed/") {
        let id = rest.split('/').next().unwrap_or(rest);
        if !id.is_empty() {
            return Some(id.to_string());
        }
    }

    None
}

/// Derive a filesystem-safe id for a non-YouTube video URL.
///
/// Prefers a slug of the post title, then the URL's file stem, then a plain
/// hash; a short URL-hash suffix keeps same-titled videos apart.
pub fn generic_video_id(url: &str, title: &str) -> String {
    let url_hash = short_hash(url, 6);

    let title_slug: String = title
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .take(50)
        .collect();
    if !title_slug.trim_matches('_').is_empty() {
        return format!("{title_slug}_{url_hash}");
    }

    if let Ok(parsed) = Url::parse(url) {
        if let Some(stem) = Path::new(parsed.path()).file_stem().and_then(|s| s.to_str()) {
            let safe: String = stem
                .chars()
                .map(|c| if c.is_alphanumeric() { c } else { '_' })
                .collect();
            if !safe.is_empty() && safe.len() <= 80 {
                return format!("{safe}_{url_hash}");
            }
        }
    }

    short_hash(url, 12)
}

/// Resolve a video URL to `(video_id, canonical_url)`.
pub fn resolve_video(url: &str, title: &str) -> (String, String) {
    if let Some(id) = extract_youtube_id(url) {
        let canonical = format!("https://www.youtube.com/watch?v={id}");
        (id, canonical)
    } else {
        (generic_video_id(url, title), url.to_string())
    }
}

fn short_hash(input: &str, len: usize) -> String {
    let digest = Md5::digest(input.as_bytes());
    let mut hx = hex::encode(digest);
    hx.truncate(len);
    hx
}

/// Transcriber stand-in used when no transcription backend is wired in.
///
/// Always yields an empty transcript so enrichment degrades gracefully.
pub struct NullTranscriber;

#[async_trait::async_trait]
impl super::Transcriber for NullTranscriber {
    async fn transcribe(&self, video_url: &str, _output_dir: &Path) -> Result<String, EnrichError> {
        tracing::debug!(url = %video_url, "no transcriber configured, skipping");
        Ok(String::new())
    }
}
