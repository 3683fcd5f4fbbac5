//! GraphQL timeline response parser.
//!
//! Converts the deeply nested UserTweets / UserByScreenName response trees
//! into flat `Tweet` records. All shape assumptions live here: unknown or
//! hostile shapes degrade to skipped entries at this boundary instead of
//! leaking nulls downstream.

use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;

use super::models::{Tweet, TweetMedia};

/// The platform's fixed timestamp format: `Mon Feb 09 12:34:56 +0000 2026`.
const TWEET_DATE_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

fn source_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r">(.+?)</a>").expect("source label regex must compile"))
}

/// One parsed timeline page.
#[derive(Debug, Default)]
pub struct TimelinePage {
    /// Tweets in timeline order, deduplicated within the page.
    pub tweets: Vec<Tweet>,
    /// Bottom cursor for the next page, `None` at the end.
    pub next_cursor: Option<String>,
}

/// Extract the numeric user id from a UserByScreenName response.
///
/// Returns `None` for unavailable users (banned or private).
pub fn parse_user_id(response: &Value) -> Option<String> {
    let result = walk(response, &["data", "user", "result"])?;
    if result.get("__typename").and_then(Value::as_str) == Some("UserUnavailable") {
        tracing::warn!("user unavailable (banned or private)");
        return None;
    }
    result
        .get("rest_id")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Parse a UserTweets response into tweets plus the next cursor.
///
/// A tweet surfaced both by a pin instruction and by the ordinary
/// add-entries instruction is emitted once.
pub fn parse_timeline(response: &Value) -> TimelinePage {
    let mut page = TimelinePage::default();
    let mut seen_ids: HashSet<String> = HashSet::new();

    let instructions = walk(
        response,
        &["data", "user", "result", "timeline_v2", "timeline", "instructions"],
    )
    .and_then(Value::as_array);

    let Some(instructions) = instructions else {
        tracing::error!("timeline response missing instructions");
        return page;
    };

    for instruction in instructions {
        match instruction.get("type").and_then(Value::as_str) {
            Some("TimelineAddEntries") => {
                let entries = instruction
                    .get("entries")
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default();

                for entry in entries {
                    let entry_id = entry.get("entryId").and_then(Value::as_str).unwrap_or("");

                    if entry_id.starts_with("tweet-") {
                        if let Some(tweet) = parse_tweet_entry(entry) {
                            if seen_ids.insert(tweet.id.clone()) {
                                page.tweets.push(tweet);
                            }
                        }
                    } else if entry_id.starts_with("cursor-bottom-") {
                        if let Some(value) = walk(entry, &["content", "value"])
                            .and_then(Value::as_str)
                            .filter(|v| !v.is_empty())
                        {
                            page.next_cursor = Some(value.to_string());
                        }
                    } else if entry_id.starts_with("profile-conversation-")
                        || entry_id.starts_with("homeConversation-")
                    {
                        for tweet in parse_module_entry(entry) {
                            if seen_ids.insert(tweet.id.clone()) {
                                page.tweets.push(tweet);
                            }
                        }
                    }
                }
            }
            Some("TimelinePinEntry") => {
                if let Some(tweet) = instruction.get("entry").and_then(parse_tweet_entry) {
                    if seen_ids.insert(tweet.id.clone()) {
                        page.tweets.push(tweet);
                    }
                }
            }
            _ => {}
        }
    }

    page
}

/// Parse a single timeline item entry.
fn parse_tweet_entry(entry: &Value) -> Option<Tweet> {
    let item_content = walk(entry, &["content", "itemContent"])?;

    // Promoted content is dropped outright.
    if item_content.get("promotedMetadata").is_some() {
        return None;
    }

    let result = walk(item_content, &["tweet_results", "result"])?;
    parse_tweet_result(result)
}

/// Parse a conversation-module entry (may hold several tweets).
fn parse_module_entry(entry: &Value) -> Vec<Tweet> {
    let mut tweets = Vec::new();
    let items = walk(entry, &["content", "items"])
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for item in items {
        if let Some(tweet) =
            walk(item, &["item", "itemContent", "tweet_results", "result"]).and_then(parse_tweet_result)
        {
            tweets.push(tweet);
        }
    }
    tweets
}

/// Parse a `tweet_results.result` object into a `Tweet`.
///
/// Handles the typename polymorphism of the surface:
/// `TweetWithVisibilityResults` is unwrapped, tombstones and unavailable
/// tweets are dropped, retweets and quotes recurse.
fn parse_tweet_result(result: &Value) -> Option<Tweet> {
    if result.is_null() || result.as_object().map_or(true, serde_json::Map::is_empty) {
        return None;
    }

    let typename = result.get("__typename").and_then(Value::as_str).unwrap_or("");
    if matches!(typename, "TweetTombstone" | "TweetUnavailable") {
        return None;
    }

    let result = if typename == "TweetWithVisibilityResults" {
        result.get("tweet")?
    } else {
        result
    };

    let legacy = result.get("legacy").filter(|l| l.is_object())?;

    let id = legacy
        .get("id_str")
        .and_then(Value::as_str)
        .or_else(|| result.get("rest_id").and_then(Value::as_str))
        .unwrap_or("")
        .to_string();

    let mut tweet = Tweet {
        id,
        text: extract_full_text(result, legacy),
        created_at: parse_date(legacy.get("created_at").and_then(Value::as_str).unwrap_or("")),
        lang: str_field(legacy, "lang"),
        client_source: clean_source(result.get("source").and_then(Value::as_str).unwrap_or("")),
        conversation_id: opt_str_field(legacy, "conversation_id_str"),
        in_reply_to_id: opt_str_field(legacy, "in_reply_to_status_id_str"),
        in_reply_to_username: opt_str_field(legacy, "in_reply_to_screen_name"),
        ..Tweet::default()
    };

    if let Some(user_result) = walk(result, &["core", "user_results", "result"]) {
        tweet.user_id = str_field(user_result, "rest_id");
        if let Some(user_legacy) = user_result.get("legacy") {
            tweet.username = str_field(user_legacy, "screen_name");
            tweet.display_name = str_field(user_legacy, "name");
        }
    }

    tweet.reply_count = u64_field(legacy, "reply_count");
    tweet.retweet_count = u64_field(legacy, "retweet_count");
    tweet.like_count = u64_field(legacy, "favorite_count");
    tweet.quote_count = u64_field(legacy, "quote_count");
    tweet.bookmark_count = u64_field(legacy, "bookmark_count");
    tweet.view_count = walk(result, &["views", "count"])
        .and_then(Value::as_str)
        .and_then(|c| c.parse().ok())
        .unwrap_or(0);

    tweet.urls = extract_urls(legacy);
    tweet.media = extract_media(legacy);

    if let Some(retweeted) = walk(legacy, &["retweeted_status_result", "result"]) {
        tweet.is_retweet = true;
        tweet.retweeted_tweet = parse_tweet_result(retweeted).map(Box::new);
    }

    if let Some(quoted) = walk(result, &["quoted_status_result", "result"]) {
        tweet.is_quote = true;
        tweet.quoted_tweet = parse_tweet_result(quoted).map(Box::new);
    }

    Some(tweet)
}

/// Full tweet text: long-form `note_tweet` text supersedes `legacy.full_text`.
fn extract_full_text(result: &Value, legacy: &Value) -> String {
    if let Some(note_text) = walk(result, &["note_tweet", "note_tweet_results", "result", "text"])
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
    {
        return note_text.to_string();
    }
    str_field(legacy, "full_text")
}

/// Parse the platform's fixed strftime-style date format.
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    match DateTime::parse_from_str(raw, TWEET_DATE_FORMAT) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(_) => {
            tracing::debug!(raw = %raw, "unparseable tweet date");
            None
        }
    }
}

/// Extract the client name from the `source` HTML anchor.
fn clean_source(source_html: &str) -> String {
    if source_html.is_empty() {
        return String::new();
    }
    source_label_re()
        .captures(source_html)
        .and_then(|c| c.get(1))
        .map_or_else(|| source_html.to_string(), |m| m.as_str().to_string())
}

/// Expanded outbound URLs, with the tweet's own status link filtered out.
///
/// Links to *other* posts are kept.
fn extract_urls(legacy: &Value) -> Vec<String> {
    let own_id = legacy.get("id_str").and_then(Value::as_str).unwrap_or("");
    let mut urls = Vec::new();

    let entries = walk(legacy, &["entities", "urls"])
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for entry in entries {
        let Some(expanded) = entry.get("expanded_url").and_then(Value::as_str) else {
            continue;
        };
        if expanded.is_empty() {
            continue;
        }

        let is_status_link =
            expanded.contains("/status/") && (expanded.contains("x.com") || expanded.contains("twitter.com"));
        if is_status_link {
            let status_id = expanded
                .rsplit("/status/")
                .next()
                .and_then(|rest| rest.split('?').next())
                .unwrap_or("");
            if status_id == own_id {
                continue;
            }
        }

        urls.push(expanded.to_string());
    }

    urls
}

/// Media attachments from `extended_entities.media`.
///
/// Video media select the mp4 variant with the highest bitrate.
fn extract_media(legacy: &Value) -> Vec<TweetMedia> {
    let mut media_list = Vec::new();
    let items = walk(legacy, &["extended_entities", "media"])
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for item in items {
        let kind = str_field(item, "type");
        let mut media = TweetMedia {
            kind: kind.clone(),
            alt_text: str_field(item, "ext_alt_text"),
            ..TweetMedia::default()
        };

        match kind.as_str() {
            "photo" => {
                media.url = str_field(item, "media_url_https");
                media.preview_url = media.url.clone();
            }
            "video" | "animated_gif" => {
                let variants = walk(item, &["video_info", "variants"])
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                let best = variants
                    .iter()
                    .filter(|v| v.get("content_type").and_then(Value::as_str) == Some("video/mp4"))
                    .max_by_key(|v| u64_field(v, "bitrate"));
                if let Some(best) = best {
                    media.url = str_field(best, "url");
                }
                media.preview_url = str_field(item, "media_url_https");
                media.duration_ms = walk(item, &["video_info", "duration_millis"])
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
            }
            _ => {}
        }

        if let Some(original) = item.get("original_info") {
            media.width = u64_field(original, "width") as u32;
            media.height = u64_field(original, "height") as u32;
        }

        media_list.push(media);
    }

    media_list
}

// --- typed accessor helpers ---

fn walk<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for key in path {
        current = current.get(key)?;
    }
    Some(current)
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

fn opt_str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn u64_field(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(Value::as_u64).unwrap_or(0)
}
