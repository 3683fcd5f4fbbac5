//! Direct X GraphQL API client.
//!
//! Drives the platform's internal GraphQL surface the way the web front-end
//! does: browser-emulated TLS via `rquest`, the fixed public bearer token,
//! per-request CSRF/cookie material from the credential pool, and the full
//! feature-flag set the front-end sends. Rate limits rotate credentials into
//! cooldown, auth failures retire them, and a process-wide circuit breaker
//! halts all traffic after a run of consecutive failures.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::Rng;
use rquest::Client;
use rquest_util::Emulation;
use serde_json::{json, Value};

use super::account_pool::{AccountPool, Credential};
use super::models::Tweet;
use super::parser;
use crate::error::XClientError;

/// Fixed bearer token of the web front-end, shared by all logged-in
/// sessions (extracted from the public JS bundle).
const WEB_BEARER_TOKEN: &str = "Bearer AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs\
                                %3D1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA";

/// Fallback rate-limit cooldown when Retry-After is absent or unparsable.
const DEFAULT_RATE_LIMIT_SECS: u64 = 900;

/// Bound on waiting for a cooling credential inside the retry loop.
const POOL_WAIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Joint User-Agent / TLS-emulation profiles. Picking both from one profile
/// keeps the header and the handshake consistent.
const UA_PROFILES: &[(&str, Emulation)] = &[
    (
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        Emulation::Chrome131,
    ),
    (
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        Emulation::Chrome131,
    ),
    (
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        Emulation::Chrome131,
    ),
];

/// Built-in GraphQL query ids, version-coupled to the front-end.
/// Overridable through `[x_scraper] query_ids` when the front-end moves.
fn default_query_ids() -> HashMap<String, String> {
    HashMap::from([
        ("UserByScreenName".to_string(), "xmU6X_CKVnQ5lSrCbAmJsg".to_string()),
        ("UserTweets".to_string(), "E3opETHurmVJflFsUBVuUQ".to_string()),
    ])
}

/// The feature flags the current front-end sends. The set must match what
/// the browser sends or requests fail with "features cannot be null".
fn default_features() -> serde_json::Map<String, Value> {
    let flags = json!({
        "rweb_tipjar_consumption_enabled": true,
        "responsive_web_graphql_exclude_directive_enabled": true,
        "verified_phone_label_enabled": false,
        "creator_subscriptions_tweet_preview_api_enabled": true,
        "responsive_web_graphql_timeline_navigation_enabled": true,
        "responsive_web_graphql_skip_user_profile_image_extensions_enabled": false,
        "communities_web_enable_tweet_community_results_fetch": true,
        "c9s_tweet_anatomy_moderator_badge_enabled": true,
        "articles_preview_enabled": true,
        "responsive_web_edit_tweet_api_enabled": true,
        "graphql_is_translatable_rweb_tweet_is_translatable_enabled": true,
        "view_counts_everywhere_api_enabled": true,
        "longform_notetweets_consumption_enabled": true,
        "responsive_web_twitter_article_tweet_consumption_enabled": true,
        "tweet_awards_web_tipping_enabled": false,
        "creator_subscriptions_quote_tweet_preview_enabled": false,
        "freedom_of_speech_not_reach_fetch_enabled": true,
        "standardized_nudges_misinfo": true,
        "tweet_with_visibility_results_prefer_gql_limited_actions_policy_enabled": true,
        "rweb_video_timestamps_enabled": true,
        "longform_notetweets_rich_text_read_enabled": true,
        "longform_notetweets_inline_media_enabled": true,
        "responsive_web_enhance_cards_enabled": false,
        "profile_label_improvements_pcf_label_in_post_enabled": false,
        "highlights_tweets_tab_ui_enabled": true,
        "subscriptions_verification_info_is_identity_verified_enabled": true,
        "subscriptions_verification_info_verified_since_enabled": true,
        "hidden_profile_subscriptions_enabled": true,
        "responsive_web_twitter_article_notes_tab_enabled": true,
        "subscriptions_feature_can_gift_premium": true,
    });
    match flags {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

/// Client construction options.
#[derive(Debug, Clone)]
pub struct XClientConfig {
    /// Per-request HTTP timeout.
    pub timeout: Duration,
    /// Attempts per logical call.
    pub max_retries: u32,
    /// Consecutive failures before the breaker opens.
    pub circuit_breaker_threshold: u32,
    /// How long the breaker stays open.
    pub circuit_breaker_cooldown: Duration,
    /// Query-id overrides merged onto the built-in defaults.
    pub query_ids: HashMap<String, String>,
    /// Feature-flag overrides merged onto the built-in defaults.
    pub features: serde_json::Map<String, Value>,
    /// API base, overridable for tests.
    pub base_url: String,
}

impl Default for XClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            circuit_breaker_threshold: 5,
            circuit_breaker_cooldown: Duration::from_secs(60),
            query_ids: HashMap::new(),
            features: serde_json::Map::new(),
            base_url: "https://x.com".to_string(),
        }
    }
}

/// Process-wide breaker over consecutive request failures.
///
/// Protects the pool from being burned down when the platform rejects all
/// traffic (an IP block looks like credential failures otherwise). Safe for
/// concurrent callers.
pub(crate) struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    state: Mutex<BreakerState>,
}

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

impl CircuitBreaker {
    pub(crate) fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown,
            state: Mutex::new(BreakerState::default()),
        }
    }

    /// Block while the breaker is open; on expiry enter half-open and let
    /// the next call probe.
    pub(crate) async fn wait_if_open(&self) {
        let remaining = {
            let state = self.state.lock().expect("breaker mutex poisoned");
            state
                .open_until
                .and_then(|until| until.checked_duration_since(Instant::now()))
        };

        if let Some(remaining) = remaining {
            tracing::warn!(wait_secs = remaining.as_secs(), "circuit breaker open, waiting");
            tokio::time::sleep(remaining.min(self.cooldown)).await;
        }

        let mut state = self.state.lock().expect("breaker mutex poisoned");
        if state.open_until.is_some() {
            state.open_until = None;
            tracing::info!("circuit breaker half-open, probing");
        }
    }

    /// Record a success, closing the breaker and resetting the counter.
    pub(crate) fn record_success(&self) {
        let mut state = self.state.lock().expect("breaker mutex poisoned");
        if state.consecutive_failures > 0 {
            tracing::info!(
                failures = state.consecutive_failures,
                "circuit breaker recovered"
            );
        }
        state.consecutive_failures = 0;
        state.open_until = None;
    }

    /// Record a failure. Returns true when this failure opened the breaker.
    pub(crate) fn record_failure(&self) -> bool {
        let mut state = self.state.lock().expect("breaker mutex poisoned");
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.threshold {
            state.open_until = Some(Instant::now() + self.cooldown);
            tracing::error!(
                failures = state.consecutive_failures,
                cooldown_secs = self.cooldown.as_secs(),
                "circuit breaker opened"
            );
            return true;
        }
        false
    }

    #[cfg(test)]
    pub(crate) fn consecutive_failures(&self) -> u32 {
        self.state
            .lock()
            .expect("breaker mutex poisoned")
            .consecutive_failures
    }

    #[cfg(test)]
    pub(crate) fn is_open(&self) -> bool {
        self.state
            .lock()
            .expect("breaker mutex poisoned")
            .open_until
            .map_or(false, |until| until > Instant::now())
    }
}

struct Transport {
    user_agent: &'static str,
    client: Client,
}

/// Authenticated GraphQL client with rotation, retry and breaker logic.
pub struct XClient {
    pool: Arc<AccountPool>,
    transports: Vec<Transport>,
    base_url: String,
    max_retries: u32,
    breaker: CircuitBreaker,
    query_ids: HashMap<String, String>,
    features_json: String,
    field_toggles_json: String,
    user_id_cache: Mutex<HashMap<String, String>>,
}

impl XClient {
    /// Build a client over the given credential pool.
    ///
    /// One HTTP client is pre-built per UA/TLS profile; each request picks a
    /// profile at random so the header and handshake always agree.
    pub fn new(pool: Arc<AccountPool>, config: XClientConfig) -> Result<Self, XClientError> {
        let mut transports = Vec::with_capacity(UA_PROFILES.len());
        for (user_agent, emulation) in UA_PROFILES {
            let client = Client::builder()
                .emulation(*emulation)
                .timeout(config.timeout)
                .build()
                .map_err(|e| XClientError::Transient {
                    message: format!("failed to build HTTP transport: {e}"),
                })?;
            transports.push(Transport { user_agent, client });
        }

        let mut query_ids = default_query_ids();
        query_ids.extend(config.query_ids);

        let mut features = default_features();
        features.extend(config.features);
        let features_json = serde_json::to_string(&features).unwrap_or_else(|_| "{}".to_string());

        let field_toggles_json =
            serde_json::to_string(&json!({"withArticlePlainText": false}))
                .unwrap_or_else(|_| "{}".to_string());

        Ok(Self {
            pool,
            transports,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries.max(1),
            breaker: CircuitBreaker::new(
                config.circuit_breaker_threshold,
                config.circuit_breaker_cooldown,
            ),
            query_ids,
            features_json,
            field_toggles_json,
            user_id_cache: Mutex::new(HashMap::new()),
        })
    }

    /// Shared view of the credential pool.
    pub fn pool(&self) -> &AccountPool {
        &self.pool
    }

    fn graphql_url(&self, operation: &str) -> String {
        let query_id = self
            .query_ids
            .get(operation)
            .map(String::as_str)
            .unwrap_or("");
        format!("{}/i/api/graphql/{}/{}", self.base_url, query_id, operation)
    }

    fn pick_transport(&self) -> &Transport {
        let idx = rand::thread_rng().gen_range(0..self.transports.len());
        &self.transports[idx]
    }

    async fn send_request(
        &self,
        url: &str,
        params: &[(&str, &str)],
        credential: &Credential,
    ) -> Result<Value, XClientError> {
        let transport = self.pick_transport();

        let response = transport
            .client
            .get(url)
            .query(params)
            .header("authorization", WEB_BEARER_TOKEN)
            .header("x-csrf-token", &credential.ct0)
            .header("x-twitter-active-user", "yes")
            .header("x-twitter-auth-type", "OAuth2Session")
            .header("x-twitter-client-language", "en")
            .header("content-type", "application/json")
            .header("user-agent", transport.user_agent)
            .header("accept", "*/*")
            .header("accept-language", "en-US,en;q=0.9")
            .header("referer", "https://x.com/")
            .header("origin", "https://x.com")
            .header(
                "cookie",
                format!("auth_token={}; ct0={}", credential.auth_token, credential.ct0),
            )
            .send()
            .await
            .map_err(|e| XClientError::Transient {
                message: format!("request failed: {e}"),
            })?;

        let status = response.status().as_u16();

        match status {
            200 => {
                let body: Value = response.json().await.map_err(|e| XClientError::Transient {
                    message: format!("invalid JSON body: {e}"),
                })?;
                classify_graphql_body(body)
            }
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or_else(|| {
                        tracing::warn!("unparsable retry-after header, using default");
                        DEFAULT_RATE_LIMIT_SECS
                    });
                Err(XClientError::RateLimited { retry_after })
            }
            401 | 403 => Err(XClientError::Auth {
                message: format!("HTTP {status}: token expired or banned"),
            }),
            other => {
                let body = response.text().await.unwrap_or_default();
                let snippet: String = body.chars().take(200).collect();
                Err(XClientError::Transient {
                    message: format!("HTTP {other}: {snippet}"),
                })
            }
        }
    }

    /// One logical call: up to `max_retries` attempts with credential
    /// rotation, per-class handling and breaker accounting.
    ///
    /// Returns `None` when every attempt failed or no credential was
    /// obtainable.
    async fn request_with_retry(&self, url: &str, params: &[(&str, &str)]) -> Option<Value> {
        self.breaker.wait_if_open().await;

        for attempt in 0..self.max_retries {
            let credential = match self.pool.get_next() {
                Some(c) => c,
                None => match self.pool.wait_for_available(POOL_WAIT_TIMEOUT).await {
                    Some(c) => c,
                    None => {
                        tracing::error!("no usable credential, aborting call");
                        return None;
                    }
                },
            };

            match self.send_request(url, params, &credential).await {
                Ok(body) => {
                    self.breaker.record_success();
                    return Some(body);
                }
                Err(XClientError::RateLimited { retry_after }) => {
                    self.pool.mark_rate_limited(credential.index, Some(retry_after));
                    let opened = self.breaker.record_failure();
                    tracing::warn!(
                        credential = credential.index,
                        attempt = attempt + 1,
                        max = self.max_retries,
                        "credential rate limited"
                    );
                    if opened {
                        break;
                    }
                }
                Err(XClientError::Auth { message }) => {
                    self.pool.mark_dead(credential.index, &message);
                    let opened = self.breaker.record_failure();
                    tracing::error!(credential = credential.index, error = %message, "auth failure");
                    if opened {
                        break;
                    }
                }
                Err(e) => {
                    let opened = self.breaker.record_failure();
                    tracing::warn!(
                        attempt = attempt + 1,
                        max = self.max_retries,
                        error = %e,
                        "request failed"
                    );
                    if opened {
                        break;
                    }
                    if attempt + 1 < self.max_retries {
                        let backoff = Duration::from_secs(u64::from(attempt + 1) * 2);
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }

        tracing::error!(retries = self.max_retries, "call failed after all retries");
        None
    }

    /// Resolve a handle to its numeric user id. Cached per client.
    pub async fn get_user_id(&self, username: &str) -> Option<String> {
        if let Some(cached) = self
            .user_id_cache
            .lock()
            .expect("cache mutex poisoned")
            .get(username)
        {
            return Some(cached.clone());
        }

        let url = self.graphql_url("UserByScreenName");
        let variables = json!({
            "screen_name": username,
            "withSafetyModeUserFields": true,
        })
        .to_string();

        let params = [
            ("variables", variables.as_str()),
            ("features", self.features_json.as_str()),
            ("fieldToggles", self.field_toggles_json.as_str()),
        ];

        let response = self.request_with_retry(&url, &params).await?;
        let user_id = parser::parse_user_id(&response)?;

        tracing::debug!(username = %username, user_id = %user_id, "resolved user id");
        self.user_id_cache
            .lock()
            .expect("cache mutex poisoned")
            .insert(username.to_string(), user_id.clone());

        Some(user_id)
    }

    /// Fetch one timeline page for a user.
    ///
    /// When `include_replies` is false, replies are filtered out except
    /// self-replies (thread continuations).
    pub async fn get_user_tweets(
        &self,
        user_id: &str,
        count: u32,
        cursor: Option<&str>,
        include_replies: bool,
    ) -> (Vec<Tweet>, Option<String>) {
        let url = self.graphql_url("UserTweets");

        let mut variables = json!({
            "userId": user_id,
            "count": count.min(100),
            "includePromotedContent": false,
            "withQuickPromoteEligibilityTweetFields": true,
            "withVoice": true,
            "withV2Timeline": true,
        });
        if let Some(cursor) = cursor {
            variables["cursor"] = Value::String(cursor.to_string());
        }
        let variables = variables.to_string();

        let params = [
            ("variables", variables.as_str()),
            ("features", self.features_json.as_str()),
            ("fieldToggles", self.field_toggles_json.as_str()),
        ];

        let Some(response) = self.request_with_retry(&url, &params).await else {
            return (Vec::new(), None);
        };

        let page = parser::parse_timeline(&response);
        let mut tweets = page.tweets;

        if !include_replies {
            tweets.retain(|t| {
                t.in_reply_to_id.is_none()
                    || t.in_reply_to_username.as_deref() == Some(t.username.as_str())
            });
        }

        (tweets, page.next_cursor)
    }

    /// Fetch a user's timeline with automatic pagination.
    ///
    /// Pages of at most 20 items are requested until a termination
    /// condition fires: the whole page falls outside the date window, a
    /// pinned/duplicate-dominated page adds nothing, the stale ratio of a
    /// zero-add page reaches 0.9, three consecutive pages add nothing, the
    /// cursor loops, or `limit` is reached.
    pub async fn get_user_tweets_all(
        &self,
        user_id: &str,
        limit: usize,
        since: Option<DateTime<Utc>>,
        include_replies: bool,
        include_retweets: bool,
        page_delay: (f64, f64),
    ) -> Vec<Tweet> {
        const MAX_EMPTY_ADD_PAGES: u32 = 3;
        const NEAR_ALL_OLD_THRESHOLD: f64 = 0.9;

        let mut all_tweets: Vec<Tweet> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut page_number = 0u32;
        let mut seen_tweet_ids: std::collections::HashSet<String> = std::collections::HashSet::new();
        let mut seen_cursors: std::collections::HashSet<String> = std::collections::HashSet::new();
        let mut duplicate_hit_counts: HashMap<String, u32> = HashMap::new();
        let mut empty_add_pages = 0u32;

        while all_tweets.len() < limit {
            page_number += 1;
            // Page cap of 20 keeps request shapes inside what the web app
            // itself asks for.
            let per_page = 20.min(limit - all_tweets.len()) as u32;
            let request_cursor = cursor.clone();

            let (tweets, next_cursor) = self
                .get_user_tweets(user_id, per_page, request_cursor.as_deref(), include_replies)
                .await;

            if tweets.is_empty() {
                tracing::info!(
                    page = page_number,
                    cursor = request_cursor.as_deref().unwrap_or("<start>"),
                    "page returned 0 tweets, stopping pagination"
                );
                break;
            }

            // The date check drives termination; the retweet/dup checks only
            // decide membership. Conflating them makes an all-retweet page
            // look like an all-stale page.
            let mut page_has_new_enough = false;
            let raw_count = tweets.len();
            let mut skipped_old = 0usize;
            let mut skipped_retweet = 0usize;
            let mut skipped_duplicate = 0usize;
            let mut added_count = 0usize;
            let mut duplicate_sample_id = String::new();

            for tweet in tweets {
                let in_date_range = match (since, tweet.created_at) {
                    (Some(cutoff), Some(created)) => created >= cutoff,
                    _ => true,
                };
                if in_date_range {
                    page_has_new_enough = true;
                } else {
                    skipped_old += 1;
                    continue;
                }

                if !include_retweets && tweet.is_retweet {
                    skipped_retweet += 1;
                    continue;
                }

                if seen_tweet_ids.contains(&tweet.id) {
                    skipped_duplicate += 1;
                    if !tweet.id.is_empty() {
                        *duplicate_hit_counts.entry(tweet.id.clone()).or_insert(0) += 1;
                        if duplicate_sample_id.is_empty() {
                            duplicate_sample_id = tweet.id.clone();
                        }
                    }
                    continue;
                }

                seen_tweet_ids.insert(tweet.id.clone());
                all_tweets.push(tweet);
                added_count += 1;

                if all_tweets.len() >= limit {
                    break;
                }
            }

            tracing::info!(
                page = page_number,
                cursor = request_cursor.as_deref().unwrap_or("<start>"),
                next = next_cursor.as_deref().unwrap_or("<none>"),
                raw = raw_count,
                add = added_count,
                skip_old = skipped_old,
                skip_rt = skipped_retweet,
                skip_dup = skipped_duplicate,
                total = all_tweets.len(),
                dup_sample = %duplicate_sample_id,
                "timeline page"
            );

            if added_count == 0 {
                empty_add_pages += 1;
            } else {
                empty_add_pages = 0;
            }

            // Pinned/duplicate-dominated page with no progress.
            if added_count == 0
                && skipped_duplicate > 0
                && !duplicate_sample_id.is_empty()
                && skipped_old + skipped_retweet + skipped_duplicate >= raw_count
            {
                tracing::info!(
                    dup_sample = %duplicate_sample_id,
                    "duplicate-dominated page with no new tweets, stopping pagination"
                );
                break;
            }

            // Nearly everything on the page is stale and nothing was added.
            let old_ratio = if raw_count > 0 {
                skipped_old as f64 / raw_count as f64
            } else {
                0.0
            };
            if added_count == 0 && since.is_some() && old_ratio >= NEAR_ALL_OLD_THRESHOLD {
                tracing::info!(
                    old_ratio = format!("{:.0}%", old_ratio * 100.0),
                    "stale-dominated page with no new tweets, stopping pagination"
                );
                break;
            }

            if empty_add_pages >= MAX_EMPTY_ADD_PAGES {
                tracing::info!(
                    empty_pages = empty_add_pages,
                    "too many consecutive zero-add pages, stopping pagination"
                );
                break;
            }

            // The whole page predates the window.
            if since.is_some() && !page_has_new_enough {
                tracing::debug!("entire page predates the date window, stopping pagination");
                break;
            }

            let Some(next) = next_cursor else {
                break;
            };
            if Some(&next) == cursor.as_ref() {
                tracing::warn!("cursor repeated, stopping pagination");
                break;
            }
            if seen_cursors.contains(&next) {
                tracing::warn!("cursor loop detected, stopping pagination");
                break;
            }
            seen_cursors.insert(next.clone());
            cursor = Some(next);

            let delay = rand::thread_rng().gen_range(page_delay.0..=page_delay.1.max(page_delay.0));
            tracing::debug!(delay_secs = format!("{delay:.1}"), "inter-page delay");
            tokio::time::sleep(Duration::from_secs_f64(delay)).await;
        }

        if !duplicate_hit_counts.is_empty() {
            let mut top: Vec<(&String, &u32)> = duplicate_hit_counts.iter().collect();
            top.sort_by(|a, b| b.1.cmp(a.1));
            let summary: Vec<String> = top
                .iter()
                .take(3)
                .map(|(id, count)| format!("{id}({count})"))
                .collect();
            tracing::info!(top_duplicates = %summary.join(", "), "cross-page duplicate hits");
        }

        tracing::info!(
            tweets = all_tweets.len(),
            pages = page_number,
            "pagination sweep complete"
        );
        all_tweets
    }
}

/// Classify an HTTP-200 GraphQL body.
///
/// Errors alongside data are warnings only; errors without data map to the
/// rate-limit / auth / transient taxonomy by code and message.
fn classify_graphql_body(body: Value) -> Result<Value, XClientError> {
    let errors = body.get("errors").and_then(Value::as_array);
    let has_data = body
        .get("data")
        .map_or(false, |d| !d.is_null());

    let Some(errors) = errors.filter(|e| !e.is_empty()) else {
        return Ok(body);
    };

    if has_data {
        tracing::warn!(errors = errors.len(), "GraphQL partial response with warnings");
        return Ok(body);
    }

    let first = errors.first().cloned().unwrap_or(Value::Null);
    let code = first.get("code").and_then(Value::as_i64);
    let message = first
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let message_lower = message.to_lowercase();

    let joined: String = errors
        .iter()
        .take(3)
        .map(|e| {
            e.get("message")
                .and_then(Value::as_str)
                .map_or_else(|| e.to_string(), str::to_string)
        })
        .collect::<Vec<_>>()
        .join("; ");

    if code == Some(88) || message_lower.contains("rate limit") {
        return Err(XClientError::RateLimited {
            retry_after: DEFAULT_RATE_LIMIT_SECS,
        });
    }

    if matches!(code, Some(32) | Some(64) | Some(89))
        || ["unauthorized", "forbidden", "auth"]
            .iter()
            .any(|k| message_lower.contains(k))
    {
        return Err(XClientError::Auth {
            message: format!("GraphQL auth error: {joined}"),
        });
    }

    Err(XClientError::Transient {
        message: format!("GraphQL error: {joined}"),
    })
}
