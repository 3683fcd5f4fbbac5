//! Direct X timeline scraper.
//!
//! Replaces the RSS bridge for X sources: resolves handles through the
//! GraphQL surface, sweeps per-user timelines with pagination, and adapts
//! tweets into the pipeline's `RawPost` shape. One `XScraper` owns the
//! credential pool, the HTTP client and the sweep policy for a batch.

pub mod account_pool;
pub mod client;
pub mod models;
pub mod parser;

pub use account_pool::{AccountPool, Credential, CredentialStatus};
pub use client::{XClient, XClientConfig};
pub use models::{Tweet, TweetMedia};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;

use crate::config::{expand_tilde, XScraperConfig};
use crate::error::XClientError;
use crate::types::RawPost;

/// High-level per-user timeline scraper.
pub struct XScraper {
    client: XClient,
    max_tweets_per_user: u32,
    page_delay: (f64, f64),
    user_switch_delay: (f64, f64),
    include_retweets: bool,
    include_replies: bool,
}

impl XScraper {
    /// Build a scraper from the `[x_scraper]` config section.
    ///
    /// Credentials come from `auth_credentials` when present, otherwise
    /// from the configured env file. Returns an error when neither yields a
    /// usable pool.
    pub fn from_config(config: &XScraperConfig) -> Result<Self, XClientError> {
        let pool = Self::load_pool(config)?;
        Self::with_pool(pool, config, None)
    }

    /// Build a scraper over an explicit pool, optionally overriding the API
    /// base (used by tests).
    pub fn with_pool(
        pool: Arc<AccountPool>,
        config: &XScraperConfig,
        base_url: Option<String>,
    ) -> Result<Self, XClientError> {
        let query_ids = config
            .query_ids
            .as_deref()
            .map(parse_query_ids)
            .unwrap_or_default();
        let features = config
            .features
            .as_deref()
            .map(parse_features)
            .unwrap_or_default();

        let mut client_config = XClientConfig {
            timeout: Duration::from_secs(config.request_timeout),
            max_retries: config.max_retries,
            circuit_breaker_threshold: config.circuit_breaker_threshold,
            circuit_breaker_cooldown: Duration::from_secs(config.circuit_breaker_cooldown),
            query_ids,
            features,
            ..XClientConfig::default()
        };
        if let Some(base_url) = base_url {
            client_config.base_url = base_url;
        }

        let client = XClient::new(pool, client_config)?;

        Ok(Self {
            client,
            max_tweets_per_user: config.max_tweets_per_user,
            page_delay: (config.request_delay_min, config.request_delay_max),
            user_switch_delay: (config.user_switch_delay_min, config.user_switch_delay_max),
            include_retweets: config.include_retweets,
            include_replies: config.include_replies,
        })
    }

    fn load_pool(config: &XScraperConfig) -> Result<Arc<AccountPool>, XClientError> {
        let inline = config.auth_credentials.trim();
        if !inline.is_empty() {
            return Ok(Arc::new(AccountPool::from_config_string(inline)?));
        }

        if let Some(env_file) = &config.env_file {
            let path = expand_tilde(env_file);
            let pool = AccountPool::from_env_file(&path)?;
            tracing::info!(path = %path.display(), "loaded X credentials from env file");
            return Ok(Arc::new(pool));
        }

        Err(XClientError::Credentials {
            message: "no auth_credentials configured and no env_file set".to_string(),
        })
    }

    /// The underlying credential pool (for status reporting).
    pub fn pool(&self) -> &AccountPool {
        self.client.pool()
    }

    /// Sweep one user's timeline.
    ///
    /// Resolution or sweep failures degrade to an empty result; they never
    /// propagate out of the scraper.
    pub async fn fetch_user_tweets(
        &self,
        username: &str,
        limit: Option<u32>,
        days_lookback: Option<i64>,
    ) -> Vec<Tweet> {
        let limit = limit.unwrap_or(self.max_tweets_per_user) as usize;

        tracing::info!(username = %username, "resolving user id");
        let Some(user_id) = self.client.get_user_id(username).await else {
            tracing::warn!(username = %username, "could not resolve user id, skipping");
            return Vec::new();
        };

        let since = days_lookback.map(|days| Utc::now() - chrono::Duration::days(days));

        tracing::info!(
            username = %username,
            limit,
            since = since.map(|s| s.format("%Y-%m-%d").to_string()).unwrap_or_default(),
            "sweeping timeline"
        );
        let tweets = self
            .client
            .get_user_tweets_all(
                &user_id,
                limit,
                since,
                self.include_replies,
                self.include_retweets,
                self.page_delay,
            )
            .await;

        tracing::info!(username = %username, tweets = tweets.len(), "timeline sweep done");
        tweets
    }

    /// Sweep one user and adapt the tweets into pipeline posts.
    pub async fn fetch_user_posts(
        &self,
        username: &str,
        source_name: &str,
        days_lookback: Option<i64>,
    ) -> Vec<RawPost> {
        self.fetch_user_tweets(username, None, days_lookback)
            .await
            .iter()
            .map(|tweet| tweet.to_raw_post(source_name))
            .collect()
    }

    /// Sweep every configured user serially with inter-user jitter.
    ///
    /// Used by the standalone scrape command; the pipeline's fetch stage
    /// drives per-user sweeps itself under its own delay policy.
    pub async fn fetch_all_configured_users(
        &self,
        accounts: &[(String, String)],
        days_lookback: i64,
    ) -> HashMap<String, Vec<RawPost>> {
        let mut results = HashMap::new();
        let total = accounts.len();
        tracing::info!(users = total, "starting batch sweep");

        for (i, (source_name, username)) in accounts.iter().enumerate() {
            tracing::info!(
                progress = format!("{}/{total}", i + 1),
                source = %source_name,
                username = %username,
                "sweeping user"
            );

            let posts = self
                .fetch_user_posts(username, source_name, Some(days_lookback))
                .await;
            results.insert(source_name.clone(), posts);

            if i + 1 < total {
                let (min, max) = self.user_switch_delay;
                let delay = rand::thread_rng().gen_range(min..=max.max(min));
                tracing::info!(delay_secs = format!("{delay:.1}"), "user switch delay");
                tokio::time::sleep(Duration::from_secs_f64(delay)).await;
            }
        }

        let total_posts: usize = results.values().map(Vec::len).sum();
        let succeeded = results.values().filter(|v| !v.is_empty()).count();
        tracing::info!(
            users = total,
            succeeded,
            posts = total_posts,
            "batch sweep complete"
        );

        results
    }
}

fn parse_query_ids(raw: &str) -> HashMap<String, String> {
    match serde_json::from_str::<HashMap<String, String>>(raw) {
        Ok(ids) => {
            tracing::info!(operations = ids.len(), "loaded query id overrides");
            ids
        }
        Err(e) => {
            tracing::warn!(error = %e, "invalid query_ids override, using defaults");
            HashMap::new()
        }
    }
}

fn parse_features(raw: &str) -> serde_json::Map<String, serde_json::Value> {
    match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(raw) {
        Ok(features) => {
            tracing::info!(flags = features.len(), "loaded feature flag overrides");
            features
        }
        Err(e) => {
            tracing::warn!(error = %e, "invalid features override, using defaults");
            serde_json::Map::new()
        }
    }
}
