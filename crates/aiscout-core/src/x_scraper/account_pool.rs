//! Credential pool for the direct X client.
//!
//! Manages a set of `auth_token` + `ct0` pairs with round-robin rotation,
//! rate-limit cooldowns and permanent dead-marking. The pool is the one
//! piece of mutable shared state in the scraper; all state transitions run
//! under a single mutex so concurrent markers cannot lose updates.

use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::XClientError;

/// Default cooldown for a rate-limited credential when the endpoint gives
/// no Retry-After: 15 minutes.
const DEFAULT_COOLDOWN_SECS: u64 = 900;

/// A credential checked out of the pool for one request.
#[derive(Debug, Clone)]
pub struct Credential {
    /// Pool slot index.
    pub index: usize,
    /// Session auth token (cookie `auth_token`).
    pub auth_token: String,
    /// CSRF token (cookie `ct0` / header `x-csrf-token`).
    pub ct0: String,
}

/// Status snapshot of one pool slot. Token material is masked.
#[derive(Debug, Clone)]
pub struct CredentialStatus {
    /// Pool slot index.
    pub index: usize,
    /// `available`, `cooling` or `dead`.
    pub state: &'static str,
    /// Requests served by this credential.
    pub request_count: u64,
    /// Seconds until the cooldown expires (0 when not cooling).
    pub cooldown_remaining_secs: u64,
    /// First four characters of the auth token followed by `****`.
    pub token_hint: String,
    /// Most recent error recorded against this credential.
    pub last_error: String,
}

#[derive(Debug)]
struct CredentialState {
    auth_token: String,
    ct0: String,
    request_count: u64,
    cooldown_until: Option<Instant>,
    dead: bool,
    last_error: String,
}

impl CredentialState {
    fn is_available(&self, now: Instant) -> bool {
        if self.dead {
            return false;
        }
        match self.cooldown_until {
            Some(until) => until <= now,
            None => true,
        }
    }

    fn cooldown_remaining(&self, now: Instant) -> Duration {
        self.cooldown_until
            .and_then(|until| until.checked_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }
}

#[derive(Debug)]
struct PoolInner {
    accounts: Vec<CredentialState>,
    cursor: usize,
}

/// Rotating credential pool.
#[derive(Debug)]
pub struct AccountPool {
    inner: Mutex<PoolInner>,
}

impl AccountPool {
    /// Create a pool from `(auth_token, ct0)` pairs.
    pub fn new(credentials: Vec<(String, String)>) -> Result<Self, XClientError> {
        if credentials.is_empty() {
            return Err(XClientError::Credentials {
                message: "at least one auth_token:ct0 pair is required".to_string(),
            });
        }

        let accounts = credentials
            .into_iter()
            .map(|(auth_token, ct0)| CredentialState {
                auth_token: auth_token.trim().to_string(),
                ct0: ct0.trim().to_string(),
                request_count: 0,
                cooldown_until: None,
                dead: false,
                last_error: String::new(),
            })
            .collect::<Vec<_>>();

        tracing::info!(credentials = accounts.len(), "account pool initialized");
        Ok(Self {
            inner: Mutex::new(PoolInner {
                accounts,
                cursor: 0,
            }),
        })
    }

    /// Parse an inline credential string: `tok:csrf;tok:csrf`.
    ///
    /// Malformed pairs are skipped with a warning; an empty result is an
    /// error.
    pub fn from_config_string(config_str: &str) -> Result<Self, XClientError> {
        let mut credentials = Vec::new();
        for pair in config_str.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            match pair.split_once(':') {
                Some((token, csrf)) if !token.is_empty() && !csrf.is_empty() => {
                    credentials.push((token.to_string(), csrf.to_string()));
                }
                _ => {
                    let hint: String = pair.chars().take(20).collect();
                    tracing::warn!(pair = %hint, "skipping malformed credential pair");
                }
            }
        }
        Self::new(credentials)
    }

    /// Load a single credential from a line-oriented `KEY="VALUE"` file.
    ///
    /// Recognized keys are exactly `TWITTER_AUTH_TOKEN` and either
    /// `TWITTER_CT0` or `XCSRF_TOKEN` (first match wins). All other keys
    /// are ignored; suffixed variants never match.
    pub fn from_env_file(path: &Path) -> Result<Self, XClientError> {
        let contents = std::fs::read_to_string(path).map_err(|e| XClientError::Credentials {
            message: format!("cannot read env file {}: {e}", path.display()),
        })?;

        let mut auth_token = String::new();
        let mut ct0 = String::new();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim().trim_matches('"').trim_matches('\'');

            if key == "TWITTER_AUTH_TOKEN" && auth_token.is_empty() {
                auth_token = value.to_string();
            } else if (key == "TWITTER_CT0" || key == "XCSRF_TOKEN") && ct0.is_empty() {
                ct0 = value.to_string();
            }
        }

        if auth_token.is_empty() || ct0.is_empty() {
            return Err(XClientError::Credentials {
                message: format!(
                    "env file {} is missing TWITTER_AUTH_TOKEN or TWITTER_CT0",
                    path.display()
                ),
            });
        }

        Self::new(vec![(auth_token, ct0)])
    }

    /// Check out the next eligible credential (round-robin).
    ///
    /// Skips cooling and dead slots. Returns `None` when no credential is
    /// currently eligible.
    pub fn get_next(&self) -> Option<Credential> {
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("pool mutex poisoned");
        let total = inner.accounts.len();

        for _ in 0..total {
            let idx = inner.cursor;
            inner.cursor = (inner.cursor + 1) % total;

            if inner.accounts[idx].is_available(now) {
                inner.accounts[idx].request_count += 1;
                let account = &inner.accounts[idx];
                return Some(Credential {
                    index: idx,
                    auth_token: account.auth_token.clone(),
                    ct0: account.ct0.clone(),
                });
            }
        }

        None
    }

    /// Put a credential into cooldown after a rate limit.
    pub fn mark_rate_limited(&self, index: usize, cooldown_secs: Option<u64>) {
        let secs = cooldown_secs.unwrap_or(DEFAULT_COOLDOWN_SECS);
        let mut inner = self.inner.lock().expect("pool mutex poisoned");
        if let Some(account) = inner.accounts.get_mut(index) {
            account.cooldown_until = Some(Instant::now() + Duration::from_secs(secs));
            account.last_error = format!("rate limited, cooldown {secs}s");
            tracing::warn!(
                credential = index,
                cooldown_secs = secs,
                requests = account.request_count,
                "credential rate limited"
            );
        }
    }

    /// Permanently retire a credential (expired or banned token).
    pub fn mark_dead(&self, index: usize, reason: &str) {
        let mut inner = self.inner.lock().expect("pool mutex poisoned");
        if let Some(account) = inner.accounts.get_mut(index) {
            account.dead = true;
            account.last_error = if reason.is_empty() {
                "credential marked dead".to_string()
            } else {
                reason.to_string()
            };
            tracing::error!(credential = index, reason = %reason, "credential marked dead");
        }
    }

    /// Number of currently eligible credentials.
    pub fn available_count(&self) -> usize {
        let now = Instant::now();
        let inner = self.inner.lock().expect("pool mutex poisoned");
        inner.accounts.iter().filter(|a| a.is_available(now)).count()
    }

    /// Total pool size.
    pub fn total_count(&self) -> usize {
        self.inner.lock().expect("pool mutex poisoned").accounts.len()
    }

    /// Whether every credential is permanently dead.
    pub fn all_dead(&self) -> bool {
        let inner = self.inner.lock().expect("pool mutex poisoned");
        inner.accounts.iter().all(|a| a.dead)
    }

    /// Masked status snapshot of every slot.
    pub fn status(&self) -> Vec<CredentialStatus> {
        let now = Instant::now();
        let inner = self.inner.lock().expect("pool mutex poisoned");
        inner
            .accounts
            .iter()
            .enumerate()
            .map(|(index, a)| {
                let state = if a.dead {
                    "dead"
                } else if a.is_available(now) {
                    "available"
                } else {
                    "cooling"
                };
                CredentialStatus {
                    index,
                    state,
                    request_count: a.request_count,
                    cooldown_remaining_secs: a.cooldown_remaining(now).as_secs(),
                    token_hint: mask_token(&a.auth_token),
                    last_error: a.last_error.clone(),
                }
            })
            .collect()
    }

    /// Wait until a credential becomes eligible, bounded by `timeout`.
    ///
    /// When every credential is permanently dead, returns `None`
    /// immediately. Otherwise sleeps until the earliest cooldown expires
    /// (plus one second of slack) and retries.
    pub async fn wait_for_available(&self, timeout: Duration) -> Option<Credential> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(credential) = self.get_next() {
                return Some(credential);
            }

            if self.all_dead() {
                tracing::error!("all credentials permanently dead");
                return None;
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }

            let min_cooldown = {
                let inner = self.inner.lock().expect("pool mutex poisoned");
                inner
                    .accounts
                    .iter()
                    .filter(|a| !a.dead)
                    .map(|a| a.cooldown_remaining(now))
                    .filter(|d| !d.is_zero())
                    .min()
                    .unwrap_or(Duration::from_secs(1))
            };

            let wait = (min_cooldown + Duration::from_secs(1))
                .min(deadline.saturating_duration_since(now))
                .min(Duration::from_secs(60));
            if wait.is_zero() {
                break;
            }

            tracing::info!(wait_secs = wait.as_secs(), "all credentials cooling, waiting");
            tokio::time::sleep(wait).await;
        }

        tracing::error!(timeout_secs = timeout.as_secs(), "timed out waiting for a credential");
        None
    }
}

/// Mask a token to its first four characters followed by `****`.
fn mask_token(token: &str) -> String {
    let prefix: String = token.chars().take(4).collect();
    format!("{prefix}****")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_of(n: usize) -> AccountPool {
        let credentials = (0..n)
            .map(|i| (format!("token{i}abcdef"), format!("csrf{i}")))
            .collect();
        AccountPool::new(credentials).expect("pool")
    }

    #[test]
    fn empty_pool_is_an_error() {
        assert!(AccountPool::new(Vec::new()).is_err());
    }

    #[test]
    fn get_next_round_robins() {
        let pool = pool_of(3);
        let a = pool.get_next().unwrap();
        let b = pool.get_next().unwrap();
        let c = pool.get_next().unwrap();
        let d = pool.get_next().unwrap();
        assert_eq!(
            (a.index, b.index, c.index, d.index),
            (0, 1, 2, 0)
        );
    }

    #[test]
    fn get_next_skips_cooling_credentials() {
        let pool = pool_of(2);
        pool.mark_rate_limited(0, Some(120));

        for _ in 0..4 {
            let credential = pool.get_next().expect("credential");
            assert_eq!(credential.index, 1);
        }
    }

    #[test]
    fn get_next_skips_dead_credentials() {
        let pool = pool_of(2);
        pool.mark_dead(0, "token expired");

        for _ in 0..4 {
            let credential = pool.get_next().expect("credential");
            assert_eq!(credential.index, 1);
        }
    }

    #[test]
    fn exhausted_pool_returns_none() {
        let pool = pool_of(2);
        pool.mark_dead(0, "dead");
        pool.mark_rate_limited(1, Some(600));
        assert!(pool.get_next().is_none());
        assert_eq!(pool.available_count(), 0);
        assert!(!pool.all_dead());
    }

    #[test]
    fn all_dead_detection() {
        let pool = pool_of(2);
        pool.mark_dead(0, "a");
        pool.mark_dead(1, "b");
        assert!(pool.all_dead());
    }

    #[test]
    fn from_config_string_parses_pairs() {
        let pool = AccountPool::from_config_string("tokA:csrfA;tokB:csrfB").expect("pool");
        assert_eq!(pool.total_count(), 2);
        let first = pool.get_next().unwrap();
        assert_eq!(first.auth_token, "tokA");
        assert_eq!(first.ct0, "csrfA");
    }

    #[test]
    fn from_config_string_skips_malformed_pairs() {
        let pool = AccountPool::from_config_string("tokA:csrfA;garbage;:missing").expect("pool");
        assert_eq!(pool.total_count(), 1);
    }

    #[test]
    fn from_config_string_empty_is_an_error() {
        assert!(AccountPool::from_config_string("").is_err());
        assert!(AccountPool::from_config_string(";;").is_err());
    }

    #[test]
    fn from_env_file_exact_key_match() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.env");
        std::fs::write(
            &path,
            "# comment\nTWITTER_AUTH_TOKEN_BACKUP=\"wrong\"\n\
             TWITTER_AUTH_TOKEN=\"the-token\"\nXCSRF_TOKEN=\"the-csrf\"\nOTHER=1\n",
        )
        .unwrap();

        let pool = AccountPool::from_env_file(&path).expect("pool");
        let credential = pool.get_next().unwrap();
        assert_eq!(credential.auth_token, "the-token");
        assert_eq!(credential.ct0, "the-csrf");
    }

    #[test]
    fn from_env_file_prefers_first_csrf_match() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.env");
        std::fs::write(
            &path,
            "TWITTER_AUTH_TOKEN=\"tok\"\nTWITTER_CT0=\"first\"\nXCSRF_TOKEN=\"second\"\n",
        )
        .unwrap();

        let pool = AccountPool::from_env_file(&path).expect("pool");
        assert_eq!(pool.get_next().unwrap().ct0, "first");
    }

    #[test]
    fn from_env_file_missing_keys_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.env");
        std::fs::write(&path, "TWITTER_AUTH_TOKEN=\"tok\"\n").unwrap();
        assert!(AccountPool::from_env_file(&path).is_err());
    }

    #[test]
    fn status_masks_tokens() {
        let pool = AccountPool::new(vec![("secrettoken123".to_string(), "csrf".to_string())])
            .expect("pool");
        let status = pool.status();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].token_hint, "secr****");
        assert!(!status[0].token_hint.contains("token123"));
        assert_eq!(status[0].state, "available");
    }

    #[test]
    fn status_reports_cooling_and_dead() {
        let pool = pool_of(3);
        pool.mark_rate_limited(0, Some(300));
        pool.mark_dead(1, "expired");
        let status = pool.status();
        assert_eq!(status[0].state, "cooling");
        assert!(status[0].cooldown_remaining_secs > 0);
        assert_eq!(status[1].state, "dead");
        assert_eq!(status[1].last_error, "expired");
        assert_eq!(status[2].state, "available");
    }

    #[tokio::test]
    async fn wait_for_available_returns_none_when_all_dead() {
        let pool = pool_of(2);
        pool.mark_dead(0, "a");
        pool.mark_dead(1, "b");
        let got = pool.wait_for_available(Duration::from_secs(5)).await;
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn wait_for_available_returns_quickly_when_eligible() {
        let pool = pool_of(1);
        let got = pool.wait_for_available(Duration::from_secs(5)).await;
        assert!(got.is_some());
    }

    #[tokio::test]
    async fn wait_for_available_times_out_on_long_cooldown() {
        let pool = pool_of(1);
        pool.mark_rate_limited(0, Some(3600));
        let started = Instant::now();
        let got = pool.wait_for_available(Duration::from_millis(50)).await;
        assert!(got.is_none());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
