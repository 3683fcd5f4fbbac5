//! Fetch stage: source expansion and feed/timeline ingestion.
//!
//! Sources split into two lanes. Micro-blog and video feeds are
//! parallel-safe and run under a small concurrency cap. X sources are
//! rate-sensitive and run on a single serial lane with a mandatory random
//! sleep before each user; that gap is a correctness requirement of the
//! direct client, not politeness.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::write::sanitize_component;
use super::Envelope;
use crate::config::Config;
use crate::feeds::FeedClient;
use crate::types::{RawPost, SourceKind};
use crate::x_scraper::XScraper;

/// Concurrency cap for the parallel-safe feed lane.
const PARALLEL_FETCHERS: usize = 5;

/// A plain feed source.
#[derive(Debug, Clone)]
pub struct FeedSource {
    /// Display name.
    pub name: String,
    /// Feed URL.
    pub url: String,
    /// Source family.
    pub kind: SourceKind,
}

/// A source on the serial X lane.
#[derive(Debug, Clone)]
pub enum SerialSource {
    /// Scraped directly through the GraphQL client.
    Scraper {
        /// Display name.
        name: String,
        /// X handle (without @).
        handle: String,
    },
    /// Fetched through the legacy RSS bridge.
    BridgeFeed(FeedSource),
}

/// The expanded source list for one batch.
#[derive(Debug, Clone, Default)]
pub struct SourcePlan {
    /// Parallel-safe feed sources.
    pub parallel: Vec<FeedSource>,
    /// Serial, rate-sensitive X sources.
    pub serial: Vec<SerialSource>,
}

impl SourcePlan {
    /// Total number of sources.
    pub fn len(&self) -> usize {
        self.parallel.len() + self.serial.len()
    }

    /// Whether the plan has no sources.
    pub fn is_empty(&self) -> bool {
        self.parallel.is_empty() && self.serial.is_empty()
    }
}

/// Expand the configured source sections into a plan.
///
/// YouTube channel ids become feed URLs. X handles go to the direct
/// scraper when one is available; otherwise, when a bridge base is
/// configured, they fall back to the bridge's per-user RSS route.
pub fn plan_from_config(config: &Config, has_scraper: bool) -> SourcePlan {
    let mut plan = SourcePlan::default();

    for (name, url) in &config.weixin_accounts {
        plan.parallel.push(FeedSource {
            name: name.clone(),
            url: url.clone(),
            kind: SourceKind::Weixin,
        });
    }

    for (name, channel_id) in &config.youtube_channels {
        plan.parallel.push(FeedSource {
            name: name.clone(),
            url: format!("https://www.youtube.com/feeds/videos.xml?channel_id={channel_id}"),
            kind: SourceKind::YouTube,
        });
    }

    for (name, handle) in &config.x_accounts {
        if has_scraper {
            plan.serial.push(SerialSource::Scraper {
                name: name.clone(),
                handle: handle.clone(),
            });
        } else if let Some(base) = config.rsshub.base_url.as_deref() {
            plan.serial.push(SerialSource::BridgeFeed(FeedSource {
                name: name.clone(),
                url: format!("{}/twitter/user/{handle}", base.trim_end_matches('/')),
                kind: SourceKind::X,
            }));
        } else {
            tracing::warn!(source = %name, "no scraper credentials and no bridge, skipping X source");
        }
    }

    plan
}

/// The fetch stage driver.
pub(crate) struct Fetcher {
    feed_client: FeedClient,
    scraper: Option<Arc<XScraper>>,
    config: Arc<Config>,
    raw_dir: std::path::PathBuf,
    shutdown: CancellationToken,
}

impl Fetcher {
    pub(crate) fn new(
        feed_client: FeedClient,
        scraper: Option<Arc<XScraper>>,
        config: Arc<Config>,
        raw_dir: std::path::PathBuf,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            feed_client,
            scraper,
            config,
            raw_dir,
            shutdown,
        }
    }

    /// Fetch every source in the plan, submitting posts downstream.
    ///
    /// Returns when both lanes are exhausted. Individual source failures
    /// are logged and skipped; a cancelled token stops new sources from
    /// being taken up while already-submitted posts continue downstream.
    pub(crate) async fn run(&self, plan: SourcePlan, tx: async_channel::Sender<Envelope<RawPost>>) {
        tracing::info!(
            parallel = plan.parallel.len(),
            serial = plan.serial.len(),
            "fetch stage starting"
        );

        let parallel_lane = self.run_parallel_lane(plan.parallel, tx.clone());
        let serial_lane = self.run_serial_lane(plan.serial, tx);
        tokio::join!(parallel_lane, serial_lane);

        tracing::info!("fetch stage finished");
    }

    async fn run_parallel_lane(
        &self,
        sources: Vec<FeedSource>,
        tx: async_channel::Sender<Envelope<RawPost>>,
    ) {
        let semaphore = Arc::new(Semaphore::new(PARALLEL_FETCHERS));
        let mut tasks: JoinSet<()> = JoinSet::new();

        for source in sources {
            if self.shutdown.is_cancelled() {
                tracing::warn!("shutdown requested, not starting further sources");
                break;
            }

            let semaphore = Arc::clone(&semaphore);
            let feed_client = self.feed_client.clone();
            let tx = tx.clone();
            let raw_dir = self.raw_dir.clone();

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire().await else {
                    return;
                };
                match feed_client.fetch(&source.url, source.kind, &source.name).await {
                    Ok(posts) => {
                        submit_posts(&source.name, source.kind, posts, &raw_dir, &tx).await;
                    }
                    Err(e) => {
                        tracing::warn!(source = %source.name, error = %e, "feed fetch failed, skipping source");
                    }
                }
            });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "fetch task terminated abnormally");
            }
        }
    }

    async fn run_serial_lane(
        &self,
        sources: Vec<SerialSource>,
        tx: async_channel::Sender<Envelope<RawPost>>,
    ) {
        let delay_range = (
            self.config.crawler.x_request_delay_min,
            self.config.crawler.x_request_delay_max,
        );
        let days_lookback = self.config.crawler.days_lookback;

        for source in sources {
            if self.shutdown.is_cancelled() {
                tracing::warn!("shutdown requested, stopping serial lane");
                break;
            }

            // Mandatory gap before every X call chain.
            let delay = rand::thread_rng().gen_range(delay_range.0..=delay_range.1.max(delay_range.0));
            tracing::info!(delay_secs = delay, "waiting before X source");
            tokio::time::sleep(Duration::from_secs(delay)).await;

            match source {
                SerialSource::Scraper { name, handle } => {
                    let Some(scraper) = &self.scraper else {
                        tracing::error!(source = %name, "scraper source planned without a scraper");
                        continue;
                    };
                    let posts = scraper
                        .fetch_user_posts(&handle, &name, Some(days_lookback))
                        .await;
                    submit_posts(&name, SourceKind::X, posts, &self.raw_dir, &tx).await;
                }
                SerialSource::BridgeFeed(feed) => {
                    match self.feed_client.fetch(&feed.url, feed.kind, &feed.name).await {
                        Ok(posts) => {
                            submit_posts(&feed.name, feed.kind, posts, &self.raw_dir, &tx).await;
                        }
                        Err(e) => {
                            tracing::warn!(source = %feed.name, error = %e, "bridge fetch failed, skipping source");
                        }
                    }
                }
            }
        }
    }
}

/// Snapshot a source's posts and enqueue them downstream.
async fn submit_posts(
    source_name: &str,
    kind: SourceKind,
    posts: Vec<RawPost>,
    raw_dir: &std::path::Path,
    tx: &async_channel::Sender<Envelope<RawPost>>,
) {
    if posts.is_empty() {
        return;
    }

    save_raw_snapshot(raw_dir, source_name, kind, &posts);
    tracing::info!(source = %source_name, kind = %kind, posts = posts.len(), "source fetched");

    for post in posts {
        if tx.send(Envelope::Item(post)).await.is_err() {
            tracing::error!(source = %source_name, "fetch output queue closed");
            return;
        }
    }
}

/// Persist the per-source JSON snapshot for forensics. Failures only log.
fn save_raw_snapshot(raw_dir: &std::path::Path, source_name: &str, kind: SourceKind, posts: &[RawPost]) {
    let write = || -> std::io::Result<()> {
        std::fs::create_dir_all(raw_dir)?;
        let filename = format!("{}_{}.json", kind.as_str(), sanitize_component(source_name));
        let body = serde_json::to_string_pretty(posts).unwrap_or_else(|_| "[]".to_string());
        std::fs::write(raw_dir.join(filename), body)
    };
    if let Err(e) = write() {
        tracing::warn!(source = %source_name, error = %e, "raw snapshot failed");
    }
}
