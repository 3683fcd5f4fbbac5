//! `aiscout scrape` - standalone X sweep without the pipeline.
//!
//! Sweeps every configured X user and saves the raw posts as per-source
//! JSON under the data directory. Useful for credential validation and for
//! inspecting what a batch would ingest.

use anyhow::{bail, Context};

use aiscout_core::config::Config;
use aiscout_core::x_scraper::XScraper;

/// Arguments for `aiscout scrape`.
#[derive(clap::Args)]
pub struct ScrapeArgs {
    /// Override the per-user tweet cap
    #[arg(long)]
    pub limit: Option<u32>,
}

/// Sweep all configured X users and persist the results.
pub async fn execute(config_path: &str, args: &ScrapeArgs) -> anyhow::Result<()> {
    let mut config = Config::load(Some(config_path)).context("cannot load configuration")?;
    if let Some(limit) = args.limit {
        config.x_scraper.max_tweets_per_user = limit;
    }

    if config.x_accounts.is_empty() {
        bail!("no [x_accounts] configured");
    }

    let scraper = XScraper::from_config(&config.x_scraper)
        .context("cannot initialize the X scraper")?;

    let mut accounts: Vec<(String, String)> = config
        .x_accounts
        .iter()
        .map(|(name, handle)| (name.clone(), handle.clone()))
        .collect();
    accounts.sort();

    let results = scraper
        .fetch_all_configured_users(&accounts, config.crawler.days_lookback)
        .await;

    let batch_ts = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let out_dir =
        std::path::PathBuf::from(&config.crawler.output_dir).join(format!("x_scraper_{batch_ts}"));
    std::fs::create_dir_all(&out_dir).context("cannot create the output directory")?;

    let mut total_posts = 0usize;
    for (source_name, posts) in &results {
        if posts.is_empty() {
            continue;
        }
        total_posts += posts.len();
        let path = out_dir.join(format!("{source_name}.json"));
        let body = serde_json::to_string_pretty(posts)?;
        std::fs::write(&path, body)
            .with_context(|| format!("cannot write {}", path.display()))?;
    }

    println!("saved {} posts to {}", total_posts, out_dir.display());

    println!("credential pool:");
    for status in scraper.pool().status() {
        println!(
            "  #{} [{}] {} requests, cooldown {}s, token {}",
            status.index,
            status.state,
            status.request_count,
            status.cooldown_remaining_secs,
            status.token_hint,
        );
    }

    Ok(())
}
