//! `aiscout run` - execute one full crawl batch.

use std::sync::Arc;

use anyhow::{bail, Context};
use tokio_util::sync::CancellationToken;

use aiscout_core::config::Config;
use aiscout_core::enrich::video::NullTranscriber;
use aiscout_core::enrich::{ContentFetcher, HttpWebFetcher};
use aiscout_core::llm::{LlmProvider, OpenAiCompatProvider};
use aiscout_core::pipeline::{plan_from_config, Pipeline};
use aiscout_core::x_scraper::XScraper;

/// Arguments for `aiscout run`.
#[derive(clap::Args)]
pub struct RunArgs {}

/// Run a batch end-to-end and print the summary.
///
/// Startup failures (invalid config, unreachable LLM, X sources without any
/// fetch path) exit non-zero; per-source failures inside the batch do not.
pub async fn execute(config_path: &str, _args: &RunArgs) -> anyhow::Result<()> {
    let config = match Config::load_and_validate(Some(config_path)) {
        Ok(config) => Arc::new(config),
        Err(errors) => {
            for error in &errors {
                eprintln!("config error: {error}");
            }
            bail!("invalid configuration ({} errors)", errors.len());
        }
    };

    let prompt_template = config
        .load_prompt_template()
        .context("cannot load the organizer prompt template")?;

    let llm: Arc<dyn LlmProvider> = Arc::new(OpenAiCompatProvider::new(
        config.llm.base_url.clone(),
        config.llm.api_key.clone(),
        config.llm.model.clone(),
    ));
    llm.health_check()
        .await
        .context("LLM endpoint unreachable at startup")?;

    // The direct scraper is preferred for X sources; without credentials the
    // batch can still run through the legacy bridge, or with no X sources at
    // all.
    let scraper = match XScraper::from_config(&config.x_scraper) {
        Ok(scraper) => Some(Arc::new(scraper)),
        Err(e) => {
            if config.x_accounts.is_empty() {
                None
            } else if config.rsshub.base_url.is_some() {
                tracing::warn!(error = %e, "no scraper credentials, X sources fall back to the bridge");
                None
            } else {
                bail!("X sources are configured but unusable: {e}");
            }
        }
    };

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, draining pipeline");
            signal_token.cancel();
        }
    });

    let batch_id = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let output_dir = std::path::PathBuf::from(&config.crawler.output_dir);
    let content_fetcher = Arc::new(ContentFetcher::new(
        Arc::new(HttpWebFetcher::default()),
        Arc::new(NullTranscriber),
        output_dir.join(format!("raw_{batch_id}")),
    ));

    let plan = plan_from_config(&config, scraper.is_some());
    if plan.is_empty() {
        bail!("no sources configured");
    }

    let pipeline = Pipeline::new(
        Arc::clone(&config),
        llm,
        content_fetcher,
        scraper,
        prompt_template,
        batch_id,
        shutdown,
    );

    let summary = pipeline.run(plan).await.context("pipeline batch failed")?;
    println!("{}", summary.render());
    Ok(())
}
