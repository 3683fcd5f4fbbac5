//! The four-stage crawl pipeline.
//!
//! Sources -> [Fetch] -> Q1 -> [Enrich] -> Q2 -> [Organize] -> Q3 -> [Write]
//!
//! Stages are fixed-size worker groups connected by bounded MPMC channels;
//! a full channel blocks the producer, which is the backpressure contract.
//! Shutdown is sentinel-based: after the producer finishes, one `Stop` per
//! worker goes into that stage's input queue. Channel FIFO ordering places
//! the sentinels behind every real item, and joining the stage's workers
//! before pilling the next stage guarantees the downstream queue is fully
//! drained tail-items included.

mod enrich;
mod fetch;
mod organize;
mod write;

pub use fetch::{plan_from_config, FeedSource, SerialSource, SourcePlan};
pub use write::BatchSummary;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::enrich::ContentFetcher;
use crate::error::PipelineError;
use crate::feeds::FeedClient;
use crate::llm::LlmProvider;
use crate::types::{EnrichedPost, OrganizedPost, RawPost};
use crate::x_scraper::XScraper;

use enrich::Enricher;
use fetch::Fetcher;
use organize::Organizer;
use write::Writer;

/// Message on an inter-stage queue: a real item or a poison pill.
pub(crate) enum Envelope<T> {
    /// A post travelling downstream.
    Item(T),
    /// Sentinel: the receiving worker acknowledges it and exits.
    Stop,
}

/// One batch run of the four-stage pipeline.
pub struct Pipeline {
    config: Arc<Config>,
    llm: Arc<dyn LlmProvider>,
    content_fetcher: Arc<ContentFetcher>,
    scraper: Option<Arc<XScraper>>,
    prompt_template: String,
    batch_id: String,
    output_dir: PathBuf,
    shutdown: CancellationToken,
}

impl Pipeline {
    /// Assemble a pipeline for one batch.
    pub fn new(
        config: Arc<Config>,
        llm: Arc<dyn LlmProvider>,
        content_fetcher: Arc<ContentFetcher>,
        scraper: Option<Arc<XScraper>>,
        prompt_template: String,
        batch_id: String,
        shutdown: CancellationToken,
    ) -> Self {
        let output_dir = crate::config::expand_tilde(&config.crawler.output_dir);
        Self {
            config,
            llm,
            content_fetcher,
            scraper,
            prompt_template,
            batch_id,
            output_dir,
            shutdown,
        }
    }

    /// Root of the batch output tree.
    pub fn output_dir(&self) -> &PathBuf {
        &self.output_dir
    }

    /// Run the batch to completion and return the writer's summary.
    ///
    /// Startup is downstream-first (Write, Organize, Enrich, then Fetch) so
    /// every enqueue has a ready consumer. Only a manifest write failure or
    /// an abnormal worker exit aborts the batch.
    pub async fn run(&self, plan: SourcePlan) -> Result<BatchSummary, PipelineError> {
        let started = std::time::Instant::now();
        tracing::info!(batch_id = %self.batch_id, "starting pipeline batch");

        let capacity = self.config.crawler.channel_capacity;
        let (q1_tx, q1_rx) = async_channel::bounded::<Envelope<RawPost>>(capacity);
        let (q2_tx, q2_rx) = async_channel::bounded::<Envelope<EnrichedPost>>(capacity);
        let (q3_tx, q3_rx) = async_channel::bounded::<Envelope<OrganizedPost>>(capacity);

        // Write stage (single worker; owns all per-domain state).
        let writer = Writer::new(
            self.output_dir.clone(),
            self.batch_id.clone(),
            self.config.entity_alias_index(),
            self.config.entity_mapping.keys().cloned().collect(),
        );
        let writer_handle = tokio::spawn(writer.run(q3_rx));

        // Organize stage.
        let organizer = Arc::new(Organizer::new(
            Arc::clone(&self.llm),
            self.prompt_template.clone(),
            self.config.entity_list(),
            self.config.llm.max_concurrency,
        ));
        let organize_handles: Vec<JoinHandle<()>> = (0..self.config.crawler.organize_workers)
            .map(|worker| {
                let rx = q2_rx.clone();
                let tx = q3_tx.clone();
                let organizer = Arc::clone(&organizer);
                tokio::spawn(async move {
                    while let Ok(envelope) = rx.recv().await {
                        match envelope {
                            Envelope::Item(post) => {
                                if let Some(organized) = organizer.organize(&post).await {
                                    if tx.send(Envelope::Item(organized)).await.is_err() {
                                        tracing::error!(worker, "organize output queue closed");
                                        break;
                                    }
                                }
                            }
                            Envelope::Stop => break,
                        }
                    }
                })
            })
            .collect();

        // Enrich stage.
        let enricher = Arc::new(Enricher::new(Arc::clone(&self.content_fetcher)));
        let enrich_handles: Vec<JoinHandle<()>> = (0..self.config.crawler.enrich_workers)
            .map(|worker| {
                let rx = q1_rx.clone();
                let tx = q2_tx.clone();
                let enricher = Arc::clone(&enricher);
                tokio::spawn(async move {
                    while let Ok(envelope) = rx.recv().await {
                        match envelope {
                            Envelope::Item(post) => {
                                let enriched = enricher.enrich(post).await;
                                if tx.send(Envelope::Item(enriched)).await.is_err() {
                                    tracing::error!(worker, "enrich output queue closed");
                                    break;
                                }
                            }
                            Envelope::Stop => break,
                        }
                    }
                })
            })
            .collect();

        // Fetch stage (producer); runs to completion before shutdown starts.
        let fetcher = Fetcher::new(
            FeedClient::new(self.config.crawler.days_lookback),
            self.scraper.clone(),
            Arc::clone(&self.config),
            self.output_dir.join(format!("raw_{}", self.batch_id)),
            self.shutdown.clone(),
        );
        fetcher.run(plan, q1_tx.clone()).await;

        // Shutdown: pill each stage only after the previous one has fully
        // exited; pilling early would race the tail items.
        self.send_pills(&q1_tx, self.config.crawler.enrich_workers, "enrich")
            .await?;
        join_stage(enrich_handles, "enrich").await?;

        self.send_pills(&q2_tx, self.config.crawler.organize_workers, "organize")
            .await?;
        join_stage(organize_handles, "organize").await?;

        self.send_pills(&q3_tx, 1, "write").await?;
        let summary = writer_handle
            .await
            .map_err(|e| PipelineError::Stage {
                stage: "write",
                message: e.to_string(),
            })??;

        tracing::info!(
            batch_id = %self.batch_id,
            elapsed_secs = started.elapsed().as_secs(),
            total_posts = summary.total_posts,
            "pipeline batch finished"
        );
        Ok(summary)
    }

    async fn send_pills<T>(
        &self,
        tx: &async_channel::Sender<Envelope<T>>,
        count: usize,
        stage: &'static str,
    ) -> Result<(), PipelineError> {
        for _ in 0..count {
            tx.send(Envelope::Stop)
                .await
                .map_err(|_| PipelineError::Stage {
                    stage,
                    message: "input queue closed before shutdown".to_string(),
                })?;
        }
        Ok(())
    }
}

async fn join_stage(handles: Vec<JoinHandle<()>>, stage: &'static str) -> Result<(), PipelineError> {
    for handle in handles {
        handle.await.map_err(|e| PipelineError::Stage {
            stage,
            message: e.to_string(),
        })?;
    }
    Ok(())
}
