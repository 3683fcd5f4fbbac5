/// Core library for the aiscout Data & AI intelligence crawler.
///
/// Contains the four-stage crawl pipeline (fetch, enrich, organize, write),
/// feed normalization, the embedded-content enrichment layer, the LLM
/// provider abstraction, and the direct X timeline scraper.
pub mod config;
pub mod enrich;
pub mod error;
pub mod feeds;
pub mod llm;
pub mod pipeline;
pub mod types;
pub mod x_scraper;

pub use error::*;

/// Returns the version of the aiscout-core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
