//! Write stage: domain/tier layout, entity mirroring, manifest.
//!
//! A single worker owns all per-domain state. Each organized post becomes a
//! markdown file under `By-Domain/<domain>/<tier>/`; accepted posts are
//! additionally copied into `By-Entity/<entity>/`. At end-of-stream the
//! writer emits each domain's `posts.json`, then `latest_batch.json` as its
//! final act. Per-file write failures only log; a manifest failure is fatal
//! to the batch.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use serde::Serialize;

use super::Envelope;
use crate::error::WriterError;
use crate::types::{
    BatchManifest, BatchStats, Domain, OrganizedPost, QualityDistribution, QualityTier,
};

/// Manifest filename at the output root.
const MANIFEST_FILENAME: &str = "latest_batch.json";

/// Maximum length of the event component in a filename.
const MAX_EVENT_COMPONENT: usize = 50;

/// Compact per-post record for a domain's `posts.json`.
#[derive(Debug, Clone, Serialize)]
struct PostRecord {
    title: String,
    summary: String,
    quality_score: u8,
    quality_reason: String,
    link: String,
    date: String,
    category: String,
    primary_entity: Option<String>,
    source_name: String,
    source_type: String,
}

#[derive(Debug, Default)]
struct DomainState {
    dir: PathBuf,
    high: u64,
    pending: u64,
    excluded: u64,
    posts: Vec<PostRecord>,
}

/// Console-facing batch result, assembled by the writer.
#[derive(Debug, Clone)]
pub struct BatchSummary {
    /// Posts written.
    pub total_posts: u64,
    /// Per-tier counts.
    pub quality: QualityDistribution,
    /// Per-domain `(label, high, pending)` counts.
    pub domains: Vec<(String, u64, u64)>,
    /// Accepted-post counts per entity, descending.
    pub top_entities: Vec<(String, u64)>,
    /// Where the manifest was written.
    pub manifest_path: PathBuf,
}

impl BatchSummary {
    /// Render the end-of-batch console report.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{}\nExecution Summary\n{}\n", "=".repeat(60), "=".repeat(60)));
        out.push_str(&format!("Total Valid Posts: {}\n", self.total_posts));
        out.push_str(&format!(
            "Quality Distribution: H:{} / P:{} / E:{}\n",
            self.quality.high, self.quality.pending, self.quality.excluded
        ));

        out.push_str("\nDomains:\n");
        for (domain, high, pending) in &self.domains {
            out.push_str(&format!("  - {domain}: {high} H / {pending} P\n"));
        }

        out.push_str("\nEntities:\n");
        if self.top_entities.is_empty() {
            out.push_str("  (none detected)\n");
        }
        for (entity, count) in self.top_entities.iter().take(10) {
            out.push_str(&format!("  - {entity}: {count} posts\n"));
        }
        out.push_str(&"=".repeat(60));
        out
    }
}

/// The write stage worker.
pub(crate) struct Writer {
    output_dir: PathBuf,
    batch_id: String,
    /// Lowercased alias -> canonical entity.
    source_to_entity: HashMap<String, String>,
    /// Lowercased canonical name -> canonical entity (constrains the LLM's
    /// primary_entity).
    canonical_entities: HashMap<String, String>,
    domains: HashMap<Domain, DomainState>,
    entity_stats: HashMap<String, u64>,
    total_posts: u64,
}

impl Writer {
    pub(crate) fn new(
        output_dir: PathBuf,
        batch_id: String,
        source_to_entity: HashMap<String, String>,
        entity_names: Vec<String>,
    ) -> Self {
        let canonical_entities = entity_names
            .into_iter()
            .map(|name| (name.to_lowercase(), name))
            .collect();
        Self {
            output_dir,
            batch_id,
            source_to_entity,
            canonical_entities,
            domains: HashMap::new(),
            entity_stats: HashMap::new(),
            total_posts: 0,
        }
    }

    /// Consume the stage queue until the sentinel, then finalize the batch.
    pub(crate) async fn run(
        mut self,
        rx: async_channel::Receiver<Envelope<OrganizedPost>>,
    ) -> Result<BatchSummary, WriterError> {
        while let Ok(envelope) = rx.recv().await {
            match envelope {
                Envelope::Item(post) => {
                    if let Err(e) = self.write_post(&post) {
                        tracing::error!(link = %post.link, error = %e, "post write failed");
                    }
                }
                Envelope::Stop => break,
            }
        }

        self.finalize()
    }

    fn write_post(&mut self, post: &OrganizedPost) -> Result<(), WriterError> {
        let tier = post.tier();
        let domain = post.domain;
        let domain_dir = self.domain_dir(domain)?;

        let filename = render_filename(&post.event, &post.date, &post.link);
        let markdown = render_markdown(post);
        let domain_path = domain_dir.join(tier.as_str()).join(&filename);

        std::fs::write(&domain_path, markdown).map_err(|source| WriterError::PostFile {
            path: domain_path.display().to_string(),
            source,
        })?;

        let state = self.domains.entry(domain).or_default();
        match tier {
            QualityTier::High => state.high += 1,
            QualityTier::Pending => state.pending += 1,
            QualityTier::Excluded => state.excluded += 1,
        }
        state.posts.push(PostRecord {
            title: post.event.clone(),
            summary: post.key_info.clone(),
            quality_score: post.quality_score,
            quality_reason: post.quality_reason.clone(),
            link: post.link.clone(),
            date: post.date.clone(),
            category: post.category.as_str().to_string(),
            primary_entity: post.primary_entity.clone(),
            source_name: post.source_name.clone(),
            source_type: post.source_type.as_str().to_string(),
        });
        self.total_posts += 1;

        if tier.is_accepted() {
            let entity = self.resolve_entity(post);
            self.copy_to_entity_view(&entity, &domain_path, &filename);
        }

        tracing::info!(tier = tier.as_str(), file = %filename, "post saved");
        Ok(())
    }

    /// Create (idempotently) and return the domain's directory.
    fn domain_dir(&mut self, domain: Domain) -> Result<PathBuf, WriterError> {
        if let Some(state) = self.domains.get(&domain) {
            if !state.dir.as_os_str().is_empty() {
                return Ok(state.dir.clone());
            }
        }

        let dir = self.output_dir.join("By-Domain").join(domain.as_str());
        for tier in ["high", "pending", "excluded"] {
            let tier_dir = dir.join(tier);
            std::fs::create_dir_all(&tier_dir).map_err(|source| WriterError::PostFile {
                path: tier_dir.display().to_string(),
                source,
            })?;
        }

        self.domains.entry(domain).or_default().dir = dir.clone();
        Ok(dir)
    }

    /// Resolve the entity a post is attributed to.
    ///
    /// Source-name alias match wins; a `primary_entity` from the LLM only
    /// counts when it names a configured entity; everything else lands in
    /// "Others".
    fn resolve_entity(&self, post: &OrganizedPost) -> String {
        if let Some(entity) = self.source_to_entity.get(&post.source_name.to_lowercase()) {
            return entity.clone();
        }

        if let Some(proposed) = &post.primary_entity {
            if let Some(entity) = self.canonical_entities.get(&proposed.to_lowercase()) {
                return entity.clone();
            }
        }

        "Others".to_string()
    }

    fn copy_to_entity_view(&mut self, entity: &str, original: &Path, filename: &str) {
        let safe_entity = sanitize_entity(entity);
        if safe_entity.is_empty() {
            return;
        }

        let entity_dir = self.output_dir.join("By-Entity").join(&safe_entity);
        let copy = || -> std::io::Result<()> {
            std::fs::create_dir_all(&entity_dir)?;
            std::fs::copy(original, entity_dir.join(filename))?;
            Ok(())
        };

        match copy() {
            Ok(()) => {
                *self.entity_stats.entry(safe_entity).or_insert(0) += 1;
            }
            Err(e) => {
                tracing::error!(entity = %safe_entity, error = %e, "entity copy failed");
            }
        }
    }

    /// Emit per-domain indexes and the manifest, then build the summary.
    fn finalize(self) -> Result<BatchSummary, WriterError> {
        for (domain, state) in &self.domains {
            let json_path = state.dir.join("posts.json");
            let body = serde_json::to_string_pretty(&state.posts).unwrap_or_else(|_| "[]".to_string());
            if let Err(e) = std::fs::write(&json_path, body) {
                tracing::error!(domain = %domain, error = %e, "failed to write posts.json");
            }
        }

        let quality = QualityDistribution {
            high: self.domains.values().map(|s| s.high).sum(),
            pending: self.domains.values().map(|s| s.pending).sum(),
            excluded: self.domains.values().map(|s| s.excluded).sum(),
        };

        let domain_reports: BTreeMap<String, String> = self
            .domains
            .keys()
            .map(|d| (d.as_str().to_string(), d.as_str().to_string()))
            .collect();

        let manifest = BatchManifest {
            batch_id: self.batch_id.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
            domain_reports,
            stats: BatchStats {
                total_posts: self.total_posts,
                domain_count: self.domains.len() as u64,
                quality_distribution: quality.clone(),
                top_entities: self.entity_stats.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            },
        };

        let manifest_path = self.output_dir.join(MANIFEST_FILENAME);
        write_manifest(&manifest_path, &manifest)?;
        tracing::info!(path = %manifest_path.display(), "batch manifest written");

        let mut domains: Vec<(String, u64, u64)> = self
            .domains
            .iter()
            .map(|(d, s)| (d.as_str().to_string(), s.high, s.pending))
            .collect();
        domains.sort();

        let mut top_entities: Vec<(String, u64)> = self.entity_stats.into_iter().collect();
        top_entities.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Ok(BatchSummary {
            total_posts: self.total_posts,
            quality,
            domains,
            top_entities,
            manifest_path,
        })
    }
}

/// Write the manifest atomically: temp file in the same directory, then
/// rename over the final name.
fn write_manifest(path: &Path, manifest: &BatchManifest) -> Result<(), WriterError> {
    let body = serde_json::to_string_pretty(manifest)
        .map_err(|e| WriterError::Manifest {
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| WriterError::Manifest { source })?;
    }

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, body).map_err(|source| WriterError::Manifest { source })?;
    std::fs::rename(&tmp_path, path).map_err(|source| WriterError::Manifest { source })
}

/// `<safe_event>_<date>_<hash>.md`
pub(crate) fn render_filename(event: &str, date: &str, link: &str) -> String {
    let mut safe_event = sanitize_component(event);
    safe_event.truncate_chars(MAX_EVENT_COMPONENT);
    let date = if date.is_empty() { "Unknown date" } else { date };
    format!("{}_{}_{}.md", safe_event, sanitize_component(date), link_hash(link))
}

/// First six hex characters of the MD5 of the link; `nolink` when empty.
pub(crate) fn link_hash(link: &str) -> String {
    if link.is_empty() {
        return "nolink".to_string();
    }
    let digest = Md5::digest(link.as_bytes());
    let mut hx = hex::encode(digest);
    hx.truncate(6);
    hx
}

/// Replace everything but alphanumerics, `-` and `_` with `_`.
pub(crate) fn sanitize_component(s: &str) -> String {
    let sanitized: String = s
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if sanitized.is_empty() {
        "untitled".to_string()
    } else {
        sanitized
    }
}

/// Entity directory names additionally allow spaces.
fn sanitize_entity(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

fn render_markdown(post: &OrganizedPost) -> String {
    let score = post.quality_score as usize;
    let stars = "★".repeat(score) + &"☆".repeat(5usize.saturating_sub(score));

    let mut lines = vec![
        format!("# {}", if post.event.is_empty() { "Untitled" } else { &post.event }),
        String::new(),
        format!("- **Date**: {}", post.date),
        format!("- **Category**: {}", post.category.as_str()),
        format!("- **Domain**: {}", post.domain.as_str()),
        format!("- **Quality**: {stars} ({}/5)", post.quality_score),
        format!("- **Reason**: {}", post.quality_reason),
        format!("- **Source_Type**: {}", post.source_type),
        format!("- **Source**: {}", post.source_name),
        format!("- **Link**: {}", post.link),
        String::new(),
        "## Key Info".to_string(),
        post.key_info.clone(),
        String::new(),
        "## Details".to_string(),
        post.detail.clone(),
        String::new(),
    ];

    if !post.extra_content.is_empty() {
        lines.push("## Extra Content".to_string());
        lines.push(post.extra_content.clone());
        lines.push(String::new());
    }

    if !post.extra_urls.is_empty() {
        lines.push("## External Links".to_string());
        for url in &post.extra_urls {
            lines.push(format!("- {url}"));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

trait TruncateChars {
    fn truncate_chars(&mut self, max: usize);
}

impl TruncateChars for String {
    fn truncate_chars(&mut self, max: usize) {
        if let Some((idx, _)) = self.char_indices().nth(max) {
            self.truncate(idx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, SourceKind};

    fn post(domain: Domain, score: u8, source_name: &str, link: &str) -> OrganizedPost {
        OrganizedPost {
            event: "Model launch".to_string(),
            key_info: "k".to_string(),
            detail: "d".to_string(),
            category: Category::TechRelease,
            domain,
            quality_score: score,
            quality_reason: "r".to_string(),
            primary_entity: None,
            date: "2026-08-01".to_string(),
            link: link.to_string(),
            source_name: source_name.to_string(),
            source_type: SourceKind::Weixin,
            extra_content: String::new(),
            extra_urls: Vec::new(),
        }
    }

    fn writer_in(dir: &Path) -> Writer {
        Writer::new(
            dir.to_path_buf(),
            "20260801_120000".to_string(),
            HashMap::from([
                ("openai".to_string(), "OpenAI".to_string()),
                ("sam-altman".to_string(), "OpenAI".to_string()),
            ]),
            vec!["OpenAI".to_string()],
        )
    }

    async fn run_writer(dir: &Path, posts: Vec<OrganizedPost>) -> BatchSummary {
        let (tx, rx) = async_channel::bounded(16);
        for post in posts {
            tx.send(Envelope::Item(post)).await.unwrap();
        }
        tx.send(Envelope::Stop).await.unwrap();
        writer_in(dir).run(rx).await.expect("writer")
    }

    #[test]
    fn link_hash_is_six_hex_chars() {
        let hash = link_hash("https://example.com/a");
        assert_eq!(hash.len(), 6);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(link_hash(""), "nolink");
    }

    #[test]
    fn link_hash_distinguishes_links() {
        assert_ne!(link_hash("https://example.com/a"), link_hash("https://example.com/b"));
    }

    #[test]
    fn filenames_sanitize_and_truncate_event() {
        let long_event = "Launch: the \"biggest\" model/ever seen!".repeat(4);
        let name = render_filename(&long_event, "2026-08-01", "https://example.com/a");
        assert!(name.ends_with(".md"));
        assert!(!name.contains('"'));
        assert!(!name.contains('/'));
        assert!(!name.contains(':'));
        // event(50) + _ + date(10) + _ + hash(6) + .md
        assert!(name.len() <= 50 + 1 + 10 + 1 + 6 + 3);
    }

    #[test]
    fn same_event_different_links_do_not_collide() {
        let a = render_filename("Event", "2026-08-01", "https://example.com/a");
        let b = render_filename("Event", "2026-08-01", "https://example.com/b");
        assert_ne!(a, b);
    }

    #[test]
    fn markdown_includes_metadata_and_sections() {
        let mut p = post(Domain::LlmTechProducts, 4, "src", "https://example.com/a");
        p.extra_content = "transcript".to_string();
        p.extra_urls = vec!["https://blog.example/p".to_string()];

        let md = render_markdown(&p);
        assert!(md.starts_with("# Model launch"));
        assert!(md.contains("- **Domain**: llm-tech-products"));
        assert!(md.contains("★★★★☆ (4/5)"));
        assert!(md.contains("## Key Info"));
        assert!(md.contains("## Extra Content"));
        assert!(md.contains("- https://blog.example/p"));
    }

    #[tokio::test]
    async fn tier_routing_matches_score() {
        let dir = tempfile::tempdir().unwrap();
        let summary = run_writer(
            dir.path(),
            vec![
                post(Domain::LlmTechProducts, 5, "a", "https://example.com/1"),
                post(Domain::LlmTechProducts, 3, "b", "https://example.com/2"),
                post(Domain::LlmTechProducts, 1, "c", "https://example.com/3"),
            ],
        )
        .await;

        assert_eq!(summary.total_posts, 3);
        assert_eq!(
            (summary.quality.high, summary.quality.pending, summary.quality.excluded),
            (1, 1, 1)
        );

        let base = dir.path().join("By-Domain").join("llm-tech-products");
        assert_eq!(std::fs::read_dir(base.join("high")).unwrap().count(), 1);
        assert_eq!(std::fs::read_dir(base.join("pending")).unwrap().count(), 1);
        assert_eq!(std::fs::read_dir(base.join("excluded")).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn accepted_posts_are_copied_to_entity_view() {
        let dir = tempfile::tempdir().unwrap();
        run_writer(
            dir.path(),
            vec![
                post(Domain::LlmTechProducts, 4, "sam-altman", "https://example.com/1"),
                post(Domain::LlmTechProducts, 1, "sam-altman", "https://example.com/2"),
            ],
        )
        .await;

        let entity_dir = dir.path().join("By-Entity").join("OpenAI");
        // Only the accepted post is mirrored; the excluded one is not.
        assert_eq!(std::fs::read_dir(&entity_dir).unwrap().count(), 1);
        assert!(!dir.path().join("By-Entity").join("Others").exists());
    }

    #[tokio::test]
    async fn unmapped_sources_fall_back_to_others() {
        let dir = tempfile::tempdir().unwrap();
        let summary = run_writer(
            dir.path(),
            vec![post(Domain::DataPlatforms, 4, "unknown-blog", "https://example.com/1")],
        )
        .await;

        assert!(dir.path().join("By-Entity").join("Others").exists());
        assert_eq!(summary.top_entities, vec![("Others".to_string(), 1)]);
    }

    #[tokio::test]
    async fn llm_primary_entity_constrained_to_configured_list() {
        let dir = tempfile::tempdir().unwrap();
        let mut mapped = post(Domain::DataPlatforms, 4, "some-src", "https://example.com/1");
        mapped.primary_entity = Some("openai".to_string());
        let mut unknown = post(Domain::DataPlatforms, 4, "some-src", "https://example.com/2");
        unknown.primary_entity = Some("MadeUpCorp".to_string());

        run_writer(dir.path(), vec![mapped, unknown]).await;

        assert!(dir.path().join("By-Entity").join("OpenAI").exists());
        assert!(dir.path().join("By-Entity").join("Others").exists());
        assert!(!dir.path().join("By-Entity").join("MadeUpCorp").exists());
    }

    #[tokio::test]
    async fn posts_json_lists_every_post_in_domain() {
        let dir = tempfile::tempdir().unwrap();
        run_writer(
            dir.path(),
            vec![
                post(Domain::AiPlatforms, 5, "a", "https://example.com/1"),
                post(Domain::AiPlatforms, 1, "b", "https://example.com/2"),
            ],
        )
        .await;

        let raw = std::fs::read_to_string(
            dir.path().join("By-Domain").join("ai-platforms").join("posts.json"),
        )
        .unwrap();
        let records: Vec<serde_json::Value> = serde_json::from_str(&raw).unwrap();
        // Excluded posts stay in the index; the manifest separates tiers.
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["title"], "Model launch");
    }

    #[tokio::test]
    async fn manifest_totals_are_consistent() {
        let dir = tempfile::tempdir().unwrap();
        let summary = run_writer(
            dir.path(),
            vec![
                post(Domain::LlmTechProducts, 5, "openai", "https://example.com/1"),
                post(Domain::DataPlatforms, 3, "x", "https://example.com/2"),
                post(Domain::DataPlatforms, 1, "y", "https://example.com/3"),
            ],
        )
        .await;

        let raw = std::fs::read_to_string(&summary.manifest_path).unwrap();
        let manifest: serde_json::Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(manifest["batch_id"], "20260801_120000");
        assert_eq!(manifest["stats"]["total_posts"], 3);
        assert_eq!(manifest["stats"]["domain_count"], 2);
        let dist = &manifest["stats"]["quality_distribution"];
        assert_eq!(
            dist["high"].as_u64().unwrap()
                + dist["pending"].as_u64().unwrap()
                + dist["excluded"].as_u64().unwrap(),
            3
        );
        // Accepted posts only in the entity counts.
        let entities = manifest["stats"]["top_entities"].as_object().unwrap();
        let entity_total: u64 = entities.values().map(|v| v.as_u64().unwrap()).sum();
        assert_eq!(entity_total, 2);
        assert!(manifest["domain_reports"]["data-platforms"].is_string());
    }

    #[tokio::test]
    async fn empty_batch_still_writes_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let summary = run_writer(dir.path(), vec![]).await;

        assert_eq!(summary.total_posts, 0);
        assert!(summary.manifest_path.exists());
    }

    #[test]
    fn summary_render_mentions_counts() {
        let summary = BatchSummary {
            total_posts: 2,
            quality: QualityDistribution {
                high: 1,
                pending: 1,
                excluded: 0,
            },
            domains: vec![("llm-tech-products".to_string(), 1, 1)],
            top_entities: vec![("OpenAI".to_string(), 2)],
            manifest_path: PathBuf::from("/tmp/latest_batch.json"),
        };
        let rendered = summary.render();
        assert!(rendered.contains("Total Valid Posts: 2"));
        assert!(rendered.contains("H:1 / P:1 / E:0"));
        assert!(rendered.contains("OpenAI: 2 posts"));
    }
}
