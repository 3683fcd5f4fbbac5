//! Shared data model for the crawl pipeline.
//!
//! Posts flow through the four stages as `RawPost` -> `EnrichedPost` ->
//! `OrganizedPost`; the writer emits a `BatchManifest` once per batch.
//! The classification taxonomies (`Category`, `Domain`) are closed sets:
//! any label outside the set coerces to `Other`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Upstream source family of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// Micro-blog channel feed (parallel-safe).
    #[serde(rename = "weixin")]
    Weixin,
    /// Short-form social network, scraped directly or via the legacy bridge.
    #[serde(rename = "X")]
    X,
    /// Video platform channel feed (parallel-safe).
    #[serde(rename = "YouTube")]
    YouTube,
    /// Arbitrary web page.
    #[serde(rename = "web")]
    Web,
}

impl SourceKind {
    /// Canonical label used in filenames and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Weixin => "weixin",
            SourceKind::X => "X",
            SourceKind::YouTube => "YouTube",
            SourceKind::Web => "web",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized feed item as produced by the Fetch stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPost {
    /// Item title.
    pub title: String,
    /// Publish date, `YYYY-MM-DD`.
    pub date: String,
    /// Canonical item link. Unique within a batch per source.
    pub link: String,
    /// Source family.
    pub source_type: SourceKind,
    /// Display name of the configured source.
    pub source_name: String,
    /// Opaque HTML/text body.
    pub content: String,
}

/// A post augmented with embedded-resource content by the Enrich stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedPost {
    /// The underlying raw post.
    #[serde(flatten)]
    pub post: RawPost,
    /// Concatenated article text and video transcripts.
    pub extra_content: String,
    /// Outbound URLs extracted from the content, deduplicated in
    /// first-occurrence order.
    pub extra_urls: Vec<String>,
}

impl EnrichedPost {
    /// Wrap a raw post with empty enrichment (the pass-through case).
    pub fn passthrough(post: RawPost) -> Self {
        Self {
            post,
            extra_content: String::new(),
            extra_urls: Vec::new(),
        }
    }
}

/// Closed-set content category assigned by the LLM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "tech-release")]
    TechRelease,
    #[serde(rename = "product-update")]
    ProductUpdate,
    #[serde(rename = "opinion")]
    Opinion,
    #[serde(rename = "business")]
    Business,
    #[serde(rename = "tech-event")]
    TechEvent,
    #[serde(rename = "customer-case")]
    CustomerCase,
    #[serde(rename = "recruitment-ad")]
    RecruitmentAd,
    #[serde(rename = "other")]
    Other,
}

impl Category {
    /// Parse an LLM-provided label, coercing anything unknown to `Other`.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "tech-release" => Category::TechRelease,
            "product-update" => Category::ProductUpdate,
            "opinion" => Category::Opinion,
            "business" => Category::Business,
            "tech-event" => Category::TechEvent,
            "customer-case" => Category::CustomerCase,
            "recruitment-ad" => Category::RecruitmentAd,
            _ => Category::Other,
        }
    }

    /// Canonical kebab-case label.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::TechRelease => "tech-release",
            Category::ProductUpdate => "product-update",
            Category::Opinion => "opinion",
            Category::Business => "business",
            Category::TechEvent => "tech-event",
            Category::CustomerCase => "customer-case",
            Category::RecruitmentAd => "recruitment-ad",
            Category::Other => "other",
        }
    }
}

/// Closed-set topic domain assigned by the LLM. Doubles as the By-Domain
/// directory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Domain {
    #[serde(rename = "llm-tech-products")]
    LlmTechProducts,
    #[serde(rename = "data-platforms")]
    DataPlatforms,
    #[serde(rename = "ai-platforms")]
    AiPlatforms,
    #[serde(rename = "agent-platforms")]
    AgentPlatforms,
    #[serde(rename = "code-agents")]
    CodeAgents,
    #[serde(rename = "data-agents")]
    DataAgents,
    #[serde(rename = "vertical-agents")]
    VerticalAgents,
    #[serde(rename = "embodied-ai")]
    EmbodiedAi,
    #[serde(rename = "other")]
    Other,
}

impl Domain {
    /// Parse an LLM-provided label, coercing anything unknown to `Other`.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "llm-tech-products" => Domain::LlmTechProducts,
            "data-platforms" => Domain::DataPlatforms,
            "ai-platforms" => Domain::AiPlatforms,
            "agent-platforms" => Domain::AgentPlatforms,
            "code-agents" => Domain::CodeAgents,
            "data-agents" => Domain::DataAgents,
            "vertical-agents" => Domain::VerticalAgents,
            "embodied-ai" => Domain::EmbodiedAi,
            _ => Domain::Other,
        }
    }

    /// Canonical kebab-case label (also the directory name).
    pub fn as_str(self) -> &'static str {
        match self {
            Domain::LlmTechProducts => "llm-tech-products",
            Domain::DataPlatforms => "data-platforms",
            Domain::AiPlatforms => "ai-platforms",
            Domain::AgentPlatforms => "agent-platforms",
            Domain::CodeAgents => "code-agents",
            Domain::DataAgents => "data-agents",
            Domain::VerticalAgents => "vertical-agents",
            Domain::EmbodiedAi => "embodied-ai",
            Domain::Other => "other",
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quality tier derived from the 1-5 quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    High,
    Pending,
    Excluded,
}

impl QualityTier {
    /// Map a quality score to its tier: >=4 high, 2-3 pending, <=1 excluded.
    pub fn from_score(score: u8) -> Self {
        match score {
            s if s >= 4 => QualityTier::High,
            s if s >= 2 => QualityTier::Pending,
            _ => QualityTier::Excluded,
        }
    }

    /// Directory name of the tier.
    pub fn as_str(self) -> &'static str {
        match self {
            QualityTier::High => "high",
            QualityTier::Pending => "pending",
            QualityTier::Excluded => "excluded",
        }
    }

    /// Whether posts of this tier are mirrored into the By-Entity view.
    pub fn is_accepted(self) -> bool {
        !matches!(self, QualityTier::Excluded)
    }
}

/// A fully classified post as produced by the Organize stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizedPost {
    /// One-line event statement.
    pub event: String,
    /// Key information summary.
    pub key_info: String,
    /// Detailed description.
    pub detail: String,
    /// Content category.
    pub category: Category,
    /// Topic domain.
    pub domain: Domain,
    /// Quality score in 1..=5.
    pub quality_score: u8,
    /// The LLM's justification for the score.
    pub quality_reason: String,
    /// Entity attribution proposed by the LLM, if any.
    pub primary_entity: Option<String>,

    /// Publish date carried from the raw post.
    pub date: String,
    /// Link carried from the raw post.
    pub link: String,
    /// Source name carried from the raw post.
    pub source_name: String,
    /// Source family carried from the raw post.
    pub source_type: SourceKind,
    /// Enrichment text carried forward.
    pub extra_content: String,
    /// Enrichment URLs carried forward.
    pub extra_urls: Vec<String>,
}

impl OrganizedPost {
    /// Quality tier of this post.
    pub fn tier(&self) -> QualityTier {
        QualityTier::from_score(self.quality_score)
    }
}

/// Aggregate quality counts for the manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityDistribution {
    /// Posts with score >= 4.
    pub high: u64,
    /// Posts with score 2-3.
    pub pending: u64,
    /// Posts with score <= 1.
    pub excluded: u64,
}

impl QualityDistribution {
    /// Total posts across all tiers.
    pub fn total(&self) -> u64 {
        self.high + self.pending + self.excluded
    }
}

/// Aggregate statistics for a batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchStats {
    /// Number of posts written.
    pub total_posts: u64,
    /// Number of distinct domains seen.
    pub domain_count: u64,
    /// Per-tier counts.
    pub quality_distribution: QualityDistribution,
    /// Accepted-post counts per entity.
    pub top_entities: BTreeMap<String, u64>,
}

/// The batch manifest, written once per batch as the writer's final act.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchManifest {
    /// Batch identifier, `YYYYMMDD_HHMMSS`.
    pub batch_id: String,
    /// ISO-8601 creation timestamp.
    pub created_at: String,
    /// Map of domain label to its directory name.
    pub domain_reports: BTreeMap<String, String>,
    /// Aggregate statistics.
    pub stats: BatchStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_from_label_known_values() {
        assert_eq!(Category::from_label("tech-release"), Category::TechRelease);
        assert_eq!(Category::from_label("opinion"), Category::Opinion);
        assert_eq!(
            Category::from_label("recruitment-ad"),
            Category::RecruitmentAd
        );
    }

    #[test]
    fn category_from_label_coerces_unknown_to_other() {
        assert_eq!(Category::from_label("breaking-news"), Category::Other);
        assert_eq!(Category::from_label(""), Category::Other);
        assert_eq!(Category::from_label("Tech-Release"), Category::Other);
    }

    #[test]
    fn domain_from_label_round_trips() {
        for label in [
            "llm-tech-products",
            "data-platforms",
            "ai-platforms",
            "agent-platforms",
            "code-agents",
            "data-agents",
            "vertical-agents",
            "embodied-ai",
            "other",
        ] {
            assert_eq!(Domain::from_label(label).as_str(), label);
        }
    }

    #[test]
    fn domain_from_label_coerces_unknown_to_other() {
        assert_eq!(Domain::from_label("quantum-computing"), Domain::Other);
    }

    #[test]
    fn quality_tier_boundaries() {
        assert_eq!(QualityTier::from_score(5), QualityTier::High);
        assert_eq!(QualityTier::from_score(4), QualityTier::High);
        assert_eq!(QualityTier::from_score(3), QualityTier::Pending);
        assert_eq!(QualityTier::from_score(2), QualityTier::Pending);
        assert_eq!(QualityTier::from_score(1), QualityTier::Excluded);
        assert_eq!(QualityTier::from_score(0), QualityTier::Excluded);
    }

    #[test]
    fn excluded_tier_is_not_accepted() {
        assert!(QualityTier::High.is_accepted());
        assert!(QualityTier::Pending.is_accepted());
        assert!(!QualityTier::Excluded.is_accepted());
    }

    #[test]
    fn source_kind_serializes_to_canonical_labels() {
        assert_eq!(
            serde_json::to_string(&SourceKind::Weixin).unwrap(),
            "\"weixin\""
        );
        assert_eq!(serde_json::to_string(&SourceKind::X).unwrap(), "\"X\"");
        assert_eq!(
            serde_json::to_string(&SourceKind::YouTube).unwrap(),
            "\"YouTube\""
        );
    }

    #[test]
    fn quality_distribution_total() {
        let dist = QualityDistribution {
            high: 3,
            pending: 2,
            excluded: 1,
        };
        assert_eq!(dist.total(), 6);
    }

    #[test]
    fn manifest_serializes_expected_schema() {
        let mut domain_reports = BTreeMap::new();
        domain_reports.insert("llm-tech-products".to_string(), "llm-tech-products".to_string());
        let manifest = BatchManifest {
            batch_id: "20260801_120000".to_string(),
            created_at: "2026-08-01T12:00:00Z".to_string(),
            domain_reports,
            stats: BatchStats {
                total_posts: 1,
                domain_count: 1,
                quality_distribution: QualityDistribution {
                    high: 1,
                    pending: 0,
                    excluded: 0,
                },
                top_entities: BTreeMap::from([("OpenAI".to_string(), 1)]),
            },
        };

        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["batch_id"], "20260801_120000");
        assert_eq!(json["stats"]["total_posts"], 1);
        assert_eq!(json["stats"]["quality_distribution"]["high"], 1);
        assert_eq!(json["stats"]["top_entities"]["OpenAI"], 1);
        assert_eq!(json["domain_reports"]["llm-tech-products"], "llm-tech-products");
    }
}
