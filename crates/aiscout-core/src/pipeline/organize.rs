//! Organize stage: LLM classification and scoring.
//!
//! Each enriched post is rendered into the prompt template and submitted to
//! the LLM with a strict-JSON response contract. A global semaphore caps
//! in-flight requests independently of the worker count. Items the LLM
//! marks as skip, and items that still fail after all retries, are
//! dropped without disturbing the stage.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Semaphore;

use crate::llm::{GenerationParams, LlmProvider};
use crate::types::{Category, Domain, EnrichedPost, OrganizedPost};

/// Retries after the first attempt.
const MAX_RETRIES: u32 = 3;

/// Fixed backoff between attempts.
const RETRY_DELAY: Duration = Duration::from_secs(3);

/// System prompt for the organization call.
const SYSTEM_PROMPT: &str =
    "You are a helpful assistant for data organization. Output only valid JSON, no extra text.";

/// Shared per-item organization logic.
pub(crate) struct Organizer {
    llm: Arc<dyn LlmProvider>,
    prompt_template: String,
    entity_list: String,
    semaphore: Arc<Semaphore>,
}

/// The LLM's JSON verdict for one post.
#[derive(Debug, Deserialize)]
struct LlmVerdict {
    #[serde(default)]
    skip: bool,
    #[serde(default)]
    event: String,
    #[serde(default)]
    key_info: String,
    #[serde(default)]
    detail: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    domain: String,
    #[serde(default)]
    quality_score: Option<serde_json::Value>,
    #[serde(default)]
    quality_reason: String,
    #[serde(default)]
    primary_entity: Option<String>,
}

impl Organizer {
    pub(crate) fn new(
        llm: Arc<dyn LlmProvider>,
        prompt_template: String,
        entity_list: String,
        max_concurrency: usize,
    ) -> Self {
        Self {
            llm,
            prompt_template,
            entity_list,
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    /// Classify one post. `None` means the item is dropped (LLM skip or
    /// exhausted retries).
    pub(crate) async fn organize(&self, post: &EnrichedPost) -> Option<OrganizedPost> {
        let prompt = self.render_prompt(post);

        let params = GenerationParams {
            json_object: true,
            ..GenerationParams::default()
        };

        for attempt in 0..=MAX_RETRIES {
            let response = {
                let _permit = self.semaphore.acquire().await.ok()?;
                self.llm.complete(SYSTEM_PROMPT, &prompt, &params).await
            };

            let text = match response {
                Ok(response) => response.text,
                Err(e) => {
                    if attempt < MAX_RETRIES {
                        tracing::warn!(
                            title = %title_of(post),
                            attempt = attempt + 1,
                            error = %e,
                            "LLM call failed, retrying"
                        );
                        tokio::time::sleep(RETRY_DELAY).await;
                        continue;
                    }
                    tracing::error!(title = %title_of(post), error = %e, "LLM call failed, dropping item");
                    return None;
                }
            };

            match serde_json::from_str::<LlmVerdict>(text.trim()) {
                Ok(verdict) => return self.build(post, verdict),
                Err(e) => {
                    if attempt < MAX_RETRIES {
                        tracing::warn!(
                            title = %title_of(post),
                            attempt = attempt + 1,
                            error = %e,
                            "non-JSON LLM reply, retrying"
                        );
                        tokio::time::sleep(RETRY_DELAY).await;
                        continue;
                    }
                    tracing::error!(
                        title = %title_of(post),
                        error = %e,
                        "non-JSON LLM reply after retries, dropping item"
                    );
                    return None;
                }
            }
        }

        None
    }

    fn build(&self, post: &EnrichedPost, verdict: LlmVerdict) -> Option<OrganizedPost> {
        if verdict.skip {
            tracing::debug!(title = %title_of(post), "LLM marked item as skip");
            return None;
        }

        let organized = OrganizedPost {
            event: verdict.event,
            key_info: verdict.key_info,
            detail: verdict.detail,
            category: Category::from_label(&verdict.category),
            domain: Domain::from_label(&verdict.domain),
            quality_score: parse_score(verdict.quality_score.as_ref()),
            quality_reason: verdict.quality_reason,
            primary_entity: verdict.primary_entity.filter(|e| !e.is_empty()),
            date: post.post.date.clone(),
            link: post.post.link.clone(),
            source_name: post.post.source_name.clone(),
            source_type: post.post.source_type,
            extra_content: post.extra_content.clone(),
            extra_urls: post.extra_urls.clone(),
        };

        tracing::info!(
            domain = %organized.domain,
            score = organized.quality_score,
            title = %title_of(post),
            "organized post"
        );
        Some(organized)
    }

    fn render_prompt(&self, post: &EnrichedPost) -> String {
        self.prompt_template
            .replace("{title}", &post.post.title)
            .replace("{date}", &post.post.date)
            .replace("{link}", &post.post.link)
            .replace("{source_type}", post.post.source_type.as_str())
            .replace("{source_name}", &post.post.source_name)
            .replace("{content}", &post.post.content)
            .replace("{extra_content}", &post.extra_content)
            .replace("{extra_urls}", &post.extra_urls.join(", "))
            .replace("{entity_list}", &self.entity_list)
    }
}

/// Clamp the LLM's score into 1..=5; a missing or unreadable score lands
/// in the middle tier.
fn parse_score(raw: Option<&serde_json::Value>) -> u8 {
    let score = match raw {
        Some(serde_json::Value::Number(n)) => n.as_i64().unwrap_or(3),
        Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(3),
        _ => 3,
    };
    score.clamp(1, 5) as u8
}

fn title_of(post: &EnrichedPost) -> String {
    post.post.title.chars().take(30).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::LlmResponse;
    use crate::types::{RawPost, SourceKind};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Stub provider returning scripted replies in order.
    struct ScriptedLlm {
        replies: Vec<Result<String, ()>>,
        calls: AtomicU32,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<Result<String, ()>>) -> Self {
            Self {
                replies,
                calls: AtomicU32::new(0),
            }
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl LlmProvider for ScriptedLlm {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            _system: &str,
            _user: &str,
            _params: &GenerationParams,
        ) -> Result<LlmResponse, LlmError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            let reply = self.replies.get(call).cloned().unwrap_or(Err(()));
            match reply {
                Ok(text) => Ok(LlmResponse {
                    text,
                    model: "stub".to_string(),
                }),
                Err(()) => Err(LlmError::Empty),
            }
        }

        async fn health_check(&self) -> Result<(), LlmError> {
            Ok(())
        }
    }

    fn enriched_post() -> EnrichedPost {
        EnrichedPost {
            post: RawPost {
                title: "New model shipped".to_string(),
                date: "2026-08-01".to_string(),
                link: "https://example.com/a".to_string(),
                source_type: SourceKind::Weixin,
                source_name: "AI Weekly".to_string(),
                content: "body".to_string(),
            },
            extra_content: "extra".to_string(),
            extra_urls: vec!["https://blog.example/p".to_string()],
        }
    }

    fn organizer_with(llm: Arc<ScriptedLlm>) -> Organizer {
        Organizer::new(
            llm,
            "{title}|{date}|{source_type}|{content}|{extra_content}|{entity_list}".to_string(),
            "OpenAI, Anthropic".to_string(),
            10,
        )
    }

    fn good_verdict() -> String {
        serde_json::json!({
            "event": "E",
            "key_info": "k",
            "detail": "d",
            "category": "tech-release",
            "domain": "llm-tech-products",
            "quality_score": 5,
            "quality_reason": "r"
        })
        .to_string()
    }

    #[tokio::test]
    async fn organize_merges_llm_and_stable_fields() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(good_verdict())]));
        let organizer = organizer_with(Arc::clone(&llm));

        let organized = organizer.organize(&enriched_post()).await.expect("post");
        assert_eq!(organized.event, "E");
        assert_eq!(organized.category, Category::TechRelease);
        assert_eq!(organized.domain, Domain::LlmTechProducts);
        assert_eq!(organized.quality_score, 5);
        assert_eq!(organized.date, "2026-08-01");
        assert_eq!(organized.link, "https://example.com/a");
        assert_eq!(organized.source_name, "AI Weekly");
        assert_eq!(organized.extra_content, "extra");
        assert_eq!(organized.extra_urls, vec!["https://blog.example/p"]);
    }

    #[tokio::test]
    async fn skip_verdict_drops_item() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok("{\"skip\": true}".to_string())]));
        let organizer = organizer_with(Arc::clone(&llm));

        assert!(organizer.organize(&enriched_post()).await.is_none());
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn non_json_replies_retry_then_drop() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Ok("I think this is about AI".to_string()),
            Ok("still not json".to_string()),
            Ok("nope".to_string()),
            Ok("nope again".to_string()),
        ]));
        let organizer = organizer_with(Arc::clone(&llm));

        assert!(organizer.organize(&enriched_post()).await.is_none());
        assert_eq!(llm.call_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn llm_failure_retries_then_succeeds() {
        let llm = Arc::new(ScriptedLlm::new(vec![Err(()), Ok(good_verdict())]));
        let organizer = organizer_with(Arc::clone(&llm));

        assert!(organizer.organize(&enriched_post()).await.is_some());
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn unknown_labels_coerce_to_other() {
        let verdict = serde_json::json!({
            "event": "E",
            "category": "hot-take",
            "domain": "metaverse",
            "quality_score": 2
        })
        .to_string();
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(verdict)]));
        let organizer = organizer_with(llm);

        let organized = organizer.organize(&enriched_post()).await.expect("post");
        assert_eq!(organized.category, Category::Other);
        assert_eq!(organized.domain, Domain::Other);
    }

    #[tokio::test]
    async fn prompt_renders_all_placeholders() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(good_verdict())]));
        let organizer = organizer_with(llm);

        let rendered = organizer.render_prompt(&enriched_post());
        assert_eq!(
            rendered,
            "New model shipped|2026-08-01|weixin|body|extra|OpenAI, Anthropic"
        );
    }

    #[test]
    fn score_parsing_clamps_and_defaults() {
        use serde_json::json;
        assert_eq!(parse_score(Some(&json!(5))), 5);
        assert_eq!(parse_score(Some(&json!(0))), 1);
        assert_eq!(parse_score(Some(&json!(9))), 5);
        assert_eq!(parse_score(Some(&json!("4"))), 4);
        assert_eq!(parse_score(Some(&json!("high"))), 3);
        assert_eq!(parse_score(None), 3);
    }
}
