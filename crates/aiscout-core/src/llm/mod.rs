//! LLM provider abstraction.
//!
//! The Organize stage talks to a chat-completions endpoint through the
//! `LlmProvider` trait. The single shipped implementation is
//! `OpenAiCompatProvider`, which works with any OpenAI-compatible endpoint.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;

use crate::error::LlmError;

/// Response from an LLM completion request.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// The generated text content.
    pub text: String,
    /// The model that produced this response.
    pub model: String,
}

/// Parameters controlling LLM generation behavior.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    /// Maximum number of tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature (0.0 = deterministic, 1.0+ = creative).
    pub temperature: f32,
    /// Request a strict JSON object response from the endpoint.
    pub json_object: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            temperature: 0.2,
            json_object: false,
        }
    }
}

/// Trait abstracting the LLM endpoint.
///
/// Object-safe for use as `Arc<dyn LlmProvider>` across organize workers.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Returns the display name of this provider.
    fn name(&self) -> &str;

    /// Send a completion request to the LLM.
    async fn complete(
        &self,
        system: &str,
        user_message: &str,
        params: &GenerationParams,
    ) -> Result<LlmResponse, LlmError>;

    /// Check if the provider is reachable and configured correctly.
    async fn health_check(&self) -> Result<(), LlmError>;
}
