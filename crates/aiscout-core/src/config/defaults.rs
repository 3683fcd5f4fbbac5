//! Default value functions for serde config deserialization.

pub(super) fn default_llm_max_concurrency() -> usize {
    10
}
pub(super) fn default_prompt_template() -> String {
    "prompts/organizer_prompt.md".to_string()
}
pub(super) fn default_days_lookback() -> i64 {
    7
}
pub(super) fn default_organize_workers() -> usize {
    5
}
pub(super) fn default_enrich_workers() -> usize {
    5
}
pub(super) fn default_channel_capacity() -> usize {
    1000
}
pub(super) fn default_output_dir() -> String {
    "data".to_string()
}
pub(super) fn default_x_request_delay_min() -> u64 {
    30
}
pub(super) fn default_x_request_delay_max() -> u64 {
    60
}
pub(super) fn default_max_tweets_per_user() -> u32 {
    20
}
pub(super) fn default_request_delay_min() -> f64 {
    2.0
}
pub(super) fn default_request_delay_max() -> f64 {
    5.0
}
pub(super) fn default_user_switch_delay_min() -> f64 {
    30.0
}
pub(super) fn default_user_switch_delay_max() -> f64 {
    60.0
}
pub(super) fn default_request_timeout() -> u64 {
    30
}
pub(super) fn default_max_retries() -> u32 {
    3
}
pub(super) fn default_circuit_breaker_threshold() -> u32 {
    5
}
pub(super) fn default_circuit_breaker_cooldown() -> u64 {
    60
}
