//! Error types for the aiscout core library.
//!
//! Each subsystem has its own error enum to provide clear error boundaries.
//! The library uses `thiserror` for structured, typed errors.

/// Errors related to configuration loading, parsing, and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required configuration field is absent.
    #[error("missing required config field: {field}")]
    MissingField {
        /// The name of the missing field.
        field: String,
    },

    /// A configuration field has an unacceptable value.
    #[error("invalid value for config field '{field}': {message}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// A description of why the value is invalid.
        message: String,
    },

    /// The configuration file does not exist at the specified path.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// The path that was searched.
        path: String,
    },

    /// TOML deserialization failed.
    #[error("failed to parse config file: {source}")]
    ParseError {
        /// The underlying TOML parse error.
        #[source]
        source: toml::de::Error,
    },

    /// The prompt template file could not be read.
    #[error("failed to read prompt template '{path}': {message}")]
    PromptTemplate {
        /// The path that was attempted.
        path: String,
        /// A description of the failure.
        message: String,
    },
}

/// Errors from fetching and parsing upstream feeds.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Network-level failure fetching the feed.
    #[error("feed request failed: {source}")]
    Request {
        /// The underlying HTTP client error.
        #[from]
        source: reqwest::Error,
    },

    /// The feed endpoint returned a non-success HTTP status.
    #[error("feed returned HTTP {status}")]
    Status {
        /// The HTTP status code.
        status: u16,
    },

    /// The response body is not a parseable RSS/Atom document.
    #[error("feed parse error: {message}")]
    Parse {
        /// A description of the parse failure.
        message: String,
    },
}

/// Errors from the embedded-content enrichment layer.
#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    /// The external web fetcher failed for a URL.
    #[error("web fetch failed for {url}: {message}")]
    WebFetch {
        /// The URL that failed.
        url: String,
        /// A description of the failure.
        message: String,
    },

    /// The video has no audio track (GIF-style silent video).
    ///
    /// Callers map this to an empty transcript rather than a failure.
    #[error("video has no audio stream: {url}")]
    NoAudioStream {
        /// The video URL.
        url: String,
    },

    /// The external transcriber failed for a URL.
    #[error("transcription failed for {url}: {message}")]
    Transcription {
        /// The video URL that failed.
        url: String,
        /// A description of the failure.
        message: String,
    },
}

/// Errors from interacting with the LLM endpoint.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// HTTP request to the LLM endpoint failed.
    #[error("LLM HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// LLM API returned an error response.
    #[error("LLM API error (status {status}): {message}")]
    Api {
        /// The HTTP status code.
        status: u16,
        /// The error message from the API.
        message: String,
    },

    /// LLM provider rate limit hit.
    #[error("LLM rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// LLM response could not be parsed.
    #[error("failed to parse LLM response: {0}")]
    Parse(String),

    /// The LLM returned an empty completion.
    #[error("LLM returned an empty response")]
    Empty,
}

/// Errors from the direct X GraphQL client.
#[derive(Debug, thiserror::Error)]
pub enum XClientError {
    /// The endpoint signalled a rate limit (HTTP 429 or GraphQL code 88).
    #[error("X rate limited, retry after {retry_after}s")]
    RateLimited {
        /// Seconds to wait before the credential is usable again.
        retry_after: u64,
    },

    /// The credential was rejected (HTTP 401/403 or GraphQL auth error).
    #[error("X auth failure: {message}")]
    Auth {
        /// Details from the rejection.
        message: String,
    },

    /// Any other per-request failure (network, 5xx, GraphQL business error).
    #[error("X request failed: {message}")]
    Transient {
        /// A description of the failure.
        message: String,
    },

    /// Credential material could not be loaded.
    #[error("X credentials unavailable: {message}")]
    Credentials {
        /// A description of what is missing or malformed.
        message: String,
    },
}

/// Errors from the result writer.
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    /// A per-post file write failed (logged, non-fatal to the batch).
    #[error("failed to write post file {path}: {source}")]
    PostFile {
        /// The destination path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The batch manifest could not be written. Fatal to the batch.
    #[error("failed to write batch manifest: {source}")]
    Manifest {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors that abort an entire pipeline batch.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The writer stage failed to persist the batch manifest.
    #[error(transparent)]
    Writer(#[from] WriterError),

    /// A stage worker terminated abnormally.
    #[error("pipeline stage '{stage}' failed: {message}")]
    Stage {
        /// The stage name.
        stage: &'static str,
        /// A description of the failure.
        message: String,
    },
}
