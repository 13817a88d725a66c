//! Error taxonomy for request building, response parsing and stream decoding.
//!
//! Every variant raised by the normalization engine names the provider it
//! came from so it can be logged without further processing. Nothing here is
//! retried internally; retry policy belongs to whoever owns the transport.

/// Errors produced by `llmbridge`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The structured-output schema is not valid JSON.
    #[error("{provider}: invalid schema: {source}")]
    Schema {
        provider: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The assembled request could not be serialized.
    #[error("{provider}: failed to encode request: {source}")]
    Encoding {
        provider: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The response body is not the JSON document the provider promises.
    #[error("{provider}: failed to decode response body: {source}")]
    Decode {
        provider: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The provider answered with an error object instead of a completion.
    #[error("{provider}: API error: {message}")]
    Api {
        provider: &'static str,
        message: String,
    },

    /// The response carried neither choices nor output items.
    #[error("{provider}: empty response from API")]
    EmptyResponse { provider: &'static str },

    /// A choice was present but held no text and no tool calls.
    #[error("{provider}: no content or tool calls in response")]
    NoContent { provider: &'static str },

    /// A streaming chunk was blank. Callers should read the next one.
    #[error("{provider}: empty stream chunk")]
    EmptyChunk { provider: &'static str },

    /// A streaming chunk was not valid JSON.
    #[error("{provider}: malformed stream chunk: {source}")]
    MalformedChunk {
        provider: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A streaming chunk had no choices to read a delta from.
    #[error("{provider}: no choices in stream chunk")]
    NoChoices { provider: &'static str },

    /// The endpoint answered with a non-success status.
    #[error("HTTP {status} from {url}: {body}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    /// The request never produced a response.
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether a streaming consumer has to abandon the stream.
    ///
    /// Blank chunks are the only recoverable decode failure.
    pub fn is_stream_fatal(&self) -> bool {
        !matches!(self, Error::EmptyChunk { .. })
    }

    /// The provider that raised the error, if it came from the core.
    pub fn provider(&self) -> Option<&'static str> {
        match self {
            Error::Schema { provider, .. }
            | Error::Encoding { provider, .. }
            | Error::Decode { provider, .. }
            | Error::Api { provider, .. }
            | Error::EmptyResponse { provider }
            | Error::NoContent { provider }
            | Error::EmptyChunk { provider }
            | Error::MalformedChunk { provider, .. }
            | Error::NoChoices { provider } => Some(provider),
            Error::Http { .. } | Error::Network { .. } => None,
        }
    }
}
