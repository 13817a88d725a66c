//! Provider abstraction.
//!
//! This module defines the `Provider` trait that every supported API family
//! implements, plus the settings they are built from.
//!
//! Key concepts:
//! - **Pure translation**: a provider turns a conversation into request bytes
//!   and response bytes back into text. It never touches the network; that
//!   is the transport's job (see `crate::transport`).
//! - **One triad per family**: each provider directory holds a request
//!   builder, a response parser and a stream decoder for its wire format.
//! - **Immutable after construction**: providers are `Send + Sync` and can be
//!   shared across tasks.

pub mod anthropic;
pub mod openai;

use std::collections::BTreeMap;

use crate::error::Result;
use crate::options::Options;
use crate::schema::SchemaSource;
use crate::types::{Conversation, ResponseDetails, StreamDelta, Tool};

use anthropic::AnthropicProvider;
use openai::OpenAiProvider;

/// Names accepted by [`create_provider`].
pub const SUPPORTED_PROVIDERS: &[&str] = &["openai", "openai_compatible", "anthropic"];

/// Everything a provider needs to know about its deployment.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub api_key: String,
    pub model: String,
    /// Overrides the provider's default base URL.
    pub api_base: Option<String>,
    /// Options applied to every request unless the call overrides them.
    pub defaults: Options,
    /// Headers sent on every request, layered over the provider's own.
    pub extra_headers: BTreeMap<String, String>,
}

impl ProviderSettings {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    pub fn with_defaults(mut self, defaults: Options) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(name.into(), value.into());
        self
    }

    /// `base` with the extra headers layered on top. Header names compare
    /// case-insensitively.
    pub(crate) fn merge_headers(&self, mut base: Vec<(String, String)>) -> Vec<(String, String)> {
        for (name, value) in &self.extra_headers {
            base.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
            base.push((name.clone(), value.clone()));
        }
        base
    }

    pub(crate) fn base_url(&self, default: &str) -> String {
        self.api_base
            .as_deref()
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }
}

/// A request ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Trait that every provider family implements.
///
/// The builders return the serialized request body. Pair it with
/// [`Provider::prepare`] to get something a transport can send.
pub trait Provider: Send + Sync {
    /// Short lowercase identifier, used in errors and logs.
    fn name(&self) -> &'static str;

    fn model(&self) -> &str;

    /// Full URL requests are posted to.
    fn endpoint(&self) -> String;

    /// Authentication, content type and any configured extra headers.
    fn headers(&self) -> Vec<(String, String)>;

    /// Whether the API has a native structured-output mode.
    fn supports_json_schema(&self) -> bool;

    fn supports_streaming(&self) -> bool {
        true
    }

    fn build(&self, conversation: Conversation<'_>, options: &Options, tools: &[Tool])
        -> Result<Vec<u8>>;

    /// Like [`Provider::build`], constraining the answer to `schema`.
    fn build_with_schema(
        &self,
        conversation: Conversation<'_>,
        options: &Options,
        tools: &[Tool],
        schema: &SchemaSource,
    ) -> Result<Vec<u8>>;

    /// Like [`Provider::build`], asking for a streamed answer.
    fn build_stream(
        &self,
        conversation: Conversation<'_>,
        options: &Options,
        tools: &[Tool],
    ) -> Result<Vec<u8>>;

    /// Normalize a complete response body.
    fn parse(&self, body: &[u8]) -> Result<(String, ResponseDetails)>;

    /// Decode one stream payload (an SSE `data:` line without the prefix).
    fn decode_chunk(&self, chunk: &[u8]) -> Result<StreamDelta>;

    fn prepare(&self, body: Vec<u8>) -> PreparedRequest {
        PreparedRequest {
            url: self.endpoint(),
            headers: self.headers(),
            body,
        }
    }
}

/// Create a provider by name, or `None` if the name is unknown.
pub fn create_provider(name: &str, settings: ProviderSettings) -> Option<Box<dyn Provider>> {
    match name {
        "openai" | "openai_compatible" => Some(Box::new(OpenAiProvider::new(settings))),
        "anthropic" => Some(Box::new(AnthropicProvider::new(settings))),
        _ => None,
    }
}
