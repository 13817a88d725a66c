//! Anthropic Messages provider.
//!
//! Key differences from OpenAI:
//! - instructions are a top-level `system` field, not a message
//! - tool definitions use `input_schema` instead of `parameters`
//! - web search is a server tool the API runs itself, and its results come
//!   back as content blocks next to the text
//! - there is no native structured-output mode, so the schema is appended
//!   to the system instructions

mod request;
mod response;
mod stream;

use super::{Provider, ProviderSettings};
use crate::error::{Error, Result};
use crate::options::Options;
use crate::schema::SchemaSource;
use crate::types::{Conversation, ResponseDetails, StreamDelta, Tool};

pub const PROVIDER_NAME: &str = "anthropic";
pub const DEFAULT_API_BASE: &str = "https://api.anthropic.com";
pub const API_VERSION: &str = "2023-06-01";

/// Anthropic requires a token limit on every request.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicProvider {
    settings: ProviderSettings,
}

impl AnthropicProvider {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }
}

impl Provider for AnthropicProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.settings.base_url(DEFAULT_API_BASE))
    }

    fn headers(&self) -> Vec<(String, String)> {
        self.settings.merge_headers(vec![
            ("x-api-key".to_string(), self.settings.api_key.clone()),
            ("anthropic-version".to_string(), API_VERSION.to_string()),
            ("content-type".to_string(), "application/json".to_string()),
        ])
    }

    fn supports_json_schema(&self) -> bool {
        false
    }

    fn build(
        &self,
        conversation: Conversation<'_>,
        options: &Options,
        tools: &[Tool],
    ) -> Result<Vec<u8>> {
        request::build(&self.settings, conversation, options, tools, None, false)
    }

    fn build_with_schema(
        &self,
        conversation: Conversation<'_>,
        options: &Options,
        tools: &[Tool],
        schema: &SchemaSource,
    ) -> Result<Vec<u8>> {
        let schema = schema.resolve().map_err(|source| Error::Schema {
            provider: PROVIDER_NAME,
            source,
        })?;
        request::build(
            &self.settings,
            conversation,
            options,
            tools,
            Some(&schema),
            false,
        )
    }

    fn build_stream(
        &self,
        conversation: Conversation<'_>,
        options: &Options,
        tools: &[Tool],
    ) -> Result<Vec<u8>> {
        request::build(&self.settings, conversation, options, tools, None, true)
    }

    fn parse(&self, body: &[u8]) -> Result<(String, ResponseDetails)> {
        response::parse(body)
    }

    fn decode_chunk(&self, chunk: &[u8]) -> Result<StreamDelta> {
        stream::decode_chunk(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_and_headers() {
        let provider = AnthropicProvider::new(
            ProviderSettings::new("sk-ant", "claude-sonnet-4-5").with_header("anthropic-beta", "x"),
        );
        assert_eq!(provider.endpoint(), "https://api.anthropic.com/v1/messages");
        let headers = provider.headers();
        assert!(headers.contains(&("x-api-key".to_string(), "sk-ant".to_string())));
        assert!(headers.contains(&("anthropic-version".to_string(), "2023-06-01".to_string())));
        assert!(headers.contains(&("anthropic-beta".to_string(), "x".to_string())));
        assert!(!provider.supports_json_schema());
    }
}
