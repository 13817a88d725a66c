//! OpenAI Chat Completions provider.
//!
//! Also serves OpenAI-compatible endpoints through `api_base`. Model-family
//! differences are resolved once, at construction, from the quirk table.

mod request;
mod response;
mod stream;

use super::{Provider, ProviderSettings};
use crate::error::Result;
use crate::options::Options;
use crate::quirks::ModelQuirks;
use crate::schema::SchemaSource;
use crate::types::{Conversation, ResponseDetails, StreamDelta, Tool};

use request::Mode;

pub const PROVIDER_NAME: &str = "openai";
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    settings: ProviderSettings,
    quirks: ModelQuirks,
}

impl OpenAiProvider {
    pub fn new(settings: ProviderSettings) -> Self {
        let quirks = ModelQuirks::resolve(&settings.model);
        tracing::debug!(model = %settings.model, ?quirks, "resolved model quirks");
        Self { settings, quirks }
    }

    pub fn quirks(&self) -> &ModelQuirks {
        &self.quirks
    }

    fn request(
        &self,
        conversation: Conversation<'_>,
        options: &Options,
        tools: &[Tool],
        mode: Mode,
    ) -> Result<Vec<u8>> {
        request::build(
            &self.settings.model,
            &self.quirks,
            &self.settings.defaults,
            conversation,
            options,
            tools,
            mode,
        )
    }
}

impl Provider for OpenAiProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url(DEFAULT_API_BASE))
    }

    fn headers(&self) -> Vec<(String, String)> {
        self.settings.merge_headers(vec![
            (
                "Authorization".to_string(),
                format!("Bearer {}", self.settings.api_key),
            ),
            ("Content-Type".to_string(), "application/json".to_string()),
        ])
    }

    fn supports_json_schema(&self) -> bool {
        true
    }

    fn build(
        &self,
        conversation: Conversation<'_>,
        options: &Options,
        tools: &[Tool],
    ) -> Result<Vec<u8>> {
        self.request(conversation, options, tools, Mode::Plain)
    }

    fn build_with_schema(
        &self,
        conversation: Conversation<'_>,
        options: &Options,
        tools: &[Tool],
        schema: &SchemaSource,
    ) -> Result<Vec<u8>> {
        let schema = schema
            .resolve()
            .map_err(|source| crate::Error::Schema {
                provider: PROVIDER_NAME,
                source,
            })?;
        self.request(conversation, options, tools, Mode::Schema(schema))
    }

    fn build_stream(
        &self,
        conversation: Conversation<'_>,
        options: &Options,
        tools: &[Tool],
    ) -> Result<Vec<u8>> {
        self.request(conversation, options, tools, Mode::Stream)
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
    fn default_endpoint() {
        let provider = OpenAiProvider::new(ProviderSettings::new("k", "gpt-4o"));
        assert_eq!(
            provider.endpoint(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn schema_errors_name_the_provider() {
        let provider = OpenAiProvider::new(ProviderSettings::new("k", "gpt-4o"));
        let err = provider
            .build_with_schema(
                Conversation::Prompt("hi"),
                &Options::new(),
                &[],
                &SchemaSource::from("{not json"),
            )
            .unwrap_err();
        assert!(matches!(err, crate::Error::Schema { provider: "openai", .. }));
    }

    #[test]
    fn quirks_follow_the_model() {
        let provider = OpenAiProvider::new(ProviderSettings::new("k", "o3-mini"));
        assert!(provider.quirks().no_temperature);
    }
}
