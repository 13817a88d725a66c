//! Chat Completions response parsing.
//!
//! Two body shapes reach this parser. Plain completions carry `choices`;
//! search-enabled models answer with an `output` array of items in the
//! Responses API format. A non-empty `output` takes precedence.

use serde::Deserialize;
use serde_json::value::RawValue;
use serde_json::Value;
use tracing::debug;

use super::PROVIDER_NAME;
use crate::error::{Error, Result};
use crate::function_call::{format_function_call, raw_arguments};
use crate::types::{
    null_as_default, Annotation, ResponseDetails, ResponseMetadata, TokenUsage, UrlCitation,
    WebSearchAction, WebSearchCall,
};

// --- API Response Types ---

#[derive(Deserialize, Debug)]
struct ApiResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    #[serde(default, deserialize_with = "null_as_default")]
    choices: Vec<ApiChoice>,
    #[serde(default, deserialize_with = "null_as_default")]
    output: Vec<OutputItem>,
    usage: Option<ApiUsage>,
    error: Option<Value>,
}

#[derive(Deserialize, Debug)]
struct ApiChoice {
    #[serde(default)]
    message: ApiResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct ApiResponseMessage {
    content: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    tool_calls: Vec<ApiToolCall>,
}

#[derive(Deserialize, Debug)]
struct ApiToolCall {
    function: ApiToolCallFunction,
}

#[derive(Deserialize, Debug)]
struct ApiToolCallFunction {
    name: String,
    arguments: Box<RawValue>,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutputItem {
    WebSearchCall {
        #[serde(default)]
        id: String,
        #[serde(default)]
        status: String,
        action: Option<WebSearchAction>,
    },
    Message {
        #[serde(default, deserialize_with = "null_as_default")]
        content: Vec<OutputContent>,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug)]
struct OutputContent {
    text: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    annotations: Vec<Annotation>,
}

#[derive(Deserialize, Debug, Default)]
struct ApiUsage {
    #[serde(alias = "input_tokens")]
    prompt_tokens: Option<u64>,
    #[serde(alias = "output_tokens")]
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
    #[serde(alias = "input_tokens_details")]
    prompt_tokens_details: Option<PromptTokensDetails>,
}

#[derive(Deserialize, Debug, Default)]
struct PromptTokensDetails {
    cached_tokens: Option<u64>,
}

impl ApiUsage {
    fn normalize(&self) -> TokenUsage {
        let prompt_tokens = self.prompt_tokens.unwrap_or(0);
        let completion_tokens = self.completion_tokens.unwrap_or(0);
        TokenUsage {
            prompt_tokens,
            completion_tokens,
            total_tokens: self
                .total_tokens
                .unwrap_or(prompt_tokens.saturating_add(completion_tokens)),
            cache_creation_tokens: 0,
            cache_read_tokens: self
                .prompt_tokens_details
                .as_ref()
                .and_then(|d| d.cached_tokens)
                .unwrap_or(0),
        }
    }
}

// --- Parsing ---

pub(super) fn parse(body: &[u8]) -> Result<(String, ResponseDetails)> {
    let response: ApiResponse = serde_json::from_slice(body).map_err(|source| Error::Decode {
        provider: PROVIDER_NAME,
        source,
    })?;

    if let Some(error) = &response.error {
        return Err(Error::Api {
            provider: PROVIDER_NAME,
            message: error_message(error),
        });
    }

    let mut details = ResponseDetails {
        id: response.id,
        model: response.model,
        usage: response
            .usage
            .as_ref()
            .map(ApiUsage::normalize)
            .unwrap_or_default(),
        metadata: ResponseMetadata::default(),
    };

    if !response.output.is_empty() {
        debug!(items = response.output.len(), "parsing web search output");
        let text = parse_output(response.output, &mut details.metadata);
        return Ok((text, details));
    }

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or(Error::EmptyResponse {
            provider: PROVIDER_NAME,
        })?;
    details.metadata.finish_reason = choice.finish_reason;

    let message = choice.message;
    if let Some(content) = message.content.filter(|c| !c.is_empty()) {
        return Ok((content, details));
    }

    if !message.tool_calls.is_empty() {
        let calls: Vec<String> = message
            .tool_calls
            .iter()
            .map(|call| {
                format_function_call(&call.function.name, &raw_arguments(&call.function.arguments))
            })
            .collect();
        return Ok((calls.join("\n"), details));
    }

    Err(Error::NoContent {
        provider: PROVIDER_NAME,
    })
}

/// Collects search calls, text and annotations from an `output` array.
///
/// Annotation offsets are kept exactly as reported.
fn parse_output(output: Vec<OutputItem>, metadata: &mut ResponseMetadata) -> String {
    let mut text = String::new();
    let mut calls = Vec::new();
    let mut annotations = Vec::new();
    let mut citations: Vec<UrlCitation> = Vec::new();

    for item in output {
        match item {
            OutputItem::WebSearchCall { id, status, action } => {
                calls.push(WebSearchCall { id, status, action });
            }
            OutputItem::Message { content } => {
                for part in content {
                    if let Some(fragment) = &part.text {
                        text.push_str(fragment);
                    }
                    citations.extend(part.annotations.iter().filter_map(Annotation::as_citation));
                    annotations.extend(part.annotations);
                }
            }
            OutputItem::Other => {}
        }
    }

    metadata.web_search_calls = Some(calls);
    metadata.annotations = Some(annotations);
    metadata.citations = Some(citations);
    text
}

fn error_message(error: &Value) -> String {
    match error {
        Value::String(message) => message.clone(),
        Value::Object(fields) => {
            let message = fields
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            match fields.get("type").and_then(Value::as_str) {
                Some(kind) => format!("{kind}: {message}"),
                None => message.to_string(),
            }
        }
        other => other.to_string(),
    }
}
