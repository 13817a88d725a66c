//! Messages API response parsing.
//!
//! Content blocks are read in two passes: first as raw JSON, then by type.
//! That keeps `tool_use` input byte-for-byte, which an internally tagged
//! enum cannot do.

use serde::Deserialize;
use serde_json::value::RawValue;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::PROVIDER_NAME;
use crate::error::{Error, Result};
use crate::function_call::{format_function_call, raw_arguments};
use crate::types::{
    null_as_default, Annotation, ResponseDetails, ResponseMetadata, Source, TokenUsage,
    UrlCitation, WebSearchAction, WebSearchCall,
};

const CITATION_WEB_SEARCH: &str = "web_search_result_location";

// --- API Response Types ---

#[derive(Deserialize, Debug)]
struct ApiResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    #[serde(default, deserialize_with = "null_as_default")]
    content: Vec<Box<RawValue>>,
    stop_reason: Option<String>,
    usage: Option<ApiUsage>,
    error: Option<ApiError>,
}

#[derive(Deserialize, Debug)]
pub(super) struct ApiError {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

impl ApiError {
    pub(super) fn into_error(self) -> Error {
        let message = if self.kind.is_empty() {
            self.message
        } else {
            format!("{}: {}", self.kind, self.message)
        };
        Error::Api {
            provider: PROVIDER_NAME,
            message,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    cache_creation_input_tokens: Option<u64>,
    #[serde(default)]
    cache_read_input_tokens: Option<u64>,
    #[serde(default)]
    server_tool_use: Option<Value>,
}

impl ApiUsage {
    fn normalize(&self) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.input_tokens,
            completion_tokens: self.output_tokens,
            total_tokens: self.input_tokens.saturating_add(self.output_tokens),
            cache_creation_tokens: self.cache_creation_input_tokens.unwrap_or(0),
            cache_read_tokens: self.cache_read_input_tokens.unwrap_or(0),
        }
    }
}

#[derive(Deserialize)]
struct BlockHead {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct TextBlock {
    #[serde(default)]
    text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    citations: Vec<ApiCitation>,
}

#[derive(Deserialize)]
struct ApiCitation {
    #[serde(rename = "type", default)]
    kind: String,
    url: Option<String>,
    title: Option<String>,
}

#[derive(Deserialize)]
struct ToolUseBlock {
    name: String,
    input: Box<RawValue>,
}

#[derive(Deserialize)]
struct ServerToolUseBlock {
    #[serde(default)]
    id: String,
    #[serde(default)]
    input: Value,
}

#[derive(Deserialize)]
struct SearchResultBlock {
    #[serde(default)]
    tool_use_id: String,
    content: SearchResultContent,
}

/// A search result block holds either the results or an error object.
#[derive(Deserialize)]
#[serde(untagged)]
enum SearchResultContent {
    Results(Vec<SearchResult>),
    Error {
        #[serde(default)]
        error_code: String,
    },
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    url: String,
    title: Option<String>,
}

// --- Parsing ---

/// Accumulates normalized output while walking the content blocks.
#[derive(Default)]
struct Collector {
    text: String,
    /// Characters in `text` so far; citation offsets are char offsets.
    text_chars: usize,
    tool_calls: Vec<String>,
    calls: Vec<WebSearchCall>,
    annotations: Vec<Annotation>,
    citations: Vec<UrlCitation>,
    search_errors: Vec<Value>,
    saw_search: bool,
}

impl Collector {
    fn text(&mut self, block: TextBlock) {
        let start = self.text_chars;
        let end = start + block.text.chars().count();
        self.text.push_str(&block.text);
        self.text_chars = end;

        for citation in block.citations {
            let annotation = Annotation {
                kind: citation.kind,
                start_index: start,
                end_index: end,
                url: citation.url,
                title: citation.title,
            };
            if annotation.kind == CITATION_WEB_SEARCH {
                self.saw_search = true;
                self.citations.push(UrlCitation {
                    start_index: start,
                    end_index: end,
                    url: annotation.url.clone().unwrap_or_default(),
                    title: annotation.title.clone().unwrap_or_default(),
                });
            }
            self.annotations.push(annotation);
        }
    }

    fn server_tool_use(&mut self, block: ServerToolUseBlock) {
        self.saw_search = true;
        let query = block
            .input
            .get("query")
            .and_then(Value::as_str)
            .map(str::to_string);
        self.calls.push(WebSearchCall {
            id: block.id,
            status: "completed".to_string(),
            action: Some(WebSearchAction {
                kind: "search".to_string(),
                query,
                ..Default::default()
            }),
        });
    }

    fn search_result(&mut self, block: SearchResultBlock) {
        self.saw_search = true;
        let index = match self.calls.iter().position(|c| c.id == block.tool_use_id) {
            Some(index) => index,
            None => {
                warn!(tool_use_id = %block.tool_use_id, "search result without a matching call");
                self.calls.push(WebSearchCall {
                    id: block.tool_use_id.clone(),
                    status: "completed".to_string(),
                    action: None,
                });
                self.calls.len() - 1
            }
        };
        let call = &mut self.calls[index];

        match block.content {
            SearchResultContent::Results(results) => {
                let action = call.action.get_or_insert_with(|| WebSearchAction {
                    kind: "search".to_string(),
                    ..Default::default()
                });
                action.sources.extend(results.into_iter().map(|r| Source {
                    url: r.url,
                    title: r.title,
                    kind: r.kind,
                }));
            }
            SearchResultContent::Error { error_code } => {
                call.status = "failed".to_string();
                self.search_errors
                    .push(json!({"tool_use_id": block.tool_use_id, "error_code": error_code}));
            }
        }
    }
}

pub(super) fn parse(body: &[u8]) -> Result<(String, ResponseDetails)> {
    let response: ApiResponse = serde_json::from_slice(body).map_err(decode_error)?;

    if let Some(error) = response.error {
        return Err(error.into_error());
    }
    if response.content.is_empty() {
        return Err(Error::EmptyResponse {
            provider: PROVIDER_NAME,
        });
    }

    let mut collector = Collector::default();
    for raw in &response.content {
        let head: BlockHead = serde_json::from_str(raw.get()).map_err(decode_error)?;
        match head.kind.as_str() {
            "text" => collector.text(from_raw(raw)?),
            "tool_use" => {
                let block: ToolUseBlock = from_raw(raw)?;
                collector
                    .tool_calls
                    .push(format_function_call(&block.name, &raw_arguments(&block.input)));
            }
            "server_tool_use" => collector.server_tool_use(from_raw(raw)?),
            "web_search_tool_result" => collector.search_result(from_raw(raw)?),
            other => debug!(kind = other, "skipping content block"),
        }
    }

    let usage = response.usage.unwrap_or_default();
    let mut metadata = ResponseMetadata {
        finish_reason: response.stop_reason,
        ..Default::default()
    };
    if let Some(server_tool_use) = usage.server_tool_use.clone() {
        metadata.extra.insert("server_tool_use".to_string(), server_tool_use);
    }
    if !collector.search_errors.is_empty() {
        metadata.extra.insert(
            "web_search_errors".to_string(),
            Value::Array(std::mem::take(&mut collector.search_errors)),
        );
    }
    if collector.saw_search {
        metadata.web_search_calls = Some(std::mem::take(&mut collector.calls));
        metadata.citations = Some(std::mem::take(&mut collector.citations));
    }
    if collector.saw_search || !collector.annotations.is_empty() {
        metadata.annotations = Some(std::mem::take(&mut collector.annotations));
    }

    let details = ResponseDetails {
        id: response.id,
        model: response.model,
        usage: usage.normalize(),
        metadata,
    };

    let text = if !collector.text.is_empty() {
        collector.text
    } else if !collector.tool_calls.is_empty() {
        collector.tool_calls.join("\n")
    } else {
        return Err(Error::NoContent {
            provider: PROVIDER_NAME,
        });
    };

    Ok((text, details))
}

fn from_raw<'a, T: Deserialize<'a>>(raw: &'a RawValue) -> Result<T> {
    serde_json::from_str(raw.get()).map_err(decode_error)
}

fn decode_error(source: serde_json::Error) -> Error {
    Error::Decode {
        provider: PROVIDER_NAME,
        source,
    }
}
