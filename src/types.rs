//! Provider-agnostic data types.
//!
//! Everything a caller hands to a provider, and everything a provider hands
//! back, is expressed with these types. None of them knows which provider
//! produced or will consume it.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// --- Message Roles ---

/// The role of a message in the conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Instruction role used by newer OpenAI model generations in place of `system`.
    Developer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Developer => "developer",
        }
    }

    /// System and developer messages both carry instructions.
    pub fn is_instruction(&self) -> bool {
        matches!(self, Role::System | Role::Developer)
    }
}

/// Caching hint attached to a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheControl {
    Ephemeral,
    Persistent,
}

// --- Messages ---

/// Extra per-message fields copied onto the wire message.
///
/// `name` and `tool_call_id` are the fields chat APIs recognize; anything
/// else goes in `extra` and is forwarded untouched. None of these can
/// override a message's role or content.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessageMetadata {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.tool_call_id.is_none() && self.extra.is_empty()
    }
}

/// A single message in a conversation. Order within a conversation is the
/// order the API replays it in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Token count recorded by whoever stored the message. Never sent.
    #[serde(default)]
    pub tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
    #[serde(default, skip_serializing_if = "MessageMetadata::is_empty")]
    pub metadata: MessageMetadata,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tokens: 0,
            cache_control: None,
            metadata: MessageMetadata::default(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn developer(content: impl Into<String>) -> Self {
        Self::new(Role::Developer, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn with_cache_control(mut self, cache_control: CacheControl) -> Self {
        self.cache_control = Some(cache_control);
        self
    }

    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// What a request is built from: a bare prompt or a full message list.
#[derive(Debug, Clone, Copy)]
pub enum Conversation<'a> {
    /// Rendered as a single user message.
    Prompt(&'a str),
    /// Rendered in order, each message keeping its role.
    Messages(&'a [Message]),
}

impl<'a> From<&'a str> for Conversation<'a> {
    fn from(prompt: &'a str) -> Self {
        Conversation::Prompt(prompt)
    }
}

impl<'a> From<&'a [Message]> for Conversation<'a> {
    fn from(messages: &'a [Message]) -> Self {
        Conversation::Messages(messages)
    }
}

impl<'a> From<&'a Vec<Message>> for Conversation<'a> {
    fn from(messages: &'a Vec<Message>) -> Self {
        Conversation::Messages(messages)
    }
}

// --- Tools ---

/// A capability offered to the model.
///
/// Function tools are executed by the caller; web search is executed by the
/// provider itself and is never sent as a function entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Tool {
    Function(FunctionTool),
    WebSearch(WebSearchTool),
}

impl Tool {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Tool::Function(FunctionTool {
            name: name.into(),
            description: description.into(),
            parameters,
        })
    }

    pub fn web_search() -> Self {
        Tool::WebSearch(WebSearchTool::default())
    }

    pub fn is_web_search(&self) -> bool {
        matches!(self, Tool::WebSearch(_))
    }
}

/// A caller-defined function the model may invoke.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionTool {
    pub name: String,
    pub description: String,
    /// JSON Schema describing the function's arguments.
    pub parameters: Value,
}

/// Provider-executed web search. Not every provider honours every field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WebSearchTool {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_uses: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_domains: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_domains: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_location: Option<UserLocation>,
    /// OpenAI only: whether the search may reach the live internet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_web_access: Option<bool>,
}

/// Approximate location used to localize search results.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

/// How the model should pick among the offered tools.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    None,
    Required,
    /// Force a call to the named function.
    Function(String),
}

// --- Usage & Response Details ---

/// Token consumption reported by the provider, normalized across APIs.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    #[serde(default)]
    pub cache_creation_tokens: u64,
    #[serde(default)]
    pub cache_read_tokens: u64,
}

/// Provider extras that do not belong in the core response shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResponseMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_search_calls: Option<Vec<WebSearchCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<Annotation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<UrlCitation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Everything about a response except its text.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResponseDetails {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    pub usage: TokenUsage,
    #[serde(default)]
    pub metadata: ResponseMetadata,
}

// --- Web Search Artifacts ---

/// One server-executed web search.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WebSearchCall {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<WebSearchAction>,
}

/// What a search call did: `search`, `open_page` or `find_in_page`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WebSearchAction {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub domains: Vec<String>,
    /// Every URL consulted, cited or not.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Source {
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// An annotation over a span of the final response text.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Annotation {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub start_index: usize,
    #[serde(default)]
    pub end_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl Annotation {
    pub const URL_CITATION: &'static str = "url_citation";

    /// The citation view of this annotation, if it is one.
    pub fn as_citation(&self) -> Option<UrlCitation> {
        if self.kind != Self::URL_CITATION {
            return None;
        }
        Some(UrlCitation {
            start_index: self.start_index,
            end_index: self.end_index,
            url: self.url.clone().unwrap_or_default(),
            title: self.title.clone().unwrap_or_default(),
        })
    }
}

/// A URL citation anchored to character offsets in the final text.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UrlCitation {
    pub start_index: usize,
    pub end_index: usize,
    pub url: String,
    pub title: String,
}

// --- Streaming ---

/// The outcome of decoding one streaming chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamDelta {
    /// A piece of generated text.
    Text(String),
    /// The stream finished cleanly.
    EndOfStream,
    /// Nothing to emit for this chunk; keep reading.
    Skip,
}

/// A chunk forwarded to a streaming consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    TextDelta(String),
    Done,
}

// --- Wire Helpers ---

/// Read an explicit `null` as the type's default. Pair with
/// `#[serde(default)]` so a missing key is covered too.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_serializes_only_its_own_variant() {
        let tool = Tool::WebSearch(WebSearchTool {
            max_uses: Some(3),
            ..Default::default()
        });
        let value = serde_json::to_value(&tool).unwrap();
        assert_eq!(value, json!({"type": "web_search", "max_uses": 3}));

        let tool = Tool::function("lookup", "Look something up", json!({"type": "object"}));
        let value = serde_json::to_value(&tool).unwrap();
        assert_eq!(value["type"], "function");
        assert!(value.get("max_uses").is_none());
    }

    #[test]
    fn message_metadata_flattens_extras() {
        let mut metadata = MessageMetadata {
            name: Some("alice".to_string()),
            ..Default::default()
        };
        metadata.extra.insert("refusal".to_string(), Value::Null);
        let msg = Message::user("hi").with_metadata(metadata);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["metadata"]["name"], "alice");
        assert!(value["metadata"]["refusal"].is_null());
    }

    #[test]
    fn annotation_citation_view() {
        let ann = Annotation {
            kind: "url_citation".to_string(),
            start_index: 3,
            end_index: 9,
            url: Some("https://example.com".to_string()),
            title: Some("Example".to_string()),
        };
        let citation = ann.as_citation().unwrap();
        assert_eq!(citation.start_index, 3);
        assert_eq!(citation.end_index, 9);

        let other = Annotation {
            kind: "file_citation".to_string(),
            ..Default::default()
        };
        assert!(other.as_citation().is_none());
    }

    #[test]
    fn response_details_serialize_metadata_keys() {
        let details = ResponseDetails {
            metadata: ResponseMetadata {
                web_search_calls: Some(vec![]),
                citations: Some(vec![]),
                annotations: Some(vec![]),
                ..Default::default()
            },
            ..Default::default()
        };
        let value = serde_json::to_value(&details).unwrap();
        assert!(value["metadata"]["web_search_calls"].is_array());
        assert!(value["metadata"]["annotations"].is_array());
        assert!(value["metadata"]["citations"].is_array());
    }

    #[test]
    fn instruction_roles() {
        assert!(Role::System.is_instruction());
        assert!(Role::Developer.is_instruction());
        assert!(!Role::User.is_instruction());
        assert_eq!(Role::Developer.as_str(), "developer");
    }

    #[test]
    fn null_search_lists_read_as_empty() {
        let action: WebSearchAction = serde_json::from_value(json!({
            "type": "search",
            "query": "rust",
            "domains": null,
            "sources": null
        }))
        .unwrap();
        assert_eq!(action.query.as_deref(), Some("rust"));
        assert!(action.domains.is_empty());
        assert!(action.sources.is_empty());
    }
}
