//! Messages API request construction.

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{DEFAULT_MAX_TOKENS, PROVIDER_NAME};
use crate::error::{Error, Result};
use crate::llm::ProviderSettings;
use crate::options::Options;
use crate::schema;
use crate::types::{
    CacheControl, Conversation, Message, Role, Tool, ToolChoice, UserLocation, WebSearchTool,
};

const WEB_SEARCH_TOOL_TYPE: &str = "web_search_20250305";

/// Parameters the Messages API does not accept.
const UNSUPPORTED_PARAMS: &[&str] = &[
    "frequency_penalty",
    "presence_penalty",
    "seed",
    "reasoning_effort",
];

const RESERVED_KEYS: &[&str] = &["model", "messages", "system"];

// --- API Request Types ---

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(flatten)]
    params: Map<String, Value>,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: ApiContent<'a>,
}

/// Content can be a simple string or an array of content blocks.
#[derive(Serialize)]
#[serde(untagged)]
enum ApiContent<'a> {
    Text(&'a str),
    Blocks(Vec<TextBlock<'a>>),
}

#[derive(Serialize)]
struct TextBlock<'a> {
    r#type: &'static str,
    text: &'a str,
    cache_control: Value,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ApiTool<'a> {
    Function {
        name: &'a str,
        description: &'a str,
        input_schema: &'a Value,
    },
    WebSearch {
        r#type: &'static str,
        name: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_uses: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        allowed_domains: Option<&'a [String]>,
        #[serde(skip_serializing_if = "Option::is_none")]
        blocked_domains: Option<&'a [String]>,
        #[serde(skip_serializing_if = "Option::is_none")]
        user_location: Option<ApiUserLocation<'a>>,
    },
}

#[derive(Serialize)]
struct ApiUserLocation<'a> {
    r#type: &'static str,
    #[serde(flatten)]
    location: &'a UserLocation,
}

impl<'a> ApiTool<'a> {
    fn from_tool(tool: &'a Tool) -> Self {
        match tool {
            Tool::Function(f) => ApiTool::Function {
                name: &f.name,
                description: &f.description,
                input_schema: &f.parameters,
            },
            Tool::WebSearch(search) => Self::web_search(search),
        }
    }

    fn web_search(search: &'a WebSearchTool) -> Self {
        if search.external_web_access.is_some() {
            debug!("external_web_access is not supported by anthropic, ignoring");
        }
        ApiTool::WebSearch {
            r#type: WEB_SEARCH_TOOL_TYPE,
            name: "web_search",
            max_uses: search.max_uses,
            allowed_domains: search.allowed_domains.as_deref(),
            blocked_domains: search.blocked_domains.as_deref(),
            user_location: search.user_location.as_ref().map(|location| ApiUserLocation {
                r#type: "approximate",
                location,
            }),
        }
    }
}

fn cache_control_value(cache_control: CacheControl) -> Value {
    match cache_control {
        CacheControl::Ephemeral => json!({"type": "ephemeral"}),
        CacheControl::Persistent => json!({"type": "ephemeral", "ttl": "1h"}),
    }
}

fn api_message(msg: &Message) -> ApiMessage<'_> {
    let role = match msg.role {
        Role::Assistant => "assistant",
        _ => "user",
    };
    let content = match msg.cache_control {
        Some(cache_control) => ApiContent::Blocks(vec![TextBlock {
            r#type: "text",
            text: &msg.content,
            cache_control: cache_control_value(cache_control),
        }]),
        None => ApiContent::Text(&msg.content),
    };
    ApiMessage { role, content }
}

fn tool_choice_value(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!({"type": "auto"}),
        ToolChoice::Required => json!({"type": "any"}),
        ToolChoice::Function(name) => json!({"type": "tool", "name": name}),
        ToolChoice::None => json!({"type": "none"}),
    }
}

// --- Construction ---

pub(super) fn build(
    settings: &ProviderSettings,
    conversation: Conversation<'_>,
    options: &Options,
    tools: &[Tool],
    schema: Option<&Value>,
    stream: bool,
) -> Result<Vec<u8>> {
    let merged = options.merged_over(&settings.defaults);

    let mut system_parts: Vec<String> = Vec::new();
    if let Some(system_prompt) = merged.system_prompt() {
        system_parts.push(system_prompt.to_string());
    }

    let mut messages = Vec::new();
    match conversation {
        Conversation::Prompt(prompt) => messages.push(ApiMessage {
            role: "user",
            content: ApiContent::Text(prompt),
        }),
        Conversation::Messages(history) => {
            for msg in history {
                if msg.role.is_instruction() {
                    system_parts.push(msg.content.clone());
                    continue;
                }
                if !msg.metadata.is_empty() {
                    debug!(role = msg.role.as_str(), "message metadata has no anthropic equivalent");
                }
                messages.push(api_message(msg));
            }
        }
    }

    if let Some(schema) = schema {
        let sanitized = schema::sanitize(schema);
        let rendered = serde_json::to_string(&sanitized).map_err(|source| Error::Encoding {
            provider: PROVIDER_NAME,
            source,
        })?;
        system_parts.push(format!(
            "Respond only with a JSON object that conforms to this JSON schema:\n{rendered}"
        ));
    }

    let api_tools: Vec<ApiTool> = tools.iter().map(ApiTool::from_tool).collect();
    if merged.strict() {
        debug!("strict_tools has no anthropic equivalent, ignoring");
    }

    let tool_choice = if api_tools.is_empty() {
        None
    } else {
        merged.tool_choice.as_ref().map(tool_choice_value)
    };

    let mut params = merged.to_params();
    for key in UNSUPPORTED_PARAMS.iter().chain(RESERVED_KEYS) {
        if params.remove(*key).is_some() {
            debug!(key, "dropping parameter not accepted by anthropic");
        }
    }
    if let Some(stop) = params.remove("stop") {
        params.insert("stop_sequences".to_string(), stop);
    }
    let alias = params.remove("max_completion_tokens");
    let max_tokens = params
        .remove("max_tokens")
        .or(alias)
        .unwrap_or_else(|| Value::from(DEFAULT_MAX_TOKENS));
    params.insert("max_tokens".to_string(), max_tokens);

    let request = ApiRequest {
        model: &settings.model,
        system: (!system_parts.is_empty()).then(|| system_parts.join("\n\n")),
        messages,
        tools: api_tools,
        tool_choice,
        stream: stream.then_some(true),
        params,
    };

    serde_json::to_vec(&request).map_err(|source| Error::Encoding {
        provider: PROVIDER_NAME,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ReasoningEffort;

    fn settings() -> ProviderSettings {
        ProviderSettings::new("k", "claude-sonnet-4-5")
    }

    fn build_value(
        conversation: Conversation<'_>,
        options: &Options,
        tools: &[Tool],
        schema: Option<&Value>,
        stream: bool,
    ) -> Value {
        let bytes = build(&settings(), conversation, options, tools, schema, stream).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn prompt_request_has_default_max_tokens() {
        let body = build_value("Hello".into(), &Options::new(), &[], None, false);
        assert_eq!(body["model"], "claude-sonnet-4-5");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["messages"], json!([{"role": "user", "content": "Hello"}]));
        assert!(body.get("system").is_none());
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn instructions_are_hoisted_to_system() {
        let history = vec![
            Message::system("Rule one."),
            Message::user("hi"),
            Message::developer("Rule two."),
            Message::assistant("hello"),
        ];
        let options = Options::new().with_system_prompt("Be kind.");
        let body = build_value((&history).into(), &options, &[], None, false);
        assert_eq!(body["system"], "Be kind.\n\nRule one.\n\nRule two.");
        assert_eq!(
            body["messages"],
            json!([
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello"}
            ])
        );
    }

    #[test]
    fn cache_control_uses_content_blocks() {
        let history = vec![Message::user("long context").with_cache_control(CacheControl::Ephemeral)];
        let body = build_value((&history).into(), &Options::new(), &[], None, false);
        assert_eq!(
            body["messages"][0]["content"],
            json!([{"type": "text", "text": "long context", "cache_control": {"type": "ephemeral"}}])
        );
    }

    #[test]
    fn tools_and_server_web_search() {
        let tools = vec![
            Tool::function("lookup", "Look up a record", json!({"type": "object"})),
            Tool::WebSearch(WebSearchTool {
                max_uses: Some(5),
                allowed_domains: Some(vec!["docs.rs".into()]),
                user_location: Some(UserLocation {
                    city: Some("Berlin".into()),
                    timezone: Some("Europe/Berlin".into()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
        ];
        let options = Options::new().with_tool_choice(ToolChoice::Required);
        let body = build_value("q".into(), &options, &tools, None, false);
        assert_eq!(
            body["tools"],
            json!([
                {"name": "lookup", "description": "Look up a record", "input_schema": {"type": "object"}},
                {
                    "type": "web_search_20250305",
                    "name": "web_search",
                    "max_uses": 5,
                    "allowed_domains": ["docs.rs"],
                    "user_location": {"type": "approximate", "city": "Berlin", "timezone": "Europe/Berlin"}
                }
            ])
        );
        assert_eq!(body["tool_choice"], json!({"type": "any"}));
    }

    #[test]
    fn tool_choice_needs_tools() {
        let options = Options::new().with_tool_choice(ToolChoice::Function("lookup".into()));
        let body = build_value("q".into(), &options, &[], None, false);
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn tool_choice_none_is_sent() {
        let tools = vec![Tool::function("lookup", "Look up a record", json!({"type": "object"}))];
        let options = Options::new().with_tool_choice(ToolChoice::None);
        let body = build_value("q".into(), &options, &tools, None, false);
        assert_eq!(body["tool_choice"], json!({"type": "none"}));
    }

    #[test]
    fn unsupported_params_are_dropped() {
        let mut options = Options::new()
            .with_temperature(0.4)
            .with_reasoning_effort(ReasoningEffort::High);
        options.seed = Some(1);
        options.max_completion_tokens = Some(300);
        options.stop = Some(vec!["###".into()]);
        let body = build_value("q".into(), &options, &[], None, false);
        assert_eq!(body["temperature"], 0.4);
        assert_eq!(body["max_tokens"], 300);
        assert_eq!(body["stop_sequences"], json!(["###"]));
        for key in ["seed", "reasoning_effort", "max_completion_tokens", "stop"] {
            assert!(body.get(key).is_none(), "{key} was sent");
        }
    }

    #[test]
    fn schema_is_appended_to_system() {
        let schema = json!({"type": "object", "properties": {"n": {"type": "integer", "minimum": 0}}});
        let options = Options::new().with_system_prompt("Count.");
        let body = build_value("how many?".into(), &options, &[], Some(&schema), false);
        let system = body["system"].as_str().unwrap();
        assert!(system.starts_with("Count.\n\n"));
        assert!(system.contains(
            r#"{"additionalProperties":false,"properties":{"n":{"type":"integer"}},"type":"object"}"#
        ));
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn stream_flag() {
        let body = build_value("q".into(), &Options::new(), &[], None, true);
        assert_eq!(body["stream"], true);
    }
}
