//! Chat Completions request construction.

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::PROVIDER_NAME;
use crate::error::{Error, Result};
use crate::options::Options;
use crate::quirks::ModelQuirks;
use crate::schema;
use crate::types::{Conversation, FunctionTool, Message, Tool, ToolChoice, WebSearchTool};

/// Top-level keys the builder owns. Extra options with these names are
/// dropped rather than emitted twice.
const RESERVED_KEYS: &[&str] = &[
    "model",
    "messages",
    "response_format",
    "web_search_options",
];

pub(super) enum Mode {
    Plain,
    Schema(Value),
    Stream,
}

// --- API Request Types ---

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    web_search_options: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
    #[serde(flatten)]
    params: Map<String, Value>,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl<'a> ApiMessage<'a> {
    fn plain(role: &'a str, content: &'a str) -> Self {
        Self {
            role,
            content,
            name: None,
            tool_call_id: None,
            extra: Map::new(),
        }
    }

    fn from_message(msg: &'a Message) -> Self {
        let extra = msg
            .metadata
            .extra
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), "role" | "content" | "name" | "tool_call_id"))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Self {
            role: msg.role.as_str(),
            content: &msg.content,
            name: msg.metadata.name.as_deref(),
            tool_call_id: msg.metadata.tool_call_id.as_deref(),
            extra,
        }
    }
}

#[derive(Serialize)]
struct ApiTool<'a> {
    r#type: &'static str,
    function: ApiFunction<'a>,
}

#[derive(Serialize)]
struct ApiFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    strict: Option<bool>,
}

// --- Construction ---

pub(super) fn build(
    model: &str,
    quirks: &ModelQuirks,
    defaults: &Options,
    conversation: Conversation<'_>,
    options: &Options,
    tools: &[Tool],
    mode: Mode,
) -> Result<Vec<u8>> {
    let merged = options.merged_over(defaults);
    let strict = merged.strict().then_some(true);

    let mut messages = Vec::new();
    if let Some(system_prompt) = merged.system_prompt() {
        messages.push(ApiMessage::plain(quirks.instruction_role(), system_prompt));
    }
    match conversation {
        Conversation::Prompt(prompt) => messages.push(ApiMessage::plain("user", prompt)),
        Conversation::Messages(history) => {
            messages.extend(history.iter().map(ApiMessage::from_message))
        }
    }

    let (functions, searches) = split_tools(tools);
    let api_tools: Vec<ApiTool> = functions
        .iter()
        .map(|f| ApiTool {
            r#type: "function",
            function: ApiFunction {
                name: &f.name,
                description: &f.description,
                parameters: &f.parameters,
                strict,
            },
        })
        .collect();

    let tool_choice = match &merged.tool_choice {
        Some(choice) if !api_tools.is_empty() && quirks.supports_tool_choice() => {
            Some(tool_choice_value(choice))
        }
        Some(_) => {
            debug!(model, "omitting tool_choice");
            None
        }
        None => None,
    };

    let web_search_options = match searches.first() {
        Some(search) if quirks.search_model => Some(web_search_options(search)),
        Some(_) => {
            debug!(model, "web search tool dropped: model does not search");
            None
        }
        None => None,
    };

    let mut params = merged.to_params();
    quirks.apply(&mut params);
    for key in RESERVED_KEYS {
        if params.remove(*key).is_some() {
            debug!(key, "ignoring option that collides with a request field");
        }
    }

    let (response_format, stream) = match mode {
        Mode::Plain => (None, None),
        Mode::Schema(schema) => (Some(response_format(&schema)), None),
        Mode::Stream => (None, Some(true)),
    };

    let request = ApiRequest {
        model,
        messages,
        tools: api_tools,
        tool_choice,
        response_format,
        web_search_options,
        stream,
        params,
    };

    serde_json::to_vec(&request).map_err(|source| Error::Encoding {
        provider: PROVIDER_NAME,
        source,
    })
}

fn split_tools(tools: &[Tool]) -> (Vec<&FunctionTool>, Vec<&WebSearchTool>) {
    let mut functions = Vec::new();
    let mut searches = Vec::new();
    for tool in tools {
        match tool {
            Tool::Function(f) => functions.push(f),
            Tool::WebSearch(w) => searches.push(w),
        }
    }
    (functions, searches)
}

fn tool_choice_value(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::None => json!("none"),
        ToolChoice::Required => json!("required"),
        ToolChoice::Function(name) => json!({"type": "function", "function": {"name": name}}),
    }
}

fn web_search_options(search: &WebSearchTool) -> Value {
    let mut options = Map::new();
    if let Some(location) = &search.user_location {
        options.insert(
            "user_location".to_string(),
            json!({"type": "approximate", "approximate": location}),
        );
    }
    Value::Object(options)
}

fn response_format(schema: &Value) -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "structured_response",
            "schema": schema::sanitize(schema),
            "strict": true,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ReasoningEffort;
    use crate::types::{CacheControl, MessageMetadata, UserLocation};

    fn build_value(
        model: &str,
        conversation: Conversation<'_>,
        options: &Options,
        tools: &[Tool],
        mode: Mode,
    ) -> Value {
        let quirks = ModelQuirks::resolve(model);
        let bytes = build(model, &quirks, &Options::default(), conversation, options, tools, mode)
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn weather_tool() -> Tool {
        Tool::function(
            "get_weather",
            "Current weather for a city",
            json!({"type": "object", "properties": {"city": {"type": "string"}}}),
        )
    }

    #[test]
    fn prompt_becomes_single_user_message() {
        let body = build_value("gpt-4o", "Hello".into(), &Options::new(), &[], Mode::Plain);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"], json!([{"role": "user", "content": "Hello"}]));
        assert!(body.get("tools").is_none());
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn system_prompt_role_follows_model_family() {
        let options = Options::new().with_system_prompt("Be terse.");
        let body = build_value("gpt-4o", "Hi".into(), &options, &[], Mode::Plain);
        assert_eq!(body["messages"][0]["role"], "system");

        let body = build_value("o3-mini", "Hi".into(), &options, &[], Mode::Plain);
        assert_eq!(body["messages"][0]["role"], "developer");
        assert_eq!(body["messages"][1]["role"], "user");
    }

    #[test]
    fn messages_keep_order_role_and_metadata() {
        let history = vec![
            Message::system("rules"),
            Message::user("q1").with_cache_control(CacheControl::Ephemeral),
            Message::assistant("a1"),
            Message::user("q2").with_metadata(MessageMetadata {
                name: Some("bob".into()),
                extra: [
                    ("role".to_string(), json!("assistant")),
                    ("content".to_string(), json!("hijack")),
                    ("custom".to_string(), json!(1)),
                ]
                .into_iter()
                .collect(),
                ..Default::default()
            }),
        ];
        let options = Options::new().with_system_prompt("prefix");
        let body = build_value("gpt-4o", (&history).into(), &options, &[], Mode::Plain);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), history.len() + 1);
        let roles: Vec<&str> = messages.iter().map(|m| m["role"].as_str().unwrap()).collect();
        assert_eq!(roles, ["system", "system", "user", "assistant", "user"]);
        assert_eq!(messages[4]["content"], "q2");
        assert_eq!(messages[4]["role"], "user");
        assert_eq!(messages[4]["name"], "bob");
        assert_eq!(messages[4]["custom"], 1);
        assert!(messages[2].get("cache_control").is_none());
    }

    #[test]
    fn web_search_only_tools_yield_no_tools_or_choice() {
        let options = Options::new().with_tool_choice(ToolChoice::Auto);
        let body = build_value(
            "gpt-4o",
            "search".into(),
            &options,
            &[Tool::web_search()],
            Mode::Plain,
        );
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
        assert!(body.get("web_search_options").is_none());
    }

    #[test]
    fn search_models_get_web_search_options() {
        let tool = Tool::WebSearch(WebSearchTool {
            user_location: Some(UserLocation {
                city: Some("Paris".into()),
                country: Some("FR".into()),
                ..Default::default()
            }),
            ..Default::default()
        });
        let body = build_value(
            "gpt-4o-search-preview",
            "news".into(),
            &Options::new(),
            &[tool, weather_tool()],
            Mode::Plain,
        );
        assert_eq!(
            body["web_search_options"],
            json!({"user_location": {"type": "approximate", "approximate": {"city": "Paris", "country": "FR"}}})
        );
        assert_eq!(body["tools"].as_array().unwrap().len(), 1);
        assert_eq!(body["tools"][0]["function"]["name"], "get_weather");
    }

    #[test]
    fn strict_tools_and_tool_choice() {
        let options = Options::new()
            .with_strict_tools(true)
            .with_tool_choice(ToolChoice::Function("get_weather".into()));
        let body = build_value("gpt-4o", "weather?".into(), &options, &[weather_tool()], Mode::Plain);
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["strict"], true);
        assert_eq!(
            body["tool_choice"],
            json!({"type": "function", "function": {"name": "get_weather"}})
        );
        assert!(body.get("strict_tools").is_none());
    }

    #[test]
    fn tool_choice_suppressed_for_reasoning_models() {
        let options = Options::new().with_tool_choice(ToolChoice::Required);
        let body = build_value("o1", "weather?".into(), &options, &[weather_tool()], Mode::Plain);
        assert!(body["tools"].is_array());
        assert!(body.get("tool_choice").is_none());
        assert!(body["tools"][0]["function"].get("strict").is_none());
    }

    #[test]
    fn renamed_token_limit_family() {
        let options = Options::new().with_max_tokens(100);
        let body = build_value("gpt-4o", "hi".into(), &options, &[], Mode::Plain);
        assert_eq!(body["max_completion_tokens"], 100);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn reasoning_models_drop_temperature_keep_effort() {
        let options = Options::new()
            .with_temperature(0.3)
            .with_reasoning_effort(ReasoningEffort::Low);
        let body = build_value("o4-mini", "hi".into(), &options, &[], Mode::Plain);
        assert!(body.get("temperature").is_none());
        assert_eq!(body["reasoning_effort"], "low");

        let body = build_value("gpt-4-turbo", "hi".into(), &options, &[], Mode::Plain);
        assert_eq!(body["temperature"], 0.3);
        assert!(body.get("reasoning_effort").is_none());
    }

    #[test]
    fn defaults_merge_under_call_options() {
        let quirks = ModelQuirks::resolve("gpt-4-turbo");
        let defaults = Options::new().with_temperature(0.9).with_extra("user", json!("svc"));
        let call = Options::new().with_temperature(0.1);
        let bytes = build(
            "gpt-4-turbo",
            &quirks,
            &defaults,
            "hi".into(),
            &call,
            &[],
            Mode::Plain,
        )
        .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["temperature"], 0.1);
        assert_eq!(body["user"], "svc");
    }

    #[test]
    fn extras_cannot_replace_model_or_messages() {
        let options = Options::new()
            .with_extra("model", json!("other"))
            .with_extra("messages", json!([]));
        let body = build_value("gpt-4o", "hi".into(), &options, &[], Mode::Plain);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn schema_mode_adds_sanitized_response_format() {
        let schema = json!({
            "type": "object",
            "title": "Answer",
            "properties": {"answer": {"type": "string", "minLength": 1}},
            "required": ["answer"]
        });
        let options = Options::new().with_system_prompt("Answer in JSON.");
        let body = build_value("gpt-4o", "2+2?".into(), &options, &[], Mode::Schema(schema));
        assert_eq!(
            body["response_format"],
            json!({
                "type": "json_schema",
                "json_schema": {
                    "name": "structured_response",
                    "schema": {
                        "type": "object",
                        "properties": {"answer": {"type": "string"}},
                        "required": ["answer"],
                        "additionalProperties": false
                    },
                    "strict": true
                }
            })
        );
        assert_eq!(body["messages"][0]["content"], "Answer in JSON.");
    }

    #[test]
    fn stream_mode_sets_flag_and_keeps_tools() {
        let options = Options::new()
            .with_system_prompt("sys")
            .with_extra("stream", json!(false));
        let body = build_value("gpt-4o", "hi".into(), &options, &[weather_tool()], Mode::Stream);
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(body["tools"].is_array());
    }
}
