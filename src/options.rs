//! Request options.
//!
//! Options come from two places: the defaults a provider was configured with
//! and the options passed to a single call. They are merged key by key, the
//! call winning, and then rendered to the flat parameter map that is copied
//! into the request body. Keys that the builders handle structurally never
//! reach that map.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::ToolChoice;

/// Keys that are never copied into the request body as plain parameters.
pub const EXCLUDED_KEYS: &[&str] = &[
    "tools",
    "tool_choice",
    "system_prompt",
    "strict_tools",
    "structured_messages",
    "stream",
];

/// Reasoning effort hint for models that accept one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Minimal,
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasoningEffort::Minimal => "minimal",
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
        }
    }
}

/// Options for a single request or a provider's defaults.
///
/// The named fields are the parameters this crate understands. Anything
/// else goes in `extra` and is forwarded as-is, except for the keys in
/// [`EXCLUDED_KEYS`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Options {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// Instruction prepended to the conversation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    /// Mark every function tool as strict.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict_tools: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_reasoning_effort(mut self, effort: ReasoningEffort) -> Self {
        self.reasoning_effort = Some(effort);
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = Some(tool_choice);
        self
    }

    pub fn with_strict_tools(mut self, strict: bool) -> Self {
        self.strict_tools = Some(strict);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Returns these options layered over `defaults`, key by key.
    pub fn merged_over(&self, defaults: &Options) -> Options {
        let mut extra = defaults.extra.clone();
        for (key, value) in &self.extra {
            extra.insert(key.clone(), value.clone());
        }

        Options {
            temperature: self.temperature.or(defaults.temperature),
            max_tokens: self.max_tokens.or(defaults.max_tokens),
            max_completion_tokens: self.max_completion_tokens.or(defaults.max_completion_tokens),
            top_p: self.top_p.or(defaults.top_p),
            frequency_penalty: self.frequency_penalty.or(defaults.frequency_penalty),
            presence_penalty: self.presence_penalty.or(defaults.presence_penalty),
            seed: self.seed.or(defaults.seed),
            reasoning_effort: self.reasoning_effort.or(defaults.reasoning_effort),
            stop: self.stop.clone().or_else(|| defaults.stop.clone()),
            system_prompt: self
                .system_prompt
                .clone()
                .or_else(|| defaults.system_prompt.clone()),
            tool_choice: self
                .tool_choice
                .clone()
                .or_else(|| defaults.tool_choice.clone()),
            strict_tools: self.strict_tools.or(defaults.strict_tools),
            extra,
        }
    }

    /// The instruction text, ignoring an empty string.
    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref().filter(|s| !s.is_empty())
    }

    pub fn strict(&self) -> bool {
        self.strict_tools.unwrap_or(false)
    }

    /// Flat parameter map copied into the request body.
    ///
    /// Extra fields go in first so a named field always wins over an extra
    /// with the same key.
    pub fn to_params(&self) -> Map<String, Value> {
        let mut params: Map<String, Value> = self
            .extra
            .iter()
            .filter(|(key, _)| !EXCLUDED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        if let Some(v) = self.temperature {
            params.insert("temperature".into(), Value::from(v));
        }
        if let Some(v) = self.max_tokens {
            params.insert("max_tokens".into(), Value::from(v));
        }
        if let Some(v) = self.max_completion_tokens {
            params.insert("max_completion_tokens".into(), Value::from(v));
        }
        if let Some(v) = self.top_p {
            params.insert("top_p".into(), Value::from(v));
        }
        if let Some(v) = self.frequency_penalty {
            params.insert("frequency_penalty".into(), Value::from(v));
        }
        if let Some(v) = self.presence_penalty {
            params.insert("presence_penalty".into(), Value::from(v));
        }
        if let Some(v) = self.seed {
            params.insert("seed".into(), Value::from(v));
        }
        if let Some(v) = self.reasoning_effort {
            params.insert("reasoning_effort".into(), Value::from(v.as_str()));
        }
        if let Some(stop) = &self.stop {
            params.insert(
                "stop".into(),
                Value::Array(stop.iter().cloned().map(Value::String).collect()),
            );
        }

        params
    }
}
