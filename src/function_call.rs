//! Text rendering of tool calls.
//!
//! When a model answers with tool calls instead of text, the parsers render
//! each call as `name(arguments)`, one per line, so every response has a
//! single textual form. Arguments are kept as the raw JSON the provider sent.
//! [`extract_function_calls`] recovers the structured calls.

use serde_json::value::RawValue;
use serde_json::Value;

/// A tool call recovered from normalized text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub name: String,
    /// Raw JSON argument text.
    pub arguments: String,
}

impl FunctionCall {
    /// Parse the arguments as JSON.
    pub fn arguments_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.arguments)
    }
}

pub fn format_function_call(name: &str, arguments: &str) -> String {
    format!("{name}({arguments})")
}

/// Argument text for a wire value, without re-serializing it.
///
/// OpenAI sends arguments as a JSON string holding JSON; that inner text is
/// used verbatim. Anything else (an object, or a string that is not JSON) is
/// kept exactly as it appeared on the wire.
pub fn raw_arguments(raw: &RawValue) -> String {
    let text = raw.get();
    if let Ok(Value::String(inner)) = serde_json::from_str::<Value>(text) {
        if serde_json::from_str::<&RawValue>(&inner).is_ok() {
            return inner.trim().to_string();
        }
    }
    text.to_string()
}

/// Inverse of the newline-joined `name(arguments)` rendering.
///
/// Lines that do not look like a call are skipped.
pub fn extract_function_calls(text: &str) -> Vec<FunctionCall> {
    text.lines().filter_map(parse_call_line).collect()
}

fn parse_call_line(line: &str) -> Option<FunctionCall> {
    let line = line.trim();
    let inner = line.strip_suffix(')')?;
    let open = inner.find('(')?;
    let name = &inner[..open];
    if name.is_empty() || !name.chars().all(is_name_char) {
        return None;
    }
    Some(FunctionCall {
        name: name.to_string(),
        arguments: inner[open + 1..].to_string(),
    })
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}
