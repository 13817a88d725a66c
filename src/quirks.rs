//! Model-family quirks.
//!
//! OpenAI model generations disagree about which request parameters they
//! accept. The differences are keyed on the model identifier alone and kept
//! in one ordered table, so adding a family means adding rows rather than
//! another branch in the request builder.

use serde_json::{Map, Value};
use tracing::debug;

/// A parameter behaviour that differs between model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quirk {
    /// Token limit is sent as `max_completion_tokens` instead of `max_tokens`.
    MaxCompletionTokens,
    /// `reasoning_effort` is accepted.
    ReasoningEffort,
    /// `temperature` is rejected.
    NoTemperature,
    /// `tool_choice` is rejected.
    NoToolChoice,
    /// Instructions use the `developer` role instead of `system`.
    DeveloperRole,
    /// The model searches the web itself and takes `web_search_options`.
    SearchModel,
}

/// How a rule matches a model identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Prefix(&'static str),
    Contains(&'static str),
}

impl Pattern {
    pub fn matches(&self, model: &str) -> bool {
        match self {
            Pattern::Prefix(p) => model.starts_with(p),
            Pattern::Contains(p) => model.contains(p),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub pattern: Pattern,
    pub quirk: Quirk,
}

const fn rule(pattern: Pattern, quirk: Quirk) -> Rule {
    Rule { pattern, quirk }
}

use Pattern::{Contains, Prefix};
use Quirk::*;

/// Every known quirk, in evaluation order.
pub const RULES: &[Rule] = &[
    rule(Prefix("o"), MaxCompletionTokens),
    rule(Contains("4o"), MaxCompletionTokens),
    rule(Contains("-o"), MaxCompletionTokens),
    rule(Contains("-5"), MaxCompletionTokens),
    rule(Prefix("o"), ReasoningEffort),
    rule(Contains("-5"), ReasoningEffort),
    rule(Prefix("o1"), NoTemperature),
    rule(Prefix("o3"), NoTemperature),
    rule(Prefix("o4"), NoTemperature),
    rule(Contains("-5"), NoTemperature),
    rule(Prefix("o1"), NoToolChoice),
    rule(Prefix("o3"), NoToolChoice),
    rule(Prefix("o4"), NoToolChoice),
    rule(Contains("-5"), NoToolChoice),
    rule(Prefix("o1"), DeveloperRole),
    rule(Prefix("o3"), DeveloperRole),
    rule(Prefix("o4"), DeveloperRole),
    rule(Contains("-5"), DeveloperRole),
    rule(Contains("search"), SearchModel),
];

/// The quirks resolved for one model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelQuirks {
    pub max_completion_tokens: bool,
    pub reasoning_effort: bool,
    pub no_temperature: bool,
    pub no_tool_choice: bool,
    pub developer_role: bool,
    pub search_model: bool,
}

impl ModelQuirks {
    /// Resolve quirks for `model` from [`RULES`].
    pub fn resolve(model: &str) -> Self {
        Self::resolve_with(model, RULES)
    }

    pub fn resolve_with(model: &str, rules: &[Rule]) -> Self {
        let model = model.to_ascii_lowercase();
        let mut quirks = Self::default();
        for r in rules.iter().filter(|r| r.pattern.matches(&model)) {
            match r.quirk {
                MaxCompletionTokens => quirks.max_completion_tokens = true,
                ReasoningEffort => quirks.reasoning_effort = true,
                NoTemperature => quirks.no_temperature = true,
                NoToolChoice => quirks.no_tool_choice = true,
                DeveloperRole => quirks.developer_role = true,
                SearchModel => quirks.search_model = true,
            }
        }
        quirks
    }

    pub fn token_limit_key(&self) -> &'static str {
        if self.max_completion_tokens {
            "max_completion_tokens"
        } else {
            "max_tokens"
        }
    }

    pub fn instruction_role(&self) -> &'static str {
        if self.developer_role {
            "developer"
        } else {
            "system"
        }
    }

    pub fn supports_tool_choice(&self) -> bool {
        !self.no_tool_choice
    }

    /// Rewrite merged parameters for this model family.
    ///
    /// At most one token-limit key survives. When both were given, the one
    /// the family expects wins.
    pub fn apply(&self, params: &mut Map<String, Value>) {
        let (wanted, other) = if self.max_completion_tokens {
            ("max_completion_tokens", "max_tokens")
        } else {
            ("max_tokens", "max_completion_tokens")
        };
        let preferred = params.remove(wanted);
        let fallback = params.remove(other);
        if let Some(limit) = preferred.or(fallback) {
            params.insert(wanted.to_string(), limit);
        }

        if self.no_temperature && params.remove("temperature").is_some() {
            debug!("dropping temperature: not accepted by this model");
        }
        if !self.reasoning_effort && params.remove("reasoning_effort").is_some() {
            debug!("dropping reasoning_effort: not accepted by this model");
        }
    }
}
