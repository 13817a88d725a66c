//! llmbridge: one request shape, many LLM provider APIs.
//!
//! A caller describes a generation request once (a conversation, options and
//! tools) and a [`Provider`] translates it into its API's wire format. The
//! provider then normalizes the API's response, or each streamed chunk, back
//! into plain text plus [`ResponseDetails`].
//!
//! Providers are pure translators. [`Client`] pairs one with a
//! [`Transport`] to make actual HTTP calls.

pub mod client;
pub mod config;
pub mod error;
pub mod function_call;
pub mod llm;
pub mod options;
pub mod quirks;
pub mod schema;
pub mod transport;
pub mod types;

pub use client::Client;
pub use config::Config;
pub use error::{Error, Result};
pub use function_call::{extract_function_calls, format_function_call, FunctionCall};
pub use llm::{create_provider, PreparedRequest, Provider, ProviderSettings};
pub use options::{Options, ReasoningEffort};
pub use schema::{sanitize, SchemaSource};
pub use transport::{HttpTransport, Transport};
pub use types::{
    Annotation, CacheControl, Conversation, FunctionTool, Message, MessageMetadata, ResponseDetails,
    ResponseMetadata, Role, Source, StreamChunk, StreamDelta, TokenUsage, Tool, ToolChoice,
    UrlCitation, UserLocation, WebSearchAction, WebSearchCall, WebSearchTool,
};
