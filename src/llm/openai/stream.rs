//! Chat Completions stream chunk decoding.

use serde::Deserialize;

use super::PROVIDER_NAME;
use crate::error::{Error, Result};
use crate::types::{null_as_default, StreamDelta};

const DONE_MARKER: &[u8] = b"[DONE]";

#[derive(Deserialize, Debug)]
struct StreamResponseChunk {
    #[serde(default, deserialize_with = "null_as_default")]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    #[serde(default)]
    delta: ChunkDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct ChunkDelta {
    content: Option<String>,
}

/// Decode one `data:` payload. Keeps no state between chunks.
pub(super) fn decode_chunk(chunk: &[u8]) -> Result<StreamDelta> {
    let trimmed = chunk.trim_ascii();
    if trimmed.is_empty() {
        return Err(Error::EmptyChunk {
            provider: PROVIDER_NAME,
        });
    }
    if trimmed == DONE_MARKER {
        return Ok(StreamDelta::EndOfStream);
    }

    let parsed: StreamResponseChunk =
        serde_json::from_slice(trimmed).map_err(|source| Error::MalformedChunk {
            provider: PROVIDER_NAME,
            source,
        })?;

    let choice = parsed.choices.into_iter().next().ok_or(Error::NoChoices {
        provider: PROVIDER_NAME,
    })?;

    if choice.finish_reason.is_some_and(|r| !r.is_empty()) {
        return Ok(StreamDelta::EndOfStream);
    }

    match choice.delta.content {
        Some(text) if !text.is_empty() => Ok(StreamDelta::Text(text)),
        _ => Ok(StreamDelta::Skip),
    }
}
