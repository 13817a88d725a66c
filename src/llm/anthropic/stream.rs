//! Messages API stream event decoding.

use serde::Deserialize;

use super::response::ApiError;
use super::PROVIDER_NAME;
use crate::error::{Error, Result};
use crate::types::StreamDelta;

#[derive(Deserialize, Debug)]
struct StreamEvent {
    #[serde(rename = "type", default)]
    kind: String,
    delta: Option<EventDelta>,
    error: Option<ApiError>,
}

#[derive(Deserialize, Debug)]
struct EventDelta {
    #[serde(rename = "type", default)]
    kind: String,
    text: Option<String>,
}

/// Decode one `data:` payload.
///
/// Only text deltas produce output. `message_start`, `ping`, tool input
/// deltas and block boundaries are skipped.
pub(super) fn decode_chunk(chunk: &[u8]) -> Result<StreamDelta> {
    let trimmed = chunk.trim_ascii();
    if trimmed.is_empty() {
        return Err(Error::EmptyChunk {
            provider: PROVIDER_NAME,
        });
    }
    if trimmed == b"[DONE]" {
        return Ok(StreamDelta::EndOfStream);
    }

    let event: StreamEvent =
        serde_json::from_slice(trimmed).map_err(|source| Error::MalformedChunk {
            provider: PROVIDER_NAME,
            source,
        })?;

    match event.kind.as_str() {
        "content_block_delta" => match event.delta {
            Some(EventDelta { kind, text: Some(text) })
                if kind == "text_delta" && !text.is_empty() =>
            {
                Ok(StreamDelta::Text(text))
            }
            _ => Ok(StreamDelta::Skip),
        },
        "message_stop" => Ok(StreamDelta::EndOfStream),
        "error" => Err(match event.error {
            Some(error) => error.into_error(),
            None => Error::Api {
                provider: PROVIDER_NAME,
                message: "stream error".to_string(),
            },
        }),
        _ => Ok(StreamDelta::Skip),
    }
}
