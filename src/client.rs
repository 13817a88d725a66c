//! Provider + transport, wired together.
//!
//! `Client` is the thin async layer over the pure provider functions: build
//! the request, hand it to the transport, normalize what comes back.

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::Result;
use crate::llm::Provider;
use crate::options::Options;
use crate::schema::SchemaSource;
use crate::transport::{HttpTransport, Transport};
use crate::types::{Conversation, ResponseDetails, StreamChunk, StreamDelta, Tool};

pub struct Client {
    provider: Box<dyn Provider>,
    transport: Box<dyn Transport>,
}

impl Client {
    pub fn new(provider: Box<dyn Provider>, transport: Box<dyn Transport>) -> Self {
        Self {
            provider,
            transport,
        }
    }

    /// A client that talks HTTP through `reqwest`.
    pub fn with_http(provider: Box<dyn Provider>) -> Self {
        Self::new(provider, Box::new(HttpTransport::new()))
    }

    pub fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    pub async fn generate(
        &self,
        conversation: Conversation<'_>,
        options: &Options,
        tools: &[Tool],
    ) -> Result<String> {
        let (text, _) = self.generate_with_usage(conversation, options, tools).await?;
        Ok(text)
    }

    pub async fn generate_with_usage(
        &self,
        conversation: Conversation<'_>,
        options: &Options,
        tools: &[Tool],
    ) -> Result<(String, ResponseDetails)> {
        let body = self.provider.build(conversation, options, tools)?;
        self.round_trip(body).await
    }

    pub async fn generate_with_schema(
        &self,
        conversation: Conversation<'_>,
        options: &Options,
        tools: &[Tool],
        schema: &SchemaSource,
    ) -> Result<(String, ResponseDetails)> {
        let body = self
            .provider
            .build_with_schema(conversation, options, tools, schema)?;
        self.round_trip(body).await
    }

    /// Stream a response, forwarding text to `chunk_tx` as it arrives.
    ///
    /// Returns the full text. `StreamChunk::Done` is sent only when the
    /// stream finishes without error.
    pub async fn stream(
        &self,
        conversation: Conversation<'_>,
        options: &Options,
        tools: &[Tool],
        chunk_tx: mpsc::UnboundedSender<StreamChunk>,
    ) -> Result<String> {
        let body = self.provider.build_stream(conversation, options, tools)?;
        let request = self.provider.prepare(body);
        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<Vec<u8>>();

        let pump = self.transport.send_stream(&request, raw_tx);
        let provider = self.provider.as_ref();
        let text_tx = &chunk_tx;
        let consume = async move {
            // Owned here so the receiver drops, and the transport stops
            // reading, as soon as decoding ends.
            let mut raw_rx = raw_rx;
            let mut content = String::new();
            while let Some(payload) = raw_rx.recv().await {
                match provider.decode_chunk(&payload) {
                    Ok(StreamDelta::Text(text)) => {
                        content.push_str(&text);
                        let _ = text_tx.send(StreamChunk::TextDelta(text));
                    }
                    Ok(StreamDelta::Skip) => {}
                    Ok(StreamDelta::EndOfStream) => return Ok((content, true)),
                    Err(e) if !e.is_stream_fatal() => {}
                    Err(e) => return Err(e),
                }
            }
            Ok((content, false))
        };

        let (pumped, consumed) = tokio::join!(pump, consume);
        let (content, finished) = consumed?;
        if let Err(e) = pumped {
            if !finished {
                return Err(e);
            }
            debug!(error = %e, "ignoring transport error after end of stream");
        }

        let _ = chunk_tx.send(StreamChunk::Done);
        info!(
            provider = self.provider.name(),
            bytes = content.len(),
            "stream finished"
        );
        Ok(content)
    }

    async fn round_trip(&self, body: Vec<u8>) -> Result<(String, ResponseDetails)> {
        let request = self.provider.prepare(body);
        let response = self.transport.send(&request).await?;
        let (text, details) = self.provider.parse(&response)?;
        debug!(
            provider = self.provider.name(),
            prompt_tokens = details.usage.prompt_tokens,
            completion_tokens = details.usage.completion_tokens,
            "response parsed"
        );
        Ok((text, details))
    }
}
