//! HTTP transport.
//!
//! Providers only produce and consume bytes. A `Transport` moves those bytes
//! over the wire: one POST for a complete response, or one POST whose body
//! is read as server-sent events and forwarded payload by payload.

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::llm::PreparedRequest;

#[async_trait]
pub trait Transport: Send + Sync {
    /// POST the request and return the full response body.
    async fn send(&self, request: &PreparedRequest) -> Result<Vec<u8>>;

    /// POST the request and forward each SSE `data:` payload to `chunk_tx`.
    ///
    /// Returns once the body ends or the receiver is dropped.
    async fn send_stream(
        &self,
        request: &PreparedRequest,
        chunk_tx: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Result<()>;
}

/// `reqwest`-backed transport.
#[derive(Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn post(&self, request: &PreparedRequest) -> Result<reqwest::Response> {
        let mut builder = self.client.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        debug!(url = %request.url, bytes = request.body.len(), "sending request");
        let response = builder
            .body(request.body.clone())
            .send()
            .await
            .map_err(|source| Error::Network {
                url: request.url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(url = %request.url, status = status.as_u16(), "request failed");
            return Err(Error::Http {
                status: status.as_u16(),
                url: request.url.clone(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &PreparedRequest) -> Result<Vec<u8>> {
        let response = self.post(request).await?;
        let body = response.bytes().await.map_err(|source| Error::Network {
            url: request.url.clone(),
            source,
        })?;
        Ok(body.to_vec())
    }

    async fn send_stream(
        &self,
        request: &PreparedRequest,
        chunk_tx: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Result<()> {
        let response = self.post(request).await?;
        let mut byte_stream = response.bytes_stream();
        let mut buffer = SseBuffer::default();

        while let Some(chunk_result) = byte_stream.next().await {
            let chunk_bytes = chunk_result.map_err(|source| Error::Network {
                url: request.url.clone(),
                source,
            })?;
            for payload in buffer.push(&chunk_bytes) {
                if chunk_tx.send(payload).is_err() {
                    debug!("stream receiver dropped, stopping");
                    return Ok(());
                }
            }
        }

        if let Some(payload) = buffer.finish() {
            let _ = chunk_tx.send(payload);
        }
        Ok(())
    }
}

/// Splits an SSE byte stream into `data:` payloads.
///
/// Bytes are buffered until a full line arrives, so payloads split across
/// network reads (or in the middle of a UTF-8 sequence) come out whole.
/// Comment lines, `event:` lines and blank separators are dropped.
#[derive(Debug, Default)]
pub struct SseBuffer {
    buffer: Vec<u8>,
}

impl SseBuffer {
    /// Feed bytes, returning every payload completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            if let Some(payload) = data_payload(&line) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flush a final line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        let line = std::mem::take(&mut self.buffer);
        data_payload(&line)
    }
}

fn data_payload(line: &[u8]) -> Option<Vec<u8>> {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let data = line.strip_prefix(b"data:")?;
    let data = data.strip_prefix(b" ").unwrap_or(data);
    Some(data.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(payloads: Vec<Vec<u8>>) -> Vec<String> {
        payloads
            .into_iter()
            .map(|p| String::from_utf8(p).unwrap())
            .collect()
    }

    #[test]
    fn splits_complete_lines() {
        let mut buffer = SseBuffer::default();
        let payloads = buffer.push(b"data: {\"a\":1}\n\ndata: [DONE]\n\n");
        assert_eq!(text(payloads), vec!["{\"a\":1}", "[DONE]"]);
    }

    #[test]
    fn joins_lines_split_across_reads() {
        let mut buffer = SseBuffer::default();
        assert!(buffer.push(b"data: {\"content\":").is_empty());
        let payloads = buffer.push(b"\"hi\"}\r\n");
        assert_eq!(text(payloads), vec!["{\"content\":\"hi\"}"]);
    }

    #[test]
    fn keeps_utf8_split_mid_character() {
        let bytes = "data: caf\u{e9}\n".as_bytes();
        let (head, tail) = bytes.split_at(bytes.len() - 2);
        let mut buffer = SseBuffer::default();
        assert!(buffer.push(head).is_empty());
        assert_eq!(text(buffer.push(tail)), vec!["caf\u{e9}"]);
    }

    #[test]
    fn ignores_event_and_comment_lines() {
        let mut buffer = SseBuffer::default();
        let payloads = buffer.push(
            b"event: content_block_delta\n: keep-alive\ndata:{\"type\":\"ping\"}\n\n",
        );
        assert_eq!(text(payloads), vec!["{\"type\":\"ping\"}"]);
    }

    #[test]
    fn blank_data_lines_are_forwarded() {
        let mut buffer = SseBuffer::default();
        assert_eq!(text(buffer.push(b"data: \n")), vec![""]);
    }

    #[test]
    fn finish_flushes_unterminated_line() {
        let mut buffer = SseBuffer::default();
        assert!(buffer.push(b"data: [DONE]").is_empty());
        assert_eq!(buffer.finish(), Some(b"[DONE]".to_vec()));
        assert_eq!(buffer.finish(), None);
    }
}
