use crate::stream::{DeltaStream, StreamDelta};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

/// Maps one SSE `data:` payload to zero or more deltas.
pub(crate) trait SseTranslator: Send + 'static {
    fn translate(&mut self, data: &str) -> Vec<StreamDelta>;
}

/// Splits a byte stream into SSE `data:` payloads.
///
/// Bytes are buffered until a full line is present, so multi-byte characters
/// split across chunks decode intact.
#[derive(Debug, Default)]
pub(crate) struct SseLines {
    buffer: Vec<u8>,
}

impl SseLines {
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut payloads = Vec::new();

        while let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();

            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            if let Some(data) = line.strip_prefix("data:") {
                payloads.push(data.trim_start().to_string());
            }
        }

        payloads
    }
}

/// Spawns a task that reads `resp` as SSE and forwards translated deltas.
///
/// The task stops when the body ends, on a read error (forwarded as an
/// `Error` delta), or when the returned stream is dropped.
pub(crate) fn spawn_sse_reader<T: SseTranslator>(
    resp: reqwest::Response,
    mut translator: T,
) -> DeltaStream {
    let (tx, rx) = mpsc::channel::<StreamDelta>(256);

    tokio::spawn(async move {
        let mut stream = resp.bytes_stream();
        let mut lines = SseLines::default();

        while let Some(chunk_result) = stream.next().await {
            let chunk = match chunk_result {
                Ok(bytes) => bytes,
                Err(e) => {
                    let _ = tx
                        .send(StreamDelta::error(format!("Stream read error: {e}")))
                        .await;
                    return;
                }
            };

            for data in lines.feed(&chunk) {
                for delta in translator.translate(&data) {
                    if tx.send(delta).await.is_err() {
                        debug!("Delta receiver dropped, closing provider stream");
                        return;
                    }
                }
            }
        }
    });

    Box::pin(ReceiverStream::new(rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_split_across_chunks() {
        let mut lines = SseLines::default();
        assert!(lines.feed(b"data: {\"a\"").is_empty());
        assert_eq!(lines.feed(b":1}\n\ndata: [DONE]\n"), vec!["{\"a\":1}", "[DONE]"]);
    }

    #[test]
    fn test_comments_and_event_lines_skipped() {
        let mut lines = SseLines::default();
        let out = lines.feed(b": keep-alive\nevent: ping\r\ndata:{}\r\n");
        assert_eq!(out, vec!["{}"]);
    }

    #[test]
    fn test_multibyte_char_split_between_chunks() {
        let mut lines = SseLines::default();
        let bytes = "data: caf\u{e9}\n".as_bytes();
        let (head, tail) = bytes.split_at(bytes.len() - 2);
        assert!(lines.feed(head).is_empty());
        assert_eq!(lines.feed(tail), vec!["caf\u{e9}"]);
    }
}
