use futures_util::{Stream, StreamExt};
use memchr::memchr;
use tracing::{debug, warn};

use crate::api::ChatResponse;
use crate::core::error::StoreError;

const DATA_PREFIX: &str = "data: ";
const DONE_PAYLOAD: &str = "[DONE]";

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix(DATA_PREFIX).map(str::trim)
}

/// Incremental decoder for a `data: {...}` event stream.
///
/// Bytes may arrive split anywhere, including mid-line and mid-codepoint;
/// only complete lines are interpreted. Every non-empty
/// `choices[0].delta.content` fragment is appended to the running text and
/// reported to the caller as `(delta, text_so_far)`.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    buffer: Vec<u8>,
    text: String,
    saw_done: bool,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the `data: [DONE]` marker has been seen. Decoding carries on
    /// after it regardless, until the source ends.
    pub fn saw_done(&self) -> bool {
        self.saw_done
    }

    pub fn feed<F>(&mut self, bytes: &[u8], on_delta: &mut F)
    where
        F: FnMut(&str, &str),
    {
        self.buffer.extend_from_slice(bytes);
        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            self.process_line(&line[..newline_pos], on_delta);
        }
    }

    /// Flush a trailing unterminated line and return the assembled text.
    pub fn finish<F>(mut self, on_delta: &mut F) -> String
    where
        F: FnMut(&str, &str),
    {
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.process_line(&line, on_delta);
        }
        self.text
    }

    fn process_line<F>(&mut self, raw: &[u8], on_delta: &mut F)
    where
        F: FnMut(&str, &str),
    {
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line.trim(),
            Err(err) => {
                warn!(error = %err, "skipping stream line with invalid UTF-8");
                return;
            }
        };

        let Some(payload) = extract_data_payload(line) else {
            return;
        };

        if payload == DONE_PAYLOAD {
            self.saw_done = true;
            return;
        }

        match serde_json::from_str::<ChatResponse>(payload) {
            Ok(response) => {
                if let Some(delta) = response.first_delta().filter(|delta| !delta.is_empty()) {
                    self.text.push_str(delta);
                    on_delta(delta, &self.text);
                }
            }
            Err(err) => {
                warn!(error = %err, chunk = payload, "error parsing stream chunk");
            }
        }
    }
}

/// Drain a byte stream through a [`StreamDecoder`] and return the full text
/// once the source is exhausted. A read error from the source ends decoding
/// and is returned.
pub async fn decode_stream<S, B, E, F>(stream: S, mut on_delta: F) -> Result<String, StoreError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<StoreError>,
    F: FnMut(&str, &str),
{
    let mut stream = std::pin::pin!(stream);
    let mut decoder = StreamDecoder::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(Into::into)?;
        decoder.feed(chunk.as_ref(), &mut on_delta);
    }

    if !decoder.saw_done() {
        debug!("stream ended without a [DONE] marker");
    }
    Ok(decoder.finish(&mut on_delta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    const CHUNK_A: &str = r#"data: {"choices":[{"delta":{"content":"A"}}]}"#;
    const CHUNK_B: &str = r#"data: {"choices":[{"delta":{"content":"B"}}]}"#;

    fn collect(lines: &[&str]) -> (String, Vec<(String, String)>) {
        let mut calls = Vec::new();
        let mut decoder = StreamDecoder::new();
        let mut on_delta = |delta: &str, total: &str| calls.push((delta.to_string(), total.to_string()));
        for line in lines {
            decoder.feed(format!("{line}\n").as_bytes(), &mut on_delta);
        }
        let text = decoder.finish(&mut on_delta);
        (text, calls)
    }

    #[test]
    fn assembles_deltas_and_reports_progress() {
        let (text, calls) = collect(&[CHUNK_A, CHUNK_B, "data: [DONE]"]);

        assert_eq!(text, "AB");
        assert_eq!(
            calls,
            vec![
                ("A".to_string(), "A".to_string()),
                ("B".to_string(), "AB".to_string()),
            ]
        );
    }

    #[test]
    fn malformed_line_does_not_stop_decoding() {
        let (text, calls) = collect(&[CHUNK_A, "data: {\"choices\": [", CHUNK_B]);

        assert_eq!(text, "AB");
        assert_eq!(calls.len(), 2);
    }

    #[test]
    fn ignores_non_data_lines_and_empty_deltas() {
        let (text, calls) = collect(&[
            ": OPENROUTER PROCESSING",
            "event: message",
            "",
            "data:{\"choices\":[{\"delta\":{\"content\":\"no-space\"}}]}",
            r#"data: {"choices":[{"delta":{"role":"assistant","content":""}}]}"#,
            r#"data: {"choices":[]}"#,
            CHUNK_A,
        ]);

        assert_eq!(text, "A");
        assert_eq!(calls.len(), 1);
    }

    #[test]
    fn keeps_decoding_after_done_marker() {
        let mut decoder = StreamDecoder::new();
        let mut on_delta = |_: &str, _: &str| {};
        decoder.feed(format!("{CHUNK_A}\ndata: [DONE]\n").as_bytes(), &mut on_delta);
        assert!(decoder.saw_done());

        decoder.feed(format!("{CHUNK_B}\n").as_bytes(), &mut on_delta);
        assert_eq!(decoder.finish(&mut on_delta), "AB");
    }

    #[test]
    fn reassembles_lines_split_across_chunks() {
        let body = format!("{CHUNK_A}\r\n{CHUNK_B}\r\n");
        let bytes = body.as_bytes();
        let mut decoder = StreamDecoder::new();
        let mut deltas = Vec::new();
        let mut on_delta = |delta: &str, _: &str| deltas.push(delta.to_string());

        for piece in bytes.chunks(7) {
            decoder.feed(piece, &mut on_delta);
        }
        let text = decoder.finish(&mut on_delta);

        assert_eq!(text, "AB");
        assert_eq!(deltas, vec!["A", "B"]);
    }

    #[test]
    fn multibyte_content_split_mid_codepoint() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"h\u{e9}llo \u{1f98a}\"}}]}\n";
        let bytes = line.as_bytes();
        let mut decoder = StreamDecoder::new();
        let mut on_delta = |_: &str, _: &str| {};

        for byte in bytes {
            decoder.feed(std::slice::from_ref(byte), &mut on_delta);
        }

        assert_eq!(decoder.finish(&mut on_delta), "h\u{e9}llo \u{1f98a}");
    }

    #[test]
    fn trailing_line_without_newline_is_processed() {
        let mut decoder = StreamDecoder::new();
        let mut on_delta = |_: &str, _: &str| {};
        decoder.feed(CHUNK_A.as_bytes(), &mut on_delta);

        assert_eq!(decoder.text(), "");
        assert_eq!(decoder.finish(&mut on_delta), "A");
    }

    #[tokio::test]
    async fn decode_stream_drains_source() {
        let chunks: Vec<Result<Vec<u8>, StoreError>> = vec![
            Ok(format!("{CHUNK_A}\n{}", &CHUNK_B[..10]).into_bytes()),
            Ok(format!("{}\ndata: [DONE]\n", &CHUNK_B[10..]).into_bytes()),
        ];
        let mut progress = Vec::new();

        let text = decode_stream(stream::iter(chunks), |delta, total| {
            progress.push(format!("{delta}:{total}"))
        })
        .await
        .expect("stream decodes");

        assert_eq!(text, "AB");
        assert_eq!(progress, vec!["A:A", "B:AB"]);
    }

    #[tokio::test]
    async fn decode_stream_propagates_source_errors() {
        let chunks: Vec<Result<Vec<u8>, StoreError>> = vec![
            Ok(format!("{CHUNK_A}\n").into_bytes()),
            Err(StoreError::invalid_response("connection reset")),
        ];

        let err = decode_stream(stream::iter(chunks), |_, _| {})
            .await
            .expect_err("source error ends decoding");
        assert!(matches!(err, StoreError::InvalidResponse(_)));
    }
}
