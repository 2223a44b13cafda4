//! Streaming generation types and NDJSON stream parsing.
//!
//! Ollama's chat endpoint streams newline-delimited JSON objects. Byte
//! chunks from the transport align with neither line boundaries nor UTF-8
//! character boundaries, so bytes are buffered and only complete lines are
//! decoded.

use std::collections::VecDeque;
use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::Deserialize;

use noterra_core::{ChatMessage, Error, Result};

/// Stream of generated text fragments.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Backend capable of streaming a conversational reply.
#[async_trait]
pub trait ChatStreaming: Send + Sync {
    /// Stream a reply for the given system prompt and ordered message
    /// history (ending with the newest user message).
    async fn chat_stream(&self, system: &str, messages: &[ChatMessage]) -> Result<TokenStream>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// One parsed NDJSON line from the chat stream.
#[derive(Debug, PartialEq, Eq)]
pub struct StreamFragment {
    pub content: String,
    pub done: bool,
}

#[derive(Deserialize)]
struct ChatLine {
    #[serde(default)]
    message: Option<ChatLineMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ChatLineMessage {
    #[serde(default)]
    content: String,
}

/// Parse a single NDJSON line from the chat endpoint.
///
/// Returns `None` for blank lines; in-band `error` fields and unparseable
/// lines surface as `Error::Generation`.
pub fn parse_chat_line(line: &str) -> Option<Result<StreamFragment>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str::<ChatLine>(line) {
        Ok(parsed) => {
            if let Some(err) = parsed.error {
                return Some(Err(Error::Generation(err)));
            }
            Some(Ok(StreamFragment {
                content: parsed.message.map(|m| m.content).unwrap_or_default(),
                done: parsed.done,
            }))
        }
        Err(e) => Some(Err(Error::Generation(format!(
            "failed to parse stream line: {}",
            e
        )))),
    }
}

struct NdjsonState<S> {
    bytes: Pin<Box<S>>,
    buf: Vec<u8>,
    pending: VecDeque<Result<String>>,
    finished: bool,
}

impl<S> NdjsonState<S> {
    fn ingest_line(&mut self, line: &str) {
        match parse_chat_line(line) {
            Some(Ok(frag)) => {
                if !frag.content.is_empty() {
                    self.pending.push_back(Ok(frag.content));
                }
                if frag.done {
                    self.finished = true;
                }
            }
            Some(Err(e)) => {
                self.pending.push_back(Err(e));
                self.finished = true;
            }
            None => {}
        }
    }

    fn drain_lines(&mut self) {
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.buf.drain(..=pos).collect();
            // A complete line is decoded whole, so a multibyte character
            // split across transport chunks never hits the decoder torn.
            self.ingest_line(&String::from_utf8_lossy(&line_bytes));
            if self.finished {
                break;
            }
        }
    }
}

/// Adapt a raw byte stream of NDJSON chat lines into a [`TokenStream`].
pub fn ndjson_token_stream<S>(byte_stream: S) -> TokenStream
where
    S: Stream<Item = std::result::Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
{
    let state = NdjsonState {
        bytes: Box::pin(byte_stream),
        buf: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    Box::pin(futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((item, st));
            }
            if st.finished {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    st.buf.extend_from_slice(&chunk);
                    st.drain_lines();
                }
                Some(Err(e)) => {
                    st.finished = true;
                    st.pending
                        .push_back(Err(Error::Generation(format!("stream error: {}", e))));
                }
                None => {
                    st.finished = true;
                    // The final line may lack a trailing newline.
                    let trailing = std::mem::take(&mut st.buf);
                    st.ingest_line(&String::from_utf8_lossy(&trailing));
                }
            }
        }
    }))
}
