//! Newline-delimited JSON decoding of chunked response bodies.

use std::pin::Pin;

use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use serde::de::DeserializeOwned;

use crate::error::{DirectoryError, DirectoryResult};

struct LineState<S> {
    inner: Pin<Box<S>>,
    buffer: Vec<u8>,
    finished: bool,
}

/// Decode a stream of byte chunks into one value per non-blank line.
///
/// A chunk error or an undecodable line is yielded once and ends the stream.
pub fn decode_lines<T, S, B, E>(chunks: S) -> BoxStream<'static, DirectoryResult<T>>
where
    T: DeserializeOwned + Send + 'static,
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Into<DirectoryError> + Send,
{
    let state = LineState {
        inner: Box::pin(chunks),
        buffer: Vec::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(pos) = state.buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = state.buffer.drain(..=pos).collect();
                let line = line[..line.len() - 1].trim_ascii();
                if line.is_empty() {
                    continue;
                }
                let item = decode_line(line);
                if item.is_err() {
                    state.fail();
                }
                return Some((item, state));
            }

            if state.finished {
                let rest = std::mem::take(&mut state.buffer);
                let rest = rest.trim_ascii();
                if rest.is_empty() {
                    return None;
                }
                return Some((decode_line(rest), state));
            }

            match state.inner.next().await {
                Some(Ok(chunk)) => state.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(err)) => {
                    state.fail();
                    return Some((Err(err.into()), state));
                }
                None => state.finished = true,
            }
        }
    })
    .boxed()
}

impl<S> LineState<S> {
    fn fail(&mut self) {
        self.finished = true;
        self.buffer.clear();
    }
}

fn decode_line<T: DeserializeOwned>(line: &[u8]) -> DirectoryResult<T> {
    serde_json::from_slice(line)
        .map_err(|err| DirectoryError::Stream(format!("undecodable export line: {}", err)))
}
