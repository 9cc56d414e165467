//! Prompt-driven reads over a transport.

use std::time::Duration;

use log::trace;
use regex::bytes::Regex;
use tokio::time::Instant;

use super::buffer::PatternBuffer;
use crate::error::{Result, SessionError};
use crate::transport::Transport;

/// Result of a successful `read_until`.
#[derive(Debug, Clone)]
pub struct PromptMatch {
    /// Index into the pattern slice of the pattern that matched.
    pub index: usize,

    /// Output preceding the match.
    pub output: String,

    /// The matched text itself (usually the prompt).
    pub matched: String,
}

/// A transport plus the buffer its output accumulates in.
pub struct PromptChannel {
    transport: Transport,
    buffer: PatternBuffer,
    line_ending: &'static str,
}

impl PromptChannel {
    pub fn new(transport: Transport, search_depth: usize, line_ending: &'static str) -> Self {
        Self {
            transport,
            buffer: PatternBuffer::new(search_depth),
            line_ending,
        }
    }

    /// Write raw bytes without a line ending.
    pub async fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        self.transport.write(data).await
    }

    /// Write one line of input.
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        let mut data = Vec::with_capacity(line.len() + self.line_ending.len());
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(self.line_ending.as_bytes());
        self.transport.write(&data).await
    }

    /// Read until one of `patterns` matches the buffer tail.
    ///
    /// Patterns are tried in order, so earlier patterns win when several
    /// match the same output. Returns `Ok(None)` when `timeout` elapses
    /// first and `SessionError::Closed` when the peer hangs up.
    pub async fn read_until(
        &mut self,
        patterns: &[&Regex],
        timeout: Duration,
    ) -> Result<Option<PromptMatch>> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(found) = self.take_match(patterns) {
                return Ok(Some(found));
            }

            match tokio::time::timeout_at(deadline, self.transport.read_chunk()).await {
                Err(_) => return Ok(None),
                Ok(Ok(Some(chunk))) => {
                    trace!("read {} bytes", chunk.len());
                    self.buffer.extend(&chunk);
                }
                Ok(Ok(None)) => return Err(SessionError::Closed.into()),
                Ok(Err(e)) => return Err(e),
            }
        }
    }

    /// Drop whatever output is buffered.
    pub fn discard(&mut self) {
        self.buffer.clear();
    }

    pub fn buffered(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    fn take_match(&mut self, patterns: &[&Regex]) -> Option<PromptMatch> {
        for (index, pattern) in patterns.iter().enumerate() {
            if let Some((start, end)) = self.buffer.search_tail(pattern) {
                let data = self.buffer.drain_through(end);
                return Some(PromptMatch {
                    index,
                    output: String::from_utf8_lossy(&data[..start]).into_owned(),
                    matched: String::from_utf8_lossy(&data[start..]).into_owned(),
                });
            }
        }
        None
    }

    /// Close the underlying transport.
    pub async fn close(self) -> Result<()> {
        self.transport.close().await
    }
}
