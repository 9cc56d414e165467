//! Accumulates cleaned device output and finds prompts near its end.
//!
//! A running-config can run to hundreds of kilobytes while the prompt that
//! terminates it is a few dozen bytes, so matching is confined to a window
//! at the tail.

use std::fmt;

use regex::bytes::Regex;
use vte::{Parser, Perform};

/// Output collected since the last prompt.
///
/// Bytes pass through a terminal parser first: colour codes, cursor movement
/// and carriage returns are dropped, line feeds and tabs are kept.
pub struct PatternBuffer {
    text: Vec<u8>,
    window: usize,
    // Escape sequences may straddle reads.
    terminal: Parser,
}

struct TextSink<'a> {
    out: &'a mut Vec<u8>,
}

impl Perform for TextSink<'_> {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\t') {
            self.out.push(byte);
        }
    }
}

impl PatternBuffer {
    /// `window` is how many trailing bytes prompt patterns are matched against.
    pub fn new(window: usize) -> Self {
        Self {
            text: Vec::with_capacity(8 * 1024),
            window,
            terminal: Parser::new(),
        }
    }

    pub fn extend(&mut self, raw: &[u8]) {
        let mut sink = TextSink { out: &mut self.text };
        self.terminal.advance(&mut sink, raw);
    }

    /// Absolute `(start, end)` of the first match inside the tail window.
    pub fn search_tail(&self, pattern: &Regex) -> Option<(usize, usize)> {
        let offset = self.text.len().saturating_sub(self.window);
        let found = pattern.find(&self.text[offset..])?;
        Some((offset + found.start(), offset + found.end()))
    }

    /// Split off `..end`; bytes after it stay for the next read.
    pub fn drain_through(&mut self, end: usize) -> Vec<u8> {
        let end = end.min(self.text.len());
        let rest = self.text.split_off(end);
        std::mem::replace(&mut self.text, rest)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }
}

impl fmt::Debug for PatternBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternBuffer")
            .field("buffered", &self.text.len())
            .field("window", &self.window)
            .finish()
    }
}
