//! Channel layer for pattern matching over a transport.
//!
//! This module handles the interactive side of a session: accumulating
//! output, stripping terminal escapes, and waiting for prompts.

mod buffer;
pub mod patterns;
mod reader;

pub use buffer::PatternBuffer;
pub use reader::{PromptChannel, PromptMatch};
