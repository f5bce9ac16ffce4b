//! Wire types shared between payload bodies and the engine.

use serde::{Deserialize, Serialize};

/// A (source key, line) marker. Uniquely identified by the pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Breakpoint {
    pub key: String,
    pub line: u32,
    pub enabled: bool,
}

impl Breakpoint {
    pub fn new(key: impl Into<String>, line: u32) -> Self {
        Self {
            key: key.into(),
            line,
            enabled: true,
        }
    }
}

/// One inspected interpreter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub type_name: String,
    pub value: String,
}

/// One frame of a backtrace, innermost first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacktraceFrame {
    pub key: String,
    pub title: String,
    pub name: String,
    pub line: u32,
    pub level: u32,
}

/// Source text as the probe knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceText {
    pub key: String,
    pub title: String,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Message,
    Warning,
    Error,
    Trace,
}
