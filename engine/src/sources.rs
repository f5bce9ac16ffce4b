//! Source text bookkeeping.
//!
//! The probe remembers which source keys it has reported to the controller
//! and can serve the text back on request. How text gets in is the
//! embedder's business; the engine only needs get/add/save.

use std::collections::HashMap;

use codec::SourceText;

use crate::error::CommandError;

pub trait SourceStore: Send {
    fn get(&self, key: &str) -> Option<&SourceText>;

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Record a source key, keeping any text already stored for it.
    fn add(&mut self, key: &str, title: &str);

    /// Replace the stored text for `key`.
    fn save(&mut self, key: &str, lines: Vec<String>) -> Result<(), CommandError>;
}

/// The default store: everything in memory.
#[derive(Debug, Default)]
pub struct MemorySourceStore {
    sources: HashMap<String, SourceText>,
}

impl MemorySourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: SourceText) {
        self.sources.insert(source.key.clone(), source);
    }
}

impl SourceStore for MemorySourceStore {
    fn get(&self, key: &str) -> Option<&SourceText> {
        self.sources.get(key)
    }

    fn add(&mut self, key: &str, title: &str) {
        self.sources.entry(key.to_string()).or_insert_with(|| SourceText {
            key: key.to_string(),
            title: title.to_string(),
            lines: Vec::new(),
        });
    }

    fn save(&mut self, key: &str, lines: Vec<String>) -> Result<(), CommandError> {
        match self.sources.get_mut(key) {
            Some(source) => {
                source.lines = lines;
                Ok(())
            }
            None => Err(CommandError::UnknownSource {
                key: key.to_string(),
            }),
        }
    }
}
