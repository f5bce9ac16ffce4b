//! Breakpoint table.
//!
//! Keyed by `(source key, line)` in a `BTreeMap` so the table doubles as an
//! ordered index: the controller's "next breakpoint" navigation walks it in
//! source order without a separate sort.

use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};

use codec::Breakpoint;

#[derive(Debug, Default)]
pub struct BreakpointTable {
    entries: BTreeMap<(String, u32), Breakpoint>,
}

impl BreakpointTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. A breakpoint is identified by its position, so
    /// setting the same position twice updates in place.
    pub fn set(&mut self, breakpoint: Breakpoint) {
        self.entries
            .insert((breakpoint.key.clone(), breakpoint.line), breakpoint);
    }

    pub fn remove(&mut self, key: &str, line: u32) -> Option<Breakpoint> {
        self.entries.remove(&(key.to_string(), line))
    }

    /// The breakpoint at exactly this position, if any.
    pub fn find(&self, key: &str, line: u32) -> Option<&Breakpoint> {
        self.entries.get(&(key.to_string(), line))
    }

    /// The first breakpoint strictly after this position, in
    /// `(key, line)` order across all sources.
    pub fn next_after(&self, key: &str, line: u32) -> Option<&Breakpoint> {
        self.entries
            .range((Excluded((key.to_string(), line)), Unbounded))
            .map(|(_, bp)| bp)
            .next()
    }

    pub fn all(&self) -> Vec<Breakpoint> {
        self.entries.values().cloned().collect()
    }

    /// Replace the whole table, e.g. when the controller pushes its list.
    pub fn replace_all(&mut self, breakpoints: Vec<Breakpoint>) {
        self.entries.clear();
        for bp in breakpoints {
            self.set(bp);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_find_remove_roundtrip() {
        let mut table = BreakpointTable::new();
        table.set(Breakpoint::new("@main.lua", 10));
        assert!(table.find("@main.lua", 10).is_some());
        assert!(table.find("@main.lua", 11).is_none());

        assert!(table.remove("@main.lua", 10).is_some());
        assert!(table.find("@main.lua", 10).is_none());
        assert!(table.remove("@main.lua", 10).is_none());
    }

    #[test]
    fn setting_same_position_replaces() {
        let mut table = BreakpointTable::new();
        table.set(Breakpoint::new("@main.lua", 10));
        let mut disabled = Breakpoint::new("@main.lua", 10);
        disabled.enabled = false;
        table.set(disabled);

        assert_eq!(table.all().len(), 1);
        assert!(!table.find("@main.lua", 10).unwrap().enabled);
    }

    #[test]
    fn next_after_walks_in_source_order() {
        let mut table = BreakpointTable::new();
        table.set(Breakpoint::new("@b.lua", 5));
        table.set(Breakpoint::new("@a.lua", 20));
        table.set(Breakpoint::new("@a.lua", 3));

        let next = table.next_after("@a.lua", 3).unwrap();
        assert_eq!((next.key.as_str(), next.line), ("@a.lua", 20));

        let next = table.next_after("@a.lua", 20).unwrap();
        assert_eq!((next.key.as_str(), next.line), ("@b.lua", 5));

        assert!(table.next_after("@b.lua", 5).is_none());
    }

    #[test]
    fn replace_all_discards_previous_entries() {
        let mut table = BreakpointTable::new();
        table.set(Breakpoint::new("@old.lua", 1));
        table.replace_all(vec![Breakpoint::new("@new.lua", 2)]);

        assert!(table.find("@old.lua", 1).is_none());
        assert!(table.find("@new.lua", 2).is_some());
    }
}
