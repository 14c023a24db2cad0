//! Fresh identifier allocation for emitted code.
//!
//! Counters are kept per prefix and reset at the start of every rule
//! emission, so identifier sequences are stable within a rule and carry no
//! dependency across rules. Editing one rule and re-emitting leaves every
//! other rule's generated text untouched, which keeps diffs small when the
//! generated parser is checked into version control.

use std::collections::BTreeMap;

/// Allocator for fresh, prefix-disambiguated identifiers.
#[derive(Debug, Default)]
pub struct UidTable {
    counters: BTreeMap<String, u32>,
}

impl UidTable {
    /// Create an allocator with all counters at zero.
    pub fn new() -> Self {
        UidTable::default()
    }

    /// Return `prefix` followed by its counter value, post-incrementing
    /// the counter. Distinct prefixes count independently.
    pub fn next(&mut self, prefix: &str) -> String {
        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
        let name = format!("{}{}", prefix, counter);
        *counter += 1;
        name
    }

    /// Clear all counters.
    pub fn reset(&mut self) {
        self.counters.clear();
    }
}
