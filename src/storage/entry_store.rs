//! In-memory entry table
//!
//! `EntryStore` holds every counterexample in insertion order and implements
//! the queries and maintenance passes the database runs over them. It does no
//! locking of its own: `CounterexampleDatabase` keeps it behind a single
//! mutex and every method here runs with that mutex held.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::storage::entry::{truncate_to_millis, CounterexampleEntry, EntryId};

/// Table of counterexample records
#[derive(Debug)]
pub struct EntryStore {
    entries: Vec<CounterexampleEntry>,
    next_id: EntryId,
    last_timestamp: Option<DateTime<Utc>>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
            last_timestamp: None,
        }
    }

    /// Current time in whole milliseconds, never earlier than any timestamp
    /// this store has handed out or accepted
    pub fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = truncate_to_millis(Utc::now());
        let timestamp = match self.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_timestamp = Some(timestamp);
        timestamp
    }

    /// Appends an entry and returns its id
    pub fn add_entry(&mut self, mut entry: CounterexampleEntry) -> EntryId {
        let id = self.next_id;
        self.next_id += 1;
        entry.id = id;

        if self.last_timestamp.map_or(true, |last| entry.timestamp > last) {
            self.last_timestamp = Some(entry.timestamp);
        }

        self.entries.push(entry);
        id
    }

    /// Appends a batch of entries, keeping their order
    pub fn extend(&mut self, entries: impl IntoIterator<Item = CounterexampleEntry>) -> usize {
        let mut added = 0;
        for entry in entries {
            self.add_entry(entry);
            added += 1;
        }
        added
    }

    pub fn entries(&self) -> &[CounterexampleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn query_by_test(&self, test_name: &str) -> Vec<CounterexampleEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.test_name == test_name)
            .cloned()
            .collect()
    }

    pub fn query_by_property(&self, property_name: &str) -> Vec<CounterexampleEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.property_name == property_name)
            .cloned()
            .collect()
    }

    /// Newest entry of a test; equal timestamps go to the later insertion
    pub fn latest_for_test(&self, test_name: &str) -> Option<CounterexampleEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.test_name == test_name)
            .max_by_key(|entry| entry.recency_key())
            .cloned()
    }

    /// Removes every entry older than `cutoff`
    pub fn remove_old_entries(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.timestamp >= cutoff);
        before - self.entries.len()
    }

    /// Sum of compressed sizes, the quantity the size ceiling applies to
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|entry| entry.compressed_size).sum()
    }

    pub fn remove_ids(&mut self, ids: &HashSet<EntryId>) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let before = self.entries.len();
        self.entries.retain(|entry| !ids.contains(&entry.id));
        before - self.entries.len()
    }

    pub fn remove_test(&mut self, test_name: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.test_name != test_name);
        before - self.entries.len()
    }

    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }

    /// Groups entries by test name and releases spare capacity
    ///
    /// The sort is stable, so entries of one test keep their insertion order.
    pub fn vacuum(&mut self) {
        self.entries.sort_by(|a, b| a.test_name.cmp(&b.test_name));
        self.entries.shrink_to_fit();
    }

    /// Per-test cap first, then the global size cap
    pub fn enforce_limits(&mut self, max_per_test: usize, max_bytes: u64) -> usize {
        let per_test = self.enforce_entries_per_test(max_per_test);
        per_test + self.enforce_total_size(max_bytes)
    }

    /// Keeps at most `max_per_test` newest entries for every test
    pub fn enforce_entries_per_test(&mut self, max_per_test: usize) -> usize {
        let mut by_test: HashMap<&str, Vec<(DateTime<Utc>, EntryId)>> = HashMap::new();
        for entry in &self.entries {
            by_test
                .entry(entry.test_name.as_str())
                .or_default()
                .push(entry.recency_key());
        }

        let mut doomed = HashSet::new();
        for keys in by_test.values_mut() {
            if keys.len() <= max_per_test {
                continue;
            }
            // Newest first
            keys.sort_unstable_by(|a, b| b.cmp(a));
            doomed.extend(keys[max_per_test..].iter().map(|(_, id)| *id));
        }

        self.remove_ids(&doomed)
    }

    /// Drops globally oldest entries until the total size fits `max_bytes`
    pub fn enforce_total_size(&mut self, max_bytes: u64) -> usize {
        let mut total = self.total_size();
        if total <= max_bytes {
            return 0;
        }

        let mut candidates: Vec<(DateTime<Utc>, EntryId, u64)> = self
            .entries
            .iter()
            .map(|entry| (entry.timestamp, entry.id, entry.compressed_size))
            .collect();
        // Oldest first
        candidates.sort_unstable();

        let mut doomed = HashSet::new();
        for (_, id, size) in candidates {
            if total <= max_bytes {
                break;
            }
            doomed.insert(id);
            total -= size;
        }

        self.remove_ids(&doomed)
    }
}

impl Default for EntryStore {
    fn default() -> Self {
        Self::new()
    }
}
