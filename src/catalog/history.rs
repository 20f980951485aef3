use serde::{Deserialize, Serialize};

use crate::domain::TitleId;

pub const DEFAULT_CAPACITY: usize = 20;

/// Recently watched titles, most recent first, without duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchHistory {
    entries: Vec<TitleId>,
    #[serde(skip, default = "default_capacity")]
    capacity: usize,
}

const fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl Default for WatchHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl WatchHistory {
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
        }
    }

    /// Builds a history from ids as a client sent them. Order is kept,
    /// duplicates after the first are dropped and the result is truncated.
    #[must_use]
    pub fn from_ids<I>(ids: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = TitleId>,
    {
        let mut entries: Vec<TitleId> = Vec::new();
        for id in ids {
            if entries.len() == capacity {
                break;
            }
            if !entries.contains(&id) {
                entries.push(id);
            }
        }
        Self { entries, capacity }
    }

    /// Moves `id` to the front, dropping the oldest entry past capacity.
    pub fn record(&mut self, id: TitleId) {
        self.entries.retain(|existing| existing != &id);
        self.entries.insert(0, id);
        self.entries.truncate(self.capacity);
    }

    #[must_use]
    pub fn contains(&self, id: &TitleId) -> bool {
        self.entries.contains(id)
    }

    #[must_use]
    pub fn entries(&self) -> &[TitleId] {
        &self.entries
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(history: &WatchHistory) -> Vec<&str> {
        history.entries().iter().map(TitleId::as_str).collect()
    }

    #[test]
    fn rewatching_moves_to_front() {
        let mut history = WatchHistory::from_ids(["A", "B", "C"].map(TitleId::from), 20);
        history.record(TitleId::from("B"));
        assert_eq!(ids(&history), ["B", "A", "C"]);
    }

    #[test]
    fn oldest_entry_falls_off() {
        let mut history = WatchHistory::from_ids((1..=20).map(|i| TitleId::new(format!("t{i}"))), 20);
        assert_eq!(history.len(), 20);

        history.record(TitleId::from("x"));
        assert_eq!(history.len(), 20);
        assert_eq!(history.entries()[0].as_str(), "x");
        assert!(!history.contains(&TitleId::from("t20")));
    }

    #[test]
    fn never_holds_duplicates() {
        let mut history = WatchHistory::new(5);
        for id in ["a", "b", "a", "c", "b", "a"] {
            history.record(TitleId::from(id));
        }
        assert_eq!(ids(&history), ["a", "b", "c"]);
    }

    #[test]
    fn client_supplied_ids_are_normalized() {
        let history = WatchHistory::from_ids(["a", "b", "a", "c"].map(TitleId::from), 2);
        assert_eq!(ids(&history), ["a", "b"]);
    }
}
