//! Self-expiring kill notification log
//!
//! Holds at most the 5 newest entries, newest first. Expiry is per entry:
//! the store schedules an independent one-shot removal 5 seconds after each
//! push (see [`crate::game::SharedStore::apply_event`]), so a later kill
//! never extends an earlier entry's life. Removing an entry the cap already
//! evicted is a no-op.

use shared::{KillLogEntry, KILL_FEED_CAP};

#[derive(Debug, Default)]
pub struct KillFeed {
    entries: Vec<KillLogEntry>,
}

impl KillFeed {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Prepends an entry and evicts the oldest beyond the cap.
    pub fn push(&mut self, entry: KillLogEntry) {
        self.entries.insert(0, entry);
        self.entries.truncate(KILL_FEED_CAP);
    }

    /// Removes the entry with the given id, if it is still present.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    /// Current entries, newest first.
    pub fn entries(&self) -> &[KillLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: u64) -> KillLogEntry {
        KillLogEntry {
            id: format!("kill-{}", n),
            killer_name: "Raven".to_string(),
            victim_name: "Crow".to_string(),
            timestamp: n,
        }
    }

    #[test]
    fn test_newest_first() {
        let mut feed = KillFeed::new();
        feed.push(entry(1));
        feed.push(entry(2));

        assert_eq!(feed.entries()[0].id, "kill-2");
        assert_eq!(feed.entries()[1].id, "kill-1");
    }

    #[test]
    fn test_cap_evicts_oldest() {
        let mut feed = KillFeed::new();
        for n in 0..8 {
            feed.push(entry(n));
            assert!(feed.len() <= KILL_FEED_CAP);
        }

        assert_eq!(feed.len(), KILL_FEED_CAP);
        let ids: Vec<&str> = feed.entries().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["kill-7", "kill-6", "kill-5", "kill-4", "kill-3"]);
    }

    #[test]
    fn test_remove_by_id() {
        let mut feed = KillFeed::new();
        feed.push(entry(1));
        feed.push(entry(2));

        assert!(feed.remove("kill-1"));
        assert_eq!(feed.len(), 1);
        assert_eq!(feed.entries()[0].id, "kill-2");

        // Already gone (e.g. evicted by the cap before its timer fired).
        assert!(!feed.remove("kill-1"));
    }
}
