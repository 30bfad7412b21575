//! Message store: the reconciled, time-ordered message collection
//!
//! Snapshot reads and live batches both land here. The store is the only
//! owner of the message list; every view is computed from [`MessageStore::all`].

use log::debug;
use std::collections::{HashSet, VecDeque};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::models::{Message, MessageId};

/// Live messages remembered while waiting for the first snapshot
const MAX_EARLY: usize = 1_000;

/// Result of folding a batch into the store
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MergeOutcome {
    /// Messages that were new and got inserted, in batch order
    pub inserted: Vec<Message>,
    /// Messages dropped because their id was already present or deleted
    pub skipped: usize,
}

impl MergeOutcome {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty()
    }
}

struct Entry {
    /// Arrival sequence number, used to break timestamp ties
    seq: u64,
    message: Message,
}

#[derive(Default)]
struct Inner {
    entries: Vec<Entry>,
    ids: HashSet<MessageId>,
    next_seq: u64,
    /// Whether a snapshot has been applied with `seed`
    seeded: bool,
    /// Most recent messages merged before the store was seeded
    early: VecDeque<Message>,
    /// Ids deleted during this session
    tombstones: HashSet<MessageId>,
}

impl Inner {
    /// Append a message if its id is neither present nor deleted
    fn push(&mut self, message: Message) -> bool {
        if self.tombstones.contains(&message.id) || self.ids.contains(&message.id) {
            return false;
        }
        self.ids.insert(message.id.clone());
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(Entry { seq, message });
        true
    }

    /// Drop everything held and load `messages` instead
    fn load(&mut self, messages: Vec<Message>) {
        self.entries.clear();
        self.ids.clear();
        for message in messages {
            self.push(message);
        }
    }

    /// Newest first; equal timestamps keep arrival order
    fn sort(&mut self) {
        self.entries.sort_by(|a, b| {
            b.message
                .timestamp
                .cmp(&a.message.timestamp)
                .then(a.seq.cmp(&b.seq))
        });
    }
}

/// Deduplicated collection of messages sorted newest first
///
/// Every id appears at most once and [`all`](Self::all) is always sorted
/// non-increasing by timestamp. Stored messages are never overwritten.
pub struct MessageStore {
    inner: RwLock<Inner>,
}

impl MessageStore {
    /// Create an empty, unseeded store
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a full snapshot from the backend
    ///
    /// The first snapshot also folds in anything merged before it that it
    /// does not contain, so a live batch that beat the snapshot is not lost.
    /// Later snapshots replace outright.
    ///
    /// Returns the number of messages held afterwards.
    pub fn seed(&self, snapshot: Vec<Message>) -> usize {
        let mut inner = self.write();
        let early = std::mem::take(&mut inner.early);
        inner.load(snapshot);

        let mut folded = 0;
        for message in early {
            if inner.push(message) {
                folded += 1;
            }
        }
        if folded > 0 {
            debug!("Folded {} early live messages into snapshot", folded);
        }

        inner.seeded = true;
        inner.sort();
        inner.entries.len()
    }

    /// Replace the whole collection with `messages`
    ///
    /// Used for search results: nothing held before survives unless
    /// `messages` contains it. Returns the number of messages held afterwards.
    pub fn replace(&self, messages: Vec<Message>) -> usize {
        let mut inner = self.write();
        inner.load(messages);
        inner.sort();
        inner.entries.len()
    }

    /// Idempotently fold a batch into the store
    ///
    /// A message is inserted only if its id is not already present; existing
    /// entries are never overwritten. Duplicates inside the batch keep the
    /// first occurrence.
    pub fn merge(&self, batch: Vec<Message>) -> MergeOutcome {
        let mut inner = self.write();
        let mut outcome = MergeOutcome::default();

        for message in batch {
            if inner.push(message.clone()) {
                if !inner.seeded {
                    if inner.early.len() == MAX_EARLY {
                        inner.early.pop_front();
                    }
                    inner.early.push_back(message.clone());
                }
                outcome.inserted.push(message);
            } else {
                outcome.skipped += 1;
            }
        }

        if !outcome.inserted.is_empty() {
            inner.sort();
        }
        outcome
    }

    /// Remove a message by id
    ///
    /// The id is remembered for the rest of the session, so later merges and
    /// snapshots do not bring it back.
    pub fn remove(&self, id: &MessageId) -> Option<Message> {
        let mut inner = self.write();
        inner.tombstones.insert(id.clone());
        inner.early.retain(|m| &m.id != id);
        if !inner.ids.remove(id) {
            return None;
        }
        let pos = inner.entries.iter().position(|e| &e.message.id == id)?;
        Some(inner.entries.remove(pos).message)
    }

    /// Current collection, newest first
    pub fn all(&self) -> Vec<Message> {
        self.read().entries.iter().map(|e| e.message.clone()).collect()
    }

    /// Get a message by id
    pub fn get(&self, id: &MessageId) -> Option<Message> {
        self.read()
            .entries
            .iter()
            .find(|e| &e.message.id == id)
            .map(|e| e.message.clone())
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.read().ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a snapshot has been applied
    pub fn is_seeded(&self) -> bool {
        self.read().seeded
    }

    /// Whether the id was deleted during this session
    pub fn is_deleted(&self, id: &MessageId) -> bool {
        self.read().tombstones.contains(id)
    }
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn msg(id: &str, secs: i64) -> Message {
        Message::builder(id, "alice")
            .content(format!("body {}", id))
            .timestamp(ts(secs))
            .build()
    }

    fn ids(store: &MessageStore) -> Vec<String> {
        store.all().into_iter().map(|m| m.id.0).collect()
    }

    fn assert_sorted(store: &MessageStore) {
        let all = store.all();
        assert!(all.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[test]
    fn test_snapshot_then_merge_dedupes() {
        let store = MessageStore::new();
        store.replace(vec![msg("1", 10)]);

        let outcome = store.merge(vec![msg("1", 10), msg("2", 20)]);

        assert_eq!(ids(&store), vec!["2", "1"]);
        assert_eq!(outcome.inserted.len(), 1);
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let store = MessageStore::new();
        let batch = vec![msg("a", 5), msg("b", 7), msg("c", 1)];

        store.merge(batch.clone());
        let second = store.merge(batch);

        assert!(second.is_empty());
        assert_eq!(second.skipped, 3);
        assert_eq!(store.len(), 3);
        assert_sorted(&store);
    }

    #[test]
    fn test_merge_never_overwrites() {
        let store = MessageStore::new();
        store.replace(vec![msg("1", 10)]);

        let mut changed = msg("1", 99);
        changed.content = Some("edited".to_string());
        store.merge(vec![changed]);

        let stored = store.get(&MessageId::new("1")).unwrap();
        assert_eq!(stored.content.as_deref(), Some("body 1"));
        assert_eq!(stored.timestamp, ts(10));
    }

    #[test]
    fn test_duplicates_within_batch_keep_first() {
        let store = MessageStore::new();
        let mut dup = msg("x", 3);
        dup.content = Some("second".to_string());

        let outcome = store.merge(vec![msg("x", 3), dup]);

        assert_eq!(outcome.inserted.len(), 1);
        assert_eq!(store.get(&MessageId::new("x")).unwrap().content.as_deref(), Some("body x"));
    }

    #[test]
    fn test_equal_timestamps_keep_arrival_order() {
        let store = MessageStore::new();
        store.replace(vec![msg("first", 10), msg("second", 10)]);
        store.merge(vec![msg("third", 10), msg("newest", 11)]);

        assert_eq!(ids(&store), vec!["newest", "first", "second", "third"]);
    }

    #[test]
    fn test_many_merges_stay_sorted_and_unique() {
        let store = MessageStore::new();
        for round in 0..20i64 {
            let batch = (0..10i64)
                .map(|i| {
                    let n = (round * 7 + i * 13) % 50;
                    msg(&format!("m{}", n), (n * 37) % 101)
                })
                .collect();
            store.merge(batch);
            assert_sorted(&store);
        }

        let all = store.all();
        let unique: HashSet<_> = all.iter().map(|m| m.id.clone()).collect();
        assert_eq!(unique.len(), all.len());
    }

    #[test]
    fn test_early_live_batch_survives_snapshot() {
        let store = MessageStore::new();
        store.merge(vec![msg("live", 50)]);
        assert!(!store.is_seeded());

        store.seed(vec![msg("1", 10), msg("2", 20)]);

        assert!(store.is_seeded());
        assert_eq!(ids(&store), vec!["live", "2", "1"]);
    }

    #[test]
    fn test_early_batch_already_in_snapshot_not_duplicated() {
        let store = MessageStore::new();
        store.merge(vec![msg("2", 20)]);
        store.seed(vec![msg("1", 10), msg("2", 20)]);
        assert_eq!(ids(&store), vec!["2", "1"]);
    }

    #[test]
    fn test_second_snapshot_replaces_outright() {
        let store = MessageStore::new();
        store.seed(vec![msg("1", 10)]);
        store.merge(vec![msg("2", 20)]);

        store.seed(vec![msg("3", 30)]);

        assert_eq!(ids(&store), vec!["3"]);
    }

    #[test]
    fn test_replace_before_snapshot_is_pure() {
        let store = MessageStore::new();
        store.merge(vec![msg("live", 50)]);

        // A search result arriving before any snapshot is shown as is
        store.replace(vec![msg("hit", 10)]);
        assert_eq!(ids(&store), vec!["hit"]);
        assert!(!store.is_seeded());

        // The snapshot still recovers the early live message
        store.seed(vec![msg("1", 5)]);
        assert_eq!(ids(&store), vec!["live", "1"]);
    }

    #[test]
    fn test_early_messages_are_bounded() {
        let store = MessageStore::new();
        for i in 0..(MAX_EARLY as i64 + 5) {
            store.merge(vec![msg(&format!("e{}", i), i)]);
        }
        assert_eq!(store.read().early.len(), MAX_EARLY);

        store.seed(Vec::new());
        assert_eq!(store.len(), MAX_EARLY);
        assert!(!store.contains(&MessageId::new("e0")));
        assert!(store.read().early.is_empty());
    }

    #[test]
    fn test_remove_tombstones_id() {
        let store = MessageStore::new();
        store.replace(vec![msg("1", 10), msg("2", 20)]);

        let removed = store.remove(&MessageId::new("1"));
        assert_eq!(removed.map(|m| m.id.0), Some("1".to_string()));
        assert!(store.is_deleted(&MessageId::new("1")));

        // Redelivery and re-snapshot do not resurrect it
        store.merge(vec![msg("1", 10)]);
        store.seed(vec![msg("1", 10), msg("2", 20)]);
        assert_eq!(ids(&store), vec!["2"]);
    }

    #[test]
    fn test_remove_unknown_id() {
        let store = MessageStore::new();
        assert!(store.remove(&MessageId::new("nope")).is_none());
        assert!(store.is_empty());
    }
}
