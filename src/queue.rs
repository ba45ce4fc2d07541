use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;

use crate::track::Track;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("the queue is empty")]
    EmptyQueue,

    #[error("invalid queue position `{input}` (queue holds {len} tracks)")]
    InvalidIndex { input: String, len: usize },
}

/// Ordered list of pending tracks for one voice session.
///
/// Cloning a `TrackQueue` yields another handle to the same list, the way the
/// playback driver and the command handlers share it. Every operation takes
/// the lock once and does all of its work inside that window; nothing here
/// awaits or does I/O while holding it.
#[derive(Debug, Clone, Default)]
pub struct TrackQueue {
    entries: Arc<Mutex<VecDeque<Arc<Track>>>>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, track: Track) {
        self.entries.lock().push_back(Arc::new(track));
    }

    /// Inserts `track` so that it is the next one dequeued.
    pub fn enqueue_front(&self, track: Track) {
        self.entries.lock().push_front(Arc::new(track));
    }

    /// Appends all `tracks` in order, as one mutation. Returns how many were added.
    pub fn enqueue_batch<I>(&self, tracks: I) -> usize
    where
        I: IntoIterator<Item = Track>,
    {
        // Build the batch before locking so a shuffle sees all of it or none.
        let batch: Vec<Arc<Track>> = tracks.into_iter().map(Arc::new).collect();
        let added = batch.len();
        self.entries.lock().extend(batch);
        added
    }

    pub fn dequeue_next(&self) -> Result<Arc<Track>, QueueError> {
        self.entries.lock().pop_front().ok_or(QueueError::EmptyQueue)
    }

    /// Removes the track at the 1-based `position` shown to users.
    pub fn remove_at(&self, position: i64) -> Result<Arc<Track>, QueueError> {
        let mut entries = self.entries.lock();
        let len = entries.len();
        let invalid = || QueueError::InvalidIndex {
            input: position.to_string(),
            len,
        };

        if position < 1 {
            return Err(invalid());
        }
        let index = usize::try_from(position - 1).map_err(|_| invalid())?;
        entries.remove(index).ok_or_else(invalid)
    }

    /// Parses a raw user argument and removes that position.
    pub fn remove_at_input(&self, input: &str) -> Result<Arc<Track>, QueueError> {
        let trimmed = input.trim();
        match trimmed.parse::<i64>() {
            Ok(position) => self.remove_at(position),
            Err(_) => Err(QueueError::InvalidIndex {
                input: trimmed.to_string(),
                len: self.len(),
            }),
        }
    }

    pub fn shuffle(&self) {
        self.shuffle_with(&mut rand::thread_rng());
    }

    /// Fisher-Yates over the whole list. The lock is held for the entire
    /// permutation, so no other operation observes a partly shuffled queue.
    pub fn shuffle_with<R: Rng>(&self, rng: &mut R) {
        let mut entries = self.entries.lock();
        for i in (1..entries.len()).rev() {
            let j = rng.gen_range(0..=i);
            entries.swap(i, j);
        }
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Point-in-time copy of the pending tracks.
    ///
    /// Only the `Arc`s are cloned. The copy is independent of the live queue:
    /// draining it, or the live queue advancing, leaves the other untouched.
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            entries: self.entries.lock().clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    entries: VecDeque<Arc<Track>>,
}

impl QueueSnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Arc<Track>> {
        self.entries.iter()
    }

    pub fn pop_front(&mut self) -> Option<Arc<Track>> {
        self.entries.pop_front()
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.entries.iter().map(|track| track.duration_ms).sum()
    }
}

impl IntoIterator for QueueSnapshot {
    type Item = Arc<Track>;
    type IntoIter = std::collections::vec_deque::IntoIter<Arc<Track>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a QueueSnapshot {
    type Item = &'a Arc<Track>;
    type IntoIter = std::collections::vec_deque::Iter<'a, Arc<Track>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackId;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn track(title: &str) -> Track {
        Track::new(title, format!("https://example.com/{title}"), 1000)
    }

    fn drain_titles(queue: &TrackQueue) -> Vec<String> {
        let mut titles = Vec::new();
        while let Ok(track) = queue.dequeue_next() {
            titles.push(track.title.clone());
        }
        titles
    }

    fn sorted_ids(queue: &TrackQueue) -> Vec<TrackId> {
        let mut ids: Vec<TrackId> = queue.snapshot().iter().map(|t| t.id).collect();
        ids.sort();
        ids
    }

    #[test]
    fn dequeues_in_enqueue_order() {
        let queue = TrackQueue::new();
        for title in ["t1", "t2", "t3", "t4"] {
            queue.enqueue(track(title));
        }
        assert_eq!(drain_titles(&queue), ["t1", "t2", "t3", "t4"]);
    }

    #[test]
    fn enqueue_front_plays_next() {
        let queue = TrackQueue::new();
        queue.enqueue(track("a"));
        queue.enqueue(track("b"));
        queue.enqueue_front(track("c"));
        assert_eq!(drain_titles(&queue), ["c", "a", "b"]);
    }

    #[test]
    fn batch_keeps_relative_order() {
        let queue = TrackQueue::new();
        let added = queue.enqueue_batch(vec![track("x"), track("y"), track("z")]);
        assert_eq!(added, 3);
        assert_eq!(drain_titles(&queue), ["x", "y", "z"]);
    }

    #[test]
    fn batch_appends_after_existing_entries() {
        let queue = TrackQueue::new();
        queue.enqueue(track("a"));
        assert_eq!(queue.enqueue_batch(Vec::new()), 0);
        queue.enqueue_batch(vec![track("b"), track("c")]);
        assert_eq!(drain_titles(&queue), ["a", "b", "c"]);
    }

    #[test]
    fn dequeue_on_empty_fails_and_stays_empty() {
        let queue = TrackQueue::new();
        assert_eq!(queue.dequeue_next().unwrap_err(), QueueError::EmptyQueue);
        assert_eq!(queue.len(), 0);
        assert!(queue.is_empty());
    }

    #[test]
    fn remove_rejects_out_of_range_positions() {
        let queue = TrackQueue::new();
        queue.enqueue_batch(vec![track("a"), track("b"), track("c")]);
        let n = queue.len() as i64;

        for position in [0, -1, n + 1, i64::MIN, i64::MAX] {
            assert!(
                matches!(queue.remove_at(position), Err(QueueError::InvalidIndex { .. })),
                "position {position} should be rejected"
            );
        }
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn remove_first_keeps_rest_in_order() {
        let queue = TrackQueue::new();
        queue.enqueue_batch(vec![track("a"), track("b"), track("c")]);
        assert_eq!(queue.remove_at(1).unwrap().title, "a");
        assert_eq!(drain_titles(&queue), ["b", "c"]);
    }

    #[test]
    fn remove_returns_the_addressed_track() {
        let queue = TrackQueue::new();
        queue.enqueue_batch(vec![track("a"), track("b"), track("c")]);
        assert_eq!(queue.remove_at(2).unwrap().title, "b");
        assert_eq!(drain_titles(&queue), ["a", "c"]);
    }

    #[test]
    fn remove_last_position_is_valid() {
        let queue = TrackQueue::new();
        queue.enqueue_batch(vec![track("a"), track("b"), track("c")]);
        assert_eq!(queue.remove_at(3).unwrap().title, "c");
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn remove_input_rejects_non_integers() {
        let queue = TrackQueue::new();
        queue.enqueue_batch(vec![track("a"), track("b")]);

        for input in ["", "abc", "1.5", "two"] {
            assert_eq!(
                queue.remove_at_input(input).unwrap_err(),
                QueueError::InvalidIndex {
                    input: input.to_string(),
                    len: 2
                }
            );
        }
        assert_eq!(queue.remove_at_input(" 2 ").unwrap().title, "b");
    }

    #[test]
    fn remove_on_empty_queue_is_invalid() {
        let queue = TrackQueue::new();
        assert!(matches!(
            queue.remove_at(1),
            Err(QueueError::InvalidIndex { len: 0, .. })
        ));
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let queue = TrackQueue::new();
        queue.enqueue_batch((0..50).map(|i| track(&format!("t{i}"))));
        let before = sorted_ids(&queue);

        queue.shuffle();

        assert_eq!(queue.len(), 50);
        assert_eq!(sorted_ids(&queue), before);
    }

    #[test]
    fn seeded_shuffle_reorders() {
        let queue = TrackQueue::new();
        queue.enqueue_batch((0..20).map(|i| track(&format!("t{i}"))));
        let before: Vec<TrackId> = queue.snapshot().iter().map(|t| t.id).collect();

        queue.shuffle_with(&mut StdRng::seed_from_u64(7));

        let after: Vec<TrackId> = queue.snapshot().iter().map(|t| t.id).collect();
        assert_ne!(before, after);
    }

    #[test]
    fn shuffle_covers_every_position() {
        // Each of 3 tracks should land in each slot over enough seeded runs.
        let mut seen = [[false; 3]; 3];
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let queue = TrackQueue::new();
            queue.enqueue_batch(vec![track("0"), track("1"), track("2")]);
            queue.shuffle_with(&mut rng);
            for (slot, t) in queue.snapshot().iter().enumerate() {
                let original: usize = t.title.parse().unwrap();
                seen[original][slot] = true;
            }
        }
        assert!(seen.iter().flatten().all(|&hit| hit));
    }

    #[test]
    fn shuffle_trivial_queues_is_noop() {
        let queue = TrackQueue::new();
        queue.shuffle();
        assert!(queue.is_empty());

        queue.enqueue(track("only"));
        queue.shuffle();
        assert_eq!(drain_titles(&queue), ["only"]);
    }

    #[test]
    fn clear_is_idempotent() {
        let queue = TrackQueue::new();
        queue.enqueue_batch(vec![track("a"), track("b")]);
        queue.clear();
        assert_eq!(queue.len(), 0);
        queue.clear();
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn snapshot_is_isolated_from_live_queue() {
        let queue = TrackQueue::new();
        queue.enqueue_batch(vec![track("a"), track("b"), track("c")]);

        let snapshot = queue.snapshot();
        queue.dequeue_next().unwrap();
        queue.enqueue(track("d"));

        let titles: Vec<&str> = snapshot.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["a", "b", "c"]);
        assert_eq!(snapshot.len(), 3);
    }

    #[test]
    fn draining_snapshot_leaves_queue_alone() {
        let queue = TrackQueue::new();
        queue.enqueue_batch(vec![track("a"), track("b")]);

        let mut snapshot = queue.snapshot();
        while snapshot.pop_front().is_some() {}

        assert!(snapshot.is_empty());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn snapshot_totals_durations() {
        let queue = TrackQueue::new();
        queue.enqueue(Track::new("a", "uri", 30_000));
        queue.enqueue(Track::new("b", "uri", 45_000));
        assert_eq!(queue.snapshot().total_duration_ms(), 75_000);
    }

    #[test]
    fn clones_share_the_same_entries() {
        let queue = TrackQueue::new();
        let handle = queue.clone();
        handle.enqueue(track("a"));
        assert_eq!(queue.len(), 1);
    }
}
