use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TRACK_ID: AtomicU64 = AtomicU64::new(1);

/// Handle identifying one resolved track.
///
/// Every resolution hands out a fresh id, so the same song queued twice
/// yields two distinct handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(u64);

impl TrackId {
    pub fn next() -> Self {
        TrackId(NEXT_TRACK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A playable item plus the metadata needed to show it.
///
/// The queue never mutates a track; it is shared behind an `Arc` once queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub uri: String,
    pub duration_ms: u64,
}

impl Track {
    pub fn new(title: impl Into<String>, uri: impl Into<String>, duration_ms: u64) -> Self {
        Track {
            id: TrackId::next(),
            title: title.into(),
            uri: uri.into(),
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_per_resolution() {
        let a = Track::new("song", "https://example.com/a", 1000);
        let b = Track::new("song", "https://example.com/a", 1000);
        assert_ne!(a.id, b.id);
        assert_ne!(a, b);
    }
}
