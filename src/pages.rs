//! Splits a queue snapshot into the fixed-size pages shown by the `queue` command.

use crate::queue::QueueSnapshot;
use crate::time::format_duration_ms;

pub const PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number.
    pub number: usize,
    pub lines: Vec<String>,
}

impl Page {
    pub fn body(&self) -> String {
        self.lines.join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePages {
    pages: Vec<Page>,
    track_count: usize,
    total_duration_ms: u64,
}

impl QueuePages {
    pub fn from_snapshot(snapshot: &QueueSnapshot) -> Self {
        Self::with_page_size(snapshot, PAGE_SIZE)
    }

    pub fn with_page_size(snapshot: &QueueSnapshot, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        let mut pages = Vec::with_capacity(snapshot.len().div_ceil(page_size));
        let mut lines = Vec::with_capacity(page_size);
        let mut total_duration_ms: u64 = 0;

        for (i, track) in snapshot.iter().enumerate() {
            total_duration_ms = total_duration_ms.saturating_add(track.duration_ms);
            lines.push(format!(
                "{}. {} - {}",
                i + 1,
                track.title,
                format_duration_ms(track.duration_ms)
            ));

            if lines.len() == page_size {
                pages.push(Page {
                    number: pages.len() + 1,
                    lines: std::mem::take(&mut lines),
                });
            }
        }
        if !lines.is_empty() {
            pages.push(Page {
                number: pages.len() + 1,
                lines,
            });
        }

        QueuePages {
            pages,
            track_count: snapshot.len(),
            total_duration_ms,
        }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Looks up a page by its 1-based number.
    pub fn page(&self, number: usize) -> Option<&Page> {
        number.checked_sub(1).and_then(|i| self.pages.get(i))
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.total_duration_ms
    }

    pub fn header(&self) -> String {
        format!("Items In Queue: {}", self.track_count)
    }

    pub fn footer(&self) -> String {
        format!("Total length: {}", format_duration_ms(self.total_duration_ms))
    }

    pub fn cursor(&self) -> PageCursor {
        PageCursor::new(self.len())
    }
}

/// Current page of a paged view, clamped to `1..=page_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    current: usize,
    page_count: usize,
}

impl PageCursor {
    pub fn new(page_count: usize) -> Self {
        PageCursor {
            current: 1,
            page_count: page_count.max(1),
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Moves forward; returns false when already on the last page.
    pub fn next(&mut self) -> bool {
        if self.current < self.page_count {
            self.current += 1;
            true
        } else {
            false
        }
    }

    /// Moves back; returns false when already on the first page.
    pub fn prev(&mut self) -> bool {
        if self.current > 1 {
            self.current -= 1;
            true
        } else {
            false
        }
    }

    pub fn label(&self) -> String {
        format!("Page {}/{}", self.current, self.page_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::TrackQueue;
    use crate::track::Track;

    fn queue_of(count: usize) -> TrackQueue {
        let queue = TrackQueue::new();
        queue.enqueue_batch((0..count).map(|i| Track::new(format!("song {}", i + 1), "uri", 60_000)));
        queue
    }

    #[test]
    fn empty_snapshot_has_no_pages() {
        let pages = QueuePages::from_snapshot(&TrackQueue::new().snapshot());
        assert!(pages.is_empty());
        assert_eq!(pages.total_duration_ms(), 0);
        assert_eq!(pages.cursor().page_count(), 1);
    }

    #[test]
    fn exact_multiple_fills_pages() {
        let pages = QueuePages::from_snapshot(&queue_of(20).snapshot());
        assert_eq!(pages.len(), 2);
        assert!(pages.pages().iter().all(|p| p.lines.len() == PAGE_SIZE));
    }

    #[test]
    fn remainder_goes_to_last_page() {
        let pages = QueuePages::from_snapshot(&queue_of(23).snapshot());
        assert_eq!(pages.len(), 3);
        let last = pages.page(3).unwrap();
        assert_eq!(last.number, 3);
        assert_eq!(last.lines, ["21. song 21 - 01m 00s", "22. song 22 - 01m 00s", "23. song 23 - 01m 00s"]);
        assert!(pages.page(0).is_none());
        assert!(pages.page(4).is_none());
    }

    #[test]
    fn header_and_footer_summarise_the_whole_snapshot() {
        let pages = QueuePages::from_snapshot(&queue_of(12).snapshot());
        assert_eq!(pages.header(), "Items In Queue: 12");
        assert_eq!(pages.footer(), "Total length: 12m 00s");
        assert_eq!(pages.page(1).unwrap().body().lines().next(), Some("1. song 1 - 01m 00s"));
    }

    #[test]
    fn cursor_stays_in_bounds() {
        let mut cursor = PageCursor::new(2);
        assert!(!cursor.prev());
        assert!(cursor.next());
        assert_eq!(cursor.label(), "Page 2/2");
        assert!(!cursor.next());
        assert_eq!(cursor.current(), 2);
        assert!(cursor.prev());
        assert_eq!(cursor.current(), 1);
    }
}
