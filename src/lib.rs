//! Per-guild track queue and playback session state for the bones-dj bot.

pub mod config;
pub mod pages;
pub mod queue;
pub mod queue_file;
pub mod session;
pub mod time;
pub mod track;

pub use queue::{QueueError, QueueSnapshot, TrackQueue};
pub use session::{PlaybackSession, SessionState, Sessions};
pub use track::{Track, TrackId};
