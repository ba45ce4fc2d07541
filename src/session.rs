use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serenity::model::id::{ChannelId, GuildId, MessageId};
use serenity::prelude::TypeMapKey;
use songbird::tracks::TrackHandle;
use tracing::{debug, warn};

use crate::queue::{QueueError, TrackQueue};
use crate::queue_file::QueueFile;
use crate::track::{Track, TrackId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Playing,
    Paused,
}

struct Player {
    state: SessionState,
    current: Option<Arc<Track>>,
    handle: Option<TrackHandle>,
    text_channel: Option<ChannelId>,
    announcement: Option<(ChannelId, MessageId)>,
    volume: f32,
    idle_epoch: u64,
}

impl Default for Player {
    fn default() -> Self {
        Player {
            state: SessionState::Idle,
            current: None,
            handle: None,
            text_channel: None,
            announcement: None,
            volume: 1.0,
            idle_epoch: 0,
        }
    }
}

impl Player {
    fn go_idle(&mut self) -> Option<TrackHandle> {
        self.state = SessionState::Idle;
        self.current = None;
        self.idle_epoch += 1;
        self.handle.take()
    }

    fn play_next(&mut self, queue: &TrackQueue) -> Result<Arc<Track>, QueueError> {
        match queue.dequeue_next() {
            Ok(track) => {
                self.state = SessionState::Playing;
                self.current = Some(track.clone());
                self.handle = None;
                Ok(track)
            }
            Err(err) => {
                self.go_idle();
                Err(err)
            }
        }
    }
}

/// Playback state of one guild's voice connection.
///
/// Owns that guild's [`TrackQueue`]; nothing is shared between guilds. The
/// player lock is always taken before the queue lock, never the other way.
pub struct PlaybackSession {
    guild_id: GuildId,
    queue: TrackQueue,
    player: Mutex<Player>,
    queue_file: Option<QueueFile>,
}

impl PlaybackSession {
    pub fn new(guild_id: GuildId, queue_file: Option<QueueFile>) -> Self {
        PlaybackSession {
            guild_id,
            queue: TrackQueue::new(),
            player: Mutex::new(Player::default()),
            queue_file,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn queue(&self) -> &TrackQueue {
        &self.queue
    }

    pub fn state(&self) -> SessionState {
        self.player.lock().state
    }

    pub fn current(&self) -> Option<Arc<Track>> {
        self.player.lock().current.clone()
    }

    pub fn handle(&self) -> Option<TrackHandle> {
        self.player.lock().handle.clone()
    }

    pub fn text_channel(&self) -> Option<ChannelId> {
        self.player.lock().text_channel
    }

    pub fn set_text_channel(&self, channel: ChannelId) {
        self.player.lock().text_channel = Some(channel);
    }

    /// Bumped on every transition to idle; lets a delayed check tell whether
    /// the session stayed idle the whole time.
    pub fn idle_epoch(&self) -> u64 {
        self.player.lock().idle_epoch
    }

    /// Moves past `ended` to the next queued track. On an empty queue the
    /// session goes idle.
    ///
    /// Returns `None` without touching anything when `ended` is no longer the
    /// current track, e.g. the end event of a track that was already stopped
    /// and replaced.
    pub fn advance_from(&self, ended: TrackId) -> Option<Result<Arc<Track>, QueueError>> {
        let mut player = self.player.lock();
        if player.current.as_ref().map(|current| current.id) != Some(ended) {
            debug!(guild = %self.guild_id, track = %ended, "ignoring end of stale track");
            return None;
        }
        Some(player.play_next(&self.queue))
    }

    /// Starts playback only when nothing is playing. Returns the track to start,
    /// or `None` when the session was already busy or the queue is empty.
    pub fn start_if_idle(&self) -> Option<Arc<Track>> {
        let mut player = self.player.lock();
        if player.state != SessionState::Idle {
            return None;
        }
        if self.queue.is_empty() {
            return None;
        }
        player.play_next(&self.queue).ok()
    }

    /// Records the player handle for `track`. Ignored if playback has since
    /// moved on to a different track.
    pub fn attach_handle(&self, track: &Track, handle: TrackHandle) -> bool {
        let mut player = self.player.lock();
        let is_current = player.current.as_ref().map(|current| current.id) == Some(track.id);
        if is_current {
            player.handle = Some(handle);
        } else {
            debug!(guild = %self.guild_id, track = %track.id, "stale track handle");
        }
        is_current
    }

    pub fn pause(&self) -> bool {
        let mut player = self.player.lock();
        if player.state == SessionState::Playing {
            player.state = SessionState::Paused;
            true
        } else {
            false
        }
    }

    pub fn resume(&self) -> bool {
        let mut player = self.player.lock();
        if player.state == SessionState::Paused {
            player.state = SessionState::Playing;
            true
        } else {
            false
        }
    }

    /// Playback volume as a fraction, `1.0` being unchanged. Applies to every
    /// track the session starts.
    pub fn volume(&self) -> f32 {
        self.player.lock().volume
    }

    /// Stores the volume and returns the current handle so the caller can
    /// apply it to the playing track too.
    pub fn set_volume(&self, volume: f32) -> Option<TrackHandle> {
        let mut player = self.player.lock();
        player.volume = volume;
        player.handle.clone()
    }

    /// Remembers the latest "Now Playing" message and hands back the one it
    /// replaces so the caller can delete it.
    pub fn replace_announcement(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Option<(ChannelId, MessageId)> {
        self.player.lock().announcement.replace((channel, message))
    }

    pub fn take_announcement(&self) -> Option<(ChannelId, MessageId)> {
        self.player.lock().announcement.take()
    }

    /// Clears the queue and goes idle. Returns the handle of the track that
    /// was playing so the caller can stop it.
    pub fn reset(&self) -> Option<TrackHandle> {
        let mut player = self.player.lock();
        self.queue.clear();
        player.go_idle()
    }

    /// Writes the queue status file, if one is configured.
    pub async fn persist(&self) {
        let Some(file) = &self.queue_file else {
            return;
        };
        let snapshot = self.queue.snapshot();
        if let Err(why) = file.write(&snapshot).await {
            warn!(guild = %self.guild_id, "failed to write queue file: {:?}", why);
        }
    }
}

/// All live sessions, keyed by guild.
#[derive(Default)]
pub struct Sessions {
    sessions: RwLock<HashMap<GuildId, Arc<PlaybackSession>>>,
    queue_file: Option<QueueFile>,
}

impl TypeMapKey for Sessions {
    type Value = Arc<Sessions>;
}

impl Sessions {
    pub fn new(queue_file: Option<QueueFile>) -> Self {
        Sessions {
            sessions: RwLock::new(HashMap::new()),
            queue_file,
        }
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<PlaybackSession>> {
        self.sessions.read().get(&guild_id).cloned()
    }

    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<PlaybackSession> {
        if let Some(session) = self.get(guild_id) {
            return session;
        }
        self.sessions
            .write()
            .entry(guild_id)
            .or_insert_with(|| {
                let queue_file = self.queue_file.as_ref().map(|file| file.for_guild(guild_id));
                Arc::new(PlaybackSession::new(guild_id, queue_file))
            })
            .clone()
    }

    /// Tears down the guild's session, clearing its queue and rewriting its
    /// status file.
    pub async fn remove(&self, guild_id: GuildId) -> Option<Arc<PlaybackSession>> {
        let session = self.sessions.write().remove(&guild_id)?;
        if let Some(handle) = session.reset() {
            if let Err(why) = handle.stop() {
                debug!(guild = %guild_id, "track already finished: {:?}", why);
            }
        }
        session.persist().await;
        Some(session)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
