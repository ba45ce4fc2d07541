use std::sync::Arc;
use std::time::Duration;

use bones_dj::time::format_duration_ms;
use bones_dj::{PlaybackSession, SessionState, Sessions, Track, TrackId};
use serenity::{async_trait, http::Http, model::channel::Message, utils::Colour};
use songbird::{
    events::{Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent},
    Call, Songbird,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::util::check_msg;
use crate::youtube;

/// Advances a guild's session whenever its current track ends.
#[derive(Clone)]
pub struct Driver {
    http: Arc<Http>,
    call: Arc<Mutex<Call>>,
    manager: Arc<Songbird>,
    sessions: Arc<Sessions>,
    session: Arc<PlaybackSession>,
    afk_timeout: Duration,
}

struct TrackEndNotifier {
    driver: Driver,
    track: TrackId,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        self.driver.advance_from(self.track).await;
        None
    }
}

/// Deletes the session's last "Now Playing" message, if it still exists.
pub async fn clear_announcement(http: &Http, session: &PlaybackSession) {
    let Some((channel, message)) = session.take_announcement() else {
        return;
    };
    if let Err(why) = channel.delete_message(http, message).await {
        debug!(guild = %session.guild_id(), "could not delete announcement: {:?}", why);
    }
}

impl Driver {
    pub fn new(
        http: Arc<Http>,
        call: Arc<Mutex<Call>>,
        manager: Arc<Songbird>,
        sessions: Arc<Sessions>,
        session: Arc<PlaybackSession>,
        afk_timeout: Duration,
    ) -> Self {
        Driver {
            http,
            call,
            manager,
            sessions,
            session,
            afk_timeout,
        }
    }

    /// Starts the next queued track if nothing is playing yet.
    pub async fn start_if_idle(&self) {
        if let Some(track) = self.session.start_if_idle() {
            if !self.play(&track).await {
                self.advance_from(track.id).await;
                return;
            }
        }
        self.session.persist().await;
    }

    /// Plays the track queued after `ended`, skipping any that fail to open.
    /// Goes idle once the queue runs dry. Does nothing if `ended` is no longer
    /// the session's current track.
    pub async fn advance_from(&self, ended: TrackId) {
        let mut ended = ended;
        loop {
            match self.session.advance_from(ended) {
                None => return,
                Some(Ok(track)) => {
                    if self.play(&track).await {
                        break;
                    }
                    ended = track.id;
                }
                Some(Err(_)) => {
                    debug!(guild = %self.session.guild_id(), "queue drained, going idle");
                    self.schedule_afk_leave();
                    break;
                }
            }
        }
        self.session.persist().await;
    }

    async fn play(&self, track: &Arc<Track>) -> bool {
        let guild_id = self.session.guild_id();
        let source = match youtube::open_source(track).await {
            Ok(source) => source,
            Err(why) => {
                warn!(guild = %guild_id, track = %track.id, "Err starting source: {}", why);
                self.announce(
                    "",
                    format!("Could not play [{}]({}), skipping", track.title, track.uri),
                    Colour::RED,
                )
                .await;
                return false;
            }
        };

        let handle = {
            let mut call = self.call.lock().await;
            call.play_source(source)
        };

        if !self.session.attach_handle(track, handle.clone()) {
            // Playback was stopped while the source was opening.
            let _ = handle.stop();
            return true;
        }

        if let Err(why) = handle.set_volume(self.session.volume()) {
            warn!(guild = %guild_id, "failed to set volume: {:?}", why);
        }

        let notifier = TrackEndNotifier {
            driver: self.clone(),
            track: track.id,
        };
        if let Err(why) = handle.add_event(Event::Track(TrackEvent::End), notifier) {
            warn!(guild = %guild_id, "failed to watch track end: {:?}", why);
        }

        info!(guild = %guild_id, track = %track.id, title = %track.title, "now playing");
        clear_announcement(&self.http, &self.session).await;
        let sent = self.announce(
            "Now Playing",
            format!(
                "[{}]({}) - {}",
                track.title,
                track.uri,
                format_duration_ms(track.duration_ms)
            ),
            Colour::DARK_GREEN,
        )
        .await;
        if let Some(message) = sent {
            // A newer track may have announced itself in the meantime.
            let replaced = self.session.replace_announcement(message.channel_id, message.id);
            if let Some((channel, stale)) = replaced {
                if let Err(why) = channel.delete_message(&self.http, stale).await {
                    debug!(guild = %guild_id, "could not delete announcement: {:?}", why);
                }
            }
        }
        true
    }

    async fn announce(&self, title: &str, description: String, colour: Colour) -> Option<Message> {
        let channel = self.session.text_channel()?;
        let sent = channel
            .send_message(&self.http, |m| {
                m.embed(|e| e.title(title).description(description).colour(colour))
            })
            .await;
        match sent {
            Ok(message) => Some(message),
            Err(why) => {
                warn!("Error sending message: {:?}", why);
                None
            }
        }
    }

    /// Leaves voice if the session is still idle after the AFK timeout.
    pub fn schedule_afk_leave(&self) {
        let driver = self.clone();
        let epoch = self.session.idle_epoch();

        tokio::spawn(async move {
            tokio::time::sleep(driver.afk_timeout).await;

            let guild_id = driver.session.guild_id();
            let still_ours = driver
                .sessions
                .get(guild_id)
                .map_or(false, |current| Arc::ptr_eq(&current, &driver.session));
            if !still_ours
                || driver.session.state() != SessionState::Idle
                || driver.session.idle_epoch() != epoch
            {
                return;
            }

            info!(guild = %guild_id, "disconnecting due to inactivity");
            if let Some(channel) = driver.session.text_channel() {
                check_msg(
                    channel
                        .send_message(&driver.http, |m| {
                            m.embed(|e| {
                                e.description("Disconnecting due to inactivity")
                                    .colour(Colour::BLUE)
                            })
                        })
                        .await,
                );
            }
            clear_announcement(&driver.http, &driver.session).await;
            driver.sessions.remove(guild_id).await;
            if let Err(why) = driver.manager.remove(guild_id).await {
                warn!(guild = %guild_id, "failed to leave voice channel: {:?}", why);
            }
        });
    }
}
