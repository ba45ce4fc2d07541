use std::sync::Arc;

use bones_dj::config::Config;
use bones_dj::{PlaybackSession, QueueError, Sessions};
use serenity::{
    client::Context,
    model::prelude::{ChannelId, GuildId, Message, ReactionType, UserId},
    prelude::TypeMapKey,
    utils::Colour,
    Result as SerenityResult,
};
use songbird::{Call, Songbird};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::playback::{clear_announcement, Driver};
use crate::youtube::{ResolveError, Resolver};

pub struct BotConfig;

impl TypeMapKey for BotConfig {
    type Value = Arc<Config>;
}

#[derive(Debug, thiserror::Error)]
pub enum MusicError {
    #[error("This command only works in a server")]
    NotInGuild,

    #[error("You're not connected to a voice channel")]
    UserNotInVoice,

    #[error("I'm not connected to a voice channel")]
    BotNotInVoice,

    #[error("You're not connected to the same voice channel as me")]
    DifferentChannel,

    #[error("Error getting voice connection")]
    NoVoiceManager,

    #[error("Bot state is not initialised")]
    MissingState,

    #[error("Failed to join voice channel: {0}")]
    Join(String),

    #[error("I'm not playing anything")]
    NotPlaying,

    #[error("That command takes a single track, not a playlist")]
    PlaylistNotAllowed,

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl MusicError {
    /// Text shown to the user in place of the raw error.
    pub fn user_message(&self) -> String {
        match self {
            MusicError::Queue(QueueError::EmptyQueue) => "The queue is empty".to_string(),
            MusicError::Queue(QueueError::InvalidIndex { .. }) => {
                "Please send a valid track to remove".to_string()
            }
            MusicError::Resolve(ResolveError::EmptyQuery) => {
                "Please enter something to play".to_string()
            }
            MusicError::Resolve(ResolveError::Api(_) | ResolveError::Source(_)) => {
                "Something went wrong with the track you sent, please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Shared state every voice command needs.
pub struct GuildData {
    pub guild_id: GuildId,
    pub manager: Arc<Songbird>,
    pub handler_lock: Arc<Mutex<Call>>,
    pub sessions: Arc<Sessions>,
    pub session: Arc<PlaybackSession>,
    pub config: Arc<Config>,
}

impl GuildData {
    pub fn driver(&self, ctx: &Context) -> Driver {
        Driver::new(
            ctx.http.clone(),
            self.handler_lock.clone(),
            self.manager.clone(),
            self.sessions.clone(),
            self.session.clone(),
            self.config.afk_timeout,
        )
    }
}

pub async fn shared_state(ctx: &Context) -> Result<(Arc<Sessions>, Arc<Config>), MusicError> {
    let data = ctx.data.read().await;
    let sessions = data.get::<Sessions>().cloned().ok_or(MusicError::MissingState)?;
    let config = data.get::<BotConfig>().cloned().ok_or(MusicError::MissingState)?;
    Ok((sessions, config))
}

pub async fn resolver(ctx: &Context) -> Result<Arc<Resolver>, MusicError> {
    ctx.data
        .read()
        .await
        .get::<Resolver>()
        .cloned()
        .ok_or(MusicError::MissingState)
}

pub fn user_voice_channel(ctx: &Context, msg: &Message) -> Result<(GuildId, ChannelId), MusicError> {
    let guild = msg.guild(&ctx.cache).ok_or(MusicError::NotInGuild)?;
    let channel = guild
        .voice_states
        .get(&msg.author.id)
        .and_then(|voice_state| voice_state.channel_id)
        .ok_or(MusicError::UserNotInVoice)?;
    Ok((guild.id, channel))
}

/// Checks that the caller and the bot share a voice channel, then returns the
/// guild's call and session.
pub async fn get_guild_data(ctx: &Context, msg: &Message) -> Result<GuildData, MusicError> {
    let (guild_id, user_channel) = user_voice_channel(ctx, msg)?;

    let manager = songbird::get(ctx).await.ok_or(MusicError::NoVoiceManager)?;
    let handler_lock = manager.get(guild_id).ok_or(MusicError::BotNotInVoice)?;

    let bot_channel = handler_lock.lock().await.current_channel();
    match bot_channel {
        None => return Err(MusicError::BotNotInVoice),
        Some(channel) if channel != songbird::id::ChannelId::from(user_channel) => {
            return Err(MusicError::DifferentChannel)
        }
        Some(_) => {}
    }

    let (sessions, config) = shared_state(ctx).await?;
    let session = sessions.get_or_create(guild_id);

    Ok(GuildData {
        guild_id,
        manager,
        handler_lock,
        sessions,
        session,
        config,
    })
}

/// Joins (or moves to) the caller's voice channel.
pub async fn join_user_channel(ctx: &Context, msg: &Message) -> Result<GuildData, MusicError> {
    let (guild_id, channel) = user_voice_channel(ctx, msg)?;
    let manager = songbird::get(ctx).await.ok_or(MusicError::NoVoiceManager)?;

    let (handler_lock, result) = manager.join(guild_id, channel).await;
    result.map_err(|why| MusicError::Join(why.to_string()))?;
    info!(guild = %guild_id, channel = %channel, "joined voice channel");

    let (sessions, config) = shared_state(ctx).await?;
    let session = sessions.get_or_create(guild_id);
    session.set_text_channel(msg.channel_id);

    Ok(GuildData {
        guild_id,
        manager,
        handler_lock,
        sessions,
        session,
        config,
    })
}

/// Voice channel the bot currently sits in, if any.
pub async fn bot_voice_channel(manager: &Songbird, guild_id: GuildId) -> Option<songbird::id::ChannelId> {
    let handler_lock = manager.get(guild_id)?;
    let channel = handler_lock.lock().await.current_channel();
    channel
}

/// Leaves `channel` if no human is left in it.
pub async fn leave_if_alone(ctx: &Context, guild_id: GuildId, channel: ChannelId) {
    let Some(manager) = songbird::get(ctx).await else {
        return;
    };
    if bot_voice_channel(&manager, guild_id).await != Some(channel.into()) {
        return;
    }

    let listeners = match ctx.cache.guild(guild_id) {
        Some(guild) => guild
            .voice_states
            .values()
            .filter(|state| state.channel_id == Some(channel))
            .filter(|state| !is_bot(ctx, state.user_id, state.member.as_ref().map(|m| m.user.bot)))
            .count(),
        None => return,
    };
    if listeners > 0 {
        return;
    }

    info!(guild = %guild_id, "voice channel empty, leaving");
    if let Ok((sessions, _)) = shared_state(ctx).await {
        if let Some(session) = sessions.get(guild_id) {
            clear_announcement(&ctx.http, &session).await;
        }
        sessions.remove(guild_id).await;
    }
    if let Err(why) = manager.remove(guild_id).await {
        warn!(guild = %guild_id, "failed to leave voice channel: {:?}", why);
    }
}

fn is_bot(ctx: &Context, user_id: UserId, known: Option<bool>) -> bool {
    if user_id == ctx.cache.current_user_id() {
        return true;
    }
    known
        .or_else(|| ctx.cache.user(user_id).map(|user| user.bot))
        .unwrap_or(false)
}

pub async fn say(ctx: &Context, channel: ChannelId, text: impl ToString, colour: Colour) {
    check_msg(
        channel
            .send_message(&ctx.http, |m| m.embed(|e| e.description(text).colour(colour)))
            .await,
    );
}

pub async fn reply_error(ctx: &Context, msg: &Message, why: MusicError) {
    match &why {
        MusicError::Resolve(ResolveError::Api(_) | ResolveError::Source(_)) => {
            warn!("track resolution failed: {}", why)
        }
        _ => info!("command rejected: {}", why),
    }
    say(ctx, msg.channel_id, why.user_message(), Colour::RED).await;
}

pub async fn react(ctx: &Context, msg: &Message, emoji: char) {
    if let Err(why) = msg.react(ctx, ReactionType::from(emoji)).await {
        warn!("Error adding reaction: {:?}", why);
    }
}

pub fn check_msg(result: SerenityResult<Message>) {
    if let Err(why) = result {
        warn!("Error sending message: {:?}", why);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_errors_read_as_validation_messages() {
        let empty = MusicError::from(QueueError::EmptyQueue);
        assert_eq!(empty.user_message(), "The queue is empty");

        let invalid = MusicError::from(QueueError::InvalidIndex {
            input: "0".to_string(),
            len: 3,
        });
        assert_eq!(invalid.user_message(), "Please send a valid track to remove");
    }

    #[test]
    fn missing_search_results_are_reported() {
        let err = MusicError::from(ResolveError::NoResults);
        assert_eq!(err.user_message(), "Search did not return any results");
    }
}
