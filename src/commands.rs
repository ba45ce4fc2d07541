use bones_dj::pages::{Page, QueuePages};
use bones_dj::time::format_duration_ms;
use bones_dj::SessionState;
use serenity::{
    builder::CreateEmbed,
    client::Context,
    framework::standard::{
        macros::{command, group},
        Args, CommandResult,
    },
    model::prelude::{ChannelId, Message, ReactionType},
    prelude::Mentionable,
    utils::Colour,
};
use tracing::{debug, info, warn};

use crate::playback;
use crate::util::{self, check_msg, react, reply_error, say, MusicError};
use crate::youtube::{ResolveError, Resolved};

const PREV_PAGE: &str = "◀️";
const NEXT_PAGE: &str = "▶️";
const MAX_VOLUME: u32 = 200;

#[group]
#[commands(
    join,
    leave,
    play,
    playnext,
    queue,
    now_playing,
    shuffle,
    remove,
    skip,
    pause,
    resume,
    clear,
    stop,
    volume
)]
struct General;

#[command]
#[only_in(guilds)]
#[aliases("j", "connect")]
#[description = "Joins your voice channel"]
async fn join(ctx: &Context, msg: &Message, _args: Args) -> CommandResult {
    let (guild_id, channel) = match util::user_voice_channel(ctx, msg) {
        Ok(found) => found,
        Err(why) => {
            reply_error(ctx, msg, why).await;
            return Ok(());
        }
    };

    let previous = match songbird::get(ctx).await {
        Some(manager) => util::bot_voice_channel(&manager, guild_id).await,
        None => None,
    };
    if previous == Some(channel.into()) {
        say(
            ctx,
            msg.channel_id,
            format!("I am already in {}", channel.mention()),
            Colour::BLURPLE,
        )
        .await;
        return Ok(());
    }

    let data = match util::join_user_channel(ctx, msg).await {
        Ok(data) => data,
        Err(why) => {
            reply_error(ctx, msg, why).await;
            return Ok(());
        }
    };

    if data.session.state() == SessionState::Idle {
        data.driver(ctx).schedule_afk_leave();
    }
    say(
        ctx,
        msg.channel_id,
        join_text(previous.is_some(), channel),
        Colour::BLURPLE,
    )
    .await;
    Ok(())
}

fn join_text(moved: bool, channel: ChannelId) -> String {
    let verb = if moved { "Moved to" } else { "Joined" };
    format!("{} {}", verb, channel.mention())
}

#[command]
#[only_in(guilds)]
#[aliases("dc", "disconnect", "bye")]
#[description = "Leaves the voice channel and drops the queue"]
async fn leave(ctx: &Context, msg: &Message, _args: Args) -> CommandResult {
    let data = match util::get_guild_data(ctx, msg).await {
        Ok(data) => data,
        Err(why) => {
            reply_error(ctx, msg, why).await;
            return Ok(());
        }
    };

    playback::clear_announcement(&ctx.http, &data.session).await;
    data.sessions.remove(data.guild_id).await;
    if let Err(why) = data.manager.remove(data.guild_id).await {
        warn!(guild = %data.guild_id, "failed to leave voice channel: {:?}", why);
    }

    react(ctx, msg, '👋').await;
    Ok(())
}

#[command]
#[only_in(guilds)]
#[aliases("p", "sing")]
#[description = "Queues a search, video or playlist"]
async fn play(ctx: &Context, msg: &Message, args: Args) -> CommandResult {
    if let Err(why) = enqueue_from_args(ctx, msg, args.rest(), false).await {
        reply_error(ctx, msg, why).await;
    }
    Ok(())
}

#[command]
#[only_in(guilds)]
#[aliases("playtop", "pn")]
#[description = "Puts a track at the front of the queue"]
async fn playnext(ctx: &Context, msg: &Message, args: Args) -> CommandResult {
    if let Err(why) = enqueue_from_args(ctx, msg, args.rest(), true).await {
        reply_error(ctx, msg, why).await;
    }
    Ok(())
}

async fn enqueue_from_args(
    ctx: &Context,
    msg: &Message,
    query: &str,
    front: bool,
) -> Result<(), MusicError> {
    if query.trim().is_empty() {
        return Err(ResolveError::EmptyQuery.into());
    }

    let guild_id = msg.guild_id.ok_or(MusicError::NotInGuild)?;
    let manager = songbird::get(ctx).await.ok_or(MusicError::NoVoiceManager)?;
    let data = match manager.get(guild_id) {
        Some(_) => util::get_guild_data(ctx, msg).await?,
        None => util::join_user_channel(ctx, msg).await?,
    };
    data.session.set_text_channel(msg.channel_id);

    let resolver = util::resolver(ctx).await?;
    let resolved = resolver.resolve(query).await?;

    let session = &data.session;
    match resolved {
        Resolved::Playlist(_) if front => return Err(MusicError::PlaylistNotAllowed),
        Resolved::Playlist(tracks) => {
            let added = session.queue().enqueue_batch(tracks);
            info!(guild = %data.guild_id, added, "queued playlist");
            say(
                ctx,
                msg.channel_id,
                format!("Added {} tracks to the queue [{}]", added, msg.author.mention()),
                Colour::DARK_GREEN,
            )
            .await;
        }
        Resolved::Single(track) => {
            let announce = session.state() != SessionState::Idle || front;
            let text = format!(
                "Queued [{}]({}) [{}]",
                track.title,
                track.uri,
                msg.author.mention()
            );
            debug!(guild = %data.guild_id, track = %track.id, front, "queued track");
            if front {
                session.queue().enqueue_front(track);
            } else {
                session.queue().enqueue(track);
            }
            if announce {
                say(ctx, msg.channel_id, text, Colour::DARK_GREEN).await;
            }
        }
    }

    data.driver(ctx).start_if_idle().await;
    Ok(())
}

#[command]
#[only_in(guilds)]
#[aliases("q", "que", "playlist")]
#[description = "Shows the queue"]
async fn queue(ctx: &Context, msg: &Message, _args: Args) -> CommandResult {
    let data = match util::get_guild_data(ctx, msg).await {
        Ok(data) => data,
        Err(why) => {
            reply_error(ctx, msg, why).await;
            return Ok(());
        }
    };

    // Work from a copy; playback keeps consuming the live queue meanwhile.
    let snapshot = data.session.queue().snapshot();
    let pages = QueuePages::from_snapshot(&snapshot);
    let first = match pages.page(1) {
        Some(page) => page,
        None => {
            say(ctx, msg.channel_id, "The queue is empty", Colour::BLUE).await;
            return Ok(());
        }
    };

    let mut cursor = pages.cursor();
    let sent = msg
        .channel_id
        .send_message(&ctx.http, |m| {
            if pages.len() > 1 {
                m.content(cursor.label());
            }
            m.set_embed(queue_embed(&pages, first))
        })
        .await;
    let mut message = match sent {
        Ok(message) => message,
        Err(why) => {
            warn!("Error sending message: {:?}", why);
            return Ok(());
        }
    };

    if pages.len() == 1 {
        return Ok(());
    }

    for emoji in [PREV_PAGE, NEXT_PAGE] {
        if let Err(why) = message.react(ctx, ReactionType::Unicode(emoji.to_string())).await {
            warn!("Error adding reaction: {:?}", why);
        }
    }

    let bot_id = ctx.cache.current_user_id();
    loop {
        let action = message.await_reaction(ctx).timeout(data.config.queue_timeout).await;
        let Some(action) = action else {
            break;
        };
        let reaction = action.as_inner_ref();
        if reaction.user_id == Some(bot_id) {
            continue;
        }

        let moved = match &reaction.emoji {
            ReactionType::Unicode(emoji) if emoji == NEXT_PAGE => cursor.next(),
            ReactionType::Unicode(emoji) if emoji == PREV_PAGE => cursor.prev(),
            _ => false,
        };
        if moved {
            if let Some(page) = pages.page(cursor.current()) {
                let embed = queue_embed(&pages, page);
                if let Err(why) = message
                    .edit(ctx, |m| m.content(cursor.label()).set_embed(embed))
                    .await
                {
                    warn!("Error editing queue page: {:?}", why);
                }
            }
        }
        if let Err(why) = reaction.delete(ctx).await {
            debug!("could not remove page reaction: {:?}", why);
        }
    }

    if let Err(why) = message.delete(ctx).await {
        debug!("could not delete queue message: {:?}", why);
    }
    Ok(())
}

fn queue_embed(pages: &QueuePages, page: &Page) -> CreateEmbed {
    let mut embed = CreateEmbed::default();
    embed
        .title(pages.header())
        .field("Tracks:", page.body(), false)
        .footer(|f| f.text(pages.footer()))
        .colour(Colour::BLURPLE);
    embed
}

#[command]
#[only_in(guilds)]
#[aliases("np")]
#[description = "Shows what's currently playing"]
async fn now_playing(ctx: &Context, msg: &Message, _args: Args) -> CommandResult {
    let data = match util::get_guild_data(ctx, msg).await {
        Ok(data) => data,
        Err(why) => {
            reply_error(ctx, msg, why).await;
            return Ok(());
        }
    };

    let track = match data.session.current() {
        Some(track) => track,
        None => {
            reply_error(ctx, msg, MusicError::NotPlaying).await;
            return Ok(());
        }
    };

    let elapsed = match data.session.handle() {
        Some(handle) => match handle.get_info().await {
            Ok(state) => format!("{} / ", format_duration_ms(state.position.as_millis() as u64)),
            Err(_) => String::new(),
        },
        None => String::new(),
    };

    check_msg(
        msg.channel_id
            .send_message(&ctx.http, |m| {
                m.embed(|e| {
                    e.title("Now Playing")
                        .description(format!(
                            "[{}]({}) - {}{}",
                            track.title,
                            track.uri,
                            elapsed,
                            format_duration_ms(track.duration_ms)
                        ))
                        .colour(Colour::DARK_GREEN)
                })
            })
            .await,
    );
    Ok(())
}

#[command]
#[only_in(guilds)]
#[aliases("shuf")]
#[description = "Shuffles the queue"]
async fn shuffle(ctx: &Context, msg: &Message, _args: Args) -> CommandResult {
    let data = match util::get_guild_data(ctx, msg).await {
        Ok(data) => data,
        Err(why) => {
            reply_error(ctx, msg, why).await;
            return Ok(());
        }
    };

    let queue = data.session.queue();
    if queue.is_empty() {
        say(ctx, msg.channel_id, "The queue is empty", Colour::RED).await;
        return Ok(());
    }

    queue.shuffle();
    data.session.persist().await;
    react(ctx, msg, '👍').await;
    Ok(())
}

#[command]
#[only_in(guilds)]
#[aliases("rm")]
#[description = "Removes a track from the queue by its position"]
async fn remove(ctx: &Context, msg: &Message, args: Args) -> CommandResult {
    let data = match util::get_guild_data(ctx, msg).await {
        Ok(data) => data,
        Err(why) => {
            reply_error(ctx, msg, why).await;
            return Ok(());
        }
    };

    let queue = data.session.queue();
    if queue.is_empty() {
        say(ctx, msg.channel_id, "The queue is empty", Colour::RED).await;
        return Ok(());
    }

    // Bounds check and removal happen under one lock inside the queue.
    let track = match queue.remove_at_input(args.rest()) {
        Ok(track) => track,
        Err(why) => {
            reply_error(ctx, msg, why.into()).await;
            return Ok(());
        }
    };

    debug!(guild = %data.guild_id, track = %track.id, "removed track");
    data.session.persist().await;
    say(
        ctx,
        msg.channel_id,
        format!("Removed [{}]({})", track.title, track.uri),
        Colour::DARK_GREEN,
    )
    .await;
    Ok(())
}

#[command]
#[only_in(guilds)]
#[aliases("s", "next")]
#[description = "Skips the current track"]
async fn skip(ctx: &Context, msg: &Message, _args: Args) -> CommandResult {
    let data = match util::get_guild_data(ctx, msg).await {
        Ok(data) => data,
        Err(why) => {
            reply_error(ctx, msg, why).await;
            return Ok(());
        }
    };

    let handle = match data.session.handle() {
        Some(handle) => handle,
        None => {
            reply_error(ctx, msg, MusicError::NotPlaying).await;
            return Ok(());
        }
    };

    // Ending the track hands control to the driver, which plays the next one.
    if let Err(why) = handle.stop() {
        debug!(guild = %data.guild_id, "track already finished: {:?}", why);
    }
    react(ctx, msg, '👍').await;
    Ok(())
}

#[command]
#[only_in(guilds)]
#[description = "Pauses the current track"]
async fn pause(ctx: &Context, msg: &Message, _args: Args) -> CommandResult {
    let data = match util::get_guild_data(ctx, msg).await {
        Ok(data) => data,
        Err(why) => {
            reply_error(ctx, msg, why).await;
            return Ok(());
        }
    };

    let handle = match data.session.handle() {
        Some(handle) if data.session.pause() => handle,
        _ => {
            reply_error(ctx, msg, MusicError::NotPlaying).await;
            return Ok(());
        }
    };

    if let Err(why) = handle.pause() {
        warn!(guild = %data.guild_id, "failed to pause: {:?}", why);
        data.session.resume();
        return Ok(());
    }
    react(ctx, msg, '👍').await;
    Ok(())
}

#[command]
#[only_in(guilds)]
#[aliases("unpause")]
#[description = "Resumes a paused track"]
async fn resume(ctx: &Context, msg: &Message, _args: Args) -> CommandResult {
    let data = match util::get_guild_data(ctx, msg).await {
        Ok(data) => data,
        Err(why) => {
            reply_error(ctx, msg, why).await;
            return Ok(());
        }
    };

    let handle = match data.session.handle() {
        Some(handle) if data.session.resume() => handle,
        _ => {
            say(ctx, msg.channel_id, "I'm not paused", Colour::RED).await;
            return Ok(());
        }
    };

    if let Err(why) = handle.play() {
        warn!(guild = %data.guild_id, "failed to resume: {:?}", why);
        data.session.pause();
        return Ok(());
    }
    react(ctx, msg, '👍').await;
    Ok(())
}

#[command]
#[only_in(guilds)]
#[aliases("clr", "cl", "cr")]
#[description = "Clears the queue"]
async fn clear(ctx: &Context, msg: &Message, _args: Args) -> CommandResult {
    let data = match util::get_guild_data(ctx, msg).await {
        Ok(data) => data,
        Err(why) => {
            reply_error(ctx, msg, why).await;
            return Ok(());
        }
    };

    let queue = data.session.queue();
    if queue.is_empty() {
        say(ctx, msg.channel_id, "Queue is empty", Colour::BLUE).await;
        return Ok(());
    }

    queue.clear();
    data.session.persist().await;
    say(ctx, msg.channel_id, "Queue is cleared", Colour::DARK_GREEN).await;
    Ok(())
}

#[command]
#[only_in(guilds)]
#[description = "Stops playback and resets the queue"]
async fn stop(ctx: &Context, msg: &Message, _args: Args) -> CommandResult {
    let data = match util::get_guild_data(ctx, msg).await {
        Ok(data) => data,
        Err(why) => {
            reply_error(ctx, msg, why).await;
            return Ok(());
        }
    };

    if data.session.state() == SessionState::Idle {
        reply_error(ctx, msg, MusicError::NotPlaying).await;
        return Ok(());
    }

    if let Some(handle) = data.session.reset() {
        if let Err(why) = handle.stop() {
            debug!(guild = %data.guild_id, "track already finished: {:?}", why);
        }
    }
    data.session.persist().await;
    playback::clear_announcement(&ctx.http, &data.session).await;
    data.driver(ctx).schedule_afk_leave();

    react(ctx, msg, '🛑').await;
    Ok(())
}

#[command]
#[only_in(guilds)]
#[aliases("vol")]
#[description = "Sets the playback volume, 0 to 200 percent"]
async fn volume(ctx: &Context, msg: &Message, mut args: Args) -> CommandResult {
    let percent = match args.single::<u32>() {
        Ok(percent) if percent <= MAX_VOLUME => percent,
        _ => {
            say(
                ctx,
                msg.channel_id,
                format!("You need to provide a volume between 0 and {}", MAX_VOLUME),
                Colour::RED,
            )
            .await;
            return Ok(());
        }
    };

    let data = match util::get_guild_data(ctx, msg).await {
        Ok(data) => data,
        Err(why) => {
            reply_error(ctx, msg, why).await;
            return Ok(());
        }
    };

    // Kept on the session so every following track starts at this volume.
    if let Some(handle) = data.session.set_volume(percent as f32 / 100.0) {
        if let Err(why) = handle.set_volume(percent as f32 / 100.0) {
            warn!(guild = %data.guild_id, "failed to set volume: {:?}", why);
            return Ok(());
        }
    }
    info!(guild = %data.guild_id, percent, "volume changed");
    react(ctx, msg, '👍').await;
    Ok(())
}
