use std::sync::Arc;

use bones_dj::config::Config;
use bones_dj::queue_file::QueueFile;
use bones_dj::Sessions;
use serenity::{
    async_trait,
    client::Context,
    client::{Client, EventHandler},
    framework::{
        standard::{macros::hook, CommandResult},
        StandardFramework,
    },
    model::{channel::Message, gateway::Ready, voice::VoiceState},
    prelude::GatewayIntents,
};
use songbird::SerenityInit;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod playback;
mod util;
mod youtube;

use util::BotConfig;
use youtube::Resolver;

struct Handler;

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _: Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };
        let Some(left) = old.and_then(|state| state.channel_id) else {
            return;
        };
        if new.channel_id != Some(left) {
            util::leave_if_alone(&ctx, guild_id, left).await;
        }
    }
}

#[hook]
async fn after(_ctx: &Context, msg: &Message, command_name: &str, result: CommandResult) {
    if let Err(why) = result {
        warn!(command = command_name, author = %msg.author.id, "command failed: {:?}", why);
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(why) => {
            error!("Invalid configuration: {}", why);
            std::process::exit(1);
        }
    };
    if config.youtube_token.is_none() {
        info!("YOUTUBE_TOKEN not set, resolving tracks with youtube-dl");
    }

    let framework = StandardFramework::new()
        .configure(|c| c.prefix(config.prefix.clone()))
        .after(after)
        .group(&commands::GENERAL_GROUP);
    let intents = GatewayIntents::non_privileged()
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_VOICE_STATES;

    let sessions = Sessions::new(config.queue_file.clone().map(QueueFile::new));
    let resolver = Resolver::new(config.youtube_token.clone());

    let client = Client::builder(&config.discord_token, intents)
        .event_handler(Handler)
        .framework(framework)
        .register_songbird()
        .type_map_insert::<Sessions>(Arc::new(sessions))
        .type_map_insert::<Resolver>(Arc::new(resolver))
        .type_map_insert::<BotConfig>(config.clone())
        .await;
    let mut client = match client {
        Ok(client) => client,
        Err(why) => {
            error!("Error creating client: {:?}", why);
            std::process::exit(1);
        }
    };

    if let Err(why) = client.start().await {
        error!("An error occurred: {:?}", why);
    }
}
