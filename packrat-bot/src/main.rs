use std::{io, path::PathBuf, sync::Arc};

use anyhow::Error;

use clap::Parser as _;

use packrat_bot::{
    cli::{Args, run_command},
    commands::InteractionContext,
    config::{Config, DEFAULT_CONFIG_PATH},
    dispatch,
    http::Client as ApiClient,
    user::to_user_id,
};

use packrat_core::{Engine, action::Action, store::FileStore};

use twilight_gateway::{
    ConfigBuilder, Event, EventTypeFlags, Intents, Shard, ShardId, StreamExt as _,
};
use twilight_http::Client;
use twilight_model::gateway::payload::incoming::GuildCreate;

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt::fmt()
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    // load config
    let config_path = args
        .config
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = Arc::new(Config::load(config_path)?);

    // every button id must route back to its action
    Action::verify_tags()?;

    let store = FileStore::open(&config.storage.directory).await?;

    // Execute command if it exists
    if let Some(command) = args.command {
        return run_command(&command, &store, io::stdout()).await;
    }

    if config.general.discord_token.is_empty() {
        return Err(Error::msg(
            "missing discord token, set DISCORD_TOKEN or general.discord_token",
        ));
    }

    let api = ApiClient::new(&config.api)?;
    let engine = Arc::new(Engine::new(store, config.engine.clone()));

    tracing::info!(
        collections = %config.storage.directory.display(),
        endpoint = %config.api.endpoint,
        "engine ready"
    );

    // setup discord connection
    let token = config.general.discord_token.clone();
    let intents = Intents::GUILDS | Intents::GUILD_MEMBERS;

    let shard_config = ConfigBuilder::new(token.clone(), intents).build();

    // setup client
    let client = Arc::new(Client::new(token));
    let application = client.current_user_application().await?.model().await?;

    if let Some(owner) = application.owner {
        tracing::info!("application id: {}, owner: {}", application.id, owner.name);
    } else {
        tracing::info!("application id: {}", application.id);
    }

    let interaction = client.interaction(application.id);

    let mut shard = Shard::with_config(ShardId::ONE, shard_config);

    while let Some(item) = shard.next_event(EventTypeFlags::all()).await {
        let event = match item {
            Ok(event) => event,
            Err(source) => {
                tracing::warn!(?source, "error receiving event");
                continue;
            }
        };

        tracing::trace!(?event, "received event");

        match event {
            Event::Ready(ready) => {
                tracing::info!(
                    "serving bot as {}#{} in {} guilds",
                    ready.user.name,
                    ready.user.discriminator(),
                    ready.guilds.len()
                );

                // create commands
                interaction
                    .set_global_commands(&packrat_bot::commands::commands())
                    .await?;
            }
            Event::GuildCreate(guild) => {
                if let GuildCreate::Available(guild) = guild.as_ref() {
                    tracing::info!("guild: {}", guild.name);
                }
            }
            Event::InteractionCreate(interaction) => {
                let interaction = interaction.0;

                // setup command context
                let cx = InteractionContext {
                    interaction,
                    client: client.clone(),
                    api: api.clone(),
                    engine: engine.clone(),
                    config: config.clone(),
                    application_id: application.id,
                };

                tokio::spawn(dispatch::interaction(cx));
            }
            Event::MemberRemove(member) => {
                let engine = engine.clone();
                let user = to_user_id(member.user.id);

                tokio::spawn(async move {
                    if let Err(err) = engine.member_left(user).await {
                        tracing::error!(%user, %err, "failed to forget departed member");
                    }
                });
            }
            _ => (),
        }
    }

    Ok(())
}
