//! Profiles and help.

use packrat_core::engine::Profile;
use packrat_model::{
    card::ImageQuality,
    collection::COLLECTION_CAPACITY,
};

use tracing::instrument;

use twilight_model::{
    application::{command::Command, interaction::application_command::CommandData},
    channel::message::Embed,
};

use twilight_util::builder::{
    InteractionResponseDataBuilder,
    embed::{EmbedBuilder, EmbedFieldBuilder, ImageSource},
};

use crate::{
    commands::{InteractionContext, commands, user_option},
    user::{mention, to_user_id},
};

/// Shows a collector's profile.
#[instrument(skip(cx, data))]
pub async fn command_profile(cx: InteractionContext, data: CommandData) -> anyhow::Result<()> {
    let user = match user_option(&data, "user") {
        Some(id) => to_user_id(id),
        None => cx.user_id()?,
    };

    match cx.engine.profile(user).await {
        Ok(profile) => {
            let embed = profile_embed(&profile, cx.config.general.embed_color);
            cx.reply(InteractionResponseDataBuilder::new().embeds([embed]).build())
                .await
        }
        Err(failure) => cx.reply_private(failure.to_string()).await,
    }
}

fn profile_embed(profile: &Profile, color: u32) -> Embed {
    let favorite = profile
        .favorite_card
        .as_ref()
        .map(|card| format!("{} ({})", card.name, card.rarity))
        .unwrap_or_else(|| "None".to_owned());

    let mut embed = EmbedBuilder::new()
        .title("Collector profile")
        .description(mention(profile.user_id))
        .color(color)
        .field(EmbedFieldBuilder::new("Packs pulled", profile.packs_pulled.to_string()).inline())
        .field(
            EmbedFieldBuilder::new(
                "Cards saved",
                format!("{}/{}", profile.cards_saved, COLLECTION_CAPACITY),
            )
            .inline(),
        )
        .field(
            EmbedFieldBuilder::new("Distinct cards", profile.distinct_cards.to_string()).inline(),
        )
        .field(EmbedFieldBuilder::new("Cards traded", profile.cards_traded.to_string()).inline())
        .field(EmbedFieldBuilder::new("Favorite card", favorite));

    if let Some(thumbnail) = profile
        .favorite_card
        .as_ref()
        .and_then(|card| card.image_url(ImageQuality::Low))
        .and_then(|url| ImageSource::url(url).ok())
    {
        embed = embed.thumbnail(thumbnail);
    }

    embed.build()
}

/// Lists the commands members can use.
#[instrument(skip(cx))]
pub async fn command_help(cx: InteractionContext) -> anyhow::Result<()> {
    let embed = EmbedBuilder::new()
        .title("Commands")
        .description(help_text(&commands()))
        .color(cx.config.general.embed_color)
        .build();

    cx.reply(InteractionResponseDataBuilder::new().embeds([embed]).build())
        .await
}

fn help_text(commands: &[Command]) -> String {
    commands
        .iter()
        .filter(|command| command.default_member_permissions.is_none())
        .map(|command| format!("`/{}`: {}", command.name, command.description))
        .collect::<Vec<_>>()
        .join("\n")
}
