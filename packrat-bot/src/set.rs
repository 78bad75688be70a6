//! Set listing and lookup.

use packrat_model::response::card::SetBrief;

use tracing::instrument;

use twilight_model::{
    application::{
        command::{CommandOptionChoice, CommandOptionChoiceValue, CommandOptionType},
        interaction::application_command::{CommandData, CommandOptionValue},
    },
    http::interaction::InteractionResponseType,
};

use twilight_util::builder::{InteractionResponseDataBuilder, embed::EmbedBuilder};

use crate::commands::{InteractionContext, InvalidCommandPayload};

/// The limit for autocomplete entries.
pub const AUTOCOMPLETE_ENTRY_LEN: usize = 25;

/// How many sets `/sets` lists.
pub const LISTED_SETS: usize = 25;

/// Discord refuses choice names longer than this.
const CHOICE_NAME_LEN: usize = 100;

/// Autocompletes a `set-id` option.
pub async fn autocomplete(cx: &InteractionContext, data: CommandData) -> anyhow::Result<()> {
    let query = data
        .options
        .iter()
        .find(|option| option.name == "set-id")
        .and_then(|option| match option.value {
            CommandOptionValue::Focused(ref value, CommandOptionType::String) => Some(value),
            _ => None,
        })
        .ok_or(InvalidCommandPayload)?;

    let choices = search(cx.api.sets().await?, query)
        .map(|set| CommandOptionChoice {
            name: choice_name(set),
            name_localizations: None,
            value: CommandOptionChoiceValue::String(set.id.clone()),
        })
        .collect::<Vec<_>>();

    cx.respond(
        InteractionResponseType::ApplicationCommandAutocompleteResult,
        Some(InteractionResponseDataBuilder::new().choices(choices).build()),
    )
    .await
}

/// Finds sets whose id or name contain a query, ignoring case.
fn search<'a>(sets: &'a [SetBrief], query: &str) -> impl Iterator<Item = &'a SetBrief> {
    let query = query.trim().to_lowercase();

    sets.iter()
        .filter(move |set| {
            set.id.to_lowercase().contains(&query) || set.name.to_lowercase().contains(&query)
        })
        .take(AUTOCOMPLETE_ENTRY_LEN)
}

fn choice_name(set: &SetBrief) -> String {
    let name = format!("{} ({})", set.name, set.id);
    if name.chars().count() > CHOICE_NAME_LEN {
        name.chars().take(CHOICE_NAME_LEN).collect()
    } else {
        name
    }
}

/// Lists the sets cards can be pulled from.
#[instrument(skip(cx))]
pub async fn command_sets(cx: InteractionContext) -> anyhow::Result<()> {
    let sets = match cx.api.sets().await {
        Ok(sets) => sets,
        Err(err) => {
            tracing::error!(%err, "failed to list sets");
            return cx
                .reply_private("Couldn't reach the card database, try again later.")
                .await;
        }
    };

    let description = sets
        .iter()
        .take(LISTED_SETS)
        .map(|set| {
            if cx.engine.is_locked(&set.id) {
                format!("\u{1F512} `{}`: {}", set.id, set.name)
            } else {
                format!("`{}`: {}", set.id, set.name)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    let embed = EmbedBuilder::new()
        .title("Available sets")
        .description(description)
        .color(cx.config.general.embed_color)
        .build();

    cx.reply(InteractionResponseDataBuilder::new().embeds([embed]).build())
        .await
}
