use packrat_core::action::{ActionEvent, Inbound};
use packrat_core::engine::Render;

use tracing::instrument;

use twilight_model::application::interaction::application_command::CommandData;

use crate::commands::{InteractionContext, InvalidCommandPayload, string_option};

use super::CardMessage;

/// Parsed options of `/pull`.
#[derive(Debug)]
struct PullOptions {
    set: String,
}

impl TryFrom<&CommandData> for PullOptions {
    type Error = InvalidCommandPayload;

    fn try_from(value: &CommandData) -> Result<Self, Self::Error> {
        let set = string_option(value, "set-id").ok_or(InvalidCommandPayload)?;

        Ok(PullOptions {
            set: set.trim().to_owned(),
        })
    }
}

/// Pulls a pack and shows its first card.
///
/// Fetching a pool can take a few seconds, so the response is deferred first.
#[instrument(skip(cx, data))]
pub async fn command_pull(cx: InteractionContext, data: CommandData) -> anyhow::Result<()> {
    let options = PullOptions::try_from(&data)?;
    let user = cx.user_id()?;

    cx.defer().await?;

    let inbound = Inbound::new(
        cx.session_key(),
        user,
        ActionEvent::Pull {
            set: options.set,
            pool_size: cx.config.engine.pool_size,
        },
    );

    match cx.engine.handle(inbound, &cx.api).await {
        Ok(Render::Card(view)) => {
            let message = CardMessage::new(&view, cx.config.general.embed_color);
            cx.edit_deferred(
                message.content.as_deref(),
                &[message.embed],
                &message.components,
            )
            .await
        }
        Ok(render) => {
            tracing::warn!(?render, "unexpected pull result");
            Ok(())
        }
        Err(failure) => {
            cx.edit_deferred(Some(&failure.to_string()), &[], &[])
                .await
        }
    }
}
