//! Interaction dispatch.

use anyhow::Context as _;

use packrat_core::{
    Failure,
    action::{Action, ActionEvent, Inbound, parse_custom_id},
};

use tracing::instrument;

use twilight_model::application::interaction::{
    InteractionData, InteractionType, application_command::CommandData,
    message_component::MessageComponentInteractionData,
};

use crate::{admin::ADMIN_COMMANDS, commands::InteractionContext};

/// Handles an interaction.
#[instrument(skip(cx), fields(id = %cx.id, kind = ?cx.kind))]
pub async fn interaction(mut cx: InteractionContext) {
    let result = match cx.kind {
        InteractionType::ApplicationCommand => {
            let data = cx.interaction.data.take();
            let Some(InteractionData::ApplicationCommand(data)) = data else {
                tracing::error!("failed to get interaction payload");
                return;
            };

            slash_command(cx, *data).await
        }
        InteractionType::ApplicationCommandAutocomplete => {
            let data = cx.interaction.data.take();
            let Some(InteractionData::ApplicationCommand(data)) = data else {
                tracing::error!("failed to get interaction payload");
                return;
            };

            autocomplete(cx, *data).await
        }
        InteractionType::MessageComponent => {
            let data = cx.interaction.data.take();
            let Some(InteractionData::MessageComponent(data)) = data else {
                tracing::error!("failed to get interaction payload");
                return;
            };

            message_component(cx, *data).await
        }
        // ignore other payloads
        _ => Ok(()),
    };

    if let Err(err) = result {
        for err in err.chain() {
            tracing::error!("{:?}", err);
        }
    }
}

async fn slash_command(cx: InteractionContext, data: CommandData) -> anyhow::Result<()> {
    let name = data.name.as_str();

    if !cx.engine.is_active() && !ADMIN_COMMANDS.contains(&name) {
        return cx.reply_private(Failure::Inactive.to_string()).await;
    }

    match name {
        "pull" => crate::card::command_pull(cx, data).await?,
        "inventory" => crate::card::command_inventory(cx).await?,
        "profile" => crate::info::command_profile(cx, data).await?,
        "help" => crate::info::command_help(cx).await?,
        "sets" => crate::set::command_sets(cx).await?,
        "trade" => crate::trade::command_trade(cx, data).await?,
        "confirmtrade" => crate::trade::command_confirm(cx).await?,
        "canceltrade" => crate::trade::command_cancel(cx).await?,
        name if ADMIN_COMMANDS.contains(&name) => crate::admin::command(cx, data).await?,
        _ => tracing::warn!(?cx.interaction, "unknown interaction"),
    }

    Ok(())
}

async fn autocomplete(cx: InteractionContext, data: CommandData) -> anyhow::Result<()> {
    match data.name.as_str() {
        "pull" | "lock" | "unlock" => crate::set::autocomplete(&cx, data).await?,
        _ => tracing::warn!(?cx.interaction, "unknown interaction"),
    }

    Ok(())
}

async fn message_component(
    cx: InteractionContext,
    data: MessageComponentInteractionData,
) -> anyhow::Result<()> {
    let (action, key) = parse_custom_id(&data.custom_id).context("malformed custom id")?;
    let event = ActionEvent::from_button(action, key)
        .with_context(|| format!("{} is not a button action", action))?;
    let user = cx.user_id()?;

    let result = cx
        .engine
        .handle(Inbound::new(key, user, event), &cx.api)
        .await;

    match action {
        Action::TradeConfirm | Action::TradeCancel => match result {
            Ok(render) => crate::trade::respond_component(&cx, render).await,
            // buttons of a settled proposal, or of someone else's trade
            Err(failure) if failure.is_silent() => cx.acknowledge().await,
            // the proposal stays up, so tell the presser why nothing happened
            Err(failure) => cx.reply_private(failure.to_string()).await,
        },
        _ => crate::card::respond_component(&cx, result).await,
    }
}
