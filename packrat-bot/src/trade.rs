//! Card trading between members.

use packrat_core::{
    action::{Action, ActionEvent, Inbound},
    engine::{Failure, Render},
    session::{SessionKey, TradeSession},
};

use tracing::instrument;

use twilight_model::{
    application::interaction::application_command::CommandData,
    channel::message::{
        AllowedMentions, Component,
        component::{ActionRow, Button, ButtonStyle},
    },
    http::interaction::InteractionResponseData,
    id::{Id, marker::UserMarker},
};

use twilight_util::builder::InteractionResponseDataBuilder;

use crate::{
    commands::{InteractionContext, InvalidCommandPayload, integer_option, user_option},
    user::{mention, resolve_target, to_discord_id},
};

/// Parsed options of `/trade`.
#[derive(Debug)]
struct TradeOptions {
    user: Id<UserMarker>,
    card: i64,
}

impl TryFrom<&CommandData> for TradeOptions {
    type Error = InvalidCommandPayload;

    fn try_from(value: &CommandData) -> Result<Self, Self::Error> {
        Ok(TradeOptions {
            user: user_option(value, "user").ok_or(InvalidCommandPayload)?,
            card: integer_option(value, "card").ok_or(InvalidCommandPayload)?,
        })
    }
}

/// Offers a card to another member.
#[instrument(skip(cx, data))]
pub async fn command_trade(cx: InteractionContext, data: CommandData) -> anyhow::Result<()> {
    let options = TradeOptions::try_from(&data)?;
    let user = cx.user_id()?;

    let target = resolve_target(data.resolved.as_ref(), options.user);
    let event = ActionEvent::TradePropose {
        target,
        card_index: options.card,
    };

    let result = cx
        .engine
        .handle(Inbound::new(cx.session_key(), user, event), &cx.api)
        .await;
    respond_command(&cx, result).await
}

/// Accepts the trade offered to the caller.
#[instrument(skip(cx))]
pub async fn command_confirm(cx: InteractionContext) -> anyhow::Result<()> {
    let user = cx.user_id()?;

    let result = cx
        .engine
        .handle(
            Inbound::new(cx.session_key(), user, ActionEvent::TradeConfirm { proposal: None }),
            &cx.api,
        )
        .await;
    respond_command(&cx, result).await
}

/// Cancels the caller's open trade.
#[instrument(skip(cx))]
pub async fn command_cancel(cx: InteractionContext) -> anyhow::Result<()> {
    let user = cx.user_id()?;

    let result = cx
        .engine
        .handle(
            Inbound::new(cx.session_key(), user, ActionEvent::TradeCancel { proposal: None }),
            &cx.api,
        )
        .await;
    respond_command(&cx, result).await
}

async fn respond_command(
    cx: &InteractionContext,
    result: Result<Render, Failure>,
) -> anyhow::Result<()> {
    match result {
        Ok(render) => match trade_message(&render) {
            Some(data) => cx.reply(data).await,
            None => {
                tracing::warn!(?render, "unexpected trade result");
                Ok(())
            }
        },
        Err(failure) => cx.reply_private(failure.to_string()).await,
    }
}

/// Answers a press of a trade button.
///
/// The proposal message loses its buttons once the trade settles.
pub async fn respond_component(cx: &InteractionContext, render: Render) -> anyhow::Result<()> {
    match trade_message(&render) {
        Some(data) => cx.update(data).await,
        None => {
            tracing::warn!(?render, "unexpected trade result");
            cx.acknowledge().await
        }
    }
}

/// Renders the message for a trade state.
///
/// A proposal's buttons carry the key it was made under, so they only ever
/// act on that trade.
fn trade_message(render: &Render) -> Option<InteractionResponseData> {
    let (content, components, notify) = match render {
        Render::TradeProposed { trade } => (
            format!(
                "{}, {} offers you **{}** ({}). Do you accept?",
                mention(trade.receiver),
                mention(trade.sender),
                trade.card.name,
                trade.card.rarity,
            ),
            vec![trade_buttons(trade.key)],
            Some(trade),
        ),
        Render::TradeCompleted { trade } => (
            format!(
                "Trade complete! **{}** moved from {} to {}.",
                trade.card.name,
                mention(trade.sender),
                mention(trade.receiver),
            ),
            Vec::new(),
            None,
        ),
        Render::TradeCancelled { trade, by } => (
            format!(
                "{} cancelled the trade of **{}**.",
                mention(*by),
                trade.card.name,
            ),
            Vec::new(),
            None,
        ),
        _ => return None,
    };

    Some(
        InteractionResponseDataBuilder::new()
            .content(content)
            .components(components)
            .allowed_mentions(allowed_mentions(notify))
            .build(),
    )
}

/// Only the receiver of a new proposal is pinged.
fn allowed_mentions(trade: Option<&TradeSession>) -> AllowedMentions {
    AllowedMentions {
        users: trade
            .map(|trade| vec![to_discord_id(trade.receiver)])
            .unwrap_or_default(),
        ..Default::default()
    }
}

fn trade_buttons(key: SessionKey) -> Component {
    let button = |action: Action, label: &str, style| {
        Component::Button(Button {
            custom_id: Some(action.custom_id(key)),
            disabled: false,
            emoji: None,
            label: Some(label.to_owned()),
            style,
            url: None,
            sku_id: None,
        })
    };

    Component::ActionRow(ActionRow {
        components: vec![
            button(Action::TradeConfirm, "Accept", ButtonStyle::Success),
            button(Action::TradeCancel, "Cancel", ButtonStyle::Danger),
        ],
    })
}
