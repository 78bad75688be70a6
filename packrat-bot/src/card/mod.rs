//! Card presentation.

mod inventory;
mod pull;

pub use inventory::command_inventory;
pub use pull::command_pull;

use packrat_core::{
    action::Action,
    engine::{CardView, Failure, Render},
    session::SessionKind,
};
use packrat_model::card::{Card, ImageQuality};

use twilight_model::{
    channel::message::{
        Component, Embed, EmojiReactionType,
        component::{ActionRow, Button, ButtonStyle},
    },
    http::interaction::InteractionResponseData,
};

use twilight_util::builder::{
    InteractionResponseDataBuilder,
    embed::{EmbedBuilder, EmbedFooterBuilder, ImageSource},
};

use crate::commands::InteractionContext;

/// A rendered card with its controls.
#[derive(Clone, Debug)]
pub struct CardMessage {
    pub content: Option<String>,
    pub embed: Embed,
    pub components: Vec<Component>,
}

impl CardMessage {
    /// Renders a card view.
    pub fn new(view: &CardView, color: u32) -> CardMessage {
        let footer = match view.kind {
            SessionKind::Pull => format!("Card {} of {}", view.position(), view.total),
            SessionKind::Collection => {
                format!("Card {} of {} in your collection", view.position(), view.total)
            }
        };

        let mut embed = EmbedBuilder::new()
            .title(title(view))
            .description(describe(&view.card))
            .color(color)
            .footer(EmbedFooterBuilder::new(footer));

        if let Some(image) = view
            .card
            .image_url(ImageQuality::High)
            .and_then(|url| ImageSource::url(url).ok())
        {
            embed = embed.image(image);
        }

        CardMessage {
            content: view.notice.as_ref().map(|notice| notice.to_string()),
            embed: embed.build(),
            components: vec![controls(view)],
        }
    }

    /// Converts the message to a response payload.
    pub fn into_response(self) -> InteractionResponseData {
        let mut data = InteractionResponseDataBuilder::new()
            .embeds([self.embed])
            .components(self.components);
        // clears the notice of the message being replaced
        data = data.content(self.content.unwrap_or_default());
        data.build()
    }
}

fn title(view: &CardView) -> String {
    if view.favorite {
        format!("\u{2B50} {}", view.card.name)
    } else {
        view.card.name.clone()
    }
}

/// Describes a card's rarity and set.
pub fn describe(card: &Card) -> String {
    match card.set_id {
        Some(ref set_id) => format!("**Rarity:** {}\n**Set:** `{}`", card.rarity, set_id),
        None => format!("**Rarity:** {}", card.rarity),
    }
}

fn controls(view: &CardView) -> Component {
    let mut components = vec![
        button(view, Action::Previous, "Previous", ButtonStyle::Secondary, false),
        button(view, Action::Next, "Next", ButtonStyle::Secondary, false),
    ];

    match view.kind {
        SessionKind::Pull => {
            components.push(button(view, Action::Save, "Save", ButtonStyle::Success, view.saved));
        }
        SessionKind::Collection => {
            components.push(button(
                view,
                Action::Favorite,
                "Favorite",
                ButtonStyle::Primary,
                view.favorite,
            ));
            components.push(button(view, Action::Delete, "Delete", ButtonStyle::Danger, false));
        }
    }

    Component::ActionRow(ActionRow { components })
}

fn button(
    view: &CardView,
    action: Action,
    label: &str,
    style: ButtonStyle,
    disabled: bool,
) -> Component {
    let emoji = match action {
        Action::Save if disabled => Some("\u{2705}"),
        Action::Favorite if disabled => Some("\u{2B50}"),
        _ => None,
    };

    Component::Button(Button {
        custom_id: Some(action.custom_id(view.key)),
        disabled,
        emoji: emoji.map(|name| EmojiReactionType::Unicode {
            name: name.to_owned(),
        }),
        label: Some(label.to_owned()),
        style,
        url: None,
        sku_id: None,
    })
}

/// Answers a button press on a card message.
pub async fn respond_component(
    cx: &InteractionContext,
    result: Result<Render, Failure>,
) -> anyhow::Result<()> {
    match result {
        Ok(Render::Card(view)) => {
            let message = CardMessage::new(&view, cx.config.general.embed_color);
            cx.update(message.into_response()).await
        }
        Ok(Render::Closed { notice }) => {
            cx.update(
                InteractionResponseDataBuilder::new()
                    .content(notice.to_string())
                    .embeds([])
                    .components([])
                    .build(),
            )
            .await
        }
        Ok(render) => crate::trade::respond_component(cx, render).await,
        Err(failure) if failure.is_silent() => cx.acknowledge().await,
        Err(failure) => cx.reply_private(failure.to_string()).await,
    }
}
