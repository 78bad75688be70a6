use packrat_core::engine::Render;

use tracing::instrument;

use crate::commands::InteractionContext;

use super::CardMessage;

/// Opens the caller's collection for browsing.
#[instrument(skip(cx))]
pub async fn command_inventory(cx: InteractionContext) -> anyhow::Result<()> {
    let user = cx.user_id()?;

    match cx.engine.open_collection(cx.session_key(), user).await {
        Ok(Render::Card(view)) => {
            let message = CardMessage::new(&view, cx.config.general.embed_color);
            cx.reply(message.into_response()).await
        }
        Ok(render) => {
            tracing::warn!(?render, "unexpected collection result");
            Ok(())
        }
        Err(failure) => cx.reply_private(failure.to_string()).await,
    }
}
