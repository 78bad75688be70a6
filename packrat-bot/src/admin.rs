//! Server management commands.

use std::time::Duration;

use chrono::TimeDelta;

use packrat_core::engine::EngineStats;

use tracing::instrument;

use twilight_model::{
    application::interaction::application_command::CommandData, channel::message::Embed,
};

use twilight_util::builder::{
    InteractionResponseDataBuilder,
    embed::{EmbedBuilder, EmbedFieldBuilder},
};

use crate::commands::{InteractionContext, InvalidCommandPayload, string_option};

/// Commands that only server managers may use.
pub const ADMIN_COMMANDS: [&str; 5] = ["lock", "unlock", "turnon", "turnoff", "stats"];

/// Runs an admin command.
///
/// Discord hides these commands from members without the permission, but the
/// permission is checked again here since server owners can override it.
#[instrument(skip(cx, data), fields(command = %data.name))]
pub async fn command(cx: InteractionContext, data: CommandData) -> anyhow::Result<()> {
    if !cx.is_admin() {
        return cx
            .reply_private("You need the Manage Server permission to do that.")
            .await;
    }

    let message = match data.name.as_str() {
        "lock" => {
            let set = string_option(&data, "set-id").ok_or(InvalidCommandPayload)?;
            if cx.engine.lock_set(set) {
                format!("Set `{}` is now locked.", set)
            } else {
                format!("Set `{}` was already locked.", set)
            }
        }
        "unlock" => {
            let set = string_option(&data, "set-id").ok_or(InvalidCommandPayload)?;
            if cx.engine.unlock_set(set) {
                format!("Set `{}` is now unlocked.", set)
            } else {
                format!("Set `{}` wasn't locked.", set)
            }
        }
        "turnon" => {
            if cx.engine.set_active(true) {
                "The bot is already on.".to_owned()
            } else {
                "The bot is now on.".to_owned()
            }
        }
        "turnoff" => {
            if cx.engine.set_active(false) {
                "The bot is now off. Members can't use any command until `/turnon`.".to_owned()
            } else {
                "The bot is already off.".to_owned()
            }
        }
        "stats" => {
            let embed = stats_embed(
                &cx.engine.stats(),
                cx.api.last_latency(),
                cx.api.cached_cards(),
                cx.config.general.embed_color,
            );
            return cx
                .reply(InteractionResponseDataBuilder::new().embeds([embed]).build())
                .await;
        }
        other => {
            tracing::warn!(command = other, "unknown admin command");
            return Ok(());
        }
    };

    cx.reply_private(message).await
}

fn stats_embed(
    stats: &EngineStats,
    latency: Option<Duration>,
    cached_cards: usize,
    color: u32,
) -> Embed {
    let latency = latency
        .map(|latency| format!("{}ms", latency.as_millis()))
        .unwrap_or_else(|| "n/a".to_owned());
    let locked = if stats.locked_sets.is_empty() {
        "None".to_owned()
    } else {
        stats
            .locked_sets
            .iter()
            .map(|set| format!("`{}`", set))
            .collect::<Vec<_>>()
            .join(", ")
    };

    EmbedBuilder::new()
        .title("Bot statistics")
        .color(color)
        .field(EmbedFieldBuilder::new("Status", if stats.active { "On" } else { "Off" }).inline())
        .field(EmbedFieldBuilder::new("Uptime", format_uptime(stats.uptime)).inline())
        .field(EmbedFieldBuilder::new("Packs pulled", stats.pulls.to_string()).inline())
        .field(EmbedFieldBuilder::new("Open sessions", stats.pack_sessions.to_string()).inline())
        .field(EmbedFieldBuilder::new("Pending trades", stats.trades.to_string()).inline())
        .field(EmbedFieldBuilder::new("API latency", latency).inline())
        .field(EmbedFieldBuilder::new("Cached cards", cached_cards.to_string()).inline())
        .field(EmbedFieldBuilder::new("Locked sets", locked))
        .build()
}

fn format_uptime(uptime: TimeDelta) -> String {
    let minutes = uptime.num_minutes().max(0);
    let (days, hours, minutes) = (minutes / 1440, minutes / 60 % 24, minutes % 60);

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else {
        format!("{}h {}m", hours, minutes)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn uptime_is_readable() {
        assert_eq!(format_uptime(TimeDelta::seconds(59)), "0h 0m");
        assert_eq!(format_uptime(TimeDelta::minutes(125)), "2h 5m");
        assert_eq!(format_uptime(TimeDelta::hours(49)), "2d 1h 0m");
    }

    #[test]
    fn stats_list_locked_sets() {
        let stats = EngineStats {
            started_at: Utc::now(),
            uptime: TimeDelta::minutes(3),
            active: false,
            pulls: 12,
            pack_sessions: 4,
            trades: 1,
            locked_sets: vec!["base1".into(), "swsh3".into()],
        };

        let embed = stats_embed(&stats, None, 30, 0);
        let value = |name: &str| {
            embed
                .fields
                .iter()
                .find(|field| field.name == name)
                .map(|field| field.value.clone())
        };

        assert_eq!(value("Status").as_deref(), Some("Off"));
        assert_eq!(value("Packs pulled").as_deref(), Some("12"));
        assert_eq!(value("API latency").as_deref(), Some("n/a"));
        assert_eq!(value("Locked sets").as_deref(), Some("`base1`, `swsh3`"));
    }
}
