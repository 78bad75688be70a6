//! User interactions.

use std::num::NonZeroU64;

use packrat_core::action::{Membership, TradeTarget};
use packrat_model::UserId;

use twilight_model::{
    application::interaction::InteractionDataResolved,
    id::{Id, marker::UserMarker},
};

/// Converts a Discord user id.
pub fn to_user_id(id: Id<UserMarker>) -> UserId {
    UserId::from(id.into_nonzero())
}

/// Converts back to a Discord user id.
pub fn to_discord_id(user_id: UserId) -> Id<UserMarker> {
    Id::from(NonZeroU64::from(user_id))
}

/// Checks whether a user named in a command can be traded with.
///
/// Discord resolves the member alongside the command, so a user with no
/// resolved member is not in the guild.
pub fn resolve_target(resolved: Option<&InteractionDataResolved>, id: Id<UserMarker>) -> TradeTarget {
    let membership = match resolved {
        Some(resolved) if resolved.users.get(&id).is_some_and(|user| user.bot) => Membership::Bot,
        Some(resolved) if resolved.members.contains_key(&id) => Membership::Member,
        _ => Membership::Absent,
    };

    TradeTarget {
        user: to_user_id(id),
        membership,
    }
}

/// Formats a mention of a user.
pub fn mention(user_id: UserId) -> String {
    format!("<@{}>", user_id)
}
