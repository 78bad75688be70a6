//! Inbound actions.
//!
//! Every user interaction the engine understands is an [`Action`]. Buttons
//! carry their action and session in a custom id of the form `tag:key`.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use derive_more::{Display, Error};

use packrat_model::UserId;

use crate::session::SessionKey;

/// An action tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Pull,
    Next,
    Previous,
    Save,
    Delete,
    Favorite,
    TradePropose,
    TradeConfirm,
    TradeCancel,
}

impl Action {
    /// Every action, in a stable order.
    pub const ALL: [Action; 9] = [
        Action::Pull,
        Action::Next,
        Action::Previous,
        Action::Save,
        Action::Delete,
        Action::Favorite,
        Action::TradePropose,
        Action::TradeConfirm,
        Action::TradeCancel,
    ];

    /// The wire tag of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Pull => "pull",
            Action::Next => "next",
            Action::Previous => "previous",
            Action::Save => "save",
            Action::Delete => "delete",
            Action::Favorite => "favorite",
            Action::TradePropose => "trade-propose",
            Action::TradeConfirm => "trade-confirm",
            Action::TradeCancel => "trade-cancel",
        }
    }

    /// Checks that every tag parses back into its own action.
    ///
    /// Run once at startup, so a tag typo fails loudly instead of turning
    /// into dead buttons.
    pub fn verify_tags() -> Result<(), UnknownAction> {
        for action in Action::ALL {
            match action.as_str().parse::<Action>() {
                Ok(parsed) if parsed == action => (),
                _ => return Err(UnknownAction),
            }
        }

        Ok(())
    }

    /// Builds the custom id of a button acting on a session.
    pub fn custom_id(&self, key: SessionKey) -> String {
        format!("{}:{}", self.as_str(), key)
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action tag that names no action.
#[derive(Clone, Copy, Debug, Display, Error, PartialEq, Eq)]
#[display("unknown action")]
pub struct UnknownAction;

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or(UnknownAction)
    }
}

/// A malformed button custom id.
#[derive(Clone, Copy, Debug, Display, Error, PartialEq, Eq)]
pub enum CustomIdError {
    #[display("custom id has no session key")]
    MissingKey,
    #[display("custom id session key is not a number")]
    InvalidKey,
    #[display("{_0}")]
    Action(UnknownAction),
}

/// Parses a `tag:key` button custom id.
pub fn parse_custom_id(custom_id: &str) -> Result<(Action, SessionKey), CustomIdError> {
    let (tag, key) = custom_id
        .split_once(':')
        .ok_or(CustomIdError::MissingKey)?;

    let action = tag.parse::<Action>().map_err(CustomIdError::Action)?;
    let key = key
        .parse::<u64>()
        .map_err(|_| CustomIdError::InvalidKey)?;

    Ok((action, SessionKey::new(key)))
}

/// Whether a trade target is someone the proposer can trade with.
///
/// Group membership is known only to the presentation layer, so it resolves
/// this before handing the event to the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Membership {
    Member,
    Bot,
    Absent,
}

/// The other side of a proposed trade.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TradeTarget {
    pub user: UserId,
    pub membership: Membership,
}

/// An action with its payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionEvent {
    /// Pull a pack from a set.
    Pull { set: String, pool_size: usize },
    Next,
    Previous,
    Save,
    Delete,
    Favorite,
    /// Offer a card to another user. `card_index` is one-based, as typed by
    /// the user.
    TradePropose { target: TradeTarget, card_index: i64 },
    /// Accept the pending trade. Pressed from a proposal's buttons,
    /// `proposal` is that proposal's key, and only that trade is accepted.
    TradeConfirm { proposal: Option<SessionKey> },
    /// Cancel the pending trade. `proposal` works as for `TradeConfirm`.
    TradeCancel { proposal: Option<SessionKey> },
}

impl ActionEvent {
    /// The tag of the event.
    pub fn action(&self) -> Action {
        match self {
            ActionEvent::Pull { .. } => Action::Pull,
            ActionEvent::Next => Action::Next,
            ActionEvent::Previous => Action::Previous,
            ActionEvent::Save => Action::Save,
            ActionEvent::Delete => Action::Delete,
            ActionEvent::Favorite => Action::Favorite,
            ActionEvent::TradePropose { .. } => Action::TradePropose,
            ActionEvent::TradeConfirm { .. } => Action::TradeConfirm,
            ActionEvent::TradeCancel { .. } => Action::TradeCancel,
        }
    }

    /// The event a press of a button with the given key stands for.
    ///
    /// Returns `None` for actions that need a payload no button carries.
    pub fn from_button(action: Action, key: SessionKey) -> Option<ActionEvent> {
        let proposal = Some(key);

        match action {
            Action::Next => Some(ActionEvent::Next),
            Action::Previous => Some(ActionEvent::Previous),
            Action::Save => Some(ActionEvent::Save),
            Action::Delete => Some(ActionEvent::Delete),
            Action::Favorite => Some(ActionEvent::Favorite),
            Action::TradeConfirm => Some(ActionEvent::TradeConfirm { proposal }),
            Action::TradeCancel => Some(ActionEvent::TradeCancel { proposal }),
            Action::Pull | Action::TradePropose => None,
        }
    }
}

/// An event delivered to the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Inbound {
    /// The session the event acts on. For pulls and trade proposals, this
    /// is the key a newly opened session gets.
    pub key: SessionKey,
    /// The acting user.
    pub user: UserId,
    pub event: ActionEvent,
}

impl Inbound {
    pub fn new(key: SessionKey, user: UserId, event: ActionEvent) -> Inbound {
        Inbound { key, user, event }
    }
}
