//! Card and set responses.

use serde::{Deserialize, Serialize};

use crate::card::{Card, Rarity};

/// A response from `GET /sets/{set.id}`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SetResponse {
    /// The set's id.
    pub id: String,
    /// The set's display name.
    #[serde(default)]
    pub name: String,
    /// Every card in the set, without rarity information.
    #[serde(default)]
    pub cards: Vec<CardBrief>,
}

/// A card as listed in a set.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CardBrief {
    /// The card's global id, used to fetch details.
    pub id: String,
    /// The card's name.
    #[serde(default)]
    pub name: String,
}

/// A response from `GET /cards/{card.id}`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CardResponse {
    pub id: String,
    pub name: String,
    /// Rarity label; some promo cards omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rarity: Option<String>,
    /// Image prefix, without quality suffix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<SetBrief>,
}

/// The set a card belongs to.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SetBrief {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl From<CardResponse> for Card {
    fn from(value: CardResponse) -> Self {
        Card {
            name: value.name,
            rarity: value
                .rarity
                .filter(|rarity| !rarity.trim().is_empty())
                .map(Rarity::from)
                .unwrap_or(Rarity::Common),
            image: value.image.unwrap_or_default(),
            set_id: value.set.map(|set| set.id),
        }
    }
}
