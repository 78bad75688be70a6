//! Persisted user collections.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
    UserId,
    card::{Card, CardKey},
};

/// How many cards a collection can hold.
pub const COLLECTION_CAPACITY: usize = 10;

/// A user's persisted card collection.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct UserCollection {
    /// The owner of the collection.
    pub user_id: UserId,
    /// The owned cards, in the order they were saved.
    #[serde(default)]
    pub cards: Vec<Card>,
    /// How many packs the user has pulled.
    #[serde(default)]
    pub packs_pulled: u32,
    /// How many cards the user has traded, both given and received.
    #[serde(default)]
    pub cards_traded: u32,
    /// The last card explicitly marked favorite.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite_card: Option<Card>,
}

impl UserCollection {
    /// Creates an empty collection.
    pub fn new(user_id: UserId) -> UserCollection {
        UserCollection {
            user_id,
            cards: Vec::new(),
            packs_pulled: 0,
            cards_traded: 0,
            favorite_card: None,
        }
    }

    /// Checks if the collection has reached [`COLLECTION_CAPACITY`].
    pub fn is_full(&self) -> bool {
        self.cards.len() >= COLLECTION_CAPACITY
    }

    /// The number of distinct card names owned.
    pub fn distinct_card_count(&self) -> usize {
        self.cards
            .iter()
            .map(|card| card.name.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Checks if a card is the favorite.
    pub fn is_favorite(&self, card: &Card) -> bool {
        self.favorite_card.as_ref() == Some(card)
    }

    /// Removes every copy of a card, clearing the favorite if it was that
    /// card.
    ///
    /// Returns how many copies were removed.
    pub fn remove_all(&mut self, key: &CardKey) -> usize {
        let before = self.cards.len();
        self.cards.retain(|card| !key.matches(card));
        let removed = before - self.cards.len();

        if removed > 0
            && self
                .favorite_card
                .as_ref()
                .is_some_and(|favorite| key.matches(favorite))
        {
            self.favorite_card = None;
        }

        removed
    }

    /// Removes the first copy of a card.
    pub fn take_one(&mut self, key: &CardKey) -> Option<Card> {
        let position = self.cards.iter().position(|card| key.matches(card))?;
        Some(self.cards.remove(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Rarity;

    fn user() -> UserId {
        UserId::new(7).unwrap()
    }

    #[test]
    fn distinct_count_ignores_rarity() {
        let mut collection = UserCollection::new(user());
        collection.cards = vec![
            Card::new("Pikachu", Rarity::Common),
            Card::new("Pikachu", Rarity::RareHolo),
            Card::new("Bulbasaur", Rarity::Common),
        ];

        assert_eq!(collection.distinct_card_count(), 2);
    }

    #[test]
    fn remove_all_clears_matching_favorite() {
        let pikachu = Card::new("Pikachu", Rarity::Common);
        let mut collection = UserCollection::new(user());
        collection.cards = vec![
            pikachu.clone(),
            Card::new("Onix", Rarity::Uncommon),
            pikachu.clone(),
        ];
        collection.favorite_card = Some(pikachu.clone());

        assert_eq!(collection.remove_all(&pikachu.key()), 2);
        assert_eq!(collection.cards.len(), 1);
        assert_eq!(collection.favorite_card, None);
    }

    #[test]
    fn remove_all_keeps_other_favorite() {
        let onix = Card::new("Onix", Rarity::Uncommon);
        let mut collection = UserCollection::new(user());
        collection.cards = vec![Card::new("Pikachu", Rarity::Common), onix.clone()];
        collection.favorite_card = Some(onix.clone());

        collection.remove_all(&Card::new("Pikachu", Rarity::Common).key());
        assert!(collection.is_favorite(&onix));
    }

    #[test]
    fn take_one_removes_a_single_copy() {
        let pikachu = Card::new("Pikachu", Rarity::Common);
        let mut collection = UserCollection::new(user());
        collection.cards = vec![pikachu.clone(), pikachu.clone()];

        assert_eq!(collection.take_one(&pikachu.key()), Some(pikachu));
        assert_eq!(collection.cards.len(), 1);
        assert_eq!(collection.take_one(&Card::new("Mew", Rarity::Rare).key()), None);
    }

    #[test]
    fn missing_counters_default_to_zero() {
        let collection: UserCollection =
            serde_json::from_str(r#"{ "user_id": "7", "cards": [] }"#).unwrap();

        assert_eq!(collection, UserCollection::new(user()));
    }
}
