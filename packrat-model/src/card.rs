//! Card data models.

use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use derive_more::{Display, Error};

use serde::{Deserialize, Serialize};

/// A single card.
///
/// Cards are values: two cards with the same name and rarity are the same
/// card, no matter which fetch they came from. See [`CardKey`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Card {
    /// The card's name.
    pub name: String,
    /// The card's rarity.
    pub rarity: Rarity,
    /// The card's image, without the `/low.png` or `/high.png` suffix.
    #[serde(default)]
    pub image: String,
    /// The set the card was pulled from, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_id: Option<String>,
}

impl Card {
    /// Creates a new `Card` with no image or set.
    pub fn new(name: impl Into<String>, rarity: impl Into<Rarity>) -> Card {
        Card {
            name: name.into(),
            rarity: rarity.into(),
            image: String::new(),
            set_id: None,
        }
    }

    /// Attaches an image to the card.
    pub fn image(self, image: impl Into<String>) -> Card {
        Card {
            image: image.into(),
            ..self
        }
    }

    /// Attaches a set id to the card.
    pub fn set_id(self, set_id: impl Into<String>) -> Card {
        Card {
            set_id: Some(set_id.into()),
            ..self
        }
    }

    /// The identity of the card.
    pub fn key(&self) -> CardKey {
        CardKey {
            name: self.name.clone(),
            rarity: self.rarity.clone(),
        }
    }

    /// Renders the card's image url at a given quality.
    ///
    /// Returns `None` if the card has no image.
    pub fn image_url(&self, quality: ImageQuality) -> Option<String> {
        if self.image.is_empty() {
            None
        } else {
            Some(format!("{}/{}.png", self.image, quality.to_str()))
        }
    }
}

impl PartialEq for Card {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.rarity == other.rarity
    }
}

impl Eq for Card {}

impl Hash for Card {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.rarity.hash(state);
    }
}

/// The `(name, rarity)` identity of a card.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct CardKey {
    pub name: String,
    pub rarity: Rarity,
}

impl CardKey {
    /// Checks if a card has this identity.
    pub fn matches(&self, card: &Card) -> bool {
        self.name == card.name && self.rarity == card.rarity
    }
}

impl Display for CardKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.rarity)
    }
}

/// Image quality suffixes served by the card API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageQuality {
    Low,
    High,
}

impl ImageQuality {
    pub fn to_str(&self) -> &'static str {
        match self {
            ImageQuality::Low => "low",
            ImageQuality::High => "high",
        }
    }
}

/// Card rarity.
///
/// The card API reports many more labels than packs are weighted by; those
/// are kept verbatim in [`Rarity::Other`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    RareHolo,
    UltraRare,
    SecretRare,
    /// Any other rarity label.
    Other(String),
}

impl Rarity {
    /// The display label of the rarity.
    ///
    /// Parsing this label with [`FromStr`] returns the same rarity.
    pub fn label(&self) -> &str {
        match self {
            Rarity::Common => "Common",
            Rarity::Uncommon => "Uncommon",
            Rarity::Rare => "Rare",
            Rarity::RareHolo => "Rare Holo",
            Rarity::UltraRare => "Ultra Rare",
            Rarity::SecretRare => "Secret Rare",
            Rarity::Other(label) => label,
        }
    }
}

impl Display for Rarity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<&str> for Rarity {
    fn from(value: &str) -> Self {
        // the card api is inconsistent about casing, "Rare holo" and
        // "Rare Holo" both show up
        match value.to_ascii_lowercase().as_str() {
            "common" => Rarity::Common,
            "uncommon" => Rarity::Uncommon,
            "rare" => Rarity::Rare,
            "rare holo" => Rarity::RareHolo,
            "ultra rare" => Rarity::UltraRare,
            "secret rare" => Rarity::SecretRare,
            _ => Rarity::Other(value.to_owned()),
        }
    }
}

impl From<String> for Rarity {
    fn from(value: String) -> Self {
        match Rarity::from(value.as_str()) {
            Rarity::Other(_) => Rarity::Other(value),
            rarity => rarity,
        }
    }
}

impl From<Rarity> for String {
    fn from(value: Rarity) -> Self {
        match value {
            Rarity::Other(label) => label,
            rarity => rarity.label().to_owned(),
        }
    }
}

impl FromStr for Rarity {
    type Err = EmptyRarity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            Err(EmptyRarity)
        } else {
            Ok(Rarity::from(s.trim()))
        }
    }
}

#[derive(Clone, Debug, Display, Error)]
#[display("rarity label is empty")]
pub struct EmptyRarity;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cards_compare_by_name_and_rarity() {
        let a = Card::new("Pikachu", Rarity::Common).image("https://a/1");
        let b = Card::new("Pikachu", Rarity::Common)
            .image("https://b/2")
            .set_id("base1");
        let c = Card::new("Pikachu", Rarity::RareHolo);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.key().matches(&b));
    }

    #[test]
    fn rarity_labels_round_trip() {
        for rarity in [
            Rarity::Common,
            Rarity::Uncommon,
            Rarity::Rare,
            Rarity::RareHolo,
            Rarity::UltraRare,
            Rarity::SecretRare,
        ] {
            assert_eq!(rarity.label().parse::<Rarity>().unwrap(), rarity);
        }

        assert_eq!(Rarity::from("Rare holo"), Rarity::RareHolo);
        assert_eq!(
            Rarity::from("Illustration rare"),
            Rarity::Other("Illustration rare".into())
        );
        assert!("  ".parse::<Rarity>().is_err());
    }

    #[test]
    fn rarity_serializes_as_label() {
        let card = Card::new("Charizard", Rarity::SecretRare);
        let json = serde_json::to_value(&card).unwrap();

        assert_eq!(json["rarity"], "Secret Rare");
        assert!(json.get("set_id").is_none());
    }

    #[test]
    fn image_url_appends_quality() {
        let card = Card::new("Eevee", Rarity::Common).image("https://assets/base1/51");

        assert_eq!(
            card.image_url(ImageQuality::Low).as_deref(),
            Some("https://assets/base1/51/low.png")
        );
        assert_eq!(Card::new("Eevee", Rarity::Common).image_url(ImageQuality::High), None);
    }
}
