//! Packrat data representations.

use std::{
    fmt::{self, Display, Formatter},
    num::NonZeroU64,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};

use derive_more::{Deref, From, Into};

pub mod card;
pub mod collection;
pub mod response;

/// A stable, platform-assigned user identifier.
///
/// Because Discord snowflakes approach sizes of integer not representable by
/// Javascript's usual JSON parsing utilities, they are encoded as string
/// atoms.
#[derive(Clone, Copy, Debug, From, Into, Deref, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(NonZeroU64);

impl UserId {
    /// Creates a new `UserId`.
    ///
    /// Returns `None` if the id is 0.
    pub fn new(inner: u64) -> Option<UserId> {
        NonZeroU64::new(inner).map(UserId)
    }

    /// The raw id.
    pub fn get(&self) -> u64 {
        self.0.get()
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer)
            .and_then(|s| s.parse::<u64>().map_err(|e| D::Error::custom(e)))
            .and_then(|id| NonZeroU64::new(id).ok_or_else(|| D::Error::custom("id is 0")))
            .map(UserId)
    }
}

impl Serialize for UserId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.get().to_string().serialize(serializer)
    }
}
