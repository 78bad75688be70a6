//! Typed card API requests.

pub mod card;
pub mod set;
