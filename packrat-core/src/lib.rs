//! Packrat's session and collection core.
//!
//! Everything here is independent of the chat platform. The bot crate turns
//! gateway events into [`action::Inbound`] events, hands them to an
//! [`engine::Engine`], and formats whatever comes back.

pub mod action;
pub mod config;
pub mod engine;
pub mod limiter;
pub mod pack;
pub mod pool;
pub mod rarity;
pub mod session;
pub mod store;
pub mod sync;

pub use engine::{Engine, Failure, Render};
