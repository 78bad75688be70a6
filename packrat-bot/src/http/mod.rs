//! Card API access.

mod client;
pub mod request;

pub use client::{ApiError, Client, Request, is_valid_id};
