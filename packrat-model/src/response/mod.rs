//! Card-data API responses.

pub mod card;
