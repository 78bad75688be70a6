//! Card pool providers.

use std::error::Error as StdError;
use std::future::Future;

use derive_more::Display;

use packrat_model::card::Card;

/// Supplies the cards packs are drawn from.
pub trait CardPool: Send + Sync {
    /// Fetches up to `count` candidate cards from a set.
    ///
    /// May return fewer cards than asked for, or none at all.
    fn fetch_pool(
        &self,
        set_id: &str,
        count: usize,
    ) -> impl Future<Output = Result<Vec<Card>, PoolError>> + Send;
}

/// A card pool provider failed.
#[derive(Debug, Display)]
#[display("card pool unavailable: {source}")]
pub struct PoolError {
    source: Box<dyn StdError + Send + Sync>,
}

impl PoolError {
    pub fn new(source: impl Into<Box<dyn StdError + Send + Sync>>) -> PoolError {
        PoolError {
            source: source.into(),
        }
    }
}

impl StdError for PoolError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_ref())
    }
}

/// A fixed pool. Cards tagged with another set are skipped.
impl CardPool for Vec<Card> {
    async fn fetch_pool(&self, set_id: &str, count: usize) -> Result<Vec<Card>, PoolError> {
        Ok(self
            .iter()
            .filter(|card| card.set_id.as_deref().is_none_or(|id| id == set_id))
            .take(count)
            .cloned()
            .collect())
    }
}
