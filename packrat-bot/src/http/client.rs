//! Card API client.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use anyhow::Error;

use dashmap::DashMap;

use derive_more::{Display, Error};

use futures_util::{StreamExt as _, stream};

use http::{Method, StatusCode};

use packrat_core::pool::{CardPool, PoolError};

use packrat_model::{
    card::Card,
    response::card::{CardBrief, SetBrief},
};

use rand::seq::IndexedRandom as _;

use tokio::sync::OnceCell;

use crate::config::ApiConfig;

use super::request::{
    card::GetCard,
    set::{GetSet, ListSets},
};

/// A client used to access the card API.
///
/// Cheaply cloneable, as it uses an `Arc` to track internal state and manage
/// connections.
#[derive(Clone, Debug)]
pub struct Client {
    http: reqwest::Client,
    state: Arc<ClientState>,
    /// Card details by card id. Card details never change, so entries are
    /// never evicted.
    cards: Arc<DashMap<String, Card>>,
    sets: Arc<OnceCell<Vec<SetBrief>>>,
}

#[derive(Debug)]
struct ClientState {
    endpoint: String,
    retries: u32,
    retry_backoff: Duration,
    concurrency: usize,
    /// Milliseconds, `u64::MAX` until the first response.
    last_latency: AtomicU64,
}

impl Client {
    /// Creates a new client.
    pub fn new(config: &ApiConfig) -> Result<Client, Error> {
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .deflate(true)
            .timeout(Duration::from_secs(15))
            .build()?;

        let state = ClientState {
            endpoint: config.endpoint.trim_end_matches('/').to_owned(),
            retries: config.retries,
            retry_backoff: config.retry_backoff(),
            concurrency: config.concurrency.max(1),
            last_latency: AtomicU64::new(u64::MAX),
        };

        Ok(Client {
            http,
            state: Arc::new(state),
            cards: Arc::new(DashMap::new()),
            sets: Arc::new(OnceCell::new()),
        })
    }

    /// Gets a set and its card list.
    pub fn get_set(&self, id: impl Into<String>) -> GetSet {
        GetSet::new(self.clone(), id.into())
    }

    /// Lists every set.
    pub fn list_sets(&self) -> ListSets {
        ListSets::new(self.clone())
    }

    /// Gets the details of a single card.
    pub fn get_card(&self, id: impl Into<String>) -> GetCard {
        GetCard::new(self.clone(), id.into())
    }

    /// The latency of the last answered request.
    pub fn last_latency(&self) -> Option<Duration> {
        match self.state.last_latency.load(Ordering::Relaxed) {
            u64::MAX => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// How many card details are cached.
    pub fn cached_cards(&self) -> usize {
        self.cards.len()
    }

    /// Lists every set, fetching them once per process.
    pub async fn sets(&self) -> Result<&[SetBrief], Error> {
        self.sets
            .get_or_try_init(|| self.list_sets().into_future())
            .await
            .map(Vec::as_slice)
    }

    /// Gets a card's details, from the cache if they were fetched before.
    pub async fn card(&self, id: &str) -> Result<Card, Error> {
        if let Some(card) = self.cards.get(id).map(|card| card.clone()) {
            return Ok(card);
        }

        let card = Card::from(self.get_card(id).await?);
        self.cards.insert(id.to_owned(), card.clone());

        Ok(card)
    }

    /// Draws up to `count` random cards from a set, with their details.
    ///
    /// An unknown set has no cards. Cards whose details fail to load are
    /// skipped.
    #[tracing::instrument(skip(self))]
    pub async fn sample_set(&self, set_id: &str, count: usize) -> Result<Vec<Card>, Error> {
        if !is_valid_id(set_id) {
            return Ok(Vec::new());
        }

        let set = match self.get_set(set_id).await {
            Ok(set) => set,
            Err(err) if is_not_found(&err) => {
                tracing::debug!("set does not exist");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err),
        };

        let briefs = choose_briefs(&set.cards, count);

        let results = stream::iter(briefs)
            .map(|brief| async move {
                let card = self.card(&brief.id).await;
                (brief, card)
            })
            .buffer_unordered(self.state.concurrency)
            .collect::<Vec<_>>()
            .await;

        let mut cards = Vec::with_capacity(results.len());
        for (brief, result) in results {
            match result {
                Ok(card) if card.set_id.is_some() => cards.push(card),
                Ok(card) => cards.push(card.set_id(set_id)),
                Err(err) => tracing::warn!(card = %brief.id, %err, "skipping card"),
            }
        }

        tracing::debug!(listed = set.cards.len(), fetched = cards.len(), "sampled set");

        Ok(cards)
    }

    /// Makes a generic request to the API.
    pub(super) fn request(&self, method: Method, url: impl AsRef<str>) -> Request {
        Request::new(self.clone(), method, url)
    }

    fn record_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX - 1);
        self.state.last_latency.store(ms, Ordering::Relaxed);
    }
}

impl CardPool for Client {
    async fn fetch_pool(&self, set_id: &str, count: usize) -> Result<Vec<Card>, PoolError> {
        self.sample_set(set_id, count).await.map_err(PoolError::new)
    }
}

fn choose_briefs(cards: &[CardBrief], count: usize) -> Vec<CardBrief> {
    let mut rng = rand::rng();
    cards.choose_multiple(&mut rng, count).cloned().collect()
}

/// Checks that an id is safe to put in a url path.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && id != "."
        && id != ".."
}

fn is_not_found(err: &Error) -> bool {
    err.downcast_ref::<ApiError>()
        .is_some_and(|err| err.status == StatusCode::NOT_FOUND)
}

/// A HTTP client request.
#[derive(Debug)]
pub struct Request {
    client: Client,
    request: reqwest::RequestBuilder,
}

impl Request {
    /// Creates a new `Request`.
    ///
    /// The url is appended to the API endpoint.
    pub fn new(client: Client, method: Method, url: impl AsRef<str>) -> Request {
        let url = format!("{}{}", client.state.endpoint, url.as_ref());

        Request {
            request: client.http.request(method, url),
            client,
        }
    }

    /// Makes a general request to the API.
    ///
    /// Connection failures, timeouts, rate limits and server errors are
    /// retried with exponential backoff.
    pub async fn send(self) -> Result<reqwest::Response, Error> {
        let retries = self.client.state.retries;
        let mut backoff = self.client.state.retry_backoff;

        let mut attempt = 0;
        loop {
            let request = self
                .request
                .try_clone()
                .ok_or_else(|| Error::msg("request is not cloneable"))?;

            let started = Instant::now();
            let result = request.send().await;

            let retryable = match result {
                Ok(res) => {
                    self.client.record_latency(started.elapsed());

                    let status = res.status();
                    if status.is_success() {
                        return Ok(res);
                    }

                    let err = ApiError {
                        status,
                        url: res.url().to_string(),
                    };
                    if !is_transient(status) || attempt >= retries {
                        return Err(err.into());
                    }

                    Error::from(err)
                }
                Err(err) if attempt < retries && (err.is_connect() || err.is_timeout()) => {
                    Error::from(err)
                }
                Err(err) => return Err(err.into()),
            };

            attempt += 1;
            tracing::debug!(attempt, ?backoff, err = %retryable, "retrying request");

            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }
    }
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// The API answered with an error status.
#[derive(Clone, Debug, Display, Error)]
#[display("{url} responded with {status}")]
pub struct ApiError {
    pub status: StatusCode,
    pub url: String,
}
