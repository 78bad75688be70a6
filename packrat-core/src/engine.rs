//! The interaction state machine.
//!
//! [`Engine`] is the one place user actions turn into state changes. It owns
//! the session registry, the usage limiter and the collection store, and
//! every entry point returns a definite [`Render`] or [`Failure`] for the
//! presentation layer to format.
//!
//! Locks are always taken session first, then user. Trade confirmation takes
//! both users' locks in id order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, TimeDelta, Utc};

use dashmap::DashSet;

use derive_more::{Display, Error};

use packrat_model::{UserId, card::Card, collection::UserCollection};

use tokio::sync::OwnedMutexGuard;

use crate::{
    action::{ActionEvent, Inbound, Membership, TradeTarget},
    config::EngineConfig,
    limiter::UsageLimiter,
    pack::{PackError, assemble_pack},
    pool::{CardPool, PoolError},
    session::{
        PackSession, RegistryError, SessionKey, SessionKind, SessionRegistry, TradeSession,
    },
    store::{CollectionStore, StoreError},
    sync::KeyedLocks,
};

/// What the presentation layer should show after an action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Render {
    /// Show a card of a pack session.
    Card(CardView),
    /// The session was torn down.
    Closed { notice: Notice },
    /// A trade is waiting on its receiver.
    TradeProposed { trade: TradeSession },
    TradeCompleted { trade: TradeSession },
    TradeCancelled { trade: TradeSession, by: UserId },
}

/// A card shown at a position of a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CardView {
    pub key: SessionKey,
    pub kind: SessionKind,
    pub card: Card,
    /// Zero-based position of the card.
    pub index: usize,
    pub total: usize,
    /// The card was saved from this pull.
    pub saved: bool,
    /// The card is the owner's favorite.
    pub favorite: bool,
    pub notice: Option<Notice>,
}

impl CardView {
    /// One-based position of the card, for display.
    pub fn position(&self) -> usize {
        self.index + 1
    }
}

/// A short message shown next to a card.
#[derive(Clone, Debug, Display, PartialEq, Eq)]
pub enum Notice {
    #[display("Card saved to your collection!")]
    Saved,
    #[display("You already saved this card.")]
    AlreadySaved,
    #[display("Your collection is full! Delete a card from your /inventory first.")]
    CollectionFull,
    #[display("Removed {name} from your collection.")]
    Removed { name: String },
    #[display("Set as your favorite card!")]
    Favorited,
    #[display("Your collection is now empty.")]
    CollectionEmpty,
}

/// Why an action did not go through.
#[derive(Debug, Display, Error)]
pub enum Failure {
    #[display("The bot is turned off right now.")]
    Inactive,
    #[display("The set `{set}` is locked.")]
    SetLocked { set: String },
    #[display("You've used all {limit} of today's pulls. Come back tomorrow!")]
    DailyLimit { limit: u32 },
    #[display("No cards found for set `{set}`.")]
    NoCardsFound { set: String },
    #[display("Couldn't build a pack: {_0}.")]
    Pack(PackError),
    #[display("You or the other trader already have a trade open.")]
    AlreadyTrading { user_id: UserId },
    #[display("Card #{index} doesn't exist, you own {owned} cards.")]
    InvalidCardIndex { index: i64, owned: usize },
    #[display("You can't trade with yourself.")]
    SelfTrade,
    #[display("That user isn't in this server.")]
    UnknownTarget,
    #[display("Bots don't collect cards.")]
    TargetIsBot,
    #[display("You don't have a pending trade.")]
    NoPendingTrade,
    #[display("Only the receiver can accept this trade.")]
    NotTradeReceiver,
    #[display("Your collection is full, make room before accepting.")]
    ReceiverFull,
    #[display("The offered card is no longer in the sender's collection.")]
    TradeCardGone,
    #[display("You don't have any cards yet. Use /pull to get some!")]
    EmptyCollection,
    #[display("You don't own that card anymore.")]
    CardNotOwned,
    #[display("This isn't your pack.")]
    NotSessionOwner,
    /// The session is gone. Not shown to the user.
    #[display("session expired")]
    SessionExpired,
    #[display("Something went wrong saving your collection.")]
    Storage(StoreError),
    #[display("Couldn't reach the card database, try again later.")]
    Provider(PoolError),
}

impl Failure {
    /// Silent failures are logged, never shown.
    pub fn is_silent(&self) -> bool {
        matches!(self, Failure::SessionExpired)
    }
}

impl From<PackError> for Failure {
    fn from(value: PackError) -> Self {
        Failure::Pack(value)
    }
}

impl From<StoreError> for Failure {
    fn from(value: StoreError) -> Self {
        Failure::Storage(value)
    }
}

impl From<PoolError> for Failure {
    fn from(value: PoolError) -> Self {
        Failure::Provider(value)
    }
}

impl From<RegistryError> for Failure {
    fn from(value: RegistryError) -> Self {
        match value {
            RegistryError::AlreadyTrading { user_id } => Failure::AlreadyTrading { user_id },
        }
    }
}

/// A user's collection summary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Profile {
    pub user_id: UserId,
    pub packs_pulled: u32,
    pub cards_saved: usize,
    pub distinct_cards: usize,
    pub cards_traded: u32,
    pub favorite_card: Option<Card>,
}

impl From<&UserCollection> for Profile {
    fn from(value: &UserCollection) -> Self {
        Profile {
            user_id: value.user_id,
            packs_pulled: value.packs_pulled,
            cards_saved: value.cards.len(),
            distinct_cards: value.distinct_card_count(),
            cards_traded: value.cards_traded,
            favorite_card: value.favorite_card.clone(),
        }
    }
}

/// Engine statistics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineStats {
    pub started_at: DateTime<Utc>,
    pub uptime: TimeDelta,
    pub active: bool,
    /// Packs pulled since start.
    pub pulls: u64,
    pub pack_sessions: usize,
    pub trades: usize,
    pub locked_sets: Vec<String>,
}

/// The card pack engine.
pub struct Engine<S> {
    store: S,
    sessions: SessionRegistry,
    users: KeyedLocks<UserId>,
    limiter: UsageLimiter,
    locked_sets: DashSet<String>,
    active: AtomicBool,
    pulls: AtomicU64,
    started_at: DateTime<Utc>,
    config: EngineConfig,
}

impl<S> Engine<S>
where
    S: CollectionStore,
{
    /// Creates an active engine with empty registries.
    pub fn new(store: S, config: EngineConfig) -> Engine<S> {
        let locked_sets = config
            .locked_sets
            .iter()
            .map(|set| normalize_set(set))
            .collect();

        Engine {
            store,
            sessions: SessionRegistry::new(),
            users: KeyedLocks::new(),
            limiter: UsageLimiter::new(),
            locked_sets,
            active: AtomicBool::new(true),
            pulls: AtomicU64::new(0),
            started_at: Utc::now(),
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn limiter(&self) -> &UsageLimiter {
        &self.limiter
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Handles an action event.
    #[tracing::instrument(
        skip(self, inbound, pool),
        fields(key = %inbound.key, user = %inbound.user, action = %inbound.event.action()),
    )]
    pub async fn handle<P>(&self, inbound: Inbound, pool: &P) -> Result<Render, Failure>
    where
        P: CardPool,
    {
        self.ensure_active()?;

        let Inbound { key, user, event } = inbound;

        let result = match event {
            ActionEvent::Pull { set, pool_size } => self.pull(key, user, &set, pool_size, pool).await,
            ActionEvent::Next => self.navigate(key, user, PackSession::next).await,
            ActionEvent::Previous => self.navigate(key, user, PackSession::previous).await,
            ActionEvent::Save => self.save(key, user).await,
            ActionEvent::Delete => self.delete(key, user).await,
            ActionEvent::Favorite => self.favorite(key, user).await,
            ActionEvent::TradePropose { target, card_index } => {
                self.propose_trade(key, user, target, card_index).await
            }
            ActionEvent::TradeConfirm { proposal } => self.confirm_trade(user, proposal).await,
            ActionEvent::TradeCancel { proposal } => self.cancel_trade(user, proposal).await,
        };

        match &result {
            Ok(_) => tracing::debug!("action handled"),
            Err(failure) if failure.is_silent() => tracing::debug!(%failure, "action ignored"),
            Err(failure @ (Failure::Storage(_) | Failure::Provider(_))) => {
                tracing::error!(%failure, source = ?std::error::Error::source(failure), "action failed")
            }
            Err(failure) => tracing::debug!(%failure, "action rejected"),
        }

        result
    }

    /// Opens a session browsing a user's own collection.
    #[tracing::instrument(skip(self))]
    pub async fn open_collection(&self, key: SessionKey, user: UserId) -> Result<Render, Failure> {
        self.ensure_active()?;

        let collection = self.store.load(user).await;
        if collection.cards.is_empty() {
            return Err(Failure::EmptyCollection);
        }

        let handle = self.sessions.create_pack_session(
            key,
            user,
            SessionKind::Collection,
            collection.cards.clone(),
        );
        let session = handle.lock().await;

        view(&session, collection.favorite_card.as_ref(), None)
    }

    /// Summarizes a user's collection.
    pub async fn profile(&self, user: UserId) -> Result<Profile, Failure> {
        self.ensure_active()?;

        Ok(Profile::from(&self.store.load(user).await))
    }

    /// Forgets a user who left the group.
    ///
    /// Deletes their collection, closes their pack sessions and cancels any
    /// trade they are part of.
    #[tracing::instrument(skip(self))]
    pub async fn member_left(&self, user: UserId) -> Result<(), Failure> {
        if let Some(trade) = self.sessions.trade_for(user) {
            self.sessions.remove_trade(&trade);
            tracing::info!(sender = %trade.sender, receiver = %trade.receiver, "cancelled trade of departed member");
        }

        let sessions = self.sessions.remove_owned_by(user);
        if sessions > 0 {
            tracing::debug!(sessions, "dropped sessions of departed member");
        }

        let _guard = self.users.lock(user).await;
        self.store.delete(user).await?;

        Ok(())
    }

    /// Locks a set. Returns `false` if it was already locked.
    pub fn lock_set(&self, set: &str) -> bool {
        let locked = self.locked_sets.insert(normalize_set(set));
        if locked {
            tracing::info!(set, "set locked");
        }
        locked
    }

    /// Unlocks a set. Returns `false` if it was not locked.
    pub fn unlock_set(&self, set: &str) -> bool {
        let unlocked = self.locked_sets.remove(&normalize_set(set)).is_some();
        if unlocked {
            tracing::info!(set, "set unlocked");
        }
        unlocked
    }

    pub fn is_locked(&self, set: &str) -> bool {
        self.locked_sets.contains(&normalize_set(set))
    }

    /// Every locked set, sorted.
    pub fn locked_sets(&self) -> Vec<String> {
        let mut sets = self
            .locked_sets
            .iter()
            .map(|set| set.clone())
            .collect::<Vec<_>>();
        sets.sort();
        sets
    }

    /// Turns the engine on or off. Returns the previous state.
    pub fn set_active(&self, active: bool) -> bool {
        let previous = self.active.swap(active, Ordering::SeqCst);
        if previous != active {
            tracing::info!(active, "engine activity changed");
        }
        previous
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            started_at: self.started_at,
            uptime: Utc::now() - self.started_at,
            active: self.is_active(),
            pulls: self.pulls.load(Ordering::Relaxed),
            pack_sessions: self.sessions.pack_count(),
            trades: self.sessions.trade_count(),
            locked_sets: self.locked_sets(),
        }
    }

    fn ensure_active(&self) -> Result<(), Failure> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Failure::Inactive)
        }
    }

    async fn pull<P>(
        &self,
        key: SessionKey,
        user: UserId,
        set: &str,
        pool_size: usize,
        pool: &P,
    ) -> Result<Render, Failure>
    where
        P: CardPool,
    {
        if self.is_locked(set) {
            return Err(Failure::SetLocked {
                set: set.to_owned(),
            });
        }

        let limit = self.config.daily_pull_limit;
        if !self.limiter.check_and_consume(user, limit) {
            return Err(Failure::DailyLimit { limit });
        }

        let candidates = pool.fetch_pool(set, pool_size).await?;
        if candidates.is_empty() {
            return Err(Failure::NoCardsFound {
                set: set.to_owned(),
            });
        }

        let pack = self.assemble(&candidates)?;
        tracing::debug!(candidates = candidates.len(), "assembled pack");

        let handle = self
            .sessions
            .create_pack_session(key, user, SessionKind::Pull, pack);
        let session = handle.lock().await;

        {
            let _guard = self.users.lock(user).await;
            let mut collection = self.store.load(user).await;
            collection.packs_pulled += 1;

            // the pack is already dealt, a lost counter is not worth failing it
            if let Err(err) = self.store.save(&collection).await {
                tracing::error!(%err, "failed to record pull");
            }
        }

        self.pulls.fetch_add(1, Ordering::Relaxed);

        view(&session, None, None)
    }

    fn assemble(&self, candidates: &[Card]) -> Result<Vec<Card>, PackError> {
        assemble_pack(candidates, self.config.pack_size.get(), &mut rand::rng())
    }

    async fn navigate(
        &self,
        key: SessionKey,
        user: UserId,
        step: fn(&mut PackSession),
    ) -> Result<Render, Failure> {
        let mut session = self.session(key, user).await?;
        step(&mut *session);

        self.render(&session, None).await
    }

    async fn save(&self, key: SessionKey, user: UserId) -> Result<Render, Failure> {
        let mut session = self.session(key, user).await?;
        if session.kind != SessionKind::Pull {
            return self.render(&session, None).await;
        }

        let Some(card) = session.current().cloned() else {
            return Err(lost_position(&session));
        };
        let card_key = card.key();

        if session.is_saved(&card_key) {
            return view(&session, None, Some(Notice::AlreadySaved));
        }

        {
            let _guard = self.users.lock(user).await;
            let mut collection = self.store.load(user).await;

            if collection.is_full() {
                return view(&session, None, Some(Notice::CollectionFull));
            }

            collection.cards.push(card);
            self.store.save(&collection).await?;
        }

        session.mark_saved(card_key);

        view(&session, None, Some(Notice::Saved))
    }

    async fn delete(&self, key: SessionKey, user: UserId) -> Result<Render, Failure> {
        let mut session = self.session(key, user).await?;
        if session.kind != SessionKind::Collection {
            return self.render(&session, None).await;
        }

        let Some(card) = session.current().cloned() else {
            return Err(lost_position(&session));
        };
        let card_key = card.key();

        let favorite = {
            let _guard = self.users.lock(user).await;
            let mut collection = self.store.load(user).await;

            let removed = collection.remove_all(&card_key);
            if removed == 0 {
                return Err(Failure::CardNotOwned);
            }

            self.store.save(&collection).await?;
            tracing::debug!(removed, card = %card_key, "deleted cards");

            collection.favorite_card
        };

        session.remove_current();

        if session.is_empty() {
            session.close();
            self.sessions.remove(key);
            return Ok(Render::Closed {
                notice: Notice::CollectionEmpty,
            });
        }

        view(
            &session,
            favorite.as_ref(),
            Some(Notice::Removed { name: card.name }),
        )
    }

    async fn favorite(&self, key: SessionKey, user: UserId) -> Result<Render, Failure> {
        let session = self.session(key, user).await?;
        if session.kind != SessionKind::Collection {
            return self.render(&session, None).await;
        }

        let Some(card) = session.current().cloned() else {
            return Err(lost_position(&session));
        };

        {
            let _guard = self.users.lock(user).await;
            let mut collection = self.store.load(user).await;

            if !collection.cards.contains(&card) {
                return Err(Failure::CardNotOwned);
            }

            if !collection.is_favorite(&card) {
                collection.favorite_card = Some(card.clone());
                self.store.save(&collection).await?;
            }
        }

        view(&session, Some(&card), Some(Notice::Favorited))
    }

    async fn propose_trade(
        &self,
        key: SessionKey,
        sender: UserId,
        target: TradeTarget,
        card_index: i64,
    ) -> Result<Render, Failure> {
        if target.user == sender {
            return Err(Failure::SelfTrade);
        }

        match target.membership {
            Membership::Member => (),
            Membership::Bot => return Err(Failure::TargetIsBot),
            Membership::Absent => return Err(Failure::UnknownTarget),
        }

        let collection = self.store.load(sender).await;
        if collection.cards.is_empty() {
            return Err(Failure::EmptyCollection);
        }

        let card = usize::try_from(card_index)
            .ok()
            .and_then(|index| index.checked_sub(1))
            .and_then(|index| collection.cards.get(index))
            .cloned()
            .ok_or(Failure::InvalidCardIndex {
                index: card_index,
                owned: collection.cards.len(),
            })?;

        let trade = self
            .sessions
            .create_trade_session(key, sender, target.user, card)?;
        tracing::info!(receiver = %trade.receiver, card = %trade.card.key(), "trade proposed");

        Ok(Render::TradeProposed {
            trade: TradeSession::clone(&trade),
        })
    }

    async fn confirm_trade(
        &self,
        user: UserId,
        proposal: Option<SessionKey>,
    ) -> Result<Render, Failure> {
        let trade = self.pending_trade(user, proposal)?;
        if trade.receiver != user {
            return Err(Failure::NotTradeReceiver);
        }

        let _guards = self.users.lock_pair(trade.sender, trade.receiver).await;

        // a cancel may have landed while waiting on the locks
        if !self
            .sessions
            .trade_for(user)
            .is_some_and(|current| Arc::ptr_eq(&current, &trade))
        {
            return Err(Failure::NoPendingTrade);
        }

        let mut sender = self.store.load(trade.sender).await;
        let mut receiver = self.store.load(trade.receiver).await;

        if receiver.is_full() {
            return Err(Failure::ReceiverFull);
        }

        let card_key = trade.card.key();
        let Some(card) = sender.take_one(&card_key) else {
            self.sessions.remove_trade(&trade);
            return Err(Failure::TradeCardGone);
        };

        if !sender.cards.iter().any(|owned| card_key.matches(owned))
            && sender
                .favorite_card
                .as_ref()
                .is_some_and(|favorite| card_key.matches(favorite))
        {
            sender.favorite_card = None;
        }

        receiver.cards.push(card);
        sender.cards_traded += 1;
        receiver.cards_traded += 1;

        // receiver first, so a failed second write duplicates the card
        // rather than losing it
        self.store.save(&receiver).await?;
        self.store.save(&sender).await?;

        self.sessions.remove_trade(&trade);
        tracing::info!(sender = %trade.sender, card = %card_key, "trade completed");

        Ok(Render::TradeCompleted {
            trade: TradeSession::clone(&trade),
        })
    }

    async fn cancel_trade(
        &self,
        user: UserId,
        proposal: Option<SessionKey>,
    ) -> Result<Render, Failure> {
        let trade = self.pending_trade(user, proposal)?;

        self.sessions.remove_trade(&trade);
        tracing::info!(sender = %trade.sender, receiver = %trade.receiver, "trade cancelled");

        Ok(Render::TradeCancelled {
            trade: TradeSession::clone(&trade),
            by: user,
        })
    }

    /// The trade `user` is part of.
    ///
    /// A button of a proposal that is no longer the user's current trade is
    /// treated like a button of an expired session.
    fn pending_trade(
        &self,
        user: UserId,
        proposal: Option<SessionKey>,
    ) -> Result<Arc<TradeSession>, Failure> {
        match (self.sessions.trade_for(user), proposal) {
            (Some(trade), Some(key)) if trade.key != key => Err(Failure::SessionExpired),
            (Some(trade), _) => Ok(trade),
            (None, Some(_)) => Err(Failure::SessionExpired),
            (None, None) => Err(Failure::NoPendingTrade),
        }
    }

    /// Locks a live session owned by `user`.
    async fn session(
        &self,
        key: SessionKey,
        user: UserId,
    ) -> Result<OwnedMutexGuard<PackSession>, Failure> {
        let handle = self.sessions.get(key).ok_or(Failure::SessionExpired)?;
        let session = handle.lock_owned().await;

        if session.is_closed() {
            return Err(Failure::SessionExpired);
        }

        if session.owner != user {
            return Err(Failure::NotSessionOwner);
        }

        Ok(session)
    }

    async fn render(&self, session: &PackSession, notice: Option<Notice>) -> Result<Render, Failure> {
        let favorite = match session.kind {
            SessionKind::Collection => self.store.load(session.owner).await.favorite_card,
            SessionKind::Pull => None,
        };

        view(session, favorite.as_ref(), notice)
    }
}

fn view(
    session: &PackSession,
    favorite: Option<&Card>,
    notice: Option<Notice>,
) -> Result<Render, Failure> {
    let Some(card) = session.current() else {
        return Err(lost_position(session));
    };

    Ok(Render::Card(CardView {
        key: session.key,
        kind: session.kind,
        card: card.clone(),
        index: session.index(),
        total: session.len(),
        saved: session.is_saved(&card.key()),
        favorite: favorite == Some(card),
        notice,
    }))
}

fn lost_position(session: &PackSession) -> Failure {
    debug_assert!(false, "session {} has no current card", session.key);
    tracing::error!(key = %session.key, "session has no current card, ignoring");
    Failure::SessionExpired
}

fn normalize_set(set: &str) -> String {
    set.trim().to_ascii_lowercase()
}
