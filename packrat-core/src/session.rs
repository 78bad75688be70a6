//! Transient pack and trade sessions.
//!
//! Sessions are in-memory only. A fresh process starts with an empty
//! registry, and the old messages' buttons resolve to expired sessions.

use std::collections::{HashMap, HashSet};
use std::fmt::{self, Display, Formatter};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use dashmap::DashMap;

use derive_more::{Display, Error, From, Into};

use packrat_model::{
    UserId,
    card::{Card, CardKey},
};

use tokio::sync::Mutex;

/// The key of a pack session.
///
/// Keys are allocated by the presentation layer; the bot uses the id of the
/// interaction that opened the session.
#[derive(Clone, Copy, Debug, From, Into, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionKey(u64);

impl SessionKey {
    pub fn new(key: u64) -> SessionKey {
        SessionKey(key)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl Display for SessionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What a pack session is browsing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionKind {
    /// A freshly pulled pack. Cards can be saved.
    Pull,
    /// The owner's own collection. Cards can be deleted or favorited.
    Collection,
}

/// A user browsing a list of cards.
#[derive(Clone, Debug)]
pub struct PackSession {
    pub key: SessionKey,
    pub owner: UserId,
    pub kind: SessionKind,
    cards: Vec<Card>,
    index: usize,
    saved: HashSet<CardKey>,
    closed: bool,
}

impl PackSession {
    /// Creates a session positioned on the first card.
    pub fn new(key: SessionKey, owner: UserId, kind: SessionKind, cards: Vec<Card>) -> PackSession {
        PackSession {
            key,
            owner,
            kind,
            cards,
            index: 0,
            saved: HashSet::new(),
            closed: false,
        }
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// The zero-based position of the current card.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The card being shown.
    ///
    /// Only `None` when the session has no cards.
    pub fn current(&self) -> Option<&Card> {
        self.cards.get(self.index)
    }

    /// Moves forward one card, wrapping to the start.
    pub fn next(&mut self) {
        if !self.cards.is_empty() {
            self.index = (self.index + 1) % self.cards.len();
        }
    }

    /// Moves back one card, wrapping to the end.
    pub fn previous(&mut self) {
        let len = self.cards.len();
        if len > 0 {
            self.index = (self.index + len - 1) % len;
        }
    }

    /// Jumps to a card. Returns `false` if out of bounds.
    pub fn seek(&mut self, index: usize) -> bool {
        if index < self.cards.len() {
            self.index = index;
            true
        } else {
            false
        }
    }

    /// Checks if a card was saved from this session.
    pub fn is_saved(&self, key: &CardKey) -> bool {
        self.saved.contains(key)
    }

    /// Records a card as saved. Returns `false` if it already was.
    pub fn mark_saved(&mut self, key: CardKey) -> bool {
        self.saved.insert(key)
    }

    /// Drops the current card, clamping the index if it falls off the end.
    pub fn remove_current(&mut self) -> Option<Card> {
        if self.index >= self.cards.len() {
            return None;
        }

        let card = self.cards.remove(self.index);
        if self.index >= self.cards.len() {
            self.index = self.cards.len().saturating_sub(1);
        }

        Some(card)
    }

    /// Marks the session as torn down.
    ///
    /// Tasks still holding the session after it leaves the registry see this
    /// and treat it as expired.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// A card offered from one user to another, awaiting confirmation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TradeSession {
    /// The key of the proposal, carried by its buttons.
    pub key: SessionKey,
    pub sender: UserId,
    pub receiver: UserId,
    pub card: Card,
}

impl TradeSession {
    /// Checks if a user is part of the trade.
    pub fn involves(&self, user_id: UserId) -> bool {
        self.sender == user_id || self.receiver == user_id
    }
}

/// A session registry error.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[display("user {user_id} already has a trade open")]
    AlreadyTrading { user_id: UserId },
}

/// A shared pack session handle.
pub type SessionHandle = Arc<Mutex<PackSession>>;

#[derive(Debug)]
struct PackEntry {
    owner: UserId,
    session: SessionHandle,
}

/// Owns every live pack and trade session.
///
/// Actions on one pack session serialize on that session's lock, while
/// different sessions proceed in parallel. Trades sit behind a single lock,
/// since opening a trade has to check and claim two users at once.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    packs: DashMap<SessionKey, PackEntry>,
    trades: StdMutex<HashMap<UserId, Arc<TradeSession>>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> SessionRegistry {
        SessionRegistry::default()
    }

    /// Registers a pack session, replacing any session at the same key.
    pub fn create_pack_session(
        &self,
        key: SessionKey,
        owner: UserId,
        kind: SessionKind,
        cards: Vec<Card>,
    ) -> SessionHandle {
        let session = Arc::new(Mutex::new(PackSession::new(key, owner, kind, cards)));
        let entry = PackEntry {
            owner,
            session: session.clone(),
        };

        if self.packs.insert(key, entry).is_some() {
            tracing::warn!(%key, "pack session key reused, replacing");
        }

        session
    }

    /// Gets a pack session.
    pub fn get(&self, key: SessionKey) -> Option<SessionHandle> {
        self.packs.get(&key).map(|entry| entry.session.clone())
    }

    /// Removes a pack session. Returns `false` if it was already gone.
    pub fn remove(&self, key: SessionKey) -> bool {
        self.packs.remove(&key).is_some()
    }

    /// Removes every pack session a user owns. Returns how many were removed.
    ///
    /// Tasks already holding one of the sessions finish their action; later
    /// actions find it expired.
    pub fn remove_owned_by(&self, owner: UserId) -> usize {
        let mut removed = 0;
        self.packs.retain(|_, entry| {
            let keep = entry.owner != owner;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    /// Opens a trade.
    ///
    /// Fails if either user is already part of a trade; the check and the
    /// registration happen under one lock.
    pub fn create_trade_session(
        &self,
        key: SessionKey,
        sender: UserId,
        receiver: UserId,
        card: Card,
    ) -> Result<Arc<TradeSession>, RegistryError> {
        let mut trades = self.trades.lock().unwrap_or_else(PoisonError::into_inner);

        for user_id in [sender, receiver] {
            if trades.contains_key(&user_id) {
                return Err(RegistryError::AlreadyTrading { user_id });
            }
        }

        let trade = Arc::new(TradeSession {
            key,
            sender,
            receiver,
            card,
        });
        trades.insert(sender, trade.clone());
        trades.insert(receiver, trade.clone());

        Ok(trade)
    }

    /// Removes a trade under both of its users.
    ///
    /// An alias that already points at a newer trade is left alone. Returns
    /// `false` if the trade was not registered.
    pub fn remove_trade(&self, trade: &Arc<TradeSession>) -> bool {
        let mut trades = self.trades.lock().unwrap_or_else(PoisonError::into_inner);

        let mut removed = false;
        for user_id in [trade.sender, trade.receiver] {
            if trades
                .get(&user_id)
                .is_some_and(|current| Arc::ptr_eq(current, trade))
            {
                trades.remove(&user_id);
                removed = true;
            }
        }

        removed
    }

    /// The trade a user is part of, if any.
    pub fn trade_for(&self, user_id: UserId) -> Option<Arc<TradeSession>> {
        self.trades
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user_id)
            .cloned()
    }

    /// Drops every session.
    pub fn clear(&self) {
        self.packs.clear();
        self.trades
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// The number of live pack sessions.
    pub fn pack_count(&self) -> usize {
        self.packs.len()
    }

    /// The number of open trades.
    pub fn trade_count(&self) -> usize {
        self.trades
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(user_id, trade)| trade.sender == **user_id)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use packrat_model::card::Rarity;

    use super::*;

    fn user(id: u64) -> UserId {
        UserId::new(id).unwrap()
    }

    fn cards(names: &[&str]) -> Vec<Card> {
        names
            .iter()
            .map(|name| Card::new(*name, Rarity::Common))
            .collect()
    }

    fn session(names: &[&str]) -> PackSession {
        PackSession::new(SessionKey::new(1), user(1), SessionKind::Pull, cards(names))
    }

    #[test]
    fn navigation_wraps() {
        let mut session = session(&["A", "B", "C"]);

        assert!(session.seek(2));
        session.next();
        assert_eq!(session.index(), 0);

        session.previous();
        assert_eq!(session.index(), 2);
    }

    #[test]
    fn seek_out_of_bounds_is_rejected() {
        let mut session = session(&["A"]);
        assert!(!session.seek(1));
        assert_eq!(session.index(), 0);
    }

    #[test]
    fn remove_current_clamps_index() {
        let mut session = session(&["A", "B", "C"]);
        session.seek(2);

        assert_eq!(session.remove_current().unwrap().name, "C");
        assert_eq!(session.index(), 1);
        assert_eq!(session.current().unwrap().name, "B");
    }

    #[test]
    fn remove_current_leaves_other_copies() {
        let mut session = session(&["A", "B", "A", "C"]);

        assert_eq!(session.remove_current().unwrap().name, "A");
        assert_eq!(session.len(), 3);
        assert_eq!(session.index(), 0);
        assert_eq!(session.current().unwrap().name, "B");
        assert_eq!(
            session.cards().iter().map(|card| card.name.as_str()).collect::<Vec<_>>(),
            ["B", "A", "C"]
        );
    }

    #[test]
    fn remove_last_card_empties() {
        let mut session = session(&["A"]);

        session.remove_current();
        assert!(session.is_empty());
        assert!(session.current().is_none());
        assert_eq!(session.index(), 0);
        assert!(session.remove_current().is_none());
    }

    #[test]
    fn pack_sessions_last_write_wins() {
        let registry = SessionRegistry::new();
        let key = SessionKey::new(10);

        registry.create_pack_session(key, user(1), SessionKind::Pull, cards(&["A"]));
        registry.create_pack_session(key, user(2), SessionKind::Pull, cards(&["B"]));

        assert_eq!(registry.pack_count(), 1);
        let session = registry.get(key).unwrap();
        assert_eq!(session.try_lock().unwrap().owner, user(2));

        assert!(registry.remove(key));
        assert!(!registry.remove(key));
        assert!(registry.get(key).is_none());
    }

    #[test]
    fn sessions_of_one_owner_are_swept() {
        let registry = SessionRegistry::new();

        registry.create_pack_session(SessionKey::new(1), user(1), SessionKind::Pull, cards(&["A"]));
        registry.create_pack_session(SessionKey::new(2), user(2), SessionKind::Pull, cards(&["B"]));
        registry.create_pack_session(
            SessionKey::new(3),
            user(1),
            SessionKind::Collection,
            cards(&["C"]),
        );

        assert_eq!(registry.remove_owned_by(user(1)), 2);
        assert_eq!(registry.pack_count(), 1);
        assert!(registry.get(SessionKey::new(2)).is_some());
        assert_eq!(registry.remove_owned_by(user(1)), 0);
    }

    #[test]
    fn trade_exclusivity() {
        let registry = SessionRegistry::new();
        let card = Card::new("A", Rarity::Common);

        let trade = registry
            .create_trade_session(SessionKey::new(1), user(1), user(2), card.clone())
            .unwrap();

        // as sender or as receiver
        assert_eq!(
            registry.create_trade_session(SessionKey::new(1), user(1), user(3), card.clone()),
            Err(RegistryError::AlreadyTrading { user_id: user(1) })
        );
        assert_eq!(
            registry.create_trade_session(SessionKey::new(1), user(3), user(2), card.clone()),
            Err(RegistryError::AlreadyTrading { user_id: user(2) })
        );
        assert_eq!(registry.trade_count(), 1);

        assert!(registry.remove_trade(&trade));
        assert!(registry.trade_for(user(1)).is_none());
        assert!(registry.trade_for(user(2)).is_none());

        registry
            .create_trade_session(SessionKey::new(1), user(2), user(1), card)
            .unwrap();
    }

    #[test]
    fn stale_trade_removal_leaves_new_trade() {
        let registry = SessionRegistry::new();
        let card = Card::new("A", Rarity::Common);

        let old = registry
            .create_trade_session(SessionKey::new(1), user(1), user(2), card.clone())
            .unwrap();
        registry.remove_trade(&old);

        let new = registry
            .create_trade_session(SessionKey::new(1), user(1), user(3), card)
            .unwrap();

        assert!(!registry.remove_trade(&old));
        assert!(Arc::ptr_eq(&registry.trade_for(user(1)).unwrap(), &new));
    }

    #[test]
    fn clear_drops_everything() {
        let registry = SessionRegistry::new();

        registry.create_pack_session(SessionKey::new(1), user(1), SessionKind::Pull, cards(&["A"]));
        registry
            .create_trade_session(SessionKey::new(1), user(1), user(2), Card::new("A", Rarity::Common))
            .unwrap();

        registry.clear();

        assert_eq!(registry.pack_count(), 0);
        assert_eq!(registry.trade_count(), 0);
    }
}
