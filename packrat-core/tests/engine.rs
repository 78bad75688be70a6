use std::sync::Arc;

use packrat_core::{
    Engine, Failure, Render,
    action::{ActionEvent, Inbound, Membership, TradeTarget},
    config::EngineConfig,
    engine::{CardView, Notice},
    pack::{PACK_SIZE, PackError},
    session::{SessionKey, SessionKind},
    store::{CollectionStore as _, MemoryStore},
};
use packrat_model::{
    UserId,
    card::{Card, Rarity},
    collection::{COLLECTION_CAPACITY, UserCollection},
};

const SET: &str = "base1";

fn user(id: u64) -> UserId {
    UserId::new(id).unwrap()
}

fn key(id: u64) -> SessionKey {
    SessionKey::new(id)
}

fn engine() -> Engine<MemoryStore> {
    Engine::new(MemoryStore::new(), EngineConfig::default())
}

fn pool() -> Vec<Card> {
    let rarities = [
        Rarity::Common,
        Rarity::Uncommon,
        Rarity::Rare,
        Rarity::RareHolo,
    ];

    (0..20)
        .map(|n| {
            Card::new(format!("Card {}", n), rarities[n % rarities.len()].clone())
                .image(format!("https://assets.example/{}", n))
                .set_id(SET)
        })
        .collect()
}

fn common(name: &str) -> Card {
    Card::new(name, Rarity::Common)
}

async fn seed(engine: &Engine<MemoryStore>, user_id: UserId, cards: Vec<Card>) {
    let collection = UserCollection {
        cards,
        ..UserCollection::new(user_id)
    };
    engine.store().save(&collection).await.unwrap();
}

async fn act(
    engine: &Engine<MemoryStore>,
    key: SessionKey,
    user_id: UserId,
    event: ActionEvent,
) -> Result<Render, Failure> {
    engine
        .handle(Inbound::new(key, user_id, event), &pool())
        .await
}

fn pull_event() -> ActionEvent {
    ActionEvent::Pull {
        set: SET.into(),
        pool_size: 100,
    }
}

fn member(id: u64) -> TradeTarget {
    TradeTarget {
        user: user(id),
        membership: Membership::Member,
    }
}

fn card_view(render: Render) -> CardView {
    match render {
        Render::Card(view) => view,
        other => panic!("expected a card view, got {:?}", other),
    }
}

#[tokio::test]
async fn pull_deals_a_unique_pack() {
    let engine = engine();

    let view = card_view(act(&engine, key(1), user(1), pull_event()).await.unwrap());
    assert_eq!(view.kind, SessionKind::Pull);
    assert_eq!(view.index, 0);
    assert_eq!(view.position(), 1);
    assert_eq!(view.total, PACK_SIZE);
    assert!(!view.saved);

    let session = engine.sessions().get(key(1)).unwrap();
    let session = session.lock().await;
    let mut names = session
        .cards()
        .iter()
        .map(|card| card.name.clone())
        .collect::<Vec<_>>();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), PACK_SIZE);

    assert_eq!(engine.store().load(user(1)).await.packs_pulled, 1);
    assert_eq!(engine.stats().pulls, 1);
}

#[tokio::test]
async fn pull_from_small_pool_is_an_explicit_error() {
    let engine = engine();
    let small = vec![common("A"), common("B"), common("C")];

    let res = engine
        .handle(Inbound::new(key(1), user(1), pull_event()), &small)
        .await;

    assert!(matches!(
        res,
        Err(Failure::Pack(PackError::InsufficientPool {
            distinct: 3,
            needed: 9
        }))
    ));
    assert!(engine.sessions().get(key(1)).is_none());
}

#[tokio::test]
async fn pull_from_unknown_set_finds_nothing() {
    let engine = engine();

    let res = act(
        &engine,
        key(1),
        user(1),
        ActionEvent::Pull {
            set: "jungle".into(),
            pool_size: 100,
        },
    )
    .await;

    assert!(matches!(res, Err(Failure::NoCardsFound { set }) if set == "jungle"));
    assert_eq!(engine.store().writes(), 0);
}

#[tokio::test]
async fn pull_from_locked_set_is_refused() {
    let engine = engine();
    engine.lock_set(SET);

    let res = act(&engine, key(1), user(1), pull_event()).await;
    assert!(matches!(res, Err(Failure::SetLocked { .. })));

    // a refused pull does not use up the daily allowance
    engine.unlock_set(SET);
    assert_eq!(engine.limiter().used_on(user(1), chrono::Utc::now().date_naive()), 0);
    act(&engine, key(2), user(1), pull_event()).await.unwrap();
}

#[tokio::test]
async fn daily_pull_limit() {
    let engine = Engine::new(
        MemoryStore::new(),
        EngineConfig {
            daily_pull_limit: 2,
            ..Default::default()
        },
    );

    act(&engine, key(1), user(1), pull_event()).await.unwrap();
    act(&engine, key(2), user(1), pull_event()).await.unwrap();

    let res = act(&engine, key(3), user(1), pull_event()).await;
    assert!(matches!(res, Err(Failure::DailyLimit { limit: 2 })));

    // other users are unaffected
    act(&engine, key(4), user(2), pull_event()).await.unwrap();
}

#[tokio::test]
async fn navigation_wraps_around() {
    let engine = engine();
    seed(&engine, user(1), vec![common("A"), common("B"), common("C")]).await;

    engine.open_collection(key(1), user(1)).await.unwrap();

    act(&engine, key(1), user(1), ActionEvent::Next).await.unwrap();
    let view = card_view(act(&engine, key(1), user(1), ActionEvent::Next).await.unwrap());
    assert_eq!(view.index, 2);

    let view = card_view(act(&engine, key(1), user(1), ActionEvent::Next).await.unwrap());
    assert_eq!(view.index, 0);
    assert_eq!(view.card.name, "A");

    let view = card_view(act(&engine, key(1), user(1), ActionEvent::Previous).await.unwrap());
    assert_eq!(view.index, 2);
    assert_eq!(view.card.name, "C");
}

#[tokio::test]
async fn saving_twice_persists_once() {
    let engine = engine();

    act(&engine, key(1), user(1), pull_event()).await.unwrap();

    let view = card_view(act(&engine, key(1), user(1), ActionEvent::Save).await.unwrap());
    assert_eq!(view.notice, Some(Notice::Saved));
    assert!(view.saved);
    let writes = engine.store().writes();

    let view = card_view(act(&engine, key(1), user(1), ActionEvent::Save).await.unwrap());
    assert_eq!(view.notice, Some(Notice::AlreadySaved));
    assert_eq!(engine.store().writes(), writes);

    let collection = engine.store().load(user(1)).await;
    assert_eq!(collection.cards, [view.card]);
}

#[tokio::test]
async fn full_collection_rejects_save_without_writing() {
    let engine = engine();
    let owned = (0..COLLECTION_CAPACITY)
        .map(|n| common(&format!("Owned {}", n)))
        .collect::<Vec<_>>();
    seed(&engine, user(1), owned.clone()).await;

    act(&engine, key(1), user(1), pull_event()).await.unwrap();
    let writes = engine.store().writes();

    let view = card_view(act(&engine, key(1), user(1), ActionEvent::Save).await.unwrap());
    assert_eq!(view.notice, Some(Notice::CollectionFull));
    assert!(!view.saved);

    assert_eq!(engine.store().writes(), writes);
    assert_eq!(engine.store().load(user(1)).await.cards, owned);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_saves_respect_capacity() {
    let engine = Arc::new(engine());
    let owned = (0..COLLECTION_CAPACITY - 1)
        .map(|n| common(&format!("Owned {}", n)))
        .collect::<Vec<_>>();
    seed(&engine, user(1), owned).await;

    for n in 1..=4 {
        act(&engine, key(n), user(1), pull_event()).await.unwrap();
    }

    let tasks = (1..=4)
        .map(|n| {
            let engine = engine.clone();
            tokio::spawn(async move {
                let pool = pool();
                engine
                    .handle(Inbound::new(key(n), user(1), ActionEvent::Save), &pool)
                    .await
            })
        })
        .collect::<Vec<_>>();

    let mut saved = 0;
    for task in tasks {
        let view = card_view(task.await.unwrap().unwrap());
        if view.notice == Some(Notice::Saved) {
            saved += 1;
        }
    }

    assert_eq!(saved, 1);
    assert_eq!(engine.store().load(user(1)).await.cards.len(), COLLECTION_CAPACITY);
}

#[tokio::test]
async fn only_the_owner_can_act() {
    let engine = engine();
    act(&engine, key(1), user(1), pull_event()).await.unwrap();

    let res = act(&engine, key(1), user(2), ActionEvent::Next).await;
    assert!(matches!(res, Err(Failure::NotSessionOwner)));

    let res = act(&engine, key(1), user(2), ActionEvent::Save).await;
    assert!(matches!(res, Err(Failure::NotSessionOwner)));
    assert!(engine.store().load(user(2)).await.cards.is_empty());
}

#[tokio::test]
async fn missing_session_is_silent() {
    let engine = engine();

    let failure = act(&engine, key(404), user(1), ActionEvent::Save)
        .await
        .unwrap_err();
    assert!(matches!(failure, Failure::SessionExpired));
    assert!(failure.is_silent());
}

#[tokio::test]
async fn actions_outside_their_session_kind_do_nothing() {
    let engine = engine();
    seed(&engine, user(1), vec![common("A")]).await;

    engine.open_collection(key(1), user(1)).await.unwrap();
    act(&engine, key(2), user(1), pull_event()).await.unwrap();
    let writes = engine.store().writes();

    let view = card_view(act(&engine, key(1), user(1), ActionEvent::Save).await.unwrap());
    assert_eq!(view.notice, None);

    let view = card_view(act(&engine, key(2), user(1), ActionEvent::Delete).await.unwrap());
    assert_eq!(view.notice, None);
    let view = card_view(act(&engine, key(2), user(1), ActionEvent::Favorite).await.unwrap());
    assert_eq!(view.notice, None);

    assert_eq!(engine.store().writes(), writes);
}

#[tokio::test]
async fn empty_collection_cannot_be_browsed() {
    let engine = engine();

    let res = engine.open_collection(key(1), user(1)).await;
    assert!(matches!(res, Err(Failure::EmptyCollection)));
    assert_eq!(engine.sessions().pack_count(), 0);
}

#[tokio::test]
async fn delete_clears_favorite_and_drops_only_the_shown_entry() {
    let engine = engine();
    let collection = UserCollection {
        cards: vec![common("A"), common("B"), common("A"), common("C")],
        favorite_card: Some(common("A")),
        ..UserCollection::new(user(1))
    };
    engine.store().save(&collection).await.unwrap();

    let view = card_view(engine.open_collection(key(1), user(1)).await.unwrap());
    assert!(view.favorite);

    let view = card_view(act(&engine, key(1), user(1), ActionEvent::Delete).await.unwrap());
    assert_eq!(view.notice, Some(Notice::Removed { name: "A".into() }));
    assert_eq!(view.card.name, "B");
    assert_eq!(view.index, 0);
    // the browsing session only drops the entry that was showing
    assert_eq!(view.total, 3);

    let stored = engine.store().load(user(1)).await;
    assert_eq!(stored.cards, [common("B"), common("C")]);
    assert_eq!(stored.favorite_card, None);

    // the other copy is still listed but no longer owned
    act(&engine, key(1), user(1), ActionEvent::Next).await.unwrap();
    let res = act(&engine, key(1), user(1), ActionEvent::Delete).await;
    assert!(matches!(res, Err(Failure::CardNotOwned)));

    // deleting at the end clamps back onto the last card
    act(&engine, key(1), user(1), ActionEvent::Next).await.unwrap();
    let view = card_view(act(&engine, key(1), user(1), ActionEvent::Delete).await.unwrap());
    assert_eq!(view.card.name, "A");
    assert_eq!(view.index, 1);
    assert_eq!(view.total, 2);
    assert_eq!(engine.store().load(user(1)).await.cards, [common("B")]);
}

#[tokio::test]
async fn deleting_the_last_card_closes_the_session() {
    let engine = engine();
    seed(&engine, user(1), vec![common("A")]).await;

    engine.open_collection(key(1), user(1)).await.unwrap();

    let render = act(&engine, key(1), user(1), ActionEvent::Delete).await.unwrap();
    assert_eq!(
        render,
        Render::Closed {
            notice: Notice::CollectionEmpty
        }
    );
    assert!(engine.store().load(user(1)).await.cards.is_empty());
    assert!(engine.sessions().get(key(1)).is_none());

    let res = act(&engine, key(1), user(1), ActionEvent::Next).await;
    assert!(matches!(res, Err(Failure::SessionExpired)));
}

#[tokio::test]
async fn favorite_is_persisted_and_flagged() {
    let engine = engine();
    seed(&engine, user(1), vec![common("A"), common("B")]).await;

    engine.open_collection(key(1), user(1)).await.unwrap();
    act(&engine, key(1), user(1), ActionEvent::Next).await.unwrap();

    let view = card_view(act(&engine, key(1), user(1), ActionEvent::Favorite).await.unwrap());
    assert_eq!(view.notice, Some(Notice::Favorited));
    assert!(view.favorite);
    assert_eq!(
        engine.store().load(user(1)).await.favorite_card,
        Some(common("B"))
    );

    let writes = engine.store().writes();
    act(&engine, key(1), user(1), ActionEvent::Favorite).await.unwrap();
    assert_eq!(engine.store().writes(), writes);

    let view = card_view(act(&engine, key(1), user(1), ActionEvent::Next).await.unwrap());
    assert_eq!(view.card.name, "A");
    assert!(!view.favorite);
}

#[tokio::test]
async fn trade_exclusivity_and_release() {
    let engine = engine();
    seed(&engine, user(1), vec![common("A"), common("B")]).await;
    seed(&engine, user(3), vec![common("C")]).await;

    let propose = |target| ActionEvent::TradePropose {
        target,
        card_index: 1,
    };

    act(&engine, key(1), user(1), propose(member(2))).await.unwrap();

    // as sender, and as target
    let res = act(&engine, key(2), user(1), propose(member(3))).await;
    assert!(matches!(res, Err(Failure::AlreadyTrading { .. })));
    let res = act(&engine, key(3), user(3), propose(member(1))).await;
    assert!(matches!(res, Err(Failure::AlreadyTrading { .. })));
    assert_eq!(engine.stats().trades, 1);

    act(&engine, key(4), user(2), ActionEvent::TradeConfirm { proposal: None })
        .await
        .unwrap();
    act(&engine, key(5), user(1), propose(member(3))).await.unwrap();

    act(&engine, key(6), user(3), ActionEvent::TradeCancel { proposal: None })
        .await
        .unwrap();
    act(&engine, key(7), user(3), propose(member(1))).await.unwrap();
}

#[tokio::test]
async fn confirmed_trade_moves_one_copy() {
    let engine = engine();
    seed(&engine, user(1), vec![common("A"), common("B"), common("A")]).await;
    seed(&engine, user(2), vec![common("Z")]).await;

    let render = act(
        &engine,
        key(1),
        user(1),
        ActionEvent::TradePropose {
            target: member(2),
            card_index: 3,
        },
    )
    .await
    .unwrap();
    let Render::TradeProposed { trade } = render else {
        panic!("expected a proposal, got {:?}", render);
    };
    assert_eq!(trade.card, common("A"));
    assert_eq!(trade.receiver, user(2));

    let res = act(&engine, key(2), user(1), ActionEvent::TradeConfirm { proposal: None }).await;
    assert!(matches!(res, Err(Failure::NotTradeReceiver)));

    let render = act(&engine, key(3), user(2), ActionEvent::TradeConfirm { proposal: None })
        .await
        .unwrap();
    assert!(matches!(render, Render::TradeCompleted { .. }));

    let sender = engine.store().load(user(1)).await;
    let receiver = engine.store().load(user(2)).await;
    assert_eq!(sender.cards, [common("B"), common("A")]);
    assert_eq!(receiver.cards, [common("Z"), common("A")]);
    assert_eq!(sender.cards_traded, 1);
    assert_eq!(receiver.cards_traded, 1);

    assert!(engine.sessions().trade_for(user(1)).is_none());
    assert!(engine.sessions().trade_for(user(2)).is_none());
}

#[tokio::test]
async fn cancelled_trade_changes_nothing() {
    let engine = engine();
    seed(&engine, user(1), vec![common("A")]).await;
    seed(&engine, user(2), vec![common("Z")]).await;

    act(
        &engine,
        key(1),
        user(1),
        ActionEvent::TradePropose {
            target: member(2),
            card_index: 1,
        },
    )
    .await
    .unwrap();

    let render = act(&engine, key(2), user(2), ActionEvent::TradeCancel { proposal: None })
        .await
        .unwrap();
    assert!(matches!(render, Render::TradeCancelled { by, .. } if by == user(2)));

    assert_eq!(engine.store().load(user(1)).await.cards, [common("A")]);
    assert_eq!(engine.store().load(user(2)).await.cards, [common("Z")]);
    assert_eq!(engine.store().load(user(1)).await.cards_traded, 0);

    let res = act(&engine, key(3), user(2), ActionEvent::TradeConfirm { proposal: None }).await;
    assert!(matches!(res, Err(Failure::NoPendingTrade)));
}

#[tokio::test]
async fn trade_buttons_only_act_on_their_own_proposal() {
    let engine = engine();
    seed(&engine, user(1), vec![common("A")]).await;
    seed(&engine, user(3), vec![common("C")]).await;
    seed(&engine, user(4), vec![common("D")]).await;

    let propose = |target| ActionEvent::TradePropose {
        target,
        card_index: 1,
    };
    let accept = |id| ActionEvent::TradeConfirm {
        proposal: Some(key(id)),
    };
    let cancel = |id| ActionEvent::TradeCancel {
        proposal: Some(key(id)),
    };

    act(&engine, key(100), user(1), propose(member(2))).await.unwrap();
    act(&engine, key(101), user(1), ActionEvent::TradeCancel { proposal: None })
        .await
        .unwrap();
    act(&engine, key(200), user(3), propose(member(2))).await.unwrap();

    // the cancelled proposal's accept button is stale
    let res = act(&engine, key(100), user(2), accept(100)).await;
    assert!(matches!(res, Err(Failure::SessionExpired)));
    let pending = engine.sessions().trade_for(user(2)).unwrap();
    assert_eq!(pending.key, key(200));
    assert_eq!(engine.store().load(user(3)).await.cards, [common("C")]);
    assert!(engine.store().load(user(2)).await.cards.is_empty());

    // a bystander's own trade survives pressing someone else's cancel
    act(&engine, key(300), user(4), propose(member(5))).await.unwrap();
    let res = act(&engine, key(200), user(4), cancel(200)).await;
    assert!(matches!(res, Err(Failure::SessionExpired)));
    assert_eq!(engine.sessions().trade_for(user(4)).unwrap().key, key(300));
    assert_eq!(engine.sessions().trade_for(user(5)).unwrap().key, key(300));

    // with no trade at all a button is just as stale
    let res = act(&engine, key(200), user(6), accept(200)).await;
    assert!(matches!(res, Err(Failure::SessionExpired)));

    let render = act(&engine, key(200), user(2), accept(200)).await.unwrap();
    assert!(matches!(render, Render::TradeCompleted { ref trade } if trade.sender == user(3)));
    assert_eq!(engine.store().load(user(2)).await.cards, [common("C")]);
    assert_eq!(engine.stats().trades, 1);
}

#[tokio::test]
async fn full_receiver_keeps_trade_pending() {
    let engine = engine();
    seed(&engine, user(1), vec![common("A")]).await;
    seed(
        &engine,
        user(2),
        (0..COLLECTION_CAPACITY)
            .map(|n| common(&format!("Owned {}", n)))
            .collect(),
    )
    .await;

    act(
        &engine,
        key(1),
        user(1),
        ActionEvent::TradePropose {
            target: member(2),
            card_index: 1,
        },
    )
    .await
    .unwrap();

    let res = act(&engine, key(2), user(2), ActionEvent::TradeConfirm { proposal: None }).await;
    assert!(matches!(res, Err(Failure::ReceiverFull)));
    assert!(engine.sessions().trade_for(user(2)).is_some());
    assert_eq!(engine.store().load(user(1)).await.cards, [common("A")]);
}

#[tokio::test]
async fn traded_away_card_voids_the_trade() {
    let engine = engine();
    seed(&engine, user(1), vec![common("A"), common("B")]).await;

    act(
        &engine,
        key(1),
        user(1),
        ActionEvent::TradePropose {
            target: member(2),
            card_index: 1,
        },
    )
    .await
    .unwrap();

    seed(&engine, user(1), vec![common("B")]).await;

    let res = act(&engine, key(2), user(2), ActionEvent::TradeConfirm { proposal: None }).await;
    assert!(matches!(res, Err(Failure::TradeCardGone)));
    assert!(engine.sessions().trade_for(user(1)).is_none());
    assert!(engine.store().load(user(2)).await.cards.is_empty());
}

#[tokio::test]
async fn malformed_proposals_leave_no_trade() {
    let engine = engine();
    seed(&engine, user(1), vec![common("A"), common("B")]).await;

    for card_index in [0, 3, -1] {
        let res = act(
            &engine,
            key(1),
            user(1),
            ActionEvent::TradePropose {
                target: member(2),
                card_index,
            },
        )
        .await;
        assert!(
            matches!(res, Err(Failure::InvalidCardIndex { index, owned: 2 }) if index == card_index)
        );
    }

    let cases = [
        (member(1), "self"),
        (
            TradeTarget {
                user: user(2),
                membership: Membership::Bot,
            },
            "bot",
        ),
        (
            TradeTarget {
                user: user(2),
                membership: Membership::Absent,
            },
            "absent",
        ),
    ];
    for (target, case) in cases {
        let failure = act(
            &engine,
            key(1),
            user(1),
            ActionEvent::TradePropose {
                target,
                card_index: 1,
            },
        )
        .await
        .unwrap_err();

        match case {
            "self" => assert!(matches!(failure, Failure::SelfTrade)),
            "bot" => assert!(matches!(failure, Failure::TargetIsBot)),
            _ => assert!(matches!(failure, Failure::UnknownTarget)),
        }
    }

    let res = act(
        &engine,
        key(1),
        user(5),
        ActionEvent::TradePropose {
            target: member(2),
            card_index: 1,
        },
    )
    .await;
    assert!(matches!(res, Err(Failure::EmptyCollection)));

    assert_eq!(engine.sessions().trade_count(), 0);
}

#[tokio::test]
async fn departed_member_is_forgotten() {
    let engine = engine();
    seed(&engine, user(1), vec![common("A")]).await;

    act(
        &engine,
        key(1),
        user(1),
        ActionEvent::TradePropose {
            target: member(2),
            card_index: 1,
        },
    )
    .await
    .unwrap();

    engine.member_left(user(1)).await.unwrap();

    assert_eq!(
        engine.store().load(user(1)).await,
        UserCollection::new(user(1))
    );
    assert!(engine.sessions().trade_for(user(2)).is_none());
}

#[tokio::test]
async fn departed_member_loses_open_sessions() {
    let engine = engine();
    seed(&engine, user(1), vec![common("A"), common("B")]).await;

    engine.open_collection(key(1), user(1)).await.unwrap();
    act(&engine, key(2), user(1), pull_event()).await.unwrap();
    act(&engine, key(3), user(2), pull_event()).await.unwrap();
    assert_eq!(engine.sessions().pack_count(), 3);

    engine.member_left(user(1)).await.unwrap();

    assert!(engine.sessions().get(key(1)).is_none());
    assert!(engine.sessions().get(key(2)).is_none());
    assert!(engine.sessions().get(key(3)).is_some());
    assert_eq!(engine.sessions().pack_count(), 1);

    let res = act(&engine, key(2), user(1), ActionEvent::Save).await;
    assert!(matches!(res, Err(Failure::SessionExpired)));
}

#[tokio::test]
async fn profile_summarizes_collection() {
    let engine = engine();
    let collection = UserCollection {
        cards: vec![
            common("A"),
            Card::new("A", Rarity::RareHolo),
            common("B"),
        ],
        packs_pulled: 4,
        cards_traded: 2,
        favorite_card: Some(common("B")),
        ..UserCollection::new(user(1))
    };
    engine.store().save(&collection).await.unwrap();

    let profile = engine.profile(user(1)).await.unwrap();
    assert_eq!(profile.packs_pulled, 4);
    assert_eq!(profile.cards_saved, 3);
    assert_eq!(profile.distinct_cards, 2);
    assert_eq!(profile.cards_traded, 2);
    assert_eq!(profile.favorite_card, Some(common("B")));
}
