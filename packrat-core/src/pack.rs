//! Pack assembly.

use std::collections::HashSet;

use derive_more::{Display, Error};

use packrat_model::card::Card;

use rand::{Rng, seq::IndexedRandom as _};

use crate::rarity::roll_rarity_with;

/// The number of cards in a pack.
pub const PACK_SIZE: usize = 9;

/// Pack assembly failure.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum PackError {
    /// There are no cards to draw from.
    #[display("the card pool is empty")]
    EmptyPool,
    /// The pool has fewer distinct cards than the pack needs.
    #[display("not enough distinct cards to build a pack ({distinct} of {needed})")]
    InsufficientPool { distinct: usize, needed: usize },
}

/// Builds a pack of `target` unique cards from a candidate pool.
///
/// Copies of a card in the pool count once. Each slot rolls a rarity, then
/// picks uniformly among the cards of that rarity not yet in the pack. When
/// the rarity has none left, or the pool never had it, the pick is made from
/// every card not yet in the pack. The pack is returned in draw order.
pub fn assemble_pack<R>(pool: &[Card], target: usize, rng: &mut R) -> Result<Vec<Card>, PackError>
where
    R: Rng,
{
    if pool.is_empty() {
        return Err(PackError::EmptyPool);
    }

    // cards hash by (name, rarity), so this keeps one card per identity
    let mut identities = HashSet::with_capacity(pool.len());
    let mut remaining = pool
        .iter()
        .filter(|card| identities.insert(card.key()))
        .collect::<Vec<&Card>>();

    if remaining.len() < target {
        return Err(PackError::InsufficientPool {
            distinct: remaining.len(),
            needed: target,
        });
    }

    let mut pack = Vec::with_capacity(target);

    while pack.len() < target {
        let rarity = roll_rarity_with(rng);
        let tier = (0..remaining.len())
            .filter(|&i| remaining[i].rarity == rarity)
            .collect::<Vec<_>>();

        let picked = match tier.choose(rng) {
            Some(&i) => i,
            None => rng.random_range(0..remaining.len()),
        };

        pack.push(remaining.swap_remove(picked).clone());
    }

    Ok(pack)
}

#[cfg(test)]
mod tests {
    use packrat_model::card::Rarity;

    use rand::{SeedableRng as _, rngs::StdRng};

    use super::*;

    fn pool(names: usize, rarity: Rarity) -> Vec<Card> {
        (0..names)
            .map(|n| Card::new(format!("Card {}", n), rarity.clone()))
            .collect()
    }

    fn mixed_pool() -> Vec<Card> {
        let mut pool = pool(12, Rarity::Common);
        pool.extend((0..6).map(|n| Card::new(format!("Uncommon {}", n), Rarity::Uncommon)));
        pool.extend((0..3).map(|n| Card::new(format!("Rare {}", n), Rarity::Rare)));
        pool.push(Card::new("Shiny", Rarity::SecretRare));
        pool
    }

    fn assert_unique(pack: &[Card]) {
        let keys = pack.iter().map(Card::key).collect::<HashSet<_>>();
        assert_eq!(keys.len(), pack.len(), "pack has duplicates: {:?}", pack);
    }

    #[test]
    fn pack_is_full_and_unique() {
        let pool = mixed_pool();

        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let pack = assemble_pack(&pool, PACK_SIZE, &mut rng).unwrap();

            assert_eq!(pack.len(), PACK_SIZE);
            assert_unique(&pack);
            assert!(pack.iter().all(|card| pool.contains(card)));
        }
    }

    #[test]
    fn exactly_enough_distinct_cards_with_duplicates() {
        // nine identities, each repeated, one rarity tier only
        let mut pool = pool(9, Rarity::Rare);
        pool.extend(pool.clone());

        let mut rng = StdRng::seed_from_u64(11);
        let pack = assemble_pack(&pool, PACK_SIZE, &mut rng).unwrap();

        assert_eq!(pack.len(), PACK_SIZE);
        assert_unique(&pack);
    }

    #[test]
    fn unknown_rarities_fall_back_to_whole_pool() {
        let pool = pool(15, Rarity::Other("Illustration rare".into()));

        let mut rng = StdRng::seed_from_u64(3);
        let pack = assemble_pack(&pool, PACK_SIZE, &mut rng).unwrap();

        assert_eq!(pack.len(), PACK_SIZE);
        assert_unique(&pack);
    }

    #[test]
    fn small_pool_is_an_error_not_a_hang() {
        let mut pool = pool(3, Rarity::Common);
        pool.extend(pool.clone());

        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            assemble_pack(&pool, PACK_SIZE, &mut rng),
            Err(PackError::InsufficientPool {
                distinct: 3,
                needed: PACK_SIZE,
            })
        );
    }

    #[test]
    fn same_name_different_rarity_are_distinct() {
        let pool = (0..9)
            .map(|n| {
                let rarity = if n % 2 == 0 {
                    Rarity::Common
                } else {
                    Rarity::Uncommon
                };
                Card::new(format!("Card {}", n / 2), rarity)
            })
            .collect::<Vec<_>>();

        let mut rng = StdRng::seed_from_u64(9);
        assert_eq!(assemble_pack(&pool, PACK_SIZE, &mut rng).unwrap().len(), 9);
    }

    #[test]
    fn duplicate_heavy_pool_always_fills() {
        // nine identities, one of them repeated a thousand times
        let mut pool = vec![Card::new("Flooded", Rarity::Common); 1000];
        pool.extend((0..8).map(|n| Card::new(format!("Common {}", n), Rarity::Common)));

        for seed in 0..100 {
            let mut rng = StdRng::seed_from_u64(seed);
            let pack = assemble_pack(&pool, PACK_SIZE, &mut rng).unwrap();

            assert_eq!(pack.len(), PACK_SIZE);
            assert_unique(&pack);
        }
    }

    #[test]
    fn exhausted_tiers_fall_back_to_the_rest_of_the_pool() {
        // every weighted tier has one card, the rest only show up by fallback
        let mut pool = [
            Rarity::Common,
            Rarity::Uncommon,
            Rarity::Rare,
            Rarity::RareHolo,
            Rarity::UltraRare,
            Rarity::SecretRare,
        ]
        .into_iter()
        .map(|rarity| Card::new(format!("{} card", rarity), rarity))
        .collect::<Vec<_>>();
        pool.extend((0..3).map(|n| Card::new(format!("Promo {}", n), "Promo")));

        let mut rng = StdRng::seed_from_u64(5);
        let pack = assemble_pack(&pool, PACK_SIZE, &mut rng).unwrap();

        assert_unique(&pack);
        assert_eq!(pack.len(), PACK_SIZE);
    }

    #[test]
    fn empty_pool() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            assemble_pack(&[], PACK_SIZE, &mut rng),
            Err(PackError::EmptyPool)
        );
    }

    #[test]
    fn seeded_assembly_is_reproducible() {
        let pool = mixed_pool();

        let a = assemble_pack(&pool, PACK_SIZE, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = assemble_pack(&pool, PACK_SIZE, &mut StdRng::seed_from_u64(42)).unwrap();

        assert_eq!(a, b);
    }
}
