//! Weighted rarity rolls.

use packrat_model::card::Rarity;

use rand::Rng;

/// The rarity table packs are weighted by.
///
/// Weights sum to 1. Order matters: a draw is matched against the running
/// total of the weights in this order.
pub const RARITY_WEIGHTS: [(Rarity, f64); 6] = [
    (Rarity::Common, 0.50),
    (Rarity::Uncommon, 0.20),
    (Rarity::Rare, 0.15),
    (Rarity::RareHolo, 0.05),
    (Rarity::UltraRare, 0.07),
    (Rarity::SecretRare, 0.03),
];

/// Selects the rarity a uniform draw in `[0, 1)` lands on.
///
/// Returns the first rarity whose cumulative weight is at least `draw`. A
/// draw left unmatched by rounding falls back to [`Rarity::Common`].
pub fn roll_rarity(draw: f64) -> Rarity {
    let mut cumulative = 0.0;

    for (rarity, weight) in RARITY_WEIGHTS.iter() {
        cumulative += weight;

        if draw <= cumulative {
            return rarity.clone();
        }
    }

    Rarity::Common
}

/// Rolls a rarity with a random number generator.
pub fn roll_rarity_with<R>(rng: &mut R) -> Rarity
where
    R: Rng,
{
    roll_rarity(rng.random::<f64>())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::{SeedableRng as _, rngs::StdRng};

    use super::*;

    #[test]
    fn weights_sum_to_one() {
        let total: f64 = RARITY_WEIGHTS.iter().map(|(_, weight)| weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn boundaries() {
        assert_eq!(roll_rarity(0.0), Rarity::Common);
        assert_eq!(roll_rarity(0.5), Rarity::Common);
        assert_eq!(roll_rarity(0.5001), Rarity::Uncommon);
        assert_eq!(roll_rarity(0.86), Rarity::RareHolo);
        assert_eq!(roll_rarity(0.99), Rarity::SecretRare);
    }

    #[test]
    fn unmatched_draw_falls_back_to_common() {
        assert_eq!(roll_rarity(1.5), Rarity::Common);
        assert_eq!(roll_rarity(f64::NAN), Rarity::Common);
    }

    #[test]
    fn even_draws_converge_to_weights() {
        const DRAWS: usize = 100_000;

        let mut counts = HashMap::new();
        for i in 0..DRAWS {
            let draw = i as f64 / DRAWS as f64;
            *counts.entry(roll_rarity(draw)).or_insert(0usize) += 1;
        }

        for (rarity, weight) in RARITY_WEIGHTS.iter() {
            let observed = counts.get(rarity).copied().unwrap_or(0) as f64 / DRAWS as f64;
            assert!(
                (observed - weight).abs() < 0.005,
                "{} observed {} expected {}",
                rarity,
                observed,
                weight
            );
        }
    }

    #[test]
    fn seeded_rolls_converge_to_weights() {
        const DRAWS: usize = 200_000;

        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut counts = HashMap::new();
        for _ in 0..DRAWS {
            *counts.entry(roll_rarity_with(&mut rng)).or_insert(0usize) += 1;
        }

        for (rarity, weight) in RARITY_WEIGHTS.iter() {
            let observed = counts.get(rarity).copied().unwrap_or(0) as f64 / DRAWS as f64;
            assert!((observed - weight).abs() < 0.01, "{} drifted", rarity);
        }
    }
}
