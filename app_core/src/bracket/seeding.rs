//! Seed-to-bracket-position assignment and bye placement (spec §4.1).
//!
//! `standard_seed_order` is the classic recursive-interleave construction
//! used by every major bracket generator: seed 1 and seed 2 land in
//! opposite halves of the draw, seed 1 and seed 4 in opposite quarters, and
//! so on, so that equally-seeded players meet as late as possible.

use crate::model::ByePlacement;
use rand::seq::SliceRandom;

/// Smallest power of two `>= n` (n >= 1).
pub fn next_power_of_two(n: usize) -> usize {
    let mut size = 1usize;
    while size < n {
        size *= 2;
    }
    size
}

/// Returns, for a bracket of `size` (a power of two), the seed rank
/// (1-based) occupying each of the `size` positions in round-1 order.
pub fn standard_seed_order(size: usize) -> Vec<u32> {
    debug_assert!(size.is_power_of_two());
    if size == 1 {
        return vec![1];
    }
    let half = standard_seed_order(size / 2);
    let k = (size / 2) as u32;
    let mirrored: Vec<u32> = half.iter().map(|s| 2 * k + 1 - s).collect();
    let mut out = Vec::with_capacity(size);
    for i in 0..half.len() {
        out.push(half[i]);
        out.push(mirrored[i]);
    }
    out
}

/// Sequential seed order: position `i` simply gets seed `i + 1`, i.e. no
/// bracket spreading at all (spec `seed_order = sequential`).
pub fn sequential_seed_order(size: usize) -> Vec<u32> {
    (1..=size as u32).collect()
}

/// A round-1 pairing: two seed ranks that will meet in the same match.
/// `hi` is the numerically lower (stronger) seed, `lo` the weaker one —
/// `lo > n` means that slot is a bye.
#[derive(Debug, Clone, Copy)]
pub struct SeedPair {
    pub hi: u32,
    pub lo: u32,
}

/// Builds round-1 pairings for `n` real participants seeded `1..=n` on a
/// bracket of `size = next_power_of_two(n)`, placing the `size - n`
/// phantom (bye) seed ranks according to `placement`.
///
/// The canonical pairing (from `order`) always determines WHICH two seed
/// ranks share a match — `placement` only decides which pairing *slot*
/// (bracket position) each such pair is relocated to, so a pair's internal
/// matchup is never altered by the strategy chosen.
pub fn seed_pairs(n: usize, order_fn: impl Fn(usize) -> Vec<u32>, placement: ByePlacement) -> Vec<SeedPair> {
    let size = next_power_of_two(n.max(1));
    let order = order_fn(size);
    let num_pairs = size / 2;
    let canonical: Vec<SeedPair> = (0..num_pairs)
        .map(|p| {
            let a = order[2 * p];
            let b = order[2 * p + 1];
            if a < b {
                SeedPair { hi: a, lo: b }
            } else {
                SeedPair { hi: b, lo: a }
            }
        })
        .collect();

    let num_byes = size - n;
    if num_byes == 0 {
        return canonical;
    }

    let is_bye_pair = |p: &SeedPair| p.lo as usize > n;
    match placement {
        ByePlacement::Traditional => canonical,
        ByePlacement::Spread => {
            let targets: Vec<usize> = (0..num_byes).map(|i| i * num_pairs / num_byes).collect();
            relocate(canonical, &targets, is_bye_pair)
        }
        ByePlacement::BottomHalf => {
            let targets: Vec<usize> = ((num_pairs - num_byes)..num_pairs).collect();
            relocate(canonical, &targets, is_bye_pair)
        }
        ByePlacement::Random => {
            let mut shuffled = canonical;
            shuffled.shuffle(&mut rand::rng());
            shuffled
        }
    }
}

/// Permutes `pairs` so that every index in `targets` ends up holding a
/// bye-pair and every other index holds a non-bye-pair, preserving the
/// relative order within each group.
fn relocate(pairs: Vec<SeedPair>, targets: &[usize], is_bye_pair: impl Fn(&SeedPair) -> bool) -> Vec<SeedPair> {
    let mut byes: Vec<SeedPair> = pairs.iter().copied().filter(|p| is_bye_pair(p)).collect();
    let mut rest: Vec<SeedPair> = pairs.iter().copied().filter(|p| !is_bye_pair(p)).collect();
    byes.reverse();
    rest.reverse();
    let target_set: std::collections::HashSet<usize> = targets.iter().copied().collect();
    let mut out = Vec::with_capacity(pairs.len());
    for i in 0..pairs.len() {
        if target_set.contains(&i) {
            out.push(byes.pop().unwrap_or_else(|| rest.pop().expect("pair accounting")));
        } else {
            out.push(rest.pop().unwrap_or_else(|| byes.pop().expect("pair accounting")));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_of_one_is_one() {
        assert_eq!(standard_seed_order(1), vec![1]);
    }

    #[test]
    fn order_of_four_matches_known_bracket() {
        assert_eq!(standard_seed_order(4), vec![1, 4, 2, 3]);
    }

    #[test]
    fn order_of_eight_matches_known_bracket() {
        assert_eq!(standard_seed_order(8), vec![1, 8, 4, 5, 2, 7, 3, 6]);
    }

    #[test]
    fn traditional_byes_pair_with_top_seeds() {
        let pairs = seed_pairs(5, standard_seed_order, ByePlacement::Traditional);
        assert_eq!(pairs.len(), 4);
        let bye_count = pairs.iter().filter(|p| p.lo as usize > 5).count();
        assert_eq!(bye_count, 3);
    }

    #[test]
    fn bottom_half_confines_byes_to_back_half() {
        let pairs = seed_pairs(5, standard_seed_order, ByePlacement::BottomHalf);
        assert!(pairs[3].lo as usize > 5);
    }

    #[test]
    fn bye_count_matches_size_minus_n_for_every_strategy() {
        for placement in [
            ByePlacement::Traditional,
            ByePlacement::Spread,
            ByePlacement::BottomHalf,
        ] {
            let pairs = seed_pairs(11, standard_seed_order, placement);
            let bye_count = pairs.iter().filter(|p| p.lo as usize > 11).count();
            assert_eq!(bye_count, 16 - 11, "placement {placement:?}");
        }
    }
}
