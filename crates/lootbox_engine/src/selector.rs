//! # Weighted Selection
//!
//! Maps one random value to one reward index.
//!
//! ```text
//! weights   [ 500 | 300 | 200 ]        total = 1000
//! ranges    [0,500) [500,800) [800,1000)
//! r = random % 1000
//! ```
//!
//! Inactive entries are skipped without consuming range, but the returned
//! index is always the entry's stable pool index. For a fixed random value and
//! pool state the result never changes.

use std::collections::BTreeMap;

use alloy_primitives::U256;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::error::{LootError, LootResult};
use crate::pool::RewardEntry;

/// Picks the winning entry for `random_value`.
///
/// # Errors
///
/// - `NoRewardsAvailable` if `total_weight == 0`
/// - `InconsistentWeights` if the active weights sum to less than
///   `total_weight`, so the reduced value falls past the last range
/// - `ArithmeticOverflow` if the running sum overflows
pub fn select(random_value: U256, entries: &[RewardEntry], total_weight: u64) -> LootResult<usize> {
    if total_weight == 0 {
        return Err(LootError::NoRewardsAvailable);
    }

    let r = reduce(random_value, total_weight)?;

    let mut cumulative = 0u64;
    for entry in entries.iter().filter(|e| e.active) {
        let upper = cumulative
            .checked_add(u64::from(entry.weight))
            .ok_or(LootError::ArithmeticOverflow)?;
        if r < upper {
            tracing::debug!(
                "Selected reward {}: r={} in [{}, {})",
                entry.id,
                r,
                cumulative,
                upper
            );
            return Ok(entry.id);
        }
        cumulative = upper;
    }

    Err(LootError::InconsistentWeights {
        cached: total_weight,
        actual: cumulative,
    })
}

/// `random_value mod total_weight` as a `u64`.
///
/// # Errors
///
/// `NoRewardsAvailable` if `total_weight == 0`.
pub fn reduce(random_value: U256, total_weight: u64) -> LootResult<u64> {
    if total_weight == 0 {
        return Err(LootError::NoRewardsAvailable);
    }
    let r = random_value % U256::from(total_weight);
    // r < total_weight, which came from a u64
    u64::try_from(r).map_err(|_| LootError::ArithmeticOverflow)
}

/// Half-open cumulative range `[start, end)` of the entry at `index`.
///
/// `None` if the entry is inactive or does not exist.
#[must_use]
pub fn weight_range(entries: &[RewardEntry], index: usize) -> Option<(u64, u64)> {
    let mut cumulative = 0u64;
    for entry in entries.iter().filter(|e| e.active) {
        let upper = cumulative.checked_add(u64::from(entry.weight))?;
        if entry.id == index {
            return Some((cumulative, upper));
        }
        cumulative = upper;
    }
    None
}

/// Outcome of a selection simulation.
#[derive(Clone, Debug, Default)]
pub struct SelectionStatistics {
    /// Total number of draws.
    pub total_draws: u64,
    /// Wins per pool index.
    pub wins: BTreeMap<usize, u64>,
}

impl SelectionStatistics {
    /// Observed share of `index`, in basis points (10000 = 100%).
    #[must_use]
    pub fn share_bp(&self, index: usize) -> u64 {
        if self.total_draws == 0 {
            return 0;
        }
        self.wins.get(&index).copied().unwrap_or(0) * 10_000 / self.total_draws
    }
}

/// Runs `iterations` draws with seeded 256-bit random values.
///
/// Used to check that empirical frequencies track `weight / total_weight`.
///
/// # Errors
///
/// Whatever `select` reports for this pool.
pub fn simulate(
    entries: &[RewardEntry],
    total_weight: u64,
    iterations: u64,
    seed: u64,
) -> LootResult<SelectionStatistics> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut stats = SelectionStatistics::default();
    let mut word = [0u8; 32];

    for _ in 0..iterations {
        rng.fill_bytes(&mut word);
        let index = select(U256::from_be_bytes(word), entries, total_weight)?;
        stats.total_draws += 1;
        *stats.wins.entry(index).or_insert(0) += 1;
    }

    Ok(stats)
}
