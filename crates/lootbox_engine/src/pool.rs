//! # Reward Pool
//!
//! Append-only list of prizes with a cached total weight.
//!
//! Entries are never removed. Deactivation (`active = false`) takes an entry
//! out of the draw but keeps its index, so request history and events that
//! name an index stay valid forever.
//!
//! The cached `total_weight` always equals the sum of `weight` over active
//! entries; every mutation adjusts it with checked arithmetic.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::{LootError, LootResult};

/// Asset standard of a reward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RewardKind {
    /// ERC-20 style amount.
    Fungible = 0,
    /// ERC-721 style one-of-a-kind token.
    Unique = 1,
    /// ERC-1155 style id + amount.
    SemiFungible = 2,
}

impl RewardKind {
    /// Converts from the on-chain `uint8` tag.
    #[inline]
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Fungible),
            1 => Some(Self::Unique),
            2 => Some(Self::SemiFungible),
            _ => None,
        }
    }

    /// Lower-case name, as used in config files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fungible => "fungible",
            Self::Unique => "unique",
            Self::SemiFungible => "semi_fungible",
        }
    }
}

impl std::fmt::Display for RewardKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured prize.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewardEntry {
    /// Stable index (insertion order).
    pub id: usize,
    /// Asset standard.
    pub kind: RewardKind,
    /// Asset contract.
    pub asset: Address,
    /// Token id (ignored for fungible rewards).
    pub sub_id: U256,
    /// Quantity per win (always 1 for unique rewards).
    pub amount: U256,
    /// Selection weight.
    pub weight: u32,
    /// Whether the entry takes part in the draw.
    pub active: bool,
}

impl RewardEntry {
    /// Weight this entry contributes to the total.
    #[inline]
    #[must_use]
    pub fn effective_weight(&self) -> u64 {
        if self.active {
            u64::from(self.weight)
        } else {
            0
        }
    }
}

/// Ordered reward entries plus the cached active weight.
#[derive(Clone, Debug, Default)]
pub struct RewardPool {
    entries: Vec<RewardEntry>,
    total_weight: u64,
}

impl RewardPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an active entry and returns its index.
    ///
    /// # Errors
    ///
    /// - `ZeroWeight` if `weight == 0`
    /// - `InvalidAmount` if a unique reward is not exactly 1, or any other
    ///   reward is 0
    /// - `ArithmeticOverflow` if the total weight would overflow
    pub fn add_reward(
        &mut self,
        kind: RewardKind,
        asset: Address,
        sub_id: U256,
        amount: U256,
        weight: u32,
    ) -> LootResult<usize> {
        let total_weight = self.check_add(kind, amount, weight)?;

        let id = self.entries.len();
        self.entries.push(RewardEntry {
            id,
            kind,
            asset,
            sub_id,
            amount,
            weight,
            active: true,
        });
        self.total_weight = total_weight;
        Ok(id)
    }

    /// Validates an `add_reward` without applying it.
    ///
    /// Returns the total weight the pool would have afterwards.
    ///
    /// # Errors
    ///
    /// Same as `add_reward`.
    pub fn check_add(&self, kind: RewardKind, amount: U256, weight: u32) -> LootResult<u64> {
        if weight == 0 {
            return Err(LootError::ZeroWeight);
        }
        Self::validate_amount(kind, amount)?;
        self.total_weight
            .checked_add(u64::from(weight))
            .ok_or(LootError::ArithmeticOverflow)
    }

    /// Changes weight and activation of an existing entry.
    ///
    /// The old contribution is removed and the new one added, so weight can
    /// be changed while inactive and takes effect on reactivation.
    ///
    /// # Errors
    ///
    /// - `IndexOutOfRange` for an unknown index
    /// - `ZeroWeight` if `active` is requested with `weight == 0`
    /// - `ArithmeticOverflow` if the total weight would overflow
    pub fn update_reward(&mut self, index: usize, weight: u32, active: bool) -> LootResult<()> {
        let total_weight = self.check_update(index, weight, active)?;

        if let Some(entry) = self.entries.get_mut(index) {
            entry.weight = weight;
            entry.active = active;
            self.total_weight = total_weight;
        }
        Ok(())
    }

    /// Validates an `update_reward` without applying it.
    ///
    /// Returns the total weight the pool would have afterwards.
    ///
    /// # Errors
    ///
    /// Same as `update_reward`.
    pub fn check_update(&self, index: usize, weight: u32, active: bool) -> LootResult<u64> {
        let entry = self.get_reward(index)?;
        if active && weight == 0 {
            return Err(LootError::ZeroWeight);
        }

        let new_contribution = if active { u64::from(weight) } else { 0 };
        self.total_weight
            .checked_sub(entry.effective_weight())
            .and_then(|t| t.checked_add(new_contribution))
            .ok_or(LootError::ArithmeticOverflow)
    }

    /// Takes an entry out of the draw, keeping its weight.
    ///
    /// Returns `false` if it was already inactive.
    ///
    /// # Errors
    ///
    /// `IndexOutOfRange` for an unknown index.
    pub fn deactivate(&mut self, index: usize) -> LootResult<bool> {
        let entry = self.get_reward(index)?;
        if !entry.active {
            return Ok(false);
        }
        let weight = entry.weight;
        self.update_reward(index, weight, false)?;
        Ok(true)
    }

    /// Active entries, in index order.
    pub fn active_rewards(&self) -> impl Iterator<Item = &RewardEntry> {
        self.entries.iter().filter(|e| e.active)
    }

    /// Entry at `index`.
    ///
    /// # Errors
    ///
    /// `IndexOutOfRange` for an unknown index.
    pub fn get_reward(&self, index: usize) -> LootResult<&RewardEntry> {
        self.entries.get(index).ok_or(LootError::IndexOutOfRange {
            index,
            len: self.entries.len(),
        })
    }

    /// All entries, active or not.
    #[must_use]
    pub fn entries(&self) -> &[RewardEntry] {
        &self.entries
    }

    /// Number of entries ever added.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entry was ever added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached sum of active weights.
    #[must_use]
    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    /// Recomputes the active weight sum and compares it to the cache.
    ///
    /// # Errors
    ///
    /// `InconsistentWeights` on mismatch.
    pub fn verify_total_weight(&self) -> LootResult<()> {
        let actual = self
            .entries
            .iter()
            .try_fold(0u64, |acc, e| acc.checked_add(e.effective_weight()))
            .ok_or(LootError::ArithmeticOverflow)?;
        if actual == self.total_weight {
            Ok(())
        } else {
            Err(LootError::InconsistentWeights {
                cached: self.total_weight,
                actual,
            })
        }
    }

    fn validate_amount(kind: RewardKind, amount: U256) -> LootResult<()> {
        let valid = match kind {
            RewardKind::Unique => amount == U256::from(1),
            RewardKind::Fungible | RewardKind::SemiFungible => amount > U256::ZERO,
        };
        if valid {
            Ok(())
        } else {
            Err(LootError::InvalidAmount {
                kind: kind.as_str(),
                amount,
            })
        }
    }
}
