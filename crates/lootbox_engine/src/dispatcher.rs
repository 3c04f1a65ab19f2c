//! # Asset Dispatcher
//!
//! Hands the selected reward from custody to the winner.
//!
//! One `match` over `RewardKind` routes to the right token call:
//!
//! | Kind          | Call                                           |
//! |---------------|------------------------------------------------|
//! | Fungible      | `transfer(to, amount)`                         |
//! | Unique        | `ownerOf(id)` check, then `transferFrom(...)`  |
//! | SemiFungible  | `safeTransferFrom(pool, to, id, amount, "")`   |
//!
//! Custody shortfalls surface as `AssetUnavailable` and leave custody
//! untouched, so the caller can abort the whole fulfillment.

use alloy_primitives::{Address, U256};
use lootbox_chain::{AssetLedger, ChainError};

use crate::error::{LootError, LootResult};
use crate::events::{EventLog, LootEvent};
use crate::pool::{RewardEntry, RewardKind};

/// Moves rewards out of the pool's custody account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AssetDispatcher {
    custody: Address,
}

impl AssetDispatcher {
    /// Creates a dispatcher paying out of `custody`.
    #[must_use]
    pub const fn new(custody: Address) -> Self {
        Self { custody }
    }

    /// Account rewards are paid from.
    #[must_use]
    pub const fn custody(&self) -> Address {
        self.custody
    }

    /// Checks that custody can cover `entry` right now, without moving
    /// anything.
    ///
    /// # Errors
    ///
    /// `AssetUnavailable` describing the shortfall.
    pub fn check_available<A: AssetLedger>(&self, assets: &A, entry: &RewardEntry) -> LootResult<()> {
        let shortfall = match entry.kind {
            RewardKind::Fungible => {
                let held = assets.balance_of(entry.asset, self.custody);
                (held < entry.amount)
                    .then(|| format!("custody holds {held}, reward pays {}", entry.amount))
            }
            RewardKind::Unique => match assets.owner_of(entry.asset, entry.sub_id) {
                Some(owner) if owner == self.custody => None,
                Some(owner) => Some(format!("token {} is owned by {owner}", entry.sub_id)),
                None => Some(format!("token {} does not exist", entry.sub_id)),
            },
            RewardKind::SemiFungible => {
                let held = assets.balance_of_id(entry.asset, self.custody, entry.sub_id);
                (held < entry.amount).then(|| {
                    format!(
                        "custody holds {held} of id {}, reward pays {}",
                        entry.sub_id, entry.amount
                    )
                })
            }
        };

        match shortfall {
            Some(reason) => Err(LootError::AssetUnavailable {
                index: entry.id,
                reason,
            }),
            None => Ok(()),
        }
    }

    /// Transfers `entry` to `recipient` and records `RewardDistributed`.
    ///
    /// # Errors
    ///
    /// `AssetUnavailable` if custody cannot cover the reward; any other
    /// collaborator failure as `Chain`.
    pub fn dispatch<A: AssetLedger>(
        &self,
        assets: &mut A,
        entry: &RewardEntry,
        request_id: U256,
        recipient: Address,
        events: &mut EventLog,
    ) -> LootResult<()> {
        self.check_available(assets, entry)?;

        let result = match entry.kind {
            RewardKind::Fungible => {
                assets.transfer(entry.asset, self.custody, recipient, entry.amount)
            }
            RewardKind::Unique => {
                assets.transfer_from(entry.asset, self.custody, recipient, entry.sub_id)
            }
            RewardKind::SemiFungible => assets.safe_transfer_from(
                entry.asset,
                self.custody,
                recipient,
                entry.sub_id,
                entry.amount,
                &[],
            ),
        };
        result.map_err(|e| Self::map_custody_error(entry.id, e))?;

        tracing::info!(
            "Reward {} ({}) sent to {} for request {}",
            entry.id,
            entry.kind,
            recipient,
            request_id
        );
        events.emit(LootEvent::RewardDistributed {
            request_id,
            player: recipient,
            index: entry.id,
            kind: entry.kind,
            asset: entry.asset,
            sub_id: entry.sub_id,
            amount: entry.amount,
        });
        Ok(())
    }

    fn map_custody_error(index: usize, error: ChainError) -> LootError {
        match error {
            ChainError::InsufficientBalance { .. }
            | ChainError::NotTokenOwner { .. }
            | ChainError::NonexistentToken { .. } => LootError::AssetUnavailable {
                index,
                reason: error.to_string(),
            },
            other => LootError::Chain(other),
        }
    }
}
