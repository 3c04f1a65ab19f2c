//! # Engine Events
//!
//! Notifications emitted by the engine, one variant per `ILootBox` event.
//! Events are buffered in an `EventLog` and drained by whoever publishes
//! them (indexer, UI, tests).

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolEvent;
use lootbox_chain::contracts::ILootBox;

use crate::pool::RewardKind;

/// Everything the engine reports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LootEvent {
    /// A reward entry was appended to the pool.
    RewardAdded {
        /// Pool index.
        index: usize,
        /// Asset standard.
        kind: RewardKind,
        /// Asset contract.
        asset: Address,
        /// Token id.
        sub_id: U256,
        /// Quantity per win.
        amount: U256,
        /// Selection weight.
        weight: u32,
    },
    /// Weight or activation of an entry changed.
    RewardUpdated {
        /// Pool index.
        index: usize,
        /// New weight.
        weight: u32,
        /// New activation flag.
        active: bool,
    },
    /// A one-of-a-kind reward was handed out and left the draw.
    RewardExhausted {
        /// Pool index.
        index: usize,
    },
    /// A box was bought and randomness requested.
    BoxOpened {
        /// Randomness request handle.
        request_id: U256,
        /// Buyer.
        player: Address,
    },
    /// A reward was transferred to a player.
    RewardDistributed {
        /// Request that produced the win.
        request_id: U256,
        /// Recipient.
        player: Address,
        /// Pool index.
        index: usize,
        /// Asset standard.
        kind: RewardKind,
        /// Asset contract.
        asset: Address,
        /// Token id.
        sub_id: U256,
        /// Quantity transferred.
        amount: U256,
    },
    /// Box price changed.
    BoxPriceUpdated {
        /// Previous price in wei.
        old_price: U256,
        /// New price in wei.
        new_price: U256,
    },
    /// Purchases were suspended.
    Paused {
        /// Who paused.
        account: Address,
    },
    /// Purchases were resumed.
    Unpaused {
        /// Who unpaused.
        account: Address,
    },
    /// Collected payments were sent to the owner.
    FundsWithdrawn {
        /// Recipient.
        to: Address,
        /// Amount in wei.
        amount: U256,
    },
    /// Admin rights moved to a new account.
    OwnershipTransferred {
        /// Old owner.
        previous_owner: Address,
        /// New owner.
        new_owner: Address,
    },
}

impl LootEvent {
    /// Solidity event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::RewardAdded { .. } => "RewardAdded",
            Self::RewardUpdated { .. } => "RewardUpdated",
            Self::RewardExhausted { .. } => "RewardExhausted",
            Self::BoxOpened { .. } => "BoxOpened",
            Self::RewardDistributed { .. } => "RewardDistributed",
            Self::BoxPriceUpdated { .. } => "BoxPriceUpdated",
            Self::Paused { .. } => "Paused",
            Self::Unpaused { .. } => "Unpaused",
            Self::FundsWithdrawn { .. } => "FundsWithdrawn",
            Self::OwnershipTransferred { .. } => "OwnershipTransferred",
        }
    }

    /// keccak256 of the Solidity signature (log topic 0).
    #[must_use]
    pub const fn signature_hash(&self) -> B256 {
        match self {
            Self::RewardAdded { .. } => ILootBox::RewardAdded::SIGNATURE_HASH,
            Self::RewardUpdated { .. } => ILootBox::RewardUpdated::SIGNATURE_HASH,
            Self::RewardExhausted { .. } => ILootBox::RewardExhausted::SIGNATURE_HASH,
            Self::BoxOpened { .. } => ILootBox::BoxOpened::SIGNATURE_HASH,
            Self::RewardDistributed { .. } => ILootBox::RewardDistributed::SIGNATURE_HASH,
            Self::BoxPriceUpdated { .. } => ILootBox::BoxPriceUpdated::SIGNATURE_HASH,
            Self::Paused { .. } => ILootBox::Paused::SIGNATURE_HASH,
            Self::Unpaused { .. } => ILootBox::Unpaused::SIGNATURE_HASH,
            Self::FundsWithdrawn { .. } => ILootBox::FundsWithdrawn::SIGNATURE_HASH,
            Self::OwnershipTransferred { .. } => ILootBox::OwnershipTransferred::SIGNATURE_HASH,
        }
    }
}

/// Buffer of emitted events, oldest first.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Vec<LootEvent>,
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.
    pub fn emit(&mut self, event: LootEvent) {
        tracing::debug!("Event {}: {:?}", event.name(), event);
        self.events.push(event);
    }

    /// Takes every buffered event.
    pub fn drain(&mut self) -> Vec<LootEvent> {
        std::mem::take(&mut self.events)
    }

    /// Buffered events.
    pub fn iter(&self) -> impl Iterator<Item = &LootEvent> {
        self.events.iter()
    }

    /// Most recent event.
    #[must_use]
    pub fn last(&self) -> Option<&LootEvent> {
        self.events.last()
    }

    /// Number of buffered events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
