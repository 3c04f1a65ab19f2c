//! # Engine Error Types
//!
//! All errors that can occur while selling, resolving and paying out boxes.

use alloy_primitives::{Address, U256};
use lootbox_chain::ChainError;
use thiserror::Error;

/// Errors that can occur in the loot engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LootError {
    /// Purchase amount below the box price.
    #[error("insufficient payment: box costs {required} wei, got {provided}")]
    InsufficientPayment {
        /// Current box price.
        required: U256,
        /// Amount sent.
        provided: U256,
    },

    /// Pool is empty or every entry is inactive.
    #[error("no rewards available")]
    NoRewardsAvailable,

    /// Caller is not allowed to perform this call.
    #[error("unauthorized caller: {caller}")]
    Unauthorized {
        /// The rejected caller.
        caller: Address,
    },

    /// No box request with this id.
    #[error("unknown request: {0}")]
    UnknownRequest(U256),

    /// Request was already resolved.
    #[error("request already fulfilled: {0}")]
    AlreadyFulfilled(U256),

    /// Custody could not hand out the selected reward.
    #[error("reward {index} unavailable: {reason}")]
    AssetUnavailable {
        /// Pool index of the reward.
        index: usize,
        /// What custody reported.
        reason: String,
    },

    /// Pool index past the end.
    #[error("reward index {index} out of range (pool has {len})")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of entries.
        len: usize,
    },

    /// Active entries need a positive weight.
    #[error("reward weight must be positive")]
    ZeroWeight,

    /// Amount does not fit the reward kind.
    #[error("invalid amount {amount} for {kind} reward")]
    InvalidAmount {
        /// Reward kind name.
        kind: &'static str,
        /// Rejected amount.
        amount: U256,
    },

    /// Engine is paused.
    #[error("engine is paused")]
    Paused,

    /// Engine is not paused.
    #[error("engine is not paused")]
    NotPaused,

    /// The randomness provider reused a request id.
    #[error("duplicate request id: {0}")]
    DuplicateRequest(U256),

    /// Fulfillment carried no random words.
    #[error("no random words delivered for request {0}")]
    MissingRandomWords(U256),

    /// Cached total weight disagrees with the entries.
    #[error("total weight mismatch: cached {cached}, entries sum to {actual}")]
    InconsistentWeights {
        /// Cached value.
        cached: u64,
        /// Recomputed value.
        actual: u64,
    },

    /// Arithmetic overflow in weight or balance math.
    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Journal could not be read or written.
    #[error("journal error: {0}")]
    Journal(String),

    /// A collaborator call failed.
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Result type for engine operations.
pub type LootResult<T> = Result<T, LootError>;
