//! # Chain Error Types
//!
//! Failures reported by the collaborator contracts.

use alloy_primitives::{Address, U256};
use thiserror::Error;

/// Errors raised by asset contracts and the randomness coordinator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// A balance transfer exceeded what the holder owns.
    #[error("insufficient balance on {token}: {holder} holds {available}, needs {required}")]
    InsufficientBalance {
        /// Asset contract.
        token: Address,
        /// Account being debited.
        holder: Address,
        /// Amount requested.
        required: U256,
        /// Amount held.
        available: U256,
    },

    /// A unique token was moved by someone other than its owner.
    #[error("token {token_id} on {token} is owned by {owner}, not {from}")]
    NotTokenOwner {
        /// Asset contract.
        token: Address,
        /// Token identifier.
        token_id: U256,
        /// Current owner.
        owner: Address,
        /// Claimed owner.
        from: Address,
    },

    /// A unique token that was never minted.
    #[error("token {token_id} on {token} does not exist")]
    NonexistentToken {
        /// Asset contract.
        token: Address,
        /// Token identifier.
        token_id: U256,
    },

    /// A unique token id that is already taken.
    #[error("token {token_id} on {token} already minted")]
    TokenAlreadyMinted {
        /// Asset contract.
        token: Address,
        /// Token identifier.
        token_id: U256,
    },

    /// Transfers to the zero address burn assets and are refused.
    #[error("transfer to the zero address")]
    ZeroRecipient,

    /// The coordinator has no record of this request.
    #[error("randomness request {0} not found")]
    UnknownRandomnessRequest(U256),

    /// The coordinator already answered this request.
    #[error("randomness request {0} already answered")]
    RandomnessAlreadyDelivered(U256),

    /// A request asked for zero words.
    #[error("randomness request must ask for at least one word")]
    NoWordsRequested,

    /// The delivery channel has no receiver anymore.
    #[error("delivery channel closed")]
    ChannelClosed,
}

/// Result type for collaborator calls.
pub type ChainResult<T> = Result<T, ChainError>;
