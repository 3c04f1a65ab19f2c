//! # LOOTBOX Chain Bridge
//!
//! The collaborators the loot engine talks to, expressed in Rust.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐  requestRandomWords  ┌─────────────────┐
//! │  LootEngine     │ ───────────────────▶ │  Coordinator    │
//! │  (consumer)     │                      │  (VRF)          │
//! └────────┬────────┘                      └────────┬────────┘
//!          │ transfer / transferFrom /              │ RandomnessDelivery
//!          │ safeTransferFrom                       ▼
//!          ▼                               ┌─────────────────┐
//! ┌─────────────────┐                      │  Channel        │ ──▶ engine pump
//! │  AssetLedger    │                      │  (Unbounded)    │
//! │  (custody)      │                      └─────────────────┘
//! └─────────────────┘
//! ```
//!
//! The engine never trusts the call context: every delivery names the
//! coordinator that produced it and the engine checks that identity.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod contracts;
pub mod custody;
pub mod error;
pub mod randomness;

pub use custody::{AssetLedger, ContractCall, InMemoryAssets};
pub use error::{ChainError, ChainResult};
pub use randomness::{
    LocalCoordinator, RandomnessDelivery, RandomnessProvider, RandomnessRequest,
};
