//! # LOOTBOX Engine
//!
//! Weighted-random reward distribution for loot boxes.
//!
//! ## Design Principles
//!
//! 1. **Deterministic selection** - same random value + same pool = same reward
//! 2. **Exactly-once payout** - a request resolves once, however often the
//!    randomness provider retries
//! 3. **All-or-nothing calls** - a failed call leaves no partial state
//! 4. **Integer math only** - weights are checked `u64`, money is wei
//!
//! ## Flow
//!
//! ```text
//! player ──open_box──▶ LootEngine ──request──▶ RandomnessProvider
//!                          │                          │
//!                          │ ◀──── delivery ──────────┘ (LootService::pump)
//!                          ▼
//!   RewardPool ──▶ selector::select ──▶ AssetDispatcher ──▶ AssetLedger
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use lootbox_engine::{EngineConfig, LootEngine, LootService};
//! use lootbox_chain::{InMemoryAssets, LocalCoordinator};
//!
//! let config = EngineConfig::from_file("data/lootbox.toml")?;
//! let (vrf, deliveries) = LocalCoordinator::new(config.randomness.coordinator, 42);
//! let engine = LootEngine::new(config, vrf.clone(), InMemoryAssets::new())?;
//! let service = LootService::new(engine, deliveries);
//!
//! let request = service.open_box(player, price)?;
//! vrf.fulfill_pending()?;
//! let report = service.pump();
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod events;
pub mod fixed_point;
pub mod journal;
pub mod ledger;
pub mod pool;
pub mod selector;
pub mod service;

pub use config::{EngineConfig, RandomnessConfig, RewardConfig};
pub use dispatcher::AssetDispatcher;
pub use engine::LootEngine;
pub use error::{LootError, LootResult};
pub use events::{EventLog, LootEvent};
pub use fixed_point::FixedPoint18;
pub use journal::{EngineJournal, JournalRecord};
pub use ledger::{BoxRequest, BoxRequestLedger, RequestStatus};
pub use pool::{RewardEntry, RewardKind, RewardPool};
pub use selector::{select, simulate, weight_range, SelectionStatistics};
pub use service::{LootService, PumpReport};
