//! # Engine Configuration
//!
//! Loaded once at startup from TOML:
//!
//! ```toml
//! address = "0x…"          # custody account of the engine
//! owner = "0x…"
//! box_price = "0.1"        # ETH
//! journal_path = "lootbox.journal"   # optional
//!
//! [randomness]
//! coordinator = "0x…"
//! key_hash = "0x…"
//! subscription_id = 1
//! callback_gas_limit = 500000
//!
//! [[rewards]]
//! kind = "fungible"        # fungible | unique | semi_fungible
//! asset = "0x…"
//! amount = "100000000000000000000"
//! weight = 500
//! ```
//!
//! Addresses, hashes and big integers are strings so they survive TOML's
//! 64-bit integer limit.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use alloy_primitives::{Address, B256, U256};
use lootbox_chain::RandomnessRequest;
use serde::Deserialize;

use crate::error::{LootError, LootResult};
use crate::fixed_point::FixedPoint18;
use crate::pool::RewardKind;

/// Randomness provider settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RandomnessConfig {
    /// The only address allowed to deliver randomness.
    pub coordinator: Address,
    /// Parameters sent with every request.
    pub request: RandomnessRequest,
}

/// One reward seeded into the pool at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewardConfig {
    /// Asset standard.
    pub kind: RewardKind,
    /// Asset contract.
    pub asset: Address,
    /// Token id (0 for fungible rewards).
    pub sub_id: U256,
    /// Quantity per win.
    pub amount: U256,
    /// Selection weight.
    pub weight: u32,
}

/// Complete engine configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Custody account rewards are paid from.
    pub address: Address,
    /// Admin account.
    pub owner: Address,
    /// Price of one box.
    pub box_price: FixedPoint18,
    /// Randomness provider settings.
    pub randomness: RandomnessConfig,
    /// Journal file, if state should survive restarts.
    pub journal_path: Option<PathBuf>,
    /// Rewards added at startup, in order.
    pub rewards: Vec<RewardConfig>,
}

impl EngineConfig {
    /// Minimal configuration with default randomness parameters and no
    /// rewards.
    #[must_use]
    pub fn new(address: Address, owner: Address, box_price: FixedPoint18, coordinator: Address) -> Self {
        Self {
            address,
            owner,
            box_price,
            randomness: RandomnessConfig {
                coordinator,
                request: RandomnessRequest::default(),
            },
            journal_path: None,
            rewards: Vec::new(),
        }
    }

    /// Adds a startup reward.
    #[must_use]
    pub fn with_reward(mut self, kind: RewardKind, asset: Address, sub_id: U256, amount: U256, weight: u32) -> Self {
        self.rewards.push(RewardConfig {
            kind,
            asset,
            sub_id,
            amount,
            weight,
        });
        self
    }

    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` on malformed TOML or unparsable values.
    pub fn from_toml_str(source: &str) -> LootResult<Self> {
        let raw: RawConfig = toml::from_str(source)
            .map_err(|e| LootError::InvalidConfig(format!("Failed to parse config: {e}")))?;
        raw.try_into()
    }

    /// Reads and parses a TOML file.
    ///
    /// A relative `journal_path` is resolved against the file's directory.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> LootResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            LootError::InvalidConfig(format!("Failed to read {}: {e}", path.display()))
        })?;
        let mut config = Self::from_toml_str(&source)?;

        if let (Some(journal), Some(dir)) = (config.journal_path.as_mut(), path.parent()) {
            if journal.is_relative() {
                *journal = dir.join(&*journal);
            }
        }
        Ok(config)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    address: String,
    owner: String,
    box_price: String,
    randomness: RawRandomness,
    journal_path: Option<PathBuf>,
    #[serde(default)]
    rewards: Vec<RawReward>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRandomness {
    coordinator: String,
    key_hash: Option<String>,
    subscription_id: u64,
    request_confirmations: Option<u16>,
    callback_gas_limit: u32,
    num_words: Option<u32>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawReward {
    kind: RewardKind,
    asset: String,
    sub_id: Option<String>,
    amount: String,
    weight: u32,
}

fn parse<T: FromStr>(field: &str, value: &str) -> LootResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| LootError::InvalidConfig(format!("{field}: {value:?}: {e}")))
}

impl TryFrom<RawConfig> for EngineConfig {
    type Error = LootError;

    fn try_from(raw: RawConfig) -> LootResult<Self> {
        let defaults = RandomnessRequest::default();
        let randomness = RandomnessConfig {
            coordinator: parse("randomness.coordinator", &raw.randomness.coordinator)?,
            request: RandomnessRequest {
                key_hash: match raw.randomness.key_hash.as_deref() {
                    Some(hash) => parse::<B256>("randomness.key_hash", hash)?,
                    None => defaults.key_hash,
                },
                subscription_id: raw.randomness.subscription_id,
                request_confirmations: raw
                    .randomness
                    .request_confirmations
                    .unwrap_or(defaults.request_confirmations),
                callback_gas_limit: raw.randomness.callback_gas_limit,
                num_words: raw.randomness.num_words.unwrap_or(defaults.num_words),
            },
        };
        if randomness.request.num_words == 0 {
            return Err(LootError::InvalidConfig(
                "randomness.num_words must be at least 1".to_string(),
            ));
        }

        let rewards = raw
            .rewards
            .iter()
            .enumerate()
            .map(|(i, reward)| -> LootResult<RewardConfig> {
                Ok(RewardConfig {
                    kind: reward.kind,
                    asset: parse(&format!("rewards[{i}].asset"), &reward.asset)?,
                    sub_id: match reward.sub_id.as_deref() {
                        Some(id) => parse(&format!("rewards[{i}].sub_id"), id)?,
                        None => U256::ZERO,
                    },
                    amount: parse(&format!("rewards[{i}].amount"), &reward.amount)?,
                    weight: reward.weight,
                })
            })
            .collect::<LootResult<Vec<_>>>()?;

        Ok(Self {
            address: parse("address", &raw.address)?,
            owner: parse("owner", &raw.owner)?,
            box_price: raw.box_price.parse()?,
            randomness,
            journal_path: raw.journal_path,
            rewards,
        })
    }
}
