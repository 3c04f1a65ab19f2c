//! # LOOTBOX Demo
//!
//! Loads a config, funds custody for every reward, sells a round of boxes,
//! resolves them through the local coordinator and prints what happened.
//!
//! Usage: `lootbox_demo [config.toml]` (defaults to `data/lootbox.toml`)

use std::collections::BTreeMap;

use alloy_primitives::{Address, U256};
use lootbox_chain::{ChainError, InMemoryAssets, LocalCoordinator};
use lootbox_engine::{
    simulate, weight_range, EngineConfig, FixedPoint18, LootEngine, LootEvent, LootResult,
    LootService, RewardKind,
};

/// Boxes bought by each demo player.
const BOXES_PER_PLAYER: usize = 4;

/// Number of demo players.
const PLAYERS: u8 = 5;

/// Copies of each reward custody is funded with.
const FUNDED_WINS: u64 = 1_000;

fn main() {
    if let Err(e) = run() {
        eprintln!("lootbox_demo: {e}");
        std::process::exit(1);
    }
}

fn run() -> LootResult<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "data/lootbox.toml".to_string());

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                        LOOTBOX DEMO                          ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    println!("Config: {path}");

    let config = EngineConfig::from_file(&path)?;
    let assets = fund_custody(&config)?;
    let (vrf, deliveries) = LocalCoordinator::new(config.randomness.coordinator, 42);

    let engine = LootEngine::new(config, vrf.clone(), assets)?;
    let recovered = engine.total_boxes_opened();
    if recovered > 0 {
        println!(
            "Recovered {} boxes from the journal ({} still pending)",
            recovered,
            engine.pending_requests().len()
        );
    }

    let service = LootService::new(engine, deliveries);
    let price = service.with_engine(|e| e.box_price());
    let price_eth = FixedPoint18::from_u256(price)?;

    println!();
    println!("── Pool ─────────────────────────────────────────────────────────");
    service.with_engine(|e| {
        for entry in e.pool().entries() {
            match weight_range(e.pool().entries(), entry.id) {
                Some((start, end)) => println!(
                    "  #{} {:<13} weight {:>5} rolls [{start}, {end})",
                    entry.id, entry.kind, entry.weight
                ),
                None => println!(
                    "  #{} {:<13} weight {:>5} (inactive)",
                    entry.id, entry.kind, entry.weight
                ),
            }
        }
        println!("  total weight: {}", e.total_weight());
    });

    println!();
    println!(
        "── Selling {} boxes at {} ETH ──────────────────────────",
        usize::from(PLAYERS) * BOXES_PER_PLAYER,
        price_eth
    );
    for n in 1..=PLAYERS {
        let player = Address::repeat_byte(n);
        for _ in 0..BOXES_PER_PLAYER {
            service.open_box(player, price)?;
        }
    }

    let answered = vrf.fulfill_pending()?;
    let report = service.pump();
    println!("  coordinator answered {answered} requests");
    println!("  fulfilled: {}", report.fulfilled.len());
    for (request_id, error) in &report.rejected {
        println!("  rejected request {request_id}: {error}");
    }

    println!();
    println!("── Results ──────────────────────────────────────────────────────");
    let mut wins: BTreeMap<usize, u32> = BTreeMap::new();
    let events = service.with_engine(|e| e.drain_events());
    for event in &events {
        match event {
            LootEvent::RewardDistributed { index, .. } => *wins.entry(*index).or_insert(0) += 1,
            LootEvent::RewardExhausted { index } => println!("  reward #{index} exhausted"),
            _ => {}
        }
    }
    for (index, count) in &wins {
        println!("  reward #{index}: {count} wins");
    }

    service.with_engine(|e| {
        for n in 1..=PLAYERS {
            let player = Address::repeat_byte(n);
            println!("  player {}: boxes {:?}", player, e.player_boxes(player));
        }
    });

    println!();
    println!("── Funds ────────────────────────────────────────────────────────");
    let withdrawn = service.with_engine(|e| {
        let owner = e.owner();
        e.withdraw(owner)
    })?;
    println!("  withdrawn to owner: {withdrawn} wei");

    println!();
    println!("── Selection check (10,000 seeded draws) ────────────────────────");
    let stats = service.with_engine(|e| simulate(e.pool().entries(), e.total_weight(), 10_000, 7));
    match stats {
        Ok(stats) => {
            for (index, count) in &stats.wins {
                println!("  #{index}: {count:>5} ({:.2}%)", stats.share_bp(*index) as f64 / 100.0);
            }
        }
        Err(e) => println!("  skipped: {e}"),
    }

    Ok(())
}

/// Mints enough of every configured reward into the custody account.
fn fund_custody(config: &EngineConfig) -> LootResult<InMemoryAssets> {
    let mut assets = InMemoryAssets::new();
    let copies = U256::from(FUNDED_WINS);

    for reward in &config.rewards {
        let supply = reward
            .amount
            .checked_mul(copies)
            .ok_or(lootbox_engine::LootError::ArithmeticOverflow)?;
        match reward.kind {
            RewardKind::Fungible => assets.mint_fungible(reward.asset, config.address, supply),
            RewardKind::Unique => {
                // The same token may be listed twice; one mint is enough
                match assets.mint_unique(reward.asset, config.address, reward.sub_id) {
                    Ok(()) | Err(ChainError::TokenAlreadyMinted { .. }) => {}
                    Err(e) => return Err(e.into()),
                }
            }
            RewardKind::SemiFungible => {
                assets.mint_semi_fungible(reward.asset, config.address, reward.sub_id, supply);
            }
        }
    }
    Ok(assets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lootbox_chain::AssetLedger;

    #[test]
    fn test_fund_custody_mints_repeated_unique_once() {
        let custody = Address::repeat_byte(0xB0);
        let nft = Address::repeat_byte(0x21);
        let token = Address::repeat_byte(0x20);
        let owner = Address::repeat_byte(0xA0);
        let coordinator = Address::repeat_byte(0xC0);
        let config = EngineConfig::new(custody, owner, FixedPoint18::ONE, coordinator)
            .with_reward(RewardKind::Unique, nft, U256::from(3), U256::from(1), 10)
            .with_reward(RewardKind::Unique, nft, U256::from(3), U256::from(1), 10)
            .with_reward(RewardKind::Fungible, token, U256::ZERO, U256::from(2), 10);

        let assets = fund_custody(&config).unwrap();
        assert_eq!(assets.owner_of(nft, U256::from(3)), Some(custody));
        assert_eq!(assets.balance_of(token, custody), U256::from(2 * FUNDED_WINS));
    }
}
