//! Integration tests for the full box lifecycle.
//!
//! The engine is built from the sample config with four rewards
//! (weights 500 / 300 / 300 / 200) and a fully funded custody account.

use alloy_primitives::{Address, U256};
use lootbox_chain::{AssetLedger, InMemoryAssets, LocalCoordinator};
use lootbox_engine::{
    EngineConfig, LootEngine, LootError, LootEvent, RequestStatus, RewardKind,
};

const SAMPLE: &str = include_str!("../../../data/lootbox.toml");

/// 0.1 ETH.
const BOX_PRICE: u128 = 100_000_000_000_000_000;

/// 100 tokens with 18 decimals.
const FUNGIBLE_WIN: u128 = 100_000_000_000_000_000_000;

type Engine = LootEngine<LocalCoordinator, InMemoryAssets>;

fn player1() -> Address {
    Address::repeat_byte(0x11)
}

fn player2() -> Address {
    Address::repeat_byte(0x22)
}

fn price() -> U256 {
    U256::from(BOX_PRICE)
}

fn temp_dir() -> std::path::PathBuf {
    static COUNTER: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);
    let id = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let n = COUNTER.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!("test_lootbox_{}_{id}_{n}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn funded_assets(config: &EngineConfig) -> InMemoryAssets {
    let mut assets = InMemoryAssets::new();
    for reward in &config.rewards {
        match reward.kind {
            RewardKind::Fungible => {
                assets.mint_fungible(reward.asset, config.address, reward.amount * U256::from(100));
            }
            RewardKind::Unique => {
                assets.mint_unique(reward.asset, config.address, reward.sub_id).unwrap();
            }
            RewardKind::SemiFungible => {
                assets.mint_semi_fungible(reward.asset, config.address, reward.sub_id, U256::from(100));
            }
        }
    }
    assets
}

fn build(config: EngineConfig) -> (Engine, LocalCoordinator) {
    let (vrf, _deliveries) = LocalCoordinator::new(config.randomness.coordinator, 1);
    let assets = funded_assets(&config);
    let engine = LootEngine::new(config, vrf.clone(), assets).unwrap();
    (engine, vrf)
}

fn sample_engine() -> (Engine, LocalCoordinator, EngineConfig) {
    let config = EngineConfig::from_toml_str(SAMPLE).unwrap();
    let (engine, vrf) = build(config.clone());
    (engine, vrf, config)
}

/// Opens a box for `player` and resolves it with `random`.
fn open_and_resolve(engine: &mut Engine, player: Address, random: u64) -> usize {
    let id = engine.open_box(player, price()).unwrap();
    let coordinator = engine.coordinator();
    engine
        .on_randomness_fulfilled(coordinator, id, &[U256::from(random)])
        .unwrap()
}

// ============================================================================
// Deployment
// ============================================================================

#[test]
fn test_initial_values() {
    let (engine, _vrf, config) = sample_engine();

    assert_eq!(engine.box_price(), price());
    assert_eq!(engine.owner(), config.owner);
    assert_eq!(engine.total_boxes_opened(), 0);
    assert_eq!(engine.rewards_count(), 4);
    assert_eq!(engine.total_weight(), 1300);
    assert!(!engine.is_paused());
}

// ============================================================================
// Reward management
// ============================================================================

#[test]
fn test_update_reward_changes_total_weight() {
    let (mut engine, _vrf, config) = sample_engine();

    engine.update_reward(config.owner, 0, 600, false).unwrap();

    assert_eq!(engine.total_weight(), 800);
    let entry = engine.get_reward(0).unwrap();
    assert_eq!(entry.weight, 600);
    assert!(!entry.active);
    assert_eq!(engine.active_rewards().len(), 3);
    assert!(engine.active_rewards().iter().all(|r| r.id != 0));
}

#[test]
fn test_add_reward_emits_event() {
    let (mut engine, _vrf, config) = sample_engine();
    let asset = Address::repeat_byte(0x77);

    let index = engine
        .add_reward(config.owner, RewardKind::Fungible, asset, U256::ZERO, U256::from(5), 100)
        .unwrap();

    assert_eq!(index, 4);
    assert_eq!(engine.total_weight(), 1400);
    assert_eq!(
        engine.events().last(),
        Some(&LootEvent::RewardAdded {
            index: 4,
            kind: RewardKind::Fungible,
            asset,
            sub_id: U256::ZERO,
            amount: U256::from(5),
            weight: 100,
        })
    );
}

// ============================================================================
// Box opening
// ============================================================================

#[test]
fn test_insufficient_payment_is_rejected() {
    let (mut engine, vrf, _config) = sample_engine();

    let result = engine.open_box(player1(), U256::from(BOX_PRICE / 2));

    assert_eq!(
        result,
        Err(LootError::InsufficientPayment {
            required: price(),
            provided: U256::from(BOX_PRICE / 2),
        })
    );
    assert_eq!(engine.total_boxes_opened(), 0);
    assert_eq!(engine.collected_funds(), U256::ZERO);
    assert!(vrf.pending_requests().is_empty());
}

#[test]
fn test_empty_pool_rejects_purchase() {
    let sample = EngineConfig::from_toml_str(SAMPLE).unwrap();
    let config = EngineConfig::new(
        sample.address,
        sample.owner,
        sample.box_price,
        sample.randomness.coordinator,
    );
    let (mut engine, _vrf) = build(config);

    assert_eq!(
        engine.open_box(player1(), price()),
        Err(LootError::NoRewardsAvailable)
    );
}

#[test]
fn test_open_box_records_request() {
    let (mut engine, vrf, _config) = sample_engine();

    let id = engine.open_box(player1(), price()).unwrap();

    assert_eq!(engine.total_boxes_opened(), 1);
    assert_eq!(engine.collected_funds(), price());
    assert_eq!(vrf.pending_requests(), vec![id]);
    assert!(engine
        .events()
        .iter()
        .any(|e| *e == LootEvent::BoxOpened { request_id: id, player: player1() }));

    let request = engine.request(id).unwrap();
    assert_eq!(request.requester, player1());
    assert_eq!(request.paid, price());
    assert_eq!(request.status, RequestStatus::Pending);
}

#[test]
fn test_player_boxes_are_tracked() {
    let (mut engine, _vrf, _config) = sample_engine();

    engine.open_box(player1(), price()).unwrap();
    engine.open_box(player1(), price()).unwrap();

    assert_eq!(engine.player_boxes(player1()), &[U256::from(0), U256::from(1)]);
    assert!(engine.player_boxes(player2()).is_empty());
}

#[test]
fn test_many_openings() {
    let (mut engine, _vrf, _config) = sample_engine();

    for _ in 0..5 {
        engine.open_box(player1(), price()).unwrap();
    }

    assert_eq!(engine.total_boxes_opened(), 5);
    assert_eq!(engine.player_boxes(player1()).len(), 5);
    assert_eq!(engine.pending_requests().len(), 5);
}

// ============================================================================
// Randomness fulfillment
// ============================================================================

#[test]
fn test_low_roll_pays_fungible_reward() {
    let (mut engine, _vrf, config) = sample_engine();

    let index = open_and_resolve(&mut engine, player1(), 250);

    assert_eq!(index, 0);
    let token = config.rewards[0].asset;
    assert_eq!(engine.assets().balance_of(token, player1()), U256::from(FUNGIBLE_WIN));
}

#[test]
fn test_mid_roll_pays_first_unique_token() {
    let (mut engine, _vrf, config) = sample_engine();

    let index = open_and_resolve(&mut engine, player2(), 750);

    assert_eq!(index, 1);
    let nft = config.rewards[1].asset;
    assert_eq!(engine.assets().owner_of(nft, U256::ZERO), Some(player2()));

    // The token is gone, so its entry leaves the draw
    assert!(!engine.get_reward(1).unwrap().active);
    assert_eq!(engine.total_weight(), 1000);
    assert!(engine
        .events()
        .iter()
        .any(|e| *e == LootEvent::RewardExhausted { index: 1 }));
}

#[test]
fn test_high_roll_pays_semi_fungible_reward() {
    let (mut engine, _vrf, config) = sample_engine();

    let index = open_and_resolve(&mut engine, player1(), 1299);

    assert_eq!(index, 3);
    let items = config.rewards[3].asset;
    assert_eq!(
        engine.assets().balance_of_id(items, player1(), U256::from(1)),
        U256::from(10)
    );
}

#[test]
fn test_roll_just_below_boundary_stays_in_first_range() {
    let (mut engine, _vrf, _config) = sample_engine();
    assert_eq!(open_and_resolve(&mut engine, player1(), 499), 0);
}

#[test]
fn test_range_boundaries() {
    let sample = EngineConfig::from_toml_str(SAMPLE).unwrap();
    let token = Address::repeat_byte(0x30);
    let config = EngineConfig::new(
        sample.address,
        sample.owner,
        sample.box_price,
        sample.randomness.coordinator,
    )
    .with_reward(RewardKind::Fungible, token, U256::ZERO, U256::from(1), 500)
    .with_reward(RewardKind::Fungible, token, U256::ZERO, U256::from(2), 300)
    .with_reward(RewardKind::Fungible, token, U256::ZERO, U256::from(3), 200);
    let (mut engine, _vrf) = build(config);

    for (random, expected) in [(0, 0), (499, 0), (500, 1), (799, 1), (800, 2), (999, 2), (1000, 0)] {
        assert_eq!(
            open_and_resolve(&mut engine, player1(), random),
            expected,
            "random value {random}"
        );
    }
}

#[test]
fn test_unauthorized_fulfillment_leaves_request_pending() {
    let (mut engine, _vrf, _config) = sample_engine();
    let id = engine.open_box(player1(), price()).unwrap();

    let result = engine.on_randomness_fulfilled(player1(), id, &[U256::from(1)]);

    assert_eq!(result, Err(LootError::Unauthorized { caller: player1() }));
    assert_eq!(engine.request(id).unwrap().status, RequestStatus::Pending);
    assert_eq!(engine.pending_requests(), vec![id]);
}

#[test]
fn test_unknown_request_is_rejected() {
    let (mut engine, _vrf, _config) = sample_engine();
    let coordinator = engine.coordinator();

    assert_eq!(
        engine.on_randomness_fulfilled(coordinator, U256::from(42), &[U256::from(1)]),
        Err(LootError::UnknownRequest(U256::from(42)))
    );
}

#[test]
fn test_second_fulfillment_pays_nothing() {
    let (mut engine, _vrf, config) = sample_engine();
    let coordinator = engine.coordinator();
    let id = engine.open_box(player1(), price()).unwrap();

    engine
        .on_randomness_fulfilled(coordinator, id, &[U256::from(10)])
        .unwrap();
    let again = engine.on_randomness_fulfilled(coordinator, id, &[U256::from(10)]);

    assert_eq!(again, Err(LootError::AlreadyFulfilled(id)));
    let token = config.rewards[0].asset;
    assert_eq!(engine.assets().balance_of(token, player1()), U256::from(FUNGIBLE_WIN));
    assert_eq!(
        engine.request(id).unwrap().status,
        RequestStatus::Fulfilled {
            reward_index: 0,
            random_value: U256::from(10),
        }
    );
}

#[test]
fn test_custody_shortfall_keeps_request_pending() {
    let sample = EngineConfig::from_toml_str(SAMPLE).unwrap();
    let token = Address::repeat_byte(0x40);
    let config = EngineConfig::new(
        sample.address,
        sample.owner,
        sample.box_price,
        sample.randomness.coordinator,
    )
    .with_reward(RewardKind::Fungible, token, U256::ZERO, U256::from(50), 1);
    let custody = config.address;
    let (vrf, _deliveries) = LocalCoordinator::new(config.randomness.coordinator, 1);
    let mut engine = LootEngine::new(config, vrf, InMemoryAssets::new()).unwrap();
    let coordinator = engine.coordinator();

    let id = engine.open_box(player1(), price()).unwrap();
    let result = engine.on_randomness_fulfilled(coordinator, id, &[U256::from(3)]);

    assert!(matches!(result, Err(LootError::AssetUnavailable { index: 0, .. })));
    assert_eq!(engine.pending_requests(), vec![id]);

    engine.assets_mut().mint_fungible(token, custody, U256::from(50));
    assert_eq!(
        engine.on_randomness_fulfilled(coordinator, id, &[U256::from(3)]),
        Ok(0)
    );
    assert_eq!(engine.assets().balance_of(token, player1()), U256::from(50));
    assert_eq!(engine.assets().balance_of(token, custody), U256::ZERO);
}

// ============================================================================
// Admin functions
// ============================================================================

#[test]
fn test_owner_sets_box_price() {
    let (mut engine, _vrf, config) = sample_engine();
    let new_price = U256::from(2 * BOX_PRICE);

    engine.set_box_price(config.owner, new_price).unwrap();

    assert_eq!(engine.box_price(), new_price);
    assert_eq!(
        engine.events().last(),
        Some(&LootEvent::BoxPriceUpdated {
            old_price: price(),
            new_price,
        })
    );
    assert!(matches!(
        engine.open_box(player1(), price()),
        Err(LootError::InsufficientPayment { .. })
    ));
}

#[test]
fn test_pause_blocks_purchases_not_fulfillment() {
    let (mut engine, _vrf, config) = sample_engine();
    let coordinator = engine.coordinator();
    let id = engine.open_box(player1(), price()).unwrap();

    engine.pause(config.owner).unwrap();
    assert_eq!(engine.open_box(player1(), price()), Err(LootError::Paused));
    assert_eq!(engine.pause(config.owner), Err(LootError::Paused));

    assert_eq!(
        engine.on_randomness_fulfilled(coordinator, id, &[U256::from(250)]),
        Ok(0)
    );

    engine.unpause(config.owner).unwrap();
    assert!(engine.open_box(player1(), price()).is_ok());
    assert_eq!(engine.unpause(config.owner), Err(LootError::NotPaused));
}

#[test]
fn test_owner_withdraws_collected_funds() {
    let (mut engine, _vrf, config) = sample_engine();
    engine.open_box(player1(), price()).unwrap();
    engine.open_box(player2(), U256::from(BOX_PRICE + 5)).unwrap();

    let amount = engine.withdraw(config.owner).unwrap();

    assert_eq!(amount, U256::from(2 * BOX_PRICE + 5));
    assert_eq!(engine.collected_funds(), U256::ZERO);
    assert_eq!(
        engine.events().last(),
        Some(&LootEvent::FundsWithdrawn {
            to: config.owner,
            amount,
        })
    );
    assert_eq!(engine.withdraw(config.owner), Ok(U256::ZERO));
}

#[test]
fn test_admin_calls_require_owner() {
    let (mut engine, _vrf, _config) = sample_engine();
    let denied = Err(LootError::Unauthorized { caller: player1() });

    assert_eq!(engine.set_box_price(player1(), U256::from(1)), denied);
    assert_eq!(engine.pause(player1()), denied);
    assert_eq!(
        engine.withdraw(player1()),
        Err(LootError::Unauthorized { caller: player1() })
    );
    assert_eq!(engine.update_reward(player1(), 0, 1, true), denied);
    assert_eq!(engine.transfer_ownership(player1(), player1()), denied);
    assert!(matches!(
        engine.add_reward(player1(), RewardKind::Fungible, player2(), U256::ZERO, U256::from(1), 1),
        Err(LootError::Unauthorized { .. })
    ));
    assert_eq!(engine.box_price(), price());
}

#[test]
fn test_ownership_transfer() {
    let (mut engine, _vrf, config) = sample_engine();

    engine.transfer_ownership(config.owner, player2()).unwrap();

    assert_eq!(engine.owner(), player2());
    assert!(engine.pause(config.owner).is_err());
    assert!(engine.pause(player2()).is_ok());
}

// ============================================================================
// Journal recovery
// ============================================================================

/// Sample config with the journal enabled, written to a fresh directory.
fn journaled_config() -> (EngineConfig, std::path::PathBuf) {
    let dir = temp_dir();
    let config_path = dir.join("lootbox.toml");
    let source = SAMPLE.replacen(
        "# journal_path = \"lootbox.journal\"",
        "journal_path = \"lootbox.journal\"",
        1,
    );
    std::fs::write(&config_path, source).unwrap();
    (EngineConfig::from_file(&config_path).unwrap(), dir)
}

#[test]
fn test_state_survives_restart() {
    let (config, dir) = journaled_config();
    assert_eq!(config.journal_path.as_deref(), Some(dir.join("lootbox.journal").as_path()));

    let (first, second) = {
        let (mut engine, _vrf) = build(config.clone());
        let first = engine.open_box(player1(), price()).unwrap();
        let second = engine.open_box(player2(), price()).unwrap();
        let coordinator = engine.coordinator();
        engine
            .on_randomness_fulfilled(coordinator, first, &[U256::from(750)])
            .unwrap();
        (first, second)
    };

    let (mut engine, vrf) = build(config.clone());
    assert_eq!(engine.total_boxes_opened(), 2);
    assert_eq!(engine.collected_funds(), U256::from(2 * BOX_PRICE));
    assert_eq!(engine.pending_requests(), vec![second]);
    assert_eq!(engine.player_boxes(player1()), &[first]);
    assert!(!engine.get_reward(1).unwrap().active);
    // Replay restores state silently
    assert!(engine
        .events()
        .iter()
        .all(|e| matches!(e, LootEvent::RewardAdded { .. })));

    assert!(vrf.pending_requests().is_empty());
    let coordinator = engine.coordinator();
    assert_eq!(
        engine.on_randomness_fulfilled(coordinator, second, &[U256::from(250)]),
        Ok(0)
    );
    let third = engine.open_box(player1(), price()).unwrap();
    assert_eq!(third, U256::from(2));

    drop(engine);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_runtime_admin_changes_survive_restart() {
    let (config, dir) = journaled_config();
    let owner = config.owner;
    let new_owner = Address::repeat_byte(0x99);
    let bonus = Address::repeat_byte(0x77);

    let request_id = {
        let (mut engine, _vrf) = build(config.clone());
        engine.update_reward(owner, 0, 500, false).unwrap();
        let index = engine
            .add_reward(owner, RewardKind::Fungible, bonus, U256::ZERO, U256::from(5), 400)
            .unwrap();
        assert_eq!(index, 4);
        engine.update_reward(owner, 3, 100, true).unwrap();
        engine
            .assets_mut()
            .mint_fungible(bonus, config.address, U256::from(50));

        // Active ranges: 1 [0, 300), 2 [300, 600), 3 [600, 700), 4 [700, 1100)
        let request_id = engine.open_box(player1(), price()).unwrap();
        let coordinator = engine.coordinator();
        assert_eq!(
            engine.on_randomness_fulfilled(coordinator, request_id, &[U256::from(750)]),
            Ok(4)
        );
        assert_eq!(engine.assets().balance_of(bonus, player1()), U256::from(5));

        engine.set_box_price(owner, price() * U256::from(2)).unwrap();
        engine.pause(owner).unwrap();
        engine.transfer_ownership(owner, new_owner).unwrap();
        request_id
    };

    let (engine, _vrf) = build(config);
    assert_eq!(engine.rewards_count(), 5);
    assert_eq!(engine.total_weight(), 1100);
    let first = engine.get_reward(0).unwrap();
    assert_eq!(first.weight, 500);
    assert!(!first.active);
    assert_eq!(engine.get_reward(3).unwrap().weight, 100);
    let added = engine.get_reward(4).unwrap();
    assert_eq!(added.asset, bonus);
    assert_eq!(added.weight, 400);
    assert!(added.active);
    assert_eq!(
        engine.request(request_id).unwrap().status,
        RequestStatus::Fulfilled {
            reward_index: 4,
            random_value: U256::from(750)
        }
    );
    assert_eq!(engine.box_price(), price() * U256::from(2));
    assert!(engine.is_paused());
    assert_eq!(engine.owner(), new_owner);

    drop(engine);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_new_request_after_restart_does_not_resolve_recovered_one() {
    let (config, dir) = journaled_config();

    let recovered = {
        let (mut engine, _vrf) = build(config.clone());
        engine.open_box(player1(), price()).unwrap()
    };

    // Fresh coordinator, ids start at zero again
    let (vrf, deliveries) = LocalCoordinator::new(config.randomness.coordinator, 7);
    let assets = funded_assets(&config);
    let mut engine = LootEngine::new(config, vrf.clone(), assets).unwrap();
    assert_eq!(engine.pending_requests(), vec![recovered]);

    let fresh = engine.open_box(player2(), price()).unwrap();
    assert_ne!(fresh, recovered);
    assert_eq!(vrf.pending_requests(), vec![fresh]);

    vrf.fulfill_random_words(fresh, vec![U256::from(250)]).unwrap();
    let delivery = deliveries.try_recv().unwrap();
    assert_eq!(delivery.request_id, fresh);
    assert_eq!(
        engine.on_randomness_fulfilled(delivery.coordinator, delivery.request_id, &delivery.random_words),
        Ok(0)
    );

    assert_eq!(engine.request(recovered).unwrap().status, RequestStatus::Pending);
    assert_eq!(engine.request(recovered).unwrap().requester, player1());
    assert_eq!(engine.player_boxes(player2()), &[fresh]);
    assert_eq!(engine.pending_requests(), vec![recovered]);

    drop(engine);
    std::fs::remove_dir_all(&dir).ok();
}
