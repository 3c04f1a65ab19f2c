//! # Loot Service
//!
//! Thread-safe front of a `LootEngine`.
//!
//! Every call takes the engine lock for its whole duration, so calls are
//! strictly serialized: two fulfillments can never race on the same unique
//! asset. Randomness arrives on the coordinator's channel and is applied by
//! `pump`, with the delivering coordinator as the authenticated caller.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use lootbox_chain::{AssetLedger, RandomnessDelivery, RandomnessProvider};
use parking_lot::Mutex;

use crate::engine::LootEngine;
use crate::error::{LootError, LootResult};

/// What one `pump` call did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PumpReport {
    /// (request id, winning index) for each resolved request.
    pub fulfilled: Vec<(U256, usize)>,
    /// Deliveries the engine rejected; those requests stay as they were.
    pub rejected: Vec<(U256, LootError)>,
    /// Deliveries addressed to another consumer.
    pub ignored: usize,
}

impl PumpReport {
    /// Number of deliveries processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.fulfilled.len() + self.rejected.len() + self.ignored
    }
}

/// Serialized, shareable engine handle.
pub struct LootService<R, A> {
    engine: Arc<Mutex<LootEngine<R, A>>>,
    deliveries: Receiver<RandomnessDelivery>,
}

impl<R, A> Clone for LootService<R, A> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            deliveries: self.deliveries.clone(),
        }
    }
}

impl<R: RandomnessProvider, A: AssetLedger> LootService<R, A> {
    /// Wraps an engine and the channel its provider delivers on.
    #[must_use]
    pub fn new(engine: LootEngine<R, A>, deliveries: Receiver<RandomnessDelivery>) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            deliveries,
        }
    }

    /// Runs `f` with exclusive access to the engine.
    pub fn with_engine<T>(&self, f: impl FnOnce(&mut LootEngine<R, A>) -> T) -> T {
        let mut engine = self.engine.lock();
        f(&mut engine)
    }

    /// Buys a box.
    ///
    /// # Errors
    ///
    /// See `LootEngine::open_box`.
    pub fn open_box(&self, caller: Address, payment: U256) -> LootResult<U256> {
        self.engine.lock().open_box(caller, payment)
    }

    /// Applies every delivery already waiting on the channel.
    pub fn pump(&self) -> PumpReport {
        let mut report = PumpReport::default();
        for delivery in self.deliveries.try_iter() {
            self.apply(delivery, &mut report);
        }
        report
    }

    /// Waits up to `timeout` for the first delivery, then drains the rest.
    ///
    /// # Errors
    ///
    /// `Chain(ChannelClosed)` once every sender is gone.
    pub fn pump_timeout(&self, timeout: Duration) -> LootResult<PumpReport> {
        let mut report = PumpReport::default();
        match self.deliveries.recv_timeout(timeout) {
            Ok(delivery) => self.apply(delivery, &mut report),
            Err(RecvTimeoutError::Timeout) => return Ok(report),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(lootbox_chain::ChainError::ChannelClosed.into());
            }
        }
        for delivery in self.deliveries.try_iter() {
            self.apply(delivery, &mut report);
        }
        Ok(report)
    }

    fn apply(&self, delivery: RandomnessDelivery, report: &mut PumpReport) {
        let mut engine = self.engine.lock();
        if delivery.consumer != engine.address() {
            tracing::debug!(
                "Ignoring delivery for request {} addressed to {}",
                delivery.request_id,
                delivery.consumer
            );
            report.ignored += 1;
            return;
        }

        match engine.on_randomness_fulfilled(
            delivery.coordinator,
            delivery.request_id,
            &delivery.random_words,
        ) {
            Ok(index) => report.fulfilled.push((delivery.request_id, index)),
            Err(e) => report.rejected.push((delivery.request_id, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::fixed_point::FixedPoint18;
    use crate::pool::RewardKind;
    use lootbox_chain::{InMemoryAssets, LocalCoordinator};

    fn owner() -> Address {
        Address::repeat_byte(0xA0)
    }

    fn custody() -> Address {
        Address::repeat_byte(0xB0)
    }

    fn coordinator() -> Address {
        Address::repeat_byte(0xC0)
    }

    fn token() -> Address {
        Address::repeat_byte(0x20)
    }

    fn service() -> (LootService<LocalCoordinator, InMemoryAssets>, LocalCoordinator) {
        let config = EngineConfig::new(custody(), owner(), FixedPoint18::from_wei(1), coordinator())
            .with_reward(RewardKind::Fungible, token(), U256::ZERO, U256::from(1), 1);
        let (vrf, rx) = LocalCoordinator::new(coordinator(), 3);
        let mut assets = InMemoryAssets::new();
        assets.mint_fungible(token(), custody(), U256::from(1_000));
        let engine = LootEngine::new(config, vrf.clone(), assets).unwrap();
        (LootService::new(engine, rx), vrf)
    }

    #[test]
    fn test_pump_applies_deliveries() {
        let (service, vrf) = service();
        let first = service.open_box(Address::repeat_byte(1), U256::from(1)).unwrap();
        let second = service.open_box(Address::repeat_byte(2), U256::from(1)).unwrap();

        assert_eq!(vrf.fulfill_pending().unwrap(), 2);
        let report = service.pump();

        assert_eq!(report.fulfilled, vec![(first, 0), (second, 0)]);
        assert!(service.with_engine(|e| e.pending_requests().is_empty()));
    }

    #[test]
    fn test_redelivery_is_rejected_not_repaid() {
        let (service, vrf) = service();
        let id = service.open_box(Address::repeat_byte(1), U256::from(1)).unwrap();
        vrf.fulfill_random_words(id, vec![U256::from(5)]).unwrap();
        vrf.redeliver(id).unwrap();

        let report = service.pump();
        assert_eq!(report.fulfilled.len(), 1);
        assert_eq!(report.rejected, vec![(id, LootError::AlreadyFulfilled(id))]);

        let balance = service.with_engine(|e| e.assets().balance_of(token(), Address::repeat_byte(1)));
        assert_eq!(balance, U256::from(1));
    }

    #[test]
    fn test_concurrent_buyers_are_serialized() {
        let (service, vrf) = service();
        let handles: Vec<_> = (1..=4u8)
            .map(|n| {
                let service = service.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        service.open_box(Address::repeat_byte(n), U256::from(1)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(vrf.fulfill_pending().unwrap(), 100);
        let report = service.pump_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(report.fulfilled.len(), 100);
        assert_eq!(service.with_engine(|e| e.total_boxes_opened()), 100);
    }
}
