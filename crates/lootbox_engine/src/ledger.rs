//! # Box Request Ledger
//!
//! One record per purchased box, keyed by the randomness request id.
//!
//! ```text
//!   create_request          fulfill (Ok)
//! ──────────────▶ Pending ──────────────▶ Fulfilled (terminal)
//!                    │
//!                    └── fulfill (Err) ──▶ Pending (unchanged)
//! ```
//!
//! `fulfill` runs the caller's resolution closure and only records the
//! transition when it succeeds, so a failed payout can be re-driven and a
//! successful one can never run twice.

use std::collections::{BTreeMap, HashMap};

use alloy_primitives::{Address, U256};

use crate::error::{LootError, LootResult};

/// Lifecycle of a box request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestStatus {
    /// Paid for, waiting on randomness.
    Pending,
    /// Resolved and paid out.
    Fulfilled {
        /// Winning pool index.
        reward_index: usize,
        /// Random value that decided it.
        random_value: U256,
    },
}

/// A purchased box.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoxRequest {
    /// Handle issued by the randomness provider.
    pub request_id: U256,
    /// Buyer and recipient of the reward.
    pub requester: Address,
    /// Amount paid in wei.
    pub paid: U256,
    /// Current state.
    pub status: RequestStatus,
}

impl BoxRequest {
    /// Whether the request reached its terminal state.
    #[inline]
    #[must_use]
    pub const fn is_fulfilled(&self) -> bool {
        matches!(self.status, RequestStatus::Fulfilled { .. })
    }
}

/// Requests and per-player history.
#[derive(Clone, Debug, Default)]
pub struct BoxRequestLedger {
    requests: BTreeMap<U256, BoxRequest>,
    history: HashMap<Address, Vec<U256>>,
}

impl BoxRequestLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new Pending request and appends it to the buyer's history.
    ///
    /// # Errors
    ///
    /// `DuplicateRequest` if the id is already known.
    pub fn create_request(&mut self, request_id: U256, requester: Address, paid: U256) -> LootResult<()> {
        if self.requests.contains_key(&request_id) {
            return Err(LootError::DuplicateRequest(request_id));
        }
        self.requests.insert(
            request_id,
            BoxRequest {
                request_id,
                requester,
                paid,
                status: RequestStatus::Pending,
            },
        );
        self.history.entry(requester).or_default().push(request_id);
        Ok(())
    }

    /// Checks that `request_id` exists and is still Pending.
    ///
    /// # Errors
    ///
    /// `UnknownRequest` or `AlreadyFulfilled`.
    pub fn pending(&self, request_id: U256) -> LootResult<&BoxRequest> {
        let request = self
            .requests
            .get(&request_id)
            .ok_or(LootError::UnknownRequest(request_id))?;
        if request.is_fulfilled() {
            return Err(LootError::AlreadyFulfilled(request_id));
        }
        Ok(request)
    }

    /// Resolves a Pending request.
    ///
    /// `resolve` receives the request and returns the winning index; the
    /// request becomes Fulfilled only if it returns `Ok`.
    ///
    /// # Errors
    ///
    /// `UnknownRequest`, `AlreadyFulfilled`, or whatever `resolve` returns.
    pub fn fulfill<F>(&mut self, request_id: U256, random_value: U256, resolve: F) -> LootResult<usize>
    where
        F: FnOnce(&BoxRequest) -> LootResult<usize>,
    {
        let reward_index = resolve(self.pending(request_id)?)?;
        self.mark_fulfilled(request_id, reward_index, random_value)?;
        Ok(reward_index)
    }

    /// Moves a Pending request to Fulfilled without running a payout.
    ///
    /// Used when replaying the journal.
    ///
    /// # Errors
    ///
    /// `UnknownRequest` or `AlreadyFulfilled`.
    pub fn mark_fulfilled(&mut self, request_id: U256, reward_index: usize, random_value: U256) -> LootResult<()> {
        self.pending(request_id)?;
        if let Some(request) = self.requests.get_mut(&request_id) {
            request.status = RequestStatus::Fulfilled {
                reward_index,
                random_value,
            };
        }
        Ok(())
    }

    /// Request by id.
    #[must_use]
    pub fn get(&self, request_id: U256) -> Option<&BoxRequest> {
        self.requests.get(&request_id)
    }

    /// Request ids opened by `player`, oldest first.
    #[must_use]
    pub fn player_boxes(&self, player: Address) -> &[U256] {
        self.history.get(&player).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Requests still waiting on randomness, in id order.
    #[must_use]
    pub fn pending_requests(&self) -> Vec<U256> {
        self.requests
            .values()
            .filter(|r| !r.is_fulfilled())
            .map(|r| r.request_id)
            .collect()
    }

    /// Number of requests ever created.
    #[must_use]
    pub fn total_opened(&self) -> u64 {
        self.requests.len() as u64
    }

    /// Highest request id seen.
    #[must_use]
    pub fn last_request_id(&self) -> Option<U256> {
        self.requests.keys().next_back().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Address {
        Address::repeat_byte(0xA1)
    }

    fn bob() -> Address {
        Address::repeat_byte(0xB2)
    }

    #[test]
    fn test_history_is_per_player_and_ordered() {
        let mut ledger = BoxRequestLedger::new();
        ledger.create_request(U256::from(0), alice(), U256::from(1)).unwrap();
        ledger.create_request(U256::from(1), bob(), U256::from(1)).unwrap();
        ledger.create_request(U256::from(2), alice(), U256::from(1)).unwrap();

        assert_eq!(ledger.player_boxes(alice()), &[U256::from(0), U256::from(2)]);
        assert_eq!(ledger.player_boxes(bob()), &[U256::from(1)]);
        assert!(ledger.player_boxes(Address::ZERO).is_empty());
        assert_eq!(ledger.total_opened(), 3);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut ledger = BoxRequestLedger::new();
        ledger.create_request(U256::from(5), alice(), U256::ZERO).unwrap();
        assert_eq!(
            ledger.create_request(U256::from(5), bob(), U256::ZERO),
            Err(LootError::DuplicateRequest(U256::from(5)))
        );
        assert!(ledger.player_boxes(bob()).is_empty());
    }

    #[test]
    fn test_fulfill_exactly_once() {
        let mut ledger = BoxRequestLedger::new();
        ledger.create_request(U256::from(0), alice(), U256::ZERO).unwrap();

        let mut payouts = 0;
        let index = ledger
            .fulfill(U256::from(0), U256::from(42), |request| {
                assert_eq!(request.requester, alice());
                payouts += 1;
                Ok(2)
            })
            .unwrap();
        assert_eq!(index, 2);

        let again = ledger.fulfill(U256::from(0), U256::from(42), |_| {
            payouts += 1;
            Ok(2)
        });
        assert_eq!(again, Err(LootError::AlreadyFulfilled(U256::from(0))));
        assert_eq!(payouts, 1);
        assert_eq!(
            ledger.get(U256::from(0)).unwrap().status,
            RequestStatus::Fulfilled {
                reward_index: 2,
                random_value: U256::from(42)
            }
        );
    }

    #[test]
    fn test_failed_resolution_stays_pending() {
        let mut ledger = BoxRequestLedger::new();
        ledger.create_request(U256::from(0), alice(), U256::ZERO).unwrap();

        let failed = ledger.fulfill(U256::from(0), U256::ZERO, |_| {
            Err(LootError::AssetUnavailable {
                index: 0,
                reason: "empty".to_string(),
            })
        });
        assert!(failed.is_err());
        assert_eq!(ledger.pending_requests(), vec![U256::from(0)]);

        ledger.fulfill(U256::from(0), U256::ZERO, |_| Ok(0)).unwrap();
        assert!(ledger.pending_requests().is_empty());
    }

    #[test]
    fn test_unknown_request() {
        let mut ledger = BoxRequestLedger::new();
        assert_eq!(
            ledger.fulfill(U256::from(9), U256::ZERO, |_| Ok(0)),
            Err(LootError::UnknownRequest(U256::from(9)))
        );
    }

    #[test]
    fn test_last_request_id_is_highest() {
        let mut ledger = BoxRequestLedger::new();
        assert_eq!(ledger.last_request_id(), None);
        ledger.create_request(U256::from(7), alice(), U256::ZERO).unwrap();
        ledger.create_request(U256::from(2), bob(), U256::ZERO).unwrap();
        assert_eq!(ledger.last_request_id(), Some(U256::from(7)));
    }
}
