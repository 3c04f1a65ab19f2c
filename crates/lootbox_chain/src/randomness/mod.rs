//! # Randomness Coordinator
//!
//! Request/deliver model of a VRF service:
//!
//! 1. The consumer calls `request_random_words` and gets a request id back.
//! 2. Some time later the coordinator answers with a `RandomnessDelivery`
//!    carrying the words, pushed onto a channel.
//! 3. Whoever drains the channel hands the delivery to the consumer, naming
//!    the coordinator as the caller.
//!
//! `LocalCoordinator` is the in-process stand-in. Request ids are sequential
//! from 0, and answers are either supplied by the caller or drawn from a
//! seeded ChaCha20 stream, so every run is reproducible.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolCall;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::contracts::{IVRFConsumer, IVRFCoordinator};
use crate::error::{ChainError, ChainResult};

/// Parameters of a randomness request (the VRF "gas lane" configuration).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RandomnessRequest {
    /// Gas lane / key hash.
    pub key_hash: B256,
    /// Billing subscription.
    pub subscription_id: u64,
    /// Blocks to wait before answering.
    pub request_confirmations: u16,
    /// Gas budget for the callback.
    pub callback_gas_limit: u32,
    /// Number of words requested.
    pub num_words: u32,
}

impl Default for RandomnessRequest {
    fn default() -> Self {
        Self {
            key_hash: B256::ZERO,
            subscription_id: 1,
            request_confirmations: 3,
            callback_gas_limit: 500_000,
            num_words: 1,
        }
    }
}

impl RandomnessRequest {
    /// ABI-encoded `requestRandomWords` call for these parameters.
    #[must_use]
    pub fn calldata(&self) -> Vec<u8> {
        IVRFCoordinator::requestRandomWordsCall {
            key_hash: self.key_hash,
            sub_id: self.subscription_id,
            minimum_request_confirmations: self.request_confirmations,
            callback_gas_limit: self.callback_gas_limit,
            num_words: self.num_words,
        }
        .abi_encode()
    }
}

/// A randomness source the engine can buy words from.
pub trait RandomnessProvider {
    /// Identity the provider calls back from. Only this caller may fulfill.
    fn address(&self) -> Address;

    /// Registers a request for `consumer` and returns its handle.
    ///
    /// The answer arrives later and out of band.
    ///
    /// # Errors
    ///
    /// Provider-specific refusal (e.g. `NoWordsRequested`).
    fn request_random_words(
        &mut self,
        consumer: Address,
        request: &RandomnessRequest,
    ) -> ChainResult<U256>;

    /// Promises that no future request id is `<= last_request_id`.
    ///
    /// A consumer that recovered requests from disk calls this before asking
    /// for new words, so an answer can never be matched to the wrong box.
    fn resume_after(&mut self, last_request_id: U256);
}

/// An answer travelling from the coordinator to the consumer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RandomnessDelivery {
    /// Coordinator that produced the answer (the authenticated caller).
    pub coordinator: Address,
    /// Consumer the answer is addressed to.
    pub consumer: Address,
    /// Request being answered.
    pub request_id: U256,
    /// The random words.
    pub random_words: Vec<U256>,
}

impl RandomnessDelivery {
    /// ABI-encoded `rawFulfillRandomWords` callback.
    #[must_use]
    pub fn calldata(&self) -> Vec<u8> {
        IVRFConsumer::rawFulfillRandomWordsCall {
            request_id: self.request_id,
            random_words: self.random_words.clone(),
        }
        .abi_encode()
    }
}

/// Book-keeping for one request.
#[derive(Clone, Debug)]
struct RequestRecord {
    consumer: Address,
    num_words: u32,
    /// Words sent, once answered.
    answer: Option<Vec<U256>>,
}

struct CoordinatorState {
    next_request_id: U256,
    requests: HashMap<U256, RequestRecord>,
    /// Encoded `requestRandomWords` calls, oldest first.
    request_log: Vec<Vec<u8>>,
    rng: ChaCha20Rng,
}

/// In-process VRF coordinator.
///
/// Cheap to clone: clones share the same request book and channel, so a test
/// can keep one handle while the engine owns another.
#[derive(Clone)]
pub struct LocalCoordinator {
    address: Address,
    state: Arc<Mutex<CoordinatorState>>,
    sender: Sender<RandomnessDelivery>,
}

impl LocalCoordinator {
    /// Creates a coordinator and the receiving end of its delivery channel.
    ///
    /// # Arguments
    ///
    /// * `address` - identity deliveries are signed with
    /// * `seed` - seed for generated words (`fulfill_pending`)
    #[must_use]
    pub fn new(address: Address, seed: u64) -> (Self, Receiver<RandomnessDelivery>) {
        let (sender, receiver) = unbounded();
        let coordinator = Self {
            address,
            state: Arc::new(Mutex::new(CoordinatorState {
                next_request_id: U256::ZERO,
                requests: HashMap::new(),
                request_log: Vec::new(),
                rng: ChaCha20Rng::seed_from_u64(seed),
            })),
            sender,
        };
        (coordinator, receiver)
    }

    /// Requests not yet answered, in id order.
    #[must_use]
    pub fn pending_requests(&self) -> Vec<U256> {
        let state = self.state.lock();
        let mut ids: Vec<U256> = state
            .requests
            .iter()
            .filter(|(_, record)| record.answer.is_none())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Raises the next request id to at least `next_request_id`.
    pub fn resume_from(&self, next_request_id: U256) {
        let mut state = self.state.lock();
        if next_request_id > state.next_request_id {
            state.next_request_id = next_request_id;
        }
    }

    /// Encoded `requestRandomWords` calls received so far.
    #[must_use]
    pub fn request_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().request_log.clone()
    }

    /// Answers `request_id` with caller-chosen words.
    ///
    /// # Errors
    ///
    /// `UnknownRandomnessRequest`, `RandomnessAlreadyDelivered`, or
    /// `ChannelClosed` if nobody listens anymore.
    pub fn fulfill_random_words(&self, request_id: U256, random_words: Vec<U256>) -> ChainResult<()> {
        let mut state = self.state.lock();
        let record = state
            .requests
            .get_mut(&request_id)
            .ok_or(ChainError::UnknownRandomnessRequest(request_id))?;
        if record.answer.is_some() {
            return Err(ChainError::RandomnessAlreadyDelivered(request_id));
        }

        let delivery = RandomnessDelivery {
            coordinator: self.address,
            consumer: record.consumer,
            request_id,
            random_words,
        };
        self.sender
            .send(delivery.clone())
            .map_err(|_| ChainError::ChannelClosed)?;
        record.answer = Some(delivery.random_words);

        tracing::debug!("Randomness delivered for request {}", request_id);
        Ok(())
    }

    /// Answers every pending request with words from the seeded stream.
    ///
    /// Returns how many requests were answered.
    ///
    /// # Errors
    ///
    /// `ChannelClosed` if nobody listens anymore.
    pub fn fulfill_pending(&self) -> ChainResult<usize> {
        let pending = self.pending_requests();
        for request_id in &pending {
            let words = {
                let mut state = self.state.lock();
                let num_words = state
                    .requests
                    .get(request_id)
                    .map_or(1, |record| record.num_words);
                (0..num_words)
                    .map(|_| {
                        let mut word = [0u8; 32];
                        state.rng.fill_bytes(&mut word);
                        U256::from_be_bytes(word)
                    })
                    .collect::<Vec<_>>()
            };
            self.fulfill_random_words(*request_id, words)?;
        }
        Ok(pending.len())
    }

    /// Sends the answer for `request_id` again, as a retrying provider would.
    ///
    /// # Errors
    ///
    /// `UnknownRandomnessRequest` if the request was never answered.
    pub fn redeliver(&self, request_id: U256) -> ChainResult<()> {
        let state = self.state.lock();
        let record = state
            .requests
            .get(&request_id)
            .ok_or(ChainError::UnknownRandomnessRequest(request_id))?;
        let words = record
            .answer
            .clone()
            .ok_or(ChainError::UnknownRandomnessRequest(request_id))?;

        self.sender
            .send(RandomnessDelivery {
                coordinator: self.address,
                consumer: record.consumer,
                request_id,
                random_words: words,
            })
            .map_err(|_| ChainError::ChannelClosed)
    }
}

impl RandomnessProvider for LocalCoordinator {
    fn address(&self) -> Address {
        self.address
    }

    fn request_random_words(
        &mut self,
        consumer: Address,
        request: &RandomnessRequest,
    ) -> ChainResult<U256> {
        if request.num_words == 0 {
            return Err(ChainError::NoWordsRequested);
        }

        let mut state = self.state.lock();
        let request_id = state.next_request_id;
        state.next_request_id = request_id.saturating_add(U256::from(1));
        state.requests.insert(
            request_id,
            RequestRecord {
                consumer,
                num_words: request.num_words,
                answer: None,
            },
        );
        state.request_log.push(request.calldata());

        tracing::debug!(
            "Randomness requested: id={} consumer={} words={}",
            request_id,
            consumer,
            request.num_words
        );
        Ok(request_id)
    }

    fn resume_after(&mut self, last_request_id: U256) {
        self.resume_from(last_request_id.saturating_add(U256::from(1)));
    }
}
