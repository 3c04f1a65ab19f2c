//! # Loot Engine
//!
//! Composes pool, selector, dispatcher and ledger into the box lifecycle:
//!
//! ```text
//! open_box ──▶ price/pause checks ──▶ request randomness ──▶ Pending
//!                                                              │
//! on_randomness_fulfilled (coordinator only) ◀─────────────────┘
//!     └─▶ select ──▶ custody check ──▶ journal ──▶ transfer ──▶ Fulfilled
//! ```
//!
//! Every public call validates first and mutates last. A call that returns
//! `Err` has changed nothing.

use alloy_primitives::{Address, U256};
use lootbox_chain::{AssetLedger, ChainError, RandomnessProvider, RandomnessRequest};

use crate::config::EngineConfig;
use crate::dispatcher::AssetDispatcher;
use crate::error::{LootError, LootResult};
use crate::events::{EventLog, LootEvent};
use crate::journal::{EngineJournal, JournalRecord};
use crate::ledger::{BoxRequest, BoxRequestLedger};
use crate::pool::{RewardEntry, RewardKind, RewardPool};
use crate::selector;

/// The loot box.
///
/// `R` supplies randomness, `A` holds the reward assets.
pub struct LootEngine<R, A> {
    /// Custody account (the engine's own address).
    address: Address,
    owner: Address,
    /// Price in wei.
    box_price: U256,
    paused: bool,
    /// Only this caller may deliver randomness.
    coordinator: Address,
    request: RandomnessRequest,
    pool: RewardPool,
    ledger: BoxRequestLedger,
    dispatcher: AssetDispatcher,
    randomness: R,
    assets: A,
    events: EventLog,
    /// Payments received and not yet withdrawn.
    collected: U256,
    journal: Option<EngineJournal>,
}

impl<R: RandomnessProvider, A: AssetLedger> LootEngine<R, A> {
    /// Builds an engine from configuration.
    ///
    /// Configured rewards are added in order (emitting `RewardAdded`). If a
    /// journal path is set, the journal is opened and replayed.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if the provider's address is not the configured
    ///   coordinator, or an account is the zero address
    /// - any reward validation error
    /// - `Journal` if the journal cannot be opened or replayed
    pub fn new(config: EngineConfig, randomness: R, assets: A) -> LootResult<Self> {
        if randomness.address() != config.randomness.coordinator {
            return Err(LootError::InvalidConfig(format!(
                "randomness provider is {}, config expects {}",
                randomness.address(),
                config.randomness.coordinator
            )));
        }
        if config.address == Address::ZERO || config.owner == Address::ZERO {
            return Err(LootError::InvalidConfig(
                "engine and owner addresses must be non-zero".to_string(),
            ));
        }

        let mut engine = Self {
            address: config.address,
            owner: config.owner,
            box_price: config.box_price.to_u256(),
            paused: false,
            coordinator: config.randomness.coordinator,
            request: config.randomness.request,
            pool: RewardPool::new(),
            ledger: BoxRequestLedger::new(),
            dispatcher: AssetDispatcher::new(config.address),
            randomness,
            assets,
            events: EventLog::new(),
            collected: U256::ZERO,
            journal: None,
        };

        for reward in &config.rewards {
            engine.push_reward(reward.kind, reward.asset, reward.sub_id, reward.amount, reward.weight)?;
        }

        if let Some(path) = &config.journal_path {
            let (journal, records) = EngineJournal::open(path)?;
            engine.attach_journal(journal, records)?;
        }

        tracing::info!(
            "Loot engine {} ready: price {} wei, {} rewards, total weight {}",
            engine.address,
            engine.box_price,
            engine.pool.len(),
            engine.pool.total_weight()
        );
        Ok(engine)
    }

    // =========================================================================
    // Player surface
    // =========================================================================

    /// Buys a box and requests randomness for it.
    ///
    /// Returns the request id. Overpayment is kept.
    ///
    /// # Errors
    ///
    /// `Paused`, `InsufficientPayment`, `NoRewardsAvailable`, `Unauthorized`
    /// for the zero address, `DuplicateRequest` if the provider reuses an id,
    /// or the provider's own failure.
    pub fn open_box(&mut self, caller: Address, payment: U256) -> LootResult<U256> {
        if self.paused {
            return Err(LootError::Paused);
        }
        if caller == Address::ZERO {
            return Err(LootError::Unauthorized { caller });
        }
        if payment < self.box_price {
            return Err(LootError::InsufficientPayment {
                required: self.box_price,
                provided: payment,
            });
        }
        if self.pool.total_weight() == 0 {
            return Err(LootError::NoRewardsAvailable);
        }
        let collected = self
            .collected
            .checked_add(payment)
            .ok_or(LootError::ArithmeticOverflow)?;

        let request_id = self
            .randomness
            .request_random_words(self.address, &self.request)?;
        if self.ledger.get(request_id).is_some() {
            tracing::warn!("Randomness provider reissued request id {}", request_id);
            return Err(LootError::DuplicateRequest(request_id));
        }

        self.write_journal(&JournalRecord::BoxOpened {
            request_id,
            requester: caller,
            paid: payment,
        })?;
        self.ledger.create_request(request_id, caller, payment)?;
        self.collected = collected;

        tracing::info!("Box opened: request {} by {}", request_id, caller);
        self.events.emit(LootEvent::BoxOpened {
            request_id,
            player: caller,
        });
        Ok(request_id)
    }

    /// Randomness callback. Resolves `request_id` and pays the reward.
    ///
    /// Only the configured coordinator may call this. The first word is the
    /// random value. Works while paused. Returns the winning pool index.
    ///
    /// # Errors
    ///
    /// `Unauthorized`, `UnknownRequest`, `AlreadyFulfilled`,
    /// `MissingRandomWords`, `NoRewardsAvailable`, `AssetUnavailable`. On any
    /// error the request stays Pending and can be delivered again.
    pub fn on_randomness_fulfilled(
        &mut self,
        caller: Address,
        request_id: U256,
        random_words: &[U256],
    ) -> LootResult<usize> {
        let result = self.fulfill(caller, request_id, random_words);
        if let Err(e) = &result {
            tracing::warn!("Fulfillment of request {} rejected: {}", request_id, e);
        }
        result
    }

    fn fulfill(&mut self, caller: Address, request_id: U256, random_words: &[U256]) -> LootResult<usize> {
        if caller != self.coordinator {
            return Err(LootError::Unauthorized { caller });
        }
        self.ledger.pending(request_id)?;
        let random_value = *random_words
            .first()
            .ok_or(LootError::MissingRandomWords(request_id))?;

        let pool = &mut self.pool;
        let assets = &mut self.assets;
        let events = &mut self.events;
        let dispatcher = self.dispatcher;
        let journal = self.journal.as_ref();

        self.ledger.fulfill(request_id, random_value, |request: &BoxRequest| {
            let index = selector::select(random_value, pool.entries(), pool.total_weight())?;
            let entry: RewardEntry = pool.get_reward(index)?.clone();
            dispatcher.check_available(&*assets, &entry)?;

            if let Some(journal) = journal {
                journal.append(&JournalRecord::BoxFulfilled {
                    request_id,
                    reward_index: index as u64,
                    random_value,
                })?;
            }
            dispatcher.dispatch(&mut *assets, &entry, request_id, request.requester, &mut *events)?;

            if entry.kind == RewardKind::Unique && pool.deactivate(index)? {
                tracing::info!("Unique reward {} exhausted", index);
                events.emit(LootEvent::RewardUpdated {
                    index,
                    weight: entry.weight,
                    active: false,
                });
                events.emit(LootEvent::RewardExhausted { index });
            }
            Ok(index)
        })
    }

    // =========================================================================
    // Admin surface
    // =========================================================================

    /// Appends a reward to the pool. Owner only.
    ///
    /// # Errors
    ///
    /// `Unauthorized`, `ZeroWeight`, `InvalidAmount`, `ArithmeticOverflow`.
    pub fn add_reward(
        &mut self,
        caller: Address,
        kind: RewardKind,
        asset: Address,
        sub_id: U256,
        amount: U256,
        weight: u32,
    ) -> LootResult<usize> {
        self.ensure_owner(caller)?;
        self.pool.check_add(kind, amount, weight)?;
        self.write_journal(&JournalRecord::RewardAdded {
            kind,
            asset,
            sub_id,
            amount,
            weight,
        })?;
        self.push_reward(kind, asset, sub_id, amount, weight)
    }

    /// Changes weight and activation of a reward. Owner only.
    ///
    /// # Errors
    ///
    /// `Unauthorized`, `IndexOutOfRange`, `ZeroWeight`.
    pub fn update_reward(&mut self, caller: Address, index: usize, weight: u32, active: bool) -> LootResult<()> {
        self.ensure_owner(caller)?;
        self.pool.check_update(index, weight, active)?;
        self.write_journal(&JournalRecord::RewardUpdated {
            index: index as u64,
            weight,
            active,
        })?;
        self.pool.update_reward(index, weight, active)?;

        tracing::info!(
            "Reward {} updated: weight {}, active {}, total weight {}",
            index,
            weight,
            active,
            self.pool.total_weight()
        );
        self.events.emit(LootEvent::RewardUpdated { index, weight, active });
        Ok(())
    }

    /// Changes the box price (wei). Owner only.
    ///
    /// # Errors
    ///
    /// `Unauthorized`, or `Journal` if the change cannot be recorded.
    pub fn set_box_price(&mut self, caller: Address, new_price: U256) -> LootResult<()> {
        self.ensure_owner(caller)?;
        self.write_journal(&JournalRecord::PriceUpdated { price: new_price })?;
        let old_price = std::mem::replace(&mut self.box_price, new_price);

        tracing::info!("Box price {} -> {} wei", old_price, new_price);
        self.events.emit(LootEvent::BoxPriceUpdated { old_price, new_price });
        Ok(())
    }

    /// Stops new purchases. Pending requests still resolve. Owner only.
    ///
    /// # Errors
    ///
    /// `Unauthorized`, or `Paused` if already paused.
    pub fn pause(&mut self, caller: Address) -> LootResult<()> {
        self.ensure_owner(caller)?;
        if self.paused {
            return Err(LootError::Paused);
        }
        self.write_journal(&JournalRecord::PauseChanged { paused: true })?;
        self.paused = true;

        tracing::info!("Engine paused by {}", caller);
        self.events.emit(LootEvent::Paused { account: caller });
        Ok(())
    }

    /// Resumes purchases. Owner only.
    ///
    /// # Errors
    ///
    /// `Unauthorized`, or `NotPaused`.
    pub fn unpause(&mut self, caller: Address) -> LootResult<()> {
        self.ensure_owner(caller)?;
        if !self.paused {
            return Err(LootError::NotPaused);
        }
        self.write_journal(&JournalRecord::PauseChanged { paused: false })?;
        self.paused = false;

        tracing::info!("Engine unpaused by {}", caller);
        self.events.emit(LootEvent::Unpaused { account: caller });
        Ok(())
    }

    /// Sends all collected payments to the owner. Owner only.
    ///
    /// Returns the amount withdrawn.
    ///
    /// # Errors
    ///
    /// `Unauthorized`, or `Journal` if the withdrawal cannot be recorded.
    pub fn withdraw(&mut self, caller: Address) -> LootResult<U256> {
        self.ensure_owner(caller)?;
        let amount = self.collected;

        self.write_journal(&JournalRecord::FundsWithdrawn { to: self.owner, amount })?;
        self.collected = U256::ZERO;

        tracing::info!("Withdrew {} wei to {}", amount, self.owner);
        self.events.emit(LootEvent::FundsWithdrawn { to: self.owner, amount });
        Ok(amount)
    }

    /// Hands admin rights to `new_owner`. Owner only.
    ///
    /// # Errors
    ///
    /// `Unauthorized`, or `Chain(ZeroRecipient)` for the zero address.
    pub fn transfer_ownership(&mut self, caller: Address, new_owner: Address) -> LootResult<()> {
        self.ensure_owner(caller)?;
        if new_owner == Address::ZERO {
            return Err(ChainError::ZeroRecipient.into());
        }
        self.write_journal(&JournalRecord::OwnerChanged { owner: new_owner })?;
        let previous_owner = std::mem::replace(&mut self.owner, new_owner);

        tracing::info!("Ownership {} -> {}", previous_owner, new_owner);
        self.events.emit(LootEvent::OwnershipTransferred {
            previous_owner,
            new_owner,
        });
        Ok(())
    }

    // =========================================================================
    // Journal
    // =========================================================================

    /// Attaches a journal and replays its records.
    ///
    /// Must be called on a freshly built engine, before any other call.
    /// Records are replayed in order on top of the configured state:
    /// requests, player history, collected funds, runtime reward changes,
    /// unique exhaustion, price, pause flag and owner. Replay emits no
    /// events. Afterwards the randomness provider is moved past every
    /// recovered request id.
    ///
    /// # Errors
    ///
    /// `Journal` if the engine already has requests, or a record contradicts
    /// the rebuilt state.
    pub fn attach_journal(&mut self, journal: EngineJournal, records: Vec<JournalRecord>) -> LootResult<()> {
        if self.ledger.total_opened() > 0 || self.journal.is_some() {
            return Err(LootError::Journal(
                "journal must be attached to a fresh engine".to_string(),
            ));
        }

        let mut ledger = BoxRequestLedger::new();
        let mut pool = self.pool.clone();
        let mut collected = U256::ZERO;
        let mut box_price = self.box_price;
        let mut paused = self.paused;
        let mut owner = self.owner;
        let replay_error = |what: &str, e: &LootError| LootError::Journal(format!("replay {what}: {e}"));
        let pool_index = |index: u64| {
            usize::try_from(index).map_err(|_| LootError::Journal(format!("reward index {index}")))
        };

        for record in &records {
            match *record {
                JournalRecord::BoxOpened { request_id, requester, paid } => {
                    ledger
                        .create_request(request_id, requester, paid)
                        .map_err(|e| replay_error("BoxOpened", &e))?;
                    collected = collected
                        .checked_add(paid)
                        .ok_or(LootError::ArithmeticOverflow)?;
                }
                JournalRecord::BoxFulfilled { request_id, reward_index, random_value } => {
                    let index = pool_index(reward_index)?;
                    ledger
                        .mark_fulfilled(request_id, index, random_value)
                        .map_err(|e| replay_error("BoxFulfilled", &e))?;
                    let unique = pool
                        .get_reward(index)
                        .map_err(|e| replay_error("BoxFulfilled", &e))?
                        .kind
                        == RewardKind::Unique;
                    if unique {
                        pool.deactivate(index)?;
                    }
                }
                JournalRecord::FundsWithdrawn { amount, .. } => {
                    collected = collected.saturating_sub(amount);
                }
                JournalRecord::RewardAdded { kind, asset, sub_id, amount, weight } => {
                    pool.add_reward(kind, asset, sub_id, amount, weight)
                        .map_err(|e| replay_error("RewardAdded", &e))?;
                }
                JournalRecord::RewardUpdated { index, weight, active } => {
                    pool.update_reward(pool_index(index)?, weight, active)
                        .map_err(|e| replay_error("RewardUpdated", &e))?;
                }
                JournalRecord::PriceUpdated { price } => box_price = price,
                JournalRecord::PauseChanged { paused: flag } => paused = flag,
                JournalRecord::OwnerChanged { owner: new_owner } => owner = new_owner,
            }
        }

        if let Some(last) = ledger.last_request_id() {
            self.randomness.resume_after(last);
        }

        tracing::info!(
            "Journal {} replayed: {} records, {} pending requests, {} rewards",
            journal.path().display(),
            records.len(),
            ledger.pending_requests().len(),
            pool.len()
        );
        self.ledger = ledger;
        self.pool = pool;
        self.collected = collected;
        self.box_price = box_price;
        self.paused = paused;
        self.owner = owner;
        self.journal = Some(journal);
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Custody account.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Admin account.
    #[must_use]
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Trusted randomness caller.
    #[must_use]
    pub fn coordinator(&self) -> Address {
        self.coordinator
    }

    /// Current price in wei.
    #[must_use]
    pub fn box_price(&self) -> U256 {
        self.box_price
    }

    /// Whether purchases are suspended.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Boxes sold so far.
    #[must_use]
    pub fn total_boxes_opened(&self) -> u64 {
        self.ledger.total_opened()
    }

    /// Payments held, not yet withdrawn.
    #[must_use]
    pub fn collected_funds(&self) -> U256 {
        self.collected
    }

    /// Request ids opened by `player`, oldest first.
    #[must_use]
    pub fn player_boxes(&self, player: Address) -> &[U256] {
        self.ledger.player_boxes(player)
    }

    /// Request by id.
    #[must_use]
    pub fn request(&self, request_id: U256) -> Option<&BoxRequest> {
        self.ledger.get(request_id)
    }

    /// Requests waiting on randomness.
    #[must_use]
    pub fn pending_requests(&self) -> Vec<U256> {
        self.ledger.pending_requests()
    }

    /// Reward at `index`.
    ///
    /// # Errors
    ///
    /// `IndexOutOfRange`.
    pub fn get_reward(&self, index: usize) -> LootResult<&RewardEntry> {
        self.pool.get_reward(index)
    }

    /// Number of rewards ever added.
    #[must_use]
    pub fn rewards_count(&self) -> usize {
        self.pool.len()
    }

    /// Sum of active weights.
    #[must_use]
    pub fn total_weight(&self) -> u64 {
        self.pool.total_weight()
    }

    /// Active rewards in index order.
    #[must_use]
    pub fn active_rewards(&self) -> Vec<&RewardEntry> {
        self.pool.active_rewards().collect()
    }

    /// The reward pool.
    #[must_use]
    pub fn pool(&self) -> &RewardPool {
        &self.pool
    }

    /// Buffered events.
    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Takes all buffered events.
    pub fn drain_events(&mut self) -> Vec<LootEvent> {
        self.events.drain()
    }

    /// Asset custody.
    #[must_use]
    pub fn assets(&self) -> &A {
        &self.assets
    }

    /// Mutable asset custody, for funding the pool.
    pub fn assets_mut(&mut self) -> &mut A {
        &mut self.assets
    }

    /// Randomness provider.
    #[must_use]
    pub fn randomness(&self) -> &R {
        &self.randomness
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn ensure_owner(&self, caller: Address) -> LootResult<()> {
        if caller == self.owner {
            Ok(())
        } else {
            Err(LootError::Unauthorized { caller })
        }
    }

    fn push_reward(
        &mut self,
        kind: RewardKind,
        asset: Address,
        sub_id: U256,
        amount: U256,
        weight: u32,
    ) -> LootResult<usize> {
        let index = self.pool.add_reward(kind, asset, sub_id, amount, weight)?;

        tracing::info!(
            "Reward {} added: {} {} x{} weight {}",
            index,
            kind,
            asset,
            amount,
            weight
        );
        self.events.emit(LootEvent::RewardAdded {
            index,
            kind,
            asset,
            sub_id,
            amount,
            weight,
        });
        Ok(index)
    }

    fn write_journal(&self, record: &JournalRecord) -> LootResult<()> {
        if let Some(journal) = &self.journal {
            journal.append(record)?;
        }
        Ok(())
    }
}
