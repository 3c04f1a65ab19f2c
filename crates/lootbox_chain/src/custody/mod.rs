//! # Asset Custody
//!
//! The three asset standards a loot box pays out, behind one trait.
//!
//! `InMemoryAssets` keeps balances and ownership the way the token contracts
//! would, and records the ABI-encoded call for every successful transfer so a
//! payout can be audited byte-for-byte against what an on-chain dispatcher
//! would have sent.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;

use crate::contracts::{IERC1155, IERC20, IERC721};
use crate::error::{ChainError, ChainResult};

/// Token contract operations the dispatcher relies on.
///
/// Each mutating call is atomic: on error no balance or owner changes.
pub trait AssetLedger {
    /// Fungible balance of `holder` on `token`.
    fn balance_of(&self, token: Address, holder: Address) -> U256;

    /// Current owner of unique token `token_id`, if minted.
    fn owner_of(&self, token: Address, token_id: U256) -> Option<Address>;

    /// Semi-fungible balance of `holder` for `id` on `token`.
    fn balance_of_id(&self, token: Address, holder: Address, id: U256) -> U256;

    /// ERC-20 `transfer` issued by `from`.
    ///
    /// # Errors
    ///
    /// `InsufficientBalance` if `from` holds less than `amount`.
    fn transfer(&mut self, token: Address, from: Address, to: Address, amount: U256)
        -> ChainResult<()>;

    /// ERC-721 `transferFrom`.
    ///
    /// # Errors
    ///
    /// `NonexistentToken` or `NotTokenOwner` when `from` cannot move it.
    fn transfer_from(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        token_id: U256,
    ) -> ChainResult<()>;

    /// ERC-1155 `safeTransferFrom`.
    ///
    /// # Errors
    ///
    /// `InsufficientBalance` if `from` holds fewer than `amount` of `id`.
    fn safe_transfer_from(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        id: U256,
        amount: U256,
        data: &[u8],
    ) -> ChainResult<()>;
}

/// One executed token call, as it would appear on chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractCall {
    /// Contract that was called.
    pub target: Address,
    /// Account that issued the call.
    pub caller: Address,
    /// ABI-encoded calldata (selector + arguments).
    pub calldata: Vec<u8>,
}

/// In-memory token contracts.
///
/// Balances are keyed by contract address, so several tokens of the same
/// standard can live side by side.
#[derive(Clone, Debug, Default)]
pub struct InMemoryAssets {
    /// (token, holder) -> balance.
    fungible: HashMap<(Address, Address), U256>,
    /// (token, token id) -> owner.
    unique: HashMap<(Address, U256), Address>,
    /// Next id handed out by `batch_mint_unique`, per token.
    next_unique_id: HashMap<Address, U256>,
    /// (token, id, holder) -> balance.
    semi_fungible: HashMap<(Address, U256, Address), U256>,
    /// Executed transfers, oldest first.
    calls: Vec<ContractCall>,
}

impl InMemoryAssets {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits `amount` of a fungible token to `to`.
    pub fn mint_fungible(&mut self, token: Address, to: Address, amount: U256) {
        let balance = self.fungible.entry((token, to)).or_insert(U256::ZERO);
        *balance = balance.saturating_add(amount);
    }

    /// Mints one unique token with an explicit id.
    ///
    /// # Errors
    ///
    /// `TokenAlreadyMinted` if the id exists.
    pub fn mint_unique(&mut self, token: Address, to: Address, token_id: U256) -> ChainResult<()> {
        if self.unique.contains_key(&(token, token_id)) {
            return Err(ChainError::TokenAlreadyMinted { token, token_id });
        }
        self.unique.insert((token, token_id), to);
        let next = self.next_unique_id.entry(token).or_insert(U256::ZERO);
        if token_id >= *next {
            *next = token_id.saturating_add(U256::from(1));
        }
        Ok(())
    }

    /// Mints `count` sequential unique tokens to `to`, ids starting at 0.
    ///
    /// Returns the minted ids.
    pub fn batch_mint_unique(&mut self, token: Address, to: Address, count: usize) -> Vec<U256> {
        let mut minted = Vec::with_capacity(count);
        let mut next = self.next_unique_id.get(&token).copied().unwrap_or(U256::ZERO);
        while minted.len() < count {
            if !self.unique.contains_key(&(token, next)) {
                self.unique.insert((token, next), to);
                minted.push(next);
            }
            next = next.saturating_add(U256::from(1));
        }
        self.next_unique_id.insert(token, next);
        minted
    }

    /// Credits `amount` units of semi-fungible `id` to `to`.
    pub fn mint_semi_fungible(&mut self, token: Address, to: Address, id: U256, amount: U256) {
        let balance = self
            .semi_fungible
            .entry((token, id, to))
            .or_insert(U256::ZERO);
        *balance = balance.saturating_add(amount);
    }

    /// Executed transfers, oldest first.
    #[must_use]
    pub fn calls(&self) -> &[ContractCall] {
        &self.calls
    }

    fn record(&mut self, target: Address, caller: Address, calldata: Vec<u8>) {
        self.calls.push(ContractCall {
            target,
            caller,
            calldata,
        });
    }
}

impl AssetLedger for InMemoryAssets {
    fn balance_of(&self, token: Address, holder: Address) -> U256 {
        self.fungible
            .get(&(token, holder))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    fn owner_of(&self, token: Address, token_id: U256) -> Option<Address> {
        self.unique.get(&(token, token_id)).copied()
    }

    fn balance_of_id(&self, token: Address, holder: Address, id: U256) -> U256 {
        self.semi_fungible
            .get(&(token, id, holder))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> ChainResult<()> {
        if to == Address::ZERO {
            return Err(ChainError::ZeroRecipient);
        }
        let available = self.balance_of(token, from);
        let remaining = available
            .checked_sub(amount)
            .ok_or(ChainError::InsufficientBalance {
                token,
                holder: from,
                required: amount,
                available,
            })?;

        self.fungible.insert((token, from), remaining);
        self.mint_fungible(token, to, amount);
        self.record(token, from, IERC20::transferCall { to, amount }.abi_encode());
        Ok(())
    }

    fn transfer_from(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        token_id: U256,
    ) -> ChainResult<()> {
        if to == Address::ZERO {
            return Err(ChainError::ZeroRecipient);
        }
        let owner = self
            .owner_of(token, token_id)
            .ok_or(ChainError::NonexistentToken { token, token_id })?;
        if owner != from {
            return Err(ChainError::NotTokenOwner {
                token,
                token_id,
                owner,
                from,
            });
        }

        self.unique.insert((token, token_id), to);
        self.record(
            token,
            from,
            IERC721::transferFromCall { from, to, token_id }.abi_encode(),
        );
        Ok(())
    }

    fn safe_transfer_from(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        id: U256,
        amount: U256,
        data: &[u8],
    ) -> ChainResult<()> {
        if to == Address::ZERO {
            return Err(ChainError::ZeroRecipient);
        }
        let available = self.balance_of_id(token, from, id);
        let remaining = available
            .checked_sub(amount)
            .ok_or(ChainError::InsufficientBalance {
                token,
                holder: from,
                required: amount,
                available,
            })?;

        self.semi_fungible.insert((token, id, from), remaining);
        self.mint_semi_fungible(token, to, id, amount);
        self.record(
            token,
            from,
            IERC1155::safeTransferFromCall {
                from,
                to,
                id,
                amount,
                data: data.to_vec().into(),
            }
            .abi_encode(),
        );
        Ok(())
    }
}
