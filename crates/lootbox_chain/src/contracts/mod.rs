//! # Contract Definitions
//!
//! Solidity ABIs of every contract the loot engine touches: the three asset
//! standards it pays out, the randomness coordinator it buys words from, and
//! the loot box itself (for its event signatures).

// The sol! macro generates code that we can't document, so allow missing_docs
#![allow(missing_docs)]

use alloy_sol_types::sol;

sol! {
    /// Fungible token (ERC-20) surface used for payouts.
    #[derive(Debug)]
    interface IERC20 {
        function transfer(address to, uint256 amount) external returns (bool);
        function balanceOf(address account) external view returns (uint256);
    }

    /// Unique token (ERC-721) surface used for payouts.
    #[derive(Debug)]
    interface IERC721 {
        function transferFrom(address from, address to, uint256 token_id) external;
        function ownerOf(uint256 token_id) external view returns (address);
    }

    /// Semi-fungible token (ERC-1155) surface used for payouts.
    #[derive(Debug)]
    interface IERC1155 {
        function safeTransferFrom(
            address from,
            address to,
            uint256 id,
            uint256 amount,
            bytes data
        ) external;
        function balanceOf(address account, uint256 id) external view returns (uint256);
    }

    /// VRF coordinator: takes a request, answers later through the consumer.
    #[derive(Debug)]
    interface IVRFCoordinator {
        event RandomWordsRequested(
            bytes32 indexed key_hash,
            uint256 request_id,
            uint64 indexed sub_id,
            uint16 minimum_request_confirmations,
            uint32 callback_gas_limit,
            uint32 num_words,
            address indexed sender
        );

        function requestRandomWords(
            bytes32 key_hash,
            uint64 sub_id,
            uint16 minimum_request_confirmations,
            uint32 callback_gas_limit,
            uint32 num_words
        ) external returns (uint256 request_id);
    }

    /// Callback the coordinator invokes on the consumer.
    #[derive(Debug)]
    interface IVRFConsumer {
        function rawFulfillRandomWords(uint256 request_id, uint256[] random_words) external;
    }

    /// Events emitted by the loot box.
    #[derive(Debug)]
    interface ILootBox {
        event RewardAdded(
            uint256 indexed reward_id,
            uint8 reward_type,
            address contract_address,
            uint256 token_id,
            uint256 amount,
            uint256 weight
        );
        event RewardUpdated(uint256 indexed reward_id, uint256 weight, bool is_active);
        event RewardExhausted(uint256 indexed reward_id);
        event BoxOpened(uint256 indexed request_id, address indexed player);
        event RewardDistributed(
            uint256 indexed request_id,
            address indexed player,
            uint256 reward_id,
            uint8 reward_type,
            address contract_address,
            uint256 token_id,
            uint256 amount
        );
        event BoxPriceUpdated(uint256 old_price, uint256 new_price);
        event Paused(address account);
        event Unpaused(address account);
        event FundsWithdrawn(address indexed to, uint256 amount);
        event OwnershipTransferred(address indexed previous_owner, address indexed new_owner);
    }
}
