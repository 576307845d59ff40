//! Typed call and event bindings for the contracts driven by `raffle-deploy`.
//!
//! The contracts themselves are compiled elsewhere; only the surface the
//! tooling touches is declared here.

use alloy::sol;

pub const RAFFLE_CONTRACT: &str = "RaffleV32";
pub const YIELD_AGGREGATOR_CONTRACT: &str = "YieldAggregatorV32";
pub const VRF_COORDINATOR_MOCK_CONTRACT: &str = "VRFCoordinatorV2Mock";

sol! {
    #[sol(rpc)]
    contract RaffleV32 {
        constructor(
            address vrfCoordinatorV2,
            address lendingPoolAddressesProvider,
            address weth,
            uint64 subscriptionId,
            bytes32 gasLane,
            uint256 interval,
            uint256 entranceFee,
            uint32 callbackGasLimit
        );

        function enterRaffle() external payable;
        function withdrawPlayer() external;
        function togglePause() external;
        function getRaffleState() external view returns (uint8);
        function getNumberOfPlayers() external view returns (uint256);
        function getIndexOfAddress(address player) external view returns (uint256);
        function getHasIndex(address player) external view returns (bool);
    }
}

sol! {
    #[sol(rpc)]
    contract YieldAggregatorV32 {
        constructor(address lendingPoolAddressesProvider, address weth);

        function enterPlayer() external payable;
        function withdrawPlayer() external;
        function getYieldBalance() external view returns (uint256);
        function getUserAccountData()
            external
            view
            returns (
                uint256 totalCollateralETH,
                uint256 totalDebtETH,
                uint256 availableBorrowsETH,
                uint256 currentLiquidationThreshold,
                uint256 ltv,
                uint256 healthFactor
            );
        function getTotalDeposited() external view returns (uint256);
        function getPlayerDeposited(address player) external view returns (uint256);
        function getNumberOfPlayers() external view returns (uint256);
        function getIndexOfAddress(address player) external view returns (uint256);
        function getAddressAtIndex(uint256 index) external view returns (address);
    }
}

sol! {
    #[sol(rpc)]
    contract VRFCoordinatorV2Mock {
        constructor(uint96 baseFee, uint96 gasPriceLink);

        event SubscriptionCreated(uint64 indexed subId, address owner);
        event SubscriptionFunded(uint64 indexed subId, uint256 oldBalance, uint256 newBalance);
        event ConsumerAdded(uint64 indexed subId, address consumer);

        function createSubscription() external returns (uint64 subId);
        function fundSubscription(uint64 subId, uint96 amount) external;
        function addConsumer(uint64 subId, address consumer) external;
    }
}
