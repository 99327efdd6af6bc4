//! Contract interfaces the dashboard talks to.
//!
//! Only the calls and events actually issued are declared. Encoding and decoding go through
//! `alloy::sol_types`, so every call is a plain `(to, calldata)` pair handed to the wallet.

use alloy::sol;

sol! {
    interface IComet {
        struct AssetInfo {
            uint8 offset;
            address asset;
            address priceFeed;
            uint64 scale;
            uint64 borrowCollateralFactor;
            uint64 liquidateCollateralFactor;
            uint64 liquidationFactor;
            uint128 supplyCap;
        }

        function baseToken() external view returns (address);
        function baseTokenPriceFeed() external view returns (address);
        function decimals() external view returns (uint8);
        function getAssetInfoByAddress(address asset) external view returns (AssetInfo memory);
        function getPrice(address priceFeed) external view returns (uint256);
        function getUtilization() external view returns (uint256);
        function getSupplyRate(uint256 utilization) external view returns (uint64);
        function getBorrowRate(uint256 utilization) external view returns (uint64);
        function totalSupply() external view returns (uint256);
        function totalBorrow() external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function borrowBalanceOf(address account) external view returns (uint256);
        function collateralBalanceOf(address account, address asset) external view returns (uint128);

        function supply(address asset, uint256 amount) external;
        function withdraw(address asset, uint256 amount) external;

        event Supply(address indexed from, address indexed dst, uint256 amount);
        event Withdraw(address indexed src, address indexed to, uint256 amount);
        event SupplyCollateral(address indexed from, address indexed dst, address indexed asset, uint256 amount);
        event WithdrawCollateral(address indexed src, address indexed to, address indexed asset, uint256 amount);
        event Transfer(address indexed from, address indexed to, uint256 amount);
    }
}

sol! {
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 value) returns (bool);
    }
}

sol! {
    interface IGovernorBravo {
        function proposalCount() external view returns (uint256);
        function proposals(uint256 proposalId) external view returns (
            uint256 id,
            address proposer,
            uint256 eta,
            uint256 startBlock,
            uint256 endBlock,
            uint256 forVotes,
            uint256 againstVotes,
            uint256 abstainVotes,
            bool canceled,
            bool executed
        );
        function propose(
            address[] targets,
            uint256[] values,
            string[] signatures,
            bytes[] calldatas,
            string description
        ) external returns (uint256);
        function castVote(uint256 proposalId, uint8 support) external;
        function cancel(uint256 proposalId) external;

        event ProposalCreated(
            uint256 id,
            address proposer,
            address[] targets,
            uint256[] values,
            string[] signatures,
            bytes[] calldatas,
            uint256 startBlock,
            uint256 endBlock,
            string description
        );
    }
}

sol! {
    interface ICompToken {
        function balanceOf(address account) external view returns (uint256);
        function getCurrentVotes(address account) external view returns (uint96);
        function delegate(address delegatee) external;
    }
}
