use ethers::prelude::*;

// Compound-style interest-bearing wrapper. isCToken is a constant marker on
// every cToken; the probe reverts on plain ERC-20s, which callers interpret
// as "not a wrapper".
abigen!(
    ICToken,
    r#"[
        function isCToken() external view returns (bool)
        function underlying() external view returns (address)
        function balanceOfUnderlying(address owner) external returns (uint256)
        function exchangeRateStored() external view returns (uint256)
    ]"#
);
