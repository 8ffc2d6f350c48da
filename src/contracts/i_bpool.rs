use ethers::prelude::*;

abigen!(
    IBPool,
    r#"[
        function getCurrentTokens() external view returns (address[])
        function getNumTokens() external view returns (uint256)
        function getBalance(address token) external view returns (uint256)
    ]"#
);
