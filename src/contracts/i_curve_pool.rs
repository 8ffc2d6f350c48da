use ethers::prelude::*;

abigen!(
    ICurvePool,
    r#"[
        function get_virtual_price() external view returns (uint256)
        function coins(int128 i) external view returns (address)
        function balances(int128 i) external view returns (uint256)
    ]"#
);
