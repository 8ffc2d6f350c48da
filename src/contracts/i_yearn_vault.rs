use ethers::prelude::*;

abigen!(
    IYearnVault,
    r#"[
        function getPricePerFullShare() external view returns (uint256)
        function token() external view returns (address)
        function balance() external view returns (uint256)
    ]"#
);
