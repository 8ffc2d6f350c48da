use ethers::prelude::*;

abigen!(
    IBPoolFactory,
    r#"[
        event LOG_NEW_POOL(address indexed caller, address indexed pool)
        function isBPool(address b) external view returns (bool)
    ]"#
);
