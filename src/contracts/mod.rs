// Contracts Module - Public ABIs Only

pub mod erc20;
pub mod i_bpool;
pub mod i_bpool_factory;
pub mod i_ctoken;
pub mod i_curve_pool;
pub mod i_yearn_vault;

// Public exports
pub use erc20::Erc20;
pub use i_bpool::IBPool;
pub use i_bpool_factory::IBPoolFactory;
pub use i_ctoken::ICToken;
pub use i_curve_pool::ICurvePool;
pub use i_yearn_vault::IYearnVault;
