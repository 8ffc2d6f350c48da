// src/normalization.rs
//
// Fixed-point conversion of vault share balances into underlying asset
// units. Exchange rates arrive as 18-decimal fixed-point integers; products
// are computed in U512 so a large share balance cannot overflow mid-way,
// and every division truncates toward zero.

use ethers::types::{U256, U512};

/// Fixed-point scale (1e18) used by vault exchange rates
pub const SCALE: u128 = 1_000_000_000_000_000_000u128;

/// Decimal gap (1e12) between an 18-decimal vault share and a 6-decimal
/// stable asset
pub const STABLE_DECIMAL_GAP: u128 = 1_000_000_000_000u128;

/// floor(a * b / denom) with a full-width intermediate product.
/// A zero denominator yields zero rather than panicking.
pub fn mul_div_floor(a: U256, b: U256, denom: U256) -> U256 {
    if a.is_zero() || b.is_zero() || denom.is_zero() {
        return U256::zero();
    }
    let prod: U512 = a.full_mul(b);
    let quotient = prod / U512::from(denom);
    quotient.try_into().unwrap_or(U256::max_value())
}

/// Value of an ether-denominated vault share balance in underlying units:
/// floor(balance * price_per_share / 1e18).
pub fn share_value(balance: U256, price_per_share: U256) -> U256 {
    mul_div_floor(balance, price_per_share, U256::from(SCALE))
}

/// Value of a yyCrv share balance in 6-decimal stable units:
/// floor(balance * virtual_price / 1e18 / 1e12 * price_per_share / 1e18).
///
/// The virtual price converts shares to 18-decimal pool units, the decimal
/// gap rescales to the stable asset's 6 decimals, and the price per share
/// applies the vault's accrued yield.
pub fn stable_share_value(balance: U256, virtual_price: U256, price_per_share: U256) -> U256 {
    let pool_units = mul_div_floor(balance, virtual_price, U256::from(SCALE));
    let stable_units = pool_units / U256::from(STABLE_DECIMAL_GAP);
    mul_div_floor(stable_units, price_per_share, U256::from(SCALE))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scale() -> U256 {
        U256::from(SCALE)
    }

    #[test]
    fn test_share_value_doubling_rate() {
        // 1000 share units at 2.0 price per share -> 2000 underlying units
        let value = share_value(U256::from(1000), U256::from(2 * SCALE));
        assert_eq!(value, U256::from(2000));
    }

    #[test]
    fn test_share_value_truncates() {
        // 3 shares at 0.5 -> floor(1.5) = 1
        let value = share_value(U256::from(3), U256::from(SCALE / 2));
        assert_eq!(value, U256::from(1));
    }

    #[test]
    fn test_share_value_survives_large_balances() {
        // A balance near 2^200 would overflow a U256 product; the U512
        // intermediate must keep the result exact.
        let balance = U256::from(2).pow(U256::from(200));
        let value = share_value(balance, U256::from(3 * SCALE));
        assert_eq!(value, balance * U256::from(3));
    }

    #[test]
    fn test_stable_share_value_reference_case() {
        // balance = 1e18, virtual price = 1.05, price per share = 1.1:
        // 1e18 * 1.05 = 1.05e18 pool units, /1e12 = 1.05e6 stable units,
        // * 1.1 = 1_155_000
        let balance = scale();
        let virtual_price = U256::from(1_050_000_000_000_000_000u128);
        let price_per_share = U256::from(1_100_000_000_000_000_000u128);
        let value = stable_share_value(balance, virtual_price, price_per_share);
        assert_eq!(value, U256::from(1_155_000));
    }

    #[test]
    fn test_zero_balance_is_zero() {
        assert_eq!(share_value(U256::zero(), scale() * 2), U256::zero());
        assert_eq!(
            stable_share_value(U256::zero(), scale(), scale()),
            U256::zero()
        );
    }

    #[test]
    fn test_mul_div_floor_zero_denominator() {
        assert_eq!(
            mul_div_floor(U256::from(10), U256::from(10), U256::zero()),
            U256::zero()
        );
    }
}
