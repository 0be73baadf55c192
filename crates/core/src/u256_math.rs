//! U256 fixed-point helpers for collateral valuation.
//!
//! Ledger prices carry 8 decimals, so every USD amount here is an integer
//! count of 1e-8 USD. All operations saturate instead of wrapping: a value
//! too large to represent is treated as "more than any threshold".

use alloy::primitives::U256;

/// Price feed decimals used by the ledger.
pub const PRICE_DECIMALS: u8 = 8;

/// 10^8, one USD in price units.
pub const USD_UNIT: U256 = U256::from_limbs([100_000_000u64, 0, 0, 0]);

/// 10^exp, saturating at `U256::MAX`.
#[inline]
pub fn pow10(exp: u8) -> U256 {
    U256::from(10u64).saturating_pow(U256::from(exp))
}

/// USD value (8 decimals) of `amount` tokens whose unit is `scale`, priced
/// at `price` (8 decimals): `amount * price / scale`, truncating.
///
/// A zero scale yields zero rather than dividing by zero.
#[inline]
pub fn usd_value(amount: U256, price: U256, scale: U256) -> U256 {
    if amount.is_zero() || price.is_zero() || scale.is_zero() {
        return U256::ZERO;
    }
    match amount.checked_mul(price) {
        Some(product) => product / scale,
        None => U256::MAX,
    }
}

/// Whole-USD threshold expressed in price units.
#[inline]
pub fn usd_threshold(min_usd: u64) -> U256 {
    U256::from(min_usd).saturating_mul(USD_UNIT)
}

/// Convert an 8-decimal USD amount to f64. Display only.
pub fn usd_to_f64(value: U256) -> f64 {
    let whole = value / USD_UNIT;
    let frac = value % USD_UNIT;
    let whole_f = if whole <= U256::from(u128::MAX) {
        whole.to::<u128>() as f64
    } else {
        f64::INFINITY
    };
    whole_f + frac.to::<u64>() as f64 / 1e8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pow10() {
        assert_eq!(pow10(0), U256::from(1u64));
        assert_eq!(pow10(6), U256::from(1_000_000u64));
        assert_eq!(pow10(18), U256::from(10u64.pow(18)));
        assert_eq!(pow10(100), U256::MAX);
    }

    #[test]
    fn test_usd_value_truncates() {
        // 100 units of an 18-decimal token at $0.55
        let amount = U256::from(100u64) * pow10(18);
        let price = U256::from(55_000_000u64);
        assert_eq!(usd_value(amount, price, pow10(18)), U256::from(5_500_000_000u64));

        // 1 wei of an 18-decimal token at $1 rounds down to nothing.
        assert_eq!(usd_value(U256::from(1u64), USD_UNIT, pow10(18)), U256::ZERO);
    }

    #[test]
    fn test_usd_value_saturates_on_overflow() {
        assert_eq!(usd_value(U256::MAX, U256::from(2u64), U256::from(1u64)), U256::MAX);
    }

    #[test]
    fn test_usd_value_zero_inputs() {
        assert_eq!(usd_value(U256::ZERO, USD_UNIT, pow10(6)), U256::ZERO);
        assert_eq!(usd_value(pow10(6), U256::ZERO, pow10(6)), U256::ZERO);
        assert_eq!(usd_value(pow10(6), USD_UNIT, U256::ZERO), U256::ZERO);
    }

    #[test]
    fn test_usd_threshold() {
        assert_eq!(usd_threshold(100), U256::from(10_000_000_000u64));
        assert_eq!(usd_threshold(0), U256::ZERO);
    }

    #[test]
    fn test_usd_to_f64() {
        assert_eq!(usd_to_f64(U256::from(150_000_000u64)), 1.5);
        assert_eq!(usd_to_f64(U256::ZERO), 0.0);
    }
}
