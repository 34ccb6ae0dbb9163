//! Wei / Gwei / Ether conversions
//!
//! All display-unit values are `BigDecimal`, so no binary floating point is
//! involved anywhere between a user-supplied amount and the base-unit integer
//! that ends up in a transaction.
//!
//! Converting towards base units splits the decimal into its integer and
//! fractional digits, pads the fraction to the unit width and adds
//! `integer * 10^width + fraction`. Digits beyond the unit width are rounded
//! half-to-even first.

use std::str::FromStr;

use alloy::primitives::U256;
use bigdecimal::num_bigint::{BigInt, Sign};
use bigdecimal::{BigDecimal, RoundingMode};

use crate::error::{Error, Result};

/// Decimal places of one ether (and of BNB, and of most ERC-20 tokens)
pub const ETHER_DECIMALS: u32 = 18;

/// Decimal places of one gwei relative to wei
pub const GWEI_DECIMALS: u32 = 9;

/// Decimal digits of `U256::MAX`
const MAX_U256_DIGITS: i64 = 78;

/// Parse a user-supplied decimal string such as `"0.1"` or `"2.5e-3"`.
pub fn parse_decimal(value: &str) -> Result<BigDecimal> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Parse("empty numeric string".to_string()));
    }
    BigDecimal::from_str(trimmed)
        .map_err(|e| Error::Parse(format!("invalid number '{}': {}", trimmed, e)))
}

/// Express a base-unit integer as a decimal with `decimals` places.
pub fn to_decimal(value: U256, decimals: u32) -> BigDecimal {
    let digits = BigInt::from_bytes_be(Sign::Plus, &value.to_be_bytes::<32>());
    BigDecimal::new(digits, i64::from(decimals))
}

/// Convert a decimal amount into base units of a `decimals`-wide unit.
pub fn to_base_units(amount: &BigDecimal, decimals: u32) -> Result<U256> {
    if amount.sign() == Sign::Minus {
        return Err(Error::Parse(format!("negative amount {}", amount)));
    }

    let overflow = || Error::Parse(format!("{} does not fit in 256 bits of base units", amount));

    // the value lies below 10^magnitude; check it before rescaling so huge
    // exponents never expand into huge digit strings
    let (_, scale) = amount.as_bigint_and_exponent();
    let magnitude = i64::try_from(amount.digits())
        .unwrap_or(i64::MAX)
        .saturating_sub(scale);
    if magnitude > MAX_U256_DIGITS {
        return Err(overflow());
    }
    if magnitude < -i64::from(decimals) {
        // below half of one base unit
        return Ok(U256::ZERO);
    }

    let width = decimals as usize;
    let rounded = amount.with_scale_round(i64::from(decimals), RoundingMode::HalfEven);
    let (digits, _) = rounded.as_bigint_and_exponent();
    let digits = digits.to_str_radix(10);

    // the lowest `width` digits are the fraction, everything above is the integer part
    let (integer, fraction) = digits.split_at(digits.len().saturating_sub(width));
    let integer = if integer.is_empty() { "0" } else { integer };
    let fraction = format!("{:0>width$}", fraction, width = width);

    let integer = U256::from_str_radix(integer, 10).map_err(|_| overflow())?;
    let fraction = if fraction.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(&fraction, 10).map_err(|_| overflow())?
    };

    let multiplier = U256::from(10u64)
        .checked_pow(U256::from(decimals))
        .ok_or_else(overflow)?;

    integer
        .checked_mul(multiplier)
        .and_then(|whole| whole.checked_add(fraction))
        .ok_or_else(overflow)
}

pub fn wei_to_ether(wei: U256) -> BigDecimal {
    to_decimal(wei, ETHER_DECIMALS)
}

pub fn ether_to_wei(ether: &BigDecimal) -> Result<U256> {
    to_base_units(ether, ETHER_DECIMALS)
}

pub fn wei_to_gwei(wei: U256) -> BigDecimal {
    to_decimal(wei, GWEI_DECIMALS)
}

pub fn gwei_to_wei(gwei: &BigDecimal) -> Result<U256> {
    to_base_units(gwei, GWEI_DECIMALS)
}

/// Shift the decimal point nine places to the left; exact.
pub fn gwei_to_ether(gwei: &BigDecimal) -> BigDecimal {
    let (digits, scale) = gwei.as_bigint_and_exponent();
    BigDecimal::new(digits, scale + i64::from(GWEI_DECIMALS))
}

pub fn ether_to_gwei(ether: &BigDecimal) -> Result<U256> {
    to_base_units(ether, GWEI_DECIMALS)
}
