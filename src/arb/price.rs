use std::str::FromStr;

use alloy::primitives::U256;
use bigdecimal::BigDecimal;
use eyre::{bail, Result, WrapErr};

/// Number of fractional bits in a `sqrtPriceX96` value.
const Q96_BITS: usize = 96;

/// Converts an unsigned 256-bit integer into a `BigDecimal` without loss.
///
/// # Errors
/// * If the decimal representation cannot be parsed back, which does not happen
///   for well-formed integers
pub fn u256_to_decimal(value: U256) -> Result<BigDecimal> {
    BigDecimal::from_str(&value.to_string())
        .wrap_err_with(|| format!("failed to convert {value} to decimal"))
}

/// `10^exponent` as an exact decimal; negative exponents give fractions.
///
/// # Errors
/// * Never for exponents that fit an `i64`
pub fn pow10(exponent: i64) -> Result<BigDecimal> {
    BigDecimal::from_str(&format!("1e{exponent}"))
        .wrap_err_with(|| format!("failed to build 10^{exponent}"))
}

/// Converts a fixed-point square-root price into a quote-per-base price.
///
/// Pools store `sqrt(token1 / token0) * 2^96` in raw token units, with the
/// base token as `token0`.
///
/// The input is squared as an exact integer and divided by `2^192`, which is
/// the same as dividing by `2^96` and squaring but never rounds before the
/// square. The raw ratio is then scaled by `10^(base_decimals - quote_decimals)`.
///
/// # Arguments
/// * `sqrt_price_x96` - The pool's `sqrtPriceX96`
/// * `base_decimals` - Decimals of the base token (`token0`)
/// * `quote_decimals` - Decimals of the quote token (`token1`)
///
/// # Returns
/// * `Result<BigDecimal>` - The price, always strictly positive
///
/// # Errors
/// * If `sqrt_price_x96` is zero; a zero price would look like the cheapest
///   venue and poison the spread test
pub fn normalize_price(
    sqrt_price_x96: U256,
    base_decimals: u8,
    quote_decimals: u8,
) -> Result<BigDecimal> {
    if sqrt_price_x96.is_zero() {
        bail!("sqrtPriceX96 must be non-zero");
    }

    let sqrt_price = u256_to_decimal(sqrt_price_x96)?;
    let q192 = u256_to_decimal(U256::from(1_u8) << (2 * Q96_BITS))?;
    let raw_ratio = (&sqrt_price * &sqrt_price) / q192;

    let adjustment = pow10(i64::from(base_decimals) - i64::from(quote_decimals))?;
    Ok(raw_ratio * adjustment)
}
