//! Unit conversion and quantity encoding helpers.
//!
//! Balances are 18-decimal fixed-point integers in the smallest unit. They are
//! held as `u128`, which covers every realistic native balance.

use crate::error::{Result, SessionError};

/// Decimals of the native currency on every supported network.
pub const NATIVE_DECIMALS: u32 = 18;

/// Largest decimal count whose unit still fits in a `u128`.
pub const MAX_DECIMALS: u32 = 38;

/// Convert a smallest-unit amount to a human decimal string.
///
/// Trailing zeros of the fractional part are dropped, and the decimal point
/// is omitted entirely for whole amounts.
pub fn format_units(amount: u128, decimals: u32) -> String {
    // Beyond MAX_DECIMALS every u128 amount is below one whole unit
    let (whole, frac) = match 10u128.checked_pow(decimals) {
        Some(base) => (amount / base, amount % base),
        None => (0, amount),
    };
    if frac == 0 {
        return whole.to_string();
    }
    let mut frac_str = format!("{:0width$}", frac, width = decimals as usize);
    while frac_str.ends_with('0') {
        frac_str.pop();
    }
    format!("{}.{}", whole, frac_str)
}

/// Shorthand for [`format_units`] with the native 18 decimals.
pub fn format_native(amount: u128) -> String {
    format_units(amount, NATIVE_DECIMALS)
}

/// Parse a `0x`-prefixed JSON-RPC quantity.
pub fn parse_quantity(input: &str) -> Result<u128> {
    let digits = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .ok_or_else(|| SessionError::InvalidQuantity(input.to_string()))?;
    if digits.is_empty() {
        return Err(SessionError::InvalidQuantity(input.to_string()));
    }
    u128::from_str_radix(digits, 16).map_err(|_| SessionError::InvalidQuantity(input.to_string()))
}

/// Encode an integer as a JSON-RPC quantity (no leading zeros).
pub fn to_quantity(value: u128) -> String {
    format!("0x{:x}", value)
}

/// Parse an unsigned decimal integer string such as a wei amount.
pub fn parse_decimal_uint(input: &str) -> Result<u128> {
    let trimmed = input.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SessionError::InvalidQuantity(input.to_string()));
    }
    trimmed
        .parse::<u128>()
        .map_err(|_| SessionError::InvalidQuantity(input.to_string()))
}

/// Parse a chain id in either `0x`-hex (`eth_chainId`, `chainChanged`)
/// or decimal (`net_version`) form.
pub fn parse_chain_id(input: &str) -> Result<u64> {
    let trimmed = input.trim();
    let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(digits) if !digits.is_empty() => u64::from_str_radix(digits, 16).ok(),
        Some(_) => None,
        None => trimmed.parse::<u64>().ok(),
    };
    parsed.ok_or_else(|| SessionError::InvalidChainId(input.to_string()))
}

/// Encode calldata as `0x`-prefixed hex.
pub fn encode_data(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}
