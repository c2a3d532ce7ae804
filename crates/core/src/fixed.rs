//! Fixed-point decimal arithmetic over `I256`.
//!
//! Two scales are used throughout the core: `PRICE_DECIMALS` (6) for
//! USDC-style prices and `AMOUNT_DECIMALS` (18) for signed position
//! size, the same split the teacher's `u256_math.rs` draws between
//! `PRICE_DECIMALS` and its WAD (18-decimal) constant, generalized here
//! to signed values and string parsing since the wire format is JSON,
//! not raw U256 words.

use alloy::primitives::I256;

pub const PRICE_DECIMALS: u8 = 6;
pub const AMOUNT_DECIMALS: u8 = 18;

/// Fractional digits used when formatting a liquidation price for logs
/// or responses.
pub const LIQ_DISPLAY: usize = 7;
/// Fractional digits used when formatting an amount for logs or
/// responses.
pub const AMT_DISPLAY: usize = 4;

fn pow10(exp: u8) -> I256 {
    I256::from_dec_str(&format!("1{}", "0".repeat(exp as usize))).unwrap_or(I256::ONE)
}

/// Parses a decimal string (optionally signed, optionally containing a
/// `.`) into a scaled integer. Returns `None` on any malformed input —
/// parsing never raises.
pub fn parse_decimal(s: &str, scale: u8) -> Option<I256> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let (negative, rest) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let (int_part, frac_part) = match rest.split_once('.') {
        Some((i, f)) => (i, f),
        None => (rest, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.chars().all(|c| c.is_ascii_digit()) || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let scale = scale as usize;
    let mut frac = frac_part.to_string();
    if frac.len() > scale {
        frac.truncate(scale);
    } else {
        frac.push_str(&"0".repeat(scale - frac.len()));
    }

    let combined = if int_part.is_empty() { "0" } else { int_part };
    let digits = format!("{combined}{frac}");
    let digits = digits.trim_start_matches('0');
    let magnitude = if digits.is_empty() {
        I256::ZERO
    } else {
        I256::from_dec_str(digits).ok()?
    };

    Some(if negative { -magnitude } else { magnitude })
}

/// Formats a scaled integer as a decimal string: sign prefix only when
/// negative, no trailing zeros past the decimal point, `"0"` for zero.
pub fn format_units(value: I256, scale: u8) -> String {
    if value.is_zero() {
        return "0".to_string();
    }
    let negative = value.is_negative();
    let magnitude = if negative { -value } else { value };
    let digits = magnitude.to_string();
    let scale = scale as usize;

    let padded = if digits.len() <= scale {
        format!("{}{digits}", "0".repeat(scale - digits.len() + 1))
    } else {
        digits
    };
    let split_at = padded.len() - scale;
    let (int_part, frac_part) = padded.split_at(split_at);
    let frac_trimmed = frac_part.trim_end_matches('0');

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(int_part);
    if !frac_trimmed.is_empty() {
        out.push('.');
        out.push_str(frac_trimmed);
    }
    out
}

/// Drops (never rounds) fractional digits past `max_frac`.
pub fn truncate_decimals(s: &str, max_frac: usize) -> String {
    match s.split_once('.') {
        Some((int_part, frac_part)) if frac_part.len() > max_frac => {
            if max_frac == 0 {
                int_part.to_string()
            } else {
                format!("{int_part}.{}", &frac_part[..max_frac])
            }
        }
        _ => s.to_string(),
    }
}

/// Accepted raw forms for [`to_signed`].
pub enum DecimalInput<'a> {
    Integer(i128),
    Hex(&'a str),
    Decimal(&'a str),
}

impl<'a> From<i128> for DecimalInput<'a> {
    fn from(v: i128) -> Self {
        DecimalInput::Integer(v)
    }
}

impl<'a> From<&'a str> for DecimalInput<'a> {
    fn from(v: &'a str) -> Self {
        if v.trim_start_matches('-').starts_with("0x") {
            DecimalInput::Hex(v)
        } else {
            DecimalInput::Decimal(v)
        }
    }
}

/// Converts an integer, a `0x`-prefixed hex string, or a plain decimal
/// string into an `I256`. Returns `None` for anything malformed.
pub fn to_signed<'a>(input: impl Into<DecimalInput<'a>>) -> Option<I256> {
    match input.into() {
        DecimalInput::Integer(v) => Some(I256::try_from(v).ok()?),
        DecimalInput::Hex(v) => {
            let (negative, hex) = match v.strip_prefix('-') {
                Some(rest) => (true, rest),
                None => (false, v),
            };
            let hex = hex.strip_prefix("0x")?;
            let magnitude = I256::from_raw(alloy::primitives::U256::from_str_radix(hex, 16).ok()?);
            Some(if negative { -magnitude } else { magnitude })
        }
        DecimalInput::Decimal(v) => {
            if v.contains('.') {
                None
            } else {
                I256::from_dec_str(v).ok()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_format_round_trip() {
        let v = parse_decimal("123.456", 6).unwrap();
        assert_eq!(format_units(v, 6), "123.456");
    }

    #[test]
    fn format_zero_is_bare_zero() {
        assert_eq!(format_units(I256::ZERO, 6), "0");
    }

    #[test]
    fn format_negative_has_single_sign() {
        let v = parse_decimal("-0.5", 6).unwrap();
        assert_eq!(format_units(v, 6), "-0.5");
    }

    #[test]
    fn parse_drops_excess_fraction_digits() {
        let v = parse_decimal("1.123456789", 6).unwrap();
        assert_eq!(format_units(v, 6), "1.123456");
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(parse_decimal("abc", 6).is_none());
        assert!(parse_decimal("", 6).is_none());
        assert!(parse_decimal("1.2.3", 6).is_none());
    }

    #[test]
    fn truncate_never_rounds() {
        assert_eq!(truncate_decimals("1.987654", 4), "1.9876");
        assert_eq!(truncate_decimals("1.1", 4), "1.1");
        assert_eq!(truncate_decimals("5", 4), "5");
    }

    #[test]
    fn to_signed_accepts_all_forms() {
        assert_eq!(to_signed(42i128), Some(I256::try_from(42).unwrap()));
        assert_eq!(to_signed("0x2a"), Some(I256::try_from(42).unwrap()));
        assert_eq!(to_signed("42"), Some(I256::try_from(42).unwrap()));
        assert_eq!(to_signed("-0x2a"), Some(I256::try_from(-42).unwrap()));
        assert_eq!(to_signed("not a number"), None);
    }

    #[test]
    fn pow10_sanity() {
        assert_eq!(pow10(0), I256::try_from(1).unwrap());
        assert_eq!(pow10(6), I256::try_from(1_000_000).unwrap());
    }
}
