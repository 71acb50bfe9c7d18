//! Conversion between the ledger's smallest integer unit and the
//! human-readable decimal unit.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnitConversionError {
    #[error("amount is not a decimal number")]
    NotANumber,
    #[error("amount must be greater than zero")]
    NotPositive,
    #[error("amount has more than {0} fractional digits")]
    TooPrecise(u8),
    #[error("amount is too large")]
    Overflow,
}

/// Non-negative token amount carried in base units alongside the precision
/// it was quoted at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAmount {
    base_units: u128,
    decimals: u8,
}

impl TokenAmount {
    pub fn from_base_units(base_units: u128, decimals: u8) -> Self {
        Self {
            base_units,
            decimals,
        }
    }

    pub fn base_units(&self) -> u128 {
        self.base_units
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_base_units(self.base_units, self.decimals))
    }
}

fn scale_factor(decimals: u8) -> Option<u128> {
    10_u128.checked_pow(u32::from(decimals))
}

/// Parses a strictly positive decimal string into base units.
///
/// Accepts plain digit strings with at most one `.`; fractional digits
/// beyond `decimals` are an error rather than silently truncated.
pub fn parse_decimal(text: &str, decimals: u8) -> Result<u128, UnitConversionError> {
    let text = text.trim();
    if text.starts_with('-') {
        return Err(UnitConversionError::NotPositive);
    }

    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (text, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(UnitConversionError::NotANumber);
    }
    if !whole.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(UnitConversionError::NotANumber);
    }
    if fraction.len() > usize::from(decimals) {
        return Err(UnitConversionError::TooPrecise(decimals));
    }

    let whole_value: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| UnitConversionError::Overflow)?
    };

    let mut fraction_value: u128 = 0;
    if !fraction.is_empty() {
        let padded_zeros = usize::from(decimals) - fraction.len();
        fraction_value = fraction.parse().map_err(|_| UnitConversionError::Overflow)?;
        for _ in 0..padded_zeros {
            fraction_value = fraction_value
                .checked_mul(10)
                .ok_or(UnitConversionError::Overflow)?;
        }
    }

    let scale = scale_factor(decimals).ok_or(UnitConversionError::Overflow)?;
    let base_units = whole_value
        .checked_mul(scale)
        .and_then(|scaled| scaled.checked_add(fraction_value))
        .ok_or(UnitConversionError::Overflow)?;

    if base_units == 0 {
        return Err(UnitConversionError::NotPositive);
    }

    Ok(base_units)
}

/// Formats base units as a canonical decimal string, trimming trailing
/// zeros from the fractional part.
pub fn format_base_units(base_units: u128, decimals: u8) -> String {
    let Some(scale) = scale_factor(decimals) else {
        // Unreachable for any real token precision; fall back to raw units.
        return base_units.to_string();
    };

    let whole = base_units / scale;
    let fraction = base_units % scale;
    if fraction == 0 {
        return whole.to_string();
    }

    let fraction = format!("{fraction:0width$}", width = usize::from(decimals));
    let fraction = fraction.trim_end_matches('0');
    format!("{whole}.{fraction}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEI: u8 = 18;

    #[test]
    fn parses_whole_and_fractional_amounts() {
        assert_eq!(parse_decimal("1.5", WEI), Ok(1_500_000_000_000_000_000));
        assert_eq!(parse_decimal("2", WEI), Ok(2_000_000_000_000_000_000));
        assert_eq!(parse_decimal(".5", WEI), Ok(500_000_000_000_000_000));
        assert_eq!(parse_decimal("3.", WEI), Ok(3_000_000_000_000_000_000));
        assert_eq!(parse_decimal("0.000000000000000001", WEI), Ok(1));
        assert_eq!(parse_decimal(" 1.5 ", WEI), Ok(1_500_000_000_000_000_000));
    }

    #[test]
    fn rejects_zero_and_negative_amounts() {
        assert_eq!(parse_decimal("0", WEI), Err(UnitConversionError::NotPositive));
        assert_eq!(parse_decimal("0.0", WEI), Err(UnitConversionError::NotPositive));
        assert_eq!(parse_decimal("-1", WEI), Err(UnitConversionError::NotPositive));
        assert_eq!(parse_decimal("-0.5", WEI), Err(UnitConversionError::NotPositive));
    }

    #[test]
    fn rejects_non_numeric_input() {
        assert_eq!(parse_decimal("", WEI), Err(UnitConversionError::NotANumber));
        assert_eq!(parse_decimal(".", WEI), Err(UnitConversionError::NotANumber));
        assert_eq!(parse_decimal("1.2.3", WEI), Err(UnitConversionError::NotANumber));
        assert_eq!(parse_decimal("abc", WEI), Err(UnitConversionError::NotANumber));
        assert_eq!(parse_decimal("+1", WEI), Err(UnitConversionError::NotANumber));
        assert_eq!(parse_decimal("1e18", WEI), Err(UnitConversionError::NotANumber));
    }

    #[test]
    fn rejects_excess_fractional_digits() {
        assert_eq!(
            parse_decimal("0.0000000000000000001", WEI),
            Err(UnitConversionError::TooPrecise(WEI))
        );
        assert_eq!(parse_decimal("1.51", 1), Err(UnitConversionError::TooPrecise(1)));
    }

    #[test]
    fn rejects_overflowing_amounts() {
        // u128::MAX is ~3.4e38; 1e21 whole tokens at 18 decimals is 1e39.
        assert_eq!(
            parse_decimal("1000000000000000000000", WEI),
            Err(UnitConversionError::Overflow)
        );
    }

    #[test]
    fn formats_with_trailing_zeros_trimmed() {
        assert_eq!(format_base_units(1_500_000_000_000_000_000, WEI), "1.5");
        assert_eq!(format_base_units(2_000_000_000_000_000_000, WEI), "2");
        assert_eq!(format_base_units(0, WEI), "0");
        assert_eq!(format_base_units(1, WEI), "0.000000000000000001");
        assert_eq!(format_base_units(1_050, 3), "1.05");
        assert_eq!(format_base_units(42, 0), "42");
    }

    #[test]
    fn token_amount_displays_canonically() {
        let amount = TokenAmount::from_base_units(1_500_000_000_000_000_000, WEI);
        assert_eq!(amount.to_string(), "1.5");
        assert_eq!(amount.base_units(), 1_500_000_000_000_000_000);
        assert_eq!(amount.decimals(), WEI);
    }

    #[test]
    fn parse_and_format_agree() {
        for text in ["1.5", "0.25", "1000", "0.000001"] {
            let base_units = parse_decimal(text, WEI).expect("valid amount");
            assert_eq!(format_base_units(base_units, WEI), text);
        }
    }
}
