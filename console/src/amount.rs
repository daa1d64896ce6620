//! Display-unit amounts, parsed and printed without floating point.

use tableside_types::NATIVE_PER_DISPLAY_UNIT;

const DECIMALS: usize = 9;

/// Parse a display amount such as `1.25` into native units.
pub fn parse_amount(value: &str) -> Result<u64, String> {
    let value = value.trim();
    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(format!("invalid amount: {value:?}"));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(format!("invalid amount: {value:?}"));
    }
    if fraction.len() > DECIMALS {
        return Err(format!("at most {DECIMALS} decimal places: {value:?}"));
    }
    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| format!("amount too large: {value:?}"))?
    };
    let fraction: u64 = if fraction.is_empty() {
        0
    } else {
        format!("{fraction:0<DECIMALS$}")
            .parse()
            .map_err(|_| format!("invalid amount: {value:?}"))?
    };
    whole
        .checked_mul(NATIVE_PER_DISPLAY_UNIT)
        .and_then(|native| native.checked_add(fraction))
        .ok_or_else(|| format!("amount too large: {value:?}"))
}

/// Render native units as a display amount, trimming trailing zeros.
pub fn format_amount(native: u64) -> String {
    let whole = native / NATIVE_PER_DISPLAY_UNIT;
    let fraction = native % NATIVE_PER_DISPLAY_UNIT;
    if fraction == 0 {
        return whole.to_string();
    }
    let fraction = format!("{fraction:0>DECIMALS$}");
    format!("{whole}.{}", fraction.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1").unwrap(), 1_000_000_000);
        assert_eq!(parse_amount("0.12").unwrap(), 120_000_000);
        assert_eq!(parse_amount(".5").unwrap(), 500_000_000);
        assert_eq!(parse_amount("2.").unwrap(), 2_000_000_000);
        assert_eq!(parse_amount("0.000000001").unwrap(), 1);
        assert!(parse_amount("0.0000000001").is_err());
        assert!(parse_amount("-1").is_err());
        assert!(parse_amount("1e9").is_err());
        assert!(parse_amount("").is_err());
        assert!(parse_amount(".").is_err());
        assert!(parse_amount("18446744074").is_err());
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0), "0");
        assert_eq!(format_amount(1_500_000_000), "1.5");
        assert_eq!(format_amount(120_000_000), "0.12");
        assert_eq!(format_amount(1), "0.000000001");
    }
}
