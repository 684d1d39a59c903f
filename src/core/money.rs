//! Money helpers.
//!
//! Amounts are `i64` counts of the currency's minor unit.

/// Renders minor units as a decimal string with two fraction digits, e.g. `1550` as `"15.50"`.
#[must_use]
pub fn format_amount(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// `unit_price × quantity`, or `None` on overflow or a non-positive quantity.
#[must_use]
pub fn line_total(unit_price: i64, quantity: i32) -> Option<i64> {
    if quantity <= 0 {
        return None;
    }
    unit_price.checked_mul(i64::from(quantity))
}

/// Converts a decimal amount such as `15.5` to minor units, rounding to the nearest unit.
///
/// Returns `None` for negative, non-finite or out-of-range values.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn to_minor_units(amount: f64) -> Option<i64> {
    if !amount.is_finite() || amount < 0.0 {
        return None;
    }
    let minor = (amount * 100.0).round();
    if minor >= i64::MAX as f64 {
        return None;
    }
    Some(minor as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0), "0.00");
        assert_eq!(format_amount(5), "0.05");
        assert_eq!(format_amount(1550), "15.50");
        assert_eq!(format_amount(150_000), "1500.00");
        assert_eq!(format_amount(-205), "-2.05");
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line_total(250, 3), Some(750));
        assert_eq!(line_total(250, 0), None);
        assert_eq!(line_total(i64::MAX, 2), None);
    }

    #[test]
    fn test_to_minor_units() {
        assert_eq!(to_minor_units(15.5), Some(1550));
        assert_eq!(to_minor_units(0.1 + 0.2), Some(30));
        assert_eq!(to_minor_units(-1.0), None);
        assert_eq!(to_minor_units(f64::NAN), None);
        assert_eq!(to_minor_units(f64::INFINITY), None);
    }
}
