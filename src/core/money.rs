//! Money helpers. All amounts are `i64` minor units (cents).

/// Largest amount accepted from user input: 1,000,000.00
pub const MAX_AMOUNT: i64 = 100_000_000;

/// Formats cents as a decimal string with two places, e.g. `9500 -> "95.00"`.
pub fn format_amount(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Parses a user-entered amount into cents.
///
/// Accepts `12`, `12.5`, `12.50` and a comma as decimal separator. Rejects
/// negatives, more than two decimals and anything above [`MAX_AMOUNT`].
pub fn parse_amount(input: &str) -> Option<i64> {
    let normalized = input.trim().replace(',', ".");
    if normalized.is_empty() {
        return None;
    }

    let (whole, frac) = match normalized.split_once('.') {
        Some((w, f)) => (w, f),
        None => (normalized.as_str(), ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if frac.len() > 2 || whole.len() > 12 {
        return None;
    }

    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let frac: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().ok()? * 10,
        _ => frac.parse().ok()?,
    };

    let cents = whole.checked_mul(100)?.checked_add(frac)?;
    (cents <= MAX_AMOUNT).then_some(cents)
}

/// `pct` percent of `amount`, rounded half away from zero.
pub fn percent_of(amount: i64, pct: f64) -> i64 {
    if amount == 0 || pct <= 0.0 || !pct.is_finite() {
        return 0;
    }
    // Work in hundredths of a percent to keep 1.5% exact.
    let basis_points = (pct * 100.0).round() as i128;
    let numerator = amount as i128 * basis_points;
    let rounded = (numerator + 5_000 * numerator.signum()) / 10_000;
    rounded as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_cents() {
        assert_eq!(format_amount(9_500), "95.00");
        assert_eq!(format_amount(5), "0.05");
        assert_eq!(format_amount(0), "0.00");
        assert_eq!(format_amount(-150), "-1.50");
    }

    #[test]
    fn parses_user_amounts() {
        assert_eq!(parse_amount("12.5"), Some(1_250));
        assert_eq!(parse_amount(" 10 "), Some(1_000));
        assert_eq!(parse_amount("0,99"), Some(99));
        assert_eq!(parse_amount(".5"), Some(50));
        assert_eq!(parse_amount("1000000"), Some(MAX_AMOUNT));
    }

    #[test]
    fn rejects_bad_amounts() {
        for bad in ["", ".", "-1", "1.234", "abc", "1e5", "1000000.01", "12.3.4"] {
            assert_eq!(parse_amount(bad), None, "{bad:?} should be rejected");
        }
    }

    #[test]
    fn percent_rounds_half_away_from_zero() {
        assert_eq!(percent_of(10_000, 1.5), 150);
        assert_eq!(percent_of(10_000, 2.5), 250);
        assert_eq!(percent_of(100, 1.5), 2); // 1.5 cents
        assert_eq!(percent_of(33, 1.5), 0); // 0.495 cents
        assert_eq!(percent_of(1_000, 0.0), 0);
    }
}
