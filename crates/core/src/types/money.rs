//! Decimal money helpers.
//!
//! Amounts are stored as REAL in SQLite and handled as [`Decimal`] everywhere
//! else. All conversions round to cents so float noise from the database never
//! reaches a response body.

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

/// Largest amount accepted from a request body.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Whether `value` lies within `0..=MAX_AMOUNT`.
#[must_use]
pub fn is_amount(value: Decimal) -> bool {
    value >= Decimal::ZERO && value <= MAX_AMOUNT
}

/// Round to two decimal places (banker's rounding is avoided; halves go up).
#[must_use]
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a database REAL into a cent-rounded decimal. NaN and infinities
/// collapse to zero.
#[must_use]
pub fn from_db(value: f64) -> Decimal {
    Decimal::from_f64(value).map_or(Decimal::ZERO, round2)
}

/// Convert a decimal into a database REAL.
#[must_use]
pub fn to_db(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// `part / whole * 100`, rounded to cents. Zero when `whole` is zero.
#[must_use]
pub fn percentage(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    round2(part / whole * Decimal::ONE_HUNDRED)
}

/// `numerator / denominator`, rounded to cents. `None` when the denominator
/// is zero, used for CTR/CPC/CPA style ratios that are undefined without data.
#[must_use]
pub fn ratio(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    if denominator.is_zero() {
        None
    } else {
        Some(round2(numerator / denominator))
    }
}

/// Build a decimal from an integer count (orders, clicks, units).
#[must_use]
pub fn from_count(count: i64) -> Decimal {
    Decimal::from(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_from_db_rounds_float_noise() {
        assert_eq!(from_db(0.1 + 0.2), dec!(0.30));
        assert_eq!(from_db(19.999), dec!(20.00));
    }

    #[test]
    fn test_from_db_nan_is_zero() {
        assert_eq!(from_db(f64::NAN), Decimal::ZERO);
    }

    #[test]
    fn test_round2_half_up() {
        assert_eq!(round2(dec!(2.345)), dec!(2.35));
        assert_eq!(round2(dec!(-2.345)), dec!(-2.35));
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(dec!(25), dec!(200)), dec!(12.5));
        assert_eq!(percentage(dec!(25), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_ratio() {
        assert_eq!(ratio(dec!(10), dec!(4)), Some(dec!(2.5)));
        assert_eq!(ratio(dec!(10), Decimal::ZERO), None);
    }

    #[test]
    fn test_is_amount() {
        assert!(is_amount(Decimal::ZERO));
        assert!(is_amount(MAX_AMOUNT));
        assert!(!is_amount(dec!(-0.01)));
        assert!(!is_amount(MAX_AMOUNT + dec!(0.01)));
    }

    #[test]
    fn test_to_db() {
        assert!((to_db(dec!(12.34)) - 12.34).abs() < f64::EPSILON);
    }
}
