//! Data model types with no natural Rust primitive equivalent.
//!
//! [codec] handles the wire encoding of everything that does map onto a Rust primitive (`i32`,
//! `i64`, `f32`, `f64`, `String`, byte strings, [codec::RawInt128]). The types in this module exist
//! because their *value* has constraints a bare primitive doesn't enforce, not because their wire
//! encoding is unusual.

use crate::error::{Error, ErrorKind, MalformedError, Result};

/// An immutable year/month interval, validated on construction.
///
/// `months` must fall within `-11..=11`: anything outside that range is really a multiple of a
/// year plus a smaller month remainder, which belongs in `years` instead. If both components are
/// non-zero they must agree in sign, so the interval has one unambiguous direction (`years: 1,
/// months: -1` would be a contradiction: is it "13 months" or "11 months"?).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RawYearMonthInterval {
    years: i32,
    months: i32,
}

impl RawYearMonthInterval {
    /// Construct a validated interval, or [MalformedError::InvalidYearMonthInterval] if `months`
    /// is out of range or disagrees in sign with `years`.
    pub fn new(years: i32, months: i32) -> Result<Self> {
        let in_range = (-11..=11).contains(&months);
        let signs_agree = years == 0 || months == 0 || years.signum() == months.signum();
        if !in_range || !signs_agree {
            return Err(Error::from(ErrorKind::from(
                MalformedError::InvalidYearMonthInterval { years, months },
            )));
        }
        Ok(Self { years, months })
    }

    pub fn years(&self) -> i32 {
        self.years
    }

    pub fn months(&self) -> i32 {
        self.months
    }

    /// Total length of the interval expressed purely in months.
    pub fn total_months(&self) -> i64 {
        i64::from(self.years) * 12 + i64::from(self.months)
    }
}

impl std::fmt::Display for RawYearMonthInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}y{}m", self.years, self.months)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructs_a_valid_interval() {
        let interval = RawYearMonthInterval::new(2, 6).unwrap();
        assert_eq!(interval.years(), 2);
        assert_eq!(interval.months(), 6);
        assert_eq!(interval.total_months(), 30);
    }

    #[test]
    fn zero_years_with_negative_months_is_valid() {
        let interval = RawYearMonthInterval::new(0, -5).unwrap();
        assert_eq!(interval.total_months(), -5);
    }

    #[test]
    fn months_out_of_range_is_rejected() {
        let err = RawYearMonthInterval::new(1, 12).unwrap_err();
        assert_matches::assert_matches!(
            err.kind(),
            ErrorKind::Malformed(MalformedError::InvalidYearMonthInterval { years: 1, months: 12 })
        );
    }

    #[test]
    fn conflicting_signs_are_rejected() {
        let err = RawYearMonthInterval::new(1, -1).unwrap_err();
        assert_matches::assert_matches!(
            err.kind(),
            ErrorKind::Malformed(MalformedError::InvalidYearMonthInterval { .. })
        );
    }

    #[test]
    fn display_renders_years_and_months() {
        let interval = RawYearMonthInterval::new(-2, -3).unwrap();
        assert_eq!(interval.to_string(), "-2y-3m");
    }
}
