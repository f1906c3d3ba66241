use crate::vat::RateError;
use std::fmt;

pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 2200;
pub const MAX_DURATION_YEARS: i32 = 100;
pub const MAX_PROJECTION_YEARS: u32 = 100;

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    NegativeAmount { field: &'static str, value: f64 },
    NonFinite { field: &'static str },
    InvalidDuration(i32),
    YearOutOfRange(i32),
    PeriodOutOfRange { start_year: i32, duration_years: i32 },
    InvalidProjectionYears(u32),
    Rate(RateError),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::NegativeAmount { field, value } => {
                write!(f, "{field} must not be negative (got {value})")
            }
            ValidationError::NonFinite { field } => write!(f, "{field} must be a finite number"),
            ValidationError::InvalidDuration(years) => write!(
                f,
                "duration must be between 1 and {MAX_DURATION_YEARS} years (got {years})"
            ),
            ValidationError::YearOutOfRange(year) => {
                write!(f, "year {year} is outside {MIN_YEAR}..={MAX_YEAR}")
            }
            ValidationError::PeriodOutOfRange {
                start_year,
                duration_years,
            } => write!(f, "{duration_years} years from {start_year} end after {MAX_YEAR}"),
            ValidationError::InvalidProjectionYears(years) => write!(
                f,
                "projection horizon must be between 1 and {MAX_PROJECTION_YEARS} years (got {years})"
            ),
            ValidationError::Rate(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<RateError> for ValidationError {
    fn from(value: RateError) -> Self {
        Self::Rate(value)
    }
}

pub fn ensure_amount(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFinite { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeAmount { field, value });
    }
    Ok(value)
}

pub fn ensure_duration(years: i32) -> Result<i32, ValidationError> {
    if !(1..=MAX_DURATION_YEARS).contains(&years) {
        return Err(ValidationError::InvalidDuration(years));
    }
    Ok(years)
}

pub fn ensure_year(year: i32) -> Result<i32, ValidationError> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(ValidationError::YearOutOfRange(year));
    }
    Ok(year)
}

/// Checks a contract period and returns its last year.
pub fn ensure_period(start_year: i32, duration_years: i32) -> Result<i32, ValidationError> {
    ensure_year(start_year)?;
    ensure_duration(duration_years)?;
    start_year
        .checked_add(duration_years - 1)
        .filter(|end| *end <= MAX_YEAR)
        .ok_or(ValidationError::PeriodOutOfRange {
            start_year,
            duration_years,
        })
}

pub fn ensure_projection_years(years: u32) -> Result<u32, ValidationError> {
    if !(1..=MAX_PROJECTION_YEARS).contains(&years) {
        return Err(ValidationError::InvalidProjectionYears(years));
    }
    Ok(years)
}

/// Completion is the one input clamped rather than rejected: editors hand in
/// whatever the user typed and expect it pinned to `0..=100`.
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_and_non_finite_amounts_are_rejected() {
        assert_eq!(
            ensure_amount("total_cost_with_vat", -1.0),
            Err(ValidationError::NegativeAmount {
                field: "total_cost_with_vat",
                value: -1.0
            })
        );
        assert!(ensure_amount("cost", f64::INFINITY).is_err());
        assert_eq!(ensure_amount("cost", 0.0), Ok(0.0));
    }

    #[test]
    fn percent_is_clamped() {
        assert_eq!(clamp_percent(-5.0), 0.0);
        assert_eq!(clamp_percent(150.0), 100.0);
        assert_eq!(clamp_percent(f64::NAN), 0.0);
        assert_eq!(clamp_percent(42.5), 42.5);
    }

    #[test]
    fn duration_must_cover_a_year() {
        assert!(ensure_duration(0).is_err());
        assert_eq!(ensure_duration(3), Ok(3));
        assert_eq!(
            ensure_duration(i32::MAX),
            Err(ValidationError::InvalidDuration(i32::MAX))
        );
    }

    #[test]
    fn years_outside_the_calendar_window_are_rejected() {
        assert_eq!(ensure_year(2025), Ok(2025));
        assert_eq!(ensure_year(i32::MAX), Err(ValidationError::YearOutOfRange(i32::MAX)));
        assert_eq!(ensure_year(i32::MIN), Err(ValidationError::YearOutOfRange(i32::MIN)));
    }

    #[test]
    fn period_must_end_inside_the_window() {
        assert_eq!(ensure_period(2025, 2), Ok(2026));
        assert_eq!(ensure_period(MAX_YEAR, 1), Ok(MAX_YEAR));
        assert_eq!(
            ensure_period(MAX_YEAR, 2),
            Err(ValidationError::PeriodOutOfRange {
                start_year: MAX_YEAR,
                duration_years: 2
            })
        );
    }

    #[test]
    fn projection_horizon_is_bounded() {
        assert_eq!(ensure_projection_years(5), Ok(5));
        assert!(ensure_projection_years(0).is_err());
        assert_eq!(
            ensure_projection_years(u32::MAX),
            Err(ValidationError::InvalidProjectionYears(u32::MAX))
        );
    }
}
