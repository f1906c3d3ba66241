use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateError {
    NonFinite(f64),
    NonPositiveDivisor(f64),
}

impl fmt::Display for RateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateError::NonFinite(rate) => write!(f, "vat rate {rate} is not a finite number"),
            RateError::NonPositiveDivisor(rate) => {
                write!(f, "vat rate {rate}% must be greater than -100%")
            }
        }
    }
}

impl std::error::Error for RateError {}

/// Checks that `1 + rate / 100` is a usable, strictly positive divisor.
pub fn validate_rate(rate: f64) -> Result<f64, RateError> {
    if !rate.is_finite() {
        return Err(RateError::NonFinite(rate));
    }
    if 1.0 + rate / 100.0 <= 0.0 {
        return Err(RateError::NonPositiveDivisor(rate));
    }
    Ok(rate)
}

/// Rounds to whole cents, half away from zero.
pub fn round_cents(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    // collapse -0.0 so that "no impact" always compares and prints as 0
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Strips VAT at `rate` percent from a tax-inclusive amount.
pub fn exclude_vat(amount_with_vat: f64, rate: f64) -> Result<f64, RateError> {
    validate_rate(rate)?;
    Ok(amount_with_vat / (1.0 + rate / 100.0))
}

/// Full (task-driven) model: the extra tax-inclusive cost of moving the
/// still-unpaid `remaining_cost` from `old_rate` to `new_rate`.
///
/// The remaining cost is assumed to have been priced at `old_rate`.
pub fn task_driven_difference(
    remaining_cost: f64,
    old_rate: f64,
    new_rate: f64,
) -> Result<f64, RateError> {
    validate_rate(old_rate)?;
    validate_rate(new_rate)?;
    if remaining_cost <= 0.0 || old_rate == new_rate {
        return Ok(0.0);
    }
    let remaining_base = exclude_vat(remaining_cost, old_rate)?;
    Ok(round_cents(remaining_base * (new_rate - old_rate) / 100.0))
}

/// Simplified two-point model used for contracts known only by the amount
/// left at a cutoff date.
pub fn cutoff_difference(
    remaining_cost_at_cutoff: f64,
    current_rate: f64,
    future_rate: f64,
) -> Result<f64, RateError> {
    validate_rate(current_rate)?;
    validate_rate(future_rate)?;
    if remaining_cost_at_cutoff <= 0.0 || current_rate == future_rate {
        return Ok(0.0);
    }
    let factor = 1.0 / (1.0 + current_rate / 100.0) - 1.0 / (1.0 + future_rate / 100.0);
    Ok(round_cents(remaining_cost_at_cutoff * factor))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VatRateChange {
    pub effective_year: i32,
    pub new_rate_percent: f64,
}

impl VatRateChange {
    pub fn new(effective_year: i32, new_rate_percent: f64) -> Result<Self, RateError> {
        validate_rate(new_rate_percent)?;
        Ok(Self {
            effective_year,
            new_rate_percent,
        })
    }
}

/// Piecewise-constant mapping from calendar year to VAT rate.
///
/// Changes are kept stably sorted by `effective_year`, so when several
/// changes share a year the one inserted last takes effect.
#[derive(Debug, Clone, PartialEq)]
pub struct VatSchedule {
    base_rate: f64,
    changes: Vec<VatRateChange>,
}

impl VatSchedule {
    pub fn new(base_rate: f64) -> Result<Self, RateError> {
        validate_rate(base_rate)?;
        Ok(Self {
            base_rate,
            changes: Vec::new(),
        })
    }

    pub fn from_parts<I>(base_rate: f64, changes: I) -> Result<Self, RateError>
    where
        I: IntoIterator<Item = VatRateChange>,
    {
        let mut schedule = Self::new(base_rate)?;
        for change in changes {
            schedule.add_change(change.effective_year, change.new_rate_percent)?;
        }
        Ok(schedule)
    }

    pub fn base_rate(&self) -> f64 {
        self.base_rate
    }

    pub fn set_base_rate(&mut self, rate: f64) -> Result<(), RateError> {
        self.base_rate = validate_rate(rate)?;
        Ok(())
    }

    pub fn changes(&self) -> &[VatRateChange] {
        &self.changes
    }

    pub fn add_change(
        &mut self,
        effective_year: i32,
        new_rate_percent: f64,
    ) -> Result<(), RateError> {
        self.changes.push(VatRateChange::new(effective_year, new_rate_percent)?);
        self.changes.sort_by_key(|change| change.effective_year);
        Ok(())
    }

    /// Drops every change scheduled for `effective_year`, returning how many went.
    pub fn remove_changes_for_year(&mut self, effective_year: i32) -> usize {
        let before = self.changes.len();
        self.changes.retain(|change| change.effective_year != effective_year);
        before - self.changes.len()
    }

    pub fn rate_for_year(&self, year: i32) -> f64 {
        let mut rate = self.base_rate;
        for change in &self.changes {
            if change.effective_year > year {
                break;
            }
            rate = change.new_rate_percent;
        }
        rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_defaults_to_base_before_first_change() {
        let mut schedule = VatSchedule::new(20.0).unwrap();
        schedule.add_change(2026, 22.0).unwrap();
        assert_eq!(schedule.rate_for_year(2025), 20.0);
        assert_eq!(schedule.rate_for_year(2026), 22.0);
        assert_eq!(schedule.rate_for_year(2040), 22.0);
    }

    #[test]
    fn changes_are_applied_in_year_order_regardless_of_insertion() {
        let mut schedule = VatSchedule::new(20.0).unwrap();
        schedule.add_change(2030, 25.0).unwrap();
        schedule.add_change(2026, 22.0).unwrap();
        assert_eq!(schedule.rate_for_year(2027), 22.0);
        assert_eq!(schedule.rate_for_year(2030), 25.0);
        let years: Vec<i32> = schedule.changes().iter().map(|c| c.effective_year).collect();
        assert_eq!(years, vec![2026, 2030]);
    }

    #[test]
    fn last_inserted_change_wins_for_duplicate_year() {
        let mut schedule = VatSchedule::new(20.0).unwrap();
        schedule.add_change(2026, 22.0).unwrap();
        schedule.add_change(2026, 18.0).unwrap();
        assert_eq!(schedule.changes().len(), 2);
        assert_eq!(schedule.rate_for_year(2026), 18.0);
    }

    #[test]
    fn removing_a_year_drops_all_of_its_changes() {
        let mut schedule = VatSchedule::new(20.0).unwrap();
        schedule.add_change(2026, 22.0).unwrap();
        schedule.add_change(2026, 18.0).unwrap();
        schedule.add_change(2028, 10.0).unwrap();
        assert_eq!(schedule.remove_changes_for_year(2026), 2);
        assert_eq!(schedule.rate_for_year(2027), 20.0);
        assert_eq!(schedule.remove_changes_for_year(1999), 0);
    }

    #[test]
    fn rates_at_or_below_minus_hundred_are_rejected() {
        assert_eq!(
            validate_rate(-100.0),
            Err(RateError::NonPositiveDivisor(-100.0))
        );
        assert!(validate_rate(f64::NAN).is_err());
        assert!(VatSchedule::new(-150.0).is_err());
        let mut schedule = VatSchedule::new(20.0).unwrap();
        assert!(schedule.add_change(2026, -100.0).is_err());
        assert!(schedule.changes().is_empty());
    }

    #[test]
    fn task_driven_difference_matches_reference_example() {
        assert_eq!(task_driven_difference(120_000.0, 20.0, 22.0).unwrap(), 2000.0);
    }

    #[test]
    fn task_driven_difference_is_negative_for_rate_cut() {
        assert_eq!(task_driven_difference(120_000.0, 20.0, 18.0).unwrap(), -2000.0);
    }

    #[test]
    fn degenerate_inputs_yield_zero() {
        assert_eq!(task_driven_difference(0.0, 20.0, 22.0).unwrap(), 0.0);
        assert_eq!(task_driven_difference(-10.0, 20.0, 22.0).unwrap(), 0.0);
        assert_eq!(task_driven_difference(500.0, 20.0, 20.0).unwrap(), 0.0);
        assert_eq!(cutoff_difference(0.0, 20.0, 22.0).unwrap(), 0.0);
        assert_eq!(cutoff_difference(-1.0, 20.0, 22.0).unwrap(), 0.0);
        assert_eq!(cutoff_difference(500.0, 20.0, 20.0).unwrap(), 0.0);
    }

    #[test]
    fn cutoff_difference_uses_two_point_formula() {
        // 1200 / 1.2 - 1200 / 1.22 = 1000 - 983.606...
        assert_eq!(cutoff_difference(1200.0, 20.0, 22.0).unwrap(), 16.39);
        assert!(cutoff_difference(1200.0, 22.0, 20.0).unwrap() < 0.0);
        assert!(cutoff_difference(1200.0, -100.0, 20.0).is_err());
    }

    #[test]
    fn round_cents_rounds_half_away_from_zero() {
        assert_eq!(round_cents(1.005_000_1), 1.01);
        assert_eq!(round_cents(2.5), 2.5);
        assert_eq!(round_cents(-0.004), 0.0);
        assert!(round_cents(-0.004).is_sign_positive());
    }
}
