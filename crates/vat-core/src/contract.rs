use crate::config::ProjectSettings;
use crate::task::ContractTask;
use crate::validation::{self, ValidationError};
use crate::vat::{self, RateError, VatRateChange, VatSchedule};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ContractError {
    Invalid(ValidationError),
    TaskNotFound { index: usize, len: usize },
}

impl fmt::Display for ContractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractError::Invalid(err) => write!(f, "{err}"),
            ContractError::TaskNotFound { index, len } => {
                write!(f, "task #{index} not found (contract has {len} tasks)")
            }
        }
    }
}

impl std::error::Error for ContractError {}

impl From<ValidationError> for ContractError {
    fn from(value: ValidationError) -> Self {
        Self::Invalid(value)
    }
}

impl From<RateError> for ContractError {
    fn from(value: RateError) -> Self {
        Self::Invalid(ValidationError::Rate(value))
    }
}

/// Which VAT-difference model applies to a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VatMode {
    /// Year-by-year, driven by tasks and the contract's rate schedule.
    TaskDriven,
    /// Single transition between the project's current and future rates,
    /// applied to the amount left at the cutoff.
    Cutoff,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VatImpact {
    pub year: i32,
    pub old_rate: f64,
    pub new_rate: f64,
    pub remaining_cost: f64,
    pub remaining_base_cost: f64,
    pub additional_cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearBreakdown {
    pub year: i32,
    pub planned_cost: f64,
    pub completed_cost: f64,
    pub remaining_cost: f64,
    pub vat_rate: f64,
    pub vat_impact: f64,
    pub task_count: usize,
    pub completion_percentage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Contract {
    pub name: String,
    pub contract_number: Option<String>,
    total_cost_with_vat: f64,
    start_year: i32,
    duration_years: i32,
    schedule: VatSchedule,
    tasks: Vec<ContractTask>,
    remaining_cost_at_cutoff: f64,
    pub is_flagged: bool,
}

impl Contract {
    pub fn new(
        name: impl Into<String>,
        total_cost_with_vat: f64,
        start_year: i32,
        duration_years: i32,
        base_vat_rate_percent: f64,
    ) -> Result<Self, ContractError> {
        validation::ensure_period(start_year, duration_years)?;
        Ok(Self {
            name: name.into(),
            contract_number: None,
            total_cost_with_vat: validation::ensure_amount(
                "total_cost_with_vat",
                total_cost_with_vat,
            )?,
            start_year,
            duration_years,
            schedule: VatSchedule::new(base_vat_rate_percent)?,
            tasks: Vec::new(),
            remaining_cost_at_cutoff: 0.0,
            is_flagged: false,
        })
    }

    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        let number = number.into();
        self.contract_number = if number.trim().is_empty() {
            None
        } else {
            Some(number)
        };
        self
    }

    pub fn with_remaining_cost_at_cutoff(mut self, amount: f64) -> Result<Self, ContractError> {
        self.set_remaining_cost_at_cutoff(amount)?;
        Ok(self)
    }

    pub fn total_cost_with_vat(&self) -> f64 {
        self.total_cost_with_vat
    }

    pub fn set_total_cost_with_vat(&mut self, amount: f64) -> Result<(), ContractError> {
        self.total_cost_with_vat = validation::ensure_amount("total_cost_with_vat", amount)?;
        Ok(())
    }

    pub fn remaining_cost_at_cutoff(&self) -> f64 {
        self.remaining_cost_at_cutoff
    }

    pub fn set_remaining_cost_at_cutoff(&mut self, amount: f64) -> Result<(), ContractError> {
        self.remaining_cost_at_cutoff =
            validation::ensure_amount("remaining_cost_at_cutoff", amount)?;
        Ok(())
    }

    pub fn start_year(&self) -> i32 {
        self.start_year
    }

    pub fn duration_years(&self) -> i32 {
        self.duration_years
    }

    pub fn set_period(
        &mut self,
        start_year: i32,
        duration_years: i32,
    ) -> Result<(), ContractError> {
        validation::ensure_period(start_year, duration_years)?;
        self.duration_years = duration_years;
        self.start_year = start_year;
        Ok(())
    }

    /// Last year of the period; construction keeps it inside the valid window.
    pub fn end_year(&self) -> i32 {
        self.start_year + self.duration_years - 1
    }

    pub fn base_vat_rate_percent(&self) -> f64 {
        self.schedule.base_rate()
    }

    pub fn set_base_vat_rate_percent(&mut self, rate: f64) -> Result<(), ContractError> {
        self.schedule.set_base_rate(rate)?;
        Ok(())
    }

    /// Contract value without VAT, at the base rate.
    pub fn base_cost(&self) -> f64 {
        self.total_cost_with_vat / (1.0 + self.schedule.base_rate() / 100.0)
    }

    pub fn vat_amount(&self) -> f64 {
        self.total_cost_with_vat - self.base_cost()
    }

    pub fn tasks(&self) -> &[ContractTask] {
        &self.tasks
    }

    pub fn task_mut(&mut self, index: usize) -> Result<&mut ContractTask, ContractError> {
        let len = self.tasks.len();
        self.tasks
            .get_mut(index)
            .ok_or(ContractError::TaskNotFound { index, len })
    }

    pub fn add_task(
        &mut self,
        name: impl Into<String>,
        year: i32,
        cost_with_vat: f64,
    ) -> Result<&mut ContractTask, ContractError> {
        self.push_task(ContractTask::new(name, year, cost_with_vat)?);
        let last = self.tasks.len() - 1;
        Ok(&mut self.tasks[last])
    }

    pub fn push_task(&mut self, task: ContractTask) {
        self.tasks.push(task);
    }

    pub fn remove_task(&mut self, index: usize) -> Result<ContractTask, ContractError> {
        if index >= self.tasks.len() {
            return Err(ContractError::TaskNotFound {
                index,
                len: self.tasks.len(),
            });
        }
        Ok(self.tasks.remove(index))
    }

    pub fn tasks_for_year(&self, year: i32) -> impl Iterator<Item = &ContractTask> {
        self.tasks.iter().filter(move |task| task.year == year)
    }

    pub fn vat_changes(&self) -> &[VatRateChange] {
        self.schedule.changes()
    }

    pub fn add_vat_change(
        &mut self,
        effective_year: i32,
        new_rate_percent: f64,
    ) -> Result<(), ContractError> {
        self.schedule.add_change(effective_year, new_rate_percent)?;
        Ok(())
    }

    pub fn remove_vat_changes_for_year(&mut self, effective_year: i32) -> usize {
        self.schedule.remove_changes_for_year(effective_year)
    }

    pub fn vat_rate_for_year(&self, year: i32) -> f64 {
        self.schedule.rate_for_year(year)
    }

    /// Tax-inclusive amount not yet covered by completed work in years up to
    /// and including `up_to_year`.
    pub fn remaining_cost(&self, up_to_year: i32) -> f64 {
        let completed: f64 = self
            .tasks
            .iter()
            .filter(|task| task.year <= up_to_year)
            .map(ContractTask::completed_cost)
            .sum();
        self.total_cost_with_vat - completed
    }

    pub fn mode(&self) -> VatMode {
        if self.tasks.is_empty() && self.schedule.changes().is_empty() {
            VatMode::Cutoff
        } else {
            VatMode::TaskDriven
        }
    }

    pub fn vat_impact(&self, year: i32) -> Result<VatImpact, RateError> {
        let previous = year.saturating_sub(1);
        let remaining_cost = self.remaining_cost(previous);
        let old_rate = self.schedule.rate_for_year(previous);
        let new_rate = self.schedule.rate_for_year(year);
        let remaining_base_cost = if remaining_cost > 0.0 {
            vat::exclude_vat(remaining_cost, old_rate)?
        } else {
            0.0
        };
        Ok(VatImpact {
            year,
            old_rate,
            new_rate,
            remaining_cost,
            remaining_base_cost,
            additional_cost: vat::task_driven_difference(remaining_cost, old_rate, new_rate)?,
        })
    }

    /// VAT impact of the rate step into `year`, in the task-driven model.
    pub fn vat_difference_for_year(&self, year: i32) -> Result<f64, RateError> {
        Ok(self.vat_impact(year)?.additional_cost)
    }

    pub fn yearly_breakdown(&self) -> Result<Vec<YearBreakdown>, RateError> {
        (self.start_year..=self.end_year())
            .map(|year| {
                let (planned_cost, completed_cost, task_count) = self.tasks_for_year(year).fold(
                    (0.0, 0.0, 0usize),
                    |(planned, completed, count), task| {
                        (
                            planned + task.cost_with_vat(),
                            completed + task.completed_cost(),
                            count + 1,
                        )
                    },
                );
                let completion_percentage = if planned_cost > 0.0 {
                    completed_cost / planned_cost * 100.0
                } else {
                    0.0
                };
                Ok(YearBreakdown {
                    year,
                    planned_cost,
                    completed_cost,
                    remaining_cost: self.remaining_cost(year),
                    vat_rate: self.vat_rate_for_year(year),
                    vat_impact: self.vat_difference_for_year(year)?,
                    task_count,
                    completion_percentage,
                })
            })
            .collect()
    }

    /// Total additional VAT for this contract under whichever model it supports.
    pub fn vat_difference(&self, settings: &ProjectSettings) -> Result<f64, RateError> {
        match self.mode() {
            VatMode::TaskDriven => {
                let total: f64 = self
                    .yearly_breakdown()?
                    .iter()
                    .map(|year| year.vat_impact)
                    .sum();
                Ok(vat::round_cents(total))
            }
            VatMode::Cutoff => vat::cutoff_difference(
                self.remaining_cost_at_cutoff,
                settings.current_vat,
                settings.future_vat,
            ),
        }
    }

    /// Contract total minus the amount recorded at the cutoff.
    pub fn cutoff_difference(&self) -> f64 {
        self.total_cost_with_vat - self.remaining_cost_at_cutoff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_contract(completion: f64) -> Contract {
        let mut contract = Contract::new("Bridge", 120_000.0, 2025, 2, 20.0).unwrap();
        contract
            .add_task("Build", 2025, 120_000.0)
            .unwrap()
            .set_completion_percent(completion);
        contract.add_vat_change(2026, 22.0).unwrap();
        contract
    }

    #[test]
    fn fully_completed_work_leaves_no_impact() {
        let contract = reference_contract(100.0);
        assert_eq!(contract.remaining_cost(2025), 0.0);
        assert_eq!(contract.vat_difference_for_year(2026).unwrap(), 0.0);
    }

    #[test]
    fn untouched_work_is_retaxed_at_new_rate() {
        let contract = reference_contract(0.0);
        let impact = contract.vat_impact(2026).unwrap();
        assert_eq!(impact.remaining_cost, 120_000.0);
        assert!((impact.remaining_base_cost - 100_000.0).abs() < 1e-6);
        assert_eq!(impact.old_rate, 20.0);
        assert_eq!(impact.new_rate, 22.0);
        assert_eq!(impact.additional_cost, 2000.0);
    }

    #[test]
    fn unchanged_rate_yields_zero() {
        let contract = reference_contract(0.0);
        assert_eq!(contract.vat_difference_for_year(2025).unwrap(), 0.0);
    }

    #[test]
    fn derived_amounts_follow_base_rate() {
        let contract = Contract::new("Road", 1200.0, 2025, 3, 20.0).unwrap();
        assert_eq!(contract.end_year(), 2027);
        assert!((contract.base_cost() - 1000.0).abs() < 1e-9);
        assert!((contract.vat_amount() - 200.0).abs() < 1e-9);
    }

    #[test]
    fn construction_rejects_invalid_input() {
        assert!(matches!(
            Contract::new("x", -1.0, 2025, 1, 20.0),
            Err(ContractError::Invalid(ValidationError::NegativeAmount { .. }))
        ));
        assert!(matches!(
            Contract::new("x", 1.0, 2025, 0, 20.0),
            Err(ContractError::Invalid(ValidationError::InvalidDuration(0)))
        ));
        assert!(matches!(
            Contract::new("x", 1.0, 2025, 1, -100.0),
            Err(ContractError::Invalid(ValidationError::Rate(_)))
        ));
        let mut contract = Contract::new("x", 1.0, 2025, 1, 20.0).unwrap();
        assert!(contract.set_remaining_cost_at_cutoff(-3.0).is_err());
        assert!(contract.set_period(2025, 0).is_err());
        assert_eq!(contract.duration_years(), 1);
    }

    #[test]
    fn periods_outside_the_year_window_are_rejected() {
        assert!(matches!(
            Contract::new("x", 1.0, i32::MAX, 1, 20.0),
            Err(ContractError::Invalid(ValidationError::YearOutOfRange(i32::MAX)))
        ));
        assert!(matches!(
            Contract::new("x", 1.0, i32::MIN, 1, 20.0),
            Err(ContractError::Invalid(ValidationError::YearOutOfRange(i32::MIN)))
        ));
        assert!(matches!(
            Contract::new("x", 1.0, 2025, i32::MAX, 20.0),
            Err(ContractError::Invalid(ValidationError::InvalidDuration(i32::MAX)))
        ));
        assert!(matches!(
            Contract::new("x", 1.0, validation::MAX_YEAR, 2, 20.0),
            Err(ContractError::Invalid(ValidationError::PeriodOutOfRange { .. }))
        ));

        let mut contract = Contract::new("x", 1.0, 2025, 2, 20.0).unwrap();
        assert!(contract.set_period(i32::MAX, 1).is_err());
        assert_eq!((contract.start_year(), contract.end_year()), (2025, 2026));
    }

    #[test]
    fn impact_at_extreme_years_does_not_overflow() {
        let contract = Contract::new("x", 1200.0, 2025, 1, 20.0).unwrap();
        assert_eq!(contract.vat_impact(i32::MIN).unwrap().additional_cost, 0.0);
    }

    #[test]
    fn breakdown_covers_every_year_once_in_order() {
        let mut contract = Contract::new("Tunnel", 300.0, 2024, 4, 20.0).unwrap();
        contract.add_task("a", 2024, 100.0).unwrap().set_completion_percent(50.0);
        contract.add_task("b", 2026, 200.0).unwrap();
        contract.add_task("outside", 2030, 10.0).unwrap();

        let breakdown = contract.yearly_breakdown().unwrap();
        let years: Vec<i32> = breakdown.iter().map(|row| row.year).collect();
        assert_eq!(years, vec![2024, 2025, 2026, 2027]);

        assert_eq!(breakdown[0].planned_cost, 100.0);
        assert_eq!(breakdown[0].completed_cost, 50.0);
        assert_eq!(breakdown[0].completion_percentage, 50.0);
        assert_eq!(breakdown[0].remaining_cost, 250.0);
        assert_eq!(breakdown[1].task_count, 0);
        assert_eq!(breakdown[1].completion_percentage, 0.0);
        assert_eq!(breakdown[2].task_count, 1);
    }

    #[test]
    fn task_driven_total_sums_yearly_impacts() {
        let mut contract = Contract::new("Depot", 120_000.0, 2025, 3, 20.0).unwrap();
        contract.add_vat_change(2026, 22.0).unwrap();
        contract.add_vat_change(2030, 25.0).unwrap();
        assert_eq!(contract.mode(), VatMode::TaskDriven);
        // 2030 lies outside the contract period and does not count
        assert_eq!(contract.vat_difference(&ProjectSettings::default()).unwrap(), 2000.0);
    }

    #[test]
    fn contract_without_tasks_or_changes_uses_cutoff_model() {
        let contract = Contract::new("Legacy", 5000.0, 2025, 1, 20.0)
            .unwrap()
            .with_remaining_cost_at_cutoff(1200.0)
            .unwrap();
        assert_eq!(contract.mode(), VatMode::Cutoff);
        assert_eq!(contract.vat_difference(&ProjectSettings::default()).unwrap(), 16.39);
        assert_eq!(contract.cutoff_difference(), 3800.0);

        let flat = ProjectSettings::new(20.0, 20.0, 5).unwrap();
        assert_eq!(contract.vat_difference(&flat).unwrap(), 0.0);
    }

    #[test]
    fn task_lookup_out_of_range_is_reported() {
        let mut contract = Contract::new("x", 1.0, 2025, 1, 20.0).unwrap();
        assert_eq!(
            contract.remove_task(0),
            Err(ContractError::TaskNotFound { index: 0, len: 0 })
        );
        assert!(contract.task_mut(3).is_err());
    }

    #[test]
    fn blank_contract_number_is_stored_as_none() {
        let contract = Contract::new("x", 1.0, 2025, 1, 20.0).unwrap().with_number("  ");
        assert_eq!(contract.contract_number, None);
        let numbered = Contract::new("x", 1.0, 2025, 1, 20.0).unwrap().with_number("A-17");
        assert_eq!(numbered.contract_number.as_deref(), Some("A-17"));
    }
}
