use crate::validation::{self, ValidationError};

/// A planned or executed piece of work inside a contract.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractTask {
    pub name: String,
    pub year: i32,
    cost_with_vat: f64,
    completion_percent: f64,
    pub is_completed: bool,
}

impl ContractTask {
    pub fn new(
        name: impl Into<String>,
        year: i32,
        cost_with_vat: f64,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            name: name.into(),
            year,
            cost_with_vat: validation::ensure_amount("cost_with_vat", cost_with_vat)?,
            completion_percent: 0.0,
            is_completed: false,
        })
    }

    pub fn with_completion(mut self, percent: f64) -> Self {
        self.set_completion_percent(percent);
        self
    }

    pub fn cost_with_vat(&self) -> f64 {
        self.cost_with_vat
    }

    pub fn set_cost_with_vat(&mut self, cost: f64) -> Result<(), ValidationError> {
        self.cost_with_vat = validation::ensure_amount("cost_with_vat", cost)?;
        Ok(())
    }

    pub fn completion_percent(&self) -> f64 {
        self.completion_percent
    }

    pub fn set_completion_percent(&mut self, percent: f64) {
        self.completion_percent = validation::clamp_percent(percent);
    }

    pub fn mark_completed(&mut self) {
        self.completion_percent = 100.0;
        self.is_completed = true;
    }

    pub fn completed_cost(&self) -> f64 {
        self.cost_with_vat * self.completion_percent / 100.0
    }
}
