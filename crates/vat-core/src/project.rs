use crate::config::ProjectSettings;
use crate::contract::{Contract, ContractError};
use crate::export::{ExportRow, ExportTable};
use crate::import::ContractDraft;
use crate::naming;
use crate::projection::{self, ProjectedCost};
use crate::validation::ValidationError;
use crate::vat;
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectError {
    ContractNotFound(String),
    Contract(ContractError),
    Invalid(ValidationError),
}

impl fmt::Display for ProjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectError::ContractNotFound(name) => write!(f, "contract '{name}' not found"),
            ProjectError::Contract(err) => write!(f, "{err}"),
            ProjectError::Invalid(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ProjectError {}

impl From<ContractError> for ProjectError {
    fn from(value: ContractError) -> Self {
        Self::Contract(value)
    }
}

impl From<ValidationError> for ProjectError {
    fn from(value: ValidationError) -> Self {
        Self::Invalid(value)
    }
}

/// Where a contract came from: a spreadsheet import or typed in by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractKind {
    Imported,
    Manual,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    name: String,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    contracts: Vec<Contract>,
    manual_contracts: Vec<Contract>,
    settings: ProjectSettings,
    total_vat_difference: f64,
}

impl Project {
    pub fn new(name: impl Into<String>, settings: ProjectSettings) -> Result<Self, ProjectError> {
        settings.validate()?;
        let now = Utc::now();
        let name = name.into();
        let name = if name.trim().is_empty() {
            format!("Project_{}", now.format("%Y%m%d_%H%M%S"))
        } else {
            name
        };
        Ok(Self {
            name,
            created_at: now,
            modified_at: now,
            contracts: Vec::new(),
            manual_contracts: Vec::new(),
            settings,
            total_vat_difference: 0.0,
        })
    }

    /// Rebuilds a project from stored state without touching its timestamps.
    pub(crate) fn from_parts(
        name: String,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
        settings: ProjectSettings,
        contracts: Vec<Contract>,
        manual_contracts: Vec<Contract>,
        total_vat_difference: f64,
    ) -> Self {
        Self {
            name,
            created_at,
            modified_at: modified_at.max(created_at),
            contracts,
            manual_contracts,
            settings,
            total_vat_difference,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames in memory only; use `ProjectStore::rename_project` for a saved project.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    /// Puts back a name and timestamp captured before a failed rename.
    pub(crate) fn restore_identity(&mut self, name: String, modified_at: DateTime<Utc>) {
        self.name = name;
        self.modified_at = modified_at.max(self.created_at);
    }

    pub fn folder_name(&self) -> String {
        naming::sanitize_project_name(&self.name)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    /// Bumps `modified_at`, never moving it backwards.
    pub fn touch(&mut self) {
        self.modified_at = self.modified_at.max(Utc::now());
    }

    pub fn settings(&self) -> &ProjectSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: ProjectSettings) -> Result<(), ProjectError> {
        settings.validate()?;
        self.settings = settings;
        self.touch();
        Ok(())
    }

    pub fn contracts(&self, kind: ContractKind) -> &[Contract] {
        match kind {
            ContractKind::Imported => &self.contracts,
            ContractKind::Manual => &self.manual_contracts,
        }
    }

    fn list_mut(&mut self, kind: ContractKind) -> &mut Vec<Contract> {
        match kind {
            ContractKind::Imported => &mut self.contracts,
            ContractKind::Manual => &mut self.manual_contracts,
        }
    }

    /// Imported contracts first, then manual ones.
    pub fn all_contracts(&self) -> impl Iterator<Item = &Contract> {
        self.contracts.iter().chain(self.manual_contracts.iter())
    }

    pub fn contract_count(&self) -> usize {
        self.contracts.len() + self.manual_contracts.len()
    }

    pub fn add_contract(&mut self, kind: ContractKind, contract: Contract) -> &mut Contract {
        self.touch();
        let list = self.list_mut(kind);
        list.push(contract);
        let last = list.len() - 1;
        &mut list[last]
    }

    /// Creates an empty contract priced at the project's current VAT rate.
    pub fn new_contract(
        &mut self,
        kind: ContractKind,
        name: impl Into<String>,
        total_cost_with_vat: f64,
        start_year: i32,
        duration_years: i32,
    ) -> Result<&mut Contract, ProjectError> {
        let contract = Contract::new(
            name,
            total_cost_with_vat,
            start_year,
            duration_years,
            self.settings.current_vat,
        )?;
        Ok(self.add_contract(kind, contract))
    }

    fn locate(&self, name: &str) -> Option<(ContractKind, usize)> {
        [ContractKind::Imported, ContractKind::Manual]
            .into_iter()
            .find_map(|kind| {
                self.contracts(kind)
                    .iter()
                    .position(|contract| contract.name == name)
                    .map(|idx| (kind, idx))
            })
    }

    pub fn contract(&self, name: &str) -> Result<&Contract, ProjectError> {
        let (kind, idx) = self
            .locate(name)
            .ok_or_else(|| ProjectError::ContractNotFound(name.to_string()))?;
        Ok(&self.contracts(kind)[idx])
    }

    /// Mutable access for editing; counts as a modification.
    pub fn contract_mut(&mut self, name: &str) -> Result<&mut Contract, ProjectError> {
        let (kind, idx) = self
            .locate(name)
            .ok_or_else(|| ProjectError::ContractNotFound(name.to_string()))?;
        self.touch();
        Ok(&mut self.list_mut(kind)[idx])
    }

    pub fn remove_contract(&mut self, name: &str) -> Result<Contract, ProjectError> {
        let (kind, idx) = self
            .locate(name)
            .ok_or_else(|| ProjectError::ContractNotFound(name.to_string()))?;
        self.touch();
        Ok(self.list_mut(kind).remove(idx))
    }

    /// Adds one imported contract per draft. Either every draft is accepted
    /// or the project is left unchanged.
    pub fn import_drafts(
        &mut self,
        drafts: Vec<ContractDraft>,
        start_year: i32,
    ) -> Result<usize, ProjectError> {
        let base_rate = self.settings.current_vat;
        let imported = drafts
            .into_iter()
            .map(|draft| draft.into_contract(start_year, base_rate))
            .collect::<Result<Vec<_>, _>>()?;
        let added = imported.len();
        self.contracts.extend(imported);
        self.touch();
        Ok(added)
    }

    /// Recomputes and caches the portfolio's additional VAT.
    ///
    /// A contract whose figure cannot be computed is logged and left out so
    /// the rest of the portfolio still adds up.
    pub fn calculate_total_vat_difference(&mut self) -> f64 {
        let settings = self.settings;
        let mut total = 0.0;
        for contract in self.all_contracts() {
            match contract.vat_difference(&settings) {
                Ok(diff) => total += diff,
                Err(err) => warn!(
                    "event=vat_total module=project status=skip project={} contract={} error={}",
                    self.name, contract.name, err
                ),
            }
        }
        self.total_vat_difference = vat::round_cents(total);
        self.touch();
        self.total_vat_difference
    }

    /// Last value computed by `calculate_total_vat_difference`.
    pub fn total_vat_difference(&self) -> f64 {
        self.total_vat_difference
    }

    pub fn export_view(&self) -> ExportTable {
        let mut rows = Vec::with_capacity(self.contract_count() + 1);
        let mut total_additional = 0.0;
        for contract in self.all_contracts() {
            match ExportRow::for_contract(contract, &self.settings) {
                Ok(row) => {
                    total_additional += row.additional_vat;
                    rows.push(row);
                }
                Err(err) => warn!(
                    "event=export_row module=project status=skip project={} contract={} error={}",
                    self.name, contract.name, err
                ),
            }
        }
        rows.push(ExportRow::totals(vat::round_cents(total_additional)));
        ExportTable::new(rows)
    }

    pub fn projection(&self, reference_year: i32) -> Vec<ProjectedCost> {
        projection::project_costs(self.all_contracts(), &self.settings, reference_year)
    }
}
