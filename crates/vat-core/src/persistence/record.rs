//! Plain, serializable mirror of a project.
//!
//! Records hold values only: contracts, tasks and rate changes are fully
//! expanded so that a stored project never depends on in-memory identity.

use super::{PersistenceError, PersistenceResult};
use crate::config::ProjectSettings;
use crate::contract::{Contract, ContractError};
use crate::project::{ContractKind, Project};
use crate::task::ContractTask;
use crate::vat::VatRateChange;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Schema version written into every project file.
///
/// - 1: `created`/`modified`, contract `remaining_cost`, task `completion`,
///   rate change `year`; no projection horizon.
/// - 2: current layout.
pub const SCHEMA_VERSION: u16 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(default)]
    pub name: String,
    pub year: i32,
    #[serde(default)]
    pub cost_with_vat: f64,
    #[serde(default)]
    pub completion_percent: f64,
    #[serde(default)]
    pub is_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VatChangeRecord {
    pub effective_year: i32,
    pub new_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractRecord {
    #[serde(default = "default_contract_name")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(default)]
    pub total_cost_with_vat: f64,
    #[serde(default = "current_year")]
    pub start_year: i32,
    #[serde(default = "default_duration")]
    pub duration_years: i32,
    #[serde(default = "default_base_rate")]
    pub base_vat_rate: f64,
    #[serde(default)]
    pub remaining_cost_at_cutoff: f64,
    #[serde(default)]
    pub is_flagged: bool,
    #[serde(default)]
    pub tasks: Vec<TaskRecord>,
    #[serde(default)]
    pub vat_changes: Vec<VatChangeRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    #[serde(default = "default_project_name")]
    pub name: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
    #[serde(default)]
    pub settings: ProjectSettings,
    #[serde(default)]
    pub contracts: Vec<ContractRecord>,
    #[serde(default)]
    pub manual_contracts: Vec<ContractRecord>,
    #[serde(default)]
    pub total_vat_difference: f64,
}

fn default_contract_name() -> String {
    crate::import::DEFAULT_CONTRACT_NAME.to_string()
}

fn default_project_name() -> String {
    "Untitled".to_string()
}

fn current_year() -> i32 {
    Utc::now().year()
}

fn default_duration() -> i32 {
    1
}

fn default_base_rate() -> f64 {
    crate::config::DEFAULT_CURRENT_VAT
}

/// Amounts are floored at zero on the way out.
fn stored_amount(value: f64) -> f64 {
    value.max(0.0)
}

impl From<&ContractTask> for TaskRecord {
    fn from(task: &ContractTask) -> Self {
        Self {
            name: task.name.clone(),
            year: task.year,
            cost_with_vat: stored_amount(task.cost_with_vat()),
            completion_percent: task.completion_percent(),
            is_completed: task.is_completed,
        }
    }
}

impl From<&VatRateChange> for VatChangeRecord {
    fn from(change: &VatRateChange) -> Self {
        Self {
            effective_year: change.effective_year,
            new_rate: change.new_rate_percent,
        }
    }
}

impl From<&Contract> for ContractRecord {
    fn from(contract: &Contract) -> Self {
        Self {
            name: contract.name.clone(),
            number: contract.contract_number.clone(),
            total_cost_with_vat: stored_amount(contract.total_cost_with_vat()),
            start_year: contract.start_year(),
            duration_years: contract.duration_years(),
            base_vat_rate: contract.base_vat_rate_percent(),
            remaining_cost_at_cutoff: stored_amount(contract.remaining_cost_at_cutoff()),
            is_flagged: contract.is_flagged,
            tasks: contract.tasks().iter().map(TaskRecord::from).collect(),
            vat_changes: contract.vat_changes().iter().map(VatChangeRecord::from).collect(),
        }
    }
}

impl ContractRecord {
    pub fn into_contract(self) -> Result<Contract, ContractError> {
        let mut contract = Contract::new(
            self.name,
            self.total_cost_with_vat,
            self.start_year,
            self.duration_years,
            self.base_vat_rate,
        )?
        .with_remaining_cost_at_cutoff(self.remaining_cost_at_cutoff)?;
        contract.contract_number = self.number;
        contract.is_flagged = self.is_flagged;
        for task in self.tasks {
            let mut restored = ContractTask::new(task.name, task.year, task.cost_with_vat)?
                .with_completion(task.completion_percent);
            restored.is_completed = task.is_completed;
            contract.push_task(restored);
        }
        // stored order is already year-sorted, so re-adding keeps same-year precedence
        for change in self.vat_changes {
            contract.add_vat_change(change.effective_year, change.new_rate)?;
        }
        Ok(contract)
    }
}

impl ProjectRecord {
    pub fn from_project(project: &Project) -> Self {
        Self {
            name: project.name().to_string(),
            created_at: project.created_at(),
            modified_at: project.modified_at(),
            settings: *project.settings(),
            contracts: project
                .contracts(ContractKind::Imported)
                .iter()
                .map(ContractRecord::from)
                .collect(),
            manual_contracts: project
                .contracts(ContractKind::Manual)
                .iter()
                .map(ContractRecord::from)
                .collect(),
            total_vat_difference: project.total_vat_difference(),
        }
    }

    pub fn into_project(self) -> PersistenceResult<Project> {
        self.settings
            .validate()
            .map_err(|err| PersistenceError::InvalidData(format!("settings: {err}")))?;
        let contracts = restore_contracts(self.contracts)?;
        let manual_contracts = restore_contracts(self.manual_contracts)?;
        Ok(Project::from_parts(
            self.name,
            self.created_at,
            self.modified_at,
            self.settings,
            contracts,
            manual_contracts,
            self.total_vat_difference,
        ))
    }
}

fn restore_contracts(records: Vec<ContractRecord>) -> PersistenceResult<Vec<Contract>> {
    records
        .into_iter()
        .map(|record| {
            let name = record.name.clone();
            record.into_contract().map_err(|err| {
                PersistenceError::InvalidData(format!("contract '{name}': {err}"))
            })
        })
        .collect()
}

/// Brings a decoded record written with schema `version` up to
/// [`SCHEMA_VERSION`].
pub fn migrate(value: Value, version: u16) -> PersistenceResult<Value> {
    if version == 0 || version > SCHEMA_VERSION {
        return Err(PersistenceError::UnsupportedVersion(version));
    }
    let mut value = value;
    if version < 2 {
        value = migrate_v1_to_v2(value)?;
    }
    Ok(value)
}

fn rename_key(object: &mut Map<String, Value>, from: &str, to: &str) {
    if object.contains_key(to) {
        return;
    }
    if let Some(moved) = object.remove(from) {
        object.insert(to.to_string(), moved);
    }
}

fn for_each_object<F>(value: Option<&mut Value>, mut apply: F)
where
    F: FnMut(&mut Map<String, Value>),
{
    if let Some(Value::Array(items)) = value {
        for item in items.iter_mut() {
            if let Some(object) = item.as_object_mut() {
                apply(object);
            }
        }
    }
}

fn migrate_v1_to_v2(mut value: Value) -> PersistenceResult<Value> {
    let root = value.as_object_mut().ok_or_else(|| {
        PersistenceError::InvalidData("project record is not an object".into())
    })?;
    rename_key(root, "created", "created_at");
    rename_key(root, "modified", "modified_at");

    for list in ["contracts", "manual_contracts"] {
        for_each_object(root.get_mut(list), |contract| {
            rename_key(contract, "remaining_cost", "remaining_cost_at_cutoff");
            rename_key(contract, "current_vat_rate", "base_vat_rate");
            rename_key(contract, "duration", "duration_years");
            for_each_object(contract.get_mut("tasks"), |task| {
                rename_key(task, "completion", "completion_percent");
            });
            for_each_object(contract.get_mut("vat_changes"), |change| {
                rename_key(change, "year", "effective_year");
            });
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_record_takes_documented_defaults() {
        let record: ProjectRecord = serde_json::from_value(json!({ "name": "Bare" })).unwrap();
        assert_eq!(record.settings, ProjectSettings::default());
        assert!(record.contracts.is_empty());
        let project = record.into_project().unwrap();
        assert_eq!(project.settings().current_vat, 20.0);
        assert_eq!(project.settings().future_vat, 22.0);
        assert_eq!(project.settings().projection_years, 5);
    }

    #[test]
    fn empty_settings_object_takes_defaults() {
        let record: ProjectRecord =
            serde_json::from_value(json!({ "name": "p", "settings": {} })).unwrap();
        assert_eq!(record.settings, ProjectSettings::default());
    }

    #[test]
    fn version_one_records_are_migrated() {
        let legacy = json!({
            "name": "Legacy",
            "created": "2025-01-01T00:00:00Z",
            "modified": "2025-02-01T00:00:00Z",
            "settings": { "current_vat": 20.0, "future_vat": 22.0 },
            "contracts": [{
                "name": "Pipes",
                "total_cost_with_vat": 1200.0,
                "remaining_cost": 300.0,
                "tasks": [{ "name": "lay", "year": 2025, "cost_with_vat": 100.0, "completion": 50.0 }],
                "vat_changes": [{ "year": 2026, "new_rate": 22.0 }]
            }]
        });
        let migrated = migrate(legacy, 1).unwrap();
        let record: ProjectRecord = serde_json::from_value(migrated).unwrap();
        assert_eq!(record.created_at.to_rfc3339(), "2025-01-01T00:00:00+00:00");
        assert_eq!(record.settings.projection_years, 5);
        let contract = &record.contracts[0];
        assert_eq!(contract.remaining_cost_at_cutoff, 300.0);
        assert_eq!(contract.tasks[0].completion_percent, 50.0);
        assert_eq!(contract.vat_changes[0].effective_year, 2026);
    }

    #[test]
    fn unknown_versions_are_rejected() {
        assert!(matches!(
            migrate(json!({}), SCHEMA_VERSION + 1),
            Err(PersistenceError::UnsupportedVersion(_))
        ));
        assert!(matches!(
            migrate(json!({}), 0),
            Err(PersistenceError::UnsupportedVersion(0))
        ));
    }

    #[test]
    fn invalid_stored_contract_is_reported() {
        let record: ProjectRecord = serde_json::from_value(json!({
            "name": "p",
            "contracts": [{ "name": "broken", "duration_years": 0 }]
        }))
        .unwrap();
        let err = record.into_project().unwrap_err();
        assert!(err.to_string().contains("broken"), "{err}");
    }

    #[test]
    fn stored_contract_with_overflowing_period_is_refused() {
        let record: ProjectRecord = serde_json::from_value(json!({
            "name": "p",
            "manual_contracts": [{ "name": "far", "start_year": i32::MAX, "duration_years": 1 }]
        }))
        .unwrap();
        assert!(matches!(
            record.into_project(),
            Err(PersistenceError::InvalidData(msg)) if msg.contains("far")
        ));
    }

    #[test]
    fn stored_settings_with_huge_horizon_are_refused() {
        let record: ProjectRecord = serde_json::from_value(json!({
            "name": "p",
            "settings": { "projection_years": u32::MAX }
        }))
        .unwrap();
        assert!(record.into_project().is_err());
    }
}
