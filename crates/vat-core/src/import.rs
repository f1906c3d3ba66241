//! Contract rows coming in from spreadsheets.
//!
//! Rows are accepted either positionally (`name, number, <unused>, total,
//! remaining, ...`) or keyed by column name, and are turned into
//! [`ContractDraft`]s here before any business logic sees them.

use crate::contract::{Contract, ContractError};
use crate::persistence::{PersistenceError, PersistenceResult};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

pub const DEFAULT_CONTRACT_NAME: &str = "Contract";
/// Positional rows shorter than this are skipped.
pub const MIN_POSITIONAL_FIELDS: usize = 5;

const NAME_COLUMN: usize = 0;
const NUMBER_COLUMN: usize = 1;
const TOTAL_COLUMN: usize = 3;
const REMAINING_COLUMN: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn from_text(raw: &str) -> Self {
        if raw.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(raw.to_string())
        }
    }

    fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(text) => {
                let trimmed = text.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Cell::Number(value) => Some(value.to_string()),
        }
    }

    /// Empty cells count as zero; text is parsed leniently (`1 234,50`).
    fn as_amount(&self, row: usize, column: &str) -> PersistenceResult<f64> {
        match self {
            Cell::Empty => Ok(0.0),
            Cell::Number(value) => Ok(*value),
            Cell::Text(text) => {
                let normalized: String = text
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .map(|c| if c == ',' { '.' } else { c })
                    .collect();
                if normalized.is_empty() {
                    return Ok(0.0);
                }
                normalized.parse::<f64>().map_err(|_| {
                    PersistenceError::InvalidData(format!(
                        "row {row}: column '{column}' is not a number: '{text}'"
                    ))
                })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportRow {
    Positional(Vec<Cell>),
    Keyed(BTreeMap<String, Cell>),
}

/// Contract data as read from a sheet, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractDraft {
    pub name: String,
    pub number: String,
    pub total_cost_with_vat: f64,
    pub remaining_cost_at_cutoff: f64,
}

impl ContractDraft {
    /// Adapts one row. `row` is the 1-based sheet row used in error messages.
    /// Returns `Ok(None)` for positional rows too short to describe a contract.
    pub fn from_row(source: &ImportRow, row: usize) -> PersistenceResult<Option<Self>> {
        let empty = Cell::Empty;
        let (name, number, total, remaining) = match source {
            ImportRow::Positional(cells) => {
                if cells.len() < MIN_POSITIONAL_FIELDS {
                    return Ok(None);
                }
                (
                    &cells[NAME_COLUMN],
                    &cells[NUMBER_COLUMN],
                    &cells[TOTAL_COLUMN],
                    &cells[REMAINING_COLUMN],
                )
            }
            ImportRow::Keyed(cells) => {
                let get = |key: &str| cells.get(key).unwrap_or(&empty);
                (
                    get("name"),
                    get("number"),
                    get("total_cost_with_vat"),
                    get("remaining_cost_at_cutoff"),
                )
            }
        };

        Ok(Some(Self {
            name: name
                .as_text()
                .unwrap_or_else(|| DEFAULT_CONTRACT_NAME.to_string()),
            number: number.as_text().unwrap_or_default(),
            total_cost_with_vat: total.as_amount(row, "total_cost_with_vat")?,
            remaining_cost_at_cutoff: remaining.as_amount(row, "remaining_cost_at_cutoff")?,
        }))
    }

    pub fn into_contract(
        self,
        start_year: i32,
        base_vat_rate: f64,
    ) -> Result<Contract, ContractError> {
        Contract::new(self.name, self.total_cost_with_vat, start_year, 1, base_vat_rate)?
            .with_number(self.number)
            .with_remaining_cost_at_cutoff(self.remaining_cost_at_cutoff)
    }
}

/// Adapts a whole sheet whose first row holds headers.
pub fn drafts_from_table(rows: &[ImportRow]) -> PersistenceResult<Vec<ContractDraft>> {
    let mut drafts = Vec::new();
    for (idx, row) in rows.iter().enumerate().skip(1) {
        if let Some(draft) = ContractDraft::from_row(row, idx + 1)? {
            drafts.push(draft);
        }
    }
    Ok(drafts)
}

/// Reads a CSV export of the contract sheet as positional rows, header included.
pub fn read_import_csv<P: AsRef<Path>>(path: P) -> PersistenceResult<Vec<ImportRow>> {
    let file = File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(ImportRow::Positional(
            record.iter().map(Cell::from_text).collect(),
        ));
    }
    Ok(rows)
}
