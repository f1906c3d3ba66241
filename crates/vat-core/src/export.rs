use crate::config::ProjectSettings;
use crate::contract::Contract;
use crate::persistence::PersistenceResult;
use crate::vat::{self, RateError};
use polars::prelude::PlSmallStr;
use polars::prelude::*;
use serde::Serialize;
use std::fs::File;
use std::path::Path;

pub const TOTALS_LABEL: &str = "TOTAL";

/// Export columns, in sheet order.
pub const EXPORT_COLUMNS: [&str; 10] = [
    "name",
    "number",
    "total_cost_with_vat",
    "remaining_cost_at_cutoff",
    "difference",
    "amount_without_vat",
    "vat_current",
    "vat_future",
    "amount_with_future_vat",
    "additional_vat",
];

/// One sheet row. The totals row leaves every amount but
/// `additional_vat` blank.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub name: String,
    pub number: String,
    pub total_cost_with_vat: Option<f64>,
    pub remaining_cost_at_cutoff: Option<f64>,
    pub difference: Option<f64>,
    pub amount_without_vat: Option<f64>,
    pub vat_current: Option<f64>,
    pub vat_future: Option<f64>,
    pub amount_with_future_vat: Option<f64>,
    pub additional_vat: f64,
}

impl ExportRow {
    pub fn for_contract(
        contract: &Contract,
        settings: &ProjectSettings,
    ) -> Result<Self, RateError> {
        let difference = contract.cutoff_difference();
        let without_vat = vat::exclude_vat(difference, settings.current_vat)?;
        let vat_current = without_vat * settings.current_vat / 100.0;
        let vat_future = without_vat * settings.future_vat / 100.0;
        Ok(Self {
            name: contract.name.clone(),
            number: contract.contract_number.clone().unwrap_or_default(),
            total_cost_with_vat: Some(vat::round_cents(contract.total_cost_with_vat())),
            remaining_cost_at_cutoff: Some(vat::round_cents(contract.remaining_cost_at_cutoff())),
            difference: Some(vat::round_cents(difference)),
            amount_without_vat: Some(vat::round_cents(without_vat)),
            vat_current: Some(vat::round_cents(vat_current)),
            vat_future: Some(vat::round_cents(vat_future)),
            amount_with_future_vat: Some(vat::round_cents(without_vat + vat_future)),
            additional_vat: contract.vat_difference(settings)?,
        })
    }

    pub fn totals(additional_vat: f64) -> Self {
        Self {
            name: TOTALS_LABEL.to_string(),
            number: String::new(),
            total_cost_with_vat: None,
            remaining_cost_at_cutoff: None,
            difference: None,
            amount_without_vat: None,
            vat_current: None,
            vat_future: None,
            amount_with_future_vat: None,
            additional_vat,
        }
    }

    fn amounts(&self) -> [Option<f64>; 8] {
        [
            self.total_cost_with_vat,
            self.remaining_cost_at_cutoff,
            self.difference,
            self.amount_without_vat,
            self.vat_current,
            self.vat_future,
            self.amount_with_future_vat,
            Some(self.additional_vat),
        ]
    }

    fn to_record(&self) -> Vec<String> {
        let mut record = Vec::with_capacity(EXPORT_COLUMNS.len());
        record.push(self.name.clone());
        record.push(self.number.clone());
        record.extend(
            self.amounts()
                .iter()
                .map(|amount| amount.map(|v| format!("{v:.2}")).unwrap_or_default()),
        );
        record
    }
}

/// Per-contract rows followed by the totals row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportTable {
    rows: Vec<ExportRow>,
}

impl ExportTable {
    pub fn new(rows: Vec<ExportRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[ExportRow] {
        &self.rows
    }

    pub fn totals(&self) -> Option<&ExportRow> {
        self.rows.last()
    }

    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let mut columns: Vec<Column> = Vec::with_capacity(EXPORT_COLUMNS.len());

        let names: Vec<&str> = self.rows.iter().map(|r| r.name.as_str()).collect();
        columns.push(Series::new(PlSmallStr::from_static(EXPORT_COLUMNS[0]), names).into_column());

        let numbers: Vec<Option<&str>> = self
            .rows
            .iter()
            .map(|r| (!r.number.is_empty()).then_some(r.number.as_str()))
            .collect();
        columns.push(
            Series::new(PlSmallStr::from_static(EXPORT_COLUMNS[1]), numbers).into_column(),
        );

        for (offset, name) in EXPORT_COLUMNS[2..].iter().enumerate() {
            let values: Vec<Option<f64>> = self.rows.iter().map(|r| r.amounts()[offset]).collect();
            columns.push(Series::new(PlSmallStr::from_static(*name), values).into_column());
        }

        DataFrame::new(columns)
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> PersistenceResult<()> {
        let file = File::create(path)?;
        let mut writer = ::csv::Writer::from_writer(file);
        writer.write_record(EXPORT_COLUMNS)?;
        for row in &self.rows {
            writer.write_record(row.to_record())?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cutoff_contract() -> Contract {
        Contract::new("Supplies", 5000.0, 2025, 1, 20.0)
            .unwrap()
            .with_number("S-1")
            .with_remaining_cost_at_cutoff(1400.0)
            .unwrap()
    }

    #[test]
    fn contract_row_derives_every_column() {
        let row = ExportRow::for_contract(&cutoff_contract(), &ProjectSettings::default()).unwrap();
        assert_eq!(row.difference, Some(3600.0));
        assert_eq!(row.amount_without_vat, Some(3000.0));
        assert_eq!(row.vat_current, Some(600.0));
        assert_eq!(row.vat_future, Some(660.0));
        assert_eq!(row.amount_with_future_vat, Some(3660.0));
        assert_eq!(row.additional_vat, 19.13);
    }

    #[test]
    fn totals_row_leaves_amounts_blank() {
        let row = ExportRow::totals(12.5);
        let record = row.to_record();
        assert_eq!(record[0], TOTALS_LABEL);
        assert!(record[1..9].iter().all(String::is_empty));
        assert_eq!(record[9], "12.50");
    }

    #[test]
    fn dataframe_keeps_column_order_and_nulls() {
        let contract = cutoff_contract();
        let table = ExportTable::new(vec![
            ExportRow::for_contract(&contract, &ProjectSettings::default()).unwrap(),
            ExportRow::totals(19.13),
        ]);
        let df = table.to_dataframe().unwrap();
        let names: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, EXPORT_COLUMNS.to_vec());
        assert_eq!(df.height(), 2);
        assert_eq!(df.column("total_cost_with_vat").unwrap().null_count(), 1);
        assert_eq!(df.column("additional_vat").unwrap().null_count(), 0);
    }
}
