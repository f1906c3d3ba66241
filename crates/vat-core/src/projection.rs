use crate::config::ProjectSettings;
use crate::contract::Contract;
use crate::vat;
use serde::Serialize;

/// One contract's cost for one projected year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedCost {
    pub contract: String,
    pub base_cost: f64,
    pub year: i32,
    pub vat_rate: f64,
    pub cost_with_vat: f64,
}

/// Re-prices each contract's VAT-exclusive cost over the settings' projection
/// horizon. Years before `reference_year` use the current rate, the rest the
/// future rate.
pub fn project_costs<'a, I>(
    contracts: I,
    settings: &ProjectSettings,
    reference_year: i32,
) -> Vec<ProjectedCost>
where
    I: IntoIterator<Item = &'a Contract>,
{
    let Ok(years) = i32::try_from(settings.projection_years) else {
        return Vec::new();
    };
    let mut rows = Vec::new();
    for contract in contracts {
        let base_cost = contract.base_cost();
        for offset in 0..years {
            let Some(year) = contract.start_year().checked_add(offset) else {
                break;
            };
            let vat_rate = if year < reference_year {
                settings.current_vat
            } else {
                settings.future_vat
            };
            rows.push(ProjectedCost {
                contract: contract.name.clone(),
                base_cost,
                year,
                vat_rate,
                cost_with_vat: vat::round_cents(base_cost * (1.0 + vat_rate / 100.0)),
            });
        }
    }
    rows
}
