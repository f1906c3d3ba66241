pub mod config;
pub mod contract;
pub mod export;
pub mod format;
pub mod import;
pub mod logging;
pub mod naming;
pub mod persistence;
pub mod project;
pub mod projection;
pub mod task;
pub mod validation;
pub mod vat;

pub use config::{ConfigError, ProjectSettings, VatConfig};
pub use contract::{Contract, ContractError, VatImpact, VatMode, YearBreakdown};
pub use export::{EXPORT_COLUMNS, ExportRow, ExportTable};
pub use format::format_money;
pub use import::{Cell, ContractDraft, ImportRow, drafts_from_table, read_import_csv};
pub use logging::{default_log_level, init_logging};
pub use naming::sanitize_project_name;
pub use persistence::{
    FileProjectStore, PersistenceError, PersistenceResult, ProjectStore, decode_project,
    encode_project,
};
pub use project::{ContractKind, Project, ProjectError};
pub use projection::{ProjectedCost, project_costs};
pub use task::ContractTask;
pub use validation::ValidationError;
pub use vat::{
    RateError, VatRateChange, VatSchedule, cutoff_difference, round_cents, task_driven_difference,
};
