use crate::contract::ContractError;
use crate::project::{Project, ProjectError};
use polars::prelude::PolarsError;
use serde_json::Error as SerdeJsonError;
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum PersistenceError {
    Serialization(SerdeJsonError),
    DataFrame(PolarsError),
    Io(io::Error),
    Csv(csv::Error),
    Compression(io::Error),
    BadMagic,
    UnsupportedVersion(u16),
    InvalidData(String),
    NotFound(String),
    DuplicateName(String),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::Serialization(err) => write!(f, "serialization error: {err}"),
            PersistenceError::DataFrame(err) => write!(f, "dataframe conversion error: {err}"),
            PersistenceError::Io(err) => write!(f, "io error: {err}"),
            PersistenceError::Csv(err) => write!(f, "csv error: {err}"),
            PersistenceError::Compression(err) => write!(f, "corrupt project data: {err}"),
            PersistenceError::BadMagic => write!(f, "not a project file (bad magic)"),
            PersistenceError::UnsupportedVersion(version) => {
                write!(f, "project file schema version {version} is not supported")
            }
            PersistenceError::InvalidData(msg) => write!(f, "invalid data: {msg}"),
            PersistenceError::NotFound(name) => write!(f, "project '{name}' not found"),
            PersistenceError::DuplicateName(folder) => {
                write!(f, "a project already uses folder '{folder}'")
            }
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<SerdeJsonError> for PersistenceError {
    fn from(value: SerdeJsonError) -> Self {
        Self::Serialization(value)
    }
}

impl From<PolarsError> for PersistenceError {
    fn from(value: PolarsError) -> Self {
        Self::DataFrame(value)
    }
}

impl From<io::Error> for PersistenceError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<csv::Error> for PersistenceError {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}

impl From<ContractError> for PersistenceError {
    fn from(value: ContractError) -> Self {
        Self::InvalidData(value.to_string())
    }
}

impl From<ProjectError> for PersistenceError {
    fn from(value: ProjectError) -> Self {
        Self::InvalidData(value.to_string())
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Saves and restores whole projects.
///
/// Implementations make no attempt to coordinate concurrent writers; the last
/// save of a project wins.
pub trait ProjectStore {
    fn save_project(&self, project: &Project) -> PersistenceResult<()>;
    fn load_project(&self, name: &str) -> PersistenceResult<Project>;
    /// Every readable project, most recently modified first.
    fn list_projects(&self) -> PersistenceResult<Vec<Project>>;
    fn delete_project(&self, name: &str) -> PersistenceResult<()>;
    fn rename_project(&self, project: &mut Project, new_name: &str) -> PersistenceResult<()>;
}

pub mod file;
pub mod record;

pub use file::{FileProjectStore, PROJECT_FILE_NAME, decode_project, encode_project};
pub use record::{ContractRecord, ProjectRecord, SCHEMA_VERSION};
