use super::record::{self, ProjectRecord, SCHEMA_VERSION};
use super::{PersistenceError, PersistenceResult, ProjectStore};
use crate::config::{ProjectSettings, VatConfig};
use crate::naming;
use crate::project::Project;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use log::{debug, error, info, warn};
use serde_json::Value;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const PROJECT_FILE_NAME: &str = "project.vat";

const MAGIC: &[u8; 4] = b"VATP";
const HEADER_LEN: usize = MAGIC.len() + 2;

/// Encodes a project as `VATP`, a little-endian schema version, then the
/// zlib-compressed JSON record.
pub fn encode_project(project: &Project) -> PersistenceResult<Vec<u8>> {
    let json = serde_json::to_vec(&ProjectRecord::from_project(project))?;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    let body = encoder.finish()?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&SCHEMA_VERSION.to_le_bytes());
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

pub fn decode_project(bytes: &[u8]) -> PersistenceResult<Project> {
    if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
        return Err(PersistenceError::BadMagic);
    }
    let version = u16::from_le_bytes([bytes[MAGIC.len()], bytes[MAGIC.len() + 1]]);
    if version == 0 || version > SCHEMA_VERSION {
        return Err(PersistenceError::UnsupportedVersion(version));
    }

    let mut json = Vec::new();
    ZlibDecoder::new(&bytes[HEADER_LEN..])
        .read_to_end(&mut json)
        .map_err(PersistenceError::Compression)?;

    let value: Value = serde_json::from_slice(&json)?;
    let record: ProjectRecord = serde_json::from_value(record::migrate(value, version)?)?;
    record.into_project()
}

/// One folder per project under `root`, each holding a single
/// [`PROJECT_FILE_NAME`].
#[derive(Debug, Clone)]
pub struct FileProjectStore {
    root: PathBuf,
}

impl FileProjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &VatConfig) -> Self {
        Self::new(config.projects_dir.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_dir(&self, name: &str) -> PathBuf {
        self.root.join(naming::sanitize_project_name(name))
    }

    pub fn project_file(&self, name: &str) -> PathBuf {
        self.project_dir(name).join(PROJECT_FILE_NAME)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.project_dir(name).exists()
    }

    /// Creates and saves an empty project, refusing to reuse another
    /// project's folder.
    pub fn create_project(
        &self,
        name: &str,
        settings: ProjectSettings,
    ) -> PersistenceResult<Project> {
        let project = Project::new(name, settings)?;
        if self.exists(project.name()) {
            return Err(PersistenceError::DuplicateName(project.folder_name()));
        }
        self.save_project(&project)?;
        Ok(project)
    }

    pub fn load_path<P: AsRef<Path>>(&self, path: P) -> PersistenceResult<Project> {
        let bytes = fs::read(path)?;
        decode_project(&bytes)
    }

    /// Loads the project found in each candidate folder. Unreadable entries
    /// and corrupt projects are logged and skipped.
    fn load_listing<I>(&self, entries: I) -> Vec<Project>
    where
        I: IntoIterator<Item = io::Result<PathBuf>>,
    {
        let mut projects = Vec::new();
        for entry in entries {
            let dir = match entry {
                Ok(dir) => dir,
                Err(err) => {
                    warn!(
                        "event=project_list module=persistence status=skip root={} error={}",
                        self.root.display(),
                        err
                    );
                    continue;
                }
            };
            if !dir.is_dir() {
                continue;
            }
            let file = dir.join(PROJECT_FILE_NAME);
            if !file.is_file() {
                continue;
            }
            match self.load_path(&file) {
                Ok(project) => projects.push(project),
                Err(err) => warn!(
                    "event=project_list module=persistence status=skip path={} error={}",
                    file.display(),
                    err
                ),
            }
        }
        projects.sort_by(|a, b| b.modified_at().cmp(&a.modified_at()));
        projects
    }

    fn same_folder(a: &Path, b: &Path) -> bool {
        match (fs::canonicalize(a), fs::canonicalize(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

/// Writes next to `target` and renames over it, so an interrupted save leaves
/// the previous file untouched.
fn write_atomically(dir: &Path, target: &Path, bytes: &[u8]) -> PersistenceResult<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|err| PersistenceError::Io(err.error))?;
    Ok(())
}

impl ProjectStore for FileProjectStore {
    fn save_project(&self, project: &Project) -> PersistenceResult<()> {
        let dir = self.project_dir(project.name());
        fs::create_dir_all(&dir)?;
        let bytes = encode_project(project)?;
        let target = dir.join(PROJECT_FILE_NAME);
        match write_atomically(&dir, &target, &bytes) {
            Ok(()) => {
                info!(
                    "event=project_save module=persistence status=ok folder={} bytes={}",
                    project.folder_name(),
                    bytes.len()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=project_save module=persistence status=error folder={} error={}",
                    project.folder_name(),
                    err
                );
                Err(err)
            }
        }
    }

    fn load_project(&self, name: &str) -> PersistenceResult<Project> {
        let path = self.project_file(name);
        if !path.is_file() {
            return Err(PersistenceError::NotFound(name.to_string()));
        }
        let project = self.load_path(&path)?;
        debug!(
            "event=project_load module=persistence status=ok folder={}",
            project.folder_name()
        );
        Ok(project)
    }

    fn list_projects(&self) -> PersistenceResult<Vec<Project>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.root)?.map(|entry| entry.map(|e| e.path()));
        Ok(self.load_listing(entries))
    }

    fn delete_project(&self, name: &str) -> PersistenceResult<()> {
        let dir = self.project_dir(name);
        if !dir.is_dir() {
            return Err(PersistenceError::NotFound(name.to_string()));
        }
        fs::remove_dir_all(&dir)?;
        info!(
            "event=project_delete module=persistence status=ok folder={}",
            naming::sanitize_project_name(name)
        );
        Ok(())
    }

    /// Renames a project and moves its folder.
    ///
    /// On any failure the project keeps its old name and, where it was
    /// already moved, its folder is moved back.
    fn rename_project(&self, project: &mut Project, new_name: &str) -> PersistenceResult<()> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(PersistenceError::InvalidData("project name cannot be empty".into()));
        }

        let old_name = project.name().to_string();
        let old_modified = project.modified_at();
        let old_dir = self.project_dir(&old_name);
        let new_dir = self.project_dir(new_name);
        let mut moved = false;

        if old_dir != new_dir {
            if new_dir.exists() && !Self::same_folder(&old_dir, &new_dir) {
                return Err(PersistenceError::DuplicateName(
                    naming::sanitize_project_name(new_name),
                ));
            }
            if old_dir.exists() {
                if let Err(err) = fs::rename(&old_dir, &new_dir) {
                    error!(
                        "event=project_rename module=persistence status=error from={} to={} error={}",
                        old_dir.display(),
                        new_dir.display(),
                        err
                    );
                    return Err(err.into());
                }
                moved = true;
            }
        }

        project.set_name(new_name);
        if let Err(err) = self.save_project(project) {
            project.restore_identity(old_name, old_modified);
            if moved {
                if let Err(undo) = fs::rename(&new_dir, &old_dir) {
                    error!(
                        "event=project_rename module=persistence status=error step=rollback from={} to={} error={}",
                        new_dir.display(),
                        old_dir.display(),
                        undo
                    );
                }
            }
            return Err(err);
        }

        info!(
            "event=project_rename module=persistence status=ok to={}",
            naming::sanitize_project_name(new_name)
        );
        Ok(())
    }
}
