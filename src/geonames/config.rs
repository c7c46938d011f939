//! GeoNames Path Configuration
//!
//! Resolves where the dataset lives on disk: the data directory, the SQLite
//! database file, and the source archive with its extracted text form.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default data directory name, relative to the base directory
pub const DEFAULT_DATA_DIR: &str = "geonames_data";

/// Default database file name inside the data directory
pub const DEFAULT_DATABASE_FILE: &str = "geonames.db";

/// GeoNames source archive name
pub const ZIP_FILE_NAME: &str = "allCountries.zip";

/// GeoNames extracted dump name
pub const TXT_FILE_NAME: &str = "allCountries.txt";

const WRITE_PROBE_PREFIX: &str = ".write_probe";

/// Resolved dataset paths handed to the store at setup time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoNamesConfig {
    /// Directory holding the database and source files
    pub save_dir: PathBuf,
    /// SQLite database file
    pub database_filepath: PathBuf,
    /// Source archive path
    pub zip_file: PathBuf,
    /// Extracted source path
    pub txt_file: PathBuf,
}

impl GeoNamesConfig {
    /// Build a config for `data_dir` with the default database file name
    pub fn for_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self::with_database_file(data_dir, DEFAULT_DATABASE_FILE)
    }

    /// Build a config for `data_dir` with a custom database file name
    pub fn with_database_file(data_dir: impl Into<PathBuf>, database_file: &str) -> Self {
        let save_dir = data_dir.into();
        Self {
            database_filepath: save_dir.join(database_file),
            zip_file: save_dir.join(ZIP_FILE_NAME),
            txt_file: save_dir.join(TXT_FILE_NAME),
            save_dir,
        }
    }

    /// Resolve `data_dir` against `base_dir`, creating it if absent.
    ///
    /// Absolute `data_dir` values are used as-is. The returned paths are
    /// canonical.
    pub fn resolve(base_dir: &Path, data_dir: &Path, database_file: &str) -> io::Result<Self> {
        let dir = if data_dir.is_absolute() {
            data_dir.to_path_buf()
        } else {
            base_dir.join(data_dir)
        };

        fs::create_dir_all(&dir)?;
        let dir = fs::canonicalize(&dir)?;

        Ok(Self::with_database_file(dir, database_file))
    }

    /// Check whether the data directory accepts new files
    pub fn is_writable(&self) -> bool {
        probe_writable(&self.save_dir).is_ok()
    }
}

/// Create and remove a uniquely named probe file in `dir`.
///
/// Permission bits alone are unreliable (root ignores them), so the check
/// performs a real write. Overlapping checks never share a file.
pub fn probe_writable(dir: &Path) -> io::Result<()> {
    let probe = tempfile::Builder::new()
        .prefix(WRITE_PROBE_PREFIX)
        .tempfile_in(dir)?;
    probe.close()
}
