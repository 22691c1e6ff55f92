//! Table writing with all-or-nothing commit.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use arrow::error::ArrowError;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression as ParquetCodec, GzipLevel};
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::columnar::ArrowRecord;
use super::csv::{CsvRecord, encode_csv};
use crate::config::{Compression, OutputConfig};

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),
}

/// A table that has been staged or committed.
#[derive(Debug, Clone)]
pub struct WrittenTable {
    pub name: String,
    pub path: PathBuf,
    pub rows: usize,
}

fn parquet_codec(compression: Compression) -> ParquetCodec {
    match compression {
        Compression::None => ParquetCodec::UNCOMPRESSED,
        Compression::Snappy => ParquetCodec::SNAPPY,
        Compression::Gzip => ParquetCodec::GZIP(GzipLevel::default()),
    }
}

/// Encodes rows as a single-row-group Parquet file.
pub fn encode_parquet<T: ArrowRecord>(
    rows: &[T],
    compression: Compression,
) -> Result<Vec<u8>, WriteError> {
    let batch = T::record_batch(rows)?;
    let props = WriterProperties::builder()
        .set_compression(parquet_codec(compression))
        .build();

    let mut writer = ArrowWriter::try_new(Vec::new(), batch.schema(), Some(props))?;
    writer.write(&batch)?;
    Ok(writer.into_inner()?)
}

/// Writes entity tables and reference tables into their output directories.
#[derive(Debug, Clone)]
pub struct DatasetWriter {
    dir: PathBuf,
    seeds_dir: PathBuf,
    compression: Compression,
}

impl DatasetWriter {
    /// Creates a writer for the given entity and reference directories.
    pub fn new(dir: impl Into<PathBuf>, seeds_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            seeds_dir: seeds_dir.into(),
            compression: Compression::default(),
        }
    }

    pub fn from_config(config: &OutputConfig) -> Self {
        Self::new(&config.dir, &config.seeds_dir).with_compression(config.compression)
    }

    /// Sets the Parquet codec for entity tables.
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Final path of an entity table.
    pub fn table_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.parquet"))
    }

    /// Final path of a reference table.
    pub fn reference_path(&self, name: &str) -> PathBuf {
        self.seeds_dir.join(format!("{name}.csv"))
    }

    /// Starts a batch. Nothing is visible at the final paths until
    /// [`StagedWrite::commit`] succeeds.
    pub fn begin(&self) -> Result<StagedWrite<'_>, WriteError> {
        fs::create_dir_all(&self.dir)?;
        fs::create_dir_all(&self.seeds_dir)?;
        Ok(StagedWrite {
            writer: self,
            staged: Vec::new(),
            committed: false,
        })
    }
}

/// Tables written to temporary files, pending commit.
///
/// Dropping an uncommitted batch removes its temporary files.
pub struct StagedWrite<'a> {
    writer: &'a DatasetWriter,
    staged: Vec<(PathBuf, WrittenTable)>,
    committed: bool,
}

/// One completed step of a commit, kept so it can be undone.
struct Published<'p> {
    tmp: &'p Path,
    path: &'p Path,
    backup: Option<PathBuf>,
}

impl StagedWrite<'_> {
    /// Stages an entity table.
    pub fn table<T: ArrowRecord>(&mut self, name: &str, rows: &[T]) -> Result<(), WriteError> {
        info!("Writing {} {}...", rows.len(), name);
        let bytes = encode_parquet(rows, self.writer.compression)?;
        self.stage(name, self.writer.table_path(name), &bytes, rows.len())
    }

    /// Stages a reference table.
    pub fn reference<T: CsvRecord>(&mut self, name: &str, rows: &[T]) -> Result<(), WriteError> {
        info!("Writing {} {}...", rows.len(), name);
        let bytes = encode_csv(rows);
        self.stage(name, self.writer.reference_path(name), &bytes, rows.len())
    }

    fn stage(
        &mut self,
        name: &str,
        path: PathBuf,
        bytes: &[u8],
        rows: usize,
    ) -> Result<(), WriteError> {
        let tmp = sibling_path(&path, "tmp");
        // Record before writing so a partial file is still cleaned up.
        self.staged.push((
            tmp.clone(),
            WrittenTable {
                name: name.to_string(),
                path,
                rows,
            },
        ));

        let mut file = BufWriter::new(File::create(&tmp)?);
        file.write_all(bytes)?;
        file.flush()?;
        debug!(path = %tmp.display(), bytes = bytes.len(), "Staged table");
        Ok(())
    }

    /// Moves every staged file to its final path.
    ///
    /// Existing files at the final paths are set aside first. If any move
    /// fails, every completed move is undone and the previous files are
    /// restored, so the output directories look as they did before.
    pub fn commit(mut self) -> Result<Vec<WrittenTable>, WriteError> {
        let mut published: Vec<Published<'_>> = Vec::with_capacity(self.staged.len());
        let mut failure = None;

        for (tmp, table) in &self.staged {
            match publish(tmp, &table.path) {
                Ok(backup) => published.push(Published {
                    tmp,
                    path: &table.path,
                    backup,
                }),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if let Some(e) = failure {
            warn!("Commit failed, rolling back {} tables: {e}", published.len());
            for step in published.iter().rev() {
                roll_back(step);
            }
            return Err(e.into());
        }

        for step in &published {
            if let Some(backup) = &step.backup
                && let Err(e) = fs::remove_file(backup)
            {
                warn!("Failed to remove backup {}: {e}", backup.display());
            }
        }
        drop(published);
        self.committed = true;

        let tables: Vec<WrittenTable> = self.staged.drain(..).map(|(_, t)| t).collect();
        for table in &tables {
            info!("Wrote {} {} to {}", table.rows, table.name, table.path.display());
        }
        Ok(tables)
    }
}

/// Renames `tmp` onto `path`, first moving an existing file at `path` aside.
/// Returns the backup location, if one was made.
fn publish(tmp: &Path, path: &Path) -> std::io::Result<Option<PathBuf>> {
    let backup = if path.is_file() {
        let backup = sibling_path(path, "bak");
        fs::rename(path, &backup)?;
        Some(backup)
    } else {
        None
    };

    if let Err(e) = fs::rename(tmp, path) {
        if let Some(backup) = &backup {
            let _ = fs::rename(backup, path);
        }
        return Err(e);
    }
    Ok(backup)
}

/// Returns a published file to its staging path and restores the backup.
/// The staging file is then removed when the batch is dropped.
fn roll_back(step: &Published<'_>) {
    if let Err(e) = fs::rename(step.path, step.tmp) {
        warn!("Failed to withdraw {}: {e}", step.path.display());
    }
    if let Some(backup) = &step.backup
        && let Err(e) = fs::rename(backup, step.path)
    {
        warn!("Failed to restore {}: {e}", step.path.display());
    }
}

impl Drop for StagedWrite<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for (tmp, _) in &self.staged {
            if tmp.exists()
                && let Err(e) = fs::remove_file(tmp)
            {
                warn!("Failed to remove staged file {}: {e}", tmp.display());
            }
        }
    }
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
