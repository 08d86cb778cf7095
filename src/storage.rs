//!
//! tabweave storage module
//! -----------------------
//! Loading input tables and writing the single output table. The pipeline only
//! sees the `TableSource`/`TableSink` traits; `FileStore` implements both over a
//! flat input directory and one output destination, decoding each input by its
//! file extension with the matching polars reader. `MemorySource`/`MemorySink`
//! keep everything in memory for tests and embedding.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use polars::prelude::*;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};

/// Format-specific decoding of a declared table name into a frame.
pub trait TableSource: Send + Sync {
    fn load_table(&self, name: &str) -> AppResult<DataFrame>;
}

/// Persist the final table; returns the destination identifier handed back to the caller.
pub trait TableSink: Send + Sync {
    fn write_table(&self, df: &mut DataFrame) -> AppResult<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputFormat { Csv, Tsv, Json, Parquet, Ipc }

fn input_format(name: &str) -> AppResult<InputFormat> {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" => Ok(InputFormat::Csv),
        "tsv" => Ok(InputFormat::Tsv),
        "json" => Ok(InputFormat::Json),
        "parquet" => Ok(InputFormat::Parquet),
        "ipc" | "feather" | "arrow" => Ok(InputFormat::Ipc),
        _ => Err(AppError::UnsupportedSourceType { name: name.to_string(), extension: ext }),
    }
}

fn check_table_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(AppError::validation(format!("invalid table name '{}'", name)));
    }
    Ok(())
}

/// Flat-directory file store: reads `<input_dir>/<name>` and writes one output file.
pub struct FileStore {
    input_dir: PathBuf,
    output_path: PathBuf,
    unique_output: bool,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(input_dir: P, output_path: Q) -> Self {
        Self {
            input_dir: input_dir.as_ref().to_path_buf(),
            output_path: output_path.as_ref().to_path_buf(),
            unique_output: false,
            write_lock: Mutex::new(()),
        }
    }

    /// When set, every write goes to `<stem>-<uuid>.<ext>` next to the configured output path.
    pub fn with_unique_output(mut self, unique: bool) -> Self {
        self.unique_output = unique;
        self
    }

    fn destination(&self) -> PathBuf {
        if !self.unique_output {
            return self.output_path.clone();
        }
        let stem = self.output_path.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
        let ext = self.output_path.extension().and_then(|s| s.to_str()).unwrap_or("csv");
        let file = format!("{}-{}.{}", stem, uuid::Uuid::new_v4(), ext);
        match self.output_path.parent() {
            Some(dir) => dir.join(file),
            None => PathBuf::from(file),
        }
    }
}

impl TableSource for FileStore {
    fn load_table(&self, name: &str) -> AppResult<DataFrame> {
        check_table_name(name)?;
        let format = input_format(name)?;
        let path = self.input_dir.join(name.trim());
        if !path.is_file() {
            return Err(AppError::SourceNotFound { name: name.to_string() });
        }
        debug!(target: "tabweave::storage", "load_table: name='{}' path='{}' format={:?}", name, path.display(), format);
        let df = match format {
            InputFormat::Csv | InputFormat::Tsv => {
                let sep = if format == InputFormat::Tsv { b'\t' } else { b',' };
                CsvReadOptions::default()
                    .with_has_header(true)
                    .with_parse_options(CsvParseOptions::default().with_separator(sep))
                    .try_into_reader_with_file_path(Some(path.clone()))?
                    .finish()?
            }
            InputFormat::Json => JsonReader::new(fs::File::open(&path)?).finish()?,
            InputFormat::Parquet => ParquetReader::new(fs::File::open(&path)?).finish()?,
            InputFormat::Ipc => IpcReader::new(fs::File::open(&path)?).finish()?,
        };
        debug!(target: "tabweave::storage", "load_table: name='{}' rows={} cols={}", name, df.height(), df.width());
        Ok(df)
    }
}

impl TableSink for FileStore {
    fn write_table(&self, df: &mut DataFrame) -> AppResult<String> {
        let _guard = self.write_lock.lock();
        let dest = self.destination();
        if let Some(dir) = dest.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let mut file = fs::File::create(&dest)?;
        let is_parquet = dest
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("parquet"))
            .unwrap_or(false);
        if is_parquet {
            ParquetWriter::new(&mut file)
                .with_statistics(StatisticsOptions::default())
                .finish(df)?;
        } else {
            CsvWriter::new(&mut file).include_header(true).finish(df)?;
        }
        let dest = dest.display().to_string();
        info!(target: "tabweave::storage", "wrote {} rows x {} cols to '{}'", df.height(), df.width(), dest);
        Ok(dest)
    }
}

/// In-memory source keyed by declared table name.
#[derive(Default)]
pub struct MemorySource {
    tables: HashMap<String, DataFrame>,
}

impl MemorySource {
    pub fn new() -> Self { Self::default() }

    pub fn with_table(mut self, name: &str, df: DataFrame) -> Self {
        self.tables.insert(name.to_string(), df);
        self
    }

    pub fn insert(&mut self, name: &str, df: DataFrame) {
        self.tables.insert(name.to_string(), df);
    }
}

impl TableSource for MemorySource {
    fn load_table(&self, name: &str) -> AppResult<DataFrame> {
        self.tables
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::SourceNotFound { name: name.to_string() })
    }
}

/// Collects written frames; destinations are `memory://<n>`.
#[derive(Default)]
pub struct MemorySink {
    written: Mutex<Vec<DataFrame>>,
}

impl MemorySink {
    pub fn new() -> Self { Self::default() }

    pub fn frames(&self) -> Vec<DataFrame> { self.written.lock().clone() }

    pub fn last(&self) -> Option<DataFrame> { self.written.lock().last().cloned() }
}

impl TableSink for MemorySink {
    fn write_table(&self, df: &mut DataFrame) -> AppResult<String> {
        let mut w = self.written.lock();
        w.push(df.clone());
        Ok(format!("memory://{}", w.len()))
    }
}
