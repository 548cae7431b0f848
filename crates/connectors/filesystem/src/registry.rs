use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use datafusion::dataframe::DataFrame;
use datafusion::execution::context::SessionContext;
use datafusion::prelude::{CsvReadOptions, ParquetReadOptions};
use hermaion_common::{Error, Result};

use crate::config::{ConnectorSettings, CsvSettings};

/// Opens a deferred plan over a file or file pattern.
#[async_trait]
pub trait FormatReader: fmt::Debug + Send + Sync {
    /// Build a lazy scan of `path`. Only schema inference touches the data.
    async fn scan(&self, ctx: &SessionContext, path: &str) -> Result<DataFrame>;
}

/// Lazy CSV scan.
#[derive(Debug, Clone, Default)]
pub struct CsvReader {
    settings: CsvSettings,
}

impl CsvReader {
    pub fn new(settings: CsvSettings) -> Self {
        Self { settings }
    }

    fn delimiter(&self) -> Result<u8> {
        let mut chars = self.settings.delimiter.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii() => Ok(c as u8),
            _ => Err(Error::InvalidOption(format!(
                "csv delimiter must be a single ASCII character, got {:?}",
                self.settings.delimiter
            ))),
        }
    }
}

#[async_trait]
impl FormatReader for CsvReader {
    async fn scan(&self, ctx: &SessionContext, path: &str) -> Result<DataFrame> {
        let extension = extension_of(path);
        let options = CsvReadOptions::new()
            .has_header(self.settings.has_header)
            .delimiter(self.delimiter()?)
            .schema_infer_max_records(self.settings.schema_infer_max_records)
            .file_extension(&extension);
        Ok(ctx.read_csv(path, options).await?)
    }
}

/// Lazy Parquet scan.
#[derive(Debug, Clone, Default)]
pub struct ParquetReader;

#[async_trait]
impl FormatReader for ParquetReader {
    async fn scan(&self, ctx: &SessionContext, path: &str) -> Result<DataFrame> {
        let extension = extension_of(path);
        let options = ParquetReadOptions {
            file_extension: &extension,
            ..Default::default()
        };
        Ok(ctx.read_parquet(path, options).await?)
    }
}

// The engine only lists files carrying this suffix, so it follows the path
// rather than a fixed `.csv` / `.parquet`.
fn extension_of(path: &str) -> String {
    Path::new(path)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

/// Maps a file type name to the reader that opens it.
///
/// The registry is a plain value: connectors receive it at construction, so
/// tests and embedders can add or replace formats without touching global state.
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    readers: BTreeMap<String, Arc<dyn FormatReader>>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::from_settings(&ConnectorSettings::default())
    }
}

impl FormatRegistry {
    /// A registry with no formats.
    pub fn empty() -> Self {
        Self { readers: BTreeMap::new() }
    }

    /// The built-in `csv` and `parquet` readers, configured from `settings`.
    pub fn from_settings(settings: &ConnectorSettings) -> Self {
        let mut registry = Self::empty();
        registry.register("csv", Arc::new(CsvReader::new(settings.csv.clone())));
        registry.register("parquet", Arc::new(ParquetReader));
        registry
    }

    /// Adds or replaces a format. Returns the reader previously registered under `name`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        reader: Arc<dyn FormatReader>,
    ) -> Option<Arc<dyn FormatReader>> {
        self.readers.insert(name.into(), reader)
    }

    pub fn get(&self, file_type: &str) -> Option<Arc<dyn FormatReader>> {
        self.readers.get(file_type).cloned()
    }

    /// Registered type names, sorted.
    pub fn formats(&self) -> impl Iterator<Item = &str> {
        self.readers.keys().map(String::as_str)
    }

    /// Checks `file_type` then `path` against it, without touching the filesystem.
    pub fn validate(&self, file_type: &str, path: &str) -> Result<Arc<dyn FormatReader>> {
        let reader = self
            .get(file_type)
            .ok_or_else(|| Error::unsupported_type(file_type, self.formats()))?;
        if !path.ends_with(&format!(".{file_type}")) {
            return Err(Error::ExtensionMismatch {
                path: path.to_string(),
                file_type: file_type.to_string(),
            });
        }
        Ok(reader)
    }
}
