use std::collections::HashMap;
use std::path::Path;

use datafusion::arrow::datatypes::{DataType, SchemaRef};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::dataframe::DataFrame;
use datafusion::execution::context::SessionContext;
use datafusion::logical_expr::{cast, ident, Expr};
use hermaion_common::{Error, Result};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{ConnectorSettings, MutationMode};
use crate::registry::FormatRegistry;

/// A named, typed handle on a CSV or Parquet source and the deferred plan built over it.
///
/// `schema` and `columns` are a snapshot of the initial scan. Mutations change
/// the plan only; use [`FileConnector::plan_schema`] for the current shape.
#[derive(Debug)]
pub struct FileConnector {
    id: Uuid,
    name: String,
    file_type: String,
    path: String,
    schema: SchemaRef,
    columns: Vec<String>,
    base_plan: DataFrame,
    plan: DataFrame,
    mode: MutationMode,
    sample_rows: usize,
}

/// Validated construction of a [`FileConnector`].
pub struct FileConnectorBuilder {
    name: String,
    file_type: String,
    path: String,
    settings: ConnectorSettings,
    registry: Option<FormatRegistry>,
    ctx: Option<SessionContext>,
}

impl FileConnectorBuilder {
    pub fn new(name: &str, file_type: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            file_type: file_type.to_string(),
            path: path.to_string(),
            settings: ConnectorSettings::default(),
            registry: None,
            ctx: None,
        }
    }

    pub fn settings(mut self, settings: ConnectorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Use this registry instead of the built-in one derived from the settings.
    pub fn registry(mut self, registry: FormatRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Scan through an existing session instead of a fresh one.
    pub fn session(mut self, ctx: SessionContext) -> Self {
        self.ctx = Some(ctx);
        self
    }

    pub async fn build(self) -> Result<FileConnector> {
        let registry = self
            .registry
            .unwrap_or_else(|| FormatRegistry::from_settings(&self.settings));
        let reader = registry.validate(&self.file_type, &self.path)?;
        test_connection(&self.path).await?;

        let ctx = self.ctx.unwrap_or_default();
        let base_plan = reader.scan(&ctx, &self.path).await?;
        let schema = base_plan.schema().inner().clone();
        if schema.fields().is_empty() {
            warn!(path = %self.path, "file connector source has no readable files");
            return Err(Error::Connectivity {
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no non-empty file matches `{}`", self.path),
                ),
                path: self.path,
            });
        }
        let columns: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();

        let connector = FileConnector {
            id: Uuid::new_v4(),
            name: self.name,
            file_type: self.file_type,
            path: self.path,
            schema,
            columns,
            plan: base_plan.clone(),
            base_plan,
            mode: self.settings.mutation_mode,
            sample_rows: self.settings.sample_rows,
        };
        info!(
            id = %connector.id,
            name = %connector.name,
            file_type = %connector.file_type,
            columns = connector.columns.len(),
            "opened file connector"
        );
        Ok(connector)
    }
}

impl FileConnector {
    /// Builds a connector with the default registry and settings.
    pub async fn try_new(name: &str, file_type: &str, path: &str) -> Result<Self> {
        Self::builder(name, file_type, path).build().await
    }

    pub fn builder(name: &str, file_type: &str, path: &str) -> FileConnectorBuilder {
        FileConnectorBuilder::new(name, file_type, path)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_type(&self) -> &str {
        &self.file_type
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> MutationMode {
        self.mode
    }

    /// Schema of the initial scan.
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Column names of the initial scan, in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Schema of the current plan, after any mutations.
    pub fn plan_schema(&self) -> SchemaRef {
        self.plan.schema().inner().clone()
    }

    /// Materializes the first `n_rows` rows of the current plan.
    pub async fn sample(&self, n_rows: usize) -> Result<Vec<RecordBatch>> {
        debug!(id = %self.id, n_rows, "sampling plan");
        let batches = self.plan.clone().limit(0, Some(n_rows))?.collect().await?;
        Ok(batches)
    }

    /// [`FileConnector::sample`] with the configured `sample_rows`.
    pub async fn sample_default(&self) -> Result<Vec<RecordBatch>> {
        self.sample(self.sample_rows).await
    }

    /// The current deferred plan, not executed.
    pub fn get_plan(&self) -> &DataFrame {
        &self.plan
    }

    pub fn into_plan(self) -> DataFrame {
        self.plan
    }

    /// Drops every mutation and goes back to the initial scan.
    pub fn reset_plan(&mut self) {
        debug!(id = %self.id, "resetting plan");
        self.plan = self.base_plan.clone();
    }

    /// Restricts the current plan to `columns`, in the given order.
    pub fn select_columns<S: AsRef<str>>(&mut self, columns: &[S]) -> Result<()> {
        let names: Vec<&str> = columns.iter().map(AsRef::as_ref).collect();
        ensure_columns(&self.plan, names.iter().copied())?;
        debug!(id = %self.id, columns = ?names, "selecting columns");
        self.plan = self.plan.clone().select_columns(&names)?;
        Ok(())
    }

    /// Renames columns from an old-name to new-name mapping.
    ///
    /// A new name that collides with a column left in place fails with [`Error::Execution`].
    pub fn rename_columns<I, K, V>(&mut self, mapping: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mapping: HashMap<String, String> = mapping
            .into_iter()
            .map(|(old, new)| (old.as_ref().to_string(), new.as_ref().to_string()))
            .collect();
        let input = self.mutation_base();
        ensure_columns(&input, mapping.keys().map(String::as_str))?;
        debug!(id = %self.id, ?mapping, mode = ?self.mode, "renaming columns");

        let exprs = project(&input, |name, column| match mapping.get(name) {
            Some(new_name) => column.alias(new_name),
            None => column,
        });
        self.plan = input.select(exprs)?;
        Ok(())
    }

    /// Casts columns to the given types, keeping their names.
    pub fn cast<I, K>(&mut self, mapping: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, DataType)>,
        K: AsRef<str>,
    {
        let mapping: HashMap<String, DataType> = mapping
            .into_iter()
            .map(|(name, data_type)| (name.as_ref().to_string(), data_type))
            .collect();
        let input = self.mutation_base();
        ensure_columns(&input, mapping.keys().map(String::as_str))?;
        debug!(id = %self.id, ?mapping, mode = ?self.mode, "casting columns");

        let exprs = project(&input, |name, column| match mapping.get(name) {
            Some(data_type) => cast(column, data_type.clone()).alias(name),
            None => column,
        });
        self.plan = input.select(exprs)?;
        Ok(())
    }

    fn mutation_base(&self) -> DataFrame {
        match self.mode {
            MutationMode::Compose => self.plan.clone(),
            MutationMode::Rebase => self.base_plan.clone(),
        }
    }
}

/// Checks that `path` is reachable before a scan is opened.
///
/// For glob patterns only the directory before the first wildcard is checked.
pub async fn test_connection(path: &str) -> Result<()> {
    let target = existing_prefix(path);
    match tokio::fs::metadata(target).await {
        Ok(_) => Ok(()),
        Err(source) => {
            warn!(path, error = %source, "file connector source is not reachable");
            Err(Error::Connectivity { path: path.to_string(), source })
        }
    }
}

fn existing_prefix(path: &str) -> &Path {
    let Some(idx) = path.find(['*', '?', '[']) else {
        return Path::new(path);
    };
    let prefix = &path[..idx];
    if prefix.is_empty() {
        return Path::new(".");
    }
    if prefix.ends_with('/') {
        return Path::new(prefix);
    }
    match Path::new(prefix).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn ensure_columns<'a>(plan: &DataFrame, names: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let schema = plan.schema();
    for name in names {
        if !schema.fields().iter().any(|f| f.name() == name) {
            return Err(Error::ColumnNotFound(name.to_string()));
        }
    }
    Ok(())
}

/// One expression per column of `plan`, in order, rewritten by `f`.
fn project(plan: &DataFrame, f: impl Fn(&str, Expr) -> Expr) -> Vec<Expr> {
    plan.schema()
        .fields()
        .iter()
        .map(|field| f(field.name(), ident(field.name())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paths_are_checked_as_is() {
        assert_eq!(existing_prefix("data/file.csv"), Path::new("data/file.csv"));
    }

    #[test]
    fn glob_paths_check_their_directory() {
        assert_eq!(existing_prefix("data/*.csv"), Path::new("data/"));
        assert_eq!(existing_prefix("data/part-*.parquet"), Path::new("data"));
        assert_eq!(existing_prefix("*.csv"), Path::new("."));
        assert_eq!(existing_prefix("file?.csv"), Path::new("."));
    }

    #[tokio::test]
    async fn missing_file_is_a_connectivity_error() {
        let err = test_connection("/no/such/dir/data.csv").await.unwrap_err();
        match err {
            Error::Connectivity { path, source } => {
                assert_eq!(path, "/no/such/dir/data.csv");
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn existing_directory_passes_for_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = format!("{}/*.csv", dir.path().display());
        assert!(test_connection(&pattern).await.is_ok());
    }
}
