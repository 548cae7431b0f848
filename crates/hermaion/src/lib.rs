//! Command line front end: open a file connector, optionally reshape its
//! plan, and render the schema or a sample.

use std::path::Path;

use arrow::datatypes::{DataType, SchemaRef};
use arrow::util::pretty::pretty_format_batches;
use clap::{Parser, Subcommand};
use datafusion::error::DataFusionError;
use hermaion_common::{Error, Result};
use hermaion_connector_filesystem::{ConnectorSettings, FileConnector};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Settings file (TOML). Defaults to `HERMAION_CONFIG_PATH` when set.
    #[arg(short, long)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the schema captured when the source was opened.
    Schema {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Print the first rows of the plan. Select, rename and cast run in that order.
    Sample {
        #[command(flatten)]
        source: SourceArgs,
        /// Rows to fetch; defaults to `sample_rows` from the settings.
        #[arg(short = 'n', long)]
        rows: Option<usize>,
        #[arg(long, value_delimiter = ',')]
        select: Vec<String>,
        /// `old=new`, repeatable.
        #[arg(long, value_parser = parse_rename)]
        rename: Vec<(String, String)>,
        /// `column=Type` using Arrow type names (`Int64`, `Utf8`, ...), repeatable.
        #[arg(long, value_parser = parse_cast)]
        cast: Vec<(String, DataType)>,
    },
}

#[derive(clap::Args, Debug)]
pub struct SourceArgs {
    /// Connector label; defaults to the file stem.
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long = "type")]
    pub file_type: String,
    #[arg(long)]
    pub path: String,
}

impl SourceArgs {
    async fn open(&self, settings: ConnectorSettings) -> Result<FileConnector> {
        let name = match &self.name {
            Some(name) => name.clone(),
            None => Path::new(&self.path)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.path.clone()),
        };
        FileConnector::builder(&name, &self.file_type, &self.path)
            .settings(settings)
            .build()
            .await
    }
}

pub fn parse_rename(value: &str) -> std::result::Result<(String, String), String> {
    match value.split_once('=') {
        Some((old, new)) if !old.is_empty() && !new.is_empty() => {
            Ok((old.to_string(), new.to_string()))
        }
        _ => Err(format!("expected OLD=NEW, got `{value}`")),
    }
}

pub fn parse_cast(value: &str) -> std::result::Result<(String, DataType), String> {
    let (column, type_name) = value
        .split_once('=')
        .filter(|(column, _)| !column.is_empty())
        .ok_or_else(|| format!("expected COLUMN=TYPE, got `{value}`"))?;
    let data_type = type_name
        .parse::<DataType>()
        .map_err(|e| format!("unknown type `{type_name}`: {e}"))?;
    Ok((column.to_string(), data_type))
}

/// Runs one command and returns what should be printed.
pub async fn run(args: Args) -> Result<String> {
    let settings = match &args.config {
        Some(path) => ConnectorSettings::from_file(path)?,
        None => ConnectorSettings::new()?,
    };
    debug!(?settings, "loaded settings");

    match args.command {
        Command::Schema { source } => {
            let connector = source.open(settings).await?;
            Ok(render_schema(connector.schema()))
        }
        Command::Sample { source, rows, select, rename, cast } => {
            let mut connector = source.open(settings).await?;
            if !select.is_empty() {
                connector.select_columns(&select)?;
            }
            if !rename.is_empty() {
                connector.rename_columns(rename)?;
            }
            if !cast.is_empty() {
                connector.cast(cast)?;
            }
            let batches = match rows {
                Some(n) => connector.sample(n).await?,
                None => connector.sample_default().await?,
            };
            let table = pretty_format_batches(&batches)
                .map_err(|e| Error::Execution(DataFusionError::from(e)))?;
            Ok(table.to_string())
        }
    }
}

fn render_schema(schema: &SchemaRef) -> String {
    schema
        .fields()
        .iter()
        .map(|field| format!("{}: {}", field.name(), field.data_type()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trips.csv");
        std::fs::write(&path, "id,city,fare\n1,Oslo,12.5\n2,Bergen,8.0\n3,Oslo,3.25\n").unwrap();
        let path = path.to_str().unwrap().to_string();
        (dir, path)
    }

    #[test]
    fn rename_argument_needs_both_sides() {
        assert_eq!(parse_rename("a=b"), Ok(("a".to_string(), "b".to_string())));
        assert!(parse_rename("a").is_err());
        assert!(parse_rename("=b").is_err());
        assert!(parse_rename("a=").is_err());
    }

    #[test]
    fn cast_argument_uses_arrow_type_names() {
        assert_eq!(parse_cast("id=Int64"), Ok(("id".to_string(), DataType::Int64)));
        assert_eq!(parse_cast("fare=Utf8"), Ok(("fare".to_string(), DataType::Utf8)));
        assert!(parse_cast("id=NotAType").is_err());
        assert!(parse_cast("Int64").is_err());
    }

    #[tokio::test]
    async fn schema_command_lists_columns() {
        let (_dir, path) = fixture();
        let args = Args::try_parse_from(["hermaion", "schema", "--type", "csv", "--path", &path]).unwrap();

        let output = run(args).await.unwrap();
        assert_eq!(output, "id: Int64\ncity: Utf8\nfare: Float64");
    }

    #[tokio::test]
    async fn sample_command_applies_mutations() {
        let (_dir, path) = fixture();
        let args = Args::try_parse_from([
            "hermaion", "sample", "--type", "csv", "--path", &path, "-n", "2",
            "--select", "city,id", "--rename", "city=town", "--cast", "id=Utf8",
        ])
        .unwrap();

        let output = run(args).await.unwrap();
        assert!(output.contains("town"), "{output}");
        assert!(output.contains("Bergen"), "{output}");
        assert!(!output.contains("fare"), "{output}");
        assert!(!output.contains("| 3"), "{output}");
    }

    #[tokio::test]
    async fn bad_type_is_reported() {
        let (_dir, path) = fixture();
        let args = Args::try_parse_from(["hermaion", "schema", "--type", "json", "--path", &path]).unwrap();

        let err = run(args).await.unwrap_err();
        assert!(matches!(err, Error::FileTypeNotSupported { .. }));
    }
}
