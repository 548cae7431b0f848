//! Filesystem connector
//!
//! Wraps a CSV or Parquet file (or a glob of them) in a [`FileConnector`]:
//! a validated, named handle holding a lazy DataFusion plan that can be
//! sampled, projected, renamed and cast.
//!
//! # Example
//! ```no_run
//! # async fn run() -> hermaion_common::Result<()> {
//! use hermaion_connector_filesystem::FileConnector;
//!
//! let mut connector = FileConnector::try_new("trips", "csv", "data/trips.csv").await?;
//! connector.select_columns(&["pickup", "fare"])?;
//! let batches = connector.sample(10).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connector;
pub mod registry;

pub use config::{ConnectorSettings, CsvSettings, MutationMode};
pub use connector::{test_connection, FileConnector, FileConnectorBuilder};
pub use registry::{CsvReader, FormatReader, FormatRegistry, ParquetReader};
