use datafusion::error::DataFusionError;
use thiserror::Error;

/// Unified error type for Hermaion crates.
#[derive(Debug, Error)]
pub enum Error {
    #[error("File type `{file_type}` is not supported. Only {supported} are supported.")]
    FileTypeNotSupported { file_type: String, supported: String },
    #[error("Provided file's extension and file type does not match: `{path}` does not end with `.{file_type}`")]
    ExtensionMismatch { path: String, file_type: String },
    #[error("Unable to reach `{path}`: {source}")]
    Connectivity {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Column not found: {0}")]
    ColumnNotFound(String),
    #[error("Invalid option: {0}")]
    InvalidOption(String),
    #[error("Execution error: {0}")]
    Execution(#[from] DataFusionError),
    #[error("Failed to load configuration")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Builds a [`Error::FileTypeNotSupported`] listing the accepted types.
    pub fn unsupported_type<'a>(
        file_type: &str,
        supported: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Error::FileTypeNotSupported {
            file_type: file_type.to_string(),
            supported: supported.into_iter().collect::<Vec<_>>().join(","),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_type_lists_supported_formats() {
        let err = Error::unsupported_type("json", ["csv", "parquet"]);
        assert_eq!(
            err.to_string(),
            "File type `json` is not supported. Only csv,parquet are supported."
        );
    }

    #[test]
    fn connectivity_keeps_io_source() {
        use std::error::Error as _;

        let err = Error::Connectivity {
            path: "missing.csv".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.to_string().contains("missing.csv"));
        assert_eq!(err.source().map(|s| s.to_string()), Some("gone".to_string()));
    }
}
