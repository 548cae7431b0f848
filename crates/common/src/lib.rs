//! Common crate
//!
//! Shared error handling for Hermaion.
//!
//! # Example
//! ```rust
//! use hermaion_common::Error;
//! let err = Error::unsupported_type("json", ["csv", "parquet"]);
//! assert!(err.to_string().contains("csv,parquet"));
//! ```

pub mod error;

pub use error::{Error, Result};
