//! ardlib library exports
//!
//! Index loading, library resolution, archive download and extraction for
//! installing Arduino libraries from the official library index.

pub mod catalog;
pub mod config;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod installer;
pub mod transport;

pub use error::{Error, Result};
