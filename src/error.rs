//! Error types for the merge pipeline
//!
//! Each failure class has its own scope. Configuration and write failures
//! abort a run; parse failures are scoped to one source document and
//! normalization failures to one programme.

use std::path::PathBuf;
use thiserror::Error;

/// Malformed or ambiguous channel configuration. Fatal to the run.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Filter file could not be read
    #[error("Cannot read filter file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON document of a shape we do not understand
    #[error("Invalid configuration shape: {0}")]
    InvalidShape(String),

    /// Channel entry that is neither a source file name nor an object
    #[error("Invalid configuration for channel '{display_name}': {message}")]
    InvalidChannelEntry {
        display_name: String,
        message: String,
    },

    /// Two distinct display names resolve to the same output channel id
    #[error("Output id '{output_id}' is claimed by both '{first}' and '{second}'")]
    OutputIdCollision {
        output_id: String,
        first: String,
        second: String,
    },
}

/// One XMLTV source could not be loaded. The source contributes nothing.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error at byte {position}: {message}")]
    Xml { position: u64, message: String },

    #[error("Encoding error at byte {position}: {message}")]
    Encoding { position: u64, message: String },

    #[error("Element <{0}> is never closed")]
    Unclosed(String),

    #[error("Document has no <tv> root element")]
    MissingRoot,
}

/// One programme's metadata could not be normalized. The programme is dropped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizationError {
    #[error("Programme has no start time")]
    MissingStart,

    #[error("Programme has no title")]
    MissingTitle,

    #[error("Unparsable {field} timestamp '{value}'")]
    InvalidTimestamp { field: &'static str, value: String },
}

/// The merged document could not be stored.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Output stream error: {0}")]
    Stream(#[from] std::io::Error),
}

/// A registered source could not be downloaded.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Source file name '{0}' is not a bare file name")]
    UnsafeName(String),

    #[error("HTTP error: {0}")]
    Status(u16),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

/// Run-fatal errors surfaced to the caller.
#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    #[error("Run cancelled before all sources were processed")]
    Cancelled,
}
