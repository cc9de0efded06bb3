//! XMLTV wire format
//!
//! Loading source documents, writing the merged document and fetching
//! registered sources.

mod fetch;
mod parser;
mod writer;

// Re-export public types
pub use fetch::{DownloadConfig, DownloadOutcome, EpgDownloader, SourceDownload};
pub use parser::EpgParser;
pub use writer::{render_document, write_document, write_to_path, WriterOptions};
