//! XMLTV merger
//!
//! Merges several XMLTV guides into one: channels are filtered and
//! remapped by a channel configuration, programme metadata is normalized
//! for PVR consumption, duplicates are removed and the output is ordered
//! deterministically.

pub mod config;
pub mod epg;
pub mod error;
pub mod merge;
pub mod models;
pub mod normalize;
pub mod report;
pub mod resolver;

pub use config::{ChannelFilter, ChannelMapping, ChannelMappingEntry, ConfigShape, MergeConfig};
pub use error::{ConfigError, FetchError, MergeError, NormalizationError, ParseError, WriteError};
pub use merge::{MergeOptions, MergeOutcome, Merger};
pub use models::MergedDocument;
pub use report::{ChannelListing, ValidationReport};
