//! Channel coverage report and channel listing
//!
//! Both are advisory: they are printed for the user and never feed back
//! into the merge.

use crate::models::SourceDocument;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Default number of channel ids shown per source
pub const DEFAULT_SAMPLE_SIZE: usize = 10;

/// Report bucket for channel entries that name no source file
pub const ANY_SOURCE: &str = "(any source)";

const RULE_WIDTH: usize = 60;

/// A source that could not be loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub message: String,
}

/// A display name that matched several channels of one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousName {
    pub display_name: String,
    pub channel_ids: Vec<String>,
}

/// Coverage of one source file (or of the `(any source)` bucket)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceReport {
    pub total_requested: usize,
    pub found_count: usize,
    /// Requested display names with no match, in configuration order
    pub missing: Vec<String>,
    pub ambiguous: Vec<AmbiguousName>,
    /// Bounded preview of channel ids the source does offer
    pub sample_available: Vec<String>,
    /// Number of channels the source offers beyond the sample
    pub more_available: usize,
    pub load_error: Option<String>,
    pub programmes_kept: usize,
    pub programmes_dropped: usize,
}

impl SourceReport {
    /// Replace the sample with the first `limit` ids in ordinal order
    pub fn set_available<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>, limit: usize) {
        let mut ids: Vec<&str> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        self.more_available = ids.len().saturating_sub(limit);
        self.sample_available = ids.into_iter().take(limit).map(str::to_string).collect();
    }

    pub fn has_problems(&self) -> bool {
        !self.missing.is_empty() || !self.ambiguous.is_empty() || self.load_error.is_some()
    }
}

/// Per-source coverage for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub sources: BTreeMap<String, SourceReport>,
    pub sample_size: usize,
    pub duplicates_removed: usize,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_SIZE)
    }
}

impl ValidationReport {
    pub fn new(sample_size: usize) -> Self {
        Self {
            sources: BTreeMap::new(),
            sample_size,
            duplicates_removed: 0,
        }
    }

    pub fn source(&self, name: &str) -> Option<&SourceReport> {
        self.sources.get(name)
    }

    pub fn source_mut(&mut self, name: &str) -> &mut SourceReport {
        self.sources.entry(name.to_string()).or_default()
    }

    pub fn has_problems(&self) -> bool {
        self.sources.values().any(SourceReport::has_problems)
    }

    pub fn total_missing(&self) -> usize {
        self.sources.values().map(|s| s.missing.len()).sum()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(RULE_WIDTH);
        writeln!(f, "{}", rule)?;
        writeln!(f, "CHANNEL VALIDATION")?;
        writeln!(f, "{}", rule)?;

        for (name, source) in &self.sources {
            writeln!(f)?;
            writeln!(f, "Source file: {}", name)?;

            if let Some(error) = &source.load_error {
                writeln!(f, "  ERROR: failed to load: {}", error)?;
            }
            if source.total_requested > 0 {
                writeln!(
                    f,
                    "  Requested: {}, found: {}",
                    source.total_requested, source.found_count
                )?;
            } else if source.load_error.is_none() {
                writeln!(f, "  Channels: {}", source.found_count)?;
            }

            if !source.missing.is_empty() {
                writeln!(f, "  Missing channels ({}):", source.missing.len())?;
                for name in &source.missing {
                    writeln!(f, "    ERROR: '{}' not found", name)?;
                }
            }
            if !source.ambiguous.is_empty() {
                writeln!(f, "  Ambiguous channels ({}):", source.ambiguous.len())?;
                for entry in &source.ambiguous {
                    writeln!(
                        f,
                        "    ERROR: '{}' matches {}",
                        entry.display_name,
                        entry.channel_ids.join(", ")
                    )?;
                }
            }
            if source.has_problems() && !source.sample_available.is_empty() {
                write!(f, "  Available: {}", source.sample_available.join(", "))?;
                if source.more_available > 0 {
                    write!(f, " (+{} more)", source.more_available)?;
                }
                writeln!(f)?;
            }
            if source.programmes_kept > 0 || source.programmes_dropped > 0 {
                writeln!(
                    f,
                    "  Programmes: {} kept, {} dropped",
                    source.programmes_kept, source.programmes_dropped
                )?;
            }
        }

        if self.duplicates_removed > 0 {
            writeln!(f)?;
            writeln!(f, "Duplicate programmes removed: {}", self.duplicates_removed)?;
        }
        if self.has_problems() {
            writeln!(f)?;
            writeln!(f, "Use --list-channels to see all available channels")?;
        }
        write!(f, "{}", rule)
    }
}

/// One channel offered by the loaded sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedChannel {
    pub id: String,
    pub display_names: Vec<String>,
    pub source_file: String,
}

/// Every channel id across a set of sources, sorted by id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelListing {
    pub channels: Vec<ListedChannel>,
}

impl ChannelListing {
    /// The first document declaring an id wins
    pub fn from_documents(documents: &[SourceDocument]) -> Self {
        let mut by_id: BTreeMap<&str, ListedChannel> = BTreeMap::new();
        for doc in documents {
            let source_file = doc.file_name();
            for channel in &doc.channels {
                by_id.entry(channel.id.as_str()).or_insert_with(|| ListedChannel {
                    id: channel.id.clone(),
                    display_names: channel.display_names.clone(),
                    source_file: source_file.clone(),
                });
            }
        }
        Self {
            channels: by_id.into_values().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl fmt::Display for ChannelListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Found {} unique channels:", self.channels.len())?;
        writeln!(f, "{}", "-".repeat(80))?;
        for channel in &self.channels {
            writeln!(f, "ID: {}", channel.id)?;
            let first = channel
                .display_names
                .first()
                .map(String::as_str)
                .unwrap_or("No display name");
            writeln!(f, "    Display Name: {}", first)?;
            writeln!(f, "    Source: {}", channel.source_file)?;
            if channel.display_names.len() > 1 {
                writeln!(f, "    Other names: {}", channel.display_names[1..].join(", "))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
