//! Merge pipeline
//!
//! Loads sources, resolves channels, normalizes programmes, removes
//! duplicates and sorts the result. Per-source and per-programme failures
//! are recorded in the report; only configuration errors and cancellation
//! end a run.

use crate::config::ChannelFilter;
use crate::epg::{write_to_path, EpgParser, WriterOptions};
use crate::error::MergeError;
use crate::models::{file_name_of, MergedDocument, OutputProgramme, SourceDocument};
use crate::normalize::ProgrammeNormalizer;
use crate::report::{LoadFailure, ValidationReport, DEFAULT_SAMPLE_SIZE};
use crate::resolver::resolve_channels;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Run options
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Channel ids previewed per source in the report
    pub report_sample: usize,
    /// Checked between sources; once set the run stops with `Cancelled`
    pub cancel: Arc<AtomicBool>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            report_sample: DEFAULT_SAMPLE_SIZE,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub document: MergedDocument,
    pub report: ValidationReport,
}

/// Input paths sorted by file name then full path, duplicates removed.
///
/// "First source" for deduplication means first in this order.
pub fn canonical_order(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut ordered: Vec<PathBuf> = paths.to_vec();
    ordered.sort_by(|a, b| file_name_of(a).cmp(&file_name_of(b)).then_with(|| a.cmp(b)));
    ordered.dedup();
    ordered
}

/// Merges sources under one channel filter
pub struct Merger {
    filter: ChannelFilter,
    options: MergeOptions,
}

impl Merger {
    pub fn new(filter: ChannelFilter, options: MergeOptions) -> Self {
        Self { filter, options }
    }

    fn check_cancelled(&self) -> Result<(), MergeError> {
        if self.options.cancel.load(Ordering::Relaxed) {
            info!("Merge cancelled");
            return Err(MergeError::Cancelled);
        }
        Ok(())
    }

    /// Load every path, keeping failures apart
    pub fn load_sources(
        &self,
        paths: &[PathBuf],
    ) -> Result<(Vec<SourceDocument>, Vec<LoadFailure>), MergeError> {
        let mut documents = Vec::new();
        let mut failures = Vec::new();

        for path in canonical_order(paths) {
            self.check_cancelled()?;
            match EpgParser::parse_file(&path) {
                Ok(doc) => documents.push(doc),
                Err(e) => {
                    warn!("Error parsing {}: {}", path.display(), e);
                    failures.push(LoadFailure {
                        message: e.to_string(),
                        path,
                    });
                }
            }
        }

        Ok((documents, failures))
    }

    /// Load and merge the files at `paths`
    pub fn merge_files(&self, paths: &[PathBuf]) -> Result<MergeOutcome, MergeError> {
        info!("Merging {} XMLTV files", paths.len());
        let (documents, failures) = self.load_sources(paths)?;
        self.merge_documents(documents, failures)
    }

    /// Merge the files at `paths` and write the result to `output`.
    ///
    /// Nothing is written when the merge fails or is cancelled.
    pub fn merge_to_path(
        &self,
        paths: &[PathBuf],
        output: &Path,
        writer: &WriterOptions,
    ) -> Result<MergeOutcome, MergeError> {
        let outcome = self.merge_files(paths)?;
        write_to_path(&outcome.document, output, writer)?;
        Ok(outcome)
    }

    /// Merge already loaded documents.
    ///
    /// Documents are put in canonical order first, so the caller's ordering
    /// does not affect the output.
    pub fn merge_documents(
        &self,
        mut documents: Vec<SourceDocument>,
        failures: Vec<LoadFailure>,
    ) -> Result<MergeOutcome, MergeError> {
        documents.sort_by(|a, b| {
            a.file_name()
                .cmp(&b.file_name())
                .then_with(|| a.path.cmp(&b.path))
        });

        let mut report = ValidationReport::new(self.options.report_sample);
        let resolved = resolve_channels(&self.filter, &documents, &failures, &mut report)?;

        let mut programmes: Vec<OutputProgramme> = Vec::new();
        for (index, doc) in documents.iter().enumerate() {
            self.check_cancelled()?;

            let mut kept = 0;
            let mut dropped = 0;
            for record in &doc.programmes {
                let final_ids = resolved.final_ids(index, &record.channel_id);
                let Some((first, aliases)) = final_ids.split_first() else {
                    continue;
                };
                match ProgrammeNormalizer::normalize(record, first) {
                    Ok(programme) => {
                        let copies: Vec<OutputProgramme> = aliases
                            .iter()
                            .map(|id| OutputProgramme {
                                channel_id: id.clone(),
                                ..programme.clone()
                            })
                            .collect();
                        programmes.push(programme);
                        programmes.extend(copies);
                        kept += 1;
                    }
                    Err(e) => {
                        debug!(
                            "Dropping programme on {} from {}: {}",
                            record.channel_id,
                            doc.file_name(),
                            e
                        );
                        dropped += 1;
                    }
                }
            }

            if kept + dropped > 0 {
                let source = report.source_mut(&doc.file_name());
                source.programmes_kept += kept;
                source.programmes_dropped += dropped;
            }
        }
        self.check_cancelled()?;

        let before = programmes.len();
        let mut programmes = deduplicate(programmes);
        report.duplicates_removed = before - programmes.len();

        // Stable: equal keys keep canonical source order
        programmes.sort_by(|a, b| a.channel_id.cmp(&b.channel_id).then(a.start.cmp(&b.start)));

        let mut channels = resolved.channels;
        channels.sort_by(|a, b| a.id.cmp(&b.id));

        info!(
            "Merged {} channels and {} programmes ({} duplicates removed)",
            channels.len(),
            programmes.len(),
            report.duplicates_removed
        );

        Ok(MergeOutcome {
            document: MergedDocument {
                channels,
                programmes,
            },
            report,
        })
    }
}

/// Keep the first programme for each (channel, start instant, title)
fn deduplicate(programmes: Vec<OutputProgramme>) -> Vec<OutputProgramme> {
    let mut seen: HashSet<(String, i64, String)> = HashSet::with_capacity(programmes.len());
    programmes
        .into_iter()
        .filter(|p| {
            let key = (p.channel_id.clone(), p.start.timestamp(), p.title.text.clone());
            let fresh = seen.insert(key);
            if !fresh {
                debug!("Duplicate programme '{}' on {} at {}", p.title.text, p.channel_id, p.start);
            }
            fresh
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_order() {
        let paths = vec![
            PathBuf::from("/z/b.xml"),
            PathBuf::from("/a/c.xml"),
            PathBuf::from("/y/a.xml"),
            PathBuf::from("/x/a.xml"),
            PathBuf::from("/z/b.xml"),
        ];
        assert_eq!(
            canonical_order(&paths),
            vec![
                PathBuf::from("/x/a.xml"),
                PathBuf::from("/y/a.xml"),
                PathBuf::from("/z/b.xml"),
                PathBuf::from("/a/c.xml"),
            ]
        );
    }

    #[test]
    fn test_cancelled_before_start() {
        let options = MergeOptions::default();
        options.cancel.store(true, Ordering::Relaxed);
        let merger = Merger::new(ChannelFilter::IncludeAll, options);
        let result = merger.merge_files(&[PathBuf::from("/nonexistent.xml")]);
        assert!(matches!(result, Err(MergeError::Cancelled)));
    }

    #[test]
    fn test_empty_run() {
        let merger = Merger::new(ChannelFilter::IncludeAll, MergeOptions::default());
        let outcome = merger.merge_documents(Vec::new(), Vec::new()).unwrap();
        assert!(outcome.document.channels.is_empty());
        assert_eq!(outcome.document.programme_count(), 0);
        assert!(!outcome.report.has_problems());
    }
}
