//! Channel resolution
//!
//! Cross-references the channel filter against loaded source documents.
//! Produces the output channel set, a route table from
//! `(document, source channel id)` to final id used to attribute programmes,
//! and the coverage entries of the validation report.

use crate::config::{ChannelFilter, ChannelMapping, ChannelMappingEntry};
use crate::error::ConfigError;
use crate::models::{file_answers_to, file_name_of, ChannelRecord, OutputChannel, SourceDocument};
use crate::report::{AmbiguousName, LoadFailure, ValidationReport, ANY_SOURCE};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

/// Output channels plus programme routing for one run
#[derive(Debug, Clone, Default)]
pub struct ResolvedChannels {
    /// Unique by id, in resolution order
    pub channels: Vec<OutputChannel>,
    routes: HashMap<(usize, String), Vec<String>>,
}

impl ResolvedChannels {
    /// Final ids a channel of `documents[document]` is published under.
    ///
    /// Empty when the channel is not retained. Several entries mapping the
    /// same source channel to different output ids yield one id each.
    pub fn final_ids(&self, document: usize, channel_id: &str) -> &[String] {
        self.routes
            .get(&(document, channel_id.to_string()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn add_route(&mut self, document: usize, channel_id: &str, final_id: &str) {
        let targets = self
            .routes
            .entry((document, channel_id.to_string()))
            .or_default();
        if !targets.iter().any(|t| t == final_id) {
            targets.push(final_id.to_string());
        }
    }
}

/// Resolve `filter` against `documents`, recording coverage in `report`.
///
/// Fails when two distinct channel entries end up with the same final id.
pub fn resolve_channels(
    filter: &ChannelFilter,
    documents: &[SourceDocument],
    failures: &[LoadFailure],
    report: &mut ValidationReport,
) -> Result<ResolvedChannels, ConfigError> {
    match filter {
        ChannelFilter::IncludeAll => Ok(include_all(documents, failures, report)),
        ChannelFilter::Mapping(mapping) => resolve_mapping(mapping, documents, failures, report),
    }
}

fn include_all(
    documents: &[SourceDocument],
    failures: &[LoadFailure],
    report: &mut ValidationReport,
) -> ResolvedChannels {
    let mut resolved = ResolvedChannels::default();
    let mut seen: HashSet<&str> = HashSet::new();
    let sample_size = report.sample_size;

    for (index, doc) in documents.iter().enumerate() {
        let source = report.source_mut(&doc.file_name());
        source.found_count += doc.channels.len();
        source.set_available(doc.channels.iter().map(|c| c.id.as_str()), sample_size);

        for channel in &doc.channels {
            resolved.add_route(index, &channel.id, &channel.id);
            // Same id in a later source: first source keeps the icon
            if seen.insert(channel.id.as_str()) {
                resolved.channels.push(OutputChannel {
                    id: channel.id.clone(),
                    icon: channel.icon.clone(),
                });
            }
        }
    }

    for failure in failures {
        report.source_mut(&file_name_of(&failure.path)).load_error = Some(failure.message.clone());
    }

    resolved
}

/// Outcome of looking one entry up in its candidate documents
enum EntryMatch<'a> {
    Found {
        channel: &'a ChannelRecord,
        documents: Vec<usize>,
    },
    Ambiguous(Vec<String>),
    Missing,
}

fn resolve_mapping(
    mapping: &ChannelMapping,
    documents: &[SourceDocument],
    failures: &[LoadFailure],
    report: &mut ValidationReport,
) -> Result<ResolvedChannels, ConfigError> {
    let mut resolved = ResolvedChannels::default();
    let mut claimed: HashMap<String, &str> = HashMap::new();
    let mut buckets: BTreeMap<&str, Vec<usize>> = BTreeMap::new();

    for entry in mapping.entries() {
        let bucket = entry.source_file.as_deref().unwrap_or(ANY_SOURCE);
        let candidates: Vec<usize> = documents
            .iter()
            .enumerate()
            .filter(|(_, doc)| match &entry.source_file {
                Some(source_file) => doc.answers_to(source_file),
                None => true,
            })
            .map(|(index, _)| index)
            .collect();

        report.source_mut(bucket).total_requested += 1;
        buckets.entry(bucket).or_insert_with(|| candidates.clone());

        match match_entry(entry, documents, &candidates) {
            EntryMatch::Found {
                channel,
                documents: matched,
            } => {
                let final_id = entry.output_id.clone().unwrap_or_else(|| channel.id.clone());
                if let Some(first) = claimed.get(&final_id) {
                    return Err(ConfigError::OutputIdCollision {
                        output_id: final_id,
                        first: first.to_string(),
                        second: entry.display_name.clone(),
                    });
                }
                claimed.insert(final_id.clone(), entry.display_name.as_str());

                for index in matched {
                    resolved.add_route(index, &channel.id, &final_id);
                }
                debug!(
                    "Resolved '{}' to {} (source id {})",
                    entry.display_name, final_id, channel.id
                );
                resolved.channels.push(OutputChannel {
                    id: final_id,
                    icon: entry.icon_override.clone().or_else(|| channel.icon.clone()),
                });
                report.source_mut(bucket).found_count += 1;
            }
            EntryMatch::Ambiguous(channel_ids) => {
                warn!(
                    "Channel '{}' is ambiguous in {}: matches {}",
                    entry.display_name,
                    bucket,
                    channel_ids.join(", ")
                );
                report.source_mut(bucket).ambiguous.push(AmbiguousName {
                    display_name: entry.display_name.clone(),
                    channel_ids,
                });
            }
            EntryMatch::Missing => {
                warn!("Channel '{}' not found in {}", entry.display_name, bucket);
                report.source_mut(bucket).missing.push(entry.display_name.clone());
            }
        }
    }

    let sample_size = report.sample_size;
    for (bucket, candidates) in &buckets {
        let ids = candidates
            .iter()
            .flat_map(|&index| documents[index].channels.iter().map(|c| c.id.as_str()));
        report.source_mut(bucket).set_available(ids, sample_size);
    }

    for failure in failures {
        let file_name = file_name_of(&failure.path);
        let bucket = buckets
            .keys()
            .find(|bucket| **bucket != ANY_SOURCE && file_answers_to(&file_name, bucket))
            .map(|bucket| bucket.to_string())
            .unwrap_or(file_name);
        report.source_mut(&bucket).load_error = Some(failure.message.clone());
    }

    Ok(resolved)
}

/// Channels of one document matching an entry: display name first, then
/// channel id. Both exact and case-sensitive.
fn matches_in<'a>(doc: &'a SourceDocument, display_name: &str) -> Vec<&'a ChannelRecord> {
    let by_name: Vec<&ChannelRecord> = doc
        .channels
        .iter()
        .filter(|c| c.display_names.iter().any(|n| n == display_name))
        .collect();
    if !by_name.is_empty() {
        return by_name;
    }
    doc.channel(display_name).into_iter().collect()
}

/// The first candidate document with a match fixes the source channel id.
/// Later candidates contribute only when they use that same id.
fn match_entry<'a>(
    entry: &ChannelMappingEntry,
    documents: &'a [SourceDocument],
    candidates: &[usize],
) -> EntryMatch<'a> {
    let mut found: Option<&'a ChannelRecord> = None;
    let mut matched = Vec::new();

    for &index in candidates {
        let hits = matches_in(&documents[index], &entry.display_name);
        match hits.as_slice() {
            [] => {}
            [channel] => match found {
                None => {
                    found = Some(*channel);
                    matched.push(index);
                }
                Some(first) if first.id == channel.id => matched.push(index),
                Some(first) => debug!(
                    "'{}' is {} in {} but {} was matched first",
                    entry.display_name,
                    channel.id,
                    documents[index].file_name(),
                    first.id
                ),
            },
            several => {
                return EntryMatch::Ambiguous(several.iter().map(|c| c.id.clone()).collect());
            }
        }
    }

    match found {
        Some(channel) => EntryMatch::Found {
            channel,
            documents: matched,
        },
        None => EntryMatch::Missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MergeConfig;
    use crate::models::ChannelRecord;

    fn channel(id: &str, name: &str, icon: Option<&str>) -> ChannelRecord {
        ChannelRecord {
            id: id.to_string(),
            display_names: vec![name.to_string()],
            icon: icon.map(str::to_string),
        }
    }

    fn document(path: &str, channels: Vec<ChannelRecord>) -> SourceDocument {
        let mut doc = SourceDocument::new(path);
        doc.channels = channels;
        doc
    }

    fn filter(json: &str) -> ChannelFilter {
        MergeConfig::parse(json).unwrap().filter
    }

    #[test]
    fn test_missing_channel_reported() {
        let docs = vec![document(
            "/data/uk.xml",
            vec![channel("a.uk", "A", None), channel("c.uk", "C", None)],
        )];
        let filter = filter(r#"{"channels": {"A": "uk.xml", "B": "uk.xml", "C": "uk.xml"}}"#);
        let mut report = ValidationReport::default();

        let resolved = resolve_channels(&filter, &docs, &[], &mut report).unwrap();
        assert_eq!(resolved.channels.len(), 2);

        let source = report.source("uk.xml").unwrap();
        assert_eq!(source.total_requested, 3);
        assert_eq!(source.found_count, 2);
        assert_eq!(source.missing, vec!["B"]);
        assert_eq!(source.sample_available, vec!["a.uk", "c.uk"]);
    }

    #[test]
    fn test_output_id_and_icon_override() {
        let docs = vec![document(
            "/data/uk.xml.gz",
            vec![
                channel("bbc1", "BBC One", Some("http://logo/bbc1.png")),
                channel("itv", "ITV", Some("http://logo/itv.png")),
            ],
        )];
        let filter = filter(
            r#"{"channels": {
                "BBC One": {"source_file": "uk.xml", "output_id": "BBC1.uk"},
                "ITV": {"source_file": "uk.xml", "icon": "http://mine/itv.png"}
            }}"#,
        );
        let mut report = ValidationReport::default();
        let resolved = resolve_channels(&filter, &docs, &[], &mut report).unwrap();

        assert_eq!(
            resolved.channels,
            vec![
                OutputChannel {
                    id: "BBC1.uk".to_string(),
                    icon: Some("http://logo/bbc1.png".to_string()),
                },
                OutputChannel {
                    id: "itv".to_string(),
                    icon: Some("http://mine/itv.png".to_string()),
                },
            ]
        );
        assert_eq!(resolved.final_ids(0, "bbc1"), ["BBC1.uk"]);
        assert_eq!(resolved.final_ids(0, "itv"), ["itv"]);
    }

    #[test]
    fn test_source_file_restricts_lookup() {
        let docs = vec![
            document("/data/es.xml", vec![channel("la1", "La 1", None)]),
            document("/data/uk.xml", vec![channel("la1.uk", "La 1", None)]),
        ];
        let filter = filter(r#"{"channels": {"La 1": "uk.xml"}}"#);
        let mut report = ValidationReport::default();
        let resolved = resolve_channels(&filter, &docs, &[], &mut report).unwrap();

        assert!(resolved.final_ids(0, "la1").is_empty());
        assert_eq!(resolved.final_ids(1, "la1.uk"), ["la1.uk"]);
    }

    #[test]
    fn test_channel_id_fallback() {
        let docs = vec![document("/data/uk.xml", vec![channel("bbc1.uk", "BBC One", None)])];
        let filter = filter(r#"["bbc1.uk"]"#);
        let mut report = ValidationReport::default();
        let resolved = resolve_channels(&filter, &docs, &[], &mut report).unwrap();
        assert_eq!(resolved.final_ids(0, "bbc1.uk"), ["bbc1.uk"]);
        assert_eq!(report.source(ANY_SOURCE).unwrap().found_count, 1);
    }

    #[test]
    fn test_one_source_channel_routed_to_every_output_id() {
        let mut bbc = channel("bbc1", "BBC One", None);
        bbc.display_names.push("BBC 1".to_string());
        let docs = vec![document("/data/uk.xml", vec![bbc])];
        let filter = filter(
            r#"{"channels": {
                "BBC One": {"source_file": "uk.xml", "output_id": "one"},
                "BBC 1": {"source_file": "uk.xml", "output_id": "uno"}
            }}"#,
        );
        let mut report = ValidationReport::default();

        let resolved = resolve_channels(&filter, &docs, &[], &mut report).unwrap();
        assert_eq!(resolved.channels.len(), 2);
        // Entries resolve in display-name order
        assert_eq!(resolved.final_ids(0, "bbc1"), ["uno", "one"]);
        assert_eq!(report.source("uk.xml").unwrap().found_count, 2);
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let docs = vec![document("/data/uk.xml", vec![channel("bbc1", "BBC One", None)])];
        let filter = filter(r#"["bbc one"]"#);
        let mut report = ValidationReport::default();
        let resolved = resolve_channels(&filter, &docs, &[], &mut report).unwrap();
        assert!(resolved.channels.is_empty());
        assert_eq!(report.source(ANY_SOURCE).unwrap().missing, vec!["bbc one"]);
    }

    #[test]
    fn test_ambiguous_display_name_excluded() {
        let docs = vec![document(
            "/data/uk.xml",
            vec![channel("news.1", "News", None), channel("news.2", "News", None)],
        )];
        let filter = filter(r#"{"channels": {"News": "uk.xml"}}"#);
        let mut report = ValidationReport::default();
        let resolved = resolve_channels(&filter, &docs, &[], &mut report).unwrap();

        assert!(resolved.channels.is_empty());
        let source = report.source("uk.xml").unwrap();
        assert_eq!(source.found_count, 0);
        assert!(source.missing.is_empty());
        assert_eq!(source.ambiguous[0].channel_ids, vec!["news.1", "news.2"]);
    }

    #[test]
    fn test_unsourced_entry_collapses_across_sources() {
        let docs = vec![
            document("/data/a.xml", vec![channel("bbc1", "BBC One", Some("http://a/logo.png"))]),
            document("/data/b.xml", vec![channel("bbc1", "BBC One", Some("http://b/logo.png"))]),
            document("/data/c.xml", vec![channel("BBCOne", "BBC One", None)]),
        ];
        let filter = filter(r#"{"channels": ["BBC One"]}"#);
        let mut report = ValidationReport::default();
        let resolved = resolve_channels(&filter, &docs, &[], &mut report).unwrap();

        assert_eq!(resolved.channels.len(), 1);
        assert_eq!(resolved.channels[0].icon.as_deref(), Some("http://a/logo.png"));
        assert_eq!(resolved.final_ids(0, "bbc1"), ["bbc1"]);
        assert_eq!(resolved.final_ids(1, "bbc1"), ["bbc1"]);
        assert!(resolved.final_ids(2, "BBCOne").is_empty());
    }

    #[test]
    fn test_collision_between_entries_is_error() {
        let docs = vec![document(
            "/data/uk.xml",
            vec![channel("bbc1", "BBC One", None), channel("bbc1hd", "BBC One HD", None)],
        )];
        let filter = filter(
            r#"{"channels": {
                "BBC One": {"source_file": "uk.xml"},
                "BBC One HD": {"source_file": "uk.xml", "output_id": "bbc1"}
            }}"#,
        );
        let mut report = ValidationReport::default();
        let err = resolve_channels(&filter, &docs, &[], &mut report).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutputIdCollision { ref output_id, .. } if output_id == "bbc1"
        ));
    }

    #[test]
    fn test_include_all_unions_sources() {
        let docs = vec![
            document(
                "/data/a.xml",
                vec![channel("x", "X", Some("http://a/x.png")), channel("y", "Y", None)],
            ),
            document("/data/b.xml", vec![channel("x", "X again", None), channel("z", "Z", None)]),
        ];
        let mut report = ValidationReport::default();
        let resolved =
            resolve_channels(&ChannelFilter::IncludeAll, &docs, &[], &mut report).unwrap();

        let ids: Vec<&str> = resolved.channels.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y", "z"]);
        assert_eq!(resolved.channels[0].icon.as_deref(), Some("http://a/x.png"));
        assert_eq!(resolved.final_ids(1, "x"), ["x"]);
        assert_eq!(report.source("b.xml").unwrap().found_count, 2);
    }

    #[test]
    fn test_load_failure_reported_under_configured_name() {
        let docs = vec![];
        let failures = vec![LoadFailure {
            path: "/data/uk.xml.gz".into(),
            message: "Document has no <tv> root element".to_string(),
        }];
        let filter = filter(r#"{"channels": {"A": "uk.xml"}}"#);
        let mut report = ValidationReport::default();
        resolve_channels(&filter, &docs, &failures, &mut report).unwrap();

        let source = report.source("uk.xml").unwrap();
        assert_eq!(source.missing, vec!["A"]);
        assert!(source.load_error.as_deref().unwrap().contains("<tv>"));
    }
}
