//! Channel filter configuration
//!
//! A filter file comes in one of several shapes. They are detected once
//! ([`ConfigShape::detect`]) and resolved into a single [`MergeConfig`]:
//! a channel mapping (or "include all") plus a registry of downloadable
//! sources.

use crate::error::ConfigError;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Raw filter file contents, classified by structure
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigShape {
    /// `{"channels": {"Name": "file.xml" | {...}}, "sources": {...}}`
    Advanced {
        channels: Map<String, Value>,
        sources: Option<Value>,
    },
    /// `{"channels": ["Name", ...]}` (also the legacy flat `{"k": "Name"}` form)
    SimpleList {
        names: Vec<Value>,
        sources: Option<Value>,
    },
    /// `["Name", ...]`
    BareArray(Vec<Value>),
    /// One name per line
    PlainText(Vec<String>),
}

impl ConfigShape {
    /// Classify raw filter file contents.
    ///
    /// Anything that is not a JSON array or object is read as plain text,
    /// so a one-line list such as `24h` or `42` is not misread as JSON.
    pub fn detect(content: &str) -> Result<Self, ConfigError> {
        let value = match serde_json::from_str::<Value>(content) {
            Ok(value @ (Value::Array(_) | Value::Object(_))) => value,
            _ => return Ok(Self::plain_text(content)),
        };

        match value {
            Value::Array(names) => Ok(ConfigShape::BareArray(names)),
            Value::Object(mut object) => {
                let sources = object.remove("sources");
                match object.remove("channels") {
                    Some(Value::Object(channels)) => Ok(ConfigShape::Advanced { channels, sources }),
                    Some(Value::Array(names)) => Ok(ConfigShape::SimpleList { names, sources }),
                    Some(other) => Err(ConfigError::InvalidShape(format!(
                        "'channels' must be an object or a list, found {}",
                        json_kind(&other)
                    ))),
                    None => {
                        let names: Vec<Value> = object.into_iter().map(|(_, v)| v).collect();
                        if !names.is_empty() && names.iter().all(Value::is_string) {
                            Ok(ConfigShape::SimpleList { names, sources })
                        } else {
                            Err(ConfigError::InvalidShape(
                                "JSON must be a list of channel names or an object with a 'channels' key"
                                    .to_string(),
                            ))
                        }
                    }
                }
            }
            _ => Ok(Self::plain_text(content)),
        }
    }

    fn plain_text(content: &str) -> Self {
        ConfigShape::PlainText(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// One requested channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMappingEntry {
    /// Display name to look for in the source documents
    pub display_name: String,
    /// Source file the channel must come from; `None` means any source
    pub source_file: Option<String>,
    /// Channel id to use in the output; defaults to the source channel id
    pub output_id: Option<String>,
    /// Channel logo replacing the source one
    pub icon_override: Option<String>,
}

impl ChannelMappingEntry {
    pub fn named(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            source_file: None,
            output_id: None,
            icon_override: None,
        }
    }
}

/// Object form of an advanced channel entry
#[derive(Debug, Deserialize)]
struct ChannelEntryObject {
    #[serde(default)]
    source_file: Option<String>,
    #[serde(default)]
    output_id: Option<String>,
    #[serde(default)]
    icon: Option<String>,
}

/// Canonical channel mapping, keyed by display name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMapping {
    entries: BTreeMap<String, ChannelMappingEntry>,
}

impl ChannelMapping {
    /// Build a mapping, rejecting explicit output id collisions.
    pub fn new(entries: impl IntoIterator<Item = ChannelMappingEntry>) -> Result<Self, ConfigError> {
        let mut mapping = BTreeMap::new();
        for entry in entries {
            mapping.insert(entry.display_name.clone(), entry);
        }

        let mut claimed: HashMap<&str, &str> = HashMap::new();
        for entry in mapping.values() {
            if let Some(output_id) = entry.output_id.as_deref() {
                if let Some(first) = claimed.insert(output_id, &entry.display_name) {
                    return Err(ConfigError::OutputIdCollision {
                        output_id: output_id.to_string(),
                        first: first.to_string(),
                        second: entry.display_name.clone(),
                    });
                }
            }
        }

        Ok(Self { entries: mapping })
    }

    /// Mapping without per-channel configuration
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: names
                .into_iter()
                .map(|name| {
                    let entry = ChannelMappingEntry::named(name);
                    (entry.display_name.clone(), entry)
                })
                .collect(),
        }
    }

    /// Entries in display-name order
    pub fn entries(&self) -> impl Iterator<Item = &ChannelMappingEntry> {
        self.entries.values()
    }

    pub fn get(&self, display_name: &str) -> Option<&ChannelMappingEntry> {
        self.entries.get(display_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Which channels a run keeps
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelFilter {
    /// Every channel of every loaded source
    IncludeAll,
    Mapping(ChannelMapping),
}

/// How a registered source is compressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionHint {
    /// Decide from the URL suffix and the payload's magic bytes
    #[default]
    Auto,
    Gzip,
    Plain,
}

/// Where a source file can be downloaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub url: String,
    pub compression: CompressionHint,
}

/// Source file name -> download location
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRegistry {
    sources: BTreeMap<String, SourceEntry>,
}

impl SourceRegistry {
    fn from_value(value: Option<Value>) -> Self {
        let mut registry = Self::default();
        let Some(value) = value else {
            return registry;
        };
        let Value::Object(entries) = value else {
            warn!("Ignoring 'sources': expected an object, found {}", json_kind(&value));
            return registry;
        };

        for (file, config) in entries {
            let entry = match config {
                Value::String(url) => SourceEntry {
                    url,
                    compression: CompressionHint::Auto,
                },
                Value::Object(ref object) => match object.get("url").and_then(Value::as_str) {
                    Some(url) => SourceEntry {
                        url: url.to_string(),
                        compression: match object.get("compressed").and_then(Value::as_bool) {
                            Some(true) => CompressionHint::Gzip,
                            Some(false) => CompressionHint::Plain,
                            None => CompressionHint::Auto,
                        },
                    },
                    None => {
                        warn!("Invalid source configuration for {}, skipping", file);
                        continue;
                    }
                },
                _ => {
                    warn!("Invalid source configuration for {}, skipping", file);
                    continue;
                }
            };
            registry.sources.insert(file, entry);
        }

        info!("Loaded {} source configurations", registry.sources.len());
        registry
    }

    pub fn insert(&mut self, file: impl Into<String>, entry: SourceEntry) {
        self.sources.insert(file.into(), entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SourceEntry)> {
        self.sources.iter()
    }

    pub fn get(&self, file: &str) -> Option<&SourceEntry> {
        self.sources.get(file)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Resolved configuration for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConfig {
    pub filter: ChannelFilter,
    pub sources: SourceRegistry,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self::include_all()
    }
}

impl MergeConfig {
    /// Keep every channel of every source
    pub fn include_all() -> Self {
        Self {
            filter: ChannelFilter::IncludeAll,
            sources: SourceRegistry::default(),
        }
    }

    /// Parse raw filter file contents
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Self::from_shape(ConfigShape::detect(content.trim())?)
    }

    /// Load a filter file. A missing file means "include all".
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!(
                "Channel filter file '{}' not found, including all channels",
                path.display()
            );
            return Ok(Self::include_all());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Resolve a classified shape into the canonical mapping
    pub fn from_shape(shape: ConfigShape) -> Result<Self, ConfigError> {
        let (mapping, sources) = match shape {
            ConfigShape::Advanced { channels, sources } => {
                let entries = channels
                    .into_iter()
                    .map(|(display_name, value)| advanced_entry(display_name, value))
                    .collect::<Result<Vec<_>, _>>()?;
                (ChannelMapping::new(entries)?, sources)
            }
            ConfigShape::SimpleList { names, sources } => (names_mapping(names)?, sources),
            ConfigShape::BareArray(names) => (names_mapping(names)?, None),
            ConfigShape::PlainText(lines) => (ChannelMapping::from_names(lines), None),
        };

        let sources = SourceRegistry::from_value(sources);
        let filter = if mapping.is_empty() {
            ChannelFilter::IncludeAll
        } else {
            info!("Loaded {} channel filters", mapping.len());
            ChannelFilter::Mapping(mapping)
        };

        Ok(Self { filter, sources })
    }

    /// Source files the mapping explicitly requests channels from
    pub fn requested_sources(&self) -> BTreeSet<&str> {
        match &self.filter {
            ChannelFilter::IncludeAll => BTreeSet::new(),
            ChannelFilter::Mapping(mapping) => mapping
                .entries()
                .filter_map(|e| e.source_file.as_deref())
                .collect(),
        }
    }
}

fn advanced_entry(display_name: String, value: Value) -> Result<ChannelMappingEntry, ConfigError> {
    match value {
        Value::String(source_file) => Ok(ChannelMappingEntry {
            display_name,
            source_file: Some(source_file),
            output_id: None,
            icon_override: None,
        }),
        Value::Object(_) => {
            let object: ChannelEntryObject =
                serde_json::from_value(value).map_err(|e| ConfigError::InvalidChannelEntry {
                    display_name: display_name.clone(),
                    message: e.to_string(),
                })?;
            Ok(ChannelMappingEntry {
                display_name,
                source_file: object.source_file.filter(|s| !s.is_empty()),
                output_id: object.output_id.filter(|s| !s.is_empty()),
                icon_override: object.icon.filter(|s| !s.is_empty()),
            })
        }
        other => Err(ConfigError::InvalidChannelEntry {
            message: format!(
                "expected a source file name or an object, found {}",
                json_kind(&other)
            ),
            display_name,
        }),
    }
}

fn names_mapping(names: Vec<Value>) -> Result<ChannelMapping, ConfigError> {
    let names = names
        .into_iter()
        .map(|value| match value {
            Value::String(name) => Ok(name),
            other => Err(ConfigError::InvalidShape(format!(
                "channel list entries must be strings, found {}",
                json_kind(&other)
            ))),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ChannelMapping::from_names(names))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(config: &MergeConfig) -> &ChannelMapping {
        match &config.filter {
            ChannelFilter::Mapping(mapping) => mapping,
            ChannelFilter::IncludeAll => panic!("expected a channel mapping"),
        }
    }

    #[test]
    fn test_detect_shapes() {
        assert!(matches!(
            ConfigShape::detect(r#"{"channels": {"A": "a.xml"}}"#).unwrap(),
            ConfigShape::Advanced { .. }
        ));
        assert!(matches!(
            ConfigShape::detect(r#"{"channels": ["A"]}"#).unwrap(),
            ConfigShape::SimpleList { .. }
        ));
        assert!(matches!(
            ConfigShape::detect(r#"["A", "B"]"#).unwrap(),
            ConfigShape::BareArray(_)
        ));
        assert_eq!(
            ConfigShape::detect("A\n\n  B  \n").unwrap(),
            ConfigShape::PlainText(vec!["A".to_string(), "B".to_string()])
        );
    }

    #[test]
    fn test_json_scalar_is_plain_text() {
        assert_eq!(
            ConfigShape::detect("42").unwrap(),
            ConfigShape::PlainText(vec!["42".to_string()])
        );
    }

    #[test]
    fn test_invalid_channels_value() {
        let err = ConfigShape::detect(r#"{"channels": 3}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidShape(_)));
    }

    #[test]
    fn test_object_without_channels() {
        let config = MergeConfig::parse(r#"{"a": "BBC One", "b": "ITV"}"#).unwrap();
        let mapping = mapping(&config);
        assert_eq!(mapping.len(), 2);
        assert!(mapping.get("ITV").is_some());

        let err = MergeConfig::parse(r#"{"a": 1}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidShape(_)));
    }

    #[test]
    fn test_advanced_entries() {
        let config = MergeConfig::parse(
            r#"{
                "sources": {
                    "es.xml": "https://example.com/es.xml.gz",
                    "uk.xml": {"url": "https://example.com/uk.xml", "compressed": false},
                    "bad.xml": 7
                },
                "channels": {
                    "La 1": "es.xml",
                    "BBC One": {"source_file": "uk.xml", "output_id": "bbc1", "icon": "http://logo/bbc.png"}
                }
            }"#,
        )
        .unwrap();

        let mapping = mapping(&config);
        let la1 = mapping.get("La 1").unwrap();
        assert_eq!(la1.source_file.as_deref(), Some("es.xml"));
        assert_eq!(la1.output_id, None);

        let bbc = mapping.get("BBC One").unwrap();
        assert_eq!(bbc.output_id.as_deref(), Some("bbc1"));
        assert_eq!(bbc.icon_override.as_deref(), Some("http://logo/bbc.png"));

        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources.get("es.xml").unwrap().compression, CompressionHint::Auto);
        assert_eq!(config.sources.get("uk.xml").unwrap().compression, CompressionHint::Plain);
        assert_eq!(
            config.requested_sources().into_iter().collect::<Vec<_>>(),
            vec!["es.xml", "uk.xml"]
        );
    }

    #[test]
    fn test_invalid_channel_entry() {
        let err = MergeConfig::parse(r#"{"channels": {"A": 5}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidChannelEntry { ref display_name, .. } if display_name == "A"));

        let err = MergeConfig::parse(r#"{"channels": {"A": {"output_id": 5}}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidChannelEntry { .. }));

        let err = MergeConfig::parse(r#"["A", 2]"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidShape(_)));
    }

    #[test]
    fn test_output_id_collision() {
        let err = MergeConfig::parse(
            r#"{"channels": {
                "BBC One": {"source_file": "uk.xml", "output_id": "bbc"},
                "BBC One HD": {"source_file": "uk.xml", "output_id": "bbc"}
            }}"#,
        )
        .unwrap_err();
        match err {
            ConfigError::OutputIdCollision { output_id, first, second } => {
                assert_eq!(output_id, "bbc");
                assert_eq!(first, "BBC One");
                assert_eq!(second, "BBC One HD");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_list_includes_all() {
        assert_eq!(MergeConfig::parse("[]").unwrap().filter, ChannelFilter::IncludeAll);
        assert_eq!(MergeConfig::parse("").unwrap().filter, ChannelFilter::IncludeAll);
    }

    #[test]
    fn test_missing_file_includes_all() {
        let config = MergeConfig::load(Path::new("/nonexistent/channels.json")).unwrap();
        assert_eq!(config, MergeConfig::include_all());
    }

    #[test]
    fn test_plain_text_dedupes_names() {
        let config = MergeConfig::parse("BBC One\nITV\nBBC One\n").unwrap();
        let names: Vec<_> = mapping(&config).entries().map(|e| e.display_name.as_str()).collect();
        assert_eq!(names, vec!["BBC One", "ITV"]);
    }
}
