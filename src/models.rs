//! Data models shared by the loader, resolver, normalizer and writer

use chrono::{DateTime, FixedOffset};
use std::path::{Path, PathBuf};

/// Text with an optional `lang` attribute (title, desc, category, ...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LangText {
    pub text: String,
    pub lang: Option<String>,
}

impl LangText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            lang: None,
        }
    }

    pub fn with_lang(text: impl Into<String>, lang: Option<&str>) -> Self {
        Self {
            text: text.into(),
            lang: lang.map(str::to_string),
        }
    }
}

/// Credit roles in XMLTV DTD order. The derived `Ord` is the output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CreditRole {
    Director,
    Actor,
    Writer,
    Adapter,
    Producer,
    Composer,
    Editor,
    Presenter,
    Commentator,
    Guest,
}

impl CreditRole {
    pub const ALL: [CreditRole; 10] = [
        CreditRole::Director,
        CreditRole::Actor,
        CreditRole::Writer,
        CreditRole::Adapter,
        CreditRole::Producer,
        CreditRole::Composer,
        CreditRole::Editor,
        CreditRole::Presenter,
        CreditRole::Commentator,
        CreditRole::Guest,
    ];

    /// Element name used inside `<credits>`
    pub fn tag(&self) -> &'static str {
        match self {
            CreditRole::Director => "director",
            CreditRole::Actor => "actor",
            CreditRole::Writer => "writer",
            CreditRole::Adapter => "adapter",
            CreditRole::Producer => "producer",
            CreditRole::Composer => "composer",
            CreditRole::Editor => "editor",
            CreditRole::Presenter => "presenter",
            CreditRole::Commentator => "commentator",
            CreditRole::Guest => "guest",
        }
    }

    pub fn from_tag(tag: &[u8]) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.tag().as_bytes() == tag)
    }
}

/// A single person in a programme's credits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credit {
    pub role: CreditRole,
    pub name: String,
    /// Character played (`role` attribute on `<actor>`)
    pub character: Option<String>,
}

impl Credit {
    pub fn new(role: CreditRole, name: impl Into<String>) -> Self {
        Self {
            role,
            name: name.into(),
            character: None,
        }
    }
}

/// Content rating, e.g. `{system: "MPAA", value: "PG-13"}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rating {
    pub system: Option<String>,
    pub value: String,
}

/// `<episode-num system="...">` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeNum {
    pub value: String,
    pub system: Option<String>,
}

/// Channel as declared by a source document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRecord {
    /// Channel id, unique within its source document
    pub id: String,
    pub display_names: Vec<String>,
    /// Channel logo URL
    pub icon: Option<String>,
}

/// Programme as declared by a source document. Timestamps are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgrammeRecord {
    pub channel_id: String,
    pub start: Option<String>,
    pub stop: Option<String>,
    pub title: Option<LangText>,
    pub sub_title: Option<LangText>,
    pub description: Option<LangText>,
    pub categories: Vec<LangText>,
    pub credits: Vec<Credit>,
    pub date: Option<String>,
    pub episode_num: Option<EpisodeNum>,
    pub ratings: Vec<Rating>,
    /// Poster URL; never carried into the output
    pub icon: Option<String>,
}

/// One parsed XMLTV input file
#[derive(Debug, Clone, Default)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub channels: Vec<ChannelRecord>,
    pub programmes: Vec<ProgrammeRecord>,
}

impl SourceDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// File name used to key this document in reports and configuration
    pub fn file_name(&self) -> String {
        file_name_of(&self.path)
    }

    /// Whether a configured `source_file` refers to this document.
    ///
    /// Accepts the exact file name, the name without a trailing `.gz`, and
    /// `<stem>.xml`.
    pub fn answers_to(&self, source_file: &str) -> bool {
        file_answers_to(&self.file_name(), source_file)
    }

    pub fn channel(&self, id: &str) -> Option<&ChannelRecord> {
        self.channels.iter().find(|c| c.id == id)
    }
}

/// Source-file matching rule shared by loaded and failed documents
pub(crate) fn file_answers_to(file_name: &str, source_file: &str) -> bool {
    if file_name == source_file {
        return true;
    }
    let plain = file_name.strip_suffix(".gz").unwrap_or(file_name);
    if plain == source_file {
        return true;
    }
    let stem = plain.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(plain);
    format!("{}.xml", stem) == source_file
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Channel in the merged output. Display names are always dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChannel {
    pub id: String,
    pub icon: Option<String>,
}

/// Normalized programme in the merged output. Posters are never carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputProgramme {
    pub channel_id: String,
    pub start: DateTime<FixedOffset>,
    pub stop: Option<DateTime<FixedOffset>>,
    pub title: LangText,
    pub sub_title: Option<LangText>,
    pub description: Option<LangText>,
    pub credits: Vec<Credit>,
    pub date: Option<String>,
    pub genres: Vec<LangText>,
    pub episode_num: Option<EpisodeNum>,
    pub ratings: Vec<Rating>,
}

/// The single document produced by a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedDocument {
    pub channels: Vec<OutputChannel>,
    pub programmes: Vec<OutputProgramme>,
}

impl MergedDocument {
    pub fn programme_count(&self) -> usize {
        self.programmes.len()
    }
}
