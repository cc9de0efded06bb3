//! Programme normalization
//!
//! Rewrites a source `ProgrammeRecord` into an `OutputProgramme`: canonical
//! timestamps, cleaned titles, mapped genres, split and ordered credits,
//! deduplicated ratings. Posters are never carried over.

mod credits;
mod dates;
mod description;
mod genres;


pub use credits::{normalize_credits, split_names};
pub use dates::{format_timestamp, parse_timestamp, CANONICAL_FORMAT};
pub use description::{extract_info, DescriptionInfo};
pub use genres::{canonical_genre, map_genre};

use crate::error::NormalizationError;
use crate::models::{EpisodeNum, LangText, OutputProgramme, ProgrammeRecord, Rating};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Language tag given to genres mapped through the synonym table
const MAPPED_GENRE_LANG: &str = "en";

fn season_episode_suffixes() -> &'static [Regex; 2] {
    static RE: OnceLock<[Regex; 2]> = OnceLock::new();
    RE.get_or_init(|| {
        [
            // "Serie - Stag. 2 Ep. 5"
            Regex::new(r"\s*-\s*Stag\.\s*\d+\s*Ep\.\s*\d+\s*$").expect("valid regex"),
            // "Serie T2 E5"
            Regex::new(r"\s*T\d+\s*E\d+\s*$").expect("valid regex"),
        ]
    })
}

/// Strip season/episode markers that belong in `episode-num`
pub fn clean_title(title: &str) -> String {
    let mut title = title.trim().to_string();
    for re in season_episode_suffixes() {
        title = re.replace(&title, "").into_owned();
    }
    title.trim().to_string()
}

/// Stateless programme normalizer
pub struct ProgrammeNormalizer;

impl ProgrammeNormalizer {
    /// Normalize one programme for the output channel `channel_id`
    pub fn normalize(
        record: &ProgrammeRecord,
        channel_id: &str,
    ) -> Result<OutputProgramme, NormalizationError> {
        let start = match record.start.as_deref() {
            Some(raw) => parse_timestamp(raw).ok_or_else(|| NormalizationError::InvalidTimestamp {
                field: "start",
                value: raw.to_string(),
            })?,
            None => return Err(NormalizationError::MissingStart),
        };

        let stop = match record.stop.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(parse_timestamp(raw).ok_or_else(|| {
                NormalizationError::InvalidTimestamp {
                    field: "stop",
                    value: raw.to_string(),
                }
            })?),
            None => None,
        };

        let title = record
            .title
            .as_ref()
            .map(|t| LangText {
                text: clean_title(&t.text),
                lang: t.lang.clone(),
            })
            .filter(|t| !t.text.is_empty())
            .ok_or(NormalizationError::MissingTitle)?;

        let info = record
            .description
            .as_ref()
            .map(|d| extract_info(&d.text))
            .unwrap_or_default();

        let description = record
            .description
            .as_ref()
            .filter(|_| !info.text.is_empty())
            .map(|d| LangText {
                text: info.text.clone(),
                lang: d.lang.clone(),
            });

        let episode_num = record
            .episode_num
            .as_ref()
            .map(|e| EpisodeNum {
                value: e.value.trim().to_string(),
                system: e.system.clone(),
            })
            .filter(|e| !e.value.is_empty());

        // A year found in the description stands in for a missing date,
        // unless the programme is an episode
        let date = trimmed(record.date.as_deref())
            .or_else(|| info.year.clone().filter(|_| episode_num.is_none()));

        let genres = if record.categories.is_empty() {
            normalize_genres(info.genre.iter().map(|g| LangText::new(g.as_str())))
        } else {
            normalize_genres(record.categories.iter().cloned())
        };

        let mut ratings = normalize_ratings(&record.ratings);
        if ratings.is_empty() {
            if let Some(value) = info.rating.clone() {
                ratings.push(Rating {
                    system: None,
                    value,
                });
            }
        }

        Ok(OutputProgramme {
            channel_id: channel_id.to_string(),
            start,
            stop,
            title,
            sub_title: record
                .sub_title
                .as_ref()
                .and_then(|s| {
                    trimmed(Some(s.text.as_str())).map(|text| LangText {
                        text,
                        lang: s.lang.clone(),
                    })
                }),
            description,
            credits: normalize_credits(&record.credits, &info.credits),
            date,
            genres,
            episode_num,
            ratings,
        })
    }
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Map through the synonym table and drop case-insensitive duplicates,
/// keeping the first spelling
pub fn normalize_genres(categories: impl IntoIterator<Item = LangText>) -> Vec<LangText> {
    let mut seen = HashSet::new();
    let mut genres = Vec::new();

    for category in categories {
        let text = category.text.trim();
        if text.is_empty() {
            continue;
        }
        let genre = match canonical_genre(text) {
            Some(mapped) => LangText::with_lang(mapped, Some(MAPPED_GENRE_LANG)),
            None => LangText::with_lang(text, category.lang.as_deref()),
        };
        if seen.insert(genre.text.to_lowercase()) {
            genres.push(genre);
        }
    }

    genres
}

/// Trim values, drop empty ones and exact duplicates. Distinct systems
/// stay as separate entries.
pub fn normalize_ratings(ratings: &[Rating]) -> Vec<Rating> {
    let mut out: Vec<Rating> = Vec::new();
    for rating in ratings {
        let value = rating.value.trim();
        if value.is_empty() {
            continue;
        }
        let normalized = Rating {
            system: trimmed(rating.system.as_deref()),
            value: value.to_string(),
        };
        if !out.contains(&normalized) {
            out.push(normalized);
        }
    }
    out
}
