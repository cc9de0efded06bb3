//! Metadata extraction from programme descriptions
//!
//! Some providers pack credits, country, year, genre and audience rating into
//! the description text instead of dedicated elements:
//!
//! ```text
//! Drama | 2019 | +12
//! · Una familia se enfrenta a un verano inolvidable en la costa.
//! · Dirección: Pedro Almodóvar. Reparto: Antonio Banderas, Penélope Cruz.
//! · País: España
//! ```
//!
//! When any line starts with `·` the description is in this bullet layout
//! and only bullet lines carry prose. Otherwise every line is prose except
//! metadata lines and a leading `genre | year | rating` summary.

use crate::models::{Credit, CreditRole};
use regex::Regex;
use std::sync::OnceLock;

const BULLET: char = '·';

/// Bullet lines this short are layout residue, not prose
const MIN_BULLET_PROSE_CHARS: usize = 16;

/// Values pulled out of a description
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptionInfo {
    /// Remaining prose, empty when nothing is left
    pub text: String,
    pub genre: Option<String>,
    pub year: Option<String>,
    pub rating: Option<String>,
    /// Raw credit strings; still need splitting into people
    pub credits: Vec<Credit>,
}

fn metadata_keyword() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(t[ií]tulo original|original title|productor ejecutivo|realizaci[oó]n|producci[oó]n|productora|production|producer|direcci[oó]n|direction|reparto|cast|gui[oó]n|script|m[uú]sica|music|presenta|presents|pa[ií]s|country|votos)\s*:",
        )
        .expect("valid regex")
    })
}

fn year() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("valid regex"))
}

fn keyword_role(keyword: &str) -> Option<CreditRole> {
    match keyword.to_lowercase().as_str() {
        "dirección" | "direccion" | "direction" => Some(CreditRole::Director),
        "reparto" | "cast" => Some(CreditRole::Actor),
        "guion" | "guión" | "script" => Some(CreditRole::Writer),
        "música" | "musica" | "music" => Some(CreditRole::Composer),
        "producción" | "produccion" | "production" | "producer" | "productor ejecutivo" => {
            Some(CreditRole::Producer)
        }
        "presenta" | "presents" => Some(CreditRole::Presenter),
        _ => None,
    }
}

/// Split a description into prose and embedded metadata
pub fn extract_info(desc: &str) -> DescriptionInfo {
    let mut info = DescriptionInfo::default();
    let bullet_layout = desc.lines().any(|l| l.trim_start().starts_with(BULLET));

    let mut prose: Vec<&str> = Vec::new();
    let mut first = true;

    for line in desc.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let is_first = std::mem::replace(&mut first, false);
        let (bullet, content) = match line.strip_prefix(BULLET) {
            Some(rest) => (true, rest.trim()),
            None => (false, line),
        };

        if !bullet && (is_first || bullet_layout) && is_summary(content) {
            read_summary(content, &mut info);
            continue;
        }

        let metadata_at = read_metadata(content, &mut info);
        let text = content[..metadata_at].trim_end_matches(|c: char| c.is_whitespace() || c == ',' || c == ';');
        if text.is_empty() {
            continue;
        }

        if bullet_layout {
            if bullet && text.chars().count() >= MIN_BULLET_PROSE_CHARS {
                prose.push(text);
            }
        } else {
            prose.push(text);
        }
    }

    info.text = prose.join(if bullet_layout { " " } else { "\n" });
    info
}

fn is_summary(line: &str) -> bool {
    line.contains('|') && line.chars().any(|c| c.is_ascii_digit())
}

/// `Drama | 2019 | +12`
fn read_summary(line: &str, info: &mut DescriptionInfo) {
    for (i, part) in line.split('|').map(str::trim).enumerate() {
        if info.year.is_none() {
            if let Some(found) = year().find(part) {
                info.year = Some(found.as_str().to_string());
            }
        }

        let has_digit = part.chars().any(|c| c.is_ascii_digit());
        if part.contains('+') && has_digit {
            info.rating = Some(part.to_string());
        }

        if i == 0 && info.genre.is_none() && !part.is_empty() && !has_digit && !part.contains('+') {
            info.genre = Some(part.to_string());
        }
    }
}

/// Collect every `Keyword: value` run in `content`. Returns the byte offset
/// where metadata starts, or `content.len()` when there is none.
fn read_metadata(content: &str, info: &mut DescriptionInfo) -> usize {
    let found: Vec<(usize, usize, &str)> = metadata_keyword()
        .captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let keyword = caps.get(1)?;
            Some((whole.start(), whole.end(), keyword.as_str()))
        })
        .collect();

    for (i, &(_, value_start, keyword)) in found.iter().enumerate() {
        let value_end = found.get(i + 1).map_or(content.len(), |next| next.0);
        let value = content[value_start..value_end]
            .trim()
            .trim_end_matches(['.', ',', ';'])
            .trim_end();

        if let Some(role) = keyword_role(keyword) {
            if !value.is_empty() {
                info.credits.push(Credit::new(role, value));
            }
        }
    }

    found.first().map_or(content.len(), |first| first.0)
}
