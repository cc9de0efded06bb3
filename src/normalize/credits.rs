//! Credit splitting and canonical ordering

use crate::models::{Credit, CreditRole};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// "Penélope Cruz y Antonio Banderas", "Juan e Ignacio", "Tom & Jerry"
fn conjunction() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s+(?:y|e|&)\s+").expect("valid regex"))
}

/// "Antonio Banderas (Zorro)"
fn played_character() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.+?)\s*\(([^()]+)\)$").expect("valid regex"))
}

/// Split a credit string naming several people into one name per person.
///
/// `y`/`e`/`&` separate the last two names of a comma or semicolon list.
/// Without a list they only separate full names of two or more words each,
/// so "Ana Belén y Javier Cámara" splits but "Juan y Medio" stays whole.
pub fn split_names(raw: &str) -> Vec<String> {
    let parts: Vec<&str> = raw
        .split([',', ';'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    let mut names: Vec<String> = Vec::with_capacity(parts.len() + 1);
    let Some((last, init)) = parts.split_last() else {
        return names;
    };
    names.extend(init.iter().map(|part| part.to_string()));

    let pieces: Vec<&str> = conjunction()
        .split(last)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect();
    let full_names = pieces.iter().all(|piece| piece.split_whitespace().count() >= 2);
    if init.is_empty() && !full_names {
        names.push(last.to_string());
    } else {
        names.extend(pieces.into_iter().map(str::to_string));
    }
    names
}

/// Merge source and extracted credits into canonical form.
///
/// Multi-person strings are split, `(character)` suffixes on actors become
/// the character, duplicates of the same `(role, name)` are dropped keeping
/// the first, and entries are ordered by role in DTD order.
pub fn normalize_credits(source: &[Credit], extracted: &[Credit]) -> Vec<Credit> {
    let mut seen: HashSet<(CreditRole, String)> = HashSet::new();
    let mut credits = Vec::new();

    for credit in source.iter().chain(extracted) {
        let names = split_names(&credit.name);
        let single = names.len() == 1;

        for name in names {
            let (name, character) = match split_character(credit.role, &name) {
                Some((name, character)) => (name, Some(character)),
                None => (name, if single { credit.character.clone() } else { None }),
            };
            if !seen.insert((credit.role, name.clone())) {
                continue;
            }
            credits.push(Credit {
                role: credit.role,
                name,
                character,
            });
        }
    }

    // Stable: keeps source order within a role
    credits.sort_by_key(|c| c.role);
    credits
}

fn split_character(role: CreditRole, name: &str) -> Option<(String, String)> {
    if role != CreditRole::Actor {
        return None;
    }
    let caps = played_character().captures(name)?;
    Some((caps[1].trim().to_string(), caps[2].trim().to_string()))
}
