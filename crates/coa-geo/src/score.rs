//! Approximate name matching.
//!
//! Equal normalized names score 1.0. An input whose words all appear in a
//! longer name ("Bolivia" in "Bolivia, Plurinational State of") scores just
//! under that, higher when it covers more of the name. Everything else is
//! Jaro-Winkler similarity.

use std::cmp::Ordering;

use rapidfuzz::distance::jaro_winkler;

/// Candidates scoring below this are not considered matches.
pub const MATCH_THRESHOLD: f64 = 0.9;

/// Inputs shorter than this never match by containment.
const MIN_CONTAINMENT_LEN: usize = 4;

/// Containment scores span `[CONTAINMENT_FLOOR, CONTAINMENT_CEIL]`.
const CONTAINMENT_FLOOR: f64 = 0.9;
const CONTAINMENT_CEIL: f64 = 0.99;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Contained,
    Similar,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NameScore {
    pub score: f64,
    pub kind: MatchKind,
}

impl NameScore {
    pub fn is_exact(&self) -> bool {
        self.kind == MatchKind::Exact
    }

    pub fn explain(&self) -> String {
        let percent = self.score * 100.0;
        match self.kind {
            MatchKind::Exact => "exact name".to_string(),
            MatchKind::Contained => format!("word containment: {percent:.0}%"),
            MatchKind::Similar => format!("name similarity: {percent:.0}%"),
        }
    }
}

/// Lowercases, turns separators into spaces and strips punctuation.
pub fn normalize(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace(['_', '-', '.', ',', '(', ')', '*', '\''], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Share of `haystack`'s words covered by `needle`, when every word of
/// `needle` appears in `haystack`.
fn word_coverage(haystack: &str, needle: &str) -> Option<f64> {
    let words: Vec<&str> = haystack.split(' ').collect();
    let needle: Vec<&str> = needle.split(' ').collect();
    if !needle.iter().all(|word| words.contains(word)) {
        return None;
    }
    let covered = words.iter().filter(|word| needle.contains(word)).count();
    Some(covered as f64 / words.len() as f64)
}

/// Scores `input` against a reference `candidate` name.
///
/// Only the input being part of the candidate counts as containment; a
/// candidate that is part of the input ("Guinea" in "Papua New Guinea
/// Highlands") is judged by similarity alone.
pub fn score(input: &str, candidate: &str) -> NameScore {
    let input = normalize(input);
    let candidate = normalize(candidate);
    if input.is_empty() || candidate.is_empty() {
        return NameScore {
            score: 0.0,
            kind: MatchKind::Similar,
        };
    }
    if input == candidate {
        return NameScore {
            score: 1.0,
            kind: MatchKind::Exact,
        };
    }
    if input.len() >= MIN_CONTAINMENT_LEN
        && let Some(coverage) = word_coverage(&candidate, &input)
    {
        return NameScore {
            score: CONTAINMENT_FLOOR + (CONTAINMENT_CEIL - CONTAINMENT_FLOOR) * coverage,
            kind: MatchKind::Contained,
        };
    }
    NameScore {
        score: jaro_winkler::similarity(input.chars(), candidate.chars()).min(CONTAINMENT_CEIL),
        kind: MatchKind::Similar,
    }
}

/// Ranking order: score descending, then name ascending.
pub fn rank(a: (f64, &str), b: (f64, &str)) -> Ordering {
    b.0.partial_cmp(&a.0)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.1.cmp(b.1))
}
