//! Identifier normalization and cite-key generation
//!
//! DOIs and arXiv ids are normalized before any comparison; cite keys are
//! generated from author/year metadata with collision detection and
//! uniquification.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    // Matches the version suffix of an arXiv id ("v1", "v12", ...)
    static ref ARXIV_VERSION: Regex = Regex::new(r"v\d+$").unwrap();
}

/// Normalize a DOI for comparison.
///
/// Lower-cases and strips the common URL and `doi:` prefixes so that
/// `https://doi.org/10.1234/TEST` and `10.1234/test` compare equal.
pub fn normalize_doi(doi: &str) -> String {
    doi.to_lowercase()
        .replace("https://dx.doi.org/", "")
        .replace("http://dx.doi.org/", "")
        .replace("https://doi.org/", "")
        .replace("http://doi.org/", "")
        .replace("doi:", "")
        .trim()
        .to_string()
}

/// Normalize an arXiv id for comparison (strip prefix and version suffix).
pub fn normalize_arxiv(arxiv: &str) -> String {
    let cleaned = arxiv
        .to_lowercase()
        .replace("arxiv:", "")
        .trim()
        .to_string();
    ARXIV_VERSION.replace(&cleaned, "").to_string()
}

/// Generate a cite key from a last name and a year, e.g. `Smith2024`.
///
/// The name is transliterated to ASCII alphanumerics; a missing year leaves
/// just the name, a missing name yields `Unknown`.
pub fn generate_cite_key(last_name: &str, year: Option<i32>) -> String {
    let mut key = normalize_for_key(last_name);
    if let Some(year) = year {
        key.push_str(&year.to_string());
    }
    if key.is_empty() {
        key = "Unknown".to_string();
    }
    key
}

/// Return `candidate` if it is free, else the first suffixed form that is.
///
/// Suffixes are tried in order: `a`..`z`, then `aa`..`zz`, then numbers.
pub fn generate_unique_id(existing: &HashSet<String>, candidate: &str) -> String {
    if !existing.contains(candidate) {
        return candidate.to_string();
    }

    for suffix in 'a'..='z' {
        let attempt = format!("{}{}", candidate, suffix);
        if !existing.contains(&attempt) {
            return attempt;
        }
    }

    for first in 'a'..='z' {
        for second in 'a'..='z' {
            let attempt = format!("{}{}{}", candidate, first, second);
            if !existing.contains(&attempt) {
                return attempt;
            }
        }
    }

    let mut counter = 2;
    loop {
        let attempt = format!("{}{}", candidate, counter);
        if !existing.contains(&attempt) {
            return attempt;
        }
        counter += 1;

        // Safety limit (shouldn't happen in practice)
        if counter > 10000 {
            return format!(
                "{}_{}",
                candidate,
                uuid::Uuid::new_v4()
                    .to_string()
                    .split('-')
                    .next()
                    .unwrap_or("x")
            );
        }
    }
}

/// Strip accents and non-alphanumerics for use inside a cite key.
fn normalize_for_key(s: &str) -> String {
    s.nfd().filter(|c| c.is_ascii_alphanumeric()).collect()
}
