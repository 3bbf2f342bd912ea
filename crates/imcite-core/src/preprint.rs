//! Preprint linking and citation-edge population
//!
//! Two jobs on top of the academic-graph client: match a preprint to the
//! published version that superseded it (the strict title/author heuristic,
//! applied here and only here), and append `cites` edges for citations
//! resolvable against ledger records. A rate-limit or auth failure aborts
//! the remaining batch rather than silently skipping.

use std::collections::{HashMap, HashSet};

use imcite_domain::{normalize_arxiv, normalize_doi, relation, Edge, EdgeKey, Reference};
use strsim::jaro_winkler;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ledger::{Ledger, LedgerError};
use crate::sources::{ExternalId, GraphClient, PaperStub, SourceError};

/// Minimum normalized-title similarity for a published-version match.
pub const TITLE_MATCH_THRESHOLD: f64 = 0.85;

const AUTHOR_MATCH_THRESHOLD: f64 = 0.85;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("record not found in ledger: {id}")]
    RecordNotFound { id: String },

    #[error("record {id} has no identifier usable for lookup")]
    NoLookupId { id: String },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Check if two titles refer to the same work.
pub fn titles_match(a: &str, b: &str, threshold: f64) -> bool {
    title_similarity(a, b) >= threshold
}

/// Word-set Jaccard similarity over normalized titles.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let normalized_a = normalize_title(a);
    let normalized_b = normalize_title(b);
    let words_a: HashSet<&str> = normalized_a.split_whitespace().collect();
    let words_b: HashSet<&str> = normalized_b.split_whitespace().collect();

    let intersection = words_a.intersection(&words_b).count();
    let union = words_a.union(&words_b).count();
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_authors_agree(preprint: &Reference, candidate: &PaperStub) -> bool {
    match (
        preprint.first_author_last(),
        candidate.authors.first().map(|author| author.last.as_str()),
    ) {
        (Some(a), Some(b)) => {
            let a = a.to_lowercase();
            let b = b.to_lowercase();
            a == b || jaro_winkler(&a, &b) >= AUTHOR_MATCH_THRESHOLD
        }
        // Unknown authorship on either side is not a disqualifier
        _ => true,
    }
}

fn years_compatible(preprint: &Reference, candidate: &PaperStub) -> bool {
    match (preprint.year(), candidate.year) {
        // Journals publish after the preprint, sometimes the year after
        (Some(a), Some(b)) => (b - a).abs() <= 1,
        _ => true,
    }
}

/// Find the published version of a preprint among provider candidates.
///
/// Stricter than import dedup: requires a DOI on the candidate, a fuzzy
/// title match, first-author agreement, and year proximity.
pub fn find_published_version<'a>(
    preprint: &Reference,
    candidates: &'a [PaperStub],
) -> Option<&'a PaperStub> {
    candidates.iter().find(|candidate| {
        candidate.doi.is_some()
            && titles_match(&preprint.title, &candidate.title, TITLE_MATCH_THRESHOLD)
            && first_authors_agree(preprint, candidate)
            && years_compatible(preprint, candidate)
    })
}

/// Resolve a preprint's published version via title search and record its
/// DOI in the `supersedes` field. Returns the DOI when a match was found.
pub async fn resolve_supersedes(
    client: &GraphClient,
    ledger: &Ledger,
    id: &str,
) -> Result<Option<String>, LinkError> {
    let mut references = ledger.read_all()?;
    let position = references
        .iter()
        .position(|reference| reference.id == id)
        .ok_or_else(|| LinkError::RecordNotFound { id: id.to_string() })?;

    if let Some(existing) = &references[position].supersedes {
        return Ok(Some(existing.clone()));
    }

    let candidates = client.search(&references[position].title, 10).await?;
    let matched = match find_published_version(&references[position], &candidates) {
        Some(candidate) => candidate,
        None => {
            debug!(id, "no published version found");
            return Ok(None);
        }
    };
    let doi = matched
        .doi
        .as_deref()
        .map(normalize_doi)
        .unwrap_or_default();

    info!(id, doi = %doi, "preprint superseded by published version");
    references[position].supersedes = Some(doi.clone());
    ledger.write_all(&references)?;
    Ok(Some(doi))
}

/// Append `cites` edges for one record's citations and references, matched
/// against the ledger by DOI or arXiv id. Returns the number of edges
/// appended; already-present edges are not duplicated.
pub async fn link_citations(
    client: &GraphClient,
    ledger: &Ledger,
    id: &str,
) -> Result<usize, LinkError> {
    let references = ledger.read_all()?;
    let record = references
        .iter()
        .find(|reference| reference.id == id)
        .ok_or_else(|| LinkError::RecordNotFound { id: id.to_string() })?;
    let lookup = ExternalId::for_reference(record)
        .ok_or_else(|| LinkError::NoLookupId { id: id.to_string() })?;

    let cited = client.references(&lookup).await?;
    let citing = client.citations(&lookup).await?;

    let mut known: HashSet<EdgeKey> = ledger
        .read_all_edges()?
        .iter()
        .map(Edge::key)
        .collect();
    let by_identifier = identifier_map(&references);

    let mut appended = 0;
    for stub in &cited {
        if let Some(target) = match_stub(&by_identifier, stub) {
            appended += append_once(ledger, &mut known, Edge::new(id, target, relation::CITES))?;
        }
    }
    for stub in &citing {
        if let Some(source) = match_stub(&by_identifier, stub) {
            appended += append_once(ledger, &mut known, Edge::new(source, id, relation::CITES))?;
        }
    }

    debug!(id, appended, "linked citations");
    Ok(appended)
}

/// Where a batch link run stopped early.
#[derive(Debug)]
pub struct BatchAbort {
    pub id: String,
    pub error: SourceError,
}

/// Summary of a batch link run. `aborted` carries the collaborator failure
/// that stopped the remaining batch, if any.
#[derive(Debug, Default)]
pub struct BatchLinkOutcome {
    /// Records successfully processed.
    pub linked: usize,
    /// Edges appended in total.
    pub appended: usize,
    pub aborted: Option<BatchAbort>,
}

/// Link citations for every record with a usable identifier.
///
/// A not-found response skips just that record; a rate-limit or auth
/// failure aborts the remaining batch, and the outcome reports what was
/// linked before the abort.
pub async fn link_all(client: &GraphClient, ledger: &Ledger) -> Result<BatchLinkOutcome, LinkError> {
    let references = ledger.read_all()?;
    let mut outcome = BatchLinkOutcome::default();

    for reference in &references {
        if ExternalId::for_reference(reference).is_none() {
            continue;
        }
        match link_citations(client, ledger, &reference.id).await {
            Ok(appended) => {
                outcome.linked += 1;
                outcome.appended += appended;
            }
            Err(LinkError::Source(SourceError::NotFound { id })) => {
                debug!(record = %reference.id, lookup = %id, "not known to the provider");
            }
            Err(LinkError::Source(
                error @ (SourceError::RateLimited { .. } | SourceError::Auth { .. }),
            )) => {
                warn!(record = %reference.id, %error, "aborting remaining link batch");
                outcome.aborted = Some(BatchAbort {
                    id: reference.id.clone(),
                    error,
                });
                break;
            }
            Err(other) => return Err(other),
        }
    }

    info!(
        linked = outcome.linked,
        appended = outcome.appended,
        aborted = outcome.aborted.is_some(),
        "link batch complete"
    );
    Ok(outcome)
}

fn append_once(
    ledger: &Ledger,
    known: &mut HashSet<EdgeKey>,
    edge: Edge,
) -> Result<usize, LinkError> {
    if !known.insert(edge.key()) {
        return Ok(0);
    }
    ledger.append_edge(&edge)?;
    Ok(1)
}

fn identifier_map(references: &[Reference]) -> HashMap<String, &str> {
    let mut map = HashMap::new();
    for reference in references {
        if let Some(doi) = reference.normalized_doi() {
            map.insert(format!("doi:{}", doi), reference.id.as_str());
        }
        if let Some(arxiv) = reference.normalized_arxiv() {
            map.insert(format!("arxiv:{}", arxiv), reference.id.as_str());
        }
    }
    map
}

fn match_stub<'a>(by_identifier: &HashMap<String, &'a str>, stub: &PaperStub) -> Option<&'a str> {
    if let Some(doi) = stub.doi.as_deref() {
        if let Some(id) = by_identifier.get(&format!("doi:{}", normalize_doi(doi))) {
            return Some(id);
        }
    }
    if let Some(arxiv) = stub.arxiv_id.as_deref() {
        if let Some(id) = by_identifier.get(&format!("arxiv:{}", normalize_arxiv(arxiv))) {
            return Some(id);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use imcite_domain::{Author, PartialDate};

    fn preprint(title: &str, author: &str, year: i32) -> Reference {
        let mut reference = Reference::new("Pre2024", title);
        reference.authors = vec![Author::new(author)];
        reference.published = Some(PartialDate::year(year));
        reference
    }

    fn candidate(title: &str, author: &str, year: i32, doi: Option<&str>) -> PaperStub {
        PaperStub {
            paper_id: "p".to_string(),
            title: title.to_string(),
            authors: vec![Author::new(author)],
            year: Some(year),
            doi: doi.map(|value| value.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_title_similarity() {
        assert!(titles_match(
            "Dark Matter in Galaxy Clusters",
            "Dark matter in galaxy clusters",
            TITLE_MATCH_THRESHOLD
        ));
        assert!(!titles_match(
            "Dark Matter in Galaxy Clusters",
            "Stellar Populations of the Milky Way",
            TITLE_MATCH_THRESHOLD
        ));
    }

    #[test]
    fn published_match_requires_doi() {
        let pre = preprint("Cosmic Voids and Structure", "Smith", 2023);
        let candidates = vec![candidate("Cosmic Voids and Structure", "Smith", 2023, None)];
        assert!(find_published_version(&pre, &candidates).is_none());
    }

    #[test]
    fn published_match_accepts_fuzzy_author() {
        let pre = preprint("Cosmic Voids and Structure", "Smith", 2023);
        let candidates = vec![candidate(
            "Cosmic Voids and Structure",
            "Smithe",
            2024,
            Some("10.1/x"),
        )];
        let matched = find_published_version(&pre, &candidates).unwrap();
        assert_eq!(matched.doi.as_deref(), Some("10.1/x"));
    }

    #[test]
    fn published_match_rejects_different_author() {
        let pre = preprint("Cosmic Voids and Structure", "Smith", 2023);
        let candidates = vec![candidate(
            "Cosmic Voids and Structure",
            "Nakamura",
            2023,
            Some("10.1/x"),
        )];
        assert!(find_published_version(&pre, &candidates).is_none());
    }

    #[test]
    fn published_match_rejects_distant_year() {
        let pre = preprint("Cosmic Voids and Structure", "Smith", 2019);
        let candidates = vec![candidate(
            "Cosmic Voids and Structure",
            "Smith",
            2024,
            Some("10.1/x"),
        )];
        assert!(find_published_version(&pre, &candidates).is_none());
    }

    #[test]
    fn match_stub_by_doi_and_arxiv() {
        let mut first = Reference::new("A", "One");
        first.identifiers.doi = Some("10.1/x".to_string());
        let mut second = Reference::new("B", "Two");
        second.identifiers.arxiv = Some("2301.12345".to_string());
        let references = vec![first, second];
        let map = identifier_map(&references);

        let by_doi = PaperStub {
            doi: Some("https://doi.org/10.1/X".to_string()),
            ..Default::default()
        };
        assert_eq!(match_stub(&map, &by_doi), Some("A"));

        let by_arxiv = PaperStub {
            arxiv_id: Some("2301.12345v2".to_string()),
            ..Default::default()
        };
        assert_eq!(match_stub(&map, &by_arxiv), Some("B"));

        let unknown = PaperStub {
            doi: Some("10.9/zzz".to_string()),
            ..Default::default()
        };
        assert_eq!(match_stub(&map, &unknown), None);
    }
}
