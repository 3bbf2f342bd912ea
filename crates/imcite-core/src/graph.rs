//! Citation-graph integrity checking and grooming
//!
//! Edge validity is not enforced on write; this module scans the edge log
//! against the current reference ids and reports orphans, duplicate edges,
//! and duplicate DOIs. Repair is destructive and only ever runs through the
//! explicit [`groom_fix`] entry point.

use std::collections::{BTreeMap, HashSet};

use imcite_domain::{Edge, EdgeKey, Reference};
use thiserror::Error;
use tracing::{info, warn};

use crate::ledger::{Ledger, LedgerError};

#[derive(Error, Debug)]
pub enum GraphError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrphanReason {
    MissingSource,
    MissingTarget,
    MissingBoth,
}

impl OrphanReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrphanReason::MissingSource => "missing_source",
            OrphanReason::MissingTarget => "missing_target",
            OrphanReason::MissingBoth => "missing_both",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrphanedEdge {
    pub edge: Edge,
    pub reason: OrphanReason,
}

/// Partition edges into orphaned (an endpoint id is unknown) and valid.
pub fn detect_orphaned_edges(
    edges: &[Edge],
    valid_ids: &HashSet<String>,
) -> (Vec<OrphanedEdge>, Vec<Edge>) {
    let mut orphaned = Vec::new();
    let mut valid = Vec::new();

    for edge in edges {
        let source_ok = valid_ids.contains(&edge.source);
        let target_ok = valid_ids.contains(&edge.target);
        let reason = match (source_ok, target_ok) {
            (true, true) => {
                valid.push(edge.clone());
                continue;
            }
            (false, true) => OrphanReason::MissingSource,
            (true, false) => OrphanReason::MissingTarget,
            (false, false) => OrphanReason::MissingBoth,
        };
        orphaned.push(OrphanedEdge {
            edge: edge.clone(),
            reason,
        });
    }

    (orphaned, valid)
}

/// Edge keys appearing more than once, with their occurrence counts.
pub fn find_duplicate_edges(edges: &[Edge]) -> BTreeMap<EdgeKey, usize> {
    let mut counts: BTreeMap<EdgeKey, usize> = BTreeMap::new();
    for edge in edges {
        *counts.entry(edge.key()).or_insert(0) += 1;
    }
    counts.retain(|_, count| *count > 1);
    counts
}

/// Normalized DOIs shared by more than one record, with the record ids.
pub fn find_duplicate_dois(references: &[Reference]) -> BTreeMap<String, Vec<String>> {
    let mut by_doi: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for reference in references {
        if let Some(doi) = reference.normalized_doi() {
            by_doi.entry(doi).or_default().push(reference.id.clone());
        }
    }
    by_doi.retain(|_, ids| ids.len() > 1);
    by_doi
}

/// Structured result of an integrity scan.
#[derive(Clone, Debug, Default)]
pub struct IntegrityReport {
    pub orphaned: Vec<OrphanedEdge>,
    pub valid_edges: usize,
    pub duplicate_edges: BTreeMap<EdgeKey, usize>,
    pub duplicate_dois: BTreeMap<String, Vec<String>>,
    /// Orphaned edges removed from the log; nonzero only after a fix.
    pub removed: usize,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.orphaned.is_empty()
            && self.duplicate_edges.is_empty()
            && self.duplicate_dois.is_empty()
    }
}

/// Read-only integrity scan. Idempotent: running it twice over an unchanged
/// ledger produces identical reports.
pub fn check(ledger: &Ledger) -> Result<IntegrityReport, GraphError> {
    let references = ledger.read_all()?;
    let edges = ledger.read_all_edges()?;
    let (report, _) = scan(&references, &edges);
    Ok(report)
}

/// Explicit destructive repair: rewrite the edge log to contain only edges
/// whose endpoints exist. Duplicates are reported but left in place.
pub fn groom_fix(ledger: &Ledger) -> Result<IntegrityReport, GraphError> {
    let references = ledger.read_all()?;
    let edges = ledger.read_all_edges()?;
    let (mut report, valid) = scan(&references, &edges);

    if report.orphaned.is_empty() {
        info!("groom: edge log already clean");
        return Ok(report);
    }

    ledger.write_all_edges(&valid)?;
    report.removed = report.orphaned.len();
    warn!(
        removed = report.removed,
        remaining = valid.len(),
        "groom: removed orphaned edges"
    );
    Ok(report)
}

fn scan(references: &[Reference], edges: &[Edge]) -> (IntegrityReport, Vec<Edge>) {
    let valid_ids: HashSet<String> = references
        .iter()
        .map(|reference| reference.id.clone())
        .collect();
    let (orphaned, valid) = detect_orphaned_edges(edges, &valid_ids);
    let report = IntegrityReport {
        orphaned,
        valid_edges: valid.len(),
        duplicate_edges: find_duplicate_edges(edges),
        duplicate_dois: find_duplicate_dois(references),
        removed: 0,
    };
    (report, valid)
}
