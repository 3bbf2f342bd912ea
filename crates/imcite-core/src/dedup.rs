//! Dedup / import engine
//!
//! Classifies incoming candidate records against the ledger (and, within a
//! batch, against each other) to decide insert vs. merge vs. reject. A DOI
//! match always takes precedence over an id match.

use imcite_domain::Reference;
use thiserror::Error;
use tracing::{debug, info};

use crate::ledger::{Ledger, LedgerError};

#[derive(Error, Debug)]
pub enum DedupError {
    /// Every classified record must carry an identifier.
    #[error("candidate record has no id")]
    MissingId,

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Decision for one candidate record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    Insert,
    /// Merge into the working-set record at this index.
    Update { index: usize },
    Skip { reason: SkipReason },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// DOI matched a record inserted earlier in the same batch; there is no
    /// persisted row to update yet.
    DuplicateInBatch { index: usize },
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::DuplicateInBatch { .. } => "duplicate_in_batch",
        }
    }
}

/// A record in the import working set. Provisional records were inserted
/// earlier in the current batch and are not yet persisted.
#[derive(Clone, Debug)]
pub struct WorkingRecord {
    pub reference: Reference,
    pub provisional: bool,
}

impl WorkingRecord {
    pub fn persisted(reference: Reference) -> Self {
        Self {
            reference,
            provisional: false,
        }
    }

    pub fn provisional(reference: Reference) -> Self {
        Self {
            reference,
            provisional: true,
        }
    }
}

/// Classify a candidate against the working set.
///
/// Match order: normalized DOI first (precedence over id), then id, else
/// insert.
pub fn classify(
    working_set: &[WorkingRecord],
    candidate: &Reference,
) -> Result<Classification, DedupError> {
    if candidate.id.is_empty() {
        return Err(DedupError::MissingId);
    }

    if let Some(candidate_doi) = candidate.normalized_doi() {
        for (index, record) in working_set.iter().enumerate() {
            if record.reference.normalized_doi().as_deref() == Some(candidate_doi.as_str()) {
                return Ok(if record.provisional {
                    Classification::Skip {
                        reason: SkipReason::DuplicateInBatch { index },
                    }
                } else {
                    Classification::Update { index }
                });
            }
        }
    }

    if let Some(index) = working_set
        .iter()
        .position(|record| record.reference.id == candidate.id)
    {
        return Ok(Classification::Update { index });
    }

    Ok(Classification::Insert)
}

/// A candidate rejected during a batch import.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedRecord {
    pub id: String,
    pub reason: SkipReason,
}

/// Summary of one batch import.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: Vec<SkippedRecord>,
}

/// Import a batch of candidates into the ledger.
///
/// The working set starts from the persisted records and grows as candidates
/// are provisionally inserted, so later candidates in the batch are matched
/// against earlier ones. If any update occurred the reference log is
/// rewritten atomically; a pure-insert batch is appended.
pub fn import_batch(
    ledger: &Ledger,
    candidates: Vec<Reference>,
) -> Result<ImportOutcome, DedupError> {
    let existing = ledger.read_all()?;
    let mut working_set: Vec<WorkingRecord> =
        existing.into_iter().map(WorkingRecord::persisted).collect();
    let mut outcome = ImportOutcome::default();

    for candidate in candidates {
        match classify(&working_set, &candidate)? {
            Classification::Insert => {
                debug!(id = %candidate.id, "import: insert");
                working_set.push(WorkingRecord::provisional(candidate));
                outcome.inserted += 1;
            }
            Classification::Update { index } => {
                debug!(id = %candidate.id, target = %working_set[index].reference.id, "import: update");
                working_set[index].reference.merge_from(&candidate);
                outcome.updated += 1;
            }
            Classification::Skip { reason } => {
                debug!(id = %candidate.id, reason = reason.as_str(), "import: skip");
                outcome.skipped.push(SkippedRecord {
                    id: candidate.id,
                    reason,
                });
            }
        }
    }

    if outcome.updated > 0 {
        let references: Vec<Reference> = working_set
            .iter()
            .map(|record| record.reference.clone())
            .collect();
        ledger.write_all(&references)?;
    } else if outcome.inserted > 0 {
        for record in working_set.iter().filter(|record| record.provisional) {
            ledger.append(&record.reference)?;
        }
    }

    info!(
        inserted = outcome.inserted,
        updated = outcome.updated,
        skipped = outcome.skipped.len(),
        "import batch complete"
    );
    Ok(outcome)
}
