//! Append-friendly JSONL ledger: the authoritative record store
//!
//! One JSON document per line, references and edges in two parallel logs.
//! Every derived representation (query cache, similarity index) is rebuilt
//! from these files; nothing ever flows the other way.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use imcite_domain::{generate_unique_id, Edge, Reference};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

pub const REFERENCES_FILE: &str = "references.jsonl";
pub const EDGES_FILE: &str = "edges.jsonl";

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A malformed line is a hard read error, never a skip.
    #[error("{}:{line}: malformed record: {source}", path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode record: {0}")]
    Encode(serde_json::Error),
    #[error("record has an empty id")]
    EmptyId,
    #[error("duplicate id in ledger write: {id}")]
    DuplicateId { id: String },
}

/// Handle on the two log files. Opening performs no I/O; a missing file is
/// an empty, fresh ledger.
pub struct Ledger {
    references_path: PathBuf,
    edges_path: PathBuf,
}

impl Ledger {
    /// A ledger rooted at a data directory, using the standard file names.
    pub fn open(root: &Path) -> Self {
        Self {
            references_path: root.join(REFERENCES_FILE),
            edges_path: root.join(EDGES_FILE),
        }
    }

    pub fn with_paths(references_path: PathBuf, edges_path: PathBuf) -> Self {
        Self {
            references_path,
            edges_path,
        }
    }

    pub fn references_path(&self) -> &Path {
        &self.references_path
    }

    pub fn edges_path(&self) -> &Path {
        &self.edges_path
    }

    pub fn read_all(&self) -> Result<Vec<Reference>, LedgerError> {
        read_jsonl(&self.references_path)
    }

    pub fn read_all_edges(&self) -> Result<Vec<Edge>, LedgerError> {
        read_jsonl(&self.edges_path)
    }

    /// Atomic full overwrite of the reference log.
    ///
    /// Rejects empty and duplicate ids before touching the file; the write
    /// goes to a sibling temp file which is renamed into place, so an
    /// interrupted process never leaves a torn log.
    pub fn write_all(&self, references: &[Reference]) -> Result<(), LedgerError> {
        let mut seen = HashSet::new();
        for reference in references {
            if reference.id.is_empty() {
                return Err(LedgerError::EmptyId);
            }
            if !seen.insert(reference.id.as_str()) {
                return Err(LedgerError::DuplicateId {
                    id: reference.id.clone(),
                });
            }
        }
        write_jsonl(&self.references_path, references)?;
        info!(
            count = references.len(),
            path = %self.references_path.display(),
            "rewrote reference log"
        );
        Ok(())
    }

    /// Atomic full overwrite of the edge log.
    pub fn write_all_edges(&self, edges: &[Edge]) -> Result<(), LedgerError> {
        write_jsonl(&self.edges_path, edges)?;
        info!(
            count = edges.len(),
            path = %self.edges_path.display(),
            "rewrote edge log"
        );
        Ok(())
    }

    /// Append a single record to the reference log.
    pub fn append(&self, reference: &Reference) -> Result<(), LedgerError> {
        if reference.id.is_empty() {
            return Err(LedgerError::EmptyId);
        }
        append_jsonl(&self.references_path, reference)?;
        debug!(id = %reference.id, "appended reference");
        Ok(())
    }

    /// Append a single edge to the edge log.
    pub fn append_edge(&self, edge: &Edge) -> Result<(), LedgerError> {
        append_jsonl(&self.edges_path, edge)?;
        debug!(key = %edge.key(), "appended edge");
        Ok(())
    }

    /// Return `candidate` if no existing record uses it, else the first
    /// suffixed form that is free.
    pub fn generate_unique_id(&self, candidate: &str) -> Result<String, LedgerError> {
        let existing: HashSet<String> =
            self.read_all()?.into_iter().map(|record| record.id).collect();
        Ok(generate_unique_id(&existing, candidate))
    }
}

pub(crate) fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, LedgerError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(LedgerError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    let reader = BufReader::new(file);
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| LedgerError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| LedgerError::Malformed {
            path: path.to_path_buf(),
            line: index + 1,
            source: e,
        })?;
        records.push(record);
    }
    Ok(records)
}

fn write_jsonl<T: Serialize>(path: &Path, records: &[T]) -> Result<(), LedgerError> {
    let io_err = |e: std::io::Error| LedgerError::Io {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ledger".to_string());
    let tmp_path = path.with_file_name(format!("{}.tmp", file_name));

    let file = File::create(&tmp_path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    for record in records {
        let line = serde_json::to_string(record).map_err(LedgerError::Encode)?;
        writer.write_all(line.as_bytes()).map_err(io_err)?;
        writer.write_all(b"\n").map_err(io_err)?;
    }
    let file = writer.into_inner().map_err(|e| io_err(e.into_error()))?;
    file.sync_all().map_err(io_err)?;
    drop(file);

    fs::rename(&tmp_path, path).map_err(io_err)
}

fn append_jsonl<T: Serialize>(path: &Path, record: &T) -> Result<(), LedgerError> {
    let io_err = |e: std::io::Error| LedgerError::Io {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }

    let line = serde_json::to_string(record).map_err(LedgerError::Encode)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err)?;
    file.write_all(line.as_bytes()).map_err(io_err)?;
    file.write_all(b"\n").map_err(io_err)?;
    file.sync_all().map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use imcite_domain::relation;

    fn make_reference(id: &str, title: &str) -> Reference {
        Reference::new(id, title)
    }

    #[test]
    fn write_all_and_read_all_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path());

        let references = vec![
            make_reference("Smith2024", "First"),
            make_reference("Jones2023", "Second"),
        ];
        ledger.write_all(&references).unwrap();

        let read_back = ledger.read_all().unwrap();
        assert_eq!(read_back, references);
    }

    #[test]
    fn read_all_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path());
        assert!(ledger.read_all().unwrap().is_empty());
        assert!(ledger.read_all_edges().unwrap().is_empty());
    }

    #[test]
    fn malformed_line_is_a_hard_error_with_line_number() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path());
        ledger.append(&make_reference("Ok2020", "Fine")).unwrap();
        fs::write(
            ledger.references_path(),
            "{\"id\":\"Ok2020\",\"title\":\"Fine\"}\nnot json\n",
        )
        .unwrap();

        let err = ledger.read_all().unwrap_err();
        match err {
            LedgerError::Malformed { line, .. } => assert_eq!(line, 2),
            other => panic!("expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn append_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path());
        ledger.append(&make_reference("A", "One")).unwrap();
        ledger.append(&make_reference("B", "Two")).unwrap();

        let read_back = ledger.read_all().unwrap();
        assert_eq!(read_back.len(), 2);
        assert_eq!(read_back[0].id, "A");
        assert_eq!(read_back[1].id, "B");
    }

    #[test]
    fn append_rejects_empty_id() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path());
        let err = ledger.append(&make_reference("", "Nameless")).unwrap_err();
        assert!(matches!(err, LedgerError::EmptyId));
    }

    #[test]
    fn write_all_rejects_duplicate_ids() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path());
        let references = vec![make_reference("A", "One"), make_reference("A", "Two")];
        let err = ledger.write_all(&references).unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateId { .. }));
        // Nothing was written
        assert!(ledger.read_all().unwrap().is_empty());
    }

    #[test]
    fn write_all_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path());
        ledger.write_all(&[make_reference("A", "One")]).unwrap();

        let entries: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec![REFERENCES_FILE.to_string()]);
    }

    #[test]
    fn edges_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path());
        let edges = vec![
            Edge::new("A", "B", relation::CITES),
            Edge::new("B", "C", relation::EXTENDS),
        ];
        ledger.write_all_edges(&edges).unwrap();
        assert_eq!(ledger.read_all_edges().unwrap(), edges);

        ledger
            .append_edge(&Edge::new("C", "A", relation::CITES))
            .unwrap();
        assert_eq!(ledger.read_all_edges().unwrap().len(), 3);
    }

    #[test]
    fn unknown_fields_survive_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path());
        fs::write(
            ledger.references_path(),
            "{\"id\":\"X\",\"title\":\"T\",\"shelf\":\"top\"}\n",
        )
        .unwrap();

        let references = ledger.read_all().unwrap();
        ledger.write_all(&references).unwrap();

        let raw = fs::read_to_string(ledger.references_path()).unwrap();
        assert!(raw.contains("\"shelf\":\"top\""));
    }

    #[test]
    fn generate_unique_id_against_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path());
        ledger.append(&make_reference("Smith2024", "One")).unwrap();

        assert_eq!(ledger.generate_unique_id("Jones2023").unwrap(), "Jones2023");
        assert_eq!(
            ledger.generate_unique_id("Smith2024").unwrap(),
            "Smith2024a"
        );
    }
}
