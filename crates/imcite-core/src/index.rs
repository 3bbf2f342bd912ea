//! Similarity index: a rebuildable vector projection of reference abstracts
//!
//! Enables "find similar papers" retrieval by storing one embedding per
//! qualifying reference and ranking with cosine similarity. The index is
//! derived state: it is rebuilt from the ledger and an embedding provider,
//! and staleness against the cache is reported, never auto-repaired.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use imcite_domain::Reference;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::embed::{EmbeddingProvider, ProviderError};

pub const INDEX_FILE: &str = "embeddings.json";
pub const DEFAULT_MIN_ABSTRACT_LEN: usize = 50;

// Model token limits make very long abstracts pointless to embed in full.
const MAX_EMBED_CHARS: usize = 1000;

#[derive(Error, Debug)]
pub enum IndexError {
    /// No index has been built under this root yet; callers should suggest
    /// a build rather than surfacing an I/O error.
    #[error("similarity index not found under {}", root.display())]
    NotFound { root: PathBuf },

    /// The id has no stored vector (e.g. the record has no abstract).
    #[error("paper not indexed: {id}")]
    PaperNotIndexed { id: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed index file {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode index: {0}")]
    Encode(serde_json::Error),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// One stored embedding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub paper_id: String,
    pub vector: Vec<f32>,
    pub model: String,
}

/// Index-wide metadata persisted alongside the entries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub model: String,
    pub created_at: String,
    pub paper_count: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct BuildOptions {
    /// Minimum abstract length (characters) for a reference to be indexed.
    pub min_abstract_len: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            min_abstract_len: DEFAULT_MIN_ABSTRACT_LEN,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub embedded: usize,
    /// References below the abstract threshold; not an error.
    pub skipped: usize,
}

/// Ranked result of [`SimilarityIndex::find_similar`].
#[derive(Clone, Debug, PartialEq)]
pub struct SimilarityHit {
    pub paper_id: String,
    pub score: f32,
}

/// Qualifying records missing from the index. Reported, never auto-fixed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StalenessReport {
    pub missing: Vec<String>,
}

impl StalenessReport {
    pub fn is_stale(&self) -> bool {
        !self.missing.is_empty()
    }
}

#[derive(Serialize, Deserialize)]
struct IndexFile {
    meta: IndexMeta,
    entries: Vec<IndexEntry>,
}

#[derive(Debug)]
pub struct SimilarityIndex {
    meta: IndexMeta,
    entries: Vec<IndexEntry>,
    by_id: HashMap<String, usize>,
}

impl SimilarityIndex {
    /// Build an index by embedding every reference whose abstract meets the
    /// threshold; shorter ones are counted as skipped.
    ///
    /// Requests go out one at a time in ledger order and entries are keyed
    /// by paper id, so the result is deterministic. The progress callback is
    /// advisory only. A provider failure aborts the build.
    pub async fn build<P, F>(
        provider: &P,
        references: &[Reference],
        options: BuildOptions,
        mut progress: F,
    ) -> Result<(Self, BuildStats), IndexError>
    where
        P: EmbeddingProvider,
        F: FnMut(usize, usize),
    {
        let qualifying: Vec<&Reference> = references
            .iter()
            .filter(|reference| reference.abstract_chars() >= options.min_abstract_len)
            .collect();
        let skipped = references.len() - qualifying.len();
        let total = qualifying.len();

        let mut entries = Vec::with_capacity(total);
        let mut by_id = HashMap::with_capacity(total);
        for (done, reference) in qualifying.iter().enumerate() {
            let vector = provider.embed(&embedding_text(reference)).await?;
            if !by_id.contains_key(&reference.id) {
                by_id.insert(reference.id.clone(), entries.len());
                entries.push(IndexEntry {
                    paper_id: reference.id.clone(),
                    vector,
                    model: provider.model_name().to_string(),
                });
            }
            debug!(id = %reference.id, done = done + 1, total, "embedded reference");
            progress(done + 1, total);
        }

        let stats = BuildStats {
            embedded: entries.len(),
            skipped,
        };
        let meta = IndexMeta {
            model: provider.model_name().to_string(),
            created_at: Utc::now().to_rfc3339(),
            paper_count: entries.len(),
        };
        info!(
            embedded = stats.embedded,
            skipped = stats.skipped,
            model = %meta.model,
            "built similarity index"
        );
        Ok((Self { meta, entries, by_id }, stats))
    }

    /// Assemble an index from already-computed entries.
    pub fn from_entries(model: &str, entries: Vec<IndexEntry>) -> Self {
        let by_id = entries
            .iter()
            .enumerate()
            .map(|(pos, entry)| (entry.paper_id.clone(), pos))
            .collect();
        let meta = IndexMeta {
            model: model.to_string(),
            created_at: Utc::now().to_rfc3339(),
            paper_count: entries.len(),
        };
        Self {
            meta,
            entries,
            by_id,
        }
    }

    /// Persist the index under a directory (atomic: temp file + rename).
    pub fn save(&self, root: &Path) -> Result<(), IndexError> {
        fs::create_dir_all(root).map_err(|e| IndexError::Io {
            path: root.to_path_buf(),
            source: e,
        })?;

        let path = root.join(INDEX_FILE);
        let io_err = |e: std::io::Error| IndexError::Io {
            path: path.clone(),
            source: e,
        };

        let tmp_path = root.join(format!("{}.tmp", INDEX_FILE));
        let file = File::create(&tmp_path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        let document = IndexFile {
            meta: self.meta.clone(),
            entries: self.entries.clone(),
        };
        serde_json::to_writer(&mut writer, &document).map_err(IndexError::Encode)?;
        writer.flush().map_err(io_err)?;
        let file = writer.into_inner().map_err(|e| io_err(e.into_error()))?;
        file.sync_all().map_err(io_err)?;
        drop(file);
        fs::rename(&tmp_path, &path).map_err(io_err)?;

        debug!(path = %path.display(), count = self.entries.len(), "saved similarity index");
        Ok(())
    }

    /// Load a previously saved index. A missing file is the distinguished
    /// [`IndexError::NotFound`] condition.
    pub fn load(root: &Path) -> Result<Self, IndexError> {
        let path = root.join(INDEX_FILE);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IndexError::NotFound {
                    root: root.to_path_buf(),
                })
            }
            Err(e) => {
                return Err(IndexError::Io {
                    path: path.clone(),
                    source: e,
                })
            }
        };

        let document: IndexFile = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            IndexError::Malformed {
                path: path.clone(),
                source: e,
            }
        })?;
        let by_id = document
            .entries
            .iter()
            .enumerate()
            .map(|(pos, entry)| (entry.paper_id.clone(), pos))
            .collect();
        Ok(Self {
            meta: document.meta,
            entries: document.entries,
            by_id,
        })
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_paper(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Rank every other indexed paper by cosine similarity to `id`.
    ///
    /// Descending by score; the sort is stable, so ties keep their original
    /// entry order. The query paper itself is excluded.
    pub fn find_similar(&self, id: &str, limit: usize) -> Result<Vec<SimilarityHit>, IndexError> {
        let &query_pos = self
            .by_id
            .get(id)
            .ok_or_else(|| IndexError::PaperNotIndexed { id: id.to_string() })?;
        let query = &self.entries[query_pos].vector;

        let mut hits: Vec<SimilarityHit> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(pos, _)| *pos != query_pos)
            .map(|(_, entry)| SimilarityHit {
                paper_id: entry.paper_id.clone(),
                score: cosine_similarity(query, &entry.vector),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);
        Ok(hits)
    }

    /// Compare the indexed ids against the qualifying ids from the cache.
    pub fn staleness(&self, qualifying_ids: &[String]) -> StalenessReport {
        let missing = qualifying_ids
            .iter()
            .filter(|id| !self.by_id.contains_key(*id))
            .cloned()
            .collect();
        StalenessReport { missing }
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Text handed to the provider: title plus a bounded slice of the abstract.
fn embedding_text(reference: &Reference) -> String {
    let mut text = reference.title.clone();
    if let Some(abstract_text) = reference.abstract_text.as_deref() {
        text.push_str(". ");
        text.extend(abstract_text.chars().take(MAX_EMBED_CHARS));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_entry(id: &str, vector: Vec<f32>) -> IndexEntry {
        IndexEntry {
            paper_id: id.to_string(),
            vector,
            model: "test".to_string(),
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 0.001);

        assert_eq!(cosine_similarity(&a, &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&a, &[0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn find_similar_ranks_and_excludes_self() {
        let index = SimilarityIndex::from_entries(
            "test",
            vec![
                make_entry("a", vec![1.0, 0.0, 0.0]),
                make_entry("b", vec![0.9, 0.1, 0.0]),
                make_entry("c", vec![0.0, 1.0, 0.0]),
            ],
        );

        let hits = index.find_similar("a", 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].paper_id, "b");
        assert_eq!(hits[1].paper_id, "c");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn find_similar_caps_at_limit() {
        let entries = (0..5)
            .map(|i| make_entry(&format!("p{}", i), vec![1.0, i as f32 / 10.0]))
            .collect();
        let index = SimilarityIndex::from_entries("test", entries);

        let hits = index.find_similar("p0", 3).unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn find_similar_breaks_ties_by_entry_order() {
        let index = SimilarityIndex::from_entries(
            "test",
            vec![
                make_entry("query", vec![1.0, 0.0]),
                make_entry("tie1", vec![0.0, 1.0]),
                make_entry("tie2", vec![0.0, 1.0]),
            ],
        );

        let hits = index.find_similar("query", 10).unwrap();
        assert_eq!(hits[0].paper_id, "tie1");
        assert_eq!(hits[1].paper_id, "tie2");
    }

    #[test]
    fn find_similar_unknown_id_is_distinguished() {
        let index = SimilarityIndex::from_entries("test", vec![make_entry("a", vec![1.0])]);
        let err = index.find_similar("missing", 5).unwrap_err();
        assert!(matches!(err, IndexError::PaperNotIndexed { .. }));
    }

    #[test]
    fn staleness_is_the_set_difference() {
        let index = SimilarityIndex::from_entries(
            "test",
            vec![make_entry("A", vec![1.0]), make_entry("B", vec![1.0])],
        );

        let report = index.staleness(&[
            "A".to_string(),
            "B".to_string(),
            "C".to_string(),
        ]);
        assert_eq!(report.missing, vec!["C".to_string()]);
        assert!(report.is_stale());

        let fresh = index.staleness(&["A".to_string(), "B".to_string()]);
        assert!(!fresh.is_stale());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let index = SimilarityIndex::from_entries(
            "test-model",
            vec![make_entry("a", vec![0.5, 0.5]), make_entry("b", vec![1.0, 0.0])],
        );
        index.save(dir.path()).unwrap();

        let loaded = SimilarityIndex::load(dir.path()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.meta().model, "test-model");
        assert_eq!(loaded.meta().paper_count, 2);
        assert!(loaded.has_paper("a"));
        assert!(!loaded.has_paper("z"));
    }

    #[test]
    fn load_missing_index_is_distinguished() {
        let dir = tempfile::tempdir().unwrap();
        let err = SimilarityIndex::load(dir.path()).unwrap_err();
        assert!(matches!(err, IndexError::NotFound { .. }));
    }

    #[test]
    fn embedding_text_bounds_the_abstract() {
        let mut reference = Reference::new("X", "Title");
        reference.abstract_text = Some("x".repeat(5000));
        let text = embedding_text(&reference);
        assert!(text.chars().count() <= "Title. ".len() + MAX_EMBED_CHARS);
    }
}
