//! imcite-core: the reference store and its derived representations
//!
//! The authoritative state is a pair of JSONL logs (references and citation
//! edges). Everything else is derived and rebuildable:
//! - `ledger`: the append-friendly logs themselves
//! - `cache`: SQLite query projection (lookup, substring search, counts)
//! - `index` + `embed`: vector similarity index over reference abstracts
//! - `dedup`: insert/update/skip classification for bulk import
//! - `graph`: citation-graph integrity checking and grooming
//! - `sources` + `preprint`: academic-graph lookups, published-version
//!   matching, and citation-edge population
//! - `config`: explicit configuration passed into operations

pub mod cache;
pub mod config;
pub mod dedup;
pub mod embed;
pub mod graph;
pub mod index;
pub mod ledger;
pub mod preprint;
pub mod sources;

// Re-export main types for convenience
pub use cache::{CacheError, QueryCache, SearchField};
pub use config::{ConfigError, ImciteConfig, OutputFormat};
pub use dedup::{classify, import_batch, Classification, DedupError, ImportOutcome, SkipReason};
pub use embed::{EmbeddingProvider, OllamaClient, ProviderError};
pub use graph::{
    check, detect_orphaned_edges, find_duplicate_dois, find_duplicate_edges, groom_fix,
    GraphError, IntegrityReport, OrphanReason, OrphanedEdge,
};
pub use index::{
    cosine_similarity, BuildOptions, BuildStats, IndexEntry, IndexError, IndexMeta,
    SimilarityHit, SimilarityIndex, StalenessReport,
};
pub use ledger::{Ledger, LedgerError};
pub use preprint::{
    find_published_version, link_all, link_citations, resolve_supersedes, titles_match,
    BatchAbort, BatchLinkOutcome, LinkError,
};
pub use sources::{ExternalId, GraphClient, PaperStub, SourceError};
