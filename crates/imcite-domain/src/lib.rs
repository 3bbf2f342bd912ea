//! imcite-domain: data model for the imcite reference store
//!
//! Pure Rust types shared by the storage, projection, and client layers:
//! - bibliographic records and citation edges
//! - author name handling
//! - identifier normalization (DOI, arXiv) and cite-key generation

pub mod author;
pub mod edge;
pub mod ids;
pub mod reference;

pub use author::{join_authors, parse_author, Author};
pub use edge::{relation, Edge, EdgeKey};
pub use ids::{generate_cite_key, generate_unique_id, normalize_arxiv, normalize_doi};
pub use reference::{ExternalIds, PartialDate, Provenance, Reference, ValidationError};
