//! Academic-graph service interface
//!
//! Lookups are keyed by normalized external identifiers (`DOI:`, `ARXIV:`,
//! `PMID:`, `PMCID:`, `CorpusId:`, or a raw provider id). Not-found,
//! rate-limited, and auth failures are distinguished so that batch features
//! can branch on them explicitly.

mod graph;

pub use graph::{GraphClient, DEFAULT_BASE_URL};

use std::fmt;

use imcite_domain::{
    generate_cite_key, normalize_arxiv, normalize_doi, Author, PartialDate, Provenance, Reference,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("record not found: {id}")]
    NotFound { id: String },
    #[error("rate limited by the academic-graph service")]
    RateLimited { retry_after: Option<u64> },
    #[error("authentication failed: {message}")]
    Auth { message: String },
    #[error("request failed: {message}")]
    RequestFailed { message: String },
    #[error("unexpected response: {message}")]
    Parse { message: String },
}

/// An identifier usable for a provider lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExternalId {
    Doi(String),
    Arxiv(String),
    Pmid(String),
    Pmcid(String),
    CorpusId(u64),
    /// Raw provider-native paper id.
    Native(String),
}

impl ExternalId {
    /// Render as a provider query id.
    pub fn query_id(&self) -> String {
        match self {
            ExternalId::Doi(doi) => format!("DOI:{}", normalize_doi(doi)),
            ExternalId::Arxiv(arxiv) => format!("ARXIV:{}", normalize_arxiv(arxiv)),
            ExternalId::Pmid(pmid) => format!("PMID:{}", pmid),
            ExternalId::Pmcid(pmcid) => format!("PMCID:{}", pmcid),
            ExternalId::CorpusId(corpus_id) => format!("CorpusId:{}", corpus_id),
            ExternalId::Native(id) => id.clone(),
        }
    }

    /// The best lookup id for a ledger record, in provider-match priority
    /// order (DOI first).
    pub fn for_reference(reference: &Reference) -> Option<ExternalId> {
        let ids = &reference.identifiers;
        if let Some(doi) = ids.doi.as_deref().filter(|doi| !doi.is_empty()) {
            return Some(ExternalId::Doi(doi.to_string()));
        }
        if let Some(arxiv) = ids.arxiv.as_deref().filter(|arxiv| !arxiv.is_empty()) {
            return Some(ExternalId::Arxiv(arxiv.to_string()));
        }
        if let Some(pmid) = ids.pmid.as_deref().filter(|pmid| !pmid.is_empty()) {
            return Some(ExternalId::Pmid(pmid.to_string()));
        }
        if let Some(pmcid) = ids.pmcid.as_deref().filter(|pmcid| !pmcid.is_empty()) {
            return Some(ExternalId::Pmcid(pmcid.to_string()));
        }
        if let Some(corpus_id) = ids
            .corpus_id
            .as_deref()
            .and_then(|corpus_id| corpus_id.parse().ok())
        {
            return Some(ExternalId::CorpusId(corpus_id));
        }
        None
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.query_id())
    }
}

/// A paper as returned by the provider, before it becomes a ledger record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PaperStub {
    /// Provider-native paper id.
    pub paper_id: String,
    pub title: String,
    pub authors: Vec<Author>,
    pub year: Option<i32>,
    pub venue: Option<String>,
    pub doi: Option<String>,
    pub arxiv_id: Option<String>,
    pub abstract_text: Option<String>,
    pub citation_count: Option<i32>,
    pub reference_count: Option<i32>,
}

impl PaperStub {
    /// Cite key suggested by the stub's metadata (`LastName` + year).
    pub fn suggested_cite_key(&self) -> String {
        let last_name = self
            .authors
            .first()
            .map(|author| author.last.as_str())
            .unwrap_or_default();
        generate_cite_key(last_name, self.year)
    }

    /// Convert into a ledger record under the given id, tagging provenance.
    pub fn into_reference(self, id: String) -> Reference {
        let mut reference = Reference::new(id, self.title);
        reference.authors = self.authors;
        reference.venue = self.venue;
        reference.published = self.year.map(PartialDate::year);
        reference.abstract_text = self.abstract_text;
        reference.identifiers.doi = self.doi;
        reference.identifiers.arxiv = self.arxiv_id;
        reference.source = Some(Provenance {
            source_type: "academic-graph".to_string(),
            external_id: self.paper_id,
        });
        reference
    }
}
