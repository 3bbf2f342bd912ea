//! Bibliographic record model
//!
//! `Reference` is the unit stored in the ledger. Its serde field names are a
//! compatibility surface: existing ledger files must round-trip, and unknown
//! fields written by other tooling are preserved through the flattened
//! `extra` map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::author::Author;
use crate::ids::{normalize_arxiv, normalize_doi};

/// External identifiers attached to a record, used for cross-provider
/// matching.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arxiv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmcid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corpus_id: Option<String>,
}

impl ExternalIds {
    /// Check if all identifiers are empty.
    pub fn is_empty(&self) -> bool {
        self.doi.is_none()
            && self.arxiv.is_none()
            && self.pmid.is_none()
            && self.pmcid.is_none()
            && self.corpus_id.is_none()
    }
}

/// A possibly partial publication date.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialDate {
    pub year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
}

impl PartialDate {
    pub fn year(year: i32) -> Self {
        Self {
            year,
            month: None,
            day: None,
        }
    }
}

/// Provenance tag recording which provider supplied the metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    #[serde(rename = "type")]
    pub source_type: String,
    pub external_id: String,
}

/// A bibliographic record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "abstract")]
    pub abstract_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<PartialDate>,
    #[serde(default, skip_serializing_if = "ExternalIds::is_empty")]
    pub identifiers: ExternalIds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supplements: Vec<String>,
    /// DOI of a published version this preprint was superseded by.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Provenance>,
    /// Fields this version of the model does not know about. Preserved so
    /// that ledger files written by newer tooling round-trip untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Invalid-input error for record validation.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("record has an empty id")]
    EmptyId,
}

impl Reference {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    /// Precondition check for records entering the ledger.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyId);
        }
        Ok(())
    }

    /// The record's DOI in normalized form, if present.
    pub fn normalized_doi(&self) -> Option<String> {
        self.identifiers
            .doi
            .as_deref()
            .filter(|doi| !doi.is_empty())
            .map(normalize_doi)
    }

    /// The record's arXiv id in normalized form, if present.
    pub fn normalized_arxiv(&self) -> Option<String> {
        self.identifiers
            .arxiv
            .as_deref()
            .filter(|arxiv| !arxiv.is_empty())
            .map(normalize_arxiv)
    }

    pub fn year(&self) -> Option<i32> {
        self.published.as_ref().map(|date| date.year)
    }

    pub fn first_author_last(&self) -> Option<&str> {
        self.authors.first().map(|author| author.last.as_str())
    }

    /// Abstract length in characters (0 when absent).
    pub fn abstract_chars(&self) -> usize {
        self.abstract_text
            .as_deref()
            .map(|text| text.chars().count())
            .unwrap_or(0)
    }

    /// Merge metadata from `other` into this record.
    ///
    /// Existing values win; `other` only fills gaps. The id never changes.
    pub fn merge_from(&mut self, other: &Reference) {
        if self.title.is_empty() && !other.title.is_empty() {
            self.title = other.title.clone();
        }
        if self.abstract_text.is_none() {
            self.abstract_text = other.abstract_text.clone();
        }
        if self.venue.is_none() {
            self.venue = other.venue.clone();
        }
        if self.authors.is_empty() {
            self.authors = other.authors.clone();
        }
        if self.published.is_none() {
            self.published = other.published.clone();
        }
        if self.identifiers.doi.is_none() {
            self.identifiers.doi = other.identifiers.doi.clone();
        }
        if self.identifiers.arxiv.is_none() {
            self.identifiers.arxiv = other.identifiers.arxiv.clone();
        }
        if self.identifiers.pmid.is_none() {
            self.identifiers.pmid = other.identifiers.pmid.clone();
        }
        if self.identifiers.pmcid.is_none() {
            self.identifiers.pmcid = other.identifiers.pmcid.clone();
        }
        if self.identifiers.corpus_id.is_none() {
            self.identifiers.corpus_id = other.identifiers.corpus_id.clone();
        }
        if self.pdf_path.is_none() {
            self.pdf_path = other.pdf_path.clone();
        }
        for supplement in &other.supplements {
            if !self.supplements.contains(supplement) {
                self.supplements.push(supplement.clone());
            }
        }
        if self.supersedes.is_none() {
            self.supersedes = other.supersedes.clone();
        }
        if self.source.is_none() {
            self.source = other.source.clone();
        }
        for (key, value) in &other.extra {
            self.extra
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }
}
