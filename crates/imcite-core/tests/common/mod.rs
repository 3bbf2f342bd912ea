//! Shared fixtures for integration tests
#![allow(dead_code)]

use imcite_domain::{Author, PartialDate, Reference};

pub fn make_reference(id: &str, title: &str) -> Reference {
    Reference::new(id, title)
}

pub fn make_paper(id: &str, title: &str, author: &str, year: i32) -> Reference {
    let mut reference = Reference::new(id, title);
    reference.authors = vec![Author::new(author)];
    reference.published = Some(PartialDate::year(year));
    reference
}

pub fn with_abstract(mut reference: Reference, abstract_text: &str) -> Reference {
    reference.abstract_text = Some(abstract_text.to_string());
    reference
}

pub fn with_doi(mut reference: Reference, doi: &str) -> Reference {
    reference.identifiers.doi = Some(doi.to_string());
    reference
}
