//! Author names

use serde::{Deserialize, Serialize};

/// An author of a reference, split into given and family name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub first: String,
    pub last: String,
}

impl Author {
    pub fn new(last: impl Into<String>) -> Self {
        Self {
            first: String::new(),
            last: last.into(),
        }
    }

    pub fn with_first(mut self, first: impl Into<String>) -> Self {
        self.first = first.into();
        self
    }

    /// Display form, "First Last" or just "Last".
    pub fn display_name(&self) -> String {
        if self.first.is_empty() {
            self.last.clone()
        } else {
            format!("{} {}", self.first, self.last)
        }
    }
}

/// Parse a single author name.
///
/// Accepts "Last, First" and "First Middle Last"; a bare word is a family
/// name.
pub fn parse_author(input: &str) -> Author {
    let trimmed = input.trim();
    if let Some((last, first)) = trimmed.split_once(',') {
        return Author {
            first: first.trim().to_string(),
            last: last.trim().to_string(),
        };
    }

    match trimmed.rsplit_once(' ') {
        Some((first, last)) => Author {
            first: first.trim().to_string(),
            last: last.trim().to_string(),
        },
        None => Author::new(trimmed),
    }
}

/// Join authors into a single searchable string.
pub fn join_authors(authors: &[Author]) -> String {
    authors
        .iter()
        .map(Author::display_name)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_comma_form() {
        let author = parse_author("Smith, John");
        assert_eq!(author.first, "John");
        assert_eq!(author.last, "Smith");
    }

    #[test]
    fn test_parse_natural_form() {
        let author = parse_author("John A. Smith");
        assert_eq!(author.first, "John A.");
        assert_eq!(author.last, "Smith");
    }

    #[test]
    fn test_parse_single_word() {
        let author = parse_author("Aristotle");
        assert_eq!(author.first, "");
        assert_eq!(author.last, "Aristotle");
    }

    #[test]
    fn test_join_authors() {
        let authors = vec![
            Author::new("Smith").with_first("John"),
            Author::new("Jones"),
        ];
        assert_eq!(join_authors(&authors), "John Smith; Jones");
    }
}
