//! Citation-graph edges

use std::fmt;

use serde::{Deserialize, Serialize};

/// Well-known relation names. The wire format is an open string so that
/// older ledgers with ad-hoc relations still round-trip.
pub mod relation {
    pub const CITES: &str = "cites";
    pub const EXTENDS: &str = "extends";
    pub const SUPERSEDES: &str = "supersedes";
}

/// A directed, typed relationship between two reference ids.
///
/// Endpoint existence and key uniqueness are checked by the integrity
/// checker, not enforced on write.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub relation: String,
}

impl Edge {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation: relation.into(),
        }
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            source: self.source.clone(),
            target: self.target.clone(),
            relation: self.relation.clone(),
        }
    }
}

/// The identity of an edge: `(source, target, relation)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    pub source: String,
    pub target: String,
    pub relation: String,
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.source, self.relation, self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_uses_type_field() {
        let edge = Edge::new("A", "B", relation::CITES);
        let json = serde_json::to_string(&edge).unwrap();
        assert_eq!(json, r#"{"source":"A","target":"B","type":"cites"}"#);

        let back: Edge = serde_json::from_str(&json).unwrap();
        assert_eq!(back, edge);
    }

    #[test]
    fn test_key_identity() {
        let a = Edge::new("A", "B", relation::CITES);
        let b = Edge::new("A", "B", relation::CITES);
        let c = Edge::new("A", "B", relation::EXTENDS);
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn test_key_display() {
        let key = Edge::new("A", "B", relation::CITES).key();
        assert_eq!(key.to_string(), "A -[cites]-> B");
    }
}
