//! HTTP client for the academic-graph service
//!
//! Speaks a Semantic Scholar style JSON API. Responses are decoded at this
//! boundary into typed structs; nothing dynamically-typed crosses into the
//! core model.

use std::time::Duration;

use imcite_domain::{parse_author, Author};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::{ExternalId, PaperStub, SourceError};

pub const DEFAULT_BASE_URL: &str = "https://api.semanticscholar.org/graph/v1";

const PAPER_FIELDS: &str =
    "title,abstract,venue,year,authors,externalIds,citationCount,referenceCount";

pub struct GraphClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct PaperResponse {
    #[serde(rename = "paperId")]
    paper_id: Option<String>,
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    venue: Option<String>,
    year: Option<i32>,
    #[serde(default)]
    authors: Vec<AuthorResponse>,
    #[serde(rename = "externalIds")]
    external_ids: Option<ExternalIdsResponse>,
    #[serde(rename = "citationCount")]
    citation_count: Option<i32>,
    #[serde(rename = "referenceCount")]
    reference_count: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct AuthorResponse {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalIdsResponse {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(rename = "ArXiv")]
    arxiv: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CitationsResponse {
    #[serde(default)]
    data: Vec<CitationEntry>,
}

#[derive(Debug, Deserialize)]
struct CitationEntry {
    #[serde(rename = "citingPaper", default)]
    citing_paper: Option<PaperResponse>,
    #[serde(rename = "citedPaper", default)]
    cited_paper: Option<PaperResponse>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<PaperResponse>,
}

impl GraphClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SourceError::RequestFailed {
                message: e.to_string(),
            })?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    /// Look up one paper by external identifier.
    pub async fn paper(&self, id: &ExternalId) -> Result<PaperStub, SourceError> {
        let query_id = id.query_id();
        let url = format!(
            "{}/paper/{}?fields={}",
            self.base_url, query_id, PAPER_FIELDS
        );
        let response: PaperResponse = self.get_json(&url, &query_id).await?;
        Ok(paper_from_response(response))
    }

    /// Papers citing the given one.
    pub async fn citations(&self, id: &ExternalId) -> Result<Vec<PaperStub>, SourceError> {
        let query_id = id.query_id();
        let url = format!(
            "{}/paper/{}/citations?fields={}",
            self.base_url, query_id, PAPER_FIELDS
        );
        let response: CitationsResponse = self.get_json(&url, &query_id).await?;
        Ok(response
            .data
            .into_iter()
            .filter_map(|entry| entry.citing_paper)
            .map(paper_from_response)
            .collect())
    }

    /// Papers the given one cites.
    pub async fn references(&self, id: &ExternalId) -> Result<Vec<PaperStub>, SourceError> {
        let query_id = id.query_id();
        let url = format!(
            "{}/paper/{}/references?fields={}",
            self.base_url, query_id, PAPER_FIELDS
        );
        let response: CitationsResponse = self.get_json(&url, &query_id).await?;
        Ok(response
            .data
            .into_iter()
            .filter_map(|entry| entry.cited_paper)
            .map(paper_from_response)
            .collect())
    }

    /// Keyword search over the provider's corpus.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<PaperStub>, SourceError> {
        let base = format!("{}/paper/search", self.base_url);
        let url = reqwest::Url::parse_with_params(
            &base,
            &[
                ("query", query),
                ("limit", &limit.to_string()),
                ("fields", PAPER_FIELDS),
            ],
        )
        .map_err(|e| SourceError::RequestFailed {
            message: e.to_string(),
        })?;
        let response: SearchResponse = self.get_json(url.as_str(), query).await?;
        Ok(response.data.into_iter().map(paper_from_response).collect())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        lookup_id: &str,
    ) -> Result<T, SourceError> {
        debug!(url, "academic-graph request");
        let mut request = self.client.get(url).header("User-Agent", "imcite/0.1");
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }
        let response = request.send().await.map_err(|e| SourceError::RequestFailed {
            message: e.to_string(),
        })?;

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok());
        if let Some(error) = status_error(response.status(), retry_after, lookup_id) {
            return Err(error);
        }

        response.json().await.map_err(|e| SourceError::Parse {
            message: e.to_string(),
        })
    }
}

/// Map a failing HTTP status to the source error taxonomy.
fn status_error(
    status: StatusCode,
    retry_after: Option<u64>,
    lookup_id: &str,
) -> Option<SourceError> {
    match status {
        StatusCode::NOT_FOUND => Some(SourceError::NotFound {
            id: lookup_id.to_string(),
        }),
        StatusCode::TOO_MANY_REQUESTS => Some(SourceError::RateLimited { retry_after }),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Some(SourceError::Auth {
            message: format!("status {}", status),
        }),
        status if !status.is_success() => Some(SourceError::RequestFailed {
            message: format!("status {}", status),
        }),
        _ => None,
    }
}

fn paper_from_response(response: PaperResponse) -> PaperStub {
    let external_ids = response.external_ids.unwrap_or_default();
    let authors: Vec<Author> = response
        .authors
        .into_iter()
        .filter_map(|author| author.name)
        .map(|name| parse_author(&name))
        .collect();

    PaperStub {
        paper_id: response.paper_id.unwrap_or_default(),
        title: response.title.unwrap_or_default(),
        authors,
        year: response.year,
        venue: response.venue,
        doi: external_ids.doi,
        arxiv_id: external_ids.arxiv,
        abstract_text: response.abstract_text,
        citation_count: response.citation_count,
        reference_count: response.reference_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_is_distinguished() {
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, None, "DOI:10.1/x"),
            Some(SourceError::NotFound { id }) if id == "DOI:10.1/x"
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, Some(30), "x"),
            Some(SourceError::RateLimited {
                retry_after: Some(30)
            })
        ));
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, None, "x"),
            Some(SourceError::Auth { .. })
        ));
        assert!(matches!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR, None, "x"),
            Some(SourceError::RequestFailed { .. })
        ));
        assert!(status_error(StatusCode::OK, None, "x").is_none());
    }

    #[test]
    fn paper_response_decodes_and_maps() {
        let json = r#"{
            "paperId": "649def34f8be52c8b66281af98ae884c09aef38b",
            "title": "Construction of the Literature Graph",
            "abstract": "We describe a deployed scalable system.",
            "venue": "NAACL",
            "year": 2018,
            "authors": [{"authorId": "1", "name": "Waleed Ammar"}],
            "externalIds": {"DOI": "10.18653/v1/N18-3011", "ArXiv": "1805.02262"},
            "citationCount": 453,
            "referenceCount": 27
        }"#;
        let response: PaperResponse = serde_json::from_str(json).unwrap();
        let stub = paper_from_response(response);

        assert_eq!(stub.title, "Construction of the Literature Graph");
        assert_eq!(stub.year, Some(2018));
        assert_eq!(stub.doi, Some("10.18653/v1/N18-3011".to_string()));
        assert_eq!(stub.arxiv_id, Some("1805.02262".to_string()));
        assert_eq!(stub.authors.len(), 1);
        assert_eq!(stub.authors[0].last, "Ammar");
        assert_eq!(stub.citation_count, Some(453));
    }

    #[test]
    fn citations_response_tolerates_missing_papers() {
        let json = r#"{"data":[{"citingPaper":{"paperId":"a","title":"A"}},{"citingPaper":null}]}"#;
        let response: CitationsResponse = serde_json::from_str(json).unwrap();
        let stubs: Vec<PaperStub> = response
            .data
            .into_iter()
            .filter_map(|entry| entry.citing_paper)
            .map(paper_from_response)
            .collect();
        assert_eq!(stubs.len(), 1);
        assert_eq!(stubs[0].paper_id, "a");
    }
}
