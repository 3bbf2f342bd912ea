//! Ollama-backed embedding client
//!
//! Talks to a local Ollama server: `GET /api/tags` for availability and the
//! installed model list, `POST /api/embeddings` for vectors.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{EmbeddingProvider, ProviderError};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

pub struct OllamaClient {
    base_url: String,
    model: String,
    client: Client,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderError::RequestFailed {
                message: e.to_string(),
            })?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
        })
    }

    async fn tags(&self) -> Result<TagsResponse, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await.map_err(|e| {
            ProviderError::Unavailable {
                message: e.to_string(),
            }
        })?;
        if !response.status().is_success() {
            return Err(ProviderError::Unavailable {
                message: format!("status {}", response.status()),
            });
        }
        response
            .json()
            .await
            .map_err(|e| ProviderError::Parse {
                message: e.to_string(),
            })
    }
}

impl EmbeddingProvider for OllamaClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn is_available(&self) -> Result<(), ProviderError> {
        self.tags().await.map(|_| ())
    }

    async fn has_model(&self) -> Result<bool, ProviderError> {
        let tags = self.tags().await?;
        // Ollama names carry a tag suffix ("nomic-embed-text:latest")
        let installed = tags.models.iter().any(|tag| {
            tag.name == self.model || tag.name.starts_with(&format!("{}:", self.model))
        });
        Ok(installed)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let url = format!("{}/api/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable {
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(ProviderError::ModelMissing {
                model: self.model.clone(),
            });
        }
        if !status.is_success() {
            return Err(ProviderError::RequestFailed {
                message: format!("status {}", status),
            });
        }

        let parsed: EmbeddingResponse =
            response.json().await.map_err(|e| ProviderError::Parse {
                message: e.to_string(),
            })?;
        if parsed.embedding.is_empty() {
            return Err(ProviderError::Parse {
                message: "empty embedding".to_string(),
            });
        }
        Ok(parsed.embedding)
    }
}
