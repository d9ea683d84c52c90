//! Embedding client: routes `embed(code) -> vector | null` to the configured
//! provider, skipping over-long code before ever making a request.
//!
//! `codescope-server/src/semantic.rs` runs embeddings in-process via
//! `candle`/`hf-hub`; this crate's embedding provider is explicitly an
//! external HTTP collaborator instead, so the client here is a thin
//! `reqwest` call — the same HTTP-client convention `doraemonkeys-sloc-guard`
//! uses for its remote-config fetch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{DryError, Result};

/// Narrow provider contract the duplicate engine consumes. Test code injects
/// a stub implementation so no network call ever happens in tests.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, code: &str) -> Result<Option<Vec<f32>>>;
}

/// `reqwest`-backed client routing to either the Hugging Face inference API
/// or a caller-supplied `http(s)` endpoint, per `embeddingSource`.
pub struct HttpEmbeddingClient {
    client: reqwest::Client,
    source: EmbeddingSource,
    context_length: usize,
}

#[derive(Debug, Clone)]
enum EmbeddingSource {
    HuggingFace,
    Endpoint(String),
}

impl HttpEmbeddingClient {
    /// `source` is either the literal `"huggingface"` or an `http(s)` URL,
    /// as validated by [`crate::config`]. Any other value is an error.
    pub fn new(source: &str, context_length: usize) -> Result<Self> {
        let source = if source == "huggingface" {
            EmbeddingSource::HuggingFace
        } else if source.starts_with("http://") || source.starts_with("https://") {
            EmbeddingSource::Endpoint(source.to_string())
        } else {
            return Err(DryError::ConfigInvalid {
                path: std::path::PathBuf::from("dryconfig.json"),
                detail: format!("unrecognized embeddingSource {source:?}"),
            });
        };
        Ok(HttpEmbeddingClient { client: reqwest::Client::new(), source, context_length })
    }
}

#[derive(Serialize)]
struct HfRequest<'a> {
    inputs: &'a str,
}

#[derive(Serialize)]
struct EndpointRequest<'a> {
    code: &'a str,
}

#[derive(Deserialize)]
struct EndpointResponse {
    embedding: Vec<f32>,
}

const HF_FEATURE_EXTRACTION_URL: &str = "https://api-inference.huggingface.co/pipeline/feature-extraction/sentence-transformers/all-MiniLM-L6-v2";

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingClient {
    async fn embed(&self, code: &str) -> Result<Option<Vec<f32>>> {
        if code.len() > self.context_length {
            return Ok(None);
        }

        let vector = match &self.source {
            EmbeddingSource::HuggingFace => {
                let resp = self
                    .client
                    .post(HF_FEATURE_EXTRACTION_URL)
                    .json(&HfRequest { inputs: code })
                    .send()
                    .await
                    .map_err(|e| DryError::EmbeddingUnavailable(e.to_string()))?;
                if !resp.status().is_success() {
                    return Err(DryError::EmbeddingUnavailable(format!("provider status {}", resp.status())));
                }
                let raw: Vec<f32> = resp.json().await.map_err(|e| DryError::EmbeddingUnavailable(e.to_string()))?;
                raw
            }
            EmbeddingSource::Endpoint(url) => {
                let resp = self
                    .client
                    .post(url)
                    .json(&EndpointRequest { code })
                    .send()
                    .await
                    .map_err(|e| DryError::EmbeddingUnavailable(e.to_string()))?;
                if !resp.status().is_success() {
                    return Err(DryError::EmbeddingUnavailable(format!("provider status {}", resp.status())));
                }
                let parsed: EndpointResponse = resp.json().await.map_err(|e| DryError::EmbeddingUnavailable(e.to_string()))?;
                parsed.embedding
            }
        };
        Ok(Some(vector))
    }
}

/// Cosine of `a` and `b`, `0.0` if either is zero-length or zero-magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unrecognized_source() {
        let err = HttpEmbeddingClient::new("ftp://nope", 2048).unwrap_err();
        assert_eq!(err.kind(), "ConfigInvalid");
    }

    #[test]
    fn accepts_huggingface_and_http() {
        assert!(HttpEmbeddingClient::new("huggingface", 2048).is_ok());
        assert!(HttpEmbeddingClient::new("http://localhost:9000/embed", 2048).is_ok());
        assert!(HttpEmbeddingClient::new("https://example.com/embed", 2048).is_ok());
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_of_empty_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}
