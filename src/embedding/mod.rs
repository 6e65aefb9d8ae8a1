//! Embedding provider implementations.
//!
//! Concrete backends for the [`EmbeddingProvider`] trait defined in
//! `docqa-core`:
//! - **[`GeminiEmbedder`]**: Google Generative Language `batchEmbedContents`.
//! - **[`OpenAiEmbedder`]**: OpenAI (or compatible) `/v1/embeddings`.
//! - **[`OllamaEmbedder`]**: a local Ollama instance's `/api/embed`.
//! - **`LocalEmbedder`**: in-process fastembed models (feature
//!   `local-embeddings-fastembed`); no network calls after model download.
//!
//! # Provider Selection
//!
//! Use [`create_embedder`] to instantiate the backend named by
//! `embedding.provider`:
//!
//! ```rust,no_run
//! # use docqa::config::{Config, Credentials};
//! # use docqa::embedding::create_embedder;
//! let mut config = Config::default(); // provider = "gemini"
//! config.credentials = Credentials {
//!     google_api_key: Some("key".to_string()),
//!     ..Default::default()
//! };
//! let embedder = create_embedder(&config).unwrap();
//! assert_eq!(embedder.model_name(), "models/embedding-001");
//! ```
//!
//! Texts are sent in batches of `embedding.batch_size`. Every failure,
//! including a response with the wrong number or size of vectors, surfaces
//! as [`DocQaError::RetrievalUnavailable`]; nothing is retried.

use async_trait::async_trait;
use docqa_core::embedding::{validate_vectors, EmbeddingProvider};
use docqa_core::{DocQaError, Result};

use crate::config::{Config, EmbeddingBackend, EmbeddingConfig};
use crate::http;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Create the [`EmbeddingProvider`] named by `embedding.provider`.
///
/// # Errors
///
/// Returns [`DocQaError::Configuration`] when a required credential is
/// missing or when `local` is selected without the fastembed feature.
pub fn create_embedder(config: &Config) -> Result<Box<dyn EmbeddingProvider>> {
    let embedding = &config.embedding;
    match embedding.provider {
        EmbeddingBackend::Gemini => Ok(Box::new(GeminiEmbedder::new(
            embedding,
            config.credentials.google_api_key()?,
        )?)),
        EmbeddingBackend::Openai => Ok(Box::new(OpenAiEmbedder::new(
            embedding,
            config.credentials.openai_api_key()?,
        )?)),
        EmbeddingBackend::Ollama => Ok(Box::new(OllamaEmbedder::new(embedding)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        EmbeddingBackend::Local => Ok(Box::new(LocalEmbedder::new(embedding)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        EmbeddingBackend::Local => Err(DocQaError::Configuration(
            "embedding.provider = \"local\" requires the local-embeddings-fastembed feature"
                .to_string(),
        )),
    }
}

/// Split `texts` into provider-sized batches, embed each, and check the
/// combined result.
async fn embed_in_batches<'a, F, Fut>(
    texts: &'a [String],
    batch_size: usize,
    dims: Option<usize>,
    mut embed: F,
) -> Result<Vec<Vec<f32>>>
where
    F: FnMut(&'a [String]) -> Fut,
    Fut: std::future::Future<Output = Result<Vec<Vec<f32>>>>,
{
    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let embedded = embed(batch).await?;
        validate_vectors(&embedded, batch.len(), dims)?;
        vectors.extend(embedded);
    }
    Ok(vectors)
}

fn parse_vector(value: &serde_json::Value, service: &str) -> Result<Vec<f32>> {
    let values = value.as_array().ok_or_else(|| {
        DocQaError::RetrievalUnavailable(format!(
            "Invalid {} response: embedding is not an array",
            service
        ))
    })?;
    values
        .iter()
        .map(|v| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| {
                DocQaError::RetrievalUnavailable(format!(
                    "Invalid {} response: non-numeric embedding value",
                    service
                ))
            })
        })
        .collect()
}

// ============ Gemini Provider ============

/// Embedding provider using the Google Generative Language API.
pub struct GeminiEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dims: Option<usize>,
    batch_size: usize,
    api_key: String,
}

impl GeminiEmbedder {
    pub fn new(config: &EmbeddingConfig, api_key: &str) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            model: gemini_model_path(config.model()),
            dims: config.dims,
            batch_size: config.batch_size,
            api_key: api_key.to_string(),
        })
    }

    async fn embed_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let requests: Vec<serde_json::Value> = texts
            .iter()
            .map(|text| {
                serde_json::json!({
                    "model": self.model,
                    "content": { "parts": [{ "text": text }] },
                })
            })
            .collect();
        let body = serde_json::json!({ "requests": requests });

        let url = http::join_url(
            &self.base_url,
            &format!("v1beta/{}:batchEmbedContents", self.model),
        );
        let request = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body);

        let json = http::send_json(request, "Gemini", DocQaError::RetrievalUnavailable).await?;
        parse_gemini_response(&json)
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> Option<usize> {
        self.dims
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        embed_in_batches(texts, self.batch_size, self.dims, |batch| {
            self.embed_once(batch)
        })
        .await
    }
}

/// Gemini addresses models as `models/<name>`.
fn gemini_model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

/// Parse a `batchEmbedContents` response: `embeddings[].values`.
fn parse_gemini_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            DocQaError::RetrievalUnavailable(
                "Invalid Gemini response: missing embeddings array".to_string(),
            )
        })?;

    embeddings
        .iter()
        .map(|item| {
            let values = item.get("values").ok_or_else(|| {
                DocQaError::RetrievalUnavailable(
                    "Invalid Gemini response: missing values".to_string(),
                )
            })?;
            parse_vector(values, "Gemini")
        })
        .collect()
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI embeddings API.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dims: Option<usize>,
    batch_size: usize,
    api_key: String,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig, api_key: &str) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            model: config.model().to_string(),
            dims: config.dims,
            batch_size: config.batch_size,
            api_key: api_key.to_string(),
        })
    }

    async fn embed_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        if let Some(dims) = self.dims {
            body["dimensions"] = serde_json::json!(dims);
        }

        let request = self
            .client
            .post(http::join_url(&self.base_url, "v1/embeddings"))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body);

        let json = http::send_json(request, "OpenAI", DocQaError::RetrievalUnavailable).await?;
        parse_openai_response(&json)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> Option<usize> {
        self.dims
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        embed_in_batches(texts, self.batch_size, self.dims, |batch| {
            self.embed_once(batch)
        })
        .await
    }
}

/// Parse the OpenAI embeddings API response JSON.
///
/// Extracts the `data[].embedding` arrays, ordered by their `index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| {
            DocQaError::RetrievalUnavailable(
                "Invalid OpenAI response: missing data array".to_string(),
            )
        })?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item.get("embedding").ok_or_else(|| {
            DocQaError::RetrievalUnavailable(
                "Invalid OpenAI response: missing embedding".to_string(),
            )
        })?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, parse_vector(embedding, "OpenAI")?));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured URL (default:
/// `http://localhost:11434`). Requires the model to be pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: Option<usize>,
    batch_size: usize,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| OLLAMA_BASE_URL.to_string()),
            model: config.model().to_string(),
            dims: config.dims,
            batch_size: config.batch_size,
        })
    }

    async fn embed_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let request = self
            .client
            .post(http::join_url(&self.url, "api/embed"))
            .json(&body);

        let json = http::send_json(request, "Ollama", DocQaError::RetrievalUnavailable)
            .await
            .map_err(|e| match e {
                DocQaError::RetrievalUnavailable(msg) => DocQaError::RetrievalUnavailable(
                    format!("{} (is Ollama running at {}?)", msg, self.url),
                ),
                other => other,
            })?;
        parse_ollama_response(&json)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> Option<usize> {
        self.dims
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        embed_in_batches(texts, self.batch_size, self.dims, |batch| {
            self.embed_once(batch)
        })
        .await
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            DocQaError::RetrievalUnavailable(
                "Invalid Ollama response: missing embeddings array".to_string(),
            )
        })?;

    embeddings
        .iter()
        .map(|embedding| parse_vector(embedding, "Ollama"))
        .collect()
}

// ============ Local Provider (fastembed) ============

/// In-process embeddings via fastembed.
///
/// The model is downloaded from Hugging Face on first use and loaded once
/// per process.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalEmbedder {
    model_name: String,
    model: fastembed::EmbeddingModel,
    dims: Option<usize>,
    batch_size: usize,
    loaded: std::sync::Arc<std::sync::Mutex<Option<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = config.model().to_string();
        Ok(Self {
            model: fastembed_model(&model_name)?,
            model_name,
            dims: config.dims,
            batch_size: config.batch_size,
            loaded: Default::default(),
        })
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl EmbeddingProvider for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> Option<usize> {
        self.dims
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let texts = texts.to_vec();
        let count = texts.len();
        let model = self.model.clone();
        let batch_size = self.batch_size;
        let loaded = self.loaded.clone();

        let vectors = tokio::task::spawn_blocking(move || {
            let mut guard = loaded
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if guard.is_none() {
                let embedding = fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(model).with_show_download_progress(false),
                )
                .map_err(|e| {
                    DocQaError::RetrievalUnavailable(format!(
                        "Failed to initialize local embedding model: {}",
                        e
                    ))
                })?;
                *guard = Some(embedding);
            }
            match guard.as_mut() {
                Some(embedding) => embedding.embed(texts, Some(batch_size)).map_err(|e| {
                    DocQaError::RetrievalUnavailable(format!("Local embedding failed: {}", e))
                }),
                None => Err(DocQaError::RetrievalUnavailable(
                    "local embedding model not loaded".to_string(),
                )),
            }
        })
        .await
        .map_err(|e| DocQaError::RetrievalUnavailable(format!("embedding task failed: {}", e)))??;

        validate_vectors(&vectors, count, self.dims)?;
        Ok(vectors)
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        other => Err(DocQaError::Configuration(format!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1.5, multilingual-e5-small, multilingual-e5-base",
            other
        ))),
    }
}
