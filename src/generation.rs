//! Generation provider implementations.
//!
//! - **[`GeminiGenerator`]**: `models/{model}:generateContent`.
//! - **[`OpenAiGenerator`]**: OpenAI (or compatible) chat completions.
//! - **[`OllamaGenerator`]**: a local Ollama instance's `/api/generate`.
//!
//! Each call sends the full prompt as a single user message and returns the
//! model's text. Failures surface as
//! [`DocQaError::GenerationUnavailable`]; nothing is retried.

use async_trait::async_trait;
use docqa_core::generation::GenerationProvider;
use docqa_core::{DocQaError, Result};

use crate::config::{Config, GenerationBackend, GenerationConfig};
use crate::embedding::{GEMINI_BASE_URL, OLLAMA_BASE_URL, OPENAI_BASE_URL};
use crate::http;

/// Create the [`GenerationProvider`] named by `generation.provider`.
pub fn create_generator(config: &Config) -> Result<Box<dyn GenerationProvider>> {
    let generation = &config.generation;
    match generation.provider {
        GenerationBackend::Gemini => Ok(Box::new(GeminiGenerator::new(
            generation,
            config.credentials.google_api_key()?,
        )?)),
        GenerationBackend::Openai => Ok(Box::new(OpenAiGenerator::new(
            generation,
            config.credentials.openai_api_key()?,
        )?)),
        GenerationBackend::Ollama => Ok(Box::new(OllamaGenerator::new(generation)?)),
    }
}

fn invalid(service: &str, what: &str) -> DocQaError {
    DocQaError::GenerationUnavailable(format!("Invalid {} response: {}", service, what))
}

// ============ Gemini ============

pub struct GeminiGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    api_key: String,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig, api_key: &str) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            model: config.model().trim_start_matches("models/").to_string(),
            temperature: config.temperature,
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl GenerationProvider for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": self.temperature },
        });
        let url = http::join_url(
            &self.base_url,
            &format!("v1beta/models/{}:generateContent", self.model),
        );
        let request = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body);

        let json = http::send_json(request, "Gemini", DocQaError::GenerationUnavailable).await?;
        parse_gemini_response(&json)
    }
}

/// Concatenate `candidates[0].content.parts[].text`.
///
/// A response without candidates was blocked; its `promptFeedback` reason
/// is reported.
fn parse_gemini_response(json: &serde_json::Value) -> Result<String> {
    let candidate = match json
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
    {
        Some(candidate) => candidate,
        None => {
            let reason = json
                .pointer("/promptFeedback/blockReason")
                .and_then(|r| r.as_str())
                .unwrap_or("no candidates");
            return Err(DocQaError::GenerationUnavailable(format!(
                "Gemini returned no answer: {}",
                reason
            )));
        }
    };

    let parts = candidate
        .pointer("/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| invalid("Gemini", "missing content parts"))?;

    Ok(parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join(""))
}

// ============ OpenAI ============

pub struct OpenAiGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    api_key: String,
}

impl OpenAiGenerator {
    pub fn new(config: &GenerationConfig, api_key: &str) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            model: config.model().to_string(),
            temperature: config.temperature,
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl GenerationProvider for OpenAiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
        });
        let request = self
            .client
            .post(http::join_url(&self.base_url, "v1/chat/completions"))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body);

        let json = http::send_json(request, "OpenAI", DocQaError::GenerationUnavailable).await?;
        parse_openai_response(&json)
    }
}

fn parse_openai_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| invalid("OpenAI", "missing choices[0].message.content"))
}

// ============ Ollama ============

pub struct OllamaGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| OLLAMA_BASE_URL.to_string()),
            model: config.model().to_string(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl GenerationProvider for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": self.temperature },
        });
        let request = self
            .client
            .post(http::join_url(&self.url, "api/generate"))
            .json(&body);

        let json = http::send_json(request, "Ollama", DocQaError::GenerationUnavailable).await?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<String> {
    json.get("response")
        .and_then(|r| r.as_str())
        .map(str::to_string)
        .ok_or_else(|| invalid("Ollama", "missing response"))
}
