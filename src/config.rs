//! Configuration loading and credential resolution.
//!
//! Tunables come from a TOML file; every section and field has a default,
//! so an absent file means "run with defaults". Credentials never live in
//! the file: they are read from the environment exactly once, in
//! [`load_config`], and carried inside [`Config`] to every adapter.
//!
//! ```toml
//! [chunking]
//! max_chars = 2000
//! overlap_chars = 200
//!
//! [retrieval]
//! top_k = 4
//! cache_index = true
//!
//! [embedding]
//! provider = "gemini"          # gemini | openai | ollama | local
//! model = "models/embedding-001"
//!
//! [generation]
//! provider = "gemini"          # gemini | openai | ollama
//! model = "gemini-1.5-pro"
//! temperature = 0.1
//!
//! [extraction]
//! strategy = "local"           # local | layout
//!
//! [sla]
//! parse_policy = "all_or_nothing"   # all_or_nothing | per_line
//!
//! [logging]
//! level = "info"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use docqa_core::chunk::{Chunker, DEFAULT_MAX_CHARS, DEFAULT_OVERLAP_CHARS};
use docqa_core::sla::ParsePolicy;
use docqa_core::{DocQaError, Result};
use serde::Deserialize;

/// Config file used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "./config/docqa.toml";

pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const AZURE_DOC_INTELLI_ENDPOINT: &str = "AZURE_DOC_INTELLI_ENDPOINT";
pub const AZURE_KEY: &str = "AZURE_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub sla: SlaConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Resolved from the environment by [`load_config`].
    #[serde(skip)]
    pub credentials: Credentials,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            overlap_chars: DEFAULT_OVERLAP_CHARS,
        }
    }
}

impl ChunkingConfig {
    pub fn chunker(&self) -> Result<Chunker> {
        Chunker::new(self.max_chars, self.overlap_chars)
    }
}

fn default_max_chars() -> usize {
    DEFAULT_MAX_CHARS
}
fn default_overlap_chars() -> usize {
    DEFAULT_OVERLAP_CHARS
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Chunks retrieved per question, shared by chat and SLA extraction.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Reuse a document's index while its text is unchanged.
    #[serde(default = "default_true")]
    pub cache_index: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            cache_index: true,
        }
    }
}

fn default_top_k() -> usize {
    4
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    #[default]
    Gemini,
    Openai,
    Ollama,
    Local,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingBackend,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL override (Ollama host, OpenAI-compatible gateway, ...).
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::default(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout_secs(),
            url: None,
        }
    }
}

impl EmbeddingConfig {
    /// Configured model, or the provider's default.
    pub fn model(&self) -> &str {
        match (&self.model, self.provider) {
            (Some(m), _) => m,
            (None, EmbeddingBackend::Gemini) => "models/embedding-001",
            (None, EmbeddingBackend::Openai) => "text-embedding-3-small",
            (None, EmbeddingBackend::Ollama) => "nomic-embed-text",
            (None, EmbeddingBackend::Local) => "all-minilm-l6-v2",
        }
    }
}

fn default_batch_size() -> usize {
    100
}
fn default_embedding_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GenerationBackend {
    #[default]
    Gemini,
    Openai,
    Ollama,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default)]
    pub provider: GenerationBackend,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: GenerationBackend::default(),
            model: None,
            temperature: default_temperature(),
            timeout_secs: default_generation_timeout_secs(),
            url: None,
        }
    }
}

impl GenerationConfig {
    pub fn model(&self) -> &str {
        match (&self.model, self.provider) {
            (Some(m), _) => m,
            (None, GenerationBackend::Gemini) => "gemini-1.5-pro",
            (None, GenerationBackend::Openai) => "gpt-4o-mini",
            (None, GenerationBackend::Ollama) => "llama3.1",
        }
    }
}

fn default_temperature() -> f32 {
    0.1
}
fn default_generation_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStrategy {
    /// In-process PDF parsing.
    #[default]
    Local,
    /// Azure Document Intelligence `prebuilt-layout`.
    Layout,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default)]
    pub strategy: ExtractionStrategy,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
    #[serde(default = "default_extraction_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            strategy: ExtractionStrategy::default(),
            api_version: default_api_version(),
            poll_interval_ms: default_poll_interval_ms(),
            max_polls: default_max_polls(),
            timeout_secs: default_extraction_timeout_secs(),
        }
    }
}

fn default_api_version() -> String {
    "2024-11-30".to_string()
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_max_polls() -> u32 {
    120
}
fn default_extraction_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SlaConfig {
    #[serde(default)]
    pub parse_policy: ParsePolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Secrets taken from the environment at startup.
#[derive(Clone, Default)]
pub struct Credentials {
    pub google_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub azure_endpoint: Option<String>,
    pub azure_key: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "<set>").unwrap_or("<unset>");
        f.debug_struct("Credentials")
            .field("google_api_key", &mask(&self.google_api_key))
            .field("openai_api_key", &mask(&self.openai_api_key))
            .field("azure_endpoint", &self.azure_endpoint)
            .field("azure_key", &mask(&self.azure_key))
            .finish()
    }
}

impl Credentials {
    /// Look up every credential the configured providers need.
    ///
    /// Empty values count as missing. All missing variables are reported
    /// together.
    pub fn resolve<F>(config: &Config, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let needs_google = config.embedding.provider == EmbeddingBackend::Gemini
            || config.generation.provider == GenerationBackend::Gemini;
        let needs_openai = config.embedding.provider == EmbeddingBackend::Openai
            || config.generation.provider == GenerationBackend::Openai;
        let needs_azure = config.extraction.strategy == ExtractionStrategy::Layout;

        let creds = Self {
            google_api_key: get(GOOGLE_API_KEY),
            openai_api_key: get(OPENAI_API_KEY),
            azure_endpoint: get(AZURE_DOC_INTELLI_ENDPOINT),
            azure_key: get(AZURE_KEY),
        };

        let mut missing = Vec::new();
        if needs_google && creds.google_api_key.is_none() {
            missing.push(GOOGLE_API_KEY);
        }
        if needs_openai && creds.openai_api_key.is_none() {
            missing.push(OPENAI_API_KEY);
        }
        if needs_azure {
            if creds.azure_endpoint.is_none() {
                missing.push(AZURE_DOC_INTELLI_ENDPOINT);
            }
            if creds.azure_key.is_none() {
                missing.push(AZURE_KEY);
            }
        }

        if !missing.is_empty() {
            return Err(DocQaError::Configuration(format!(
                "missing environment variable(s): {}",
                missing.join(", ")
            )));
        }
        Ok(creds)
    }

    pub fn google_api_key(&self) -> Result<&str> {
        require(&self.google_api_key, GOOGLE_API_KEY)
    }

    pub fn openai_api_key(&self) -> Result<&str> {
        require(&self.openai_api_key, OPENAI_API_KEY)
    }

    pub fn azure_endpoint(&self) -> Result<&str> {
        require(&self.azure_endpoint, AZURE_DOC_INTELLI_ENDPOINT)
    }

    pub fn azure_key(&self) -> Result<&str> {
        require(&self.azure_key, AZURE_KEY)
    }
}

fn require<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| DocQaError::Configuration(format!("{} is not set", name)))
}

impl Config {
    /// Parse and validate TOML. Credentials are left empty.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| DocQaError::Configuration(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.chunking.chunker()?;

        if self.retrieval.top_k == 0 {
            return Err(DocQaError::Configuration(
                "retrieval.top_k must be >= 1".to_string(),
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(DocQaError::Configuration(
                "embedding.batch_size must be >= 1".to_string(),
            ));
        }
        if self.embedding.dims == Some(0) {
            return Err(DocQaError::Configuration(
                "embedding.dims must be > 0 when set".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(DocQaError::Configuration(
                "generation.temperature must be in [0.0, 2.0]".to_string(),
            ));
        }
        if self.extraction.poll_interval_ms == 0 || self.extraction.max_polls == 0 {
            return Err(DocQaError::Configuration(
                "extraction.poll_interval_ms and extraction.max_polls must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load configuration and resolve credentials from the process environment.
///
/// With `path = None` the default path is used when it exists, otherwise
/// built-in defaults apply. An explicit path must exist.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path: Option<PathBuf> = match path {
        Some(p) => Some(p.to_path_buf()),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            default.exists().then_some(default)
        }
    };

    let mut config = match &path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|e| {
                DocQaError::Configuration(format!(
                    "failed to read config file {}: {}",
                    p.display(),
                    e
                ))
            })?;
            Config::from_toml_str(&content)?
        }
        None => Config::default(),
    };

    config.credentials = Credentials::resolve(&config, |name| std::env::var(name).ok())?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.chunking.max_chars, 2000);
        assert_eq!(config.chunking.overlap_chars, 200);
        assert_eq!(config.retrieval.top_k, 4);
        assert!(config.retrieval.cache_index);
        assert_eq!(config.embedding.provider, EmbeddingBackend::Gemini);
        assert_eq!(config.embedding.model(), "models/embedding-001");
        assert_eq!(config.generation.model(), "gemini-1.5-pro");
        assert!((config.generation.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(config.extraction.strategy, ExtractionStrategy::Local);
        assert_eq!(config.sla.parse_policy, ParsePolicy::AllOrNothing);
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::from_toml_str(
            r#"
[chunking]
max_chars = 500
overlap_chars = 50

[embedding]
provider = "ollama"
url = "http://gpu-box:11434"

[generation]
provider = "openai"
model = "gpt-4o"

[sla]
parse_policy = "per_line"
"#,
        )
        .unwrap();
        assert_eq!(config.chunking.chunker().unwrap().max_chars(), 500);
        assert_eq!(config.embedding.model(), "nomic-embed-text");
        assert_eq!(config.embedding.url.as_deref(), Some("http://gpu-box:11434"));
        assert_eq!(config.generation.model(), "gpt-4o");
        assert_eq!(config.sla.parse_policy, ParsePolicy::PerLine);
    }

    #[test]
    fn invalid_values_rejected() {
        for bad in [
            "[chunking]\nmax_chars = 100\noverlap_chars = 100",
            "[retrieval]\ntop_k = 0",
            "[embedding]\nbatch_size = 0",
            "[embedding]\ndims = 0",
            "[generation]\ntemperature = 3.5",
            "[embedding]\nprovider = \"cohere\"",
            "[extraction]\nmax_polls = 0",
        ] {
            let err = Config::from_toml_str(bad).unwrap_err();
            assert!(
                matches!(err, DocQaError::Configuration(_)),
                "expected configuration error for {:?}",
                bad
            );
        }
    }

    #[test]
    fn gemini_requires_google_key() {
        let config = Config::default();
        let err = Credentials::resolve(&config, env(&[])).unwrap_err();
        assert!(err.to_string().contains(GOOGLE_API_KEY));

        let creds = Credentials::resolve(&config, env(&[(GOOGLE_API_KEY, "k")])).unwrap();
        assert_eq!(creds.google_api_key().unwrap(), "k");
    }

    #[test]
    fn blank_values_count_as_missing() {
        let config = Config::default();
        assert!(Credentials::resolve(&config, env(&[(GOOGLE_API_KEY, "  ")])).is_err());
    }

    #[test]
    fn layout_strategy_requires_azure_pair() {
        let config = Config::from_toml_str("[extraction]\nstrategy = \"layout\"").unwrap();
        let err = Credentials::resolve(&config, env(&[(GOOGLE_API_KEY, "k")])).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(AZURE_DOC_INTELLI_ENDPOINT));
        assert!(msg.contains(AZURE_KEY));

        let creds = Credentials::resolve(
            &config,
            env(&[
                (GOOGLE_API_KEY, "k"),
                (AZURE_DOC_INTELLI_ENDPOINT, "https://example.cognitiveservices.azure.com"),
                (AZURE_KEY, "secret"),
            ]),
        )
        .unwrap();
        assert_eq!(creds.azure_key().unwrap(), "secret");
    }

    #[test]
    fn ollama_needs_no_credentials() {
        let config = Config::from_toml_str(
            "[embedding]\nprovider = \"ollama\"\n[generation]\nprovider = \"ollama\"",
        )
        .unwrap();
        let creds = Credentials::resolve(&config, env(&[])).unwrap();
        assert!(creds.google_api_key().is_err());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let creds = Credentials {
            google_api_key: Some("super-secret".to_string()),
            ..Default::default()
        };
        let shown = format!("{:?}", creds);
        assert!(!shown.contains("super-secret"));
        assert!(shown.contains("<set>"));
    }

    #[test]
    fn example_config_parses() {
        let config = Config::from_toml_str(include_str!("../config/docqa.example.toml")).unwrap();
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.extraction.max_polls, 120);
    }

    #[test]
    fn explicit_missing_path_is_configuration_error() {
        let err = load_config(Some(Path::new("/nonexistent/docqa.toml"))).unwrap_err();
        assert!(matches!(err, DocQaError::Configuration(_)));
    }
}
