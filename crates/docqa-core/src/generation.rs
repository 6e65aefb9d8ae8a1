//! Generation provider trait.
//!
//! Concrete implementations (Gemini, OpenAI, Ollama) live in the `docqa`
//! app crate. Generation is not reproducible: providers sample with a low
//! but nonzero temperature.

use async_trait::async_trait;

use crate::error::Result;

/// A hosted large-language model that turns a prompt into free text.
///
/// Failures are reported as
/// [`DocQaError::GenerationUnavailable`](crate::DocQaError::GenerationUnavailable).
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"gemini-1.5-pro"`).
    fn model_name(&self) -> &str;

    /// Send `prompt` to the model and return its raw text answer.
    async fn generate(&self, prompt: &str) -> Result<String>;
}
