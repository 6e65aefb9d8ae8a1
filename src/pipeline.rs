//! Retrieval-augmented flows: chat answers and SLA extraction.
//!
//! Both flows share one path:
//!
//! ```text
//! Document ──▶ chunk ──▶ embed ──▶ VectorIndex   (cached by content hash)
//!                                      │
//! query ──▶ embed ──▶ top-k ──▶ prompt ──▶ generate ──▶ answer
//! ```
//!
//! The chat flow returns the model's raw text; the SLA flow post-processes
//! it into an [`SlaRecord`]. A failure anywhere aborts the current request
//! only. Indexes are cached only after a complete, successful build.

use std::collections::HashMap;
use std::sync::Arc;

use docqa_core::cache::IndexCache;
use docqa_core::chunk::Chunker;
use docqa_core::embedding::EmbeddingProvider;
use docqa_core::generation::GenerationProvider;
use docqa_core::index::{Hit, VectorIndex};
use docqa_core::models::Document;
use docqa_core::prompt::{
    chat_template, extraction_template, format_context, PromptTemplate, SLA_QUESTIONS,
};
use docqa_core::sla::{parse_sla_answer, ParsePolicy, SlaRecord};
use docqa_core::Result;
use tracing::{debug, info};

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::generation::create_generator;

/// Query used to retrieve context for SLA extraction.
pub fn sla_retrieval_query() -> String {
    SLA_QUESTIONS.join(" ")
}

/// Ties a chunker, an embedder, a generator and the index cache together.
pub struct Assistant {
    chunker: Chunker,
    top_k: usize,
    cache_index: bool,
    parse_policy: ParsePolicy,
    embedder: Box<dyn EmbeddingProvider>,
    generator: Box<dyn GenerationProvider>,
    cache: IndexCache,
    chat_prompt: PromptTemplate,
    extraction_prompt: PromptTemplate,
}

impl Assistant {
    /// Assemble an assistant around explicit providers.
    pub fn new(
        config: &Config,
        embedder: Box<dyn EmbeddingProvider>,
        generator: Box<dyn GenerationProvider>,
    ) -> Result<Self> {
        Ok(Self {
            chunker: config.chunking.chunker()?,
            top_k: config.retrieval.top_k,
            cache_index: config.retrieval.cache_index,
            parse_policy: config.sla.parse_policy,
            embedder,
            generator,
            cache: IndexCache::new(),
            chat_prompt: chat_template()?,
            extraction_prompt: extraction_template()?,
        })
    }

    /// Assemble an assistant with the providers named in configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let embedder = create_embedder(config)?;
        let generator = create_generator(config)?;
        info!(
            "Using embedding model {} and generation model {}",
            embedder.model_name(),
            generator.model_name()
        );
        Self::new(config, embedder, generator)
    }

    /// Index for `document`, from cache when its text is unchanged.
    pub async fn index_for(&self, document: &Document) -> Result<Arc<VectorIndex>> {
        if self.cache_index {
            if let Some(index) = self.cache.get(document) {
                debug!("Index cache hit for {}", document.name);
                return Ok(index);
            }
        }

        let chunks = self.chunker.split(&document.text);
        info!("Indexing {} ({} chunks)", document.name, chunks.len());

        let vectors = if chunks.is_empty() {
            Vec::new()
        } else {
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            self.embedder.embed_batch(&texts).await?
        };
        let index = VectorIndex::build(chunks, vectors)?;

        if self.cache_index {
            Ok(self.cache.insert(document, index))
        } else {
            Ok(Arc::new(index))
        }
    }

    /// The `top_k` chunks of `document` most similar to `query`.
    pub async fn retrieve(&self, document: &Document, query: &str) -> Result<Vec<Hit>> {
        let index = self.index_for(document).await?;
        let query_vector = self.embedder.embed(query).await?;
        let hits = index.query(&query_vector, self.top_k)?;
        debug!(
            "Retrieved {} chunks for {}: {:?}",
            hits.len(),
            document.name,
            hits.iter().map(|h| h.chunk.index).collect::<Vec<_>>()
        );
        Ok(hits)
    }

    /// Answer a free-form question from the document's content.
    pub async fn answer_chat_question(&self, document: &Document, question: &str) -> Result<String> {
        let hits = self.retrieve(document, question).await?;
        let context = format_context(&hits);
        let prompt = self.chat_prompt.render(&HashMap::from([
            ("question", question),
            ("context", context.as_str()),
        ]))?;

        info!("Asking {} about {}", self.generator.model_name(), document.name);
        self.generator.generate(&prompt).await
    }

    /// Extract the six SLA fields from the document.
    pub async fn extract_sla_info(&self, document: &Document) -> Result<SlaRecord> {
        let hits = self.retrieve(document, &sla_retrieval_query()).await?;
        let context = format_context(&hits);
        let prompt = self
            .extraction_prompt
            .render(&HashMap::from([("context", context.as_str())]))?;

        info!("Extracting SLA information from {}", document.name);
        let raw = self.generator.generate(&prompt).await?;
        debug!("Raw SLA answer: {:?}", raw);
        Ok(parse_sla_answer(&raw, self.parse_policy))
    }

    /// Forget the cached index for a document name.
    pub fn forget(&self, name: &str) {
        self.cache.invalidate(name);
    }

    pub fn cached_indexes(&self) -> usize {
        self.cache.len()
    }
}
