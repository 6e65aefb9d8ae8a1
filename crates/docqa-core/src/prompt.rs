//! Prompt templates with named placeholders.
//!
//! A template is literal text with `{name}` placeholders; `{{` and `}}`
//! stand for literal braces. Rendering is a single pass over the parsed
//! template, so braces inside substituted values are never interpreted.
//!
//! Two templates drive the answering flows:
//! - [`chat_template`]: `{question}` and `{context}`, short grounded answers.
//! - [`extraction_template`]: `{context}` only, the six SLA questions are
//!   part of the text and the model answers one per line.

use std::collections::HashMap;

use crate::error::{DocQaError, Result};
use crate::index::Hit;

/// Free-form question answering over retrieved context.
pub const CHAT_TEMPLATE: &str = "You are an assistant for question-answering tasks.
Use the following pieces of retrieved context to answer the question.
If the answer is not in the context, just say that you don't know. Do not make up an answer.
Use ten sentences maximum and keep the answer concise and to the point, mostly a single line.
Question: {question}
Context: {context}
Answer:
";

/// The fixed SLA question battery, in answer order.
pub const SLA_QUESTIONS: [&str; 6] = [
    "What is the SLA? or What is the name of the SLA?",
    "What are the names of the parties involved?",
    "What system is concerned in this SLA?",
    "Explain the description of the SLA in detail.",
    "What metrics are associated with this SLA?",
    "What is the exact page number of the SLA?",
];

/// Six-question SLA extraction over retrieved context.
pub const EXTRACTION_TEMPLATE: &str = "You are an assistant focused on giving detailed answers to specific questions based on the context provided.
Answer the following questions using only the context. If an answer is not available, answer \"I don't know.\" for that question.

1. What is the SLA? or What is the name of the SLA?
2. What are the names of the parties involved?
3. What system is concerned in this SLA?
4. Explain the description of the SLA in detail.
5. What metrics are associated with this SLA?
6. What is the exact page number of the SLA?

Context: {context}

Give exactly six lines, one answer per line, in the order of the questions. Do not number the answers and do not add any other text.
";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parse template text.
    ///
    /// # Errors
    ///
    /// [`DocQaError::Configuration`] for an unclosed `{`, a stray `}`, or a
    /// placeholder name that is empty or not `[A-Za-z0-9_]`.
    pub fn new(text: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for n in chars.by_ref() {
                        if n == '}' {
                            closed = true;
                            break;
                        }
                        name.push(n);
                    }
                    if !closed {
                        return Err(DocQaError::Configuration(format!(
                            "unclosed placeholder '{{{}' in prompt template",
                            name
                        )));
                    }
                    if name.is_empty() || !name.chars().all(|n| n.is_ascii_alphanumeric() || n == '_')
                    {
                        return Err(DocQaError::Configuration(format!(
                            "invalid placeholder name '{}' in prompt template",
                            name
                        )));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name));
                }
                '}' => {
                    return Err(DocQaError::Configuration(
                        "unmatched '}' in prompt template".to_string(),
                    ));
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    /// Placeholder names in order of first appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for seg in &self.segments {
            if let Segment::Placeholder(name) = seg {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Substitute every placeholder. Extra values are ignored.
    ///
    /// # Errors
    ///
    /// [`DocQaError::MissingPlaceholder`] naming the first placeholder
    /// without a value.
    pub fn render(&self, values: &HashMap<&str, &str>) -> Result<String> {
        let mut out = String::new();
        for seg in &self.segments {
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = values
                        .get(name.as_str())
                        .ok_or_else(|| DocQaError::MissingPlaceholder(name.clone()))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

/// The built-in chat template.
pub fn chat_template() -> Result<PromptTemplate> {
    PromptTemplate::new(CHAT_TEMPLATE)
}

/// The built-in SLA extraction template.
pub fn extraction_template() -> Result<PromptTemplate> {
    PromptTemplate::new(EXTRACTION_TEMPLATE)
}

/// Join retrieved chunks into a context block, in retrieval order.
pub fn format_context(hits: &[Hit]) -> String {
    hits.iter()
        .map(|h| h.chunk.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n")
}
