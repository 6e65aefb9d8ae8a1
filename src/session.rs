//! Loaded documents and their per-document conversations.

use docqa_core::models::{Conversation, Document, Turn};
use docqa_core::{DocQaError, Result};

use crate::pipeline::Assistant;

struct Entry {
    document: Document,
    conversation: Conversation,
}

/// Documents in load order, each with its own question/answer history.
#[derive(Default)]
pub struct Session {
    entries: Vec<Entry>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document. A document with the same name is replaced in place
    /// and its conversation starts over.
    pub fn load(&mut self, document: Document) {
        match self.entries.iter_mut().find(|e| e.document.name == document.name) {
            Some(entry) => {
                entry.document = document;
                entry.conversation = Conversation::new();
            }
            None => self.entries.push(Entry {
                document,
                conversation: Conversation::new(),
            }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Document> {
        self.entry(name).map(|e| &e.document)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.document.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ask a question about a loaded document.
    ///
    /// The turn is recorded only when an answer comes back.
    pub async fn ask(&mut self, assistant: &Assistant, name: &str, question: &str) -> Result<String> {
        let index = self
            .entries
            .iter()
            .position(|e| e.document.name == name)
            .ok_or_else(|| unknown_document(name))?;

        let answer = assistant
            .answer_chat_question(&self.entries[index].document, question)
            .await?;
        self.entries[index].conversation.push(question, answer.clone());
        Ok(answer)
    }

    /// Turns for a document, oldest first.
    pub fn history(&self, name: &str) -> Result<&[Turn]> {
        self.entry(name)
            .map(|e| e.conversation.turns())
            .ok_or_else(|| unknown_document(name))
    }

    fn entry(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.document.name == name)
    }
}

fn unknown_document(name: &str) -> DocQaError {
    DocQaError::Configuration(format!("no document named '{}' is loaded", name))
}
