//! Per-document vector index cache.
//!
//! Indexes are keyed by document name and tagged with the SHA-256 of the
//! document text. A lookup only hits when the text is unchanged, so a cached
//! index always holds exactly the chunks and vectors a fresh build would
//! produce with a deterministic embedder.
//!
//! Builds happen outside the lock. A finished index is swapped in whole, so
//! a reader sees either the previous index or the new one, never a partial
//! build. Nothing is inserted for a build that failed.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::index::VectorIndex;
use crate::models::Document;

struct CachedIndex {
    content_hash: String,
    index: Arc<VectorIndex>,
}

/// Thread-safe map from document name to its most recent index.
#[derive(Default)]
pub struct IndexCache {
    entries: RwLock<HashMap<String, CachedIndex>>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached index for `doc`, if one was built from identical text.
    pub fn get(&self, doc: &Document) -> Option<Arc<VectorIndex>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&doc.name)
            .filter(|cached| cached.content_hash == doc.content_hash)
            .map(|cached| Arc::clone(&cached.index))
    }

    /// Store a freshly built index for `doc`, replacing any previous one.
    pub fn insert(&self, doc: &Document, index: VectorIndex) -> Arc<VectorIndex> {
        let index = Arc::new(index);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            doc.name.clone(),
            CachedIndex {
                content_hash: doc.content_hash.clone(),
                index: Arc::clone(&index),
            },
        );
        index
    }

    /// Drop the cached index for a document name.
    pub fn invalidate(&self, name: &str) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(name);
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunker;

    fn index_for(doc: &Document) -> VectorIndex {
        let chunks = Chunker::default().split(&doc.text);
        let vectors = chunks.iter().map(|_| vec![1.0, 0.0]).collect();
        VectorIndex::build(chunks, vectors).unwrap()
    }

    #[test]
    fn hit_requires_same_content() {
        let cache = IndexCache::new();
        let doc = Document::new("sla.pdf", "Uptime is 99.9%.");
        assert!(cache.get(&doc).is_none());

        let stored = cache.insert(&doc, index_for(&doc));
        let hit = cache.get(&doc).expect("cached");
        assert!(Arc::ptr_eq(&stored, &hit));

        let changed = Document::new("sla.pdf", "Uptime is 99.5%.");
        assert!(cache.get(&changed).is_none());
    }

    #[test]
    fn insert_replaces_previous_version() {
        let cache = IndexCache::new();
        let v1 = Document::new("sla.pdf", "first");
        let v2 = Document::new("sla.pdf", "second");
        cache.insert(&v1, index_for(&v1));
        cache.insert(&v2, index_for(&v2));

        assert_eq!(cache.len(), 1);
        assert!(cache.get(&v1).is_none());
        assert!(cache.get(&v2).is_some());
    }

    #[test]
    fn indexes_are_not_shared_across_documents() {
        let cache = IndexCache::new();
        let a = Document::new("a.pdf", "shared text");
        let b = Document::new("b.pdf", "shared text");
        cache.insert(&a, index_for(&a));
        assert!(cache.get(&b).is_none());

        cache.invalidate("a.pdf");
        assert!(cache.is_empty());
    }
}
