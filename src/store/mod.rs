//! Document-store collaborator interfaces.
//!
//! The store itself (transport, retries, query evaluation) lives outside
//! this crate; these traits are the seam the migration engine and the
//! access-control overlay are written against. [`memory::MemoryStore`] is
//! the in-process reference implementation.

pub mod memory;

use crate::error::Result;
use crate::mapping::IndexMapping;
use crate::types::{
    BulkGetResult, ConflictEntry, Document, DocumentUpdate, FindQuery, FindResult, ObjectRef,
};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::time::Duration;

/// What the store knows about an index or alias name.
///
/// "Not found" is a normal result (`exists == false`), never an error;
/// errors are reserved for transport failure.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexInfo {
    /// Real (physical) index name; equals the queried name when that name
    /// is a plain index rather than an alias.
    pub index_name: String,
    pub exists: bool,
    /// Alias name -> bound flag for aliases pointing at `index_name`.
    pub aliases: IndexMap<String, bool>,
    pub mapping: IndexMapping,
}

impl IndexInfo {
    pub fn not_found(name: &str) -> Self {
        IndexInfo {
            index_name: name.to_string(),
            exists: false,
            aliases: IndexMap::new(),
            mapping: IndexMapping::empty(),
        }
    }

    /// Whether `alias` currently fronts this index.
    pub fn is_alias_backed(&self, alias: &str) -> bool {
        self.aliases.get(alias).copied().unwrap_or(false)
    }
}

/// Server-side paged read over one index. Yields an empty batch when the
/// result set is exhausted.
#[async_trait]
pub trait ScrollCursor: Send {
    async fn next_batch(&mut self) -> Result<Vec<Document>>;
}

/// Index-level operations consumed by the migration engine.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Resolve `name` as an index or alias. Must not error on "not found".
    async fn fetch_info(&self, name: &str) -> Result<IndexInfo>;

    async fn create_index(&self, name: &str, mapping: &IndexMapping) -> Result<()>;

    /// Open a scroll cursor over `index`. `scroll_duration` bounds how long
    /// the store keeps an idle cursor alive and `poll_interval` paces its
    /// internal re-polling while busy; retry policy is the store's own.
    async fn bulk_read(
        &self,
        index: &str,
        batch_size: usize,
        scroll_duration: Duration,
        poll_interval: Duration,
    ) -> Result<Box<dyn ScrollCursor>>;

    async fn bulk_write(&self, index: &str, docs: Vec<Document>) -> Result<()>;

    /// Atomically repoint `alias` from `from` (None when the alias does not
    /// exist yet) to `to`.
    async fn swap_alias(&self, alias: &str, from: Option<&str>, to: &str) -> Result<()>;
}

/// Object-level operations. The access-control overlay implements this same
/// trait over an inner implementation, so it is a drop-in substitute at the
/// call site.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, doc_type: &str, id: &str) -> Result<Document>;

    async fn bulk_get(&self, refs: &[ObjectRef]) -> Result<BulkGetResult>;

    async fn find(&self, query: FindQuery) -> Result<FindResult>;

    /// Create a document. An empty id is replaced with a generated one and
    /// the stored document is returned. Creating over an existing
    /// `{type, id}` fails with `Conflict`; `check_conflicts` is the
    /// pre-flight for callers that need to know beforehand.
    async fn create(&self, doc: Document) -> Result<Document>;

    async fn bulk_create(&self, docs: Vec<Document>) -> Result<Vec<Document>>;

    /// Merge `attributes` into the existing document's attributes.
    async fn update(
        &self,
        doc_type: &str,
        id: &str,
        attributes: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Document>;

    async fn delete(&self, doc_type: &str, id: &str) -> Result<()>;

    async fn bulk_update(&self, updates: Vec<DocumentUpdate>) -> Result<Vec<Document>>;

    async fn check_conflicts(&self, refs: &[ObjectRef]) -> Result<Vec<ConflictEntry>>;
}
