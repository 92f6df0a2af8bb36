//! In-process store backend.
//!
//! Implements both store traits over DashMap state. Used by the integration
//! tests and as an embedded backend for single-process deployments; it keeps
//! the same alias/index split as a real cluster so migration behaves
//! identically against it.

use super::{IndexInfo, IndexStore, ObjectStore, ScrollCursor};
use crate::error::{Result, TenantryError};
use crate::mapping::IndexMapping;
use crate::types::{
    BulkGetEntry, BulkGetResult, ConflictEntry, Document, DocumentUpdate, FindQuery, FindResult,
    Identity, ObjectRef,
};
use async_trait::async_trait;
use dashmap::DashMap;
use indexmap::IndexMap;
use std::collections::VecDeque;
use std::time::Duration;
use uuid::Uuid;

const DEFAULT_FIND_PER_PAGE: usize = 20;

struct MemIndex {
    mapping: IndexMapping,
    /// Keyed by `(type, id)`, insertion-ordered. A tuple key rather than a
    /// joined string, so ids containing a separator can never collide.
    docs: IndexMap<(String, String), Document>,
}

/// DashMap-backed store implementing [`IndexStore`] and [`ObjectStore`].
///
/// Object-level operations address `target` (an alias or plain index name,
/// resolved per call so an alias cutover takes effect immediately).
pub struct MemoryStore {
    target: String,
    indices: DashMap<String, MemIndex>,
    aliases: DashMap<String, String>,
}

fn doc_key(doc_type: &str, id: &str) -> (String, String) {
    (doc_type.to_string(), id.to_string())
}

impl MemoryStore {
    pub fn new(target: &str) -> Self {
        MemoryStore {
            target: target.to_string(),
            indices: DashMap::new(),
            aliases: DashMap::new(),
        }
    }

    /// Create a physical index pre-filled with documents, the way a store
    /// administrator provisions a tenant index out of band.
    pub fn seed_index(&self, name: &str, mapping: IndexMapping, docs: Vec<Document>) {
        let docs = docs
            .into_iter()
            .map(|d| (doc_key(&d.doc_type, &d.id), d))
            .collect();
        self.indices.insert(name.to_string(), MemIndex { mapping, docs });
    }

    pub fn index_exists(&self, name: &str) -> bool {
        self.indices.contains_key(name)
    }

    pub fn alias_target(&self, alias: &str) -> Option<String> {
        self.aliases.get(alias).map(|r| r.value().clone())
    }

    pub fn doc_count(&self, index: &str) -> usize {
        self.indices.get(index).map(|i| i.docs.len()).unwrap_or(0)
    }

    /// Alias indirection first, then plain index names.
    fn resolve(&self, name: &str) -> Option<String> {
        if let Some(real) = self.aliases.get(name) {
            return Some(real.value().clone());
        }
        if self.indices.contains_key(name) {
            return Some(name.to_string());
        }
        None
    }

    fn resolve_target(&self) -> Result<String> {
        self.resolve(&self.target)
            .ok_or_else(|| TenantryError::IndexNotFound(self.target.clone()))
    }

    fn identity_match(access_set: &std::collections::HashSet<Identity>, ids: &[Identity]) -> bool {
        access_set
            .iter()
            .any(|g| g.is_wildcard() || ids.contains(g))
    }
}

struct MemoryScroll {
    batches: VecDeque<Vec<Document>>,
}

#[async_trait]
impl ScrollCursor for MemoryScroll {
    async fn next_batch(&mut self) -> Result<Vec<Document>> {
        Ok(self.batches.pop_front().unwrap_or_default())
    }
}

#[async_trait]
impl IndexStore for MemoryStore {
    async fn fetch_info(&self, name: &str) -> Result<IndexInfo> {
        let real = match self.resolve(name) {
            Some(real) => real,
            None => return Ok(IndexInfo::not_found(name)),
        };
        let mapping = self
            .indices
            .get(&real)
            .map(|i| i.mapping.clone())
            .unwrap_or_else(IndexMapping::empty);
        let mut aliases = IndexMap::new();
        for entry in self.aliases.iter() {
            if entry.value() == &real {
                aliases.insert(entry.key().clone(), true);
            }
        }
        Ok(IndexInfo {
            index_name: real,
            exists: true,
            aliases,
            mapping,
        })
    }

    async fn create_index(&self, name: &str, mapping: &IndexMapping) -> Result<()> {
        if self.indices.contains_key(name) {
            return Err(TenantryError::IndexAlreadyExists(name.to_string()));
        }
        self.indices.insert(
            name.to_string(),
            MemIndex {
                mapping: mapping.clone(),
                docs: IndexMap::new(),
            },
        );
        Ok(())
    }

    async fn bulk_read(
        &self,
        index: &str,
        batch_size: usize,
        _scroll_duration: Duration,
        _poll_interval: Duration,
    ) -> Result<Box<dyn ScrollCursor>> {
        let snapshot: Vec<Document> = self
            .indices
            .get(index)
            .ok_or_else(|| TenantryError::IndexNotFound(index.to_string()))?
            .docs
            .values()
            .cloned()
            .collect();
        let batch_size = batch_size.max(1);
        let batches = snapshot
            .chunks(batch_size)
            .map(|c| c.to_vec())
            .collect::<VecDeque<_>>();
        Ok(Box::new(MemoryScroll { batches }))
    }

    async fn bulk_write(&self, index: &str, docs: Vec<Document>) -> Result<()> {
        let mut idx = self
            .indices
            .get_mut(index)
            .ok_or_else(|| TenantryError::IndexNotFound(index.to_string()))?;
        for doc in docs {
            idx.docs.insert(doc_key(&doc.doc_type, &doc.id), doc);
        }
        Ok(())
    }

    async fn swap_alias(&self, alias: &str, from: Option<&str>, to: &str) -> Result<()> {
        if !self.indices.contains_key(to) {
            return Err(TenantryError::AliasSwapFailed {
                alias: alias.to_string(),
                reason: format!("target index '{}' does not exist", to),
            });
        }
        let current = self.alias_target(alias);
        match (from, current.as_deref()) {
            (None, None) => {}
            (Some(expected), Some(actual)) if expected == actual => {}
            (expected, actual) => {
                return Err(TenantryError::AliasSwapFailed {
                    alias: alias.to_string(),
                    reason: format!(
                        "alias bound to {:?}, expected {:?}",
                        actual, expected
                    ),
                });
            }
        }
        self.aliases.insert(alias.to_string(), to.to_string());
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, doc_type: &str, id: &str) -> Result<Document> {
        let real = self.resolve_target()?;
        self.indices
            .get(&real)
            .and_then(|idx| idx.docs.get(&doc_key(doc_type, id)).cloned())
            .ok_or_else(|| TenantryError::NotFound {
                doc_type: doc_type.to_string(),
                id: id.to_string(),
            })
    }

    async fn bulk_get(&self, refs: &[ObjectRef]) -> Result<BulkGetResult> {
        let mut documents = Vec::with_capacity(refs.len());
        for r in refs {
            match self.get(&r.doc_type, &r.id).await {
                Ok(doc) => documents.push(BulkGetEntry::found(doc)),
                Err(TenantryError::NotFound { .. }) => {
                    documents.push(BulkGetEntry::error(&r.doc_type, &r.id, "NotFound"))
                }
                Err(e) => return Err(e),
            }
        }
        Ok(BulkGetResult { documents })
    }

    async fn find(&self, query: FindQuery) -> Result<FindResult> {
        let real = self.resolve_target()?;
        let idx = self
            .indices
            .get(&real)
            .ok_or_else(|| TenantryError::IndexNotFound(real.clone()))?;

        let matches: Vec<Document> = idx
            .docs
            .values()
            .filter(|doc| {
                if let Some(ty) = &query.doc_type {
                    if &doc.doc_type != ty {
                        return false;
                    }
                }
                if let Some(ids) = &query.identities {
                    // read access: ro ∪ rw
                    let readable = Self::identity_match(&doc.can_access.ro_identities, ids)
                        || Self::identity_match(&doc.can_access.rw_identities, ids);
                    if !readable {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();

        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(DEFAULT_FIND_PER_PAGE).max(1);
        let total = matches.len();
        let documents = matches
            .into_iter()
            .skip((page - 1) * per_page)
            .take(per_page)
            .collect();

        Ok(FindResult {
            total,
            page,
            per_page,
            documents,
        })
    }

    async fn create(&self, mut doc: Document) -> Result<Document> {
        let real = self.resolve_target()?;
        if doc.id.is_empty() {
            doc.id = Uuid::new_v4().to_string();
        }
        doc.updated_at = Some(chrono::Utc::now().to_rfc3339());
        let mut idx = self
            .indices
            .get_mut(&real)
            .ok_or_else(|| TenantryError::IndexNotFound(real.clone()))?;
        let key = doc_key(&doc.doc_type, &doc.id);
        if idx.docs.contains_key(&key) {
            return Err(TenantryError::Conflict {
                doc_type: doc.doc_type,
                id: doc.id,
            });
        }
        idx.docs.insert(key, doc.clone());
        Ok(doc)
    }

    async fn bulk_create(&self, docs: Vec<Document>) -> Result<Vec<Document>> {
        let mut created = Vec::with_capacity(docs.len());
        for doc in docs {
            created.push(self.create(doc).await?);
        }
        Ok(created)
    }

    async fn update(
        &self,
        doc_type: &str,
        id: &str,
        attributes: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Document> {
        let real = self.resolve_target()?;
        let mut idx = self
            .indices
            .get_mut(&real)
            .ok_or_else(|| TenantryError::IndexNotFound(real.clone()))?;
        let doc = idx
            .docs
            .get_mut(&doc_key(doc_type, id))
            .ok_or_else(|| TenantryError::NotFound {
                doc_type: doc_type.to_string(),
                id: id.to_string(),
            })?;
        for (k, v) in attributes {
            doc.attributes.insert(k, v);
        }
        doc.updated_at = Some(chrono::Utc::now().to_rfc3339());
        Ok(doc.clone())
    }

    async fn delete(&self, doc_type: &str, id: &str) -> Result<()> {
        let real = self.resolve_target()?;
        let mut idx = self
            .indices
            .get_mut(&real)
            .ok_or_else(|| TenantryError::IndexNotFound(real.clone()))?;
        idx.docs
            .shift_remove(&doc_key(doc_type, id))
            .map(|_| ())
            .ok_or_else(|| TenantryError::NotFound {
                doc_type: doc_type.to_string(),
                id: id.to_string(),
            })
    }

    async fn bulk_update(&self, updates: Vec<DocumentUpdate>) -> Result<Vec<Document>> {
        let mut updated = Vec::with_capacity(updates.len());
        for u in updates {
            updated.push(self.update(&u.doc_type, &u.id, u.attributes).await?);
        }
        Ok(updated)
    }

    async fn check_conflicts(&self, refs: &[ObjectRef]) -> Result<Vec<ConflictEntry>> {
        let real = self.resolve_target()?;
        let idx = self
            .indices
            .get(&real)
            .ok_or_else(|| TenantryError::IndexNotFound(real.clone()))?;
        Ok(refs
            .iter()
            .map(|r| ConflictEntry {
                id: r.id.clone(),
                doc_type: r.doc_type.clone(),
                exists: idx.docs.contains_key(&doc_key(&r.doc_type, &r.id)),
            })
            .collect())
    }
}
