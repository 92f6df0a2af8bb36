//! Access-control overlay.
//!
//! Decorates an [`ObjectStore`] with ownership stamping on write and
//! authorization checks on read/mutate, closing over one request's
//! [`AccessibleIdentitySet`]. Same trait in and out, so upper layers use it
//! as a drop-in substitute for the bare store.

use crate::error::{Result, TenantryError};
use crate::identity::AccessibleIdentitySet;
use crate::store::ObjectStore;
use crate::types::{
    BulkGetEntry, BulkGetResult, CanAccess, ConflictEntry, Document, DocumentUpdate, FindQuery,
    FindResult, ObjectRef,
};
use async_trait::async_trait;
use std::sync::Arc;

/// One overlay per request; construct it after resolving the caller's
/// identity set and route every store call of that request through it.
pub struct AccessControlOverlay {
    inner: Arc<dyn ObjectStore>,
    identities: AccessibleIdentitySet,
}

impl AccessControlOverlay {
    pub fn new(inner: Arc<dyn ObjectStore>, identities: AccessibleIdentitySet) -> Self {
        AccessControlOverlay { inner, identities }
    }

    /// Ownership stamp for newly created documents: the caller's full
    /// identity set as read/write grants. The resolver always yields at
    /// least `user/anonymous`, so `rw_identities` is never empty.
    fn stamp(&self, doc: &mut Document) {
        doc.can_access = CanAccess::owned_by(self.identities.identities.clone());
    }
}

#[async_trait]
impl ObjectStore for AccessControlOverlay {
    async fn get(&self, doc_type: &str, id: &str) -> Result<Document> {
        let doc = self.inner.get(doc_type, id).await?;
        if !self.identities.can_read(&doc.can_access) {
            tracing::debug!("[ACL] get {}/{} denied", doc_type, id);
            return Err(TenantryError::Forbidden {
                doc_type: doc_type.to_string(),
                id: id.to_string(),
            });
        }
        Ok(doc)
    }

    /// Per-object read checks; an inaccessible document becomes an error
    /// entry in the same response instead of aborting the batch.
    async fn bulk_get(&self, refs: &[ObjectRef]) -> Result<BulkGetResult> {
        let fetched = self.inner.bulk_get(refs).await?;
        let documents = fetched
            .documents
            .into_iter()
            .map(|entry| match &entry.document {
                Some(doc) if !self.identities.can_read(&doc.can_access) => {
                    tracing::debug!("[ACL] bulk_get {}/{} denied", entry.doc_type, entry.id);
                    BulkGetEntry::error(&entry.doc_type, &entry.id, "Forbidden")
                }
                _ => entry,
            })
            .collect();
        Ok(BulkGetResult { documents })
    }

    /// Attaches the caller's identity set as an explicit filter; the store's
    /// query evaluation does the filtering, the overlay adds none after.
    async fn find(&self, mut query: FindQuery) -> Result<FindResult> {
        query.identities = Some(self.identities.to_sorted_vec());
        query.tenants = Some(self.identities.tenants.clone());
        self.inner.find(query).await
    }

    async fn create(&self, mut doc: Document) -> Result<Document> {
        self.stamp(&mut doc);
        self.inner.create(doc).await
    }

    async fn bulk_create(&self, mut docs: Vec<Document>) -> Result<Vec<Document>> {
        for doc in &mut docs {
            self.stamp(doc);
        }
        self.inner.bulk_create(docs).await
    }

    async fn update(
        &self,
        doc_type: &str,
        id: &str,
        attributes: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Document> {
        let current = self.inner.get(doc_type, id).await?;
        if !self.identities.can_write(&current.can_access) {
            tracing::debug!("[ACL] update {}/{} denied", doc_type, id);
            return Err(TenantryError::NotAuthorized {
                doc_type: doc_type.to_string(),
                id: id.to_string(),
            });
        }
        self.inner.update(doc_type, id, attributes).await
    }

    async fn delete(&self, doc_type: &str, id: &str) -> Result<()> {
        let current = self.inner.get(doc_type, id).await?;
        if !self.identities.can_write(&current.can_access) {
            tracing::debug!("[ACL] delete {}/{} denied", doc_type, id);
            return Err(TenantryError::Forbidden {
                doc_type: doc_type.to_string(),
                id: id.to_string(),
            });
        }
        self.inner.delete(doc_type, id).await
    }

    /// Passthrough; explicitly outside this layer's authorization contract.
    async fn bulk_update(&self, updates: Vec<DocumentUpdate>) -> Result<Vec<Document>> {
        self.inner.bulk_update(updates).await
    }

    /// Passthrough; explicitly outside this layer's authorization contract.
    async fn check_conflicts(&self, refs: &[ObjectRef]) -> Result<Vec<ConflictEntry>> {
        self.inner.check_conflicts(refs).await
    }
}
