//! Per-tenant data isolation over a shared document store.
//!
//! Each tenant's data lives in its own versioned, alias-fronted index;
//! every read/write is filtered by the acting principal's identity set.
//! Two subsystems carry the weight:
//!
//! - [`migration::Migrator`] brings each tenant index up to the current
//!   mapping schema via reindex-and-alias-cutover (never in-place schema
//!   mutation).
//! - [`overlay::AccessControlOverlay`] wraps every object-store operation
//!   with ownership stamping and authorization checks.
//!
//! The document store itself is a collaborator behind the traits in
//! [`store`]; [`store::memory::MemoryStore`] is the in-process reference
//! backend.
//!
//! ```rust
//! use std::sync::Arc;
//! use tenantry::{
//!     identity_transformer, AccessibleIdentitySet, MemoryStore, MigrationConfig, Migrator,
//!     SchemaRegistry, SessionState,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> tenantry::Result<()> {
//! let store = Arc::new(MemoryStore::new("tenant_acme"));
//! let registry = SchemaRegistry::new();
//!
//! // Once at startup, per tenant index:
//! let migrator = Migrator::new(
//!     store.clone(),
//!     &registry,
//!     MigrationConfig::from_env(),
//!     identity_transformer(),
//! )?;
//! migrator.migrate("tenant_acme").await?;
//!
//! // Once per request:
//! let session = SessionState {
//!     user_name: "alice".to_string(),
//!     roles: vec!["admin".to_string()],
//!     tenants: vec!["acme".to_string()],
//! };
//! let identities = AccessibleIdentitySet::resolve(Some(&session));
//! let client = tenantry::AccessControlOverlay::new(store, identities);
//! # let _ = client;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod identity;
pub mod mapping;
pub mod migration;
pub mod overlay;
pub mod store;
pub mod types;

pub use error::{Result, TenantryError};
pub use identity::{AccessibleIdentitySet, SessionState};
pub use mapping::{
    build_active_mappings, disable_unknown_fields, FieldMapping, IndexMapping, SchemaRegistry,
};
pub use migration::{
    identity_transformer, next_index_name, DocTransformer, MigrationConfig, MigrationContext,
    MigrationOutcome, Migrator,
};
pub use overlay::AccessControlOverlay;
pub use store::memory::MemoryStore;
pub use store::{IndexInfo, IndexStore, ObjectStore, ScrollCursor};
pub use types::{
    BulkGetEntry, BulkGetResult, CanAccess, ConflictEntry, Document, DocumentId, DocumentUpdate,
    FindQuery, FindResult, Identity, ObjectRef, TenantId,
};
