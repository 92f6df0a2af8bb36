use indexmap::IndexMap;
use std::sync::Arc;
use tenantry::{
    AccessControlOverlay, AccessibleIdentitySet, CanAccess, Document, FieldMapping, Identity,
    MemoryStore, SchemaRegistry, SessionState,
};

/// Registry with a couple of realistic saved-object types.
#[allow(dead_code)]
pub fn registry() -> SchemaRegistry {
    let mut r = SchemaRegistry::new();
    r.register("dashboard", fields(&[("title", FieldMapping::text())]));
    r.register(
        "visualization",
        fields(&[("query", FieldMapping::keyword())]),
    );
    r
}

#[allow(dead_code)]
pub fn fields(defs: &[(&str, FieldMapping)]) -> IndexMap<String, FieldMapping> {
    defs.iter()
        .map(|(name, m)| (name.to_string(), m.clone()))
        .collect()
}

#[allow(dead_code)]
pub fn doc(ty: &str, id: &str) -> Document {
    Document::new(ty, id, serde_json::json!({ "title": format!("doc {}", id) }))
}

#[allow(dead_code)]
pub fn doc_owned_by(ty: &str, id: &str, owner: Identity) -> Document {
    let mut d = doc(ty, id);
    d.can_access.rw_identities.insert(owner);
    d
}

#[allow(dead_code)]
pub fn public_doc(ty: &str, id: &str) -> Document {
    let mut d = doc(ty, id);
    d.can_access = CanAccess::readable_by_all();
    d
}

/// Overlay for an authenticated caller, the way the request layer builds one.
#[allow(dead_code)]
pub fn overlay_for(store: &Arc<MemoryStore>, user: &str, roles: &[&str]) -> AccessControlOverlay {
    let session = SessionState {
        user_name: user.to_string(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        tenants: vec![],
    };
    AccessControlOverlay::new(
        store.clone(),
        AccessibleIdentitySet::resolve(Some(&session)),
    )
}

/// Overlay for a request with no session state at all.
#[allow(dead_code)]
pub fn anonymous_overlay(store: &Arc<MemoryStore>) -> AccessControlOverlay {
    AccessControlOverlay::new(store.clone(), AccessibleIdentitySet::resolve(None))
}
