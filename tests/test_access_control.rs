//! Authorization behavior of the overlay: ownership stamping, read/write
//! checks, per-entry bulk_get errors, and identity-filtered find.

mod common;

use common::{anonymous_overlay, doc, doc_owned_by, overlay_for, public_doc};
use std::sync::Arc;
use tenantry::{
    FindQuery, Identity, IndexMapping, MemoryStore, ObjectRef, ObjectStore, TenantryError,
};

fn store() -> Arc<MemoryStore> {
    let s = Arc::new(MemoryStore::new("tenant"));
    s.seed_index("tenant", IndexMapping::empty(), vec![]);
    s
}

#[tokio::test]
async fn create_stamps_the_callers_identity_set() {
    let store = store();
    let alice = overlay_for(&store, "alice", &["dev"]);

    let created = alice.create(doc("dashboard", "d1")).await.unwrap();
    assert!(created
        .can_access
        .rw_identities
        .contains(&Identity::user("alice")));
    assert!(created
        .can_access
        .rw_identities
        .contains(&Identity::role("dev")));
    assert!(created.can_access.ro_identities.is_empty());
}

#[tokio::test]
async fn anonymous_creation_still_has_a_nonempty_owner_set() {
    let store = store();
    let anon = anonymous_overlay(&store);
    let created = anon.create(doc("dashboard", "d1")).await.unwrap();
    assert!(created
        .can_access
        .rw_identities
        .contains(&Identity::user("anonymous")));
}

#[tokio::test]
async fn bulk_create_stamps_every_document_in_the_batch() {
    let store = store();
    let alice = overlay_for(&store, "alice", &["dev"]);

    let created = alice
        .bulk_create(vec![
            doc("dashboard", "d1"),
            doc("dashboard", "d2"),
            doc("visualization", "v1"),
        ])
        .await
        .unwrap();

    assert_eq!(created.len(), 3);
    for d in &created {
        assert!(d.can_access.rw_identities.contains(&Identity::user("alice")));
        assert!(d.can_access.rw_identities.contains(&Identity::role("dev")));
        assert!(d.can_access.ro_identities.is_empty());
    }
}

#[tokio::test]
async fn create_over_an_existing_id_cannot_take_ownership() {
    let store = store();
    let alice = overlay_for(&store, "alice", &[]);
    let bob = overlay_for(&store, "bob", &[]);

    alice.create(doc("dashboard", "mine")).await.unwrap();
    assert!(matches!(
        bob.get("dashboard", "mine").await.unwrap_err(),
        TenantryError::Forbidden { .. }
    ));

    // creating over someone else's id is a conflict, never a re-stamp
    let err = bob.create(doc("dashboard", "mine")).await.unwrap_err();
    assert!(matches!(err, TenantryError::Conflict { .. }));

    let mine = alice.get("dashboard", "mine").await.unwrap();
    assert!(mine
        .can_access
        .rw_identities
        .contains(&Identity::user("alice")));
    assert!(!mine.can_access.rw_identities.contains(&Identity::user("bob")));
}

#[tokio::test]
async fn bulk_create_conflicts_on_an_existing_id() {
    let store = store();
    let alice = overlay_for(&store, "alice", &[]);
    alice.create(doc("dashboard", "d1")).await.unwrap();

    let bob = overlay_for(&store, "bob", &[]);
    let err = bob
        .bulk_create(vec![doc("dashboard", "fresh"), doc("dashboard", "d1")])
        .await
        .unwrap_err();
    assert!(matches!(err, TenantryError::Conflict { .. }));
}

#[tokio::test]
async fn owner_reads_stranger_is_forbidden_wildcard_opens_up() {
    let store = store();
    let alice = overlay_for(&store, "alice", &[]);
    let bob = overlay_for(&store, "bob", &[]);

    alice.create(doc("dashboard", "mine")).await.unwrap();
    alice.get("dashboard", "mine").await.unwrap();

    let err = bob.get("dashboard", "mine").await.unwrap_err();
    assert!(matches!(err, TenantryError::Forbidden { .. }));

    store.create(public_doc("dashboard", "shared")).await.unwrap();
    bob.get("dashboard", "shared").await.unwrap();
    anonymous_overlay(&store)
        .get("dashboard", "shared")
        .await
        .unwrap();
}

#[tokio::test]
async fn read_grant_permits_get_but_update_is_not_authorized() {
    let store = store();
    let mut d = doc_owned_by("dashboard", "d1", Identity::role("admin"));
    d.can_access.ro_identities.insert(Identity::role("viewer"));
    store.create(d).await.unwrap();

    let viewer = overlay_for(&store, "carol", &["viewer"]);
    viewer.get("dashboard", "d1").await.unwrap();

    let patch = serde_json::json!({"title": "renamed"})
        .as_object()
        .unwrap()
        .clone();
    let err = viewer.update("dashboard", "d1", patch).await.unwrap_err();
    assert!(matches!(err, TenantryError::NotAuthorized { .. }));

    let admin = overlay_for(&store, "dan", &["admin"]);
    let patch = serde_json::json!({"title": "renamed"})
        .as_object()
        .unwrap()
        .clone();
    let updated = admin.update("dashboard", "d1", patch).await.unwrap();
    assert_eq!(updated.attributes["title"], "renamed");
    // ownership is never auto-widened by later operations
    assert!(!updated
        .can_access
        .rw_identities
        .contains(&Identity::user("dan")));
}

#[tokio::test]
async fn get_without_any_grant_fails_even_with_read_role() {
    let store = store();
    store
        .create(doc_owned_by("dashboard", "d1", Identity::role("admin")))
        .await
        .unwrap();

    // rw lists only role/admin and there is no ro grant at all
    let viewer = overlay_for(&store, "carol", &["viewer"]);
    let err = viewer.get("dashboard", "d1").await.unwrap_err();
    assert!(matches!(err, TenantryError::Forbidden { .. }));
}

#[tokio::test]
async fn delete_requires_write_access() {
    let store = store();
    let mut d = doc_owned_by("dashboard", "d1", Identity::user("alice"));
    d.can_access.ro_identities.insert(Identity::user("bob"));
    store.create(d).await.unwrap();

    let bob = overlay_for(&store, "bob", &[]);
    let err = bob.delete("dashboard", "d1").await.unwrap_err();
    assert!(matches!(err, TenantryError::Forbidden { .. }));

    let alice = overlay_for(&store, "alice", &[]);
    alice.delete("dashboard", "d1").await.unwrap();
    assert!(matches!(
        alice.get("dashboard", "d1").await.unwrap_err(),
        TenantryError::NotFound { .. }
    ));
}

#[tokio::test]
async fn bulk_get_returns_per_entry_errors_for_a_mixed_batch() {
    let store = store();
    store
        .create(doc_owned_by("dashboard", "mine", Identity::user("alice")))
        .await
        .unwrap();
    store
        .create(doc_owned_by("dashboard", "theirs", Identity::user("bob")))
        .await
        .unwrap();
    store.create(public_doc("dashboard", "shared")).await.unwrap();

    let alice = overlay_for(&store, "alice", &[]);
    let result = alice
        .bulk_get(&[
            ObjectRef::new("dashboard", "mine"),
            ObjectRef::new("dashboard", "theirs"),
            ObjectRef::new("dashboard", "shared"),
            ObjectRef::new("dashboard", "missing"),
        ])
        .await
        .unwrap();

    assert_eq!(result.documents.len(), 4);
    assert!(result.documents[0].document.is_some());
    assert_eq!(result.documents[1].error.as_deref(), Some("Forbidden"));
    assert!(result.documents[1].document.is_none());
    assert!(result.documents[2].document.is_some());
    assert_eq!(result.documents[3].error.as_deref(), Some("NotFound"));
}

#[tokio::test]
async fn find_is_filtered_by_the_callers_identities() {
    let store = store();
    store
        .create(doc_owned_by("dashboard", "a1", Identity::user("alice")))
        .await
        .unwrap();
    store
        .create(doc_owned_by("dashboard", "a2", Identity::role("dev")))
        .await
        .unwrap();
    store
        .create(doc_owned_by("dashboard", "b1", Identity::user("bob")))
        .await
        .unwrap();
    store.create(public_doc("dashboard", "pub")).await.unwrap();

    let alice = overlay_for(&store, "alice", &["dev"]);
    let found = alice.find(FindQuery::of_type("dashboard")).await.unwrap();
    let mut ids: Vec<&str> = found.documents.iter().map(|d| d.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["a1", "a2", "pub"]);
    assert_eq!(found.total, 3);

    let anon = anonymous_overlay(&store);
    let found = anon.find(FindQuery::of_type("dashboard")).await.unwrap();
    let ids: Vec<&str> = found.documents.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["pub"]);
}

#[tokio::test]
async fn find_overrides_caller_supplied_identity_filters() {
    let store = store();
    store
        .create(doc_owned_by("dashboard", "b1", Identity::user("bob")))
        .await
        .unwrap();

    let alice = overlay_for(&store, "alice", &[]);
    let mut query = FindQuery::of_type("dashboard");
    // a caller trying to smuggle someone else's identity into the filter
    query.identities = Some(vec![Identity::user("bob")]);
    let found = alice.find(query).await.unwrap();
    assert_eq!(found.total, 0);
}

#[tokio::test]
async fn bulk_update_and_check_conflicts_pass_through() {
    let store = store();
    store
        .create(doc_owned_by("dashboard", "d1", Identity::user("bob")))
        .await
        .unwrap();

    let alice = overlay_for(&store, "alice", &[]);
    let conflicts = alice
        .check_conflicts(&[
            ObjectRef::new("dashboard", "d1"),
            ObjectRef::new("dashboard", "d2"),
        ])
        .await
        .unwrap();
    assert!(conflicts[0].exists);
    assert!(!conflicts[1].exists);

    let updates = vec![tenantry::DocumentUpdate {
        doc_type: "dashboard".to_string(),
        id: "d1".to_string(),
        attributes: serde_json::json!({"title": "bulk"})
            .as_object()
            .unwrap()
            .clone(),
    }];
    // no ownership check on bulk_update, by contract
    let updated = alice.bulk_update(updates).await.unwrap();
    assert_eq!(updated[0].attributes["title"], "bulk");
}
