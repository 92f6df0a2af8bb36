use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Tenant index alias — a plain string like `"tenant_acme"`.
pub type TenantId = String;
/// Document identifier within a tenant index.
pub type DocumentId = String;

/// An access-control identity: `user/<name>`, `role/<name>`, or the
/// wildcard `*` ("accessible to all").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn user(name: &str) -> Self {
        Identity(format!("user/{}", name))
    }

    pub fn role(name: &str) -> Self {
        Identity(format!("role/{}", name))
    }

    pub fn wildcard() -> Self {
        Identity("*".to_string())
    }

    pub fn is_wildcard(&self) -> bool {
        self.0 == "*"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ownership metadata stamped onto every document at creation time.
///
/// `rw_identities` may both read and mutate; `ro_identities` may only read.
/// Neither set is ever auto-widened after creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanAccess {
    #[serde(default)]
    pub ro_identities: HashSet<Identity>,
    #[serde(default)]
    pub rw_identities: HashSet<Identity>,
}

impl CanAccess {
    /// Read/write grant for exactly the given identities.
    pub fn owned_by(identities: HashSet<Identity>) -> Self {
        CanAccess {
            ro_identities: HashSet::new(),
            rw_identities: identities,
        }
    }

    pub fn readable_by_all() -> Self {
        let mut rw = HashSet::new();
        rw.insert(Identity::wildcard());
        CanAccess {
            ro_identities: HashSet::new(),
            rw_identities: rw,
        }
    }
}

/// A stored object: typed attributes plus ownership metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    #[serde(rename = "type")]
    pub doc_type: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    #[serde(rename = "canAccess", default)]
    pub can_access: CanAccess,
    #[serde(rename = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Document {
    pub fn new(doc_type: &str, id: &str, attributes: serde_json::Value) -> Self {
        let attributes = match attributes {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        Document {
            id: id.to_string(),
            doc_type: doc_type.to_string(),
            attributes,
            can_access: CanAccess::default(),
            updated_at: None,
        }
    }

    /// Parse a [`Document`] from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TenantryError::InvalidDocument`] if the value is not
    /// an object or lacks `id`/`type`.
    pub fn from_json(json: &serde_json::Value) -> crate::error::Result<Self> {
        use crate::error::TenantryError;

        if !json.is_object() {
            return Err(TenantryError::InvalidDocument(
                "Expected JSON object".to_string(),
            ));
        }
        serde_json::from_value(json.clone())
            .map_err(|e| TenantryError::InvalidDocument(e.to_string()))
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Reference to a stored object, used by bulk_get and check_conflicts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectRef {
    #[serde(rename = "type")]
    pub doc_type: String,
    pub id: DocumentId,
}

impl ObjectRef {
    pub fn new(doc_type: &str, id: &str) -> Self {
        ObjectRef {
            doc_type: doc_type.to_string(),
            id: id.to_string(),
        }
    }
}

/// One entry in a bulk_get response: either the document or a per-object
/// error, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkGetEntry {
    pub id: DocumentId,
    #[serde(rename = "type")]
    pub doc_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BulkGetEntry {
    pub fn found(document: Document) -> Self {
        BulkGetEntry {
            id: document.id.clone(),
            doc_type: document.doc_type.clone(),
            document: Some(document),
            error: None,
        }
    }

    pub fn error(doc_type: &str, id: &str, error: &str) -> Self {
        BulkGetEntry {
            id: id.to_string(),
            doc_type: doc_type.to_string(),
            document: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkGetResult {
    pub documents: Vec<BulkGetEntry>,
}

/// Partial update of one object, used by update and bulk_update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentUpdate {
    #[serde(rename = "type")]
    pub doc_type: String,
    pub id: DocumentId,
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictEntry {
    pub id: DocumentId,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub exists: bool,
}

/// A find request. The access-control overlay fills in `identities` and
/// `tenants`; callers going through the overlay should leave them `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindQuery {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    #[serde(rename = "perPage", skip_serializing_if = "Option::is_none")]
    pub per_page: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identities: Option<Vec<Identity>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenants: Option<Vec<String>>,
}

impl FindQuery {
    pub fn of_type(doc_type: &str) -> Self {
        FindQuery {
            doc_type: Some(doc_type.to_string()),
            ..FindQuery::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindResult {
    pub total: usize,
    pub page: usize,
    #[serde(rename = "perPage")]
    pub per_page: usize,
    pub documents: Vec<Document>,
}
