//! Mapping planner: merges registered document-type schemas into one index
//! mapping and guards against mapping drift across application versions.

use crate::error::{Result, TenantryError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One field definition inside an index mapping, in the store's own JSON
/// mapping format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, FieldMapping>>,
}

impl FieldMapping {
    pub fn keyword() -> Self {
        FieldMapping {
            field_type: Some("keyword".to_string()),
            dynamic: None,
            index: None,
            properties: None,
        }
    }

    pub fn text() -> Self {
        FieldMapping {
            field_type: Some("text".to_string()),
            dynamic: None,
            index: None,
            properties: None,
        }
    }

    pub fn date() -> Self {
        FieldMapping {
            field_type: Some("date".to_string()),
            dynamic: None,
            index: None,
            properties: None,
        }
    }

    pub fn object(properties: IndexMap<String, FieldMapping>) -> Self {
        FieldMapping {
            field_type: None,
            dynamic: None,
            index: None,
            properties: Some(properties),
        }
    }

    /// A present-but-disabled field: stored, never indexed, never queryable.
    pub fn disabled() -> Self {
        FieldMapping {
            field_type: None,
            dynamic: Some(false),
            index: None,
            properties: Some(IndexMap::new()),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.dynamic == Some(false) || self.index == Some(false)
    }
}

/// A whole index mapping: strict dynamic handling plus named properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMapping {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic: Option<String>,
    #[serde(default)]
    pub properties: IndexMap<String, FieldMapping>,
}

impl IndexMapping {
    pub fn strict(properties: IndexMap<String, FieldMapping>) -> Self {
        IndexMapping {
            dynamic: Some("strict".to_string()),
            properties,
        }
    }

    pub fn empty() -> Self {
        IndexMapping {
            dynamic: None,
            properties: IndexMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

impl Default for IndexMapping {
    fn default() -> Self {
        IndexMapping::empty()
    }
}

/// Registry of per-document-type field schemas, supplied by the application
/// layer at startup.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    types: BTreeMap<String, IndexMap<String, FieldMapping>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        SchemaRegistry::default()
    }

    pub fn register(&mut self, type_name: &str, fields: IndexMap<String, FieldMapping>) {
        self.types.insert(type_name.to_string(), fields);
    }

    pub fn type_names(&self) -> Vec<&str> {
        self.types.keys().map(|s| s.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Core fields every tenant index carries regardless of registered types.
fn base_properties() -> IndexMap<String, FieldMapping> {
    let mut can_access = IndexMap::new();
    can_access.insert("roIdentities".to_string(), FieldMapping::keyword());
    can_access.insert("rwIdentities".to_string(), FieldMapping::keyword());

    let mut props = IndexMap::new();
    props.insert("type".to_string(), FieldMapping::keyword());
    props.insert("updatedAt".to_string(), FieldMapping::date());
    props.insert("canAccess".to_string(), FieldMapping::object(can_access));
    props
}

/// Merge every registered type's field schemas (plus the base properties)
/// into one mapping. Type names are iterated in sorted order so the output
/// field order is deterministic.
///
/// # Errors
///
/// [`TenantryError::SchemaConflict`] when two types define the same field
/// with unequal definitions. Identical duplicates are tolerated;
/// last-writer-wins is deliberately not.
pub fn build_active_mappings(registry: &SchemaRegistry) -> Result<IndexMapping> {
    let mut properties = base_properties();
    // field name -> type that first contributed it
    let mut contributed_by: BTreeMap<String, String> = properties
        .keys()
        .map(|k| (k.clone(), "_core".to_string()))
        .collect();

    for (type_name, fields) in &registry.types {
        for (field, mapping) in fields {
            match properties.get(field) {
                Some(existing) if existing == mapping => {}
                Some(_) => {
                    return Err(TenantryError::SchemaConflict {
                        field: field.clone(),
                        first: contributed_by
                            .get(field)
                            .cloned()
                            .unwrap_or_default(),
                        second: type_name.clone(),
                    });
                }
                None => {
                    properties.insert(field.clone(), mapping.clone());
                    contributed_by.insert(field.clone(), type_name.clone());
                }
            }
        }
    }

    Ok(IndexMapping::strict(properties))
}

/// Disable every field of `target` that the previously applied mapping does
/// not know about.
///
/// A field first introduced by the current application version is written to
/// the new generation as present-but-disabled, so rolling the application
/// back to the previous schema version never sees partially indexed new
/// fields as queryable. Pure and deterministic.
pub fn disable_unknown_fields(target: &IndexMapping, applied: &IndexMapping) -> IndexMapping {
    let properties = target
        .properties
        .iter()
        .map(|(name, mapping)| {
            if applied.properties.contains_key(name) {
                (name.clone(), mapping.clone())
            } else {
                (name.clone(), FieldMapping::disabled())
            }
        })
        .collect();

    IndexMapping {
        dynamic: target.dynamic.clone(),
        properties,
    }
}
