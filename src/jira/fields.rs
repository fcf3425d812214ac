//! Field-name catalog built from tracker metadata.
//!
//! Workflow code refers to fields by human names (`Actual_Start`,
//! `Proof_Of_Success`); the tracker wants ids (`customfield_10231`). The
//! catalog maps compacted names, and compacted ids, to ids.

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

use super::types::FieldDescriptor;
use crate::status::compact;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Field '{field}' not found in request {issue_key}")]
pub struct UnknownFieldError {
    pub field: String,
    pub issue_key: String,
}

#[derive(Debug, Clone, Default)]
pub struct FieldCatalog {
    name_to_id: HashMap<String, String>,
    id_to_name: HashMap<String, String>,
    clone_field_ids: BTreeSet<String>,
}

impl FieldCatalog {
    /// Build from `GET /rest/api/2/field`, preferring `untranslatedName`
    pub fn from_descriptors(descriptors: &[FieldDescriptor]) -> Self {
        let mut name_to_id = HashMap::new();
        let mut id_to_name = HashMap::new();

        for field in descriptors {
            name_to_id.insert(compact(&field.id), field.id.clone());
        }
        // names win over compacted ids on collision
        for field in descriptors {
            let name = field
                .untranslated_name
                .as_deref()
                .unwrap_or(&field.name);
            name_to_id.insert(compact(name), field.id.clone());
            id_to_name.insert(field.id.clone(), name.to_string());
        }

        Self {
            name_to_id,
            id_to_name,
            clone_field_ids: BTreeSet::new(),
        }
    }

    /// Register the fields that a clone must copy from its template.
    /// `request_type_field_ids` come from the request-type screen;
    /// `forced_names` are fields hidden on the portal but still required.
    pub fn with_clone_fields<I, S>(mut self, request_type_field_ids: I, forced_names: &[String]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for field_id in request_type_field_ids {
            if let Some(id) = self.name_to_id.get(&compact(field_id.as_ref())) {
                self.clone_field_ids.insert(id.clone());
            }
        }
        for name in forced_names {
            if let Some(id) = self.name_to_id.get(&compact(name)) {
                self.clone_field_ids.insert(id.clone());
            }
        }
        self
    }

    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.name_to_id.get(&compact(name)).map(String::as_str)
    }

    /// Resolve a human field name to its id, naming the issue on failure
    pub fn resolve(&self, name: &str, issue_key: &str) -> Result<&str, UnknownFieldError> {
        self.lookup(name).ok_or_else(|| UnknownFieldError {
            field: name.to_string(),
            issue_key: issue_key.to_string(),
        })
    }

    pub fn display_name<'a>(&'a self, field_id: &'a str) -> &'a str {
        self.id_to_name
            .get(field_id)
            .map(String::as_str)
            .unwrap_or(field_id)
    }

    pub fn clone_field_ids(&self) -> impl Iterator<Item = &str> {
        self.clone_field_ids.iter().map(String::as_str)
    }
}
