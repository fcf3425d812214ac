use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Raw issue record as returned by `GET /rest/api/2/issue/{key}`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct IssueRecord {
    #[serde(default)]
    pub id: String,
    pub key: String,
    /// REST self link, used to derive the browser URL
    #[serde(rename = "self", default)]
    pub self_url: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl IssueRecord {
    /// Current status name, if the record carries one
    pub fn status_name(&self) -> Option<&str> {
        self.fields
            .get("status")
            .and_then(|status| status.get("name"))
            .and_then(Value::as_str)
    }

    pub fn field(&self, field_id: &str) -> Option<&Value> {
        self.fields.get(field_id).filter(|value| !value.is_null())
    }

    pub fn text_field(&self, field_id: &str) -> Option<&str> {
        self.field(field_id).and_then(Value::as_str)
    }

    /// Attachments currently on the issue
    pub fn attachments(&self) -> Vec<AttachmentRecord> {
        self.field("attachment")
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default()
    }
}

/// Reply to `POST /rest/api/2/issue`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatedIssue {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(rename = "self", default)]
    pub self_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AttachmentRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub filename: String,
    pub created: String,
}

impl AttachmentRecord {
    /// Creation time; Jira emits `2024-05-01T10:00:00.000+0000`
    pub fn created_at(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_str(&self.created, "%Y-%m-%dT%H:%M:%S%.f%z").ok()
    }
}

/// One edge from `GET /rest/api/2/issue/{key}/transitions?expand=transitions.fields`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TransitionInfo {
    pub id: String,
    pub name: String,
    /// Screen fields, keyed by field id. Absent when the edge has no screen.
    #[serde(default)]
    pub fields: Option<BTreeMap<String, TransitionField>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionField {
    #[serde(default)]
    pub key: Option<String>,
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub allowed_values: Vec<AllowedValue>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AllowedValue {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

impl AllowedValue {
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.value.as_deref())
            .unwrap_or_default()
    }
}

/// A tracker user account
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub account_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
}

/// Upload staged on the service desk, referenced later by id
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporaryAttachment {
    pub temporary_attachment_id: String,
    pub file_name: String,
}

/// Entry of `GET /rest/api/2/field`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub untranslated_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServiceDesk {
    pub id: String,
    pub project_name: String,
    pub project_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RequestType {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PagedValues<T> {
    #[serde(default = "Vec::new")]
    pub values: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RequestTypeField {
    pub field_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RequestTypeFields {
    #[serde(default)]
    pub request_type_fields: Vec<RequestTypeField>,
}
