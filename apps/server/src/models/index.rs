//! Search index documents
//!
//! One `CompositionBody` is stored per composition id. Its
//! `operationHistories` array is append-only.

use crvs_models::EventType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composition_id: Option<String>,
    /// Composition type code, e.g. `birth-notification`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composition_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<EventType>,
    /// Registration status this body is being written for
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_location_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declaration_location_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_relationship: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_declaration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_comment: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relates_to: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Practitioner id of the last operator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignment: Option<Assignment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operation_histories: Vec<OperationHistory>,
    /// Event specific name, date and identifier fields
    /// (`childFirstNames`, `motherDoB`, `deceasedIdentifier`, ...)
    #[serde(flatten)]
    pub details: BTreeMap<String, Value>,
}

impl CompositionBody {
    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(Value::as_str)
    }

    pub fn set_detail(&mut self, key: &str, value: Option<String>) {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.details.insert(key.to_string(), Value::String(value));
        }
    }

    /// Status of the most recent history entry
    pub fn previous_status(&self) -> Option<&str> {
        self.operation_histories
            .last()
            .map(|h| h.operation_type.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub office_name: String,
}

/// One recorded status transition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationHistory {
    pub operation_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operated_on: Option<String>,
    #[serde(default)]
    pub operator_role: String,
    #[serde(default)]
    pub operator_first_names: String,
    #[serde(default)]
    pub operator_family_name: String,
    #[serde(default)]
    pub operator_first_names_locale: String,
    #[serde(default)]
    pub operator_family_name_locale: String,
    #[serde(default)]
    pub operator_office_name: String,
    #[serde(default)]
    pub operator_office_alias: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_facility_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_facility_alias: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correction: Option<Vec<Correction>>,
}

/// Field level change recorded with a correction request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correction {
    pub section: String,
    pub field_name: String,
    pub old_value: String,
    pub new_value: String,
}

/// Elasticsearch hit
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_score", default)]
    pub score: f64,
    #[serde(rename = "_source", default)]
    pub source: CompositionBody,
}

/// Potential duplicate of a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateRef {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<String>,
}
