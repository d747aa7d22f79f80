use crate::codes::{EventType, RegStatus, EVENT_TYPE_SYSTEM, REG_STATUS_SYSTEM};
use crate::common::complex::{Annotation, CodeableConcept, Identifier, Reference};
use crate::extension::{ExtensionList, ExtensionUrl};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

fn default_resource_type() -> String {
    "Task".to_string()
}

/// Workflow carrier for one registration event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,

    /// Event type coding (`BIRTH`, `DEATH`, `MARRIAGE`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeableConcept>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_status: Option<CodeableConcept>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus: Option<Reference>,

    #[serde(default, skip_serializing_if = "ExtensionList::is_empty")]
    pub extension: ExtensionList,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub note: Vec<Annotation>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,

    /// Correction values before the change
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input: Vec<TaskParameter>,

    /// Correction values after the change
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output: Vec<TaskParameter>,

    #[serde(flatten)]
    pub additional: HashMap<String, Value>,
}

/// Task input/output parameter describing one corrected field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskParameter {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<CodeableConcept>,

    /// Section of the declaration form
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_code: Option<String>,

    /// Field name inside the section
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_string: Option<String>,
}

impl Task {
    pub fn new() -> Self {
        Self {
            resource_type: default_resource_type(),
            status: Some("ready".to_string()),
            intent: Some("proposal".to_string()),
            ..Default::default()
        }
    }

    /// Current registration status, `None` when unset or unrecognised
    pub fn business_status(&self) -> Option<RegStatus> {
        let concept = self.business_status.as_ref()?;
        concept
            .code_for_system(REG_STATUS_SYSTEM)
            .or_else(|| concept.first_code())
            .and_then(|code| code.parse().ok())
    }

    pub fn event_type(&self) -> Option<EventType> {
        self.code
            .as_ref()
            .and_then(|c| c.code_for_system(EVENT_TYPE_SYSTEM))
            .and_then(|code| code.parse().ok())
    }

    pub fn identifier_value(&self, system: &str) -> Option<&str> {
        self.identifier
            .iter()
            .find(|i| i.system.as_deref() == Some(system))
            .and_then(|i| i.value.as_deref())
    }

    /// Replace the identifier with the same system, or append it
    pub fn upsert_identifier(&mut self, identifier: Identifier) {
        match self
            .identifier
            .iter_mut()
            .find(|i| i.system.is_some() && i.system == identifier.system)
        {
            Some(existing) => *existing = identifier,
            None => self.identifier.push(identifier),
        }
    }

    /// Composition id taken from `focus`
    pub fn composition_id(&self) -> Option<&str> {
        self.focus
            .as_ref()
            .and_then(|f| f.reference.as_deref())
            .and_then(|r| r.strip_prefix("Composition/"))
    }

    pub fn extension_reference(&self, url: ExtensionUrl) -> Option<&str> {
        self.extension
            .find(url.url())
            .and_then(|ext| ext.value_reference())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task_json() -> Value {
        json!({
            "resourceType": "Task",
            "status": "ready",
            "code": { "coding": [{ "system": "http://opencrvs.org/specs/types", "code": "BIRTH" }] },
            "focus": { "reference": "Composition/comp-1" },
            "identifier": [
                { "system": "http://opencrvs.org/specs/id/birth-tracking-id", "value": "B123456" }
            ],
            "businessStatus": { "coding": [{ "system": "http://opencrvs.org/specs/reg-status", "code": "DECLARED" }] },
            "extension": [
                { "url": "http://opencrvs.org/specs/extension/contact-person", "valueString": "MOTHER" },
                { "url": "http://opencrvs.org/specs/extension/regLastUser", "valueReference": { "reference": "Practitioner/pr-1" } }
            ],
            "lastModified": "2024-01-10T10:00:00.000Z"
        })
    }

    #[test]
    fn reads_status_event_and_focus() {
        let task: Task = serde_json::from_value(task_json()).unwrap();
        assert_eq!(task.business_status(), Some(RegStatus::Declared));
        assert_eq!(task.event_type(), Some(EventType::Birth));
        assert_eq!(task.composition_id(), Some("comp-1"));
        assert_eq!(
            task.identifier_value("http://opencrvs.org/specs/id/birth-tracking-id"),
            Some("B123456")
        );
        assert_eq!(
            task.extension_reference(ExtensionUrl::RegLastUser),
            Some("Practitioner/pr-1")
        );
    }

    #[test]
    fn serializes_back_to_same_shape() {
        let raw = task_json();
        let task: Task = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&task).unwrap(), raw);
    }

    #[test]
    fn upsert_identifier_replaces_by_system() {
        let mut task = Task::new();
        task.upsert_identifier(Identifier::new("sys-a", "1"));
        task.upsert_identifier(Identifier::new("sys-b", "2"));
        task.upsert_identifier(Identifier::new("sys-a", "3"));
        assert_eq!(task.identifier.len(), 2);
        assert_eq!(task.identifier_value("sys-a"), Some("3"));
    }
}
