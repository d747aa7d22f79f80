use crate::codes::EventType;
use crate::common::complex::{CodeableConcept, Identifier, Reference};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

fn default_resource_type() -> String {
    "Composition".to_string()
}

/// Declaration envelope for one registration event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Composition {
    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Tracking id once assigned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<Identifier>,

    /// `preliminary` while draft, `final` once submitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<CodeableConcept>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<CodeableConcept>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub author: Vec<Reference>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub section: Vec<CompositionSection>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relates_to: Vec<RelatesTo>,

    #[serde(flatten)]
    pub additional: HashMap<String, Value>,
}

/// Named section (child, mother, informant, documents, ...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositionSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeableConcept>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<Reference>,
}

/// Link to another composition, used for duplicate flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatesTo {
    pub code: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_reference: Option<Reference>,
}

impl RelatesTo {
    pub fn duplicate(composition_id: &str) -> Self {
        Self {
            code: "duplicate".to_string(),
            target_reference: Some(Reference::new(format!("Composition/{composition_id}"))),
        }
    }

    pub fn target(&self) -> Option<&str> {
        self.target_reference
            .as_ref()
            .and_then(|r| r.reference.as_deref())
    }
}

impl CompositionSection {
    pub fn has_code(&self, code: &str) -> bool {
        self.code
            .as_ref()
            .is_some_and(|c| c.coding.iter().any(|cd| cd.code.as_deref() == Some(code)))
    }
}

impl Composition {
    /// Type code such as `birth-declaration`
    pub fn type_code(&self) -> Option<&str> {
        self.type_.as_ref().and_then(CodeableConcept::first_code)
    }

    pub fn event_type(&self) -> Result<EventType> {
        let code = self
            .type_code()
            .ok_or_else(|| Error::UnknownEventType("<missing composition type>".to_string()))?;
        EventType::from_composition_type(code)
    }

    pub fn tracking_id(&self) -> Option<&str> {
        self.identifier.as_ref().and_then(|i| i.value.as_deref())
    }

    pub fn section_by_code(&self, code: &str) -> Option<&CompositionSection> {
        self.section.iter().find(|s| s.has_code(code))
    }

    /// First entry reference of the section with this code
    pub fn section_subject(&self, code: &str) -> Option<&str> {
        self.section_by_code(code)
            .and_then(|s| s.entry.first())
            .and_then(|r| r.reference.as_deref())
    }
}
