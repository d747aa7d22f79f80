use crate::codes::CRVS_OFFICE_TYPE;
use crate::common::complex::{CodeableConcept, Identifier, Reference};
use crate::extension::ExtensionList;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

fn default_resource_type() -> String {
    "Location".to_string()
}

/// Office, health facility or administrative area
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Alternative names, the first one is the secondary-locale name
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alias: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<CodeableConcept>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_of: Option<Reference>,

    #[serde(default, skip_serializing_if = "ExtensionList::is_empty")]
    pub extension: ExtensionList,

    #[serde(flatten)]
    pub additional: HashMap<String, Value>,
}

impl Location {
    pub fn is_office(&self) -> bool {
        self.type_
            .as_ref()
            .and_then(CodeableConcept::first_code)
            .is_some_and(|code| code == CRVS_OFFICE_TYPE)
    }

    /// Parent reference, treating `Location/0` as the root
    pub fn parent_reference(&self) -> Option<&str> {
        self.part_of
            .as_ref()
            .and_then(|r| r.reference.as_deref())
            .filter(|r| *r != "Location/0")
    }

    pub fn reference(&self) -> Option<String> {
        self.id.as_ref().map(|id| format!("Location/{id}"))
    }
}
