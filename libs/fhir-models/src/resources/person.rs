use crate::common::complex::{Attachment, HumanName, Identifier};
use crate::extension::ExtensionList;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

fn default_patient_type() -> String {
    "Patient".to_string()
}

fn default_practitioner_type() -> String {
    "Practitioner".to_string()
}

/// Person a declaration is about (child, deceased, parents, informant, collector)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    #[serde(default = "default_patient_type")]
    pub resource_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub name: Vec<HumanName>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deceased_boolean: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deceased_date_time: Option<String>,

    /// Certificate collectors carry an identity photo
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub photo: Vec<Attachment>,

    #[serde(default, skip_serializing_if = "ExtensionList::is_empty")]
    pub extension: ExtensionList,

    #[serde(flatten)]
    pub additional: HashMap<String, Value>,
}

impl Patient {
    pub fn new() -> Self {
        Self {
            resource_type: default_patient_type(),
            ..Default::default()
        }
    }

    pub fn identifier_value(&self, system_or_type: &str) -> Option<&str> {
        self.identifier
            .iter()
            .find(|i| {
                i.system.as_deref() == Some(system_or_type)
                    || i.type_
                        .as_ref()
                        .and_then(|t| t.first_code())
                        .is_some_and(|code| code == system_or_type)
            })
            .and_then(|i| i.value.as_deref())
    }

    /// Name with the given `use`, falling back to the first one
    pub fn name_in(&self, use_: &str) -> Option<&HumanName> {
        self.name
            .iter()
            .find(|n| n.use_.as_deref() == Some(use_))
            .or_else(|| self.name.first())
    }
}

/// System user acting on a record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Practitioner {
    #[serde(default = "default_practitioner_type")]
    pub resource_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub name: Vec<HumanName>,

    #[serde(flatten)]
    pub additional: HashMap<String, Value>,
}

impl Practitioner {
    /// `Practitioner/{id}`, when an id is present
    pub fn reference(&self) -> Option<String> {
        self.id.as_ref().map(|id| format!("Practitioner/{id}"))
    }
}
