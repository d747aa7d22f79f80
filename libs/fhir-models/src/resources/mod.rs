//! Registration resources
//!
//! Only the resource types the workflow reads or mutates are modelled. Any
//! other `resourceType` is kept as opaque JSON and written back untouched.

mod bundle;
mod composition;
mod document_reference;
mod location;
mod person;
mod task;

pub use bundle::{Bundle, BundleEntry, BundleEntryRequest};
pub use composition::{Composition, CompositionSection, RelatesTo};
pub use document_reference::{DocumentContent, DocumentReference};
pub use location::Location;
pub use person::{Patient, Practitioner};
pub use task::{Task, TaskParameter};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Any resource that can sit in a bundle entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Resource {
    Composition(Composition),
    Task(Task),
    Patient(Patient),
    Practitioner(Practitioner),
    Location(Location),
    DocumentReference(DocumentReference),
    Other(Value),
}

impl Resource {
    pub fn resource_type(&self) -> &str {
        match self {
            Resource::Composition(_) => "Composition",
            Resource::Task(_) => "Task",
            Resource::Patient(_) => "Patient",
            Resource::Practitioner(_) => "Practitioner",
            Resource::Location(_) => "Location",
            Resource::DocumentReference(_) => "DocumentReference",
            Resource::Other(value) => value
                .get("resourceType")
                .and_then(Value::as_str)
                .unwrap_or_default(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Resource::Composition(r) => r.id.as_deref(),
            Resource::Task(r) => r.id.as_deref(),
            Resource::Patient(r) => r.id.as_deref(),
            Resource::Practitioner(r) => r.id.as_deref(),
            Resource::Location(r) => r.id.as_deref(),
            Resource::DocumentReference(r) => r.id.as_deref(),
            Resource::Other(value) => value.get("id").and_then(Value::as_str),
        }
    }

    /// Assign the server id, e.g. after a transaction created the resource
    pub fn set_id(&mut self, id: impl Into<String>) {
        let id = Some(id.into());
        match self {
            Resource::Composition(r) => r.id = id,
            Resource::Task(r) => r.id = id,
            Resource::Patient(r) => r.id = id,
            Resource::Practitioner(r) => r.id = id,
            Resource::Location(r) => r.id = id,
            Resource::DocumentReference(r) => r.id = id,
            Resource::Other(value) => {
                if let (Some(obj), Some(id)) = (value.as_object_mut(), id) {
                    obj.insert("id".to_string(), Value::String(id));
                }
            }
        }
    }

    /// Relative reference `Type/id`, when the resource has an id
    pub fn identity(&self) -> Option<String> {
        self.id()
            .map(|id| format!("{}/{}", self.resource_type(), id))
    }

    pub fn as_composition(&self) -> Option<&Composition> {
        match self {
            Resource::Composition(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_composition_mut(&mut self) -> Option<&mut Composition> {
        match self {
            Resource::Composition(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_task(&self) -> Option<&Task> {
        match self {
            Resource::Task(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_task_mut(&mut self) -> Option<&mut Task> {
        match self {
            Resource::Task(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_patient(&self) -> Option<&Patient> {
        match self {
            Resource::Patient(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_patient_mut(&mut self) -> Option<&mut Patient> {
        match self {
            Resource::Patient(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_practitioner(&self) -> Option<&Practitioner> {
        match self {
            Resource::Practitioner(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_location(&self) -> Option<&Location> {
        match self {
            Resource::Location(r) => Some(r),
            _ => None,
        }
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

impl<'de> Deserialize<'de> for Resource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let resource_type = value
            .get("resourceType")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let typed = match resource_type.as_str() {
            "Composition" => serde_json::from_value(value).map(Resource::Composition),
            "Task" => serde_json::from_value(value).map(Resource::Task),
            "Patient" => serde_json::from_value(value).map(Resource::Patient),
            "Practitioner" => serde_json::from_value(value).map(Resource::Practitioner),
            "Location" => serde_json::from_value(value).map(Resource::Location),
            "DocumentReference" => {
                serde_json::from_value(value).map(Resource::DocumentReference)
            }
            _ => return Ok(Resource::Other(value)),
        };
        typed.map_err(|e| D::Error::custom(format!("invalid {resource_type}: {e}")))
    }
}

impl From<Composition> for Resource {
    fn from(r: Composition) -> Self {
        Resource::Composition(r)
    }
}

impl From<Task> for Resource {
    fn from(r: Task) -> Self {
        Resource::Task(r)
    }
}

impl From<Patient> for Resource {
    fn from(r: Patient) -> Self {
        Resource::Patient(r)
    }
}

impl From<Practitioner> for Resource {
    fn from(r: Practitioner) -> Self {
        Resource::Practitioner(r)
    }
}

impl From<Location> for Resource {
    fn from(r: Location) -> Self {
        Resource::Location(r)
    }
}
