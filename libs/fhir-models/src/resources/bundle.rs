use super::Resource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

fn default_resource_type() -> String {
    "Bundle".to_string()
}

/// Submission bundle: ordered entries pairing a `fullUrl` with a resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    #[serde(default = "default_resource_type")]
    pub resource_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    #[serde(default)]
    pub entry: Vec<BundleEntry>,

    #[serde(flatten)]
    pub additional: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    /// Permanent reference or a bundle-local `urn:uuid:`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Resource>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<BundleEntryRequest>,

    #[serde(flatten)]
    pub additional: HashMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleEntryRequest {
    pub method: String,
    pub url: String,
}

impl Bundle {
    pub fn new(type_: impl Into<String>) -> Self {
        Self {
            resource_type: default_resource_type(),
            type_: Some(type_.into()),
            ..Default::default()
        }
    }

    pub fn push(&mut self, full_url: Option<String>, resource: impl Into<Resource>) {
        self.entry.push(BundleEntry {
            full_url,
            resource: Some(resource.into()),
            ..Default::default()
        });
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.entry.iter().filter_map(|e| e.resource.as_ref())
    }

    pub fn resources_mut(&mut self) -> impl Iterator<Item = &mut Resource> {
        self.entry.iter_mut().filter_map(|e| e.resource.as_mut())
    }

    pub fn entry_by_full_url(&self, full_url: &str) -> Option<&BundleEntry> {
        self.entry
            .iter()
            .find(|e| e.full_url.as_deref() == Some(full_url))
    }

    pub fn entry_by_full_url_mut(&mut self, full_url: &str) -> Option<&mut BundleEntry> {
        self.entry
            .iter_mut()
            .find(|e| e.full_url.as_deref() == Some(full_url))
    }

    /// Entry whose resource identity (`Type/id`) equals `identity`
    pub fn entry_by_identity(&self, identity: &str) -> Option<&BundleEntry> {
        self.entry.iter().find(|e| {
            e.resource
                .as_ref()
                .and_then(Resource::identity)
                .is_some_and(|own| own == identity)
        })
    }

    /// Entries in searchset responses from the resource store
    pub fn into_resources(self) -> Vec<Resource> {
        self.entry.into_iter().filter_map(|e| e.resource).collect()
    }
}
