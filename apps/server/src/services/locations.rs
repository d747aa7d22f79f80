//! Practitioner office and jurisdiction lookup

use crate::clients::ResourceStore;
use crate::{Error, Result};
use crvs_models::{Location, Resource};
use futures::future::try_join_all;
use serde_json::Value;

/// Guards against `partOf` cycles in badly seeded location data
const MAX_ANCESTRY_DEPTH: usize = 16;

/// Where a practitioner works
#[derive(Debug, Clone)]
pub struct PractitionerLocations {
    pub office: Location,
    /// Administrative areas above the office, nearest first
    pub ancestry: Vec<Location>,
}

impl PractitionerLocations {
    /// Nearest jurisdiction, or the office itself when it has none
    pub fn last_location(&self) -> &Location {
        self.ancestry.first().unwrap_or(&self.office)
    }
}

fn into_location(resource: Resource, reference: &str) -> Result<Location> {
    match resource {
        Resource::Location(location) => Ok(location),
        other => Err(Error::InvalidResource(format!(
            "{reference} resolved to a {}",
            other.resource_type()
        ))),
    }
}

/// Resolve the practitioner's office, then walk `partOf` up to the root.
pub async fn practitioner_locations(
    store: &dyn ResourceStore,
    practitioner_id: &str,
) -> Result<PractitionerLocations> {
    let practitioner_ref = format!("Practitioner/{practitioner_id}");
    let roles = store
        .search("PractitionerRole", &[("practitioner", practitioner_ref.as_str())])
        .await?;

    let location_refs: Vec<String> = roles
        .first()
        .and_then(|role| role.to_value().ok())
        .and_then(|role| role.get("location").cloned())
        .and_then(|locations| match locations {
            Value::Array(items) => Some(items),
            _ => None,
        })
        .unwrap_or_default()
        .iter()
        .filter_map(|l| l.get("reference").and_then(Value::as_str))
        .map(str::to_string)
        .collect();

    if location_refs.is_empty() {
        return Err(Error::InvalidPractitioner(format!(
            "no PractitionerRole location for {practitioner_ref}"
        )));
    }

    let assigned = try_join_all(location_refs.iter().map(|reference| async move {
        into_location(store.read(reference).await?, reference)
    }))
    .await?;

    let office = assigned
        .iter()
        .find(|l| l.is_office())
        .or_else(|| assigned.first())
        .cloned()
        .ok_or_else(|| Error::InvalidPractitioner(format!("no office for {practitioner_ref}")))?;

    let mut ancestry = Vec::new();
    let mut parent = office.parent_reference().map(str::to_string);
    while let Some(reference) = parent {
        if ancestry.len() >= MAX_ANCESTRY_DEPTH {
            tracing::warn!(practitioner_id, "Location ancestry too deep, stopping");
            break;
        }
        let location = into_location(store.read(&reference).await?, &reference)?;
        parent = location.parent_reference().map(str::to_string);
        ancestry.push(location);
    }

    tracing::debug!(
        practitioner_id,
        office = office.id.as_deref().unwrap_or_default(),
        depth = ancestry.len(),
        "Resolved practitioner locations"
    );

    Ok(PractitionerLocations { office, ancestry })
}
