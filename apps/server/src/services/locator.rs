//! Resource locator
//!
//! Resolves references inside a submitted bundle. `urn:uuid:` references
//! only exist inside one bundle and must resolve locally; relative
//! references fall back to the resource store.
//!
//! The request pipelines use the accessors, `resolve` and the reference
//! checks. [`select_or_create_section`], [`resolve_section_subjects`] and
//! [`select_or_create_collector`] are exported for callers that build
//! certificate or section content on top of this crate; the pipelines here
//! never add sections or collectors themselves.

use super::referential_integrity::{collect_refs, rewrite_refs, CollectedRefs};
use crate::clients::ResourceStore;
use crate::{Error, Result};
use crvs_models::codes::DOC_SECTIONS_SYSTEM;
use crvs_models::{
    Bundle, CodeableConcept, Coding, Composition, CompositionSection, Extension, ExtensionUrl,
    Patient, Resource, Task,
};
use futures::future::try_join_all;
use std::collections::HashMap;
use uuid::Uuid;

/// Resource type and id pulled out of a reference or URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReference {
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
}

impl ParsedReference {
    /// Accepts `Type/id`, absolute URLs and `_history` suffixed locations
    pub fn parse(raw: &str) -> Self {
        let mut path = raw;

        if let Some((p, _q)) = path.split_once('?') {
            path = p;
        }

        if let Some(scheme_idx) = path.find("://") {
            let after_scheme = &path[scheme_idx + 3..];
            path = after_scheme.split_once('/').map(|(_, p)| p).unwrap_or("");
        }

        let mut parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if let Some(history_idx) = parts.iter().position(|p| *p == "_history") {
            parts.truncate(history_idx);
        }

        match parts.len() {
            0 => Self {
                resource_type: None,
                resource_id: None,
            },
            1 => Self {
                resource_type: parts.last().map(|s| s.to_string()),
                resource_id: None,
            },
            _ => Self {
                resource_type: parts.get(parts.len() - 2).map(|s| s.to_string()),
                resource_id: parts.last().map(|s| s.to_string()),
            },
        }
    }

    pub fn identity(&self) -> Option<String> {
        match (&self.resource_type, &self.resource_id) {
            (Some(rt), Some(id)) => Some(format!("{}/{}", rt, id)),
            _ => None,
        }
    }
}

pub fn is_urn(reference: &str) -> bool {
    reference.starts_with("urn:")
}

fn entry_matches(full_url: Option<&str>, resource: Option<&Resource>, identity: &str) -> bool {
    full_url
        .and_then(|u| ParsedReference::parse(u).identity())
        .is_some_and(|own| own == identity)
        || resource
            .and_then(Resource::identity)
            .is_some_and(|own| own == identity)
}

/// Resolve a reference against the bundle only.
///
/// A dangling URN is an error; a relative reference with no local entry is `None`.
pub fn resolve_local<'a>(reference: &str, bundle: &'a Bundle) -> Result<Option<&'a Resource>> {
    if is_urn(reference) {
        return bundle
            .entry_by_full_url(reference)
            .and_then(|e| e.resource.as_ref())
            .map(Some)
            .ok_or_else(|| Error::UnresolvedReference(reference.to_string()));
    }
    let Some(identity) = ParsedReference::parse(reference).identity() else {
        return Err(Error::InvalidResource(format!(
            "malformed reference '{reference}'"
        )));
    };
    Ok(bundle
        .entry
        .iter()
        .find(|e| entry_matches(e.full_url.as_deref(), e.resource.as_ref(), &identity))
        .and_then(|e| e.resource.as_ref()))
}

/// Resolve a reference inside the bundle, falling back to the resource store
/// for permanent references. Store errors propagate unchanged.
pub async fn resolve(
    reference: &str,
    bundle: &Bundle,
    store: &dyn ResourceStore,
) -> Result<Resource> {
    if let Some(local) = resolve_local(reference, bundle)? {
        return Ok(local.clone());
    }
    let identity = ParsedReference::parse(reference)
        .identity()
        .ok_or_else(|| Error::InvalidResource(format!("malformed reference '{reference}'")))?;
    store.read(&identity).await
}

pub fn composition(bundle: &Bundle) -> Result<&Composition> {
    bundle
        .resources()
        .find_map(Resource::as_composition)
        .ok_or_else(|| Error::InvalidBundle("no Composition entry".to_string()))
}

pub fn composition_mut(bundle: &mut Bundle) -> Result<&mut Composition> {
    bundle
        .resources_mut()
        .find_map(Resource::as_composition_mut)
        .ok_or_else(|| Error::InvalidBundle("no Composition entry".to_string()))
}

pub fn task(bundle: &Bundle) -> Result<&Task> {
    bundle
        .resources()
        .find_map(Resource::as_task)
        .ok_or_else(|| Error::InvalidBundle("no Task entry".to_string()))
}

pub fn task_mut(bundle: &mut Bundle) -> Result<&mut Task> {
    bundle
        .resources_mut()
        .find_map(Resource::as_task_mut)
        .ok_or_else(|| Error::InvalidBundle("no Task entry".to_string()))
}

/// Section with `code`, appended when missing. Repeated calls return the same section.
pub fn select_or_create_section<'a>(
    code: &str,
    title: &str,
    composition: &'a mut Composition,
) -> &'a mut CompositionSection {
    let index = match composition.section.iter().position(|s| s.has_code(code)) {
        Some(index) => index,
        None => {
            composition.section.push(CompositionSection {
                title: Some(title.to_string()),
                code: Some(CodeableConcept {
                    coding: vec![Coding {
                        system: Some(DOC_SECTIONS_SYSTEM.to_string()),
                        code: Some(code.to_string()),
                        display: Some(title.to_string()),
                    }],
                    text: Some(title.to_string()),
                }),
                entry: Vec::new(),
            });
            composition.section.len() - 1
        }
    };
    &mut composition.section[index]
}

/// Resolve the first entry of each section concurrently.
///
/// Sections that are missing or empty yield `None`.
pub async fn resolve_section_subjects(
    bundle: &Bundle,
    codes: &[&str],
    store: &dyn ResourceStore,
) -> Result<Vec<Option<Resource>>> {
    let composition = composition(bundle)?;
    let lookups = codes.iter().map(|code| {
        let reference = composition.section_subject(code).map(str::to_string);
        async move {
            match reference {
                Some(reference) => resolve(&reference, bundle, store).await.map(Some),
                None => Ok(None),
            }
        }
    });
    try_join_all(lookups).await
}

/// Check every reference in the bundle.
///
/// URNs must name an entry of the bundle. Relative references without a
/// local entry are fetched from the store, concurrently.
pub async fn verify_bundle_references(bundle: &Bundle, store: &dyn ResourceStore) -> Result<()> {
    let mut refs = CollectedRefs::default();
    for resource in bundle.resources() {
        collect_refs(&resource.to_value()?, &mut refs);
    }

    for urn in &refs.urns {
        if bundle.entry_by_full_url(urn).is_none() {
            return Err(Error::UnresolvedReference(urn.clone()));
        }
    }

    let external: Vec<String> = refs
        .relative
        .iter()
        .map(|(rt, id)| format!("{rt}/{id}"))
        .filter(|identity| {
            !bundle
                .entry
                .iter()
                .any(|e| entry_matches(e.full_url.as_deref(), e.resource.as_ref(), identity))
        })
        .collect();

    tracing::debug!(
        urns = refs.urns.len(),
        external = external.len(),
        "Verifying bundle references"
    );

    try_join_all(external.iter().map(|identity| store.read(identity))).await?;
    Ok(())
}

/// Patient the Task `collector` extension points at; created with a fresh URN when absent
pub fn select_or_create_collector(bundle: &mut Bundle) -> Result<&mut Patient> {
    let existing = task(bundle)?
        .extension_reference(ExtensionUrl::Collector)
        .map(str::to_string);

    let reference = match existing {
        Some(reference) => reference,
        None => {
            let full_url = format!("urn:uuid:{}", Uuid::new_v4());
            bundle.push(Some(full_url.clone()), Patient::new());
            task_mut(bundle)?
                .extension
                .upsert(Extension::reference(ExtensionUrl::Collector, full_url.clone()));
            full_url
        }
    };

    let identity = ParsedReference::parse(&reference).identity();
    bundle
        .entry
        .iter_mut()
        .find(|e| {
            e.full_url.as_deref() == Some(reference.as_str())
                || (identity.is_some() && e.resource.as_ref().and_then(Resource::identity) == identity)
        })
        .and_then(|e| e.resource.as_mut())
        .and_then(Resource::as_patient_mut)
        .ok_or_else(|| Error::UnresolvedReference(reference.clone()))
}

/// Replace `urn:uuid:` references with `Type/id` for entries that have an id.
///
/// Needed before resources of an already persisted bundle are written again
/// outside the original transaction.
pub fn replace_urn_references(bundle: &mut Bundle) -> Result<()> {
    let mapping: HashMap<String, String> = bundle
        .entry
        .iter()
        .filter_map(|e| {
            let full_url = e.full_url.as_deref().filter(|u| is_urn(u))?;
            let identity = e.resource.as_ref().and_then(Resource::identity)?;
            Some((full_url.to_string(), identity))
        })
        .collect();
    if mapping.is_empty() {
        return Ok(());
    }

    let lookup = |reference: &str| mapping.get(reference).cloned();
    for entry in &mut bundle.entry {
        if let Some(resource) = entry.resource.as_mut() {
            let mut value = resource.to_value()?;
            rewrite_refs(&mut value, &lookup);
            *resource = serde_json::from_value(value)?;
        }
        if let Some(identity) = entry.full_url.as_ref().and_then(|u| mapping.get(u)) {
            entry.full_url = Some(identity.clone());
        }
    }
    Ok(())
}
