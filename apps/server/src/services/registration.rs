//! Registration pipeline
//!
//! Runs the workflow steps for one request: resolve the acting practitioner,
//! mutate the bundle, persist it, index it and record the status change.

use crate::auth::AuthContext;
use crate::clients::{
    DocumentStore, MetricsClient, ResourceStore, SearchIndex, UserDirectory, VerificationService,
};
use crate::models::{CompositionBody, DuplicateRef, UserQuery};
use crate::services::bundle_modifier::{
    self, modify_registration_bundle, validate_deceased_details, ModifyContext,
};
use crate::services::locator::{self, ParsedReference};
use crate::services::{audit, documents, duplicates, indexing, transitions};
use crate::{Error, Result};
use crvs_models::{
    Bundle, BundleEntryRequest, EventType, Extension, ExtensionUrl, Practitioner, RegStatus,
    RelatesTo, Resource,
};
use serde::Serialize;
use std::sync::Arc;

/// External services the pipeline talks to
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn ResourceStore>,
    pub index: Arc<dyn SearchIndex>,
    pub users: Arc<dyn UserDirectory>,
    pub metrics: Arc<dyn MetricsClient>,
    pub documents: Arc<dyn DocumentStore>,
    pub verifier: Arc<dyn VerificationService>,
}

/// Result of a submission or correction request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordOutcome {
    pub composition_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<String>,
    pub status: RegStatus,
    pub duplicates: Vec<DuplicateRef>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotDuplicateOutcome {
    pub composition_id: String,
    /// Duplicate links still on the record
    pub remaining: Vec<String>,
}

pub struct RegistrationService {
    deps: Collaborators,
    match_threshold: f64,
}

impl RegistrationService {
    pub fn new(deps: Collaborators, match_threshold: f64) -> Self {
        Self {
            deps,
            match_threshold,
        }
    }

    /// Practitioner acting for the token subject
    async fn practitioner(&self, auth: &AuthContext) -> Result<Practitioner> {
        let user = self
            .deps
            .users
            .get_user(&UserQuery::UserId(auth.payload.sub.clone()), &auth.bearer())
            .await?;
        let practitioner_id = user
            .practitioner_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                Error::InvalidPractitioner(format!("user {} has no practitioner", auth.payload.sub))
            })?;
        match self
            .deps
            .store
            .read(&format!("Practitioner/{practitioner_id}"))
            .await?
        {
            Resource::Practitioner(practitioner) => Ok(practitioner),
            other => Err(Error::InvalidPractitioner(format!(
                "Practitioner/{practitioner_id} resolved to a {}",
                other.resource_type()
            ))),
        }
    }

    /// Write the bundle as a transaction and adopt the ids the store assigned.
    ///
    /// Entries with an id are updated in place, the rest are created.
    async fn persist(&self, bundle: &mut Bundle) -> Result<()> {
        let mut transaction = Bundle::new("transaction");
        for entry in &bundle.entry {
            let Some(resource) = &entry.resource else {
                continue;
            };
            let (method, url) = match resource.identity() {
                Some(identity) => ("PUT", identity),
                None => ("POST", resource.resource_type().to_string()),
            };
            let mut tx_entry = entry.clone();
            tx_entry.additional.clear();
            tx_entry.request = Some(BundleEntryRequest {
                method: method.to_string(),
                url,
            });
            transaction.entry.push(tx_entry);
        }

        let response = self.deps.store.transaction(&transaction).await?;

        let targets = bundle.entry.iter_mut().filter(|e| e.resource.is_some());
        for (entry, result) in targets.zip(&response.entry) {
            let location = result
                .additional
                .get("response")
                .and_then(|r| r.get("location"))
                .and_then(|l| l.as_str());
            let id = location.and_then(|l| ParsedReference::parse(l).resource_id);
            if let (Some(resource), Some(id)) = (entry.resource.as_mut(), id) {
                if resource.id().is_none() {
                    resource.set_id(id);
                }
            }
        }

        tracing::debug!(entries = transaction.entry.len(), "Persisted bundle");
        Ok(())
    }

    async fn verify_deceased(&self, bundle: &mut Bundle, auth: &AuthContext) -> Result<()> {
        let Some(reference) = locator::composition(bundle)?
            .section_subject("deceased-details")
            .map(str::to_string)
        else {
            return Ok(());
        };
        let identity = ParsedReference::parse(&reference).identity();
        let patient = bundle
            .entry
            .iter_mut()
            .find(|e| {
                e.full_url.as_deref() == Some(reference.as_str())
                    || (identity.is_some() && e.resource.as_ref().and_then(Resource::identity) == identity)
            })
            .and_then(|e| e.resource.as_mut())
            .and_then(Resource::as_patient_mut);
        match patient {
            Some(patient) => {
                validate_deceased_details(patient, auth, self.deps.verifier.as_ref()).await
            }
            None => Ok(()),
        }
    }

    async fn index_with_history(
        &self,
        bundle: &Bundle,
        body: &mut CompositionBody,
        auth: &AuthContext,
    ) -> Result<()> {
        let task = locator::task(bundle)?;
        let composition_id = body.composition_id.clone().unwrap_or_default();
        transitions::create_status_history(
            body,
            Some(task),
            auth,
            self.deps.users.as_ref(),
            self.deps.store.as_ref(),
        )
        .await?;
        self.deps.index.put(&composition_id, body).await
    }

    /// Declare, validate or register a new record, depending on the caller's scope.
    pub async fn submit_declaration(&self, bundle: Bundle, auth: &AuthContext) -> Result<RecordOutcome> {
        locator::verify_bundle_references(&bundle, self.deps.store.as_ref()).await?;
        let practitioner = self.practitioner(auth).await?;

        let status = bundle_modifier::status_from_scope(&auth.payload)?;
        if !transitions::is_valid_transition(None, status.as_str()) {
            return Err(Error::InvalidTransition {
                from: "<none>".to_string(),
                to: status.to_string(),
            });
        }

        let ctx = ModifyContext {
            practitioner: &practitioner,
            payload: &auth.payload,
            default_status: Some(status),
            new_record: true,
        };
        let (mut bundle, status) =
            modify_registration_bundle(bundle, &ctx, self.deps.store.as_ref()).await?;

        let event = locator::composition(&bundle)?.event_type()?;
        if event == EventType::Death && status == RegStatus::Registered {
            self.verify_deceased(&mut bundle, auth).await?;
        }
        documents::upload_base64_attachments(&mut bundle, auth, self.deps.documents.as_ref())
            .await?;
        self.persist(&mut bundle).await?;

        let composition = locator::composition(&bundle)?;
        let composition_id = composition
            .id
            .clone()
            .ok_or_else(|| Error::Internal("store returned no Composition id".to_string()))?;
        let tracking_id = composition.tracking_id().map(str::to_string);
        let practitioner_id = practitioner.id.clone().unwrap_or_default();

        let mut body =
            indexing::build_composition_body(&bundle, &composition_id, status, &practitioner_id)?;
        self.index_with_history(&bundle, &mut body, auth).await?;

        let found = duplicates::detect_duplicates(
            &composition_id,
            &body,
            self.deps.index.as_ref(),
            self.match_threshold,
        )
        .await?;
        if !found.is_empty() {
            self.flag_duplicates(&mut bundle, &found).await?;
            body.relates_to = found.iter().map(|d| d.id.clone()).collect();
            self.deps.index.put(&composition_id, &body).await?;
        }

        tracing::info!(
            composition_id = %composition_id,
            tracking_id = tracking_id.as_deref().unwrap_or_default(),
            status = %status,
            duplicates = found.len(),
            "Record submitted"
        );

        Ok(RecordOutcome {
            composition_id,
            tracking_id,
            status,
            duplicates: found,
        })
    }

    /// Link the composition to its potential duplicates and write it back.
    async fn flag_duplicates(&self, bundle: &mut Bundle, found: &[DuplicateRef]) -> Result<()> {
        let composition = locator::composition_mut(bundle)?;
        for duplicate in found {
            let target = format!("Composition/{}", duplicate.id);
            if !composition.relates_to.iter().any(|r| r.target() == Some(target.as_str())) {
                composition.relates_to.push(RelatesTo::duplicate(&duplicate.id));
            }
        }

        let tracking_ids: Vec<&str> = found
            .iter()
            .filter_map(|d| d.tracking_id.as_deref())
            .collect();
        locator::task_mut(bundle)?.extension.upsert(Extension::string(
            ExtensionUrl::FlaggedAsPotentialDuplicate,
            tracking_ids.join(","),
        ));

        locator::replace_urn_references(bundle)?;
        self.persist(bundle).await
    }

    /// Ask for a correction of a registered or certified record.
    pub async fn request_correction(
        &self,
        record_id: &str,
        mut bundle: Bundle,
        auth: &AuthContext,
    ) -> Result<RecordOutcome> {
        let existing = self
            .deps
            .index
            .get(record_id)
            .await?
            .ok_or_else(|| Error::ResourceNotFound(format!("Composition/{record_id}")))?;
        let target = RegStatus::RequestedCorrection;
        if !transitions::is_valid_transition(existing.previous_status(), target.as_str()) {
            return Err(Error::InvalidTransition {
                from: existing.previous_status().unwrap_or("<none>").to_string(),
                to: target.to_string(),
            });
        }

        {
            let composition = locator::composition_mut(&mut bundle)?;
            match composition.id.as_deref() {
                None => composition.id = Some(record_id.to_string()),
                Some(id) if id != record_id => {
                    return Err(Error::InvalidBundle(format!(
                        "Composition/{id} does not match record {record_id}"
                    )))
                }
                Some(_) => {}
            }
        }

        locator::verify_bundle_references(&bundle, self.deps.store.as_ref()).await?;
        let practitioner = self.practitioner(auth).await?;
        let ctx = ModifyContext {
            practitioner: &practitioner,
            payload: &auth.payload,
            default_status: Some(target),
            new_record: false,
        };
        let (mut bundle, status) =
            modify_registration_bundle(bundle, &ctx, self.deps.store.as_ref()).await?;
        documents::upload_base64_attachments(&mut bundle, auth, self.deps.documents.as_ref())
            .await?;
        self.persist(&mut bundle).await?;

        let practitioner_id = practitioner.id.clone().unwrap_or_default();
        let mut body =
            indexing::build_composition_body(&bundle, record_id, status, &practitioner_id)?;
        indexing::carry_over(&mut body, existing);
        self.index_with_history(&bundle, &mut body, auth).await?;

        audit::create_new_audit_event(&bundle, &auth.token, self.deps.metrics.as_ref()).await?;

        tracing::info!(composition_id = record_id, "Correction requested");
        Ok(RecordOutcome {
            composition_id: record_id.to_string(),
            tracking_id: body.tracking_id.clone(),
            status,
            duplicates: Vec::new(),
        })
    }

    /// Clear duplicate links from a record, one or all of them.
    pub async fn mark_not_duplicate(
        &self,
        record_id: &str,
        duplicate_id: Option<&str>,
        auth: &AuthContext,
    ) -> Result<NotDuplicateOutcome> {
        let composition_ref = format!("Composition/{record_id}");
        let store = self.deps.store.as_ref();
        let mut composition = match store.read(&composition_ref).await? {
            Resource::Composition(composition) => composition,
            other => {
                return Err(Error::InvalidResource(format!(
                    "{composition_ref} resolved to a {}",
                    other.resource_type()
                )))
            }
        };
        let mut task = store
            .search("Task", &[("focus", composition_ref.as_str())])
            .await?
            .into_iter()
            .find_map(|r| match r {
                Resource::Task(task) => Some(task),
                _ => None,
            })
            .ok_or_else(|| Error::ResourceNotFound(format!("Task for {composition_ref}")))?;
        let practitioner = self.practitioner(auth).await?;

        bundle_modifier::remove_duplicates_from_composition(&mut composition, record_id, duplicate_id);
        task.extension
            .push(Extension::marker(ExtensionUrl::MarkedAsNotDuplicate));
        if composition.relates_to.is_empty() {
            task.extension
                .remove(ExtensionUrl::FlaggedAsPotentialDuplicate.url());
        }
        bundle_modifier::setup_last_reg_user(&mut task, &practitioner)?;

        let remaining: Vec<String> = composition
            .relates_to
            .iter()
            .filter_map(|r| r.target())
            .filter_map(|t| t.strip_prefix("Composition/"))
            .map(str::to_string)
            .collect();

        let mut bundle = Bundle::new("document");
        bundle.push(Some(composition_ref.clone()), composition);
        bundle.push(None, task);
        self.persist(&mut bundle).await?;

        if let Some(mut body) = self.deps.index.get(record_id).await? {
            body.relates_to = remaining.clone();
            self.deps.index.put(record_id, &body).await?;
        }

        tracing::info!(
            composition_id = record_id,
            duplicate_id = duplicate_id.unwrap_or("*"),
            remaining = remaining.len(),
            "Marked as not duplicate"
        );
        Ok(NotDuplicateOutcome {
            composition_id: record_id.to_string(),
            remaining,
        })
    }
}
