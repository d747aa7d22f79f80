//! Bundle mutations applied while a record moves through the workflow
//!
//! Every function here edits resources in place. The registration pipeline
//! calls them in a fixed order through [`modify_registration_bundle`]; each is
//! also usable on its own by the correction and duplicate flows.

use crate::auth::{AuthContext, TokenPayload};
use crate::clients::{ResourceStore, VerificationService};
use crate::services::locations::{practitioner_locations, PractitionerLocations};
use crate::services::locator;
use crate::{Error, Result};
use chrono::{SecondsFormat, Utc};
use crvs_models::{
    codes::{COMPOSITION_IDENTIFIER_SYSTEM, EVENT_TYPE_SYSTEM, REG_STATUS_SYSTEM},
    Bundle, CodeableConcept, Coding, Composition, EventType, Extension, ExtensionUrl, Identifier,
    Patient, Practitioner, RegStatus, Resource, Task,
};
use rand::distributions::Uniform;
use rand::Rng;
use serde_json::{Map, Value};

const TRACKING_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const TRACKING_ID_SUFFIX_LEN: usize = 6;

/// Event letter followed by six random uppercase alphanumerics
pub fn generate_tracking_id(event: EventType) -> String {
    let mut rng = rand::thread_rng();
    let picks = Uniform::from(0..TRACKING_ID_ALPHABET.len());
    std::iter::once(event.tracking_prefix())
        .chain((0..TRACKING_ID_SUFFIX_LEN).map(|_| TRACKING_ID_ALPHABET[rng.sample(picks)] as char))
        .collect()
}

/// Assign a fresh tracking id to the Composition and mirror it on the Task.
///
/// The bundle must start with the Composition followed by the Task.
pub fn set_tracking_id(bundle: &mut Bundle) -> Result<String> {
    if bundle.entry.len() < 2 {
        return Err(Error::InvalidBundle(format!(
            "expected at least 2 entries, found {}",
            bundle.entry.len()
        )));
    }
    let (head, tail) = bundle.entry.split_at_mut(1);
    let composition = head[0]
        .resource
        .as_mut()
        .and_then(Resource::as_composition_mut)
        .ok_or_else(|| Error::InvalidBundle("first entry is not a Composition".to_string()))?;
    let task = tail[0]
        .resource
        .as_mut()
        .and_then(Resource::as_task_mut)
        .ok_or_else(|| Error::InvalidBundle("second entry is not a Task".to_string()))?;

    let event = composition.event_type()?;
    let tracking_id = generate_tracking_id(event);

    composition.identifier = Some(Identifier::new(COMPOSITION_IDENTIFIER_SYSTEM, &tracking_id));
    task.upsert_identifier(Identifier::new(event.tracking_id_system(), &tracking_id));

    tracing::debug!(tracking_id = %tracking_id, event = %event, "Assigned tracking id");
    Ok(tracking_id)
}

/// Put the event coding first in `Task.code`, keeping unrelated codings.
pub fn setup_registration_type(task: &mut Task, event: EventType) {
    let code = task.code.get_or_insert_with(CodeableConcept::default);
    code.coding
        .retain(|c| c.system.as_deref() != Some(EVENT_TYPE_SYSTEM));
    code.coding
        .insert(0, Coding::new(EVENT_TYPE_SYSTEM, event.code()));
}

/// Status a caller may move a record to, by scope precedence
pub fn status_from_scope(payload: &TokenPayload) -> Result<RegStatus> {
    if payload.has_scope("register") {
        Ok(RegStatus::Registered)
    } else if payload.has_scope("validate") {
        Ok(RegStatus::Validated)
    } else if payload.has_scope("declare") {
        Ok(RegStatus::Declared)
    } else {
        Err(Error::InvalidToken(format!(
            "no workflow scope in [{}]",
            payload.scope.join(", ")
        )))
    }
}

/// Replace `businessStatus` with a single reg-status coding.
pub fn setup_registration_workflow(
    task: &mut Task,
    payload: &TokenPayload,
    default_status: Option<RegStatus>,
) -> Result<RegStatus> {
    let status = match default_status {
        Some(status) => status,
        None => status_from_scope(payload)?,
    };
    task.business_status = Some(CodeableConcept {
        coding: vec![Coding::new(REG_STATUS_SYSTEM, status.as_str())],
        text: None,
    });
    Ok(status)
}

fn practitioner_reference(practitioner: &Practitioner) -> Result<String> {
    practitioner
        .reference()
        .ok_or_else(|| Error::InvalidPractitioner("practitioner has no id".to_string()))
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn setup_last_reg_user(task: &mut Task, practitioner: &Practitioner) -> Result<()> {
    let reference = practitioner_reference(practitioner)?;
    task.extension
        .upsert(Extension::reference(ExtensionUrl::RegLastUser, reference));
    if task.last_modified.is_none() {
        task.last_modified = Some(now());
    }
    Ok(())
}

/// Record where the practitioner acted from.
pub async fn setup_last_reg_location(
    task: &mut Task,
    practitioner: &Practitioner,
    store: &dyn ResourceStore,
) -> Result<()> {
    let practitioner_id = practitioner
        .id
        .as_deref()
        .ok_or_else(|| Error::InvalidPractitioner("practitioner has no id".to_string()))?;
    let locations = practitioner_locations(store, practitioner_id).await?;
    apply_last_reg_location(task, &locations)
}

/// Upsert `regLastLocation` and `regLastOffice` from resolved locations
pub fn apply_last_reg_location(task: &mut Task, locations: &PractitionerLocations) -> Result<()> {
    let last_location = locations.last_location().reference().ok_or_else(|| {
        Error::InvalidResource("practitioner location has no id".to_string())
    })?;
    let office = locations
        .office
        .reference()
        .ok_or_else(|| Error::InvalidResource("practitioner office has no id".to_string()))?;

    task.extension
        .upsert(Extension::reference(ExtensionUrl::RegLastLocation, last_location));
    let mut office_ext = Extension::reference(ExtensionUrl::RegLastOffice, office);
    if let Some(name) = &locations.office.name {
        office_ext = office_ext.with_label(name.clone());
    }
    task.extension.upsert(office_ext);
    Ok(())
}

/// Attribute unsigned notes to the practitioner
pub fn setup_author_on_notes(task: &mut Task, practitioner: &Practitioner) -> Result<()> {
    if task.note.iter().all(|n| n.has_author()) {
        return Ok(());
    }
    let reference = practitioner_reference(practitioner)?;
    for note in task.note.iter_mut().filter(|n| !n.has_author()) {
        note.author_string = Some(reference.clone());
    }
    Ok(())
}

/// Replace entries of `existing` that share `key` with an incoming entry, append the rest.
fn merge_keyed(existing: &mut Vec<Value>, incoming: Vec<Value>, key: &str) {
    for item in incoming {
        let id = item.get(key).cloned();
        match id
            .as_ref()
            .and_then(|id| existing.iter_mut().find(|e| e.get(key) == Some(id)))
        {
            Some(slot) => *slot = item,
            None => existing.push(item),
        }
    }
}

/// Merge a verification response into the patient, field by field.
pub fn merge_verified_fields(patient: &mut Patient, verified: Map<String, Value>) -> Result<()> {
    let mut value = serde_json::to_value(&*patient)?;
    let Some(target) = value.as_object_mut() else {
        return Err(Error::Internal("patient did not serialize to an object".to_string()));
    };

    for (field, incoming) in verified {
        match (field.as_str(), incoming) {
            ("resourceType" | "id", _) => {}
            ("extension", Value::Array(items)) => {
                let slot = target
                    .entry("extension")
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let Value::Array(existing) = slot {
                    merge_keyed(existing, items, "url");
                }
            }
            ("identifier", Value::Array(items)) => {
                let slot = target
                    .entry("identifier")
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let Value::Array(existing) = slot {
                    merge_keyed(existing, items, "system");
                }
            }
            (_, incoming) => {
                target.insert(field, incoming);
            }
        }
    }

    *patient = serde_json::from_value(value)?;
    Ok(())
}

/// Check a deceased person against the national registry and fold the answer in.
pub async fn validate_deceased_details(
    patient: &mut Patient,
    auth: &AuthContext,
    verifier: &dyn VerificationService,
) -> Result<()> {
    let response = verifier.verify_deceased(patient, &auth.bearer()).await?;
    match response {
        Value::Object(fields) if !fields.is_empty() => {
            tracing::debug!(fields = fields.len(), "Merging verified deceased details");
            merge_verified_fields(patient, fields)
        }
        _ => {
            tracing::debug!("Verification returned no deceased details");
            Ok(())
        }
    }
}

/// Drop `relatesTo` duplicate links. With `duplicate_id`, only that link goes.
pub fn remove_duplicates_from_composition(
    composition: &mut Composition,
    target_id: &str,
    duplicate_id: Option<&str>,
) -> usize {
    let before = composition.relates_to.len();
    match duplicate_id {
        Some(duplicate_id) => {
            let target = format!("Composition/{duplicate_id}");
            composition
                .relates_to
                .retain(|r| r.target() != Some(target.as_str()));
        }
        None => composition.relates_to.clear(),
    }
    let removed = before - composition.relates_to.len();
    tracing::debug!(
        composition_id = target_id,
        duplicate_id = duplicate_id.unwrap_or("*"),
        removed,
        "Removed duplicate links"
    );
    removed
}

/// Download status recorded on the Task, if any
///
/// Exported for assignment and download callers; the submission and
/// correction pipelines do not consult it.
pub fn get_downloaded_extension_status(task: &Task) -> Option<&str> {
    task.extension
        .find(ExtensionUrl::RegDownloaded.url())
        .and_then(Extension::value_string)
}

/// Inputs of one pipeline run
pub struct ModifyContext<'a> {
    pub practitioner: &'a Practitioner,
    pub payload: &'a TokenPayload,
    /// Status forced by the flow; scope decides when `None`
    pub default_status: Option<RegStatus>,
    /// New records get a tracking id
    pub new_record: bool,
}

/// Apply the registration mutations in order and hand the bundle back.
pub async fn modify_registration_bundle(
    mut bundle: Bundle,
    ctx: &ModifyContext<'_>,
    store: &dyn ResourceStore,
) -> Result<(Bundle, RegStatus)> {
    if ctx.new_record {
        set_tracking_id(&mut bundle)?;
    }
    let event = locator::composition(&bundle)?.event_type()?;

    let status = {
        let task = locator::task_mut(&mut bundle)?;
        setup_registration_type(task, event);
        let status = setup_registration_workflow(task, ctx.payload, ctx.default_status)?;
        setup_last_reg_user(task, ctx.practitioner)?;
        setup_last_reg_location(task, ctx.practitioner, store).await?;
        setup_author_on_notes(task, ctx.practitioner)?;
        status
    };

    if status.is_submitted() {
        locator::composition_mut(&mut bundle)?.status = Some("final".to_string());
    }

    tracing::info!(event = %event, status = %status, "Modified registration bundle");
    Ok((bundle, status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crvs_models::{Annotation, Location, RelatesTo};
    use serde_json::json;

    fn bundle(composition_type: &str) -> Bundle {
        serde_json::from_value(json!({
            "resourceType": "Bundle",
            "type": "document",
            "entry": [
                {
                    "fullUrl": "urn:uuid:comp",
                    "resource": {
                        "resourceType": "Composition",
                        "status": "preliminary",
                        "type": { "coding": [{ "system": "http://opencrvs.org/doc-types", "code": composition_type }] }
                    }
                },
                {
                    "fullUrl": "urn:uuid:task",
                    "resource": { "resourceType": "Task", "status": "ready", "focus": { "reference": "urn:uuid:comp" } }
                }
            ]
        }))
        .unwrap()
    }

    fn practitioner() -> Practitioner {
        Practitioner {
            id: Some("e0daf66b-509e-4f45-86f3-f922b74f3dbf".into()),
            ..Default::default()
        }
    }

    fn payload(scopes: &[&str]) -> TokenPayload {
        TokenPayload {
            sub: "user-1".into(),
            scope: scopes.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn tracking_id_uses_event_letter() {
        let mut birth = bundle("birth-declaration");
        let id = set_tracking_id(&mut birth).unwrap();
        assert_eq!(id.len(), 7);
        assert!(id.starts_with('B'));
        assert!(id[1..].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));

        let composition = birth.entry[0].resource.as_ref().unwrap().as_composition().unwrap();
        assert_eq!(composition.tracking_id(), Some(id.as_str()));
        let task = birth.entry[1].resource.as_ref().unwrap().as_task().unwrap();
        assert_eq!(
            task.identifier_value("http://opencrvs.org/specs/id/birth-tracking-id"),
            Some(id.as_str())
        );

        let mut marriage = bundle("marriage-declaration");
        assert!(set_tracking_id(&mut marriage).unwrap().starts_with('M'));
    }

    #[test]
    fn tracking_id_needs_composition_and_task() {
        let mut empty = Bundle::new("document");
        let err = set_tracking_id(&mut empty).unwrap_err();
        assert!(err.to_string().starts_with("Invalid FHIR bundle found"));

        let mut swapped = bundle("birth-declaration");
        swapped.entry.swap(0, 1);
        assert!(matches!(set_tracking_id(&mut swapped), Err(Error::InvalidBundle(_))));
    }

    #[test]
    fn registration_type_is_created_and_kept_first() {
        let mut task = Task::new();
        setup_registration_type(&mut task, EventType::Birth);
        assert_eq!(
            serde_json::to_value(&task.code).unwrap(),
            json!({ "coding": [{ "system": "http://opencrvs.org/specs/types", "code": "BIRTH" }] })
        );

        task.code
            .as_mut()
            .unwrap()
            .coding
            .insert(0, Coding::new("http://example.org/local", "X"));
        setup_registration_type(&mut task, EventType::Death);
        let coding = &task.code.as_ref().unwrap().coding;
        assert_eq!(coding.len(), 2);
        assert_eq!(coding[0].code.as_deref(), Some("DEATH"));
        assert_eq!(coding[1].code.as_deref(), Some("X"));
    }

    #[test]
    fn scope_precedence_picks_highest_status() {
        let mut task = Task::new();
        let status =
            setup_registration_workflow(&mut task, &payload(&["declare", "register"]), None).unwrap();
        assert_eq!(status, RegStatus::Registered);
        assert_eq!(task.business_status(), Some(RegStatus::Registered));
        assert_eq!(task.business_status.as_ref().unwrap().coding.len(), 1);

        assert_eq!(status_from_scope(&payload(&["validate", "declare"])).unwrap(), RegStatus::Validated);
        assert!(matches!(
            status_from_scope(&payload(&["certify"])),
            Err(Error::InvalidToken(_))
        ));
    }

    #[test]
    fn default_status_wins_over_scope() {
        let mut task = Task::new();
        let status = setup_registration_workflow(
            &mut task,
            &payload(&["register"]),
            Some(RegStatus::RequestedCorrection),
        )
        .unwrap();
        assert_eq!(status, RegStatus::RequestedCorrection);
    }

    #[test]
    fn last_reg_user_is_replaced_not_duplicated() {
        let mut task = Task::new();
        setup_last_reg_user(&mut task, &practitioner()).unwrap();
        let other = Practitioner {
            id: Some("other".into()),
            ..Default::default()
        };
        setup_last_reg_user(&mut task, &other).unwrap();

        assert_eq!(task.extension.find_all(ExtensionUrl::RegLastUser.url()).len(), 1);
        assert_eq!(
            task.extension_reference(ExtensionUrl::RegLastUser),
            Some("Practitioner/other")
        );
        assert!(task.last_modified.is_some());
    }

    #[test]
    fn last_reg_location_prefers_nearest_jurisdiction() {
        let office = Location {
            id: Some("office-1".into()),
            name: Some("Ibombo District Office".into()),
            ..Default::default()
        };
        let district = Location {
            id: Some("district-1".into()),
            ..Default::default()
        };
        let mut task = Task::new();

        apply_last_reg_location(
            &mut task,
            &PractitionerLocations {
                office: office.clone(),
                ancestry: vec![district],
            },
        )
        .unwrap();
        assert_eq!(
            task.extension_reference(ExtensionUrl::RegLastLocation),
            Some("Location/district-1")
        );
        let office_ext = task.extension.find(ExtensionUrl::RegLastOffice.url()).unwrap();
        assert_eq!(office_ext.value_reference(), Some("Location/office-1"));
        assert_eq!(office_ext.label.as_deref(), Some("Ibombo District Office"));

        apply_last_reg_location(&mut task, &PractitionerLocations { office, ancestry: vec![] })
            .unwrap();
        assert_eq!(
            task.extension_reference(ExtensionUrl::RegLastLocation),
            Some("Location/office-1")
        );
        assert_eq!(task.extension.len(), 2);
    }

    #[tokio::test]
    async fn last_reg_location_needs_practitioner_id() {
        use crate::clients::ResourceStore;
        use async_trait::async_trait;

        struct NoStore;

        #[async_trait]
        impl ResourceStore for NoStore {
            async fn read(&self, reference: &str) -> Result<Resource> {
                Err(Error::ResourceNotFound(reference.to_string()))
            }
            async fn search(&self, _: &str, _: &[(&str, &str)]) -> Result<Vec<Resource>> {
                Ok(Vec::new())
            }
            async fn transaction(&self, bundle: &Bundle) -> Result<Bundle> {
                Ok(bundle.clone())
            }
        }

        let err = setup_last_reg_location(&mut Task::new(), &Practitioner::default(), &NoStore)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid practitioner data found"));
    }

    #[test]
    fn notes_without_author_are_attributed() {
        let mut task = Task::new();
        task.note = vec![
            Annotation {
                text: "Child is healthy".into(),
                time: Some("2018-10-31T09:45:05+10:00".into()),
                ..Default::default()
            },
            Annotation {
                text: "Already signed".into(),
                author_string: Some("Practitioner/someone-else".into()),
                ..Default::default()
            },
        ];
        setup_author_on_notes(&mut task, &practitioner()).unwrap();

        assert_eq!(
            serde_json::to_value(&task.note[0]).unwrap(),
            json!({
                "authorString": "Practitioner/e0daf66b-509e-4f45-86f3-f922b74f3dbf",
                "text": "Child is healthy",
                "time": "2018-10-31T09:45:05+10:00"
            })
        );
        assert_eq!(task.note[1].author_string.as_deref(), Some("Practitioner/someone-else"));
    }

    #[test]
    fn verified_fields_are_merged_by_key() {
        let mut patient: Patient = serde_json::from_value(json!({
            "resourceType": "Patient",
            "id": "deceased-1",
            "gender": "male",
            "identifier": [{ "system": "NATIONAL_ID", "value": "123" }],
            "extension": [{ "url": "http://opencrvs.org/specs/extension/age", "valueInteger": 40 }]
        }))
        .unwrap();

        let verified = json!({
            "id": "ignored",
            "deceasedDateTime": "2022-01-01",
            "identifier": [
                { "system": "NATIONAL_ID", "value": "456" },
                { "system": "BIRTH_REGISTRATION_NUMBER", "value": "B1" }
            ],
            "extension": [{ "url": "http://opencrvs.org/specs/extension/age", "valueInteger": 41 }]
        });
        let Value::Object(fields) = verified else { unreachable!() };
        merge_verified_fields(&mut patient, fields).unwrap();

        assert_eq!(patient.id.as_deref(), Some("deceased-1"));
        assert_eq!(patient.deceased_date_time.as_deref(), Some("2022-01-01"));
        assert_eq!(patient.identifier_value("NATIONAL_ID"), Some("456"));
        assert_eq!(patient.identifier.len(), 2);
        assert_eq!(patient.extension.len(), 1);
    }

    #[test]
    fn duplicate_links_removed_selectively_or_all() {
        let mut composition = Composition {
            relates_to: vec![RelatesTo::duplicate("dup-1"), RelatesTo::duplicate("dup-2")],
            ..Default::default()
        };
        assert_eq!(remove_duplicates_from_composition(&mut composition, "c1", Some("nope")), 0);
        assert_eq!(remove_duplicates_from_composition(&mut composition, "c1", Some("dup-1")), 1);
        assert_eq!(composition.relates_to[0].target(), Some("Composition/dup-2"));
        assert_eq!(remove_duplicates_from_composition(&mut composition, "c1", None), 1);
        assert!(composition.relates_to.is_empty());
    }

    #[test]
    fn downloaded_status_read_from_extension() {
        let mut task = Task::new();
        assert_eq!(get_downloaded_extension_status(&task), None);
        task.extension
            .push(Extension::string(ExtensionUrl::RegDownloaded, "DECLARED"));
        assert_eq!(get_downloaded_extension_status(&task), Some("DECLARED"));
    }
}
