//! Search index documents built from registration bundles
//!
//! The index keeps one flat [`CompositionBody`] per composition: names,
//! dates and identifiers of every person in the record, keyed by the
//! section they appear in (`childFirstNames`, `motherDoB`, ...), plus the
//! workflow fields and the operation history.

use crate::models::CompositionBody;
use crate::services::locator;
use crate::Result;
use chrono::{SecondsFormat, Utc};
use crvs_models::{
    Bundle, Composition, EventType, ExtensionUrl, Patient, RegStatus, Resource, Task,
};
use serde_json::Value;

/// Section code prefix and index field prefix for each person in a record
const PERSON_SECTIONS: [(&str, &str); 8] = [
    ("child-details", "child"),
    ("mother-details", "mother"),
    ("father-details", "father"),
    ("informant-details", "informant"),
    ("deceased-details", "deceased"),
    ("spouse-details", "spouse"),
    ("bride-details", "bride"),
    ("groom-details", "groom"),
];

const PRIMARY_NAME_USE: &str = "en";

/// Patient behind a section; informants are wrapped in a RelatedPerson
fn section_patient<'a>(bundle: &'a Bundle, composition: &Composition, code: &str) -> Option<&'a Patient> {
    let reference = composition.section_subject(code)?;
    match locator::resolve_local(reference, bundle).ok()?? {
        Resource::Patient(patient) => Some(patient),
        Resource::Other(value) if value.get("resourceType") == Some(&Value::from("RelatedPerson")) => {
            let patient_ref = value.pointer("/patient/reference")?.as_str()?;
            locator::resolve_local(patient_ref, bundle).ok()??.as_patient()
        }
        _ => None,
    }
}

fn person_details(body: &mut CompositionBody, prefix: &str, patient: &Patient) {
    let primary = patient
        .name
        .iter()
        .find(|n| n.use_.as_deref() == Some(PRIMARY_NAME_USE))
        .or_else(|| patient.name.first());
    let local = patient
        .name
        .iter()
        .find(|n| n.use_.as_deref() != Some(PRIMARY_NAME_USE));

    body.set_detail(&format!("{prefix}FirstNames"), primary.map(|n| n.given_joined()));
    body.set_detail(&format!("{prefix}FamilyName"), primary.and_then(|n| n.family.clone()));
    body.set_detail(&format!("{prefix}FirstNamesLocal"), local.map(|n| n.given_joined()));
    body.set_detail(&format!("{prefix}FamilyNameLocal"), local.and_then(|n| n.family.clone()));
    body.set_detail(&format!("{prefix}DoB"), patient.birth_date.clone());
    body.set_detail(
        &format!("{prefix}Identifier"),
        patient.identifier.first().and_then(|i| i.value.clone()),
    );
}

/// Location id of the encounter the event happened at
fn event_location_id(bundle: &Bundle, composition: &Composition, event: EventType) -> Option<String> {
    let reference = composition.section_subject(&format!("{}-encounter", event.slug()))?;
    let encounter = locator::resolve_local(reference, bundle).ok()??.to_value().ok()?;
    encounter
        .pointer("/location/0/location/reference")
        .and_then(Value::as_str)
        .and_then(|r| r.strip_prefix("Location/"))
        .map(str::to_string)
}

fn task_string(task: &Task, url: ExtensionUrl) -> Option<String> {
    task.extension
        .find(url.url())
        .and_then(|e| e.value_string())
        .map(str::to_string)
}

/// Flatten a bundle into the document stored for `composition_id`.
pub fn build_composition_body(
    bundle: &Bundle,
    composition_id: &str,
    status: RegStatus,
    practitioner_id: &str,
) -> Result<CompositionBody> {
    let composition = locator::composition(bundle)?;
    let task = locator::task(bundle)?;
    let event = composition.event_type()?;

    let mut body = CompositionBody {
        composition_id: Some(composition_id.to_string()),
        composition_type: composition.type_code().map(str::to_string),
        event: Some(event),
        type_: Some(status.as_str().to_string()),
        tracking_id: composition.tracking_id().map(str::to_string),
        registration_number: task
            .identifier_value(&event.registration_number_system())
            .map(str::to_string),
        event_location_id: event_location_id(bundle, composition, event),
        declaration_location_id: task
            .extension_reference(ExtensionUrl::RegLastLocation)
            .and_then(|r| r.strip_prefix("Location/"))
            .map(str::to_string),
        contact_relationship: task_string(task, ExtensionUrl::ContactRelationship),
        contact_number: task_string(task, ExtensionUrl::ContactPersonPhoneNumber),
        contact_email: task_string(task, ExtensionUrl::ContactPersonEmail),
        date_of_declaration: composition.date.clone(),
        relates_to: composition
            .relates_to
            .iter()
            .filter_map(|r| r.target())
            .filter_map(|t| t.strip_prefix("Composition/"))
            .map(str::to_string)
            .collect(),
        created_by: Some(practitioner_id.to_string()),
        updated_by: Some(practitioner_id.to_string()),
        modified_at: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        ..Default::default()
    };
    if status == RegStatus::Rejected {
        body.reject_reason = task
            .additional
            .get("reason")
            .and_then(|r| r.get("text"))
            .and_then(Value::as_str)
            .map(str::to_string);
        body.reject_comment = task.note.last().map(|n| n.text.clone());
    }

    for (code, prefix) in PERSON_SECTIONS {
        if let Some(patient) = section_patient(bundle, composition, code) {
            person_details(&mut body, prefix, patient);
        }
    }

    let subject = match event {
        EventType::Birth => section_patient(bundle, composition, "child-details"),
        EventType::Death => section_patient(bundle, composition, "deceased-details"),
        EventType::Marriage => None,
    };
    if let Some(subject) = subject {
        body.set_detail("gender", subject.gender.clone());
        body.set_detail("deathDate", subject.deceased_date_time.clone());
    }

    Ok(body)
}

/// Keep what an earlier version of the document established.
pub fn carry_over(body: &mut CompositionBody, existing: CompositionBody) {
    body.created_by = existing.created_by.or(body.created_by.take());
    body.created_at = existing.created_at.or(existing.modified_at);
    body.assignment = existing.assignment;
    body.operation_histories = existing.operation_histories;
    body.tracking_id = body.tracking_id.take().or(existing.tracking_id);
    if body.relates_to.is_empty() {
        body.relates_to = existing.relates_to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OperationHistory;
    use serde_json::json;

    fn bundle() -> Bundle {
        serde_json::from_value(json!({
            "resourceType": "Bundle",
            "type": "document",
            "entry": [
                {
                    "fullUrl": "urn:uuid:comp",
                    "resource": {
                        "resourceType": "Composition",
                        "identifier": { "system": "urn:ietf:rfc:3986", "value": "B5WGYJE" },
                        "type": { "coding": [{ "code": "birth-declaration" }] },
                        "date": "2023-02-01T10:00:00.000Z",
                        "section": [
                            { "code": { "coding": [{ "code": "child-details" }] }, "entry": [{ "reference": "urn:uuid:child" }] },
                            { "code": { "coding": [{ "code": "mother-details" }] }, "entry": [{ "reference": "urn:uuid:mother" }] },
                            { "code": { "coding": [{ "code": "informant-details" }] }, "entry": [{ "reference": "urn:uuid:informant" }] },
                            { "code": { "coding": [{ "code": "birth-encounter" }] }, "entry": [{ "reference": "urn:uuid:enc" }] }
                        ]
                    }
                },
                {
                    "fullUrl": "urn:uuid:task",
                    "resource": {
                        "resourceType": "Task",
                        "status": "ready",
                        "extension": [
                            { "url": "http://opencrvs.org/specs/extension/contact-relationship", "valueString": "MOTHER" },
                            { "url": "http://opencrvs.org/specs/extension/regLastLocation", "valueReference": { "reference": "Location/district-1" } }
                        ]
                    }
                },
                {
                    "fullUrl": "urn:uuid:child",
                    "resource": {
                        "resourceType": "Patient",
                        "gender": "female",
                        "birthDate": "2023-01-15",
                        "name": [
                            { "use": "en", "given": ["Anne", "Marie"], "family": "Phiri" },
                            { "use": "bn", "given": ["আনা"], "family": "ফিরি" }
                        ]
                    }
                },
                {
                    "fullUrl": "urn:uuid:mother",
                    "resource": {
                        "resourceType": "Patient",
                        "birthDate": "1990-05-05",
                        "identifier": [{ "type": { "coding": [{ "code": "NATIONAL_ID" }] }, "value": "1234567890" }],
                        "name": [{ "use": "en", "given": ["Grace"], "family": "Phiri" }]
                    }
                },
                {
                    "fullUrl": "urn:uuid:informant",
                    "resource": { "resourceType": "RelatedPerson", "patient": { "reference": "urn:uuid:mother" } }
                },
                {
                    "fullUrl": "urn:uuid:enc",
                    "resource": { "resourceType": "Encounter", "location": [{ "location": { "reference": "Location/hc-1" } }] }
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn flattens_people_and_workflow_fields() {
        let body = build_composition_body(&bundle(), "comp-1", RegStatus::Declared, "pr-1").unwrap();

        assert_eq!(body.event, Some(EventType::Birth));
        assert_eq!(body.type_.as_deref(), Some("DECLARED"));
        assert_eq!(body.tracking_id.as_deref(), Some("B5WGYJE"));
        assert_eq!(body.event_location_id.as_deref(), Some("hc-1"));
        assert_eq!(body.declaration_location_id.as_deref(), Some("district-1"));
        assert_eq!(body.contact_relationship.as_deref(), Some("MOTHER"));
        assert_eq!(body.detail("childFirstNames"), Some("Anne Marie"));
        assert_eq!(body.detail("childFamilyNameLocal"), Some("ফিরি"));
        assert_eq!(body.detail("childDoB"), Some("2023-01-15"));
        assert_eq!(body.detail("gender"), Some("female"));
        assert_eq!(body.detail("motherIdentifier"), Some("1234567890"));
        assert_eq!(body.detail("informantFirstNames"), Some("Grace"));
        assert_eq!(body.detail("fatherFirstNames"), None);
    }

    #[test]
    fn carry_over_keeps_history_and_creator() {
        let mut body = build_composition_body(&bundle(), "comp-1", RegStatus::Registered, "pr-2").unwrap();
        let existing = CompositionBody {
            created_by: Some("pr-1".into()),
            created_at: Some("2023-02-01T10:00:00.000Z".into()),
            operation_histories: vec![OperationHistory {
                operation_type: "DECLARED".into(),
                ..Default::default()
            }],
            relates_to: vec!["dup-1".into()],
            ..Default::default()
        };
        carry_over(&mut body, existing);

        assert_eq!(body.created_by.as_deref(), Some("pr-1"));
        assert_eq!(body.updated_by.as_deref(), Some("pr-2"));
        assert_eq!(body.previous_status(), Some("DECLARED"));
        assert_eq!(body.relates_to, vec!["dup-1".to_string()]);
    }
}
