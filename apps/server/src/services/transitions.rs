//! Registration status transitions and the operation history

use crate::auth::AuthContext;
use crate::clients::{ResourceStore, UserDirectory};
use crate::models::{CompositionBody, Correction, OperationHistory, UserModel, UserQuery};
use crate::Result;
use chrono::{SecondsFormat, Utc};
use crvs_models::{codes::NOTIFICATION_TYPES, ExtensionUrl, Location, RegStatus, Resource, Task};

/// Statuses a record may be in before moving to `target`.
///
/// `None` stands for a record with no history yet.
pub fn allowed_predecessors(target: RegStatus) -> &'static [Option<RegStatus>] {
    use RegStatus::*;
    match target {
        Archived => &[Some(Declared), Some(Rejected), Some(Validated)],
        InProgress => &[None],
        Declared => &[Some(Archived), None],
        Rejected => &[
            Some(Declared),
            Some(InProgress),
            Some(WaitingValidation),
            Some(Validated),
            Some(Archived),
        ],
        Validated => &[
            Some(Declared),
            Some(InProgress),
            Some(Rejected),
            Some(Archived),
            None,
        ],
        WaitingValidation => &[
            None,
            Some(Declared),
            Some(InProgress),
            Some(Rejected),
            Some(Validated),
        ],
        Registered => &[
            None,
            Some(Declared),
            Some(InProgress),
            Some(Rejected),
            Some(Validated),
            Some(WaitingValidation),
        ],
        Certified => &[Some(Registered), Some(Issued)],
        Issued => &[Some(Certified)],
        RequestedCorrection => &[Some(Registered), Some(Certified)],
        Reinstated => &[Some(Archived)],
    }
}

/// Whether a record whose last recorded status is `previous` may move to `target`.
///
/// Targets outside the status table are accepted.
pub fn is_valid_transition(previous: Option<&str>, target: &str) -> bool {
    let Ok(target_status) = target.parse::<RegStatus>() else {
        tracing::warn!(target, "Unknown target status, accepting transition");
        return true;
    };
    let previous = match previous.map(str::parse::<RegStatus>) {
        None => None,
        Some(Ok(status)) => Some(status),
        // An unrecognised history entry matches no rule
        Some(Err(_)) => return false,
    };
    allowed_predecessors(target_status).contains(&previous)
}

/// Check the body's target status against its last history entry
pub fn is_valid_operation_history(body: &CompositionBody) -> bool {
    match body.type_.as_deref() {
        Some(target) => is_valid_transition(body.previous_status(), target),
        None => true,
    }
}

fn office_of(resource: Resource) -> Option<Location> {
    match resource {
        Resource::Location(location) => Some(location),
        _ => None,
    }
}

/// Field changes requested in a correction, paired from Task input and output
fn correction_diff(task: &Task) -> Option<Vec<Correction>> {
    if task.input.is_empty() || task.input.len() != task.output.len() {
        return None;
    }
    Some(
        task.input
            .iter()
            .zip(&task.output)
            .map(|(input, output)| Correction {
                section: input.value_code.clone().unwrap_or_default(),
                field_name: input.value_id.clone().unwrap_or_default(),
                old_value: input.value_string.clone().unwrap_or_default(),
                new_value: output.value_string.clone().unwrap_or_default(),
            })
            .collect(),
    )
}

fn operator_entry(
    status: &str,
    user: &UserModel,
    office: Option<&Location>,
    operated_on: String,
) -> OperationHistory {
    let primary = user.name_in("en");
    let locale = user.name_locale("en");
    OperationHistory {
        operation_type: status.to_string(),
        operated_on: Some(operated_on),
        operator_role: user.role_label("en").unwrap_or_default().to_string(),
        operator_first_names: primary.map(|n| n.given_joined()).unwrap_or_default(),
        operator_family_name: primary.and_then(|n| n.family.clone()).unwrap_or_default(),
        operator_first_names_locale: locale.map(|n| n.given_joined()).unwrap_or_default(),
        operator_family_name_locale: locale.and_then(|n| n.family.clone()).unwrap_or_default(),
        operator_office_name: office.and_then(|o| o.name.clone()).unwrap_or_default(),
        operator_office_alias: office.map(|o| o.alias.clone()).unwrap_or_default(),
        ..Default::default()
    }
}

/// Append an operation history entry for the body's target status.
///
/// Returns `false`, leaving the body untouched, when the transition is not
/// allowed from the last recorded status.
pub async fn create_status_history(
    body: &mut CompositionBody,
    task: Option<&Task>,
    auth: &AuthContext,
    users: &dyn UserDirectory,
    store: &dyn ResourceStore,
) -> Result<bool> {
    let Some(status) = body.type_.clone() else {
        return Ok(false);
    };
    if !is_valid_transition(body.previous_status(), &status) {
        tracing::warn!(
            composition_id = body.composition_id.as_deref().unwrap_or_default(),
            from = body.previous_status().unwrap_or("<none>"),
            to = %status,
            "Rejected status transition, history not updated"
        );
        return Ok(false);
    }

    let bearer = auth.bearer();
    let query = UserQuery::PractitionerId(body.updated_by.clone().unwrap_or_default());
    let office_ref = task.and_then(|t| t.extension_reference(ExtensionUrl::RegLastOffice));

    let user_lookup = users.get_user(&query, &bearer);
    let office_lookup = async {
        match office_ref {
            Some(reference) => store.read(reference).await.map(office_of),
            None => Ok(None),
        }
    };
    let (user, office) = futures::try_join!(user_lookup, office_lookup)?;

    let operated_on = task
        .and_then(|t| t.last_modified.clone())
        .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
    let mut entry = operator_entry(&status, &user, office.as_ref(), operated_on);
    entry.reject_reason = body.reject_reason.clone();
    entry.reject_comment = body.reject_comment.clone();

    let is_notification = body
        .composition_type
        .as_deref()
        .is_some_and(|t| NOTIFICATION_TYPES.contains(&t));
    if status == RegStatus::InProgress.as_str() && is_notification {
        if let Some(location_id) = body.event_location_id.as_deref() {
            let facility = office_of(store.read(&format!("Location/{location_id}")).await?);
            entry.notification_facility_name =
                Some(facility.as_ref().and_then(|f| f.name.clone()).unwrap_or_default());
            entry.notification_facility_alias = Some(facility.map(|f| f.alias).unwrap_or_default());
        }
    }

    if status == RegStatus::RequestedCorrection.as_str() {
        entry.correction = task.and_then(correction_diff);
    }

    tracing::debug!(
        composition_id = body.composition_id.as_deref().unwrap_or_default(),
        status = %status,
        history_len = body.operation_histories.len() + 1,
        "Appending operation history"
    );
    body.operation_histories.push(entry);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenPayload;
    use crate::models::{RoleLabel, UserRole};
    use async_trait::async_trait;
    use crvs_models::{Bundle, Extension, HumanName, TaskParameter};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct Directory {
        user: UserModel,
        queries: Mutex<Vec<UserQuery>>,
    }

    #[async_trait]
    impl UserDirectory for Directory {
        async fn get_user(&self, query: &UserQuery, _bearer: &str) -> Result<UserModel> {
            self.queries.lock().unwrap().push(query.clone());
            Ok(self.user.clone())
        }
    }

    #[derive(Default)]
    struct Locations(HashMap<String, Resource>);

    #[async_trait]
    impl ResourceStore for Locations {
        async fn read(&self, reference: &str) -> Result<Resource> {
            self.0
                .get(reference)
                .cloned()
                .ok_or_else(|| crate::Error::ResourceNotFound(reference.to_string()))
        }
        async fn search(&self, _: &str, _: &[(&str, &str)]) -> Result<Vec<Resource>> {
            Ok(Vec::new())
        }
        async fn transaction(&self, bundle: &Bundle) -> Result<Bundle> {
            Ok(bundle.clone())
        }
    }

    fn directory() -> Directory {
        Directory {
            user: UserModel {
                practitioner_id: Some("pr-1".into()),
                role: Some(UserRole {
                    labels: vec![
                        RoleLabel { lang: "en".into(), label: "Field Agent".into() },
                        RoleLabel { lang: "fr".into(), label: "Agent de terrain".into() },
                    ],
                }),
                name: vec![
                    HumanName {
                        use_: Some("en".into()),
                        family: Some("Mweene".into()),
                        given: vec!["Kalusha".into()],
                    },
                    HumanName {
                        use_: Some("bn".into()),
                        family: Some("মুইন".into()),
                        given: vec!["কালুশা".into()],
                    },
                ],
                ..Default::default()
            },
            queries: Mutex::new(Vec::new()),
        }
    }

    fn auth() -> AuthContext {
        AuthContext {
            token: "token".into(),
            payload: TokenPayload::default(),
        }
    }

    fn location(id: &str, name: &str, alias: &str) -> Resource {
        Resource::Location(Location {
            id: Some(id.into()),
            name: Some(name.into()),
            alias: vec![alias.into()],
            ..Default::default()
        })
    }

    fn body(previous: &[&str], target: &str) -> CompositionBody {
        CompositionBody {
            composition_id: Some("comp-1".into()),
            composition_type: Some("birth-declaration".into()),
            type_: Some(target.into()),
            updated_by: Some("pr-1".into()),
            operation_histories: previous
                .iter()
                .map(|s| OperationHistory {
                    operation_type: s.to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn transition_table_matches_workflow() {
        assert!(is_valid_transition(None, "DECLARED"));
        assert!(is_valid_transition(Some("ARCHIVED"), "DECLARED"));
        assert!(!is_valid_transition(Some("VALIDATED"), "DECLARED"));
        assert!(is_valid_transition(Some("DECLARED"), "REGISTERED"));
        assert!(!is_valid_transition(Some("CERTIFIED"), "REGISTERED"));
        assert!(is_valid_transition(Some("ISSUED"), "CERTIFIED"));
        assert!(!is_valid_transition(None, "CERTIFIED"));
        assert!(is_valid_transition(Some("REGISTERED"), "REQUESTED_CORRECTION"));
        assert!(!is_valid_transition(Some("DECLARED"), "REQUESTED_CORRECTION"));
        assert!(!is_valid_transition(Some("DECLARED"), "IN_PROGRESS"));
        assert!(is_valid_transition(Some("ARCHIVED"), "REINSTATED"));
    }

    #[test]
    fn unknown_target_status_is_accepted() {
        assert!(is_valid_transition(Some("REGISTERED"), "DOWNLOADED"));
        assert!(is_valid_operation_history(&body(&["REGISTERED"], "SOMETHING_NEW")));
    }

    #[test]
    fn history_uses_last_entry() {
        assert!(is_valid_operation_history(&body(&["DECLARED", "VALIDATED"], "REGISTERED")));
        assert!(!is_valid_operation_history(&body(&["REGISTERED", "CERTIFIED"], "VALIDATED")));
        assert!(is_valid_operation_history(&body(&[], "IN_PROGRESS")));
    }

    #[test]
    fn archive_only_before_registration() {
        for previous in ["DECLARED", "REJECTED", "VALIDATED"] {
            assert!(
                is_valid_operation_history(&body(&[previous], "ARCHIVED")),
                "{previous} -> ARCHIVED"
            );
        }
        assert!(!is_valid_operation_history(&body(&["REGISTERED"], "ARCHIVED")));

        for previous in ["DECLARED", "REGISTERED", "IN_PROGRESS", "ARCHIVED"] {
            assert!(
                !is_valid_operation_history(&body(&[previous], "IN_PROGRESS")),
                "{previous} -> IN_PROGRESS"
            );
        }
    }

    #[tokio::test]
    async fn appends_operator_and_office() {
        let users = directory();
        let mut store = Locations::default();
        store.0.insert("Location/office-1".into(), location("office-1", "Ibombo Office", "আইবোম্বো"));
        let mut task = Task::new();
        task.last_modified = Some("2023-01-01T10:00:00.000Z".into());
        task.extension
            .upsert(Extension::reference(ExtensionUrl::RegLastOffice, "Location/office-1"));

        let mut body = body(&["DECLARED"], "REGISTERED");
        let appended = create_status_history(&mut body, Some(&task), &auth(), &users, &store)
            .await
            .unwrap();

        assert!(appended);
        assert_eq!(
            *users.queries.lock().unwrap(),
            vec![UserQuery::PractitionerId("pr-1".into())]
        );
        let entry = body.operation_histories.last().unwrap();
        assert_eq!(entry.operation_type, "REGISTERED");
        assert_eq!(entry.operated_on.as_deref(), Some("2023-01-01T10:00:00.000Z"));
        assert_eq!(entry.operator_role, "Field Agent");
        assert_eq!(entry.operator_first_names, "Kalusha");
        assert_eq!(entry.operator_family_name_locale, "মুইন");
        assert_eq!(entry.operator_office_name, "Ibombo Office");
        assert_eq!(entry.operator_office_alias, vec!["আইবোম্বো".to_string()]);
        assert!(entry.correction.is_none());
    }

    #[tokio::test]
    async fn rejected_transition_leaves_history_alone() {
        let users = directory();
        let mut body = body(&["REGISTERED"], "DECLARED");
        let appended = create_status_history(&mut body, None, &auth(), &users, &Locations::default())
            .await
            .unwrap();
        assert!(!appended);
        assert_eq!(body.operation_histories.len(), 1);
        assert!(users.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn notification_records_facility() {
        let mut store = Locations::default();
        store.0.insert("Location/hc-1".into(), location("hc-1", "Chikobo Rural Health Centre", "চিকোবো"));
        let mut body = body(&[], "IN_PROGRESS");
        body.composition_type = Some("birth-notification".into());
        body.event_location_id = Some("hc-1".into());

        create_status_history(&mut body, None, &auth(), &directory(), &store)
            .await
            .unwrap();

        let entry = &body.operation_histories[0];
        assert_eq!(entry.notification_facility_name.as_deref(), Some("Chikobo Rural Health Centre"));
        assert_eq!(entry.operator_office_name, "");
    }

    #[tokio::test]
    async fn correction_diff_pairs_input_and_output() {
        let mut task = Task::new();
        task.input = vec![TaskParameter {
            value_code: Some("child".into()),
            value_id: Some("firstNamesEng".into()),
            value_string: Some("Mike".into()),
            ..Default::default()
        }];
        task.output = vec![TaskParameter {
            value_code: Some("child".into()),
            value_id: Some("firstNamesEng".into()),
            value_string: Some("Michael".into()),
            ..Default::default()
        }];
        let mut body = body(&["REGISTERED"], "REQUESTED_CORRECTION");

        create_status_history(&mut body, Some(&task), &auth(), &directory(), &Locations::default())
            .await
            .unwrap();

        let correction = body.operation_histories[1].correction.as_ref().unwrap();
        assert_eq!(
            correction[0],
            Correction {
                section: "child".into(),
                field_name: "firstNamesEng".into(),
                old_value: "Mike".into(),
                new_value: "Michael".into(),
            }
        );

        task.output.clear();
        assert!(correction_diff(&task).is_none());
    }
}
