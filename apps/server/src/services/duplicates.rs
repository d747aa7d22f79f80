//! Potential duplicate detection over the search index

use crate::clients::SearchIndex;
use crate::models::{CompositionBody, DuplicateRef, SearchHit};
use crate::Result;
use crvs_models::EventType;
use serde_json::{json, Value};

/// Hits scoring above `threshold`, excluding the record itself
pub fn find_duplicate_ids(target_id: &str, hits: &[SearchHit], threshold: f64) -> Vec<DuplicateRef> {
    hits.iter()
        .filter(|hit| hit.id != target_id && hit.score > threshold)
        .map(|hit| DuplicateRef {
            id: hit.id.clone(),
            tracking_id: hit.source.tracking_id.clone(),
        })
        .collect()
}

fn fuzzy(field: &str, value: &str) -> Value {
    json!({ "match": { field: { "query": value, "fuzziness": "AUTO" } } })
}

fn exact(field: &str, value: &str) -> Value {
    json!({ "term": { format!("{field}.keyword"): value } })
}

fn date_near(field: &str, value: &str) -> Value {
    json!({
        "range": { field: { "gte": format!("{value}||-1y"), "lte": format!("{value}||+1y") } }
    })
}

/// Name and birth date clauses for one person prefix (`child`, `mother`, ...)
fn person_clauses(body: &CompositionBody, prefix: &str, clauses: &mut Vec<Value>) {
    for suffix in ["FirstNames", "FamilyName", "FirstNamesLocal", "FamilyNameLocal"] {
        let field = format!("{prefix}{suffix}");
        if let Some(value) = body.detail(&field) {
            clauses.push(fuzzy(&field, value));
        }
    }
    let dob = format!("{prefix}DoB");
    if let Some(value) = body.detail(&dob) {
        clauses.push(date_near(&dob, value));
    }
    let identifier = format!("{prefix}Identifier");
    if let Some(value) = body.detail(&identifier) {
        clauses.push(exact(&identifier, value));
    }
}

fn bool_query(event: EventType, required: Vec<Value>, should: Vec<Value>) -> Value {
    json!({
        "query": {
            "bool": {
                "must": required,
                "should": should,
                "filter": [{ "term": { "event": event.code() } }]
            }
        }
    })
}

/// Child and mother must match; father and informant raise the score
pub fn birth_duplicate_query(body: &CompositionBody) -> Value {
    let mut must = Vec::new();
    person_clauses(body, "child", &mut must);
    if let Some(gender) = body.detail("gender") {
        must.push(exact("gender", gender));
    }
    person_clauses(body, "mother", &mut must);

    let mut should = Vec::new();
    person_clauses(body, "father", &mut should);
    person_clauses(body, "informant", &mut should);
    bool_query(EventType::Birth, must, should)
}

/// Deceased must match; relatives and informant raise the score
pub fn death_duplicate_query(body: &CompositionBody) -> Value {
    let mut must = Vec::new();
    person_clauses(body, "deceased", &mut must);
    if let Some(date) = body.detail("deathDate") {
        must.push(date_near("deathDate", date));
    }

    let mut should = Vec::new();
    for prefix in ["mother", "father", "spouse", "informant"] {
        person_clauses(body, prefix, &mut should);
    }
    bool_query(EventType::Death, must, should)
}

/// Search for records that look like `body`. Marriages are never searched.
pub async fn detect_duplicates(
    target_id: &str,
    body: &CompositionBody,
    index: &dyn SearchIndex,
    threshold: f64,
) -> Result<Vec<DuplicateRef>> {
    let query = match body.event {
        Some(EventType::Birth) => birth_duplicate_query(body),
        Some(EventType::Death) => death_duplicate_query(body),
        Some(EventType::Marriage) | None => return Ok(Vec::new()),
    };
    let hits = index.search(&query).await?;
    let duplicates = find_duplicate_ids(target_id, &hits, threshold);
    if !duplicates.is_empty() {
        tracing::info!(
            composition_id = target_id,
            count = duplicates.len(),
            "Potential duplicates found"
        );
    }
    Ok(duplicates)
}
