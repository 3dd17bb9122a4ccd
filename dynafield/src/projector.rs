//! Index projection: flatten one listing (fixed columns plus every bound
//! field's value) into a single denormalized document, and keep the
//! external index in agreement with the relational store. The store is
//! authoritative; the index is an eventually-consistent projection, so
//! index write failures are logged and swallowed and a full rebuild exists
//! as the recovery path.

use std::collections::BTreeMap;

use chrono::SecondsFormat;
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::{
    errors::EngineError,
    search::{IndexError, SearchIndex},
    store::{ServiceTypeSelector, ValueStore},
    types::{AttrValue, BoundField, InputType},
};

/// Upper bound of the projected excerpt, in characters.
pub const EXCERPT_MAX_CHARS: usize = 200;

/// One flat listing document as the index stores it. The body carries the
/// `id` key; the struct field mirrors it for routing without re-parsing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexDocument {
    #[serde(skip)]
    pub id: i64,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

/// Outcome of a full index rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub projected: usize,
    pub failed: usize,
}

/// Load a listing's full relational representation and flatten it into one
/// document: fixed columns, then one key per bound field projected by its
/// input type.
pub async fn project_for_index<S: ValueStore>(store: &S, listing_id: i64) -> Result<IndexDocument, EngineError> {
    let listing = store.listing(listing_id).await?.ok_or(EngineError::NotFound {
        entity: "listing",
        id: listing_id.to_string(),
    })?;
    let service_type = store
        .service_type(&ServiceTypeSelector::Id(listing.service_type_id))
        .await?
        .ok_or_else(|| {
            EngineError::storage(format!(
                "listing {listing_id} references unknown service type {}",
                listing.service_type_id
            ))
        })?;
    let fields = store.bound_fields(service_type.id).await?;
    let values: BTreeMap<i64, AttrValue> = store
        .listing_values(listing_id)
        .await?
        .into_iter()
        .map(|stored| (stored.field_id, stored.value))
        .collect();

    let mut body = Map::new();
    body.insert("id".into(), Value::from(listing.id));
    body.insert("title".into(), Value::from(listing.title.clone()));
    body.insert("excerpt".into(), Value::from(excerpt(&listing.body)));
    body.insert("service_type".into(), Value::from(service_type.slug.clone()));
    body.insert("service_type_id".into(), Value::from(service_type.id));
    body.insert("price".into(), Value::from(listing.price));
    body.insert("location".into(), Value::from(listing.location.clone()));
    body.insert("created_at".into(), Value::from(listing.created_at.timestamp()));
    body.insert("updated_at".into(), Value::from(listing.updated_at.timestamp()));

    for (key, bound) in &fields {
        body.insert(key.clone(), project_value(bound, values.get(&bound.field.id)));
    }

    Ok(IndexDocument {
        id: listing.id,
        body,
    })
}

/// Project a listing into the index, replacing whatever document the index
/// held for it. Index failures are logged, never surfaced.
pub async fn sync_listing<S: ValueStore, I: SearchIndex>(
    store: &S,
    index: &I,
    listing_id: i64,
) -> Result<(), EngineError> {
    let document = project_for_index(store, listing_id).await?;
    if let Err(err) = replace_document(index, &document).await {
        log::warn!("index upsert for listing {listing_id} failed: {err}");
    }
    Ok(())
}

/// Drop a listing's document from the index, best effort.
pub async fn remove_listing<I: SearchIndex>(index: &I, listing_id: i64) {
    if let Err(err) = index.delete_by_id(listing_id).await {
        log::warn!("index delete for listing {listing_id} failed: {err}");
    }
}

/// Re-project every listing. Per-listing failures are logged and counted;
/// the rebuild itself keeps going.
pub async fn rebuild_index<S: ValueStore, I: SearchIndex>(
    store: &S,
    index: &I,
) -> Result<RebuildReport, EngineError> {
    let mut report = RebuildReport::default();
    for listing_id in store.listing_ids().await? {
        match project_for_index(store, listing_id).await {
            Ok(document) => match replace_document(index, &document).await {
                Ok(()) => report.projected += 1,
                Err(err) => {
                    log::warn!("index upsert for listing {listing_id} failed during rebuild: {err}");
                    report.failed += 1;
                }
            },
            Err(err) => {
                log::warn!("projection of listing {listing_id} failed during rebuild: {err}");
                report.failed += 1;
            }
        }
    }
    Ok(report)
}

/// Delete-then-insert so keys of removed dynamic values never linger. The
/// delete is best effort on its own; only the upsert decides the outcome.
async fn replace_document<I: SearchIndex>(index: &I, document: &IndexDocument) -> Result<(), IndexError> {
    if let Err(err) = index.delete_by_id(document.id).await {
        log::warn!("index delete for listing {} failed: {err}", document.id);
    }
    index.add_or_update(document).await
}

fn project_value(bound: &BoundField, value: Option<&AttrValue>) -> Value {
    match bound.field.input {
        InputType::Number | InputType::Range => match value {
            Some(AttrValue::Number(number)) => json_number(*number),
            _ => Value::Null,
        },
        InputType::Toggle => match value {
            Some(AttrValue::Bool(flag)) => Value::Bool(*flag),
            _ => Value::Bool(false),
        },
        InputType::Select | InputType::Radio => match value {
            Some(AttrValue::Choice(Some(option_id))) => bound
                .option_token(*option_id)
                .map(Value::from)
                .unwrap_or(Value::Null),
            _ => Value::Null,
        },
        InputType::Multiselect | InputType::Checkbox => match value {
            Some(AttrValue::Choices(option_ids)) => Value::Array(
                option_ids
                    .iter()
                    .filter_map(|option_id| bound.option_token(*option_id))
                    .map(Value::from)
                    .collect(),
            ),
            _ => Value::Array(Vec::new()),
        },
        InputType::Date => match value {
            Some(AttrValue::Date(instant)) => Value::from(instant.to_rfc3339_opts(SecondsFormat::Secs, true)),
            _ => Value::Null,
        },
        InputType::Json => match value {
            Some(AttrValue::Json(json)) => json.clone(),
            _ => Value::Null,
        },
        InputType::Text | InputType::Textarea => match value {
            Some(AttrValue::Text(text)) => Value::from(text.clone()),
            _ => Value::Null,
        },
    }
}

fn json_number(number: f64) -> Value {
    if number.fract() == 0.0 && number.abs() < 1e15 {
        Value::from(number as i64)
    } else {
        Number::from_f64(number).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn excerpt(body: &str) -> String {
    if body.chars().count() <= EXCERPT_MAX_CHARS {
        return body.to_string();
    }
    let mut truncated: String = body.chars().take(EXCERPT_MAX_CHARS - 1).collect();
    truncated.push('…');
    truncated
}
