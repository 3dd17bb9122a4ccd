//! Value application: validate a raw `fieldKey -> value` map against the
//! fields bound to a listing's service type, then persist every value in
//! one atomic mutation plan. Validation runs to completion first so the
//! caller gets every offending key in a single error, and nothing is
//! written unless every key passes.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::{
    coerce,
    errors::{EngineError, ValidationError, ValidationIssue},
    store::{MutationCommand, MutationPlan, ValueStore},
    types::{AttrValue, BoundField, BoundFields, InputType},
};

/// Write mode of an apply call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// Insert fresh rows; an existing row for any key is a conflict.
    Create,
    /// Delete any existing row per key before inserting, so re-submitting
    /// the same full value set is idempotent.
    Replace,
}

/// Raw values as they arrive from the form layer.
pub type RawValues = Map<String, Value>;

/// Typed values that were applied, keyed by field key.
pub type AppliedValues = BTreeMap<String, AttrValue>;

/// Validate and persist a raw value map for one listing. Keys that match no
/// bound field are ignored; every other key is coerced by its field's input
/// type, and all failures are reported together before anything is written.
pub async fn apply_values<S: ValueStore>(
    store: &S,
    listing_id: i64,
    raw: &RawValues,
    fields: &BoundFields,
    mode: ApplyMode,
) -> Result<AppliedValues, EngineError> {
    let mut issues = Vec::new();

    for (key, bound) in fields {
        if bound.required && !raw.contains_key(key) {
            issues.push(ValidationIssue::new(key, "validation.required", "field is required"));
        }
    }

    let mut applied = AppliedValues::new();
    for (key, raw_value) in raw {
        let Some(bound) = fields.get(key) else {
            log::debug!("value for unknown field key {key}, ignoring");
            continue;
        };
        if let Some(value) = coerce_value(bound, raw_value, &mut issues) {
            applied.insert(key.clone(), value);
        }
    }

    if !issues.is_empty() {
        return Err(ValidationError::new(issues).into());
    }

    let mut plan = MutationPlan::new();
    for (key, value) in &applied {
        let field_id = fields[key].field.id;
        if mode == ApplyMode::Replace {
            plan.push(MutationCommand::DeleteValue { listing_id, field_id });
        }
        plan.push(MutationCommand::InsertValue {
            listing_id,
            field_id,
            value: value.clone(),
        });
    }
    store.execute(plan).await?;

    Ok(applied)
}

/// Coerce one raw value by the field's input type. Pushes issues instead of
/// returning early so one bad key cannot mask another.
fn coerce_value(bound: &BoundField, raw: &Value, issues: &mut Vec<ValidationIssue>) -> Option<AttrValue> {
    let key = bound.field.key.as_str();
    match bound.field.input {
        InputType::Number | InputType::Range => {
            let Some(number) = coerce::number_from_value(raw) else {
                issues.push(ValidationIssue::new(
                    key,
                    "validation.numeric",
                    format!("expected a numeric value, got {raw}"),
                ));
                return None;
            };
            if let Some(min) = bound.field.min
                && number < min
            {
                issues.push(ValidationIssue::new(
                    key,
                    "validation.range",
                    format!("value must be at least {min}"),
                ));
                return None;
            }
            if let Some(max) = bound.field.max
                && number > max
            {
                issues.push(ValidationIssue::new(
                    key,
                    "validation.range",
                    format!("value must be at most {max}"),
                ));
                return None;
            }
            Some(AttrValue::Number(number))
        }
        InputType::Toggle => Some(AttrValue::Bool(coerce::truthy(raw))),
        InputType::Select | InputType::Radio => {
            let Some(token) = coerce::text_from_value(raw) else {
                issues.push(ValidationIssue::new(
                    key,
                    "validation.option",
                    format!("expected an option token, got {raw}"),
                ));
                return None;
            };
            match bound.option_by_token(&token) {
                Some(option) => Some(AttrValue::Choice(Some(option.id))),
                None => {
                    issues.push(ValidationIssue::new(
                        key,
                        "validation.option",
                        format!("unknown option value: {token}"),
                    ));
                    None
                }
            }
        }
        InputType::Multiselect | InputType::Checkbox => {
            let mut linked = Vec::new();
            for token in coerce::token_list(raw) {
                match bound.option_by_token(&token) {
                    Some(option) if !linked.contains(&option.id) => linked.push(option.id),
                    Some(_) => {}
                    None => log::debug!("dropping unknown option token {token} for field {key}"),
                }
            }
            // An empty selection is still an answer and still gets a row.
            Some(AttrValue::Choices(linked))
        }
        InputType::Date => match coerce::date_from_value(raw) {
            Some(instant) => Some(AttrValue::Date(instant)),
            None => {
                issues.push(ValidationIssue::new(
                    key,
                    "validation.date",
                    format!("expected a date, got {raw}"),
                ));
                None
            }
        },
        InputType::Json => Some(AttrValue::Json(raw.clone())),
        InputType::Text | InputType::Textarea => {
            let Some(text) = coerce::text_from_value(raw) else {
                issues.push(ValidationIssue::new(
                    key,
                    "validation.text",
                    format!("expected text, got {raw}"),
                ));
                return None;
            };
            if let Some(pattern) = &bound.field.pattern
                && regex::Regex::new(pattern)
                    .map(|regex| !regex.is_match(&text))
                    .unwrap_or(false)
            {
                issues.push(ValidationIssue::new(
                    key,
                    "validation.pattern",
                    format!("value does not match pattern {pattern}"),
                ));
                return None;
            }
            Some(AttrValue::Text(text))
        }
    }
}
