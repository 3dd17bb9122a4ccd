//! Relational side of the filter translation: a composable AND-list of
//! sub-predicates over a listing's fixed columns and its value rows.
//! Storage adapters evaluate it against whatever row representation they
//! hold; [`ValueSnapshot`] is the neutral evaluation view.

use std::collections::BTreeMap;

use chrono::SecondsFormat;

use crate::{store::ServiceTypeSelector, types::{AttrValue, Listing}};

/// One sub-predicate. A listing matches the whole [`Predicate`] when every
/// clause holds.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Fixed price column within an inclusive range; an absent bound leaves
    /// that side open.
    PriceBetween { min: Option<f64>, max: Option<f64> },
    /// Fixed service-type column equality, by id or slug.
    ServiceTypeIs(ServiceTypeSelector),
    /// Numeric value row within an inclusive range.
    NumberBetween {
        field_id: i64,
        min: Option<f64>,
        max: Option<f64>,
    },
    /// Boolean value row equality.
    BoolIs { field_id: i64, value: bool },
    /// The row owns an option link whose external token equals `token`.
    HasOption { field_id: i64, token: String },
    /// The row owns an option link whose token is in `tokens`.
    HasAnyOption { field_id: i64, tokens: Vec<String> },
    /// Case-insensitive substring match over the row's textual rendering.
    TextLike { field_id: i64, needle: String },
}

/// AND-list of clauses. Empty predicates match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    pub clauses: Vec<Clause>,
}

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Evaluate against one listing's snapshot.
    pub fn matches(&self, snapshot: &ValueSnapshot<'_>) -> bool {
        self.clauses.iter().all(|clause| clause.matches(snapshot))
    }
}

/// Everything clause evaluation needs about one listing: the fixed columns,
/// the typed value per field, and the token of every option referenced by
/// the listing's links.
#[derive(Debug)]
pub struct ValueSnapshot<'a> {
    pub listing: &'a Listing,
    pub service_type_slug: &'a str,
    /// field_id -> typed value.
    pub values: &'a BTreeMap<i64, AttrValue>,
    /// option_id -> external token.
    pub option_tokens: &'a BTreeMap<i64, String>,
}

impl Clause {
    fn matches(&self, snapshot: &ValueSnapshot<'_>) -> bool {
        match self {
            Clause::PriceBetween { min, max } => within(snapshot.listing.price as f64, *min, *max),
            Clause::ServiceTypeIs(selector) => match selector {
                ServiceTypeSelector::Id(id) => snapshot.listing.service_type_id == *id,
                ServiceTypeSelector::Slug(slug) => snapshot.service_type_slug == slug,
            },
            Clause::NumberBetween { field_id, min, max } => match snapshot.values.get(field_id) {
                Some(AttrValue::Number(number)) => within(*number, *min, *max),
                _ => false,
            },
            Clause::BoolIs { field_id, value } => {
                matches!(snapshot.values.get(field_id), Some(AttrValue::Bool(flag)) if flag == value)
            }
            Clause::HasOption { field_id, token } => snapshot
                .linked_tokens(*field_id)
                .any(|linked| linked == token),
            Clause::HasAnyOption { field_id, tokens } => snapshot
                .linked_tokens(*field_id)
                .any(|linked| tokens.iter().any(|token| token == linked)),
            Clause::TextLike { field_id, needle } => match snapshot.values.get(field_id) {
                Some(value) => match rendered_text(value) {
                    Some(text) => text.to_lowercase().contains(&needle.to_lowercase()),
                    None => false,
                },
                None => false,
            },
        }
    }
}

impl ValueSnapshot<'_> {
    fn linked_tokens(&self, field_id: i64) -> impl Iterator<Item = &str> {
        self.values
            .get(&field_id)
            .map(|value| value.linked_options())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|option_id| self.option_tokens.get(&option_id).map(String::as_str))
    }
}

fn within(candidate: f64, min: Option<f64>, max: Option<f64>) -> bool {
    if let Some(lower) = min
        && candidate < lower
    {
        return false;
    }
    if let Some(upper) = max
        && candidate > upper
    {
        return false;
    }
    true
}

/// Textual rendering used by the substring clause: text as-is, dates as
/// RFC 3339, json via its serialization. Numeric/boolean/choice rows have
/// dedicated clauses and render to nothing here.
fn rendered_text(value: &AttrValue) -> Option<String> {
    match value {
        AttrValue::Text(text) => Some(text.clone()),
        AttrValue::Date(instant) => Some(instant.to_rfc3339_opts(SecondsFormat::Secs, true)),
        AttrValue::Json(json) => Some(json.to_string()),
        _ => None,
    }
}
