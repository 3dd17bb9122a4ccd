//! Filter translation. One generic query-parameter map goes in; one
//! constraint AST comes out, rendered twice: a relational [`Predicate`] for
//! the storage adapter and a filter-expression string for the search index.
//! Keeping a single AST between the two renderers is what keeps the
//! backends from silently diverging.
//!
//! Unknown parameter keys are ignored rather than rejected, so newer
//! clients can send filters an older deployment does not know yet.

pub mod predicate;

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use serde_json::{Map, Value};

use crate::{
    coerce,
    errors::EngineError,
    filters::predicate::{Clause, Predicate},
    search::{
        DEFAULT_HITS_PER_PAGE, DEFAULT_PAGE, MAX_HITS_PER_PAGE, SearchRequest, SortOrder, SortSpec,
        format_number, format_operand,
    },
    store::ServiceTypeSelector,
    types::{BoundFields, InputType},
};

/// Technical keys never matched against dynamic field keys.
static RESERVED_KEYS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "page",
        "perPage",
        "per_page",
        "hitsPerPage",
        "sort",
        "q",
        "priceMin",
        "priceMax",
        "price_min",
        "price_max",
        "serviceType",
        "service_type",
        "category",
    ])
});

/// Suffixes of the `${key}Min` / `${key}Max` convention for numeric fields.
const MIN_SUFFIX: &str = "Min";
const MAX_SUFFIX: &str = "Max";

/// Fixed columns accepted by the `sort` parameter next to sortable fields.
const FIXED_SORT_COLUMNS: [&str; 2] = ["price", "created_at"];

/// One translated constraint. The list ANDs together; a multi-valued
/// operand ORs within its own constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldConstraint {
    /// Fixed service-type column equality.
    ServiceType(ServiceTypeSelector),
    /// Fixed price column range, open-ended on absent sides.
    Price { min: Option<f64>, max: Option<f64> },
    /// Constraint on a dynamic field's value rows.
    Dynamic {
        field_id: i64,
        key: String,
        op: DynamicOp,
    },
}

/// Operation applied to a dynamic field, decided by its input type.
#[derive(Debug, Clone, PartialEq)]
pub enum DynamicOp {
    Range { min: Option<f64>, max: Option<f64> },
    BoolEq(bool),
    OptionEq(String),
    OptionIn(Vec<String>),
    /// Relationally a case-insensitive substring match; in the index
    /// grammar an exact-match approximation, since the grammar has no
    /// substring operator.
    TextMatch(String),
}

/// Translation result: the constraint AST plus both renderings and the
/// pass-through search options.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingFilter {
    pub constraints: Vec<FieldConstraint>,
    pub predicate: Predicate,
    pub index_filter: String,
    pub query: Option<String>,
    pub sort: Option<SortSpec>,
    pub page: u64,
    pub hits_per_page: u64,
}

impl ListingFilter {
    /// Package the index-side rendering as a search request.
    pub fn to_search_request(&self) -> SearchRequest {
        SearchRequest {
            q: self.query.clone(),
            filter: (!self.index_filter.is_empty()).then(|| self.index_filter.clone()),
            sort: self.sort.iter().map(SortSpec::render).collect(),
            page: self.page,
            hits_per_page: self.hits_per_page,
        }
    }
}

/// Translate a generic parameter map into both query representations for
/// one service type. `fields` must be the bound fields of that service
/// type; keys that match nothing there are ignored.
pub fn translate(
    selector: ServiceTypeSelector,
    params: &Map<String, Value>,
    fields: &BoundFields,
) -> Result<ListingFilter, EngineError> {
    let constraints = build_constraints(selector, params, fields);
    let predicate = render_predicate(&constraints);
    let index_filter = render_index_filter(&constraints);
    let sort = parse_sort(params, fields)?;

    Ok(ListingFilter {
        predicate,
        index_filter,
        constraints,
        query: text_param(params, "q").filter(|q| !q.is_empty()),
        sort,
        page: parse_page(params),
        hits_per_page: parse_hits_per_page(params),
    })
}

fn build_constraints(
    selector: ServiceTypeSelector,
    params: &Map<String, Value>,
    fields: &BoundFields,
) -> Vec<FieldConstraint> {
    let mut constraints = vec![FieldConstraint::ServiceType(selector)];

    let price_min = numeric_param(params, &["priceMin", "price_min"]);
    let price_max = numeric_param(params, &["priceMax", "price_max"]);
    if price_min.is_some() || price_max.is_some() {
        constraints.push(FieldConstraint::Price {
            min: price_min,
            max: price_max,
        });
    }

    // Bounds of the `${key}Min`/`${key}Max` convention accumulate here so
    // one field emits one range constraint, whichever sides were supplied.
    let mut numeric_bounds: BTreeMap<String, (Option<f64>, Option<f64>)> = BTreeMap::new();

    for (key, raw) in params {
        if RESERVED_KEYS.contains(key.as_str()) {
            continue;
        }

        if let Some(bound) = fields.get(key) {
            if !bound.filterable() {
                log::debug!("filter key {key} matches a non-filterable field, ignoring");
                continue;
            }
            match bound.field.input {
                InputType::Toggle => constraints.push(FieldConstraint::Dynamic {
                    field_id: bound.field.id,
                    key: key.clone(),
                    op: DynamicOp::BoolEq(coerce::truthy(raw)),
                }),
                // Numeric fields only answer to the Min/Max convention.
                InputType::Number | InputType::Range => {
                    log::debug!("bare key {key} on a numeric field, ignoring");
                }
                InputType::Select | InputType::Radio => {
                    if let Some(token) = coerce::token_list(raw).into_iter().next() {
                        constraints.push(FieldConstraint::Dynamic {
                            field_id: bound.field.id,
                            key: key.clone(),
                            op: DynamicOp::OptionEq(token),
                        });
                    }
                }
                InputType::Multiselect | InputType::Checkbox => {
                    let tokens = coerce::token_list(raw);
                    if !tokens.is_empty() {
                        constraints.push(FieldConstraint::Dynamic {
                            field_id: bound.field.id,
                            key: key.clone(),
                            op: DynamicOp::OptionIn(tokens),
                        });
                    }
                }
                InputType::Text | InputType::Textarea | InputType::Date | InputType::Json => {
                    if let Some(needle) = coerce::text_from_value(raw).filter(|needle| !needle.is_empty()) {
                        constraints.push(FieldConstraint::Dynamic {
                            field_id: bound.field.id,
                            key: key.clone(),
                            op: DynamicOp::TextMatch(needle),
                        });
                    }
                }
            }
            continue;
        }

        let (base, is_min) = match (key.strip_suffix(MIN_SUFFIX), key.strip_suffix(MAX_SUFFIX)) {
            (Some(base), _) => (base, true),
            (_, Some(base)) => (base, false),
            _ => {
                log::debug!("unknown filter key {key}, ignoring");
                continue;
            }
        };
        if !fields.get(base).is_some_and(|bound| bound.filterable() && bound.field.input.is_numeric()) {
            log::debug!("unknown filter key {key}, ignoring");
            continue;
        }
        let Some(value) = coerce::number_from_value(raw) else {
            log::debug!("non-numeric bound for {key}, ignoring");
            continue;
        };
        let entry = numeric_bounds.entry(base.to_string()).or_default();
        if is_min {
            entry.0 = Some(value);
        } else {
            entry.1 = Some(value);
        }
    }

    for (base, (min, max)) in numeric_bounds {
        let bound = &fields[&base];
        constraints.push(FieldConstraint::Dynamic {
            field_id: bound.field.id,
            key: base,
            op: DynamicOp::Range { min, max },
        });
    }

    constraints
}

/// Relational rendering: every constraint becomes one AND-ed clause.
pub fn render_predicate(constraints: &[FieldConstraint]) -> Predicate {
    let mut predicate = Predicate::new();
    for constraint in constraints {
        match constraint {
            FieldConstraint::ServiceType(selector) => {
                predicate.push(Clause::ServiceTypeIs(selector.clone()));
            }
            FieldConstraint::Price { min, max } => {
                predicate.push(Clause::PriceBetween { min: *min, max: *max });
            }
            FieldConstraint::Dynamic { field_id, op, .. } => match op {
                DynamicOp::Range { min, max } => predicate.push(Clause::NumberBetween {
                    field_id: *field_id,
                    min: *min,
                    max: *max,
                }),
                DynamicOp::BoolEq(value) => predicate.push(Clause::BoolIs {
                    field_id: *field_id,
                    value: *value,
                }),
                DynamicOp::OptionEq(token) => predicate.push(Clause::HasOption {
                    field_id: *field_id,
                    token: token.clone(),
                }),
                DynamicOp::OptionIn(tokens) => predicate.push(Clause::HasAnyOption {
                    field_id: *field_id,
                    tokens: tokens.clone(),
                }),
                DynamicOp::TextMatch(needle) => predicate.push(Clause::TextLike {
                    field_id: *field_id,
                    needle: needle.clone(),
                }),
            },
        }
    }
    predicate
}

/// Index rendering: the same constraints as a filter-expression string.
pub fn render_index_filter(constraints: &[FieldConstraint]) -> String {
    let mut clauses = Vec::new();
    for constraint in constraints {
        match constraint {
            FieldConstraint::ServiceType(ServiceTypeSelector::Id(id)) => {
                clauses.push(format!("service_type_id = {id}"));
            }
            FieldConstraint::ServiceType(ServiceTypeSelector::Slug(slug)) => {
                clauses.push(format!("service_type = {}", format_operand(slug)));
            }
            FieldConstraint::Price { min, max } => {
                if let Some(min) = min {
                    clauses.push(format!("price >= {}", format_number(*min)));
                }
                if let Some(max) = max {
                    clauses.push(format!("price <= {}", format_number(*max)));
                }
            }
            FieldConstraint::Dynamic { key, op, .. } => match op {
                DynamicOp::Range { min, max } => {
                    if let Some(min) = min {
                        clauses.push(format!("{key} >= {}", format_number(*min)));
                    }
                    if let Some(max) = max {
                        clauses.push(format!("{key} <= {}", format_number(*max)));
                    }
                }
                DynamicOp::BoolEq(value) => clauses.push(format!("{key} = {value}")),
                DynamicOp::OptionEq(token) => clauses.push(format!("{key} = {}", format_operand(token))),
                DynamicOp::OptionIn(tokens) => {
                    let members: Vec<String> = tokens
                        .iter()
                        .map(|token| format!("{key} = {}", format_operand(token)))
                        .collect();
                    match members.len() {
                        0 => {}
                        1 => clauses.push(members.into_iter().next().unwrap_or_default()),
                        _ => clauses.push(format!("({})", members.join(" OR "))),
                    }
                }
                DynamicOp::TextMatch(needle) => clauses.push(format!("{key} = {}", format_operand(needle))),
            },
        }
    }
    clauses.join(" AND ")
}

fn parse_sort(params: &Map<String, Value>, fields: &BoundFields) -> Result<Option<SortSpec>, EngineError> {
    let Some(raw) = text_param(params, "sort").filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };

    let (column, order) = match raw.split_once(':') {
        Some((column, order_token)) => {
            let order = match order_token.trim() {
                "asc" => SortOrder::Asc,
                "desc" => SortOrder::Desc,
                other => {
                    return Err(EngineError::InvalidRequest {
                        message: format!("unsupported sort order: {other}"),
                    });
                }
            };
            (column.trim(), order)
        }
        None => (raw.trim(), SortOrder::Asc),
    };

    let sortable = FIXED_SORT_COLUMNS.contains(&column)
        || fields.get(column).is_some_and(|bound| bound.field.sortable);
    if !sortable {
        return Err(EngineError::InvalidRequest {
            message: format!("unsupported sort column: {column}"),
        });
    }

    Ok(Some(SortSpec {
        column: column.to_string(),
        order,
    }))
}

fn parse_page(params: &Map<String, Value>) -> u64 {
    params
        .get("page")
        .and_then(coerce::number_from_value)
        .map(|page| (page as u64).max(1))
        .unwrap_or(DEFAULT_PAGE)
}

fn parse_hits_per_page(params: &Map<String, Value>) -> u64 {
    ["perPage", "per_page", "hitsPerPage"]
        .iter()
        .find_map(|key| params.get(*key))
        .and_then(coerce::number_from_value)
        .map(|size| (size as u64).clamp(1, MAX_HITS_PER_PAGE))
        .unwrap_or(DEFAULT_HITS_PER_PAGE)
}

fn text_param(params: &Map<String, Value>, key: &str) -> Option<String> {
    params.get(key).and_then(coerce::text_from_value).map(|text| text.trim().to_string())
}

fn numeric_param(params: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|key| params.get(*key))
        .and_then(coerce::number_from_value)
}
