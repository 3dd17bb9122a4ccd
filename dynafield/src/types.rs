use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Input widget / storage type of a dynamic field. Closed set; every other
/// part of the engine dispatches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Text,
    Textarea,
    Number,
    Range,
    Toggle,
    Select,
    Radio,
    Multiselect,
    Checkbox,
    Date,
    Json,
}

impl InputType {
    /// Stores a numeric scalar.
    #[inline]
    pub const fn is_numeric(self) -> bool {
        matches!(self, InputType::Number | InputType::Range)
    }

    /// Stores at most one option link.
    #[inline]
    pub const fn is_single_choice(self) -> bool {
        matches!(self, InputType::Select | InputType::Radio)
    }

    /// Stores zero or more option links.
    #[inline]
    pub const fn is_multi_choice(self) -> bool {
        matches!(self, InputType::Multiselect | InputType::Checkbox)
    }

    /// Stores option links rather than a scalar slot.
    #[inline]
    pub const fn is_choice(self) -> bool {
        self.is_single_choice() || self.is_multi_choice()
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            InputType::Text => "text",
            InputType::Textarea => "textarea",
            InputType::Number => "number",
            InputType::Range => "range",
            InputType::Toggle => "toggle",
            InputType::Select => "select",
            InputType::Radio => "radio",
            InputType::Multiselect => "multiselect",
            InputType::Checkbox => "checkbox",
            InputType::Date => "date",
            InputType::Json => "json",
        }
    }
}

/// Listing category. Listings belong to exactly one service type, and field
/// bindings are scoped to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceType {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// Schema definition for one dynamic attribute. `key` is the stable external
/// identifier; value rows reference the field by id, so renaming a key does
/// not require touching rows, but external clients filter by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: i64,
    pub key: String,
    pub label: String,
    pub input: InputType,
    /// Lower bound for numeric inputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Upper bound for numeric inputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Regex applied to text inputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    pub searchable: bool,
    pub filterable: bool,
    pub sortable: bool,
}

impl Field {
    pub fn new(key: impl Into<String>, label: impl Into<String>, input: InputType) -> Self {
        Self {
            id: 0,
            key: key.into(),
            label: label.into(),
            input,
            min: None,
            max: None,
            pattern: None,
            searchable: false,
            filterable: false,
            sortable: false,
        }
    }

    pub fn with_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }
}

/// One allowed discrete value for a select-family field. `value` is the
/// stable external token used in option links, filters, and index documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub id: i64,
    pub field_id: i64,
    pub label: String,
    pub value: String,
    pub position: i32,
}

/// Pivot attaching a field to a service type. Unique on
/// (service_type_id, field_id); the same field may attach to many service
/// types with different `required`/`position` per binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceTypeField {
    pub service_type_id: i64,
    pub field_id: i64,
    pub required: bool,
    pub visible_in_form: bool,
    pub visible_in_filter: bool,
    pub position: i32,
}

impl ServiceTypeField {
    pub fn new(service_type_id: i64, field_id: i64) -> Self {
        Self {
            service_type_id,
            field_id,
            required: false,
            visible_in_form: true,
            visible_in_filter: true,
            position: 0,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn hidden_in_filter(mut self) -> Self {
        self.visible_in_filter = false;
        self
    }

    pub fn at_position(mut self, position: i32) -> Self {
        self.position = position;
        self
    }
}

/// The marketplace announcement attribute values attach to. Carries the
/// fixed columns the index projector flattens next to the dynamic keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: i64,
    pub service_type_id: i64,
    pub title: String,
    pub body: String,
    pub price: i64,
    pub location: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Typed payload of one value row. Exactly one variant per storable shape,
/// so a row whose slot disagrees with its field's input type is
/// unrepresentable here; the nullable-column shape exists only at the
/// storage boundary (see `store::record`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttrValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Date(DateTime<Utc>),
    Json(Value),
    /// Select/Radio: 0..1 option link, by option id.
    Choice(Option<i64>),
    /// Multiselect/Checkbox: 0..N option links, by option id.
    Choices(Vec<i64>),
}

impl AttrValue {
    /// Option ids linked by this value, empty for scalar variants.
    pub fn linked_options(&self) -> Vec<i64> {
        match self {
            AttrValue::Choice(Some(id)) => vec![*id],
            AttrValue::Choice(None) => Vec::new(),
            AttrValue::Choices(ids) => ids.clone(),
            _ => Vec::new(),
        }
    }
}

/// A field with its options and per-service-type binding metadata, resolved
/// for one service type. This is the shape the apply engine and the filter
/// translator consume.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundField {
    pub field: Field,
    pub options: Vec<FieldOption>,
    pub required: bool,
    pub visible_in_form: bool,
    pub visible_in_filter: bool,
    pub position: i32,
}

impl BoundField {
    /// Look up an option of this field by its external token.
    pub fn option_by_token(&self, token: &str) -> Option<&FieldOption> {
        self.options.iter().find(|option| option.value == token)
    }

    /// External token for a linked option id, if the option belongs here.
    pub fn option_token(&self, option_id: i64) -> Option<&str> {
        self.options
            .iter()
            .find(|option| option.id == option_id)
            .map(|option| option.value.as_str())
    }

    /// Whether this field participates in dynamic filter matching.
    pub fn filterable(&self) -> bool {
        self.field.filterable && self.visible_in_filter
    }
}

/// Bound fields for one service type, keyed by field key.
pub type BoundFields = BTreeMap<String, BoundField>;
