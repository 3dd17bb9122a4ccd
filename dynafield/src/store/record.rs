//! Nullable-column shape of a value row. Storage adapters persist this
//! record (plus separate option-link rows); everything above the adapter
//! boundary works on the `AttrValue` tagged union, and the translation in
//! both directions lives here and nowhere else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{errors::EngineError, types::{AttrValue, InputType}};

/// One value row as a storage adapter sees it: all scalar slots nullable,
/// exactly one populated (none for choice-typed fields, which use option
/// links instead).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueRecord {
    pub id: i64,
    pub listing_id: i64,
    pub field_id: i64,
    pub text_value: Option<String>,
    pub number_value: Option<f64>,
    pub bool_value: Option<bool>,
    pub date_value: Option<DateTime<Utc>>,
    pub json_value: Option<Value>,
}

impl ValueRecord {
    /// Lower a typed value into the column shape. Returns the record and the
    /// option ids to link to it.
    pub fn from_attr(id: i64, listing_id: i64, field_id: i64, value: &AttrValue) -> (Self, Vec<i64>) {
        let mut record = ValueRecord {
            id,
            listing_id,
            field_id,
            ..ValueRecord::default()
        };
        let links = match value {
            AttrValue::Text(text) => {
                record.text_value = Some(text.clone());
                Vec::new()
            }
            AttrValue::Number(number) => {
                record.number_value = Some(*number);
                Vec::new()
            }
            AttrValue::Bool(flag) => {
                record.bool_value = Some(*flag);
                Vec::new()
            }
            AttrValue::Date(instant) => {
                record.date_value = Some(*instant);
                Vec::new()
            }
            AttrValue::Json(json) => {
                record.json_value = Some(json.clone());
                Vec::new()
            }
            AttrValue::Choice(_) | AttrValue::Choices(_) => value.linked_options(),
        };
        (record, links)
    }

    /// Lift the column shape back into a typed value. The field's input type
    /// decides which slot is legal; a record whose population disagrees with
    /// it is corrupt and rejected.
    pub fn to_attr(&self, links: &[i64], input: InputType) -> Result<AttrValue, EngineError> {
        if input.is_choice() {
            if self.populated_slots() != 0 {
                return Err(self.corrupt(input, "choice row must not populate a scalar slot"));
            }
            if input.is_single_choice() {
                if links.len() > 1 {
                    return Err(self.corrupt(input, "single-choice row with multiple option links"));
                }
                return Ok(AttrValue::Choice(links.first().copied()));
            }
            return Ok(AttrValue::Choices(links.to_vec()));
        }

        if !links.is_empty() {
            return Err(self.corrupt(input, "scalar row must not own option links"));
        }
        if self.populated_slots() != 1 {
            return Err(self.corrupt(input, "exactly one scalar slot must be populated"));
        }

        match input {
            InputType::Number | InputType::Range => self
                .number_value
                .map(AttrValue::Number)
                .ok_or_else(|| self.corrupt(input, "number slot empty")),
            InputType::Toggle => self
                .bool_value
                .map(AttrValue::Bool)
                .ok_or_else(|| self.corrupt(input, "bool slot empty")),
            InputType::Date => self
                .date_value
                .map(AttrValue::Date)
                .ok_or_else(|| self.corrupt(input, "date slot empty")),
            InputType::Json => self
                .json_value
                .clone()
                .map(AttrValue::Json)
                .ok_or_else(|| self.corrupt(input, "json slot empty")),
            InputType::Text | InputType::Textarea => self
                .text_value
                .clone()
                .map(AttrValue::Text)
                .ok_or_else(|| self.corrupt(input, "text slot empty")),
            InputType::Select | InputType::Radio | InputType::Multiselect | InputType::Checkbox => {
                unreachable!("choice inputs handled above")
            }
        }
    }

    fn populated_slots(&self) -> usize {
        usize::from(self.text_value.is_some())
            + usize::from(self.number_value.is_some())
            + usize::from(self.bool_value.is_some())
            + usize::from(self.date_value.is_some())
            + usize::from(self.json_value.is_some())
    }

    fn corrupt(&self, input: InputType, detail: &str) -> EngineError {
        EngineError::storage(format!(
            "corrupt value row {} for {} field {}: {detail}",
            self.id,
            input.as_str(),
            self.field_id
        ))
    }
}
