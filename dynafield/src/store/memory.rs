//! In-memory reference adapter. Plans execute against a cloned state image
//! that replaces the live one only on success, so a failing command leaves
//! the store untouched and readers never see a half-applied plan.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::{
    errors::EngineError,
    filters::predicate::{Predicate, ValueSnapshot},
    store::{
        MutationCommand, MutationPlan, ServiceTypeSelector, StoredValue, ValueStore, record::ValueRecord,
    },
    types::{AttrValue, BoundField, BoundFields, Field, FieldOption, Listing, ServiceType, ServiceTypeField},
};

#[derive(Debug, Clone, Default)]
struct Inner {
    service_types: BTreeMap<i64, ServiceType>,
    fields: BTreeMap<i64, Field>,
    options: BTreeMap<i64, FieldOption>,
    bindings: Vec<ServiceTypeField>,
    listings: BTreeMap<i64, Listing>,
    values: BTreeMap<i64, ValueRecord>,
    /// (value_row_id, option_id) link rows.
    value_options: Vec<(i64, i64)>,
    next_id: i64,
}

impl Inner {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn row_for(&self, listing_id: i64, field_id: i64) -> Option<i64> {
        self.values
            .values()
            .find(|record| record.listing_id == listing_id && record.field_id == field_id)
            .map(|record| record.id)
    }

    fn links_for(&self, row_id: i64) -> Vec<i64> {
        self.value_options
            .iter()
            .filter(|(row, _)| *row == row_id)
            .map(|(_, option)| *option)
            .collect()
    }

    fn remove_row(&mut self, row_id: i64) {
        self.values.remove(&row_id);
        self.value_options.retain(|(row, _)| *row != row_id);
    }

    fn typed_values(&self, listing_id: i64) -> Result<Vec<StoredValue>, EngineError> {
        let mut out = Vec::new();
        for record in self.values.values() {
            if record.listing_id != listing_id {
                continue;
            }
            let field = self
                .fields
                .get(&record.field_id)
                .ok_or_else(|| EngineError::storage(format!("value row {} references unknown field {}", record.id, record.field_id)))?;
            let links = self.links_for(record.id);
            out.push(StoredValue {
                row_id: record.id,
                listing_id,
                field_id: record.field_id,
                value: record.to_attr(&links, field.input)?,
            });
        }
        Ok(out)
    }

    fn apply(&mut self, command: &MutationCommand) -> Result<(), EngineError> {
        match command {
            MutationCommand::DeleteValue { listing_id, field_id } => {
                if let Some(row_id) = self.row_for(*listing_id, *field_id) {
                    self.remove_row(row_id);
                }
                Ok(())
            }
            MutationCommand::InsertValue {
                listing_id,
                field_id,
                value,
            } => {
                if self.row_for(*listing_id, *field_id).is_some() {
                    return Err(EngineError::Conflict {
                        listing_id: *listing_id,
                        field_id: *field_id,
                    });
                }
                if !self.fields.contains_key(field_id) {
                    return Err(EngineError::storage(format!("insert references unknown field {field_id}")));
                }
                // Option links must stay within the row's field.
                for option_id in value.linked_options() {
                    match self.options.get(&option_id) {
                        Some(option) if option.field_id == *field_id => {}
                        Some(option) => {
                            return Err(EngineError::storage(format!(
                                "option {option_id} belongs to field {}, not {field_id}",
                                option.field_id
                            )));
                        }
                        None => {
                            return Err(EngineError::storage(format!("insert references unknown option {option_id}")));
                        }
                    }
                }
                let row_id = self.allocate_id();
                let (record, links) = ValueRecord::from_attr(row_id, *listing_id, *field_id, value);
                self.values.insert(row_id, record);
                self.value_options.extend(links.into_iter().map(|option_id| (row_id, option_id)));
                Ok(())
            }
            MutationCommand::DeleteListing { listing_id } => {
                if self.listings.remove(listing_id).is_none() {
                    return Err(EngineError::NotFound {
                        entity: "listing",
                        id: listing_id.to_string(),
                    });
                }
                let row_ids: Vec<i64> = self
                    .values
                    .values()
                    .filter(|record| record.listing_id == *listing_id)
                    .map(|record| record.id)
                    .collect();
                for row_id in row_ids {
                    self.remove_row(row_id);
                }
                Ok(())
            }
        }
    }
}

/// In-memory storage adapter backing the test suite and embeddable anywhere
/// a real database is overkill.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_service_type(&self, name: &str, slug: &str) -> ServiceType {
        let mut inner = self.inner.lock().expect("store lock");
        let id = inner.allocate_id();
        let service_type = ServiceType {
            id,
            name: name.to_string(),
            slug: slug.to_string(),
        };
        inner.service_types.insert(id, service_type.clone());
        service_type
    }

    pub fn add_field(&self, mut field: Field) -> Field {
        let mut inner = self.inner.lock().expect("store lock");
        field.id = inner.allocate_id();
        inner.fields.insert(field.id, field.clone());
        field
    }

    pub fn add_option(&self, field_id: i64, label: &str, value: &str) -> FieldOption {
        let mut inner = self.inner.lock().expect("store lock");
        let position = inner.options.values().filter(|option| option.field_id == field_id).count() as i32;
        let id = inner.allocate_id();
        let option = FieldOption {
            id,
            field_id,
            label: label.to_string(),
            value: value.to_string(),
            position,
        };
        inner.options.insert(id, option.clone());
        option
    }

    pub fn bind(&self, binding: ServiceTypeField) {
        let mut inner = self.inner.lock().expect("store lock");
        inner
            .bindings
            .retain(|existing| !(existing.service_type_id == binding.service_type_id && existing.field_id == binding.field_id));
        inner.bindings.push(binding);
    }

    pub fn add_listing(&self, mut listing: Listing) -> Listing {
        let mut inner = self.inner.lock().expect("store lock");
        listing.id = inner.allocate_id();
        inner.listings.insert(listing.id, listing.clone());
        listing
    }

    /// Number of value rows owned by a listing.
    pub fn value_row_count(&self, listing_id: i64) -> usize {
        let inner = self.inner.lock().expect("store lock");
        inner.values.values().filter(|record| record.listing_id == listing_id).count()
    }

    /// Number of option-link rows owned by a listing, across all its rows.
    pub fn option_link_count(&self, listing_id: i64) -> usize {
        let inner = self.inner.lock().expect("store lock");
        let row_ids: Vec<i64> = inner
            .values
            .values()
            .filter(|record| record.listing_id == listing_id)
            .map(|record| record.id)
            .collect();
        inner
            .value_options
            .iter()
            .filter(|(row, _)| row_ids.contains(row))
            .count()
    }
}

impl ValueStore for MemoryStore {
    async fn service_type(&self, selector: &ServiceTypeSelector) -> Result<Option<ServiceType>, EngineError> {
        let inner = self.inner.lock().expect("store lock");
        let found = match selector {
            ServiceTypeSelector::Id(id) => inner.service_types.get(id).cloned(),
            ServiceTypeSelector::Slug(slug) => inner
                .service_types
                .values()
                .find(|service_type| service_type.slug == *slug)
                .cloned(),
        };
        Ok(found)
    }

    async fn bound_fields(&self, service_type_id: i64) -> Result<BoundFields, EngineError> {
        let inner = self.inner.lock().expect("store lock");
        let mut bound = BoundFields::new();
        for binding in inner.bindings.iter().filter(|binding| binding.service_type_id == service_type_id) {
            let field = inner
                .fields
                .get(&binding.field_id)
                .ok_or_else(|| EngineError::storage(format!("binding references unknown field {}", binding.field_id)))?
                .clone();
            let mut options: Vec<FieldOption> = inner
                .options
                .values()
                .filter(|option| option.field_id == field.id)
                .cloned()
                .collect();
            options.sort_by_key(|option| (option.position, option.id));
            bound.insert(
                field.key.clone(),
                BoundField {
                    field,
                    options,
                    required: binding.required,
                    visible_in_form: binding.visible_in_form,
                    visible_in_filter: binding.visible_in_filter,
                    position: binding.position,
                },
            );
        }
        Ok(bound)
    }

    async fn listing(&self, listing_id: i64) -> Result<Option<Listing>, EngineError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner.listings.get(&listing_id).cloned())
    }

    async fn listing_values(&self, listing_id: i64) -> Result<Vec<StoredValue>, EngineError> {
        let inner = self.inner.lock().expect("store lock");
        inner.typed_values(listing_id)
    }

    async fn listing_ids(&self) -> Result<Vec<i64>, EngineError> {
        let inner = self.inner.lock().expect("store lock");
        Ok(inner.listings.keys().copied().collect())
    }

    async fn search_listings(&self, predicate: &Predicate) -> Result<Vec<i64>, EngineError> {
        let inner = self.inner.lock().expect("store lock");
        let option_tokens: BTreeMap<i64, String> = inner
            .options
            .values()
            .map(|option| (option.id, option.value.clone()))
            .collect();

        let mut matched = Vec::new();
        for listing in inner.listings.values() {
            let slug = inner
                .service_types
                .get(&listing.service_type_id)
                .map(|service_type| service_type.slug.as_str())
                .unwrap_or_default();
            let values: BTreeMap<i64, AttrValue> = inner
                .typed_values(listing.id)?
                .into_iter()
                .map(|stored| (stored.field_id, stored.value))
                .collect();
            let snapshot = ValueSnapshot {
                listing,
                service_type_slug: slug,
                values: &values,
                option_tokens: &option_tokens,
            };
            if predicate.matches(&snapshot) {
                matched.push(listing.id);
            }
        }
        Ok(matched)
    }

    async fn execute(&self, plan: MutationPlan) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().expect("store lock");
        let mut staged = inner.clone();
        for command in &plan.commands {
            staged.apply(command)?;
        }
        *inner = staged;
        Ok(())
    }
}
