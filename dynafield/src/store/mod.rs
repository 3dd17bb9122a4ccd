//! Storage seam of the engine. The engine never talks to a database
//! directly; it builds a [`MutationPlan`] and hands it to a caller-supplied
//! [`ValueStore`], which must execute the whole plan atomically. The crate
//! ships [`memory::MemoryStore`] as the reference adapter.

pub mod memory;
pub mod record;

use std::fmt;

use crate::{
    errors::EngineError,
    filters::predicate::Predicate,
    types::{AttrValue, BoundFields, Listing, ServiceType},
};

/// A value row with its typed payload, as the engine sees it after the
/// adapter has lifted the column shape.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredValue {
    pub row_id: i64,
    pub listing_id: i64,
    pub field_id: i64,
    pub value: AttrValue,
}

/// One step of an atomic mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationCommand {
    /// Remove the value row (and its option links) for a pair, if present.
    DeleteValue { listing_id: i64, field_id: i64 },
    /// Insert a fresh value row for a pair. Fails with
    /// [`EngineError::Conflict`] when the pair already has a row.
    InsertValue {
        listing_id: i64,
        field_id: i64,
        value: AttrValue,
    },
    /// Remove a listing and cascade every value row and option link it owns.
    DeleteListing { listing_id: i64 },
}

/// Ordered list of commands executed as one atomic unit: either every
/// command applies, or none does and no reader ever observes a partial
/// state.
#[derive(Debug, Default, PartialEq)]
pub struct MutationPlan {
    pub commands: Vec<MutationCommand>,
}

impl MutationPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: MutationCommand) {
        self.commands.push(command);
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Service-type reference as it arrives from a client: a numeric id or a
/// slug. Numeric parse wins, so an all-digit slug is unreachable.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceTypeSelector {
    Id(i64),
    Slug(String),
}

impl ServiceTypeSelector {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<i64>() {
            Ok(id) => ServiceTypeSelector::Id(id),
            Err(_) => ServiceTypeSelector::Slug(trimmed.to_string()),
        }
    }
}

impl fmt::Display for ServiceTypeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceTypeSelector::Id(id) => write!(f, "{id}"),
            ServiceTypeSelector::Slug(slug) => f.write_str(slug),
        }
    }
}

/// Transactional storage handle over the schema and value entities. The
/// engine does not own the connection lifecycle; adapters decide how
/// `execute` achieves atomicity (database transaction, single lock, script).
#[allow(async_fn_in_trait)]
pub trait ValueStore {
    /// Resolve a service type by id or slug.
    async fn service_type(&self, selector: &ServiceTypeSelector) -> Result<Option<ServiceType>, EngineError>;

    /// Fields attached to a service type, with options and binding metadata,
    /// keyed by field key.
    async fn bound_fields(&self, service_type_id: i64) -> Result<BoundFields, EngineError>;

    async fn listing(&self, listing_id: i64) -> Result<Option<Listing>, EngineError>;

    /// Every value row of a listing, in row order.
    async fn listing_values(&self, listing_id: i64) -> Result<Vec<StoredValue>, EngineError>;

    /// All listing ids, in id order. Drives the index rebuild.
    async fn listing_ids(&self) -> Result<Vec<i64>, EngineError>;

    /// Ids of listings matching a relational predicate, in id order.
    async fn search_listings(&self, predicate: &Predicate) -> Result<Vec<i64>, EngineError>;

    /// Execute a mutation plan atomically.
    async fn execute(&self, plan: MutationPlan) -> Result<(), EngineError>;
}
