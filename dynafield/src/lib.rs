//! Dynamic-attribute engine for marketplace listings.
//!
//! Service types (listing categories) define arbitrary typed fields; this
//! crate stores per-listing values for them, validates and applies raw
//! value maps atomically, translates generic filter parameters into a
//! relational predicate and a search-index filter expression from one
//! shared constraint AST, and projects listings into flat index documents
//! kept in sync best-effort.
//!
//! The crate is an in-process library: storage and the search index are
//! seams ([`store::ValueStore`], [`search::SearchIndex`]) supplied by the
//! caller, with [`store::memory::MemoryStore`] and
//! [`search::client::HttpSearchIndex`] as the shipped implementations.

pub mod apply;
pub mod coerce;
pub mod engine;
pub mod errors;
pub mod filters;
pub mod projector;
pub mod search;
pub mod store;
pub mod types;

pub use apply::{AppliedValues, ApplyMode, RawValues, apply_values};
pub use engine::AttributeEngine;
pub use errors::{EngineError, ValidationError, ValidationIssue, ValidationResult};
pub use filters::{
    DynamicOp, FieldConstraint, ListingFilter,
    predicate::{Clause, Predicate, ValueSnapshot},
    translate,
};
pub use projector::{
    EXCERPT_MAX_CHARS, IndexDocument, RebuildReport, project_for_index, rebuild_index, sync_listing,
};
pub use search::{
    IndexError, IndexSettings, SearchHits, SearchIndex, SearchRequest, SortOrder, SortSpec,
    client::{HttpSearchIndex, IndexConfig},
};
pub use store::{
    MutationCommand, MutationPlan, ServiceTypeSelector, StoredValue, ValueStore, memory::MemoryStore,
};
pub use types::{
    AttrValue, BoundField, BoundFields, Field, FieldOption, InputType, Listing, ServiceType,
    ServiceTypeField,
};
