//! Facade binding a storage handle and a search-index client into one
//! engine value the hosting application threads around.

use serde_json::{Map, Value};

use crate::{
    apply::{self, AppliedValues, ApplyMode, RawValues},
    errors::EngineError,
    filters::{self, ListingFilter},
    projector::{self, IndexDocument, RebuildReport},
    search::{IndexSettings, SearchHits, SearchIndex},
    store::{MutationCommand, MutationPlan, ServiceTypeSelector, ValueStore},
};

/// The dynamic-attribute engine over a caller-supplied store and index.
/// The store is authoritative; the index client is best-effort on every
/// write path.
#[derive(Debug)]
pub struct AttributeEngine<S, I> {
    store: S,
    index: I,
}

impl<S: ValueStore, I: SearchIndex> AttributeEngine<S, I> {
    pub fn new(store: S, index: I) -> Self {
        Self { store, index }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    /// Validate and persist a raw value map for a listing, against the
    /// fields bound to the listing's service type. Does not touch the
    /// index; call [`AttributeEngine::sync_listing`] after a successful
    /// apply.
    pub async fn apply_values(
        &self,
        listing_id: i64,
        raw: &RawValues,
        mode: ApplyMode,
    ) -> Result<AppliedValues, EngineError> {
        let listing = self.store.listing(listing_id).await?.ok_or(EngineError::NotFound {
            entity: "listing",
            id: listing_id.to_string(),
        })?;
        let fields = self.store.bound_fields(listing.service_type_id).await?;
        apply::apply_values(&self.store, listing_id, raw, &fields, mode).await
    }

    /// Translate a generic parameter map into a relational predicate and an
    /// index filter expression for one service type (by numeric id or
    /// slug).
    pub async fn build_filter(
        &self,
        service_type: &str,
        params: &Map<String, Value>,
    ) -> Result<ListingFilter, EngineError> {
        let selector = ServiceTypeSelector::parse(service_type);
        let resolved = self
            .store
            .service_type(&selector)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "service type",
                id: selector.to_string(),
            })?;
        let fields = self.store.bound_fields(resolved.id).await?;
        filters::translate(selector, params, &fields)
    }

    /// Flatten a listing into its index document without writing anywhere.
    pub async fn project_for_index(&self, listing_id: i64) -> Result<IndexDocument, EngineError> {
        projector::project_for_index(&self.store, listing_id).await
    }

    /// Re-project one listing into the index, full-replace. Index failures
    /// are logged and swallowed.
    pub async fn sync_listing(&self, listing_id: i64) -> Result<(), EngineError> {
        projector::sync_listing(&self.store, &self.index, listing_id).await
    }

    /// Delete a listing, cascading its value rows and option links, then
    /// drop its index document best-effort.
    pub async fn delete_listing(&self, listing_id: i64) -> Result<(), EngineError> {
        let mut plan = MutationPlan::new();
        plan.push(MutationCommand::DeleteListing { listing_id });
        self.store.execute(plan).await?;
        projector::remove_listing(&self.index, listing_id).await;
        Ok(())
    }

    /// Re-project every listing into the index.
    pub async fn rebuild_index(&self) -> Result<RebuildReport, EngineError> {
        projector::rebuild_index(&self.store, &self.index).await
    }

    /// Translate the parameters and run the resulting query against the
    /// index. Unlike the write paths, index failures surface here.
    pub async fn search(&self, service_type: &str, params: &Map<String, Value>) -> Result<SearchHits, EngineError> {
        let filter = self.build_filter(service_type, params).await?;
        Ok(self.index.search(&filter.to_search_request()).await?)
    }

    /// Declare the attribute lists a service type's fields need on the
    /// index. Administrative, so index failures surface here too.
    pub async fn configure_index(&self, service_type: &str) -> Result<(), EngineError> {
        let selector = ServiceTypeSelector::parse(service_type);
        let resolved = self
            .store
            .service_type(&selector)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "service type",
                id: selector.to_string(),
            })?;
        let fields = self.store.bound_fields(resolved.id).await?;
        Ok(self.index.configure(&IndexSettings::for_fields(&fields)).await?)
    }
}
