//! Persistence seams.
//!
//! The pipeline only needs document-store primitives (find one, upsert,
//! insert) over four collections. Each collection gets its own trait so the
//! dispatcher, gate and resolver depend on exactly what they touch.

use async_trait::async_trait;

use crate::errors::AppError;
use crate::models::{
    BuildingRecord, Listing, LookupFailure, StructuredAddress, Subscriber,
};

/// Subscriber sessions. Written by the chat front-end; the pipeline only
/// reads them and clears URLs of unreachable recipients.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Sessions whose saved search URL is set.
    async fn active_subscribers(&self) -> Result<Vec<Subscriber>, AppError>;

    /// Clears the saved search URL of a session.
    async fn clear_search_url(&self, key: &str) -> Result<(), AppError>;
}

#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn find_listing(&self, external_id: &str) -> Result<Option<Listing>, AppError>;

    /// Upserts by external id, merging into an existing document.
    async fn upsert_listing(&self, listing: &Listing) -> Result<(), AppError>;
}

#[async_trait]
pub trait BuildingStore: Send + Sync {
    async fn count(&self) -> Result<u64, AppError>;

    /// Inserts records, skipping addresses already present. Returns the number inserted.
    async fn insert_buildings(&self, records: &[BuildingRecord]) -> Result<u64, AppError>;

    /// Exact match on `(type, street, number)`.
    async fn find_building(
        &self,
        address: &StructuredAddress,
    ) -> Result<Option<BuildingRecord>, AppError>;
}

#[async_trait]
pub trait LookupLogStore: Send + Sync {
    /// Records a failed lookup once per distinct `(address, reason)`.
    async fn record_failure(&self, failure: &LookupFailure) -> Result<(), AppError>;
}
