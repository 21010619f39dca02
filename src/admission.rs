//! Per-recipient dedup gate.
//!
//! Every sighting of a listing is enriched, merged with the stored document
//! and written back before the caller moves on. A recipient is marked as
//! delivered when the gate admits the listing for them, independent of how
//! the delivery later turns out.

use std::sync::Arc;

use crate::buildings::BuildingResolver;
use crate::errors::{AppError, ResultExt};
use crate::models::Listing;
use crate::store::ListingStore;

/// Decision for one listing and one recipient.
#[derive(Debug, Clone)]
pub struct Admission {
    pub should_notify: bool,
    /// Enriched listing as persisted.
    pub listing: Listing,
}

#[derive(Clone)]
pub struct AdmissionGate {
    resolver: BuildingResolver,
    listings: Arc<dyn ListingStore>,
}

impl AdmissionGate {
    pub fn new(resolver: BuildingResolver, listings: Arc<dyn ListingStore>) -> Self {
        Self { resolver, listings }
    }

    /// Enriches, deduplicates and persists `listing` for `recipient_id`.
    ///
    /// Building lookup problems never fail the call; store errors do, and in
    /// that case nothing must be sent.
    pub async fn admit(
        &self,
        mut listing: Listing,
        recipient_id: &str,
    ) -> Result<Admission, AppError> {
        listing.building_info = match self.resolver.resolve(&listing.address).await {
            Ok(resolution) => resolution.info(),
            Err(e) => {
                tracing::warn!(
                    "Building lookup failed for '{}', continuing without it: {}",
                    listing.address,
                    e
                );
                None
            }
        };

        let existing = self
            .listings
            .find_listing(&listing.external_id)
            .await
            .with_context(|| format!("loading apartment {}", listing.external_id))?;
        listing.delivered_to = existing.map(|l| l.delivered_to).unwrap_or_default();

        let should_notify = !listing.is_delivered_to(recipient_id);
        if should_notify {
            listing.delivered_to.insert(recipient_id.to_string(), true);
        }

        self.listings
            .upsert_listing(&listing)
            .await
            .with_context(|| format!("saving apartment {}", listing.external_id))?;

        Ok(Admission {
            should_notify,
            listing,
        })
    }
}
