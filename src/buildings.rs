//! Building metadata: reference dataset seeding and address resolution.
//!
//! The building store is seeded once from a static list and is read-only
//! afterwards, so resolutions are cached in-process for an hour.

use moka::future::Cache;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crate::address;
use crate::errors::AppError;
use crate::models::{BuildingInfo, BuildingRecord, BuildingSeed, LookupFailure, LookupReason};
use crate::store::{BuildingStore, LookupLogStore};

/// Reference list shipped with the binary.
pub const EMBEDDED_DATASET: &str = include_str!("../data/buildings.json");

/// Outcome of resolving a raw address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Found(BuildingInfo),
    Missing(LookupReason),
}

impl Resolution {
    pub fn info(&self) -> Option<BuildingInfo> {
        match self {
            Resolution::Found(info) => Some(*info),
            Resolution::Missing(_) => None,
        }
    }
}

/// Loads the reference dataset from `path`, or the embedded copy when `None`.
pub async fn load_dataset(path: Option<&str>) -> Result<Vec<BuildingSeed>, AppError> {
    let raw = match path {
        Some(path) => tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::ConfigError(format!("Cannot read buildings file {}: {}", path, e))
        })?,
        None => EMBEDDED_DATASET.to_string(),
    };
    let seeds: Vec<BuildingSeed> = serde_json::from_str(&raw)?;
    Ok(seeds)
}

/// Seeds the building store unless it already holds records.
///
/// Entries whose address does not parse are logged and skipped. Returns the
/// number of records inserted (0 when seeding was skipped).
pub async fn seed_buildings(
    store: &dyn BuildingStore,
    seeds: &[BuildingSeed],
) -> Result<u64, AppError> {
    let existing = store.count().await?;
    if existing > 0 {
        tracing::info!(
            "Building store already holds {} records, skipping seed",
            existing
        );
        return Ok(0);
    }

    let mut records = Vec::with_capacity(seeds.len());
    for seed in seeds {
        match address::parse(&seed.address) {
            Ok(parsed) => records.push(BuildingRecord {
                address: parsed,
                year: seed.year,
                floors: seed.floors,
                types: seed.types.iter().cloned().collect::<BTreeSet<_>>(),
            }),
            Err(e) => {
                tracing::warn!("Skipping building '{}': {}", seed.address, e);
            }
        }
    }

    let inserted = store.insert_buildings(&records).await?;
    tracing::info!("Seeded {} of {} buildings", inserted, seeds.len());
    Ok(inserted)
}

/// Maps raw listing addresses to construction metadata.
#[derive(Clone)]
pub struct BuildingResolver {
    buildings: Arc<dyn BuildingStore>,
    failures: Arc<dyn LookupLogStore>,
    cache: Cache<String, Resolution>,
}

impl BuildingResolver {
    pub fn new(buildings: Arc<dyn BuildingStore>, failures: Arc<dyn LookupLogStore>) -> Self {
        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(3600))
            .max_capacity(10_000)
            .build();

        Self {
            buildings,
            failures,
            cache,
        }
    }

    /// Resolves a raw address.
    ///
    /// Misses are written to the lookup-failure log before being cached, so a
    /// log write that fails is retried on the next sighting.
    pub async fn resolve(&self, raw_address: &str) -> Result<Resolution, AppError> {
        if let Some(cached) = self.cache.get(raw_address).await {
            return Ok(cached);
        }

        let resolution = match address::parse(raw_address) {
            Err(e) => {
                tracing::debug!("Cannot parse address '{}': {}", raw_address, e);
                Resolution::Missing(LookupReason::ParsingFailed)
            }
            Ok(parsed) => match self.buildings.find_building(&parsed).await? {
                Some(record) => Resolution::Found(record.info()),
                None => {
                    tracing::debug!("No building for '{}' ({})", raw_address, parsed.key());
                    Resolution::Missing(LookupReason::AddressNotFound)
                }
            },
        };

        if let Resolution::Missing(reason) = resolution {
            self.failures
                .record_failure(&LookupFailure {
                    address: raw_address.to_string(),
                    reason,
                })
                .await?;
        }

        self.cache.insert(raw_address.to_string(), resolution).await;
        Ok(resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_embedded_dataset_parses() {
        let seeds = load_dataset(None).await.unwrap();
        assert!(!seeds.is_empty());
        for seed in &seeds {
            assert!(
                address::parse(&seed.address).is_ok(),
                "unparseable seed address: {}",
                seed.address
            );
        }
    }

    #[tokio::test]
    async fn test_missing_dataset_file_is_config_error() {
        let result = load_dataset(Some("/nonexistent/buildings.json")).await;
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_resolution_info() {
        let info = BuildingInfo {
            year: 1975,
            floors: 9,
        };
        assert_eq!(Resolution::Found(info).info(), Some(info));
        assert_eq!(
            Resolution::Missing(LookupReason::AddressNotFound).info(),
            None
        );
    }
}
