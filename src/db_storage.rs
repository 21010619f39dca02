use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::db::TableNames;
use crate::errors::{AppError, ResultExt};
use crate::models::{
    BuildingRecord, Listing, LookupFailure, StreetType, StructuredAddress, Subscriber,
};
use crate::store::{BuildingStore, ListingStore, LookupLogStore, SessionStore};

/// Postgres-backed store. Listings and sessions are kept as JSONB documents.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    tables: TableNames,
}

impl PgStore {
    pub fn new(pool: PgPool, tables: TableNames) -> Self {
        Self { pool, tables }
    }
}

fn parse_street_type(raw: Option<String>) -> Option<StreetType> {
    match raw.as_deref() {
        Some("street") => Some(StreetType::Street),
        Some("lane") => Some(StreetType::Lane),
        Some("avenue") => Some(StreetType::Avenue),
        Some("tract") => Some(StreetType::Tract),
        _ => None,
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn active_subscribers(&self) -> Result<Vec<Subscriber>, AppError> {
        let sql = format!(
            "SELECT key, data->>'url' AS url FROM {} WHERE data->>'url' IS NOT NULL",
            self.tables.sessions
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .context("querying active sessions")?;

        let subscribers = rows
            .into_iter()
            .filter_map(|row| {
                let key: String = row.try_get("key").ok()?;
                let url: Option<String> = row.try_get("url").ok()?;
                Some(Subscriber {
                    key,
                    search_url: url,
                })
            })
            .collect();
        Ok(subscribers)
    }

    async fn clear_search_url(&self, key: &str) -> Result<(), AppError> {
        let sql = format!(
            "UPDATE {} SET data = jsonb_set(data, '{{url}}', 'null'::jsonb) WHERE key = $1",
            self.tables.sessions
        );
        sqlx::query(&sql)
            .bind(key)
            .execute(&self.pool)
            .await
            .context("clearing session url")?;
        Ok(())
    }
}

#[async_trait]
impl ListingStore for PgStore {
    async fn find_listing(&self, external_id: &str) -> Result<Option<Listing>, AppError> {
        let sql = format!(
            "SELECT document FROM {} WHERE external_id = $1",
            self.tables.apartments
        );
        let document: Option<(serde_json::Value,)> = sqlx::query_as(&sql)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await
            .context("loading apartment")?;

        match document {
            Some((value,)) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn upsert_listing(&self, listing: &Listing) -> Result<(), AppError> {
        let table = &self.tables.apartments;
        let sql = format!(
            r#"
            INSERT INTO {table} (external_id, document, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (external_id) DO UPDATE
            SET document = {table}.document || EXCLUDED.document,
                updated_at = now()
            "#
        );
        let document = serde_json::to_value(listing)?;

        sqlx::query(&sql)
            .bind(&listing.external_id)
            .bind(&document)
            .execute(&self.pool)
            .await
            .context("saving apartment")?;
        Ok(())
    }
}

#[async_trait]
impl BuildingStore for PgStore {
    async fn count(&self) -> Result<u64, AppError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM buildings")
            .fetch_one(&self.pool)
            .await
            .context("counting buildings")?;
        Ok(count.max(0) as u64)
    }

    async fn insert_buildings(&self, records: &[BuildingRecord]) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await.context("starting seed transaction")?;
        let mut inserted = 0;

        for record in records {
            let types = serde_json::to_value(&record.types)?;
            let result = sqlx::query(
                r#"
                INSERT INTO buildings
                    (address_key, street_type, street, building_number, year, floors, types)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (address_key) DO NOTHING
                "#,
            )
            .bind(record.address.key())
            .bind(record.address.street_type.map(|t| t.as_str()))
            .bind(&record.address.street)
            .bind(&record.address.building_number)
            .bind(record.year)
            .bind(record.floors)
            .bind(&types)
            .execute(&mut *tx)
            .await
            .context("inserting building")?;
            inserted += result.rows_affected();
        }

        tx.commit().await.context("committing seed transaction")?;
        Ok(inserted)
    }

    async fn find_building(
        &self,
        address: &StructuredAddress,
    ) -> Result<Option<BuildingRecord>, AppError> {
        let row = sqlx::query(
            r#"
            SELECT street_type, street, building_number, year, floors, types
            FROM buildings
            WHERE street_type IS NOT DISTINCT FROM $1
              AND street = $2
              AND building_number = $3
            LIMIT 1
            "#,
        )
        .bind(address.street_type.map(|t| t.as_str()))
        .bind(&address.street)
        .bind(&address.building_number)
        .fetch_optional(&self.pool)
        .await
        .context("looking up building")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let types: serde_json::Value = row.try_get("types")?;
        Ok(Some(BuildingRecord {
            address: StructuredAddress {
                street_type: parse_street_type(row.try_get("street_type")?),
                street: row.try_get("street")?,
                building_number: row.try_get("building_number")?,
            },
            year: row.try_get("year")?,
            floors: row.try_get("floors")?,
            types: serde_json::from_value(types).unwrap_or_default(),
        }))
    }
}

#[async_trait]
impl LookupLogStore for PgStore {
    async fn record_failure(&self, failure: &LookupFailure) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO lookup_logs (address, reason)
            VALUES ($1, $2)
            ON CONFLICT (address, reason) DO NOTHING
            "#,
        )
        .bind(&failure.address)
        .bind(failure.reason.as_str())
        .execute(&self.pool)
        .await
        .context("recording lookup failure")?;
        Ok(())
    }
}
