use sqlx::{postgres::PgPoolOptions, PgPool};

/// Table names that are configurable per deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub sessions: String,
    pub apartments: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            sessions: "session".to_string(),
            apartments: "apartment".to_string(),
        }
    }
}

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Creates missing tables. Safe to run on every start.
    pub async fn migrate(&self, tables: &TableNames) -> anyhow::Result<()> {
        for statement in schema_statements(tables) {
            sqlx::query(&statement).execute(&self.pool).await?;
        }
        tracing::info!("Database schema ready");
        Ok(())
    }

    /// Creates only the building and lookup-log tables.
    pub async fn migrate_buildings(&self) -> anyhow::Result<()> {
        for statement in building_schema_statements() {
            sqlx::query(&statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

/// DDL for the sessions, apartments, buildings and lookup log tables.
pub fn schema_statements(tables: &TableNames) -> Vec<String> {
    let mut statements = vec![
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                key TEXT PRIMARY KEY,
                data JSONB NOT NULL DEFAULT '{{}}'::jsonb
            )",
            tables.sessions
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
                external_id TEXT PRIMARY KEY,
                document JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
            tables.apartments
        ),
    ];
    statements.extend(building_schema_statements());
    statements
}

/// DDL for the tables whose names are not configurable.
pub fn building_schema_statements() -> Vec<String> {
    vec![
        "CREATE TABLE IF NOT EXISTS buildings (
            address_key TEXT PRIMARY KEY,
            street_type TEXT,
            street TEXT NOT NULL,
            building_number TEXT NOT NULL,
            year INTEGER NOT NULL,
            floors INTEGER NOT NULL,
            types JSONB NOT NULL DEFAULT '[]'::jsonb
        )"
        .to_string(),
        "CREATE INDEX IF NOT EXISTS buildings_street_idx ON buildings (street, building_number)"
            .to_string(),
        "CREATE TABLE IF NOT EXISTS lookup_logs (
            address TEXT NOT NULL,
            reason TEXT NOT NULL,
            first_seen_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            PRIMARY KEY (address, reason)
        )"
        .to_string(),
    ]
}
