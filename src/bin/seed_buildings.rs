//! One-shot building seeding.
//!
//! Usage: `seed_buildings [path/to/buildings.json]`. Without an argument the
//! dataset embedded in the service is used. Does nothing if the table
//! already holds records.

use flat_notifier::buildings;
use flat_notifier::db::{Database, TableNames};
use flat_notifier::db_storage::PgStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flat_notifier=info".into()),
        )
        .init();

    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")
        .or_else(|_| std::env::var("DB_URL"))
        .map_err(|_| anyhow::anyhow!("DATABASE_URL or DB_URL environment variable required"))?;
    let dataset_path = std::env::args().nth(1);

    let db = Database::new(&database_url).await?;
    db.migrate_buildings().await?;
    // Only the building store is used, so the session table names never reach SQL.
    let store = PgStore::new(db.pool.clone(), TableNames::default());

    let seeds = buildings::load_dataset(dataset_path.as_deref()).await?;
    let inserted = buildings::seed_buildings(&store, &seeds).await?;

    println!("Inserted {} of {} buildings", inserted, seeds.len());
    Ok(())
}
