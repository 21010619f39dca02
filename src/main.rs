use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flat_notifier::config::Config;
use flat_notifier::core::admission::AdmissionGate;
use flat_notifier::core::buildings::{self, BuildingResolver};
use flat_notifier::core::notifier::Notifier;
use flat_notifier::db::{Database, TableNames};
use flat_notifier::db_storage::PgStore;
use flat_notifier::dispatcher::Dispatcher;
use flat_notifier::handlers::{self, AppState};
use flat_notifier::integrations::feed_client::FeedClient;
use flat_notifier::integrations::telegram_client::TelegramClient;
use flat_notifier::scheduler::{self, CronExpression};

/// Main entry point for the notifier.
///
/// Startup failures (configuration, database connection, schema, seed data)
/// abort the process. After that the dispatcher runs once, then on the
/// configured schedule; the HTTP surface is served when `PORT` is set.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flat_notifier=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let schedule = config
        .schedule
        .as_deref()
        .map(CronExpression::parse)
        .transpose()?;

    let tables = TableNames {
        sessions: config.sessions_table.clone(),
        apartments: config.apartments_table.clone(),
    };
    let db = Database::new(&config.database_url).await?;
    db.migrate(&tables).await?;
    tracing::info!("Database connection pool established");

    let store = Arc::new(PgStore::new(db.pool.clone(), tables));

    let seeds = buildings::load_dataset(config.buildings_file.as_deref()).await?;
    buildings::seed_buildings(store.as_ref(), &seeds).await?;

    let feed = FeedClient::new(config.feed_url.clone())?;
    let telegram = TelegramClient::new(config.telegram_api_url.clone(), config.bot_token.clone())?;
    tracing::info!("✓ Telegram client initialized: {}", config.telegram_api_url);

    let resolver = BuildingResolver::new(store.clone(), store.clone());
    let gate = AdmissionGate::new(resolver, store.clone());
    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        feed,
        gate,
        Notifier::new(Arc::new(telegram)),
    ));

    let server = match config.port {
        Some(port) => {
            let app = handlers::router(Arc::new(AppState {
                dispatcher: dispatcher.clone(),
            }));
            let addr = format!("0.0.0.0:{}", port);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("Server listening on {}", addr);
            Some(tokio::spawn(async move { axum::serve(listener, app).await }))
        }
        None => None,
    };

    match schedule {
        Some(schedule) => scheduler::run_on_schedule(dispatcher, schedule).await,
        None => {
            if let Err(e) = dispatcher.run().await {
                tracing::error!("Dispatch run failed: {}", e);
            }
        }
    }

    if let Some(server) = server {
        server.await??;
    }

    Ok(())
}
