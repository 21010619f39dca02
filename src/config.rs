use regex::Regex;
use serde::Deserialize;

pub const DEFAULT_FEED_URL: &str = "https://ak.api.onliner.by/search/apartments";
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bot_token: String,
    pub database_url: String,
    /// Cron expression; `None` means a single run at startup.
    pub schedule: Option<String>,
    pub sessions_table: String,
    pub apartments_table: String,
    pub feed_url: String,
    pub telegram_api_url: String,
    pub buildings_file: Option<String>,
    pub port: Option<u16>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            bot_token: std::env::var("BOT_TOKEN")
                .map_err(|_| anyhow::anyhow!("BOT_TOKEN environment variable required"))
                .and_then(|token| {
                    if token.trim().is_empty() {
                        anyhow::bail!("BOT_TOKEN cannot be empty");
                    }
                    Ok(token)
                })?,
            database_url: std::env::var("DATABASE_URL")
                .or_else(|_| std::env::var("DB_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DATABASE_URL or DB_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DATABASE_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            schedule: optional_var("SCHEDULE"),
            sessions_table: optional_var("SESSIONS_COLLECTION")
                .unwrap_or_else(|| "session".to_string()),
            apartments_table: optional_var("APARTMENTS_COLLECTION")
                .unwrap_or_else(|| "apartment".to_string()),
            feed_url: optional_var("FEED_URL")
                .map(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("FEED_URL must start with http:// or https://");
                    }
                    Ok(url)
                })
                .transpose()?
                .unwrap_or_else(|| DEFAULT_FEED_URL.to_string()),
            telegram_api_url: optional_var("TELEGRAM_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string()),
            buildings_file: optional_var("BUILDINGS_FILE"),
            port: optional_var("PORT")
                .map(|port| {
                    port.parse::<u16>().map_err(|_| {
                        anyhow::anyhow!("PORT must be a valid number between 1-65535")
                    })
                })
                .transpose()?,
        };

        config.validate_table_names()?;

        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database URL: {}...",
            &config.database_url[..20.min(config.database_url.len())]
        );
        tracing::debug!("Feed URL: {}", config.feed_url);
        tracing::debug!(
            "Tables: sessions={}, apartments={}",
            config.sessions_table,
            config.apartments_table
        );
        match &config.schedule {
            Some(schedule) => tracing::info!("Dispatch schedule: {}", schedule),
            None => tracing::info!("No schedule configured, running once at startup"),
        }

        Ok(config)
    }

    /// Table names are spliced into SQL, so only plain identifiers are accepted.
    pub fn validate_table_names(&self) -> anyhow::Result<()> {
        let identifier = Regex::new(r"^[a-z_][a-z0-9_]*$")?;
        for (var, name) in [
            ("SESSIONS_COLLECTION", &self.sessions_table),
            ("APARTMENTS_COLLECTION", &self.apartments_table),
        ] {
            if !identifier.is_match(name) {
                anyhow::bail!("{} must be a lowercase SQL identifier, got '{}'", var, name);
            }
        }
        Ok(())
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}
