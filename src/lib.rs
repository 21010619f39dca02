//! Apartment Feed Notifier Library
//!
//! Watches saved apartment searches on behalf of chat subscribers, enriches
//! each listing with building metadata, and sends every subscriber one
//! notification per listing they have not seen yet.
//!
//! # Modules
//!
//! - `core`: Domain logic namespace.
//! - `integrations`: External service integrations.
//! - `address`: Free-text address parsing.
//! - `admission`: Per-recipient dedup and persistence gate.
//! - `buildings`: Building reference seeding and resolution.
//! - `config`: Configuration management.
//! - `db`: Database connection and schema bootstrap.
//! - `db_storage`: Postgres implementation of the store traits.
//! - `dispatcher`: The dispatch loop.
//! - `errors`: Error handling types.
//! - `feed_client`: Upstream search feed client.
//! - `handlers`: Operational HTTP endpoints.
//! - `models`: Core data models.
//! - `notifier`: Message formatting and delivery classification.
//! - `scheduler`: Cron trigger.
//! - `store`: Persistence traits.
//! - `telegram_client`: Telegram Bot API client.

pub mod core;
pub mod integrations;

pub mod address;
pub mod admission;
pub mod buildings;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod dispatcher;
pub mod errors;
pub mod feed_client;
pub mod handlers;
pub mod models;
pub mod notifier;
pub mod scheduler;
pub mod store;
pub mod telegram_client;
