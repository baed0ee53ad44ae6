//! Database initialization: pool construction and idempotent schema setup

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::wizard::WizardCode;

/// Open a connection pool for the configured database, creating the file
/// if it does not exist yet.
pub async fn connect(config: &DatabaseConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)
        .map_err(sqlx::Error::from)?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Create all tables and indexes if missing, and seed the flagged-outcome
/// taxonomy sentinel. Safe to call on every startup.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    info!("Initializing database schema");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS venues (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            wh_key TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL DEFAULT '',
            category_name TEXT NOT NULL DEFAULT '',
            category_id TEXT NOT NULL DEFAULT '1000',
            is_chain INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_elements (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            wizard TEXT NOT NULL UNIQUE,
            level1_id TEXT NOT NULL,
            level1 TEXT NOT NULL DEFAULT '',
            level2 TEXT NOT NULL DEFAULT '',
            level3 TEXT NOT NULL DEFAULT '',
            level4 TEXT NOT NULL DEFAULT '',
            level5 TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS services (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            venue_id INTEGER NOT NULL REFERENCES venues(id),
            wh_key TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            category TEXT NOT NULL DEFAULT '',
            search_level1_id TEXT NOT NULL DEFAULT '',
            search_level1 TEXT NOT NULL DEFAULT '',
            search_city TEXT NOT NULL DEFAULT '',
            search_country TEXT NOT NULL DEFAULT '',
            state TEXT NOT NULL DEFAULT 'unreviewed',
            resolved_wizard TEXT,
            lease_expiry INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Allocation scans by (country, topic, state, lease)
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_services_allocation
        ON services (search_country, search_level1_id, state, lease_expiry)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            reviewer_id INTEGER NOT NULL,
            start_time INTEGER NOT NULL,
            end_time INTEGER NOT NULL,
            match_counter INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reviewer_profiles (
            reviewer_id INTEGER PRIMARY KEY,
            general_counter INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    // UNIQUE(service_id, reviewer_id) enforces one outcome per
    // (record, reviewer) pair in the store itself.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS matches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            reviewer_id INTEGER NOT NULL,
            session_id INTEGER NOT NULL REFERENCES sessions(id),
            service_id INTEGER NOT NULL REFERENCES services(id),
            match_index_id INTEGER NOT NULL REFERENCES index_elements(id),
            created_at INTEGER NOT NULL,
            not_enough_info INTEGER NOT NULL DEFAULT 0,
            used_search INTEGER NOT NULL DEFAULT 0,
            search_string TEXT NOT NULL DEFAULT '',
            time_spent_secs INTEGER NOT NULL,
            backend_version INTEGER NOT NULL,
            UNIQUE (service_id, reviewer_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS match_rejections (
            match_id INTEGER NOT NULL REFERENCES matches(id),
            index_element_id INTEGER NOT NULL REFERENCES index_elements(id),
            PRIMARY KEY (match_id, index_element_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    seed_flagged_sentinel(pool).await?;

    info!("Database schema ready");
    Ok(())
}

/// Insert the all-zero taxonomy sentinel that flagged outcomes reference.
async fn seed_flagged_sentinel(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO index_elements (wizard, level1_id, level1)
        VALUES (?, '00000', 'Not enough information')
        "#,
    )
    .bind(WizardCode::flagged().as_str())
    .execute(pool)
    .await?;

    Ok(())
}
