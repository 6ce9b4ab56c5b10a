use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::config::Config;

/// Opens the Postgres pool and brings the schema up to date.
pub async fn connect(config: &Config) -> Result<PgPool> {
    info!(
        "Connecting to PostgreSQL (max connections: {})...",
        config.db_max_connections
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to apply database migrations")?;

    info!("PostgreSQL ready, migrations applied");
    Ok(pool)
}

/// `LIKE`/`ILIKE` pattern matching values that contain `fragment`. Use with
/// `ESCAPE '\'`.
pub fn contains_pattern(fragment: &str) -> String {
    let mut pattern = String::with_capacity(fragment.len() + 2);
    pattern.push('%');
    for c in fragment.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("algebra"), "%algebra%");
        assert_eq!(contains_pattern("100%_done\\"), "%100\\%\\_done\\\\%");
        assert_eq!(contains_pattern(""), "%%");
    }
}
