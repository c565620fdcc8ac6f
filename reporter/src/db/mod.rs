use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Open the report database at `database_url` (e.g. `sqlite:./data/reporter.db`),
/// creating the file and its directory on first start.
pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    if let Some(dir) = options.get_filename().parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    open(SqlitePoolOptions::new(), options).await
}

/// Single-connection in-memory database with migrations applied.
///
/// Each connection to `:memory:` is a separate database, so the pool is
/// capped at one connection that never gets recycled.
pub async fn connect_in_memory() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None);
    open(pool, SqliteConnectOptions::from_str("sqlite::memory:")?).await
}

async fn open(pool: SqlitePoolOptions, options: SqliteConnectOptions) -> anyhow::Result<SqlitePool> {
    let pool = pool.connect_with(options).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}
