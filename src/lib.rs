use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::Config;
use crate::setup::db_setup;

pub type DbPool = Pool<SqliteConnectionManager>;

/// File-backed pool, or a single shared in-memory connection when no file is configured.
/// Every connection has foreign keys enabled.
pub fn build_pool(config: &Config) -> Result<DbPool, r2d2::Error> {
    match config.database_file() {
        Some(path) => {
            let manager = SqliteConnectionManager::file(path).with_init(|c| db_setup::configure_connection(c));
            Pool::builder().build(manager)
        }
        None => memory_pool(),
    }
}

/// In-memory databases are per connection, so the pool holds exactly one.
pub fn memory_pool() -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::memory().with_init(|c| db_setup::configure_connection(c));
    Pool::builder()
        .max_size(1)
        .max_lifetime(None)
        .idle_timeout(None)
        .build(manager)
}

pub mod config;
pub mod helper;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod setup;
