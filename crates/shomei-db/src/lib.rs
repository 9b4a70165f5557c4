#[macro_use]
extern crate tracing;

use diesel::Connection;
use diesel_async::{
    async_connection_wrapper::AsyncConnectionWrapper,
    pooled_connection::{deadpool::Pool, AsyncDieselConnectionManager},
    AsyncPgConnection,
};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use shomei_config::database::Configuration as DatabaseConfig;

mod error;
mod pool;

pub mod json;
pub mod model;
#[allow(clippy::wildcard_imports)]
pub mod schema;
pub mod types;

pub use self::error::InvalidKeyId;
pub use self::pool::{PgPool, PoolError};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Connect to the database and run any pending migrations
pub async fn connect(config: &DatabaseConfig) -> eyre::Result<PgPool> {
    let conn_str = config.url.clone();
    tokio::task::spawn_blocking(move || {
        debug!(url = %conn_str, "Running pending migrations");

        let mut migration_conn =
            AsyncConnectionWrapper::<AsyncPgConnection>::establish(conn_str.as_str())?;

        migration_conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|err| eyre::eyre!(err))?;

        Ok::<_, eyre::Report>(())
    })
    .await??;

    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(config.url.as_str());
    let pool = Pool::builder(manager)
        .max_size(usize::try_from(config.max_connections)?)
        .build()?;

    Ok(pool.into())
}
