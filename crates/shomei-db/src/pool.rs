use diesel_async::{
    pooled_connection::deadpool::{Pool, PoolError as DeadpoolError},
    scoped_futures::ScopedBoxFuture,
    AsyncPgConnection,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError<E> {
    #[error(transparent)]
    Pool(#[from] DeadpoolError),

    #[error("{0}")]
    User(E),
}

#[derive(Clone)]
pub struct PgPool {
    inner: Pool<AsyncPgConnection>,
}

impl PgPool {
    /// Run the code inside a context with a database connection
    pub async fn with_connection<'a, F, T, E>(&self, func: F) -> Result<T, PoolError<E>>
    where
        F: for<'r> FnOnce(&'r mut AsyncPgConnection) -> ScopedBoxFuture<'a, 'r, Result<T, E>>
            + Send
            + 'a,
        T: Send + 'a,
        E: Send + 'a,
    {
        let mut conn = self.inner.get().await?;
        func(&mut conn).await.map_err(PoolError::User)
    }
}

impl From<Pool<AsyncPgConnection>> for PgPool {
    fn from(value: Pool<AsyncPgConnection>) -> Self {
        Self { inner: value }
    }
}
