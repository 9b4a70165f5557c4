use crate::BoxError;
use async_trait::async_trait;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use iso8601_timestamp::Timestamp;
use scoped_futures::ScopedFutureExt;
use shomei_db::{
    model::signatory::{hash_key_id, Signatory},
    schema::signatories,
    PgPool, PoolError,
};
use thiserror::Error;

/// Signatory persistence error
#[derive(Debug, Error)]
pub enum StoreError {
    /// A row with the same hashed key id already exists
    ///
    /// Surfaced distinctly so callers can switch to the update path when
    /// they lose a first-contact insert race.
    #[error("signatory already exists")]
    Duplicate,

    #[error(transparent)]
    Other(BoxError),
}

impl From<diesel::result::Error> for StoreError {
    fn from(value: diesel::result::Error) -> Self {
        match value {
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ) => Self::Duplicate,
            err => Self::Other(err.into()),
        }
    }
}

fn flatten<T>(result: Result<T, PoolError<StoreError>>) -> Result<T, StoreError> {
    match result {
        Ok(value) => Ok(value),
        Err(PoolError::Pool(err)) => Err(StoreError::Other(err.into())),
        Err(PoolError::User(err)) => Err(err),
    }
}

/// CRUD over persisted signatories, keyed by the hash of the key id
#[async_trait]
pub trait SignatoryStore: Send + Sync + 'static {
    async fn get_by_key_id(&self, key_id: &str) -> Result<Option<Signatory>, StoreError>;

    /// Forward lookup for outgoing discovery
    async fn get_by_host_account(
        &self,
        host: &str,
        account: &str,
    ) -> Result<Option<Signatory>, StoreError>;

    async fn insert(&self, signatory: &Signatory) -> Result<(), StoreError>;

    /// Store a rotated public key and refresh the update timestamp
    async fn update_public_key(&self, signatory: &Signatory) -> Result<(), StoreError>;

    /// Store refreshed metadata and refresh the update timestamp
    async fn update_metadata(&self, signatory: &Signatory) -> Result<(), StoreError>;

    async fn delete(&self, key_id: &str) -> Result<(), StoreError>;
}

/// Production store backed by the `signatories` table
#[derive(Clone)]
pub struct PgSignatoryStore {
    db_pool: PgPool,
}

impl PgSignatoryStore {
    #[must_use]
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SignatoryStore for PgSignatoryStore {
    async fn get_by_key_id(&self, key_id: &str) -> Result<Option<Signatory>, StoreError> {
        let key_id_sum = hash_key_id(key_id);

        let result = self
            .db_pool
            .with_connection(|db_conn| {
                async move {
                    signatories::table
                        .filter(signatories::key_id_sum.eq(key_id_sum))
                        .select(Signatory::as_select())
                        .first(db_conn)
                        .await
                        .optional()
                        .map_err(StoreError::from)
                }
                .scope_boxed()
            })
            .await;

        flatten(result)
    }

    async fn get_by_host_account(
        &self,
        host: &str,
        account: &str,
    ) -> Result<Option<Signatory>, StoreError> {
        let result = self
            .db_pool
            .with_connection(|db_conn| {
                async move {
                    signatories::table
                        .filter(signatories::host.eq(host))
                        .filter(signatories::account.eq(account))
                        .select(Signatory::as_select())
                        .first(db_conn)
                        .await
                        .optional()
                        .map_err(StoreError::from)
                }
                .scope_boxed()
            })
            .await;

        flatten(result)
    }

    async fn insert(&self, signatory: &Signatory) -> Result<(), StoreError> {
        let result = self
            .db_pool
            .with_connection(|db_conn| {
                async move {
                    diesel::insert_into(signatories::table)
                        .values(signatory)
                        .execute(db_conn)
                        .await
                        .map_err(StoreError::from)
                }
                .scope_boxed()
            })
            .await;

        flatten(result)?;

        Ok(())
    }

    async fn update_public_key(&self, signatory: &Signatory) -> Result<(), StoreError> {
        let key_id_sum = hash_key_id(&signatory.key_id);

        let result = self
            .db_pool
            .with_connection(|db_conn| {
                async move {
                    diesel::update(
                        signatories::table.filter(signatories::key_id_sum.eq(key_id_sum)),
                    )
                    .set((
                        signatories::public_key.eq(&signatory.public_key),
                        signatories::updated_at.eq(Timestamp::now_utc()),
                    ))
                    .execute(db_conn)
                    .await
                    .map_err(StoreError::from)
                }
                .scope_boxed()
            })
            .await;

        flatten(result)?;

        Ok(())
    }

    async fn update_metadata(&self, signatory: &Signatory) -> Result<(), StoreError> {
        let key_id_sum = hash_key_id(&signatory.key_id);

        let result = self
            .db_pool
            .with_connection(|db_conn| {
                async move {
                    diesel::update(
                        signatories::table.filter(signatories::key_id_sum.eq(key_id_sum)),
                    )
                    .set((
                        signatories::metadata.eq(&signatory.metadata),
                        signatories::updated_at.eq(Timestamp::now_utc()),
                    ))
                    .execute(db_conn)
                    .await
                    .map_err(StoreError::from)
                }
                .scope_boxed()
            })
            .await;

        flatten(result)?;

        Ok(())
    }

    async fn delete(&self, key_id: &str) -> Result<(), StoreError> {
        let key_id_sum = hash_key_id(key_id);

        let result = self
            .db_pool
            .with_connection(|db_conn| {
                async move {
                    diesel::delete(
                        signatories::table.filter(signatories::key_id_sum.eq(key_id_sum)),
                    )
                    .execute(db_conn)
                    .await
                    .map_err(StoreError::from)
                }
                .scope_boxed()
            })
            .await;

        flatten(result)?;

        Ok(())
    }
}
