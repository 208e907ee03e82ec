use crate::helper::authorization_helpers::AuthorizationError;
use crate::models::db_operations::DbError;
use crate::DbPool;
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use thiserror::Error;

pub mod account_helpers;
pub mod admin_helpers;
pub mod authorization_helpers;
pub mod encryption_helpers;
pub mod engagement_helpers;
pub mod media_helpers;
pub mod post_helpers;
pub mod sanitization_helpers;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
    #[error("authentication required")]
    Unauthenticated,
    #[error("R2D2 Pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("invalid upload: {0}")]
    InvalidUpload(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

pub(crate) fn get_conn(pool: &DbPool) -> ServiceResult<PooledConnection<SqliteConnectionManager>> {
    pool.get().map_err(ServiceError::Pool)
}
