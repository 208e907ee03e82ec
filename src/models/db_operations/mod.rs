use bcrypt::BcryptError;
use rusqlite::{ffi, ErrorCode};
use thiserror::Error;

pub mod comments_db_operations;
pub mod engagement_db_operations;
pub mod posts_db_operations;
pub mod users_db_operations;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("{entity} not found with ID {id}")]
    NotFound { entity: &'static str, id: i64 },
    #[error("user {user_id} does not like post {post_id}")]
    NotLiked { user_id: i64, post_id: i64 },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("Bcrypt error: {0}")]
    Bcrypt(#[from] BcryptError),
}

impl DbError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        DbError::NotFound { entity, id }
    }
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

/// Trims a required text field and enforces its length limit.
pub(crate) fn required_text(field: &str, value: &str, max_len: usize) -> Result<String, DbError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DbError::Validation(format!("{} must not be empty", field)));
    }
    if value.chars().count() > max_len {
        return Err(DbError::Validation(format!("{} cannot exceed {} characters", field, max_len)));
    }
    Ok(value.to_string())
}

/// Trims an optional text field; blank values become `None`.
pub(crate) fn optional_text(field: &str, value: Option<&str>, max_len: usize) -> Result<Option<String>, DbError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.chars().count() > max_len => Err(DbError::Validation(format!(
            "{} cannot exceed {} characters",
            field, max_len
        ))),
        Some(v) => Ok(Some(v.to_string())),
    }
}

pub(crate) fn row_exists(conn: &rusqlite::Connection, table: &str, id: i64) -> Result<bool, DbError> {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", table);
    Ok(conn.query_row(&sql, [id], |row| row.get(0))?)
}
