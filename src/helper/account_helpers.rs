use crate::helper::authorization_helpers::Actor;
use crate::helper::{get_conn, ServiceError, ServiceResult};
use crate::models::db_operations::{users_db_operations, DbError};
use crate::models::{NewUser, Role, User};
use crate::DbPool;
use rusqlite::Connection;

/// Self-service sign-up. Accounts always start as `normal_user`; promotion is an admin action.
pub fn register(pool: &DbPool, new_user: &NewUser) -> ServiceResult<User> {
    let mut conn = get_conn(pool)?;
    let new_user = NewUser {
        username: new_user.username.clone(),
        email: new_user.email.clone(),
        password: new_user.password.clone(),
        role: Role::NormalUser,
    };
    let user = users_db_operations::create_user(&mut conn, &new_user)?;
    log::info!("Registered user '{}' (id {})", user.username, user.id);
    Ok(user)
}

/// `None` for unknown usernames, wrong passwords and deactivated accounts alike.
pub fn login(pool: &DbPool, username: &str, password: &str) -> ServiceResult<Option<User>> {
    let conn = get_conn(pool)?;
    let user = users_db_operations::verify_credentials(&conn, username, password)?;
    if user.is_none() {
        log::warn!("Failed login attempt for username '{}'", username);
    }
    Ok(user)
}

pub fn current_user(pool: &DbPool, user_id: i64) -> ServiceResult<User> {
    let conn = get_conn(pool)?;
    read_session_user(&conn, user_id)
}

/// Resolves a session's user id to an actor using the stored role and active flag.
pub fn load_actor(pool: &DbPool, user_id: i64) -> ServiceResult<Actor> {
    let conn = get_conn(pool)?;
    resolve_actor(&conn, user_id)
}

// A session pointing at a deleted user is treated as no session at all.
fn read_session_user(conn: &Connection, user_id: i64) -> ServiceResult<User> {
    match users_db_operations::read_user(conn, user_id) {
        Ok(user) => Ok(user),
        Err(DbError::NotFound { .. }) => Err(ServiceError::Unauthenticated),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn resolve_actor(conn: &Connection, user_id: i64) -> ServiceResult<Actor> {
    let user = read_session_user(conn, user_id)?;
    Actor::from_user(&user).map_err(|e| {
        log::warn!("Rejected session for deactivated user {}", user_id);
        e.into()
    })
}

/// For routes open to anonymous readers: a stale or deactivated session reads as anonymous.
pub(crate) fn resolve_viewer(conn: &Connection, user_id: Option<i64>) -> ServiceResult<Option<Actor>> {
    let Some(user_id) = user_id else {
        return Ok(None);
    };
    match resolve_actor(conn, user_id) {
        Ok(actor) => Ok(Some(actor)),
        Err(ServiceError::Unauthenticated) | Err(ServiceError::Authorization(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
