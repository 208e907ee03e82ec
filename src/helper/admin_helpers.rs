use crate::helper::account_helpers::resolve_actor;
use crate::helper::authorization_helpers::{self, Actor};
use crate::helper::{get_conn, ServiceResult};
use crate::models::db_operations::{comments_db_operations, posts_db_operations, users_db_operations, DbError};
use crate::models::{PostFilter, PostView, Role, User};
use crate::DbPool;
use rusqlite::Connection;

fn resolve_admin(conn: &Connection, user_id: i64) -> ServiceResult<Actor> {
    let actor = resolve_actor(conn, user_id)?;
    if let Err(e) = authorization_helpers::require_admin(&actor) {
        log::warn!("User {} ({}) denied an admin action", actor.user_id, actor.role);
        return Err(e.into());
    }
    Ok(actor)
}

// Admins cannot lock themselves out.
fn ensure_not_self(actor: &Actor, target_id: i64, action: &str) -> ServiceResult<()> {
    if actor.user_id == target_id {
        return Err(DbError::Validation(format!("administrators cannot {} their own account", action)).into());
    }
    Ok(())
}

pub fn list_users(pool: &DbPool, user_id: i64) -> ServiceResult<Vec<User>> {
    let conn = get_conn(pool)?;
    resolve_admin(&conn, user_id)?;
    Ok(users_db_operations::read_all_users(&conn)?)
}

pub fn change_role(pool: &DbPool, user_id: i64, target_id: i64, role: Role) -> ServiceResult<User> {
    let conn = get_conn(pool)?;
    let actor = resolve_admin(&conn, user_id)?;
    if role != Role::Admin {
        ensure_not_self(&actor, target_id, "demote")?;
    }
    let user = users_db_operations::update_role(&conn, target_id, role)?;
    log::info!("Admin {} changed the role of user {} to {}", actor.user_id, target_id, role);
    Ok(user)
}

pub fn set_user_active(pool: &DbPool, user_id: i64, target_id: i64, is_active: bool) -> ServiceResult<User> {
    let conn = get_conn(pool)?;
    let actor = resolve_admin(&conn, user_id)?;
    if !is_active {
        ensure_not_self(&actor, target_id, "deactivate")?;
    }
    let user = users_db_operations::set_active(&conn, target_id, is_active)?;
    log::info!(
        "Admin {} {} user {}",
        actor.user_id,
        if is_active { "activated" } else { "deactivated" },
        target_id
    );
    Ok(user)
}

pub fn delete_user(pool: &DbPool, user_id: i64, target_id: i64) -> ServiceResult<()> {
    let mut conn = get_conn(pool)?;
    let actor = resolve_admin(&conn, user_id)?;
    ensure_not_self(&actor, target_id, "delete")?;
    users_db_operations::delete_user(&mut conn, target_id)?;
    log::info!("Admin {} deleted user {}", actor.user_id, target_id);
    Ok(())
}

/// Posts in any status, honouring the filter as given.
pub fn list_posts(pool: &DbPool, user_id: i64, filter: &PostFilter) -> ServiceResult<Vec<PostView>> {
    let conn = get_conn(pool)?;
    resolve_admin(&conn, user_id)?;
    Ok(posts_db_operations::list_post_views(&conn, filter, false)?)
}

pub fn delete_post(pool: &DbPool, user_id: i64, post_id: i64) -> ServiceResult<()> {
    let mut conn = get_conn(pool)?;
    let actor = resolve_admin(&conn, user_id)?;
    posts_db_operations::delete_post(&mut conn, post_id)?;
    log::info!("Admin {} removed post {}", actor.user_id, post_id);
    Ok(())
}

pub fn delete_comment(pool: &DbPool, user_id: i64, comment_id: i64) -> ServiceResult<usize> {
    let mut conn = get_conn(pool)?;
    let actor = resolve_admin(&conn, user_id)?;
    let removed = comments_db_operations::delete_comment(&mut conn, comment_id)?;
    log::info!("Admin {} removed comment {} ({} removed)", actor.user_id, comment_id, removed);
    Ok(removed)
}
