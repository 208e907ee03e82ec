use crate::helper::account_helpers::{resolve_actor, resolve_viewer};
use crate::helper::authorization_helpers::{self, Actor};
use crate::helper::sanitization_helpers::{sanitize_markdown_content, strip_all_html_opt};
use crate::helper::{get_conn, ServiceResult};
use crate::models::db_operations::{comments_db_operations, engagement_db_operations, posts_db_operations};
use crate::models::{Comment, CommentNode, Like, NewShare, Share};
use crate::DbPool;
use rusqlite::Connection;

// Comments, likes and shares all hang off a post the actor is allowed to see.
fn ensure_visible(conn: &Connection, actor: Option<&Actor>, post_id: i64) -> ServiceResult<()> {
    let post = posts_db_operations::read_post(conn, post_id)?;
    authorization_helpers::ensure_can_view_post(actor, &post)?;
    Ok(())
}

fn owned_comment(conn: &Connection, actor: &Actor, comment_id: i64) -> ServiceResult<Comment> {
    let comment = comments_db_operations::read_comment(conn, comment_id)?;
    if let Err(e) = authorization_helpers::ensure_can_modify_comment(actor, &comment) {
        log::warn!("User {} denied modifying comment {}: {}", actor.user_id, comment_id, e);
        return Err(e.into());
    }
    Ok(comment)
}

/// The post's comments as reply trees, oldest first.
pub fn list_comments(pool: &DbPool, viewer_id: Option<i64>, post_id: i64) -> ServiceResult<Vec<CommentNode>> {
    let conn = get_conn(pool)?;
    let viewer = resolve_viewer(&conn, viewer_id)?;
    ensure_visible(&conn, viewer.as_ref(), post_id)?;
    Ok(comments_db_operations::read_comment_thread(&conn, post_id)?)
}

pub fn add_comment(
    pool: &DbPool,
    user_id: i64,
    post_id: i64,
    content: &str,
    parent_comment_id: Option<i64>,
) -> ServiceResult<Comment> {
    let mut conn = get_conn(pool)?;
    let actor = resolve_actor(&conn, user_id)?;
    ensure_visible(&conn, Some(&actor), post_id)?;
    let comment = comments_db_operations::create_comment(
        &mut conn,
        post_id,
        actor.user_id,
        &sanitize_markdown_content(content),
        parent_comment_id,
    )?;
    Ok(comment)
}

pub fn edit_comment(pool: &DbPool, user_id: i64, comment_id: i64, content: &str) -> ServiceResult<Comment> {
    let conn = get_conn(pool)?;
    let actor = resolve_actor(&conn, user_id)?;
    owned_comment(&conn, &actor, comment_id)?;
    Ok(comments_db_operations::update_comment(&conn, comment_id, &sanitize_markdown_content(content))?)
}

/// Removes the comment and its replies. Returns the number of comments deleted.
pub fn delete_comment(pool: &DbPool, user_id: i64, comment_id: i64) -> ServiceResult<usize> {
    let mut conn = get_conn(pool)?;
    let actor = resolve_actor(&conn, user_id)?;
    owned_comment(&conn, &actor, comment_id)?;
    let removed = comments_db_operations::delete_comment(&mut conn, comment_id)?;
    log::info!("User {} deleted comment {} ({} removed)", actor.user_id, comment_id, removed);
    Ok(removed)
}

pub fn like_post(pool: &DbPool, user_id: i64, post_id: i64) -> ServiceResult<Like> {
    let mut conn = get_conn(pool)?;
    let actor = resolve_actor(&conn, user_id)?;
    ensure_visible(&conn, Some(&actor), post_id)?;
    Ok(engagement_db_operations::like_post(&mut conn, actor.user_id, post_id)?)
}

pub fn unlike_post(pool: &DbPool, user_id: i64, post_id: i64) -> ServiceResult<()> {
    let conn = get_conn(pool)?;
    let actor = resolve_actor(&conn, user_id)?;
    Ok(engagement_db_operations::unlike_post(&conn, actor.user_id, post_id)?)
}

pub fn share_post(pool: &DbPool, user_id: i64, post_id: i64, share: &NewShare) -> ServiceResult<Share> {
    let mut conn = get_conn(pool)?;
    let actor = resolve_actor(&conn, user_id)?;
    ensure_visible(&conn, Some(&actor), post_id)?;
    let share = NewShare {
        platform: strip_all_html_opt(share.platform.as_deref()),
        message: share.message.as_deref().map(sanitize_markdown_content),
    };
    Ok(engagement_db_operations::share_post(&mut conn, actor.user_id, post_id, &share)?)
}

pub fn list_shares(pool: &DbPool, viewer_id: Option<i64>, post_id: i64) -> ServiceResult<Vec<Share>> {
    let conn = get_conn(pool)?;
    let viewer = resolve_viewer(&conn, viewer_id)?;
    ensure_visible(&conn, viewer.as_ref(), post_id)?;
    Ok(engagement_db_operations::read_shares_for_post(&conn, post_id)?)
}
