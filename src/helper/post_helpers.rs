use crate::helper::account_helpers::{resolve_actor, resolve_viewer};
use crate::helper::authorization_helpers::{self, Actor};
use crate::helper::sanitization_helpers::{sanitize_markdown_content, strip_all_html, strip_all_html_opt};
use crate::helper::{get_conn, ServiceResult};
use crate::models::db_operations::posts_db_operations;
use crate::models::{NewPost, Post, PostFilter, PostStatus, PostUpdate, PostView};
use crate::DbPool;
use rusqlite::Connection;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

pub fn page_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

fn sanitize_tags(tags: Option<&Vec<String>>) -> Option<Vec<String>> {
    tags.map(|tags| tags.iter().map(|t| strip_all_html(t)).collect())
}

fn sanitize_new_post(post: &NewPost) -> NewPost {
    NewPost {
        title: strip_all_html(&post.title),
        content: sanitize_markdown_content(&post.content),
        post_type: post.post_type,
        category: strip_all_html_opt(post.category.as_deref()),
        tags: sanitize_tags(post.tags.as_ref()),
        media_url: post.media_url.clone(),
        thumbnail_url: post.thumbnail_url.clone(),
        status: post.status,
    }
}

fn sanitize_update(changes: &PostUpdate) -> PostUpdate {
    PostUpdate {
        title: strip_all_html_opt(changes.title.as_deref()),
        content: changes.content.as_deref().map(sanitize_markdown_content),
        post_type: changes.post_type,
        category: strip_all_html_opt(changes.category.as_deref()),
        tags: sanitize_tags(changes.tags.as_ref()),
        media_url: changes.media_url.clone(),
        thumbnail_url: changes.thumbnail_url.clone(),
        status: changes.status,
    }
}

// Loads the post and checks that the actor may change it.
fn owned_post(conn: &Connection, actor: &Actor, post_id: i64) -> ServiceResult<Post> {
    let post = posts_db_operations::read_post(conn, post_id)?;
    if let Err(e) = authorization_helpers::ensure_can_modify_post(actor, &post) {
        log::warn!("User {} denied modifying post {}: {}", actor.user_id, post_id, e);
        return Err(e.into());
    }
    Ok(post)
}

/// Public listing: published posts only, summary form.
pub fn list_published(pool: &DbPool, filter: &PostFilter) -> ServiceResult<Vec<PostView>> {
    let conn = get_conn(pool)?;
    let filter = PostFilter {
        status: Some(PostStatus::Published),
        limit: filter.limit.clamp(1, MAX_PAGE_SIZE),
        ..filter.clone()
    };
    Ok(posts_db_operations::list_post_views(&conn, &filter, false)?)
}

/// Everything the actor has written, drafts included.
pub fn list_own_posts(pool: &DbPool, user_id: i64, limit: u32, offset: u32) -> ServiceResult<Vec<PostView>> {
    let conn = get_conn(pool)?;
    let actor = resolve_actor(&conn, user_id)?;
    let filter = PostFilter {
        author_id: Some(actor.user_id),
        limit: limit.clamp(1, MAX_PAGE_SIZE),
        offset,
        ..PostFilter::default()
    };
    Ok(posts_db_operations::list_post_views(&conn, &filter, false)?)
}

pub fn get_post(pool: &DbPool, viewer_id: Option<i64>, post_id: i64) -> ServiceResult<PostView> {
    let conn = get_conn(pool)?;
    let viewer = resolve_viewer(&conn, viewer_id)?;
    let post = posts_db_operations::read_post(&conn, post_id)?;
    authorization_helpers::ensure_can_view_post(viewer.as_ref(), &post)?;
    Ok(posts_db_operations::read_post_view(&conn, post_id, true)?)
}

pub fn create_post(pool: &DbPool, user_id: i64, new_post: &NewPost) -> ServiceResult<PostView> {
    let mut conn = get_conn(pool)?;
    let actor = resolve_actor(&conn, user_id)?;
    if let Err(e) = authorization_helpers::require_author_role(&actor) {
        log::warn!("User {} ({}) denied creating a post", actor.user_id, actor.role);
        return Err(e.into());
    }

    let post = posts_db_operations::create_post(&mut conn, actor.user_id, &sanitize_new_post(new_post))?;
    log::info!("User {} created post {} ({})", actor.user_id, post.id, post.status);
    Ok(post.to_view(0, 0, true))
}

pub fn update_post(pool: &DbPool, user_id: i64, post_id: i64, changes: &PostUpdate) -> ServiceResult<PostView> {
    let mut conn = get_conn(pool)?;
    let actor = resolve_actor(&conn, user_id)?;
    owned_post(&conn, &actor, post_id)?;
    posts_db_operations::update_post(&mut conn, post_id, &sanitize_update(changes))?;
    Ok(posts_db_operations::read_post_view(&conn, post_id, true)?)
}

pub fn publish_post(pool: &DbPool, user_id: i64, post_id: i64) -> ServiceResult<PostView> {
    let mut conn = get_conn(pool)?;
    let actor = resolve_actor(&conn, user_id)?;
    owned_post(&conn, &actor, post_id)?;
    let post = posts_db_operations::publish_post(&mut conn, post_id)?;
    log::info!("User {} published post {}", actor.user_id, post.id);
    Ok(posts_db_operations::read_post_view(&conn, post_id, true)?)
}

pub fn unpublish_post(pool: &DbPool, user_id: i64, post_id: i64) -> ServiceResult<PostView> {
    let mut conn = get_conn(pool)?;
    let actor = resolve_actor(&conn, user_id)?;
    owned_post(&conn, &actor, post_id)?;
    posts_db_operations::unpublish_post(&mut conn, post_id)?;
    log::info!("User {} unpublished post {}", actor.user_id, post_id);
    Ok(posts_db_operations::read_post_view(&conn, post_id, true)?)
}

pub fn delete_post(pool: &DbPool, user_id: i64, post_id: i64) -> ServiceResult<()> {
    let mut conn = get_conn(pool)?;
    let actor = resolve_actor(&conn, user_id)?;
    owned_post(&conn, &actor, post_id)?;
    posts_db_operations::delete_post(&mut conn, post_id)?;
    log::info!("User {} deleted post {}", actor.user_id, post_id);
    Ok(())
}
