use crate::helper::{engagement_helpers, post_helpers, ServiceError};
use crate::middleware::AuthenticatedUser;
use crate::models::{PostFilter, PostStatus, PostType};
use crate::DbPool;
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct ListQuery {
    limit: Option<u32>,
    offset: Option<u32>,
    status: Option<PostStatus>,
    category: Option<String>,
    tag: Option<String>,
    post_type: Option<PostType>,
    author_id: Option<i64>,
}

impl ListQuery {
    pub fn to_filter(&self) -> PostFilter {
        PostFilter {
            status: self.status,
            author_id: self.author_id,
            category: self.category.clone(),
            tag: self.tag.clone(),
            post_type: self.post_type,
            limit: post_helpers::page_limit(self.limit),
            offset: self.offset.unwrap_or(0),
        }
    }
}

/// Readable without logging in. Registered after the authoring routes so `/posts/mine`
/// is matched before `/posts/{id}`.
pub fn config_public(cfg: &mut web::ServiceConfig) {
    cfg.route("/is_server_active", web::get().to(is_server_active))
        .route("/posts", web::get().to(list_posts))
        .route("/posts/{id}", web::get().to(get_post))
        .route("/posts/{id}/comments", web::get().to(list_comments))
        .route("/posts/{id}/shares", web::get().to(list_shares));
}

async fn is_server_active() -> impl Responder {
    HttpResponse::Ok().body("active")
}

async fn list_posts(pool: web::Data<DbPool>, query: web::Query<ListQuery>) -> Result<HttpResponse, ServiceError> {
    let posts = post_helpers::list_published(&pool, &query.to_filter())?;
    Ok(HttpResponse::Ok().json(posts))
}

async fn get_post(
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
    viewer: Option<AuthenticatedUser>,
) -> Result<HttpResponse, ServiceError> {
    let post = post_helpers::get_post(&pool, viewer.map(|v| v.user_id), path.into_inner())?;
    Ok(HttpResponse::Ok().json(post))
}

async fn list_comments(
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
    viewer: Option<AuthenticatedUser>,
) -> Result<HttpResponse, ServiceError> {
    let tree = engagement_helpers::list_comments(&pool, viewer.map(|v| v.user_id), path.into_inner())?;
    Ok(HttpResponse::Ok().json(tree))
}

async fn list_shares(
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
    viewer: Option<AuthenticatedUser>,
) -> Result<HttpResponse, ServiceError> {
    let shares = engagement_helpers::list_shares(&pool, viewer.map(|v| v.user_id), path.into_inner())?;
    Ok(HttpResponse::Ok().json(shares))
}
