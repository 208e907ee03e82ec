use crate::config::Config;
use crate::helper::{engagement_helpers, media_helpers, post_helpers, ServiceError};
use crate::middleware::AuthenticatedUser;
use crate::models::{NewPost, NewShare, PostUpdate};
use crate::DbPool;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use serde::Deserialize;

#[derive(Deserialize)]
struct PaginationQuery {
    limit: Option<u32>,
    offset: Option<u32>,
}

#[derive(Deserialize)]
struct NewCommentRequest {
    content: String,
    parent_comment_id: Option<i64>,
}

#[derive(Deserialize)]
struct CommentEditRequest {
    content: String,
}

/// Everything that needs a logged-in user.
pub fn config_authoring(cfg: &mut web::ServiceConfig) {
    cfg.route("/posts", web::post().to(create_post))
        .route("/posts/mine", web::get().to(my_posts))
        .route("/posts/{id}", web::put().to(update_post))
        .route("/posts/{id}", web::delete().to(delete_post))
        .route("/posts/{id}/publish", web::post().to(publish_post))
        .route("/posts/{id}/unpublish", web::post().to(unpublish_post))
        .route("/posts/{id}/comments", web::post().to(add_comment))
        .route("/posts/{id}/like", web::post().to(like_post))
        .route("/posts/{id}/like", web::delete().to(unlike_post))
        .route("/posts/{id}/share", web::post().to(share_post))
        .route("/comments/{id}", web::put().to(edit_comment))
        .route("/comments/{id}", web::delete().to(delete_comment))
        .route("/media", web::post().to(upload_media));
}

async fn create_post(
    pool: web::Data<DbPool>,
    auth_user: AuthenticatedUser,
    body: web::Json<NewPost>,
) -> Result<HttpResponse, ServiceError> {
    let post = post_helpers::create_post(&pool, auth_user.user_id, &body)?;
    Ok(HttpResponse::Created().json(post))
}

async fn my_posts(
    pool: web::Data<DbPool>,
    auth_user: AuthenticatedUser,
    query: web::Query<PaginationQuery>,
) -> Result<HttpResponse, ServiceError> {
    let posts = post_helpers::list_own_posts(
        &pool,
        auth_user.user_id,
        post_helpers::page_limit(query.limit),
        query.offset.unwrap_or(0),
    )?;
    Ok(HttpResponse::Ok().json(posts))
}

async fn update_post(
    pool: web::Data<DbPool>,
    auth_user: AuthenticatedUser,
    path: web::Path<i64>,
    body: web::Json<PostUpdate>,
) -> Result<HttpResponse, ServiceError> {
    let post = post_helpers::update_post(&pool, auth_user.user_id, path.into_inner(), &body)?;
    Ok(HttpResponse::Ok().json(post))
}

async fn delete_post(
    pool: web::Data<DbPool>,
    auth_user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, ServiceError> {
    post_helpers::delete_post(&pool, auth_user.user_id, path.into_inner())?;
    Ok(HttpResponse::NoContent().finish())
}

async fn publish_post(
    pool: web::Data<DbPool>,
    auth_user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, ServiceError> {
    let post = post_helpers::publish_post(&pool, auth_user.user_id, path.into_inner())?;
    Ok(HttpResponse::Ok().json(post))
}

async fn unpublish_post(
    pool: web::Data<DbPool>,
    auth_user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, ServiceError> {
    let post = post_helpers::unpublish_post(&pool, auth_user.user_id, path.into_inner())?;
    Ok(HttpResponse::Ok().json(post))
}

async fn add_comment(
    pool: web::Data<DbPool>,
    auth_user: AuthenticatedUser,
    path: web::Path<i64>,
    body: web::Json<NewCommentRequest>,
) -> Result<HttpResponse, ServiceError> {
    let comment = engagement_helpers::add_comment(
        &pool,
        auth_user.user_id,
        path.into_inner(),
        &body.content,
        body.parent_comment_id,
    )?;
    Ok(HttpResponse::Created().json(comment))
}

async fn edit_comment(
    pool: web::Data<DbPool>,
    auth_user: AuthenticatedUser,
    path: web::Path<i64>,
    body: web::Json<CommentEditRequest>,
) -> Result<HttpResponse, ServiceError> {
    let comment = engagement_helpers::edit_comment(&pool, auth_user.user_id, path.into_inner(), &body.content)?;
    Ok(HttpResponse::Ok().json(comment))
}

async fn delete_comment(
    pool: web::Data<DbPool>,
    auth_user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, ServiceError> {
    let removed = engagement_helpers::delete_comment(&pool, auth_user.user_id, path.into_inner())?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "deleted": removed })))
}

async fn like_post(
    pool: web::Data<DbPool>,
    auth_user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, ServiceError> {
    let like = engagement_helpers::like_post(&pool, auth_user.user_id, path.into_inner())?;
    Ok(HttpResponse::Created().json(like))
}

async fn unlike_post(
    pool: web::Data<DbPool>,
    auth_user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, ServiceError> {
    engagement_helpers::unlike_post(&pool, auth_user.user_id, path.into_inner())?;
    Ok(HttpResponse::NoContent().finish())
}

async fn share_post(
    pool: web::Data<DbPool>,
    auth_user: AuthenticatedUser,
    path: web::Path<i64>,
    body: Option<web::Json<NewShare>>,
) -> Result<HttpResponse, ServiceError> {
    let share = body.map(|b| b.into_inner()).unwrap_or_default();
    let share = engagement_helpers::share_post(&pool, auth_user.user_id, path.into_inner(), &share)?;
    Ok(HttpResponse::Created().json(share))
}

async fn upload_media(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    auth_user: AuthenticatedUser,
    payload: Multipart,
) -> Result<HttpResponse, ServiceError> {
    let upload = media_helpers::save_media(&pool, &config, auth_user.user_id, payload).await?;
    Ok(HttpResponse::Created().json(upload))
}
