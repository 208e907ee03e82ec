use crate::helper::{admin_helpers, ServiceError};
use crate::middleware::AuthenticatedUser;
use crate::models::Role;
use crate::routes::public::ListQuery;
use crate::DbPool;
use actix_web::{web, HttpResponse};
use serde::Deserialize;

#[derive(Deserialize)]
struct RoleRequest {
    role: Role,
}

#[derive(Deserialize)]
struct ActiveRequest {
    is_active: bool,
}

/// Mounted under `/api/admin` behind the session admin guard.
pub fn config_admin(cfg: &mut web::ServiceConfig) {
    cfg.route("/users", web::get().to(list_users))
        .route("/users/{id}/role", web::put().to(change_role))
        .route("/users/{id}/active", web::put().to(set_active))
        .route("/users/{id}", web::delete().to(delete_user))
        .route("/posts", web::get().to(list_posts))
        .route("/posts/{id}", web::delete().to(delete_post))
        .route("/comments/{id}", web::delete().to(delete_comment));
}

async fn list_users(pool: web::Data<DbPool>, auth_user: AuthenticatedUser) -> Result<HttpResponse, ServiceError> {
    let users = admin_helpers::list_users(&pool, auth_user.user_id)?;
    Ok(HttpResponse::Ok().json(users))
}

async fn change_role(
    pool: web::Data<DbPool>,
    auth_user: AuthenticatedUser,
    path: web::Path<i64>,
    body: web::Json<RoleRequest>,
) -> Result<HttpResponse, ServiceError> {
    let user = admin_helpers::change_role(&pool, auth_user.user_id, path.into_inner(), body.role)?;
    Ok(HttpResponse::Ok().json(user))
}

async fn set_active(
    pool: web::Data<DbPool>,
    auth_user: AuthenticatedUser,
    path: web::Path<i64>,
    body: web::Json<ActiveRequest>,
) -> Result<HttpResponse, ServiceError> {
    let user = admin_helpers::set_user_active(&pool, auth_user.user_id, path.into_inner(), body.is_active)?;
    Ok(HttpResponse::Ok().json(user))
}

async fn delete_user(
    pool: web::Data<DbPool>,
    auth_user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, ServiceError> {
    admin_helpers::delete_user(&pool, auth_user.user_id, path.into_inner())?;
    Ok(HttpResponse::NoContent().finish())
}

async fn list_posts(
    pool: web::Data<DbPool>,
    auth_user: AuthenticatedUser,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ServiceError> {
    let posts = admin_helpers::list_posts(&pool, auth_user.user_id, &query.to_filter())?;
    Ok(HttpResponse::Ok().json(posts))
}

async fn delete_post(
    pool: web::Data<DbPool>,
    auth_user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, ServiceError> {
    admin_helpers::delete_post(&pool, auth_user.user_id, path.into_inner())?;
    Ok(HttpResponse::NoContent().finish())
}

async fn delete_comment(
    pool: web::Data<DbPool>,
    auth_user: AuthenticatedUser,
    path: web::Path<i64>,
) -> Result<HttpResponse, ServiceError> {
    let removed = admin_helpers::delete_comment(&pool, auth_user.user_id, path.into_inner())?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "deleted": removed })))
}
