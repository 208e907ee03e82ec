use crate::helper::{account_helpers, ServiceError};
use crate::middleware::{AuthenticatedUser, SESSION_ROLE, SESSION_USER_ID};
use crate::models::NewUser;
use crate::routes::ErrorBody;
use crate::DbPool;
use actix_session::Session;
use actix_web::{web, Error, HttpResponse};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

pub fn config_auth(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/logout", web::post().to(logout))
            .route("/me", web::get().to(me)),
    );
}

async fn register(pool: web::Data<DbPool>, body: web::Json<NewUser>) -> Result<HttpResponse, ServiceError> {
    let user = account_helpers::register(&pool, &body)?;
    Ok(HttpResponse::Created().json(user))
}

async fn login(
    session: Session,
    pool: web::Data<DbPool>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, Error> {
    match account_helpers::login(&pool, &body.username, &body.password)? {
        Some(user) => {
            session.renew();
            session.insert(SESSION_USER_ID, user.id)?;
            session.insert(SESSION_ROLE, user.role.as_str())?;
            log::info!("User '{}' logged in", user.username);
            Ok(HttpResponse::Ok().json(user))
        }
        None => Ok(HttpResponse::Unauthorized().json(ErrorBody {
            error: "Invalid credentials or account deactivated.".to_string(),
        })),
    }
}

async fn logout(session: Session) -> HttpResponse {
    session.purge();
    HttpResponse::Ok().json(json!({ "message": "logged out" }))
}

async fn me(pool: web::Data<DbPool>, auth_user: AuthenticatedUser) -> Result<HttpResponse, ServiceError> {
    account_helpers::load_actor(&pool, auth_user.user_id)?;
    let user = account_helpers::current_user(&pool, auth_user.user_id)?;
    Ok(HttpResponse::Ok().json(user))
}
