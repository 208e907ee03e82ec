use crate::helper::ServiceError;
use crate::middleware::admin_guard;
use crate::models::db_operations::DbError;
use actix_session::SessionExt;
use actix_web::error::InternalError;
use actix_web::http::StatusCode;
use actix_web::{guard, web, HttpResponse, ResponseError};
use serde::Serialize;

pub mod admin;
pub mod auth;
pub mod posts;
pub mod public;

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// The whole JSON API under `/api`. Expects a session middleware around it.
pub fn config_api(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default().error_handler(|err, _req| {
        let body = ErrorBody { error: err.to_string() };
        InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
    });

    cfg.service(
        web::scope("/api")
            .app_data(json_config)
            .service(
                web::scope("/admin")
                    .guard(guard::fn_guard(|ctx| admin_guard(&ctx.get_session())))
                    .configure(admin::config_admin),
            )
            .configure(auth::config_auth)
            .configure(posts::config_authoring)
            .configure(public::config_public),
    );
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Db(DbError::Validation(_)) | ServiceError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            ServiceError::Db(DbError::NotFound { .. } | DbError::NotLiked { .. }) => StatusCode::NOT_FOUND,
            ServiceError::Db(DbError::Conflict(_)) => StatusCode::CONFLICT,
            ServiceError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ServiceError::Authorization(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("Request failed: {}", self);
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        HttpResponse::build(status).json(ErrorBody { error: message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::authorization_helpers::AuthorizationError;

    #[test]
    fn errors_map_to_http_statuses() {
        let cases = [
            (ServiceError::Db(DbError::Validation("bad".into())), 400),
            (ServiceError::Db(DbError::not_found("Post", 1)), 404),
            (ServiceError::Db(DbError::NotLiked { user_id: 1, post_id: 2 }), 404),
            (ServiceError::Db(DbError::Conflict("dup".into())), 409),
            (ServiceError::Unauthenticated, 401),
            (ServiceError::Authorization(AuthorizationError::NotOwner), 403),
            (ServiceError::InvalidUpload("too big".into()), 400),
            (ServiceError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk")), 500),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code().as_u16(), status, "{}", err);
        }
    }

    #[actix_web::test]
    async fn internal_errors_hide_details() {
        let err = ServiceError::Io(std::io::Error::new(std::io::ErrorKind::Other, "/secret/path"));
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        assert_eq!(&body[..], br#"{"error":"internal server error"}"#);
    }
}
