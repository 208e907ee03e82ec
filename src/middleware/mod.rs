use actix_session::{Session, SessionExt};
use actix_web::{dev, FromRequest, HttpRequest};
use serde::Serialize;
use std::future::{ready, Ready};

use crate::helper::ServiceError;
use crate::models::Role;

pub const SESSION_USER_ID: &str = "user_id";
pub const SESSION_ROLE: &str = "role";

/// The user id and role stored in the session cookie at login.
///
/// The role here is only a hint for route guards; helpers reload the user from the
/// database before making any authorization decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub role: Role,
}

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let session = req.get_session();
        match session_user(&session) {
            Some(user) => ready(Ok(user)),
            None => ready(Err(ServiceError::Unauthenticated.into())),
        }
    }
}

fn session_user(session: &Session) -> Option<AuthenticatedUser> {
    let user_id = session.get::<i64>(SESSION_USER_ID).ok().flatten()?;
    let role = session
        .get::<String>(SESSION_ROLE)
        .ok()
        .flatten()
        .and_then(|r| r.parse::<Role>().ok())?;
    Some(AuthenticatedUser { user_id, role })
}

pub fn admin_guard(session: &Session) -> bool {
    matches!(session_user(session), Some(AuthenticatedUser { role: Role::Admin, .. }))
}
