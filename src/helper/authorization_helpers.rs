use crate::models::{Comment, Post, Role, User};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("administrator privileges are required")]
    AdminRequired,
    #[error("this action requires one of the roles: {0}")]
    RoleRequired(&'static str),
    #[error("only the author or an administrator may do this")]
    NotOwner,
    #[error("this account is deactivated")]
    InactiveAccount,
    #[error("this post is not published")]
    DraftHidden,
}

/// The user behind a request, as currently stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub user_id: i64,
    pub role: Role,
}

impl Actor {
    /// Deactivated accounts never become actors.
    pub fn from_user(user: &User) -> Result<Self, AuthorizationError> {
        if !user.is_active {
            return Err(AuthorizationError::InactiveAccount);
        }
        Ok(Actor {
            user_id: user.id,
            role: user.role,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

pub fn require_admin(actor: &Actor) -> Result<(), AuthorizationError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(AuthorizationError::AdminRequired)
    }
}

/// Writing posts and uploading media.
pub fn require_author_role(actor: &Actor) -> Result<(), AuthorizationError> {
    match actor.role {
        Role::Journalist | Role::Admin => Ok(()),
        Role::NormalUser => Err(AuthorizationError::RoleRequired("journalist, admin")),
    }
}

pub fn ensure_can_modify_post(actor: &Actor, post: &Post) -> Result<(), AuthorizationError> {
    if actor.is_admin() || post.author_id == actor.user_id {
        Ok(())
    } else {
        Err(AuthorizationError::NotOwner)
    }
}

pub fn ensure_can_modify_comment(actor: &Actor, comment: &Comment) -> Result<(), AuthorizationError> {
    if actor.is_admin() || comment.author_id == actor.user_id {
        Ok(())
    } else {
        Err(AuthorizationError::NotOwner)
    }
}

/// Published posts are public. Drafts are visible to their author and to admins.
pub fn ensure_can_view_post(actor: Option<&Actor>, post: &Post) -> Result<(), AuthorizationError> {
    if post.is_published() {
        return Ok(());
    }
    match actor {
        Some(a) if a.is_admin() || a.user_id == post.author_id => Ok(()),
        _ => Err(AuthorizationError::DraftHidden),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PostStatus, PostType};
    use chrono::Utc;

    fn actor(user_id: i64, role: Role) -> Actor {
        Actor { user_id, role }
    }

    fn post_by(author_id: i64, status: PostStatus) -> Post {
        let now = Utc::now();
        Post {
            id: 1,
            title: "t".into(),
            content: "c".into(),
            post_type: PostType::Article,
            category: None,
            tags: None,
            media_url: None,
            thumbnail_url: None,
            status,
            created_at: now,
            updated_at: now,
            published_at: None,
            author_id,
        }
    }

    fn comment_by(author_id: i64) -> Comment {
        let now = Utc::now();
        Comment {
            id: 1,
            content: "c".into(),
            created_at: now,
            updated_at: now,
            post_id: 1,
            author_id,
            parent_comment_id: None,
        }
    }

    #[test]
    fn only_admins_pass_the_admin_check() {
        assert!(require_admin(&actor(1, Role::Admin)).is_ok());
        assert_eq!(require_admin(&actor(1, Role::Journalist)), Err(AuthorizationError::AdminRequired));
        assert_eq!(require_admin(&actor(1, Role::NormalUser)), Err(AuthorizationError::AdminRequired));
    }

    #[test]
    fn normal_users_cannot_author() {
        assert!(require_author_role(&actor(1, Role::Journalist)).is_ok());
        assert!(require_author_role(&actor(1, Role::Admin)).is_ok());
        assert!(matches!(
            require_author_role(&actor(1, Role::NormalUser)),
            Err(AuthorizationError::RoleRequired(_))
        ));
    }

    #[test]
    fn posts_are_modified_by_author_or_admin() {
        let post = post_by(10, PostStatus::Draft);
        assert!(ensure_can_modify_post(&actor(10, Role::Journalist), &post).is_ok());
        assert!(ensure_can_modify_post(&actor(99, Role::Admin), &post).is_ok());
        assert_eq!(
            ensure_can_modify_post(&actor(11, Role::Journalist), &post),
            Err(AuthorizationError::NotOwner)
        );
    }

    #[test]
    fn comments_are_modified_by_author_or_admin() {
        let comment = comment_by(5);
        assert!(ensure_can_modify_comment(&actor(5, Role::NormalUser), &comment).is_ok());
        assert!(ensure_can_modify_comment(&actor(6, Role::Admin), &comment).is_ok());
        assert_eq!(
            ensure_can_modify_comment(&actor(6, Role::Journalist), &comment),
            Err(AuthorizationError::NotOwner)
        );
    }

    #[test]
    fn drafts_are_hidden_from_everyone_but_author_and_admin() {
        let draft = post_by(10, PostStatus::Draft);
        assert_eq!(ensure_can_view_post(None, &draft), Err(AuthorizationError::DraftHidden));
        assert_eq!(
            ensure_can_view_post(Some(&actor(2, Role::Journalist)), &draft),
            Err(AuthorizationError::DraftHidden)
        );
        assert!(ensure_can_view_post(Some(&actor(10, Role::Journalist)), &draft).is_ok());
        assert!(ensure_can_view_post(Some(&actor(3, Role::Admin)), &draft).is_ok());

        let published = post_by(10, PostStatus::Published);
        assert!(ensure_can_view_post(None, &published).is_ok());
    }

    #[test]
    fn inactive_users_do_not_become_actors() {
        let mut user = User {
            id: 4,
            username: "sam".into(),
            email: "sam@example.com".into(),
            password_hash: String::new(),
            role: Role::Journalist,
            is_active: true,
        };
        assert_eq!(Actor::from_user(&user).unwrap(), actor(4, Role::Journalist));
        user.is_active = false;
        assert_eq!(Actor::from_user(&user), Err(AuthorizationError::InactiveAccount));
    }
}
