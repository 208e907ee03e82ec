use crate::models::db_operations::{is_unique_violation, required_text, DbError};
use crate::models::{NewUser, Role, User};
use bcrypt::{hash, verify};
use rusqlite::{params, Connection, OptionalExtension, Row};

#[cfg(not(test))]
const HASH_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const HASH_COST: u32 = 4;

const USER_COLUMNS: &str = "id, username, email, password_hash, role, is_active";

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role: row.get(4)?,
        is_active: row.get(5)?,
    })
}

fn validate_email(email: &str) -> Result<String, DbError> {
    let email = required_text("email", email, 120)?;
    let well_formed = email
        .split_once('@')
        .map_or(false, |(local, domain)| !local.is_empty() && domain.contains('.') && !email.contains(char::is_whitespace));
    if !well_formed {
        return Err(DbError::Validation(format!("'{}' is not a valid email address", email)));
    }
    Ok(email)
}

/// Usernames are stored exactly as typed at login, so markup characters and
/// whitespace are refused instead of being rewritten.
fn validate_username(username: &str) -> Result<String, DbError> {
    let username = required_text("username", username, 80)?;
    if let Some(bad) = username
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || matches!(c, '<' | '>' | '"' | '\''))
    {
        return Err(DbError::Validation(format!("username may not contain {:?}", bad)));
    }
    Ok(username)
}

/// Inserts a user with a bcrypt-hashed password. Duplicate username or email is a
/// validation failure and leaves no row behind.
pub fn create_user(conn: &mut Connection, new_user: &NewUser) -> Result<User, DbError> {
    let username = validate_username(&new_user.username)?;
    let email = validate_email(&new_user.email)?;
    if new_user.password.is_empty() {
        return Err(DbError::Validation("password must not be empty".to_string()));
    }

    let tx = conn.transaction()?;
    let taken: Option<String> = tx
        .query_row(
            "SELECT CASE WHEN username = ?1 THEN 'username' ELSE 'email' END
             FROM users WHERE username = ?1 OR email = ?2 LIMIT 1",
            params![username, email],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(field) = taken {
        return Err(DbError::Validation(format!("{} is already registered", field)));
    }

    let password_hash = hash(&new_user.password, HASH_COST)?;
    tx.execute(
        "INSERT INTO users (username, email, password_hash, role, is_active) VALUES (?1, ?2, ?3, ?4, 1)",
        params![username, email, password_hash, new_user.role],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            DbError::Validation("username or email is already registered".to_string())
        } else {
            e.into()
        }
    })?;
    let id = tx.last_insert_rowid();
    tx.commit()?;

    Ok(User {
        id,
        username,
        email,
        password_hash,
        role: new_user.role,
        is_active: true,
    })
}

pub fn read_user(conn: &Connection, user_id: i64) -> Result<User, DbError> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        [user_id],
        user_from_row,
    )
    .optional()?
    .ok_or_else(|| DbError::not_found("User", user_id))
}

pub fn read_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>, DbError> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
            [username],
            user_from_row,
        )
        .optional()?)
}

pub fn read_all_users(conn: &Connection) -> Result<Vec<User>, DbError> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))?;
    let users = stmt.query_map([], user_from_row)?.collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

pub fn read_users_by_role(conn: &Connection, role: Role) -> Result<Vec<User>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users WHERE role = ?1 ORDER BY username",
        USER_COLUMNS
    ))?;
    let users = stmt.query_map([role], user_from_row)?.collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

pub fn update_role(conn: &Connection, user_id: i64, role: Role) -> Result<User, DbError> {
    let changed = conn.execute("UPDATE users SET role = ?1 WHERE id = ?2", params![role, user_id])?;
    if changed == 0 {
        return Err(DbError::not_found("User", user_id));
    }
    read_user(conn, user_id)
}

pub fn set_active(conn: &Connection, user_id: i64, is_active: bool) -> Result<User, DbError> {
    let changed = conn.execute(
        "UPDATE users SET is_active = ?1 WHERE id = ?2",
        params![is_active, user_id],
    )?;
    if changed == 0 {
        return Err(DbError::not_found("User", user_id));
    }
    read_user(conn, user_id)
}

pub fn change_password(conn: &Connection, username: &str, new_password: &str) -> Result<(), DbError> {
    if new_password.is_empty() {
        return Err(DbError::Validation("password must not be empty".to_string()));
    }
    let hashed_password = hash(new_password, HASH_COST)?;
    let changed = conn.execute(
        "UPDATE users SET password_hash = ?1 WHERE username = ?2",
        params![hashed_password, username],
    )?;
    if changed == 0 {
        return Err(DbError::Validation(format!("no user named '{}'", username)));
    }
    Ok(())
}

/// Deletes a user that owns nothing. Users with posts, comments, likes or shares
/// must be deactivated instead.
pub fn delete_user(conn: &mut Connection, user_id: i64) -> Result<(), DbError> {
    let tx = conn.transaction()?;
    let exists: bool = tx.query_row("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)", [user_id], |row| row.get(0))?;
    if !exists {
        return Err(DbError::not_found("User", user_id));
    }

    let dependents: i64 = tx.query_row(
        "SELECT (SELECT COUNT(*) FROM posts WHERE author_id = ?1)
              + (SELECT COUNT(*) FROM comments WHERE author_id = ?1)
              + (SELECT COUNT(*) FROM likes WHERE user_id = ?1)
              + (SELECT COUNT(*) FROM shares WHERE user_id = ?1)",
        [user_id],
        |row| row.get(0),
    )?;
    if dependents > 0 {
        return Err(DbError::Conflict(format!(
            "user {} still owns {} posts, comments, likes or shares; deactivate the account instead",
            user_id, dependents
        )));
    }

    tx.execute("DELETE FROM users WHERE id = ?1", [user_id])?;
    tx.commit()?;
    Ok(())
}

/// Returns the user when the password matches and the account is active.
pub fn verify_credentials(conn: &Connection, username: &str, password: &str) -> Result<Option<User>, DbError> {
    let user = match read_user_by_username(conn, username)? {
        Some(user) => user,
        None => return Ok(None),
    };
    if user.is_active && verify(password, &user.password_hash).unwrap_or(false) {
        Ok(Some(user))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::test_support::{memory_db, post, user};

    fn new_user(name: &str, email: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            email: email.to_string(),
            password: "pw".to_string(),
            role: Role::NormalUser,
        }
    }

    #[test]
    fn created_user_is_retrievable_by_id() {
        let mut conn = memory_db();
        let created = create_user(&mut conn, &new_user("ada", "ada@example.com")).unwrap();
        let fetched = read_user(&conn, created.id).unwrap();
        assert_eq!(fetched.username, "ada");
        assert_eq!(fetched.email, "ada@example.com");
        assert_eq!(fetched.role, Role::NormalUser);
        assert!(fetched.is_active);
        assert_ne!(fetched.password_hash, "pw");
    }

    #[test]
    fn duplicate_username_is_rejected_without_a_row() {
        let mut conn = memory_db();
        create_user(&mut conn, &new_user("ada", "ada@example.com")).unwrap();
        let err = create_user(&mut conn, &new_user("ada", "other@example.com")).unwrap_err();
        assert!(matches!(err, DbError::Validation(ref m) if m.contains("username")));
        assert_eq!(read_all_users(&conn).unwrap().len(), 1);
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let mut conn = memory_db();
        create_user(&mut conn, &new_user("ada", "ada@example.com")).unwrap();
        let err = create_user(&mut conn, &new_user("grace", "ada@example.com")).unwrap_err();
        assert!(matches!(err, DbError::Validation(ref m) if m.contains("email")));
    }

    #[test]
    fn malformed_input_is_rejected() {
        let mut conn = memory_db();
        assert!(matches!(
            create_user(&mut conn, &new_user("  ", "a@example.com")),
            Err(DbError::Validation(_))
        ));
        assert!(matches!(
            create_user(&mut conn, &new_user("ada", "not-an-email")),
            Err(DbError::Validation(_))
        ));
        let long = "x".repeat(81);
        assert!(matches!(
            create_user(&mut conn, &new_user(&long, "a@example.com")),
            Err(DbError::Validation(_))
        ));
    }

    #[test]
    fn missing_user_is_not_found() {
        let conn = memory_db();
        assert!(matches!(read_user(&conn, 42), Err(DbError::NotFound { entity: "User", id: 42 })));
    }

    #[test]
    fn credentials_require_matching_password_and_active_account() {
        let mut conn = memory_db();
        let ada = user(&mut conn, "ada", Role::Journalist);
        assert!(verify_credentials(&conn, "ada", "correct horse").unwrap().is_some());
        assert!(verify_credentials(&conn, "ada", "wrong").unwrap().is_none());
        assert!(verify_credentials(&conn, "nobody", "correct horse").unwrap().is_none());

        set_active(&conn, ada.id, false).unwrap();
        assert!(verify_credentials(&conn, "ada", "correct horse").unwrap().is_none());
    }

    #[test]
    fn role_changes_persist() {
        let mut conn = memory_db();
        let ada = user(&mut conn, "ada", Role::NormalUser);
        let updated = update_role(&conn, ada.id, Role::Journalist).unwrap();
        assert_eq!(updated.role, Role::Journalist);
        assert_eq!(read_users_by_role(&conn, Role::Journalist).unwrap().len(), 1);
        assert!(matches!(update_role(&conn, 999, Role::Admin), Err(DbError::NotFound { .. })));
    }

    #[test]
    fn changed_password_verifies() {
        let mut conn = memory_db();
        user(&mut conn, "root", Role::Admin);
        change_password(&conn, "root", "new secret").unwrap();
        assert!(verify_credentials(&conn, "root", "new secret").unwrap().is_some());
        assert!(matches!(change_password(&conn, "ghost", "x"), Err(DbError::Validation(_))));
    }

    #[test]
    fn user_without_dependents_can_be_deleted() {
        let mut conn = memory_db();
        let ada = user(&mut conn, "ada", Role::NormalUser);
        delete_user(&mut conn, ada.id).unwrap();
        assert!(matches!(read_user(&conn, ada.id), Err(DbError::NotFound { .. })));
        assert!(matches!(delete_user(&mut conn, ada.id), Err(DbError::NotFound { .. })));
    }

    #[test]
    fn user_with_posts_cannot_be_deleted() {
        let mut conn = memory_db();
        let ada = user(&mut conn, "ada", Role::Journalist);
        post(&mut conn, ada.id, "Hello");
        let err = delete_user(&mut conn, ada.id).unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
        assert!(read_user(&conn, ada.id).is_ok());
    }
}
