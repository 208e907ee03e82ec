use crate::models::db_operations::{is_unique_violation, optional_text, row_exists, DbError};
use crate::models::{Like, NewShare, Share};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

fn ensure_user_and_post(conn: &Connection, user_id: i64, post_id: i64) -> Result<(), DbError> {
    if !row_exists(conn, "users", user_id)? {
        return Err(DbError::not_found("User", user_id));
    }
    if !row_exists(conn, "posts", post_id)? {
        return Err(DbError::not_found("Post", post_id));
    }
    Ok(())
}

/// One like per (user, post). A repeat, including one that loses a race, is a conflict.
pub fn like_post(conn: &mut Connection, user_id: i64, post_id: i64) -> Result<Like, DbError> {
    let tx = conn.transaction()?;
    ensure_user_and_post(&tx, user_id, post_id)?;

    let already: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM likes WHERE user_id = ?1 AND post_id = ?2)",
        params![user_id, post_id],
        |row| row.get(0),
    )?;
    if already {
        return Err(DbError::Conflict(format!("user {} already likes post {}", user_id, post_id)));
    }

    tx.execute(
        "INSERT INTO likes (user_id, post_id) VALUES (?1, ?2)",
        params![user_id, post_id],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            DbError::Conflict(format!("user {} already likes post {}", user_id, post_id))
        } else {
            e.into()
        }
    })?;
    let like = Like {
        id: tx.last_insert_rowid(),
        user_id,
        post_id,
    };
    tx.commit()?;
    Ok(like)
}

pub fn unlike_post(conn: &Connection, user_id: i64, post_id: i64) -> Result<(), DbError> {
    let removed = conn.execute(
        "DELETE FROM likes WHERE user_id = ?1 AND post_id = ?2",
        params![user_id, post_id],
    )?;
    if removed == 0 {
        return Err(DbError::NotLiked { user_id, post_id });
    }
    Ok(())
}

pub fn read_like(conn: &Connection, user_id: i64, post_id: i64) -> Result<Option<Like>, DbError> {
    Ok(conn
        .query_row(
            "SELECT id, user_id, post_id FROM likes WHERE user_id = ?1 AND post_id = ?2",
            params![user_id, post_id],
            |row| {
                Ok(Like {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    post_id: row.get(2)?,
                })
            },
        )
        .optional()?)
}

pub fn share_post(conn: &mut Connection, user_id: i64, post_id: i64, share: &NewShare) -> Result<Share, DbError> {
    let platform = optional_text("platform", share.platform.as_deref(), 80)?;
    let message = optional_text("message", share.message.as_deref(), 255)?;

    let tx = conn.transaction()?;
    ensure_user_and_post(&tx, user_id, post_id)?;
    let created_at = Utc::now();
    tx.execute(
        "INSERT INTO shares (platform, message, created_at, user_id, post_id) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![platform, message, created_at, user_id, post_id],
    )?;
    let share = Share {
        id: tx.last_insert_rowid(),
        platform,
        message,
        created_at,
        user_id,
        post_id,
    };
    tx.commit()?;
    Ok(share)
}

pub fn read_shares_for_post(conn: &Connection, post_id: i64) -> Result<Vec<Share>, DbError> {
    if !row_exists(conn, "posts", post_id)? {
        return Err(DbError::not_found("Post", post_id));
    }
    let mut stmt = conn.prepare(
        "SELECT id, platform, message, created_at, user_id, post_id FROM shares
         WHERE post_id = ?1 ORDER BY created_at DESC, id DESC",
    )?;
    let shares = stmt
        .query_map([post_id], |row| {
            Ok(Share {
                id: row.get(0)?,
                platform: row.get(1)?,
                message: row.get(2)?,
                created_at: row.get(3)?,
                user_id: row.get(4)?,
                post_id: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(shares)
}
