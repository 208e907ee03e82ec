use crate::models::db_operations::{row_exists, DbError};
use crate::models::{build_comment_tree, Comment, CommentNode};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

const COMMENT_COLUMNS: &str = "id, content, created_at, updated_at, post_id, author_id, parent_comment_id";
const MAX_COMMENT_LEN: usize = 5000;

fn comment_from_row(row: &Row) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        content: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
        post_id: row.get(4)?,
        author_id: row.get(5)?,
        parent_comment_id: row.get(6)?,
    })
}

fn validate_content(content: &str) -> Result<(), DbError> {
    if content.trim().is_empty() {
        return Err(DbError::Validation("comment must not be empty".to_string()));
    }
    if content.chars().count() > MAX_COMMENT_LEN {
        return Err(DbError::Validation(format!("comment cannot exceed {} characters", MAX_COMMENT_LEN)));
    }
    Ok(())
}

/// Adds a comment, optionally as a reply. The parent must exist and belong to the same post.
pub fn create_comment(
    conn: &mut Connection,
    post_id: i64,
    author_id: i64,
    content: &str,
    parent_comment_id: Option<i64>,
) -> Result<Comment, DbError> {
    validate_content(content)?;

    let tx = conn.transaction()?;
    if !row_exists(&tx, "posts", post_id)? {
        return Err(DbError::not_found("Post", post_id));
    }
    if !row_exists(&tx, "users", author_id)? {
        return Err(DbError::not_found("User", author_id));
    }
    if let Some(parent_id) = parent_comment_id {
        let parent_post: i64 = tx
            .query_row("SELECT post_id FROM comments WHERE id = ?1", [parent_id], |row| row.get(0))
            .optional()?
            .ok_or_else(|| DbError::not_found("Comment", parent_id))?;
        if parent_post != post_id {
            return Err(DbError::Validation(format!(
                "parent comment {} belongs to post {}, not post {}",
                parent_id, parent_post, post_id
            )));
        }
    }

    let now = Utc::now();
    tx.execute(
        "INSERT INTO comments (content, created_at, updated_at, post_id, author_id, parent_comment_id)
         VALUES (?1, ?2, ?2, ?3, ?4, ?5)",
        params![content, now, post_id, author_id, parent_comment_id],
    )?;
    let id = tx.last_insert_rowid();
    let comment = read_comment(&tx, id)?;
    tx.commit()?;
    Ok(comment)
}

pub fn read_comment(conn: &Connection, comment_id: i64) -> Result<Comment, DbError> {
    conn.query_row(
        &format!("SELECT {} FROM comments WHERE id = ?1", COMMENT_COLUMNS),
        [comment_id],
        comment_from_row,
    )
    .optional()?
    .ok_or_else(|| DbError::not_found("Comment", comment_id))
}

/// All comments of a post in creation order.
pub fn read_comments_for_post(conn: &Connection, post_id: i64) -> Result<Vec<Comment>, DbError> {
    if !row_exists(conn, "posts", post_id)? {
        return Err(DbError::not_found("Post", post_id));
    }
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM comments WHERE post_id = ?1 ORDER BY created_at, id",
        COMMENT_COLUMNS
    ))?;
    let comments = stmt.query_map([post_id], comment_from_row)?.collect::<Result<Vec<_>, _>>()?;
    Ok(comments)
}

pub fn read_comment_thread(conn: &Connection, post_id: i64) -> Result<Vec<CommentNode>, DbError> {
    Ok(build_comment_tree(read_comments_for_post(conn, post_id)?))
}

pub fn read_replies(conn: &Connection, comment_id: i64) -> Result<Vec<Comment>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM comments WHERE parent_comment_id = ?1 ORDER BY created_at, id",
        COMMENT_COLUMNS
    ))?;
    let replies = stmt.query_map([comment_id], comment_from_row)?.collect::<Result<Vec<_>, _>>()?;
    Ok(replies)
}

pub fn update_comment(conn: &Connection, comment_id: i64, content: &str) -> Result<Comment, DbError> {
    validate_content(content)?;
    let changed = conn.execute(
        "UPDATE comments SET content = ?1, updated_at = ?2 WHERE id = ?3",
        params![content, Utc::now(), comment_id],
    )?;
    if changed == 0 {
        return Err(DbError::not_found("Comment", comment_id));
    }
    read_comment(conn, comment_id)
}

/// Deletes a comment and every reply beneath it. Returns how many rows went.
pub fn delete_comment(conn: &mut Connection, comment_id: i64) -> Result<usize, DbError> {
    let tx = conn.transaction()?;
    if !row_exists(&tx, "comments", comment_id)? {
        return Err(DbError::not_found("Comment", comment_id));
    }
    let removed = tx.execute(
        "WITH RECURSIVE subtree(id) AS (
             SELECT ?1
             UNION ALL
             SELECT c.id FROM comments c JOIN subtree s ON c.parent_comment_id = s.id
         )
         DELETE FROM comments WHERE id IN (SELECT id FROM subtree)",
        [comment_id],
    )?;
    tx.commit()?;
    Ok(removed)
}
