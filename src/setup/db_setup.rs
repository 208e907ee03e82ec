use rusqlite::{Connection, Result as RusqliteResult};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-connection settings. SQLite leaves foreign keys off unless asked.
pub fn configure_connection(conn: &Connection) -> RusqliteResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")
}

/// Creates every table and index. Safe to run against an existing database.
pub fn setup_database(conn: &mut Connection) -> Result<(), SetupError> {
    configure_connection(conn)?;
    let tx = conn.transaction()?;

    log::debug!("Creating 'users' table");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'normal_user' CHECK(role IN ('normal_user', 'journalist', 'admin')),
            is_active INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;

    log::debug!("Creating 'posts' table");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            post_type TEXT NOT NULL DEFAULT 'article' CHECK(post_type IN ('article', 'video', 'photo')),
            category TEXT,
            tags TEXT,
            media_url TEXT,
            thumbnail_url TEXT,
            status TEXT NOT NULL DEFAULT 'draft' CHECK(status IN ('draft', 'published')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            published_at TEXT,
            author_id INTEGER NOT NULL,
            FOREIGN KEY (author_id) REFERENCES users(id)
        )",
        [],
    )?;

    // Replies reference their parent without a cascade; subtree deletes are explicit.
    log::debug!("Creating 'comments' table");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            post_id INTEGER NOT NULL,
            author_id INTEGER NOT NULL,
            parent_comment_id INTEGER,
            FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
            FOREIGN KEY (author_id) REFERENCES users(id),
            FOREIGN KEY (parent_comment_id) REFERENCES comments(id)
        )",
        [],
    )?;

    log::debug!("Creating 'likes' table");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS likes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            post_id INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id),
            FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
        )",
        [],
    )?;

    log::debug!("Creating 'shares' table");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS shares (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            platform TEXT,
            message TEXT,
            created_at TEXT NOT NULL,
            user_id INTEGER NOT NULL,
            post_id INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id),
            FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
        )",
        [],
    )?;

    tx.execute_batch(
        "CREATE UNIQUE INDEX IF NOT EXISTS uq_user_post_like ON likes(user_id, post_id);
         CREATE INDEX IF NOT EXISTS idx_likes_post ON likes(post_id);
         CREATE INDEX IF NOT EXISTS idx_shares_post ON shares(post_id);
         CREATE INDEX IF NOT EXISTS idx_shares_user ON shares(user_id);
         CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, created_at);
         CREATE INDEX IF NOT EXISTS idx_comments_parent ON comments(parent_comment_id);
         CREATE INDEX IF NOT EXISTS idx_comments_author ON comments(author_id);
         CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id);
         CREATE INDEX IF NOT EXISTS idx_posts_status_created ON posts(status, created_at);",
    )?;

    tx.commit()?;
    Ok(())
}
