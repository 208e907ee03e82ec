use crate::models::db_operations::{optional_text, required_text, row_exists, DbError};
use crate::models::{NewPost, Post, PostFilter, PostStatus, PostUpdate, PostView};
use chrono::Utc;
use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const POST_COLUMNS: &str = "p.id, p.title, p.content, p.post_type, p.category, p.tags, p.media_url, \
     p.thumbnail_url, p.status, p.created_at, p.updated_at, p.published_at, p.author_id";

const COUNT_COLUMNS: &str = "(SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS likes_count, \
     (SELECT COUNT(*) FROM shares s WHERE s.post_id = p.id) AS shares_count";

fn post_from_row(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        post_type: row.get(3)?,
        category: row.get(4)?,
        tags: row.get(5)?,
        media_url: row.get(6)?,
        thumbnail_url: row.get(7)?,
        status: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
        published_at: row.get(11)?,
        author_id: row.get(12)?,
    })
}

fn counted_post_from_row(row: &Row) -> rusqlite::Result<(Post, i64, i64)> {
    Ok((post_from_row(row)?, row.get(13)?, row.get(14)?))
}

/// Trims, drops empties and de-duplicates tags, then joins them for storage.
pub fn normalize_tags(tags: &[String]) -> Result<Option<String>, DbError> {
    let mut cleaned: Vec<String> = Vec::new();
    for tag in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if tag.contains(',') {
            return Err(DbError::Validation(format!("tag '{}' must not contain a comma", tag)));
        }
        if !cleaned.iter().any(|t| t == tag) {
            cleaned.push(tag.to_string());
        }
    }
    if cleaned.is_empty() {
        return Ok(None);
    }
    let joined = cleaned.join(",");
    if joined.chars().count() > 255 {
        return Err(DbError::Validation("tags cannot exceed 255 characters in total".to_string()));
    }
    Ok(Some(joined))
}

pub fn create_post(conn: &mut Connection, author_id: i64, new_post: &NewPost) -> Result<Post, DbError> {
    let title = required_text("title", &new_post.title, 255)?;
    if new_post.content.trim().is_empty() {
        return Err(DbError::Validation("content must not be empty".to_string()));
    }
    let category = optional_text("category", new_post.category.as_deref(), 80)?;
    let tags = normalize_tags(new_post.tags.as_deref().unwrap_or_default())?;
    let media_url = optional_text("media_url", new_post.media_url.as_deref(), 255)?;
    let thumbnail_url = optional_text("thumbnail_url", new_post.thumbnail_url.as_deref(), 255)?;

    let tx = conn.transaction()?;
    if !row_exists(&tx, "users", author_id)? {
        return Err(DbError::not_found("User", author_id));
    }

    let now = Utc::now();
    let published_at = (new_post.status == PostStatus::Published).then_some(now);
    tx.execute(
        "INSERT INTO posts (title, content, post_type, category, tags, media_url, thumbnail_url,
                            status, created_at, updated_at, published_at, author_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9, ?10, ?11)",
        params![
            title,
            new_post.content,
            new_post.post_type,
            category,
            tags,
            media_url,
            thumbnail_url,
            new_post.status,
            now,
            published_at,
            author_id
        ],
    )?;
    let id = tx.last_insert_rowid();
    let post = read_post(&tx, id)?;
    tx.commit()?;
    Ok(post)
}

pub fn read_post(conn: &Connection, post_id: i64) -> Result<Post, DbError> {
    conn.query_row(
        &format!("SELECT {} FROM posts p WHERE p.id = ?1", POST_COLUMNS),
        [post_id],
        post_from_row,
    )
    .optional()?
    .ok_or_else(|| DbError::not_found("Post", post_id))
}

pub fn count_likes(conn: &Connection, post_id: i64) -> Result<i64, DbError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM likes WHERE post_id = ?1", [post_id], |row| row.get(0))?)
}

pub fn count_shares(conn: &Connection, post_id: i64) -> Result<i64, DbError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM shares WHERE post_id = ?1", [post_id], |row| row.get(0))?)
}

/// Transfer representation with counts taken from the current like/share rows.
pub fn read_post_view(conn: &Connection, post_id: i64, include_content: bool) -> Result<PostView, DbError> {
    let (post, likes, shares) = conn
        .query_row(
            &format!("SELECT {}, {} FROM posts p WHERE p.id = ?1", POST_COLUMNS, COUNT_COLUMNS),
            [post_id],
            counted_post_from_row,
        )
        .optional()?
        .ok_or_else(|| DbError::not_found("Post", post_id))?;
    Ok(post.to_view(likes, shares, include_content))
}

/// Newest first. Tag matching is exact against the stored comma-separated list.
pub fn list_post_views(conn: &Connection, filter: &PostFilter, include_content: bool) -> Result<Vec<PostView>, DbError> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(status) = filter.status {
        clauses.push("p.status = ?");
        values.push(Box::new(status));
    }
    if let Some(author_id) = filter.author_id {
        clauses.push("p.author_id = ?");
        values.push(Box::new(author_id));
    }
    if let Some(category) = filter.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        clauses.push("p.category = ?");
        values.push(Box::new(category.to_string()));
    }
    if let Some(tag) = filter.tag.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        clauses.push("instr(',' || IFNULL(p.tags, '') || ',', ',' || ? || ',') > 0");
        values.push(Box::new(tag.to_string()));
    }
    if let Some(post_type) = filter.post_type {
        clauses.push("p.post_type = ?");
        values.push(Box::new(post_type));
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let sql = format!(
        "SELECT {}, {} FROM posts p {} ORDER BY p.created_at DESC, p.id DESC LIMIT ? OFFSET ?",
        POST_COLUMNS, COUNT_COLUMNS, where_sql
    );
    values.push(Box::new(i64::from(filter.limit)));
    values.push(Box::new(i64::from(filter.offset)));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), counted_post_from_row)?;
    let mut views = Vec::new();
    for row in rows {
        let (post, likes, shares) = row?;
        views.push(post.to_view(likes, shares, include_content));
    }
    Ok(views)
}

pub fn update_post(conn: &mut Connection, post_id: i64, changes: &PostUpdate) -> Result<Post, DbError> {
    let tx = conn.transaction()?;
    let mut post = read_post(&tx, post_id)?;

    if let Some(title) = &changes.title {
        post.title = required_text("title", title, 255)?;
    }
    if let Some(content) = &changes.content {
        if content.trim().is_empty() {
            return Err(DbError::Validation("content must not be empty".to_string()));
        }
        post.content = content.clone();
    }
    if let Some(post_type) = changes.post_type {
        post.post_type = post_type;
    }
    if changes.category.is_some() {
        post.category = optional_text("category", changes.category.as_deref(), 80)?;
    }
    if let Some(tags) = &changes.tags {
        post.tags = normalize_tags(tags)?;
    }
    if changes.media_url.is_some() {
        post.media_url = optional_text("media_url", changes.media_url.as_deref(), 255)?;
    }
    if changes.thumbnail_url.is_some() {
        post.thumbnail_url = optional_text("thumbnail_url", changes.thumbnail_url.as_deref(), 255)?;
    }

    let now = Utc::now();
    if let Some(status) = changes.status {
        apply_status(&mut post, status, now);
    }
    post.updated_at = now;

    tx.execute(
        "UPDATE posts SET title = ?1, content = ?2, post_type = ?3, category = ?4, tags = ?5,
                          media_url = ?6, thumbnail_url = ?7, status = ?8, updated_at = ?9,
                          published_at = ?10
         WHERE id = ?11",
        params![
            post.title,
            post.content,
            post.post_type,
            post.category,
            post.tags,
            post.media_url,
            post.thumbnail_url,
            post.status,
            post.updated_at,
            post.published_at,
            post.id
        ],
    )?;
    tx.commit()?;
    Ok(post)
}

// published_at only moves on an actual status transition.
fn apply_status(post: &mut Post, status: PostStatus, now: chrono::DateTime<Utc>) {
    match (post.status, status) {
        (PostStatus::Draft, PostStatus::Published) => post.published_at = Some(now),
        (PostStatus::Published, PostStatus::Draft) => post.published_at = None,
        _ => {}
    }
    post.status = status;
}

pub fn publish_post(conn: &mut Connection, post_id: i64) -> Result<Post, DbError> {
    update_post(
        conn,
        post_id,
        &PostUpdate {
            status: Some(PostStatus::Published),
            ..PostUpdate::default()
        },
    )
}

pub fn unpublish_post(conn: &mut Connection, post_id: i64) -> Result<Post, DbError> {
    update_post(
        conn,
        post_id,
        &PostUpdate {
            status: Some(PostStatus::Draft),
            ..PostUpdate::default()
        },
    )
}

/// Deletes a post together with its comments, likes and shares, all or nothing.
pub fn delete_post(conn: &mut Connection, post_id: i64) -> Result<(), DbError> {
    let tx = conn.transaction()?;
    if !row_exists(&tx, "posts", post_id)? {
        return Err(DbError::not_found("Post", post_id));
    }
    tx.execute("DELETE FROM likes WHERE post_id = ?1", [post_id])?;
    tx.execute("DELETE FROM shares WHERE post_id = ?1", [post_id])?;
    tx.execute("DELETE FROM comments WHERE post_id = ?1", [post_id])?;
    tx.execute("DELETE FROM posts WHERE id = ?1", [post_id])?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::test_support::{memory_db, post, user};
    use crate::models::db_operations::{comments_db_operations, engagement_db_operations};
    use crate::models::{NewShare, PostType, Role};

    #[test]
    fn new_post_defaults_to_unpublished_draft() {
        let mut conn = memory_db();
        let u1 = user(&mut conn, "u1", Role::Journalist);
        let p1 = post(&mut conn, u1.id, "Draft");
        assert_eq!(p1.status, PostStatus::Draft);
        assert_eq!(p1.post_type, PostType::Article);
        assert!(p1.published_at.is_none());
        assert_eq!(p1.created_at, p1.updated_at);
    }

    #[test]
    fn publishing_a_draft_sets_published_at() {
        let mut conn = memory_db();
        let u1 = user(&mut conn, "u1", Role::Journalist);
        let p1 = post(&mut conn, u1.id, "Draft");

        let published = publish_post(&mut conn, p1.id).unwrap();
        assert_eq!(published.status, PostStatus::Published);
        let first_published_at = published.published_at.expect("published_at set");

        let stored = read_post(&conn, p1.id).unwrap();
        assert_eq!(stored.status, PostStatus::Published);
        assert_eq!(stored.published_at, Some(first_published_at));

        let again = publish_post(&mut conn, p1.id).unwrap();
        assert_eq!(again.published_at, Some(first_published_at));
    }

    #[test]
    fn unpublishing_clears_published_at() {
        let mut conn = memory_db();
        let u1 = user(&mut conn, "u1", Role::Journalist);
        let p1 = post(&mut conn, u1.id, "Draft");
        publish_post(&mut conn, p1.id).unwrap();
        let draft = unpublish_post(&mut conn, p1.id).unwrap();
        assert_eq!(draft.status, PostStatus::Draft);
        assert!(draft.published_at.is_none());
    }

    #[test]
    fn creating_as_published_sets_published_at() {
        let mut conn = memory_db();
        let u1 = user(&mut conn, "u1", Role::Journalist);
        let p = create_post(
            &mut conn,
            u1.id,
            &NewPost {
                title: "Live".into(),
                content: "now".into(),
                status: PostStatus::Published,
                ..NewPost::default()
            },
        )
        .unwrap();
        assert!(p.published_at.is_some());
    }

    #[test]
    fn unknown_author_is_rejected() {
        let mut conn = memory_db();
        let err = create_post(
            &mut conn,
            77,
            &NewPost {
                title: "Orphan".into(),
                content: "x".into(),
                ..NewPost::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, DbError::NotFound { entity: "User", id: 77 }));
    }

    #[test]
    fn blank_title_or_content_is_rejected() {
        let mut conn = memory_db();
        let u1 = user(&mut conn, "u1", Role::Journalist);
        let blank_title = NewPost { title: " ".into(), content: "x".into(), ..NewPost::default() };
        let blank_content = NewPost { title: "t".into(), content: "".into(), ..NewPost::default() };
        assert!(matches!(create_post(&mut conn, u1.id, &blank_title), Err(DbError::Validation(_))));
        assert!(matches!(create_post(&mut conn, u1.id, &blank_content), Err(DbError::Validation(_))));
    }

    #[test]
    fn tags_are_normalized_on_write() {
        let mut conn = memory_db();
        let u1 = user(&mut conn, "u1", Role::Journalist);
        let p = create_post(
            &mut conn,
            u1.id,
            &NewPost {
                title: "Tagged".into(),
                content: "x".into(),
                tags: Some(vec![" rust".into(), "".into(), "web ".into(), "rust".into()]),
                ..NewPost::default()
            },
        )
        .unwrap();
        assert_eq!(p.tags.as_deref(), Some("rust,web"));
        assert_eq!(p.tag_list(), vec!["rust".to_string(), "web".to_string()]);
        assert!(matches!(normalize_tags(&["a,b".to_string()]), Err(DbError::Validation(_))));
    }

    #[test]
    fn update_changes_fields_and_bumps_updated_at() {
        let mut conn = memory_db();
        let u1 = user(&mut conn, "u1", Role::Journalist);
        let p = create_post(
            &mut conn,
            u1.id,
            &NewPost {
                title: "Old".into(),
                content: "x".into(),
                category: Some("news".into()),
                ..NewPost::default()
            },
        )
        .unwrap();

        let updated = update_post(
            &mut conn,
            p.id,
            &PostUpdate {
                title: Some("New".into()),
                category: Some(String::new()),
                post_type: Some(PostType::Video),
                ..PostUpdate::default()
            },
        )
        .unwrap();
        assert_eq!(updated.title, "New");
        assert!(updated.category.is_none());
        assert_eq!(updated.post_type, PostType::Video);
        assert!(updated.updated_at >= p.updated_at);
        assert_eq!(updated.created_at, p.created_at);
        assert_eq!(read_post(&conn, p.id).unwrap(), updated);
    }

    #[test]
    fn view_counts_match_like_and_share_rows() {
        let mut conn = memory_db();
        let author = user(&mut conn, "author", Role::Journalist);
        let r1 = user(&mut conn, "r1", Role::NormalUser);
        let r2 = user(&mut conn, "r2", Role::NormalUser);
        let p = post(&mut conn, author.id, "Counted");

        engagement_db_operations::like_post(&mut conn, r1.id, p.id).unwrap();
        engagement_db_operations::like_post(&mut conn, r2.id, p.id).unwrap();
        engagement_db_operations::share_post(&mut conn, r1.id, p.id, &NewShare::default()).unwrap();

        let summary = read_post_view(&conn, p.id, false).unwrap();
        assert_eq!(summary.likes_count, 2);
        assert_eq!(summary.shares_count, 1);
        assert!(summary.content.is_none());
        assert_eq!(read_post_view(&conn, p.id, true).unwrap().content.as_deref(), Some("Counted body"));
        assert_eq!(count_likes(&conn, p.id).unwrap(), 2);
        assert_eq!(count_shares(&conn, p.id).unwrap(), 1);
    }

    #[test]
    fn delete_cascades_to_comments_likes_and_shares() {
        let mut conn = memory_db();
        let author = user(&mut conn, "author", Role::Journalist);
        let reader = user(&mut conn, "reader", Role::NormalUser);
        let doomed = post(&mut conn, author.id, "Doomed");
        let kept = post(&mut conn, author.id, "Kept");

        let c = comments_db_operations::create_comment(&mut conn, doomed.id, reader.id, "first", None).unwrap();
        comments_db_operations::create_comment(&mut conn, doomed.id, author.id, "reply", Some(c.id)).unwrap();
        comments_db_operations::create_comment(&mut conn, kept.id, reader.id, "elsewhere", None).unwrap();
        engagement_db_operations::like_post(&mut conn, reader.id, doomed.id).unwrap();
        engagement_db_operations::like_post(&mut conn, reader.id, kept.id).unwrap();
        engagement_db_operations::share_post(&mut conn, reader.id, doomed.id, &NewShare::default()).unwrap();

        delete_post(&mut conn, doomed.id).unwrap();

        assert!(matches!(read_post(&conn, doomed.id), Err(DbError::NotFound { .. })));
        let remaining = |table: &str, id: i64| -> i64 {
            conn.query_row(&format!("SELECT COUNT(*) FROM {} WHERE post_id = ?1", table), [id], |r| r.get(0))
                .unwrap()
        };
        assert_eq!(remaining("comments", doomed.id), 0);
        assert_eq!(remaining("likes", doomed.id), 0);
        assert_eq!(remaining("shares", doomed.id), 0);
        assert_eq!(remaining("comments", kept.id), 1);
        assert_eq!(remaining("likes", kept.id), 1);
    }

    #[test]
    fn deleting_a_missing_post_is_not_found() {
        let mut conn = memory_db();
        assert!(matches!(delete_post(&mut conn, 5), Err(DbError::NotFound { entity: "Post", id: 5 })));
    }

    #[test]
    fn listing_filters_and_paginates() {
        let mut conn = memory_db();
        let a = user(&mut conn, "a", Role::Journalist);
        let b = user(&mut conn, "b", Role::Journalist);
        for (author, title, tags, category) in [
            (a.id, "one", vec!["rust"], "tech"),
            (a.id, "two", vec!["rust", "web"], "tech"),
            (b.id, "three", vec!["rusty"], "life"),
        ] {
            let p = create_post(
                &mut conn,
                author,
                &NewPost {
                    title: title.into(),
                    content: "x".into(),
                    category: Some(category.into()),
                    tags: Some(tags.into_iter().map(String::from).collect()),
                    ..NewPost::default()
                },
            )
            .unwrap();
            if title != "one" {
                publish_post(&mut conn, p.id).unwrap();
            }
        }

        let all = PostFilter { limit: 10, ..PostFilter::default() };
        assert_eq!(list_post_views(&conn, &all, false).unwrap().len(), 3);

        let published = PostFilter { status: Some(PostStatus::Published), limit: 10, ..PostFilter::default() };
        let views = list_post_views(&conn, &published, false).unwrap();
        assert_eq!(views.len(), 2);
        assert!(views.iter().all(|v| v.content.is_none()));

        let by_tag = PostFilter { tag: Some("rust".into()), limit: 10, ..PostFilter::default() };
        let titles: Vec<String> = list_post_views(&conn, &by_tag, false).unwrap().into_iter().map(|v| v.title).collect();
        assert_eq!(titles.len(), 2);
        assert!(!titles.contains(&"three".to_string()));

        for pattern in ["%", "r_st", "RUST"] {
            let wildcard = PostFilter { tag: Some(pattern.into()), limit: 10, ..PostFilter::default() };
            assert!(list_post_views(&conn, &wildcard, false).unwrap().is_empty(), "tag {:?}", pattern);
        }

        let by_author = PostFilter { author_id: Some(b.id), limit: 10, ..PostFilter::default() };
        assert_eq!(list_post_views(&conn, &by_author, false).unwrap().len(), 1);

        let by_category = PostFilter { category: Some("tech".into()), limit: 10, ..PostFilter::default() };
        assert_eq!(list_post_views(&conn, &by_category, false).unwrap().len(), 2);

        let page = PostFilter { limit: 2, offset: 2, ..PostFilter::default() };
        assert_eq!(list_post_views(&conn, &page, false).unwrap().len(), 1);
    }
}
