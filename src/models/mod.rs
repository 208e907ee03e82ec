use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

// Closed string enums stored as TEXT columns.
macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ParseEnumError { kind: $kind, value: other.to_string() }),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: ParseEnumError| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    NormalUser,
    Journalist,
    Admin,
}

string_enum!(Role, "role", {
    NormalUser => "normal_user",
    Journalist => "journalist",
    Admin => "admin",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PostType {
    #[default]
    Article,
    Video,
    Photo,
}

string_enum!(PostType, "post type", {
    Article => "article",
    Video => "video",
    Photo => "photo",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
}

string_enum!(PostStatus, "post status", {
    Draft => "draft",
    Published => "published",
});

/// A registered account. The password hash is never serialized.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub post_type: PostType,
    pub category: Option<String>,
    /// Stored comma-separated, e.g. "rust,web".
    pub tags: Option<String>,
    pub media_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub author_id: i64,
}

impl Post {
    pub fn tag_list(&self) -> Vec<String> {
        match self.tags.as_deref() {
            Some(tags) if !tags.is_empty() => tags.split(',').map(str::to_string).collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published
    }

    /// Transfer representation. `include_content = false` gives the list-view summary.
    pub fn to_view(&self, likes_count: i64, shares_count: i64, include_content: bool) -> PostView {
        PostView {
            id: self.id,
            title: self.title.clone(),
            post_type: self.post_type,
            category: self.category.clone(),
            tags: self.tag_list(),
            media_url: self.media_url.clone(),
            thumbnail_url: self.thumbnail_url.clone(),
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            published_at: self.published_at,
            author_id: self.author_id,
            likes_count,
            shares_count,
            content: include_content.then(|| self.content.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PostView {
    pub id: i64,
    pub title: String,
    pub post_type: PostType,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub media_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub author_id: i64,
    pub likes_count: i64,
    pub shares_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Accepts either `"rust,web"` or `["rust", "web"]`.
fn deserialize_tags<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrVec {
        String(String),
        Vec(Vec<String>),
    }

    Ok(match Option::<StringOrVec>::deserialize(deserializer)? {
        Some(StringOrVec::String(s)) => Some(s.split(',').map(|t| t.to_string()).collect()),
        Some(StringOrVec::Vec(v)) => Some(v),
        None => None,
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub post_type: PostType,
    pub category: Option<String>,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Option<Vec<String>>,
    pub media_url: Option<String>,
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub status: PostStatus,
}

/// Partial update; `None` leaves a field untouched, an empty string clears an optional one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub post_type: Option<PostType>,
    pub category: Option<String>,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Option<Vec<String>>,
    pub media_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub status: Option<PostStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub status: Option<PostStatus>,
    pub author_id: Option<i64>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub post_type: Option<PostType>,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub post_id: i64,
    pub author_id: i64,
    pub parent_comment_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<CommentNode>,
}

/// Assembles a flat, creation-ordered comment list into reply trees.
/// Comments whose parent is not in the list are treated as roots.
pub fn build_comment_tree(comments: Vec<Comment>) -> Vec<CommentNode> {
    let present: std::collections::HashSet<i64> = comments.iter().map(|c| c.id).collect();
    let mut children: HashMap<Option<i64>, Vec<Comment>> = HashMap::new();
    for comment in comments {
        let key = comment.parent_comment_id.filter(|p| present.contains(p));
        children.entry(key).or_default().push(comment);
    }

    fn attach(parent: Option<i64>, children: &mut HashMap<Option<i64>, Vec<Comment>>) -> Vec<CommentNode> {
        let Some(level) = children.remove(&parent) else {
            return Vec::new();
        };
        level
            .into_iter()
            .map(|comment| {
                let replies = attach(Some(comment.id), children);
                CommentNode { comment, replies }
            })
            .collect()
    }

    attach(None, &mut children)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Like {
    pub id: i64,
    pub user_id: i64,
    pub post_id: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Share {
    pub id: i64,
    pub platform: Option<String>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub user_id: i64,
    pub post_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewShare {
    pub platform: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MediaUpload {
    pub id: String,
    pub url: String,
    pub file_format: String,
    pub original_filename: String,
    pub file_size: i64,
    pub uploaded_at: DateTime<Utc>,
}

pub mod db_operations;
