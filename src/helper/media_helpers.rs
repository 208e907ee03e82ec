use crate::config::Config;
use crate::helper::account_helpers::resolve_actor;
use crate::helper::authorization_helpers;
use crate::helper::{get_conn, ServiceError, ServiceResult};
use crate::models::MediaUpload;
use crate::DbPool;
use actix_multipart::{Field, Multipart};
use actix_web::web;
use chrono::Utc;
use futures_util::StreamExt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Maps an accepted MIME type to the extension the file is stored under.
/// The client's own filename never decides the extension.
pub fn mime_to_safe_extension(mime_type: &str) -> Option<&'static str> {
    match mime_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        _ => None,
    }
}

/// `ab/cd/<id>.<ext>`, using the first four characters of the id as shard directories.
pub fn sharded_relative_path(file_id: &str, ext: &str) -> PathBuf {
    PathBuf::from(&file_id[0..2]).join(&file_id[2..4]).join(format!("{}.{}", file_id, ext))
}

pub fn media_url(file_id: &str, ext: &str) -> String {
    format!("/media/{}/{}/{}.{}", &file_id[0..2], &file_id[2..4], file_id, ext)
}

async fn blocking<T, F>(f: F) -> ServiceResult<T>
where
    F: FnOnce() -> std::io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    web::block(f)
        .await
        .map_err(|e| ServiceError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?
        .map_err(ServiceError::Io)
}

fn remove_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::error!("Failed to remove partial upload {}: {}", path.display(), e),
    }
}

/// Streams one field to `path`, enforcing the size limit. Returns the byte count.
async fn write_field(field: &mut Field, path: &Path, config: &Config) -> ServiceResult<u64> {
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    blocking(move || fs::create_dir_all(dir)).await?;
    let mut f = blocking({
        let path = path.to_path_buf();
        move || fs::File::create(path)
    })
    .await?;

    let max_bytes = config.max_upload_size_bytes();
    let mut size: u64 = 0;
    while let Some(chunk) = field.next().await {
        let data = chunk.map_err(|e| ServiceError::InvalidUpload(e.to_string()))?;
        size += data.len() as u64;
        if size > max_bytes {
            return Err(ServiceError::InvalidUpload(format!(
                "file is too large; the limit is {} MB",
                config.max_upload_size_mb
            )));
        }
        f = blocking(move || f.write_all(&data).map(|_| f)).await?;
    }
    Ok(size)
}

/// Removes an already stored file before an upload is rejected.
fn discard(stored: Option<(PathBuf, &'static str, String, u64)>, err: ServiceError) -> ServiceError {
    if let Some((path, ..)) = stored {
        remove_partial(&path);
    }
    err
}

/// Stores the multipart field `file` under the upload directory and writes a JSON
/// sidecar with its metadata. Only journalists and admins may upload.
pub async fn save_media(
    pool: &DbPool,
    config: &Config,
    user_id: i64,
    mut payload: Multipart,
) -> ServiceResult<MediaUpload> {
    {
        let conn = get_conn(pool)?;
        let actor = resolve_actor(&conn, user_id)?;
        if let Err(e) = authorization_helpers::require_author_role(&actor) {
            log::warn!("User {} ({}) denied uploading media", actor.user_id, actor.role);
            return Err(e.into());
        }
    }

    let file_id = Uuid::new_v4().to_string();
    let mut stored: Option<(PathBuf, &'static str, String, u64)> = None;

    while let Some(item) = payload.next().await {
        let mut field = match item {
            Ok(field) => field,
            Err(e) => return Err(discard(stored, ServiceError::InvalidUpload(e.to_string()))),
        };
        if field.content_disposition().get_name() != Some("file") {
            continue;
        }
        if stored.is_some() {
            return Err(discard(
                stored,
                ServiceError::InvalidUpload("only one file may be uploaded at a time".to_string()),
            ));
        }

        let content_type = field
            .content_type()
            .map(|m| m.essence_str().to_string())
            .ok_or_else(|| ServiceError::InvalidUpload("the file has no content type".to_string()))?;
        let ext = mime_to_safe_extension(&content_type).ok_or_else(|| {
            ServiceError::InvalidUpload(format!("unsupported file type '{}'", content_type))
        })?;
        let original_filename = field
            .content_disposition()
            .get_filename()
            .unwrap_or("upload")
            .to_string();

        let final_path = PathBuf::from(&config.upload_path).join(sharded_relative_path(&file_id, ext));
        match write_field(&mut field, &final_path, config).await {
            Ok(size) => stored = Some((final_path, ext, original_filename, size)),
            Err(e) => {
                remove_partial(&final_path);
                return Err(e);
            }
        }
    }

    let (final_path, ext, original_filename, size) =
        stored.ok_or_else(|| ServiceError::InvalidUpload("no file was uploaded".to_string()))?;

    let upload = MediaUpload {
        id: file_id.clone(),
        url: media_url(&file_id, ext),
        file_format: ext.to_string(),
        original_filename,
        file_size: size as i64,
        uploaded_at: Utc::now(),
    };
    let sidecar_path = final_path.with_extension("json");
    let written = match serde_json::to_string_pretty(&upload) {
        Ok(sidecar) => {
            let sidecar_path = sidecar_path.clone();
            blocking(move || fs::write(sidecar_path, sidecar)).await
        }
        Err(e) => Err(ServiceError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))),
    };
    if let Err(e) = written {
        remove_partial(&sidecar_path);
        remove_partial(&final_path);
        return Err(e);
    }

    log::info!("User {} uploaded {} ({} bytes)", user_id, upload.url, upload.file_size);
    Ok(upload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_media_types_map_to_extensions() {
        assert_eq!(mime_to_safe_extension("image/jpeg"), Some("jpg"));
        assert_eq!(mime_to_safe_extension("video/webm"), Some("webm"));
        assert_eq!(mime_to_safe_extension("text/html"), None);
        assert_eq!(mime_to_safe_extension("application/x-sh"), None);
    }

    #[test]
    fn files_are_sharded_by_id_prefix() {
        let id = "abcdef12-0000-0000-0000-000000000000";
        assert_eq!(
            sharded_relative_path(id, "png"),
            PathBuf::from("ab").join("cd").join(format!("{}.png", id))
        );
        assert_eq!(media_url(id, "png"), format!("/media/ab/cd/{}.png", id));
    }
}
