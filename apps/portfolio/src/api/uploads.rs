//! `/api/upload` handlers: screenshot upload and removal.
//!
//! Files land in `<public>/screenshots/<slug>/` and are served back under
//! `/screenshots/` by the static file service.

use super::{ApiError, ApiJson, ApiResult, AppState};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::post;
use axum::{Json, Router};
use portfolio_core::clock;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::{Component, Path, PathBuf};

/// Largest accepted image.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Room for multipart boundaries and text fields on top of the image.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub const ALLOWED_MIME_TYPES: [&str; 6] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/svg+xml",
];

const DEFAULT_SLUG: &str = "uploads";
const PUBLIC_PREFIX: &str = "/screenshots/";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/screenshot", post(upload).delete(remove))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Uploaded {
    pub success: bool,
    pub path: String,
    pub file_name: String,
    pub original_name: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    path: Option<String>,
}

struct Image {
    original_name: String,
    bytes: Vec<u8>,
}

/// A slug must be a single, plain path segment.
fn valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug != "."
        && !slug.contains("..")
        && !slug.contains(['/', '\\', '\0'])
}

/// `<base>-<epoch_ms>-<6 base36 chars><.ext>` built from the client's name.
fn stored_file_name(original_name: &str) -> String {
    let file = Path::new(original_name)
        .file_name()
        .map(Path::new)
        .unwrap_or_else(|| Path::new("image"));
    let base = file
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("image");
    let ext = file
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    format!(
        "{base}-{}-{}{ext}",
        clock::epoch_millis(),
        clock::base36_suffix(6)
    )
}

/// Resolve `relative` under `base` without touching the filesystem.
///
/// Returns `None` if the path would escape `base`.
fn resolve_within(base: &Path, relative: &str) -> Option<PathBuf> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(parts.into_iter().fold(base.to_path_buf(), |path, part| path.join(part)))
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Uploaded>> {
    let mut image = None;
    let mut slug = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                if !ALLOWED_MIME_TYPES.contains(&content_type.as_str()) {
                    return Err(ApiError::bad_request(
                        "Invalid file type. Only images are allowed.",
                    ));
                }
                let original_name = field.file_name().unwrap_or("image").to_string();
                let bytes = field.bytes().await?;
                if bytes.len() > MAX_UPLOAD_BYTES {
                    return Err(ApiError::PayloadTooLarge);
                }
                image = Some(Image {
                    original_name,
                    bytes: bytes.to_vec(),
                });
            }
            Some("projectSlug") => {
                let text = field.text().await?;
                let text = text.trim();
                if !text.is_empty() {
                    slug = Some(text.to_string());
                }
            }
            _ => {}
        }
    }

    let image = image.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    let slug = slug.unwrap_or_else(|| DEFAULT_SLUG.to_string());
    if !valid_slug(&slug) {
        return Err(ApiError::bad_request("Invalid project slug"));
    }

    let dir = state.screenshots_dir().join(&slug);
    tokio::fs::create_dir_all(&dir).await?;
    let file_name = stored_file_name(&image.original_name);
    tokio::fs::write(dir.join(&file_name), &image.bytes).await?;
    tracing::info!(slug = %slug, file = %file_name, bytes = image.bytes.len(), "screenshot uploaded");

    Ok(Json(Uploaded {
        success: true,
        path: format!("{PUBLIC_PREFIX}{slug}/{file_name}"),
        file_name,
        original_name: image.original_name,
    }))
}

async fn remove(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<DeleteRequest>,
) -> ApiResult<Json<Value>> {
    let path = body.path.unwrap_or_default();
    let relative = path
        .strip_prefix(PUBLIC_PREFIX)
        .ok_or_else(|| ApiError::bad_request("Invalid file path"))?;

    let full = resolve_within(&state.screenshots_dir(), relative)
        .ok_or_else(|| ApiError::Forbidden("Access denied".into()))?;

    match tokio::fs::metadata(&full).await {
        Ok(meta) if meta.is_file() => {}
        _ => return Err(ApiError::not_found("File not found")),
    }
    tokio::fs::remove_file(&full).await?;
    tracing::info!(path = %path, "screenshot deleted");

    Ok(Json(json!({
        "success": true,
        "message": "File deleted successfully",
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_single_segments() {
        assert!(valid_slug("my-project"));
        assert!(!valid_slug(""));
        assert!(!valid_slug(".."));
        assert!(!valid_slug("a/b"));
        assert!(!valid_slug("a\\b"));
    }

    #[test]
    fn stored_names_keep_base_and_extension() {
        let name = stored_file_name("shot one.png");
        assert!(name.starts_with("shot one-"));
        assert!(name.ends_with(".png"));

        let stripped = stored_file_name("../../etc/passwd");
        assert!(stripped.starts_with("passwd-"));
        assert!(!stripped.contains('/'));

        let bare = stored_file_name("README");
        assert!(bare.starts_with("README-"));
        assert!(!bare.contains('.'));
    }

    #[test]
    fn resolution_stays_inside_base() {
        let base = Path::new("/srv/public/screenshots");
        assert_eq!(
            resolve_within(base, "p/a.png"),
            Some(base.join("p").join("a.png"))
        );
        assert_eq!(
            resolve_within(base, "p/../q/a.png"),
            Some(base.join("q").join("a.png"))
        );
        assert_eq!(resolve_within(base, "../secret"), None);
        assert_eq!(resolve_within(base, "p/../../secret"), None);
    }
}
