use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        DefaultBodyLimit, Extension, Multipart, Path, Request, multipart::MultipartError,
    },
    http::header,
    middleware::{self, Next},
    response::IntoResponse,
    routing::{get, post},
};
use mime::Mime;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};
use tower_http::trace::TraceLayer;

use crate::auth::{TokenAllowList, require_token};
use crate::errors::{ApiError, StorageError};
use crate::index::ImageRecord;
use crate::library::{ImageLibrary, UploadResponse, is_valid_name};

const UPLOAD_FIELD: &str = "image";
const ALLOWED_TYPES: &[&str] = &[
    "image/png",
    "image/jpg",
    "image/jpeg",
    "image/gif",
    "image/svg",
    "image/svg+xml",
];
// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenameRequest {
    #[serde(default)]
    old_name: String,
    #[serde(default)]
    new_name: String,
}

#[derive(Debug, Deserialize)]
struct DeleteRequest {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: &'static str,
}

pub fn router(library: Arc<ImageLibrary>, allow_list: TokenAllowList, upload_limit: usize) -> Router {
    let uploads = Router::new()
        .route("/upload", post(upload))
        .layer(Extension(UploadLimit(upload_limit)))
        .layer(DefaultBodyLimit::max(upload_limit.saturating_add(MULTIPART_OVERHEAD)));

    // The token gate also covers unknown paths under the prefix.
    let api = Router::new()
        .merge(uploads)
        .route("/rename", post(rename))
        .route("/list", get(list))
        .route("/delete", post(delete))
        .fallback(not_found)
        .layer(middleware::from_fn(move |req: Request, next: Next| {
            let allow_list = allow_list.clone();
            async move { require_token(allow_list, req, next).await }
        }));

    Router::new()
        .route("/", get(hello))
        .route("/{name}", get(serve_image))
        .nest("/api/v1", api)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(Extension(library))
}

#[derive(Debug, Clone, Copy)]
struct UploadLimit(usize);

async fn hello() -> &'static str {
    "Hello World!"
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

async fn serve_image(
    Path(name): Path<String>,
    Extension(library): Extension<Arc<ImageLibrary>>,
) -> Result<impl IntoResponse, ApiError> {
    // Dotfiles are never served.
    if name.starts_with('.') {
        return Err(ApiError::NotFound);
    }

    let bytes = library.read(&name).await.map_err(|e| match e {
        StorageError::NotFound(_) | StorageError::InvalidName(_) => ApiError::NotFound,
        other => ApiError::Storage(other),
    })?;

    let content_type = mime_guess::from_path(&name).first_or_octet_stream();
    Ok(([(header::CONTENT_TYPE, content_type.to_string())], Bytes::from(bytes)))
}

async fn upload(
    Extension(library): Extension<Arc<ImageLibrary>>,
    Extension(UploadLimit(limit)): Extension<UploadLimit>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().and_then(|m| m.parse::<Mime>().ok());
        if !is_allowed(content_type.as_ref()) {
            tracing::warn!(
                original_name = %original_name,
                content_type = ?content_type,
                "Only .png, .jpg, .jpeg, .gif and .svg format allowed!"
            );
            return Ok(Json(UploadResponse::default()));
        }

        let mut data = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, limit))? {
            if data.len() + chunk.len() > limit {
                return Err(too_large(limit));
            }
            data.extend_from_slice(&chunk);
        }

        return library.upload(&original_name, data).await.map(Json);
    }

    tracing::warn!("Upload request without an {UPLOAD_FIELD:?} field");
    Ok(Json(UploadResponse::default()))
}

async fn rename(
    Extension(library): Extension<Arc<ImageLibrary>>,
    Json(req): Json<RenameRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let old_ok = is_valid_name(&req.old_name);
    if !old_ok || !is_valid_name(&req.new_name) {
        let which = if old_ok { "newName" } else { "oldName" };
        return Err(ApiError::Validation(format!("{which} is not a valid file")));
    }

    library.rename(&req.old_name, &req.new_name).await?;
    Ok(Json(MessageResponse {
        message: "Rename complete!",
    }))
}

async fn list(Extension(library): Extension<Arc<ImageLibrary>>) -> Json<BTreeMap<String, ImageRecord>> {
    Json(library.list().await)
}

async fn delete(
    Extension(library): Extension<Arc<ImageLibrary>>,
    Json(req): Json<DeleteRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    tracing::debug!(name = %req.name, "Delete requested");
    if !is_valid_name(&req.name) {
        return Err(ApiError::Validation("name is not a valid file".to_string()));
    }

    library.delete(&req.name).await?;
    Ok(Json(MessageResponse {
        message: "Delete complete!",
    }))
}

fn too_large(limit: usize) -> ApiError {
    ApiError::UploadRejected(format!("File too large, limit is {limit} bytes"))
}

// Hitting the body limit surfaces as a multipart stream error.
fn multipart_error(err: MultipartError, limit: usize) -> ApiError {
    if err.status() == http::StatusCode::PAYLOAD_TOO_LARGE {
        too_large(limit)
    } else {
        ApiError::BadRequest(err.to_string())
    }
}

fn is_allowed(content_type: Option<&Mime>) -> bool {
    content_type.is_some_and(|m| ALLOWED_TYPES.contains(&m.essence_str()))
}
