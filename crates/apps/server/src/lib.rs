//! Hotspot persistence API over a JSON data file, plus image uploads.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, Path as AxumPath, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use parking_lot::Mutex;
use scene::{Hotspot, Placement};
use serde::de::DeserializeOwned;
use serde_json::Value;
use store::wire::{Ack, ErrorBody, ImageBody, ImagesBody, RemovedImage, UploadedFile};
use store::{FileBackend, HotspotBackend, StoreError};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    hotspots: Arc<Mutex<FileBackend>>,
    upload_root: PathBuf,
}

impl AppState {
    pub fn new(hotspots: FileBackend, upload_root: impl Into<PathBuf>) -> Self {
        Self {
            hotspots: Arc::new(Mutex::new(hotspots)),
            upload_root: upload_root.into(),
        }
    }

    pub fn upload_root(&self) -> &std::path::Path {
        &self.upload_root
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([
            Method::GET,
            Method::PUT,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ]);

    let api = Router::new()
        .route("/hotspots", get(list_all))
        .route("/hotspots/reset", post(reset))
        .route("/hotspots/:vp", get(list_viewpoint).put(replace_viewpoint))
        .route("/hotspots/:vp/:hid", put(update_hotspot))
        .route("/hotspots/:vp/:hid/images", put(set_images).post(add_image))
        .route("/hotspots/:vp/:hid/images/:index", delete(remove_image))
        .route("/upload", post(upload))
        .route("/upload/:filename", delete(delete_upload));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> Response {
    (StatusCode::OK, "ok").into_response()
}

fn ack(message: String) -> Response {
    Json(Ack {
        success: true,
        message,
    })
    .into_response()
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

fn store_error(err: StoreError) -> Response {
    let status = match &err {
        StoreError::HotspotNotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::ImageIndexOutOfRange { .. }
        | StoreError::EmptyImage
        | StoreError::DuplicateHotspot { .. }
        | StoreError::InvalidHotspot(_)
        | StoreError::Corrupt(_) => StatusCode::BAD_REQUEST,
        StoreError::StorageUnavailable | StoreError::Io(_) | StoreError::Http(_) => {
            error!("hotspot storage failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_response(status, err.to_string())
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, Response> {
    serde_json::from_slice(body)
        .map_err(|err| error_response(StatusCode::BAD_REQUEST, format!("invalid body: {err}")))
}

async fn list_all(State(state): State<AppState>) -> Response {
    let result = state.hotspots.lock().load_all();
    match result {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(err) => store_error(err),
    }
}

async fn list_viewpoint(State(state): State<AppState>, AxumPath(vp): AxumPath<String>) -> Response {
    let result = state.hotspots.lock().load(&vp);
    match result {
        Ok(list) => Json(list).into_response(),
        Err(err) => store_error(err),
    }
}

async fn replace_viewpoint(
    State(state): State<AppState>,
    AxumPath(vp): AxumPath<String>,
    body: Bytes,
) -> Response {
    let list: Vec<Hotspot> = match parse_body(&body) {
        Ok(list) => list,
        Err(resp) => return resp,
    };
    if let Err(err) = store::backend::validate_list(&vp, &list) {
        return store_error(err);
    }
    let result = state.hotspots.lock().save(&vp, &list);
    match result {
        Ok(()) => {
            info!(viewpoint = %vp, count = list.len(), "hotspots replaced");
            ack(format!("Updated hotspots for {vp}"))
        }
        Err(err) => store_error(err),
    }
}

/// Shallow merge of `patch` over the stored record. The placement kind is
/// fixed: a percent hotspot never gains a `position`, a world hotspot never
/// gains `x`/`y`.
fn merge_hotspot(existing: &Hotspot, hid: &str, patch: Value) -> Result<Hotspot, String> {
    let Value::Object(patch) = patch else {
        return Err("hotspot patch must be an object".to_string());
    };
    let switches_space = match existing.placement {
        Placement::Percent2D { .. } => patch.contains_key("position"),
        Placement::World3D { .. } => patch.contains_key("x") || patch.contains_key("y"),
    };
    if switches_space {
        return Err(format!("hotspot {hid} cannot change coordinate space"));
    }
    let Value::Object(mut merged) = serde_json::to_value(existing).map_err(|e| e.to_string())?
    else {
        return Err("stored hotspot is not an object".to_string());
    };
    merged.extend(patch);
    merged.insert("id".to_string(), Value::String(hid.to_string()));
    serde_json::from_value(Value::Object(merged)).map_err(|e| e.to_string())
}

async fn update_hotspot(
    State(state): State<AppState>,
    AxumPath((vp, hid)): AxumPath<(String, String)>,
    body: Bytes,
) -> Response {
    let patch: Value = match parse_body(&body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let result = {
        let mut backend = state.hotspots.lock();
        backend.load(&vp).and_then(|list| {
            let existing = list.iter().find(|h| h.id == hid).ok_or_else(|| {
                StoreError::HotspotNotFound {
                    viewpoint: vp.clone(),
                    hotspot: hid.clone(),
                }
            })?;
            let merged = merge_hotspot(existing, &hid, patch).map_err(StoreError::Corrupt)?;
            backend.update_hotspot(&vp, &merged)
        })
    };
    match result {
        Ok(()) => ack(format!("Updated hotspot {hid}")),
        Err(err) => store_error(err),
    }
}

async fn set_images(
    State(state): State<AppState>,
    AxumPath((vp, hid)): AxumPath<(String, String)>,
    body: Bytes,
) -> Response {
    let body: ImagesBody = match parse_body(&body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let result = state.hotspots.lock().set_images(&vp, &hid, &body.images);
    match result {
        Ok(()) => Json(body).into_response(),
        Err(err) => store_error(err),
    }
}

async fn add_image(
    State(state): State<AppState>,
    AxumPath((vp, hid)): AxumPath<(String, String)>,
    body: Bytes,
) -> Response {
    let body: ImageBody = match parse_body(&body) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let result = state.hotspots.lock().add_image(&vp, &hid, &body.image);
    match result {
        Ok(()) => Json(body).into_response(),
        Err(err) => store_error(err),
    }
}

async fn remove_image(
    State(state): State<AppState>,
    AxumPath((vp, hid, index)): AxumPath<(String, String, String)>,
) -> Response {
    let Ok(index) = index.parse::<usize>() else {
        return error_response(StatusCode::BAD_REQUEST, "Image index out of range");
    };
    let result = state.hotspots.lock().remove_image(&vp, &hid, index);
    match result {
        Ok(removed) => Json(RemovedImage {
            success: true,
            removed,
        })
        .into_response(),
        Err(err) => store_error(err),
    }
}

async fn reset(State(state): State<AppState>) -> Response {
    let result = {
        let mut backend = state.hotspots.lock();
        let defaults = backend.defaults().clone();
        backend.reset(&defaults)
    };
    match result {
        Ok(_) => {
            info!("hotspots reset to defaults");
            ack("Hotspots reset to defaults".to_string())
        }
        Err(err) => store_error(err),
    }
}

/// Last path component with everything outside `[A-Za-z0-9._-]` replaced.
///
/// `None` when nothing usable remains or the name would be hidden.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    let clean: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if clean.is_empty() || clean.starts_with('.') {
        return None;
    }
    Some(clean)
}

async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return error_response(StatusCode::BAD_REQUEST, "missing file field"),
            Err(err) => return error_response(StatusCode::BAD_REQUEST, err.to_string()),
        };
        if field.name() != Some("file") {
            continue;
        }

        let is_image = field
            .content_type()
            .is_some_and(|ct| ct.starts_with("image/"));
        if !is_image {
            return error_response(StatusCode::BAD_REQUEST, "File must be an image");
        }
        let Some(filename) = field.file_name().and_then(sanitize_filename) else {
            return error_response(StatusCode::BAD_REQUEST, "invalid filename");
        };
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => return error_response(StatusCode::BAD_REQUEST, err.to_string()),
        };

        if let Err(err) = tokio::fs::create_dir_all(&state.upload_root).await {
            warn!("failed to create upload root: {err}");
        }
        let path = state.upload_root.join(&filename);
        if let Err(err) = tokio::fs::write(&path, &bytes).await {
            error!("upload write failed: {path:?} -> {err}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to save file: {err}"),
            );
        }
        info!(file = %filename, bytes = bytes.len(), "image uploaded");
        return Json(UploadedFile {
            success: true,
            path: format!("/{filename}"),
            filename,
        })
        .into_response();
    }
}

async fn delete_upload(
    State(state): State<AppState>,
    AxumPath(filename): AxumPath<String>,
) -> Response {
    if sanitize_filename(&filename).as_deref() != Some(filename.as_str()) {
        return error_response(StatusCode::BAD_REQUEST, "invalid filename");
    }
    let path = state.upload_root.join(&filename);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => ack(format!("Deleted {filename}")),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            error_response(StatusCode::NOT_FOUND, "File not found")
        }
        Err(err) => {
            error!("upload delete failed: {path:?} -> {err}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to delete file: {err}"),
            )
        }
    }
}
