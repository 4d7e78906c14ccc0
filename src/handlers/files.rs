use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
};
use serde_json::json;
use std::path::Path as FsPath;

use crate::{
    middleware::auth::{AnyRole, Caller},
    services::storage::{sanitize_relative_path, url_for_key},
    utils::{
        errors::AppError,
        logger::{fields, LOGGER},
    },
    AppState,
};

const RECEIPTS_DIR: &str = "receipts";

/// Serves a stored upload. Receipts are private to their owner and admins.
pub async fn serve_upload(
    State(state): State<AppState>,
    caller: Caller<AnyRole>,
    Path(path): Path<String>,
) -> Result<Response, AppError> {
    let relative = sanitize_relative_path(&path).ok_or_else(|| {
        LOGGER.log_security_event(
            "unsafe_upload_path",
            Some(caller.id()),
            fields([("path", json!(path))]),
        );
        AppError::NotFound("File not found".to_string())
    })?;

    let url = url_for_key(&path);

    if relative.starts_with(RECEIPTS_DIR) && !caller.user.is_admin() {
        let owner = state
            .payments
            .find_by_receipt_url(&url)
            .await?
            .map(|payment| payment.student_id);

        if owner != Some(caller.id()) {
            LOGGER.log_security_event(
                "receipt_access_denied",
                Some(caller.id()),
                fields([("path", json!(path))]),
            );
            return Err(AppError::Forbidden("You cannot access this file".to_string()));
        }
    }

    let bytes = state
        .storage
        .read(&url)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    let content_type = content_type_for(&relative, &bytes);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, bytes.len())
        .body(Body::from(bytes))
        .map_err(AppError::internal)
}

/// Sniffed type first, then the extension, then octet-stream.
fn content_type_for(path: &FsPath, bytes: &[u8]) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }

    let by_extension = match path.extension().and_then(|ext| ext.to_str()) {
        Some("pdf") => mime::APPLICATION_PDF,
        Some("png") => mime::IMAGE_PNG,
        Some("jpg") | Some("jpeg") => mime::IMAGE_JPEG,
        Some("gif") => mime::IMAGE_GIF,
        Some("txt") => mime::TEXT_PLAIN_UTF_8,
        Some("json") => mime::APPLICATION_JSON,
        _ => mime::APPLICATION_OCTET_STREAM,
    };
    by_extension.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffed_type_wins_over_extension() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(content_type_for(FsPath::new("receipts/a.pdf"), &png), "image/png");
    }

    #[test]
    fn falls_back_to_extension_then_octet_stream() {
        assert_eq!(content_type_for(FsPath::new("notes/a.txt"), b"hello"), "text/plain; charset=utf-8");
        assert_eq!(content_type_for(FsPath::new("notes/blob"), b"hello"), "application/octet-stream");
    }
}
