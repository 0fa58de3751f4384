//! # Handlers Module
//!
//! Handler delle rotte HTTP.
//!
//! ## Responsabilità:
//! - `health`: stato del servizio con timestamp ISO
//! - `compress`: riceve l'upload, esegue la pipeline, restituisce il PDF compresso
//! - Espone il report negli header `X-*` della risposta
//! - Trasmette l'output in streaming; il body possiede `JobFiles` e cancella i
//!   file a fine stream
//! - `not_found`: fallback JSON 404
//!
//! ## Priorità del preset:
//! - Il campo `quality` del form vince sul parametro di query

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Multipart, Query, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE},
        StatusCode,
    },
    response::Response,
    Json,
};
use chrono::{SecondsFormat, Utc};
use futures::stream;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info};

use crate::file_manager::FileManager;
use crate::http::errors::ApiError;
use crate::http::upload::receive_pdf;
use crate::http::AppState;
use crate::pipeline::{CompressionRequest, JobFiles, JobResult, OUTPUT_PREFIX};
use crate::preset::ResolvedPreset;
use crate::report::EffectivenessReport;

pub const HEADER_RATIO: &str = "x-compression-ratio";
pub const HEADER_TIER: &str = "x-compression-tier";
pub const HEADER_PRESET: &str = "x-compression-preset";
pub const HEADER_ORIGINAL_SIZE: &str = "x-original-size";
pub const HEADER_COMPRESSED_SIZE: &str = "x-compressed-size";
pub const HEADER_SAVED_BYTES: &str = "x-saved-bytes";
pub const HEADER_MESSAGE: &str = "x-compression-message";

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub message: &'static str,
    pub timestamp: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        message: "PDF Compression API is running",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

pub async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

#[derive(Debug, Default, Deserialize)]
pub struct CompressQuery {
    pub quality: Option<String>,
}

/// `POST /api/compress`
pub async fn compress(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CompressQuery>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let config = &state.config;
    let upload = receive_pdf(&mut multipart, &config.upload_dir, config.max_file_size_bytes()).await?;
    info!(
        "Received file: {} ({})",
        upload.original_name,
        FileManager::format_size(upload.size)
    );

    // Form field wins over the query string
    let requested_preset = upload.quality.or(query.quality);
    let request = CompressionRequest {
        input_path: upload.path,
        requested_preset,
    };

    match state.pipeline.compress(request).await {
        JobResult::Completed {
            preset,
            report,
            files,
        } => deliver(&upload.original_name, &preset, &report, files, config.development).await,
        JobResult::Failed { preset, outcome } => {
            error!(
                "Compression error ({} preset): {}",
                preset.name,
                outcome.user_message()
            );
            Err(ApiError::from_outcome(&outcome, config.development))
        }
    }
}

/// Stream the output back. Both job files go away once the body is done or dropped.
async fn deliver(
    original_name: &str,
    preset: &ResolvedPreset,
    report: &EffectivenessReport,
    files: JobFiles,
    development: bool,
) -> Result<Response, ApiError> {
    let file = match tokio::fs::File::open(files.output_path()).await {
        Ok(file) => file,
        Err(e) => {
            files.release().await;
            return Err(ApiError::internal("Failed to read the compressed file")
                .with_diagnostic(Some(e.to_string()), development));
        }
    };

    info!(
        "Sending {} ({}: {}%, saved {})",
        files.output_path().display(),
        report.tier.as_str(),
        report.ratio_percent,
        report.saved_bytes_formatted()
    );
    for warning in &report.warnings {
        debug!("Compression warning: {}", warning);
    }

    let body = Body::from_stream(stream::try_unfold(
        Delivery {
            file,
            files: Some(files),
        },
        next_chunk,
    ));

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/pdf")
        .header(CONTENT_LENGTH, report.compressed_size)
        .header(
            CONTENT_DISPOSITION,
            format!(
                "attachment; filename=\"{}\"",
                header_safe(&format!("{}{}", OUTPUT_PREFIX, original_name))
            ),
        )
        .header(HEADER_RATIO, report.ratio_percent.to_string())
        .header(HEADER_TIER, report.tier.as_str())
        .header(HEADER_PRESET, header_safe(&preset.name))
        .header(HEADER_ORIGINAL_SIZE, report.original_size)
        .header(HEADER_COMPRESSED_SIZE, report.compressed_size)
        .header(HEADER_SAVED_BYTES, report.saved_bytes().to_string())
        .header(HEADER_MESSAGE, header_safe(&report.message))
        .body(body)
        .map_err(|e| {
            ApiError::internal("Failed to build the response").with_diagnostic(Some(e.to_string()), development)
        })
}

struct Delivery {
    file: tokio::fs::File,
    files: Option<JobFiles>,
}

async fn next_chunk(mut delivery: Delivery) -> std::io::Result<Option<(Bytes, Delivery)>> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let read = delivery.file.read(&mut buf).await?;
    if read == 0 {
        if let Some(files) = delivery.files.take() {
            files.release().await;
        }
        return Ok(None);
    }
    buf.truncate(read);
    Ok(Some((Bytes::from(buf), delivery)))
}

/// Printable ASCII without quotes, for header values
fn header_safe(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect()
}
