//! # Upload Module
//!
//! Ricezione multipart del PDF da comprimere.
//!
//! ## Responsabilità:
//! - Scrive il campo `file` in streaming su `upload_dir` con nome unico
//! - Applica il limite di dimensione durante la scrittura
//! - Verifica content type ed estensione `.pdf`
//! - Legge il campo opzionale `quality`
//! - Cancella l'upload parziale in caso di errore

use std::path::{Path, PathBuf};

use axum::extract::multipart::{Field, Multipart, MultipartError};
use tokio::io::AsyncWriteExt;

use crate::error::CompressError;
use crate::file_manager::FileManager;
use crate::http::errors::ApiError;

pub const FILE_FIELD: &str = "file";
pub const QUALITY_FIELD: &str = "quality";
const PDF_CONTENT_TYPE: &str = "application/pdf";

/// A PDF persisted under the upload directory
#[derive(Debug)]
pub struct UploadedPdf {
    pub path: PathBuf,
    pub original_name: String,
    pub size: u64,
    pub quality: Option<String>,
}

/// Read the form. Anything written to disk is removed again on rejection.
pub async fn receive_pdf(
    multipart: &mut Multipart,
    upload_dir: &Path,
    max_bytes: u64,
) -> Result<UploadedPdf, ApiError> {
    let mut saved: Option<PathBuf> = None;
    let mut form = FormState::default();

    let result = read_fields(multipart, upload_dir, max_bytes, &mut saved, &mut form).await;
    match (result, saved) {
        (Ok(()), Some(path)) => Ok(UploadedPdf {
            path,
            original_name: form.original_name,
            size: form.size,
            quality: form.quality,
        }),
        (Ok(()), None) => Err(ApiError::bad_request(
            "No file uploaded. Please upload a PDF file.",
        )),
        (Err(e), saved) => {
            if let Some(path) = saved {
                FileManager::delete_now(&[path]).await;
            }
            Err(e)
        }
    }
}

#[derive(Default)]
struct FormState {
    original_name: String,
    size: u64,
    quality: Option<String>,
}

async fn read_fields(
    multipart: &mut Multipart,
    upload_dir: &Path,
    max_bytes: u64,
    saved: &mut Option<PathBuf>,
    form: &mut FormState,
) -> Result<(), ApiError> {
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(FILE_FIELD) => {
                if saved.is_some() {
                    return Err(ApiError::bad_request("Only one file may be uploaded"));
                }
                let original_name = validate_pdf_field(&field)?;
                let path = FileManager::allocate_unique_path(upload_dir, &original_name, "");
                // Recorded before writing so a partial file is cleaned up too
                *saved = Some(path.clone());
                form.size = stream_to_disk(&mut field, &path, max_bytes).await?;
                form.original_name = original_name;
            }
            Some(QUALITY_FIELD) => {
                let value = field.text().await.map_err(multipart_error)?;
                form.quality = Some(value);
            }
            _ => {}
        }
    }
    Ok(())
}

fn validate_pdf_field(field: &Field<'_>) -> Result<String, CompressError> {
    let original_name = field
        .file_name()
        .map(str::to_string)
        .ok_or_else(|| CompressError::Upload("No file uploaded. Please upload a PDF file.".to_string()))?;

    let content_type = field.content_type().unwrap_or_default();
    if !content_type.eq_ignore_ascii_case(PDF_CONTENT_TYPE) {
        return Err(CompressError::Upload("Only PDF files are allowed".to_string()));
    }

    let is_pdf = Path::new(&original_name)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if !is_pdf {
        return Err(CompressError::Upload("File must have .pdf extension".to_string()));
    }

    Ok(original_name)
}

async fn stream_to_disk(field: &mut Field<'_>, path: &Path, max_bytes: u64) -> Result<u64, ApiError> {
    let mut file = tokio::fs::File::create(path).await.map_err(CompressError::Io)?;
    let mut written = 0u64;

    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        written += chunk.len() as u64;
        if written > max_bytes {
            return Err(CompressError::Upload(format!(
                "File size exceeds the limit of {} MB",
                max_bytes / (1024 * 1024)
            ))
            .into());
        }
        file.write_all(&chunk).await.map_err(CompressError::Io)?;
    }

    file.flush().await.map_err(CompressError::Io)?;
    Ok(written)
}

fn multipart_error(err: MultipartError) -> ApiError {
    ApiError::new(err.status(), err.body_text())
}
