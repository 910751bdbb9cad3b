//! Uploaded-report handling: persist the file, checksum it, pull text out of
//! PDFs and run the field extractor. Image uploads skip extraction entirely
//! and are flagged for OCR.

use crate::errors::AppError;
use crate::extractor::extract_fields;
use crate::models::ExtractedFields;
use moka::future::Cache;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const PDF_EXTENSIONS: &[&str] = &["pdf"];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

/// Result of one processed upload.
#[derive(Debug, Clone)]
pub struct ProcessedUpload {
    /// Relative URL the front end can fetch the file from.
    pub file_url: String,
    /// SHA-256 of the raw bytes, hex encoded.
    pub checksum: String,
    pub fields: ExtractedFields,
}

/// Saves uploads and extracts fields, with a checksum-keyed cache so the same
/// document re-uploaded within the hour is not parsed twice.
#[derive(Clone)]
pub struct DocumentProcessor {
    upload_dir: PathBuf,
    extraction_cache: Cache<String, ExtractedFields>,
}

impl DocumentProcessor {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            extraction_cache: Cache::builder()
                .max_capacity(1_000)
                .time_to_live(Duration::from_secs(3600))
                .build(),
        }
    }

    /// Ensure the upload directory exists. Called once at startup.
    pub async fn ensure_upload_dir(&self) -> Result<(), AppError> {
        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .map_err(|e| {
                AppError::InternalError(format!(
                    "failed to create upload dir {}: {}",
                    self.upload_dir.display(),
                    e
                ))
            })
    }

    /// Store the file and extract whatever fields the document yields.
    ///
    /// Extraction failures are not errors: the file is kept, the failure is
    /// logged, and an empty field set comes back so the user can fill the
    /// form manually. Only unsupported types and I/O failures reject.
    pub async fn process_upload(
        &self,
        case_id: Uuid,
        original_name: &str,
        bytes: Vec<u8>,
    ) -> Result<ProcessedUpload, AppError> {
        if bytes.is_empty() {
            return Err(AppError::Validation("No file provided".to_string()));
        }
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::Validation("File exceeds 10MB limit".to_string()));
        }

        let extension = file_extension(original_name);
        let is_pdf = PDF_EXTENSIONS.contains(&extension.as_str());
        let is_image = IMAGE_EXTENSIONS.contains(&extension.as_str());
        if !is_pdf && !is_image {
            return Err(AppError::Validation(
                "Invalid file type. Only PDF and images are allowed.".to_string(),
            ));
        }

        let checksum = hex::encode(Sha256::digest(&bytes));
        let file_name = format!("{}-{}.{}", case_id, Uuid::new_v4(), extension);
        let path = self.upload_dir.join(&file_name);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| AppError::InternalError(format!("failed to store upload: {}", e)))?;

        let fields = if is_pdf {
            let cached = self.extraction_cache.get(&checksum).await;
            match cached {
                Some(fields) => {
                    tracing::debug!(%checksum, "extraction cache hit");
                    fields
                }
                None => {
                    let fields = extract_from_pdf(bytes).await;
                    self.extraction_cache
                        .insert(checksum.clone(), fields.clone())
                        .await;
                    fields
                }
            }
        } else {
            ExtractedFields {
                needs_ocr: true,
                ..Default::default()
            }
        };

        tracing::info!(
            %case_id,
            file = %file_name,
            extracted = !fields.is_empty(),
            "upload processed"
        );

        Ok(ProcessedUpload {
            file_url: format!("/uploads/{}", file_name),
            checksum,
            fields,
        })
    }
}

/// Parse the PDF off the async runtime and run the extractor over its text.
/// Any parse failure degrades to an empty field set.
async fn extract_from_pdf(bytes: Vec<u8>) -> ExtractedFields {
    let result = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await;
    match result {
        Ok(Ok(text)) => extract_fields(&text),
        Ok(Err(e)) => {
            tracing::warn!("PDF text extraction failed: {}", e);
            ExtractedFields::default()
        }
        Err(e) => {
            tracing::error!("PDF extraction task panicked: {}", e);
            ExtractedFields::default()
        }
    }
}

fn file_extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin")
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(file_extension("report.PDF"), "pdf");
        assert_eq!(file_extension("photo.JPeG"), "jpeg");
        assert_eq!(file_extension("noext"), "bin");
    }

    #[tokio::test]
    async fn rejects_unsupported_types() {
        let processor = DocumentProcessor::new(std::env::temp_dir());
        let err = processor
            .process_upload(Uuid::new_v4(), "notes.docx", vec![1, 2, 3])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn image_upload_is_flagged_for_ocr() {
        let dir = std::env::temp_dir().join(format!("uploads-{}", Uuid::new_v4()));
        let processor = DocumentProcessor::new(&dir);
        processor.ensure_upload_dir().await.unwrap();
        let processed = processor
            .process_upload(Uuid::new_v4(), "ticket.jpg", vec![0xFF, 0xD8, 0xFF])
            .await
            .unwrap();
        assert!(processed.fields.needs_ocr);
        assert!(processed
            .fields
            .merged_with(&ExtractedFields::default())
            .needs_ocr);
        assert!(processed.file_url.starts_with("/uploads/"));
        assert_eq!(processed.checksum.len(), 64);
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
