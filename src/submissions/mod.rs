use axum::extract::Multipart;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::UserData;
use crate::error::AppError;
use crate::listings::{ListingChange, ListingKind};
use crate::ocr::{self, OcrEngine, OcrError, ParsedItem};
use crate::state::AppState;
use crate::storage::{blob_key, content_type_for, BlobRef, BlobStore};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Upload failed: {0}")]
    Upload(AppError),
    #[error("Could not read text from the image: {0}")]
    Ocr(OcrError),
    #[error("Saving the submission failed: {0}")]
    Persist(AppError),
}

impl PipelineError {
    /// What the submitter sees; no internals.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Validation(msg) | PipelineError::Forbidden(msg) => msg.clone(),
            PipelineError::Upload(_) => "Uploading your file failed. Please try again.".to_string(),
            PipelineError::Ocr(_) => {
                "We could not read any text from your file. Try a clearer image.".to_string()
            }
            PipelineError::Persist(_) => {
                "Your file was read but saving the submission failed. Please try again.".to_string()
            }
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Validation(msg) => AppError::InvalidInput(msg),
            PipelineError::Forbidden(msg) => AppError::Forbidden(msg),
            PipelineError::Upload(e) => AppError::Storage(e.to_string()),
            PipelineError::Ocr(e) => e.into(),
            PipelineError::Persist(e) => e,
        }
    }
}

/// One sell or donate form post.
#[derive(Debug, Default, Clone)]
pub struct SubmissionUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    pub pickup_location: String,
    pub notes: Option<String>,
}

impl SubmissionUpload {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut upload = SubmissionUpload::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::InvalidInput(format!("malformed form: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "file" => {
                    upload.file_name = field.file_name().unwrap_or("upload").to_string();
                    upload.content_type = field.content_type().map(str::to_string);
                    upload.bytes = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::InvalidInput(format!("file read failed: {}", e)))?
                        .to_vec();
                }
                "pickup_location" => {
                    upload.pickup_location = field
                        .text()
                        .await
                        .map_err(|e| AppError::InvalidInput(format!("pickup location read failed: {}", e)))?;
                }
                "notes" => {
                    let notes = field
                        .text()
                        .await
                        .map_err(|e| AppError::InvalidInput(format!("notes read failed: {}", e)))?;
                    upload.notes = Some(notes).filter(|n| !n.trim().is_empty());
                }
                _ => {}
            }
        }

        Ok(upload)
    }
}

/// Everything the pipeline produced before anything is persisted.
#[derive(Debug, Clone)]
pub struct PreparedSubmission {
    pub kind: ListingKind,
    pub user_id: Uuid,
    pub blob: BlobRef,
    pub image_url: String,
    pub file_name: String,
    pub pickup_location: String,
    pub notes: Option<String>,
    pub extracted_text: String,
    pub parsed_items: Option<Vec<ParsedItem>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReceipt {
    pub submission_id: Uuid,
    pub listing_id: Uuid,
    pub kind: ListingKind,
    pub image_url: String,
    pub parsed_items: Option<Vec<ParsedItem>>,
}

pub fn check_allowed(user: &UserData, kind: ListingKind) -> Result<(), PipelineError> {
    match kind {
        ListingKind::Donate if user.is_ngo() => Err(PipelineError::Forbidden(
            "NGOs cannot donate items through this platform.".to_string(),
        )),
        ListingKind::Sell | ListingKind::Donate => Ok(()),
    }
}

fn validate(upload: &SubmissionUpload) -> Result<(), PipelineError> {
    if upload.bytes.is_empty() {
        return Err(PipelineError::Validation("Choose a file to upload".to_string()));
    }
    if upload.pickup_location.trim().is_empty() {
        return Err(PipelineError::Validation("Pickup location is required".to_string()));
    }
    Ok(())
}

fn key_prefix(kind: ListingKind) -> &'static str {
    match kind {
        ListingKind::Sell => "uploads",
        ListingKind::Donate => "donations",
    }
}

async fn discard_blob(blobs: &dyn BlobStore, blob: &BlobRef) {
    if let Err(e) = blobs.delete(&blob.key).await {
        tracing::warn!("Could not remove orphaned blob {}: {}", blob.key, e);
    }
}

/// Upload, then text extraction, then parsing. Strictly in that order.
pub async fn prepare(
    blobs: &dyn BlobStore,
    engine: &dyn OcrEngine,
    language: &str,
    user: &UserData,
    kind: ListingKind,
    upload: SubmissionUpload,
) -> Result<PreparedSubmission, PipelineError> {
    check_allowed(user, kind)?;
    validate(&upload)?;

    let content_type = content_type_for(&upload.file_name, upload.content_type.as_deref());
    let key = blob_key(key_prefix(kind), user.id, &upload.file_name);
    let blob = blobs
        .put(&key, &upload.bytes, &content_type)
        .await
        .map_err(PipelineError::Upload)?;
    let image_url = blobs.download_url(&blob);

    let extracted_text = match ocr::extract_text(
        engine,
        &upload.bytes,
        &upload.file_name,
        Some(&content_type),
        language,
    )
    .await
    {
        Ok(text) => text,
        Err(e) => {
            tracing::error!("{} OCR failed for {}: {}", engine.name(), blob.key, e);
            discard_blob(blobs, &blob).await;
            return Err(PipelineError::Ocr(e));
        }
    };

    // Notes are only stored with donations.
    let (parsed_items, notes) = match kind {
        ListingKind::Sell => (Some(ocr::parse_items(&extracted_text)), None),
        ListingKind::Donate => (None, upload.notes.map(|n| n.trim().to_string())),
    };

    Ok(PreparedSubmission {
        kind,
        user_id: user.id,
        blob,
        image_url,
        file_name: upload.file_name,
        pickup_location: upload.pickup_location.trim().to_string(),
        notes,
        extracted_text,
        parsed_items,
    })
}

/// Full pipeline: prepare, then write the submission record and its listing.
pub async fn submit(
    state: &AppState,
    user: &UserData,
    kind: ListingKind,
    upload: SubmissionUpload,
) -> Result<SubmissionReceipt, PipelineError> {
    let prepared = prepare(
        state.blobs.as_ref(),
        state.ocr.as_ref(),
        &state.config.ocr_language,
        user,
        kind,
        upload,
    )
    .await?;

    let (submission_id, listing_id) =
        match crate::db::insert_submission(state.pool.as_ref(), &prepared).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!("Persisting {} submission failed: {}", kind.as_str(), e);
                discard_blob(state.blobs.as_ref(), &prepared.blob).await;
                return Err(PipelineError::Persist(e.into()));
            }
        };

    tracing::info!(
        "{} submission {} stored for {} (listing {}, {} chars of text)",
        kind.as_str(),
        submission_id,
        user.id,
        listing_id,
        prepared.extracted_text.len()
    );

    state.listing_hub.publish(ListingChange {
        owner_id: user.id,
        listing_id,
    });

    Ok(SubmissionReceipt {
        submission_id,
        listing_id,
        kind,
        image_url: prepared.image_url,
        parsed_items: prepared.parsed_items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::error::AppResult;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryBlobs {
        stored: Mutex<Vec<String>>,
        fail_put: bool,
    }

    #[async_trait]
    impl BlobStore for MemoryBlobs {
        async fn put(&self, key: &str, _data: &[u8], content_type: &str) -> AppResult<BlobRef> {
            if self.fail_put {
                return Err(AppError::Storage("bucket unavailable".to_string()));
            }
            self.stored.lock().unwrap().push(key.to_string());
            Ok(BlobRef {
                key: key.to_string(),
                content_type: content_type.to_string(),
            })
        }

        async fn delete(&self, key: &str) -> AppResult<()> {
            self.stored.lock().unwrap().retain(|k| k != key);
            Ok(())
        }

        fn download_url(&self, blob: &BlobRef) -> String {
            format!("http://blobs.test/{}", blob.key)
        }
    }

    struct FixedText(Result<&'static str, &'static str>);

    #[async_trait]
    impl OcrEngine for FixedText {
        async fn recognize(&self, _: &[u8], _: &str, _: &str) -> Result<String, OcrError> {
            self.0
                .map(str::to_string)
                .map_err(|e| OcrError::Engine(e.to_string()))
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn user(role: Option<Role>) -> UserData {
        UserData {
            id: Uuid::new_v4(),
            email: "seller@example.com".to_string(),
            name: None,
            role,
        }
    }

    fn upload() -> SubmissionUpload {
        SubmissionUpload {
            file_name: "invoice.png".to_string(),
            content_type: Some("image/png".to_string()),
            bytes: b"\x89PNG fake".to_vec(),
            pickup_location: " 12 Main St ".to_string(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn sell_pipeline_uploads_reads_and_parses() {
        let blobs = MemoryBlobs::default();
        let engine = FixedText(Ok("Laptop 2\nMonitor\n"));
        let seller = user(Some(Role::Individual));

        let prepared = prepare(&blobs, &engine, "eng", &seller, ListingKind::Sell, upload())
            .await
            .unwrap();

        assert_eq!(prepared.pickup_location, "12 Main St");
        assert!(prepared.image_url.starts_with("http://blobs.test/uploads/"));
        assert!(prepared.image_url.ends_with("-invoice.png"));
        assert_eq!(prepared.blob.content_type, "image/png");
        let items = prepared.parsed_items.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].product, "Laptop");
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[1].quantity, 1);
        assert_eq!(blobs.stored.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sell_submission_renders_confirmation() {
        let blobs = MemoryBlobs::default();
        let seller = user(Some(Role::Individual));
        let mut form = upload();
        form.notes = Some("not kept for sales".to_string());

        let prepared = prepare(
            &blobs,
            &FixedText(Ok("Laptop 2")),
            "eng",
            &seller,
            ListingKind::Sell,
            form,
        )
        .await
        .unwrap();
        assert!(prepared.notes.is_none());

        let receipt = SubmissionReceipt {
            submission_id: Uuid::new_v4(),
            listing_id: Uuid::new_v4(),
            kind: ListingKind::Sell,
            image_url: prepared.image_url.clone(),
            parsed_items: prepared.parsed_items.clone(),
        };
        let identity = crate::auth::Identity::Authenticated(seller);
        let mut ctx = crate::templates::base_context(&identity);
        ctx.insert("kind", receipt.kind.as_str());
        ctx.insert("receipt", &receipt);
        let html = crate::templates::render("submitted.html", &ctx);

        assert!(html.contains("Listing submitted"));
        assert!(html.contains("Laptop"));
        assert!(html.contains("href=\"/sell\""));
    }

    #[tokio::test]
    async fn donate_pipeline_keeps_raw_text_only() {
        let blobs = MemoryBlobs::default();
        let engine = FixedText(Ok("Old phones 5"));
        let mut form = upload();
        form.notes = Some("  ring the bell ".to_string());

        let prepared = prepare(&blobs, &engine, "eng", &user(None), ListingKind::Donate, form)
            .await
            .unwrap();

        assert!(prepared.parsed_items.is_none());
        assert_eq!(prepared.extracted_text, "Old phones 5");
        assert_eq!(prepared.notes.as_deref(), Some("ring the bell"));
        assert!(prepared.blob.key.starts_with("donations/"));
    }

    #[tokio::test]
    async fn ngo_cannot_donate() {
        let blobs = MemoryBlobs::default();
        let result = prepare(
            &blobs,
            &FixedText(Ok("x")),
            "eng",
            &user(Some(Role::Ngo)),
            ListingKind::Donate,
            upload(),
        )
        .await;
        assert!(matches!(result, Err(PipelineError::Forbidden(_))));
        assert!(blobs.stored.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ngo_can_still_sell() {
        let blobs = MemoryBlobs::default();
        let result = prepare(
            &blobs,
            &FixedText(Ok("Desk fan 1")),
            "eng",
            &user(Some(Role::Ngo)),
            ListingKind::Sell,
            upload(),
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn missing_file_or_location_is_rejected_before_upload() {
        let blobs = MemoryBlobs::default();
        let engine = FixedText(Ok("x"));
        let seller = user(None);

        let mut no_file = upload();
        no_file.bytes.clear();
        let result = prepare(&blobs, &engine, "eng", &seller, ListingKind::Sell, no_file).await;
        assert!(matches!(result, Err(PipelineError::Validation(_))));

        let mut no_location = upload();
        no_location.pickup_location = "   ".to_string();
        let result = prepare(&blobs, &engine, "eng", &seller, ListingKind::Sell, no_location).await;
        assert!(matches!(result, Err(PipelineError::Validation(_))));

        assert!(blobs.stored.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn upload_failure_stops_the_pipeline() {
        let blobs = MemoryBlobs {
            fail_put: true,
            ..Default::default()
        };
        let result = prepare(
            &blobs,
            &FixedText(Ok("x")),
            "eng",
            &user(None),
            ListingKind::Sell,
            upload(),
        )
        .await;
        let err = result.unwrap_err();
        assert!(matches!(err, PipelineError::Upload(_)));
        assert_eq!(err.user_message(), "Uploading your file failed. Please try again.");
    }

    #[tokio::test]
    async fn ocr_failure_removes_the_uploaded_blob() {
        let blobs = MemoryBlobs::default();
        let result = prepare(
            &blobs,
            &FixedText(Err("engine crashed")),
            "eng",
            &user(None),
            ListingKind::Sell,
            upload(),
        )
        .await;
        assert!(matches!(result, Err(PipelineError::Ocr(_))));
        assert!(blobs.stored.lock().unwrap().is_empty());
    }
}
