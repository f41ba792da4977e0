// Text recognition for uploaded product lists.
// Images go to the configured engine; PDFs use their embedded text layer.
mod parse;

pub use parse::{parse_items, ParsedItem};

use std::io::Write;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::config::{Config, OcrBackend};
use crate::error::AppError;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("OCR engine failed: {0}")]
    Engine(String),
    #[error("OCR I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("OCR service request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("No readable text found in {0}")]
    NoText(String),
}

impl From<OcrError> for AppError {
    fn from(err: OcrError) -> Self {
        AppError::Ocr(err.to_string())
    }
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Plain text recognized in `image`. Blocks the caller until done.
    async fn recognize(&self, image: &[u8], file_name: &str, language: &str)
        -> Result<String, OcrError>;

    fn name(&self) -> &'static str;
}

/// Runs the `tesseract` binary on a temp copy of the upload.
pub struct TesseractCli {
    binary: String,
}

impl TesseractCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractCli {
    async fn recognize(
        &self,
        image: &[u8],
        file_name: &str,
        language: &str,
    ) -> Result<String, OcrError> {
        let binary = self.binary.clone();
        let language = language.to_string();
        let suffix = std::path::Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        let image = image.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut tmp = tempfile::Builder::new()
                .prefix("recircuit-ocr-")
                .suffix(&suffix)
                .tempfile()?;
            tmp.write_all(&image)?;
            tmp.flush()?;

            let output = Command::new(&binary)
                .arg(tmp.path())
                .arg("stdout")
                .arg("-l")
                .arg(&language)
                .output()?;

            if !output.status.success() {
                return Err(OcrError::Engine(
                    String::from_utf8_lossy(&output.stderr).trim().to_string(),
                ));
            }
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        })
        .await
        .map_err(|e| OcrError::Engine(format!("OCR task panicked: {}", e)))?
    }

    fn name(&self) -> &'static str {
        "tesseract"
    }
}

#[derive(Debug, Deserialize)]
struct RemoteOcrResponse {
    text: String,
}

/// Posts the upload as multipart to an OCR HTTP service answering `{"text": ...}`.
pub struct RemoteOcr {
    client: Client,
    url: String,
}

impl RemoteOcr {
    pub fn new(url: String, timeout: Duration) -> Result<Self, OcrError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl OcrEngine for RemoteOcr {
    async fn recognize(
        &self,
        image: &[u8],
        file_name: &str,
        language: &str,
    ) -> Result<String, OcrError> {
        let mime = mime_guess::from_path(file_name).first_or_octet_stream();
        let part = reqwest::multipart::Part::bytes(image.to_vec())
            .file_name(file_name.to_string())
            .mime_str(mime.essence_str())?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("language", language.to_string());

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?;

        let body: RemoteOcrResponse = response.json().await?;
        tracing::info!("Remote OCR returned {} chars for {}", body.text.len(), file_name);
        Ok(body.text)
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

pub fn build_engine(config: &Config) -> Result<Arc<dyn OcrEngine>, OcrError> {
    match &config.ocr_backend {
        OcrBackend::Tesseract { binary } => Ok(Arc::new(TesseractCli::new(binary.clone()))),
        OcrBackend::Remote { url, timeout } => Ok(Arc::new(RemoteOcr::new(url.clone(), *timeout)?)),
    }
}

pub fn is_pdf(file_name: &str, content_type: Option<&str>) -> bool {
    content_type.map_or(false, |ct| ct.eq_ignore_ascii_case("application/pdf"))
        || file_name.to_lowercase().ends_with(".pdf")
}

/// Text of an uploaded product list, whatever its format.
pub async fn extract_text(
    engine: &dyn OcrEngine,
    bytes: &[u8],
    file_name: &str,
    content_type: Option<&str>,
    language: &str,
) -> Result<String, OcrError> {
    if is_pdf(file_name, content_type) {
        let data = bytes.to_vec();
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data))
            .await
            .map_err(|e| OcrError::Engine(format!("PDF task panicked: {}", e)))?
            .map_err(|e| OcrError::Engine(format!("PDF extraction error: {}", e)))?;
        if text.trim().is_empty() {
            return Err(OcrError::NoText(file_name.to_string()));
        }
        return Ok(text);
    }

    engine.recognize(bytes, file_name, language).await
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl OcrEngine for Echo {
        async fn recognize(&self, image: &[u8], _: &str, language: &str) -> Result<String, OcrError> {
            Ok(format!("{}:{}", language, String::from_utf8_lossy(image)))
        }

        fn name(&self) -> &'static str {
            "echo"
        }
    }

    #[test]
    fn pdf_detection_uses_type_or_extension() {
        assert!(is_pdf("list.PDF", None));
        assert!(is_pdf("scan", Some("application/pdf")));
        assert!(!is_pdf("photo.png", Some("image/png")));
    }

    #[tokio::test]
    async fn images_go_to_the_engine() {
        let text = extract_text(&Echo, b"Laptop 2", "list.png", Some("image/png"), "eng")
            .await
            .unwrap();
        assert_eq!(text, "eng:Laptop 2");
    }

    #[tokio::test]
    async fn unreadable_pdf_is_an_error() {
        let result = extract_text(&Echo, b"not a pdf", "list.pdf", None, "eng").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn missing_tesseract_binary_fails_cleanly() {
        let engine = TesseractCli::new("/nonexistent/tesseract-binary");
        let result = engine.recognize(b"\x89PNG", "x.png", "eng").await;
        assert!(matches!(result, Err(OcrError::Io(_))));
    }
}
