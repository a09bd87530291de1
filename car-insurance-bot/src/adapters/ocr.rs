use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{DynamicImage, ImageFormat};
use intake_flow::{AdapterError, DocumentExtractor, FileRef};
use pdf2image::{PDF, Pages};
use serde_json::{Value, json};
use std::io::Cursor;
use tracing::{info, warn};

use super::openrouter::OpenRouterClient;
use crate::telegram::TelegramClient;

const OCR_MAX_TOKENS: u32 = 2000;

/// Reads an uploaded Telegram file and transcribes it with a vision model.
///
/// Photos are decoded directly, PDFs are rendered page by page first. All
/// pages go to the model in a single request.
pub struct VisionOcrExtractor {
    telegram: TelegramClient,
    llm: OpenRouterClient,
    model: String,
}

impl VisionOcrExtractor {
    pub fn new(telegram: TelegramClient, llm: OpenRouterClient, model: impl Into<String>) -> Self {
        Self {
            telegram,
            llm,
            model: model.into(),
        }
    }
}

#[async_trait]
impl DocumentExtractor for VisionOcrExtractor {
    async fn extract(&self, file_ref: &FileRef) -> Result<String, AdapterError> {
        let (bytes, file_path) = self
            .telegram
            .download_file(file_ref.as_str())
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        info!(file_ref = %file_ref, %file_path, size = bytes.len(), "downloaded upload for OCR");

        let pages = tokio::task::spawn_blocking(move || decode_pages(bytes))
            .await
            .map_err(|e| AdapterError::InvalidResponse(format!("page decoding panicked: {e}")))??;

        let mut content = vec![json!({
            "type": "text",
            "text": ocr_prompt(pages.len())
        })];
        for page in &pages {
            content.push(image_content(page)?);
        }

        let text = self
            .llm
            .chat_completion(&self.model, content, OCR_MAX_TOKENS)
            .await?;

        if text.trim().is_empty() {
            warn!(file_ref = %file_ref, "vision OCR returned no text");
            return Err(AdapterError::InvalidResponse("no text extracted".into()));
        }

        info!(
            file_ref = %file_ref,
            pages = pages.len(),
            chars = text.len(),
            "vision OCR completed"
        );
        Ok(text.trim().to_string())
    }
}

fn ocr_prompt(pages: usize) -> String {
    format!(
        "You are an OCR system for identity and vehicle registration documents. \
        I'm providing you with {pages} image(s) of a single document. \
        Extract ALL readable text with exact spelling of names, numbers and dates, \
        one field per line.\n\n\
        Return ONLY the extracted text without any commentary or explanations."
    )
}

fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}

fn decode_pages(bytes: Vec<u8>) -> Result<Vec<DynamicImage>, AdapterError> {
    if is_pdf(&bytes) {
        let pdf = PDF::from_bytes(bytes)
            .map_err(|e| AdapterError::InvalidResponse(format!("failed to load PDF: {e}")))?;
        let pages = pdf
            .render(Pages::All, None)
            .map_err(|e| {
                AdapterError::InvalidResponse(format!("failed to render PDF pages: {e}"))
            })?;
        if pages.is_empty() {
            return Err(AdapterError::InvalidResponse("PDF has no pages".into()));
        }
        return Ok(pages);
    }

    let image = image::load_from_memory(&bytes)
        .map_err(|e| AdapterError::InvalidResponse(format!("unsupported upload: {e}")))?;
    Ok(vec![image])
}

fn image_content(image: &DynamicImage) -> Result<Value, AdapterError> {
    Ok(json!({
        "type": "image_url",
        "image_url": {
            "url": format!("data:image/png;base64,{}", image_to_base64(image)?)
        }
    }))
}

fn image_to_base64(image: &DynamicImage) -> Result<String, AdapterError> {
    let mut buffer = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| AdapterError::InvalidResponse(format!("failed to encode image: {e}")))?;
    Ok(STANDARD.encode(&buffer))
}
