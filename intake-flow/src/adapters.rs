//! Contracts for the external capabilities the intake flow calls into.
//!
//! Adapters report failures as [`AdapterError`]; what the user sees when one
//! fails is decided by the state machine, not by the adapter.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::session::FileRef;

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Backend returned status {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Rendering failed: {0}")]
    Render(String),
}

/// Best-effort text extraction from a stored upload
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, file_ref: &FileRef) -> Result<String, AdapterError>;
}

/// Turns a natural-language instruction into a reply
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, instruction: &str) -> Result<String, AdapterError>;
}

/// Writes `text` to a document at `output_path`, returning where it landed
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(&self, text: &str, output_path: &Path) -> Result<PathBuf, AdapterError>;
}

#[derive(Clone)]
pub struct Adapters {
    pub extractor: Arc<dyn DocumentExtractor>,
    pub generator: Arc<dyn TextGenerator>,
    pub renderer: Arc<dyn DocumentRenderer>,
}

impl Adapters {
    pub fn new(
        extractor: Arc<dyn DocumentExtractor>,
        generator: Arc<dyn TextGenerator>,
        renderer: Arc<dyn DocumentRenderer>,
    ) -> Self {
        Self {
            extractor,
            generator,
            renderer,
        }
    }
}
