//! Production implementations of the intake flow's adapter traits.

pub mod generation;
pub mod ocr;
pub mod openrouter;
pub mod pdf;

pub use generation::LlmGenerator;
pub use ocr::VisionOcrExtractor;
pub use openrouter::OpenRouterClient;
pub use pdf::PdfRenderer;
