pub mod gemini;
pub mod media;

use anyhow::Result;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};

pub use gemini::GeminiClient;

/// An image ready for a model request: base64 payload plus MIME type.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

impl InlineImage {
    pub fn from_bytes(bytes: &[u8], mime_type: String) -> Self {
        InlineImage {
            mime_type,
            data: general_purpose::STANDARD.encode(bytes),
        }
    }
}

/// Seam between the request handlers and the hosted model. Handlers only see
/// this trait, so tests swap in a fake instead of calling the real API.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn analyze_image(&self, prompt: &str, image: &InlineImage) -> Result<String>;
}
