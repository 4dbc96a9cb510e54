//! Loading source files into [`StructuredDocument`]s.
//!
//! PDF layout extraction happens upstream; this crate consumes its
//! structured JSON output, plain text files and standalone images.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, info};

use crate::captioning::{Captioner, DEFAULT_CAPTION_PROMPT};
use crate::document::{DocumentElement, StructuredDocument};
use crate::error::{RagError, Result};

/// Turns a file into a [`StructuredDocument`].
#[async_trait]
pub trait DocumentParser: Send + Sync {
    /// Parse the file at `path`.
    async fn parse(&self, path: &Path) -> Result<StructuredDocument>;
}

fn document_error(path: &Path, message: impl Into<String>) -> RagError {
    RagError::DocumentError { path: path.display().to_string(), message: message.into() }
}

fn file_stem(path: &Path) -> String {
    path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
}

async fn read_to_string(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path).await.map_err(|e| document_error(path, e.to_string()))
}

/// Reads the structured-document JSON produced by the layout extractor.
///
/// Image elements that arrive without a caption but with their
/// `image_base64` bytes are captioned through the configured [`Captioner`].
/// Without a captioner they keep an empty caption.
pub struct JsonDocumentParser {
    captioner: Option<Arc<dyn Captioner>>,
    prompt: String,
}

impl Default for JsonDocumentParser {
    fn default() -> Self {
        Self { captioner: None, prompt: DEFAULT_CAPTION_PROMPT.to_string() }
    }
}

impl JsonDocumentParser {
    /// A parser that leaves captions as found.
    pub fn new() -> Self {
        Self::default()
    }

    /// Caption uncaptioned images with `captioner`.
    pub fn with_captioner(mut self, captioner: Arc<dyn Captioner>) -> Self {
        self.captioner = Some(captioner);
        self
    }

    /// Override the caption prompt.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }
}

#[async_trait]
impl DocumentParser for JsonDocumentParser {
    async fn parse(&self, path: &Path) -> Result<StructuredDocument> {
        let raw = read_to_string(path).await?;
        let mut document: StructuredDocument = serde_json::from_str(&raw)
            .map_err(|e| document_error(path, format!("invalid document JSON: {e}")))?;
        if document.name.is_empty() {
            document.name = file_stem(path);
        }

        let mut captioned = 0usize;
        if let Some(captioner) = &self.captioner {
            for element in &mut document.content {
                if let DocumentElement::Image { index, caption, image_base64: Some(image) } =
                    element
                {
                    if caption.trim().is_empty() {
                        debug!(index = *index, "captioning image");
                        *caption = captioner.caption(image, &self.prompt).await;
                        captioned += 1;
                    }
                }
            }
        }

        info!(
            document = %document.name,
            elements = document.content.len(),
            captioned,
            "parsed structured document"
        );
        Ok(document)
    }
}

/// Reads a text or Markdown file as a single text element.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextParser;

#[async_trait]
impl DocumentParser for PlainTextParser {
    async fn parse(&self, path: &Path) -> Result<StructuredDocument> {
        let text = read_to_string(path).await?;
        Ok(StructuredDocument::new(file_stem(path), vec![DocumentElement::text(text)]))
    }
}

/// Captions a standalone image file into a one-element document.
pub struct ImageFileParser {
    captioner: Arc<dyn Captioner>,
    prompt: String,
}

impl ImageFileParser {
    /// Create a parser captioning with `captioner` and the default prompt.
    pub fn new(captioner: Arc<dyn Captioner>) -> Self {
        Self { captioner, prompt: DEFAULT_CAPTION_PROMPT.to_string() }
    }
}

#[async_trait]
impl DocumentParser for ImageFileParser {
    async fn parse(&self, path: &Path) -> Result<StructuredDocument> {
        let bytes = tokio::fs::read(path).await.map_err(|e| document_error(path, e.to_string()))?;
        let image_base64 = STANDARD.encode(&bytes);
        let caption = self.captioner.caption(&image_base64, &self.prompt).await;
        Ok(StructuredDocument::new(
            file_stem(path),
            vec![DocumentElement::Image { index: 1, caption, image_base64: Some(image_base64) }],
        ))
    }
}

/// Pick a parser from the file extension.
///
/// `.json` → [`JsonDocumentParser`], `.txt`/`.md` → [`PlainTextParser`],
/// `.png`/`.jpg`/`.jpeg`/`.webp` → [`ImageFileParser`] (needs a captioner).
///
/// # Errors
///
/// Returns [`RagError::DocumentError`] for PDFs and unknown extensions, and
/// [`RagError::ConfigError`] for an image without a captioner.
pub fn parser_for_path(
    path: &Path,
    captioner: Option<Arc<dyn Captioner>>,
) -> Result<Box<dyn DocumentParser>> {
    let extension =
        path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase()).unwrap_or_default();
    match extension.as_str() {
        "json" => {
            let parser = JsonDocumentParser::new();
            Ok(Box::new(match captioner {
                Some(captioner) => parser.with_captioner(captioner),
                None => parser,
            }))
        }
        "txt" | "md" | "markdown" => Ok(Box::new(PlainTextParser)),
        "png" | "jpg" | "jpeg" | "webp" => match captioner {
            Some(captioner) => Ok(Box::new(ImageFileParser::new(captioner))),
            None => Err(RagError::ConfigError(
                "captioning an image requires a captioning service".to_string(),
            )),
        },
        "pdf" => Err(document_error(
            path,
            "PDF layout extraction is not built in; convert the PDF to structured JSON first",
        )),
        other => Err(document_error(path, format!("unsupported file type '{other}'"))),
    }
}
