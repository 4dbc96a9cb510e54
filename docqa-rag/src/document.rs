//! Data types for parsed documents, chunks, indexed points and answers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One element of a parsed document, in reading order.
///
/// The serialized form matches the structured JSON emitted by the upstream
/// layout extractor: `{"type": "text", "text": ...}` or
/// `{"type": "image", "index": n, "caption": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentElement {
    /// A run of extracted text.
    Text {
        /// The text content.
        #[serde(rename = "text")]
        content: String,
    },
    /// A picture, described by a caption from the captioning service.
    Image {
        /// 1-based position of the picture within the document.
        index: usize,
        /// Best-effort caption. May be a formatted error message.
        #[serde(default)]
        caption: String,
        /// The base64 image the caption was (or will be) generated from.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image_base64: Option<String>,
    },
}

impl DocumentElement {
    /// Create a text element.
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text { content: content.into() }
    }

    /// Create an image element with an already generated caption.
    pub fn image(index: usize, caption: impl Into<String>) -> Self {
        Self::Image { index, caption: caption.into(), image_base64: None }
    }
}

/// A parsed document: its name plus its elements in reading order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StructuredDocument {
    /// Name of the source document (usually the file stem).
    #[serde(rename = "document")]
    pub name: String,
    /// Ordered elements.
    #[serde(default)]
    pub content: Vec<DocumentElement>,
}

impl StructuredDocument {
    /// Create a document from its name and elements.
    pub fn new(name: impl Into<String>, content: Vec<DocumentElement>) -> Self {
        Self { name: name.into(), content }
    }

    /// Combine text and image captions into a single text document.
    ///
    /// Elements are joined by a blank line. Text is trimmed and empty text
    /// elements are skipped; images contribute `Image Caption: ...`, falling
    /// back to `[Image n]` when the caption is empty.
    pub fn to_text(&self) -> String {
        let mut parts = Vec::with_capacity(self.content.len());
        for element in &self.content {
            match element {
                DocumentElement::Text { content } => {
                    let trimmed = content.trim();
                    if !trimmed.is_empty() {
                        parts.push(trimmed.to_string());
                    }
                }
                DocumentElement::Image { index, caption, .. } => {
                    let caption = caption.trim();
                    if caption.is_empty() {
                        parts.push(format!("Image Caption: [Image {index}]"));
                    } else {
                        parts.push(format!("Image Caption: {caption}"));
                    }
                }
            }
        }
        parts.join("\n\n")
    }
}

/// A segment of a text document prepared for embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Position of the chunk in the document, starting at 0.
    pub index: usize,
    /// The chunk text, including any overlap carried from its predecessor.
    pub text: String,
    /// Char offset of the first char of `text` in the source text.
    pub start: usize,
    /// Number of leading chars of `text` repeated from the previous chunk.
    pub overlap: usize,
}

impl Chunk {
    /// The part of the chunk that is not shared with the previous chunk.
    pub fn fresh_text(&self) -> &str {
        match self.text.char_indices().nth(self.overlap) {
            Some((byte, _)) => &self.text[byte..],
            None => "",
        }
    }
}

/// Identifier of a stored point, unique within its collection.
pub type PointId = u64;

/// The payload stored alongside each vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointPayload {
    /// The chunk text.
    pub text: String,
    /// Position of the chunk within its source document.
    pub chunk_index: usize,
}

/// The persisted unit of the vector index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedPoint {
    /// Generated identifier; also records insertion order.
    pub id: PointId,
    /// The embedding of `payload.text`.
    pub vector: Vec<f32>,
    /// The chunk the vector was computed from.
    pub payload: PointPayload,
}

/// A retrieved chunk paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResult {
    /// The id of the point the text was stored under.
    pub id: PointId,
    /// The chunk text.
    pub text: String,
    /// Position of the chunk within its source document.
    pub chunk_index: usize,
    /// Similarity score (higher is more relevant).
    pub score: f32,
}

/// The message shown when no chunk could be retrieved for a query.
pub const NO_RELEVANT_INFORMATION: &str = "No relevant information found.";

/// The outcome of a query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Answer {
    /// The index held no candidate for the query. A valid outcome, not an error.
    NoRelevantInformation,
    /// A single merged answer.
    Text(String),
    /// The ranked chunk texts, best first, when no merge was requested.
    Ranked(Vec<String>),
}

impl Answer {
    /// The single best text of this answer, if there is one.
    ///
    /// For a ranked answer this is its first element.
    pub fn best(&self) -> Option<&str> {
        match self {
            Answer::NoRelevantInformation => None,
            Answer::Text(text) => Some(text),
            Answer::Ranked(texts) => texts.first().map(String::as_str),
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::NoRelevantInformation => f.write_str(NO_RELEVANT_INFORMATION),
            Answer::Text(text) => f.write_str(text),
            Answer::Ranked(texts) if texts.is_empty() => f.write_str(NO_RELEVANT_INFORMATION),
            Answer::Ranked(texts) => {
                for (i, text) in texts.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}. {}", i + 1, text)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_upstream_structured_json() {
        let json = r#"{
            "document": "report",
            "content": [
                {"type": "text", "text": "  Intro paragraph. "},
                {"type": "image", "index": 1, "image_base64": "aGk=", "caption": "A bar chart"},
                {"type": "text", "text": ""},
                {"type": "image", "index": 2, "caption": ""}
            ]
        }"#;
        let doc: StructuredDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.name, "report");
        assert_eq!(doc.content.len(), 4);
        assert_eq!(
            doc.to_text(),
            "Intro paragraph.\n\nImage Caption: A bar chart\n\nImage Caption: [Image 2]"
        );
    }

    #[test]
    fn image_without_base64_serializes_without_field() {
        let json = serde_json::to_value(DocumentElement::image(3, "cat")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "image", "index": 3, "caption": "cat"}));
    }

    #[test]
    fn fresh_text_skips_overlap_chars() {
        let chunk = Chunk { index: 1, text: "héllo world".into(), start: 4, overlap: 3 };
        assert_eq!(chunk.fresh_text(), "lo world");
        let all_overlap = Chunk { index: 1, text: "ab".into(), start: 0, overlap: 2 };
        assert_eq!(all_overlap.fresh_text(), "");
    }

    #[test]
    fn answer_display_uses_sentinel() {
        assert_eq!(Answer::NoRelevantInformation.to_string(), NO_RELEVANT_INFORMATION);
        assert_eq!(Answer::Ranked(vec!["a".into(), "b".into()]).to_string(), "1. a\n2. b");
        assert_eq!(Answer::Ranked(vec!["a".into()]).best(), Some("a"));
    }
}
