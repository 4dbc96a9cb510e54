//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and three implementations:
//!
//! - [`FixedSizeChunker`] — a sliding character window with configurable overlap
//! - [`SentenceChunker`] — greedily packs whole sentences, carrying a character
//!   tail of each chunk into the next
//! - [`RecursiveChunker`] — splits by paragraphs, lines, then words, and packs
//!   the pieces without ever exceeding the chunk size
//!
//! Sizes are counted in chars, so multi-byte text is never cut inside a
//! character. Every strategy keeps every char of the input: dropping the
//! first [`Chunk::overlap`] chars of each chunk and concatenating the rest
//! reproduces the original text.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::document::Chunk;
use crate::error::{RagError, Result};

/// A strategy for splitting a text document into chunks.
pub trait Chunker: Send + Sync {
    /// Split text into chunks, in source order.
    ///
    /// Returns an empty `Vec` for empty text.
    fn chunk(&self, text: &str) -> Vec<Chunk>;
}

/// The available chunking strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkStrategy {
    /// Fixed-size character windows, ignoring sentence boundaries.
    Fixed,
    /// Whole sentences packed up to the chunk size.
    #[default]
    SentenceAware,
    /// Paragraph, line, then word separators, falling back to hard cuts.
    Recursive,
}

impl fmt::Display for ChunkStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkStrategy::Fixed => f.write_str("fixed"),
            ChunkStrategy::SentenceAware => f.write_str("sentence-aware"),
            ChunkStrategy::Recursive => f.write_str("recursive"),
        }
    }
}

impl FromStr for ChunkStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" | "character" => Ok(ChunkStrategy::Fixed),
            "sentence-aware" | "sentence" | "nltk" => Ok(ChunkStrategy::SentenceAware),
            "recursive" | "langchain" => Ok(ChunkStrategy::Recursive),
            other => Err(format!(
                "unknown chunk strategy '{other}' \
                 (expected 'fixed', 'sentence-aware' or 'recursive')"
            )),
        }
    }
}

fn validate(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::ChunkingError("chunk_size must be greater than zero".to_string()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::ChunkingError(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Build the chunker for a strategy.
///
/// # Errors
///
/// Returns [`RagError::ChunkingError`] unless `0 <= chunk_overlap < chunk_size`.
pub fn chunker_for(
    strategy: ChunkStrategy,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Arc<dyn Chunker>> {
    Ok(match strategy {
        ChunkStrategy::Fixed => Arc::new(FixedSizeChunker::new(chunk_size, chunk_overlap)?),
        ChunkStrategy::SentenceAware => {
            Arc::new(SentenceChunker::new(chunk_size, chunk_overlap)?)
        }
        ChunkStrategy::Recursive => Arc::new(RecursiveChunker::new(chunk_size, chunk_overlap)?),
    })
}

/// Split `text` with the given strategy.
///
/// # Errors
///
/// Returns [`RagError::ChunkingError`] unless `0 <= chunk_overlap < chunk_size`.
pub fn chunk_text(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    strategy: ChunkStrategy,
) -> Result<Vec<Chunk>> {
    Ok(chunker_for(strategy, chunk_size, chunk_overlap)?.chunk(text))
}

/// Splits text into fixed-size character windows with configurable overlap.
///
/// Consecutive windows start `chunk_size - chunk_overlap` chars apart. The
/// last window ends at the end of the text; no window is emitted that lies
/// entirely inside its predecessor.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(256, 50)?;
/// let chunks = chunker.chunk(&text);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` — number of characters per window
    /// * `chunk_overlap` — number of characters shared by consecutive windows
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }

        // Byte offset of every char boundary, including the end of the text.
        let bounds: Vec<usize> =
            text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
        let total = bounds.len() - 1;
        let step = self.chunk_size - self.chunk_overlap;

        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(total);
            let index = chunks.len();
            chunks.push(Chunk {
                index,
                text: text[bounds[start]..bounds[end]].to_string(),
                start,
                overlap: if index == 0 { 0 } else { self.chunk_overlap },
            });
            if end == total {
                break;
            }
            start += step;
        }

        chunks
    }
}

/// Packs whole sentences into chunks of at most `chunk_size` characters.
///
/// Sentences come from Unicode sentence segmentation and keep their trailing
/// whitespace. When the next sentence would overflow the current chunk, the
/// chunk is closed and the next one opens with the last `chunk_overlap`
/// chars of the closed chunk followed by that sentence. The first sentence
/// of a chunk is always admitted, so a sentence longer than `chunk_size`
/// becomes its own oversized chunk instead of being cut.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::SentenceChunker;
///
/// let chunker = SentenceChunker::new(300, 50)?;
/// let chunks = chunker.chunk(&text);
/// ```
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl SentenceChunker {
    /// Create a new `SentenceChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` — target number of characters per chunk
    /// * `chunk_overlap` — number of trailing characters carried into the next chunk
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

/// The last `n` chars of `text`, and how many chars that is.
fn char_tail(text: &str, n: usize) -> (&str, usize) {
    if n == 0 {
        return ("", 0);
    }
    match text.char_indices().rev().nth(n - 1) {
        Some((byte, _)) => (&text[byte..], n),
        None => (text, text.chars().count()),
    }
}

/// Chunk under construction. Its text is always a contiguous slice of the source.
struct OpenChunk {
    text: String,
    len: usize,
    start: usize,
    overlap: usize,
    has_piece: bool,
}

impl OpenChunk {
    fn close(self, chunks: &mut Vec<Chunk>) {
        chunks.push(Chunk {
            index: chunks.len(),
            text: self.text,
            start: self.start,
            overlap: self.overlap,
        });
    }
}

/// Greedily pack contiguous `pieces` of a text into chunks.
///
/// A chunk closes when the next piece would push it past `chunk_size`; the
/// next chunk opens with a char tail of the closed one. With `bounded`, the
/// tail shrinks so that tail plus piece still fits.
fn pack<'a>(
    pieces: impl IntoIterator<Item = &'a str>,
    chunk_size: usize,
    chunk_overlap: usize,
    bounded: bool,
) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut consumed = 0;
    let mut current =
        OpenChunk { text: String::new(), len: 0, start: 0, overlap: 0, has_piece: false };

    for piece in pieces {
        let piece_len = piece.chars().count();

        if current.has_piece && current.len + piece_len > chunk_size {
            let carry_want = if bounded {
                chunk_overlap.min(chunk_size.saturating_sub(piece_len))
            } else {
                chunk_overlap
            };
            let (carry, carry_len) = char_tail(&current.text, carry_want);
            let next = OpenChunk {
                text: carry.to_string(),
                len: carry_len,
                start: consumed - carry_len,
                overlap: carry_len,
                has_piece: false,
            };
            std::mem::replace(&mut current, next).close(&mut chunks);
        }

        current.text.push_str(piece);
        current.len += piece_len;
        current.has_piece = true;
        consumed += piece_len;
    }

    if current.has_piece {
        current.close(&mut chunks);
    }
    chunks
}

impl Chunker for SentenceChunker {
    fn chunk(&self, text: &str) -> Vec<Chunk> {
        pack(text.split_sentence_bounds(), self.chunk_size, self.chunk_overlap, false)
    }
}

const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Splits text on the coarsest separator that yields pieces of at most
/// `chunk_size` chars, then packs the pieces.
///
/// Paragraph breaks are tried first, then line breaks, then spaces; a run
/// with no separator left is cut every `chunk_size` chars. Separators stay
/// attached to the piece they end. Unlike [`SentenceChunker`], no chunk is
/// ever longer than `chunk_size`: the carried tail is shortened when the
/// next piece needs the room.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(300, 50)?;
/// let chunks = chunker.chunk(&text);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` — maximum number of characters per chunk
    /// * `chunk_overlap` — maximum number of trailing characters carried into the next chunk
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

fn split_recursive<'a>(
    text: &'a str,
    chunk_size: usize,
    separators: &[&str],
    out: &mut Vec<&'a str>,
) {
    if text.chars().count() <= chunk_size {
        out.push(text);
        return;
    }
    match separators.split_first() {
        Some((separator, rest)) => {
            for part in text.split_inclusive(*separator) {
                split_recursive(part, chunk_size, rest, out);
            }
        }
        None => {
            let mut rest = text;
            while !rest.is_empty() {
                let cut = rest.char_indices().nth(chunk_size).map_or(rest.len(), |(i, _)| i);
                let (head, tail) = rest.split_at(cut);
                out.push(head);
                rest = tail;
            }
        }
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }
        let mut pieces = Vec::new();
        split_recursive(text, self.chunk_size, &SEPARATORS, &mut pieces);
        pack(pieces, self.chunk_size, self.chunk_overlap, true)
    }
}
