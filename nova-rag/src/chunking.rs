//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`SentenceChunker`]: packs whole sentences greedily up to a character
//!   budget, seeding each chunk with the tail of the previous one
//! - [`RecursiveCharacterChunker`]: splits hierarchically by paragraphs,
//!   lines, then words, falling back to fixed character windows
//!
//! All sizes are measured in characters, never bytes.

use std::sync::Arc;

use tracing::debug;

use crate::config::{ChunkingConfig, SplitterKind};
use crate::document::{CHUNK_INDEX_KEY, Document, PARENT_ID_KEY, TOTAL_CHUNKS_KEY};

/// Smallest chunk size a chunker will accept; smaller requests are raised to this.
pub const MIN_CHUNK_SIZE: usize = 100;

const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?', '。', '！', '？'];

/// A strategy for splitting documents into chunks.
///
/// Chunks are ordinary [`Document`]s with ids of the form
/// `{parent_id}-chunk-{index}` and the parent's metadata plus
/// `parentId`, `chunkIndex` and `totalChunks`.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` for empty content and the document itself,
    /// unchanged, when it already fits in one chunk.
    fn split(&self, document: &Document) -> Vec<Document>;
}

/// Build the chunker selected by `config`.
pub fn chunker_from_config(config: &ChunkingConfig) -> Arc<dyn Chunker> {
    match config.splitter {
        SplitterKind::Sentence => {
            Arc::new(SentenceChunker::new(config.chunk_size, config.chunk_overlap))
        }
        SplitterKind::Character => {
            Arc::new(RecursiveCharacterChunker::new(config.chunk_size, config.chunk_overlap))
        }
    }
}

/// Clamp a requested size/overlap pair: the size is raised to
/// [`MIN_CHUNK_SIZE`] and the overlap capped at half the size.
fn clamp_bounds(chunk_size: usize, chunk_overlap: usize) -> (usize, usize) {
    let chunk_size = chunk_size.max(MIN_CHUNK_SIZE);
    (chunk_size, chunk_overlap.min(chunk_size / 2))
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// The last `n` characters of `text` (all of it if shorter).
fn tail_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match text.char_indices().rev().nth(n - 1) {
        Some((start, _)) => &text[start..],
        None => text,
    }
}

/// Wrap chunk texts as child documents of `parent`.
fn into_chunk_documents(parent: &Document, texts: Vec<String>) -> Vec<Document> {
    let total = texts.len();
    texts
        .into_iter()
        .enumerate()
        .map(|(index, content)| {
            let mut metadata = parent.metadata.clone();
            metadata.insert(CHUNK_INDEX_KEY.to_string(), index.into());
            metadata.insert(PARENT_ID_KEY.to_string(), parent.id.clone().into());
            metadata.insert(TOTAL_CHUNKS_KEY.to_string(), total.into());
            Document {
                id: format!("{}-chunk-{index}", parent.id),
                title: parent.title.as_ref().map(|title| format!("{title} (Part {})", index + 1)),
                content,
                metadata,
            }
        })
        .collect()
}

/// Splits text into sentence units and packs them greedily into chunks.
///
/// Sentences end at `.`, `!`, `?`, `。`, `！` or `？`. Each unit is the trimmed
/// sentence followed by `". "`. A unit joins the current chunk if it fits in
/// `chunk_size` or the chunk is still empty, so a single oversized sentence
/// becomes its own chunk rather than being cut. When a chunk is emitted the
/// next one starts with its trailing `chunk_overlap` characters.
///
/// # Example
///
/// ```rust,ignore
/// use nova_rag::{Chunker, SentenceChunker};
///
/// let chunker = SentenceChunker::new(1000, 200);
/// let chunks = chunker.split(&document);
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
    /// * `chunk_size`: character budget per chunk, raised to at least [`MIN_CHUNK_SIZE`]
    /// * `chunk_overlap`: characters carried over, capped at `chunk_size / 2`
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let (chunk_size, chunk_overlap) = clamp_bounds(chunk_size, chunk_overlap);
        Self { chunk_size, chunk_overlap }
    }

    /// The effective chunk size after clamping.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// The effective overlap after clamping.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    fn pack(&self, units: Vec<String>) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;

        for unit in units {
            let unit_len = char_len(&unit);
            if current_len > 0 && current_len + unit_len > self.chunk_size {
                let seed = tail_chars(&current, self.chunk_overlap).to_string();
                current_len = char_len(&seed);
                chunks.push(std::mem::replace(&mut current, seed));
            }
            current.push_str(&unit);
            current_len += unit_len;
        }

        if current_len > 0 {
            chunks.push(current);
        }
        chunks
    }
}

/// Split text on sentence terminators into normalised `"sentence. "` units.
fn split_sentences(text: &str) -> Vec<String> {
    text.split(SENTENCE_TERMINATORS)
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
        .map(|sentence| format!("{sentence}. "))
        .collect()
}

impl Chunker for SentenceChunker {
    fn split(&self, document: &Document) -> Vec<Document> {
        if document.content.is_empty() {
            return Vec::new();
        }
        if document.char_len() <= self.chunk_size {
            return vec![document.clone()];
        }

        let texts = self.pack(split_sentences(&document.content));
        debug!(document.id = %document.id, chunk_count = texts.len(), "split document by sentence");
        into_chunk_documents(document, texts)
    }
}

/// Splits text hierarchically: paragraphs → lines → words → fixed windows.
///
/// Segments are merged back together while they fit in `chunk_size`. A
/// segment that alone exceeds `chunk_size` is split with the next separator;
/// once separators run out the text is cut into `chunk_size` windows that
/// overlap by `chunk_overlap` characters. Whitespace-only chunks are dropped.
///
/// # Example
///
/// ```rust,ignore
/// use nova_rag::{Chunker, RecursiveCharacterChunker};
///
/// let chunker = RecursiveCharacterChunker::new(512, 100);
/// let chunks = chunker.split(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveCharacterChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveCharacterChunker {
    /// Create a new `RecursiveCharacterChunker` with the default separators
    /// `"\n\n"`, `"\n"` and `" "`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self::with_separators(chunk_size, chunk_overlap, ["\n\n", "\n", " "])
    }

    /// Create a chunker with custom separators, tried in order.
    pub fn with_separators<I, S>(chunk_size: usize, chunk_overlap: usize, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (chunk_size, chunk_overlap) = clamp_bounds(chunk_size, chunk_overlap);
        let separators =
            separators.into_iter().map(Into::into).filter(|s: &String| !s.is_empty()).collect();
        Self { chunk_size, chunk_overlap, separators }
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let Some((separator, remaining)) = separators.split_first() else {
            return split_by_size(text, self.chunk_size, self.chunk_overlap);
        };

        let segments = split_keeping_separator(text, separator);
        if segments.len() <= 1 {
            return self.split_recursive(text, remaining);
        }

        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;

        for segment in segments {
            let segment_len = char_len(segment);
            if current_len + segment_len <= self.chunk_size {
                current.push_str(segment);
                current_len += segment_len;
                continue;
            }

            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }

            if segment_len > self.chunk_size {
                chunks.extend(self.split_recursive(segment, remaining));
            } else {
                current.push_str(segment);
                current_len = segment_len;
            }
        }

        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

/// Character windows of `chunk_size` advancing by `chunk_size - chunk_overlap`.
fn split_by_size(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size.saturating_sub(chunk_overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

impl Chunker for RecursiveCharacterChunker {
    fn split(&self, document: &Document) -> Vec<Document> {
        if document.content.is_empty() {
            return Vec::new();
        }
        if document.char_len() <= self.chunk_size {
            return vec![document.clone()];
        }

        let texts: Vec<String> = self
            .split_recursive(&document.content, &self.separators)
            .into_iter()
            .filter(|chunk| !chunk.trim().is_empty())
            .collect();
        debug!(
            document.id = %document.id,
            chunk_count = texts.len(),
            "split document by character"
        );
        into_chunk_documents(document, texts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataValue;

    fn long_document() -> Document {
        let sentences: Vec<String> = (0..40)
            .map(|i| format!("Sentence number {i} talks about retrieval pipelines"))
            .collect();
        Document::new("doc", sentences.join(". ") + ".")
            .with_title("Guide")
            .with_metadata("source", "guide.md")
    }

    #[test]
    fn clamps_size_and_overlap() {
        let chunker = SentenceChunker::new(10, 500);
        assert_eq!(chunker.chunk_size(), MIN_CHUNK_SIZE);
        assert_eq!(chunker.chunk_overlap(), MIN_CHUNK_SIZE / 2);
    }

    #[test]
    fn empty_content_yields_no_chunks() {
        let chunker = SentenceChunker::new(100, 20);
        assert!(chunker.split(&Document::new("empty", "")).is_empty());
    }

    #[test]
    fn short_content_returns_document_unchanged() {
        let chunker = SentenceChunker::new(1000, 200);
        let document = Document::new("short", "Only one sentence here.");
        assert_eq!(chunker.split(&document), vec![document]);
    }

    #[test]
    fn chunks_carry_provenance_metadata() {
        let chunker = SentenceChunker::new(200, 40);
        let chunks = chunker.split(&long_document());
        assert!(chunks.len() > 1);

        let total = chunks.len();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.id, format!("doc-chunk-{i}"));
            assert_eq!(chunk.parent_id(), Some("doc"));
            assert_eq!(chunk.metadata[CHUNK_INDEX_KEY], MetadataValue::from(i));
            assert_eq!(chunk.metadata[TOTAL_CHUNKS_KEY], MetadataValue::from(total));
            assert_eq!(chunk.metadata["source"], MetadataValue::from("guide.md"));
            assert_eq!(chunk.title.as_deref(), Some(format!("Guide (Part {})", i + 1).as_str()));
        }
    }

    #[test]
    fn consecutive_chunks_share_overlap() {
        let chunker = SentenceChunker::new(200, 40);
        let chunks = chunker.split(&long_document());
        for pair in chunks.windows(2) {
            let tail = tail_chars(&pair[0].content, 40);
            assert!(pair[1].content.starts_with(tail), "chunk should start with previous tail");
        }
    }

    #[test]
    fn oversized_sentence_becomes_its_own_chunk() {
        let long_sentence = "word ".repeat(60);
        let content = format!("Short one. {long_sentence}. Another short one.");
        let chunker = SentenceChunker::new(100, 0);
        let chunks = chunker.split(&Document::new("d", content));
        assert!(chunks.iter().any(|c| c.content.starts_with("word word")));
        assert!(chunks.iter().all(|c| !c.content.is_empty()));
    }

    #[test]
    fn splits_on_cjk_terminators() {
        assert_eq!(split_sentences("你好。世界！真的？"), vec!["你好. ", "世界. ", "真的. "]);
    }

    #[test]
    fn tail_chars_is_char_safe() {
        assert_eq!(tail_chars("héllo wörld", 5), "wörld");
        assert_eq!(tail_chars("ab", 5), "ab");
        assert_eq!(tail_chars("ab", 0), "");
    }

    #[test]
    fn recursive_chunker_respects_size() {
        let paragraph = "alpha beta gamma delta epsilon zeta eta theta iota kappa ".repeat(5);
        let content = [paragraph.as_str(); 4].join("\n\n");
        let chunker = RecursiveCharacterChunker::new(120, 20);
        let chunks = chunker.split(&Document::new("r", content));

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(char_len(&chunk.content) <= 120, "chunk too large: {}", chunk.content.len());
            assert!(!chunk.content.trim().is_empty());
        }
    }

    #[test]
    fn fixed_windows_overlap() {
        let windows = split_by_size(&"x".repeat(250), 100, 20);
        assert_eq!(windows.iter().map(|w| w.len()).collect::<Vec<_>>(), vec![100, 100, 90]);
    }

    #[test]
    fn chunker_from_config_honours_splitter() {
        let config = ChunkingConfig { splitter: SplitterKind::Character, ..Default::default() };
        let chunker = chunker_from_config(&config);
        let document = Document::new("d", "a ".repeat(800));
        assert!(chunker.split(&document).len() > 1);
    }
}
