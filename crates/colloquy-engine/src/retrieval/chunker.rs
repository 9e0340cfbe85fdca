//! Document chunking.
//!
//! Splits extracted text into overlapping windows for embedding, breaking
//! preferentially at paragraph boundaries, then line boundaries, then word
//! boundaries.  Character-indexed throughout so multi-byte text never splits
//! inside a code point.

/// Chunking parameters.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Target window size in characters.
    pub window: usize,
    /// Overlap between consecutive windows in characters.
    pub overlap: usize,
    /// Boundary preference, highest priority first.
    pub separators: Vec<String>,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            window: 1000,
            overlap: 200,
            separators: vec!["\n\n".into(), "\n".into(), " ".into()],
        }
    }
}

/// One chunk of a source document.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Zero-based chunk position within the document.
    pub index: usize,
    /// The chunk text, trimmed.
    pub text: String,
    /// Byte offset of the chunk's start in the original text.
    pub offset: usize,
}

/// Splits document text into overlapping chunks.
#[derive(Debug, Default)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Create a chunker with the given configuration.
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Split `text` into chunks.
    ///
    /// Each window ends at the last preferred separator inside it when one
    /// exists; otherwise it breaks at the window size.  Consecutive chunks
    /// overlap by up to `overlap` characters.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let mut chunks = Vec::new();

        if total == 0 {
            return chunks;
        }

        let mut start = 0;
        let mut index = 0;

        while start < total {
            let target_end = (start + self.config.window).min(total);
            let mut end = target_end;

            // Not at the document tail: prefer to break at a separator.
            if target_end < total {
                let slice: String = chars[start..target_end].iter().collect();
                for sep in &self.config.separators {
                    if let Some(pos) = slice.rfind(sep) {
                        let chars_to_sep = slice[..pos].chars().count() + sep.chars().count();
                        if chars_to_sep > 0 {
                            end = start + chars_to_sep;
                            break;
                        }
                    }
                }
            }

            // Always make progress.
            if end <= start {
                end = (start + 1).min(total);
            }

            let chunk_text: String = chars[start..end].iter().collect();
            let trimmed = chunk_text.trim();
            if !trimmed.is_empty() {
                let offset: usize = chars[..start].iter().map(|c| c.len_utf8()).sum();
                chunks.push(Chunk {
                    index,
                    text: trimmed.to_owned(),
                    offset,
                });
                index += 1;
            }

            if end >= total {
                break;
            }

            let overlap = self.config.overlap.min(end - start);
            let next_start = end.saturating_sub(overlap);
            start = if next_start > start { next_start } else { end };
        }

        chunks
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
