//! Boundary-aware recursive text splitting.
//!
//! Text is first broken into pieces no longer than `chunk_size` characters,
//! preferring paragraph, then line, then word boundaries and cutting
//! mid-word only as a last resort. Pieces tile the source text exactly, so the
//! merge step can work purely on byte spans: consecutive windows are packed up
//! to `chunk_size` and the next window restarts from the trailing pieces that
//! fit in `chunk_overlap`.
use std::collections::VecDeque;

use crate::config::ChunkingSettings;
use crate::error::{Error, Result};
use crate::types::Chunk;

const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 2000, chunk_overlap: 300 }
    }
}

impl From<&ChunkingSettings> for ChunkingConfig {
    fn from(s: &ChunkingSettings) -> Self {
        Self { chunk_size: s.chunk_size, chunk_overlap: s.chunk_overlap }
    }
}

#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    end: usize,
    chars: usize,
}

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Default for Chunker {
    fn default() -> Self {
        Self { config: ChunkingConfig::default() }
    }
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be > 0".into()));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        Ok(Self { config })
    }

    /// Split `text` into ordered, overlapping chunks. Blank input yields none.
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let mut pieces = Vec::new();
        self.split_span(text, 0, text.len(), 0, &mut pieces);
        self.merge(text, &pieces)
    }

    fn split_span(&self, text: &str, start: usize, end: usize, level: usize, out: &mut Vec<Span>) {
        let chars = text[start..end].chars().count();
        if chars <= self.config.chunk_size {
            out.push(Span { start, end, chars });
            return;
        }
        let Some(sep) = SEPARATORS.get(level) else {
            hard_cut(text, start, end, self.config.chunk_size, out);
            return;
        };
        let slice = &text[start..end];
        if !slice.contains(sep) {
            self.split_span(text, start, end, level + 1, out);
            return;
        }
        // Separators stay attached to the preceding piece so pieces tile the span.
        let mut piece_start = start;
        for (offset, matched) in slice.match_indices(sep) {
            let piece_end = start + offset + matched.len();
            self.split_span(text, piece_start, piece_end, level + 1, out);
            piece_start = piece_end;
        }
        if piece_start < end {
            self.split_span(text, piece_start, end, level + 1, out);
        }
    }

    fn merge(&self, text: &str, pieces: &[Span]) -> Vec<Chunk> {
        let ChunkingConfig { chunk_size, chunk_overlap } = self.config;
        let mut chunks = Vec::new();
        let mut window: VecDeque<Span> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            if total + piece.chars > chunk_size && !window.is_empty() {
                emit(text, &window, &mut chunks);
                while total > chunk_overlap || (total + piece.chars > chunk_size && total > 0) {
                    let Some(front) = window.pop_front() else { break };
                    total -= front.chars;
                }
            }
            window.push_back(*piece);
            total += piece.chars;
        }
        if !window.is_empty() {
            emit(text, &window, &mut chunks);
        }
        chunks
    }
}

fn emit(text: &str, window: &VecDeque<Span>, chunks: &mut Vec<Chunk>) {
    let (Some(first), Some(last)) = (window.front(), window.back()) else { return };
    let body = text[first.start..last.end].trim();
    if body.is_empty() {
        return;
    }
    chunks.push(Chunk { index: chunks.len(), start: first.start, end: last.end, text: body.to_string() });
}

fn hard_cut(text: &str, start: usize, end: usize, size: usize, out: &mut Vec<Span>) {
    let mut piece_start = start;
    let mut count = 0usize;
    for (offset, _) in text[start..end].char_indices() {
        if count == size {
            out.push(Span { start: piece_start, end: start + offset, chars: count });
            piece_start = start + offset;
            count = 0;
        }
        count += 1;
    }
    if count > 0 {
        out.push(Span { start: piece_start, end, chars: count });
    }
}
