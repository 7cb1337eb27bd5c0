use crate::error::IngestError;
use crate::models::IngestionOptions;
use std::ops::Range;

/// Cut-point preference, highest first: paragraph, line, sentence, word.
/// A raw character cut is the fallback when none of these fit.
const BOUNDARIES: [&[&str]; 4] = [&["\n\n"], &["\n"], &[". ", "! ", "? "], &[" "]];

/// Validated chunk sizing. Only [`ChunkingConfig::new`] builds a custom one, so
/// `chunk_overlap < max_chunk_size` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    max_chunk_size: usize,
    chunk_overlap: usize,
}

impl ChunkingConfig {
    pub fn new(max_chunk_size: usize, chunk_overlap: usize) -> Result<Self, IngestError> {
        if max_chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "max_chunk_size must be greater than zero".to_string(),
            ));
        }
        if chunk_overlap >= max_chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk_overlap {chunk_overlap} must be smaller than max_chunk_size {max_chunk_size}"
            )));
        }
        Ok(Self {
            max_chunk_size,
            chunk_overlap,
        })
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 512,
            chunk_overlap: 0,
        }
    }
}

impl TryFrom<&IngestionOptions> for ChunkingConfig {
    type Error = IngestError;

    fn try_from(value: &IngestionOptions) -> Result<Self, Self::Error> {
        Self::new(value.max_chunk_size, value.chunk_overlap)
    }
}

pub fn split_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    chunk_spans(text, config)
        .into_iter()
        .map(|span| text[span].to_string())
        .collect()
}

/// Byte ranges of the chunks of `text`, in source order.
///
/// Every range holds at most `max_chunk_size` characters. Each range after the
/// first starts at most `chunk_overlap` characters before the previous one
/// ends, so the ranges cover the whole text without gaps, and always ends past
/// the previous one.
pub fn chunk_spans(text: &str, config: ChunkingConfig) -> Vec<Range<usize>> {
    if text.is_empty() {
        return Vec::new();
    }

    let offsets = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect::<Vec<_>>();
    let char_count = offsets.len() - 1;
    let max = config.max_chunk_size.max(1);

    let mut spans = Vec::new();
    let mut start = 0usize;
    let mut previous_end = 0usize;

    loop {
        if char_count - start <= max {
            spans.push(offsets[start]..text.len());
            break;
        }

        let end = cut_point(text, &offsets, start, start + max, previous_end);
        spans.push(offsets[start]..offsets[end]);
        start = overlap_start(text, &offsets, start, end, config.chunk_overlap);
        previous_end = end;
    }

    spans
}

/// Char index to end the chunk starting at `start`. Separators that end at or
/// before `previous_end` were already used by the previous chunk and are
/// skipped. `limit` is always past `previous_end`, so the raw cut advances too.
fn cut_point(
    text: &str,
    offsets: &[usize],
    start: usize,
    limit: usize,
    previous_end: usize,
) -> usize {
    let base = offsets[start];
    let window = &text[base..offsets[limit]];

    for separators in BOUNDARIES {
        let cut = separators
            .iter()
            .filter_map(|separator| {
                window
                    .rfind(separator)
                    .map(|position| position + separator.len())
            })
            .filter(|&cut| !window[..cut].trim().is_empty())
            .map(|cut| char_index(offsets, base + cut))
            .filter(|&end| end > previous_end)
            .max();

        if let Some(end) = cut {
            return end;
        }
    }

    limit
}

fn overlap_start(text: &str, offsets: &[usize], start: usize, end: usize, overlap: usize) -> usize {
    if overlap == 0 {
        return end;
    }

    let earliest = end.saturating_sub(overlap).max(start + 1);
    if earliest >= end {
        return end;
    }

    // First word that begins inside the overlap region.
    let at_word_edge = text[..offsets[earliest]].ends_with(char::is_whitespace);
    let region = &text[offsets[earliest]..offsets[end]];
    region
        .char_indices()
        .skip_while(|(_, ch)| !at_word_edge && !ch.is_whitespace())
        .find(|(_, ch)| !ch.is_whitespace())
        .map(|(position, _)| char_index(offsets, offsets[earliest] + position))
        .unwrap_or(earliest)
}

fn char_index(offsets: &[usize], byte_offset: usize) -> usize {
    match offsets.binary_search(&byte_offset) {
        Ok(index) | Err(index) => index,
    }
}
