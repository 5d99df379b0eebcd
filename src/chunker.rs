/// Whitespace normalization and fixed-size chunk slicing.
///
/// Chunk boundaries are positional, not semantic: after collapsing whitespace
/// the text is cut into consecutive, non-overlapping slices of at most
/// `max_chars` characters. Boundaries may fall mid-sentence; downstream tests
/// rely on the exact slice positions, so this must stay byte-for-byte stable.

/// Default maximum chunk length in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 512;

/// Collapse every whitespace run to a single space and trim the ends.
#[must_use]
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for word in text.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

/// Lazy iterator over consecutive chunk slices of a normalized text.
///
/// Finite and restartable: `Clone` the iterator to re-walk the same slices.
#[derive(Debug, Clone)]
pub struct ChunkIter<'a> {
    rest: &'a str,
    max_chars: usize,
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() || self.max_chars == 0 {
            return None;
        }

        // Cut on a char boundary after max_chars characters (not bytes).
        let cut = self
            .rest
            .char_indices()
            .nth(self.max_chars)
            .map_or(self.rest.len(), |(i, _)| i);

        let (head, tail) = self.rest.split_at(cut);
        self.rest = tail;
        Some(head)
    }
}

/// Slice pre-normalized text into chunks of at most `max_chars` characters.
///
/// The input is expected to already be [`normalize`]d; empty input yields an
/// empty iterator, never an error.
#[must_use]
pub fn chunks(normalized: &str, max_chars: usize) -> ChunkIter<'_> {
    ChunkIter {
        rest: normalized,
        max_chars,
    }
}

/// Normalize and chunk in one step, collecting owned strings.
#[must_use]
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let normalized = normalize(text);
    chunks(&normalized, max_chars)
        .map(str::to_string)
        .collect()
}
