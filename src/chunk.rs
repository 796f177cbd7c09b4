//! Overlapping character-window chunker.
//!
//! Splits document text into [`DocumentChunk`]s of at most `chunk_size`
//! characters, each starting `chunk_overlap` characters (or slightly later,
//! at the next word start) before the previous one ended. Sizes and offsets
//! are measured in `char`s, not bytes, so multi-byte text never splits
//! inside a code point.
//!
//! Window ends prefer the last whitespace inside the window so words are not
//! cut in half; a window with no whitespace is hard-split at `chunk_size`.

use crate::models::DocumentChunk;

/// Split `text` into overlapping chunks tagged with `source`.
///
/// Whitespace-only input yields no chunks. `chunk_overlap` must be smaller
/// than `chunk_size` (enforced by config validation); larger values are
/// clamped so that every window makes progress.
pub fn chunk_text(
    source: &str,
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<DocumentChunk> {
    let chunk_size = chunk_size.max(1);
    let overlap = chunk_overlap.min(chunk_size - 1);
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < len {
        while start < len && chars[start].is_whitespace() {
            start += 1;
        }
        if start >= len {
            break;
        }

        let hard_end = (start + chunk_size).min(len);
        let end = if hard_end < len {
            // Break after the last whitespace that still leaves room for the overlap.
            let floor = start + overlap + 1;
            (floor..hard_end)
                .rev()
                .find(|&i| chars[i].is_whitespace())
                .map(|i| i + 1)
                .unwrap_or(hard_end)
        } else {
            len
        };

        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim_end();
        let content_end = start + piece.chars().count();
        if !piece.is_empty() {
            chunks.push(DocumentChunk {
                text: piece.to_string(),
                source: source.to_string(),
                offset: start,
            });
        }

        if end >= len {
            break;
        }

        let mut next = (end - overlap).max(start + 1);
        // Nudge the overlap start forward to a word boundary, staying inside
        // the previous chunk's content so the overlap is never lost.
        if !chars[next - 1].is_whitespace() {
            if let Some(ws) = (next..content_end).find(|&i| chars[i].is_whitespace()) {
                next = ws + 1;
            }
        }
        start = next;
    }

    chunks
}
