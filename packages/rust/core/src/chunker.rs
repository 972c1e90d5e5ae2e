//! Boundary-aware text chunker.
//!
//! Splits document text into ordered [`Chunk`]s of at most `max_chars`
//! characters. Within each window the split prefers, in order: a paragraph
//! break, a sentence end, a line break, any whitespace, and finally the hard
//! bound. Boundaries in the first half of a window are ignored so a stray
//! early newline cannot produce a sliver of a chunk.
//!
//! Splitting never drops characters: concatenating the chunks reproduces the
//! normalized input exactly.

use std::borrow::Cow;

use lexrisk_shared::Chunk;

/// Characters that end a sentence when followed by whitespace.
const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?', '…', ';'];

/// Split `text` into chunks of at most `max_chars` characters.
///
/// Line endings are normalized to `\n` first. Empty input yields no chunks.
/// A `max_chars` of zero is treated as one.
pub fn split(text: &str, max_chars: usize) -> Vec<Chunk> {
    let max_chars = max_chars.max(1);
    let normalized = normalize(text);

    let mut chunks = Vec::new();
    let mut rest: &str = &normalized;

    while !rest.is_empty() {
        let (piece, tail) = rest.split_at(next_split(rest, max_chars));
        chunks.push(Chunk {
            index: chunks.len() + 1,
            text: piece.to_string(),
        });
        rest = tail;
    }

    chunks
}

/// Convert `\r\n` and lone `\r` to `\n`.
pub fn normalize(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(text)
    }
}

/// Byte length of the next chunk taken from the front of `rest`.
fn next_split(rest: &str, max_chars: usize) -> usize {
    let window_end = match rest.char_indices().nth(max_chars) {
        Some((byte, _)) => byte,
        None => return rest.len(),
    };
    let window = &rest[..window_end];

    let floor = window
        .char_indices()
        .nth(max_chars / 2)
        .map(|(byte, _)| byte)
        .unwrap_or(0);

    paragraph_break(window, floor)
        .or_else(|| sentence_end(window, floor))
        .or_else(|| line_break(window, floor))
        .or_else(|| whitespace(window, floor))
        .unwrap_or(window_end)
}

fn paragraph_break(window: &str, floor: usize) -> Option<usize> {
    window
        .rfind("\n\n")
        .map(|pos| pos + 2)
        .filter(|&end| end > floor)
}

fn sentence_end(window: &str, floor: usize) -> Option<usize> {
    // Walk backwards remembering the character after the current one.
    let mut next: Option<(usize, char)> = None;
    for (i, c) in window.char_indices().rev() {
        if i < floor {
            break;
        }
        if let Some((j, after)) = next {
            if SENTENCE_TERMINATORS.contains(&c) && after.is_whitespace() {
                return Some(j + after.len_utf8());
            }
        }
        next = Some((i, c));
    }
    None
}

fn line_break(window: &str, floor: usize) -> Option<usize> {
    window
        .rfind('\n')
        .map(|pos| pos + 1)
        .filter(|&end| end > floor)
}

fn whitespace(window: &str, floor: usize) -> Option<usize> {
    window
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map(|(i, c)| i + c.len_utf8())
        .filter(|&end| end > floor)
}
