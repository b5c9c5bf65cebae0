//! Forward search with wraparound, and the search/replace driver.

use crate::model::gap_buffer::{ContentOffset, GapBuffer};
use crate::model::selection::Selection;

/// Answer to "replace this match?"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceDecision {
    Replace,
    /// Leave this match alone and continue with the next one.
    Skip,
    Abort,
}

/// Result of a search/replace run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Plain search: the caret is at the match and the match is selected.
    Found { at: ContentOffset, wrapped: bool },
    /// Replacement run that saw at least one match.
    Finished(ReplaceSummary),
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplaceSummary {
    pub matches: usize,
    pub replaced: usize,
    pub aborted: bool,
    /// A replacement did not fit in the segment; the run stopped there.
    pub out_of_space: bool,
}

fn matches_at(buffer: &GapBuffer, needle: &[u8], at: usize) -> bool {
    buffer.bytes_from(ContentOffset(at)).take(needle.len()).eq(needle.iter().copied())
}

/// First occurrence of `needle` starting at or after `from`.
pub fn find(buffer: &GapBuffer, needle: &[u8], from: ContentOffset) -> Option<ContentOffset> {
    let len = buffer.len();
    if needle.is_empty() || from.0 + needle.len() > len {
        return None;
    }
    let first = needle[0];
    (from.0..=len - needle.len())
        .find(|&k| buffer.byte_at(ContentOffset(k)) == Some(first) && matches_at(buffer, needle, k))
        .map(ContentOffset)
}

/// Search from `from` to the end, then once more from the start.
///
/// Returns the match and whether the search had to wrap.
pub fn find_wrapping(
    buffer: &GapBuffer,
    needle: &[u8],
    from: ContentOffset,
) -> Option<(ContentOffset, bool)> {
    find(buffer, needle, from)
        .map(|at| (at, false))
        .or_else(|| find(buffer, needle, ContentOffset(0)).map(|at| (at, true)))
}

/// Search for `needle` and optionally replace matches.
///
/// The search starts at the caret, or one past it when the selection is a
/// match that starts at the caret, so repeated searches advance. Each match
/// moves the caret to its start and selects it.
///
/// Without a replacement the first match ends the run. With one, every match
/// is offered to `prompt` when `ask` is set (otherwise replaced outright);
/// after a replacement the search resumes after the inserted text. The pass
/// that wraps to the start stops at the original starting point, shifted by
/// any length change made before it, so inserted text is never matched again.
pub fn search_or_replace(
    buffer: &mut GapBuffer,
    selection: &mut Selection,
    needle: &[u8],
    replacement: Option<&[u8]>,
    ask: bool,
    prompt: &mut dyn FnMut(&GapBuffer, &Selection) -> ReplaceDecision,
) -> SearchOutcome {
    if needle.is_empty() {
        return SearchOutcome::NotFound;
    }
    let caret = buffer.caret();
    let mut origin = if selection.starts_at(caret) {
        caret.0 + 1
    } else {
        caret.0
    };
    let mut pos = origin;
    let mut wrapped = false;
    let mut summary = ReplaceSummary::default();

    loop {
        let at = match find(buffer, needle, ContentOffset(pos)) {
            Some(at) if !wrapped || at.0 < origin => at,
            _ if !wrapped => {
                wrapped = true;
                pos = 0;
                continue;
            }
            _ => break,
        };

        summary.matches += 1;
        buffer.seek(at);
        *selection = Selection::span(at, ContentOffset(at.0 + needle.len()));

        let Some(replacement) = replacement else {
            tracing::debug!("found {} bytes at {} (wrapped: {})", needle.len(), at.0, wrapped);
            return SearchOutcome::Found { at, wrapped };
        };

        let decision = if ask {
            prompt(buffer, selection)
        } else {
            ReplaceDecision::Replace
        };
        match decision {
            ReplaceDecision::Abort => {
                summary.aborted = true;
                break;
            }
            ReplaceDecision::Skip => pos = at.0 + 1,
            ReplaceDecision::Replace => {
                if replacement.len() > needle.len() + buffer.free() {
                    summary.out_of_space = true;
                    break;
                }
                if replacement.len() == needle.len() {
                    // Same length: overwrite in place and leave the gap alone.
                    for (k, &byte) in replacement.iter().enumerate() {
                        let raw = buffer.to_raw(ContentOffset(at.0 + k));
                        buffer.write_at(raw, byte);
                    }
                    buffer.seek(ContentOffset(at.0 + replacement.len()));
                } else {
                    buffer.delete_range(at, ContentOffset(at.0 + needle.len()));
                    buffer.insert_slice(replacement);
                }
                selection.clear();
                summary.replaced += 1;
                pos = at.0 + replacement.len();
                if wrapped {
                    origin = (origin + replacement.len()).saturating_sub(needle.len());
                }
            }
        }
    }

    tracing::debug!(
        "search/replace: {} matches, {} replaced, aborted: {}",
        summary.matches,
        summary.replaced,
        summary.aborted
    );
    if summary.matches == 0 {
        SearchOutcome::NotFound
    } else {
        SearchOutcome::Finished(summary)
    }
}
