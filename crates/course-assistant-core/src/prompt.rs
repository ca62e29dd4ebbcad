//! Prompt assembly.
//!
//! Retrieved chunks are rendered into a single context block which is
//! appended to the system instruction. The user's new message is always sent
//! verbatim, and stored history never contains retrieved text, so context is
//! sent exactly once per call.
//!
//! ```text
//! <system instruction>
//!
//! ## Course material
//! Use the excerpts below when they are relevant to the question.
//!
//! [1] syllabus.pdf, chunk 3
//! <chunk text>
//!
//! ---
//!
//! [2] week2.md, chunk 0
//! <chunk text>
//! ```
//!
//! Chunks are never cut. When the block would exceed the configured limit,
//! whole chunks are dropped from the low-relevance end of the ranking until
//! it fits.

use serde::Serialize;

use crate::conversation::{ConversationState, ExternalMessage};
use crate::error::Result;
use crate::models::Chunk;

/// Default limit for the rendered context block, in characters.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 8000;

/// Separator placed between rendered chunks.
pub const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

const CONTEXT_HEADING: &str =
    "## Course material\nUse the excerpts below when they are relevant to the question.";

/// Everything the generation service needs for one call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptPayload {
    /// System instruction, with the context block appended when non-empty.
    pub system_instruction: String,
    /// Prior turns in external format, oldest first.
    pub history: Vec<ExternalMessage>,
    /// The pending user message.
    pub message: String,
    /// Chunks rendered into the context block.
    pub context_chunks: usize,
    /// Retrieved chunks left out to respect the size limit.
    pub dropped_chunks: usize,
}

/// Rendered retrieval context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextBlock {
    /// Rendered excerpts; empty when nothing was included.
    pub text: String,
    pub included: usize,
    pub dropped: usize,
}

/// Render ranked chunks (highest relevance first) within `max_chars`.
pub fn assemble_context(ranked: &[Chunk], max_chars: usize) -> ContextBlock {
    let rendered: Vec<String> = ranked
        .iter()
        .enumerate()
        .map(|(i, c)| render_chunk(i + 1, c))
        .collect();

    let delimiter_len = CONTEXT_DELIMITER.chars().count();
    let mut used = 0usize;
    let mut included = 0usize;
    for piece in &rendered {
        let cost = piece.chars().count() + if included == 0 { 0 } else { delimiter_len };
        if used + cost > max_chars {
            break;
        }
        used += cost;
        included += 1;
    }

    ContextBlock {
        text: rendered[..included].join(CONTEXT_DELIMITER),
        included,
        dropped: ranked.len() - included,
    }
}

fn render_chunk(rank: usize, chunk: &Chunk) -> String {
    format!(
        "[{rank}] {}, chunk {}\n{}",
        chunk.document_id, chunk.chunk_index, chunk.text
    )
}

/// Build the payload for the pending user turn in `history`.
///
/// `retrieved` must be ordered by relevance, highest first. With no
/// retrieved chunks the system instruction is passed through unchanged.
///
/// # Errors
///
/// [`Error::InvariantViolation`](crate::Error::InvariantViolation) if the
/// last turn of `history` is not a user turn.
pub fn build_prompt(
    system_instruction: &str,
    retrieved: &[Chunk],
    history: &ConversationState,
    max_context_chars: usize,
) -> Result<PromptPayload> {
    let (prior, message) = history.pending_exchange()?;
    let context = assemble_context(retrieved, max_context_chars);

    let system_instruction = if context.text.is_empty() {
        system_instruction.to_string()
    } else {
        format!(
            "{}\n\n{CONTEXT_HEADING}\n\n{}",
            system_instruction.trim_end(),
            context.text
        )
    };

    Ok(PromptPayload {
        system_instruction,
        history: prior,
        message: message.to_string(),
        context_chunks: context.included,
        dropped_chunks: context.dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;
    use crate::Error;

    fn chunk(doc: &str, index: usize, text: &str) -> Chunk {
        Chunk {
            id: format!("{doc}-{index}"),
            document_id: doc.to_string(),
            chunk_index: index,
            char_start: 0,
            text: text.to_string(),
            overlap: 0,
            hash: String::new(),
        }
    }

    fn pending(message: &str) -> ConversationState {
        let mut conv = ConversationState::new();
        conv.append_turn(Role::User, message);
        conv
    }

    #[test]
    fn test_no_chunks_keeps_system_instruction() {
        let payload = build_prompt("You are a TA.", &[], &pending("hi"), 1000).unwrap();
        assert_eq!(payload.system_instruction, "You are a TA.");
        assert_eq!(payload.message, "hi");
        assert!(payload.history.is_empty());
        assert_eq!(payload.context_chunks, 0);
        assert_eq!(payload.dropped_chunks, 0);
    }

    #[test]
    fn test_context_in_system_instruction_only() {
        let chunks = vec![
            chunk("week1.md", 0, "Recursion basics"),
            chunk("week2.md", 4, "Merge sort"),
        ];
        let payload = build_prompt("You are a TA.", &chunks, &pending("What is recursion?"), 1000).unwrap();

        assert!(payload.system_instruction.starts_with("You are a TA.\n\n## Course material"));
        let first = payload.system_instruction.find("Recursion basics").unwrap();
        let second = payload.system_instruction.find("Merge sort").unwrap();
        assert!(first < second);
        assert!(payload.system_instruction.contains("[2] week2.md, chunk 4"));
        assert!(payload.system_instruction.contains(CONTEXT_DELIMITER));
        assert_eq!(payload.message, "What is recursion?");
        assert!(!payload.message.contains("Recursion basics"));
    }

    #[test]
    fn test_drops_lowest_ranked_chunks_whole() {
        let chunks = vec![
            chunk("a", 0, &"x".repeat(40)),
            chunk("b", 0, &"y".repeat(40)),
            chunk("c", 0, &"z".repeat(40)),
        ];
        let one = render_chunk(1, &chunks[0]).chars().count();
        let two = one + CONTEXT_DELIMITER.len() + render_chunk(2, &chunks[1]).chars().count();

        let block = assemble_context(&chunks, two + 5);
        assert_eq!(block.included, 2);
        assert_eq!(block.dropped, 1);
        assert!(block.text.contains(&"y".repeat(40)));
        assert!(!block.text.contains('z'));
        assert!(block.text.chars().count() <= two + 5);
    }

    #[test]
    fn test_limit_smaller_than_first_chunk_drops_all() {
        let chunks = vec![chunk("a", 0, "long enough text")];
        let block = assemble_context(&chunks, 5);
        assert_eq!(block.included, 0);
        assert_eq!(block.dropped, 1);
        assert!(block.text.is_empty());
    }

    #[test]
    fn test_history_excludes_pending_turn() {
        let mut conv = ConversationState::new();
        conv.append_turn(Role::User, "first");
        conv.append_turn(Role::Assistant, "answer");
        conv.append_turn(Role::User, "second");
        let payload = build_prompt("sys", &[], &conv, 100).unwrap();
        assert_eq!(payload.history.len(), 2);
        assert_eq!(payload.history[1].role, "model");
        assert_eq!(payload.message, "second");
    }

    #[test]
    fn test_requires_pending_user_turn() {
        let err = build_prompt("sys", &[], &ConversationState::new(), 100).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }
}
