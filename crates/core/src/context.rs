use crate::models::{Citation, ContextPacket, RetrievalMatch};

/// Default character budget for the packed context block.
pub const DEFAULT_CONTEXT_BUDGET: usize = 6_000;

/// Literal substituted into the prompt when no match survives the budget.
pub const EMPTY_CONTEXT_PLACEHOLDER: &str = "(no relevant matches found)";

/// Pack ranked matches under a hard character cap.
///
/// Matches are considered strictly in ranked order. A match is included only
/// when its whole formatted block fits in the remaining budget; otherwise it
/// is skipped permanently and the scan continues, since a later, shorter
/// match may still fit. Citation numbers always carry the original rank.
/// An oversized block is skipped whole, never truncated.
pub fn pack(matches: &[RetrievalMatch], max_chars: usize) -> ContextPacket {
    let mut packet = ContextPacket::default();

    for entry in matches {
        let block = format!("[#{}] {}\n{}\n---\n", entry.rank, entry.title, entry.snippet_text);
        let block_chars = block.chars().count();

        if packet.used_chars + block_chars <= max_chars {
            packet.used_chars += block_chars;
            packet.citations.push(Citation {
                n: entry.rank,
                title: entry.title.clone(),
            });
            packet.blocks.push(block);
        }
    }

    packet
}
