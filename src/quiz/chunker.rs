use crate::quiz::{Chunk, TranscriptFragment};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Greedily merges fragment texts into chunks of at most `max_len` characters.
///
/// A fragment is never split: one longer than `max_len` ends up in a chunk of
/// its own. The accumulator is always emitted at the end, so an empty input
/// produces a single empty chunk, and an oversized first fragment is preceded
/// by an empty one.
pub fn chunk_transcript(fragments: &[TranscriptFragment], max_len: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    // Lengths are counted in chars, not bytes
    let mut current_len = 0;

    for fragment in fragments {
        let fragment_len = fragment.text.chars().count();
        if current_len + fragment_len <= max_len {
            current.push_str(&fragment.text);
            current_len += fragment_len;
        } else {
            chunks.push(Chunk::new(std::mem::take(&mut current)));
            current.push_str(&fragment.text);
            current_len = fragment_len;
        }
    }
    chunks.push(Chunk::new(current));

    chunks
}
