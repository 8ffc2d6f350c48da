// src/utils.rs
// Utility functions for the CREAM TVL SDK

/// Splits an inclusive block range into (start, end) chunks of at most
/// `chunk_size` blocks. A zero chunk size yields the whole range at once.
pub fn block_chunks(from_block: u64, to_block: u64, chunk_size: u64) -> Vec<(u64, u64)> {
    if from_block > to_block {
        return Vec::new();
    }
    if chunk_size == 0 {
        return vec![(from_block, to_block)];
    }
    let mut chunks = Vec::new();
    let mut current = from_block;
    while current <= to_block {
        let end = std::cmp::min(current.saturating_add(chunk_size - 1), to_block);
        chunks.push((current, end));
        if end == u64::MAX {
            break;
        }
        current = end + 1;
    }
    chunks
}
