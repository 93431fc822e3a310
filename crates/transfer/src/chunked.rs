use std::ops::Range;
use std::sync::Arc;

use crate::TransferError;

/// Splits text content into a fixed number of chunks.
///
/// The chunk count comes from the raw byte size and the nominal chunk size:
/// `total = ceil(size / target)`. The content is then cut by character with
/// a stride of `floor(chars / total)`, so a chunk may be larger or smaller
/// than `target` bytes. The final chunk runs to the end of the content and
/// absorbs the remainder of the division.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    content: Arc<str>,
    content_size: u64,
    target_chunk_bytes: usize,
    total_chunks: usize,
    stride: usize,
    char_len: usize,
    /// Byte offset of each chunk start, followed by the content end.
    boundaries: Vec<usize>,
}

impl ChunkPlan {
    /// Plans `content`, using its UTF-8 length as the content size.
    pub fn new(content: impl Into<Arc<str>>, target_chunk_bytes: usize) -> Result<Self, TransferError> {
        let content = content.into();
        let size = content.len() as u64;
        Self::with_content_size(content, size, target_chunk_bytes)
    }

    /// Plans `content` whose size on the source medium is `content_size`
    /// bytes (which may differ from the decoded text length).
    pub fn with_content_size(
        content: impl Into<Arc<str>>,
        content_size: u64,
        target_chunk_bytes: usize,
    ) -> Result<Self, TransferError> {
        if target_chunk_bytes == 0 {
            return Err(TransferError::InvalidChunkSize);
        }
        let content = content.into();

        let total_chunks = content_size.div_ceil(target_chunk_bytes as u64) as usize;
        let char_len = content.chars().count();
        let stride = if total_chunks == 0 {
            1
        } else {
            (char_len / total_chunks).max(1)
        };

        let boundaries = compute_boundaries(&content, total_chunks, stride);

        Ok(Self {
            content,
            content_size,
            target_chunk_bytes,
            total_chunks,
            stride,
            char_len,
            boundaries,
        })
    }

    /// Number of chunks. Zero means there is nothing to send.
    pub fn total_chunks(&self) -> usize {
        self.total_chunks
    }

    /// Characters per chunk (the last chunk may hold more).
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Nominal chunk size in bytes.
    pub fn target_chunk_bytes(&self) -> usize {
        self.target_chunk_bytes
    }

    /// Size the plan was computed from, in bytes.
    pub fn content_size(&self) -> u64 {
        self.content_size
    }

    /// Length of the content in characters.
    pub fn char_len(&self) -> usize {
        self.char_len
    }

    /// Returns `true` when there are no chunks to send.
    pub fn is_empty(&self) -> bool {
        self.total_chunks == 0
    }

    /// The planned content.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Byte range of chunk `index` within the content, or `None` past the end.
    pub fn byte_range(&self, index: usize) -> Option<Range<usize>> {
        if index >= self.total_chunks {
            return None;
        }
        Some(self.boundaries[index]..self.boundaries[index + 1])
    }

    /// Text of chunk `index`. Empty when `index >= total_chunks`.
    pub fn slice(&self, index: usize) -> &str {
        match self.byte_range(index) {
            Some(range) => &self.content[range],
            None => "",
        }
    }

    /// Chunk to resume from when the receiver already holds `received_len`
    /// bytes of the file.
    ///
    /// Falls back to 0 when the receiver claims more chunks than exist.
    pub fn resume_index(&self, received_len: u64) -> usize {
        let index = (received_len / self.target_chunk_bytes as u64) as usize;
        if index > self.total_chunks { 0 } else { index }
    }
}

/// Collects the byte offset of every chunk start in a single pass.
fn compute_boundaries(content: &str, total_chunks: usize, stride: usize) -> Vec<usize> {
    let mut boundaries = Vec::with_capacity(total_chunks + 1);
    if total_chunks == 0 {
        boundaries.push(content.len());
        return boundaries;
    }

    let mut next_char = 0usize;
    for (char_idx, (byte_idx, _)) in content.char_indices().enumerate() {
        if boundaries.len() == total_chunks {
            break;
        }
        if char_idx == next_char {
            boundaries.push(byte_idx);
            next_char += stride;
        }
    }
    // Chunk starts beyond the content are clamped to its end.
    while boundaries.len() < total_chunks {
        boundaries.push(content.len());
    }
    boundaries.push(content.len());
    boundaries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reassemble(plan: &ChunkPlan) -> String {
        (0..plan.total_chunks()).map(|i| plan.slice(i)).collect()
    }

    #[test]
    fn total_chunks_is_ceiling_of_size() {
        let plan = ChunkPlan::new("a".repeat(40961), 20480).unwrap();
        assert_eq!(plan.total_chunks(), 3);

        let plan = ChunkPlan::new("a".repeat(40960), 20480).unwrap();
        assert_eq!(plan.total_chunks(), 2);
    }

    #[test]
    fn empty_content_has_no_chunks() {
        let plan = ChunkPlan::new("", 20480).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.total_chunks(), 0);
        assert_eq!(plan.slice(0), "");
        assert!(plan.stride() > 0);
    }

    #[test]
    fn zero_target_is_rejected() {
        assert!(matches!(
            ChunkPlan::new("abc", 0),
            Err(TransferError::InvalidChunkSize)
        ));
    }

    #[test]
    fn last_chunk_absorbs_remainder() {
        // 10 bytes / 4 -> 3 chunks, stride floor(10 / 3) = 3.
        let plan = ChunkPlan::new("abcdefghij", 4).unwrap();
        assert_eq!(plan.total_chunks(), 3);
        assert_eq!(plan.stride(), 3);
        assert_eq!(plan.slice(0), "abc");
        assert_eq!(plan.slice(1), "def");
        assert_eq!(plan.slice(2), "ghij");
    }

    #[test]
    fn multibyte_content_is_cut_on_characters() {
        // 10 characters of 3 bytes each: 30 bytes / 7 -> 5 chunks of 2 chars.
        let content = "书".repeat(10);
        let plan = ChunkPlan::new(content.clone(), 7).unwrap();
        assert_eq!(plan.total_chunks(), 5);
        assert_eq!(plan.char_len(), 10);
        assert_eq!(plan.stride(), 2);
        for i in 0..5 {
            assert_eq!(plan.slice(i), "书书");
        }
        assert_eq!(reassemble(&plan), content);
    }

    #[test]
    fn stride_never_drops_to_zero() {
        // 6 bytes / 1 -> 6 chunks over 2 characters.
        let plan = ChunkPlan::new("书书", 1).unwrap();
        assert_eq!(plan.total_chunks(), 6);
        assert_eq!(plan.stride(), 1);
        assert_eq!(plan.slice(0), "书");
        assert_eq!(plan.slice(1), "书");
        assert_eq!(plan.slice(5), "");
        assert_eq!(reassemble(&plan), "书书");
    }

    #[test]
    fn reassembly_reconstructs_content() {
        let samples = [
            "The quick brown fox jumps over the lazy dog".to_string(),
            "第一章 天下大势，分久必合，合久必分。".repeat(37),
            "mixed ascii and 中文 and émoji 📚 ".repeat(101),
            "x".to_string(),
        ];
        for content in &samples {
            for target in [1usize, 2, 3, 7, 64, 1000, 20480] {
                let plan = ChunkPlan::new(content.clone(), target).unwrap();
                assert_eq!(
                    plan.total_chunks() as u64,
                    (content.len() as u64).div_ceil(target as u64)
                );
                assert_eq!(&reassemble(&plan), content, "target {target}");
            }
        }
    }

    #[test]
    fn ranges_stay_within_content() {
        let content = "电子书".repeat(333);
        let plan = ChunkPlan::new(content.clone(), 97).unwrap();
        for i in 0..plan.total_chunks() {
            let range = plan.byte_range(i).unwrap();
            assert!(range.start <= range.end);
            assert!(range.end <= content.len());
        }
        assert!(plan.byte_range(plan.total_chunks()).is_none());
    }

    #[test]
    fn slicing_is_deterministic() {
        let plan = ChunkPlan::new("abcdefghij".repeat(50), 64).unwrap();
        assert_eq!(plan.slice(3), plan.slice(3));
    }

    #[test]
    fn content_size_overrides_text_length() {
        // Raw size larger than the decoded text (e.g. after lossy decoding).
        let plan = ChunkPlan::with_content_size("abcdef", 100, 20).unwrap();
        assert_eq!(plan.total_chunks(), 5);
        assert_eq!(plan.content_size(), 100);
        assert_eq!(reassemble(&plan), "abcdef");
    }

    #[test]
    fn resume_index_from_received_length() {
        let plan = ChunkPlan::new("a".repeat(5 * 20480), 20480).unwrap();
        assert_eq!(plan.resume_index(40960), 2);
        assert_eq!(plan.resume_index(40959), 1);
        assert_eq!(plan.resume_index(5 * 20480), 5);
        // Claims more than the file holds.
        assert_eq!(plan.resume_index(6 * 20480), 0);
    }
}
