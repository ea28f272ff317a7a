use std::collections::Bound;
use std::fmt;
use std::num::NonZeroU64;
use std::ops::RangeBounds;

use crate::download::error::DownloadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    pub index: usize,
    pub range: ChunkRange,
}

/// 闭区间 `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub start: u64,
    pub end: u64,
}

impl ChunkRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn from_len(start: u64, len: u64) -> Self {
        Self { start, end: start + len - 1 }
    }

    pub fn len(&self) -> u64 {
        (self.end - self.start) + 1
    }

    pub fn to_range_header(&self) -> Result<headers::Range, DownloadError> {
        headers::Range::bytes(self).map_err(|_| DownloadError::InvalidRange(*self))
    }
}

impl fmt::Display for ChunkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bytes={}-{}", self.start, self.end)
    }
}

impl<'a> RangeBounds<u64> for &'a ChunkRange {
    fn start_bound(&self) -> Bound<&u64> {
        Bound::Included(&self.start)
    }

    fn end_bound(&self) -> Bound<&u64> {
        Bound::Included(&self.end)
    }
}

/// 将 `[0, content_length)` 按 chunk_size 切分，最后一块截断到文件末尾
#[derive(Debug, Clone)]
pub struct ChunkRangeIterator {
    chunk_size: u64,
    content_length: u64,
    next_start: u64,
    iter_count: usize,
}

impl ChunkRangeIterator {
    pub fn new(chunk_size: NonZeroU64, content_length: u64) -> Self {
        Self {
            chunk_size: chunk_size.get(),
            content_length,
            next_start: 0,
            iter_count: 0,
        }
    }

    /// 剩余未产出的字节数
    pub fn remaining_len(&self) -> u64 {
        self.content_length - self.next_start
    }

    pub fn chunk_count(&self) -> u64 {
        self.content_length.div_ceil(self.chunk_size)
    }
}

impl Iterator for ChunkRangeIterator {
    type Item = ChunkInfo;

    fn next(&mut self) -> Option<ChunkInfo> {
        if self.next_start >= self.content_length {
            return None;
        }

        let start = self.next_start;
        let end = start
            .saturating_add(self.chunk_size - 1)
            .min(self.content_length - 1);
        self.next_start = end + 1;
        self.iter_count += 1;

        Some(ChunkInfo {
            index: self.iter_count,
            range: ChunkRange::new(start, end),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining_len().div_ceil(self.chunk_size) as usize;
        (remaining, Some(remaining))
    }
}
