use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;
use tokio::io;

use crate::download::chunk_range::ChunkRange;

/// 下载中发生的错误，任何一个都会终止本次传输
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Failed to get file size: HTTP {0}")]
    SizeUnavailable(StatusCode),

    #[error("Failed to get file size: response has no Content-Length")]
    ContentLengthMissing,

    #[error("Failed to get file size: invalid Content-Length {0:?}")]
    ContentLengthInvalid(String),

    #[error("Failed to fetch chunk {range}: HTTP {status}")]
    RangeRequestFailed { range: ChunkRange, status: StatusCode },

    #[error("Chunk {range} ended early: received {received} of {} bytes", .range.len())]
    ChunkTruncated { range: ChunkRange, received: u64 },

    #[error("Invalid range: {0}")]
    InvalidRange(ChunkRange),

    #[error("Cannot read {}: {source}", .path.display())]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Http request failed: {0}")]
    HttpRequestFailed(#[from] reqwest::Error),

    #[error("IOError: {0}")]
    IOError(#[from] io::Error),
}

impl DownloadError {
    pub fn file_unreadable(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileUnreadable {
            path: path.into(),
            source,
        }
    }

    /// 是否属于获取文件大小阶段的错误
    pub fn is_size_unavailable(&self) -> bool {
        matches!(
            self,
            Self::SizeUnavailable(_) | Self::ContentLengthMissing | Self::ContentLengthInvalid(_)
        )
    }
}
