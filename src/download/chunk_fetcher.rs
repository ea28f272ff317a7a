use std::num::NonZeroU64;

use bytes::Bytes;
use futures_util::StreamExt;
use headers::HeaderMapExt;
use log::debug;
use reqwest::{Client, Request, Response, StatusCode};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::download::chunk_range::{ChunkInfo, ChunkRange, ChunkRangeIterator};
use crate::download::error::DownloadError;
use crate::download::util::clone_request;
use crate::progress::ProgressReporter;

/// 传输状态，total_len 确定后不再变化，written 单调递增
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferState {
    pub total_len: u64,
    pub written: u64,
}

/// 顺序下载所有 chunk，并按偏移顺序追加写入
pub struct ChunkFetcher<'a> {
    client: &'a Client,
    request: &'a Request,
    chunk_size: NonZeroU64,
    state: TransferState,
}

impl<'a> ChunkFetcher<'a> {
    pub fn new(client: &'a Client, request: &'a Request, chunk_size: NonZeroU64, total_len: u64) -> Self {
        Self {
            client,
            request,
            chunk_size,
            state: TransferState { total_len, written: 0 },
        }
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    /// 第一个失败的 chunk 会立即终止下载，已写入的数据保留在文件中
    pub async fn fetch_all<W>(
        &mut self,
        file: &mut W,
        progress: &mut dyn ProgressReporter,
    ) -> Result<TransferState, DownloadError>
    where
        W: AsyncWrite + Unpin,
    {
        progress.start(self.state.total_len);

        let chunks = ChunkRangeIterator::new(self.chunk_size, self.state.total_len);
        debug!(
            "{} bytes in {} chunks of {} bytes",
            self.state.total_len,
            chunks.chunk_count(),
            self.chunk_size
        );
        for chunk_info in chunks {
            self.fetch_chunk(chunk_info, file, progress).await?;
        }

        progress.finish();
        Ok(self.state)
    }

    async fn fetch_chunk<W>(
        &mut self,
        chunk_info: ChunkInfo,
        file: &mut W,
        progress: &mut dyn ProgressReporter,
    ) -> Result<(), DownloadError>
    where
        W: AsyncWrite + Unpin,
    {
        let range = chunk_info.range;
        debug!("Fetching chunk #{} {}", chunk_info.index, range);

        let response = self.send_range_request(range).await?;
        // 服务器忽略 Range 时返回整个文件，需要跳过 range 之前的字节
        let mut skip = match response.status() {
            StatusCode::PARTIAL_CONTENT => 0,
            _ => range.start,
        };
        let mut remaining = range.len();

        let mut stream = response.bytes_stream();
        while let Some(bytes) = stream.next().await {
            let bytes: Bytes = bytes?;
            let segment = clamp_segment(&bytes, &mut skip, remaining);
            if segment.is_empty() {
                if remaining == 0 {
                    break;
                }
                continue;
            }

            file.write_all(segment).await?;
            let len = segment.len() as u64;
            remaining -= len;
            self.state.written += len;
            progress.advance(self.state.total_len, len);
        }

        if remaining > 0 {
            return Err(DownloadError::ChunkTruncated {
                range,
                received: range.len() - remaining,
            });
        }

        Ok(())
    }

    async fn send_range_request(&self, range: ChunkRange) -> Result<Response, DownloadError> {
        let mut range_request = clone_request(self.request);
        range_request.headers_mut().typed_insert(range.to_range_header()?);

        let response = self.client.execute(range_request).await?;
        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
            return Err(DownloadError::RangeRequestFailed { range, status });
        }

        Ok(response)
    }
}

/// 从 bytes 中先跳过 `skip` 个字节，最多取 `remaining` 个
fn clamp_segment<'b>(bytes: &'b [u8], skip: &mut u64, remaining: u64) -> &'b [u8] {
    let len = bytes.len() as u64;
    if *skip >= len {
        *skip -= len;
        return &[];
    }

    let start = *skip as usize;
    *skip = 0;
    let take = (len - start as u64).min(remaining) as usize;

    &bytes[start..start + take]
}
