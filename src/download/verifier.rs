//!
//! # 校验模块
//! 逐字节比较下载结果与参考文件
//!

use std::path::Path;

use log::{info, warn};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};

use crate::download::error::DownloadError;

const COMPARE_BUFFER_SIZE: usize = 64 * 1024;

/// 两个文件长度和内容完全一致时返回 true
pub async fn files_match(output: &Path, reference: &Path) -> Result<bool, DownloadError> {
    let output_file = open(output).await?;
    let reference_file = open(reference).await?;

    let output_len = file_len(&output_file, output).await?;
    let reference_len = file_len(&reference_file, reference).await?;
    if output_len != reference_len {
        warn!(
            "Length mismatch: {} has {} bytes, {} has {} bytes",
            output.display(),
            output_len,
            reference.display(),
            reference_len
        );
        return Ok(false);
    }

    let mut output_reader = BufReader::new(output_file);
    let mut reference_reader = BufReader::new(reference_file);
    let mut output_buf = vec![0u8; COMPARE_BUFFER_SIZE];
    let mut reference_buf = vec![0u8; COMPARE_BUFFER_SIZE];
    let mut offset = 0u64;

    loop {
        let read = read_full(&mut output_reader, &mut output_buf, output).await?;
        let reference_read = read_full(&mut reference_reader, &mut reference_buf, reference).await?;

        if read != reference_read || output_buf[..read] != reference_buf[..read] {
            let position = output_buf[..read]
                .iter()
                .zip(&reference_buf[..reference_read])
                .position(|(a, b)| a != b)
                .unwrap_or(read.min(reference_read));
            info!("Content differs at offset {}", offset + position as u64);
            return Ok(false);
        }

        if read == 0 {
            return Ok(true);
        }
        offset += read as u64;
    }
}

async fn open(path: &Path) -> Result<File, DownloadError> {
    File::open(path)
        .await
        .map_err(|err| DownloadError::file_unreadable(path, err))
}

async fn file_len(file: &File, path: &Path) -> Result<u64, DownloadError> {
    file.metadata()
        .await
        .map(|metadata| metadata.len())
        .map_err(|err| DownloadError::file_unreadable(path, err))
}

/// 尽量读满 buf，返回 0 表示到达文件末尾
async fn read_full(reader: &mut BufReader<File>, buf: &mut [u8], path: &Path) -> Result<usize, DownloadError> {
    let mut filled = 0;
    while filled < buf.len() {
        let read = reader
            .read(&mut buf[filled..])
            .await
            .map_err(|err| DownloadError::file_unreadable(path, err))?;
        if read == 0 {
            break;
        }
        filled += read;
    }

    Ok(filled)
}
