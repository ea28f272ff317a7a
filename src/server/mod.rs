//!
//! # 文件服务模块
//! 支持 HEAD / GET / Range GET 的静态文件服务，用于提供被下载的资源
//!

use std::io::SeekFrom;
use std::ops::Bound;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{Path as UriPath, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use headers::HeaderMapExt;
use log::{debug, info, warn};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

#[derive(Clone)]
struct ServeState {
    root: Arc<PathBuf>,
}

pub fn router(root: PathBuf) -> Router {
    Router::new()
        .route("/*path", get(serve_file))
        .with_state(ServeState { root: Arc::new(root) })
}

pub async fn setup_server(root: PathBuf, port: u16) -> Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Bind {} failed", addr))?;
    info!("Serving {} on {}", root.display(), addr);

    axum::serve(listener, router(root)).await.context("Server stopped unexpectedly")?;

    Ok(())
}

/// 只接受普通路径组件，防止 `..` 跳出根目录
fn resolve(root: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = Path::new(request_path);
    if relative
        .components()
        .any(|component| !matches!(component, Component::Normal(_)))
    {
        return None;
    }

    Some(root.join(relative))
}

/// 将 Range 头转换为闭区间，不可满足时返回 None
fn satisfiable_range(range: &headers::Range, len: u64) -> Option<(u64, u64)> {
    let (start, end) = range.satisfiable_ranges(len).next()?;
    let start = match start {
        Bound::Included(start) => start,
        Bound::Excluded(start) => start.checked_add(1)?,
        Bound::Unbounded => 0,
    };
    let end = match end {
        Bound::Included(end) => end.min(len.checked_sub(1)?),
        Bound::Excluded(end) => end.checked_sub(1)?.min(len.checked_sub(1)?),
        Bound::Unbounded => len.checked_sub(1)?,
    };

    (start <= end).then_some((start, end))
}

async fn serve_file(
    State(state): State<ServeState>,
    UriPath(request_path): UriPath<String>,
    request_headers: HeaderMap,
) -> Response {
    let Some(file_path) = resolve(&state.root, &request_path) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match open_response(&file_path, &request_headers).await {
        Ok(response) => response,
        Err(err) => {
            warn!("Serve {} failed: {}", file_path.display(), err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn open_response(file_path: &Path, request_headers: &HeaderMap) -> std::io::Result<Response> {
    let mut file = match File::open(file_path).await {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(StatusCode::NOT_FOUND.into_response());
        }
        Err(err) => return Err(err),
    };
    let metadata = file.metadata().await?;
    if !metadata.is_file() {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }
    let len = metadata.len();

    let Some(range) = request_headers.typed_get::<headers::Range>() else {
        debug!("GET {} ({} bytes)", file_path.display(), len);
        let mut response = Body::from_stream(ReaderStream::new(file)).into_response();
        insert_common_headers(response.headers_mut(), len);
        return Ok(response);
    };

    let Some((start, end)) = satisfiable_range(&range, len) else {
        debug!("Unsatisfiable range for {} ({} bytes)", file_path.display(), len);
        let mut response = StatusCode::RANGE_NOT_SATISFIABLE.into_response();
        response
            .headers_mut()
            .typed_insert(headers::ContentRange::unsatisfied_bytes(len));
        return Ok(response);
    };

    debug!("GET {} bytes={}-{}/{}", file_path.display(), start, end, len);
    file.seek(SeekFrom::Start(start)).await?;
    let range_len = end - start + 1;
    let mut response = Body::from_stream(ReaderStream::new(file.take(range_len))).into_response();
    *response.status_mut() = StatusCode::PARTIAL_CONTENT;
    insert_common_headers(response.headers_mut(), range_len);
    if let Ok(content_range) = headers::ContentRange::bytes(start..=end, len) {
        response.headers_mut().typed_insert(content_range);
    }

    Ok(response)
}

fn insert_common_headers(header_map: &mut HeaderMap, content_length: u64) {
    header_map.typed_insert(headers::ContentLength(content_length));
    header_map.typed_insert(headers::AcceptRanges::bytes());
    header_map.typed_insert(headers::ContentType::octet_stream());
}
