use headers::HeaderMapExt;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_LENGTH, USER_AGENT};
use reqwest::{Client, Method, Request};
use url::Url;

use crate::download::error::DownloadError;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36";

pub fn create_http_request(method: Method, url: &Url, use_browser_user_agent: bool) -> Request {
    let mut request = Request::new(method, url.clone());
    let header_map = request.headers_mut();

    if use_browser_user_agent {
        header_map.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    }
    header_map.insert(ACCEPT, HeaderValue::from_static("*/*"));
    header_map.typed_insert(headers::Connection::keep_alive());

    request
}

pub fn clone_request(request: &Request) -> Request {
    let mut req = Request::new(request.method().clone(), request.url().clone());
    *req.headers_mut() = request.headers().clone();
    *req.version_mut() = request.version();
    *req.timeout_mut() = request.timeout().copied();

    req
}

/// 读取 Content-Length；`allow_missing` 时缺失或无法解析都按 0 处理
pub fn parse_content_length(headers: &HeaderMap, allow_missing: bool) -> Result<u64, DownloadError> {
    let Some(value) = headers.get(CONTENT_LENGTH) else {
        return if allow_missing {
            Ok(0)
        } else {
            Err(DownloadError::ContentLengthMissing)
        };
    };

    let raw = String::from_utf8_lossy(value.as_bytes());
    match raw.trim().parse::<u64>() {
        Ok(length) => Ok(length),
        Err(_) if allow_missing => Ok(0),
        Err(_) => Err(DownloadError::ContentLengthInvalid(raw.into_owned())),
    }
}

/// 发送 HEAD 请求获取文件大小，不传输 body
pub async fn get_file_length(client: &Client, request: &Request, allow_missing: bool) -> Result<u64, DownloadError> {
    let mut head_request = clone_request(request);
    *head_request.method_mut() = Method::HEAD;

    let response = client.execute(head_request).await?;
    let status = response.status();
    debug!("HEAD {} -> {}", request.url(), status);

    if status != reqwest::StatusCode::OK {
        return Err(DownloadError::SizeUnavailable(status));
    }

    parse_content_length(response.headers(), allow_missing)
}
