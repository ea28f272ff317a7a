use std::num::NonZeroU64;
use std::path::PathBuf;

use log::{debug, error, info};
use reqwest::{Client, Method, Request};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::download::chunk_fetcher::ChunkFetcher;
use crate::download::error::DownloadError;
use crate::download::util::{create_http_request, get_file_length};
use crate::download::verifier::files_match;
use crate::progress::ProgressReporter;

/// 一次下载的全部输入，运行期间不变
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub url: Url,
    pub chunk_size: NonZeroU64,
    pub output_path: PathBuf,
    pub reference_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    Pending,
    Probing,
    Fetching { offset: u64 },
    Verifying,
    Done { matches: bool },
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub total_len: u64,
    pub written: u64,
    pub output_path: PathBuf,
    pub matches: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DownloaderOptions {
    pub use_browser_user_agent: bool,
    pub allow_missing_content_length: bool,
}

pub struct Downloader {
    client: Client,
    request: TransferRequest,
    options: DownloaderOptions,
    phase: TransferPhase,
}

impl Downloader {
    pub fn new(client: Client, request: TransferRequest, options: DownloaderOptions) -> Self {
        Self {
            client,
            request,
            options,
            phase: TransferPhase::Pending,
        }
    }

    pub fn phase(&self) -> TransferPhase {
        self.phase
    }

    fn set_phase(&mut self, phase: TransferPhase) {
        debug!("Transfer phase: {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    fn create_http_request(&self) -> Request {
        create_http_request(Method::GET, &self.request.url, self.options.use_browser_user_agent)
    }

    /// 获取大小 -> 顺序下载 -> 校验，任何一步失败都终止
    pub async fn run(&mut self, progress: &mut dyn ProgressReporter) -> Result<TransferReport, DownloadError> {
        let result = self.execute(progress).await;
        if let Err(err) = &result {
            error!("Transfer failed in {:?}: {}", self.phase, err);
            self.set_phase(TransferPhase::Failed);
        }

        result
    }

    async fn execute(&mut self, progress: &mut dyn ProgressReporter) -> Result<TransferReport, DownloadError> {
        let http_request = self.create_http_request();

        self.set_phase(TransferPhase::Probing);
        let total_len = get_file_length(
            &self.client,
            &http_request,
            self.options.allow_missing_content_length,
        )
        .await?;
        info!("Total file size: {} bytes", total_len);

        self.set_phase(TransferPhase::Fetching { offset: 0 });
        let written = self.fetch(&http_request, total_len, progress).await?;
        self.set_phase(TransferPhase::Fetching { offset: written });
        info!("File downloaded successfully as {}", self.request.output_path.display());

        self.set_phase(TransferPhase::Verifying);
        let matches = files_match(&self.request.output_path, &self.request.reference_path).await?;
        if matches {
            info!("The downloaded file matches {}", self.request.reference_path.display());
        } else {
            info!("The downloaded file does not match {}", self.request.reference_path.display());
        }
        self.set_phase(TransferPhase::Done { matches });

        Ok(TransferReport {
            total_len,
            written,
            output_path: self.request.output_path.clone(),
            matches,
        })
    }

    async fn fetch(
        &mut self,
        http_request: &Request,
        total_len: u64,
        progress: &mut dyn ProgressReporter,
    ) -> Result<u64, DownloadError> {
        let mut file = File::create(&self.request.output_path).await?;
        let mut fetcher = ChunkFetcher::new(&self.client, http_request, self.request.chunk_size, total_len);

        let result = fetcher.fetch_all(&mut file, progress).await;
        let written = fetcher.state().written;
        if result.is_err() {
            self.phase = TransferPhase::Fetching { offset: written };
        }

        // 无论成功与否都把已写入的数据落盘
        file.flush().await?;
        file.sync_all().await?;

        result.map(|state| state.written)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::{header, HeaderMap, Method as AxumMethod, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::Router;

    use super::*;
    use crate::download::test_server::{pattern, spawn, TestServer};
    use crate::progress::recording::RecordingProgress;
    use crate::progress::NoopProgress;
    use crate::server::router;

    async fn serve_dir(dir: &std::path::Path) -> TestServer {
        spawn(router(dir.to_path_buf())).await
    }

    fn transfer_request(server: &TestServer, dir: &std::path::Path, name: &str, chunk_size: u64) -> TransferRequest {
        TransferRequest {
            url: server.url(&format!("/{}", name)),
            chunk_size: NonZeroU64::new(chunk_size).unwrap(),
            output_path: dir.join("output"),
            reference_path: dir.join(name),
        }
    }

    #[tokio::test]
    async fn should_download_and_match() {
        let dir = tempfile::tempdir().unwrap();
        let data = pattern(250);
        fs::write(dir.path().join("source"), &data).unwrap();
        let server = serve_dir(dir.path()).await;

        let request = transfer_request(&server, dir.path(), "source", 100);
        let mut downloader = Downloader::new(Client::new(), request, DownloaderOptions::default());
        let mut progress = RecordingProgress::default();
        let report = downloader.run(&mut progress).await.unwrap();

        assert_eq!(report.total_len, 250);
        assert_eq!(report.written, 250);
        assert!(report.matches);
        assert_eq!(downloader.phase(), TransferPhase::Done { matches: true });
        assert_eq!(fs::read(dir.path().join("output")).unwrap(), data);
        assert_eq!(progress.downloaded_len(), 250);
    }

    #[tokio::test]
    async fn empty_resource_matches_empty_reference() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("empty"), b"").unwrap();
        let server = serve_dir(dir.path()).await;

        let request = transfer_request(&server, dir.path(), "empty", 100);
        let mut downloader = Downloader::new(Client::new(), request, DownloaderOptions::default());
        let report = downloader.run(&mut NoopProgress).await.unwrap();

        assert_eq!(report.total_len, 0);
        assert!(report.matches);
        assert_eq!(fs::metadata(dir.path().join("output")).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn mismatch_is_reported_not_failed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("source"), pattern(300)).unwrap();
        let mut reference = pattern(300);
        reference[150] ^= 1;
        fs::write(dir.path().join("reference"), reference).unwrap();
        let server = serve_dir(dir.path()).await;

        let mut request = transfer_request(&server, dir.path(), "source", 64);
        request.reference_path = dir.path().join("reference");
        let mut downloader = Downloader::new(Client::new(), request, DownloaderOptions::default());
        let report = downloader.run(&mut NoopProgress).await.unwrap();

        assert!(!report.matches);
        assert_eq!(downloader.phase(), TransferPhase::Done { matches: false });
    }

    #[derive(Clone, Default)]
    struct Counters {
        head: Arc<AtomicUsize>,
        get: Arc<AtomicUsize>,
    }

    async fn count_and_fail(State(counters): State<Counters>, method: AxumMethod, headers: HeaderMap) -> Response {
        if method == AxumMethod::HEAD {
            counters.head.fetch_add(1, Ordering::SeqCst);
            return StatusCode::NOT_FOUND.into_response();
        }

        if headers.contains_key(header::RANGE) {
            counters.get.fetch_add(1, Ordering::SeqCst);
        }
        StatusCode::OK.into_response()
    }

    #[tokio::test]
    async fn probe_failure_stops_before_ranges() {
        let dir = tempfile::tempdir().unwrap();
        let counters = Counters::default();
        let app = Router::new()
            .route("/file", get(count_and_fail))
            .with_state(counters.clone());
        let server = spawn(app).await;

        let request = transfer_request(&server, dir.path(), "file", 100);
        let mut downloader = Downloader::new(Client::new(), request, DownloaderOptions::default());
        let err = downloader.run(&mut NoopProgress).await.unwrap_err();

        assert!(matches!(err, DownloadError::SizeUnavailable(status) if status == StatusCode::NOT_FOUND));
        assert_eq!(downloader.phase(), TransferPhase::Failed);
        assert_eq!(counters.head.load(Ordering::SeqCst), 1);
        assert_eq!(counters.get.load(Ordering::SeqCst), 0);
        assert!(!dir.path().join("output").exists());
    }

    async fn fail_second_range(State(counter): State<Arc<AtomicUsize>>, method: AxumMethod) -> Response {
        let body = pattern(300);
        if method == AxumMethod::HEAD {
            return (StatusCode::OK, body).into_response();
        }

        let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
        match count {
            1 => (StatusCode::PARTIAL_CONTENT, body[..100].to_vec()).into_response(),
            2 => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            _ => (StatusCode::PARTIAL_CONTENT, body[200..].to_vec()).into_response(),
        }
    }

    #[tokio::test]
    async fn failed_range_leaves_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/file", get(fail_second_range))
            .with_state(counter.clone());
        let server = spawn(app).await;

        let request = transfer_request(&server, dir.path(), "file", 100);
        let mut downloader = Downloader::new(Client::new(), request, DownloaderOptions::default());
        let err = downloader.run(&mut NoopProgress).await.unwrap_err();

        assert!(matches!(err, DownloadError::RangeRequestFailed { status, .. } if status == StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(fs::read(dir.path().join("output")).unwrap(), pattern(300)[..100]);
    }
}
