pub mod chunk_fetcher;
pub mod chunk_range;
pub mod config;
pub mod downloader;
pub mod error;
pub mod logger;
pub mod util;
pub mod verifier;

#[cfg(test)]
pub mod test_server;
