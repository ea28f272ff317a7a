//! 日志模块

use std::path::Path;

use anyhow::{Context, Result};
use log::LevelFilter;

pub fn parse_level(level: &str) -> Result<LevelFilter> {
    level
        .parse::<LevelFilter>()
        .with_context(|| format!("Invalid log level: {}", level))
}

/// 日志输出到 stderr，指定文件时同时写入文件
pub fn setup_logger(level: LevelFilter, log_file: Option<&Path>) -> Result<()> {
    let mut base_config = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S"),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr());

    if let Some(file) = log_file {
        let file = fern::log_file(file).with_context(|| format!("Open log file failed: {}", file.display()))?;
        base_config = base_config.chain(file);
    }

    base_config.apply()?;

    Ok(())
}
