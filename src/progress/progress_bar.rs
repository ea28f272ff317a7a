use std::fmt::Write;
use std::io::stdout;
use std::time::Instant;

use crossterm::cursor::{MoveToColumn, MoveToPreviousLine};
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};
use log::warn;

use crate::progress::ProgressReporter;

const DEFAULT_WIDTH: usize = 80;

/// 两行终端进度条：速度/百分比/耗时 + 已下载大小，第二行为进度条
pub struct ProgressBar {
    bar_buf: String,
    buf: String,
    label: String,
    start_instant: Instant,
    bar_width: usize,
    downloaded_len: u64,
    printed: bool,
}

impl ProgressBar {
    pub fn new(label: impl Into<String>, max_width: usize) -> Self {
        Self {
            buf: String::new(),
            bar_buf: String::new(),
            label: label.into(),
            start_instant: Instant::now(),
            bar_width: crossterm::terminal::size()
                .ok()
                .map(|(cols, _rows)| usize::from(cols))
                .filter(|cols| *cols > 0)
                .unwrap_or(DEFAULT_WIDTH)
                .min(max_width)
                .max(2),
            downloaded_len: 0,
            printed: false,
        }
    }

    fn progress(downloaded_len: u64, total_len: u64) -> usize {
        if total_len == 0 {
            return 100;
        }

        (downloaded_len.min(total_len) * 100 / total_len) as usize
    }

    fn update(&mut self, total_len: u64, speed: u64) -> Result<&str, std::fmt::Error> {
        let progress = Self::progress(self.downloaded_len, total_len);

        let (downloaded_len_size, downloaded_len_unit) = Self::byte_unit(self.downloaded_len);
        let (total_len_size, total_len_unit) = Self::byte_unit(total_len);
        let (speed_size, speed_unit) = Self::byte_unit(speed);

        self.bar_buf.clear();
        self.buf.clear();
        let duration = self.start_instant.elapsed();
        write!(
            self.bar_buf,
            "{} {speed_size:.2} {speed_unit}/s - {progress} % - elapsed: {duration:.2?} ",
            self.label
        )?;
        write!(self.buf, "{downloaded_len_size:.2} {downloaded_len_unit} / {total_len_size:.2} {total_len_unit}")?;
        let padding = self.bar_width.saturating_sub(self.bar_buf.len() + self.buf.len());
        for _ in 0..padding {
            self.bar_buf.push(' ');
        }
        writeln!(self.bar_buf, "{}", self.buf)?;

        let bar_p_width = self.bar_width - 2;
        let progress_width = progress * bar_p_width / 100;
        self.bar_buf.push('[');
        for _ in 0..progress_width {
            self.bar_buf.push('█');
        }
        for _ in progress_width..bar_p_width {
            self.bar_buf.push(' ');
        }
        self.bar_buf.push(']');

        Ok(&self.bar_buf)
    }

    fn print(&mut self, total_len: u64) {
        let elapsed = self.start_instant.elapsed().as_secs_f64();
        let speed = if elapsed > 0.0 {
            (self.downloaded_len as f64 / elapsed) as u64
        } else {
            0
        };

        // 首次打印前留出一行，供之后 MoveToPreviousLine 覆盖
        let first_print = !self.printed;
        self.printed = true;

        let update_value = match self.update(total_len, speed) {
            Ok(value) => value.to_string(),
            Err(err) => {
                warn!("Render progress failed: {}", err);
                return;
            }
        };

        let result = if first_print {
            execute!(stdout(), crossterm::style::Print("\n"), crossterm::style::Print(update_value))
        } else {
            execute!(
                stdout(),
                Clear(ClearType::CurrentLine),
                MoveToPreviousLine(1),
                Clear(ClearType::CurrentLine),
                MoveToColumn(0),
                crossterm::style::Print(update_value),
            )
        };
        if let Err(err) = result {
            warn!("Print progress failed: {}", err);
        }
    }

    fn byte_unit(bytes_count: u64) -> (f32, &'static str) {
        const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

        let mut i = 0;
        let mut bytes_count = bytes_count as f32;
        while bytes_count >= 1024.0 && i < UNITS.len() - 1 {
            i += 1;
            bytes_count /= 1024.0;
        }
        (bytes_count, UNITS[i])
    }
}

impl ProgressReporter for ProgressBar {
    fn start(&mut self, total_len: u64) {
        self.start_instant = Instant::now();
        self.downloaded_len = 0;
        self.print(total_len);
    }

    fn advance(&mut self, total_len: u64, increment: u64) {
        self.downloaded_len += increment;
        self.print(total_len);
    }

    fn finish(&mut self) {
        if self.printed {
            let _ = execute!(stdout(), crossterm::style::Print("\n"));
        }
    }
}
