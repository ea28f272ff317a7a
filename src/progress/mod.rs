mod progress_bar;

pub use progress_bar::ProgressBar;

/// 下载进度回调，只用于展示，不参与控制流程
pub trait ProgressReporter {
    fn start(&mut self, _total_len: u64) {}

    /// `increment` 为刚写入文件的字节数
    fn advance(&mut self, total_len: u64, increment: u64);

    fn finish(&mut self) {}
}

pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn advance(&mut self, _total_len: u64, _increment: u64) {}
}

#[cfg(test)]
pub mod recording {
    use super::ProgressReporter;

    /// 记录所有回调，供测试断言
    #[derive(Default, Debug)]
    pub struct RecordingProgress {
        pub started_with: Option<u64>,
        pub increments: Vec<u64>,
        pub finished: bool,
    }

    impl RecordingProgress {
        pub fn downloaded_len(&self) -> u64 {
            self.increments.iter().sum()
        }
    }

    impl ProgressReporter for RecordingProgress {
        fn start(&mut self, total_len: u64) {
            self.started_with = Some(total_len);
        }

        fn advance(&mut self, _total_len: u64, increment: u64) {
            self.increments.push(increment);
        }

        fn finish(&mut self) {
            self.finished = true;
        }
    }
}
