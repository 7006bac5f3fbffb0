use std::time::Duration;

/// ExhaustedAction は 1 サイクル分の試行をすべて失敗した後の動作。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustedAction {
    /// 配送を諦めてオフセットをコミットする（メッセージは失われる）。
    Bypass,
    /// 指定時間待機した後、同じメッセージで試行サイクルをやり直す。
    SleepAndRestart(Duration),
}

/// RetryPolicy は配送リトライの判断を行う。
///
/// 待機時間は固定で、指数バックオフやジッターは行わない。
/// 動作は起動時の設定で決まり、メッセージごとには変わらない。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    bypass_failed: bool,
    failed_sleep: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, bypass_failed: bool, failed_sleep: Duration) -> Self {
        Self {
            max_retries,
            bypass_failed,
            failed_sleep,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// 現在のサイクルで `attempt` 回目（0 始まり）の試行を行ってよいかを返す。
    pub fn allows_attempt(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// 試行を使い切った後の動作を返す。
    pub fn on_exhausted(&self) -> ExhaustedAction {
        if self.bypass_failed {
            ExhaustedAction::Bypass
        } else {
            ExhaustedAction::SleepAndRestart(self.failed_sleep)
        }
    }
}
