use async_trait::async_trait;
use k1s0_messaging::ConsumedMessage;

/// DeliveryError は 1 回の配送試行の失敗を表す。
///
/// 種別はログ用であり、リトライ判断ではすべて同じ失敗として扱う。
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("unexpected status: {0}")]
    UnexpectedStatus(u16),
}

/// DeliveryClient はメッセージ 1 件を 1 回だけ配送先へ送る。
/// リトライは呼び出し側が行う。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    /// `attempt` は現在の試行サイクル内での試行番号（0 始まり）。
    async fn deliver(&self, msg: &ConsumedMessage, attempt: u32) -> Result<(), DeliveryError>;
}
