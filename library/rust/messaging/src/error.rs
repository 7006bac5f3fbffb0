/// MessagingError はメッセージング操作に関するエラーを表す。
#[derive(Debug, Clone, thiserror::Error)]
pub enum MessagingError {
    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("consumer error: {0}")]
    ConsumerError(String),

    #[error("rebalance error: {0}")]
    RebalanceError(String),

    #[error("commit error: {0}")]
    CommitError(String),

    /// 回復不能なエラー。受信ループはこのエラーで終了する。
    #[error("fatal consumer error: {0}")]
    Fatal(String),
}

impl MessagingError {
    /// 受信ループを終了させるべきエラーかどうかを返す。
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}
