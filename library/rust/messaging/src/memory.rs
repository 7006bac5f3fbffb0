//! InMemoryEventConsumer: テスト用のインメモリ EventConsumer 実装。
//! feature = "testing" で有効化される。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::consumer::{ConsumedMessage, ConsumerErrors, EventConsumer};
use crate::error::MessagingError;

/// InMemoryEventConsumer は事前に積んだメッセージを順に返し、コミットを記録する。
///
/// メッセージを返し切ると `receive` は `Ok(None)` を返す。
/// `hold_open` を指定した場合は `close` が呼ばれるまで待機する。
pub struct InMemoryEventConsumer {
    pending: Mutex<VecDeque<ConsumedMessage>>,
    committed: Mutex<Vec<ConsumedMessage>>,
    errors: mpsc::UnboundedSender<MessagingError>,
    fail_commits: AtomicBool,
    hold_open: bool,
    shutdown: CancellationToken,
}

impl InMemoryEventConsumer {
    /// メッセージ列から新しいコンシューマーとエラーチャネルを生成する。
    pub fn new(messages: Vec<ConsumedMessage>) -> (Self, ConsumerErrors) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                pending: Mutex::new(messages.into()),
                committed: Mutex::new(Vec::new()),
                errors: tx,
                fail_commits: AtomicBool::new(false),
                hold_open: false,
                shutdown: CancellationToken::new(),
            },
            rx,
        )
    }

    /// メッセージを返し切った後も `close` まで受信を待機させる。
    #[must_use]
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// 以降のコミットを失敗させるかどうかを設定する。
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// バックグラウンドエラーを発生させる。
    pub fn push_error(&self, err: MessagingError) {
        let _ = self.errors.send(err);
    }

    /// コミットに成功したメッセージをコミット順に返す。
    pub fn commits(&self) -> Vec<ConsumedMessage> {
        self.committed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// コミットに成功したオフセットをコミット順に返す。
    pub fn committed_offsets(&self) -> Vec<i64> {
        self.commits().iter().map(|m| m.offset).collect()
    }
}

#[async_trait]
impl EventConsumer for InMemoryEventConsumer {
    async fn receive(&self) -> Result<Option<ConsumedMessage>, MessagingError> {
        if self.shutdown.is_cancelled() {
            return Ok(None);
        }
        let next = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next {
            Some(msg) => Ok(Some(msg)),
            None if self.hold_open => {
                self.shutdown.cancelled().await;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn commit(&self, msg: &ConsumedMessage) -> Result<(), MessagingError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(MessagingError::CommitError(format!(
                "commit rejected for {}:{}@{}",
                msg.topic, msg.partition, msg.offset
            )));
        }
        self.committed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(msg.clone());
        Ok(())
    }

    fn close(&self) {
        self.shutdown.cancel();
    }
}
