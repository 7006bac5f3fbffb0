//! KafkaEventConsumer: rdkafka を使用した EventConsumer 実装。
//! feature = "kafka" で有効化される。

use async_trait::async_trait;
use rdkafka::client::ClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{
    BaseConsumer, CommitMode, Consumer, ConsumerContext, Rebalance, StreamConsumer,
};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use tokio::runtime::RuntimeFlavor;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::{ConsumerConfig, MessagingConfig};
use crate::consumer::{ConsumedMessage, ConsumerErrors, EventConsumer};
use crate::error::MessagingError;

/// ErrorForwardingContext は librdkafka のバックグラウンドエラーとリバランスエラーを
/// エラーチャネルへ転送する。
pub struct ErrorForwardingContext {
    errors: mpsc::UnboundedSender<MessagingError>,
}

impl ErrorForwardingContext {
    fn forward(&self, err: MessagingError) {
        // 受信側が閉じている場合はプロセス終了中なので破棄してよい
        let _ = self.errors.send(err);
    }
}

impl ClientContext for ErrorForwardingContext {
    fn error(&self, error: KafkaError, reason: &str) {
        let err = if is_fatal(&error) {
            MessagingError::Fatal(format!("{reason}: {error}"))
        } else {
            MessagingError::ConsumerError(format!("{reason}: {error}"))
        };
        self.forward(err);
    }
}

impl ConsumerContext for ErrorForwardingContext {
    fn post_rebalance(&self, _base_consumer: &BaseConsumer<Self>, rebalance: &Rebalance<'_>) {
        match rebalance {
            Rebalance::Assign(tpl) => {
                tracing::info!(partitions = tpl.count(), "kafka partitions assigned");
            }
            Rebalance::Revoke(tpl) => {
                tracing::info!(partitions = tpl.count(), "kafka partitions revoked");
            }
            Rebalance::Error(e) => {
                self.forward(MessagingError::RebalanceError(e.to_string()));
            }
        }
    }
}

fn is_fatal(error: &KafkaError) -> bool {
    error.rdkafka_error_code() == Some(RDKafkaErrorCode::Fatal)
}

/// ブローカーとの往復を伴う同期処理を実行する。
/// マルチスレッドランタイムでは `block_in_place` で他タスクをワーカーから退避させる。
/// current_thread ランタイムでは `block_in_place` が使えないためそのまま実行する。
fn run_blocking<T>(f: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

/// KafkaEventConsumer は rdkafka の StreamConsumer を使った実装。
/// オートコミットは無効化し、`commit` 呼び出し時にのみオフセットを進める。
pub struct KafkaEventConsumer {
    consumer: StreamConsumer<ErrorForwardingContext>,
    errors: mpsc::UnboundedSender<MessagingError>,
    shutdown: CancellationToken,
}

impl KafkaEventConsumer {
    /// コンシューマーグループに参加し、トピックを購読する。
    /// 併せてバックグラウンドエラーの受信チャネルを返す。
    pub fn new(
        messaging: &MessagingConfig,
        config: &ConsumerConfig,
    ) -> Result<(Self, ConsumerErrors), MessagingError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let context = ErrorForwardingContext { errors: tx.clone() };

        let consumer: StreamConsumer<ErrorForwardingContext> = ClientConfig::new()
            .set("bootstrap.servers", messaging.brokers_string())
            .set("security.protocol", &messaging.security_protocol)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false")
            .set("session.timeout.ms", config.session_timeout_ms.to_string())
            .set("auto.offset.reset", &config.auto_offset_reset)
            .create_with_context(context)
            .map_err(|e| MessagingError::ConnectionError(e.to_string()))?;

        let topics: Vec<&str> = config.topics.iter().map(String::as_str).collect();
        consumer
            .subscribe(&topics)
            .map_err(|e| MessagingError::ConnectionError(e.to_string()))?;

        tracing::info!(
            group = %config.group_id,
            topics = ?config.topics,
            "kafka consumer subscribed"
        );

        Ok((
            Self {
                consumer,
                errors: tx,
                shutdown: CancellationToken::new(),
            },
            rx,
        ))
    }
}

#[async_trait]
impl EventConsumer for KafkaEventConsumer {
    async fn receive(&self) -> Result<Option<ConsumedMessage>, MessagingError> {
        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => return Ok(None),
                result = self.consumer.recv() => match result {
                    Ok(msg) => {
                        return Ok(Some(ConsumedMessage {
                            topic: msg.topic().to_string(),
                            partition: msg.partition(),
                            offset: msg.offset(),
                            key: msg.key().map(<[u8]>::to_vec),
                            payload: msg.payload().unwrap_or_default().to_vec(),
                        }));
                    }
                    Err(e) if is_fatal(&e) => {
                        return Err(MessagingError::Fatal(e.to_string()));
                    }
                    Err(e) => {
                        let _ = self.errors.send(MessagingError::ConsumerError(e.to_string()));
                    }
                },
            }
        }
    }

    async fn commit(&self, msg: &ConsumedMessage) -> Result<(), MessagingError> {
        // Kafka のコミット位置は「次に読むオフセット」なので +1 する
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(&msg.topic, msg.partition, Offset::Offset(msg.offset + 1))
            .map_err(|e| MessagingError::CommitError(e.to_string()))?;

        run_blocking(|| self.consumer.commit(&tpl, CommitMode::Sync))
            .map_err(|e| MessagingError::CommitError(e.to_string()))?;

        Ok(())
    }

    fn close(&self) {
        // グループからの離脱は drop 時に行う
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_blocking_on_multi_thread_runtime() {
        let value = run_blocking(|| {
            std::thread::sleep(std::time::Duration::from_millis(10));
            42
        });
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_run_blocking_on_current_thread_runtime() {
        assert_eq!(run_blocking(|| "committed"), "committed");
    }

    #[test]
    fn test_run_blocking_outside_runtime() {
        assert_eq!(run_blocking(|| 1 + 1), 2);
    }

    #[test]
    fn test_fatal_error_detection() {
        assert!(is_fatal(&KafkaError::MessageConsumption(RDKafkaErrorCode::Fatal)));
        assert!(!is_fatal(&KafkaError::MessageConsumption(
            RDKafkaErrorCode::BrokerTransportFailure
        )));
    }
}
