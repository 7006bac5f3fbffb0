use std::sync::Arc;

use k1s0_messaging::{ConsumedMessage, EventConsumer, MessagingError};

use crate::domain::entity::PartitionKey;
use crate::domain::service::{DeliveryClient, ExhaustedAction, OffsetTracker, RetryPolicy};

/// RelayStats は配送ループの処理件数を表す。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub received: u64,
    pub delivered: u64,
    pub bypassed: u64,
    pub committed: u64,
    pub commit_failures: u64,
    pub offset_anomalies: u64,
    /// 全試行失敗後に待機して再開した回数
    pub restart_cycles: u64,
}

/// Settlement はメッセージ 1 件の配送結果。どちらの場合もコミットしてよい。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settlement {
    Delivered { attempts: u32 },
    Bypassed { attempts: u32 },
}

/// RelayMessagesUseCase はコンシューマーから受信したメッセージを 1 件ずつ配送し、
/// 配送が確定したものから順にオフセットをコミットする。
///
/// - コミットは配送成功、またはバイパス判断の後にしか行わない。
/// - バイパス無効時に配送が失敗し続けると、同じメッセージで無期限に再試行し、
///   後続メッセージへは進まない。順序を守るための意図的なブロックである。
pub struct RelayMessagesUseCase {
    client: Arc<dyn DeliveryClient>,
    policy: RetryPolicy,
}

impl RelayMessagesUseCase {
    pub fn new(client: Arc<dyn DeliveryClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// コンシューマーがクローズされるか回復不能なエラーが起きるまでメッセージを中継する。
    pub async fn run(&self, source: &dyn EventConsumer) -> Result<RelayStats, MessagingError> {
        let mut tracker = OffsetTracker::new();
        let mut stats = RelayStats::default();

        loop {
            let msg = match source.receive().await {
                Ok(Some(msg)) => msg,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, stats = ?stats, "message source failed, delivery loop stopped");
                    return Err(e);
                }
            };
            stats.received += 1;
            self.relay_one(source, &msg, &mut tracker, &mut stats).await;
        }

        tracing::info!(stats = ?stats, "message source closed, delivery loop stopped");
        Ok(stats)
    }

    async fn relay_one(
        &self,
        source: &dyn EventConsumer,
        msg: &ConsumedMessage,
        tracker: &mut OffsetTracker,
        stats: &mut RelayStats,
    ) {
        let key = PartitionKey::of(msg);

        if let Some(anomaly) = tracker.check(&key, msg.offset) {
            stats.offset_anomalies += 1;
            tracing::warn!(
                key = %anomaly.key,
                expected = anomaly.expected,
                found = anomaly.found,
                gap = anomaly.gap(),
                regression = anomaly.is_regression(),
                "unexpected offset"
            );
        }

        tracing::info!(
            topic = %msg.topic,
            partition = msg.partition,
            offset = msg.offset,
            "received message"
        );

        let attempts = match self.settle(msg, stats).await {
            Settlement::Delivered { attempts } => {
                stats.delivered += 1;
                attempts
            }
            Settlement::Bypassed { attempts } => {
                stats.bypassed += 1;
                attempts
            }
        };

        tracker.advance(key, msg.offset);

        match source.commit(msg).await {
            Ok(()) => {
                stats.committed += 1;
                tracing::info!(
                    topic = %msg.topic,
                    partition = msg.partition,
                    offset = msg.offset,
                    attempts,
                    "committed message"
                );
            }
            Err(e) => {
                stats.commit_failures += 1;
                tracing::error!(
                    topic = %msg.topic,
                    partition = msg.partition,
                    offset = msg.offset,
                    error = %e,
                    "failed to commit message offset"
                );
            }
        }
    }

    /// 配送が成功するか、バイパスと判断されるまで試行を繰り返す。
    async fn settle(&self, msg: &ConsumedMessage, stats: &mut RelayStats) -> Settlement {
        loop {
            let mut attempt = 0;
            while self.policy.allows_attempt(attempt) {
                tracing::info!(
                    topic = %msg.topic,
                    partition = msg.partition,
                    offset = msg.offset,
                    attempt,
                    "delivering message"
                );
                match self.client.deliver(msg, attempt).await {
                    Ok(()) => {
                        tracing::info!(
                            topic = %msg.topic,
                            partition = msg.partition,
                            offset = msg.offset,
                            attempt,
                            "message delivered"
                        );
                        return Settlement::Delivered {
                            attempts: attempt + 1,
                        };
                    }
                    Err(e) => {
                        tracing::warn!(
                            topic = %msg.topic,
                            partition = msg.partition,
                            offset = msg.offset,
                            attempt,
                            error = %e,
                            "delivery failed"
                        );
                        attempt += 1;
                    }
                }
            }

            match self.policy.on_exhausted() {
                ExhaustedAction::Bypass => {
                    tracing::warn!(
                        topic = %msg.topic,
                        partition = msg.partition,
                        offset = msg.offset,
                        attempts = attempt,
                        "all delivery attempts failed, bypassing message"
                    );
                    return Settlement::Bypassed { attempts: attempt };
                }
                ExhaustedAction::SleepAndRestart(interval) => {
                    stats.restart_cycles += 1;
                    tracing::warn!(
                        topic = %msg.topic,
                        partition = msg.partition,
                        offset = msg.offset,
                        attempts = attempt,
                        sleep_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
                        "all delivery attempts failed, retrying after sleep"
                    );
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }
}
