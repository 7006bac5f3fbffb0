use k1s0_messaging::ConsumerErrors;

/// drain_consumer_errors はコンシューマーのバックグラウンドエラーを読み出してログに記録する。
///
/// 配送ループとは独立したタスクで動かし、エラーが配送処理に影響することはない。
/// チャネルが閉じると受け取ったエラー件数を返して終了する。
pub async fn drain_consumer_errors(mut errors: ConsumerErrors) -> u64 {
    let mut count = 0;
    while let Some(err) = errors.recv().await {
        count += 1;
        if err.is_fatal() {
            tracing::error!(error = %err, "kafka consumer reported fatal error");
        } else {
            tracing::warn!(error = %err, "kafka consumer background error");
        }
    }
    tracing::debug!(count, "consumer error channel closed");
    count
}
