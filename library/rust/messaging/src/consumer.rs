use tokio::sync::mpsc;

use crate::error::MessagingError;

/// ConsumedMessage は Kafka から受信したメッセージを表す。
/// 受信後は変更されない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedMessage {
    /// トピック名
    pub topic: String,
    /// パーティション番号
    pub partition: i32,
    /// オフセット
    pub offset: i64,
    /// メッセージキー
    pub key: Option<Vec<u8>>,
    /// メッセージペイロード
    pub payload: Vec<u8>,
}

impl ConsumedMessage {
    /// キーを文字列として返す。キーが無い場合は空文字列。
    pub fn key_lossy(&self) -> String {
        self.key
            .as_deref()
            .map(|k| String::from_utf8_lossy(k).into_owned())
            .unwrap_or_default()
    }

    /// ペイロードを文字列として返す。
    pub fn payload_lossy(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// ConsumerErrors はコンシューマーのバックグラウンドエラーを受け取るチャネル。
/// 受信ループとは独立したタスクで読み出す。
pub type ConsumerErrors = mpsc::UnboundedReceiver<MessagingError>;

/// EventConsumer は Kafka からのメッセージ受信インターフェース。
#[async_trait::async_trait]
pub trait EventConsumer: Send + Sync {
    /// 次のメッセージを受信する。
    ///
    /// コンシューマーがクローズされた場合は `Ok(None)` を返す。
    /// `Err` は回復不能なエラーであり、呼び出し側は受信を終了する。
    async fn receive(&self) -> Result<Option<ConsumedMessage>, MessagingError>;

    /// メッセージのオフセット（と同一パーティションのそれ以前のオフセット）を処理済みとしてコミットする。
    async fn commit(&self, msg: &ConsumedMessage) -> Result<(), MessagingError>;

    /// コンシューマーをクローズする。待機中の `receive` は `Ok(None)` を返す。
    fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(key: Option<&[u8]>, payload: &[u8]) -> ConsumedMessage {
        ConsumedMessage {
            topic: "k1s0.system.audit.v1".to_string(),
            partition: 0,
            offset: 42,
            key: key.map(<[u8]>::to_vec),
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn test_key_lossy_without_key() {
        assert_eq!(message(None, b"body").key_lossy(), "");
    }

    #[test]
    fn test_key_and_payload_lossy() {
        let msg = message(Some(b"user-1"), b"{\"event\":\"login\"}");
        assert_eq!(msg.key_lossy(), "user-1");
        assert_eq!(msg.payload_lossy(), "{\"event\":\"login\"}");
    }

    #[test]
    fn test_payload_lossy_replaces_invalid_utf8() {
        let msg = message(None, &[0x66, 0xff, 0x6f]);
        assert_eq!(msg.payload_lossy(), "f\u{fffd}o");
    }
}
