use std::fmt;

use k1s0_messaging::ConsumedMessage;

/// PartitionKey はオフセット追跡の単位となる (topic, partition) の組。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    pub topic: String,
    pub partition: i32,
}

impl PartitionKey {
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }

    /// 受信メッセージのパーティションキーを返す。
    pub fn of(msg: &ConsumedMessage) -> Self {
        Self::new(msg.topic.clone(), msg.partition)
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.topic, self.partition)
    }
}

/// OffsetAnomaly は直前に処理したオフセットから連続しないオフセットを受信したことを表す。
/// 診断用であり、配送処理には影響しない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetAnomaly {
    pub key: PartitionKey,
    /// 直前の処理済みオフセット + 1。i64::MAX の次も表せるよう i128 で持つ
    pub expected: i128,
    pub found: i64,
}

impl OffsetAnomaly {
    /// 期待値との差。負の場合はオフセットが巻き戻っている。
    pub fn gap(&self) -> i128 {
        i128::from(self.found) - self.expected
    }

    /// 処理済みオフセット以下のオフセットを受信したかどうか。
    pub fn is_regression(&self) -> bool {
        i128::from(self.found) < self.expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_key_display() {
        let key = PartitionKey::new("orders", 3);
        assert_eq!(key.to_string(), "orders:3");
    }

    #[test]
    fn test_partition_key_of_message() {
        let msg = ConsumedMessage {
            topic: "orders".to_string(),
            partition: 2,
            offset: 10,
            key: None,
            payload: Vec::new(),
        };
        assert_eq!(PartitionKey::of(&msg), PartitionKey::new("orders", 2));
    }

    #[test]
    fn test_anomaly_gap_forward() {
        let anomaly = OffsetAnomaly {
            key: PartitionKey::new("orders", 0),
            expected: 6,
            found: 7,
        };
        assert_eq!(anomaly.gap(), 1);
        assert!(!anomaly.is_regression());
    }

    #[test]
    fn test_anomaly_regression() {
        let anomaly = OffsetAnomaly {
            key: PartitionKey::new("orders", 0),
            expected: 11,
            found: 4,
        };
        assert_eq!(anomaly.gap(), -7);
        assert!(anomaly.is_regression());
    }
}
