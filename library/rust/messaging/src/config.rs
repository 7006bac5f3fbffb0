use serde::{Deserialize, Serialize};

/// MessagingConfig は Kafka 接続設定を表す。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Kafka ブローカーアドレスのリスト（例: ["kafka:9092"]）
    pub brokers: Vec<String>,
    /// セキュリティプロトコル（PLAINTEXT / SSL / SASL_PLAINTEXT / SASL_SSL）
    #[serde(default = "default_security_protocol")]
    pub security_protocol: String,
}

fn default_security_protocol() -> String {
    "PLAINTEXT".to_string()
}

impl MessagingConfig {
    /// ブローカーアドレスをカンマ区切り文字列で返す（rdkafka 用）。
    pub fn brokers_string(&self) -> String {
        self.brokers.join(",")
    }
}

/// ConsumerConfig は Kafka コンシューマーの設定を表す。
///
/// オフセットは常に手動コミットする。配送が確定する前に
/// オフセットが進まないようにするため、オートコミットは設定できない。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// コンシューマーグループ ID
    pub group_id: String,
    /// サブスクライブするトピックのリスト
    pub topics: Vec<String>,
    /// セッションタイムアウト（ミリ秒）
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,
    /// コミット済みオフセットが無い場合の開始位置（latest / earliest）
    #[serde(default = "default_auto_offset_reset")]
    pub auto_offset_reset: String,
}

fn default_session_timeout_ms() -> u64 {
    30000
}

fn default_auto_offset_reset() -> String {
    "latest".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brokers_string_multiple() {
        let cfg = MessagingConfig {
            brokers: vec!["kafka-0:9092".to_string(), "kafka-1:9092".to_string()],
            security_protocol: "PLAINTEXT".to_string(),
        };
        assert_eq!(cfg.brokers_string(), "kafka-0:9092,kafka-1:9092");
    }

    #[test]
    fn test_messaging_config_defaults() {
        let yaml = r#"
brokers:
  - "kafka:9092"
"#;
        let cfg: MessagingConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.security_protocol, "PLAINTEXT");
    }

    #[test]
    fn test_consumer_config_defaults() {
        let json = r#"{"group_id": "my-group", "topics": ["my-topic"]}"#;
        let cfg: ConsumerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.session_timeout_ms, 30000);
        assert_eq!(cfg.auto_offset_reset, "latest");
    }
}
