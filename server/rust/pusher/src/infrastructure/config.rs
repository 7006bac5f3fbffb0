use std::time::Duration;

use k1s0_messaging::{ConsumerConfig, MessagingConfig};
use k1s0_telemetry::LogConfig;
use serde::Deserialize;

use crate::domain::service::{consumer_group_id, RetryPolicy};

/// Application configuration for pusher.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    #[serde(default)]
    pub log: LogConfig,
    pub kafka: KafkaConfig,
    pub callback: CallbackConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// 起動前に設定値を検証する。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kafka.brokers.is_empty() {
            return Err(ConfigError::MissingBrokers);
        }
        if self.kafka.topics.is_empty() {
            return Err(ConfigError::MissingTopics);
        }
        self.callback.validate()
    }

    /// コールバック URL から導出したコンシューマーグループ ID。
    pub fn consumer_group_id(&self) -> String {
        consumer_group_id(&self.callback.url, self.kafka.group_prefix.as_deref())
    }
}

/// ConfigError は設定値の検証エラーを表す。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("kafka.brokers must not be empty")]
    MissingBrokers,

    #[error("kafka.topics must not be empty")]
    MissingTopics,

    #[error("callback.url is invalid: {0}")]
    InvalidCallbackUrl(String),

    #[error("callback.retry_times must be at least 1")]
    ZeroRetryTimes,

    #[error("callback.timeout_ms must be greater than 0")]
    ZeroTimeout,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

/// KafkaConfig は Kafka ブローカー接続と購読の設定を表す。
#[derive(Debug, Clone, Deserialize)]
pub struct KafkaConfig {
    pub brokers: Vec<String>,
    #[serde(default = "default_security_protocol")]
    pub security_protocol: String,
    pub topics: Vec<String>,
    /// コンシューマーグループ名の名前空間
    #[serde(default)]
    pub group_prefix: Option<String>,
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: u64,
    #[serde(default = "default_auto_offset_reset")]
    pub auto_offset_reset: String,
}

fn default_security_protocol() -> String {
    "PLAINTEXT".to_string()
}

fn default_session_timeout_ms() -> u64 {
    30000
}

fn default_auto_offset_reset() -> String {
    "latest".to_string()
}

impl KafkaConfig {
    pub fn messaging_config(&self) -> MessagingConfig {
        MessagingConfig {
            brokers: self.brokers.clone(),
            security_protocol: self.security_protocol.clone(),
        }
    }

    pub fn consumer_config(&self, group_id: String) -> ConsumerConfig {
        ConsumerConfig {
            group_id,
            topics: self.topics.clone(),
            session_timeout_ms: self.session_timeout_ms,
            auto_offset_reset: self.auto_offset_reset.clone(),
        }
    }
}

/// CallbackConfig は配送先 HTTP エンドポイントとリトライの設定を表す。
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackConfig {
    pub url: String,
    /// 1 サイクルあたりの試行回数
    #[serde(default = "default_retry_times")]
    pub retry_times: u32,
    /// 1 回の HTTP リクエストのタイムアウト（ミリ秒）
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// true の場合、試行を使い切ったメッセージを諦めてコミットする
    #[serde(default)]
    pub bypass_failed: bool,
    /// bypass_failed が false の場合に次のサイクルまで待機する時間（ミリ秒）
    #[serde(default = "default_failed_sleep_ms")]
    pub failed_sleep_ms: u64,
}

fn default_retry_times() -> u32 {
    3
}

fn default_timeout_ms() -> u64 {
    3000
}

fn default_failed_sleep_ms() -> u64 {
    3000
}

impl CallbackConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| ConfigError::InvalidCallbackUrl(format!("{}: {}", self.url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidCallbackUrl(format!(
                "{}: unsupported scheme {}",
                self.url,
                parsed.scheme()
            )));
        }
        if self.retry_times == 0 {
            return Err(ConfigError::ZeroRetryTimes);
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn failed_sleep(&self) -> Duration {
        Duration::from_millis(self.failed_sleep_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_times, self.bypass_failed, self.failed_sleep())
    }
}

/// ShutdownConfig は停止シグナル受信後の待機設定を表す。
#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownConfig {
    /// 配送ループの終了を待つ最大時間（秒）
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: default_grace_period_secs(),
        }
    }
}

fn default_grace_period_secs() -> u64 {
    30
}
