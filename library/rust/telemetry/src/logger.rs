//! 構造化ログユーティリティ。
//! tracing クレートを使用し、JSON またはテキスト形式の構造化ログを出力する。
//!
//! # 使用例
//!
//! ```ignore
//! use tracing::{info, warn};
//!
//! info!(topic = "orders", partition = 0, offset = 42, "received message");
//! warn!(attempt = 2, error = %e, "delivery attempt failed");
//! ```

use serde::Deserialize;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// LogConfig はログ出力の設定を表す。
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// ログレベル。未指定の場合は環境名から決定する。
    #[serde(default)]
    pub level: Option<String>,
    /// "text" の場合はプレーンテキスト、それ以外は JSON。
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    "json".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: None,
            format: default_format(),
        }
    }
}

impl LogConfig {
    /// 実際に適用するログレベルを返す。
    ///
    /// - dev: debug
    /// - その他: info
    pub fn effective_level(&self, environment: &str) -> String {
        if let Some(level) = &self.level {
            return level.clone();
        }
        match environment {
            "dev" => "debug",
            _ => "info",
        }
        .to_string()
    }
}

/// init_logger は tracing-subscriber を初期化する。
/// `RUST_LOG` が設定されている場合はそちらを優先する。
pub fn init_logger(cfg: &LogConfig, environment: &str) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.effective_level(environment)));

    let filter_directives = filter.to_string();
    let registry = tracing_subscriber::registry().with(filter);

    if cfg.format == "text" {
        registry.with(fmt::layer().with_target(true)).try_init()?;
    } else {
        registry
            .with(fmt::layer().json().with_target(true).with_current_span(false))
            .try_init()?;
    }

    tracing::debug!(
        filter = %filter_directives,
        format = %cfg.format,
        environment,
        "logger initialized"
    );
    Ok(())
}
