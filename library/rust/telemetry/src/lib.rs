//! k1s0-telemetry: 構造化ログの初期化ライブラリ。

pub mod logger;

pub use logger::{init_logger, LogConfig};
