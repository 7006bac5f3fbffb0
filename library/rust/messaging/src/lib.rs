//! k1s0-messaging: Kafka コンシューマーの抽象化ライブラリ。
//!
//! パーティション単位で順序付けられたメッセージストリーム、
//! 非同期エラーチャネル、オフセットコミットの 3 つを
//! `EventConsumer` トレイトとして提供する。

pub mod config;
pub mod consumer;
pub mod error;

#[cfg(feature = "kafka")]
pub mod kafka_consumer;

#[cfg(any(test, feature = "testing"))]
pub mod memory;

pub use config::{ConsumerConfig, MessagingConfig};
pub use consumer::{ConsumedMessage, ConsumerErrors, EventConsumer};
pub use error::MessagingError;

#[cfg(feature = "kafka")]
pub use kafka_consumer::KafkaEventConsumer;

#[cfg(any(test, feature = "testing"))]
pub use memory::InMemoryEventConsumer;
