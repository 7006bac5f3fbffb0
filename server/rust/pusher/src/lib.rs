//! k1s0-pusher: Kafka トピックのメッセージを HTTP エンドポイントへ中継するサーバー。
//!
//! 配送が確定したメッセージのオフセットのみをコミットし、
//! at-least-once 配送を保証する。

pub mod domain;
pub mod infrastructure;
pub mod usecase;
