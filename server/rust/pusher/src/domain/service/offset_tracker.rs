use std::collections::HashMap;

use crate::domain::entity::{OffsetAnomaly, PartitionKey};

/// OffsetTracker はパーティションごとに最後に処理したオフセットを保持し、
/// 連続しないオフセットを検出する。
///
/// 配送ループのタスクだけが所有するためロックは持たない。
#[derive(Debug, Default)]
pub struct OffsetTracker {
    cursors: HashMap<PartitionKey, i64>,
}

impl OffsetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// `offset` が直前の処理済みオフセットの次でなければ異常を返す。
    /// 初めて見るパーティションでは基準が無いため常に `None`。
    pub fn check(&self, key: &PartitionKey, offset: i64) -> Option<OffsetAnomaly> {
        let last = *self.cursors.get(key)?;
        // i64::MAX の次も表現できるよう i128 で比較する
        let expected = i128::from(last) + 1;
        (i128::from(offset) != expected).then(|| OffsetAnomaly {
            key: key.clone(),
            expected,
            found: offset,
        })
    }

    /// 処理済みオフセットを更新する。巻き戻りも補正せずそのまま記録する。
    pub fn advance(&mut self, key: PartitionKey, offset: i64) {
        self.cursors.insert(key, offset);
    }

    /// `check` と `advance` をまとめて行う。
    pub fn observe(&mut self, topic: &str, partition: i32, offset: i64) -> Option<OffsetAnomaly> {
        let key = PartitionKey::new(topic, partition);
        let anomaly = self.check(&key, offset);
        self.advance(key, offset);
        anomaly
    }

    /// パーティションの処理済みオフセットを返す。
    pub fn last_offset(&self, key: &PartitionKey) -> Option<i64> {
        self.cursors.get(key).copied()
    }
}
