use sha2::{Digest, Sha256};

/// consumer_group_id はコールバック URL からコンシューマーグループ ID を導出する。
///
/// 同じ URL を配送先とするプロセスは同じグループに参加し、消費位置を共有する。
/// `prefix` を指定した場合は `<prefix>.<hash>` の形式になる。
/// 先頭・末尾の `/` は取り除き、途中の `/` は `.` に置き換える。
pub fn consumer_group_id(callback_url: &str, prefix: Option<&str>) -> String {
    let hash = hex::encode(Sha256::digest(callback_url.as_bytes()));
    let namespace = prefix
        .map(|p| p.trim_matches('/').replace('/', "."))
        .filter(|p| !p.is_empty());
    match namespace {
        Some(ns) => format!("{ns}.{hash}"),
        None => hash,
    }
}
