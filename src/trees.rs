//! ツリー記録
//!
//! 保存のみの追記リスト。更新・削除はない。

use crate::error::{FieldLogError, Result};
use chrono::{DateTime, Utc};
use fieldlog_common::{LatLon, PhotoRef, TreeChoice, TreeRecord};
use std::path::Path;

#[derive(Debug, Default)]
pub struct TreeRecordStore {
    trees: Vec<TreeRecord>,
    last_id: i64,
}

impl TreeRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 現在の写真からツリーを保存
    ///
    /// 位置がなければ `MissingLocation`（リストには追加しない）。
    pub fn save(
        &mut self,
        photo_ref: PhotoRef,
        choice: TreeChoice,
        category: u32,
        location: Option<LatLon>,
        address: impl Into<String>,
    ) -> Result<&TreeRecord> {
        self.save_at(photo_ref, choice, category, location, address, Utc::now())
    }

    fn save_at(
        &mut self,
        photo_ref: PhotoRef,
        choice: TreeChoice,
        category: u32,
        location: Option<LatLon>,
        address: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<&TreeRecord> {
        let location = location.ok_or(FieldLogError::MissingLocation)?;
        if category == 0 {
            return Err(FieldLogError::InvalidCategory(category));
        }

        // 作成時刻(ms)。同じミリ秒なら+1して一意にする
        let id = now.timestamp_millis().max(self.last_id + 1);
        self.last_id = id;

        self.trees.push(TreeRecord {
            id: id.to_string(),
            photo_ref,
            choice,
            category,
            location,
            address: address.into(),
            timestamp: now,
        });
        tracing::info!("ツリー保存: {}{} ({})", choice, category, location);

        Ok(&self.trees[self.trees.len() - 1])
    }

    pub fn trees(&self) -> &[TreeRecord] {
        &self.trees
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.trees)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
