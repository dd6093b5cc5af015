//! エラー型定義

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("座標の形式が不正です: {0}（例: 41.7508, -88.1535）")]
    InvalidCoordinate(String),

    #[error("面の指定が不正です: {0}（A/B/C/D）")]
    InvalidChoice(String),
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
