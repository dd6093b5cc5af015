use thiserror::Error;

#[derive(Error, Debug)]
pub enum FieldLogError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("Excelファイルを読み込めません: {0}")]
    InputFormat(String),

    #[error("住所検索に失敗: {0}")]
    Lookup(String),

    #[error("写真のメタデータを読み込めません: {0}")]
    MetadataRead(String),

    #[error("ルート作成には座標のある住所が2件以上必要です（現在 {found} 件）")]
    InsufficientWaypoints { found: usize },

    #[error("位置情報がないため保存できません")]
    MissingLocation,

    #[error("ツリー番号は1以上を指定してください: {0}")]
    InvalidCategory(u32),

    #[error("住所ID {0} が見つかりません")]
    UnknownAddress(u32),

    #[error("対話入力エラー: {0}")]
    Prompt(String),

    #[error("入力エラー: {0}")]
    Input(#[from] fieldlog_common::Error),

    #[error("HTTPエラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FieldLogError>;
