use crate::route::RouteProfile;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fieldlog")]
#[command(about = "現場作業用 住所・写真ログツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Excelの住所を取り込み、ジオコーディングしてセッションJSONを出力
    Import {
        /// Excelファイル（先頭シートを使用）
        #[arg(required = true)]
        sheet: PathBuf,

        /// 出力JSONファイル（デフォルト: 入力と同じ場所/session.json）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 一覧順のルートも計算する
        #[arg(short, long)]
        route: bool,

        /// ルートの移動手段 (driving/walking/cycling)
        #[arg(long, default_value = "driving")]
        profile: RouteProfile,
    },

    /// Excelの先頭シートを表形式で表示
    Preview {
        /// Excelファイル
        #[arg(required = true)]
        sheet: PathBuf,

        /// 表示する最大行数
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// セッションJSONの住所を地図アプリで開くリンクを表示
    Link {
        /// セッションJSONファイル
        #[arg(required = true)]
        session: PathBuf,

        /// 住所ID
        #[arg(required = true)]
        id: u32,
    },

    /// 住所にコメント・写真を追加
    Note {
        /// セッションJSONファイル
        #[arg(required = true)]
        session: PathBuf,

        /// 住所ID
        #[arg(required = true)]
        id: u32,

        /// コメント（既存のコメントを置き換え）
        #[arg(short, long)]
        comment: Option<String>,

        /// 添付する写真
        #[arg(short, long)]
        photo: Vec<PathBuf>,
    },

    /// 写真1枚のGPS位置と住所を表示
    Locate {
        /// 写真ファイル
        #[arg(required = true)]
        photo: PathBuf,
    },

    /// 写真フォルダを対話的にレビューしてツリーを記録
    Review {
        /// 写真フォルダのパス
        #[arg(required = true)]
        folder: PathBuf,

        /// 出力JSONファイル（デフォルト: 写真フォルダ/trees.json）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 設定を表示/編集
    Config {
        /// User-Agentを設定（Nominatim利用規約で必須）
        #[arg(long)]
        set_user_agent: Option<String>,

        /// 外部APIのタイムアウト秒（0で無効）
        #[arg(long)]
        set_timeout: Option<u64>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}
