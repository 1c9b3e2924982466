use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "thermal-review")]
#[command(about = "サーモ画像アノマリ解析・レビューツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 画像ペアを解析サーバーに送ってアノマリを検出
    Analyze {
        /// 検査レコードJSON（省略時は画像ペアのみで解析）
        input: Option<PathBuf>,

        /// ベースライン画像（レコードの値を上書き）
        #[arg(short, long)]
        baseline: Option<PathBuf>,

        /// 保守（サーモ）画像（レコードの値を上書き）
        #[arg(short, long)]
        maintenance: Option<PathBuf>,

        /// 検査ID（レコードなしの場合）
        #[arg(long, default_value = "adhoc")]
        inspection_id: String,

        /// 検出しきい値（0.0-1.0、省略時は設定値）
        #[arg(short, long)]
        threshold: Option<f32>,

        /// 出力先（レコードありは上書き、なしは標準出力）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 対話的にアノマリをレビュー
    Review {
        /// 検査レコードJSON
        #[arg(required = true)]
        input: PathBuf,

        /// 出力先（省略時は上書き）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 進捗と解析ログを表示
    Show {
        /// 検査レコードJSON
        #[arg(required = true)]
        input: PathBuf,
    },

    /// 旧形式の検査レコードを正規化
    Migrate {
        /// 検査レコードJSON
        #[arg(required = true)]
        input: PathBuf,

        /// 出力ファイル（省略時は上書き）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// ドライラン（変更を書き込まずに表示）
        #[arg(long)]
        dry_run: bool,
    },

    /// 注釈をサーバーへ保存
    Save {
        /// 検査レコードJSON
        #[arg(required = true)]
        input: PathBuf,

        /// サーバーではなくJSONファイルに書き出す
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// 設定を表示/編集
    Config {
        /// 解析サーバーのURLを設定
        #[arg(long)]
        set_server_url: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}
