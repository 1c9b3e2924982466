use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("画像読み込みエラー: {0}")]
    ImageLoad(String),

    #[error("入力が不足しています: {0}")]
    MissingInput(String),

    #[error("しきい値は 0〜1 の範囲で指定してください: {0}")]
    InvalidThreshold(f32),

    #[error("解析に失敗しました: {0}")]
    AnalysisFailed(String),

    #[error("注釈の保存に失敗しました: {0}")]
    PersistenceFailed(String),

    #[error("HTTP通信エラー: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Core(#[from] thermal_review_common::Error),

    #[error("対話入力エラー: {0}")]
    Prompt(String),
}

impl From<dialoguer::Error> for ReviewError {
    fn from(e: dialoguer::Error) -> Self {
        ReviewError::Prompt(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReviewError>;
