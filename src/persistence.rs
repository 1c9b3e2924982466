//! 注釈の保存
//!
//! - サーバーへの `POST /save_annotations`（ベストエフォート）
//! - 検査レコードJSONファイルの読み書き

use crate::config::Config;
use crate::error::{Result, ReviewError};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thermal_review_common::{Inspection, SaveAnnotationsRequest};

/// 注釈の保存先
#[allow(async_fn_in_trait)]
pub trait AnnotationSink {
    async fn save(&self, request: &SaveAnnotationsRequest) -> Result<()>;
}

/// 解析サーバーへPOSTする
#[derive(Debug, Clone)]
pub struct HttpAnnotationSink {
    client: reqwest::Client,
    url: String,
}

impl HttpAnnotationSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.into() })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.save_url(), Duration::from_secs(config.timeout_seconds))
    }
}

impl AnnotationSink for HttpAnnotationSink {
    async fn save(&self, request: &SaveAnnotationsRequest) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| ReviewError::PersistenceFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = thermal_review_common::extract_server_error(&body)
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(ReviewError::PersistenceFailed(message));
        }
        Ok(())
    }
}

/// 保存リクエストをそのままJSONファイルに書き出す（オフライン用）
#[derive(Debug, Clone)]
pub struct FileAnnotationSink {
    path: PathBuf,
}

impl FileAnnotationSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AnnotationSink for FileAnnotationSink {
    async fn save(&self, request: &SaveAnnotationsRequest) -> Result<()> {
        let json = serde_json::to_string_pretty(request)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| ReviewError::PersistenceFailed(format!("{}: {}", self.path.display(), e)))
    }
}

/// ベストエフォート保存
///
/// アノマリが0件なら送らない。失敗はログに残すだけでレビューは続行できる。
/// 送信して成功したときだけ `true`。
pub async fn save_best_effort<S: AnnotationSink>(sink: &S, request: &SaveAnnotationsRequest) -> bool {
    if request.anomalies.is_empty() {
        log::debug!("no annotations to save for inspection {}", request.inspection_id);
        return false;
    }
    match sink.save(request).await {
        Ok(()) => {
            log::info!(
                "saved {} annotations for inspection {}",
                request.anomalies.len(),
                request.inspection_id
            );
            true
        }
        Err(e) => {
            log::warn!("annotation save failed for inspection {}: {}", request.inspection_id, e);
            false
        }
    }
}

/// 検査レコードを読み込む（旧形式の進捗は正規化される）
pub fn load_inspection(path: &Path) -> Result<Inspection> {
    if !path.exists() {
        return Err(ReviewError::FileNotFound(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path)?;
    let inspection: Inspection = serde_json::from_str(&content)?;
    Ok(inspection.normalize())
}

pub fn save_inspection(path: &Path, inspection: &Inspection) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(inspection)?;
    std::fs::write(path, json)?;
    Ok(())
}
