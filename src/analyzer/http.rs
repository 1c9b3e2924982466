//! 解析サーバー（HTTP multipart）クライアント

use super::types::AnalysisRequest;
use super::Analyzer;
use crate::config::Config;
use crate::error::{Result, ReviewError};
use crate::image_payload::ImagePayload;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use thermal_review_common::{
    extract_server_error, parse_analysis_response, AnalysisResponse, Error as CoreError,
};

#[derive(Debug, Clone)]
pub struct HttpAnalyzer {
    client: reqwest::Client,
    url: String,
}

impl HttpAnalyzer {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.into() })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.analyze_url(), Duration::from_secs(config.timeout_seconds))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

fn image_part(payload: &ImagePayload) -> Result<Part> {
    Part::bytes(payload.bytes.clone())
        .file_name(payload.file_name.clone())
        .mime_str(&payload.mime)
        .map_err(ReviewError::from)
}

impl Analyzer for HttpAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse> {
        request.validate()?;

        let form = Form::new()
            .part("baseline", image_part(&request.baseline)?)
            .part("maintenance", image_part(&request.maintenance)?)
            .text("inspection_id", request.inspection_id.clone())
            .text("threshold", request.threshold.to_string());

        log::info!("POST {} (inspection {})", self.url, request.inspection_id);
        let response = self.client.post(&self.url).multipart(form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = extract_server_error(&body).unwrap_or_else(|| format!("HTTP {}", status));
            log::warn!("analysis server returned {}: {}", status, message);
            return Err(ReviewError::AnalysisFailed(message));
        }

        parse_analysis_response(&body).map_err(|e| match e {
            CoreError::AnalysisFailed(message) => {
                log::warn!("analysis server reported an error: {}", message);
                ReviewError::AnalysisFailed(message)
            }
            other => ReviewError::AnalysisFailed(format!("レスポンスを解釈できません: {}", other)),
        })
    }
}
