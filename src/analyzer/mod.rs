mod http;
mod types;

pub use http::HttpAnalyzer;
pub use types::AnalysisRequest;

use crate::error::{Result, ReviewError};
use crate::image_payload::load_image_ref;
use std::path::Path;
use thermal_review_common::{AnalysisOutcome, AnalysisResponse, Error as CoreError, ReviewSession};

/// 画像ペアを解析してアノマリ一覧を返すもの
#[allow(async_fn_in_trait)]
pub trait Analyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse>;
}

/// セッションの画像で解析を実行し、結果をストアに反映する
///
/// 画像参照の相対パスは `base_dir` 基準。画像の読み込み失敗も解析失敗として
/// 進捗に記録する。
pub async fn run_analysis<A: Analyzer>(
    session: &mut ReviewSession,
    analyzer: &A,
    client: &reqwest::Client,
    base_dir: &Path,
) -> Result<AnalysisOutcome> {
    let ticket = session.begin_analysis()?;

    let payloads = async {
        let baseline = load_image_ref(client, &ticket.baseline, base_dir).await?;
        let maintenance = load_image_ref(client, &ticket.maintenance, base_dir).await?;
        Ok::<_, ReviewError>((baseline, maintenance))
    }
    .await;

    let outcome = match payloads {
        Ok((baseline, maintenance)) => {
            if !session.maintenance_size().is_known() {
                session.set_maintenance_size(maintenance.natural);
            }
            let request = AnalysisRequest {
                inspection_id: ticket.inspection_id.clone(),
                baseline,
                maintenance,
                threshold: ticket.threshold,
            };
            analyzer.analyze(&request).await.map_err(failure_message)
        }
        Err(e) => Err(failure_message(e)),
    };

    session
        .finish_analysis(&ticket, outcome)
        .map_err(|e| match e {
            CoreError::AnalysisFailed(message) => ReviewError::AnalysisFailed(message),
            other => other.into(),
        })
}

fn failure_message(error: ReviewError) -> String {
    match error {
        ReviewError::AnalysisFailed(message) => message,
        other => other.to_string(),
    }
}
