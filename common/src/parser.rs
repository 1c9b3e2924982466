//! 解析サーバーとのワイヤ形式
//!
//! - 受信: `{ annotatedImage, anomalies: [...] }` のパース
//! - 送信: 注釈保存リクエスト（座標は整数に丸める）
//! - エラー本文 `{"error": "..."}` からのメッセージ抽出

use crate::anomaly::{Anomaly, AnomalySource};
use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// AI解析結果の1件（正規化前）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAnomaly {
    #[serde(default, deserialize_with = "de_optional_opaque_id")]
    pub id: Option<String>,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub classification: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// 解析レスポンス
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    /// 枠が焼き込まれた表示専用画像（data URI または URL）。中身は解釈しない。
    #[serde(default)]
    pub annotated_image: Option<String>,
    pub anomalies: Vec<RawAnomaly>,
}

/// 注釈保存の1件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRecord {
    pub id: String,
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
    pub confidence: Option<f32>,
    pub classification: Option<String>,
    pub severity: Option<String>,
    pub comment: Option<String>,
    pub deleted: bool,
    pub source: AnomalySource,
}

impl From<&Anomaly> for AnnotationRecord {
    fn from(a: &Anomaly) -> Self {
        AnnotationRecord {
            id: a.id.clone(),
            x: a.x.round() as i64,
            y: a.y.round() as i64,
            w: a.w.round() as i64,
            h: a.h.round() as i64,
            confidence: a.confidence,
            classification: a.classification.clone(),
            severity: a.severity.clone(),
            comment: Some(a.comment.clone()),
            deleted: a.deleted,
            source: a.source,
        }
    }
}

/// 注釈保存リクエスト
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAnnotationsRequest {
    pub inspection_id: String,
    pub anomalies: Vec<AnnotationRecord>,
}

/// 削除済みも含めた全件を保存リクエストに変換（挿入順を維持）
pub fn build_save_request(inspection_id: &str, anomalies: &[Anomaly]) -> SaveAnnotationsRequest {
    SaveAnnotationsRequest {
        inspection_id: inspection_id.to_string(),
        anomalies: anomalies.iter().map(AnnotationRecord::from).collect(),
    }
}

/// 解析レスポンスをパース
///
/// 本文はJSONオブジェクトそのもので、`anomalies` は必須。
/// `anomalies` がなく `error`/`message`/`detail` を持つ本文は `AnalysisFailed`。
pub fn parse_analysis_response(body: &str) -> Result<AnalysisResponse> {
    let value: Value = serde_json::from_str(body.trim())
        .map_err(|e| Error::Parse(format!("analysis response is not JSON: {}", e)))?;

    let Value::Object(map) = &value else {
        return Err(Error::Parse("analysis response is not a JSON object".into()));
    };
    if !map.contains_key("anomalies") {
        if let Some(message) = server_message(map) {
            return Err(Error::AnalysisFailed(message));
        }
        return Err(Error::Parse("analysis response has no anomalies field".into()));
    }

    let response: AnalysisResponse = serde_json::from_value(value)
        .map_err(|e| Error::Parse(format!("analysis response: {}", e)))?;

    for (i, a) in response.anomalies.iter().enumerate() {
        let values = [a.x, a.y, a.w, a.h];
        if values.iter().any(|v| !v.is_finite()) || a.w < 0.0 || a.h < 0.0 {
            return Err(Error::Parse(format!("anomaly #{} has invalid geometry", i + 1)));
        }
    }

    Ok(response)
}

fn server_message(map: &serde_json::Map<String, Value>) -> Option<String> {
    for key in ["error", "message", "detail"] {
        match map.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.trim().to_string()),
            Some(Value::Null) | None => continue,
            Some(other) => return Some(other.to_string()),
        }
    }
    None
}

/// エラーレスポンス本文からサーバーのメッセージを取り出す
///
/// `error` → `message` → `detail` の順。JSONでなければ本文そのもの（空なら `None`）。
pub fn extract_server_error(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
        if let Some(message) = server_message(&map) {
            return Some(message);
        }
    }
    Some(trimmed.to_string())
}

/// 文字列・数値どちらのIDも文字列として受け取る
pub(crate) fn de_opaque_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid id: {}", other))),
    }
}

pub(crate) fn de_optional_opaque_id<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!("invalid id: {}", other))),
    }
}

pub(crate) fn de_null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
