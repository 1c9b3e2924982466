//! 解析ゲートウェイテスト
//!
//! スタブサーバーに対する multipart 送信・レスポンス解釈・失敗時の進捗を検証

mod support;

use std::time::Duration;
use support::{png_bytes, write_png, StubServer, TWO_ANOMALIES};
use tempfile::tempdir;
use thermal_review::analyzer::{run_analysis, AnalysisRequest, Analyzer, HttpAnalyzer};
use thermal_review::error::ReviewError;
use thermal_review::image_payload::ImagePayload;
use thermal_review::persistence::{save_best_effort, FileAnnotationSink};
use thermal_review_common::{
    AnalysisOutcome, Inspection, ReviewSession, SaveAnnotationsRequest, Size, StageStatus, Weather,
};

fn request(threshold: f32) -> AnalysisRequest {
    AnalysisRequest {
        inspection_id: "insp-1".into(),
        baseline: ImagePayload::from_bytes(png_bytes(8, 6), "baseline.png").unwrap(),
        maintenance: ImagePayload::from_bytes(png_bytes(8, 6), "thermal.png").unwrap(),
        threshold,
    }
}

fn analyzer(server: &StubServer) -> HttpAnalyzer {
    HttpAnalyzer::new(format!("{}/analyze", server.url), Duration::from_secs(5)).unwrap()
}

/// 画像ファイルを置いた検査レコードでセッションを作る
fn session_with_images(dir: &std::path::Path) -> ReviewSession {
    write_png(&dir.join("baseline.png"), 800, 600);
    write_png(&dir.join("thermal.png"), 800, 600);
    let mut session = ReviewSession::from_inspection(Inspection::new("insp-1"));
    session.attach_baseline("baseline.png", "2024-05-01T09:00:00", Weather::Sunny);
    session.attach_maintenance("thermal.png", "2024-05-02T09:00:00", Weather::Cloudy);
    session
}

/// 正常レスポンスの解釈と multipart フィールド
#[tokio::test]
async fn test_analyze_sends_multipart_and_parses() {
    let server = StubServer::start(200, TWO_ANOMALIES).await;
    let response = analyzer(&server).analyze(&request(0.5)).await.unwrap();

    assert_eq!(response.anomalies.len(), 2);
    assert_eq!(response.annotated_image.as_deref(), Some("data:image/png;base64,AAAA"));

    let raw = &server.requests()[0];
    assert!(raw.starts_with("POST /analyze"));
    assert!(raw.contains("multipart/form-data"));
    for field in ["baseline", "maintenance", "inspection_id", "threshold"] {
        assert!(raw.contains(&format!("name=\"{}\"", field)), "field {} missing", field);
    }
    assert!(raw.contains("insp-1"));
    assert!(raw.contains("0.5"));
}

/// サーバーのエラーメッセージが AnalysisFailed に入る
#[tokio::test]
async fn test_analyze_server_error_message() {
    let server = StubServer::start(500, r#"{"error": "model not loaded"}"#).await;
    let err = analyzer(&server).analyze(&request(0.5)).await.unwrap_err();
    match err {
        ReviewError::AnalysisFailed(message) => assert_eq!(message, "model not loaded"),
        other => panic!("unexpected error: {other}"),
    }
}

/// 壊れたレスポンスは AnalysisFailed
#[tokio::test]
async fn test_analyze_malformed_response() {
    let server = StubServer::start(200, "<html>oops</html>").await;
    let err = analyzer(&server).analyze(&request(0.5)).await.unwrap_err();
    assert!(matches!(err, ReviewError::AnalysisFailed(_)));
}

/// 200 でも HTML ページは AnalysisFailed
#[tokio::test]
async fn test_analyze_html_page_with_ok_status() {
    let server = StubServer::start(200, "<html><head><style>body {}</style></head><body>oops</body></html>").await;
    let err = analyzer(&server).analyze(&request(0.5)).await.unwrap_err();
    assert!(matches!(err, ReviewError::AnalysisFailed(_)));
}

/// 200 でも error 本文ならサーバーのメッセージで AnalysisFailed
#[tokio::test]
async fn test_analyze_error_body_with_ok_status() {
    let server = StubServer::start(200, r#"{"error": "model not loaded"}"#).await;
    let err = analyzer(&server).analyze(&request(0.5)).await.unwrap_err();
    match err {
        ReviewError::AnalysisFailed(message) => assert_eq!(message, "model not loaded"),
        other => panic!("unexpected error: {other}"),
    }
}

/// 不正な本文で既存のAI結果が消えない
#[tokio::test]
async fn test_run_analysis_bad_body_keeps_previous_result() {
    let dir = tempdir().expect("Failed to create temp dir");
    let good = StubServer::start(200, TWO_ANOMALIES).await;
    let bad = StubServer::start(200, r#"{"error": "model not loaded"}"#).await;
    let mut session = session_with_images(dir.path());

    let first = analyzer(&good);
    run_analysis(&mut session, &first, first.client(), dir.path()).await.unwrap();
    assert_eq!(session.visible_anomalies().len(), 2);

    let second = analyzer(&bad);
    let err = run_analysis(&mut session, &second, second.client(), dir.path())
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::AnalysisFailed(_)));
    assert_eq!(session.visible_anomalies().len(), 2);
    assert_eq!(session.progress().ai_analysis, StageStatus::Failed);
}

/// しきい値が範囲外なら送信しない
#[tokio::test]
async fn test_analyze_rejects_threshold_before_sending() {
    let server = StubServer::start(200, TWO_ANOMALIES).await;
    let err = analyzer(&server).analyze(&request(1.5)).await.unwrap_err();
    assert!(matches!(err, ReviewError::InvalidThreshold(_)));
    assert!(server.requests().is_empty());
}

/// 解析 → 削除 → 保存の一連の流れ
#[tokio::test]
async fn test_run_analysis_end_to_end() {
    let dir = tempdir().expect("Failed to create temp dir");
    let server = StubServer::start(200, TWO_ANOMALIES).await;
    let analyzer = analyzer(&server);
    let mut session = session_with_images(dir.path());

    let outcome = run_analysis(&mut session, &analyzer, analyzer.client(), dir.path())
        .await
        .unwrap();
    assert_eq!(outcome, AnalysisOutcome::Applied(2));
    assert_eq!(session.visible_anomalies().len(), 2);
    assert_eq!(session.maintenance_size(), Size::new(800.0, 600.0));
    assert_eq!(session.progress().ai_analysis, StageStatus::Completed);

    session.delete("ai_1", Some("shadow artifact")).unwrap();
    assert_eq!(session.visible_anomalies().len(), 1);

    let out = dir.path().join("annotations.json");
    let sink = FileAnnotationSink::new(&out);
    assert!(save_best_effort(&sink, &session.save_request()).await);

    let saved: SaveAnnotationsRequest =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(saved.anomalies.len(), 2);
    assert!(saved.anomalies[0].deleted);
    assert!(!saved.anomalies[1].deleted);
    assert_eq!(saved.anomalies[0].x, 50);
}

/// サーバー失敗で AI解析が Failed になり、ストアは変わらない
#[tokio::test]
async fn test_run_analysis_failure_marks_progress() {
    let dir = tempdir().expect("Failed to create temp dir");
    let server = StubServer::start(502, "").await;
    let analyzer = analyzer(&server);
    let mut session = session_with_images(dir.path());

    let err = run_analysis(&mut session, &analyzer, analyzer.client(), dir.path())
        .await
        .unwrap_err();
    match err {
        ReviewError::AnalysisFailed(message) => assert!(message.contains("502")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(session.progress().ai_analysis, StageStatus::Failed);
    assert!(session.store().is_empty());
    assert!(!session.is_analyzing());
}

/// 画像ファイルがなければ送信せずに失敗扱い
#[tokio::test]
async fn test_run_analysis_missing_image_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let server = StubServer::start(200, TWO_ANOMALIES).await;
    let analyzer = analyzer(&server);
    let mut session = ReviewSession::from_inspection(Inspection::new("insp-2"));
    session.attach_baseline("missing-a.png", "now", Weather::Sunny);
    session.attach_maintenance("missing-b.png", "now", Weather::Sunny);

    let err = run_analysis(&mut session, &analyzer, analyzer.client(), dir.path())
        .await
        .unwrap_err();
    assert!(matches!(err, ReviewError::AnalysisFailed(_)));
    assert_eq!(session.progress().ai_analysis, StageStatus::Failed);
    assert!(server.requests().is_empty());
}

/// 画像が揃っていなければ MissingInput（進捗は変わらない）
#[tokio::test]
async fn test_run_analysis_requires_both_images() {
    let dir = tempdir().expect("Failed to create temp dir");
    let server = StubServer::start(200, TWO_ANOMALIES).await;
    let analyzer = analyzer(&server);
    let mut session = ReviewSession::from_inspection(Inspection::new("insp-3"));
    session.attach_maintenance("thermal.png", "now", Weather::Sunny);
    let before = session.progress();

    let err = run_analysis(&mut session, &analyzer, analyzer.client(), dir.path())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ReviewError::Core(thermal_review_common::Error::MissingInput(_))
    ));
    assert_eq!(session.progress(), before);
}
