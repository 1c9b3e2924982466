//! Thermal Review Common Library
//!
//! CLIとデスクトップビューアで共有されるレビューの中核ロジック
//! （座標変換・ズーム/パン・アノマリストア・進捗・ワイヤ形式）

pub mod error;
pub mod geometry;
pub mod viewer;
pub mod anomaly;
pub mod parser;
pub mod store;
pub mod progress;
pub mod inspection;
pub mod interaction;
pub mod overlay;
pub mod session;

pub use error::{Error, Result};
pub use geometry::{FitMapping, Point, Rect, ScreenMapping, Size};
pub use viewer::{ViewTransform, Viewport, ZoomLimits, ZoomPanViewer};
pub use anomaly::{Anomaly, AnomalySource, SeverityTier, MANUAL_CLASSIFICATIONS};
pub use parser::{
    build_save_request, extract_server_error, parse_analysis_response, AnalysisResponse,
    AnnotationRecord, RawAnomaly, SaveAnnotationsRequest,
};
pub use store::AnomalyStore;
pub use progress::{InspectionStatus, ProgressStatus, StageStatus};
pub use inspection::{Inspection, Weather};
pub use interaction::InteractionMode;
pub use overlay::{hit_test, log_rows, overlay_boxes, LogRow, OverlayBox};
pub use session::{
    validate_threshold, AnalysisOutcome, AnalysisTicket, ReviewSession, DEFAULT_THRESHOLD,
    THRESHOLD_STEP,
};
