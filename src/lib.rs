//! thermal-review
//!
//! サーモ画像のアノマリ解析ゲートウェイと注釈保存、CLI用の対話レビュー

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod error;
pub mod image_payload;
pub mod persistence;
pub mod review;

pub use analyzer::{run_analysis, AnalysisRequest, Analyzer, HttpAnalyzer};
pub use config::Config;
pub use error::{Result, ReviewError};
pub use image_payload::ImagePayload;
pub use persistence::{
    load_inspection, save_best_effort, save_inspection, AnnotationSink, FileAnnotationSink,
    HttpAnnotationSink,
};
