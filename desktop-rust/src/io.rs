use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fs;
use std::path::{Path, PathBuf};

use thermal_review_common::{AnalysisResponse, Inspection};

pub fn load_inspection(path: &Path) -> Result<Inspection> {
    let content = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let inspection: Inspection =
        serde_json::from_str(&content).with_context(|| format!("parse {}", path.display()))?;
    Ok(inspection.normalize())
}

pub fn save_inspection(path: &Path, inspection: &Inspection) -> Result<()> {
    let content = serde_json::to_string_pretty(inspection)?;
    fs::write(path, content).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn load_analysis_response(path: &Path) -> Result<AnalysisResponse> {
    let content = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let response = serde_json::from_str(&content).with_context(|| format!("parse {}", path.display()))?;
    Ok(response)
}

/// 解析結果の一時ファイル
pub fn analysis_output_path(inspection_id: &str, generation: u64) -> PathBuf {
    let safe_id: String = inspection_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    std::env::temp_dir().join(format!("thermal-review-{safe_id}-{generation}.json"))
}

/// 画像参照をローカルファイルに解決（相対パスは検査レコードのフォルダ基準）
pub fn resolve_local_image(reference: &str, base_dir: Option<&Path>) -> Result<PathBuf> {
    if reference.starts_with("data:") || reference.starts_with("http://") || reference.starts_with("https://") {
        bail!("not a local file: {}", truncate(reference, 48));
    }
    let path = PathBuf::from(reference);
    let path = match base_dir {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path,
    };
    if !path.exists() {
        bail!("image not found: {}", path.display());
    }
    Ok(path)
}

/// RGBA画素にデコード（ファイルパスまたは base64 data URL）
pub fn decode_image(reference: &str, base_dir: Option<&Path>) -> Result<([usize; 2], Vec<u8>)> {
    let image = if let Some(rest) = reference.strip_prefix("data:") {
        let Some((_, data)) = rest.split_once(";base64,") else {
            bail!("unsupported data URL");
        };
        let bytes = STANDARD.decode(data.trim()).context("decode base64 image")?;
        image::load_from_memory(&bytes).context("decode image")?
    } else {
        let path = resolve_local_image(reference, base_dir)?;
        image::open(&path).with_context(|| format!("decode {}", path.display()))?
    };
    let rgba = image.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    Ok((size, rgba.into_raw()))
}

/// CLI子プロセスの stderr から失敗メッセージを取り出す（最終行）
pub fn cli_failure_message(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let line = text.lines().map(str::trim).filter(|l| !l.is_empty()).last().unwrap_or("");
    let line = line.strip_prefix("❌").map(str::trim_start).unwrap_or(line);
    if line.is_empty() {
        "CLI exited without a message".to_string()
    } else {
        line.to_string()
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_output_path_sanitizes_id() {
        let path = analysis_output_path("insp/1 a", 3);
        let name = path.file_name().and_then(|s| s.to_str()).unwrap_or_default();
        assert_eq!(name, "thermal-review-insp_1_a-3.json");
    }

    #[test]
    fn test_cli_failure_message_takes_last_line() {
        let stderr = "[INFO thermal_review] POST http://localhost:8000/analyze\n\
                      [WARN thermal_review] analysis server returned 500\n\
                      ❌ 解析に失敗しました: model not loaded\n";
        assert_eq!(cli_failure_message(stderr.as_bytes()), "解析に失敗しました: model not loaded");
        assert_eq!(cli_failure_message(b"  \n"), "CLI exited without a message");
    }

    #[test]
    fn test_resolve_local_image_rejects_remote() {
        assert!(resolve_local_image("https://cdn/x.png", None).is_err());
        assert!(resolve_local_image("data:image/png;base64,AA", None).is_err());
        assert!(resolve_local_image("/nonexistent/x.png", None).is_err());
    }
}
