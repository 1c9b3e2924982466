//! 解析に送る画像の読み込み
//!
//! 検査レコードの画像参照は3形式: ファイルパス / data URL / http(s) URL。
//! いずれもバイト列・MIMEタイプ・自然サイズを持つ `ImagePayload` にそろえる。

use crate::error::{Result, ReviewError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thermal_review_common::Size;

#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub natural: Size,
    pub file_name: String,
}

impl ImagePayload {
    /// メモリ上のバイト列から（形式と寸法をヘッダから判定）
    pub fn from_bytes(bytes: Vec<u8>, file_name: impl Into<String>) -> Result<Self> {
        let file_name = file_name.into();
        let format = image::guess_format(&bytes)
            .map_err(|e| ReviewError::ImageLoad(format!("{}: {}", file_name, e)))?;
        let (width, height) = image::ImageReader::with_format(Cursor::new(&bytes), format)
            .into_dimensions()
            .map_err(|e| ReviewError::ImageLoad(format!("{}: {}", file_name, e)))?;

        Ok(Self {
            mime: format.to_mime_type().to_string(),
            natural: Size::new(width as f32, height as f32),
            bytes,
            file_name,
        })
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

/// 画像ファイルを非同期に読み込む
///
/// 寸法の判定はブロッキング処理なので別スレッドで行う。
pub async fn read_image_file(path: &Path) -> Result<ImagePayload> {
    if !path.exists() {
        return Err(ReviewError::FileNotFound(path.display().to_string()));
    }
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());

    tokio::task::spawn_blocking(move || ImagePayload::from_bytes(bytes, file_name))
        .await
        .map_err(|e| ReviewError::ImageLoad(e.to_string()))?
}

/// `data:image/png;base64,...` を分解してデコード
pub fn decode_data_url(data_url: &str) -> Result<ImagePayload> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or_else(|| ReviewError::ImageLoad("data URLではありません".into()))?;
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| ReviewError::ImageLoad("data URLの形式が不正です".into()))?;
    if !header.ends_with(";base64") {
        return Err(ReviewError::ImageLoad("base64以外のdata URLには対応していません".into()));
    }
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| ReviewError::ImageLoad(format!("base64デコード失敗: {}", e)))?;
    ImagePayload::from_bytes(bytes, "inline")
}

/// 画像参照の種類
#[derive(Debug, Clone, PartialEq)]
pub enum ImageRef {
    DataUrl(String),
    Remote(String),
    File(PathBuf),
}

/// 参照文字列を分類（相対パスは `base_dir` 基準）
pub fn resolve_image_ref(reference: &str, base_dir: &Path) -> ImageRef {
    let reference = reference.trim();
    if reference.starts_with("data:") {
        ImageRef::DataUrl(reference.to_string())
    } else if reference.starts_with("http://") || reference.starts_with("https://") {
        ImageRef::Remote(reference.to_string())
    } else {
        let path = Path::new(reference);
        if path.is_absolute() {
            ImageRef::File(path.to_path_buf())
        } else {
            ImageRef::File(base_dir.join(path))
        }
    }
}

/// コマンドラインで渡された画像パスを記録用の参照にする
///
/// 相対パスはカレントディレクトリ基準で絶対化する（記録のフォルダ基準で
/// 解決し直されないように）。
pub fn command_line_image_ref(path: &Path) -> Result<String> {
    let absolute = std::path::absolute(path)?;
    Ok(absolute.to_string_lossy().into_owned())
}

/// 画像参照から読み込み
pub async fn load_image_ref(
    client: &reqwest::Client,
    reference: &str,
    base_dir: &Path,
) -> Result<ImagePayload> {
    match resolve_image_ref(reference, base_dir) {
        ImageRef::DataUrl(url) => decode_data_url(&url),
        ImageRef::File(path) => read_image_file(&path).await,
        ImageRef::Remote(url) => {
            log::debug!("downloading image {}", url);
            let response = client.get(&url).send().await?.error_for_status()?;
            let bytes = response.bytes().await?.to_vec();
            let file_name = url.rsplit('/').next().unwrap_or("remote").to_string();
            ImagePayload::from_bytes(bytes, file_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::new(width, height);
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_from_bytes_detects_size_and_mime() {
        let payload = ImagePayload::from_bytes(tiny_png(8, 6), "a.png").unwrap();
        assert_eq!(payload.mime, "image/png");
        assert_eq!(payload.natural, Size::new(8.0, 6.0));
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(ImagePayload::from_bytes(b"not an image".to_vec(), "x").is_err());
    }

    #[test]
    fn test_data_url_round_trip() {
        let payload = ImagePayload::from_bytes(tiny_png(4, 3), "a.png").unwrap();
        let url = payload.to_data_url();
        assert!(url.starts_with("data:image/png;base64,"));
        let decoded = decode_data_url(&url).unwrap();
        assert_eq!(decoded.bytes, payload.bytes);
        assert_eq!(decoded.natural, Size::new(4.0, 3.0));
    }

    #[test]
    fn test_decode_data_url_errors() {
        assert!(decode_data_url("thermal.png").is_err());
        assert!(decode_data_url("data:image/png,plain").is_err());
        assert!(decode_data_url("data:image/png;base64").is_err());
    }

    #[test]
    fn test_resolve_image_ref() {
        let base = Path::new("/data/inspections");
        assert_eq!(
            resolve_image_ref("thermal.png", base),
            ImageRef::File(PathBuf::from("/data/inspections/thermal.png"))
        );
        assert_eq!(
            resolve_image_ref("https://cdn/x.png", base),
            ImageRef::Remote("https://cdn/x.png".into())
        );
        assert!(matches!(resolve_image_ref("data:image/png;base64,AA", base), ImageRef::DataUrl(_)));
    }

    #[test]
    fn test_command_line_image_ref_ignores_record_dir() {
        let cwd = std::env::current_dir().unwrap();
        let reference = command_line_image_ref(Path::new("base.png")).unwrap();
        assert_eq!(PathBuf::from(&reference), cwd.join("base.png"));
        assert_eq!(
            resolve_image_ref(&reference, Path::new("records")),
            ImageRef::File(cwd.join("base.png"))
        );
    }

    #[tokio::test]
    async fn test_read_image_file_missing() {
        let result = read_image_file(Path::new("/nonexistent/thermal.png")).await;
        assert!(matches!(result, Err(ReviewError::FileNotFound(_))));
    }
}
