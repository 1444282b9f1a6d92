//! 商品画像の取得モジュール
//!
//! 価格表の IMMAGINE 列（URL/ローカルパス）から画像を取得し、
//! PDF埋め込み用に縮小・JPEG再エンコードする。
//! 取得は非同期で並行実行し、失敗した画像は写真なしで出力する。

use crate::cli::PdfQuality;
use crate::error::{PreventivoError, Result};
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinSet;

const DOWNLOAD_TIMEOUT_SECS: u64 = 20;
const USER_AGENT: &str = concat!("preventivo/", env!("CARGO_PKG_VERSION"));

/// 画像参照の種類
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    Remote(String),
    Local(PathBuf),
    Missing,
}

impl ImageSource {
    pub fn parse(reference: &str) -> Self {
        let reference = reference.trim();
        if reference.is_empty() || reference == "-" {
            ImageSource::Missing
        } else if reference.starts_with("http://") || reference.starts_with("https://") {
            ImageSource::Remote(reference.to_string())
        } else {
            ImageSource::Local(PathBuf::from(reference))
        }
    }
}

/// 画像取得
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: reqwest::Client,
    cache_dir: Option<PathBuf>,
    base_dir: Option<PathBuf>,
}

impl ImageFetcher {
    pub fn new(cache_dir: Option<PathBuf>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            cache_dir,
            base_dir: None,
        })
    }

    /// 相対パスの基準フォルダ
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    fn resolve_local(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// 1件取得（参照が空なら None）
    pub async fn fetch(&self, reference: &str) -> Result<Option<Vec<u8>>> {
        match ImageSource::parse(reference) {
            ImageSource::Missing => Ok(None),
            ImageSource::Local(path) => {
                let path = self.resolve_local(&path);
                if !path.exists() {
                    return Err(PreventivoError::FileNotFound(path.display().to_string()));
                }
                Ok(Some(tokio::fs::read(path).await?))
            }
            ImageSource::Remote(url) => {
                download(&self.client, self.cache_dir.as_deref(), &url).await.map(Some)
            }
        }
    }

    /// 複数取得（重複は1回のみ）。失敗した画像は警告して結果から除外する。
    pub async fn fetch_all(&self, references: &[String], show_progress: bool) -> HashMap<String, Vec<u8>> {
        let unique: Vec<String> = references
            .iter()
            .filter(|r| ImageSource::parse(r) != ImageSource::Missing)
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let progress = if show_progress && !unique.is_empty() {
            let bar = ProgressBar::new(unique.len() as u64);
            bar.set_style(
                ProgressStyle::with_template("  {bar:30.cyan/blue} {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            Some(bar)
        } else {
            None
        };

        let mut tasks = JoinSet::new();
        for reference in unique {
            let fetcher = self.clone();
            tasks.spawn(async move {
                let result = fetcher.fetch(&reference).await;
                (reference, result)
            });
        }

        let mut images = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((reference, Ok(Some(bytes)))) => {
                    images.insert(reference, bytes);
                }
                Ok((_, Ok(None))) => {}
                Ok((reference, Err(e))) => {
                    tracing::warn!(image = %reference, error = %e, "画像を取得できませんでした");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "画像取得タスクが失敗しました");
                }
            }
            if let Some(bar) = &progress {
                bar.inc(1);
            }
        }

        if let Some(bar) = progress {
            bar.finish_and_clear();
        }
        images
    }
}

/// URLのキャッシュファイル名
pub fn cache_file_name(url: &str) -> String {
    hex::encode(Sha256::digest(url.as_bytes()))
}

/// 画像として読める形式か（キャッシュ前の確認）
fn is_decodable(bytes: &[u8]) -> bool {
    image::guess_format(bytes).is_ok() && image::load_from_memory(bytes).is_ok()
}

async fn download(client: &reqwest::Client, cache_dir: Option<&Path>, url: &str) -> Result<Vec<u8>> {
    let cache_file = cache_dir.map(|dir| dir.join(cache_file_name(url)));

    if let Some(path) = &cache_file {
        if let Ok(bytes) = tokio::fs::read(path).await {
            if is_decodable(&bytes) {
                tracing::debug!(url, "画像キャッシュを使用");
                return Ok(bytes);
            }
            // 壊れたキャッシュは削除して再取得
            tracing::debug!(path = %path.display(), "画像キャッシュが壊れています、削除します");
            tokio::fs::remove_file(path).await.ok();
        }
    }

    tracing::debug!(url, "画像をダウンロード中");
    let bytes = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?
        .to_vec();

    if !is_decodable(&bytes) {
        return Err(PreventivoError::ImageLoad(format!("画像として読めません: {}", url)));
    }

    if let Some(path) = &cache_file {
        store_in_cache(path, &bytes).await;
    }

    Ok(bytes)
}

/// 一時ファイルに書いてから rename（途中で止まっても壊れたキャッシュを残さない）
async fn store_in_cache(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let partial = path.with_extension("part");
    let written = match tokio::fs::write(&partial, bytes).await {
        Ok(()) => tokio::fs::rename(&partial, path).await,
        Err(e) => Err(e),
    };

    if let Err(e) = written {
        tracing::debug!(path = %path.display(), error = %e, "画像キャッシュを保存できませんでした");
        tokio::fs::remove_file(&partial).await.ok();
    }
}

/// 透過部分を白背景で合成してRGBに変換
fn flatten_on_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let p = rgba.get_pixel(x, y).0;
        let alpha = p[3] as f32 / 255.0;
        let blend = |c: u8| (c as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        image::Rgb([blend(p[0]), blend(p[1]), blend(p[2])])
    })
}

/// PDF用に縮小してJPEGに再エンコード
pub fn prepare_for_pdf(bytes: &[u8], quality: PdfQuality) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes).map_err(|e| PreventivoError::ImageLoad(e.to_string()))?;

    let max = quality.max_width();
    let img = if img.width() > max || img.height() > max {
        img.resize(max, max, FilterType::Triangle)
    } else {
        img
    };

    let rgb = flatten_on_white(&img);
    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality.jpeg_quality())
        .encode_image(&rgb)
        .map_err(|e| PreventivoError::ImageLoad(e.to_string()))?;
    Ok(buf)
}

/// 取得済み画像をまとめて変換（並列）。変換できない画像は除外する。
pub fn prepare_all(images: &HashMap<String, Vec<u8>>, quality: PdfQuality) -> HashMap<String, Vec<u8>> {
    images
        .par_iter()
        .filter_map(|(reference, bytes)| match prepare_for_pdf(bytes, quality) {
            Ok(jpeg) => Some((reference.clone(), jpeg)),
            Err(e) => {
                tracing::warn!(image = %reference, error = %e, "画像を変換できませんでした");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use tempfile::tempdir;

    fn png_bytes(width: u32, height: u32, alpha: u8) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, alpha]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_image_source_parse() {
        assert_eq!(ImageSource::parse(""), ImageSource::Missing);
        assert_eq!(ImageSource::parse(" - "), ImageSource::Missing);
        assert_eq!(
            ImageSource::parse("https://cdn.example.com/ares.jpg"),
            ImageSource::Remote("https://cdn.example.com/ares.jpg".into())
        );
        assert_eq!(ImageSource::parse("foto/ares.png"), ImageSource::Local("foto/ares.png".into()));
    }

    #[test]
    fn test_cache_file_name_is_stable() {
        let a = cache_file_name("https://x/a.jpg");
        assert_eq!(a, cache_file_name("https://x/a.jpg"));
        assert_ne!(a, cache_file_name("https://x/b.jpg"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_prepare_for_pdf_downscales() {
        let bytes = png_bytes(1600, 800, 255);
        let jpeg = prepare_for_pdf(&bytes, PdfQuality::Low).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 400);
        assert_eq!(decoded.height(), 200);
    }

    #[test]
    fn test_transparent_pixels_become_white() {
        let bytes = png_bytes(10, 10, 0);
        let jpeg = prepare_for_pdf(&bytes, PdfQuality::Medium).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap().to_rgb8();
        let p = decoded.get_pixel(5, 5).0;
        assert!(p.iter().all(|c| *c > 240), "{:?}", p);
    }

    #[test]
    fn test_prepare_invalid_bytes() {
        assert!(matches!(
            prepare_for_pdf(b"not an image", PdfQuality::Medium),
            Err(PreventivoError::ImageLoad(_))
        ));
    }

    #[test]
    fn test_prepare_all_skips_broken() {
        let mut images = HashMap::new();
        images.insert("ok.png".to_string(), png_bytes(20, 20, 255));
        images.insert("broken.png".to_string(), b"xx".to_vec());

        let prepared = prepare_all(&images, PdfQuality::Medium);
        assert_eq!(prepared.len(), 1);
        assert!(prepared.contains_key("ok.png"));
    }

    #[tokio::test]
    async fn test_fetch_local_relative_to_base_dir() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("ares.png"), png_bytes(4, 4, 255)).unwrap();

        let fetcher = ImageFetcher::new(None).unwrap().with_base_dir(dir.path());
        let bytes = fetcher.fetch("ares.png").await.unwrap();
        assert!(bytes.is_some());
        assert!(fetcher.fetch("").await.unwrap().is_none());
        assert!(fetcher.fetch("missing.png").await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_all_best_effort() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), png_bytes(4, 4, 255)).unwrap();

        let fetcher = ImageFetcher::new(None).unwrap().with_base_dir(dir.path());
        let refs = vec![
            "a.png".to_string(),
            "a.png".to_string(),
            "missing.png".to_string(),
            String::new(),
        ];
        let images = fetcher.fetch_all(&refs, false).await;
        assert_eq!(images.len(), 1);
        assert!(images.contains_key("a.png"));
    }

    #[tokio::test]
    async fn test_download_uses_cache_file() {
        let dir = tempdir().unwrap();
        let url = "https://invalid.example.invalid/cached.jpg";
        let cached = png_bytes(4, 4, 255);
        std::fs::write(dir.path().join(cache_file_name(url)), &cached).unwrap();

        let fetcher = ImageFetcher::new(Some(dir.path().to_path_buf())).unwrap();
        let bytes = fetcher.fetch(url).await.unwrap();
        assert_eq!(bytes, Some(cached));
    }

    #[tokio::test]
    async fn test_broken_cache_file_is_dropped() {
        let dir = tempdir().unwrap();
        let url = "https://invalid.example.invalid/broken.jpg";
        let cache_file = dir.path().join(cache_file_name(url));
        // HTMLのエラーページなどが保存されていた場合
        std::fs::write(&cache_file, b"<html>404</html>").unwrap();

        let fetcher = ImageFetcher::new(Some(dir.path().to_path_buf())).unwrap();
        assert!(fetcher.fetch(url).await.is_err());
        assert!(!cache_file.exists(), "壊れたキャッシュが残っている");
    }

    #[test]
    fn test_only_images_are_decodable() {
        assert!(is_decodable(&png_bytes(2, 2, 255)));
        assert!(!is_decodable(b"<html>Access denied</html>"));
        assert!(!is_decodable(b""));
        // PNGの先頭だけ（途中で切れたダウンロード）
        assert!(!is_decodable(&png_bytes(8, 8, 255)[..16]));
    }

    #[tokio::test]
    async fn test_store_in_cache_leaves_no_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("img").join(cache_file_name("https://x/a.png"));
        let bytes = png_bytes(4, 4, 255);

        store_in_cache(&path, &bytes).await;
        assert_eq!(std::fs::read(&path).unwrap(), bytes);
        assert!(!path.with_extension("part").exists());
    }
}
