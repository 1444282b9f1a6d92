pub mod pdf;
pub mod excel;

use crate::cli::{ExportFormat, PdfQuality};
use crate::error::Result;
use crate::images::{prepare_all, prepare_for_pdf, ImageFetcher};
use pdf::{PdfAssets, PdfOptions};
use preventivo_common::QuoteDraft;
use std::path::{Path, PathBuf};

/// 出力設定
#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub format: ExportFormat,
    pub output: PathBuf,
    pub title: String,
    pub pdf_quality: PdfQuality,
    pub logo: Option<PathBuf>,
    pub logo_width_mm: f32,
}

/// ファイル名に使えない文字を置き換え
fn file_stem_for(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let stem = stem.trim_matches('_').to_string();
    if stem.is_empty() { "preventivo".to_string() } else { stem }
}

fn output_path_for_format(output: &Path, title: &str, extension: &str) -> PathBuf {
    if output.is_dir() || output.extension().is_none() {
        output.join(format!("{}.{}", file_stem_for(title), extension))
    } else {
        output.to_path_buf()
    }
}

fn output_paths_for_both(output: &Path, title: &str) -> (PathBuf, PathBuf) {
    if output.is_dir() || output.extension().is_none() {
        let stem = file_stem_for(title);
        (output.join(format!("{}.pdf", stem)), output.join(format!("{}.xlsx", stem)))
    } else {
        let parent = output.parent().unwrap_or_else(|| Path::new("."));
        let stem = output
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| file_stem_for(title));
        (parent.join(format!("{}.pdf", stem)), parent.join(format!("{}.xlsx", stem)))
    }
}

/// PDF用の画像（商品写真・販促ディスプレイ・ロゴ）を取得して変換
pub async fn collect_assets(
    draft: &QuoteDraft,
    fetcher: &ImageFetcher,
    settings: &ExportSettings,
) -> PdfAssets {
    let references: Vec<String> = draft
        .lines
        .iter()
        .map(|l| l.image.clone())
        .chain(draft.displays.iter().map(|d| d.image.clone()))
        .collect();

    let raw = fetcher.fetch_all(&references, true).await;
    let images = prepare_all(&raw, settings.pdf_quality);

    let logo = settings.logo.as_deref().and_then(load_logo);

    PdfAssets { images, logo }
}

/// ロゴは高品質設定で変換する
fn load_logo(path: &Path) -> Option<Vec<u8>> {
    let converted = std::fs::read(path)
        .map_err(crate::error::PreventivoError::from)
        .and_then(|bytes| prepare_for_pdf(&bytes, PdfQuality::High));

    match converted {
        Ok(jpeg) => Some(jpeg),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ロゴを読み込めませんでした");
            None
        }
    }
}

/// 見積をエクスポートし、出力ファイルの一覧を返す
pub async fn export_draft(
    draft: &QuoteDraft,
    settings: &ExportSettings,
    fetcher: &ImageFetcher,
) -> Result<Vec<PathBuf>> {
    let pdf_options = PdfOptions {
        title: settings.title.clone(),
        logo_width_mm: settings.logo_width_mm,
    };

    let mut written = Vec::new();

    match settings.format {
        ExportFormat::Pdf => {
            let output_path = output_path_for_format(&settings.output, &settings.title, "pdf");
            println!("- 画像を取得中...");
            let assets = collect_assets(draft, fetcher, settings).await;
            println!("- PDFを生成中... (品質: {})", settings.pdf_quality);
            pdf::generate_pdf(draft, &output_path, &pdf_options, &assets)?;
            println!("✔ PDF出力: {}", output_path.display());
            written.push(output_path);
        }
        ExportFormat::Excel => {
            let output_path = output_path_for_format(&settings.output, &settings.title, "xlsx");
            println!("- Excelを生成中...");
            excel::generate_excel(draft, &output_path, &settings.title)?;
            println!("✔ Excel出力: {}", output_path.display());
            written.push(output_path);
        }
        ExportFormat::Both => {
            let (pdf_path, excel_path) = output_paths_for_both(&settings.output, &settings.title);

            println!("- 画像を取得中...");
            let assets = collect_assets(draft, fetcher, settings).await;
            println!("- PDFを生成中... (品質: {})", settings.pdf_quality);
            pdf::generate_pdf(draft, &pdf_path, &pdf_options, &assets)?;
            println!("✔ PDF出力: {}", pdf_path.display());

            println!("- Excelを生成中...");
            excel::generate_excel(draft, &excel_path, &settings.title)?;
            println!("✔ Excel出力: {}", excel_path.display());

            written.push(pdf_path);
            written.push(excel_path);
        }
    }

    Ok(written)
}
