//! PDF/Excel出力の統合テスト

use preventivo_common::{Cart, CatalogRow, Discounts, DisplayInsert, QuoteDraft, QuoteHeader, Size};
use preventivo_rust::cli::{ExportFormat, PdfQuality};
use preventivo_rust::export::pdf::{self, PdfAssets, PdfOptions};
use preventivo_rust::export::{excel, export_draft, ExportSettings};
use preventivo_rust::images::{prepare_for_pdf, ImageFetcher};
use lopdf::{Document, Object};
use std::io::Cursor;
use tempfile::tempdir;

fn create_row(index: usize) -> CatalogRow {
    CatalogRow {
        catalog: if index % 2 == 0 { "A".into() } else { "B".into() },
        article: format!("ARES S3 MOD.{}", index),
        list_price: 50.0 + index as f64,
        size_range: "38-46".into(),
        image: String::new(),
        coating: Some("PU".into()),
        regulatory_note: Some("EN ISO 20345 S3 SRC".into()),
        ..Default::default()
    }
}

fn create_draft(models: usize) -> QuoteDraft {
    let mut cart = Cart::new();
    for i in 0..models {
        let row = create_row(i);
        for size in [40.0, 41.0, 42.0] {
            cart.add_row(&row, Size::Numeric(size), 2, Discounts::new(10.0, 5.0, 0.0))
                .unwrap();
        }
    }

    QuoteDraft {
        header: QuoteHeader {
            customer: "Rossi Costruzioni Srl".into(),
            agent: "Mario Bianchi".into(),
            company: "DPI Nord".into(),
            date: "14/10/2026".into(),
            notes: "Consegna entro fine mese".into(),
            validity: "Validità offerta: 30 giorni".into(),
        },
        lines: cart.into_lines(),
        displays: Vec::new(),
    }
}

fn jpeg_fixture() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(64, 48, image::Rgb([200, 30, 30]));
    let mut png = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();
    prepare_for_pdf(&png, PdfQuality::Low).unwrap()
}

/// 各ページに描画された文字列（WinAnsi、1命令1行）
fn page_texts(pdf: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(pdf).expect("PDFを解析できません");
    doc.get_pages()
        .values()
        .map(|page_id| {
            let content = doc.get_and_decode_page_content(*page_id).expect("ページ内容を解析できません");
            let mut lines = Vec::new();
            for op in &content.operations {
                let strings: Vec<&Object> = match op.operator.as_str() {
                    "Tj" => op.operands.iter().collect(),
                    "TJ" => op
                        .operands
                        .iter()
                        .filter_map(|o| o.as_array().ok())
                        .flatten()
                        .collect(),
                    _ => continue,
                };
                let line: String = strings
                    .into_iter()
                    .filter_map(|o| o.as_str().ok())
                    .flat_map(|bytes| bytes.iter().map(|b| *b as char))
                    .collect();
                lines.push(line);
            }
            lines.join("\n")
        })
        .collect()
}

#[test]
fn test_pdf_generation_without_images() {
    let dir = tempdir().expect("Failed to create temp dir");
    let output_path = dir.path().join("preventivo.pdf");

    let result = pdf::generate_pdf(
        &create_draft(3),
        &output_path,
        &PdfOptions::default(),
        &PdfAssets::default(),
    );

    assert!(result.is_ok(), "PDF生成に失敗: {:?}", result.err());
    let bytes = std::fs::read(&output_path).expect("PDF読み込み失敗");
    assert!(bytes.starts_with(b"%PDF"), "PDFヘッダーがない");
}

#[test]
fn test_pdf_generation_empty_draft() {
    let bytes = pdf::render_pdf(&QuoteDraft::default(), &PdfOptions::default(), &PdfAssets::default());
    assert!(bytes.is_ok(), "空の見積でPDF生成に失敗: {:?}", bytes.err());
}

#[test]
fn test_pdf_multi_page_is_larger() {
    let options = PdfOptions::default();
    let assets = PdfAssets::default();

    let small = pdf::render_pdf(&create_draft(1), &options, &assets).unwrap();
    // 1ページに収まらない件数
    let large = pdf::render_pdf(&create_draft(20), &options, &assets).unwrap();

    assert!(large.len() > small.len());
}

#[test]
fn test_pdf_pages_are_numbered() {
    let bytes = pdf::render_pdf(&create_draft(20), &PdfOptions::default(), &PdfAssets::default()).unwrap();
    let pages = page_texts(&bytes);
    let count = pages.len();
    assert!(count >= 2, "20モデルで改ページされていない");

    for (i, text) in pages.iter().enumerate() {
        let footer = format!("Pagina {} di {}", i + 1, count);
        assert!(text.contains(&footer), "{}ページ目に「{}」がない", i + 1, footer);
    }
}

#[test]
fn test_pdf_block_shows_sizes_and_totals() {
    let mut draft = create_draft(1);
    draft.displays.push(DisplayInsert {
        name: "Totem S3".into(),
        image: String::new(),
        note: "Omaggio con ordine superiore a 50 paia".into(),
    });

    let bytes = pdf::render_pdf(&draft, &PdfOptions::default(), &PdfAssets::default()).unwrap();
    let pages = page_texts(&bytes);
    let all = pages.join("\n");

    assert!(all.contains("ARES S3 MOD.0"));
    assert!(all.contains("40x2  41x2  42x2"), "サイズ行がない:\n{}", all);
    assert!(all.contains("Tot. pz 6"));
    assert!(all.contains("ESPOSITORI PROMOZIONALI"));
    assert!(all.contains("Totem S3"));

    // 合計 6pz × 42,75 = 256,50
    assert!(all.contains("TOTALE EUR 256,50"), "合計行がない:\n{}", all);
    assert!(all.contains("Prezzi IVA esclusa"));
}

#[test]
fn test_pdf_with_photos_logo_and_displays() {
    let mut draft = create_draft(2);
    for line in &mut draft.lines {
        line.image = "foto/ares.jpg".into();
    }
    draft.displays.push(DisplayInsert {
        name: "Totem S3".into(),
        image: "foto/totem.jpg".into(),
        note: "Omaggio con ordine superiore a 50 paia".into(),
    });

    let jpeg = jpeg_fixture();
    let mut assets = PdfAssets::default();
    assets.images.insert("foto/ares.jpg".into(), jpeg.clone());
    assets.images.insert("foto/totem.jpg".into(), jpeg.clone());
    assets.logo = Some(jpeg);

    let without = pdf::render_pdf(&draft, &PdfOptions::default(), &PdfAssets::default()).unwrap();
    let with = pdf::render_pdf(&draft, &PdfOptions::default(), &assets).unwrap();
    assert!(with.len() > without.len(), "画像が埋め込まれていない");
}

#[test]
fn test_pdf_quality_levels() {
    let dir = tempdir().expect("Failed to create temp dir");
    let draft = create_draft(1);

    for quality in [PdfQuality::High, PdfQuality::Medium, PdfQuality::Low] {
        let output_path = dir.path().join(format!("{}.pdf", quality));
        let mut assets = PdfAssets::default();
        assets.logo = Some(jpeg_fixture());

        let result = pdf::generate_pdf(&draft, &output_path, &PdfOptions::default(), &assets);
        assert!(result.is_ok(), "品質{}でPDF生成に失敗", quality);
        assert!(output_path.exists());
    }
}

#[test]
fn test_excel_generation() {
    let dir = tempdir().expect("Failed to create temp dir");
    let output_path = dir.path().join("preventivo.xlsx");

    let result = excel::generate_excel(&create_draft(2), &output_path, "Preventivo");
    assert!(result.is_ok(), "Excel生成に失敗: {:?}", result.err());

    let bytes = std::fs::read(&output_path).unwrap();
    assert!(bytes.starts_with(b"PK"));
}

#[test]
fn test_excel_readable_by_calamine() {
    use calamine::{open_workbook_auto, Data, Reader};

    let dir = tempdir().expect("Failed to create temp dir");
    let output_path = dir.path().join("preventivo.xlsx");
    excel::generate_excel(&create_draft(1), &output_path, "Preventivo").unwrap();

    let mut workbook = open_workbook_auto(&output_path).unwrap();
    let range = workbook.worksheet_range("Preventivo").unwrap();

    let articles = range
        .rows()
        .filter(|row| matches!(row.get(1), Some(Data::String(s)) if s.starts_with("ARES")))
        .count();
    assert_eq!(articles, 3);
}

#[tokio::test]
async fn test_export_both_formats_to_directory() {
    let dir = tempdir().expect("Failed to create temp dir");
    let settings = ExportSettings {
        format: ExportFormat::Both,
        output: dir.path().to_path_buf(),
        title: "Preventivo Rossi".into(),
        pdf_quality: PdfQuality::Low,
        logo: None,
        logo_width_mm: 40.0,
    };
    let fetcher = ImageFetcher::new(None).unwrap();

    let written = export_draft(&create_draft(2), &settings, &fetcher).await.unwrap();
    assert_eq!(written.len(), 2);
    assert_eq!(written[0], dir.path().join("Preventivo_Rossi.pdf"));
    assert_eq!(written[1], dir.path().join("Preventivo_Rossi.xlsx"));
    assert!(written.iter().all(|p| p.exists()));
}

#[tokio::test]
async fn test_export_with_missing_photo_still_renders() {
    let dir = tempdir().expect("Failed to create temp dir");
    let mut draft = create_draft(1);
    draft.lines[0].image = "non_esiste.jpg".into();

    let settings = ExportSettings {
        format: ExportFormat::Pdf,
        output: dir.path().join("offerta.pdf"),
        title: "Preventivo".into(),
        pdf_quality: PdfQuality::Medium,
        logo: Some(dir.path().join("logo_mancante.png")),
        logo_width_mm: 45.0,
    };
    let fetcher = ImageFetcher::new(None).unwrap().with_base_dir(dir.path());

    let written = export_draft(&draft, &settings, &fetcher).await.unwrap();
    assert_eq!(written, vec![dir.path().join("offerta.pdf")]);
}
