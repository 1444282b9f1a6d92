//! PDF見積書の生成
//!
//! レイアウト計算は preventivo_common::export::pdf_core、
//! ここでは printpdf の描画命令（Op）への変換のみ行う。

use crate::error::{PreventivoError, Result};
use preventivo_common::cart::{aggregate_by_model, total_pieces};
use preventivo_common::export::pdf_core::{
    build_block_text, format_currency, max_chars_for_width, truncate_lines, wrap_text, PageCursor,
};
use preventivo_common::layout::*;
use preventivo_common::{DisplayInsert, QuoteDraft, QuoteLayout};
use printpdf::*;
use std::collections::HashMap;
use std::path::Path;

/// 数字・大文字を含む表示の平均文字幅（em比、右揃えの概算用）
const RIGHT_ALIGN_CHAR_EM: f32 = 0.55;
const LINE_GAP_MM: f32 = 3.8;

/// 埋め込み画像（PDF用に変換済みのJPEG）
#[derive(Debug, Default)]
pub struct PdfAssets {
    /// 画像参照 → JPEGバイト
    pub images: HashMap<String, Vec<u8>>,
    pub logo: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct PdfOptions {
    pub title: String,
    pub logo_width_mm: f32,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            title: "Preventivo".into(),
            logo_width_mm: DEFAULT_LOGO_WIDTH_MM,
        }
    }
}

/// ページごとの描画命令
struct Canvas {
    layout: QuoteLayout,
    pages: Vec<Vec<Op>>,
    image_ids: HashMap<String, (XObjectId, usize, usize)>,
}

impl Canvas {
    fn page(&mut self, index: usize) -> &mut Vec<Op> {
        while self.pages.len() <= index {
            self.pages.push(Vec::new());
        }
        &mut self.pages[index]
    }

    /// テキスト（x: 左余白からのオフセット、top: 上端からの距離、いずれもmm）
    fn text(&mut self, page: usize, x: f32, top: f32, size: f32, font: BuiltinFont, s: &str) {
        if s.is_empty() {
            return;
        }
        let pos = Point::new(Mm(self.layout.to_pdf_x(x)), Mm(self.layout.to_pdf_y(top)));
        self.page(page).extend([
            Op::StartTextSection,
            Op::SetTextCursor { pos },
            Op::SetFontSizeBuiltinFont { size: Pt(size), font },
            Op::WriteTextBuiltinFont {
                items: vec![TextItem::Text(s.to_string())],
                font,
            },
            Op::EndTextSection,
        ]);
    }

    /// 右揃えテキスト（right: 右端のオフセット）
    fn text_right(&mut self, page: usize, right: f32, top: f32, size: f32, font: BuiltinFont, s: &str) {
        let x = right - text_width_mm(s, size);
        self.text(page, x, top, size, font, s);
    }

    /// 水平線
    fn rule(&mut self, page: usize, from: f32, to: f32, top: f32, thickness_pt: f32, gray: f32) {
        let y = Mm(self.layout.to_pdf_y(top));
        let x1 = Mm(self.layout.to_pdf_x(from));
        let x2 = Mm(self.layout.to_pdf_x(to));
        self.page(page).extend([
            Op::SetOutlineColor { col: gray_color(gray) },
            Op::SetOutlineThickness { pt: Pt(thickness_pt) },
            Op::DrawLine {
                line: Line {
                    points: vec![
                        LinePoint { p: Point::new(x1, y), bezier: false },
                        LinePoint { p: Point::new(x2, y), bezier: false },
                    ],
                    is_closed: false,
                },
            },
        ]);
    }

    /// 画像を枠内に収めて中央配置（top: 枠の上端）
    fn image(&mut self, page: usize, key: &str, x: f32, top: f32, box_w: f32, box_h: f32) -> bool {
        let Some((id, px_w, px_h)) = self.image_ids.get(key).cloned() else {
            return false;
        };
        if px_w == 0 || px_h == 0 {
            return false;
        }

        // dpi=72 → 1px = 1pt
        let box_w_pt = mm_to_pt(box_w);
        let box_h_pt = mm_to_pt(box_h);
        let scale = (box_w_pt / px_w as f32).min(box_h_pt / px_h as f32);
        let draw_w = pt_to_mm(px_w as f32 * scale);
        let draw_h = pt_to_mm(px_h as f32 * scale);

        let left = self.layout.to_pdf_x(x + (box_w - draw_w) / 2.0);
        let bottom = self.layout.to_pdf_y(top + (box_h + draw_h) / 2.0);

        self.page(page).push(Op::UseXobject {
            id,
            transform: XObjectTransform {
                translate_x: Some(Mm(left).into()),
                translate_y: Some(Mm(bottom).into()),
                scale_x: Some(scale),
                scale_y: Some(scale),
                dpi: Some(72.0),
                ..Default::default()
            },
        });
        true
    }
}

fn gray_color(level: f32) -> Color {
    Color::Rgb(Rgb {
        r: level,
        g: level,
        b: level,
        icc_profile: None,
    })
}

/// 右揃え用の文字列幅概算（mm）
fn text_width_mm(s: &str, size_pt: f32) -> f32 {
    pt_to_mm(s.chars().count() as f32 * size_pt * RIGHT_ALIGN_CHAR_EM)
}

/// 画像を文書に登録（デコードできない画像は警告して除外）
fn register_images(
    doc: &mut PdfDocument,
    assets: &PdfAssets,
) -> HashMap<String, (XObjectId, usize, usize)> {
    let mut ids = HashMap::new();
    let all = assets
        .images
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_slice()))
        .chain(assets.logo.as_deref().map(|logo| (LOGO_KEY, logo)));

    for (key, bytes) in all {
        let mut warnings = Vec::new();
        match RawImage::decode_from_bytes(bytes, &mut warnings) {
            Ok(raw) => {
                let (w, h) = (raw.width, raw.height);
                let id = doc.add_image(&raw);
                ids.insert(key.to_string(), (id, w, h));
            }
            Err(e) => tracing::warn!(image = key, error = %e, "PDFに画像を埋め込めませんでした"),
        }
    }
    ids
}

const LOGO_KEY: &str = "__logo__";

pub fn generate_pdf(
    draft: &QuoteDraft,
    output_path: &Path,
    options: &PdfOptions,
    assets: &PdfAssets,
) -> Result<()> {
    let bytes = render_pdf(draft, options, assets)?;
    std::fs::write(output_path, bytes)?;
    Ok(())
}

/// PDFをバイト列として生成
pub fn render_pdf(draft: &QuoteDraft, options: &PdfOptions, assets: &PdfAssets) -> Result<Vec<u8>> {
    let layout = QuoteLayout::default().with_logo_width(options.logo_width_mm);
    let mut doc = PdfDocument::new(&options.title);

    let mut canvas = Canvas {
        layout: layout.clone(),
        pages: Vec::new(),
        image_ids: register_images(&mut doc, assets),
    };

    draw_header(&mut canvas, draft, options);
    draw_table_header(&mut canvas, 0, layout.first_page_top_mm());

    let mut cursor = PageCursor::new(&layout);
    let mut headed_pages = 1;

    let mut ensure_page = |canvas: &mut Canvas, page: usize| {
        while headed_pages <= page {
            draw_continuation_header(canvas, headed_pages, draft);
            draw_table_header(canvas, headed_pages, layout.continuation_top_mm());
            headed_pages += 1;
        }
    };

    let article_chars = max_chars_for_width(COL_ARTICLE_WIDTH, 8.0);
    let sizes_chars = max_chars_for_width(COL_SIZES_WIDTH, 9.0);

    let groups = aggregate_by_model(&draft.lines);
    if groups.is_empty() {
        let slot = cursor.reserve(12.0);
        canvas.text(slot.page, COL_ARTICLE_X, slot.top_mm + 6.0, 10.0, BuiltinFont::HelveticaOblique, "Nessun articolo inserito");
    }

    for group in &groups {
        let slot = cursor.reserve(BLOCK_HEIGHT_MM);
        ensure_page(&mut canvas, slot.page);
        let (page, top) = (slot.page, slot.top_mm);
        let text = build_block_text(group, article_chars, sizes_chars);

        if !canvas.image(page, &group.image, COL_PHOTO_X, top, PHOTO_BOX_MM, PHOTO_BOX_MM) {
            canvas.text(page, COL_PHOTO_X + 6.0, top + PHOTO_BOX_MM / 2.0, 7.0, BuiltinFont::HelveticaOblique, "no foto");
        }

        canvas.text(page, COL_ARTICLE_X, top + 4.5, 10.0, BuiltinFont::HelveticaBold, &text.title);
        let mut y = top + 4.5 + LINE_GAP_MM + 0.5;
        for detail in &text.details {
            canvas.text(page, COL_ARTICLE_X, y, 8.0, BuiltinFont::Helvetica, detail);
            y += LINE_GAP_MM;
        }
        canvas.text(page, COL_ARTICLE_X, y, 8.0, BuiltinFont::Helvetica, &text.price_line);

        let mut y = top + 4.5;
        for line in &text.sizes {
            canvas.text(page, COL_SIZES_X, y, 9.0, BuiltinFont::Helvetica, line);
            y += LINE_GAP_MM + 0.4;
        }
        canvas.text(page, COL_SIZES_X, y + 0.6, 8.0, BuiltinFont::HelveticaOblique, &text.quantity);

        canvas.text(page, COL_UNIT_X, top + 4.5, 9.0, BuiltinFont::Helvetica, &text.unit_price);
        canvas.text_right(page, COL_TOTAL_RIGHT, top + 4.5, 10.0, BuiltinFont::HelveticaBold, &text.total);

        canvas.rule(page, 0.0, COL_TOTAL_RIGHT, top + BLOCK_HEIGHT_MM - BLOCK_GAP_MM / 2.0, 0.3, 0.75);
    }

    let slot = cursor.reserve(TOTALS_HEIGHT_MM);
    ensure_page(&mut canvas, slot.page);
    draw_totals(&mut canvas, slot.page, slot.top_mm, draft);

    if !draft.displays.is_empty() {
        let slot = cursor.reserve(DISPLAY_SECTION_TITLE_MM + DISPLAY_BLOCK_HEIGHT_MM);
        ensure_page(&mut canvas, slot.page);
        canvas.text(slot.page, 0.0, slot.top_mm + 7.0, 12.0, BuiltinFont::HelveticaBold, "ESPOSITORI PROMOZIONALI");
        canvas.rule(slot.page, 0.0, COL_TOTAL_RIGHT, slot.top_mm + 9.0, 0.8, 0.2);

        let mut slot = slot;
        slot.top_mm += DISPLAY_SECTION_TITLE_MM;
        for (i, display) in draft.displays.iter().enumerate() {
            if i > 0 {
                slot = cursor.reserve(DISPLAY_BLOCK_HEIGHT_MM);
                ensure_page(&mut canvas, slot.page);
            }
            draw_display(&mut canvas, slot.page, slot.top_mm, display);
        }
    }

    let page_count = cursor.page_count().max(canvas.pages.len());
    for page in 0..page_count {
        draw_footer(&mut canvas, page, page_count, options, draft);
    }

    let pages: Vec<PdfPage> = canvas
        .pages
        .into_iter()
        .map(|ops| PdfPage::new(Mm(layout.page_width_mm), Mm(layout.page_height_mm), ops))
        .collect();

    let mut warnings = Vec::new();
    let bytes = doc
        .with_pages(pages)
        .save(&PdfSaveOptions::default(), &mut warnings);

    if bytes.is_empty() {
        return Err(PreventivoError::PdfGeneration("PDFの出力が空です".into()));
    }
    Ok(bytes)
}

fn draw_header(canvas: &mut Canvas, draft: &QuoteDraft, options: &PdfOptions) {
    let layout = canvas.layout.clone();
    let right = layout.usable_width_mm();
    let top = layout.margin_mm;

    canvas.image(0, LOGO_KEY, 0.0, top, layout.logo_width_mm, LOGO_MAX_HEIGHT_MM);

    canvas.text_right(0, right, top + 8.0, 20.0, BuiltinFont::HelveticaBold, &options.title.to_uppercase());
    let header = &draft.header;
    let mut y = top + 14.0;
    for line in [&header.company, &header.agent] {
        if !line.is_empty() {
            canvas.text_right(0, right, y, 9.0, BuiltinFont::Helvetica, line);
            y += LINE_GAP_MM + 0.4;
        }
    }

    let mut y = top + LOGO_MAX_HEIGHT_MM + 7.0;
    let fields = [
        ("Cliente", &header.customer),
        ("Data", &header.date),
        ("Agente", &header.agent),
    ];
    for (label, value) in fields {
        if value.is_empty() {
            continue;
        }
        canvas.text(0, 0.0, y, 9.0, BuiltinFont::HelveticaBold, &format!("{}:", label));
        canvas.text(0, 18.0, y, 9.0, BuiltinFont::Helvetica, value);
        y += LINE_GAP_MM + 0.8;
    }

    if !header.notes.is_empty() {
        let chars = max_chars_for_width(layout.usable_width_mm() - 18.0, 8.0);
        canvas.text(0, 0.0, y, 9.0, BuiltinFont::HelveticaBold, "Note:");
        for line in truncate_lines(wrap_text(&header.notes, chars), 2) {
            canvas.text(0, 18.0, y, 8.0, BuiltinFont::Helvetica, &line);
            y += LINE_GAP_MM;
        }
    }
}

fn draw_continuation_header(canvas: &mut Canvas, page: usize, draft: &QuoteDraft) {
    let top = canvas.layout.margin_mm;
    let label = if draft.header.customer.is_empty() {
        "PREVENTIVO (segue)".to_string()
    } else {
        format!("PREVENTIVO - {} (segue)", draft.header.customer)
    };
    canvas.text(page, 0.0, top + 5.0, 9.0, BuiltinFont::HelveticaOblique, &label);
}

/// 表見出し（bottom: 見出し行の下端 = 表の開始位置）
fn draw_table_header(canvas: &mut Canvas, page: usize, bottom: f32) {
    let top = bottom - TABLE_HEADER_HEIGHT_MM;
    let text_y = top + 5.5;
    let font = BuiltinFont::HelveticaBold;

    canvas.rule(page, 0.0, COL_TOTAL_RIGHT, top, 0.8, 0.2);
    canvas.text(page, COL_PHOTO_X, text_y, 8.0, font, "Foto");
    canvas.text(page, COL_ARTICLE_X, text_y, 8.0, font, "Articolo");
    canvas.text(page, COL_SIZES_X, text_y, 8.0, font, "Taglie x quantita'");
    canvas.text(page, COL_UNIT_X, text_y, 8.0, font, "Prezzo netto");
    canvas.text_right(page, COL_TOTAL_RIGHT, text_y, 8.0, font, "Totale");
    canvas.rule(page, 0.0, COL_TOTAL_RIGHT, bottom - 0.5, 0.4, 0.2);
}

fn draw_totals(canvas: &mut Canvas, page: usize, top: f32, draft: &QuoteDraft) {
    let total: f64 = draft.lines.iter().map(|l| l.line_total).sum();
    let pieces = total_pieces(&draft.lines);

    canvas.rule(page, 0.0, COL_TOTAL_RIGHT, top + 2.0, 0.8, 0.2);
    canvas.text(page, 0.0, top + 8.0, 9.0, BuiltinFont::Helvetica, &format!("Totale pezzi: {}", pieces));
    canvas.text_right(
        page,
        COL_TOTAL_RIGHT,
        top + 9.0,
        12.0,
        BuiltinFont::HelveticaBold,
        &format!("TOTALE {}", format_currency(total)),
    );
    canvas.text_right(page, COL_TOTAL_RIGHT, top + 14.0, 8.0, BuiltinFont::HelveticaOblique, "Prezzi IVA esclusa");

    if !draft.header.validity.is_empty() {
        canvas.text(page, 0.0, top + 14.0, 8.0, BuiltinFont::Helvetica, &draft.header.validity);
    }
}

fn draw_display(canvas: &mut Canvas, page: usize, top: f32, display: &DisplayInsert) {
    if !canvas.image(page, &display.image, 0.0, top, DISPLAY_IMAGE_MM, DISPLAY_IMAGE_MM) {
        canvas.text(page, 6.0, top + DISPLAY_IMAGE_MM / 2.0, 8.0, BuiltinFont::HelveticaOblique, "no foto");
    }

    let x = DISPLAY_IMAGE_MM + 6.0;
    canvas.text(page, x, top + 6.0, 11.0, BuiltinFont::HelveticaBold, &display.name);

    let chars = max_chars_for_width(COL_TOTAL_RIGHT - x, 9.0);
    let mut y = top + 6.0 + LINE_GAP_MM + 1.5;
    for line in truncate_lines(wrap_text(&display.note, chars), 10) {
        canvas.text(page, x, y, 9.0, BuiltinFont::Helvetica, &line);
        y += LINE_GAP_MM + 0.4;
    }
}

fn draw_footer(canvas: &mut Canvas, page: usize, page_count: usize, options: &PdfOptions, draft: &QuoteDraft) {
    let bottom = canvas.layout.page_height_mm - canvas.layout.margin_mm;
    let left = if draft.header.company.is_empty() {
        options.title.clone()
    } else {
        format!("{} - {}", draft.header.company, options.title)
    };
    canvas.rule(page, 0.0, COL_TOTAL_RIGHT, bottom - 4.5, 0.3, 0.6);
    canvas.text(page, 0.0, bottom - 1.0, 7.0, BuiltinFont::Helvetica, &left);
    canvas.text_right(
        page,
        COL_TOTAL_RIGHT,
        bottom - 1.0,
        7.0,
        BuiltinFont::Helvetica,
        &format!("Pagina {} di {}", page + 1, page_count),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_width_estimate() {
        let w = text_width_mm("EUR 100,00", 10.0);
        assert!(w > 15.0 && w < 25.0, "{}", w);
        assert_eq!(text_width_mm("", 10.0), 0.0);
    }

    #[test]
    fn test_render_empty_draft() {
        let bytes = render_pdf(&QuoteDraft::default(), &PdfOptions::default(), &PdfAssets::default()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
