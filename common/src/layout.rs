//! レイアウト設定モジュール
//!
//! mm基準のレイアウト定義（見積書PDF）。座標は上端からの距離で管理し、
//! 描画時にPDF座標（左下原点）へ変換する。

// ============================================
// mm基準レイアウト
// ============================================

/// A4サイズ（mm）
pub const A4_WIDTH_MM: f32 = 210.0;
pub const A4_HEIGHT_MM: f32 = 297.0;

/// 余白設定（mm）
pub const MARGIN_MM: f32 = 12.0;

/// ヘッダー（ロゴ・タイトル・顧客情報）の高さ
pub const HEADER_HEIGHT_MM: f32 = 52.0;
/// ロゴの最大高さ
pub const LOGO_MAX_HEIGHT_MM: f32 = 24.0;
/// ロゴ幅の初期値
pub const DEFAULT_LOGO_WIDTH_MM: f32 = 45.0;

/// 表見出し行の高さ
pub const TABLE_HEADER_HEIGHT_MM: f32 = 8.0;
/// 2ページ目以降の上端見出し
pub const CONTINUATION_HEIGHT_MM: f32 = 10.0;

/// モデルブロック（写真 + 情報）
pub const PHOTO_BOX_MM: f32 = 30.0;
pub const BLOCK_GAP_MM: f32 = 4.0;
pub const BLOCK_HEIGHT_MM: f32 = PHOTO_BOX_MM + BLOCK_GAP_MM;

/// 合計欄
pub const TOTALS_HEIGHT_MM: f32 = 26.0;
/// フッター（ページ番号）
pub const FOOTER_HEIGHT_MM: f32 = 10.0;

/// 販促ディスプレイ差し込み
pub const DISPLAY_SECTION_TITLE_MM: f32 = 12.0;
pub const DISPLAY_IMAGE_MM: f32 = 55.0;
pub const DISPLAY_BLOCK_HEIGHT_MM: f32 = DISPLAY_IMAGE_MM + 8.0;

/// 利用可能幅
pub const USABLE_WIDTH_MM: f32 = A4_WIDTH_MM - MARGIN_MM * 2.0; // 186mm

// ============================================
// 表の列（左余白からのオフセット mm）
// ============================================

pub const COL_PHOTO_X: f32 = 0.0;
pub const COL_ARTICLE_X: f32 = PHOTO_BOX_MM + 4.0;
pub const COL_ARTICLE_WIDTH: f32 = 72.0;
pub const COL_SIZES_X: f32 = COL_ARTICLE_X + COL_ARTICLE_WIDTH + 2.0;
pub const COL_SIZES_WIDTH: f32 = 36.0;
pub const COL_UNIT_X: f32 = COL_SIZES_X + COL_SIZES_WIDTH + 2.0;
/// 合計列は右端揃え
pub const COL_TOTAL_RIGHT: f32 = USABLE_WIDTH_MM;

// ============================================
// 変換係数
// ============================================

/// mm → pt変換 (1mm = 72/25.4 pt ≈ 2.835pt)
pub const MM_TO_PT: f32 = 72.0 / 25.4;

/// mm → pt 変換
#[inline]
pub fn mm_to_pt(mm: f32) -> f32 {
    mm * MM_TO_PT
}

/// pt → mm 変換
#[inline]
pub fn pt_to_mm(pt: f32) -> f32 {
    pt / MM_TO_PT
}

// ============================================
// レイアウト設定構造体
// ============================================

/// 見積書PDFレイアウト
#[derive(Debug, Clone)]
pub struct QuoteLayout {
    pub page_width_mm: f32,
    pub page_height_mm: f32,
    pub margin_mm: f32,
    pub header_height_mm: f32,
    pub logo_width_mm: f32,
    pub block_height_mm: f32,
    pub footer_height_mm: f32,
}

impl Default for QuoteLayout {
    fn default() -> Self {
        Self {
            page_width_mm: A4_WIDTH_MM,
            page_height_mm: A4_HEIGHT_MM,
            margin_mm: MARGIN_MM,
            header_height_mm: HEADER_HEIGHT_MM,
            logo_width_mm: DEFAULT_LOGO_WIDTH_MM,
            block_height_mm: BLOCK_HEIGHT_MM,
            footer_height_mm: FOOTER_HEIGHT_MM,
        }
    }
}

impl QuoteLayout {
    /// ロゴ幅を指定（利用可能幅の半分まで）
    pub fn with_logo_width(mut self, width_mm: f32) -> Self {
        self.logo_width_mm = width_mm.clamp(10.0, self.usable_width_mm() / 2.0);
        self
    }

    pub fn usable_width_mm(&self) -> f32 {
        self.page_width_mm - self.margin_mm * 2.0
    }

    /// コンテンツの下限（上端からの距離）
    pub fn content_bottom_mm(&self) -> f32 {
        self.page_height_mm - self.margin_mm - self.footer_height_mm
    }

    /// 1ページ目の表開始位置（上端からの距離）
    pub fn first_page_top_mm(&self) -> f32 {
        self.margin_mm + self.header_height_mm + TABLE_HEADER_HEIGHT_MM
    }

    /// 2ページ目以降の開始位置
    pub fn continuation_top_mm(&self) -> f32 {
        self.margin_mm + CONTINUATION_HEIGHT_MM + TABLE_HEADER_HEIGHT_MM
    }

    /// 上端からの距離 → PDF座標（下端から）
    pub fn to_pdf_y(&self, top_mm: f32) -> f32 {
        self.page_height_mm - top_mm
    }

    /// 左余白からのオフセット → PDF座標
    pub fn to_pdf_x(&self, offset_mm: f32) -> f32 {
        self.margin_mm + offset_mm
    }
}
