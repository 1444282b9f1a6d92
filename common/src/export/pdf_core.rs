//! PDF export core utilities.
//!
//! 描画ライブラリに依存しない部分: ページ送り、金額書式、折り返し、
//! モデルブロックの文言組み立て。

use crate::cart::ModelGroup;
use crate::layout::{pt_to_mm, QuoteLayout};

/// Helvetica の平均文字幅（em比）
const AVG_CHAR_WIDTH_EM: f32 = 0.5;

/// ブロックの配置先
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    /// 0始まりのページ番号
    pub page: usize,
    /// ブロック上端（上端からの距離 mm）
    pub top_mm: f32,
}

/// 縦方向の配置位置を管理する
#[derive(Debug, Clone)]
pub struct PageCursor {
    layout: QuoteLayout,
    page: usize,
    y_mm: f32,
}

impl PageCursor {
    pub fn new(layout: &QuoteLayout) -> Self {
        Self {
            layout: layout.clone(),
            page: 0,
            y_mm: layout.first_page_top_mm(),
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn y_mm(&self) -> f32 {
        self.y_mm
    }

    /// 残り高さ
    pub fn remaining_mm(&self) -> f32 {
        self.layout.content_bottom_mm() - self.y_mm
    }

    /// 指定高さを確保する。収まらなければ改ページする。
    pub fn reserve(&mut self, height_mm: f32) -> Slot {
        if height_mm > self.remaining_mm() && !self.at_page_top() {
            self.new_page();
        }
        let slot = Slot {
            page: self.page,
            top_mm: self.y_mm,
        };
        self.y_mm += height_mm;
        slot
    }

    pub fn new_page(&mut self) {
        self.page += 1;
        self.y_mm = self.layout.continuation_top_mm();
    }

    fn at_page_top(&self) -> bool {
        let top = if self.page == 0 {
            self.layout.first_page_top_mm()
        } else {
            self.layout.continuation_top_mm()
        };
        (self.y_mm - top).abs() < f32::EPSILON
    }

    /// 使用ページ数
    pub fn page_count(&self) -> usize {
        self.page + 1
    }
}

/// 金額書式: 1234.5 → "1.234,50"
pub fn format_amount(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as i64;
    let int_part = cents / 100;
    let frac_part = cents % 100;

    let digits = int_part.to_string();
    let mut grouped = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && cents != 0 { "-" } else { "" };
    format!("{}{},{:02}", sign, grouped, frac_part)
}

/// 通貨付き金額: "EUR 1.234,50"
pub fn format_currency(value: f64) -> String {
    format!("EUR {}", format_amount(value))
}

/// 幅に収まる概算文字数
pub fn max_chars_for_width(width_mm: f32, font_size_pt: f32) -> usize {
    let char_width_mm = pt_to_mm(font_size_pt * AVG_CHAR_WIDTH_EM);
    ((width_mm / char_width_mm).floor() as usize).max(1)
}

/// 単語単位で折り返し（長すぎる単語は分割）
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        while word.len() > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(max_chars);
            lines.push(word.into_iter().collect());
            word = rest;
        }

        let word: String = word.into_iter().collect();
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };

        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// 最大行数で切り詰め（末尾に "..."）
pub fn truncate_lines(mut lines: Vec<String>, max_lines: usize) -> Vec<String> {
    if lines.len() > max_lines {
        lines.truncate(max_lines);
        if let Some(last) = lines.last_mut() {
            last.push_str("...");
        }
    }
    lines
}

/// モデルブロックに表示する文言
#[derive(Debug, Clone, PartialEq)]
pub struct BlockText {
    pub title: String,
    /// 価格表タグ・被覆・規格
    pub details: Vec<String>,
    pub sizes: Vec<String>,
    /// "Listino EUR 100,00 - sconto 10+5"
    pub price_line: String,
    pub unit_price: String,
    pub total: String,
    pub quantity: String,
}

/// 集計行から表示文言を作成
pub fn build_block_text(group: &ModelGroup, article_chars: usize, sizes_chars: usize) -> BlockText {
    let mut details = Vec::new();
    if let Some(tag) = &group.catalog {
        details.push(format!("Listino {}", tag));
    }
    if let Some(coating) = &group.coating {
        details.push(format!("Rivestimento: {}", coating));
    }
    if let Some(note) = &group.regulatory_note {
        details.extend(truncate_lines(wrap_text(note, article_chars), 2));
    }

    let price_line = if group.discounts.is_zero() {
        format!("Listino {}", format_currency(group.list_price))
    } else {
        format!(
            "Listino {} - sconto {}%",
            format_currency(group.list_price),
            group.discounts
        )
    };

    BlockText {
        title: group.article.clone(),
        details,
        sizes: truncate_lines(wrap_text(&group.sizes_label(), sizes_chars), 4),
        price_line,
        unit_price: format_currency(group.unit_price),
        total: format_currency(group.total),
        quantity: format!("Tot. pz {}", group.quantity),
    }
}
