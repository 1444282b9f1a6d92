//! サイズレンジ展開
//!
//! 価格表の "RANGE TAGLIE" 列を選択可能なサイズ一覧に展開する。
//! - "35-48" / "35/48" / "35÷48" → 35, 36, ..., 48
//! - "6.5-9" → 0.5刻み
//! - "S-XXL" → S, M, L, XL, XXL
//! - "UNICA" / "TU" / 空 → プレースホルダのみ

use crate::types::Size;
use lazy_static::lazy_static;
use regex::Regex;

/// 文字サイズの並び順
pub const LETTER_SIZES: &[&str] = &["XXS", "XS", "S", "M", "L", "XL", "XXL", "3XL", "4XL", "5XL"];

/// フリーサイズ表記
const ONE_SIZE_LABELS: &[&str] = &["UNICA", "TAGLIA UNICA", "TU", "T.U.", "U"];

/// 展開上限（誤ったレンジで巨大な一覧を作らない）
const MAX_SIZES: usize = 80;

lazy_static! {
    static ref NUMERIC_RANGE: Regex =
        Regex::new(r"^(\d+(?:[.,]5)?)\s*(?:-|/|÷|–|A|AL)\s*(\d+(?:[.,]5)?)$").unwrap();
    static ref LETTER_RANGE: Regex = Regex::new(r"^([0-9]?X*[SML])\s*(?:-|/|÷|–)\s*([0-9]?X*[SML])$").unwrap();
    static ref SINGLE_NUMBER: Regex = Regex::new(r"^\d+(?:[.,]5)?$").unwrap();
}

fn parse_number(s: &str) -> Option<f64> {
    s.replace(',', ".").parse::<f64>().ok()
}

/// "XXXL" などを正規の表記（3XL）に揃える
fn canonical_letter(s: &str) -> String {
    let x_count = s.chars().filter(|c| *c == 'X').count();
    if x_count >= 3 && s.ends_with('L') && !s.starts_with(|c: char| c.is_ascii_digit()) {
        format!("{}XL", x_count)
    } else {
        s.to_string()
    }
}

/// 文字サイズの並び順（S, M, L ...）
pub fn letter_index(s: &str) -> Option<usize> {
    let canonical = canonical_letter(&s.trim().to_uppercase());
    LETTER_SIZES.iter().position(|l| *l == canonical)
}

/// サイズレンジを展開
pub fn parse_size_range(text: &str) -> Vec<Size> {
    let normalized = text.trim().to_uppercase();

    if normalized.is_empty() || normalized == "-" || ONE_SIZE_LABELS.contains(&normalized.as_str()) {
        return vec![Size::placeholder()];
    }

    if let Some(caps) = NUMERIC_RANGE.captures(&normalized) {
        if let (Some(from), Some(to)) = (parse_number(&caps[1]), parse_number(&caps[2])) {
            return expand_numeric(from, to);
        }
    }

    if let Some(caps) = LETTER_RANGE.captures(&normalized) {
        if let (Some(from), Some(to)) = (letter_index(&caps[1]), letter_index(&caps[2])) {
            if from <= to {
                return LETTER_SIZES[from..=to]
                    .iter()
                    .map(|l| Size::Label(l.to_string()))
                    .collect();
            }
        }
    }

    if SINGLE_NUMBER.is_match(&normalized) {
        if let Some(n) = parse_number(&normalized) {
            return vec![Size::Numeric(n)];
        }
    }

    if let Some(idx) = letter_index(&normalized) {
        return vec![Size::Label(LETTER_SIZES[idx].to_string())];
    }

    // 不明な表記はプレースホルダ
    vec![Size::placeholder()]
}

fn expand_numeric(from: f64, to: f64) -> Vec<Size> {
    let (lo, hi) = if from <= to { (from, to) } else { (to, from) };
    let step = if lo.fract() != 0.0 || hi.fract() != 0.0 { 0.5 } else { 1.0 };
    let count = ((hi - lo) / step).round() as usize + 1;

    if count > MAX_SIZES {
        return vec![Size::placeholder()];
    }

    (0..count).map(|i| Size::Numeric(lo + step * i as f64)).collect()
}

/// 入力文字列を一覧中のサイズに照合
pub fn match_size(sizes: &[Size], input: &str) -> Option<Size> {
    let input = input.trim().to_uppercase();
    sizes.iter().find(|s| s.to_string().to_uppercase() == input).cloned()
}
