//! 見積データの型定義
//!
//! CLIと共通ライブラリで共有される型:
//! - CatalogRow: 価格表（スプレッドシート）の1行
//! - CartLine: カートに追加された見積明細
//! - QuoteDraft: ヘッダー＋明細（JSONで保存/再エクスポート）

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// サイズ未指定時の表示
pub const SIZE_PLACEHOLDER: &str = "-";

/// 価格表の1行（読み取り専用）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRow {
    /// 価格表タグ（A/Bなど）
    pub catalog: String,

    pub article: String,          // ARTICOLO

    pub list_price: f64,          // LISTINO

    #[serde(default)]
    pub size_range: String,       // RANGE TAGLIE

    #[serde(default)]
    pub image: String,            // IMMAGINE（URL/パス/空）

    #[serde(default)]
    pub coating: Option<String>,  // RIVESTIMENTO

    #[serde(default)]
    pub box_quantity: Option<u32>, // PZ CONFEZIONE

    #[serde(default)]
    pub regulatory_note: Option<String>, // NORMATIVA

    /// その他の列（正規化済み列名 → 値）
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

/// 文字サイズの並び替えキーの基点（数値サイズより大きい値）
const LETTER_SORT_BASE: f64 = 1.0e6;

/// サイズ（数値 or プレースホルダ）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Size {
    Numeric(f64),
    Label(String),
}

impl Size {
    pub fn placeholder() -> Self {
        Size::Label(SIZE_PLACEHOLDER.to_string())
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Size::Label(l) if l == SIZE_PLACEHOLDER)
    }

    /// 並び替え用キー（数値サイズは数値順、文字サイズはS→XL順で数値の後ろ、その他は末尾）
    pub fn sort_key(&self) -> f64 {
        match self {
            Size::Numeric(n) => *n,
            Size::Label(l) => match crate::sizes::letter_index(l) {
                Some(i) => LETTER_SORT_BASE + i as f64,
                None => f64::MAX,
            },
        }
    }
}

impl Default for Size {
    fn default() -> Self {
        Size::placeholder()
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Size::Numeric(n) if n.fract() == 0.0 => write!(f, "{}", *n as i64),
            Size::Numeric(n) => write!(f, "{:.1}", n),
            Size::Label(l) => write!(f, "{}", l),
        }
    }
}

/// 適用した3段階割引（%）
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Discounts(pub [f64; 3]);

impl Discounts {
    pub fn new(d1: f64, d2: f64, d3: f64) -> Self {
        Self([d1, d2, d3])
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|d| *d == 0.0)
    }
}

impl fmt::Display for Discounts {
    /// "10+5" 形式（0%は省略）
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .filter(|d| **d > 0.0)
            .map(|d| {
                if d.fract() == 0.0 {
                    format!("{}", *d as i64)
                } else {
                    format!("{}", d)
                }
            })
            .collect();
        if parts.is_empty() {
            write!(f, "0")
        } else {
            write!(f, "{}", parts.join("+"))
        }
    }
}

/// カート明細
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub article: String,

    #[serde(default)]
    pub size: Size,

    pub quantity: u32,

    #[serde(default)]
    pub list_price: f64,

    #[serde(default)]
    pub discounts: Discounts,

    /// 割引後単価（セント丸め済み）
    pub unit_price: f64,

    /// 行合計 = unit_price × quantity
    pub line_total: f64,

    #[serde(default)]
    pub image: String,

    #[serde(default)]
    pub regulatory_note: Option<String>,

    #[serde(default)]
    pub catalog: Option<String>,

    #[serde(default)]
    pub coating: Option<String>,
}

/// 見積ヘッダー
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuoteHeader {
    pub customer: String,
    pub agent: String,
    pub company: String,
    /// 日付（"DD/MM/YYYY"）
    pub date: String,
    pub notes: String,
    pub validity: String,
}

/// 販促ディスプレイ（エスポジトーレ）の差し込み
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplayInsert {
    pub name: String,
    /// URL/ローカルパス
    pub image: String,
    pub note: String,
}

/// 見積ドラフト（セッション保存用）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuoteDraft {
    pub header: QuoteHeader,
    pub lines: Vec<CartLine>,
    pub displays: Vec<DisplayInsert>,
}
