//! 価格表モジュール
//!
//! スプレッドシートの見出しを正規化し、行を CatalogRow に変換する。
//! ファイル読み込み（calamine）はCLI側で行い、ここでは表データのみ扱う。

use crate::error::{Error, Result};
use crate::types::CatalogRow;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const COL_ARTICLE: &str = "ARTICOLO";
pub const COL_SIZE_RANGE: &str = "RANGE TAGLIE";
pub const COL_LIST_PRICE: &str = "LISTINO";
pub const COL_IMAGE: &str = "IMMAGINE";
pub const COL_COATING: &str = "RIVESTIMENTO";
pub const COL_BOX_QUANTITY: &str = "PZ CONFEZIONE";
pub const COL_REGULATORY: &str = "NORMATIVA";

/// 列名エイリアス（正規化後 → 標準名）
const COLUMN_ALIASES: &[(&str, &str)] = &[
    ("MODELLO", COL_ARTICLE),
    ("TAGLIE", COL_SIZE_RANGE),
    ("RANGE TAGLIA", COL_SIZE_RANGE),
    ("PREZZO", COL_LIST_PRICE),
    ("PREZZO LISTINO", COL_LIST_PRICE),
    ("LISTINO EURO", COL_LIST_PRICE),
    ("FOTO", COL_IMAGE),
    ("URL IMMAGINE", COL_IMAGE),
    ("LINK IMMAGINE", COL_IMAGE),
    ("Q.TA BOX", COL_BOX_QUANTITY),
    ("PZ BOX", COL_BOX_QUANTITY),
    ("CONFEZIONE", COL_BOX_QUANTITY),
    ("PEZZI CONFEZIONE", COL_BOX_QUANTITY),
    ("NORMA", COL_REGULATORY),
    ("CERTIFICAZIONE", COL_REGULATORY),
];

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// セル値（読み込み元に依存しない表現）
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    /// 表示用文字列（整数値の数値は小数点なし）
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) if n.fract() == 0.0 => format!("{}", *n as i64),
            Cell::Number(n) => n.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }
}

/// 列名を正規化
///
/// 前後空白除去・大文字化・連続空白の圧縮・末尾の "." ":" 除去の後、
/// エイリアスを標準名に置き換える
pub fn normalize_column_name(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    let collapsed = WHITESPACE.replace_all(&upper, " ");
    let name = collapsed.trim_end_matches(['.', ':']).trim().to_string();

    COLUMN_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(name)
}

/// 価格文字列をパース
///
/// "12,50" / "12.50" / "€ 1.234,50" / "1,234.50" に対応
pub fn parse_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',' || *c == '-')
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    let last_dot = cleaned.rfind('.');
    let last_comma = cleaned.rfind(',');

    let normalized = match (last_dot, last_comma) {
        // 両方ある場合は後ろが小数点
        (Some(d), Some(c)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (None, Some(_)) => cleaned.replace(',', "."),
        // 「1.234」「1.234.567」は桁区切り
        (Some(_), None) if is_dot_grouped(&cleaned) => cleaned.replace('.', ""),
        _ => cleaned,
    };

    normalized.parse::<f64>().ok().filter(|p| p.is_finite())
}

/// 先頭1〜3桁、以降すべて「.」+ 3桁
fn is_dot_grouped(s: &str) -> bool {
    let mut groups = s.trim_start_matches('-').split('.');
    let head_ok = groups
        .next()
        .is_some_and(|head| (1..=3).contains(&head.len()));
    let mut rest = groups.peekable();
    head_ok && rest.peek().is_some() && rest.all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit()))
}

fn cell_price(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Number(n) => Some(*n),
        Cell::Text(s) => parse_price(s),
        Cell::Empty => None,
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

/// 読み込み済み価格表
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    /// 価格表タグ
    pub tag: String,
    /// 正規化済み列名
    pub columns: Vec<String>,
    pub rows: Vec<CatalogRow>,
    /// パースできずスキップした行数
    #[serde(default)]
    pub skipped_rows: usize,
}

impl Catalog {
    /// 見出し行とデータ行から構築
    pub fn from_table(tag: &str, header: &[Cell], data: &[Vec<Cell>]) -> Result<Self> {
        let columns: Vec<String> = header
            .iter()
            .map(|c| normalize_column_name(&c.as_text()))
            .collect();

        let index_of = |name: &str| columns.iter().position(|c| c == name);

        let article_idx = index_of(COL_ARTICLE)
            .ok_or_else(|| Error::MissingColumn(COL_ARTICLE.to_string()))?;
        let price_idx = index_of(COL_LIST_PRICE)
            .ok_or_else(|| Error::MissingColumn(COL_LIST_PRICE.to_string()))?;
        let size_idx = index_of(COL_SIZE_RANGE);
        let image_idx = index_of(COL_IMAGE);
        let coating_idx = index_of(COL_COATING);
        let box_idx = index_of(COL_BOX_QUANTITY);
        let regulatory_idx = index_of(COL_REGULATORY);

        let known = [
            Some(article_idx),
            Some(price_idx),
            size_idx,
            image_idx,
            coating_idx,
            box_idx,
            regulatory_idx,
        ];

        let empty = Cell::Empty;
        let mut rows = Vec::new();
        let mut skipped_rows = 0;

        for record in data {
            let get = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or(&empty);

            let article = get(Some(article_idx)).as_text();
            if article.is_empty() {
                continue;
            }

            let Some(list_price) = cell_price(get(Some(price_idx))).filter(|p| *p >= 0.0) else {
                skipped_rows += 1;
                continue;
            };

            let extra: BTreeMap<String, String> = columns
                .iter()
                .enumerate()
                .filter(|(i, name)| !known.contains(&Some(*i)) && !name.is_empty())
                .filter_map(|(i, name)| {
                    let value = record.get(i)?.as_text();
                    non_empty(value).map(|v| (name.clone(), v))
                })
                .collect();

            rows.push(CatalogRow {
                catalog: tag.to_string(),
                article,
                list_price,
                size_range: get(size_idx).as_text(),
                image: get(image_idx).as_text(),
                coating: non_empty(get(coating_idx).as_text()),
                box_quantity: cell_price(get(box_idx))
                    .filter(|q| *q >= 0.0 && q.fract() == 0.0)
                    .map(|q| q as u32),
                regulatory_note: non_empty(get(regulatory_idx).as_text()),
                extra,
            });
        }

        Ok(Self {
            tag: tag.to_string(),
            columns,
            rows,
            skipped_rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    #[test]
    fn test_normalize_column_name() {
        assert_eq!(normalize_column_name("  articolo "), "ARTICOLO");
        assert_eq!(normalize_column_name("Range   Taglie"), "RANGE TAGLIE");
        assert_eq!(normalize_column_name("Listino:"), "LISTINO");
        assert_eq!(normalize_column_name("Prezzo Listino"), "LISTINO");
        assert_eq!(normalize_column_name("foto"), "IMMAGINE");
        assert_eq!(normalize_column_name("Q.ta box"), "PZ CONFEZIONE");
        assert_eq!(normalize_column_name("Colore"), "COLORE");
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("12,50"), Some(12.5));
        assert_eq!(parse_price("12.50"), Some(12.5));
        assert_eq!(parse_price("€ 1.234,50"), Some(1234.5));
        assert_eq!(parse_price("1,234.50"), Some(1234.5));
        assert_eq!(parse_price("n.d."), None);
        assert_eq!(parse_price("12.5"), Some(12.5));
        assert_eq!(parse_price(""), None);
    }

    #[test]
    fn test_parse_price_dot_thousands() {
        assert_eq!(parse_price("€ 1.234"), Some(1234.0));
        assert_eq!(parse_price("1.234.567"), Some(1_234_567.0));
        assert_eq!(parse_price("-1.500"), Some(-1500.0));
        // 3桁でなければ小数点
        assert_eq!(parse_price("1.23"), Some(1.23));
        assert_eq!(parse_price("1.2345"), Some(1.2345));
        assert_eq!(parse_price("0.50"), Some(0.5));
    }

    #[test]
    fn test_from_table() {
        let header = vec![text("Articolo"), text("Range Taglie"), text("Listino"), text("Immagine"), text("Colore")];
        let data = vec![
            vec![text("ARES S3"), text("38-47"), Cell::Number(59.9), text("http://x/ares.jpg"), text("NERO")],
            vec![Cell::Empty, text("38-47"), Cell::Number(10.0)],
            vec![text("ZEUS S1P"), text("35-48"), text("45,00")],
            vec![text("BROKEN"), text(""), text("n.d.")],
        ];

        let catalog = Catalog::from_table("A", &header, &data).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.skipped_rows, 1);

        let ares = &catalog.rows[0];
        assert_eq!(ares.catalog, "A");
        assert_eq!(ares.size_range, "38-47");
        assert_eq!(ares.image, "http://x/ares.jpg");
        assert_eq!(ares.extra.get("COLORE").map(String::as_str), Some("NERO"));

        let zeus = &catalog.rows[1];
        assert!((zeus.list_price - 45.0).abs() < 1e-9);
        assert!(zeus.image.is_empty());
        assert!(zeus.extra.is_empty());
    }

    #[test]
    fn test_from_table_catalog_specific_fields() {
        let header = vec![text("MODELLO"), text("PREZZO"), text("Rivestimento"), text("PZ BOX"), text("Normativa")];
        let data = vec![vec![
            text("GUANTO NITRILE"),
            Cell::Number(3.2),
            text("NITRILE"),
            Cell::Number(12.0),
            text("EN 388 4121X"),
        ]];

        let catalog = Catalog::from_table("B", &header, &data).unwrap();
        let row = &catalog.rows[0];
        assert_eq!(row.coating.as_deref(), Some("NITRILE"));
        assert_eq!(row.box_quantity, Some(12));
        assert_eq!(row.regulatory_note.as_deref(), Some("EN 388 4121X"));
    }

    #[test]
    fn test_missing_required_column() {
        let header = vec![text("ARTICOLO"), text("TAGLIE")];
        let err = Catalog::from_table("A", &header, &[]).unwrap_err();
        assert!(matches!(err, Error::MissingColumn(c) if c == "LISTINO"));
    }
}
