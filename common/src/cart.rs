//! 見積カート
//!
//! セッション中の明細を追加順に保持する。永続化はしない
//! （保存が必要な場合は QuoteDraft としてJSONに書き出す）。

use crate::error::{Error, Result};
use crate::pricing::{line_total, net_price, round_cents};
use crate::types::{CartLine, CatalogRow, Discounts, Size};
use serde::{Deserialize, Serialize};

/// 1明細あたりの最大数量
pub const MAX_LINE_QUANTITY: u32 = 99_999;

/// カート
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        Self { lines }
    }

    /// 価格表の行から明細を作成
    pub fn build_line(
        row: &CatalogRow,
        size: Size,
        quantity: u32,
        discounts: Discounts,
    ) -> Result<CartLine> {
        check_quantity(quantity)?;

        let unit_price = net_price(row.list_price, &discounts)?;

        Ok(CartLine {
            article: row.article.clone(),
            size,
            quantity,
            list_price: row.list_price,
            discounts,
            unit_price,
            line_total: line_total(unit_price, quantity),
            image: row.image.clone(),
            regulatory_note: row.regulatory_note.clone(),
            catalog: if row.catalog.is_empty() { None } else { Some(row.catalog.clone()) },
            coating: row.coating.clone(),
        })
    }

    /// 明細を末尾に追加
    pub fn add(&mut self, line: CartLine) -> Result<()> {
        check_quantity(line.quantity)?;
        self.lines.push(line);
        Ok(())
    }

    /// 価格表の行から明細を作成して追加
    pub fn add_row(
        &mut self,
        row: &CatalogRow,
        size: Size,
        quantity: u32,
        discounts: Discounts,
    ) -> Result<&CartLine> {
        let line = Self::build_line(row, size, quantity, discounts)?;
        self.lines.push(line);
        self.lines
            .last()
            .ok_or(Error::LineOutOfRange { index: 0, len: 0 })
    }

    /// 指定行を削除
    pub fn remove(&mut self, index: usize) -> Result<CartLine> {
        if index >= self.lines.len() {
            return Err(Error::LineOutOfRange {
                index,
                len: self.lines.len(),
            });
        }
        Ok(self.lines.remove(index))
    }

    /// 全明細を削除
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<CartLine> {
        self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// 合計金額
    pub fn total(&self) -> f64 {
        round_cents(self.lines.iter().map(|l| l.line_total).sum())
    }

    /// 合計数量
    pub fn total_pieces(&self) -> u64 {
        total_pieces(&self.lines)
    }

    /// モデル単位に集計（PDF用）
    pub fn aggregate_by_model(&self) -> Vec<ModelGroup> {
        aggregate_by_model(&self.lines)
    }
}

fn check_quantity(quantity: u32) -> Result<()> {
    if quantity == 0 || quantity > MAX_LINE_QUANTITY {
        return Err(Error::InvalidQuantity(quantity));
    }
    Ok(())
}

/// 明細の合計数量（読み込んだドラフトは上限を通っていないため u64 で集計）
pub fn total_pieces(lines: &[CartLine]) -> u64 {
    lines.iter().map(|l| u64::from(l.quantity)).sum()
}

/// モデル単位の集計行
#[derive(Debug, Clone, PartialEq)]
pub struct ModelGroup {
    pub article: String,
    pub catalog: Option<String>,
    pub image: String,
    pub regulatory_note: Option<String>,
    pub coating: Option<String>,
    pub list_price: f64,
    pub discounts: Discounts,
    pub unit_price: f64,
    /// サイズ別数量（サイズ順）
    pub sizes: Vec<(Size, u64)>,
    pub quantity: u64,
    pub total: f64,
}

impl ModelGroup {
    /// "38×2  39×4" 形式
    pub fn sizes_label(&self) -> String {
        self.sizes
            .iter()
            .map(|(size, qty)| {
                if size.is_placeholder() {
                    format!("{}", qty)
                } else {
                    format!("{}x{}", size, qty)
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
    }
}

/// 明細を (価格表, 品番, 単価) でまとめる。初出順を保持する。
pub fn aggregate_by_model(lines: &[CartLine]) -> Vec<ModelGroup> {
    let mut groups: Vec<ModelGroup> = Vec::new();

    for line in lines {
        let quantity = u64::from(line.quantity);
        let existing = groups.iter().position(|g| {
            g.article == line.article
                && g.catalog == line.catalog
                && (g.unit_price - line.unit_price).abs() < 0.005
        });

        match existing {
            Some(idx) => {
                let group = &mut groups[idx];
                match group.sizes.iter_mut().find(|(s, _)| *s == line.size) {
                    Some((_, qty)) => *qty += quantity,
                    None => group.sizes.push((line.size.clone(), quantity)),
                }
                group.quantity += quantity;
                group.total = round_cents(group.total + line.line_total);
                if group.image.is_empty() {
                    group.image = line.image.clone();
                }
            }
            None => groups.push(ModelGroup {
                article: line.article.clone(),
                catalog: line.catalog.clone(),
                image: line.image.clone(),
                regulatory_note: line.regulatory_note.clone(),
                coating: line.coating.clone(),
                list_price: line.list_price,
                discounts: line.discounts,
                unit_price: line.unit_price,
                sizes: vec![(line.size.clone(), quantity)],
                quantity,
                total: line.line_total,
            }),
        }
    }

    for group in &mut groups {
        group
            .sizes
            .sort_by(|a, b| a.0.sort_key().total_cmp(&b.0.sort_key()));
    }

    groups
}
