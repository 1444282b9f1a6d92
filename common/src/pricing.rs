//! 価格計算モジュール
//!
//! 3段階のカスケード割引:
//! net = list × (1 − d1) × (1 − d2) × (1 − d3)

use crate::error::{Error, Result};
use crate::types::Discounts;

/// セント単位に丸め（0.5は0から遠い方へ）
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 割引率の検証（0〜100%）
pub fn validate_discount(percent: f64) -> Result<f64> {
    if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
        return Err(Error::InvalidDiscount(percent));
    }
    Ok(percent)
}

/// カスケード割引後の単価（丸めなし）
pub fn net_price_exact(list_price: f64, discounts: &Discounts) -> Result<f64> {
    if !list_price.is_finite() || list_price < 0.0 {
        return Err(Error::InvalidPrice(list_price.to_string()));
    }

    discounts.0.iter().try_fold(list_price, |price, d| {
        let d = validate_discount(*d)?;
        Ok(price * (1.0 - d / 100.0))
    })
}

/// カスケード割引後の単価（セント丸め）
pub fn net_price(list_price: f64, discounts: &Discounts) -> Result<f64> {
    net_price_exact(list_price, discounts).map(round_cents)
}

/// 行合計
pub fn line_total(unit_price: f64, quantity: u32) -> f64 {
    round_cents(unit_price * quantity as f64)
}

/// 3段階割引の合成割引率（%）
pub fn effective_discount(discounts: &Discounts) -> Result<f64> {
    let factor = net_price_exact(1.0, discounts)?;
    Ok(round_cents((1.0 - factor) * 100.0))
}
