//! Preventivo Common Library
//!
//! 価格表・割引計算・カート・レイアウト計算など、描画やファイル形式に
//! 依存しない部分

pub mod types;
pub mod layout;
pub mod error;
pub mod catalog;
pub mod search;
pub mod sizes;
pub mod pricing;
pub mod cart;
pub mod export;

pub use types::{CartLine, CatalogRow, Discounts, DisplayInsert, QuoteDraft, QuoteHeader, Size};
pub use layout::QuoteLayout;
pub use catalog::{normalize_column_name, Catalog, Cell};
pub use search::{search, SearchQuery};
pub use sizes::parse_size_range;
pub use pricing::net_price;
pub use cart::{Cart, ModelGroup};
pub use error::{Error, Result};
