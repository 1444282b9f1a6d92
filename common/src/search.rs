//! 品番検索（部分一致）

use crate::catalog::Catalog;
use crate::types::CatalogRow;

/// 検索条件
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub text: String,
    /// 価格表タグで絞り込み
    pub catalog: Option<String>,
    /// 最大件数（None = 無制限）
    pub limit: Option<usize>,
}

impl SearchQuery {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Default::default()
        }
    }
}

/// 品番に検索文字列を含む行を返す（大文字小文字を区別しない）
///
/// 空の検索文字列は全行に一致する。結果は価格表の順、行の順のまま。
pub fn search<'a>(catalogs: &'a [Catalog], query: &SearchQuery) -> Vec<&'a CatalogRow> {
    let needle = query.text.trim().to_uppercase();
    let limit = query.limit.unwrap_or(usize::MAX);

    catalogs
        .iter()
        .filter(|c| query.catalog.as_ref().map_or(true, |tag| c.tag.eq_ignore_ascii_case(tag)))
        .flat_map(|c| c.rows.iter())
        .filter(|row| row.article.to_uppercase().contains(&needle))
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(tag: &str, articles: &[&str]) -> Catalog {
        Catalog {
            tag: tag.to_string(),
            columns: vec![],
            rows: articles
                .iter()
                .map(|a| CatalogRow {
                    catalog: tag.to_string(),
                    article: a.to_string(),
                    list_price: 10.0,
                    ..Default::default()
                })
                .collect(),
            skipped_rows: 0,
        }
    }

    fn names(rows: &[&CatalogRow]) -> Vec<String> {
        rows.iter().map(|r| format!("{}:{}", r.catalog, r.article)).collect()
    }

    #[test]
    fn test_partial_case_insensitive() {
        let catalogs = vec![catalog("A", &["ARES S3", "Zeus S1P", "ZEUS LOW"])];
        let found = search(&catalogs, &SearchQuery::new(" zeus"));
        assert_eq!(names(&found), vec!["A:Zeus S1P", "A:ZEUS LOW"]);
    }

    #[test]
    fn test_empty_query_matches_all() {
        let catalogs = vec![catalog("A", &["ARES", "ZEUS"]), catalog("B", &["GUANTO"])];
        assert_eq!(search(&catalogs, &SearchQuery::new("")).len(), 3);
    }

    #[test]
    fn test_order_across_catalogs() {
        let catalogs = vec![catalog("A", &["S3 ARES"]), catalog("B", &["S3 GUANTO", "S3 BOOT"])];
        let found = search(&catalogs, &SearchQuery::new("s3"));
        assert_eq!(names(&found), vec!["A:S3 ARES", "B:S3 GUANTO", "B:S3 BOOT"]);
    }

    #[test]
    fn test_catalog_filter_and_limit() {
        let catalogs = vec![catalog("A", &["S3 ARES"]), catalog("B", &["S3 GUANTO", "S3 BOOT"])];
        let query = SearchQuery {
            text: "S3".into(),
            catalog: Some("b".into()),
            limit: Some(1),
        };
        assert_eq!(names(&search(&catalogs, &query)), vec!["B:S3 GUANTO"]);
    }

    #[test]
    fn test_no_match() {
        let catalogs = vec![catalog("A", &["ARES"])];
        assert!(search(&catalogs, &SearchQuery::new("XYZ")).is_empty());
    }
}
