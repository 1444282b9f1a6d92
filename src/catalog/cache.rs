//! 価格表キャッシュモジュール
//!
//! スプレッドシートの内容ハッシュ（SHA-256）をキーにパース結果を保存し、
//! ファイルが変わるまで再パースをスキップする。

use crate::error::Result;
use preventivo_common::Catalog;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

const CACHE_SUFFIX: &str = ".preventivo-cache.json";

/// キャッシュファイルの構造
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogCache {
    /// バージョン（互換性チェック用）
    version: u32,
    /// ファイル内容 + シート名のハッシュ
    fingerprint: String,
    catalog: Option<Catalog>,
}

impl CatalogCache {
    const CURRENT_VERSION: u32 = 1;

    pub fn new(fingerprint: String, catalog: Catalog) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            fingerprint,
            catalog: Some(catalog),
        }
    }

    /// キャッシュファイルを読み込み（壊れていれば空）
    pub fn load(spreadsheet: &Path) -> Self {
        let path = cache_path(spreadsheet);
        if !path.exists() {
            return Self::default();
        }

        let file = match File::open(&path) {
            Ok(f) => f,
            Err(_) => return Self::default(),
        };

        match serde_json::from_reader::<_, CatalogCache>(BufReader::new(file)) {
            Ok(cache) if cache.version == Self::CURRENT_VERSION => cache,
            Ok(_) => {
                tracing::info!(path = %path.display(), "キャッシュバージョン不一致、再生成します");
                Self::default()
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "キャッシュを読めません");
                Self::default()
            }
        }
    }

    /// キャッシュファイルを保存
    pub fn save(&self, spreadsheet: &Path) -> Result<()> {
        let file = File::create(cache_path(spreadsheet))?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    /// 指紋が一致する場合のみ価格表を返す
    pub fn into_matching(self, fingerprint: &str) -> Option<Catalog> {
        if self.fingerprint == fingerprint {
            self.catalog
        } else {
            None
        }
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// キャッシュ済み行数
    pub fn len(&self) -> usize {
        self.catalog.as_ref().map_or(0, |c| c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            fingerprint: String::new(),
            catalog: None,
        }
    }
}

/// スプレッドシートと同じフォルダの隠しファイル
pub fn cache_path(spreadsheet: &Path) -> PathBuf {
    let file_name = spreadsheet
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "catalog".to_string());
    spreadsheet.with_file_name(format!(".{}{}", file_name, CACHE_SUFFIX))
}

/// キャッシュを削除（存在しなければ false）
pub fn clear_cache(spreadsheet: &Path) -> Result<bool> {
    let path = cache_path(spreadsheet);
    if path.exists() {
        std::fs::remove_file(path)?;
        Ok(true)
    } else {
        Ok(false)
    }
}

/// ファイル内容とシート名の SHA-256
pub fn compute_fingerprint(spreadsheet: &Path, sheet: Option<&str>) -> Result<String> {
    let mut file = File::open(spreadsheet)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    hasher.update(sheet.unwrap_or("").as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use preventivo_common::CatalogRow;
    use tempfile::tempdir;

    fn sample_catalog() -> Catalog {
        Catalog {
            tag: "A".into(),
            columns: vec!["ARTICOLO".into(), "LISTINO".into()],
            rows: vec![CatalogRow {
                catalog: "A".into(),
                article: "ARES".into(),
                list_price: 10.0,
                ..Default::default()
            }],
            skipped_rows: 0,
        }
    }

    #[test]
    fn test_cache_path() {
        let path = cache_path(Path::new("/tmp/listini/listino_agente.xlsx"));
        assert_eq!(path, PathBuf::from("/tmp/listini/.listino_agente.xlsx.preventivo-cache.json"));
    }

    #[test]
    fn test_fingerprint_changes_with_content_and_sheet() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("listino.xlsx");
        std::fs::write(&file, b"v1").unwrap();

        let a = compute_fingerprint(&file, None).unwrap();
        let b = compute_fingerprint(&file, Some("Foglio2")).unwrap();
        std::fs::write(&file, b"v2").unwrap();
        let c = compute_fingerprint(&file, None).unwrap();

        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_save_load_and_invalidate() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("listino.xlsx");
        std::fs::write(&file, b"data").unwrap();

        CatalogCache::new("abc".into(), sample_catalog()).save(&file).unwrap();

        let loaded = CatalogCache::load(&file);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.fingerprint(), "abc");
        assert!(CatalogCache::load(&file).into_matching("other").is_none());
        assert!(CatalogCache::load(&file).into_matching("abc").is_some());

        assert!(clear_cache(&file).unwrap());
        assert!(!clear_cache(&file).unwrap());
        assert!(CatalogCache::load(&file).is_empty());
    }

    #[test]
    fn test_corrupt_cache_ignored() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("listino.xlsx");
        std::fs::write(cache_path(&file), "{ not json").unwrap();
        assert!(CatalogCache::load(&file).is_empty());
    }
}
