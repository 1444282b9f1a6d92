mod cache;
mod discover;

pub use cache::{cache_path, clear_cache, compute_fingerprint, CatalogCache};
pub use discover::{list_spreadsheets, SPREADSHEET_EXTENSIONS};

use crate::config::{free_tag, CatalogSource, Config};
use crate::error::{PreventivoError, Result};
use crate::images::ImageSource;
use calamine::{open_workbook_auto, Data, Reader};
use preventivo_common::catalog::COL_ARTICLE;
use preventivo_common::{normalize_column_name, Catalog, Cell};
use std::path::{Path, PathBuf};

/// 見出し行を探す範囲（先頭のタイトル行などを読み飛ばす）
const HEADER_SEARCH_ROWS: usize = 10;

fn to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::String(s) => Cell::Text(s.clone()),
        other => Cell::Text(other.to_string()),
    }
}

/// ARTICOLO 列を含む最初の行を見出しとする（なければ先頭行）
fn find_header_row(rows: &[Vec<Cell>]) -> usize {
    rows.iter()
        .take(HEADER_SEARCH_ROWS)
        .position(|row| {
            row.iter()
                .any(|c| normalize_column_name(&c.as_text()) == COL_ARTICLE)
        })
        .unwrap_or(0)
}

/// スプレッドシートを読み込んで表データに変換（キャッシュなし）
///
/// IMMAGINE 列の相対パスはスプレッドシートのフォルダを基準に絶対パスへ変換する。
pub fn read_catalog(path: &Path, tag: &str, sheet: Option<&str>) -> Result<Catalog> {
    let mut catalog = read_table(path, tag, sheet)?;
    resolve_image_paths(&mut catalog, path)?;
    Ok(catalog)
}

/// 画像参照は価格表に書かれたまま（キャッシュにはこの形で保存する）
fn read_table(path: &Path, tag: &str, sheet: Option<&str>) -> Result<Catalog> {
    if !path.exists() {
        return Err(PreventivoError::FileNotFound(path.display().to_string()));
    }

    let mut workbook = open_workbook_auto(path)?;
    let range = match sheet {
        Some(name) => workbook.worksheet_range(name)?,
        None => workbook.worksheet_range_at(0).ok_or_else(|| {
            PreventivoError::Spreadsheet(format!("シートがありません: {}", path.display()))
        })??,
    };

    let rows: Vec<Vec<Cell>> = range
        .rows()
        .map(|row| row.iter().map(to_cell).collect())
        .collect();

    if rows.is_empty() {
        return Ok(Catalog {
            tag: tag.to_string(),
            ..Default::default()
        });
    }

    let header_idx = find_header_row(&rows);
    let catalog = Catalog::from_table(tag, &rows[header_idx], &rows[header_idx + 1..])?;

    if catalog.skipped_rows > 0 {
        tracing::warn!(
            path = %path.display(),
            skipped = catalog.skipped_rows,
            "価格を読み取れない行をスキップしました"
        );
    }
    tracing::debug!(path = %path.display(), rows = catalog.len(), tag, "価格表を読み込みました");

    Ok(catalog)
}

/// 価格表を読み込み（キャッシュ有効時はファイルが変わっていなければキャッシュを使う）
pub fn load_catalog(source: &CatalogSource, use_cache: bool) -> Result<Catalog> {
    let path = &source.path;
    if !path.exists() {
        return Err(PreventivoError::FileNotFound(path.display().to_string()));
    }

    let sheet = source.sheet.as_deref();
    let fingerprint = compute_fingerprint(path, sheet)?;

    if use_cache {
        if let Some(mut cached) = CatalogCache::load(path).into_matching(&fingerprint) {
            tracing::debug!(path = %path.display(), "価格表キャッシュを使用");
            retag(&mut cached, &source.tag);
            resolve_image_paths(&mut cached, path)?;
            return Ok(cached);
        }
    }

    let mut catalog = read_table(path, &source.tag, sheet)?;

    if use_cache {
        if let Err(e) = CatalogCache::new(fingerprint, catalog.clone()).save(path) {
            tracing::warn!(path = %path.display(), error = %e, "価格表キャッシュを保存できませんでした");
        }
    }

    resolve_image_paths(&mut catalog, path)?;
    Ok(catalog)
}

/// 相対パスの画像参照をスプレッドシートのフォルダ基準の絶対パスにする（URLはそのまま）
fn resolve_image_paths(catalog: &mut Catalog, spreadsheet: &Path) -> Result<()> {
    let spreadsheet = spreadsheet.canonicalize()?;
    let base_dir = spreadsheet.parent().unwrap_or(Path::new("/"));

    for row in &mut catalog.rows {
        if let ImageSource::Local(image) = ImageSource::parse(&row.image) {
            if image.is_relative() {
                row.image = base_dir.join(image).to_string_lossy().to_string();
            }
        }
    }
    Ok(())
}

fn retag(catalog: &mut Catalog, tag: &str) {
    if catalog.tag != tag {
        catalog.tag = tag.to_string();
        for row in &mut catalog.rows {
            row.catalog = tag.to_string();
        }
    }
}

/// コマンドライン指定 → 設定の順で価格表の一覧を決定
pub fn resolve_sources(cli_paths: &[PathBuf], config: &Config) -> Result<Vec<CatalogSource>> {
    if !cli_paths.is_empty() {
        // 登録済みならタグ・シートを引き継ぐ
        let registered: Vec<Option<CatalogSource>> = cli_paths
            .iter()
            .map(|path| config.catalogs.iter().find(|c| &c.path == path).cloned())
            .collect();
        let mut taken: Vec<CatalogSource> = registered.iter().flatten().cloned().collect();

        let mut sources = Vec::with_capacity(cli_paths.len());
        for (path, found) in cli_paths.iter().zip(registered) {
            let source = match found {
                Some(source) => source,
                None => {
                    let source = CatalogSource {
                        path: path.clone(),
                        tag: free_tag(&taken),
                        sheet: None,
                    };
                    taken.push(source.clone());
                    source
                }
            };
            sources.push(source);
        }
        return Ok(sources);
    }

    if config.catalogs.is_empty() {
        return Err(PreventivoError::NoCatalog);
    }
    Ok(config.catalogs.clone())
}

/// 全価格表を読み込み
pub fn load_all(sources: &[CatalogSource], use_cache: bool) -> Result<Vec<Catalog>> {
    sources.iter().map(|s| load_catalog(s, use_cache)).collect()
}
