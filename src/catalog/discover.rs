use crate::error::{PreventivoError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "ods"];

fn is_spreadsheet(path: &Path) -> bool {
    // Excelのロックファイル（~$xxx.xlsx）は除外
    let locked = path
        .file_name()
        .map(|n| n.to_string_lossy().starts_with("~$"))
        .unwrap_or(false);

    !locked
        && path
            .extension()
            .map(|e| {
                let ext = e.to_string_lossy().to_lowercase();
                SPREADSHEET_EXTENSIONS.contains(&ext.as_str())
            })
            .unwrap_or(false)
}

/// フォルダ直下の価格表ファイル一覧（ファイル名順）
pub fn list_spreadsheets(folder: &Path) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        return Err(PreventivoError::FolderNotFound(folder.display().to_string()));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(folder)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_spreadsheet(p))
        .collect();

    files.sort();
    Ok(files)
}
