use crate::cli::PdfQuality;
use crate::error::{PreventivoError, Result};
use preventivo_common::layout::DEFAULT_LOGO_WIDTH_MM;
use preventivo_common::{Discounts, DisplayInsert};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 設定ファイルの場所を上書きする環境変数
pub const CONFIG_ENV: &str = "PREVENTIVO_CONFIG";

/// 登録済み価格表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSource {
    pub path: PathBuf,
    /// 価格表タグ（見積書に表示）
    pub tag: String,
    /// シート名（省略時は先頭シート）
    #[serde(default)]
    pub sheet: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub agent: String,
    pub company: String,
    pub logo: Option<PathBuf>,
    pub logo_width_mm: f32,
    pub default_discounts: Discounts,
    pub catalogs: Vec<CatalogSource>,
    pub displays: Vec<DisplayInsert>,
    pub pdf_quality: PdfQuality,
    pub title: String,
    pub validity: String,
    pub image_cache: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            agent: String::new(),
            company: String::new(),
            logo: None,
            logo_width_mm: DEFAULT_LOGO_WIDTH_MM,
            default_discounts: Discounts::default(),
            catalogs: Vec::new(),
            displays: Vec::new(),
            pdf_quality: PdfQuality::default(),
            title: "Preventivo".into(),
            validity: "Validità offerta: 30 giorni".into(),
            image_cache: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            tracing::debug!(path = %config_path.display(), "設定を読み込みました");
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        // 環境変数を優先
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }

        let home = dirs::home_dir()
            .ok_or_else(|| PreventivoError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("preventivo").join("config.json"))
    }

    /// 画像キャッシュディレクトリ（無効時はNone）
    pub fn image_cache_dir(&self) -> Option<PathBuf> {
        if !self.image_cache {
            return None;
        }
        dirs::cache_dir().map(|d| d.join("preventivo").join("images"))
    }

    /// 価格表を登録（同じパスは置き換え）。タグ省略時は未使用の A, B, C... を割り当てる
    pub fn add_catalog(&mut self, path: PathBuf, tag: Option<String>, sheet: Option<String>) -> CatalogSource {
        self.catalogs.retain(|c| c.path != path);
        let tag = tag.unwrap_or_else(|| free_tag(&self.catalogs));
        let source = CatalogSource { path, tag, sheet };
        self.catalogs.push(source.clone());
        source
    }

    pub fn set_default_discounts(&mut self, values: &[f64]) -> Result<()> {
        self.default_discounts = discounts_from_values(values)?;
        Ok(())
    }
}

/// 最大3段階の割引率を検証して組み立てる（不足分は0）
pub fn discounts_from_values(values: &[f64]) -> Result<Discounts> {
    if values.len() > 3 {
        return Err(PreventivoError::Config(format!(
            "割引は最大3段階です（{}個指定）",
            values.len()
        )));
    }
    let mut discounts = [0.0; 3];
    for (slot, value) in discounts.iter_mut().zip(values) {
        *slot = preventivo_common::pricing::validate_discount(*value)?;
    }
    Ok(Discounts(discounts))
}

/// 登録済みの価格表と重複しない最初のタグ
pub fn free_tag(catalogs: &[CatalogSource]) -> String {
    (0..)
        .map(next_tag)
        .find(|tag| !catalogs.iter().any(|c| c.tag.eq_ignore_ascii_case(tag)))
        .unwrap_or_default()
}

/// 0 → "A", 1 → "B", ... 25 → "Z", 26 → "AA"
pub fn next_tag(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push((b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    letters.iter().rev().collect()
}
