use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "preventivo")]
#[command(about = "安全靴・保護具の見積書作成ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// 価格表の指定（全コマンド共通）
#[derive(clap::Args, Debug, Clone, Default)]
pub struct CatalogArgs {
    /// 価格表ファイル（複数指定可、省略時は設定の価格表）
    #[arg(short, long = "catalog")]
    pub catalogs: Vec<PathBuf>,

    /// 価格表キャッシュを使わずに再読み込み
    #[arg(long)]
    pub no_cache: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 対話式で見積を作成
    Session {
        #[command(flatten)]
        catalogs: CatalogArgs,

        /// 顧客名
        #[arg(long)]
        customer: Option<String>,

        /// 既存ドラフト（JSON）から再開
        #[arg(long)]
        resume: Option<PathBuf>,

        /// 終了時にドラフトを保存するファイル
        #[arg(long)]
        save: Option<PathBuf>,

        /// 出力ファイル/ディレクトリ
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 品番を検索
    Search {
        /// 品番（部分一致）
        #[arg(required = true)]
        query: String,

        #[command(flatten)]
        catalogs: CatalogArgs,

        /// 価格表タグで絞り込み
        #[arg(long)]
        tag: Option<String>,

        /// 最大表示件数
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// 割引後価格を計算
    Price {
        /// 定価
        #[arg(required = true)]
        list_price: f64,

        /// 割引率（%）最大3つ、例: -d 10 -d 5
        #[arg(short, long = "discount")]
        discounts: Vec<f64>,

        /// 数量
        #[arg(short, long, default_value = "1")]
        quantity: u32,
    },

    /// ドラフト（JSON）からPDF/Excelを生成
    Export {
        /// 入力JSONファイル
        #[arg(required = true)]
        input: PathBuf,

        /// 出力形式 (pdf/excel/both)
        #[arg(short, long, default_value = "pdf")]
        format: ExportFormat,

        /// 出力ファイル/ディレクトリ
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// ドキュメントタイトル
        #[arg(short, long)]
        title: Option<String>,

        /// PDF画像品質 (high/medium/low)
        #[arg(long)]
        pdf_quality: Option<PdfQuality>,

        /// 販促ディスプレイ（設定の名前、複数指定可）
        #[arg(long = "display")]
        displays: Vec<String>,
    },

    /// フォルダ内の価格表を一覧表示
    Catalogs {
        /// 対象フォルダ（省略時はカレント）
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// 設定を表示/編集
    Config {
        /// 担当者名を設定
        #[arg(long)]
        set_agent: Option<String>,

        /// 会社名を設定
        #[arg(long)]
        set_company: Option<String>,

        /// ロゴ画像を設定
        #[arg(long)]
        set_logo: Option<PathBuf>,

        /// ロゴ幅（mm）を設定
        #[arg(long)]
        set_logo_width: Option<f32>,

        /// 既定の割引率を設定（最大3つ）
        #[arg(long, num_args = 1..=3)]
        set_discounts: Option<Vec<f64>>,

        /// 価格表を登録
        #[arg(long)]
        add_catalog: Option<PathBuf>,

        /// 登録する価格表のタグ
        #[arg(long, requires = "add_catalog")]
        tag: Option<String>,

        /// 登録する価格表のシート名
        #[arg(long, requires = "add_catalog")]
        sheet: Option<String>,

        /// 販促ディスプレイを追加（名前）
        #[arg(long)]
        add_display: Option<String>,

        /// 販促ディスプレイの画像（URL/パス）
        #[arg(long, requires = "add_display")]
        display_image: Option<String>,

        /// 販促ディスプレイの説明
        #[arg(long, requires = "add_display")]
        display_note: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },

    /// キャッシュ管理
    Cache {
        /// キャッシュを削除
        #[arg(long)]
        clear: bool,

        #[command(flatten)]
        catalogs: CatalogArgs,

        /// キャッシュ情報を表示
        #[arg(long)]
        info: bool,
    },
}

#[derive(Clone, Debug, Default)]
pub enum ExportFormat {
    #[default]
    Pdf,
    Excel,
    Both,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pdf" => Ok(ExportFormat::Pdf),
            "excel" | "xlsx" => Ok(ExportFormat::Excel),
            "both" => Ok(ExportFormat::Both),
            _ => Err(format!("Unknown format: {}. Use pdf, excel, or both", s)),
        }
    }
}

/// PDF画像品質設定
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfQuality {
    /// 高品質: 1200px, 85%
    High,
    /// 中品質: 700px, 75%（デフォルト）
    #[default]
    Medium,
    /// 低品質: 400px, 60%
    Low,
}

impl PdfQuality {
    /// 最大ピクセル幅
    pub fn max_width(&self) -> u32 {
        match self {
            PdfQuality::High => 1200,
            PdfQuality::Medium => 700,
            PdfQuality::Low => 400,
        }
    }

    /// JPEG品質 (0-100)
    pub fn jpeg_quality(&self) -> u8 {
        match self {
            PdfQuality::High => 85,
            PdfQuality::Medium => 75,
            PdfQuality::Low => 60,
        }
    }
}

impl std::str::FromStr for PdfQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high" | "h" => Ok(PdfQuality::High),
            "medium" | "med" | "m" => Ok(PdfQuality::Medium),
            "low" | "l" => Ok(PdfQuality::Low),
            _ => Err(format!("Unknown quality: {}. Use high, medium, or low", s)),
        }
    }
}

impl std::fmt::Display for PdfQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PdfQuality::High => write!(f, "high"),
            PdfQuality::Medium => write!(f, "medium"),
            PdfQuality::Low => write!(f, "low"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_price_command() {
        let cli = Cli::parse_from(["preventivo", "price", "100", "-d", "10", "-d", "5", "-q", "3"]);
        match cli.command {
            Commands::Price { list_price, discounts, quantity } => {
                assert_eq!(list_price, 100.0);
                assert_eq!(discounts, vec![10.0, 5.0]);
                assert_eq!(quantity, 3);
            }
            _ => panic!("price以外のコマンド"),
        }
    }

    #[test]
    fn test_parse_search_with_catalogs() {
        let cli = Cli::parse_from(["preventivo", "search", "ares", "-c", "a.xlsx", "-c", "b.xlsx"]);
        match cli.command {
            Commands::Search { query, catalogs, limit, .. } => {
                assert_eq!(query, "ares");
                assert_eq!(catalogs.catalogs.len(), 2);
                assert_eq!(limit, 20);
            }
            _ => panic!("search以外のコマンド"),
        }
    }

    #[test]
    fn test_format_and_quality_parse() {
        assert!(matches!("xlsx".parse::<ExportFormat>(), Ok(ExportFormat::Excel)));
        assert!("doc".parse::<ExportFormat>().is_err());
        assert_eq!("H".parse::<PdfQuality>(), Ok(PdfQuality::High));
        assert_eq!(PdfQuality::Low.to_string(), "low");
    }
}
