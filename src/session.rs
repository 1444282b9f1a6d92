//! 対話式見積作成モジュール
//!
//! 検索 → サイズ → 数量 → 割引 → カート追加を繰り返し、最後にPDF/Excelを出力する。
//! 状態（QuoteSession）と入力プロンプトを分離している。

use crate::error::{PreventivoError, Result};
use crate::export::{export_draft, ExportSettings};
use crate::images::ImageFetcher;
use dialoguer::{Confirm, Input, MultiSelect, Select};
use preventivo_common::cart::MAX_LINE_QUANTITY;
use preventivo_common::export::pdf_core::format_currency;
use preventivo_common::pricing::{net_price, validate_discount};
use preventivo_common::sizes::parse_size_range;
use preventivo_common::{
    search, Cart, CartLine, Catalog, CatalogRow, Discounts, DisplayInsert, QuoteDraft, QuoteHeader,
    SearchQuery, Size,
};
use std::path::{Path, PathBuf};

/// 検索結果の最大表示件数
pub const SEARCH_LIMIT: usize = 30;

/// 見積セッションの状態
#[derive(Debug, Clone)]
pub struct QuoteSession {
    catalogs: Vec<Catalog>,
    pub cart: Cart,
    pub header: QuoteHeader,
    pub default_discounts: Discounts,
    /// 見積書に差し込む販促ディスプレイ
    pub displays: Vec<DisplayInsert>,
}

impl QuoteSession {
    pub fn new(catalogs: Vec<Catalog>, header: QuoteHeader, default_discounts: Discounts) -> Self {
        Self {
            catalogs,
            cart: Cart::new(),
            header,
            default_discounts,
            displays: Vec::new(),
        }
    }

    /// 保存済みドラフトから再開
    pub fn from_draft(catalogs: Vec<Catalog>, draft: QuoteDraft, default_discounts: Discounts) -> Self {
        Self {
            catalogs,
            cart: Cart::from_lines(draft.lines),
            header: draft.header,
            default_discounts,
            displays: draft.displays,
        }
    }

    pub fn catalogs(&self) -> &[Catalog] {
        &self.catalogs
    }

    pub fn search(&self, text: &str) -> Vec<&CatalogRow> {
        let query = SearchQuery {
            text: text.to_string(),
            catalog: None,
            limit: Some(SEARCH_LIMIT),
        };
        search(&self.catalogs, &query)
    }

    /// 明細を追加
    pub fn add(&mut self, row: &CatalogRow, size: Size, quantity: u32, discounts: Discounts) -> Result<&CartLine> {
        Ok(self.cart.add_row(row, size, quantity, discounts)?)
    }

    pub fn remove(&mut self, index: usize) -> Result<CartLine> {
        Ok(self.cart.remove(index)?)
    }

    pub fn clear(&mut self) {
        self.cart.clear();
    }

    pub fn to_draft(&self) -> QuoteDraft {
        QuoteDraft {
            header: self.header.clone(),
            lines: self.cart.lines().to_vec(),
            displays: self.displays.clone(),
        }
    }

    /// カート表示用の行
    pub fn summary_lines(&self) -> Vec<String> {
        self.cart
            .lines()
            .iter()
            .enumerate()
            .map(|(i, line)| format_cart_line(i, line))
            .collect()
    }
}

/// 検索結果の表示
pub fn format_row(row: &CatalogRow) -> String {
    let sizes = if row.size_range.is_empty() { "-" } else { row.size_range.as_str() };
    format!(
        "[{}] {}  {}  (taglie {})",
        row.catalog,
        row.article,
        format_currency(row.list_price),
        sizes
    )
}

/// カート明細の表示
pub fn format_cart_line(index: usize, line: &CartLine) -> String {
    let tag = line
        .catalog
        .as_ref()
        .map(|t| format!("[{}] ", t))
        .unwrap_or_default();
    format!(
        "{}. {}{}  tg {}  x{}  {} = {}",
        index + 1,
        tag,
        line.article,
        line.size,
        line.quantity,
        format_currency(line.unit_price),
        format_currency(line.line_total)
    )
}

/// 今日の日付（DD/MM/YYYY）
pub fn today() -> String {
    chrono::Local::now().format("%d/%m/%Y").to_string()
}

/// セッション終了時の設定
pub struct SessionSettings {
    pub export: ExportSettings,
    pub save: Option<PathBuf>,
    /// 設定に登録されている販促ディスプレイ
    pub available_displays: Vec<DisplayInsert>,
}

enum MenuAction {
    Search,
    ShowCart,
    Remove,
    Clear,
    EditHeader,
    Displays,
    Export,
    SaveAndQuit,
    Quit,
}

const MENU: &[(&str, MenuAction)] = &[
    ("品番を検索して追加", MenuAction::Search),
    ("カートを表示", MenuAction::ShowCart),
    ("明細を削除", MenuAction::Remove),
    ("カートを空にする", MenuAction::Clear),
    ("顧客情報を編集", MenuAction::EditHeader),
    ("販促ディスプレイを選択", MenuAction::Displays),
    ("見積書を出力", MenuAction::Export),
    ("保存して終了", MenuAction::SaveAndQuit),
    ("終了", MenuAction::Quit),
];

/// 対話式セッション
pub async fn run_interactive_session(
    mut session: QuoteSession,
    settings: SessionSettings,
    fetcher: &ImageFetcher,
) -> Result<()> {
    let rows: usize = session.catalogs().iter().map(|c| c.len()).sum();
    println!(
        "📋 価格表 {}件 / {}品番を読み込みました",
        session.catalogs().len(),
        rows
    );
    if !session.cart.is_empty() {
        println!("  ドラフトから{}行を復元", session.cart.len());
    }
    println!("---\n");

    let labels: Vec<&str> = MENU.iter().map(|(label, _)| *label).collect();

    loop {
        println!(
            "🛒 カート: {}行 / {}点 / {}",
            session.cart.len(),
            session.cart.total_pieces(),
            format_currency(session.cart.total())
        );

        let choice = Select::new()
            .with_prompt("操作を選択")
            .items(&labels)
            .default(0)
            .interact()?;

        match MENU[choice].1 {
            MenuAction::Search => prompt_add_article(&mut session)?,
            MenuAction::ShowCart => print_cart(&session),
            MenuAction::Remove => prompt_remove_line(&mut session)?,
            MenuAction::Clear => {
                if session.cart.is_empty() {
                    println!("  カートは空です\n");
                } else if Confirm::new()
                    .with_prompt("カートを空にしますか？")
                    .default(false)
                    .interact()?
                {
                    session.clear();
                    println!("  → カートを空にしました\n");
                }
            }
            MenuAction::EditHeader => prompt_header(&mut session.header)?,
            MenuAction::Displays => prompt_displays(&mut session, &settings.available_displays)?,
            MenuAction::Export => {
                if session.cart.is_empty() {
                    println!("⚠ カートが空です\n");
                    continue;
                }
                let draft = session.to_draft();
                match export_draft(&draft, &settings.export, fetcher).await {
                    Ok(_) => println!(),
                    Err(e) => println!("⚠ 出力エラー: {}\n", e),
                }
            }
            MenuAction::SaveAndQuit => {
                let path = match &settings.save {
                    Some(p) => p.clone(),
                    None => {
                        let input: String = Input::new()
                            .with_prompt("保存先")
                            .default("preventivo.json".to_string())
                            .interact_text()?;
                        PathBuf::from(input)
                    }
                };
                save_draft(&session.to_draft(), &path)?;
                println!("✓ 保存しました: {}", path.display());
                break;
            }
            MenuAction::Quit => {
                if !session.cart.is_empty()
                    && !Confirm::new()
                        .with_prompt("保存せずに終了しますか？")
                        .default(false)
                        .interact()?
                {
                    continue;
                }
                break;
            }
        }
    }

    Ok(())
}

/// ドラフトをJSONで保存
pub fn save_draft(draft: &QuoteDraft, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(draft)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// ドラフトを読み込み
pub fn load_draft(path: &Path) -> Result<QuoteDraft> {
    if !path.exists() {
        return Err(PreventivoError::FileNotFound(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn print_cart(session: &QuoteSession) {
    if session.cart.is_empty() {
        println!("  カートは空です\n");
        return;
    }
    for line in session.summary_lines() {
        println!("  {}", line);
    }
    println!(
        "  合計: {}点 / {}\n",
        session.cart.total_pieces(),
        format_currency(session.cart.total())
    );
}

fn prompt_add_article(session: &mut QuoteSession) -> Result<()> {
    let query: String = Input::new()
        .with_prompt("品番（部分一致）")
        .allow_empty(true)
        .interact_text()?;

    let results: Vec<CatalogRow> = session.search(&query).into_iter().cloned().collect();
    if results.is_empty() {
        println!("❌ 該当する品番がありません\n");
        return Ok(());
    }

    let mut items: Vec<String> = results.iter().map(format_row).collect();
    items.push("キャンセル".to_string());

    let picked = Select::new()
        .with_prompt(format!("{}件見つかりました", results.len()))
        .items(&items)
        .default(0)
        .interact()?;
    let Some(row) = results.get(picked) else {
        return Ok(());
    };

    print_row_details(row);

    let size = prompt_size(row)?;

    let quantity: u32 = Input::new()
        .with_prompt("数量")
        .default(1)
        .validate_with(|q: &u32| {
            if (1..=MAX_LINE_QUANTITY).contains(q) {
                Ok(())
            } else {
                Err(format!("1〜{}の数量を入力してください", MAX_LINE_QUANTITY))
            }
        })
        .interact_text()?;

    let discounts = prompt_discounts(session.default_discounts)?;
    let unit = net_price(row.list_price, &discounts)?;
    println!(
        "  → 単価 {} (定価 {} / 割引 {}%)",
        format_currency(unit),
        format_currency(row.list_price),
        discounts
    );

    if Confirm::new()
        .with_prompt("カートに追加しますか？")
        .default(true)
        .interact()?
    {
        let line = session.add(row, size, quantity, discounts)?;
        println!("  ✔ 追加: {} = {}\n", line.article, format_currency(line.line_total));
    } else {
        println!("  → キャンセル\n");
    }

    Ok(())
}

fn print_row_details(row: &CatalogRow) {
    println!("\n✅ 選択した品番:");
    println!("  品番:     {}", row.article);
    println!("  サイズ:   {}", if row.size_range.is_empty() { "-" } else { &row.size_range });
    println!("  定価:     {}", format_currency(row.list_price));
    if let Some(coating) = &row.coating {
        println!("  被覆:     {}", coating);
    }
    if let Some(qty) = row.box_quantity {
        println!("  入数:     {}", qty);
    }
    if let Some(note) = &row.regulatory_note {
        println!("  規格:     {}", note);
    }
    if !row.image.is_empty() {
        println!("  画像:     {}", row.image);
    }
}

fn prompt_size(row: &CatalogRow) -> Result<Size> {
    let sizes = parse_size_range(&row.size_range);
    if sizes.len() == 1 {
        return Ok(sizes.into_iter().next().unwrap_or_default());
    }

    let labels: Vec<String> = sizes.iter().map(|s| s.to_string()).collect();
    let picked = Select::new()
        .with_prompt("サイズ")
        .items(&labels)
        .default(labels.len() / 2)
        .interact()?;
    Ok(sizes[picked].clone())
}

fn prompt_discounts(defaults: Discounts) -> Result<Discounts> {
    let mut values = defaults.0;
    for (i, value) in values.iter_mut().enumerate() {
        *value = Input::new()
            .with_prompt(format!("割引{} (%)", i + 1))
            .default(*value)
            .validate_with(|d: &f64| validate_discount(*d).map(|_| ()).map_err(|e| e.to_string()))
            .interact_text()?;
    }
    Ok(Discounts(values))
}

fn prompt_remove_line(session: &mut QuoteSession) -> Result<()> {
    if session.cart.is_empty() {
        println!("  カートは空です\n");
        return Ok(());
    }

    let mut items = session.summary_lines();
    let cancel = items.len();
    items.push("キャンセル".to_string());

    let picked = Select::new()
        .with_prompt("削除する明細")
        .items(&items)
        .default(cancel)
        .interact()?;

    if picked < session.cart.len() {
        let removed = session.remove(picked)?;
        println!("  → 削除: {} tg {}\n", removed.article, removed.size);
    }
    Ok(())
}

fn prompt_header(header: &mut QuoteHeader) -> Result<()> {
    header.customer = Input::new()
        .with_prompt("顧客名")
        .with_initial_text(header.customer.clone())
        .allow_empty(true)
        .interact_text()?;
    header.notes = Input::new()
        .with_prompt("備考")
        .with_initial_text(header.notes.clone())
        .allow_empty(true)
        .interact_text()?;
    println!();
    Ok(())
}

fn prompt_displays(session: &mut QuoteSession, available: &[DisplayInsert]) -> Result<()> {
    if available.is_empty() {
        println!("  販促ディスプレイが登録されていません（config --add-display で追加）\n");
        return Ok(());
    }

    let names: Vec<&str> = available.iter().map(|d| d.name.as_str()).collect();
    let checked: Vec<bool> = available
        .iter()
        .map(|d| session.displays.iter().any(|s| s.name == d.name))
        .collect();

    let picked = MultiSelect::new()
        .with_prompt("見積書に含めるディスプレイ（スペースで選択）")
        .items(&names)
        .defaults(&checked)
        .interact()?;

    session.displays = picked.into_iter().map(|i| available[i].clone()).collect();
    println!("  → {}件選択\n", session.displays.len());
    Ok(())
}

/// 名前で販促ディスプレイを選択（大文字小文字を区別しない）
pub fn select_displays(available: &[DisplayInsert], names: &[String]) -> Result<Vec<DisplayInsert>> {
    names
        .iter()
        .map(|name| {
            available
                .iter()
                .find(|d| d.name.eq_ignore_ascii_case(name))
                .cloned()
                .ok_or_else(|| PreventivoError::Config(format!("販促ディスプレイが見つかりません: {}", name)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn catalog() -> Catalog {
        let rows = ["ARES S3", "ZEUS S1P", "ARES LOW"]
            .iter()
            .map(|a| CatalogRow {
                catalog: "A".into(),
                article: a.to_string(),
                list_price: 50.0,
                size_range: "38-46".into(),
                ..Default::default()
            })
            .collect();
        Catalog {
            tag: "A".into(),
            columns: vec![],
            rows,
            skipped_rows: 0,
        }
    }

    fn session() -> QuoteSession {
        QuoteSession::new(vec![catalog()], QuoteHeader::default(), Discounts::new(10.0, 0.0, 0.0))
    }

    #[test]
    fn test_search_and_add() {
        let mut s = session();
        let row = s.search("ares")[1].clone();
        assert_eq!(row.article, "ARES LOW");

        let d = s.default_discounts;
        let line = s.add(&row, Size::Numeric(42.0), 2, d).unwrap();
        assert!((line.unit_price - 45.0).abs() < 1e-9);
        assert!((s.cart.total() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut s = session();
        let row = s.search("zeus")[0].clone();
        s.add(&row, Size::Numeric(40.0), 1, Discounts::default()).unwrap();
        s.add(&row, Size::Numeric(41.0), 1, Discounts::default()).unwrap();

        assert!(s.remove(3).is_err());
        assert_eq!(s.remove(0).unwrap().size, Size::Numeric(40.0));
        s.clear();
        assert!(s.cart.is_empty());
    }

    #[test]
    fn test_draft_round_trip_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bozze").join("rossi.json");

        let mut s = session();
        s.header.customer = "Rossi Srl".into();
        let row = s.search("ARES S3")[0].clone();
        s.add(&row, Size::Numeric(43.0), 5, Discounts::default()).unwrap();
        save_draft(&s.to_draft(), &path).unwrap();

        let draft = load_draft(&path).unwrap();
        let resumed = QuoteSession::from_draft(vec![catalog()], draft, Discounts::default());
        assert_eq!(resumed.header.customer, "Rossi Srl");
        assert_eq!(resumed.cart.len(), 1);
        assert_eq!(resumed.cart.total_pieces(), 5);
    }

    #[test]
    fn test_load_missing_draft() {
        assert!(matches!(
            load_draft(Path::new("/nonexistent/draft.json")),
            Err(PreventivoError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_format_cart_line() {
        let line = CartLine {
            article: "ARES S3".into(),
            size: Size::Numeric(42.0),
            quantity: 3,
            unit_price: 85.5,
            line_total: 256.5,
            catalog: Some("A".into()),
            ..Default::default()
        };
        assert_eq!(
            format_cart_line(0, &line),
            "1. [A] ARES S3  tg 42  x3  EUR 85,50 = EUR 256,50"
        );
    }

    #[test]
    fn test_format_row() {
        let row = &catalog().rows[0];
        assert_eq!(format_row(row), "[A] ARES S3  EUR 50,00  (taglie 38-46)");
    }

    #[test]
    fn test_select_displays() {
        let available = vec![
            DisplayInsert { name: "Totem S3".into(), ..Default::default() },
            DisplayInsert { name: "Banco DPI".into(), ..Default::default() },
        ];
        let picked = select_displays(&available, &["banco dpi".to_string()]).unwrap();
        assert_eq!(picked[0].name, "Banco DPI");
        assert!(select_displays(&available, &["Vetrina".to_string()]).is_err());
    }

    #[test]
    fn test_today_format() {
        let d = today();
        assert_eq!(d.len(), 10);
        assert_eq!(&d[2..3], "/");
    }
}
