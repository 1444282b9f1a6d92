use clap::Parser;
use preventivo_common::export::pdf_core::format_currency;
use preventivo_common::pricing::{effective_discount, line_total, net_price};
use preventivo_common::{search, DisplayInsert, QuoteHeader, SearchQuery};
use preventivo_rust::{catalog, cli, config, error, export, images, logging, session};
use cli::{CatalogArgs, Cli, Commands};
use config::Config;
use error::{PreventivoError, Result};
use std::path::{Path, PathBuf};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let config = Config::load()?;

    match cli.command {
        Commands::Session { catalogs, customer, resume, save, output } => {
            println!("👟 preventivo - 見積作成\n");

            println!("[1/2] 価格表を読み込み中...");
            let loaded = load_catalogs(&catalogs, &config)?;
            println!("✔ 価格表を読み込みました\n");

            let mut quote = match &resume {
                Some(path) => {
                    let draft = session::load_draft(path)?;
                    session::QuoteSession::from_draft(loaded, draft, config.default_discounts)
                }
                None => session::QuoteSession::new(loaded, header_from_config(&config), config.default_discounts),
            };
            if let Some(customer) = customer {
                quote.header.customer = customer;
            }

            let settings = session::SessionSettings {
                export: export_settings(&config, cli::ExportFormat::Both, output, None, None),
                save: save.or(resume),
                available_displays: config.displays.clone(),
            };
            let fetcher = images::ImageFetcher::new(config.image_cache_dir())?;

            println!("[2/2] 見積入力");
            session::run_interactive_session(quote, settings, &fetcher).await?;

            println!("\n✅ 終了");
        }

        Commands::Search { query, catalogs, tag, limit } => {
            let loaded = load_catalogs(&catalogs, &config)?;
            let search_query = SearchQuery {
                text: query.clone(),
                catalog: tag,
                limit: Some(limit),
            };
            let results = search(&loaded, &search_query);

            if results.is_empty() {
                println!("❌ 該当する品番がありません: {}", query);
                return Ok(());
            }

            println!("{}件見つかりました:\n", results.len());
            for row in results {
                println!("[{}] Modello:  {}", row.catalog, row.article);
                println!("    Taglie:   {}", if row.size_range.is_empty() { "-" } else { &row.size_range });
                println!("    Prezzo:   {}", format_currency(row.list_price));
                if !row.image.is_empty() {
                    println!("    Immagine: {}", row.image);
                }
                println!();
            }
        }

        Commands::Price { list_price, discounts, quantity } => {
            let discounts = if discounts.is_empty() {
                config.default_discounts
            } else {
                config::discounts_from_values(&discounts)?
            };

            let unit = net_price(list_price, &discounts)?;
            println!("定価:       {}", format_currency(list_price));
            println!("割引:       {}% (実質 {:.2}%)", discounts, effective_discount(&discounts)?);
            println!("単価:       {}", format_currency(unit));
            if quantity > 1 {
                println!("数量:       {}", quantity);
                println!("合計:       {}", format_currency(line_total(unit, quantity)));
            }
        }

        Commands::Export { input, format, output, title, pdf_quality, displays } => {
            println!("📄 preventivo - エクスポート\n");

            let mut draft = session::load_draft(&input)?;
            if draft.lines.is_empty() {
                return Err(PreventivoError::EmptyCart);
            }
            if !displays.is_empty() {
                draft.displays = session::select_displays(&config.displays, &displays)?;
            }

            // JSONファイルの親ディレクトリを基準に相対パスを解決
            let base_dir = input.parent().unwrap_or(Path::new(".")).to_path_buf();
            let fetcher = images::ImageFetcher::new(config.image_cache_dir())?.with_base_dir(base_dir);

            let settings = export_settings(&config, format, output, title, pdf_quality);
            export::export_draft(&draft, &settings, &fetcher).await?;

            println!("\n✅ エクスポート完了");
        }

        Commands::Catalogs { dir } => {
            let target = dir.unwrap_or_else(|| PathBuf::from("."));
            let files = catalog::list_spreadsheets(&target)?;

            if files.is_empty() {
                println!("価格表が見つかりません: {}", target.display());
                return Ok(());
            }

            println!("価格表 ({}件):", files.len());
            for path in files {
                let registered = config.catalogs.iter().find(|c| c.path == path);
                match registered {
                    Some(source) => println!("  [{}] {}", source.tag, path.display()),
                    None => println!("      {}", path.display()),
                }
            }
        }

        Commands::Config {
            set_agent,
            set_company,
            set_logo,
            set_logo_width,
            set_discounts,
            add_catalog,
            tag,
            sheet,
            add_display,
            display_image,
            display_note,
            show,
        } => {
            let mut config = config;
            let mut changed = false;

            if let Some(agent) = set_agent {
                config.agent = agent;
                println!("✔ 担当者を設定しました");
                changed = true;
            }
            if let Some(company) = set_company {
                config.company = company;
                println!("✔ 会社名を設定しました");
                changed = true;
            }
            if let Some(logo) = set_logo {
                if !logo.exists() {
                    return Err(PreventivoError::FileNotFound(logo.display().to_string()));
                }
                config.logo = Some(logo);
                println!("✔ ロゴを設定しました");
                changed = true;
            }
            if let Some(width) = set_logo_width {
                config.logo_width_mm = width;
                println!("✔ ロゴ幅を設定しました: {}mm", width);
                changed = true;
            }
            if let Some(values) = set_discounts {
                config.set_default_discounts(&values)?;
                println!("✔ 既定の割引を設定しました: {}%", config.default_discounts);
                changed = true;
            }
            if let Some(path) = add_catalog {
                if !path.exists() {
                    return Err(PreventivoError::FileNotFound(path.display().to_string()));
                }
                let source = config.add_catalog(path, tag, sheet);
                println!("✔ 価格表を登録しました: [{}] {}", source.tag, source.path.display());
                changed = true;
            }
            if let Some(name) = add_display {
                config.displays.retain(|d| !d.name.eq_ignore_ascii_case(&name));
                config.displays.push(DisplayInsert {
                    name: name.clone(),
                    image: display_image.unwrap_or_default(),
                    note: display_note.unwrap_or_default(),
                });
                println!("✔ 販促ディスプレイを追加しました: {}", name);
                changed = true;
            }

            if changed {
                config.save()?;
            }

            if show || !changed {
                print_config(&config);
            }
        }

        Commands::Cache { clear, catalogs, info } => {
            let sources = catalog::resolve_sources(&catalogs.catalogs, &config)?;

            for source in &sources {
                let cache_path = catalog::cache_path(&source.path);

                if info || !clear {
                    if cache_path.exists() {
                        let cache = catalog::CatalogCache::load(&source.path);
                        println!("キャッシュ情報 [{}]:", source.tag);
                        println!("  パス: {}", cache_path.display());
                        println!("  件数: {}", cache.len());
                        if let Ok(meta) = std::fs::metadata(&cache_path) {
                            println!("  サイズ: {} bytes", meta.len());
                        }
                    } else {
                        println!("キャッシュファイルが存在しません: {}", cache_path.display());
                    }
                }

                if clear {
                    match catalog::clear_cache(&source.path) {
                        Ok(true) => println!("✔ キャッシュを削除しました: {}", cache_path.display()),
                        Ok(false) => println!("キャッシュファイルが存在しません: {}", cache_path.display()),
                        Err(e) => println!("キャッシュ削除エラー: {}", e),
                    }
                }
            }
        }
    }

    Ok(())
}

fn load_catalogs(args: &CatalogArgs, config: &Config) -> Result<Vec<preventivo_common::Catalog>> {
    let sources = catalog::resolve_sources(&args.catalogs, config)?;
    let loaded = catalog::load_all(&sources, !args.no_cache)?;
    for c in &loaded {
        println!("  [{}] {}品番", c.tag, c.len());
    }
    Ok(loaded)
}

fn header_from_config(config: &Config) -> QuoteHeader {
    QuoteHeader {
        agent: config.agent.clone(),
        company: config.company.clone(),
        date: session::today(),
        validity: config.validity.clone(),
        ..Default::default()
    }
}

fn export_settings(
    config: &Config,
    format: cli::ExportFormat,
    output: Option<PathBuf>,
    title: Option<String>,
    pdf_quality: Option<cli::PdfQuality>,
) -> export::ExportSettings {
    export::ExportSettings {
        format,
        output: output.unwrap_or_else(|| PathBuf::from(".")),
        title: title.unwrap_or_else(|| config.title.clone()),
        pdf_quality: pdf_quality.unwrap_or(config.pdf_quality),
        logo: config.logo.clone(),
        logo_width_mm: config.logo_width_mm,
    }
}

fn print_config(config: &Config) {
    println!("設定:");
    println!("  担当者: {}", if config.agent.is_empty() { "未設定" } else { &config.agent });
    println!("  会社名: {}", if config.company.is_empty() { "未設定" } else { &config.company });
    match &config.logo {
        Some(logo) => println!("  ロゴ: {} ({}mm)", logo.display(), config.logo_width_mm),
        None => println!("  ロゴ: 未設定"),
    }
    println!("  既定の割引: {}%", config.default_discounts);
    println!("  PDF品質: {}", config.pdf_quality);
    println!("  タイトル: {}", config.title);
    println!("  画像キャッシュ: {}", if config.image_cache { "有効" } else { "無効" });
    println!("  価格表:");
    if config.catalogs.is_empty() {
        println!("    (未登録)");
    }
    for source in &config.catalogs {
        let sheet = source.sheet.as_deref().map(|s| format!(" / {}", s)).unwrap_or_default();
        println!("    [{}] {}{}", source.tag, source.path.display(), sheet);
    }
    println!("  販促ディスプレイ:");
    if config.displays.is_empty() {
        println!("    (未登録)");
    }
    for display in &config.displays {
        println!("    {}", display.name);
    }
}
