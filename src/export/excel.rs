//! Excel見積書の生成
//!
//! 1シート: ヘッダー情報 → 明細表 → 合計行

use crate::error::Result;
use preventivo_common::cart::total_pieces;
use preventivo_common::pricing::round_cents;
use preventivo_common::QuoteDraft;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, XlsxError};
use std::path::Path;

const COLUMNS: &[(&str, f64)] = &[
    ("Listino", 9.0),
    ("Articolo", 32.0),
    ("Taglia", 8.0),
    ("Quantità", 10.0),
    ("Prezzo listino", 14.0),
    ("Sconti %", 10.0),
    ("Prezzo netto", 14.0),
    ("Totale", 14.0),
    ("Normativa", 28.0),
];

const CURRENCY_FORMAT: &str = "#,##0.00 \"€\"";

pub fn generate_excel(draft: &QuoteDraft, output_path: &Path, title: &str) -> Result<()> {
    let mut workbook = build_workbook(draft, title)?;
    workbook.save(output_path)?;
    Ok(())
}

/// バッファに生成
pub fn generate_excel_buffer(draft: &QuoteDraft, title: &str) -> Result<Vec<u8>> {
    let mut workbook = build_workbook(draft, title)?;
    Ok(workbook.save_to_buffer()?)
}

fn build_workbook(draft: &QuoteDraft, title: &str) -> std::result::Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();

    let title_format = Format::new().set_bold().set_font_size(16);
    let label_format = Format::new().set_bold();
    let header_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0xD9D9D9))
        .set_border(FormatBorder::Thin)
        .set_align(FormatAlign::Center);
    let cell_format = Format::new().set_border(FormatBorder::Thin);
    let money_format = Format::new()
        .set_border(FormatBorder::Thin)
        .set_num_format(CURRENCY_FORMAT);
    let total_format = Format::new()
        .set_bold()
        .set_border(FormatBorder::Thin)
        .set_num_format(CURRENCY_FORMAT);

    let sheet = workbook.add_worksheet();
    sheet.set_name("Preventivo")?;

    for (col, (_, width)) in COLUMNS.iter().enumerate() {
        sheet.set_column_width(col as u16, *width)?;
    }

    sheet.write_string_with_format(0, 0, title.to_uppercase(), &title_format)?;

    let header = &draft.header;
    let mut row: u32 = 2;
    for (label, value) in [
        ("Cliente", &header.customer),
        ("Data", &header.date),
        ("Agente", &header.agent),
        ("Azienda", &header.company),
        ("Note", &header.notes),
    ] {
        if value.is_empty() {
            continue;
        }
        sheet.write_string_with_format(row, 0, label, &label_format)?;
        sheet.write_string(row, 1, value.as_str())?;
        row += 1;
    }

    row += 1;
    for (col, (name, _)) in COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(row, col as u16, *name, &header_format)?;
    }
    let first_data_row = row + 1;

    for line in &draft.lines {
        row += 1;
        sheet.write_string_with_format(row, 0, line.catalog.clone().unwrap_or_default(), &cell_format)?;
        sheet.write_string_with_format(row, 1, line.article.as_str(), &cell_format)?;
        sheet.write_string_with_format(row, 2, line.size.to_string(), &cell_format)?;
        sheet.write_number_with_format(row, 3, line.quantity as f64, &cell_format)?;
        sheet.write_number_with_format(row, 4, line.list_price, &money_format)?;
        sheet.write_string_with_format(row, 5, line.discounts.to_string(), &cell_format)?;
        sheet.write_number_with_format(row, 6, line.unit_price, &money_format)?;
        sheet.write_number_with_format(row, 7, line.line_total, &money_format)?;
        sheet.write_string_with_format(
            row,
            8,
            line.regulatory_note.clone().unwrap_or_default(),
            &cell_format,
        )?;
    }

    row += 1;
    let pieces = total_pieces(&draft.lines);
    let total: f64 = draft.lines.iter().map(|l| l.line_total).sum();
    sheet.write_string_with_format(row, 1, "TOTALE (IVA esclusa)", &label_format)?;
    sheet.write_number_with_format(row, 3, pieces as f64, &total_format)?;
    sheet.write_number_with_format(row, 7, round_cents(total), &total_format)?;

    if !header.validity.is_empty() {
        sheet.write_string(row + 2, 0, header.validity.as_str())?;
    }

    if !draft.lines.is_empty() {
        sheet.autofilter(first_data_row - 1, 0, row - 1, (COLUMNS.len() - 1) as u16)?;
    }

    Ok(workbook)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_defined() {
        assert_eq!(COLUMNS.len(), 9);
        assert_eq!(COLUMNS[7].0, "Totale");
    }

    #[test]
    fn test_empty_draft_buffer() {
        let buf = generate_excel_buffer(&QuoteDraft::default(), "Preventivo").unwrap();
        // xlsx = zip
        assert!(buf.starts_with(b"PK"));
    }
}
