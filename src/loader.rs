use calamine::{Data, DataType, Reader, open_workbook_auto_from_rs};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use crate::error::{ReportError, Result};
use crate::record::{SaleRecord, check_amount, parse_amount, parse_date};

/// Header names of the four required columns
///
/// Matching is case-insensitive and ignores surrounding whitespace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub date: String,
    pub amount: String,
    pub client: String,
    pub category: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            date: "fecha".to_string(),
            amount: "venta".to_string(),
            client: "cliente".to_string(),
            category: "categoria".to_string(),
        }
    }
}

static EMPTY_CELL: Data = Data::Empty;

/// Positions of the required columns within a header row
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ColumnIndex {
    date: usize,
    amount: usize,
    client: usize,
    category: usize,
}

impl ColumnIndex {
    fn resolve<S: AsRef<str>>(headers: &[S], names: &ColumnNames) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.as_ref().trim().eq_ignore_ascii_case(name.trim()))
                .ok_or_else(|| {
                    ReportError::InvalidInputFormat(format!("missing required column '{}'", name))
                })
        };

        Ok(ColumnIndex {
            date: find(&names.date)?,
            amount: find(&names.amount)?,
            client: find(&names.client)?,
            category: find(&names.category)?,
        })
    }
}

/// Kind of tabular file an upload contains
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputFormat {
    /// Excel or OpenDocument workbook
    Spreadsheet,
    Csv,
}

impl InputFormat {
    /// Detect the format from a file name's extension
    ///
    /// Names without an extension are treated as workbooks, the only kind the
    /// upload form asks for.
    pub fn from_file_name(name: &str) -> Result<Self> {
        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        match extension.as_deref() {
            Some("csv") => Ok(InputFormat::Csv),
            Some("xlsx") | Some("xlsm") | Some("xls") | Some("ods") | None => {
                Ok(InputFormat::Spreadsheet)
            }
            Some(ext) => Err(ReportError::InvalidInputFormat(format!(
                "unsupported file extension: {}",
                ext
            ))),
        }
    }
}

/// Load sales records from a file on disk
///
/// The format is chosen from the file extension.
///
/// # Examples
/// ```no_run
/// use sales_report::loader::{load_records, ColumnNames};
///
/// match load_records("ventas.xlsx", &ColumnNames::default()) {
///     Ok(records) => println!("Loaded {} records", records.len()),
///     Err(e) => eprintln!("Error loading file: {}", e),
/// }
/// ```
pub fn load_records(filepath: impl AsRef<Path>, columns: &ColumnNames) -> Result<Vec<SaleRecord>> {
    let path = filepath.as_ref();
    let name = path.to_string_lossy();
    let format = InputFormat::from_file_name(&name)?;
    let bytes = fs::read(path)?;
    log::info!("loading {} ({} bytes, {:?})", name, bytes.len(), format);
    load_from_bytes(&bytes, format, columns)
}

/// Load sales records from an in-memory upload
pub fn load_from_bytes(
    bytes: &[u8],
    format: InputFormat,
    columns: &ColumnNames,
) -> Result<Vec<SaleRecord>> {
    if bytes.is_empty() {
        return Err(ReportError::InvalidInputFormat("the file is empty".to_string()));
    }

    let records = match format {
        InputFormat::Spreadsheet => from_excel_bytes(bytes, columns)?,
        InputFormat::Csv => from_csv_reader(bytes, columns)?,
    };
    log::debug!("parsed {} sales records", records.len());
    Ok(records)
}

/// Read the first worksheet of a workbook
///
/// The first non-empty row is the header. Fully blank rows are skipped.
/// Errors carry the row number as shown in the spreadsheet application.
pub fn from_excel_bytes(bytes: &[u8], columns: &ColumnNames) -> Result<Vec<SaleRecord>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ReportError::InvalidInputFormat("no sheets found in workbook".to_string()))??;

    // calamine trims leading empty rows; 0-based sheet row of the header
    let header_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);

    let mut rows = range.rows();
    let header: Vec<String> = rows
        .next()
        .ok_or_else(|| ReportError::InvalidInputFormat("the sheet is empty".to_string()))?
        .iter()
        .map(|cell| cell.to_string())
        .collect();
    let index = ColumnIndex::resolve(&header, columns)?;

    let mut records = Vec::new();
    for (offset, row) in rows.enumerate() {
        if row.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        let row_number = header_row + offset + 2;
        let cell = |idx: usize| row.get(idx).unwrap_or(&EMPTY_CELL);

        let date = cell_date(cell(index.date)).ok_or_else(|| {
            ReportError::invalid_record(
                row_number,
                format!("date '{}' is not a calendar date", cell(index.date)),
            )
        })?;
        let amount = cell_amount(cell(index.amount)).ok_or_else(|| {
            ReportError::invalid_record(
                row_number,
                format!("amount '{}' is not a number", cell(index.amount)),
            )
        })?;

        records.push(SaleRecord::new(
            date,
            check_amount(row_number, amount)?,
            cell(index.client).to_string().trim(),
            cell(index.category).to_string().trim(),
        ));
    }

    Ok(records)
}

fn cell_date(cell: &Data) -> Option<chrono::NaiveDate> {
    match cell {
        Data::DateTime(_) | Data::DateTimeIso(_) => cell.as_date(),
        Data::String(text) => parse_date(text),
        _ => None,
    }
}

fn cell_amount(cell: &Data) -> Option<rust_decimal::Decimal> {
    match cell {
        Data::Int(i) => Some(rust_decimal::Decimal::from(*i)),
        // shortest round-trip text keeps 150.25 as 150.25
        Data::Float(f) => parse_amount(&f.to_string()),
        Data::String(text) => parse_amount(text),
        _ => None,
    }
}

/// Read comma-separated text with a header row
pub fn from_csv_reader<R: Read>(reader: R, columns: &ColumnNames) -> Result<Vec<SaleRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let header: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let index = ColumnIndex::resolve(&header, columns)?;

    let mut records = Vec::new();
    for row in rdr.records() {
        let row = row?;
        let row_number = row
            .position()
            .map(|pos| pos.line() as usize)
            .unwrap_or(records.len() + 2);
        let field = |idx: usize| row.get(idx).unwrap_or("");

        records.push(SaleRecord::parse(
            row_number,
            field(index.date),
            field(index.amount),
            field(index.client),
            field(index.category),
        )?);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_xlsxwriter::Workbook;
    use std::io::Write;

    const CSV: &str = "fecha,venta,cliente,categoria\n\
                       2023-01-15,100.50,acme,tools\n\
                       2023-02-20,-20,globex,paint\n\
                       \n\
                       2024-03-01,75,acme,paint\n";

    fn workbook(rows: &[[&str; 4]], amounts_as_numbers: bool) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (c, name) in ["Fecha", "Venta", "Cliente", "Categoria"].iter().enumerate() {
            sheet.write_string(0, c as u16, *name).unwrap();
        }
        for (r, row) in rows.iter().enumerate() {
            let r = r as u32 + 1;
            sheet.write_string(r, 0, row[0]).unwrap();
            match row[1].parse::<f64>() {
                Ok(n) if amounts_as_numbers => {
                    sheet.write_number(r, 1, n).unwrap();
                }
                _ => {
                    sheet.write_string(r, 1, row[1]).unwrap();
                }
            }
            sheet.write_string(r, 2, row[2]).unwrap();
            sheet.write_string(r, 3, row[3]).unwrap();
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn detects_format_from_extension() {
        assert_eq!(InputFormat::from_file_name("a.CSV").unwrap(), InputFormat::Csv);
        assert_eq!(
            InputFormat::from_file_name("ventas.xlsx").unwrap(),
            InputFormat::Spreadsheet
        );
        assert_eq!(InputFormat::from_file_name("upload").unwrap(), InputFormat::Spreadsheet);
        let err = InputFormat::from_file_name("notes.txt").unwrap_err();
        assert_eq!(err.kind(), "invalid_input_format");
    }

    #[test]
    fn reads_csv_rows() {
        let records = from_csv_reader(CSV.as_bytes(), &ColumnNames::default()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2023, 1, 15).unwrap());
        assert_eq!(records[0].amount, Decimal::new(10050, 2));
        assert_eq!(records[1].amount, Decimal::from(-20));
        assert_eq!(records[2].client, "acme");
        assert_eq!(records[2].category, "paint");
    }

    #[test]
    fn csv_columns_can_be_reordered_and_renamed() {
        let text = "Client , Category,Amount,Date\nacme,tools,5,2022-06-01\n";
        let columns = ColumnNames {
            date: "date".into(),
            amount: "amount".into(),
            client: "client".into(),
            category: "category".into(),
        };
        let records = from_csv_reader(text.as_bytes(), &columns).unwrap();
        assert_eq!(records[0].amount, Decimal::from(5));
        assert_eq!(records[0].client, "acme");
    }

    #[test]
    fn missing_column_is_an_input_format_error() {
        let text = "fecha,venta,cliente\n2023-01-01,1,acme\n";
        let err = from_csv_reader(text.as_bytes(), &ColumnNames::default()).unwrap_err();
        match err {
            ReportError::InvalidInputFormat(msg) => assert!(msg.contains("categoria")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn bad_csv_amount_reports_its_line() {
        let text = "fecha,venta,cliente,categoria\n2023-01-01,1,a,b\n2023-01-02,abc,a,b\n";
        let err = from_csv_reader(text.as_bytes(), &ColumnNames::default()).unwrap_err();
        assert!(matches!(err, ReportError::InvalidRecord { row: 3, .. }), "{err:?}");
    }

    #[test]
    fn empty_upload_is_rejected() {
        let err = load_from_bytes(&[], InputFormat::Csv, &ColumnNames::default()).unwrap_err();
        assert_eq!(err.kind(), "invalid_input_format");
    }

    #[test]
    fn garbage_is_not_a_workbook() {
        let err = load_from_bytes(b"not a workbook", InputFormat::Spreadsheet, &ColumnNames::default())
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_input_format");
    }

    #[test]
    fn reads_xlsx_rows() {
        let bytes = workbook(
            &[
                ["2022-04-01", "100", "acme", "tools"],
                ["2023-04-01", "150.25", "globex", "paint"],
            ],
            true,
        );
        let records = from_excel_bytes(&bytes, &ColumnNames::default()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2022, 4, 1).unwrap());
        assert_eq!(records[0].amount, Decimal::from(100));
        assert_eq!(records[1].amount, Decimal::new(15025, 2));
        assert_eq!(records[1].client, "globex");
    }

    #[test]
    fn xlsx_text_amounts_are_parsed() {
        let bytes = workbook(&[["2022-04-01", "$12.50", "acme", "tools"]], false);
        let records = from_excel_bytes(&bytes, &ColumnNames::default()).unwrap();
        assert_eq!(records[0].amount, Decimal::new(1250, 2));
    }

    #[test]
    fn bad_xlsx_date_reports_its_row() {
        let bytes = workbook(
            &[
                ["2022-04-01", "1", "acme", "tools"],
                ["yesterday", "1", "acme", "tools"],
            ],
            true,
        );
        let err = from_excel_bytes(&bytes, &ColumnNames::default()).unwrap_err();
        assert!(matches!(err, ReportError::InvalidRecord { row: 3, .. }), "{err:?}");
    }

    #[test]
    fn row_numbers_follow_the_sheet_when_the_header_is_lower() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (c, name) in ["Fecha", "Venta", "Cliente", "Categoria"].iter().enumerate() {
            sheet.write_string(2, c as u16, *name).unwrap();
        }
        for (c, value) in ["2022-04-01", "1", "acme", "tools"].iter().enumerate() {
            sheet.write_string(3, c as u16, *value).unwrap();
        }
        for (c, value) in ["garbage", "1", "acme", "tools"].iter().enumerate() {
            sheet.write_string(4, c as u16, *value).unwrap();
        }
        let bytes = workbook.save_to_buffer().unwrap();

        let err = from_excel_bytes(&bytes, &ColumnNames::default()).unwrap_err();
        assert!(matches!(err, ReportError::InvalidRecord { row: 5, .. }), "{err:?}");
    }

    #[test]
    fn oversized_xlsx_amount_is_rejected() {
        let bytes = workbook(
            &[
                ["2022-04-01", "1", "acme", "tools"],
                ["2022-05-01", "5e28", "acme", "tools"],
            ],
            true,
        );
        let err = from_excel_bytes(&bytes, &ColumnNames::default()).unwrap_err();
        assert!(matches!(err, ReportError::InvalidRecord { row: 3, .. }), "{err:?}");
    }

    #[test]
    fn oversized_csv_amounts_never_reach_aggregation() {
        let text = "fecha,venta,cliente,categoria\n\
                    2023-01-01,50000000000000000000000000000,a,b\n\
                    2023-01-02,50000000000000000000000000000,a,b\n";
        let err = from_csv_reader(text.as_bytes(), &ColumnNames::default()).unwrap_err();
        assert!(matches!(err, ReportError::InvalidRecord { row: 2, .. }), "{err:?}");
    }

    #[test]
    fn loads_from_disk_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(CSV.as_bytes()).unwrap();
        let records = load_records(file.path(), &ColumnNames::default()).unwrap();
        assert_eq!(records.len(), 3);
    }
}
