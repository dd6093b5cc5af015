//! Excel読み込み
//!
//! 先頭シートを読み、2つのビューを作る:
//! - lettered: 列記号(A, B, ...)キーの全行
//! - rows: 1行目をヘッダーとしたデータ行

use crate::error::{FieldLogError, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use fieldlog_common::{CellValue, Row, SheetData};
use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;

/// ファイルから読み込み
pub fn parse_workbook_file(path: &Path) -> Result<SheetData> {
    if !path.exists() {
        return Err(FieldLogError::FileNotFound(path.display().to_string()));
    }
    let bytes = std::fs::read(path)?;
    parse_workbook(&bytes)
}

/// バイト列から読み込み（xlsx/xls/ods を自動判別）
pub fn parse_workbook(bytes: &[u8]) -> Result<SheetData> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| FieldLogError::InputFormat(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| FieldLogError::InputFormat("シートがありません".into()))?
        .map_err(|e| FieldLogError::InputFormat(e.to_string()))?;

    let first_col = range.start().map(|(_, col)| col as usize).unwrap_or(0);
    let grid: Vec<Vec<Option<CellValue>>> = range
        .rows()
        .map(|cells| cells.iter().map(to_cell_value).collect())
        .filter(|cells: &Vec<Option<CellValue>>| cells.iter().any(Option::is_some))
        .collect();

    sheet_from_grid(&grid, first_col)
}

/// セル格子から2つのビューを構築
fn sheet_from_grid(grid: &[Vec<Option<CellValue>>], first_col: usize) -> Result<SheetData> {
    let (header_cells, data) = match grid.split_first() {
        Some(split) => split,
        None => return Err(FieldLogError::InputFormat("シートが空です".into())),
    };
    if data.is_empty() {
        return Err(FieldLogError::InputFormat("データ行がありません".into()));
    }

    let headers = header_names(header_cells);

    let lettered = grid
        .iter()
        .map(|cells| {
            cells
                .iter()
                .enumerate()
                .filter_map(|(i, cell)| cell.clone().map(|v| (column_letter(first_col + i), v)))
                .collect::<Row>()
        })
        .collect();

    let rows = data
        .iter()
        .map(|cells| {
            cells
                .iter()
                .zip(headers.iter())
                .filter_map(|(cell, header)| cell.clone().map(|v| (header.clone(), v)))
                .collect::<Row>()
        })
        .filter(|row: &Row| !row.is_empty())
        .collect();

    Ok(SheetData { headers, lettered, rows })
}

/// ヘッダー名を決定（空欄は __EMPTY、重複は _1, _2 ...）
fn header_names(cells: &[Option<CellValue>]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut empty_count = 0;

    cells
        .iter()
        .map(|cell| {
            let base = match cell {
                Some(value) if !value.is_blank() => value.to_display(),
                _ => {
                    let name = if empty_count == 0 {
                        "__EMPTY".to_string()
                    } else {
                        format!("__EMPTY_{}", empty_count)
                    };
                    empty_count += 1;
                    name
                }
            };

            let mut name = base.clone();
            let mut n = 1;
            while !seen.insert(name.clone()) {
                name = format!("{}_{}", base, n);
                n += 1;
            }
            name
        })
        .collect()
}

fn to_cell_value(data: &Data) -> Option<CellValue> {
    match data {
        Data::Empty => None,
        Data::String(s) => Some(CellValue::Text(s.clone())),
        Data::Float(f) => Some(CellValue::Number(*f)),
        Data::Int(i) => Some(CellValue::Number(*i as f64)),
        Data::Bool(b) => Some(CellValue::Bool(*b)),
        Data::DateTime(dt) => Some(CellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(CellValue::Text(s.clone())),
        Data::Error(e) => Some(CellValue::Text(e.to_string())),
    }
}

/// 0始まりの列番号を列記号に変換（0→A, 25→Z, 26→AA）
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Option<CellValue> {
        Some(CellValue::Text(s.to_string()))
    }

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn test_header_names_fill_blanks_and_duplicates() {
        let names = header_names(&[text("Address"), None, text("SOD"), text("SOD"), None]);
        assert_eq!(names, vec!["Address", "__EMPTY", "SOD", "SOD_1", "__EMPTY_1"]);
    }

    #[test]
    fn test_sheet_from_grid_views() {
        let grid = vec![
            vec![text("Address"), text("Account")],
            vec![text("1 A St"), None],
            vec![text("2 B St"), Some(CellValue::Number(7.0))],
        ];

        let sheet = sheet_from_grid(&grid, 0).unwrap();
        assert_eq!(sheet.headers, vec!["Address", "Account"]);
        assert_eq!(sheet.lettered.len(), 3);
        assert_eq!(sheet.lettered[0].get("A"), text("Address").as_ref());
        assert_eq!(sheet.rows.len(), 2);
        assert!(!sheet.rows[0].contains_key("Account"));
        assert_eq!(sheet.rows[1].get("Account"), Some(&CellValue::Number(7.0)));
    }

    #[test]
    fn test_sheet_from_grid_offset_columns() {
        let grid = vec![vec![text("Address")], vec![text("1 A St")]];
        let sheet = sheet_from_grid(&grid, 2).unwrap();
        assert!(sheet.lettered[1].contains_key("C"));
    }

    #[test]
    fn test_header_only_is_input_format_error() {
        let grid = vec![vec![text("Address")]];
        let err = sheet_from_grid(&grid, 0).unwrap_err();
        assert!(matches!(err, FieldLogError::InputFormat(_)));

        let err = sheet_from_grid(&[], 0).unwrap_err();
        assert!(matches!(err, FieldLogError::InputFormat(_)));
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        let err = parse_workbook(b"this is not a workbook").unwrap_err();
        assert!(matches!(err, FieldLogError::InputFormat(_)));
    }
}
