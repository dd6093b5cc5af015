//! 住所レコード構築
//!
//! Excelのデータ行から AddressRecord を作る純粋な変換。
//! 住所が空の行はスキップし、IDは出力したレコードだけで 1..N に詰める。

use crate::types::{AddressRecord, CellValue, Row, WorkOrderFields};

/// 住所列の名前
pub const ADDRESS_COLUMN: &str = "Address";

/// 既知の作業指示列（列名はExcelの表記そのまま）
const WORK_ORDER_COLUMNS: &[&str] = &[
    "Work Order #",
    "Account",
    "EU",
    "ADDRESS2",
    "TOP     SOIL EXCAV. - 4\"",
    "TOP     SOIL EXCAV. - 12\"",
    "TOP  SOIL 4\"",
    "TOP  SOIL 12\"",
    "SEEDING & Blanket",
    "SOD",
    "WATER",
    "TRAFFIC",
    " EXTRA WORK ",
    " NOTES ",
    "MIN CHARGE",
    "SUB-TOTAL",
];

/// データ行から住所レコードを構築
pub fn build_address_records(rows: &[Row]) -> Vec<AddressRecord> {
    build_address_records_with_headers(rows, &[])
}

/// ヘッダー名を渡すと、ヘッダーの再掲行も除外する
pub fn build_address_records_with_headers(rows: &[Row], headers: &[String]) -> Vec<AddressRecord> {
    let mut records = Vec::new();

    for row in rows {
        if !headers.is_empty() && is_restated_header(row, headers) {
            continue;
        }

        let address = match address_of(row) {
            Some(address) => address,
            None => continue,
        };

        let id = records.len() as u32 + 1;
        records.push(AddressRecord::new(id, address, work_order_fields(row)));
    }

    records
}

/// ヘッダーの再掲行か判定（ベストエフォート）
///
/// 全セルがテキストで、どれも列名のいずれかと一致する行をヘッダーとみなす。
/// 正規のデータ行を誤判定することがある。
pub fn is_restated_header(row: &Row, headers: &[String]) -> bool {
    if row.is_empty() {
        return false;
    }

    row.values().all(|value| match value.as_text() {
        Some(text) => {
            let text = text.trim();
            headers.iter().any(|h| h.trim() == text)
        }
        None => false,
    })
}

/// 住所列の値（空なら None）
fn address_of(row: &Row) -> Option<String> {
    let value = row.get(ADDRESS_COLUMN).or_else(|| {
        row.iter()
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(ADDRESS_COLUMN))
            .map(|(_, v)| v)
    })?;

    if value.is_blank() {
        return None;
    }

    let address = value.to_display().trim().to_string();
    if address.is_empty() {
        None
    } else {
        Some(address)
    }
}

fn work_order_fields(row: &Row) -> WorkOrderFields {
    let get = |column: &str| row.get(column).map(CellValue::to_display);

    let mut fields = WorkOrderFields {
        work_order_number: get("Work Order #"),
        account: get("Account"),
        eu: get("EU"),
        address2: get("ADDRESS2"),
        top_soil_excav_4: get("TOP     SOIL EXCAV. - 4\""),
        top_soil_excav_12: get("TOP     SOIL EXCAV. - 12\""),
        top_soil_4: get("TOP  SOIL 4\""),
        top_soil_12: get("TOP  SOIL 12\""),
        seeding_blanket: get("SEEDING & Blanket"),
        sod: get("SOD"),
        water: get("WATER"),
        traffic: get("TRAFFIC"),
        extra_work: get(" EXTRA WORK "),
        notes: get(" NOTES "),
        min_charge: get("MIN CHARGE"),
        sub_total: get("SUB-TOTAL"),
        ..Default::default()
    };

    for (column, value) in row {
        if WORK_ORDER_COLUMNS.contains(&column.as_str()) || column.trim().eq_ignore_ascii_case(ADDRESS_COLUMN) {
            continue;
        }
        fields.extra.insert(column.clone(), value.to_display());
    }

    fields
}
