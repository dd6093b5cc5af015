//! ドメイン型定義
//!
//! CLIと将来のWebフロントエンドで共有される型:
//! - LatLon: 座標
//! - CellValue / Row / SheetData: Excel取込結果
//! - AddressRecord: 住所（作業指示）1件
//! - TreeRecord: 写真から保存したツリー1件
//! - RouteSummary: ルート計算結果（表示単位）

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// 1マイルあたりのメートル
pub const METERS_PER_MILE: f64 = 1609.34;

/// 緯度経度
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    #[serde(alias = "lng")]
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// 小数6桁の表示（逆ジオコーディング失敗時のフォールバック）
    pub fn to_fixed6(&self) -> String {
        format!("{:.6}, {:.6}", self.lat, self.lon)
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

impl fmt::Display for LatLon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

/// "41.75, -88.15" 形式をパース
impl FromStr for LatLon {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(',').map(str::trim);
        let (lat, lon) = match (parts.next(), parts.next(), parts.next()) {
            (Some(lat), Some(lon), None) => (lat, lon),
            _ => return Err(Error::InvalidCoordinate(s.to_string())),
        };

        let lat: f64 = lat.parse().map_err(|_| Error::InvalidCoordinate(s.to_string()))?;
        let lon: f64 = lon.parse().map_err(|_| Error::InvalidCoordinate(s.to_string()))?;
        let point = LatLon::new(lat, lon);
        if !point.is_valid() {
            return Err(Error::InvalidCoordinate(s.to_string()));
        }
        Ok(point)
    }
}

/// セル値（空セルはRowに含めない）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// 表示用文字列（整数値の数値は小数点なし）
    pub fn to_display(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            CellValue::Number(n) => n.to_string(),
            CellValue::Bool(b) => b.to_string(),
        }
    }

    /// 空白のみのテキストは空扱い
    pub fn is_blank(&self) -> bool {
        matches!(self, CellValue::Text(s) if s.trim().is_empty())
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display())
    }
}

/// 1行分（列名→セル値）
pub type Row = HashMap<String, CellValue>;

/// 先頭シートの読み込み結果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetData {
    /// 検出したヘッダー名（列順）
    pub headers: Vec<String>,
    /// 列記号(A, B, ...)をキーにした全行（ヘッダー行を含む）
    pub lettered: Vec<Row>,
    /// ヘッダー名をキーにしたデータ行
    pub rows: Vec<Row>,
}

/// 作業指示の項目
///
/// 既知の列は名前付きフィールド、それ以外の列は `extra` に保持する。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkOrderFields {
    pub work_order_number: Option<String>,
    pub account: Option<String>,
    pub eu: Option<String>,
    pub address2: Option<String>,
    pub top_soil_excav_4: Option<String>,
    pub top_soil_excav_12: Option<String>,
    pub top_soil_4: Option<String>,
    pub top_soil_12: Option<String>,
    pub seeding_blanket: Option<String>,
    pub sod: Option<String>,
    pub water: Option<String>,
    pub traffic: Option<String>,
    pub extra_work: Option<String>,
    pub notes: Option<String>,
    pub min_charge: Option<String>,
    pub sub_total: Option<String>,
    /// 未知の列
    pub extra: BTreeMap<String, String>,
}

impl WorkOrderFields {
    /// 一覧・ポップアップ用の要約
    pub fn details(&self) -> String {
        let mut lines = vec![
            format!("Work Order: {}", self.work_order_number.as_deref().unwrap_or("")),
            format!("Account: {}", self.account.as_deref().unwrap_or("")),
            format!("EU: {}", self.eu.as_deref().unwrap_or("N/A")),
        ];
        if let Some(notes) = self.notes.as_deref().filter(|n| !n.trim().is_empty()) {
            lines.push(format!("Notes: {}", notes));
        }
        lines.push(format!("Sub-Total: {}", self.sub_total.as_deref().unwrap_or("")));
        lines.join("\n")
    }
}

/// 写真の参照（ファイルパス、data URL など）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoRef(pub String);

impl PhotoRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhotoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 住所（作業指示）1件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressRecord {
    /// 1始まり、取込ごとに安定
    pub id: u32,
    pub address: String,
    pub work_order_fields: WorkOrderFields,
    /// ジオコーディング成功時のみ
    pub coordinates: Option<LatLon>,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub photos: Vec<PhotoRef>,
}

impl AddressRecord {
    pub fn new(id: u32, address: impl Into<String>, work_order_fields: WorkOrderFields) -> Self {
        Self {
            id,
            address: address.into(),
            work_order_fields,
            coordinates: None,
            comments: String::new(),
            photos: Vec::new(),
        }
    }
}

/// ツリーの面
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TreeChoice {
    #[default]
    A,
    B,
    C,
    D,
}

impl TreeChoice {
    pub const ALL: [TreeChoice; 4] = [TreeChoice::A, TreeChoice::B, TreeChoice::C, TreeChoice::D];

    pub fn as_str(&self) -> &'static str {
        match self {
            TreeChoice::A => "A",
            TreeChoice::B => "B",
            TreeChoice::C => "C",
            TreeChoice::D => "D",
        }
    }
}

impl fmt::Display for TreeChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TreeChoice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(TreeChoice::A),
            "B" => Ok(TreeChoice::B),
            "C" => Ok(TreeChoice::C),
            "D" => Ok(TreeChoice::D),
            _ => Err(Error::InvalidChoice(s.to_string())),
        }
    }
}

/// 写真から保存したツリー（保存後は不変）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeRecord {
    pub id: String,
    pub photo_ref: PhotoRef,
    pub choice: TreeChoice,
    pub category: u32,
    pub location: LatLon,
    pub address: String,
    pub timestamp: DateTime<Utc>,
}

impl TreeRecord {
    /// 面＋番号（例: "A3"）
    pub fn label(&self) -> String {
        format!("{}{}", self.choice, self.category)
    }
}

/// ルート計算結果（表示単位）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub total_distance_miles: f64,
    pub total_time_minutes: i64,
}

impl RouteSummary {
    /// エンジン単位（メートル、秒）から変換（マイルは小数2桁に丸める）
    pub fn from_engine_units(total_distance_m: f64, total_time_s: f64) -> Self {
        Self {
            total_distance_miles: (total_distance_m / METERS_PER_MILE * 100.0).round() / 100.0,
            total_time_minutes: (total_time_s / 60.0).round() as i64,
        }
    }

    /// 小数2桁のマイル表示
    pub fn distance_display(&self) -> String {
        format!("{:.2}", self.total_distance_miles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_summary_units() {
        let summary = RouteSummary::from_engine_units(16093.4, 2700.0);
        assert_eq!(summary.distance_display(), "10.00");
        assert_eq!(summary.total_distance_miles, 10.0);
        assert_eq!(summary.total_time_minutes, 45);
        assert_eq!(RouteSummary::from_engine_units(5000.0, 0.0).total_distance_miles, 3.11);

        // 725秒は12.08分
        let summary = RouteSummary::from_engine_units(0.0, 725.0);
        assert_eq!(summary.total_time_minutes, 12);
    }

    #[test]
    fn test_route_summary_rounds_half_up() {
        assert_eq!(RouteSummary::from_engine_units(0.0, 90.0).total_time_minutes, 2);
        assert_eq!(RouteSummary::from_engine_units(0.0, 89.0).total_time_minutes, 1);
    }

    #[test]
    fn test_latlon_parse() {
        let p: LatLon = "41.7508, -88.1535".parse().unwrap();
        assert_eq!(p, LatLon::new(41.7508, -88.1535));

        assert!("41.7508".parse::<LatLon>().is_err());
        assert!("abc, 1".parse::<LatLon>().is_err());
        assert!("91, 0".parse::<LatLon>().is_err());
    }

    #[test]
    fn test_latlon_fixed6() {
        assert_eq!(LatLon::new(41.7508, -88.1535).to_fixed6(), "41.750800, -88.153500");
    }

    #[test]
    fn test_latlon_accepts_lng_alias() {
        let p: LatLon = serde_json::from_str(r#"{"lat": 1.5, "lng": 2.5}"#).unwrap();
        assert_eq!(p, LatLon::new(1.5, 2.5));
    }

    #[test]
    fn test_cell_value_display() {
        assert_eq!(CellValue::Number(1234.0).to_display(), "1234");
        assert_eq!(CellValue::Number(12.5).to_display(), "12.5");
        assert_eq!(CellValue::Text("x".into()).to_display(), "x");
        assert!(CellValue::Text("  ".into()).is_blank());
    }

    #[test]
    fn test_tree_choice_parse() {
        assert_eq!("b".parse::<TreeChoice>().unwrap(), TreeChoice::B);
        assert!("E".parse::<TreeChoice>().is_err());
    }

    #[test]
    fn test_details_summary() {
        let fields = WorkOrderFields {
            work_order_number: Some("WO-1".into()),
            account: Some("ACME".into()),
            sub_total: Some("250".into()),
            ..Default::default()
        };
        let details = fields.details();
        assert!(details.contains("Work Order: WO-1"));
        assert!(details.contains("EU: N/A"));
        assert!(!details.contains("Notes"));
    }
}
