//! 写真のGPS位置取得
//!
//! GPSタグがない写真は `Absent`（想定内）、読めないファイルは `ReadError`。
//! どちらもエラーとしては返さない。

use exif::{In, Reader, Tag, Value};
use fieldlog_common::LatLon;
use std::io::Cursor;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub enum PhotoLocation {
    Found(LatLon),
    /// GPS情報なし
    Absent,
    /// 壊れている・未対応の形式
    ReadError(String),
}

/// ファイルを非同期に読んでGPS位置を取り出す
pub async fn read_location(path: &Path) -> PhotoLocation {
    match tokio::fs::read(path).await {
        Ok(bytes) => extract_location(&bytes),
        Err(e) => PhotoLocation::ReadError(e.to_string()),
    }
}

/// 画像バイト列からGPS位置を取り出す
pub fn extract_location(bytes: &[u8]) -> PhotoLocation {
    let mut cursor = Cursor::new(bytes);
    let exif = match Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif,
        // Exifそのものがない
        Err(exif::Error::NotFound(_)) => return PhotoLocation::Absent,
        Err(e) => return PhotoLocation::ReadError(e.to_string()),
    };

    let lat = gps_degrees(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, b'S');
    let lon = gps_degrees(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, b'W');

    match (lat, lon) {
        (Some(lat), Some(lon)) => {
            let at = LatLon::new(lat, lon);
            if at.is_valid() {
                PhotoLocation::Found(at)
            } else {
                tracing::warn!("GPS値が範囲外: {}", at);
                PhotoLocation::Absent
            }
        }
        _ => PhotoLocation::Absent,
    }
}

/// 度分秒（または度のみ）を10進の度に。南緯・西経は負
fn gps_degrees(exif: &exif::Exif, value_tag: Tag, ref_tag: Tag, negative_ref: u8) -> Option<f64> {
    let field = exif.get_field(value_tag, In::PRIMARY)?;

    let degrees = match &field.value {
        Value::Rational(v) if v.len() >= 3 => dms(v[0].to_f64(), v[1].to_f64(), v[2].to_f64()),
        Value::SRational(v) if v.len() >= 3 => dms(v[0].to_f64(), v[1].to_f64(), v[2].to_f64()),
        Value::Rational(v) if !v.is_empty() => v[0].to_f64(),
        Value::SRational(v) if !v.is_empty() => v[0].to_f64(),
        _ => return None,
    };

    let negative = match exif.get_field(ref_tag, In::PRIMARY).map(|f| &f.value) {
        Some(Value::Ascii(parts)) => parts
            .first()
            .and_then(|s| s.first())
            .map(|c| c.to_ascii_uppercase() == negative_ref)
            .unwrap_or(false),
        _ => false,
    };

    Some(if negative { -degrees.abs() } else { degrees })
}

fn dms(degrees: f64, minutes: f64, seconds: f64) -> f64 {
    degrees + minutes / 60.0 + seconds / 3600.0
}
