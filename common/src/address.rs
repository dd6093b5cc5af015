//! 住所文字列の整形と地図アプリ連携

use crate::types::LatLon;
use url::form_urlencoded;

/// 既定の地図アプリURL
pub const DEFAULT_MAPS_BASE: &str = "maps://maps.apple.com/";

/// 住所を先頭2要素（番地＋市）に短縮
///
/// "123 Main St, Naperville, IL, 60540, USA" → "123 Main St, Naperville"
pub fn extract_simple_address(full_address: &str) -> String {
    full_address
        .split(',')
        .take(2)
        .collect::<Vec<_>>()
        .join(",")
        .trim()
        .to_string()
}

/// 逆ジオコーディング結果を表示用住所にする
///
/// 住所が得られなければ座標の小数6桁表示にフォールバック（空文字は返さない）。
pub fn display_address(formatted: Option<&str>, at: LatLon) -> String {
    let full = match formatted.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s.to_string(),
        None => at.to_fixed6(),
    };
    extract_simple_address(&full)
}

/// 地図アプリのディープリンク
///
/// `scheme://host/?q=<住所>&ll=<lat>,<lon>`。座標がなければ `ll` を省く。
pub fn maps_deep_link(base: &str, address: &str, coordinates: Option<LatLon>) -> String {
    let query: String = form_urlencoded::byte_serialize(address.as_bytes()).collect();
    match coordinates {
        Some(at) => format!("{}?q={}&ll={},{}", base, query, at.lat, at.lon),
        None => format!("{}?q={}", base, query),
    }
}
