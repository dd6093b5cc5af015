//! ジオコーディング
//!
//! - 正引き: 住所文字列 → 座標（候補リストの先頭を採用）
//! - 逆引き: 座標 → 住所文字列（先頭2要素に短縮、失敗時は座標表示）
//!
//! 結果は `Lookup` で返し、失敗はログに残すだけでエラーにはしない。

use crate::config::Config;
use crate::error::Result;
use fieldlog_common::{display_address, LatLon};
use serde::Deserialize;

/// 外部検索の結果
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    Failed(String),
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(v) => Some(v),
            _ => None,
        }
    }
}

/// 住所検索サービス
#[allow(async_fn_in_trait)]
pub trait Geocoder {
    /// 住所 → 座標
    async fn geocode(&self, address: &str) -> Lookup<LatLon>;

    /// 座標 → 住所（整形前の全文）
    async fn reverse(&self, at: LatLon) -> Lookup<String>;
}

/// 座標から表示用住所を得る
///
/// 先頭2要素に短縮する。見つからない・失敗した場合は小数6桁の座標表示を返す。
pub async fn resolve_address<G: Geocoder>(geocoder: &G, at: LatLon) -> String {
    match geocoder.reverse(at).await {
        Lookup::Found(full) => display_address(Some(&full), at),
        Lookup::NotFound => display_address(None, at),
        Lookup::Failed(reason) => {
            tracing::warn!("逆ジオコーディング失敗 ({}): {}", at, reason);
            display_address(None, at)
        }
    }
}

/// Nominatim (OpenStreetMap) クライアント
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
    reverse_zoom: u8,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
    error: Option<String>,
}

impl NominatimGeocoder {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, reverse_zoom: u8) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            reverse_zoom,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.http_client()?, config.geocoder_url.clone(), config.reverse_zoom))
    }

    async fn get_json(&self, path: &str, params: &[(&str, String)]) -> std::result::Result<serde_json::Value, String> {
        let url = reqwest::Url::parse_with_params(&format!("{}/{}", self.base_url, path), params)
            .map_err(|e| e.to_string())?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| e.to_string())?;

        response.json::<serde_json::Value>().await.map_err(|e| e.to_string())
    }
}

impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, address: &str) -> Lookup<LatLon> {
        let params = [("format", "json".to_string()), ("q", address.to_string())];
        match self.get_json("search", &params).await {
            Ok(json) => parse_search_response(json),
            Err(reason) => Lookup::Failed(reason),
        }
    }

    async fn reverse(&self, at: LatLon) -> Lookup<String> {
        let params = [
            ("format", "json".to_string()),
            ("lat", at.lat.to_string()),
            ("lon", at.lon.to_string()),
            ("zoom", self.reverse_zoom.to_string()),
            ("addressdetails", "1".to_string()),
        ];
        match self.get_json("reverse", &params).await {
            Ok(json) => parse_reverse_response(json),
            Err(reason) => Lookup::Failed(reason),
        }
    }
}

/// 検索結果（候補配列）の先頭を座標にする
fn parse_search_response(json: serde_json::Value) -> Lookup<LatLon> {
    let hits: Vec<SearchHit> = match serde_json::from_value(json) {
        Ok(hits) => hits,
        Err(e) => return Lookup::Failed(format!("検索結果の形式が不正: {}", e)),
    };

    let first = match hits.first() {
        Some(hit) => hit,
        None => return Lookup::NotFound,
    };

    match (first.lat.parse::<f64>(), first.lon.parse::<f64>()) {
        (Ok(lat), Ok(lon)) => Lookup::Found(LatLon::new(lat, lon)),
        _ => Lookup::Failed(format!("座標を解釈できません: {}, {}", first.lat, first.lon)),
    }
}

fn parse_reverse_response(json: serde_json::Value) -> Lookup<String> {
    let response: ReverseResponse = match serde_json::from_value(json) {
        Ok(r) => r,
        Err(e) => return Lookup::Failed(format!("逆引き結果の形式が不正: {}", e)),
    };

    match response.display_name.filter(|s| !s.trim().is_empty()) {
        Some(name) => Lookup::Found(name),
        None => {
            if let Some(error) = response.error {
                tracing::debug!("逆引き結果なし: {}", error);
            }
            Lookup::NotFound
        }
    }
}
