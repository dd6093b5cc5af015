//! ルート計算
//!
//! 座標のある住所を一覧の順にたどるルートを外部エンジン（OSRM）で求める。
//! 訪問順の並べ替え（巡回最適化）は行わない。

use crate::config::Config;
use crate::error::{FieldLogError, Result};
use crate::geocode::Lookup;
use fieldlog_common::{AddressRecord, LatLon};
use serde::Deserialize;

/// 移動手段（OSRMのプロファイル）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RouteProfile {
    #[default]
    Driving,
    Walking,
    Cycling,
}

impl RouteProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteProfile::Driving => "driving",
            RouteProfile::Walking => "walking",
            RouteProfile::Cycling => "cycling",
        }
    }
}

impl std::str::FromStr for RouteProfile {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "driving" | "car" => Ok(RouteProfile::Driving),
            "walking" | "foot" => Ok(RouteProfile::Walking),
            "cycling" | "bike" => Ok(RouteProfile::Cycling),
            _ => Err(format!("Unknown profile: {}. Use driving, walking, or cycling", s)),
        }
    }
}

impl std::fmt::Display for RouteProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// エンジンが返すルート（メートル、秒）
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct EngineRoute {
    #[serde(rename = "distance")]
    pub total_distance_m: f64,
    #[serde(rename = "duration")]
    pub total_time_s: f64,
}

#[allow(async_fn_in_trait)]
pub trait RouteEngine {
    /// 指定順に経由地を通るルート
    async fn route(&self, waypoints: &[LatLon]) -> Lookup<EngineRoute>;
}

/// 座標のある住所を一覧順で経由地にする
pub fn collect_waypoints(records: &[AddressRecord]) -> Result<Vec<LatLon>> {
    let waypoints: Vec<LatLon> = records.iter().filter_map(|r| r.coordinates).collect();
    if waypoints.len() < 2 {
        return Err(FieldLogError::InsufficientWaypoints { found: waypoints.len() });
    }
    Ok(waypoints)
}

/// OSRM Route API クライアント
#[derive(Debug, Clone)]
pub struct OsrmRouter {
    client: reqwest::Client,
    base_url: String,
    profile: RouteProfile,
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<EngineRoute>,
    message: Option<String>,
}

impl OsrmRouter {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            profile: RouteProfile::Driving,
        }
    }

    pub fn with_profile(mut self, profile: RouteProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.http_client()?, config.router_url.clone()))
    }

    /// `/route/v1/driving/lon,lat;lon,lat?overview=false`
    pub fn route_url(&self, waypoints: &[LatLon]) -> String {
        let coords = waypoints
            .iter()
            .map(|p| format!("{},{}", p.lon, p.lat))
            .collect::<Vec<_>>()
            .join(";");
        format!("{}/route/v1/{}/{}?overview=false", self.base_url, self.profile, coords)
    }
}

impl RouteEngine for OsrmRouter {
    async fn route(&self, waypoints: &[LatLon]) -> Lookup<EngineRoute> {
        let url = self.route_url(waypoints);
        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => return Lookup::Failed(e.to_string()),
        };

        // OSRMはルートなしでも4xxでJSONを返す
        match response.json::<serde_json::Value>().await {
            Ok(json) => parse_osrm_response(json),
            Err(e) => Lookup::Failed(e.to_string()),
        }
    }
}

fn parse_osrm_response(json: serde_json::Value) -> Lookup<EngineRoute> {
    let response: OsrmResponse = match serde_json::from_value(json) {
        Ok(r) => r,
        Err(e) => return Lookup::Failed(format!("ルート結果の形式が不正: {}", e)),
    };

    match response.code.as_str() {
        "Ok" => match response.routes.first() {
            Some(route) => Lookup::Found(*route),
            None => Lookup::NotFound,
        },
        "NoRoute" | "NoSegment" => Lookup::NotFound,
        code => Lookup::Failed(format!(
            "{}: {}",
            code,
            response.message.unwrap_or_default()
        )),
    }
}
