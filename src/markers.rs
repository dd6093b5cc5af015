//! 地図マーカー管理
//!
//! 座標のある住所1件につきマーカー1つ。描画はしない。
//! 表示位置の変更は `ViewChange` として返し、描画側（オブザーバ）に任せる。

use fieldlog_common::{AddressRecord, LatLon, RouteSummary};
use serde::Serialize;

/// 最初のマーカーを中心にする時のズーム
pub const FIRST_MARKER_ZOOM: u8 = 13;
/// 一覧から選択した時のズーム
pub const FOCUS_ZOOM: u8 = 16;
/// 全マーカー表示時の余白（範囲に対する比率）
pub const FIT_PADDING: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapMarker {
    pub address_id: u32,
    pub position: LatLon,
    pub label: String,
}

/// 表示範囲
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub south_west: LatLon,
    pub north_east: LatLon,
}

impl Bounds {
    pub fn around(points: impl IntoIterator<Item = LatLon>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Bounds { south_west: first, north_east: first };
        for p in iter {
            bounds.south_west.lat = bounds.south_west.lat.min(p.lat);
            bounds.south_west.lon = bounds.south_west.lon.min(p.lon);
            bounds.north_east.lat = bounds.north_east.lat.max(p.lat);
            bounds.north_east.lon = bounds.north_east.lon.max(p.lon);
        }
        Some(bounds)
    }

    /// 各辺を範囲の `ratio` 倍だけ広げる
    pub fn pad(&self, ratio: f64) -> Self {
        let dlat = (self.north_east.lat - self.south_west.lat).abs() * ratio;
        let dlon = (self.north_east.lon - self.south_west.lon).abs() * ratio;
        Bounds {
            south_west: LatLon::new(self.south_west.lat - dlat, self.south_west.lon - dlon),
            north_east: LatLon::new(self.north_east.lat + dlat, self.north_east.lon + dlon),
        }
    }
}

/// 描画側への表示変更
#[derive(Debug, Clone, PartialEq)]
pub enum ViewChange {
    /// 最初のマーカーを中心に
    Center { at: LatLon, zoom: u8 },
    /// 全マーカーが入るように
    FitBounds(Bounds),
    /// 選択したマーカーへ
    Focus { address_id: u32, at: LatLon, zoom: u8 },
}

/// 描画側のコールバック（既定は何もしない）
pub trait MapObserver {
    fn view_changed(&mut self, _change: &ViewChange) {}

    fn marker_selected(&mut self, _address_id: u32) {}

    fn route_found(&mut self, _summary: &RouteSummary) {}

    fn route_cleared(&mut self) {}
}

/// 何もしないオブザーバ
pub struct NoopObserver;

impl MapObserver for NoopObserver {}

#[derive(Debug, Default)]
pub struct MapMarkerStore {
    markers: Vec<MapMarker>,
    route: Option<RouteSummary>,
}

impl MapMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// マーカー追加（同じ住所IDは追加しない）
    ///
    /// 1件目なら中心移動、`total_addresses` 件に達したら全体表示を返す。
    /// 到着順は住所順と一致しないため、最後に追加されたものが最後の住所とは限らない。
    pub fn add(&mut self, record: &AddressRecord, total_addresses: usize) -> Option<ViewChange> {
        let position = record.coordinates?;
        if self.contains(record.id) {
            return None;
        }

        self.markers.push(MapMarker {
            address_id: record.id,
            position,
            label: record.address.clone(),
        });

        if self.markers.len() == 1 {
            Some(ViewChange::Center { at: position, zoom: FIRST_MARKER_ZOOM })
        } else if self.markers.len() == total_addresses {
            Bounds::around(self.markers.iter().map(|m| m.position))
                .map(|b| ViewChange::FitBounds(b.pad(FIT_PADDING)))
        } else {
            None
        }
    }

    /// 追加、または同じ住所IDのマーカーを新しい座標・ラベルへ移動
    ///
    /// 移動した場合は表示変更を返さない。
    pub fn upsert(&mut self, record: &AddressRecord, total_addresses: usize) -> Option<ViewChange> {
        let position = record.coordinates?;
        match self.markers.iter_mut().find(|m| m.address_id == record.id) {
            Some(marker) => {
                marker.position = position;
                marker.label = record.address.clone();
                None
            }
            None => self.add(record, total_addresses),
        }
    }

    /// 全マーカーとルートを消す
    pub fn clear_all(&mut self) {
        self.markers.clear();
        self.route = None;
    }

    pub fn contains(&self, address_id: u32) -> bool {
        self.markers.iter().any(|m| m.address_id == address_id)
    }

    pub fn find(&self, address_id: u32) -> Option<&MapMarker> {
        self.markers.iter().find(|m| m.address_id == address_id)
    }

    pub fn markers(&self) -> &[MapMarker] {
        &self.markers
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn route(&self) -> Option<&RouteSummary> {
        self.route.as_ref()
    }

    pub fn set_route(&mut self, summary: RouteSummary) {
        self.route = Some(summary);
    }

    pub fn clear_route(&mut self) -> bool {
        self.route.take().is_some()
    }
}
