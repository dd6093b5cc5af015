//! 取込セッション
//!
//! 住所一覧・マーカー・ルートを1つのコントローラが所有する。
//! 新しいExcelを取り込むと `reset()` で丸ごと入れ替える（差分マージはしない）。
//!
//! ジオコーディングは全件を待たずに発行し、到着順に反映する。
//! 各リクエストは発行時の住所IDと取込世代を持ち、一致するレコードにしか書き込まない。

use crate::error::{FieldLogError, Result};
use crate::geocode::{Geocoder, Lookup};
use crate::markers::{MapMarker, MapMarkerStore, MapObserver, ViewChange, FOCUS_ZOOM};
use crate::route::{collect_waypoints, RouteEngine};
use fieldlog_common::{
    build_address_records_with_headers, maps_deep_link, AddressRecord, LatLon, PhotoRef,
    RouteSummary, SheetData,
};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// ジオコーディング要求の識別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeocodeTicket {
    pub generation: u64,
    pub address_id: u32,
}

/// ルート要求の識別
#[derive(Debug, Clone, PartialEq)]
pub struct RouteTicket {
    pub generation: u64,
    pub waypoints: Vec<LatLon>,
}

/// 一括ジオコーディングの集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeocodeReport {
    pub found: usize,
    pub not_found: usize,
    pub failed: usize,
}

/// JSON出力用
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub addresses: Vec<AddressRecord>,
    #[serde(default, skip_deserializing)]
    pub markers: Vec<MapMarker>,
    #[serde(default)]
    pub route: Option<RouteSummary>,
}

#[derive(Debug)]
pub struct FieldSession {
    addresses: Vec<AddressRecord>,
    markers: MapMarkerStore,
    import_generation: u64,
    route_generation: u64,
    maps_base_url: String,
}

impl FieldSession {
    pub fn new(maps_base_url: impl Into<String>) -> Self {
        Self {
            addresses: Vec::new(),
            markers: MapMarkerStore::new(),
            import_generation: 0,
            route_generation: 0,
            maps_base_url: maps_base_url.into(),
        }
    }

    /// 住所・マーカー・ルートを破棄（以降、前回分の応答は無視される）
    pub fn reset(&mut self) {
        self.addresses.clear();
        self.markers.clear_all();
        self.import_generation += 1;
        self.route_generation += 1;
    }

    /// シートから住所一覧を作り直す
    pub fn load_sheet(&mut self, sheet: &SheetData) -> usize {
        self.reset();
        self.addresses = build_address_records_with_headers(&sheet.rows, &sheet.headers);
        tracing::info!("住所 {} 件を取り込み", self.addresses.len());
        self.addresses.len()
    }

    pub fn addresses(&self) -> &[AddressRecord] {
        &self.addresses
    }

    pub fn markers(&self) -> &MapMarkerStore {
        &self.markers
    }

    pub fn record(&self, id: u32) -> Option<&AddressRecord> {
        self.addresses.iter().find(|r| r.id == id)
    }

    fn record_mut(&mut self, id: u32) -> Result<&mut AddressRecord> {
        self.addresses
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(FieldLogError::UnknownAddress(id))
    }

    /// 全住所分の要求（ID・世代・住所文字列）
    pub fn geocode_requests(&self) -> Vec<(GeocodeTicket, String)> {
        self.addresses
            .iter()
            .map(|r| {
                let ticket = GeocodeTicket { generation: self.import_generation, address_id: r.id };
                (ticket, r.address.clone())
            })
            .collect()
    }

    /// ジオコーディング結果を発行元のレコードにだけ反映
    ///
    /// 取込世代が違う応答は捨てる。見つからない・失敗の場合は座標を変えない。
    pub fn apply_geocode(&mut self, ticket: GeocodeTicket, lookup: Lookup<LatLon>) -> Option<ViewChange> {
        if ticket.generation != self.import_generation {
            tracing::debug!("前回取込の応答を破棄: id={}", ticket.address_id);
            return None;
        }

        let total = self.addresses.len();
        let record = self.addresses.iter_mut().find(|r| r.id == ticket.address_id)?;

        match lookup {
            Lookup::Found(at) => {
                record.coordinates = Some(at);
                self.markers.upsert(record, total)
            }
            Lookup::NotFound => {
                tracing::warn!("住所が見つかりません: {}", record.address);
                None
            }
            Lookup::Failed(reason) => {
                tracing::error!("ジオコーディング失敗 {}: {}", record.address, reason);
                None
            }
        }
    }

    /// 全住所を一斉にジオコーディングし、到着順に反映
    pub async fn geocode_all<G: Geocoder>(
        &mut self,
        geocoder: &G,
        observer: &mut impl MapObserver,
    ) -> GeocodeReport {
        let mut pending: FuturesUnordered<_> = self
            .geocode_requests()
            .into_iter()
            .map(|(ticket, address)| async move {
                let lookup = geocoder.geocode(&address).await;
                (ticket, lookup)
            })
            .collect();

        let mut report = GeocodeReport::default();
        while let Some((ticket, lookup)) = pending.next().await {
            match &lookup {
                Lookup::Found(_) => report.found += 1,
                Lookup::NotFound => report.not_found += 1,
                Lookup::Failed(_) => report.failed += 1,
            }
            if let Some(change) = self.apply_geocode(ticket, lookup) {
                observer.view_changed(&change);
            }
        }

        report
    }

    /// ルート要求を開始（既存のルートは先に消す）
    pub fn begin_route(&mut self, observer: &mut impl MapObserver) -> Result<RouteTicket> {
        if self.markers.clear_route() {
            observer.route_cleared();
        }
        self.route_generation += 1;

        let waypoints = collect_waypoints(&self.addresses)?;
        Ok(RouteTicket { generation: self.route_generation, waypoints })
    }

    /// ルート結果を反映（古い要求の結果は None）
    pub fn apply_route(
        &mut self,
        ticket: &RouteTicket,
        lookup: Lookup<crate::route::EngineRoute>,
        observer: &mut impl MapObserver,
    ) -> Result<Option<RouteSummary>> {
        if ticket.generation != self.route_generation {
            tracing::debug!("古いルート応答を破棄");
            return Ok(None);
        }

        match lookup {
            Lookup::Found(route) => {
                let summary = RouteSummary::from_engine_units(route.total_distance_m, route.total_time_s);
                self.markers.set_route(summary);
                observer.route_found(&summary);
                Ok(Some(summary))
            }
            Lookup::NotFound => Err(FieldLogError::Lookup("ルートが見つかりません".into())),
            Lookup::Failed(reason) => {
                tracing::error!("ルート計算失敗: {}", reason);
                Err(FieldLogError::Lookup(reason))
            }
        }
    }

    /// 一覧順のルートを計算
    pub async fn request_route<R: RouteEngine>(
        &mut self,
        engine: &R,
        observer: &mut impl MapObserver,
    ) -> Result<Option<RouteSummary>> {
        let ticket = self.begin_route(observer)?;
        let lookup = engine.route(&ticket.waypoints).await;
        self.apply_route(&ticket, lookup, observer)
    }

    /// 一覧から選択したマーカーへ移動
    pub fn select_marker(&self, address_id: u32, observer: &mut impl MapObserver) -> Option<ViewChange> {
        let marker = self.markers.find(address_id)?;
        observer.marker_selected(address_id);
        let change = ViewChange::Focus { address_id, at: marker.position, zoom: FOCUS_ZOOM };
        observer.view_changed(&change);
        Some(change)
    }

    pub fn set_comments(&mut self, address_id: u32, comments: impl Into<String>) -> Result<()> {
        self.record_mut(address_id)?.comments = comments.into();
        Ok(())
    }

    pub fn attach_photo(&mut self, address_id: u32, photo: PhotoRef) -> Result<()> {
        self.record_mut(address_id)?.photos.push(photo);
        Ok(())
    }

    /// 地図アプリのリンク
    pub fn deep_link(&self, address_id: u32) -> Result<String> {
        let record = self.record(address_id).ok_or(FieldLogError::UnknownAddress(address_id))?;
        Ok(maps_deep_link(&self.maps_base_url, &record.address, record.coordinates))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            addresses: self.addresses.clone(),
            markers: self.markers.markers().to_vec(),
            route: self.markers.route().copied(),
        }
    }

    /// 保存済みセッションから復元（マーカーは座標から作り直す）
    pub fn restore(&mut self, snapshot: SessionSnapshot) {
        self.reset();
        self.addresses = snapshot.addresses;
        let total = self.addresses.len();
        for record in &self.addresses {
            self.markers.add(record, total);
        }
        if let Some(route) = snapshot.route {
            self.markers.set_route(route);
        }
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load_json(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(FieldLogError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let snapshot: SessionSnapshot = serde_json::from_str(&content)?;
        self.restore(snapshot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldlog_common::{CellValue, Row, DEFAULT_MAPS_BASE};

    fn sheet(addresses: &[&str]) -> SheetData {
        let rows = addresses
            .iter()
            .map(|a| {
                let mut row = Row::new();
                row.insert("Address".to_string(), CellValue::Text(a.to_string()));
                row
            })
            .collect();
        SheetData { headers: vec!["Address".into()], lettered: Vec::new(), rows }
    }

    fn session_with(addresses: &[&str]) -> FieldSession {
        let mut session = FieldSession::new(DEFAULT_MAPS_BASE);
        session.load_sheet(&sheet(addresses));
        session
    }

    #[test]
    fn test_geocode_order_does_not_matter() {
        let a = LatLon::new(41.0, -88.0);
        let b = LatLon::new(42.0, -87.0);

        let mut first = session_with(&["A St", "B St"]);
        let tickets: Vec<_> = first.geocode_requests().into_iter().map(|(t, _)| t).collect();
        first.apply_geocode(tickets[0], Lookup::Found(a));
        first.apply_geocode(tickets[1], Lookup::Found(b));

        let mut second = session_with(&["A St", "B St"]);
        let tickets: Vec<_> = second.geocode_requests().into_iter().map(|(t, _)| t).collect();
        second.apply_geocode(tickets[1], Lookup::Found(b));
        second.apply_geocode(tickets[0], Lookup::Found(a));

        assert_eq!(first.addresses(), second.addresses());
        assert_eq!(first.record(1).unwrap().coordinates, Some(a));
        assert_eq!(first.record(2).unwrap().coordinates, Some(b));
    }

    #[test]
    fn test_failed_lookup_keeps_coordinates() {
        let mut session = session_with(&["A St"]);
        let (ticket, _) = session.geocode_requests()[0].clone();
        session.apply_geocode(ticket, Lookup::Found(LatLon::new(1.0, 2.0)));
        session.apply_geocode(ticket, Lookup::Failed("timeout".into()));
        session.apply_geocode(ticket, Lookup::NotFound);
        assert_eq!(session.record(1).unwrap().coordinates, Some(LatLon::new(1.0, 2.0)));
    }

    #[test]
    fn test_stale_import_response_ignored() {
        let mut session = session_with(&["Old St"]);
        let (old_ticket, _) = session.geocode_requests()[0].clone();

        session.load_sheet(&sheet(&["New St"]));
        assert!(session.apply_geocode(old_ticket, Lookup::Found(LatLon::new(1.0, 1.0))).is_none());
        assert!(session.record(1).unwrap().coordinates.is_none());
        assert!(session.markers().is_empty());
    }

    #[test]
    fn test_deep_link_and_edits() {
        let mut session = session_with(&["1 Main St"]);
        assert_eq!(session.deep_link(1).unwrap(), "maps://maps.apple.com/?q=1+Main+St");

        session.set_comments(1, "side gate").unwrap();
        session.attach_photo(1, PhotoRef("data:image/jpeg;base64,AAAA".into())).unwrap();
        let record = session.record(1).unwrap();
        assert_eq!(record.comments, "side gate");
        assert_eq!(record.photos.len(), 1);

        assert!(matches!(session.set_comments(9, "x"), Err(FieldLogError::UnknownAddress(9))));
        assert!(session.deep_link(9).is_err());
    }

    #[test]
    fn test_restore_rebuilds_markers() {
        let mut session = session_with(&["A St", "B St"]);
        let tickets: Vec<_> = session.geocode_requests().into_iter().map(|(t, _)| t).collect();
        session.apply_geocode(tickets[0], Lookup::Found(LatLon::new(1.0, 1.0)));

        let json = serde_json::to_string(&session.snapshot()).unwrap();
        let snapshot: SessionSnapshot = serde_json::from_str(&json).unwrap();

        let mut restored = FieldSession::new(DEFAULT_MAPS_BASE);
        restored.restore(snapshot);
        assert_eq!(restored.addresses().len(), 2);
        assert_eq!(restored.markers().len(), 1);
        assert!(restored.markers().find(1).is_some());
    }
}
