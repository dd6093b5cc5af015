//! 取込セッションの統合テスト
//!
//! ジオコーダ・ルートエンジンは遅延付きの偽物に差し替える

use fieldlog::error::FieldLogError;
use fieldlog::geocode::{Geocoder, Lookup};
use fieldlog::markers::{MapObserver, NoopObserver, ViewChange};
use fieldlog::route::{EngineRoute, RouteEngine};
use fieldlog::session::FieldSession;
use fieldlog_common::{CellValue, LatLon, PhotoRef, RouteSummary, Row, SheetData, DEFAULT_MAPS_BASE};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::tempdir;

/// 住所ごとに座標と応答遅延(ms)を決めた偽ジオコーダ
struct DelayedGeocoder {
    answers: HashMap<String, (Option<LatLon>, u64)>,
}

impl DelayedGeocoder {
    fn new(answers: &[(&str, Option<LatLon>, u64)]) -> Self {
        Self {
            answers: answers
                .iter()
                .map(|(address, at, delay)| (address.to_string(), (*at, *delay)))
                .collect(),
        }
    }
}

impl Geocoder for DelayedGeocoder {
    async fn geocode(&self, address: &str) -> Lookup<LatLon> {
        match self.answers.get(address) {
            Some((at, delay)) => {
                tokio::time::sleep(Duration::from_millis(*delay)).await;
                match at {
                    Some(at) => Lookup::Found(*at),
                    None => Lookup::NotFound,
                }
            }
            None => Lookup::Failed("network down".into()),
        }
    }

    async fn reverse(&self, _at: LatLon) -> Lookup<String> {
        Lookup::NotFound
    }
}

/// 受け取った経由地を記録する偽ルートエンジン
struct FixedRouter {
    route: Lookup<EngineRoute>,
    seen: Mutex<Vec<Vec<LatLon>>>,
}

impl FixedRouter {
    fn new(route: Lookup<EngineRoute>) -> Self {
        Self { route, seen: Mutex::new(Vec::new()) }
    }
}

impl RouteEngine for FixedRouter {
    async fn route(&self, waypoints: &[LatLon]) -> Lookup<EngineRoute> {
        self.seen.lock().unwrap().push(waypoints.to_vec());
        self.route.clone()
    }
}

#[derive(Default)]
struct RecordingObserver {
    changes: Vec<ViewChange>,
    routes: Vec<RouteSummary>,
    cleared: usize,
}

impl MapObserver for RecordingObserver {
    fn view_changed(&mut self, change: &ViewChange) {
        self.changes.push(change.clone());
    }

    fn route_found(&mut self, summary: &RouteSummary) {
        self.routes.push(*summary);
    }

    fn route_cleared(&mut self) {
        self.cleared += 1;
    }
}

fn sheet(addresses: &[&str]) -> SheetData {
    let rows = addresses
        .iter()
        .map(|address| {
            let mut row = Row::new();
            row.insert("Address".to_string(), CellValue::Text(address.to_string()));
            row
        })
        .collect();
    SheetData { headers: vec!["Address".into()], lettered: Vec::new(), rows }
}

fn p1() -> LatLon {
    LatLon::new(41.75, -88.15)
}

fn p2() -> LatLon {
    LatLon::new(41.76, -88.32)
}

fn p3() -> LatLon {
    LatLon::new(41.52, -88.08)
}

async fn geocoded_session(geocoder: &DelayedGeocoder) -> FieldSession {
    let mut session = FieldSession::new(DEFAULT_MAPS_BASE);
    session.load_sheet(&sheet(&["1 A St", "2 B St", "3 C St"]));
    session.geocode_all(geocoder, &mut NoopObserver).await;
    session
}

/// 応答の到着順によらず同じ結果になる
#[tokio::test(start_paused = true)]
async fn test_geocode_completion_order_does_not_matter() {
    let fast_first = DelayedGeocoder::new(&[
        ("1 A St", Some(p1()), 10),
        ("2 B St", Some(p2()), 20),
        ("3 C St", Some(p3()), 30),
    ]);
    let slow_first = DelayedGeocoder::new(&[
        ("1 A St", Some(p1()), 30),
        ("2 B St", Some(p2()), 20),
        ("3 C St", Some(p3()), 10),
    ]);

    let a = geocoded_session(&fast_first).await;
    let b = geocoded_session(&slow_first).await;

    assert_eq!(a.addresses(), b.addresses());
    assert_eq!(a.record(1).unwrap().coordinates, Some(p1()));
    assert_eq!(a.record(3).unwrap().coordinates, Some(p3()));
    assert_eq!(a.markers().len(), 3);
    assert_eq!(b.markers().len(), 3);
}

/// 見つからない・失敗の住所は座標なしのまま
#[tokio::test(start_paused = true)]
async fn test_geocode_partial_failures() {
    let geocoder = DelayedGeocoder::new(&[("1 A St", Some(p1()), 5), ("2 B St", None, 5)]);
    let mut session = FieldSession::new(DEFAULT_MAPS_BASE);
    session.load_sheet(&sheet(&["1 A St", "2 B St", "3 C St"]));

    let mut observer = RecordingObserver::default();
    let report = session.geocode_all(&geocoder, &mut observer).await;

    assert_eq!((report.found, report.not_found, report.failed), (1, 1, 1));
    assert_eq!(session.record(1).unwrap().coordinates, Some(p1()));
    assert!(session.record(2).unwrap().coordinates.is_none());
    assert!(session.record(3).unwrap().coordinates.is_none());
    assert_eq!(session.markers().len(), 1);
    // 最初のマーカーで地図中心を合わせる
    assert!(matches!(observer.changes.first(), Some(ViewChange::Center { .. })));
}

/// ルートは一覧順の経由地で要求し、マイル・分で表示する
#[tokio::test(start_paused = true)]
async fn test_route_in_list_order() {
    let geocoder = DelayedGeocoder::new(&[
        ("1 A St", Some(p1()), 30),
        ("2 B St", Some(p2()), 10),
        ("3 C St", Some(p3()), 20),
    ]);
    let mut session = geocoded_session(&geocoder).await;

    let router = FixedRouter::new(Lookup::Found(EngineRoute {
        total_distance_m: 16093.4,
        total_time_s: 2700.0,
    }));
    let mut observer = RecordingObserver::default();
    let summary = session.request_route(&router, &mut observer).await.unwrap().unwrap();

    assert_eq!(router.seen.lock().unwrap().clone(), vec![vec![p1(), p2(), p3()]]);
    assert_eq!(summary.distance_display(), "10.00");
    assert_eq!(summary.total_time_minutes, 45);
    assert_eq!(session.markers().route(), Some(&summary));
    assert_eq!(observer.routes, vec![summary]);

    // 2回目は前のルートを消してから描き直す
    session.request_route(&router, &mut observer).await.unwrap();
    assert_eq!(observer.cleared, 1);
}

/// 座標のある住所が2件未満ならルートを作らない
#[tokio::test(start_paused = true)]
async fn test_route_needs_two_waypoints() {
    let geocoder = DelayedGeocoder::new(&[("1 A St", Some(p1()), 5)]);
    let mut session = geocoded_session(&geocoder).await;

    let router = FixedRouter::new(Lookup::NotFound);
    let err = session.request_route(&router, &mut NoopObserver).await.unwrap_err();

    assert!(matches!(err, FieldLogError::InsufficientWaypoints { found: 1 }));
    assert!(router.seen.lock().unwrap().is_empty());
    assert!(session.markers().route().is_none());
}

/// ルートが見つからない場合はエラーを返し、ルートは空のまま
#[tokio::test(start_paused = true)]
async fn test_route_not_found() {
    let geocoder = DelayedGeocoder::new(&[("1 A St", Some(p1()), 5), ("2 B St", Some(p2()), 5)]);
    let mut session = geocoded_session(&geocoder).await;

    let router = FixedRouter::new(Lookup::NotFound);
    let result = session.request_route(&router, &mut NoopObserver).await;
    assert!(matches!(result, Err(FieldLogError::Lookup(_))));
    assert!(session.markers().route().is_none());
}

/// 再取込すると前回の住所・マーカー・ルートは残らない
#[tokio::test(start_paused = true)]
async fn test_reimport_replaces_everything() {
    let geocoder = DelayedGeocoder::new(&[
        ("1 A St", Some(p1()), 5),
        ("2 B St", Some(p2()), 5),
        ("9 Z St", Some(p3()), 5),
    ]);
    let mut session = geocoded_session(&geocoder).await;
    let router = FixedRouter::new(Lookup::Found(EngineRoute { total_distance_m: 1.0, total_time_s: 1.0 }));
    session.request_route(&router, &mut NoopObserver).await.unwrap();

    session.load_sheet(&sheet(&["9 Z St"]));
    assert_eq!(session.addresses().len(), 1);
    assert_eq!(session.record(1).unwrap().address, "9 Z St");
    assert!(session.markers().is_empty());
    assert!(session.markers().route().is_none());
}

/// 保存したセッションを読み直してリンク・メモを扱う
#[tokio::test(start_paused = true)]
async fn test_save_and_reload_session() {
    let geocoder = DelayedGeocoder::new(&[("1 A St", Some(p1()), 5)]);
    let mut session = geocoded_session(&geocoder).await;
    session.set_comments(1, "dog in yard").unwrap();
    session.attach_photo(1, PhotoRef("data:image/jpeg;base64,AAAA".into())).unwrap();
    assert!(matches!(session.set_comments(99, "x"), Err(FieldLogError::UnknownAddress(99))));

    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("session.json");
    session.save_json(&path).unwrap();

    let mut reloaded = FieldSession::new(DEFAULT_MAPS_BASE);
    reloaded.load_json(&path).unwrap();

    assert_eq!(reloaded.addresses(), session.addresses());
    assert_eq!(reloaded.markers().len(), 1);
    assert_eq!(reloaded.record(1).unwrap().comments, "dog in yard");
    assert_eq!(reloaded.record(1).unwrap().photos.len(), 1);

    assert_eq!(
        reloaded.deep_link(1).unwrap(),
        "maps://maps.apple.com/?q=1+A+St&ll=41.75,-88.15"
    );
    // 座標なしは ll を付けない
    assert_eq!(reloaded.deep_link(2).unwrap(), "maps://maps.apple.com/?q=2+B+St");

    let mut observer = RecordingObserver::default();
    assert!(reloaded.select_marker(1, &mut observer).is_some());
    assert!(reloaded.select_marker(2, &mut observer).is_none());
}

/// 再ジオコーディングで座標が変わるとマーカーも移動する
#[tokio::test(start_paused = true)]
async fn test_regeocode_moves_marker() {
    let mut session = FieldSession::new(DEFAULT_MAPS_BASE);
    session.load_sheet(&sheet(&["1 A St"]));

    let first = DelayedGeocoder::new(&[("1 A St", Some(p1()), 5)]);
    session.geocode_all(&first, &mut NoopObserver).await;

    let second = DelayedGeocoder::new(&[("1 A St", Some(p2()), 5)]);
    session.geocode_all(&second, &mut NoopObserver).await;

    let record = session.record(1).unwrap();
    assert_eq!(record.coordinates, Some(p2()));
    assert_eq!(session.markers().len(), 1);
    assert_eq!(Some(session.markers().find(1).unwrap().position), record.coordinates);

    let mut observer = RecordingObserver::default();
    match session.select_marker(1, &mut observer) {
        Some(ViewChange::Focus { at, .. }) => assert_eq!(at, p2()),
        other => panic!("Focusではない: {:?}", other),
    }
    assert_eq!(session.snapshot().markers[0].position, p2());
}
