//! 地図ピン編集
//!
//! 状態: Viewing ⇄ Dragging。ドラッグ終了で位置変更を通知し、
//! 一定時間（既定500ms）操作がなければ逆ジオコーディングを1回だけ発行する。
//! 待ち時間中に再度ドラッグされたらタイマーを張り直す。
//! 発行済みの要求は取り消さず、世代番号が最新のものだけを反映する。

use crate::geocode::{resolve_address, Geocoder};
use fieldlog_common::LatLon;
use futures::stream::{FuturesUnordered, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinState {
    Viewing,
    Dragging,
}

/// 逆ジオコーディング要求（発行時の世代付き）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverseRequest {
    pub generation: u64,
    pub at: LatLon,
}

#[derive(Debug)]
pub struct MapPinEditor {
    state: PinState,
    location: LatLon,
    address: String,
    generation: u64,
    debounce: Duration,
    pending: Option<(Instant, ReverseRequest)>,
}

impl MapPinEditor {
    pub fn new(location: LatLon, address: impl Into<String>, debounce: Duration) -> Self {
        Self {
            state: PinState::Viewing,
            location,
            address: address.into(),
            generation: 0,
            debounce,
            pending: None,
        }
    }

    pub fn state(&self) -> PinState {
        self.state
    }

    pub fn location(&self) -> LatLon {
        self.location
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// ドラッグ開始。待機中のタイマーは取り消す
    pub fn drag_start(&mut self) {
        self.state = PinState::Dragging;
        self.generation += 1;
        self.pending = None;
    }

    /// ドラッグ終了。新しい位置を返し、逆ジオコーディングを予約する
    ///
    /// ドラッグ中でなければ何もしない。
    pub fn drag_end(&mut self, at: LatLon, now: Instant) -> Option<LatLon> {
        if self.state != PinState::Dragging {
            tracing::debug!("ドラッグ中ではないため無視: {}", at);
            return None;
        }

        self.state = PinState::Viewing;
        self.location = at;
        self.generation += 1;
        let request = ReverseRequest { generation: self.generation, at };
        self.pending = Some((now + self.debounce, request));
        Some(at)
    }

    /// 予約中の発行時刻
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|(due, _)| due)
    }

    /// 発行時刻を過ぎていれば要求を取り出す
    pub fn poll_due(&mut self, now: Instant) -> Option<ReverseRequest> {
        match self.pending {
            Some((due, request)) if now >= due => {
                self.pending = None;
                Some(request)
            }
            _ => None,
        }
    }

    /// 逆ジオコーディング結果を反映（古い要求なら false）
    pub fn apply_address(&mut self, request: ReverseRequest, address: impl Into<String>) -> bool {
        if request.generation != self.generation {
            tracing::debug!("古い逆ジオコーディング結果を破棄: {}", request.at);
            return false;
        }
        self.address = address.into();
        true
    }

    /// 手入力した住所（発行済み・予約中の結果より優先）
    pub fn set_address(&mut self, address: impl Into<String>) {
        self.generation += 1;
        self.pending = None;
        self.address = address.into();
    }

    /// 写真切替などで位置ごと差し替え
    pub fn reset_to(&mut self, location: LatLon, address: impl Into<String>) {
        self.state = PinState::Viewing;
        self.generation += 1;
        self.pending = None;
        self.location = location;
        self.address = address.into();
    }
}

/// 描画側からの操作
#[derive(Debug, Clone, PartialEq)]
pub enum PinInput {
    DragStart,
    DragEnd(LatLon),
    EditAddress(String),
}

/// 持ち主への通知
#[derive(Debug, Clone, PartialEq)]
pub enum PinOutput {
    LocationChanged(LatLon),
    AddressChanged(String),
}

/// 持ち主へ通知（受信側が閉じていればログのみ）
fn notify(outputs: &mpsc::UnboundedSender<PinOutput>, output: PinOutput) -> bool {
    match outputs.send(output) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!("通知先が閉じているため破棄: {:?}", e.0);
            false
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// ピン編集のイベントループ
///
/// 入力チャネルが閉じた後も、予約中・発行済みの要求を片付けてから終了する。
pub async fn run_pin_editor<G: Geocoder>(
    mut editor: MapPinEditor,
    geocoder: &G,
    mut inputs: mpsc::Receiver<PinInput>,
    outputs: mpsc::UnboundedSender<PinOutput>,
) -> MapPinEditor {
    let mut in_flight = FuturesUnordered::new();
    let mut inputs_closed = false;

    loop {
        if inputs_closed && editor.deadline().is_none() && in_flight.is_empty() {
            break;
        }

        let deadline = editor.deadline();
        tokio::select! {
            input = inputs.recv(), if !inputs_closed => match input {
                Some(PinInput::DragStart) => editor.drag_start(),
                Some(PinInput::DragEnd(at)) => {
                    if let Some(at) = editor.drag_end(at, Instant::now()) {
                        notify(&outputs, PinOutput::LocationChanged(at));
                    }
                }
                Some(PinInput::EditAddress(address)) => {
                    editor.set_address(address.clone());
                    notify(&outputs, PinOutput::AddressChanged(address));
                }
                None => inputs_closed = true,
            },
            _ = sleep_until_opt(deadline) => {
                if let Some(request) = editor.poll_due(Instant::now()) {
                    tracing::debug!("逆ジオコーディング発行: {}", request.at);
                    in_flight.push(async move {
                        let address = resolve_address(geocoder, request.at).await;
                        (request, address)
                    });
                }
            },
            Some((request, address)) = in_flight.next(), if !in_flight.is_empty() => {
                if editor.apply_address(request, address.clone()) {
                    notify(&outputs, PinOutput::AddressChanged(address));
                }
            },
        }
    }

    editor
}
