//! 写真レビュー
//!
//! 写真を1枚ずつ表示し、GPS位置と住所を確認してツリーとして保存する。
//! 写真を切り替えても処理中の取得は取り消さない。各取得は発行時の
//! 写真番号と世代を持ち、現在の写真と一致しない結果は捨てる。

use crate::config::Config;
use crate::error::{FieldLogError, Result};
use crate::geocode::{resolve_address, Geocoder};
use crate::pin_editor::{run_pin_editor, MapPinEditor, PinInput};
use crate::scanner::{self, read_location, ImageInfo, PhotoLocation};
use crate::trees::TreeRecordStore;
use dialoguer::Input;
use fieldlog_common::{LatLon, TreeChoice, TreeRecord};
use std::path::Path;
use tokio::sync::mpsc;

/// 取得処理の識別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewTicket {
    pub generation: u64,
    pub index: usize,
}

/// 位置取得の結果としてユーザーに伝えること
#[derive(Debug, Clone, PartialEq)]
pub enum LocationNotice {
    Located(LatLon),
    /// GPS情報がない（位置情報サービスが無効だった等）
    NoGpsData,
    /// メタデータを読めない
    Unreadable(String),
}

#[derive(Debug)]
pub struct PhotoReview {
    photos: Vec<ImageInfo>,
    current: usize,
    generation: u64,
    location: Option<LatLon>,
    address: String,
    extracting: bool,
    pub choice: TreeChoice,
    pub category: u32,
}

impl PhotoReview {
    pub fn new(photos: Vec<ImageInfo>) -> Self {
        Self {
            photos,
            current: 0,
            generation: 0,
            location: None,
            address: String::new(),
            extracting: false,
            choice: TreeChoice::A,
            category: 1,
        }
    }

    pub fn photos(&self) -> &[ImageInfo] {
        &self.photos
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<&ImageInfo> {
        self.photos.get(self.current)
    }

    pub fn location(&self) -> Option<LatLon> {
        self.location
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_extracting(&self) -> bool {
        self.extracting
    }

    /// 写真を選択し、位置取得を開始する
    pub fn begin(&mut self, index: usize) -> Option<ReviewTicket> {
        if index >= self.photos.len() {
            return None;
        }
        self.current = index;
        self.generation += 1;
        self.location = None;
        self.address.clear();
        self.extracting = true;
        Some(ReviewTicket { generation: self.generation, index })
    }

    fn is_current(&self, ticket: ReviewTicket) -> bool {
        ticket.generation == self.generation && ticket.index == self.current
    }

    /// EXIF取得結果を反映（別の写真の結果なら None）
    pub fn apply_location(&mut self, ticket: ReviewTicket, result: PhotoLocation) -> Option<LocationNotice> {
        if !self.is_current(ticket) {
            tracing::debug!("前の写真の位置取得結果を破棄: #{}", ticket.index);
            return None;
        }

        let notice = match result {
            PhotoLocation::Found(at) => {
                self.location = Some(at);
                LocationNotice::Located(at)
            }
            PhotoLocation::Absent => {
                self.extracting = false;
                LocationNotice::NoGpsData
            }
            PhotoLocation::ReadError(reason) => {
                tracing::error!("メタデータ読み込み失敗: {}", reason);
                self.extracting = false;
                LocationNotice::Unreadable(reason)
            }
        };
        Some(notice)
    }

    /// 住所取得結果を反映（別の写真の結果なら false）
    pub fn apply_address(&mut self, ticket: ReviewTicket, address: impl Into<String>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.address = address.into();
        self.extracting = false;
        true
    }

    /// ピン移動による位置の上書き
    pub fn move_pin(&mut self, at: LatLon, address: impl Into<String>) {
        self.location = Some(at);
        self.address = address.into();
    }

    pub fn set_address(&mut self, address: impl Into<String>) {
        self.address = address.into();
    }

    /// 現在の写真をツリーとして保存し、次の写真へ進む
    ///
    /// 戻り値の ticket は次の写真の位置取得用（最後の写真なら None で一覧を空にする）。
    pub fn save(&mut self, store: &mut TreeRecordStore) -> Result<(TreeRecord, Option<ReviewTicket>)> {
        let photo = self
            .current()
            .ok_or_else(|| FieldLogError::FileNotFound("レビュー中の写真がありません".into()))?
            .photo_ref();

        let tree = store
            .save(photo, self.choice, self.category, self.location, self.address.clone())?
            .clone();

        let next = if self.current + 1 < self.photos.len() {
            self.begin(self.current + 1)
        } else {
            self.photos.clear();
            self.current = 0;
            self.generation += 1;
            self.location = None;
            self.address.clear();
            self.extracting = false;
            None
        };

        self.choice = TreeChoice::A;
        self.category = 1;

        Ok((tree, next))
    }
}

/// 写真のGPS位置と住所を取得
pub async fn locate_photo<G: Geocoder>(path: &Path, geocoder: &G) -> (PhotoLocation, Option<String>) {
    let location = read_location(path).await;
    let address = match &location {
        PhotoLocation::Found(at) => Some(resolve_address(geocoder, *at).await),
        _ => None,
    };
    (location, address)
}

/// ピンを動かして住所を取り直す
pub async fn move_pin_to<G: Geocoder>(
    from: LatLon,
    address: &str,
    to: LatLon,
    geocoder: &G,
    config: &Config,
) -> MapPinEditor {
    let (tx, rx) = mpsc::channel(4);
    let (out_tx, _out_rx) = mpsc::unbounded_channel();
    let editor = MapPinEditor::new(from, address, config.debounce());

    let drag = async move {
        let _ = tx.send(PinInput::DragStart).await;
        let _ = tx.send(PinInput::DragEnd(to)).await;
    };

    let (editor, ()) = tokio::join!(run_pin_editor(editor, geocoder, rx, out_tx), drag);
    editor
}

/// レビュー画面の操作
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewAction {
    Save,
    Choice(TreeChoice),
    Category(u32),
    EditAddress,
    MovePin,
    Next,
    Previous,
    Quit,
}

/// 入力文字列を操作に変換
pub fn parse_review_action(input: &str) -> Option<ReviewAction> {
    let trimmed = input.trim();
    match trimmed {
        "" | "s" => Some(ReviewAction::Save),
        "e" => Some(ReviewAction::EditAddress),
        "m" => Some(ReviewAction::MovePin),
        "n" => Some(ReviewAction::Next),
        "p" => Some(ReviewAction::Previous),
        "q" | "Q" => Some(ReviewAction::Quit),
        _ => {
            if let Ok(choice) = trimmed.parse::<TreeChoice>() {
                return Some(ReviewAction::Choice(choice));
            }
            match trimmed.parse::<u32>() {
                Ok(n) if n >= 1 => Some(ReviewAction::Category(n)),
                _ => None,
            }
        }
    }
}

fn prompt(text: &str, initial: Option<&str>) -> Result<String> {
    let mut input = Input::<String>::new().with_prompt(text).allow_empty(true);
    if let Some(initial) = initial {
        input = input.with_initial_text(initial);
    }
    input
        .interact_text()
        .map_err(|e| FieldLogError::Prompt(e.to_string()))
}

/// 対話式の写真レビュー
pub async fn run_interactive_review<G: Geocoder>(
    folder: &Path,
    output: &Path,
    geocoder: &G,
    config: &Config,
) -> Result<usize> {
    let photos = scanner::scan_folder(folder)?;
    if photos.is_empty() {
        println!("⚠ 写真が見つかりません: {}", folder.display());
        return Ok(0);
    }

    let total = photos.len();
    let mut review = PhotoReview::new(photos);
    let mut store = TreeRecordStore::new();
    let mut ticket = review.begin(0);

    println!("操作: [Enter]保存 [A-D]面 [数字]ツリー番号 [e]住所編集 [m]ピン移動 [n]次 [p]前 [q]終了");
    println!("---\n");

    while let Some(current) = ticket {
        let photo = match review.current() {
            Some(photo) => photo.clone(),
            None => break,
        };
        println!("[{}/{}] {}", current.index + 1, total, photo.file_name);
        println!("  GPS取得中...");

        let (location, address) = locate_photo(&photo.path, geocoder).await;
        match review.apply_location(current, location) {
            Some(LocationNotice::Located(at)) => println!("  位置: {}", at.to_fixed6()),
            Some(LocationNotice::NoGpsData) => {
                println!("  ⚠ GPS情報がありません。撮影時に位置情報サービスが有効だったか確認してください")
            }
            Some(LocationNotice::Unreadable(_)) => {
                println!("  ⚠ 写真のメタデータを読み込めません。別の写真を試してください")
            }
            None => {}
        }
        if let Some(address) = address {
            review.apply_address(current, address);
        }

        // この写真の操作ループ
        loop {
            let shown = if !review.address().is_empty() {
                review.address().to_string()
            } else if let Some(at) = review.location() {
                at.to_fixed6()
            } else {
                "位置情報なし".to_string()
            };
            println!("  住所: {}  ツリーID: {}{}", shown, review.choice, review.category);

            let input = prompt("操作", None)?;
            let action = match parse_review_action(&input) {
                Some(action) => action,
                None => {
                    println!("  ⚠ 無効な入力です");
                    continue;
                }
            };

            match action {
                ReviewAction::Choice(choice) => review.choice = choice,
                ReviewAction::Category(n) => review.category = n,
                ReviewAction::EditAddress => {
                    let edited = prompt("住所", Some(review.address()))?;
                    review.set_address(edited.trim());
                }
                ReviewAction::MovePin => {
                    let from = match review.location() {
                        Some(at) => at,
                        None => {
                            println!("  ⚠ 位置情報がないためピンを動かせません");
                            continue;
                        }
                    };
                    let entered = prompt("新しい座標 (lat, lon)", None)?;
                    let to: LatLon = match entered.parse() {
                        Ok(to) => to,
                        Err(e) => {
                            println!("  ⚠ {}", e);
                            continue;
                        }
                    };
                    let editor = move_pin_to(from, review.address(), to, geocoder, config).await;
                    review.move_pin(editor.location(), editor.address());
                }
                ReviewAction::Save => {
                    if review.location().is_none() {
                        println!("  ⚠ 位置情報がないため保存できません");
                        continue;
                    }
                    if review.address().is_empty() {
                        if let Some(at) = review.location() {
                            review.set_address(resolve_address(geocoder, at).await);
                        }
                    }
                    let (tree, next) = review.save(&mut store)?;
                    println!("  → 保存: {} ({})\n", tree.label(), tree.address);
                    ticket = next;
                    break;
                }
                ReviewAction::Next => {
                    ticket = review.begin(current.index + 1).or(Some(current));
                    if ticket == Some(current) {
                        println!("  最後の写真です");
                        continue;
                    }
                    break;
                }
                ReviewAction::Previous => {
                    if current.index == 0 {
                        println!("  最初の写真です");
                        continue;
                    }
                    ticket = review.begin(current.index - 1);
                    break;
                }
                ReviewAction::Quit => {
                    ticket = None;
                    break;
                }
            }
        }
    }

    store.save_json(output)?;
    println!("\n✓ {}件のツリーを保存しました: {}", store.len(), output.display());
    Ok(store.len())
}
