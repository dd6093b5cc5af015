use clap::Parser;
use fieldlog::{cli, config, error, geocode, logging, markers, review, route, scanner, session, spreadsheet};
use cli::{Cli, Commands};
use config::Config;
use error::{FieldLogError, Result};
use fieldlog_common::{is_restated_header, RouteSummary};
use geocode::{resolve_address, NominatimGeocoder};
use indicatif::{ProgressBar, ProgressStyle};
use markers::{MapObserver, ViewChange};
use route::OsrmRouter;
use scanner::PhotoLocation;
use session::FieldSession;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// ターミナル表示用のオブザーバ
struct ConsoleObserver;

impl MapObserver for ConsoleObserver {
    fn view_changed(&mut self, change: &ViewChange) {
        match change {
            ViewChange::Center { at, zoom } => tracing::debug!("地図中心: {} (zoom {})", at, zoom),
            ViewChange::FitBounds(bounds) => tracing::debug!(
                "表示範囲: {} - {}",
                bounds.south_west,
                bounds.north_east
            ),
            ViewChange::Focus { address_id, at, .. } => {
                tracing::debug!("住所 {} へ移動: {}", address_id, at)
            }
        }
    }

    fn route_found(&mut self, summary: &RouteSummary) {
        tracing::debug!("ルート: {} mi / {} 分", summary.distance_display(), summary.total_time_minutes);
    }
}

fn default_output(input: &Path, file_name: &str) -> PathBuf {
    let dir = if input.is_dir() {
        input
    } else {
        input.parent().unwrap_or(Path::new("."))
    };
    dir.join(file_name)
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{elapsed}]") {
        bar.set_style(style);
    }
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let config = Config::load()?;

    match cli.command {
        Commands::Import { sheet, output, route, profile } => {
            println!("📍 fieldlog - 住所取込\n");

            println!("[1/3] Excelを読み込み中...");
            let data = spreadsheet::parse_workbook_file(&sheet)?;
            let mut session = FieldSession::new(config.maps_base_url.clone());
            let count = session.load_sheet(&data);
            println!("✔ {}件の住所を検出\n", count);

            println!("[2/3] ジオコーディング中...");
            let geocoder = NominatimGeocoder::from_config(&config)?;
            let mut observer = ConsoleObserver;
            let bar = spinner(&format!("{}件を検索", count));
            let report = session.geocode_all(&geocoder, &mut observer).await;
            bar.finish_and_clear();
            println!(
                "✔ 座標取得 {}件 / 見つからず {}件 / 失敗 {}件\n",
                report.found, report.not_found, report.failed
            );

            if route {
                println!("[3/3] ルート計算中...");
                let router = OsrmRouter::from_config(&config)?.with_profile(profile);
                match session.request_route(&router, &mut observer).await {
                    Ok(Some(summary)) => println!(
                        "✔ 総距離 {} mi / 所要 {} 分\n",
                        summary.distance_display(),
                        summary.total_time_minutes
                    ),
                    Ok(None) => {}
                    Err(e @ FieldLogError::InsufficientWaypoints { .. }) => println!("⚠ {}\n", e),
                    Err(e) => println!("⚠ ルートを作成できません: {}\n", e),
                }
            }

            let output = output.unwrap_or_else(|| default_output(&sheet, "session.json"));
            session.save_json(&output)?;
            println!("✔ セッションを保存: {}", output.display());
            println!("\n✅ 取込完了");
        }

        Commands::Preview { sheet, limit } => {
            let data = spreadsheet::parse_workbook_file(&sheet)?;
            // 列記号は長さ→辞書順で列順になる（Z < AA）
            let mut letters: Vec<String> = data
                .lettered
                .iter()
                .flat_map(|row| row.keys().cloned())
                .collect::<std::collections::BTreeSet<_>>()
                .into_iter()
                .collect();
            letters.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

            println!("{}", letters.join("\t"));
            let mut shown = 0;
            for (index, row) in data.lettered.iter().enumerate() {
                if shown >= limit {
                    println!("...（残り {} 行）", data.lettered.len() - index);
                    break;
                }
                // 1行目以外で見出しを繰り返している行は表示しない
                if index > 0 && is_restated_header(row, &data.headers) {
                    continue;
                }
                let cells: Vec<String> = letters
                    .iter()
                    .map(|letter| row.get(letter).map(|c| c.to_display()).unwrap_or_default())
                    .collect();
                println!("{}", cells.join("\t"));
                shown += 1;
            }
        }

        Commands::Link { session: path, id } => {
            let mut session = FieldSession::new(config.maps_base_url.clone());
            session.load_json(&path)?;
            println!("{}", session.deep_link(id)?);
        }

        Commands::Note { session: path, id, comment, photo } => {
            let mut session = FieldSession::new(config.maps_base_url.clone());
            session.load_json(&path)?;

            if let Some(comment) = comment {
                session.set_comments(id, comment)?;
                println!("✔ コメントを更新");
            }
            for photo_path in &photo {
                session.attach_photo(id, scanner::read_data_url(photo_path)?)?;
                println!("✔ 写真を追加: {}", photo_path.display());
            }

            session.save_json(&path)?;
        }

        Commands::Locate { photo } => {
            if !photo.exists() {
                return Err(FieldLogError::FileNotFound(photo.display().to_string()));
            }
            match scanner::read_location(&photo).await {
                PhotoLocation::Found(at) => {
                    let geocoder = NominatimGeocoder::from_config(&config)?;
                    let address = resolve_address(&geocoder, at).await;
                    println!("位置: {}", at.to_fixed6());
                    println!("住所: {}", address);
                }
                PhotoLocation::Absent => {
                    println!("⚠ GPS情報がありません。撮影時に位置情報サービスが有効だったか確認してください");
                }
                PhotoLocation::ReadError(reason) => {
                    return Err(FieldLogError::MetadataRead(reason));
                }
            }
        }

        Commands::Review { folder, output } => {
            println!("🌳 fieldlog - 写真レビュー\n");
            let output = output.unwrap_or_else(|| default_output(&folder, "trees.json"));
            let geocoder = NominatimGeocoder::from_config(&config)?;
            let saved = review::run_interactive_review(&folder, &output, &geocoder, &config).await?;
            println!("\n✅ {}件のツリーを記録: {}", saved, output.display());
        }

        Commands::Config { set_user_agent, set_timeout, show } => {
            let mut config = config;

            if let Some(agent) = set_user_agent {
                config.set_user_agent(agent)?;
                println!("✔ User-Agentを設定しました");
            }

            if let Some(seconds) = set_timeout {
                config.set_timeout(Some(seconds))?;
                println!("✔ タイムアウトを設定しました");
            }

            if show {
                println!("設定:");
                println!("  ジオコーダ: {}", config.geocoder_url);
                println!("  ルートエンジン: {}", config.router_url);
                println!("  User-Agent: {}", config.user_agent);
                println!("  逆引きズーム: {}", config.reverse_zoom);
                println!("  ピン移動の待ち時間: {}ms", config.debounce_ms);
                println!("  地図アプリ: {}", config.maps_base_url);
                match config.timeout_seconds {
                    Some(seconds) => println!("  タイムアウト: {}秒", seconds),
                    None => println!("  タイムアウト: なし"),
                }
            }
        }
    }

    Ok(())
}
