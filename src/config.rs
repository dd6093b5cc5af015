use crate::error::{FieldLogError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Nominatim互換のジオコーダ
    pub geocoder_url: String,
    /// OSRM互換のルーティングエンジン
    pub router_url: String,
    /// Nominatim利用規約によりUser-Agent必須
    pub user_agent: String,
    pub reverse_zoom: u8,
    /// ピンドラッグ後の逆ジオコーディング待ち時間
    pub debounce_ms: u64,
    pub maps_base_url: String,
    /// 未設定ならタイムアウトなし
    pub timeout_seconds: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            geocoder_url: "https://nominatim.openstreetmap.org".into(),
            router_url: "https://router.project-osrm.org".into(),
            user_agent: concat!("fieldlog/", env!("CARGO_PKG_VERSION")).into(),
            reverse_zoom: 18,
            debounce_ms: 500,
            maps_base_url: fieldlog_common::DEFAULT_MAPS_BASE.into(),
            timeout_seconds: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        let config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            serde_json::from_str(&content)?
        } else {
            Self::default()
        };

        Ok(config.with_env_overrides())
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| FieldLogError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("fieldlog").join("config.json"))
    }

    // 環境変数を優先
    fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("FIELDLOG_GEOCODER_URL") {
            self.geocoder_url = url;
        }
        if let Ok(url) = std::env::var("FIELDLOG_ROUTER_URL") {
            self.router_url = url;
        }
        if let Ok(agent) = std::env::var("FIELDLOG_USER_AGENT") {
            self.user_agent = agent;
        }
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }

    /// 共通のHTTPクライアント
    pub fn http_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder().user_agent(self.user_agent.clone());
        if let Some(timeout) = self.timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(builder.build()?)
    }

    pub fn set_user_agent(&mut self, agent: String) -> Result<()> {
        if agent.trim().is_empty() {
            return Err(FieldLogError::Config("User-Agentが空です".into()));
        }
        self.user_agent = agent;
        self.save()
    }

    pub fn set_timeout(&mut self, seconds: Option<u64>) -> Result<()> {
        self.timeout_seconds = seconds.filter(|s| *s > 0);
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_no_timeout() {
        let config = Config::default();
        assert!(config.timeout().is_none());
        assert_eq!(config.debounce(), Duration::from_millis(500));
        assert!(config.user_agent.starts_with("fieldlog/"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"timeout_seconds": 30}"#).unwrap();
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.reverse_zoom, 18);
        assert_eq!(config.geocoder_url, "https://nominatim.openstreetmap.org");
    }
}
