use crate::client::{ClientConfig, DEFAULT_API_BASE, DEFAULT_MODEL};
use crate::fade::{DEFAULT_FADE_DURATION, DEFAULT_FADE_TICK};
use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::hotkey::{parse_hotkey, Hotkey};
use crate::modes::Mode;
use crate::session::{HistoryPolicy, SessionConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SETTINGS_FILE: &str = "settings.json";

/// Overrides the data directory when set.
pub const HOME_ENV_VAR: &str = "GEMINI_OVERLAY_HOME";

pub const DEFAULT_WINDOW_SIZE: (f32, f32) = (650.0, 550.0);
pub const DEFAULT_WINDOW_POS: (f32, f32) = (200.0, 200.0);
pub const DEFAULT_OFFSCREEN_POS: (f32, f32) = (2000.0, 2000.0);

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    /// Chord that toggles the overlay, e.g. `"Ctrl+Space"` or `"Alt+Space"`.
    #[serde(default = "default_hotkey")]
    pub hotkey: Option<String>,
    /// When enabled the application initialises the logger at debug level.
    #[serde(default)]
    pub debug_logging: bool,
    /// Also write logs to this file.
    #[serde(default)]
    pub log_file: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Timeout for a single generation call. `None` waits indefinitely.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: Option<u64>,
    /// Maximum number of entries kept in the conversation history.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default)]
    pub history_policy: HistoryPolicy,
    /// Send prior turns along with each new query.
    #[serde(default)]
    pub multi_turn: bool,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default = "default_fade_duration_ms")]
    pub fade_duration_ms: u64,
    #[serde(default = "default_fade_tick_ms")]
    pub fade_tick_ms: u64,
    #[serde(default = "default_window_size")]
    pub window_size: Option<(f32, f32)>,
    /// Where the overlay appears when shown.
    #[serde(default = "default_window_pos")]
    pub window_pos: Option<(f32, f32)>,
    /// Position used to park the window off-screen when hidden.
    #[serde(default = "default_offscreen_pos")]
    pub offscreen_pos: Option<(f32, f32)>,
    /// Show the overlay right after start-up. It is also shown whenever no
    /// API key is available.
    #[serde(default)]
    pub show_on_start: bool,
}

fn default_hotkey() -> Option<String> {
    Some("Ctrl+Space".into())
}

fn default_model() -> String {
    DEFAULT_MODEL.into()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.into()
}

fn default_request_timeout() -> Option<u64> {
    Some(60)
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

fn default_fade_duration_ms() -> u64 {
    DEFAULT_FADE_DURATION.as_millis() as u64
}

fn default_fade_tick_ms() -> u64 {
    DEFAULT_FADE_TICK.as_millis() as u64
}

fn default_window_size() -> Option<(f32, f32)> {
    Some(DEFAULT_WINDOW_SIZE)
}

fn default_window_pos() -> Option<(f32, f32)> {
    Some(DEFAULT_WINDOW_POS)
}

fn default_offscreen_pos() -> Option<(f32, f32)> {
    Some(DEFAULT_OFFSCREEN_POS)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hotkey: default_hotkey(),
            debug_logging: false,
            log_file: None,
            model: default_model(),
            api_base: default_api_base(),
            request_timeout_secs: default_request_timeout(),
            history_limit: default_history_limit(),
            history_policy: HistoryPolicy::default(),
            multi_turn: false,
            mode: Mode::default(),
            fade_duration_ms: default_fade_duration_ms(),
            fade_tick_ms: default_fade_tick_ms(),
            window_size: default_window_size(),
            window_pos: default_window_pos(),
            offscreen_pos: default_offscreen_pos(),
            show_on_start: false,
        }
    }
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// Like [`Settings::load`] but never fails: a corrupt file is logged and
    /// replaced by defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path.as_ref()).unwrap_or_else(|e| {
            tracing::warn!(
                "failed to parse settings at {}: {e}; using defaults",
                path.as_ref().display()
            );
            Self::default()
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn hotkey(&self) -> Hotkey {
        if let Some(hotkey) = &self.hotkey {
            match parse_hotkey(hotkey) {
                Some(k) => return k,
                None => {
                    tracing::warn!(
                        "provided hotkey string '{}' is invalid; using default Ctrl+Space",
                        hotkey
                    );
                }
            }
        }
        Hotkey::default()
    }

    pub fn window_size(&self) -> (f32, f32) {
        self.window_size.unwrap_or(DEFAULT_WINDOW_SIZE)
    }

    pub fn window_pos(&self) -> (f32, f32) {
        self.window_pos.unwrap_or(DEFAULT_WINDOW_POS)
    }

    pub fn offscreen_pos(&self) -> (f32, f32) {
        self.offscreen_pos.unwrap_or(DEFAULT_OFFSCREEN_POS)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            mode: self.mode,
            multi_turn: self.multi_turn,
            history_policy: self.history_policy,
            fade_duration: Duration::from_millis(self.fade_duration_ms),
            fade_tick: Duration::from_millis(self.fade_tick_ms),
        }
    }

    pub fn client_config(&self, api_key: impl Into<String>) -> ClientConfig {
        ClientConfig {
            api_key: api_key.into(),
            model: self.model.clone(),
            api_base: self.api_base.clone(),
            timeout: self.request_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Directory holding settings, history and the key file.
///
/// `$GEMINI_OVERLAY_HOME` wins, then the platform config directory, then the
/// current directory.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(HOME_ENV_VAR).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs_next::config_dir()
        .map(|d| d.join("gemini_overlay"))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}
