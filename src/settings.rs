//! Player settings and preferences
//!
//! Persisted in LocalStorage on the web; natively the defaults are used.

use serde::{Deserialize, Serialize};

use crate::Millis;
use crate::consts::*;
use crate::sim::input::KeyBindings;

/// Volume levels, each 0-100
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volumes {
    pub master: u8,
    pub song: u8,
    pub sfx: u8,
}

impl Default for Volumes {
    fn default() -> Self {
        Self {
            master: 100,
            song: 100,
            sfx: 100,
        }
    }
}

impl Volumes {
    /// Song volume after the master scale (0-100)
    pub fn effective_song(&self) -> u8 {
        Self::scaled(self.song, self.master)
    }

    /// SFX volume after the master scale (0-100)
    pub fn effective_sfx(&self) -> u8 {
        Self::scaled(self.sfx, self.master)
    }

    fn scaled(value: u8, master: u8) -> u8 {
        let v = value.min(100) as u32 * master.min(100) as u32;
        ((v + 50) / 100) as u8
    }
}

/// Game settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Backend base URL (http or https)
    pub backend_url: String,
    /// Song requested when starting a match
    pub midi_file: String,

    // === Input ===
    pub keys: KeyBindings,

    // === Audio ===
    pub volumes: Volumes,

    // === Timing overrides (take precedence over the start payload) ===
    pub fall_duration_ms: Option<Millis>,
    pub lead_delay_ms: Option<Millis>,
    pub reaction_time_ms: Option<Millis>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            midi_file: DEFAULT_MIDI_FILE.to_string(),
            keys: KeyBindings::default(),
            volumes: Volumes::default(),
            fall_duration_ms: None,
            lead_delay_ms: None,
            reaction_time_ms: None,
        }
    }
}

impl Settings {
    fn base(&self) -> &str {
        self.backend_url.trim_end_matches('/')
    }

    pub fn health_url(&self) -> String {
        format!("{}/health", self.base())
    }

    pub fn start_url(&self) -> String {
        format!(
            "{}/game/start?midi_file={}",
            self.base(),
            encode_query_value(&self.midi_file)
        )
    }

    /// WebSocket endpoint on the same host (http -> ws, https -> wss)
    pub fn socket_url(&self) -> String {
        let base = self.base();
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        format!("{}/game/ws", ws_base)
    }

    /// LocalStorage key
    #[cfg(target_arch = "wasm32")]
    const STORAGE_KEY: &'static str = "bongaloons_settings";

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                match serde_json::from_str(&json) {
                    Ok(settings) => {
                        log::info!("Loaded settings from LocalStorage");
                        return settings;
                    }
                    Err(e) => log::warn!("Ignoring unreadable settings: {}", e),
                }
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Save settings to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(json) = serde_json::to_string(self) {
                if storage.set_item(Self::STORAGE_KEY, &json).is_ok() {
                    log::info!("Settings saved");
                }
            }
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::default()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }
}

/// Percent-encode a query value the way `encodeURIComponent` does
#[cfg(target_arch = "wasm32")]
fn encode_query_value(value: &str) -> String {
    String::from(js_sys::encode_uri_component(value))
}

#[cfg(not(target_arch = "wasm32"))]
fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' => out.push(byte as char),
            b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')' => out.push(byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let settings = Settings::default();
        assert_eq!(settings.health_url(), "http://127.0.0.1:8000/health");
        assert_eq!(settings.socket_url(), "ws://127.0.0.1:8000/game/ws");
        assert_eq!(
            settings.start_url(),
            "http://127.0.0.1:8000/game/start?midi_file=test.mid"
        );

        let secure = Settings {
            backend_url: "https://bongo.example/".to_string(),
            ..Default::default()
        };
        assert_eq!(secure.socket_url(), "wss://bongo.example/game/ws");
    }

    #[test]
    fn test_start_url_encodes_song_name() {
        let settings = Settings {
            midi_file: "rock & roll #2.mid".to_string(),
            ..Default::default()
        };
        assert_eq!(
            settings.start_url(),
            "http://127.0.0.1:8000/game/start?midi_file=rock%20%26%20roll%20%232.mid"
        );

        let settings = Settings {
            midi_file: "café.mid".to_string(),
            ..Default::default()
        };
        assert!(settings.start_url().ends_with("midi_file=caf%C3%A9.mid"));
    }

    #[test]
    fn test_effective_volume() {
        let volumes = Volumes { master: 50, song: 80, sfx: 100 };
        assert_eq!(volumes.effective_song(), 40);
        assert_eq!(volumes.effective_sfx(), 50);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"keys":{"left":"f","right":"j","pause":"p"},"fall_duration_ms":1500}"#)
                .unwrap();
        assert_eq!(settings.keys.left, "f");
        assert_eq!(settings.fall_duration_ms, Some(1500.0));
        assert_eq!(settings.backend_url, DEFAULT_BACKEND_URL);
        assert_eq!(settings.volumes, Volumes::default());
    }
}
