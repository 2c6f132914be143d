// =============================================================================
// Runtime Configuration — Engine settings with atomic save
// =============================================================================
//
// Every tunable lives here: tracked symbols, buffer sizing, ensemble weights,
// gate thresholds and cooldown, feed endpoint, persistence.
//
// Saved as JSON via tmp file + rename, so a crash mid-write leaves the old
// file intact. Every field has a serde default; a partial or older file
// loads with the missing settings filled in.
//
// The feed credential is read from the environment only and is never written
// back to disk.
// =============================================================================

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::features::MIN_FEATURE_HISTORY;
use crate::signal_gate::{SignalExpiry, SignalThresholds};
use crate::signals::EnsembleWeights;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbols() -> Vec<String> {
    vec!["R_100".to_string(), "R_50".to_string()]
}

fn default_buffer_capacity() -> usize {
    500
}

fn default_cooldown_ms() -> u64 {
    5_000
}

fn default_parity_bonus() -> f64 {
    0.04
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_feed_url() -> String {
    "wss://ws.derivws.com/websockets/v3".to_string()
}

fn default_app_id() -> String {
    "1089".to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    3
}

fn default_keepalive_secs() -> u64 {
    30
}

// =============================================================================
// FeedConfig
// =============================================================================

/// Upstream tick feed connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// WebSocket endpoint without query string.
    #[serde(default = "default_feed_url")]
    pub url: String,

    /// Application id appended as `?app_id=`.
    #[serde(default = "default_app_id")]
    pub app_id: String,

    /// Fixed delay between reconnect attempts.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    /// Interval between keepalive pings while connected. 0 disables.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    /// Optional credential for the authorize step. Env only.
    #[serde(skip)]
    pub api_token: Option<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            app_id: default_app_id(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            keepalive_secs: default_keepalive_secs(),
            api_token: None,
        }
    }
}

impl FeedConfig {
    /// Full connection URL including the app id.
    ///
    /// A bare `scheme://host` gets a `/` path so the handshake has a valid
    /// request target; an existing query string is extended with `&`.
    pub fn endpoint(&self) -> String {
        let url = self.url.trim();
        let authority_start = url.find("://").map(|i| i + 3).unwrap_or(0);
        let authority_end = url[authority_start..]
            .find(&['/', '?', '#'][..])
            .map(|i| authority_start + i)
            .unwrap_or(url.len());

        let (head, rest) = url.split_at(authority_end);
        let base = if rest.starts_with('/') {
            url.to_string()
        } else {
            format!("{head}/{rest}")
        };

        let separator = if base.contains('?') { '&' } else { '?' };
        format!("{base}{separator}app_id={}", self.app_id)
    }
}

// =============================================================================
// PersistenceConfig
// =============================================================================

/// Optional JSON-lines sink.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// File to append records to. `None` disables persistence.
    #[serde(default)]
    pub path: Option<String>,

    /// Also persist every tick, not just signals.
    #[serde(default)]
    pub persist_ticks: bool,
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level configuration for the Tickscope engine and its adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Engine --------------------------------------------------------------

    /// Symbols subscribed on the feed. The first two form the matches pair.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Maximum prices retained per symbol.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Ensemble blend weights; must sum to 1.
    #[serde(default)]
    pub weights: EnsembleWeights,

    /// Minimum confidence per signal type.
    #[serde(default)]
    pub thresholds: SignalThresholds,

    /// Contract horizon per signal type.
    #[serde(default)]
    pub expiry: SignalExpiry,

    /// Minimum time between any two emitted signals.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Confidence boost for even last digits.
    #[serde(default = "default_parity_bonus")]
    pub parity_bonus: f64,

    // --- Adapters ------------------------------------------------------------

    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Address for the subscriber API.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Token subscribers must present on `/api/v1/ws`. Env only; `None`
    /// leaves the stream open.
    #[serde(skip)]
    pub subscriber_token: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            buffer_capacity: default_buffer_capacity(),
            weights: EnsembleWeights::default(),
            thresholds: SignalThresholds::default(),
            expiry: SignalExpiry::default(),
            cooldown_ms: default_cooldown_ms(),
            parity_bonus: default_parity_bonus(),
            feed: FeedConfig::default(),
            persistence: PersistenceConfig::default(),
            bind_addr: default_bind_addr(),
            subscriber_token: None,
        }
    }
}

impl RuntimeConfig {
    /// Read a JSON config file. A missing or unparseable file is an error;
    /// the binary falls back to defaults in that case.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            cooldown_ms = config.cooldown_ms,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Write the configuration to `path` atomically. Env-only credentials
    /// are skipped.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Apply overrides from an arbitrary lookup (the environment in
    /// production, a map in tests).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(syms) = lookup("TICKSCOPE_SYMBOLS") {
            let symbols: Vec<String> = syms
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !symbols.is_empty() {
                self.symbols = symbols;
            }
        }
        if let Some(app_id) = lookup("DERIV_APP_ID").filter(|v| !v.trim().is_empty()) {
            self.feed.app_id = app_id.trim().to_string();
        }
        if let Some(token) = lookup("DERIV_API_TOKEN").filter(|v| !v.trim().is_empty()) {
            self.feed.api_token = Some(token.trim().to_string());
        }
        if let Some(addr) = lookup("TICKSCOPE_BIND_ADDR").filter(|v| !v.trim().is_empty()) {
            self.bind_addr = addr.trim().to_string();
        }
        if let Some(token) = lookup("TICKSCOPE_SUBSCRIBER_TOKEN").filter(|v| !v.trim().is_empty()) {
            self.subscriber_token = Some(token.trim().to_string());
        }
        if let Some(path) = lookup("TICKSCOPE_PERSIST_PATH").filter(|v| !v.trim().is_empty()) {
            self.persistence.path = Some(path.trim().to_string());
        }
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.symbols.is_empty() {
            bail!("at least one symbol must be configured");
        }
        if self.buffer_capacity < MIN_FEATURE_HISTORY {
            bail!(
                "buffer_capacity {} is below the {} samples features need",
                self.buffer_capacity,
                MIN_FEATURE_HISTORY
            );
        }
        self.weights.validate()?;

        for (name, t) in [
            ("over_under", self.thresholds.over_under),
            ("even_odd", self.thresholds.even_odd),
            ("matches", self.thresholds.matches),
        ] {
            if !(0.0..=1.0).contains(&t) {
                bail!("threshold {name} must be within [0, 1], got {t}");
            }
        }

        if !self.parity_bonus.is_finite() || !(0.03..=0.05).contains(&self.parity_bonus) {
            bail!("parity_bonus must be within [0.03, 0.05], got {}", self.parity_bonus);
        }
        Ok(())
    }
}

// =============================================================================
// LayeredConfig
// =============================================================================

/// The config as read from disk, next to the effective config the process
/// runs with (file values plus environment overrides). Only the file layer
/// is ever written back, so an override never outlives its variable.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub file: RuntimeConfig,
    pub effective: RuntimeConfig,
}

impl LayeredConfig {
    pub fn new(file: RuntimeConfig, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut effective = file.clone();
        effective.apply_overrides(lookup);
        Self { file, effective }
    }

    /// Layer `TICKSCOPE_*` / `DERIV_*` variables from the process environment.
    pub fn from_env(file: RuntimeConfig) -> Self {
        Self::new(file, |key| std::env::var(key).ok())
    }

    /// Save the file layer.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.file.save(path)
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.symbols, vec!["R_100", "R_50"]);
        assert_eq!(cfg.buffer_capacity, 500);
        assert_eq!(cfg.cooldown_ms, 5_000);
        assert!((cfg.parity_bonus - 0.04).abs() < f64::EPSILON);
        assert!((cfg.weights.momentum - 0.45).abs() < f64::EPSILON);
        assert_eq!(cfg.feed.reconnect_delay_secs, 3);
        assert!(cfg.feed.api_token.is_none());
        assert!(cfg.persistence.path.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.symbols.len(), 2);
        assert_eq!(cfg.buffer_capacity, 500);
        assert!((cfg.thresholds.even_odd - 0.52).abs() < f64::EPSILON);
        assert_eq!(cfg.expiry.over_under, 60);
        assert_eq!(cfg.feed.app_id, "1089");
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "symbols": ["1HZ100V"], "weights": { "momentum": 0.5, "trend": 0.35, "volatility": 0.15 }, "feed": { "reconnect_delay_secs": 10 } }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.symbols, vec!["1HZ100V"]);
        assert!((cfg.weights.volatility - 0.15).abs() < f64::EPSILON);
        assert_eq!(cfg.feed.reconnect_delay_secs, 10);
        assert_eq!(cfg.feed.keepalive_secs, 30);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn api_token_is_never_serialised() {
        let mut cfg = RuntimeConfig::default();
        cfg.feed.api_token = Some("secret".into());
        cfg.subscriber_token = Some("hidden".into());
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(!json.contains("secret"));
        assert!(!json.contains("hidden"));
    }

    #[test]
    fn endpoint_includes_app_id() {
        let feed = FeedConfig::default();
        assert_eq!(feed.endpoint(), "wss://ws.derivws.com/websockets/v3?app_id=1089");
    }

    #[test]
    fn endpoint_adds_root_path_to_bare_host() {
        let feed = FeedConfig {
            url: "ws://127.0.0.1:9000".into(),
            ..FeedConfig::default()
        };
        assert_eq!(feed.endpoint(), "ws://127.0.0.1:9000/?app_id=1089");

        let feed = FeedConfig {
            url: "ws://127.0.0.1:9000?l=EN".into(),
            ..FeedConfig::default()
        };
        assert_eq!(feed.endpoint(), "ws://127.0.0.1:9000/?l=EN&app_id=1089");
    }

    #[test]
    fn endpoint_extends_existing_query() {
        let feed = FeedConfig {
            url: "wss://ws.example.com/v3?l=EN".into(),
            app_id: "42".into(),
            ..FeedConfig::default()
        };
        assert_eq!(feed.endpoint(), "wss://ws.example.com/v3?l=EN&app_id=42");
    }

    #[test]
    fn overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("TICKSCOPE_SYMBOLS", " R_10, R_25 ,,"),
            ("DERIV_API_TOKEN", "tok"),
            ("DERIV_APP_ID", "42"),
            ("TICKSCOPE_BIND_ADDR", "127.0.0.1:9000"),
            ("TICKSCOPE_PERSIST_PATH", "/tmp/ticks.jsonl"),
            ("TICKSCOPE_SUBSCRIBER_TOKEN", "sub"),
        ]
        .into_iter()
        .collect();

        let mut cfg = RuntimeConfig::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.symbols, vec!["R_10", "R_25"]);
        assert_eq!(cfg.feed.api_token.as_deref(), Some("tok"));
        assert_eq!(cfg.feed.app_id, "42");
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
        assert_eq!(cfg.persistence.path.as_deref(), Some("/tmp/ticks.jsonl"));
        assert_eq!(cfg.subscriber_token.as_deref(), Some("sub"));
    }

    #[test]
    fn blank_overrides_are_ignored() {
        let mut cfg = RuntimeConfig::default();
        cfg.apply_overrides(|k| (k == "TICKSCOPE_SYMBOLS" || k == "DERIV_API_TOKEN").then(|| " ".to_string()));
        assert_eq!(cfg.symbols, vec!["R_100", "R_50"]);
        assert!(cfg.feed.api_token.is_none());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = RuntimeConfig::default();
        cfg.buffer_capacity = 10;
        assert!(cfg.validate().is_err());

        let mut cfg = RuntimeConfig::default();
        cfg.symbols.clear();
        assert!(cfg.validate().is_err());

        let mut cfg = RuntimeConfig::default();
        cfg.weights.momentum = 0.9;
        assert!(cfg.validate().is_err());

        let mut cfg = RuntimeConfig::default();
        cfg.thresholds.matches = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = RuntimeConfig::default();
        cfg.parity_bonus = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parity_bonus_range_is_three_to_five_hundredths() {
        for (bonus, ok) in [(0.02, false), (0.03, true), (0.05, true), (0.06, false), (0.3, false)] {
            let cfg = RuntimeConfig {
                parity_bonus: bonus,
                ..RuntimeConfig::default()
            };
            assert_eq!(cfg.validate().is_ok(), ok, "bonus {bonus}");
        }
    }

    #[test]
    fn env_overrides_are_not_saved() {
        let path = std::env::temp_dir().join(format!("tickscope_layers_{}.json", uuid::Uuid::new_v4()));
        let file = RuntimeConfig {
            cooldown_ms: 7_000,
            ..RuntimeConfig::default()
        };
        let env: HashMap<&str, &str> = [
            ("TICKSCOPE_SYMBOLS", "R_10"),
            ("TICKSCOPE_BIND_ADDR", "127.0.0.1:9000"),
            ("TICKSCOPE_PERSIST_PATH", "/tmp/ticks.jsonl"),
        ]
        .into_iter()
        .collect();

        let layers = LayeredConfig::new(file, |k| env.get(k).map(|v| v.to_string()));
        assert_eq!(layers.effective.symbols, vec!["R_10"]);
        assert_eq!(layers.effective.bind_addr, "127.0.0.1:9000");
        assert_eq!(layers.effective.cooldown_ms, 7_000);

        layers.save(&path).unwrap();
        let saved = RuntimeConfig::load(&path).unwrap();
        assert_eq!(saved.symbols, vec!["R_100", "R_50"]);
        assert_eq!(saved.bind_addr, "0.0.0.0:3001");
        assert!(saved.persistence.path.is_none());
        assert_eq!(saved.cooldown_ms, 7_000);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let path = std::env::temp_dir().join(format!("tickscope_cfg_{}.json", uuid::Uuid::new_v4()));
        let mut cfg = RuntimeConfig::default();
        cfg.cooldown_ms = 1_234;
        cfg.save(&path).unwrap();

        let loaded = RuntimeConfig::load(&path).unwrap();
        assert_eq!(loaded.cooldown_ms, 1_234);
        assert_eq!(loaded.symbols, cfg.symbols);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn load_missing_file_errors() {
        assert!(RuntimeConfig::load("/nonexistent/tickscope.json").is_err());
    }
}
