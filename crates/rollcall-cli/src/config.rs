use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// What to do when the recognition service cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackMode {
    /// Answer from the locally registered identities.
    Simulate,
    /// Report the failure.
    None,
}

impl FromStr for FallbackMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simulate" | "simulated" => Ok(FallbackMode::Simulate),
            "none" | "off" => Ok(FallbackMode::None),
            other => Err(format!("unknown fallback mode {other:?}")),
        }
    }
}

/// CLI configuration: defaults, then an optional TOML file, then
/// `ROLLCALL_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the recognition service.
    pub api_url: String,
    /// Path to the SQLite ledger.
    pub db_path: PathBuf,
    pub fallback: FallbackMode,
    /// Mirror marked attendance to `POST /attendance`.
    pub sync: bool,
    pub request_timeout_secs: u64,
    /// Overrides both simulated latencies when set.
    pub simulated_delay_ms: Option<u64>,
    /// Byte quota per stored collection.
    pub storage_quota_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000".to_string(),
            db_path: data_dir().join("ledger.db"),
            fallback: FallbackMode::Simulate,
            sync: true,
            request_timeout_secs: 30,
            simulated_delay_ms: None,
            storage_quota_bytes: rollcall_store::DEFAULT_QUOTA_BYTES,
        }
    }
}

impl Config {
    /// Load from `path` (or `ROLLCALL_CONFIG`) and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("ROLLCALL_CONFIG").ok().map(PathBuf::from));

        let mut config = match file {
            Some(file) => Self::from_file(&file)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("invalid config {}", path.display()))
    }

    /// Apply `ROLLCALL_*` overrides. Unparseable values are ignored.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("ROLLCALL_API_URL") {
            self.api_url = url;
        }
        if let Some(path) = var("ROLLCALL_DB_PATH") {
            self.db_path = PathBuf::from(path);
        }
        self.fallback = env_parse(&var, "ROLLCALL_FALLBACK", self.fallback);
        if let Some(v) = var("ROLLCALL_SYNC") {
            self.sync = v != "0";
        }
        self.request_timeout_secs = env_parse(
            &var,
            "ROLLCALL_REQUEST_TIMEOUT_SECS",
            self.request_timeout_secs,
        );
        if let Some(ms) = var("ROLLCALL_SIMULATED_DELAY_MS") {
            self.simulated_delay_ms = ms.parse().ok().or(self.simulated_delay_ms);
        }
        self.storage_quota_bytes = env_parse(
            &var,
            "ROLLCALL_STORAGE_QUOTA_BYTES",
            self.storage_quota_bytes,
        );
    }
}

fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("rollcall")
}

fn env_parse<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}
