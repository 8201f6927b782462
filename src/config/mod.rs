use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_PORT: u16 = 4320;

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

/// Optional `{data_dir}/config.toml` override layer. Every field is optional;
/// anything omitted falls back to built-in defaults.
#[derive(Debug, Default, Deserialize)]
struct TomlConfig {
    /// HTTP server port (default: 4320).
    port: Option<u16>,
    /// Bind address for the HTTP server (default: "127.0.0.1").
    bind_address: Option<String>,
    /// Log level filter string, e.g. "debug", "info,boardd=trace" (default: "info").
    log: Option<String>,
    /// Log output format: "pretty" (default) | "json".
    log_format: Option<String>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            // Config is read before tracing is initialized, so this goes
            // straight to stderr.
            eprintln!(
                "warn: failed to parse '{}': {e} — using defaults",
                path.display()
            );
            None
        }
    }
}

/// Resolved server configuration.
#[derive(Debug, Clone)]
pub struct BoardConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    /// Bind address for the HTTP server (BOARDD_BIND env var, default: "127.0.0.1").
    pub bind_address: String,
    pub log: String,
    /// Log output format: "pretty" (default) | "json".
    pub log_format: String,
}

impl BoardConfig {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in defaults
    pub fn new(
        port: Option<u16>,
        data_dir: Option<PathBuf>,
        bind_address: Option<String>,
        log: Option<String>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        let toml = load_toml(&data_dir).unwrap_or_default();

        let port = port.or(toml.port).unwrap_or(DEFAULT_PORT);

        let bind_address = bind_address
            .or(std::env::var("BOARDD_BIND").ok().filter(|s| !s.is_empty()))
            .or(toml.bind_address)
            .unwrap_or_else(default_bind_address);

        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());

        let log_format = std::env::var("BOARDD_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());

        Self {
            port,
            data_dir,
            bind_address,
            log,
            log_format,
        }
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/boardd
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("boardd");
        }
    }
    #[cfg(target_os = "linux")]
    {
        // $XDG_DATA_HOME/boardd or ~/.local/share/boardd
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("boardd");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("boardd");
        }
    }
    #[cfg(target_os = "windows")]
    {
        // %APPDATA%\boardd
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("boardd");
        }
    }
    // Fallback
    PathBuf::from(".boardd")
}
