//! Configuration – reads/writes `~/.recall/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use recall_context::registry::RegistryConfig;
use recall_context::session::SessionConfig;
use recall_memory::MemoryConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Where replies come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Responder {
    /// A local Ollama model, falling back to templates when it is offline.
    #[default]
    Ollama,
    /// Offline template replies only.
    Template,
}

impl std::fmt::Display for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Responder::Ollama => write!(f, "ollama"),
            Responder::Template => write!(f, "template"),
        }
    }
}

/// Persisted user configuration stored in `~/.recall/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite file holding session snapshots.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Session restored on startup.
    #[serde(default = "default_session")]
    pub session: String,

    #[serde(default)]
    pub responder: Responder,

    /// Base URL of the Ollama instance.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Ollama model used for replies.
    #[serde(default = "default_model")]
    pub active_model: String,

    #[serde(default = "default_max_items")]
    pub max_items: usize,

    #[serde(default = "default_prune_target")]
    pub prune_target: usize,

    #[serde(default = "default_max_active_contexts")]
    pub max_active_contexts: usize,

    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: f64,

    /// Memories handed to the responder per turn.
    #[serde(default = "default_recall_limit")]
    pub recall_limit: usize,
}

fn default_db_path() -> String {
    recall_dir(&home_dir()).join("recall.db").to_string_lossy().into_owned()
}
fn default_session() -> String {
    "default".to_string()
}
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_model() -> String {
    "llama3".to_string()
}
fn default_max_items() -> usize {
    MemoryConfig::default().max_items
}
fn default_prune_target() -> usize {
    MemoryConfig::default().prune_target
}
fn default_max_active_contexts() -> usize {
    RegistryConfig::default().max_active
}
fn default_relevance_threshold() -> f64 {
    SessionConfig::default().relevance_threshold
}
fn default_recall_limit() -> usize {
    SessionConfig::default().recall_limit
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            session: default_session(),
            responder: Responder::default(),
            ollama_url: default_ollama_url(),
            active_model: default_model(),
            max_items: default_max_items(),
            prune_target: default_prune_target(),
            max_active_contexts: default_max_active_contexts(),
            relevance_threshold: default_relevance_threshold(),
            recall_limit: default_recall_limit(),
        }
    }
}

impl Config {
    /// Session tuning derived from this config.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            memory: MemoryConfig {
                max_items: self.max_items,
                prune_target: self.prune_target.min(self.max_items),
                ..MemoryConfig::default()
            },
            registry: RegistryConfig {
                max_active: self.max_active_contexts,
                ..RegistryConfig::default()
            },
            relevance_threshold: self.relevance_threshold,
            recall_limit: self.recall_limit,
        }
    }
}

fn home_dir() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string())
}

fn recall_dir(home: &str) -> PathBuf {
    PathBuf::from(home).join(".recall")
}

/// Return the path to `~/.recall/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(&home_dir())
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    recall_dir(home).join("config.toml")
}

/// Load the config from disk. Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, ConfigError> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut cfg: Config = toml::from_str(&raw)?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `RECALL_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `RECALL_DB_PATH` | `db_path` |
/// | `RECALL_SESSION` | `session` |
/// | `RECALL_OLLAMA_URL` | `ollama_url` |
/// | `RECALL_MODEL` | `active_model` |
/// | `RECALL_MAX_ITEMS` | `max_items` |
///
/// Unparseable numbers are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("RECALL_DB_PATH") {
        cfg.db_path = v;
    }
    if let Ok(v) = std::env::var("RECALL_SESSION") {
        cfg.session = v;
    }
    if let Ok(v) = std::env::var("RECALL_OLLAMA_URL") {
        cfg.ollama_url = v;
    }
    if let Ok(v) = std::env::var("RECALL_MODEL") {
        cfg.active_model = v;
    }
    if let Ok(v) = std::env::var("RECALL_MAX_ITEMS")
        && let Ok(n) = v.parse::<usize>()
    {
        cfg.max_items = n;
    }
}

/// Save the config to disk, creating `~/.recall/` if necessary.
pub fn save(cfg: &Config) -> Result<(), ConfigError> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        ensure_private_dir(parent)?;
    }
    let raw = toml::to_string_pretty(cfg)?;
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    // Owner-only read/write (rw-------) on Unix.
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(io_err)?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(io_err)?;
    Ok(())
}

/// Create `dir` (and parents) restricted to the owner (rwx------) on Unix.
pub fn ensure_private_dir(dir: &Path) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    };
    fs::create_dir_all(dir).map_err(io_err)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700)).map_err(io_err)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600, "config file must have 0o600 permissions");

        let dir_mode = std::fs::metadata(path.parent().unwrap())
            .expect("dir metadata")
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700, "config directory must have 0o700 permissions");
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let cfg = Config {
            session: "roundtrip".into(),
            responder: Responder::Template,
            ..Config::default()
        };
        save_to(&cfg, &path).expect("save");

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("session = \"roundtrip\""));

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.responder, Responder::Template);
        assert_eq!(loaded.prune_target, 800);
        assert_eq!(loaded.max_active_contexts, 10);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "active_model = \"mistral\"\n").unwrap();
        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.active_model, "mistral");
        assert_eq!(loaded.recall_limit, 5);
        assert_eq!(loaded.relevance_threshold, 0.6);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_items = \"lots\"\n").unwrap();
        assert!(matches!(load_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn config_path_points_to_recall_dir() {
        let p = config_path_for_home("/home/testuser");
        assert_eq!(p, PathBuf::from("/home/testuser/.recall/config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn session_config_caps_prune_target() {
        let cfg = Config {
            max_items: 50,
            prune_target: 800,
            max_active_contexts: 3,
            ..Config::default()
        };
        let session = cfg.session_config();
        assert_eq!(session.memory.max_items, 50);
        assert_eq!(session.memory.prune_target, 50);
        assert_eq!(session.registry.max_active, 3);
    }

    #[test]
    fn apply_env_overrides_changes_session() {
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("RECALL_SESSION", "work") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.session, "work");
        unsafe { std::env::remove_var("RECALL_SESSION") };
    }

    #[test]
    fn apply_env_overrides_changes_model() {
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("RECALL_MODEL", "mistral") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.active_model, "mistral");
        unsafe { std::env::remove_var("RECALL_MODEL") };
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_max_items() {
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("RECALL_MAX_ITEMS", "many") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.max_items, 1000);
        unsafe { std::env::set_var("RECALL_MAX_ITEMS", "250") };
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.max_items, 250);
        unsafe { std::env::remove_var("RECALL_MAX_ITEMS") };
    }
}
