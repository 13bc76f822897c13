use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::application::services::DEFAULT_MAX_INPUT_CHARS;

/// Default filename used to persist configuration within the data directory.
const CONFIG_FILENAME: &str = "config.json";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_REVIEWS_TABLE: &str = "reviews";

/// Where the sentiment model comes from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "backend", rename_all = "kebab-case")]
pub enum ModelBackend {
    /// Exported linear model (JSON) with an optional separate vectorizer file.
    Linear {
        artifact: PathBuf,
        #[serde(default)]
        vectorizer: Option<PathBuf>,
    },
    /// Remote text-classification pipeline.
    Hosted {
        endpoint: String,
        #[serde(default)]
        token: Option<String>,
        #[serde(default = "default_max_input_chars")]
        max_input_chars: usize,
    },
    /// No model; every classification falls back to neutral.
    #[default]
    Disabled,
}

impl ModelBackend {
    pub fn id(&self) -> &'static str {
        match self {
            ModelBackend::Linear { .. } => "linear",
            ModelBackend::Hosted { .. } => "hosted",
            ModelBackend::Disabled => "disabled",
        }
    }
}

/// Where reviews are persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "backend", rename_all = "kebab-case")]
pub enum StoreBackend {
    /// Embedded sled database under `<data_dir>/store`.
    #[default]
    Local,
    /// Supabase (PostgREST) table.
    Supabase {
        url: String,
        key: String,
        #[serde(default = "default_reviews_table")]
        table: String,
    },
}

impl StoreBackend {
    pub fn id(&self) -> &'static str {
        match self {
            StoreBackend::Local => "local",
            StoreBackend::Supabase { .. } => "supabase",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins; empty means any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

impl ServerSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Complete persisted configuration payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelBackend,
    #[serde(default)]
    pub store: StoreBackend,
    #[serde(default)]
    pub server: ServerSettings,
}

impl AppConfig {
    /// Layers environment variables over the file-based configuration.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| {
            lookup(key).and_then(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
        };

        if let Some(host) = var("ULASAN_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("ULASAN_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!(%port, "ignoring invalid ULASAN_PORT"),
            }
        }
        if let Some(origins) = var("ULASAN_CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(artifact) = var("ULASAN_MODEL_PATH") {
            let vectorizer = var("ULASAN_VECTORIZER_PATH").map(PathBuf::from);
            self.model = ModelBackend::Linear {
                artifact: PathBuf::from(artifact),
                vectorizer,
            };
        } else if let Some(endpoint) = var("ULASAN_MODEL_ENDPOINT") {
            self.model = ModelBackend::Hosted {
                endpoint,
                token: var("ULASAN_MODEL_TOKEN"),
                max_input_chars: default_max_input_chars(),
            };
        }

        if let (Some(url), Some(key)) = (var("SUPABASE_URL"), var("SUPABASE_SERVICE_ROLE_KEY")) {
            let table = match &self.store {
                StoreBackend::Supabase { table, .. } => table.clone(),
                StoreBackend::Local => default_reviews_table(),
            };
            self.store = StoreBackend::Supabase { url, key, table };
        }
        if let Some(name) = var("ULASAN_REVIEWS_TABLE") {
            if let StoreBackend::Supabase { table, .. } = &mut self.store {
                *table = name;
            }
        }
    }
}

/// Thread-safe manager responsible for loading and persisting `AppConfig`.
pub struct ConfigManager {
    path: PathBuf,
    state: RwLock<AppConfig>,
}

impl ConfigManager {
    /// Create a manager rooted at `data_dir`. The JSON file will be located at
    /// `<data_dir>/config.json`.
    pub fn load(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = data_dir.as_ref().join(CONFIG_FILENAME);
        let config = if path.exists() {
            match fs::read(&path).map(|bytes| serde_json::from_slice::<AppConfig>(&bytes)) {
                Ok(Ok(config)) => config,
                Ok(Err(err)) => {
                    warn!(path = %path.display(), error = %err, "invalid config file, using defaults");
                    AppConfig::default()
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "unreadable config file, using defaults");
                    AppConfig::default()
                }
            }
        } else {
            AppConfig::default()
        };

        let manager = Self {
            path,
            state: RwLock::new(config),
        };
        if !manager.path.exists() {
            manager.persist_locked(&manager.state.read())?;
        }
        Ok(manager)
    }

    /// Loads the file, then applies environment overrides in memory only.
    pub fn load_with_env(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let manager = Self::load(data_dir)?;
        manager.state.write().apply_env();
        Ok(manager)
    }

    /// Snapshot of the current configuration.
    pub fn current(&self) -> AppConfig {
        self.state.read().clone()
    }

    /// Ensure the backing directory exists and write the JSON payload.
    fn persist_locked(&self, config: &AppConfig) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_vec_pretty(config)?;
        fs::write(&self.path, payload)
    }
}

/// `ULASAN_DATA_DIR`, or the platform data directory.
pub fn resolve_data_dir() -> anyhow::Result<PathBuf> {
    let dir = match std::env::var("ULASAN_DATA_DIR") {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir.trim()),
        _ => directories::ProjectDirs::from("dev", "ulasan", "Ulasan")
            .ok_or_else(|| anyhow::anyhow!("unable to determine OS data dir"))?
            .data_dir()
            .to_path_buf(),
    };
    fs::create_dir_all(&dir)
        .map_err(|err| anyhow::anyhow!("failed to create data directory {}: {err}", dir.display()))?;
    Ok(dir)
}

const fn default_max_input_chars() -> usize {
    DEFAULT_MAX_INPUT_CHARS
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_reviews_table() -> String {
    DEFAULT_REVIEWS_TABLE.to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_local_and_disabled() {
        let config = AppConfig::default();
        assert_eq!(config.model, ModelBackend::Disabled);
        assert_eq!(config.store, StoreBackend::Local);
        assert_eq!(config.server.bind_address(), "127.0.0.1:5000");
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), b"{not json").unwrap();
        let manager = ConfigManager::load(dir.path()).unwrap();
        assert_eq!(manager.current(), AppConfig::default());
    }

    #[test]
    fn first_load_writes_default_file() {
        let dir = tempfile::tempdir().unwrap();
        ConfigManager::load(dir.path()).unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        assert!(path.exists());

        let written: AppConfig = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(written, AppConfig::default());
    }

    #[test]
    fn env_overrides_are_not_written_back() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::load(dir.path()).unwrap();
        manager
            .state
            .write()
            .apply_overrides(env(&[("ULASAN_PORT", "9000")]));
        assert_eq!(manager.current().server.port, 9000);

        let reloaded = ConfigManager::load(dir.path()).unwrap();
        assert_eq!(reloaded.current().server.port, DEFAULT_PORT);
    }

    #[test]
    fn parses_tagged_backends() {
        let config: AppConfig = serde_json::from_str(
            r#"{
                "model": {"backend": "hosted", "endpoint": "https://example.test/model"},
                "store": {"backend": "supabase", "url": "https://db.test", "key": "secret"}
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.model,
            ModelBackend::Hosted {
                endpoint: "https://example.test/model".into(),
                token: None,
                max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            }
        );
        assert_eq!(
            config.store,
            StoreBackend::Supabase {
                url: "https://db.test".into(),
                key: "secret".into(),
                table: DEFAULT_REVIEWS_TABLE.into(),
            }
        );
        assert_eq!(config.server, ServerSettings::default());
    }

    #[test]
    fn supabase_credentials_switch_to_remote_store() {
        let mut config = AppConfig::default();
        config.apply_overrides(env(&[
            ("SUPABASE_URL", "https://db.test"),
            ("SUPABASE_SERVICE_ROLE_KEY", "service-key"),
            ("ULASAN_REVIEWS_TABLE", "cafe_reviews"),
            ("ULASAN_PORT", "8080"),
        ]));

        assert_eq!(config.store.id(), "supabase");
        assert!(matches!(
            &config.store,
            StoreBackend::Supabase { table, .. } if table == "cafe_reviews"
        ));
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn url_without_key_keeps_local_store() {
        let mut config = AppConfig::default();
        config.apply_overrides(env(&[("SUPABASE_URL", "https://db.test")]));
        assert_eq!(config.store, StoreBackend::Local);
    }

    #[test]
    fn model_path_wins_over_endpoint() {
        let mut config = AppConfig::default();
        config.apply_overrides(env(&[
            ("ULASAN_MODEL_PATH", "/models/linear.json"),
            ("ULASAN_VECTORIZER_PATH", "/models/tfidf.json"),
            ("ULASAN_MODEL_ENDPOINT", "https://example.test"),
        ]));
        assert_eq!(
            config.model,
            ModelBackend::Linear {
                artifact: "/models/linear.json".into(),
                vectorizer: Some("/models/tfidf.json".into()),
            }
        );
    }

    #[test]
    fn invalid_port_is_ignored() {
        let mut config = AppConfig::default();
        config.apply_overrides(env(&[("ULASAN_PORT", "not-a-port"), ("ULASAN_HOST", " 0.0.0.0 ")]));
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.server.host, "0.0.0.0");
    }
}
