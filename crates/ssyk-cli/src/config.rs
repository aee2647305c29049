use serde::Deserialize;
use ssyk_search::SearchConfig;
use std::path::{Path, PathBuf};

/// Config file read when `--config` is not given, if it exists.
pub const DEFAULT_CONFIG_FILE: &str = "ssyk.toml";

/// Top-level `ssyk.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Root of the data directory; processed files live under `processed/`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Explicit corpus file, overriding the one under `data_dir`.
    #[serde(default)]
    pub corpus_path: Option<PathBuf>,
    /// Explicit income statistics file, overriding the one under `data_dir`.
    #[serde(default)]
    pub income_stats_path: Option<PathBuf>,
    /// HTTP binding, `[server]`.
    #[serde(default)]
    pub server: ServerConfig,
    /// Engine settings. Its `corpus_path` is replaced by [`AppConfig::corpus_path`].
    #[serde(default)]
    pub search: SearchConfig,
}

/// Network binding for the HTTP transport.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind host.
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            corpus_path: None,
            income_stats_path: None,
            server: ServerConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8000
}

impl AppConfig {
    /// Read the config file.
    ///
    /// An explicit path must exist. Without one, `ssyk.toml` in the working
    /// directory is used when present and defaults otherwise.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.exists() {
                    return Ok(Self::default());
                }
                fallback
            }
        };

        let text = std::fs::read_to_string(&path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;
        Self::from_toml(&text)
            .map_err(|e| anyhow::anyhow!("Invalid config file '{}': {}", path.display(), e))
    }

    /// Parse config text; absent keys take their defaults.
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in production.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = var("DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(key) = var("OPENAI_API_KEY") {
            self.search.embedding.api_key = Some(key);
        }
        if let Some(url) = var("OPENAI_BASE_URL") {
            self.search.embedding.base_url = url;
        }
        if let Some(model) = var("EMBEDDING_MODEL") {
            self.search.embedding.model = model;
        }
        if let Some(host) = var("FASTMCP_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("FASTMCP_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid FASTMCP_PORT '{port}': {e}"))?;
        }
        Ok(())
    }

    fn processed_dir(&self) -> PathBuf {
        self.data_dir.join("processed")
    }

    /// Explicit corpus path, else `<data_dir>/processed/ssyk_data.jsonl`.
    pub fn corpus_path(&self) -> PathBuf {
        self.corpus_path
            .clone()
            .unwrap_or_else(|| self.processed_dir().join("ssyk_data.jsonl"))
    }

    /// Explicit statistics path, else `<data_dir>/processed/income_stats.json`.
    pub fn income_stats_path(&self) -> PathBuf {
        self.income_stats_path
            .clone()
            .unwrap_or_else(|| self.processed_dir().join("income_stats.json"))
    }

    /// Engine settings with the resolved corpus path.
    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            corpus_path: self.corpus_path(),
            ..self.search.clone()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(
            config.corpus_path(),
            PathBuf::from("./data/processed/ssyk_data.jsonl")
        );
        assert_eq!(
            config.income_stats_path(),
            PathBuf::from("./data/processed/income_stats.json")
        );
        assert!(!config.search.embedding.has_credential());
    }

    #[test]
    fn test_toml_sections() {
        let config = AppConfig::from_toml(
            r#"
            data_dir = "/srv/ssyk"
            income_stats_path = "/tmp/stats.json"

            [server]
            port = 9000

            [search]
            default_limit = 10

            [search.fusion]
            lexical = 0.5
            semantic = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.income_stats_path(), PathBuf::from("/tmp/stats.json"));

        let search = config.search_config();
        assert_eq!(search.corpus_path, PathBuf::from("/srv/ssyk/processed/ssyk_data.jsonl"));
        assert_eq!(search.default_limit, 10);
        assert!((search.fusion.lexical - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("DATA_DIR", "/data"),
                ("OPENAI_API_KEY", "sk-test"),
                ("EMBEDDING_MODEL", "text-embedding-3-large"),
                ("FASTMCP_HOST", "0.0.0.0"),
                ("FASTMCP_PORT", "8123"),
                ("OPENAI_BASE_URL", ""),
            ]))
            .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/data"));
        assert!(config.search.embedding.has_credential());
        assert_eq!(config.search.embedding.model, "text-embedding-3-large");
        assert_eq!(config.search.embedding.base_url, "https://api.openai.com");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8123);
    }

    #[test]
    fn test_bad_port_is_error() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(env(&[("FASTMCP_PORT", "eighty")]))
            .unwrap_err();
        assert!(err.to_string().contains("FASTMCP_PORT"));
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ssyk.toml");
        std::fs::write(&path, "[server]\nhost = \"0.0.0.0\"\n").unwrap();
        assert_eq!(AppConfig::load(Some(&path)).unwrap().server.host, "0.0.0.0");

        assert!(AppConfig::load(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
