use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::semantic::DEFAULT_MODEL;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
/// Maximum accepted search query length in characters
const DEFAULT_MAX_QUERY_LENGTH: usize = 500;
/// Maximum accepted k for a single search
const DEFAULT_MAX_RESULTS: usize = 100;
/// Maximum accepted identifier length in characters
const DEFAULT_MAX_IDENTIFIER_LENGTH: usize = 256;

/// Environment variable consulted when the config file has no API key
pub const API_KEY_ENV: &str = "SEMDEX_API_KEY";

/// Configuration for the semantic index core
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Embedding model name (e.g., "all-MiniLM-L6-v2")
    #[serde(default = "default_model")]
    pub model: String,

    /// Longest search query accepted, in characters
    #[serde(default = "default_max_query_length")]
    pub max_query_length: usize,

    /// Largest k accepted for a single search
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Longest document identifier accepted, in characters
    #[serde(default = "default_max_identifier_length")]
    pub max_identifier_length: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_query_length: DEFAULT_MAX_QUERY_LENGTH,
            max_results: DEFAULT_MAX_RESULTS,
            max_identifier_length: DEFAULT_MAX_IDENTIFIER_LENGTH,
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_query_length() -> usize {
    DEFAULT_MAX_QUERY_LENGTH
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

fn default_max_identifier_length() -> usize {
    DEFAULT_MAX_IDENTIFIER_LENGTH
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Address the HTTP daemon binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// API key for the HTTP endpoints; empty means "use the environment
    /// variable, else generate one per daemon run"
    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            api_key: String::new(),
            index: IndexConfig::default(),
            base_path: PathBuf::new(),
        }
    }
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

impl Config {
    fn validate(&self) {
        if self.listen_addr.parse::<SocketAddr>().is_err() {
            panic!("listen_addr is not a valid socket address: {:?}", self.listen_addr);
        }

        let index = &self.index;
        if index.max_results == 0 {
            panic!("index.max_results must be greater than 0");
        }
        if index.max_query_length == 0 {
            panic!("index.max_query_length must be greater than 0");
        }
        if index.max_identifier_length == 0 {
            panic!("index.max_identifier_length must be greater than 0");
        }
        if index.model.trim().is_empty() {
            panic!("index.model must not be empty");
        }
    }

    /// Load configuration from `<base_path>/config.yaml`, creating the file
    /// with defaults on first run.
    pub fn load_with(base_path: &Path) -> Self {
        std::fs::create_dir_all(base_path).expect("failed to create data directory");

        let config_path = base_path.join("config.yaml");

        // create new if does not exist
        if !config_path.exists() {
            let rendered = serde_yml::to_string(&Self::default()).unwrap();
            std::fs::write(&config_path, rendered).expect("failed to write default config");
        }

        let config_str =
            std::fs::read_to_string(&config_path).expect("config file is not valid utf8");
        let mut config: Self = serde_yml::from_str(&config_str).expect("config is malformed");

        config.base_path = base_path.to_path_buf();
        config.validate();
        config
    }

    /// Base data directory this config was loaded from.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Directory holding the persisted index artifacts.
    pub fn index_dir(&self) -> PathBuf {
        self.base_path.join("index")
    }

    /// Resolve the API key: config file first, then the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        if !self.api_key.trim().is_empty() {
            return Some(self.api_key.trim().to_string());
        }
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Some(key.trim().to_string()),
            _ => None,
        }
    }
}

/// Generate a random hex API key for a daemon run without a configured one.
pub fn generate_api_key() -> String {
    use rand::Rng;
    let bytes: [u8; 32] = rand::rng().random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.index.model, "all-MiniLM-L6-v2");
        assert_eq!(config.index.max_results, 100);
        assert_eq!(config.index.max_query_length, 500);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = TempDir::new().unwrap();

        let config = Config::load_with(dir.path());

        assert!(dir.path().join("config.yaml").exists());
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.base_path(), dir.path());
        assert_eq!(config.index_dir(), dir.path().join("index"));
    }

    #[test]
    fn test_load_reads_existing_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.yaml"),
            "listen_addr: \"127.0.0.1:9999\"\nindex:\n  max_results: 10\n",
        )
        .unwrap();

        let config = Config::load_with(dir.path());

        assert_eq!(config.listen_addr, "127.0.0.1:9999");
        assert_eq!(config.index.max_results, 10);
        // unspecified fields fall back to defaults
        assert_eq!(config.index.max_query_length, 500);
    }

    #[test]
    #[should_panic(expected = "max_results")]
    fn test_zero_max_results_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.yaml"),
            "index:\n  max_results: 0\n",
        )
        .unwrap();

        Config::load_with(dir.path());
    }

    #[test]
    #[should_panic(expected = "listen_addr")]
    fn test_bad_listen_addr_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.yaml"), "listen_addr: \"not an addr\"\n").unwrap();

        Config::load_with(dir.path());
    }

    #[test]
    fn test_api_key_from_config() {
        let mut config = Config::default();
        config.api_key = "  secret  ".to_string();
        assert_eq!(config.resolve_api_key(), Some("secret".to_string()));
    }

    #[test]
    fn test_generated_api_key_shape() {
        let key = generate_api_key();
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
