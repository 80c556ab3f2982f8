use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

// Leases are simulated, so the in-flight window only needs to outlast one delete.
const DEFAULT_VISIBILITY_TIMEOUT_SECS: u32 = 1;
// SQS rejects receives asking for more than 12 hours.
const MAX_VISIBILITY_TIMEOUT_SECS: u32 = 43_200;

fn default_visibility_timeout() -> u32 {
    DEFAULT_VISIBILITY_TIMEOUT_SECS
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(rename = "QueueName", default)]
    pub queue_name: String,
    #[serde(rename = "InitIPAddress", default)]
    pub seed_addresses: Vec<String>,
    #[serde(rename = "VisibilityTimeout", default = "default_visibility_timeout")]
    pub visibility_timeout_secs: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            queue_name: String::new(),
            seed_addresses: Vec::new(),
            visibility_timeout_secs: DEFAULT_VISIBILITY_TIMEOUT_SECS,
        }
    }
}

impl AppConfig {
    pub fn from_json_str(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<AppConfig>(input)
    }

    pub fn from_toml_str(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str::<AppConfig>(input)
    }

    /// Reads a config file, choosing TOML for `.toml` paths and JSON otherwise.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::config(path, e))?;
        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        if is_toml {
            Self::from_toml_str(&contents).map_err(|e| Error::config(path, e))
        } else {
            Self::from_json_str(&contents).map_err(|e| Error::config(path, e))
        }
    }

    /// Command-line override for the queue name, applied when present.
    pub fn with_queue_name(mut self, name: Option<String>) -> Self {
        if let Some(name) = name {
            self.queue_name = name;
        }
        self
    }

    /// In-flight window for leased messages, clamped to 1s..=12h.
    pub fn visibility_timeout(&self) -> Duration {
        let secs = self
            .visibility_timeout_secs
            .clamp(1, MAX_VISIBILITY_TIMEOUT_SECS);
        Duration::from_secs(u64::from(secs))
    }
}

/// Where the seed list is re-read from when the operator asks for a reseed.
#[derive(Debug, Clone)]
pub enum AddressSource {
    Fixed(Vec<String>),
    File {
        path: PathBuf,
        fallback: Vec<String>,
    },
}

impl AddressSource {
    /// Returns the current address list. A failed reload yields the error
    /// alongside the list loaded at startup.
    pub fn load(&self) -> (Vec<String>, Option<Error>) {
        match self {
            AddressSource::Fixed(addresses) => (addresses.clone(), None),
            AddressSource::File { path, fallback } => match AppConfig::from_path(path) {
                Ok(cfg) => (cfg.seed_addresses, None),
                Err(e) => (fallback.clone(), Some(e)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_with_exact_keys() {
        let cfg = AppConfig::from_json_str(
            r#"{"QueueName":"pool","InitIPAddress":["10.0.0.1","2001:db8::1"],"Extra":true}"#,
        )
        .unwrap();
        assert_eq!(cfg.queue_name, "pool");
        assert_eq!(cfg.seed_addresses, vec!["10.0.0.1", "2001:db8::1"]);
        assert_eq!(cfg.visibility_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn missing_keys_take_zero_values() {
        let cfg = AppConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert!(cfg.queue_name.is_empty());
    }

    #[test]
    fn parses_toml() {
        let cfg = AppConfig::from_toml_str(
            "QueueName = \"pool.fifo\"\nInitIPAddress = [\"192.168.0.7\"]\nVisibilityTimeout = 5\n",
        )
        .unwrap();
        assert_eq!(cfg.queue_name, "pool.fifo");
        assert_eq!(cfg.seed_addresses, vec!["192.168.0.7"]);
        assert_eq!(cfg.visibility_timeout_secs, 5);
    }

    #[test]
    fn visibility_timeout_is_clamped_to_sqs_range() {
        let zero = AppConfig::from_json_str(r#"{"VisibilityTimeout":0}"#).unwrap();
        assert_eq!(zero.visibility_timeout(), Duration::from_secs(1));

        let huge = AppConfig::from_json_str(r#"{"VisibilityTimeout":50000}"#).unwrap();
        assert_eq!(huge.visibility_timeout(), Duration::from_secs(43_200));

        let ok = AppConfig::from_json_str(r#"{"VisibilityTimeout":30}"#).unwrap();
        assert_eq!(ok.visibility_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn queue_flag_overrides_config() {
        let cfg = AppConfig {
            queue_name: "from-file".into(),
            ..AppConfig::default()
        };
        assert_eq!(cfg.clone().with_queue_name(None).queue_name, "from-file");
        assert_eq!(
            cfg.with_queue_name(Some("from-flag".into())).queue_name,
            "from-flag"
        );
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = AppConfig::from_path(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn file_source_reloads_and_falls_back() {
        let dir = std::env::temp_dir().join(format!("ipam-cfg-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, r#"{"InitIPAddress":["10.1.1.1"]}"#).unwrap();

        let source = AddressSource::File {
            path: path.clone(),
            fallback: vec!["10.9.9.9".into()],
        };
        let (addresses, err) = source.load();
        assert_eq!(addresses, vec!["10.1.1.1"]);
        assert!(err.is_none());

        std::fs::write(&path, "not json").unwrap();
        let (addresses, err) = source.load();
        assert_eq!(addresses, vec!["10.9.9.9"]);
        assert!(matches!(err, Some(Error::Config { .. })));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
