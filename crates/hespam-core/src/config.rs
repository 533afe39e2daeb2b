//! Run configuration
//!
//! Loaded from JSON. Every field is optional in the file; missing fields
//! take the demo's defaults. Lookup order: an explicit path, then
//! `~/.hespam/config.json`, then built-in defaults.

use crate::driver::RunSettings;
use crate::encryptor::CommandEncryptor;
use crate::endpoint::{Endpoint, EndpointError};
use crate::inbox::{InboxClient, InboxError};
use crate::sample::{HAM_CORPUS_SIZE, SPAM_CORPUS_SIZE};
use crate::tool::ToolCommand;
use crate::verdict::{self, Decryptor, VerdictError, DEFAULT_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Recipient id must be non-zero")]
    ZeroRecipient,
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
    #[error(transparent)]
    Verdict(#[from] VerdictError),
    #[error(transparent)]
    Inbox(#[from] InboxError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// `host:port` or base URL of the inbox service
    pub endpoint: String,
    /// Inbox the samples are delivered to
    pub recipient: u32,
    /// Where the fetched public key is stored (`{recipient}.pk` if unset)
    pub key_path: Option<PathBuf>,
    /// Where the encryptor leaves each ciphertext
    pub ciphertext_path: PathBuf,
    /// Samples per label
    pub count: usize,
    pub ham_corpus_size: u32,
    pub spam_corpus_size: u32,
    pub seed: Option<u64>,
    pub fail_fast: bool,
    pub request_timeout_secs: u64,
    pub threshold: f64,
    pub encryptor: ToolCommand,
    pub decryptor: ToolCommand,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            endpoint: "localhost:8080".to_string(),
            recipient: 1,
            key_path: None,
            ciphertext_path: PathBuf::from("ct"),
            count: 5,
            ham_corpus_size: HAM_CORPUS_SIZE,
            spam_corpus_size: SPAM_CORPUS_SIZE,
            seed: None,
            fail_fast: false,
            request_timeout_secs: 120,
            threshold: DEFAULT_THRESHOLD,
            encryptor: CommandEncryptor::default_command(),
            decryptor: Decryptor::default_command(),
        }
    }
}

impl DemoConfig {
    /// `~/.hespam/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".hespam").join("config.json"))
    }

    /// Load from `path` if given (it must exist), else from the default
    /// location if present, else fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                Self::from_file(p)
            }
            None => match Self::default_path() {
                Some(p) if p.exists() => Self::from_file(&p),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check the fields that cannot be caught by deserialization
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recipient == 0 {
            return Err(ConfigError::ZeroRecipient);
        }
        self.endpoint()?;
        verdict::decision_boundary(self.threshold)?;
        Ok(())
    }

    pub fn endpoint(&self) -> Result<Endpoint, ConfigError> {
        Ok(Endpoint::parse(&self.endpoint)?)
    }

    pub fn key_path(&self) -> PathBuf {
        self.key_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.pk", self.recipient)))
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            key_path: self.key_path(),
            count: self.count,
            ham_corpus_size: self.ham_corpus_size,
            spam_corpus_size: self.spam_corpus_size,
            seed: self.seed,
            fail_fast: self.fail_fast,
        }
    }

    pub fn inbox_client(&self) -> Result<InboxClient, ConfigError> {
        if self.recipient == 0 {
            return Err(ConfigError::ZeroRecipient);
        }
        Ok(InboxClient::new(
            self.endpoint()?,
            self.recipient,
            Duration::from_secs(self.request_timeout_secs),
        )?)
    }

    pub fn encryptor(&self) -> CommandEncryptor {
        CommandEncryptor::new(self.encryptor.clone(), self.ciphertext_path.clone())
    }

    pub fn decryptor(&self) -> Result<Decryptor, ConfigError> {
        Ok(Decryptor::new(self.decryptor.clone(), self.threshold)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_demo() {
        let cfg = DemoConfig::default();
        assert_eq!(cfg.endpoint, "localhost:8080");
        assert_eq!(cfg.count, 5);
        assert_eq!(cfg.ham_corpus_size, 16545);
        assert_eq!(cfg.spam_corpus_size, 17170);
        assert_eq!(cfg.key_path(), PathBuf::from("1.pk"));
        assert_eq!(cfg.ciphertext_path, PathBuf::from("ct"));
        assert_eq!(cfg.encryptor.program, "go");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(
            tmp,
            r#"{{"endpoint": "10.0.0.5:8080", "recipient": 3, "encryptor": {{"program": "./sender", "args": ["{{pk}}", "{{label}}", "{{index}}"]}}}}"#
        )
        .unwrap();

        let cfg = DemoConfig::load(Some(tmp.path())).unwrap();
        assert_eq!(cfg.endpoint, "10.0.0.5:8080");
        assert_eq!(cfg.key_path(), PathBuf::from("3.pk"));
        assert_eq!(cfg.count, 5);
        assert_eq!(cfg.encryptor.program, "./sender");
        assert_eq!(cfg.encryptor.timeout_secs, 300);
        assert_eq!(cfg.decryptor.program, "go");
    }

    #[test]
    fn test_explicit_missing_file() {
        let err = DemoConfig::load(Some(Path::new("/definitely/not/here.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_bad_json() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, "{{ not json").unwrap();
        assert!(matches!(
            DemoConfig::load(Some(tmp.path())),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_validate_rejects() {
        let cfg = DemoConfig {
            recipient: 0,
            ..DemoConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::ZeroRecipient)));

        let cfg = DemoConfig {
            threshold: 1.0,
            ..DemoConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Verdict(_))));

        let cfg = DemoConfig {
            endpoint: "".into(),
            ..DemoConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Endpoint(_))));
    }

    #[test]
    fn test_run_settings() {
        let cfg = DemoConfig {
            count: 2,
            seed: Some(9),
            fail_fast: true,
            key_path: Some(PathBuf::from("keys/alice.pk")),
            ..DemoConfig::default()
        };
        let s = cfg.run_settings();
        assert_eq!(s.count, 2);
        assert_eq!(s.seed, Some(9));
        assert!(s.fail_fast);
        assert_eq!(s.key_path, PathBuf::from("keys/alice.pk"));
    }
}
