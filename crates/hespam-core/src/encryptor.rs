//! Sample encryption via the external sender program
//!
//! The sender reads the recipient's public key and one corpus entry and
//! writes a ciphertext artifact to a fixed path. That path is cleared
//! before every run so a sender that exits 0 without writing anything
//! cannot cause the previous sample's ciphertext to be uploaded again.

use crate::sample::Sample;
use crate::tool::{Substitutions, ToolCommand, ToolError};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Produces ciphertext bytes for one sample
#[allow(async_fn_in_trait)]
pub trait Encryptor {
    async fn encrypt(&self, key_path: &Path, sample: Sample) -> Result<Vec<u8>, EncryptError>;
}

#[derive(Debug, thiserror::Error)]
pub enum EncryptError {
    #[error("Encryptor failed: {0}")]
    Tool(#[from] ToolError),
    #[error("Encryptor wrote no ciphertext at {0}")]
    MissingArtifact(PathBuf),
    #[error("Ciphertext at {0} is empty")]
    EmptyArtifact(PathBuf),
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Runs an external program and picks up the artifact it leaves behind
#[derive(Debug, Clone)]
pub struct CommandEncryptor {
    command: ToolCommand,
    ciphertext_path: PathBuf,
}

impl CommandEncryptor {
    pub fn new(command: ToolCommand, ciphertext_path: PathBuf) -> Self {
        Self {
            command,
            ciphertext_path,
        }
    }

    /// `go run sender.go {pk} {label} {index}`, which writes `./ct`
    pub fn default_command() -> ToolCommand {
        ToolCommand::new("go", &["run", "sender.go", "{pk}", "{label}", "{index}"])
    }

    /// Where the sender leaves its artifact, as seen from this process.
    /// A relative path is taken relative to the command's `working_dir`.
    pub fn ciphertext_path(&self) -> PathBuf {
        match &self.command.working_dir {
            Some(dir) if self.ciphertext_path.is_relative() => dir.join(&self.ciphertext_path),
            _ => self.ciphertext_path.clone(),
        }
    }
}

async fn clear_artifact(path: &Path) -> Result<(), EncryptError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(EncryptError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// The sender may run in another directory, so it only gets absolute paths
fn absolute(path: &Path) -> Result<PathBuf, EncryptError> {
    std::path::absolute(path).map_err(|source| EncryptError::Io {
        path: path.to_path_buf(),
        source,
    })
}

impl Encryptor for CommandEncryptor {
    async fn encrypt(&self, key_path: &Path, sample: Sample) -> Result<Vec<u8>, EncryptError> {
        let artifact = absolute(&self.ciphertext_path())?;
        clear_artifact(&artifact).await?;

        let subs = Substitutions {
            pk: Some(absolute(key_path)?.display().to_string()),
            label: Some(sample.label.to_string()),
            index: Some(sample.index.to_string()),
            ct: Some(artifact.display().to_string()),
        };
        let output = self.command.run(&subs).await?;
        if !output.stdout.is_empty() {
            debug!(%sample, stdout = %output.stdout.trim_end(), "encryptor output");
        }

        let bytes = match tokio::fs::read(&artifact).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(EncryptError::MissingArtifact(artifact));
            }
            Err(source) => {
                return Err(EncryptError::Io {
                    path: artifact,
                    source,
                });
            }
        };

        if bytes.is_empty() {
            return Err(EncryptError::EmptyArtifact(artifact));
        }
        Ok(bytes)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::sample::Label;
    use tempfile::TempDir;

    fn shell(script: &str) -> ToolCommand {
        ToolCommand::new("sh", &["-c", script, "sender", "{pk}", "{label}", "{index}", "{ct}"])
    }

    #[tokio::test]
    async fn test_reads_artifact() {
        let dir = TempDir::new().unwrap();
        let ct = dir.path().join("ct");
        let key = dir.path().join("1.pk");
        let enc = CommandEncryptor::new(shell("printf '%s:%s:%s' \"$1\" \"$2\" \"$3\" > \"$4\""), ct);

        let bytes = enc
            .encrypt(&key, Sample::new(Label::Spam, 17))
            .await
            .unwrap();
        assert_eq!(bytes, format!("{}:spam:17", key.display()).into_bytes());
    }

    #[tokio::test]
    async fn test_relative_paths_follow_working_dir() {
        let dir = TempDir::new().unwrap();
        let work = dir.path().join("sender");
        std::fs::create_dir(&work).unwrap();

        // writes ./ct in its own directory, like the real sender
        let mut command = shell("cat \"$1\" > ct");
        command.working_dir = Some(work.clone());
        let enc = CommandEncryptor::new(command, PathBuf::from("ct"));
        assert_eq!(enc.ciphertext_path(), work.join("ct"));

        let key = dir.path().join("1.pk");
        std::fs::write(&key, b"public key").unwrap();
        let bytes = enc
            .encrypt(&key, Sample::new(Label::Ham, 4))
            .await
            .unwrap();
        assert_eq!(bytes, b"public key");
    }

    #[tokio::test]
    async fn test_relative_key_is_passed_absolute() {
        let dir = TempDir::new().unwrap();
        let mut command = shell("printf '%s' \"$1\" > ct");
        command.working_dir = Some(dir.path().to_path_buf());
        let enc = CommandEncryptor::new(command, PathBuf::from("ct"));

        let bytes = enc
            .encrypt(Path::new("keys/1.pk"), Sample::new(Label::Spam, 1))
            .await
            .unwrap();
        let expected = std::env::current_dir().unwrap().join("keys/1.pk");
        assert_eq!(bytes, expected.display().to_string().into_bytes());
    }

    #[tokio::test]
    async fn test_stale_artifact_not_reused() {
        let dir = TempDir::new().unwrap();
        let ct = dir.path().join("ct");
        std::fs::write(&ct, b"previous sample").unwrap();

        let enc = CommandEncryptor::new(shell("exit 0"), ct.clone());
        let err = enc
            .encrypt(Path::new("1.pk"), Sample::new(Label::Ham, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, EncryptError::MissingArtifact(p) if p == ct));
    }

    #[tokio::test]
    async fn test_empty_artifact_rejected() {
        let dir = TempDir::new().unwrap();
        let ct = dir.path().join("ct");
        let enc = CommandEncryptor::new(shell(": > \"$4\""), ct);

        let err = enc
            .encrypt(Path::new("1.pk"), Sample::new(Label::Ham, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, EncryptError::EmptyArtifact(_)));
    }

    #[tokio::test]
    async fn test_failing_sender_surfaces_exit_code() {
        let dir = TempDir::new().unwrap();
        let enc = CommandEncryptor::new(shell("echo 'no such index' >&2; exit 2"), dir.path().join("ct"));

        let err = enc
            .encrypt(Path::new("1.pk"), Sample::new(Label::Ham, 99999))
            .await
            .unwrap_err();
        match err {
            EncryptError::Tool(ToolError::Failed { code, stderr, .. }) => {
                assert_eq!(code, 2);
                assert!(stderr.contains("no such index"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
