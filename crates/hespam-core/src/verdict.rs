//! Receiver-side classification of processed results
//!
//! The server multiplies the encrypted message by its model and folds the
//! slots together, so the first decoded slot holds the log-odds score.
//! The receiver's decryptor prints that slot on its first output line,
//! either as a float or as a complex literal like `(-3.2+0i)`.

use crate::sample::Label;
use crate::tool::{Substitutions, ToolCommand, ToolError};
use std::path::Path;
use tracing::debug;

pub const DEFAULT_THRESHOLD: f64 = 0.95;

#[derive(Debug, thiserror::Error)]
pub enum VerdictError {
    #[error("Threshold must be strictly between 0 and 1, got {0}")]
    InvalidThreshold(f64),
    #[error("Decryptor failed: {0}")]
    Tool(#[from] ToolError),
    #[error("Decryptor printed nothing")]
    NoOutput,
    #[error("Could not read a score from '{0}'")]
    BadScore(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub score: f64,
    pub label: Label,
}

/// Score below which a message counts as spam
pub fn decision_boundary(threshold: f64) -> Result<f64, VerdictError> {
    if !(threshold > 0.0 && threshold < 1.0) {
        return Err(VerdictError::InvalidThreshold(threshold));
    }
    Ok((1.0 / threshold - 1.0).ln())
}

pub fn classify(score: f64, threshold: f64) -> Result<Verdict, VerdictError> {
    let label = if score < decision_boundary(threshold)? {
        Label::Spam
    } else {
        Label::Ham
    };
    Ok(Verdict { score, label })
}

/// Real part of a decoded slot as printed by the decryptor
pub fn parse_score(line: &str) -> Result<f64, VerdictError> {
    let bad = || VerdictError::BadScore(line.to_string());
    let text = line.trim();
    let text = text
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .unwrap_or(text)
        .trim();

    let real = match text.strip_suffix('i') {
        Some(body) => {
            // split at the sign of the imaginary part, skipping exponent signs
            let bytes = body.as_bytes();
            let split = (1..bytes.len())
                .rev()
                .find(|&i| {
                    (bytes[i] == b'+' || bytes[i] == b'-')
                        && !matches!(bytes[i - 1], b'e' | b'E')
                })
                .ok_or_else(bad)?;
            &body[..split]
        }
        None => text,
    };

    real.parse::<f64>().map_err(|_| bad())
}

/// Runs the receiver's decryptor on a downloaded result
#[derive(Debug, Clone)]
pub struct Decryptor {
    command: ToolCommand,
    threshold: f64,
}

impl Decryptor {
    pub fn new(command: ToolCommand, threshold: f64) -> Result<Self, VerdictError> {
        decision_boundary(threshold)?;
        Ok(Self { command, threshold })
    }

    /// `go run receiver_decrypt.go {ct}`
    pub fn default_command() -> ToolCommand {
        ToolCommand::new("go", &["run", "receiver_decrypt.go", "{ct}"])
    }

    pub async fn classify(&self, result_path: &Path) -> Result<Verdict, VerdictError> {
        let subs = Substitutions {
            ct: Some(result_path.display().to_string()),
            ..Substitutions::default()
        };
        let output = self.command.run(&subs).await?;
        let line = output
            .stdout
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .ok_or(VerdictError::NoOutput)?;
        debug!(%line, "decryptor score line");
        classify(parse_score(line)?, self.threshold)
    }
}
