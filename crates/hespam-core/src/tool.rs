//! External tool execution
//!
//! The encryptor and decryptor are separate programs. They are spawned
//! directly (never through `sh -c`), their exit status is checked, and a
//! run that outlives `timeout_secs` is killed.
//!
//! Arguments may contain placeholders that are filled per call:
//! `{pk}` key path, `{label}` ham/spam, `{index}` corpus index, `{ct}`
//! ciphertext path.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

const PLACEHOLDERS: [&str; 4] = ["pk", "label", "index", "ct"];

/// How to invoke an external program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Directory to run in (defaults to the current one)
    pub working_dir: Option<PathBuf>,
    /// Maximum captured output in bytes before truncation
    pub max_output_bytes: usize,
    /// Kill the process after this many seconds
    pub timeout_secs: u64,
}

impl Default for ToolCommand {
    fn default() -> Self {
        Self {
            program: String::new(),
            args: Vec::new(),
            working_dir: None,
            max_output_bytes: 64 * 1024, // 64KB
            timeout_secs: 300,
        }
    }
}

/// Values substituted into `{...}` placeholders
#[derive(Debug, Clone, Default)]
pub struct Substitutions {
    pub pk: Option<String>,
    pub label: Option<String>,
    pub index: Option<String>,
    pub ct: Option<String>,
}

impl Substitutions {
    fn get(&self, name: &str) -> Option<&str> {
        match name {
            "pk" => self.pk.as_deref(),
            "label" => self.label.as_deref(),
            "index" => self.index.as_deref(),
            "ct" => self.ct.as_deref(),
            _ => None,
        }
    }
}

/// Captured output of a successful run
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Reasons an external tool run can fail
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("No program configured")]
    NoProgram,
    #[error("Placeholder {{{0}}} used but no value supplied")]
    MissingValue(String),
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{program}' timed out after {secs}s")]
    Timeout { program: String, secs: u64 },
    #[error("'{program}' exited with {code}: {stderr}")]
    Failed {
        program: String,
        code: i32,
        stderr: String,
    },
}

impl ToolCommand {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Fill placeholders in every argument
    pub fn render_args(&self, subs: &Substitutions) -> Result<Vec<String>, ToolError> {
        self.args.iter().map(|arg| render(arg, subs)).collect()
    }

    /// Run the program to completion under the configured timeout
    pub async fn run(&self, subs: &Substitutions) -> Result<ToolOutput, ToolError> {
        if self.program.trim().is_empty() {
            return Err(ToolError::NoProgram);
        }
        let args = self.render_args(subs)?;
        debug!(program = %self.program, ?args, "running external tool");

        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&args).kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let output = tokio::time::timeout(Duration::from_secs(self.timeout_secs), cmd.output())
            .await
            .map_err(|_| ToolError::Timeout {
                program: self.program.clone(),
                secs: self.timeout_secs,
            })?
            .map_err(|source| ToolError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = truncate(&String::from_utf8_lossy(&output.stdout), self.max_output_bytes);
        let stderr = truncate(&String::from_utf8_lossy(&output.stderr), self.max_output_bytes);

        if output.status.success() {
            Ok(ToolOutput { stdout, stderr })
        } else {
            Err(ToolError::Failed {
                program: self.program.clone(),
                code: output.status.code().unwrap_or(-1),
                stderr,
            })
        }
    }
}

fn render(arg: &str, subs: &Substitutions) -> Result<String, ToolError> {
    let mut out = arg.to_string();
    for name in PLACEHOLDERS {
        let token = format!("{{{}}}", name);
        if out.contains(&token) {
            let value = subs
                .get(name)
                .ok_or_else(|| ToolError::MissingValue(name.to_string()))?;
            out = out.replace(&token, value);
        }
    }
    Ok(out)
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...\n[truncated, {} bytes total]", &text[..end], text.len())
}
