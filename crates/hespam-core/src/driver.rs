//! Demo run orchestration
//!
//! One run: fetch the recipient's public key once, then encrypt and send
//! every ham sample, then every spam sample. Frontends receive progress
//! through a callback; the driver handles the sequencing.

use crate::encryptor::{EncryptError, Encryptor};
use crate::inbox::{Inbox, InboxError};
use crate::sample::{Label, Sample, SampleError, SamplePlan};
use std::path::PathBuf;
use tracing::{info, warn};

/// Events emitted during a run for UI updates
#[derive(Debug, Clone)]
pub enum DriverEvent {
    /// Public key stored locally
    KeyFetched { path: PathBuf, bytes: usize },
    /// Encryptor started for a sample
    Encrypting(Sample),
    /// Ciphertext accepted by the server
    Sent { sample: Sample, reply: String },
    /// Sample could not be encrypted or uploaded
    Failed { sample: Sample, error: String },
    /// Every sample with this label has been attempted
    PhaseComplete(Label),
}

/// Parameters of one run
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub key_path: PathBuf,
    pub count: usize,
    pub ham_corpus_size: u32,
    pub spam_corpus_size: u32,
    pub seed: Option<u64>,
    /// Stop at the first failed sample instead of moving on
    pub fail_fast: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("Invalid sample plan: {0}")]
    Plan(#[from] SampleError),
    #[error("Could not fetch public key: {0}")]
    KeyFetch(#[source] InboxError),
}

/// Why a single sample failed
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("encrypt: {0}")]
    Encrypt(#[from] EncryptError),
    #[error("upload: {0}")]
    Upload(#[from] InboxError),
}

#[derive(Debug, Clone)]
pub struct SampleFailure {
    pub sample: Sample,
    pub error: String,
}

/// Outcome of a run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Samples in the order they were attempted
    pub attempted: Vec<Sample>,
    pub sent: usize,
    pub failures: Vec<SampleFailure>,
    /// Set when `fail_fast` cut the run short
    pub aborted: bool,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.aborted
    }
}

pub struct Driver<I, E> {
    inbox: I,
    encryptor: E,
    settings: RunSettings,
}

impl<I: Inbox, E: Encryptor> Driver<I, E> {
    pub fn new(inbox: I, encryptor: E, settings: RunSettings) -> Self {
        Self {
            inbox,
            encryptor,
            settings,
        }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn inbox(&self) -> &I {
        &self.inbox
    }

    pub fn encryptor(&self) -> &E {
        &self.encryptor
    }

    /// Draw a fresh plan from the settings and execute it
    pub async fn run<F>(&self, on_event: F) -> Result<RunReport, DriverError>
    where
        F: FnMut(DriverEvent),
    {
        let s = &self.settings;
        let plan = SamplePlan::generate(s.count, s.ham_corpus_size, s.spam_corpus_size, s.seed)?;
        self.run_plan(&plan, on_event).await
    }

    /// Execute a given plan: key fetch, then ham, then spam
    pub async fn run_plan<F>(&self, plan: &SamplePlan, mut on_event: F) -> Result<RunReport, DriverError>
    where
        F: FnMut(DriverEvent),
    {
        let key_path = &self.settings.key_path;
        let bytes = self
            .inbox
            .fetch_public_key(key_path)
            .await
            .map_err(DriverError::KeyFetch)?;
        info!(path = %key_path.display(), bytes, "public key fetched");
        on_event(DriverEvent::KeyFetched {
            path: key_path.clone(),
            bytes,
        });

        let mut report = RunReport::default();
        for (label, indices) in [(Label::Ham, &plan.ham), (Label::Spam, &plan.spam)] {
            for &index in indices {
                let sample = Sample::new(label, index);
                report.attempted.push(sample);
                on_event(DriverEvent::Encrypting(sample));

                match self.submit(sample).await {
                    Ok(reply) => {
                        info!(%sample, "sent");
                        report.sent += 1;
                        on_event(DriverEvent::Sent { sample, reply });
                    }
                    Err(e) => {
                        warn!(%sample, error = %e, "sample failed");
                        let error = e.to_string();
                        report.failures.push(SampleFailure {
                            sample,
                            error: error.clone(),
                        });
                        on_event(DriverEvent::Failed { sample, error });
                        if self.settings.fail_fast {
                            report.aborted = true;
                            return Ok(report);
                        }
                    }
                }
            }
            on_event(DriverEvent::PhaseComplete(label));
        }

        Ok(report)
    }

    /// Encrypt and upload one sample using the already-fetched key
    pub async fn submit(&self, sample: Sample) -> Result<String, SubmitError> {
        let ciphertext = self.encryptor.encrypt(&self.settings.key_path, sample).await?;
        Ok(self.inbox.send_ciphertext(ciphertext).await?)
    }
}
