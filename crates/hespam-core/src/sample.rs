//! Sample selection
//!
//! Picks which corpus entries get encrypted and sent. Indices are drawn
//! uniformly from `1..=corpus_size`; repeats are allowed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Entries in the ham corpus
pub const HAM_CORPUS_SIZE: u32 = 16545;
/// Entries in the spam corpus
pub const SPAM_CORPUS_SIZE: u32 = 17170;

/// Which corpus a sample comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Ham,
    Spam,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Ham => "ham",
            Label::Spam => "spam",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = SampleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ham" => Ok(Label::Ham),
            "spam" => Ok(Label::Spam),
            other => Err(SampleError::UnknownLabel(other.to_string())),
        }
    }
}

/// One corpus entry to encrypt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub label: Label,
    pub index: u32,
}

impl Sample {
    pub fn new(label: Label, index: u32) -> Self {
        Self { label, index }
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.label, self.index)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("Unknown label '{0}' (expected ham or spam)")]
    UnknownLabel(String),
    #[error("{0} corpus size must be at least 1")]
    EmptyCorpus(Label),
}

/// Randomly chosen ham and spam indices for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplePlan {
    pub ham: Vec<u32>,
    pub spam: Vec<u32>,
}

impl SamplePlan {
    /// Draw `count` ham and `count` spam indices with the given RNG.
    pub fn select<R: Rng + ?Sized>(
        count: usize,
        ham_size: u32,
        spam_size: u32,
        rng: &mut R,
    ) -> Result<Self, SampleError> {
        if ham_size == 0 {
            return Err(SampleError::EmptyCorpus(Label::Ham));
        }
        if spam_size == 0 {
            return Err(SampleError::EmptyCorpus(Label::Spam));
        }

        // spam indices are drawn before ham
        let spam = (0..count).map(|_| rng.gen_range(1..=spam_size)).collect();
        let ham = (0..count).map(|_| rng.gen_range(1..=ham_size)).collect();

        Ok(Self { ham, spam })
    }

    /// Seeded plans are reproducible; unseeded plans use the thread RNG.
    pub fn generate(
        count: usize,
        ham_size: u32,
        spam_size: u32,
        seed: Option<u64>,
    ) -> Result<Self, SampleError> {
        match seed {
            Some(seed) => Self::select(count, ham_size, spam_size, &mut StdRng::seed_from_u64(seed)),
            None => Self::select(count, ham_size, spam_size, &mut rand::thread_rng()),
        }
    }

    /// All samples in send order: every ham sample, then every spam sample.
    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        self.ham
            .iter()
            .map(|&i| Sample::new(Label::Ham, i))
            .chain(self.spam.iter().map(|&i| Sample::new(Label::Spam, i)))
    }

    pub fn len(&self) -> usize {
        self.ham.len() + self.spam.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ham.is_empty() && self.spam.is_empty()
    }
}
