//! hespam core - key fetch, sample selection, encryption and submission
//!
//! Shared by the CLI and anything else that wants to drive an encrypted
//! inbox demo. The encryption scheme itself lives in external programs;
//! this crate only sequences them against the inbox HTTP API.

pub mod config;
pub mod driver;
pub mod encryptor;
pub mod endpoint;
pub mod inbox;
pub mod sample;
pub mod tool;
pub mod verdict;

pub use config::DemoConfig;
pub use driver::{Driver, DriverEvent, RunReport, RunSettings};
pub use encryptor::{CommandEncryptor, Encryptor};
pub use endpoint::Endpoint;
pub use inbox::{Inbox, InboxClient, KeyKind};
pub use sample::{Label, Sample, SamplePlan};
pub use tool::ToolCommand;
pub use verdict::{Decryptor, Verdict};
