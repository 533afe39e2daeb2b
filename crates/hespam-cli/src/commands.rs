//! Subcommand implementations

use anyhow::{bail, Context};
use hespam_core::{
    DemoConfig, Driver, DriverEvent, Inbox, InboxClient, KeyKind, Label, Sample,
};
use std::path::{Path, PathBuf};
use tracing::info;

const SEPARATOR_WIDTH: usize = 120;

fn client(config: &DemoConfig) -> anyhow::Result<InboxClient> {
    config.inbox_client().context("Failed to set up inbox client")
}

fn print_event(event: DriverEvent) {
    match event {
        DriverEvent::KeyFetched { path, bytes } => {
            println!("🔑 Public key saved to {} ({} bytes)", path.display(), bytes);
        }
        DriverEvent::Encrypting(sample) => {
            println!("🔒 Encrypting {}", sample);
        }
        DriverEvent::Sent { sample, reply } => {
            println!("✅ Sent {}: {}", sample, reply.trim());
        }
        DriverEvent::Failed { sample, error } => {
            println!("❌ {} failed: {}", sample, error);
        }
        DriverEvent::PhaseComplete(Label::Ham) => {
            println!("{}", "-".repeat(SEPARATOR_WIDTH));
        }
        DriverEvent::PhaseComplete(Label::Spam) => {}
    }
}

pub async fn run(config: &DemoConfig) -> anyhow::Result<()> {
    let settings = config.run_settings();
    println!(
        "📬 Sending {} ham + {} spam samples to {} (inbox {})",
        settings.count, settings.count, config.endpoint, config.recipient
    );

    let driver = Driver::new(client(config)?, config.encryptor(), settings);
    let report = driver.run(print_event).await?;

    println!();
    println!("Sent {}/{} samples", report.sent, report.attempted.len());
    if report.aborted {
        bail!("Run stopped after the first failure (--fail-fast)");
    }
    if !report.failures.is_empty() {
        bail!("{} sample(s) failed", report.failures.len());
    }
    Ok(())
}

pub async fn fetch_key(config: &DemoConfig, out: Option<PathBuf>) -> anyhow::Result<()> {
    let dest = out.unwrap_or_else(|| config.key_path());
    let bytes = client(config)?
        .fetch_public_key(&dest)
        .await
        .with_context(|| format!("Failed to fetch public key for inbox {}", config.recipient))?;
    println!("🔑 Public key saved to {} ({} bytes)", dest.display(), bytes);
    Ok(())
}

pub async fn send(config: &DemoConfig, label: Label, index: u32) -> anyhow::Result<()> {
    let sample = Sample::new(label, index);
    let inbox = client(config)?;
    let key_path = config.key_path();

    if !key_path.exists() {
        info!(path = %key_path.display(), "no local key, fetching");
        inbox
            .fetch_public_key(&key_path)
            .await
            .context("Failed to fetch public key")?;
    }

    let driver = Driver::new(inbox, config.encryptor(), config.run_settings());
    let reply = driver
        .submit(sample)
        .await
        .with_context(|| format!("Failed to send {}", sample))?;
    println!("✅ Sent {}: {}", sample, reply.trim());
    Ok(())
}

pub async fn register(
    config: &DemoConfig,
    pk: Option<PathBuf>,
    rek: Option<PathBuf>,
    rok: Option<PathBuf>,
) -> anyhow::Result<()> {
    let uploads: Vec<(KeyKind, PathBuf)> = [
        (KeyKind::Public, pk),
        (KeyKind::Relinearization, rek),
        (KeyKind::Rotation, rok),
    ]
    .into_iter()
    .filter_map(|(kind, path)| path.map(|p| (kind, p)))
    .collect();

    if uploads.is_empty() {
        bail!("Nothing to register: pass at least one of --pk, --rek, --rok");
    }

    let inbox = client(config)?;
    for (kind, path) in uploads {
        let reply = inbox
            .upload_key(kind, &path)
            .await
            .with_context(|| format!("Failed to upload {} from {}", kind.route(), path.display()))?;
        println!("✅ {} uploaded from {}: {}", kind.route(), path.display(), reply.trim());
    }
    Ok(())
}

pub async fn ping(config: &DemoConfig) -> anyhow::Result<()> {
    client(config)?
        .ping()
        .await
        .with_context(|| format!("{} did not answer ping", config.endpoint))?;
    println!("pong from {}", config.endpoint);
    Ok(())
}

pub async fn flush(config: &DemoConfig) -> anyhow::Result<()> {
    let reply = client(config)?.flush().await.context("Flush failed")?;
    println!("{}", reply.trim());
    Ok(())
}

pub async fn inbox_len(config: &DemoConfig) -> anyhow::Result<()> {
    let len = client(config)?
        .inbox_len()
        .await
        .with_context(|| format!("Failed to read inbox {}", config.recipient))?;
    println!("📬 Inbox {} holds {} message(s)", config.recipient, len);
    Ok(())
}

pub async fn inbox_fetch(config: &DemoConfig, index: usize, out: Option<PathBuf>) -> anyhow::Result<()> {
    let dest = out.unwrap_or_else(|| PathBuf::from(format!("{}_{}.ctr", config.recipient, index)));
    let bytes = client(config)?
        .fetch_result(index, &dest)
        .await
        .with_context(|| format!("Failed to fetch inbox entry {}", index))?;
    println!("📥 Result {} saved to {} ({} bytes)", index, dest.display(), bytes);
    Ok(())
}

pub async fn classify(config: &DemoConfig, result: &Path) -> anyhow::Result<()> {
    if !result.exists() {
        bail!("Result file not found: {}", result.display());
    }
    let verdict = config
        .decryptor()?
        .classify(result)
        .await
        .with_context(|| format!("Failed to classify {}", result.display()))?;
    println!("score {:.6} → {}", verdict.score, verdict.label);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Bytes, routing::{get, post}, Router};
    use hespam_core::driver::DriverError;
    use hespam_core::ToolCommand;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Serves `/1/pk` and counts `/1/send` uploads
    async fn spawn_inbox() -> (String, Arc<AtomicUsize>) {
        let sends = Arc::new(AtomicUsize::new(0));
        let counter = sends.clone();
        let app = Router::new()
            .route("/1/pk", get(|| async { Bytes::from_static(b"public-key") }))
            .route(
                "/1/send",
                post(move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        "start calculating HE"
                    }
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr.to_string(), sends)
    }

    fn test_config(dir: &TempDir, endpoint: &str) -> DemoConfig {
        DemoConfig {
            endpoint: endpoint.to_string(),
            key_path: Some(dir.path().join("1.pk")),
            ciphertext_path: dir.path().join("ct"),
            count: 1,
            seed: Some(3),
            request_timeout_secs: 5,
            // not on any PATH, so every sample fails to spawn
            encryptor: ToolCommand::new("hespam-no-such-sender", &["{pk}", "{label}", "{index}"]),
            ..DemoConfig::default()
        }
    }

    #[tokio::test]
    async fn test_run_fails_when_key_fetch_fails() {
        let dir = TempDir::new().unwrap();
        // nothing listens on the discard port
        let config = test_config(&dir, "127.0.0.1:9");

        let err = run(&config).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DriverError>(),
            Some(DriverError::KeyFetch(_))
        ));
        assert!(!dir.path().join("1.pk").exists());
    }

    #[tokio::test]
    async fn test_run_fails_when_a_sample_fails() {
        let (endpoint, sends) = spawn_inbox().await;
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, &endpoint);

        let err = run(&config).await.unwrap_err();
        assert_eq!(err.to_string(), "2 sample(s) failed");
        assert_eq!(sends.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read(dir.path().join("1.pk")).unwrap(), b"public-key");
    }

    #[tokio::test]
    async fn test_run_fail_fast_stops_after_first_failure() {
        let (endpoint, sends) = spawn_inbox().await;
        let dir = TempDir::new().unwrap();
        let config = DemoConfig {
            fail_fast: true,
            ..test_config(&dir, &endpoint)
        };

        let err = run(&config).await.unwrap_err();
        assert!(err.to_string().contains("--fail-fast"));
        assert_eq!(sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_register_without_keys_is_error() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, "127.0.0.1:9");

        let err = register(&config, None, None, None).await.unwrap_err();
        assert!(err.to_string().starts_with("Nothing to register"));
    }
}
