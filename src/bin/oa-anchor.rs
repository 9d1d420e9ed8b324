//! oa-anchor -- resolve findings against a document and optionally apply them.
//!
//! Usage: oa-anchor --document <path> --findings <json> [--config <json>] [--apply]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use oa_anchor::apply::apply_findings;
use oa_anchor::host::memory::MemoryHost;
use oa_anchor::pending::PendingRegistry;
use oa_anchor::queue::MutationQueue;
use oa_anchor::util::{atomic, diff};
use oa_anchor::{AnchorConfig, Finding};
use tracing::info;

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .skip_while(|a| *a != flag)
        .nth(1)
        .cloned()
}

fn read_findings(path: &Path) -> Result<Vec<Finding>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read findings {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid findings {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only the report.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(document) = arg_value(&args, "--document").map(PathBuf::from) else {
        bail!("missing --document <path>");
    };
    let Some(findings_path) = arg_value(&args, "--findings").map(PathBuf::from) else {
        bail!("missing --findings <path>");
    };
    let apply = args.iter().any(|a| a == "--apply");

    let config = match arg_value(&args, "--config") {
        Some(path) => AnchorConfig::from_json_file(Path::new(&path))?,
        None => AnchorConfig::default(),
    };

    let original = std::fs::read_to_string(&document)
        .with_context(|| format!("failed to read {}", document.display()))?;
    let mut findings = read_findings(&findings_path)?;
    if !apply {
        for finding in &mut findings {
            finding.replacement = None;
        }
    }

    let registry = PendingRegistry::new();
    registry.install_teardown_hook(async {
        let _ = tokio::signal::ctrl_c().await;
    });
    let queue = MutationQueue::with_registry(&registry);
    let host = Arc::new(MemoryHost::new(&original));

    info!(
        document = %document.display(),
        findings = findings.len(),
        apply,
        "resolving findings"
    );
    let reports = apply_findings(Arc::clone(&host), &findings, &queue, &registry, &config).await?;

    let mut stdout = std::io::stdout().lock();
    for report in &reports {
        serde_json::to_writer(&mut stdout, report).context("failed to write report")?;
        std::io::Write::write_all(&mut stdout, b"\n").context("failed to write report")?;
    }

    if apply {
        let edited = host.body();
        if edited != original {
            let name = document.display().to_string();
            eprint!("{}", diff::document_diff(&name, &original, &edited));
            let (removed, inserted) = diff::changed_lines(&original, &edited);
            info!(removed, inserted, "writing edited document");
            atomic::persist_document(&document, &edited)?;
        }
    }

    registry.cancel_all();
    Ok(())
}
