//! Output artifact writer.
//!
//! One pretty-printed JSON document per run — the exact serialization of
//! the run's `Snapshot`, nothing added. Never written for a failed run.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::types::Snapshot;

/// Write the run's snapshot to the configured output path.
pub fn write_snapshot(path: &str, snapshot: &Snapshot) -> Result<()> {
    let json =
        serde_json::to_string_pretty(snapshot).context("Failed to serialise snapshot")?;

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory {}", parent.display()))?;
        }
    }

    std::fs::write(path, &json).with_context(|| format!("Failed to write output to {path}"))?;

    info!(path, source = %snapshot.source, "Output artifact written");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
