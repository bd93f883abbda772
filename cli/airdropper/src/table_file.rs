use std::path::Path;

use airdropper::{Distribution, DistributionOutput};
use anyhow::{Context, Result};

/// Loads a distribution written by `build-tree`, checking its stored root.
pub fn load(path: &Path) -> Result<Distribution> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read distribution file {:?}", path))?;
    let output: DistributionOutput =
        serde_json::from_str(&contents).context("Failed to parse distribution JSON")?;
    Distribution::from_output(&output).context("Distribution file is inconsistent")
}
