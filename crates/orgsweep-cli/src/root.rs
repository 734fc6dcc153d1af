use anyhow::{bail, Context};
use std::path::{Path, PathBuf};

/// Directory, relative to the repository root, holding one config per org.
pub const CONFIG_DIR: &str = "github";

/// Resolve the organization config file.
///
/// Priority:
/// 1. `--config` flag / `GITHUB_MGMT_CONFIG` env var (passed in as `explicit`)
/// 2. Walk upward from `start` looking for `github/<org>.yml`
pub fn resolve_config(
    explicit: Option<&Path>,
    org: Option<&str>,
    start: &Path,
) -> anyhow::Result<PathBuf> {
    if let Some(p) = explicit {
        return Ok(p.to_path_buf());
    }
    let org = org.context("GITHUB_ORG is not set; pass --org or --config")?;
    let relative = Path::new(CONFIG_DIR).join(format!("{org}.yml"));

    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(&relative);
        if candidate.is_file() {
            return Ok(candidate);
        }
        match dir.parent() {
            Some(p) => dir = p.to_path_buf(),
            None => break,
        }
    }
    bail!(
        "{} not found in {} or any parent directory",
        relative.display(),
        start.display()
    )
}
