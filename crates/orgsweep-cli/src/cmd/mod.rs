pub mod archive;
pub mod census;
pub mod prune;

use crate::output::print_json;
use crate::root;
use anyhow::Context;
use chrono::Utc;
use orgsweep_core::audit::AuditWindow;
use orgsweep_core::github::GitHubClient;
use orgsweep_core::store::{ConfigStore, YamlConfig};
use orgsweep_core::transition::Transition;
use std::path::PathBuf;

/// Global options shared by every subcommand.
pub struct Settings {
    pub org: Option<String>,
    pub token: Option<String>,
    pub api_url: String,
    pub config: Option<PathBuf>,
    pub window_months: u32,
    pub dry_run: bool,
    pub json: bool,
}

impl Settings {
    pub fn org(&self) -> anyhow::Result<&str> {
        self.org
            .as_deref()
            .context("GITHUB_ORG is not set; pass --org")
    }

    pub fn load_config(&self) -> anyhow::Result<YamlConfig> {
        let cwd = std::env::current_dir().context("failed to read current directory")?;
        let path = root::resolve_config(self.config.as_deref(), self.org.as_deref(), &cwd)?;
        tracing::debug!(path = %path.display(), "loading config");
        YamlConfig::load(&path).with_context(|| format!("failed to load {}", path.display()))
    }

    pub fn client(&self) -> anyhow::Result<GitHubClient> {
        let token = self
            .token
            .as_deref()
            .context("GITHUB_TOKEN is not set; pass --token")?;
        GitHubClient::new(&self.api_url, self.org()?, token)
            .context("failed to build GitHub client")
    }

    pub fn window(&self) -> AuditWindow {
        AuditWindow::months_before(Utc::now(), self.window_months)
    }
}

/// Print `applied` as JSON if requested, then save unless this is a dry run.
pub fn finish(settings: &Settings, config: &YamlConfig, applied: &[Transition]) -> anyhow::Result<()> {
    if settings.json {
        print_json(&applied)?;
    }
    if settings.dry_run {
        tracing::info!(changes = applied.len(), "dry run, config not saved");
        return Ok(());
    }
    if applied.is_empty() {
        return Ok(());
    }
    config.save().context("failed to save config")?;
    tracing::info!(changes = applied.len(), "config saved");
    Ok(())
}
