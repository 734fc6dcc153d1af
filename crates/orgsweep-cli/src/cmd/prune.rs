use super::{finish, Settings};
use crate::output::print_transition;
use anyhow::Context;
use orgsweep_core::audit::AuditLog;
use orgsweep_core::github::OrgDirectory;
use orgsweep_core::prune::{prune, team_slugs};
use std::path::Path;

pub fn run(settings: &Settings, log_path: Option<&Path>) -> anyhow::Result<()> {
    let log_path = log_path.context("LOG_PATH is not set; pass --log-path")?;
    let mut config = settings.load_config()?;

    let window = settings.window();
    let log = AuditLog::from_path(log_path, window)
        .with_context(|| format!("failed to read audit log {}", log_path.display()))?;
    tracing::info!(events = log.len(), since = %window.start(), "audit log loaded");

    let client = settings.client()?;
    let teams = client.list_teams().context("failed to list teams")?;
    let slugs = team_slugs(&teams);

    let applied = prune(&mut config, &log, &slugs, |t| {
        if !settings.json {
            print_transition(t);
        }
    })?;

    finish(settings, &config, &applied)
}
