use super::{finish, Settings};
use crate::output::print_transition;
use anyhow::Context;
use orgsweep_core::archive;
use orgsweep_core::transition::apply_all;

pub fn run(settings: &Settings) -> anyhow::Result<()> {
    let mut config = settings.load_config()?;
    let client = settings.client()?;

    let planned = archive::plan(&config, &client, settings.window())
        .with_context(|| format!("failed to collect repository signals for {}", client.org()))?;

    let mut applied = Vec::new();
    apply_all(&planned, &mut config, |t| {
        if !settings.json {
            print_transition(t);
        }
        applied.push(t.clone());
    })?;

    finish(settings, &config, &applied)
}
