//! Repository archival rules.
//!
//! A repository is archived when it
//!  a. is not archived on GitHub already,
//!  b. has no `KEEP:` marker in the config,
//!  c. has no issue/pull request event inside the audit window, and
//!  d. has no activity (pushes, merges) inside the audit window.

use crate::audit::AuditWindow;
use crate::error::Result;
use crate::github::{OrgDirectory, RemoteRepository};
use crate::resource::Repository;
use crate::signals::RepositorySignals;
use crate::store::ConfigStore;
use crate::transition::Transition;
use std::collections::HashMap;

/// Decide which config repositories to archive, given the live repositories
/// that are not archived yet and their signals.
///
/// Repositories that exist live but not in the config are left alone, as are
/// config repositories that are not in `live`.
pub fn decide<S: ConfigStore>(
    store: &S,
    live: &[RemoteRepository],
    signals: &RepositorySignals,
) -> Vec<Transition> {
    let configured: HashMap<String, Repository> = store
        .resources::<Repository>()
        .into_iter()
        .map(|r| (r.name.clone(), r))
        .collect();

    let mut transitions = Vec::new();
    for remote in live.iter().filter(|r| !r.archived) {
        let Some(repository) = configured.get(&remote.name) else {
            tracing::debug!(repository = %remote.name, "not in config, skipping");
            continue;
        };
        if repository.archived {
            continue;
        }
        if store.is_exempt(repository) {
            tracing::debug!(repository = %remote.name, "KEEP marker, retaining");
            continue;
        }
        if signals.is_recent(&remote.name) {
            continue;
        }
        transitions.push(Transition::ArchiveRepository(repository.clone()));
    }
    transitions
}

/// Fetch live repositories and their signals, then decide.
pub fn plan<S, D>(store: &S, directory: &D, window: AuditWindow) -> Result<Vec<Transition>>
where
    S: ConfigStore,
    D: OrgDirectory + ?Sized,
{
    let live: Vec<RemoteRepository> = directory
        .list_repositories()?
        .into_iter()
        .filter(|r| !r.archived)
        .collect();
    let signals = RepositorySignals::collect(directory, &live, window)?;
    let transitions = decide(store, &live, &signals);
    tracing::info!(
        live = live.len(),
        archiving = transitions.len(),
        "planned repository archival"
    );
    Ok(transitions)
}
