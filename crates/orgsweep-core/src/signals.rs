use crate::audit::AuditWindow;
use crate::error::Result;
use crate::github::{OrgDirectory, RemoteRepository};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepositorySignal {
    pub latest_event: Option<DateTime<Utc>>,
    pub latest_activity: Option<DateTime<Utc>>,
}

/// Latest event and latest activity per repository, judged against one
/// audit window.
#[derive(Debug, Clone)]
pub struct RepositorySignals {
    window: AuditWindow,
    by_repository: HashMap<String, RepositorySignal>,
}

impl RepositorySignals {
    pub fn new(window: AuditWindow) -> Self {
        Self {
            window,
            by_repository: HashMap::new(),
        }
    }

    /// Fetch both signals for every repository, one request at a time.
    ///
    /// A repository with no events or no activity simply has no signal;
    /// request failures propagate.
    pub fn collect<D: OrgDirectory + ?Sized>(
        directory: &D,
        repositories: &[RemoteRepository],
        window: AuditWindow,
    ) -> Result<Self> {
        let mut signals = Self::new(window);
        for repository in repositories {
            let event = directory.latest_repository_event(&repository.name)?;
            signals.record_event(&repository.name, event.map(|e| e.created_at));
        }
        for repository in repositories {
            let activity = directory.latest_repository_activity(&repository.name)?;
            signals.record_activity(&repository.name, activity);
        }
        tracing::info!(
            repositories = repositories.len(),
            recent = signals
                .by_repository
                .keys()
                .filter(|name| signals.is_recent(name))
                .count(),
            "collected repository signals"
        );
        Ok(signals)
    }

    pub fn record_event(&mut self, repository: &str, at: Option<DateTime<Utc>>) {
        self.by_repository
            .entry(repository.to_string())
            .or_default()
            .latest_event = at;
    }

    pub fn record_activity(&mut self, repository: &str, at: Option<DateTime<Utc>>) {
        self.by_repository
            .entry(repository.to_string())
            .or_default()
            .latest_activity = at;
    }

    pub fn get(&self, repository: &str) -> Option<&RepositorySignal> {
        self.by_repository.get(repository)
    }

    /// True if either signal falls inside the window. Unknown repositories
    /// and missing signals count as not recent.
    pub fn is_recent(&self, repository: &str) -> bool {
        let Some(signal) = self.by_repository.get(repository) else {
            return false;
        };
        [signal.latest_event, signal.latest_activity]
            .into_iter()
            .flatten()
            .any(|at| self.window.contains(at))
    }
}
