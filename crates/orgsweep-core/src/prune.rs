//! Member and team pruning rules.
//!
//! 1. Organization members are removed if they
//!    a. have no `KEEP:` marker,
//!    b. were not added to the organization inside the audit window, and
//!    c. are not the actor of any audit event inside the window.
//! 2. Repository collaborators who are not (remaining) organization members
//!    are removed if they
//!    a. have no `KEEP:` marker,
//!    b. were not added to that repository inside the window,
//!    c. performed no audit-logged action on that repository, and
//!    d. the repository is not archived.
//! 3. Team members who are not (remaining) organization members are removed
//!    if they
//!    a. have no `KEEP:` marker,
//!    b. were not added to that team inside the window, and
//!    c. performed no audit-logged action on any repository the team can
//!       access.
//! 4. Teams without a `KEEP:` marker and without any members left are
//!    removed.
//!
//! Each stage is applied to the store before the next one is decided.

use crate::audit::{ActivityScope, AuditLog, Membership};
use crate::error::Result;
use crate::github::RemoteTeam;
use crate::resource::{Member, Repository, RepositoryCollaborator, RepositoryTeam, Team, TeamMember};
use crate::store::{candidates, ConfigStore};
use crate::transition::{apply_all, Transition};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Team display name to slug, as reported by GitHub.
pub type TeamSlugs = HashMap<String, String>;

pub fn team_slugs(teams: &[RemoteTeam]) -> TeamSlugs {
    teams
        .iter()
        .map(|t| (t.name.clone(), t.slug.clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

pub fn inactive_members<S: ConfigStore>(store: &S, log: &AuditLog) -> Vec<Transition> {
    candidates::<Member, _>(store)
        .into_iter()
        .filter(|m| !log.has_new_membership(&m.username, Membership::Organization))
        .filter(|m| !log.has_actor_activity(&m.username, ActivityScope::Anywhere))
        .map(Transition::RemoveMember)
        .collect()
}

pub fn inactive_collaborators<S: ConfigStore>(store: &S, log: &AuditLog) -> Vec<Transition> {
    let members = member_usernames(store);
    let archived: HashSet<String> = store
        .resources::<Repository>()
        .into_iter()
        .filter(|r| r.archived)
        .map(|r| r.name)
        .collect();

    candidates::<RepositoryCollaborator, _>(store)
        .into_iter()
        .filter(|c| !members.contains(&c.username))
        .filter(|c| {
            !log.has_new_membership(&c.username, Membership::Repository(&c.repository))
        })
        .filter(|c| {
            !log.has_actor_activity(&c.username, ActivityScope::Repository(&c.repository))
        })
        .filter(|c| !archived.contains(&c.repository))
        .map(Transition::RemoveCollaborator)
        .collect()
}

pub fn inactive_team_members<S: ConfigStore>(
    store: &S,
    log: &AuditLog,
    slugs: &TeamSlugs,
) -> Vec<Transition> {
    let members = member_usernames(store);
    let mut reachable: HashMap<String, Vec<String>> = HashMap::new();
    for link in store.resources::<RepositoryTeam>() {
        reachable.entry(link.team).or_default().push(link.repository);
    }
    let none: Vec<String> = Vec::new();

    let considered: Vec<TeamMember> = candidates::<TeamMember, _>(store)
        .into_iter()
        .filter(|m| !members.contains(&m.username))
        .collect();
    for team in unmatched_teams(&considered, slugs) {
        tracing::warn!(team, "team not found on GitHub, cannot check additions");
    }

    considered
        .into_iter()
        .filter(|m| match slugs.get(&m.team) {
            Some(slug) => !log.has_new_membership(&m.username, Membership::Team(slug)),
            None => true,
        })
        .filter(|m| {
            let repositories = reachable.get(&m.team).unwrap_or(&none);
            !log.has_actor_activity(&m.username, ActivityScope::AnyOf(repositories))
        })
        .map(Transition::RemoveTeamMember)
        .collect()
}

pub fn empty_teams<S: ConfigStore>(store: &S) -> Vec<Transition> {
    let staffed: HashSet<String> = store
        .resources::<TeamMember>()
        .into_iter()
        .map(|m| m.team)
        .collect();
    candidates::<Team, _>(store)
        .into_iter()
        .filter(|t| !staffed.contains(&t.name))
        .map(Transition::RemoveTeam)
        .collect()
}

/// Teams of `members` that have no GitHub slug, each listed once.
fn unmatched_teams(members: &[TeamMember], slugs: &TeamSlugs) -> BTreeSet<String> {
    members
        .iter()
        .filter(|m| !slugs.contains_key(&m.team))
        .map(|m| m.team.clone())
        .collect()
}

fn member_usernames<S: ConfigStore>(store: &S) -> HashSet<String> {
    store
        .resources::<Member>()
        .into_iter()
        .map(|m| m.username)
        .collect()
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run the four stages in order, committing each to `store` before the next
/// is decided. `report` is called for every change as it is applied.
pub fn prune<S, F>(
    store: &mut S,
    log: &AuditLog,
    slugs: &TeamSlugs,
    mut report: F,
) -> Result<Vec<Transition>>
where
    S: ConfigStore,
    F: FnMut(&Transition),
{
    let mut applied = Vec::new();
    let mut commit = |store: &mut S, stage: &str, planned: Vec<Transition>| -> Result<()> {
        let count = apply_all(&planned, store, |t| {
            report(t);
            applied.push(t.clone());
        })?;
        tracing::info!(stage, removed = count, "pruning stage complete");
        Ok(())
    };

    let planned = inactive_members(&*store, log);
    commit(&mut *store, "members", planned)?;

    let planned = inactive_collaborators(&*store, log);
    commit(&mut *store, "repository collaborators", planned)?;

    let planned = inactive_team_members(&*store, log, slugs);
    commit(&mut *store, "team members", planned)?;

    let planned = empty_teams(&*store);
    commit(&mut *store, "teams", planned)?;

    Ok(applied)
}
