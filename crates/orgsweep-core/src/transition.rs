use crate::error::Result;
use crate::resource::{Member, Repository, RepositoryCollaborator, Team, TeamMember};
use crate::store::ConfigStore;
use serde::Serialize;
use std::fmt;

/// One change the inactivity rules decided on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Transition {
    RemoveMember(Member),
    RemoveCollaborator(RepositoryCollaborator),
    RemoveTeamMember(TeamMember),
    RemoveTeam(Team),
    ArchiveRepository(Repository),
}

impl Transition {
    /// Apply to the store. Returns false if there was nothing to change:
    /// the resource is already gone, or the repository is already archived.
    pub fn apply<S: ConfigStore>(&self, store: &mut S) -> Result<bool> {
        match self {
            Transition::RemoveMember(member) => store.remove_resource(member),
            Transition::RemoveCollaborator(collaborator) => store.remove_resource(collaborator),
            Transition::RemoveTeamMember(member) => store.remove_resource(member),
            Transition::RemoveTeam(team) => store.remove_resource(team),
            Transition::ArchiveRepository(repository) => {
                let current = store
                    .resources::<Repository>()
                    .into_iter()
                    .find(|r| r.name == repository.name);
                match current {
                    Some(current) if !current.archived => {
                        store.add_resource(&Repository {
                            archived: true,
                            ..current
                        })?;
                        Ok(true)
                    }
                    _ => Ok(false),
                }
            }
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::RemoveMember(m) => write!(f, "Removing {}", m.username),
            Transition::RemoveCollaborator(c) => {
                write!(f, "Removing {} from {} repository", c.username, c.repository)
            }
            Transition::RemoveTeamMember(m) => {
                write!(f, "Removing {} from {} team", m.username, m.team)
            }
            Transition::RemoveTeam(t) => write!(f, "Removing {} team", t.name),
            Transition::ArchiveRepository(r) => write!(f, "Archiving {} repository", r.name),
        }
    }
}

/// Apply each transition in order, calling `report` for the ones that
/// changed the store.
pub fn apply_all<S, F>(transitions: &[Transition], store: &mut S, mut report: F) -> Result<usize>
where
    S: ConfigStore,
    F: FnMut(&Transition),
{
    let mut applied = 0;
    for transition in transitions {
        if transition.apply(store)? {
            report(transition);
            applied += 1;
        }
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::YamlConfig;
    use crate::types::{MemberRole, Permission, TeamRole, Visibility};

    const DOC: &str = "\
members:
  member: [alice]
repositories:
  infra:
    visibility: private
    collaborators:
      push: [bob]
  old:
    archived: true
teams:
  ghost: {}
  platform:
    members:
      member: [carol]
";

    #[test]
    fn display_matches_action_lines() {
        let cases = [
            (
                Transition::RemoveMember(Member::new("alice", MemberRole::Member)),
                "Removing alice",
            ),
            (
                Transition::RemoveCollaborator(RepositoryCollaborator::new(
                    "infra",
                    "bob",
                    Permission::Push,
                )),
                "Removing bob from infra repository",
            ),
            (
                Transition::RemoveTeamMember(TeamMember::new("platform", "carol", TeamRole::Member)),
                "Removing carol from platform team",
            ),
            (Transition::RemoveTeam(Team::new("ghost")), "Removing ghost team"),
            (
                Transition::ArchiveRepository(Repository::new("infra", Some(Visibility::Private))),
                "Archiving infra repository",
            ),
        ];
        for (transition, line) in cases {
            assert_eq!(transition.to_string(), line);
        }
    }

    #[test]
    fn archive_is_monotonic() {
        let mut config = YamlConfig::parse(DOC).unwrap();
        let infra = Transition::ArchiveRepository(Repository::new("infra", None));
        assert!(infra.apply(&mut config).unwrap());
        assert!(!infra.apply(&mut config).unwrap());
        let old = Transition::ArchiveRepository(Repository::new("old", None));
        assert!(!old.apply(&mut config).unwrap());
        let missing = Transition::ArchiveRepository(Repository::new("missing", None));
        assert!(!missing.apply(&mut config).unwrap());
        assert!(config.resources::<Repository>().iter().all(|r| r.name != "missing"));

        let infra = config
            .resources::<Repository>()
            .into_iter()
            .find(|r| r.name == "infra")
            .unwrap();
        assert!(infra.archived);
        assert_eq!(infra.visibility, Some(Visibility::Private));
    }

    #[test]
    fn apply_all_reports_only_effective_changes() {
        let mut config = YamlConfig::parse(DOC).unwrap();
        let alice = Transition::RemoveMember(Member::new("alice", MemberRole::Member));
        let transitions = vec![alice.clone(), alice, Transition::RemoveTeam(Team::new("ghost"))];
        let mut lines = Vec::new();
        let applied = apply_all(&transitions, &mut config, |t| lines.push(t.to_string())).unwrap();
        assert_eq!(applied, 2);
        assert_eq!(lines, vec!["Removing alice", "Removing ghost team"]);
    }

    #[test]
    fn serializes_with_action_tag() {
        let json = serde_json::to_value(Transition::RemoveTeam(Team::new("ghost"))).unwrap();
        assert_eq!(json["action"], "remove_team");
        assert_eq!(json["name"], "ghost");
    }
}
