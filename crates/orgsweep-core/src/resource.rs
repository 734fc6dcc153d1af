use crate::comments::NodePath;
use crate::document::OrgDocument;
use crate::error::Result;
use crate::types::{MemberRole, Permission, ResourceKind, TeamRole, Visibility};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A typed view over one kind of node in the organization config.
pub trait Resource: Clone + Debug + PartialEq + Sized {
    const KIND: ResourceKind;

    /// Path of the node whose inline comment carries this resource's
    /// annotations.
    fn node_path(&self) -> NodePath;

    /// Every resource of this kind in `doc`, in document order.
    fn collect(doc: &OrgDocument) -> Vec<Self>;

    /// Add the resource, or update it in place if it already exists.
    fn upsert(&self, doc: &mut OrgDocument) -> Result<()>;

    /// Returns false if the resource was not in `doc`.
    fn remove(&self, doc: &mut OrgDocument) -> bool;
}

// ---------------------------------------------------------------------------
// Member
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    pub username: String,
    pub role: MemberRole,
}

impl Member {
    pub fn new(username: impl Into<String>, role: MemberRole) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }
}

impl Resource for Member {
    const KIND: ResourceKind = ResourceKind::Member;

    fn node_path(&self) -> NodePath {
        NodePath::new(["members", self.role.as_str(), self.username.as_str()])
    }

    fn collect(doc: &OrgDocument) -> Vec<Self> {
        MemberRole::all()
            .iter()
            .flat_map(|role| {
                doc.strings(&["members", role.as_str()])
                    .into_iter()
                    .map(move |username| Member::new(username, *role))
            })
            .collect()
    }

    fn upsert(&self, doc: &mut OrgDocument) -> Result<()> {
        doc.push_string(&["members", self.role.as_str()], self.username.as_str())?;
        Ok(())
    }

    fn remove(&self, doc: &mut OrgDocument) -> bool {
        doc.remove_string(&["members", self.role.as_str()], self.username.as_str())
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub visibility: Option<Visibility>,
    pub archived: bool,
}

impl Repository {
    pub fn new(name: impl Into<String>, visibility: Option<Visibility>) -> Self {
        Self {
            name: name.into(),
            visibility,
            archived: false,
        }
    }
}

impl Resource for Repository {
    const KIND: ResourceKind = ResourceKind::Repository;

    fn node_path(&self) -> NodePath {
        NodePath::new(["repositories", self.name.as_str()])
    }

    fn collect(doc: &OrgDocument) -> Vec<Self> {
        doc.keys(&["repositories"])
            .into_iter()
            .map(|name| {
                let visibility = doc
                    .string(&["repositories", name.as_str(), "visibility"])
                    .and_then(|v| v.parse().ok());
                let archived = doc
                    .bool(&["repositories", name.as_str(), "archived"])
                    .unwrap_or(false);
                Repository {
                    name,
                    visibility,
                    archived,
                }
            })
            .collect()
    }

    fn upsert(&self, doc: &mut OrgDocument) -> Result<()> {
        let node = doc.mapping_mut(&["repositories", self.name.as_str()])?;
        if let Some(visibility) = self.visibility {
            node.insert("visibility".into(), visibility.as_str().into());
        }
        if self.archived || node.contains_key("archived") {
            node.insert("archived".into(), self.archived.into());
        }
        Ok(())
    }

    fn remove(&self, doc: &mut OrgDocument) -> bool {
        doc.remove_key(&["repositories"], self.name.as_str())
    }
}

// ---------------------------------------------------------------------------
// Team
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
}

impl Team {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Resource for Team {
    const KIND: ResourceKind = ResourceKind::Team;

    fn node_path(&self) -> NodePath {
        NodePath::new(["teams", self.name.as_str()])
    }

    fn collect(doc: &OrgDocument) -> Vec<Self> {
        doc.keys(&["teams"]).into_iter().map(Team::new).collect()
    }

    fn upsert(&self, doc: &mut OrgDocument) -> Result<()> {
        doc.mapping_mut(&["teams", self.name.as_str()])?;
        Ok(())
    }

    fn remove(&self, doc: &mut OrgDocument) -> bool {
        doc.remove_key(&["teams"], self.name.as_str())
    }
}

// ---------------------------------------------------------------------------
// TeamMember
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamMember {
    pub team: String,
    pub username: String,
    pub role: TeamRole,
}

impl TeamMember {
    pub fn new(team: impl Into<String>, username: impl Into<String>, role: TeamRole) -> Self {
        Self {
            team: team.into(),
            username: username.into(),
            role,
        }
    }
}

impl Resource for TeamMember {
    const KIND: ResourceKind = ResourceKind::TeamMember;

    fn node_path(&self) -> NodePath {
        NodePath::new([
            "teams",
            self.team.as_str(),
            "members",
            self.role.as_str(),
            self.username.as_str(),
        ])
    }

    fn collect(doc: &OrgDocument) -> Vec<Self> {
        let mut out = Vec::new();
        for team in doc.keys(&["teams"]) {
            for role in TeamRole::all() {
                for username in doc.strings(&["teams", team.as_str(), "members", role.as_str()]) {
                    out.push(TeamMember::new(team.clone(), username, *role));
                }
            }
        }
        out
    }

    fn upsert(&self, doc: &mut OrgDocument) -> Result<()> {
        doc.push_string(
            &["teams", self.team.as_str(), "members", self.role.as_str()],
            self.username.as_str(),
        )?;
        Ok(())
    }

    fn remove(&self, doc: &mut OrgDocument) -> bool {
        doc.remove_string(
            &["teams", self.team.as_str(), "members", self.role.as_str()],
            self.username.as_str(),
        )
    }
}

// ---------------------------------------------------------------------------
// RepositoryCollaborator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryCollaborator {
    pub repository: String,
    pub username: String,
    pub permission: Permission,
}

impl RepositoryCollaborator {
    pub fn new(
        repository: impl Into<String>,
        username: impl Into<String>,
        permission: Permission,
    ) -> Self {
        Self {
            repository: repository.into(),
            username: username.into(),
            permission,
        }
    }
}

impl Resource for RepositoryCollaborator {
    const KIND: ResourceKind = ResourceKind::RepositoryCollaborator;

    fn node_path(&self) -> NodePath {
        NodePath::new([
            "repositories",
            self.repository.as_str(),
            "collaborators",
            self.permission.as_str(),
            self.username.as_str(),
        ])
    }

    fn collect(doc: &OrgDocument) -> Vec<Self> {
        repository_links(doc, "collaborators")
            .map(|(repository, permission, username)| {
                RepositoryCollaborator::new(repository, username, permission)
            })
            .collect()
    }

    fn upsert(&self, doc: &mut OrgDocument) -> Result<()> {
        doc.push_string(
            &[
                "repositories",
                self.repository.as_str(),
                "collaborators",
                self.permission.as_str(),
            ],
            self.username.as_str(),
        )?;
        Ok(())
    }

    fn remove(&self, doc: &mut OrgDocument) -> bool {
        doc.remove_string(
            &[
                "repositories",
                self.repository.as_str(),
                "collaborators",
                self.permission.as_str(),
            ],
            self.username.as_str(),
        )
    }
}

// ---------------------------------------------------------------------------
// RepositoryTeam
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryTeam {
    pub repository: String,
    pub team: String,
    pub permission: Permission,
}

impl RepositoryTeam {
    pub fn new(
        repository: impl Into<String>,
        team: impl Into<String>,
        permission: Permission,
    ) -> Self {
        Self {
            repository: repository.into(),
            team: team.into(),
            permission,
        }
    }
}

impl Resource for RepositoryTeam {
    const KIND: ResourceKind = ResourceKind::RepositoryTeam;

    fn node_path(&self) -> NodePath {
        NodePath::new([
            "repositories",
            self.repository.as_str(),
            "teams",
            self.permission.as_str(),
            self.team.as_str(),
        ])
    }

    fn collect(doc: &OrgDocument) -> Vec<Self> {
        repository_links(doc, "teams")
            .map(|(repository, permission, team)| RepositoryTeam::new(repository, team, permission))
            .collect()
    }

    fn upsert(&self, doc: &mut OrgDocument) -> Result<()> {
        doc.push_string(
            &[
                "repositories",
                self.repository.as_str(),
                "teams",
                self.permission.as_str(),
            ],
            self.team.as_str(),
        )?;
        Ok(())
    }

    fn remove(&self, doc: &mut OrgDocument) -> bool {
        doc.remove_string(
            &[
                "repositories",
                self.repository.as_str(),
                "teams",
                self.permission.as_str(),
            ],
            self.team.as_str(),
        )
    }
}

/// `(repository, permission, entry)` for every entry of
/// `repositories.<repo>.<section>.<permission>`.
fn repository_links<'a>(
    doc: &'a OrgDocument,
    section: &'a str,
) -> impl Iterator<Item = (String, Permission, String)> + 'a {
    doc.keys(&["repositories"]).into_iter().flat_map(move |repository| {
        Permission::all().iter().flat_map(move |permission| {
            let repository = repository.clone();
            doc.strings(&["repositories", repository.as_str(), section, permission.as_str()])
                .into_iter()
                .map(move |entry| (repository.clone(), *permission, entry))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
members:
  admin: [alice]
  member: [bob]
repositories:
  infra:
    visibility: private
    collaborators:
      push: [carol]
      pull: [dan]
    teams:
      maintain: [platform]
  website:
    visibility: public
    archived: true
teams:
  platform:
    members:
      maintainer: [erin]
      member: [frank]
  ghost: {}
"#;

    fn doc() -> OrgDocument {
        OrgDocument::parse(DOC).unwrap()
    }

    #[test]
    fn collects_every_kind() {
        let doc = doc();
        assert_eq!(
            Member::collect(&doc),
            vec![
                Member::new("alice", MemberRole::Admin),
                Member::new("bob", MemberRole::Member)
            ]
        );
        let repos = Repository::collect(&doc);
        assert_eq!(repos.len(), 2);
        assert_eq!(repos[0].visibility, Some(Visibility::Private));
        assert!(!repos[0].archived);
        assert!(repos[1].archived);
        assert_eq!(Team::collect(&doc), vec![Team::new("platform"), Team::new("ghost")]);
        assert_eq!(TeamMember::collect(&doc).len(), 2);
        assert_eq!(
            RepositoryCollaborator::collect(&doc),
            vec![
                RepositoryCollaborator::new("infra", "carol", Permission::Push),
                RepositoryCollaborator::new("infra", "dan", Permission::Pull),
            ]
        );
        assert_eq!(
            RepositoryTeam::collect(&doc),
            vec![RepositoryTeam::new("infra", "platform", Permission::Maintain)]
        );
    }

    #[test]
    fn node_paths_follow_document_layout() {
        assert_eq!(
            TeamMember::new("platform", "erin", TeamRole::Maintainer)
                .node_path()
                .to_string(),
            "teams.platform.members.maintainer.erin"
        );
        assert_eq!(
            RepositoryCollaborator::new("infra", "carol", Permission::Push)
                .node_path()
                .to_string(),
            "repositories.infra.collaborators.push.carol"
        );
    }

    #[test]
    fn repository_upsert_marks_archived_in_place() {
        let mut doc = doc();
        let mut repo = Repository::collect(&doc).remove(0);
        repo.archived = true;
        repo.upsert(&mut doc).unwrap();
        let repo = &Repository::collect(&doc)[0];
        assert!(repo.archived);
        // collaborators are untouched by the upsert
        assert_eq!(RepositoryCollaborator::collect(&doc).len(), 2);
    }

    #[test]
    fn removing_team_member_keeps_team_node() {
        let mut doc = doc();
        assert!(TeamMember::new("platform", "frank", TeamRole::Member).remove(&mut doc));
        assert!(TeamMember::new("platform", "erin", TeamRole::Maintainer).remove(&mut doc));
        assert!(TeamMember::collect(&doc).is_empty());
        assert!(Team::collect(&doc).contains(&Team::new("platform")));
    }

    #[test]
    fn remove_absent_resource_returns_false() {
        let mut doc = doc();
        assert!(!Member::new("zed", MemberRole::Member).remove(&mut doc));
        assert!(!Team::new("nope").remove(&mut doc));
    }
}
