use crate::resource::{Member, Repository, RepositoryCollaborator};
use crate::store::ConfigStore;
use crate::types::Visibility;
use std::collections::HashSet;

/// Collaborators on private, non-archived repositories who are not
/// organization members.
pub fn external_collaborators<S: ConfigStore>(store: &S) -> Vec<RepositoryCollaborator> {
    let private: HashSet<String> = store
        .resources::<Repository>()
        .into_iter()
        .filter(|r| r.visibility == Some(Visibility::Private) && !r.archived)
        .map(|r| r.name)
        .collect();
    let members: HashSet<String> = store
        .resources::<Member>()
        .into_iter()
        .map(|m| m.username)
        .collect();

    store
        .resources::<RepositoryCollaborator>()
        .into_iter()
        .filter(|c| private.contains(&c.repository) && !members.contains(&c.username))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::YamlConfig;
    use crate::types::Permission;

    #[test]
    fn counts_outside_collaborators_on_live_private_repositories() {
        let config = YamlConfig::parse(
            "\
members:
  member: [alice]
repositories:
  api:
    visibility: private
    collaborators:
      push: [alice, vendor]
      pull: [auditor]
  site:
    visibility: public
    collaborators:
      push: [writer]
  vault:
    visibility: private
    archived: true
    collaborators:
      pull: [former]
  intranet:
    visibility: internal
    collaborators:
      pull: [contractor]
",
        )
        .unwrap();
        assert_eq!(
            external_collaborators(&config),
            vec![
                RepositoryCollaborator::new("api", "vendor", Permission::Push),
                RepositoryCollaborator::new("api", "auditor", Permission::Pull),
            ]
        );
    }

    #[test]
    fn same_user_on_two_repositories_counts_twice() {
        let config = YamlConfig::parse(
            "\
repositories:
  a:
    visibility: private
    collaborators:
      pull: [vendor]
  b:
    visibility: private
    collaborators:
      pull: [vendor]
",
        )
        .unwrap();
        assert_eq!(external_collaborators(&config).len(), 2);
    }
}
