use crate::comments::Annotations;
use crate::document::OrgDocument;
use crate::error::{Result, SweepError};
use crate::resource::Resource;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigStore
// ---------------------------------------------------------------------------

/// Resource-level access to the organization config.
///
/// The rule engine only talks to this trait: it never sees the YAML tree or
/// its comments, and asks `is_exempt` whenever it needs the opt-out marker.
pub trait ConfigStore {
    fn resources<R: Resource>(&self) -> Vec<R>;

    /// Insert the resource, or update the existing node in place.
    fn add_resource<R: Resource>(&mut self, resource: &R) -> Result<()>;

    /// Returns false (and does nothing) if the resource is not present.
    fn remove_resource<R: Resource>(&mut self, resource: &R) -> Result<bool>;

    /// True if the resource's node carries a `KEEP:` annotation.
    fn is_exempt<R: Resource>(&self, resource: &R) -> bool;

    fn save(&self) -> Result<()>;

    fn contains<R: Resource>(&self, resource: &R) -> bool {
        self.resources::<R>().contains(resource)
    }
}

/// Resources of kind `R` that are not opted out of automated changes.
pub fn candidates<R: Resource, S: ConfigStore>(store: &S) -> Vec<R> {
    store
        .resources::<R>()
        .into_iter()
        .filter(|r| !store.is_exempt(r))
        .collect()
}

// ---------------------------------------------------------------------------
// YamlConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct YamlConfig {
    path: Option<PathBuf>,
    document: OrgDocument,
    annotations: Annotations,
}

impl YamlConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SweepError::ConfigNotFound(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&text)?;
        config.path = Some(path.to_path_buf());
        Ok(config)
    }

    /// An in-memory config with no backing file; `save` will fail.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(Self {
            path: None,
            document: OrgDocument::parse(text)?,
            annotations: Annotations::scan(text),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn document(&self) -> &OrgDocument {
        &self.document
    }

    pub fn annotations_mut(&mut self) -> &mut Annotations {
        &mut self.annotations
    }

    /// The document as YAML with inline comments restored.
    pub fn to_yaml_string(&self) -> Result<String> {
        let text = self.document.to_yaml()?;
        Ok(self.annotations.apply(&text))
    }
}

impl ConfigStore for YamlConfig {
    fn resources<R: Resource>(&self) -> Vec<R> {
        R::collect(&self.document)
    }

    fn add_resource<R: Resource>(&mut self, resource: &R) -> Result<()> {
        resource.upsert(&mut self.document)
    }

    fn remove_resource<R: Resource>(&mut self, resource: &R) -> Result<bool> {
        let removed = resource.remove(&mut self.document);
        if removed {
            let path = resource.node_path();
            tracing::debug!(kind = %R::KIND, path = %path, "removed from config");
            self.annotations.forget(&path);
        }
        Ok(removed)
    }

    fn is_exempt<R: Resource>(&self, resource: &R) -> bool {
        self.annotations.is_keep(&resource.node_path())
    }

    fn save(&self) -> Result<()> {
        let path = self.path.as_deref().ok_or_else(|| {
            SweepError::InvalidConfig("config has no backing file to save to".to_string())
        })?;
        let data = self.to_yaml_string()?;
        crate::io::atomic_write(path, data.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Member, Repository, Team, TeamMember};
    use crate::types::{MemberRole, TeamRole};
    use tempfile::TempDir;

    const DOC: &str = "\
members:
  member:
    - alice
    - bob # KEEP: sabbatical
repositories:
  infra: # KEEP: audit trail
    visibility: private
teams:
  platform:
    members:
      member:
        - carol
";

    #[test]
    fn exemption_reflects_inline_marker() {
        let config = YamlConfig::parse(DOC).unwrap();
        assert!(!config.is_exempt(&Member::new("alice", MemberRole::Member)));
        assert!(config.is_exempt(&Member::new("bob", MemberRole::Member)));
        let infra = &config.resources::<Repository>()[0];
        assert!(config.is_exempt(infra));
    }

    #[test]
    fn candidates_skip_exempt_resources() {
        let config = YamlConfig::parse(DOC).unwrap();
        let members: Vec<Member> = candidates(&config);
        assert_eq!(members, vec![Member::new("alice", MemberRole::Member)]);
        assert!(candidates::<Repository, _>(&config).is_empty());
    }

    #[test]
    fn remove_is_idempotent() {
        let mut config = YamlConfig::parse(DOC).unwrap();
        let alice = Member::new("alice", MemberRole::Member);
        assert!(config.remove_resource(&alice).unwrap());
        assert!(!config.remove_resource(&alice).unwrap());
        assert!(!config.contains(&alice));
    }

    #[test]
    fn marker_added_later_is_observed() {
        let mut config = YamlConfig::parse(DOC).unwrap();
        let carol = TeamMember::new("platform", "carol", TeamRole::Member);
        assert!(!config.is_exempt(&carol));
        config
            .annotations_mut()
            .insert(carol.node_path(), "KEEP: rotation");
        assert!(config.is_exempt(&carol));
    }

    #[test]
    fn save_without_path_fails() {
        let config = YamlConfig::parse(DOC).unwrap();
        assert!(matches!(config.save(), Err(SweepError::InvalidConfig(_))));
    }

    #[test]
    fn load_missing_file_is_config_not_found() {
        let dir = TempDir::new().unwrap();
        let err = YamlConfig::load(&dir.path().join("github/org.yml")).unwrap_err();
        assert!(matches!(err, SweepError::ConfigNotFound(_)));
    }

    #[test]
    fn save_round_trips_markers_and_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("org.yml");
        std::fs::write(&path, DOC).unwrap();

        let mut config = YamlConfig::load(&path).unwrap();
        config
            .remove_resource(&Member::new("alice", MemberRole::Member))
            .unwrap();
        config.remove_resource(&Team::new("platform")).unwrap();
        config.save().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("alice"));
        assert!(!text.contains("platform"));
        assert!(text.contains("bob # KEEP: sabbatical"));
        assert!(text.contains("infra: # KEEP: audit trail"));

        let reloaded = YamlConfig::load(&path).unwrap();
        assert!(reloaded.is_exempt(&Member::new("bob", MemberRole::Member)));
    }
}
