use crate::error::{Result, SweepError};
use crate::types::Visibility;
use serde_yaml::{Mapping, Value};

/// The organization config as a YAML value tree.
///
/// Keys this crate does not model (descriptions, branch protection, ...) are
/// carried through untouched so a save only changes what the engine changed.
#[derive(Debug, Clone, PartialEq)]
pub struct OrgDocument {
    root: Value,
}

impl OrgDocument {
    pub fn parse(text: &str) -> Result<Self> {
        let root: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_yaml::from_str(text)?
        };
        Self::from_value(root)
    }

    pub fn from_value(root: Value) -> Result<Self> {
        let root = match root {
            Value::Null => Value::Mapping(Mapping::new()),
            Value::Mapping(_) => root,
            _ => {
                return Err(SweepError::InvalidConfig(
                    "top level of the config must be a mapping".to_string(),
                ))
            }
        };
        let doc = Self { root };
        doc.validate()?;
        Ok(doc)
    }

    pub fn value(&self) -> &Value {
        &self.root
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.root)?)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        let mut current = &self.root;
        for key in path {
            current = child(current, key)?;
        }
        Some(current)
    }

    /// String keys of the mapping at `path`, in document order.
    pub fn keys(&self, path: &[&str]) -> Vec<String> {
        match self.get(path) {
            Some(Value::Mapping(map)) => map.keys().filter_map(scalar_string).collect(),
            _ => Vec::new(),
        }
    }

    /// Scalar entries of the sequence at `path`, rendered as strings.
    pub fn strings(&self, path: &[&str]) -> Vec<String> {
        match self.get(path) {
            Some(Value::Sequence(items)) => items.iter().filter_map(scalar_string).collect(),
            _ => Vec::new(),
        }
    }

    pub fn string(&self, path: &[&str]) -> Option<String> {
        self.get(path).and_then(scalar_string)
    }

    pub fn bool(&self, path: &[&str]) -> Option<bool> {
        self.get(path).and_then(Value::as_bool)
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Mapping at `path`, creating empty mappings along the way.
    pub fn mapping_mut(&mut self, path: &[&str]) -> Result<&mut Mapping> {
        let mut current = &mut self.root;
        for key in path {
            if current.is_null() {
                *current = Value::Mapping(Mapping::new());
            }
            current = match current {
                Value::Mapping(map) => {
                    let existing = entry_key(map, key);
                    map.entry(existing).or_insert(Value::Null)
                }
                _ => return Err(not_a_mapping(path)),
            };
        }
        if current.is_null() {
            *current = Value::Mapping(Mapping::new());
        }
        match current {
            Value::Mapping(map) => Ok(map),
            _ => Err(not_a_mapping(path)),
        }
    }

    /// Append `item` to the sequence at `path`. Returns false if it was
    /// already listed.
    pub fn push_string(&mut self, path: &[&str], item: &str) -> Result<bool> {
        let Some((last, parent)) = path.split_last() else {
            return Err(not_a_mapping(path));
        };
        let map = self.mapping_mut(parent)?;
        let existing = entry_key(map, last);
        let slot = map.entry(existing).or_insert(Value::Null);
        if slot.is_null() {
            *slot = Value::Sequence(Vec::new());
        }
        let Value::Sequence(items) = slot else {
            return Err(SweepError::InvalidConfig(format!(
                "expected a list at '{}'",
                path.join(".")
            )));
        };
        if items.iter().any(|v| scalar_string(v).as_deref() == Some(item)) {
            return Ok(false);
        }
        items.push(Value::String(item.to_string()));
        Ok(true)
    }

    /// Remove `item` from the sequence at `path`. An emptied list is dropped,
    /// and so is its parent mapping if that leaves it empty.
    pub fn remove_string(&mut self, path: &[&str], item: &str) -> bool {
        let Some(Value::Sequence(items)) = self.lookup_mut(path) else {
            return false;
        };
        let before = items.len();
        items.retain(|v| scalar_string(v).as_deref() != Some(item));
        if items.len() == before {
            return false;
        }
        if items.is_empty() {
            self.prune_empty(path);
        }
        true
    }

    /// Remove `key` from the mapping at `path`.
    pub fn remove_key(&mut self, path: &[&str], key: &str) -> bool {
        match self.lookup_mut(path) {
            Some(Value::Mapping(map)) => match find_key(map, key) {
                Some(existing) => map.shift_remove(existing).is_some(),
                None => false,
            },
            _ => false,
        }
    }

    fn lookup_mut(&mut self, path: &[&str]) -> Option<&mut Value> {
        let mut current = &mut self.root;
        for key in path {
            current = child_mut(current, key)?;
        }
        Some(current)
    }

    fn prune_empty(&mut self, path: &[&str]) {
        // Only the list and its direct container; the owning repository or
        // team node stays even when it has nothing left in it.
        for depth in [path.len(), path.len().saturating_sub(1)] {
            if depth == 0 {
                break;
            }
            let empty = match self.get(&path[..depth]) {
                Some(Value::Sequence(items)) => items.is_empty(),
                Some(Value::Mapping(map)) => map.is_empty(),
                _ => false,
            };
            if !empty {
                break;
            }
            self.remove_key(&path[..depth - 1], path[depth - 1]);
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    fn validate(&self) -> Result<()> {
        for section in ["members", "repositories", "teams"] {
            match self.get(&[section]) {
                None | Some(Value::Null) | Some(Value::Mapping(_)) => {}
                Some(_) => {
                    return Err(SweepError::InvalidConfig(format!(
                        "'{section}' must be a mapping"
                    )))
                }
            }
        }
        for name in self.keys(&["repositories"]) {
            if let Some(visibility) = self.string(&["repositories", &name, "visibility"]) {
                visibility.parse::<Visibility>()?;
            }
        }
        Ok(())
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// Keys may be numbers or booleans (`2048:`); they are matched by their
// rendered text, the same way `keys` lists them.

fn find_key(map: &Mapping, key: &str) -> Option<Value> {
    map.keys()
        .find(|k| scalar_string(k).as_deref() == Some(key))
        .cloned()
}

fn entry_key(map: &Mapping, key: &str) -> Value {
    find_key(map, key).unwrap_or_else(|| Value::String(key.to_string()))
}

fn child<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let Value::Mapping(map) = value else {
        return None;
    };
    map.iter()
        .find(|(k, _)| scalar_string(k).as_deref() == Some(key))
        .map(|(_, v)| v)
}

fn child_mut<'a>(value: &'a mut Value, key: &str) -> Option<&'a mut Value> {
    let Value::Mapping(map) = value else {
        return None;
    };
    map.iter_mut()
        .find(|(k, _)| scalar_string(k).as_deref() == Some(key))
        .map(|(_, v)| v)
}

fn not_a_mapping(path: &[&str]) -> SweepError {
    SweepError::InvalidConfig(format!("expected a mapping at '{}'", path.join(".")))
}
