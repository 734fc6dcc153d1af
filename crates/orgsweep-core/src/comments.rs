//! Inline comment tracking for the YAML config.
//!
//! `serde_yaml` drops comments, but the `KEEP:` opt-out marker lives in an
//! inline comment. Comments are indexed by the node path of the line they
//! trail, and re-attached to the line with the same path after the document
//! is re-serialized.

use std::collections::BTreeMap;
use std::fmt;

pub const KEEP_MARKER: &str = "KEEP:";

// ---------------------------------------------------------------------------
// NodePath
// ---------------------------------------------------------------------------

/// Keys (and scalar list items) from the document root down to a node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodePath(Vec<String>);

impl NodePath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &NodePath) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

// ---------------------------------------------------------------------------
// Annotations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotations {
    by_path: BTreeMap<NodePath, String>,
}

impl Annotations {
    /// Index every inline comment in `text` by the path of the node it trails.
    /// Full-line comments have no node and are not indexed.
    pub fn scan(text: &str) -> Self {
        let mut by_path = BTreeMap::new();
        for line in walk(text) {
            if let (Some(path), Some(comment)) = (line.path, line.comment) {
                by_path.insert(path, comment.to_string());
            }
        }
        Self { by_path }
    }

    pub fn get(&self, path: &NodePath) -> Option<&str> {
        self.by_path.get(path).map(String::as_str)
    }

    pub fn is_keep(&self, path: &NodePath) -> bool {
        self.get(path).is_some_and(|c| c.contains(KEEP_MARKER))
    }

    pub fn insert(&mut self, path: NodePath, comment: impl Into<String>) {
        let comment = comment.into();
        let comment = if comment.starts_with('#') {
            comment
        } else {
            format!("# {comment}")
        };
        self.by_path.insert(path, comment);
    }

    /// Drop the comment on `path` and on every node beneath it.
    pub fn forget(&mut self, path: &NodePath) {
        self.by_path.retain(|p, _| !p.starts_with(path));
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    /// Re-attach indexed comments to freshly serialized `text`.
    pub fn apply(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for (raw, line) in text.lines().zip(walk(text)) {
            out.push_str(raw);
            if line.comment.is_none() {
                if let Some(comment) = line.path.as_ref().and_then(|p| self.by_path.get(p)) {
                    out.push(' ');
                    out.push_str(comment);
                }
            }
            out.push('\n');
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Line walker
// ---------------------------------------------------------------------------

struct Line<'a> {
    path: Option<NodePath>,
    comment: Option<&'a str>,
}

/// An open key (or list item) while walking the document.
struct Frame {
    indent: usize,
    segment: String,
    /// Position within its list, for list items.
    item: Option<usize>,
}

/// Resolve the node path of each line of a block-style YAML document.
///
/// Scalar list items are addressed by their value (`members.admin.alice`);
/// mapping list items by their position (`rules.#0.pattern`).
fn walk(text: &str) -> Vec<Line<'_>> {
    let mut stack: Vec<Frame> = Vec::new();
    let mut block_scalar: Option<usize> = None;
    let mut lines = Vec::new();

    for raw in text.lines() {
        let indent = raw.len() - raw.trim_start_matches(' ').len();

        if let Some(owner) = block_scalar {
            if raw.trim().is_empty() || indent > owner {
                lines.push(Line {
                    path: None,
                    comment: None,
                });
                continue;
            }
            block_scalar = None;
        }

        let (code, comment) = split_comment(raw);
        let code = code.trim();
        if code.is_empty() || (indent == 0 && (code == "---" || code == "...")) {
            lines.push(Line {
                path: None,
                comment: None,
            });
            continue;
        }

        let path = if let Some(body) = sequence_item(code) {
            while stack.last().is_some_and(|f| f.indent > indent) {
                stack.pop();
            }
            let index = match stack.last() {
                Some(Frame {
                    indent: i,
                    item: Some(n),
                    ..
                }) if *i == indent => {
                    let next = n + 1;
                    stack.pop();
                    next
                }
                _ => 0,
            };
            let mut segments = segments(&stack);
            let marker = format!("#{index}");
            stack.push(Frame {
                indent,
                segment: marker.clone(),
                item: Some(index),
            });

            if let Some((key, rest)) = split_key(body) {
                // `- key: value` opens a mapping at the key's column
                let column = indent + (code.len() - body.len());
                let key = unquote(key.trim()).to_string();
                segments.push(marker);
                segments.push(key.clone());
                stack.push(Frame {
                    indent: column,
                    segment: key,
                    item: None,
                });
                if is_block_scalar(rest) {
                    block_scalar = Some(column);
                }
            } else if body.is_empty() {
                segments.push(marker);
            } else {
                segments.push(unquote(body).to_string());
            }
            Some(NodePath(segments))
        } else if let Some((key, rest)) = split_key(code) {
            while stack.last().is_some_and(|f| f.indent >= indent) {
                stack.pop();
            }
            let key = unquote(key.trim()).to_string();
            let mut segments = segments(&stack);
            segments.push(key.clone());
            stack.push(Frame {
                indent,
                segment: key,
                item: None,
            });
            if is_block_scalar(rest) {
                block_scalar = Some(indent);
            }
            Some(NodePath(segments))
        } else {
            None
        };

        lines.push(Line { path, comment });
    }
    lines
}

fn segments(stack: &[Frame]) -> Vec<String> {
    stack.iter().map(|f| f.segment.clone()).collect()
}

/// Text after the `- ` of a list item line.
fn sequence_item(code: &str) -> Option<&str> {
    if code == "-" {
        return Some("");
    }
    code.strip_prefix("- ").map(str::trim_start)
}

fn is_block_scalar(rest: &str) -> bool {
    let rest = rest.trim();
    rest.starts_with('|') || rest.starts_with('>')
}

/// Split a line into code and its trailing `# comment`, ignoring `#` inside
/// quoted scalars and `#` not preceded by whitespace.
fn split_comment(line: &str) -> (&str, Option<&str>) {
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;
    let mut chars = line.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match quote {
            // `''` inside single quotes and `\x` inside double quotes are escapes
            Some('\'') if c == '\'' && chars.peek().is_some_and(|&(_, n)| n == '\'') => {
                chars.next();
            }
            Some('"') if c == '\\' => {
                chars.next();
            }
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => {
                let at_token_start =
                    prev.map_or(true, |p| p.is_whitespace() || matches!(p, ':' | '-' | '[' | ','));
                if (c == '\'' || c == '"') && at_token_start {
                    quote = Some(c);
                } else if c == '#' && prev.map_or(true, char::is_whitespace) {
                    return (&line[..i], Some(line[i..].trim_end()));
                }
            }
        }
        prev = Some(c);
    }
    (line, None)
}

/// Split `key: rest` at the first unquoted `:` followed by a space or EOL.
fn split_key(code: &str) -> Option<(&str, &str)> {
    let mut quote: Option<char> = None;
    let bytes = code.as_bytes();
    for (i, c) in code.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if (c == '\'' || c == '"') && i == 0 => quote = Some(c),
            None if c == ':' => {
                let next = bytes.get(i + 1).copied();
                if next.is_none() || next == Some(b' ') {
                    return Some((&code[..i], &code[i + 1..]));
                }
            }
            None => {}
        }
    }
    None
}

fn unquote(s: &str) -> &str {
    for q in ['\'', '"'] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "\
# organization config
members:
  admin:
    - alice # founder
  member:
  - bob # KEEP: on parental leave
  - 'carol'
repositories:
  infra: # KEEP: compliance evidence
    visibility: private
    description: |
      Multi-line text
      with a # hash
    archived: false
teams:
  platform:
    members:
      member:
        - dave # KEEP: oncall
";

    fn path(s: &str) -> NodePath {
        NodePath::new(s.split('.'))
    }

    #[test]
    fn scan_indexes_inline_comments() {
        let ann = Annotations::scan(DOC);
        assert_eq!(ann.get(&path("members.admin.alice")), Some("# founder"));
        assert!(ann.is_keep(&path("members.member.bob")));
        assert!(!ann.is_keep(&path("members.member.carol")));
        assert!(ann.is_keep(&path("repositories.infra")));
        assert!(ann.is_keep(&path("teams.platform.members.member.dave")));
        assert_eq!(ann.len(), 4);
    }

    #[test]
    fn block_scalar_content_is_not_a_comment() {
        let ann = Annotations::scan(DOC);
        assert!(ann.get(&path("repositories.infra.description")).is_none());
        assert!(ann.get(&path("repositories.infra.archived")).is_none());
    }

    #[test]
    fn hash_inside_quotes_is_not_a_comment() {
        let ann = Annotations::scan("teams:\n  core:\n    description: 'team #1'\n");
        assert!(ann.is_empty());
    }

    #[test]
    fn apply_reattaches_to_reserialized_document() {
        let ann = Annotations::scan(DOC);
        let value: serde_yaml::Value = serde_yaml::from_str(DOC).unwrap();
        let out = ann.apply(&serde_yaml::to_string(&value).unwrap());
        assert!(out.contains("- bob # KEEP: on parental leave"));
        assert!(out.contains("infra: # KEEP: compliance evidence"));
        assert!(out.contains("- dave # KEEP: oncall"));
        let again = Annotations::scan(&out);
        assert!(again.is_keep(&path("members.member.bob")));
        assert!(again.is_keep(&path("repositories.infra")));
    }

    #[test]
    fn forget_drops_descendants() {
        let mut ann = Annotations::scan(DOC);
        ann.forget(&path("teams.platform"));
        assert!(!ann.is_keep(&path("teams.platform.members.member.dave")));
        assert!(ann.is_keep(&path("members.member.bob")));
    }

    #[test]
    fn insert_normalizes_hash_prefix() {
        let mut ann = Annotations::default();
        ann.insert(path("teams.ghost"), "KEEP: reserved");
        assert_eq!(ann.get(&path("teams.ghost")), Some("# KEEP: reserved"));
    }

    #[test]
    fn comment_in_list_of_mappings_stays_on_its_item() {
        let doc = "\
branches:
  rules:
    - pattern: main
      reviews: 2 # strict for release branch
    - pattern: dev
      reviews: 1
";
        let ann = Annotations::scan(doc);
        assert_eq!(
            ann.get(&path("branches.rules.#0.reviews")),
            Some("# strict for release branch")
        );
        assert!(ann.get(&path("branches.rules.#1.reviews")).is_none());

        let value: serde_yaml::Value = serde_yaml::from_str(doc).unwrap();
        let out = ann.apply(&serde_yaml::to_string(&value).unwrap());
        assert_eq!(out.matches("# strict for release branch").count(), 1);
        assert!(out.contains("reviews: 2 # strict for release branch"));
        assert!(out.contains("reviews: 1\n"));
    }

    #[test]
    fn scalar_items_after_mapping_items_keep_value_paths() {
        let doc = "\
teams:
  core:
    rules:
    - name: x
      users:
      - erin # KEEP: lead
    members:
      member:
      - dan # KEEP: oncall
";
        let ann = Annotations::scan(doc);
        assert!(ann.is_keep(&path("teams.core.rules.#0.users.erin")));
        assert!(ann.is_keep(&path("teams.core.members.member.dan")));
    }

    #[test]
    fn escaped_quotes_do_not_end_a_scalar() {
        assert_eq!(split_comment("title: 'don''t # x'"), ("title: 'don''t # x'", None));
        assert_eq!(
            split_comment("title: 'don''t' # x"),
            ("title: 'don''t' ", Some("# x"))
        );
        assert_eq!(
            split_comment(r#"title: "say \"hi # there\"""#).1,
            None
        );
    }

    #[test]
    fn split_key_ignores_colons_in_values() {
        assert_eq!(split_key("url: https://x"), Some(("url", " https://x")));
        assert_eq!(split_key("plain"), None);
        assert_eq!(split_key("'a: b': c"), Some(("'a: b'", " c")));
    }
}
