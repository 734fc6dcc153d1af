use crate::error::{Result, SweepError};
use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::Path;

/// Audit log categories that record credential bookkeeping rather than
/// anything a person did.
pub const IGNORED_CATEGORIES: &[&str] = &["org_credential_authorization"];

pub const DEFAULT_WINDOW_MONTHS: u32 = 12;

// ---------------------------------------------------------------------------
// AuditWindow
// ---------------------------------------------------------------------------

/// The trailing period used for both "new" and "active" decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditWindow {
    start: DateTime<Utc>,
}

impl AuditWindow {
    pub fn months_before(now: DateTime<Utc>, months: u32) -> Self {
        let start = now
            .checked_sub_months(Months::new(months))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { start }
    }

    pub fn trailing_year(now: DateTime<Utc>) -> Self {
        Self::months_before(now, DEFAULT_WINDOW_MONTHS)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start
    }
}

// ---------------------------------------------------------------------------
// AuditEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub action: String,
    pub actor: Option<String>,
    pub user: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Bare repository names (organization prefix stripped).
    pub repos: Vec<String>,
    /// Bare team slugs (organization prefix stripped).
    pub teams: Vec<String>,
}

impl AuditEvent {
    /// Text before the first `.` of the action, e.g. `repo` for `repo.create`.
    pub fn category(&self) -> &str {
        self.action
            .split_once('.')
            .map_or(self.action.as_str(), |(category, _)| category)
    }

    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let raw: RawEvent = serde_json::from_str(line).map_err(|e| e.to_string())?;
        raw.try_into()
    }
}

#[derive(Deserialize)]
struct RawEvent {
    action: String,
    #[serde(default)]
    actor: Option<String>,
    #[serde(default)]
    user: Option<String>,
    created_at: RawTimestamp,
    #[serde(default)]
    repo: OneOrMany,
    #[serde(default)]
    team: OneOrMany,
}

/// GitHub's JSON export uses epoch milliseconds; the REST API uses RFC 3339.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(i64),
    FractionalMillis(f64),
    Text(DateTime<Utc>),
}

/// `repo` / `team` are absent, one `org/name` path, or a list of them.
#[derive(Deserialize, Default)]
#[serde(untagged)]
enum OneOrMany {
    #[default]
    None,
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_names(self) -> Vec<String> {
        match self {
            OneOrMany::None => Vec::new(),
            OneOrMany::One(path) => vec![strip_org_prefix(&path).to_string()],
            OneOrMany::Many(paths) => paths
                .iter()
                .map(|p| strip_org_prefix(p).to_string())
                .collect(),
        }
    }
}

impl TryFrom<RawEvent> for AuditEvent {
    type Error = String;

    fn try_from(raw: RawEvent) -> std::result::Result<Self, Self::Error> {
        let created_at = match raw.created_at {
            RawTimestamp::Millis(ms) => DateTime::from_timestamp_millis(ms),
            RawTimestamp::FractionalMillis(ms) => DateTime::from_timestamp_millis(ms as i64),
            RawTimestamp::Text(ts) => Some(ts),
        }
        .ok_or_else(|| "created_at is out of range".to_string())?;
        Ok(AuditEvent {
            action: raw.action,
            actor: raw.actor,
            user: raw.user,
            created_at,
            repos: raw.repo.into_names(),
            teams: raw.team.into_names(),
        })
    }
}

/// `org/name` becomes `name`; a value without an organization prefix is
/// returned unchanged.
pub fn strip_org_prefix(path: &str) -> &str {
    path.split_once('/').map_or(path, |(_, name)| name)
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Which "added" event makes a subject count as new, and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership<'a> {
    Organization,
    Repository(&'a str),
    /// Matched by team slug, not display name.
    Team(&'a str),
}

impl Membership<'_> {
    pub fn action(&self) -> &'static str {
        match self {
            Membership::Organization => "org.add_member",
            Membership::Repository(_) => "repo.add_member",
            Membership::Team(_) => "team.add_member",
        }
    }

    fn matches(&self, event: &AuditEvent) -> bool {
        match self {
            Membership::Organization => true,
            Membership::Repository(repo) => event.repos.iter().any(|r| r == repo),
            Membership::Team(slug) => event.teams.iter().any(|t| t == slug),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityScope<'a> {
    Anywhere,
    Repository(&'a str),
    AnyOf(&'a [String]),
}

impl ActivityScope<'_> {
    fn matches(&self, event: &AuditEvent) -> bool {
        match self {
            ActivityScope::Anywhere => true,
            ActivityScope::Repository(repo) => event.repos.iter().any(|r| r == repo),
            ActivityScope::AnyOf(repos) => event.repos.iter().any(|r| repos.contains(r)),
        }
    }
}

// ---------------------------------------------------------------------------
// AuditLog
// ---------------------------------------------------------------------------

/// Immutable snapshot of the audit events inside one window.
///
/// Queries scan every event; the window is bounded so no index is kept.
#[derive(Debug, Clone)]
pub struct AuditLog {
    window: AuditWindow,
    events: Vec<AuditEvent>,
}

impl AuditLog {
    /// Parse newline-delimited JSON records, keeping those inside `window`
    /// whose category is not ignored. Any unparseable record fails the load;
    /// blank lines are skipped.
    pub fn load<I, S>(lines: I, window: AuditWindow) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut events = Vec::new();
        let mut total = 0usize;
        for (idx, line) in lines.into_iter().enumerate() {
            let line = line.as_ref().trim();
            if line.is_empty() {
                continue;
            }
            total += 1;
            let event = AuditEvent::parse(line).map_err(|reason| SweepError::MalformedEvent {
                line: idx + 1,
                reason,
            })?;
            if window.contains(event.created_at) && !IGNORED_CATEGORIES.contains(&event.category())
            {
                events.push(event);
            }
        }
        tracing::debug!(
            total,
            kept = events.len(),
            since = %window.start(),
            "loaded audit log"
        );
        Ok(Self { window, events })
    }

    /// Like `load`, reading lines from `reader`. A line that is not valid
    /// UTF-8 is a malformed record, not an I/O failure.
    pub fn from_reader<R: BufRead>(reader: R, window: AuditWindow) -> Result<Self> {
        let mut lines = Vec::new();
        for (idx, raw) in reader.split(b'\n').enumerate() {
            let line = String::from_utf8(raw?).map_err(|e| SweepError::MalformedEvent {
                line: idx + 1,
                reason: e.to_string(),
            })?;
            lines.push(line);
        }
        Self::load(lines, window)
    }

    pub fn from_path(path: &Path, window: AuditWindow) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file), window)
    }

    pub fn window(&self) -> AuditWindow {
        self.window
    }

    pub fn events(&self) -> &[AuditEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// True if `username` was added to the organization, repository, or team
    /// inside the window.
    pub fn has_new_membership(&self, username: &str, membership: Membership<'_>) -> bool {
        let action = membership.action();
        self.events.iter().any(|event| {
            event.action == action
                && event.user.as_deref() == Some(username)
                && membership.matches(event)
        })
    }

    /// True if `username` is the actor of any event touching `scope`.
    pub fn has_actor_activity(&self, username: &str, scope: ActivityScope<'_>) -> bool {
        self.events
            .iter()
            .any(|event| event.actor.as_deref() == Some(username) && scope.matches(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn window() -> AuditWindow {
        AuditWindow::trailing_year(now())
    }

    fn ms(days_ago: i64) -> i64 {
        (now() - Duration::days(days_ago)).timestamp_millis()
    }

    fn load(lines: &[String]) -> AuditLog {
        AuditLog::load(lines, window()).unwrap()
    }

    #[test]
    fn window_starts_twelve_months_back() {
        let w = window();
        assert_eq!(w.start(), Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap());
        assert!(w.contains(w.start()));
        assert!(!w.contains(w.start() - Duration::seconds(1)));
    }

    #[test]
    fn drops_events_outside_window_and_ignored_categories() {
        let lines = vec![
            format!(r#"{{"action":"repo.create","actor":"a","created_at":{}}}"#, ms(10)),
            format!(r#"{{"action":"repo.create","actor":"b","created_at":{}}}"#, ms(400)),
            format!(
                r#"{{"action":"org_credential_authorization.grant","actor":"c","created_at":{}}}"#,
                ms(5)
            ),
        ];
        let log = load(&lines);
        assert_eq!(log.len(), 1);
        assert_eq!(log.events()[0].actor.as_deref(), Some("a"));
    }

    #[test]
    fn malformed_line_fails_with_line_number() {
        let lines = vec![
            format!(r#"{{"action":"repo.create","actor":"a","created_at":{}}}"#, ms(1)),
            "{not json".to_string(),
        ];
        let err = AuditLog::load(&lines, window()).unwrap_err();
        assert!(matches!(err, SweepError::MalformedEvent { line: 2, .. }));
    }

    #[test]
    fn invalid_utf8_line_is_malformed_with_line_number() {
        let mut bytes =
            format!(r#"{{"action":"repo.create","actor":"a","created_at":{}}}"#, ms(1)).into_bytes();
        bytes.extend_from_slice(b"\n\xff\xfe garbage\n");
        let err = AuditLog::from_reader(&bytes[..], window()).unwrap_err();
        assert!(matches!(err, SweepError::MalformedEvent { line: 2, .. }));
    }

    #[test]
    fn from_reader_handles_crlf_and_trailing_newline() {
        let text = format!(
            "{}\r\n{}\r\n",
            format!(r#"{{"action":"repo.create","actor":"a","created_at":{}}}"#, ms(1)),
            format!(r#"{{"action":"git.push","actor":"b","created_at":{}}}"#, ms(2)),
        );
        let log = AuditLog::from_reader(text.as_bytes(), window()).unwrap();
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn missing_action_is_malformed() {
        let lines = vec![format!(r#"{{"actor":"a","created_at":{}}}"#, ms(1))];
        assert!(matches!(
            AuditLog::load(&lines, window()),
            Err(SweepError::MalformedEvent { line: 1, .. })
        ));
    }

    #[test]
    fn blank_lines_are_skipped() {
        let lines = vec![
            String::new(),
            format!(r#"{{"action":"repo.create","actor":"a","created_at":{}}}"#, ms(1)),
            "   ".to_string(),
        ];
        assert_eq!(load(&lines).len(), 1);
    }

    #[test]
    fn accepts_rfc3339_timestamps() {
        let lines = vec![r#"{"action":"repo.create","actor":"a","created_at":"2024-05-01T12:00:00Z"}"#
            .to_string()];
        assert_eq!(load(&lines).len(), 1);
    }

    #[test]
    fn repo_field_normalizes_every_shape() {
        let lines = vec![
            format!(r#"{{"action":"git.push","actor":"a","repo":"acme/api","created_at":{}}}"#, ms(1)),
            format!(
                r#"{{"action":"repo.access","actor":"b","repo":["acme/web","acme/docs"],"created_at":{}}}"#,
                ms(1)
            ),
            format!(r#"{{"action":"org.update","actor":"c","repo":null,"created_at":{}}}"#, ms(1)),
            format!(r#"{{"action":"org.update","actor":"d","created_at":{}}}"#, ms(1)),
        ];
        let log = load(&lines);
        assert_eq!(log.events()[0].repos, vec!["api"]);
        assert_eq!(log.events()[1].repos, vec!["web", "docs"]);
        assert!(log.events()[2].repos.is_empty());
        assert!(log.events()[3].repos.is_empty());
    }

    #[test]
    fn new_membership_matches_kind_subject_and_container() {
        let lines = vec![
            format!(r#"{{"action":"org.add_member","actor":"admin","user":"alice","created_at":{}}}"#, ms(30)),
            format!(
                r#"{{"action":"repo.add_member","actor":"admin","user":"bob","repo":"acme/infra","created_at":{}}}"#,
                ms(30)
            ),
            format!(
                r#"{{"action":"team.add_member","actor":"admin","user":"carol","team":"acme/platform-eng","created_at":{}}}"#,
                ms(30)
            ),
        ];
        let log = load(&lines);
        assert!(log.has_new_membership("alice", Membership::Organization));
        assert!(!log.has_new_membership("bob", Membership::Organization));
        assert!(log.has_new_membership("bob", Membership::Repository("infra")));
        assert!(!log.has_new_membership("bob", Membership::Repository("web")));
        assert!(log.has_new_membership("carol", Membership::Team("platform-eng")));
        assert!(!log.has_new_membership("carol", Membership::Team("Platform Eng")));
    }

    #[test]
    fn actor_activity_respects_scope() {
        let lines = vec![format!(
            r#"{{"action":"git.push","actor":"dave","repo":["acme/a","acme/b"],"created_at":{}}}"#,
            ms(90)
        )];
        let log = load(&lines);
        assert!(log.has_actor_activity("dave", ActivityScope::Anywhere));
        assert!(log.has_actor_activity("dave", ActivityScope::Repository("b")));
        assert!(!log.has_actor_activity("dave", ActivityScope::Repository("c")));
        let reachable = vec!["c".to_string(), "a".to_string()];
        assert!(log.has_actor_activity("dave", ActivityScope::AnyOf(&reachable)));
        assert!(!log.has_actor_activity("erin", ActivityScope::Anywhere));
    }

    #[test]
    fn strip_org_prefix_keeps_bare_names() {
        assert_eq!(strip_org_prefix("acme/infra"), "infra");
        assert_eq!(strip_org_prefix("infra"), "infra");
    }
}
