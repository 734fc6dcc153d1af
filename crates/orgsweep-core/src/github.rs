use crate::error::{Result, SweepError};
use crate::types::Visibility;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, LINK, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const PAGE_SIZE: u32 = 100;
const API_VERSION: &str = "2022-11-28";

// ---------------------------------------------------------------------------
// Remote types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRepository {
    pub name: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub visibility: Option<Visibility>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTeam {
    pub name: String,
    pub slug: String,
}

/// The most recent issue/pull request event of a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryEvent {
    #[serde(default)]
    pub event: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RepositoryActivity {
    timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// OrgDirectory
// ---------------------------------------------------------------------------

/// Live view of the organization, as far as the inactivity rules need one.
pub trait OrgDirectory {
    fn list_repositories(&self) -> Result<Vec<RemoteRepository>>;

    fn list_teams(&self) -> Result<Vec<RemoteTeam>>;

    /// `None` when the repository has no events at all.
    fn latest_repository_event(&self, repository: &str) -> Result<Option<RepositoryEvent>>;

    /// `None` when the repository has no recorded activity (pushes, merges).
    fn latest_repository_activity(&self, repository: &str) -> Result<Option<DateTime<Utc>>>;
}

// ---------------------------------------------------------------------------
// GitHubClient
// ---------------------------------------------------------------------------

/// Blocking GitHub REST client scoped to one organization.
pub struct GitHubClient {
    http: Client,
    base_url: String,
    org: String,
    token: String,
}

impl GitHubClient {
    pub fn new(base_url: &str, org: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("orgsweep/", env!("CARGO_PKG_VERSION"))),
        );
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers(headers)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            org: org.into(),
            token: token.into(),
        })
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    fn send(&self, url: &str) -> Result<Response> {
        tracing::debug!(url, "GET");
        Ok(self.http.get(url).bearer_auth(&self.token).send()?)
    }

    /// Follow `Link: rel="next"` until every page of `path` is read.
    fn get_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let mut url = format!("{}{}?per_page={PAGE_SIZE}", self.base_url, path);
        let mut items = Vec::new();
        loop {
            let response = self.send(&url)?;
            if !response.status().is_success() {
                return Err(api_error(path, response.status()));
            }
            let next = next_page(response.headers());
            let page: Vec<T> = response.json()?;
            items.extend(page);
            match next {
                Some(next) => url = next,
                None => break,
            }
        }
        Ok(items)
    }

    /// First item of `path` with `per_page=1`. 404 and 409 (empty
    /// repository) mean there is nothing to report, not a failure.
    fn get_latest<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = format!("{}{}?per_page=1", self.base_url, path);
        let response = self.send(&url)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::CONFLICT {
            tracing::warn!(path, status = status.as_u16(), "no data, treating as empty");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(api_error(path, status));
        }
        let page: Vec<T> = response.json()?;
        Ok(page.into_iter().next())
    }
}

impl OrgDirectory for GitHubClient {
    fn list_repositories(&self) -> Result<Vec<RemoteRepository>> {
        self.get_all(&format!("/orgs/{}/repos", self.org))
    }

    fn list_teams(&self) -> Result<Vec<RemoteTeam>> {
        self.get_all(&format!("/orgs/{}/teams", self.org))
    }

    fn latest_repository_event(&self, repository: &str) -> Result<Option<RepositoryEvent>> {
        self.get_latest(&format!("/repos/{}/{repository}/issues/events", self.org))
    }

    fn latest_repository_activity(&self, repository: &str) -> Result<Option<DateTime<Utc>>> {
        let activity: Option<RepositoryActivity> =
            self.get_latest(&format!("/repos/{}/{repository}/activity", self.org))?;
        Ok(activity.map(|a| a.timestamp))
    }
}

fn api_error(path: &str, status: StatusCode) -> SweepError {
    SweepError::Api {
        path: path.to_string(),
        status: status.as_u16(),
    }
}

static NEXT_LINK_RE: OnceLock<Regex> = OnceLock::new();

fn next_link_re() -> &'static Regex {
    NEXT_LINK_RE.get_or_init(|| Regex::new(r#"<([^>]+)>\s*;\s*rel="next""#).unwrap())
}

fn next_page(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    next_link_re()
        .captures(link)
        .map(|caps| caps[1].to_string())
}
