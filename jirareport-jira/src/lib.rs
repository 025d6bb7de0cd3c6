mod adf;

use anyhow::{anyhow, bail, Context, Result};
use jirareport_config::JiraConfig;
use jirareport_domain::{issue_url, IssueRecord, NOT_AVAILABLE, UNASSIGNED};
use reqwest::{
    blocking::{Client, RequestBuilder},
    header::ACCEPT,
    StatusCode,
};
use serde::Deserialize;
use serde_json::{json, value::RawValue, Value};
use thiserror::Error;
use tracing::{debug, warn};

pub use adf::extract_description;

pub const SEARCH_FIELDS: [&str; 4] = ["summary", "status", "description", "assignee"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchQuery {
    pub jql: String,
    pub max_results: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchBatch {
    pub issues: Vec<IssueRecord>,
    /// Set when the tracker had more matches than the first page carried.
    pub truncated: bool,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("jira search request failed: status={status} body={body}")]
    Status { status: StatusCode, body: String },
    #[error("failed to execute Jira search request")]
    Transport(#[source] reqwest::Error),
    #[error("failed to decode Jira search response")]
    Decode(#[source] serde_json::Error),
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::Transport(_) => "transport",
            Self::Decode(_) => "decode",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum AuthMode {
    Basic { user: String, password: String },
    Bearer { token: String },
}

pub struct JiraClient {
    api_version: String,
    server: String,
    base_url: String,
    http: Client,
    auth_mode: AuthMode,
}

/// Issues stay raw here so that each one is decoded on its own, within
/// serde_json's nesting limit, and an over-deep description only costs its
/// own row.
#[derive(Deserialize)]
struct SearchPayload {
    #[serde(default)]
    issues: Vec<Box<RawValue>>,
    total: Option<usize>,
    #[serde(rename = "isLast")]
    is_last: Option<bool>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct IssueKey {
    key: Option<String>,
}

#[derive(Deserialize)]
struct IssuePayload {
    key: Option<String>,
    fields: Option<IssueFields>,
}

#[derive(Default, Deserialize)]
struct IssueFields {
    summary: Option<String>,
    status: Option<NameLike>,
    assignee: Option<UserLike>,
    description: Option<Value>,
}

#[derive(Default, Deserialize)]
struct NameLike {
    name: Option<String>,
}

#[derive(Default, Deserialize)]
struct UserLike {
    #[serde(rename = "displayName")]
    display_name: Option<String>,
    name: Option<String>,
    #[serde(rename = "emailAddress")]
    email_address: Option<String>,
}

impl JiraClient {
    pub fn from_config(config: &JiraConfig) -> Result<Self> {
        let api_version = config.api_version().to_string();
        let auth_mode = parse_auth_mode(config)?;

        let http = Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .timeout(config.timeout)
            .build()
            .with_context(|| "failed to build Jira HTTP client")?;

        Ok(Self {
            api_version: api_version.clone(),
            server: config.server.clone(),
            base_url: format!("{}/rest/api/{api_version}", config.server),
            http,
            auth_mode,
        })
    }

    /// Runs one search and returns the first page only.
    pub fn search(&self, query: &SearchQuery) -> Result<SearchBatch, FetchError> {
        let endpoint = format!("{}/{}", self.base_url, self.search_endpoint());
        debug!(endpoint = %endpoint, jql = %query.jql, "sending Jira search");

        let response = self
            .with_auth(self.http.post(endpoint))
            .header(ACCEPT, "application/json")
            .json(&json!({
                "jql": query.jql,
                "maxResults": query.max_results,
                "fields": SEARCH_FIELDS,
            }))
            .send()
            .map_err(FetchError::Transport)?;

        let status = response.status();
        let body = response.text().map_err(FetchError::Transport)?;
        if !status.is_success() {
            return Err(FetchError::Status { status, body });
        }

        let payload: SearchPayload = serde_json::from_str(&body).map_err(FetchError::Decode)?;
        let truncated = is_truncated(&payload, query.max_results);
        if truncated {
            warn!(
                returned = payload.issues.len(),
                total = ?payload.total,
                max_results = query.max_results,
                "result cap reached, remaining matches are not shown"
            );
        }

        let issues = payload
            .issues
            .iter()
            .map(|issue| into_issue_record(issue, &self.server))
            .collect();

        Ok(SearchBatch { issues, truncated })
    }

    fn search_endpoint(&self) -> &str {
        if self.api_version == "3" {
            "search/jql"
        } else {
            "search"
        }
    }

    fn with_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_mode {
            AuthMode::Basic { user, password } => request.basic_auth(user, Some(password)),
            AuthMode::Bearer { token } => request.bearer_auth(token),
        }
    }
}

fn parse_auth_mode(config: &JiraConfig) -> Result<AuthMode> {
    let secret = config.token.as_deref().ok_or_else(|| {
        anyhow!(
            "Jira token not configured: set {} or jira.token",
            jirareport_config::TOKEN_ENV_VAR
        )
    })?;

    match config.auth_method() {
        "basic" => {
            let user = config
                .user
                .as_deref()
                .ok_or_else(|| anyhow!("jira.user not configured for basic auth"))?;
            Ok(AuthMode::Basic {
                user: user.to_string(),
                password: secret.to_string(),
            })
        }
        "bearer" => Ok(AuthMode::Bearer {
            token: secret.to_string(),
        }),
        other => bail!("unsupported auth method '{}'", other),
    }
}

fn is_truncated(payload: &SearchPayload, max_results: usize) -> bool {
    let returned = payload.issues.len();
    payload.is_last == Some(false)
        || payload.next_page_token.is_some()
        || payload.total.is_some_and(|total| total > returned)
        || returned >= max_results
}

fn into_issue_record(issue: &RawValue, server: &str) -> IssueRecord {
    match serde_json::from_str::<IssuePayload>(issue.get()) {
        Ok(payload) => from_payload(payload, server),
        Err(error) => {
            let raw_key = serde_json::from_str::<IssueKey>(issue.get())
                .ok()
                .and_then(|issue| issue.key);
            let key = raw_key.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string());
            warn!(key = %key, error = %error, "issue payload has unexpected shape");
            IssueRecord {
                url: issue_url(server, raw_key.as_deref().unwrap_or_default()),
                key,
                summary: NOT_AVAILABLE.to_string(),
                status: NOT_AVAILABLE.to_string(),
                description: format!("[Parse error: {error}]"),
                assignee: UNASSIGNED.to_string(),
            }
        }
    }
}

fn from_payload(payload: IssuePayload, server: &str) -> IssueRecord {
    let fields = payload.fields.unwrap_or_default();
    let url = issue_url(server, payload.key.as_deref().unwrap_or_default());

    IssueRecord {
        key: payload
            .key
            .and_then(non_empty)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        summary: fields
            .summary
            .and_then(non_empty)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        status: fields
            .status
            .and_then(name_like)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        description: extract_description(fields.description.as_ref()),
        assignee: fields
            .assignee
            .and_then(display_name_like)
            .unwrap_or_else(|| UNASSIGNED.to_string()),
        url,
    }
}

fn name_like(value: NameLike) -> Option<String> {
    value.name.and_then(non_empty)
}

fn display_name_like(value: UserLike) -> Option<String> {
    value
        .display_name
        .or(value.name)
        .or(value.email_address)
        .and_then(non_empty)
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}
