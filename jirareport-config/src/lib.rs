use std::{
    env, fs,
    path::{Path, PathBuf},
    process::Command,
    time::Duration,
};

use anyhow::{anyhow, bail, Context, Result};
use regex::RegexBuilder;
use serde::Deserialize;

pub const TOKEN_ENV_VAR: &str = "JIRA_TOKEN";
pub const CONFIG_PATH_ENV_VAR: &str = "JIRAREPORT_CONFIG_FILE";

const DEFAULT_API_VERSION: &str = "3";
const DEFAULT_MAX_RESULTS: usize = 100;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REPORT_FILE: &str = "report.html";
const DEFAULT_LOG_FILE: &str = "jira_report.log";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 600;
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 60;
const DEFAULT_REMOTE: &str = "origin";
const DEFAULT_BRANCH: &str = "main";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JiraConfig {
    pub server: String,
    pub user: Option<String>,
    pub token: Option<String>,
    pub project: String,
    pub jql: Option<String>,
    pub max_results: usize,
    pub api_version: Option<String>,
    pub auth_method: Option<String>,
    pub timeout: Duration,
    pub insecure: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportSettings {
    pub output: PathBuf,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Pause after a cycle that rendered at least one issue. Also embedded
    /// in the report's auto-refresh tag.
    pub refresh_interval: Duration,
    /// Pause after an empty or failed fetch.
    pub retry_interval: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogConfig {
    pub file: Option<PathBuf>,
    pub level: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishConfig {
    pub enabled: bool,
    pub repo_dir: PathBuf,
    pub remote: String,
    pub branch: String,
    pub paths: Vec<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportConfig {
    pub jira: JiraConfig,
    pub report: ReportSettings,
    pub schedule: ScheduleConfig,
    pub log: LogConfig,
    pub publish: PublishConfig,
}

#[derive(Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    jira: RawJira,
    #[serde(default)]
    report: RawReport,
    #[serde(default)]
    schedule: RawSchedule,
    #[serde(default)]
    log: RawLog,
    #[serde(default)]
    publish: RawPublish,
}

#[derive(Default, Deserialize)]
struct RawJira {
    server: Option<String>,
    user: Option<String>,
    token: Option<String>,
    project: Option<String>,
    jql: Option<String>,
    max_results: Option<usize>,
    api_version: Option<String>,
    auth_method: Option<String>,
    timeout_secs: Option<u64>,
    insecure: Option<bool>,
}

#[derive(Default, Deserialize)]
struct RawReport {
    output: Option<String>,
}

#[derive(Default, Deserialize)]
struct RawSchedule {
    refresh_interval_secs: Option<u64>,
    retry_interval_secs: Option<u64>,
}

#[derive(Default, Deserialize)]
struct RawLog {
    file: Option<String>,
    level: Option<String>,
}

#[derive(Default, Deserialize)]
struct RawPublish {
    enabled: Option<bool>,
    repo_dir: Option<String>,
    remote: Option<String>,
    branch: Option<String>,
    #[serde(default)]
    paths: Vec<String>,
}

impl ReportConfig {
    pub fn load_default() -> Result<Self> {
        Self::load_from_path(&default_config_path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let payload = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let env_token = env::var(TOKEN_ENV_VAR).ok();
        Self::parse(&payload, env_token, fetch_secret_from_manager)
    }

    fn parse<F>(payload: &str, env_token: Option<String>, fetch: F) -> Result<Self>
    where
        F: Fn(&str, &str) -> Option<String>,
    {
        let raw: RawConfig =
            serde_yaml::from_str(payload).with_context(|| "invalid YAML config format")?;
        Self::from_raw(raw, env_token, fetch)
    }

    fn from_raw<F>(raw: RawConfig, env_token: Option<String>, fetch: F) -> Result<Self>
    where
        F: Fn(&str, &str) -> Option<String>,
    {
        let server = raw
            .jira
            .server
            .and_then(normalize_jira_server)
            .ok_or_else(|| anyhow!("jira.server not configured"))?;
        let project = raw
            .jira
            .project
            .and_then(non_empty)
            .ok_or_else(|| anyhow!("jira.project not configured"))?;

        // The environment wins over the config file so the secret never has
        // to live on disk.
        let token = match env_token.and_then(non_empty) {
            Some(token) => Some(token),
            None => raw
                .jira
                .token
                .and_then(|value| resolve_token_with(value, &fetch)),
        };

        let max_results = raw.jira.max_results.unwrap_or(DEFAULT_MAX_RESULTS);
        if max_results == 0 {
            bail!("jira.max_results must be greater than zero");
        }

        let refresh_interval_secs = raw
            .schedule
            .refresh_interval_secs
            .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS);
        let retry_interval_secs = raw
            .schedule
            .retry_interval_secs
            .unwrap_or(DEFAULT_RETRY_INTERVAL_SECS);
        if refresh_interval_secs == 0 || retry_interval_secs == 0 {
            bail!("schedule intervals must be greater than zero");
        }

        let timeout_secs = raw.jira.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            bail!("jira.timeout_secs must be greater than zero");
        }

        let jira = JiraConfig {
            server,
            user: raw.jira.user.and_then(non_empty),
            token,
            project,
            jql: raw.jira.jql.and_then(non_empty),
            max_results,
            api_version: raw.jira.api_version.and_then(non_empty),
            auth_method: raw.jira.auth_method.and_then(non_empty),
            timeout: Duration::from_secs(timeout_secs),
            insecure: raw.jira.insecure.unwrap_or(false),
        };

        let report = ReportSettings {
            output: raw
                .report
                .output
                .and_then(non_empty)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_FILE)),
        };

        // An explicit empty `log.file` disables the file sink.
        let log_file = match raw.log.file {
            Some(value) => non_empty(value).map(PathBuf::from),
            None => Some(PathBuf::from(DEFAULT_LOG_FILE)),
        };
        let log = LogConfig {
            file: log_file,
            level: raw
                .log
                .level
                .and_then(non_empty)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        };

        let publish = PublishConfig {
            enabled: raw.publish.enabled.unwrap_or(false),
            repo_dir: raw
                .publish
                .repo_dir
                .and_then(non_empty)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            remote: raw
                .publish
                .remote
                .and_then(non_empty)
                .unwrap_or_else(|| DEFAULT_REMOTE.to_string()),
            branch: raw
                .publish
                .branch
                .and_then(non_empty)
                .unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
            paths: raw
                .publish
                .paths
                .into_iter()
                .filter_map(non_empty)
                .map(PathBuf::from)
                .collect(),
        };

        Ok(Self {
            jira,
            report,
            schedule: ScheduleConfig {
                refresh_interval: Duration::from_secs(refresh_interval_secs),
                retry_interval: Duration::from_secs(retry_interval_secs),
            },
            log,
            publish,
        })
    }
}

impl JiraConfig {
    pub fn api_version(&self) -> &str {
        match self.api_version.as_deref() {
            Some("2") => "2",
            _ => DEFAULT_API_VERSION,
        }
    }

    pub fn auth_method(&self) -> &str {
        if let Some(value) = self.auth_method.as_deref() {
            let normalized = value.trim().to_ascii_lowercase();
            if normalized == "basic" || normalized == "bearer" {
                return if normalized == "basic" {
                    "basic"
                } else {
                    "bearer"
                };
            }
        }

        if self.user.is_some() {
            "basic"
        } else {
            "bearer"
        }
    }

    /// The query sent each cycle: the configured JQL, or every issue in the
    /// project ordered by last update.
    pub fn search_jql(&self) -> Result<String> {
        let jql = match self.jql.as_deref() {
            Some(jql) => jql.to_string(),
            None => format!("project = {} ORDER BY updated DESC", self.project),
        };
        resolve_current_user_jql(&jql, self.user.as_deref())
    }
}

pub fn default_config_path() -> PathBuf {
    if let Some(override_path) = env::var_os(CONFIG_PATH_ENV_VAR) {
        return PathBuf::from(override_path);
    }

    let mut base = env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    base.push(".config");
    base.push("jirareport");
    base.push("config.yaml");
    base
}

pub fn resolve_current_user_jql(jql: &str, jira_user: Option<&str>) -> Result<String> {
    let Some(user) = jira_user.and_then(non_empty_str) else {
        return Ok(jql.to_string());
    };

    let escaped = user.replace('\\', "\\\\").replace('"', "\\\"");
    let replacement = format!("\"{escaped}\"");
    let regex = RegexBuilder::new(r"currentUser\(\)")
        .case_insensitive(true)
        .build()
        .with_context(|| "failed to build currentUser() matcher")?;
    Ok(regex.replace_all(jql, replacement.as_str()).to_string())
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

fn non_empty_str(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed)
}

fn normalize_jira_server(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Some(trimmed.trim_end_matches('/').to_string())
    } else {
        Some(format!("https://{}", trimmed.trim_end_matches('/')))
    }
}

fn resolve_token_with<F>(value: String, fetch: F) -> Option<String>
where
    F: Fn(&str, &str) -> Option<String>,
{
    let token = non_empty(value)?;
    let Some((provider, key)) = parse_secret_reference(token.as_str()) else {
        return Some(token);
    };
    fetch(provider, key)
}

fn parse_secret_reference(value: &str) -> Option<(&str, &str)> {
    let (provider, key) = value.split_once("::")?;
    if key.trim().is_empty() {
        return None;
    }
    if provider == "pass" || provider == "passage" {
        Some((provider, key.trim()))
    } else {
        None
    }
}

fn fetch_secret_from_manager(provider: &str, key: &str) -> Option<String> {
    let output = Command::new(provider).arg("show").arg(key).output().ok()?;
    if !output.status.success() {
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    non_empty(stdout.trim().to_string())
}
