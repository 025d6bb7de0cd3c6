pub const NOT_AVAILABLE: &str = "N/A";
pub const UNASSIGNED: &str = "Unassigned";

/// Local wall-clock format shared by the report header, commit messages and
/// log lines.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One row of the report. Every field is already display-ready.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssueRecord {
    pub key: String,
    pub summary: String,
    pub status: String,
    pub description: String,
    pub assignee: String,
    pub url: String,
}

pub fn issue_url(base_url: &str, key: &str) -> String {
    format!("{}/browse/{}", base_url.trim_end_matches('/'), key)
}
