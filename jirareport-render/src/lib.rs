use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use chrono::Local;
use jirareport_config::ReportConfig;
use jirareport_domain::{IssueRecord, TIMESTAMP_FORMAT};
use tracing::debug;

const STYLE: &str = "\
    body { font-family: Arial, sans-serif; margin: 40px; }
    table { border-collapse: collapse; width: 100%; }
    th, td { border: 1px solid #ddd; padding: 8px; text-align: left; }
    th { background-color: #f2f2f2; }";

const HEADER_ROW: &str = "<tr><th>Key</th><th>Summary</th><th>Status</th><th>Description</th><th>Assignee</th></tr>";

/// Page-level values bound into the report around the issue rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportPage<'a> {
    pub project: &'a str,
    pub refresh_interval: Duration,
    pub updated: &'a str,
}

/// Renders the batch and overwrites the configured report file.
pub struct ReportWriter {
    output: PathBuf,
    project: String,
    refresh_interval: Duration,
}

impl ReportWriter {
    pub fn from_config(config: &ReportConfig) -> Self {
        Self {
            output: config.report.output.clone(),
            project: config.jira.project.clone(),
            refresh_interval: config.schedule.refresh_interval,
        }
    }

    pub fn render(&self, issues: &[IssueRecord]) -> Result<&Path> {
        let updated = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let html = render_html(
            issues,
            &ReportPage {
                project: &self.project,
                refresh_interval: self.refresh_interval,
                updated: &updated,
            },
        );
        write_report(&self.output, &html)?;
        debug!(path = %self.output.display(), rows = issues.len(), "report written");
        Ok(&self.output)
    }
}

pub fn render_html(issues: &[IssueRecord], page: &ReportPage<'_>) -> String {
    let project = html_escape(page.project);
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    html.push_str("  <meta charset=\"utf-8\">\n");
    html.push_str(&format!(
        "  <meta http-equiv=\"refresh\" content=\"{}\">\n",
        page.refresh_interval.as_secs()
    ));
    html.push_str(&format!("  <title>Jira Report - {project}</title>\n"));
    html.push_str(&format!("  <style>\n{STYLE}\n  </style>\n"));
    html.push_str("</head>\n<body>\n");
    html.push_str(&format!("  <h1>Jira Report - {project}</h1>\n"));
    html.push_str(&format!(
        "  <p>Last updated: {}</p>\n",
        html_escape(page.updated)
    ));
    html.push_str("  <table>\n");
    html.push_str(&format!("    {HEADER_ROW}\n"));
    for issue in issues {
        html.push_str(&render_row(issue));
    }
    html.push_str("  </table>\n</body>\n</html>\n");
    html
}

pub fn write_report(path: &Path, html: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create report directory {}", parent.display()))?;
    }
    fs::write(path, html).with_context(|| format!("failed to write report {}", path.display()))
}

fn render_row(issue: &IssueRecord) -> String {
    format!(
        "    <tr>\n      <td><a href=\"{}\">{}</a></td>\n      <td>{}</td>\n      <td>{}</td>\n      <td>{}</td>\n      <td>{}</td>\n    </tr>\n",
        html_escape(&issue.url),
        html_escape(&issue.key),
        html_escape(&issue.summary),
        html_escape(&issue.status),
        html_escape(&issue.description),
        html_escape(&issue.assignee),
    )
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use std::{fs, time::Duration};

    use jirareport_domain::{issue_url, IssueRecord};
    use tempfile::tempdir;

    use super::{html_escape, render_html, write_report, ReportPage};

    const BASE_URL: &str = "https://jira.example.com";

    fn page() -> ReportPage<'static> {
        ReportPage {
            project: "EASCP",
            refresh_interval: Duration::from_secs(600),
            updated: "2026-10-19 09:30:00",
        }
    }

    fn record(key: &str) -> IssueRecord {
        IssueRecord {
            key: key.to_string(),
            summary: format!("Summary of {key}"),
            status: "To Do".to_string(),
            description: "N/A".to_string(),
            assignee: "Unassigned".to_string(),
            url: issue_url(BASE_URL, key),
        }
    }

    fn data_rows(html: &str) -> usize {
        html.matches("<tr>").count() - 1
    }

    #[test]
    fn empty_batch_renders_header_only() {
        let html = render_html(&[], &page());

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<th>Key</th><th>Summary</th>"));
        assert_eq!(html.matches("<tr>").count(), 1);
        assert_eq!(data_rows(&html), 0);
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn renders_one_row_per_issue_with_browse_links() {
        let issues = ["EASCP-1", "EASCP-2", "EASCP-3"].map(record);
        let html = render_html(&issues, &page());

        assert_eq!(data_rows(&html), 3);
        for key in ["EASCP-1", "EASCP-2", "EASCP-3"] {
            assert!(html.contains(&format!(
                "<a href=\"{BASE_URL}/browse/{key}\">{key}</a>"
            )));
        }
    }

    #[test]
    fn renders_scenario_row() {
        let issue = IssueRecord {
            key: "EASCP-1".to_string(),
            summary: "Fix login".to_string(),
            status: "To Do".to_string(),
            description: "Cannot login".to_string(),
            assignee: "Unassigned".to_string(),
            url: issue_url(BASE_URL, "EASCP-1"),
        };
        let html = render_html(&[issue], &page());

        assert!(html.contains(
            "<td><a href=\"https://jira.example.com/browse/EASCP-1\">EASCP-1</a></td>\n      <td>Fix login</td>\n      <td>To Do</td>\n      <td>Cannot login</td>\n      <td>Unassigned</td>"
        ));
    }

    #[test]
    fn embeds_refresh_interval_title_and_timestamp() {
        let html = render_html(&[], &page());

        assert!(html.contains("<meta http-equiv=\"refresh\" content=\"600\">"));
        assert!(html.contains("<title>Jira Report - EASCP</title>"));
        assert!(html.contains("<p>Last updated: 2026-10-19 09:30:00</p>"));
    }

    #[test]
    fn escapes_issue_text() {
        let mut issue = record("EASCP-9");
        issue.summary = "<script>alert('x')</script>".to_string();
        issue.description = "a & b \"quoted\"".to_string();
        let html = render_html(&[issue], &page());

        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(&#x27;x&#x27;)&lt;/script&gt;"));
        assert!(html.contains("a &amp; b &quot;quoted&quot;"));
    }

    #[test]
    fn escapes_ampersand_first() {
        assert_eq!(html_escape("&lt;"), "&amp;lt;");
    }

    #[test]
    fn write_report_overwrites_and_creates_parent() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("site").join("report.html");

        write_report(&path, "first version, longer").expect("first write");
        write_report(&path, "second").expect("second write");

        assert_eq!(fs::read_to_string(&path).expect("read"), "second");
    }
}
