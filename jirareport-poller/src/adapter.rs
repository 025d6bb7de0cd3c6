use anyhow::Result;
use jirareport_config::ReportConfig;
use jirareport_domain::IssueRecord;
use jirareport_jira::{FetchError, JiraClient, SearchQuery};
use jirareport_publish::{GitPublisher, PublishError, PublishOutcome};
use jirareport_render::ReportWriter;
use tracing::info;

use crate::poller::{IssueSource, Poller, Publisher, ReportSink};

pub type JiraPoller = Poller<JiraSource, ReportWriter, GitPublisher>;

pub struct JiraSource {
    client: JiraClient,
    query: SearchQuery,
}

impl JiraSource {
    pub fn from_config(config: &ReportConfig) -> Result<Self> {
        let query = SearchQuery {
            jql: config.jira.search_jql()?,
            max_results: config.jira.max_results,
        };
        info!("Query: {} (max {} results)", query.jql, query.max_results);

        Ok(Self {
            client: JiraClient::from_config(&config.jira)?,
            query,
        })
    }
}

impl IssueSource for JiraSource {
    fn fetch(&self) -> Result<Vec<IssueRecord>, FetchError> {
        self.client.search(&self.query).map(|batch| batch.issues)
    }
}

impl ReportSink for ReportWriter {
    fn write(&self, issues: &[IssueRecord]) -> Result<()> {
        self.render(issues).map(|_| ())
    }
}

impl Publisher for GitPublisher {
    fn publish(&self) -> Result<PublishOutcome, PublishError> {
        GitPublisher::publish(self)
    }
}

pub fn build_poller(config: &ReportConfig) -> Result<JiraPoller> {
    let source = JiraSource::from_config(config)?;
    let publisher = config
        .publish
        .enabled
        .then(|| GitPublisher::from_config(config));

    Ok(Poller::new(
        source,
        ReportWriter::from_config(config),
        publisher,
        config.schedule.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path, time::Duration};

    use jirareport_config::{
        JiraConfig, LogConfig, PublishConfig, ReportConfig, ReportSettings, ScheduleConfig,
    };
    use serde_json::json;
    use tempfile::tempdir;

    use super::{build_poller, JiraSource};
    use crate::poller::CycleOutcome;

    fn report_config(server: &str, output: &Path) -> ReportConfig {
        ReportConfig {
            jira: JiraConfig {
                server: server.to_string(),
                user: Some("alice@example.com".to_string()),
                token: Some("secret".to_string()),
                project: "EASCP".to_string(),
                jql: None,
                max_results: 50,
                api_version: None,
                auth_method: None,
                timeout: Duration::from_secs(5),
                insecure: false,
            },
            report: ReportSettings {
                output: output.to_path_buf(),
            },
            schedule: ScheduleConfig {
                refresh_interval: Duration::from_secs(600),
                retry_interval: Duration::from_secs(60),
            },
            log: LogConfig {
                file: None,
                level: "info".to_string(),
            },
            publish: PublishConfig {
                enabled: false,
                repo_dir: output.parent().unwrap_or(Path::new(".")).to_path_buf(),
                remote: "origin".to_string(),
                branch: "main".to_string(),
                paths: Vec::new(),
            },
        }
    }

    #[test]
    fn builds_default_query_from_project() {
        let dir = tempdir().expect("temp dir");
        let config = report_config("https://jira.example.com", &dir.path().join("report.html"));

        let source = JiraSource::from_config(&config).expect("source");

        assert_eq!(source.query.jql, "project = EASCP ORDER BY updated DESC");
        assert_eq!(source.query.max_results, 50);
    }

    #[test]
    fn missing_token_is_fatal_at_startup() {
        let dir = tempdir().expect("temp dir");
        let mut config =
            report_config("https://jira.example.com", &dir.path().join("report.html"));
        config.jira.token = None;

        assert!(build_poller(&config).is_err());
    }

    #[test]
    fn full_cycle_writes_scenario_report() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/rest/api/3/search/jql")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "issues": [{
                        "key": "EASCP-1",
                        "fields": {
                            "summary": "Fix login",
                            "status": {"name": "To Do"},
                            "description": {
                                "type": "doc",
                                "content": [{
                                    "type": "paragraph",
                                    "content": [
                                        {"type": "text", "text": "Cannot"},
                                        {"type": "text", "text": "login"}
                                    ]
                                }]
                            },
                            "assignee": null
                        }
                    }],
                    "isLast": true
                })
                .to_string(),
            )
            .create();
        let dir = tempdir().expect("temp dir");
        let output = dir.path().join("report.html");
        let poller = build_poller(&report_config(&server.url(), &output)).expect("poller");

        assert_eq!(poller.run_cycle(), CycleOutcome::Rendered { issues: 1 });

        let html = fs::read_to_string(&output).expect("report");
        assert!(html.contains(&format!(
            "<a href=\"{}/browse/EASCP-1\">EASCP-1</a>",
            server.url()
        )));
        assert!(html.contains("<td>Fix login</td>"));
        assert!(html.contains("<td>To Do</td>"));
        assert!(html.contains("<td>Cannot login</td>"));
        assert!(html.contains("<td>Unassigned</td>"));
    }

    #[test]
    fn failed_fetch_leaves_previous_report_untouched() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/rest/api/3/search/jql")
            .with_status(503)
            .with_body("maintenance")
            .create();
        let dir = tempdir().expect("temp dir");
        let output = dir.path().join("report.html");
        fs::write(&output, "previous").expect("seed report");
        let poller = build_poller(&report_config(&server.url(), &output)).expect("poller");

        assert_eq!(poller.run_cycle(), CycleOutcome::FetchFailed);
        assert_eq!(fs::read_to_string(&output).expect("report"), "previous");
    }
}
