use std::{
    sync::mpsc::{Receiver, RecvTimeoutError},
    thread,
    time::Duration,
};

use anyhow::Result;
use jirareport_config::ScheduleConfig;
use jirareport_domain::IssueRecord;
use jirareport_jira::FetchError;
use jirareport_publish::{PublishError, PublishOutcome};
use tracing::{error, info, warn};

pub trait IssueSource {
    fn fetch(&self) -> Result<Vec<IssueRecord>, FetchError>;
}

pub trait ReportSink {
    fn write(&self, issues: &[IssueRecord]) -> Result<()>;
}

pub trait Publisher {
    fn publish(&self) -> Result<PublishOutcome, PublishError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    Rendered { issues: usize },
    Empty,
    FetchFailed,
    RenderFailed,
}

impl CycleOutcome {
    /// Only a rendered report earns the long pause; everything else retries
    /// soon.
    pub fn next_delay(&self, schedule: &ScheduleConfig) -> Duration {
        match self {
            Self::Rendered { .. } => schedule.refresh_interval,
            Self::Empty | Self::FetchFailed | Self::RenderFailed => schedule.retry_interval,
        }
    }
}

pub struct Poller<S, R, P> {
    source: S,
    sink: R,
    publisher: Option<P>,
    schedule: ScheduleConfig,
}

impl<S, R, P> Poller<S, R, P>
where
    S: IssueSource,
    R: ReportSink,
    P: Publisher,
{
    pub fn new(source: S, sink: R, publisher: Option<P>, schedule: ScheduleConfig) -> Self {
        Self {
            source,
            sink,
            publisher,
            schedule,
        }
    }

    pub fn publisher(&self) -> Option<&P> {
        self.publisher.as_ref()
    }

    /// Cycles until `shutdown` fires. A fetch in flight finishes first; a
    /// pending sleep is cut short.
    pub fn run(&self, shutdown: &Receiver<()>) {
        loop {
            let outcome = self.run_cycle();
            let delay = outcome.next_delay(&self.schedule);
            info!("Sleeping for {} seconds...", delay.as_secs());

            match shutdown.recv_timeout(delay) {
                Ok(()) => return,
                Err(RecvTimeoutError::Timeout) => {}
                // Nobody can interrupt us any more; plain sleep.
                Err(RecvTimeoutError::Disconnected) => thread::sleep(delay),
            }
        }
    }

    pub fn run_cycle(&self) -> CycleOutcome {
        info!("Fetching Jira issues...");
        let issues = match self.source.fetch() {
            Ok(issues) => issues,
            Err(FetchError::Status { status, body }) => {
                error!("Jira search failed: {} {}", status, body);
                return CycleOutcome::FetchFailed;
            }
            Err(other) => {
                let kind = other.kind();
                error!(
                    "Exception fetching Jira issues ({kind}): {:#}",
                    anyhow::Error::new(other)
                );
                return CycleOutcome::FetchFailed;
            }
        };

        if issues.is_empty() {
            warn!("No issues to display, retrying soon.");
            return CycleOutcome::Empty;
        }

        if let Err(error) = self.sink.write(&issues) {
            error!("Failed to write report: {error:#}");
            return CycleOutcome::RenderFailed;
        }
        info!("Report updated with {} issues.", issues.len());

        if let Some(publisher) = &self.publisher {
            match publisher.publish() {
                Ok(PublishOutcome::NoChanges) => info!("No changes to publish."),
                Ok(PublishOutcome::Pushed { message }) => info!("Published: {message}"),
                Err(error) => error!("Publish failed: {error}"),
            }
        }

        CycleOutcome::Rendered {
            issues: issues.len(),
        }
    }
}
