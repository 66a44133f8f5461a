//! Actor layer interfaces
//!
//! Commands never talk HTTP themselves. They call these traits, which the
//! [`crate::api::CloudClient`] implements against the real platform and
//! `testing::FakeActor` implements for tests.

mod streams;

pub use streams::{
    LogSenders, LogStream, OperationSenders, OperationStreams, STREAM_BUFFER, StopSignal,
    StreamCanceller, TokenRefreshSenders, TokenRefreshStream, stop_pair,
};

use crate::auth::{AuthPrompt, CredentialSet, GrantType};
use crate::error::ActorError;
use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Timelike, Utc};
use std::fmt::Display;
use std::time::Duration;

/// Non-fatal advisory messages returned next to a result
pub type Warnings = Vec<String>;

/// Where and how to reach the cloud controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSettings {
    pub url: String,
    pub skip_ssl_validation: bool,
}

/// What the root endpoint reported after targeting
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetInfo {
    pub api_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Organization {
    pub guid: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Space {
    pub guid: String,
    pub name: String,
}

/// Desired state of an app as recorded by the cloud controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationState {
    Started,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    pub guid: String,
    pub name: String,
    pub space_guid: String,
    pub state: ApplicationState,
}

impl Application {
    pub fn started(&self) -> bool {
        self.state == ApplicationState::Started
    }
}

/// State transitions reported while restarting an app
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppStateChange {
    Stopping,
    Staging,
    Starting,
}

impl AppStateChange {
    /// Line shown to the user when this transition begins
    pub fn message(self) -> &'static str {
        match self {
            AppStateChange::Stopping => "Stopping app...",
            AppStateChange::Staging => "Staging app and tracing logs...",
            AppStateChange::Starting => "Waiting for app to start...",
        }
    }
}

/// One log line from the log cache
#[derive(Debug, Clone, PartialEq)]
pub struct LogMessage {
    pub message: String,
    /// "OUT" or "ERR"
    pub message_type: String,
    pub timestamp: DateTime<Utc>,
    /// e.g. "APP/PROC/WEB", "STG", "RTR"
    pub source_type: String,
    pub source_instance: String,
}

impl LogMessage {
    pub fn new(
        message: impl Into<String>,
        message_type: impl Into<String>,
        timestamp: DateTime<Utc>,
        source_type: impl Into<String>,
        source_instance: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            message_type: message_type.into(),
            timestamp,
            source_type: source_type.into(),
            source_instance: source_instance.into(),
        }
    }

    /// True for staging (buildpack) output
    pub fn is_staging(&self) -> bool {
        self.source_type == "STG"
    }

    pub fn is_error(&self) -> bool {
        self.message_type == "ERR"
    }

    /// Header printed before the message text (local time, source, type)
    pub fn header(&self) -> String {
        let local = self.timestamp.with_timezone(&Local);
        let source = if self.source_instance.is_empty() {
            self.source_type.clone()
        } else {
            format!("{}/{}", self.source_type, self.source_instance)
        };
        format!(
            "{} [{}] {}",
            log_timestamp(&local),
            source,
            self.message_type
        )
    }

    /// Header and text on one line; multi-line messages repeat the header
    pub fn render(&self) -> String {
        let header = self.header();
        self.message
            .trim_end_matches('\n')
            .lines()
            .map(|line| format!("   {header} {line}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Timestamp with centisecond precision, e.g. `2020-02-11T18:50:06.35+0000`
fn log_timestamp<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    // Leap seconds report nanos past 999_999_999
    let centis = (at.nanosecond() / 10_000_000).min(99);
    format!(
        "{}.{centis:02}{}",
        at.format("%Y-%m-%dT%H:%M:%S"),
        at.format("%z")
    )
}

/// Runtime details of one process instance
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessInstance {
    pub index: u32,
    /// "RUNNING", "CRASHED", "STARTING", "DOWN"
    pub state: String,
    pub uptime: Duration,
    pub cpu: f64,
    pub memory_usage: u64,
    pub memory_quota: u64,
    pub disk_usage: u64,
    pub disk_quota: u64,
}

impl ProcessInstance {
    pub fn running(&self) -> bool {
        self.state.eq_ignore_ascii_case("RUNNING")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSummary {
    pub process_type: String,
    pub command: String,
    pub memory_in_mb: u64,
    pub disk_in_mb: u64,
    pub instances: Vec<ProcessInstance>,
}

impl ProcessSummary {
    pub fn running_instances(&self) -> usize {
        self.instances.iter().filter(|i| i.running()).count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationSummary {
    pub name: String,
    pub state: ApplicationState,
    pub routes: Vec<String>,
    pub processes: Vec<ProcessSummary>,
}

/// Login prompts and token grants (UAA)
#[async_trait]
pub trait AuthActor: Send + Sync {
    /// Prompts the login server wants answered
    async fn get_login_prompts(&self) -> Result<Vec<AuthPrompt>, ActorError>;

    /// Exchange credentials for tokens; returns the authenticated user name
    async fn authenticate(
        &self,
        credentials: &CredentialSet,
        origin: Option<&str>,
        grant_type: GrantType,
    ) -> Result<String, ActorError>;
}

/// API targeting and org/space lookup
#[async_trait]
pub trait TargetActor: Send + Sync {
    async fn set_target(&self, settings: &TargetSettings)
    -> Result<(TargetInfo, Warnings), ActorError>;

    async fn get_organization_by_name(
        &self,
        name: &str,
    ) -> Result<(Organization, Warnings), ActorError>;

    async fn get_organizations(&self) -> Result<(Vec<Organization>, Warnings), ActorError>;

    async fn get_space_by_name_and_organization(
        &self,
        name: &str,
        org_guid: &str,
    ) -> Result<(Space, Warnings), ActorError>;

    async fn get_organization_spaces(
        &self,
        org_guid: &str,
    ) -> Result<(Vec<Space>, Warnings), ActorError>;
}

/// App lookup and the restart operation producer
#[async_trait]
pub trait ApplicationActor: Send + Sync {
    async fn get_application_by_name_and_space(
        &self,
        name: &str,
        space_guid: &str,
    ) -> Result<(Application, Warnings), ActorError>;

    /// Start restarting `app` in the background and report progress
    fn restart_application(&self, app: &Application) -> OperationStreams;
}

/// Log cache access
#[async_trait]
pub trait LogActor: Send + Sync {
    /// Start tailing the app's logs
    async fn get_streaming_logs_for_application_by_name_and_space(
        &self,
        app_name: &str,
        space_guid: &str,
    ) -> Result<(LogStream, Warnings), ActorError>;

    /// The most recent log window, oldest first
    async fn get_recent_logs_for_application_by_name_and_space(
        &self,
        app_name: &str,
        space_guid: &str,
    ) -> Result<(Vec<LogMessage>, Warnings), ActorError>;
}

/// Keeps the access token fresh during long-running streams
pub trait TokenRefresher: Send + Sync {
    /// Refresh every `period` until cancelled; failures go to the error channel
    fn schedule_token_refresh(&self, period: Duration) -> Result<TokenRefreshStream, ActorError>;
}

#[async_trait]
pub trait ApplicationSummaryActor: Send + Sync {
    async fn get_application_summary_by_name_and_space(
        &self,
        app_name: &str,
        space_guid: &str,
        obfuscate: bool,
    ) -> Result<(ApplicationSummary, Warnings), ActorError>;
}

/// Everything a command can ask of the remote side
pub trait Actor:
    AuthActor + TargetActor + ApplicationActor + LogActor + TokenRefresher + ApplicationSummaryActor
{
}

impl<T> Actor for T where
    T: AuthActor
        + TargetActor
        + ApplicationActor
        + LogActor
        + TokenRefresher
        + ApplicationSummaryActor
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn message(text: &str, source_type: &str) -> LogMessage {
        LogMessage::new(
            text,
            "OUT",
            Utc.timestamp_opt(0, 0).unwrap(),
            source_type,
            "some-source-instance",
        )
    }

    #[test]
    fn staging_logs_are_detected_by_source_type() {
        assert!(message("some-message", "STG").is_staging());
        assert!(!message("some-message", "APP").is_staging());
    }

    #[test]
    fn render_prefixes_every_line() {
        let rendered = message("line one\nline two\n", "APP/PROC/WEB").render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("[APP/PROC/WEB/some-source-instance] OUT line one"));
        assert!(lines[1].ends_with("OUT line two"));
    }

    #[test]
    fn log_timestamps_keep_two_fractional_digits() {
        let offset = chrono::FixedOffset::west_opt(7 * 3600).unwrap();
        let at = offset
            .timestamp_opt(1_581_447_006, 352_020_890)
            .unwrap();
        assert_eq!(log_timestamp(&at), "2020-02-11T11:50:06.35-0700");

        let whole = Utc.timestamp_opt(0, 0).unwrap();
        assert_eq!(log_timestamp(&whole), "1970-01-01T00:00:00.00+0000");
    }

    #[test]
    fn header_names_source_and_type() {
        let header = message("text", "APP/PROC/WEB").header();
        let (timestamp, rest) = header.split_once(' ').unwrap();
        assert_eq!(rest, "[APP/PROC/WEB/some-source-instance] OUT");
        assert_eq!(timestamp.split_once('.').unwrap().1.len(), 7);
    }

    #[test]
    fn state_change_messages() {
        assert_eq!(AppStateChange::Stopping.message(), "Stopping app...");
        assert_eq!(
            AppStateChange::Staging.message(),
            "Staging app and tracing logs..."
        );
        assert_eq!(
            AppStateChange::Starting.message(),
            "Waiting for app to start..."
        );
    }

    #[test]
    fn running_instances_counts_case_insensitively() {
        let instance = |state: &str| ProcessInstance {
            index: 0,
            state: state.to_string(),
            uptime: Duration::ZERO,
            cpu: 0.0,
            memory_usage: 0,
            memory_quota: 0,
            disk_usage: 0,
            disk_quota: 0,
        };
        let process = ProcessSummary {
            process_type: "web".to_string(),
            command: String::new(),
            memory_in_mb: 32,
            disk_in_mb: 1024,
            instances: vec![instance("RUNNING"), instance("crashed"), instance("running")],
        };
        assert_eq!(process.running_instances(), 2);
    }
}
