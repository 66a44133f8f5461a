//! Test doubles for the [`Ui`] and [`Actor`](crate::Actor) seams
//!
//! Enabled for this crate's own tests and, via the `test-support` feature,
//! for downstream command tests.

use crate::actor::{
    AppStateChange, Application, ApplicationActor, ApplicationState, ApplicationSummary,
    ApplicationSummaryActor, AuthActor, LogActor, LogMessage, LogStream, OperationStreams,
    Organization, Space, TargetActor, TargetInfo, TargetSettings, TokenRefreshStream,
    TokenRefresher, Warnings,
};
use crate::auth::{AuthPrompt, CredentialSet, GrantType};
use crate::error::ActorError;
use crate::ui::{Ui, UiError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// [`Ui`] that reads scripted input and records everything it shows
///
/// Prompts pop from the input queue; an empty queue behaves like a closed
/// terminal.
#[derive(Debug, Default)]
pub struct BufferUi {
    inputs: Mutex<VecDeque<String>>,
    out: Mutex<String>,
    err: Mutex<String>,
    prompts: Mutex<Vec<String>>,
    log_messages: Mutex<Vec<LogMessage>>,
}

impl BufferUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_input(&self, input: impl Into<String>) {
        lock(&self.inputs).push_back(input.into());
    }

    /// Everything written to stdout
    pub fn out(&self) -> String {
        lock(&self.out).clone()
    }

    /// Everything written to stderr
    pub fn err(&self) -> String {
        lock(&self.err).clone()
    }

    /// Labels of the prompts shown, in order
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    pub fn log_messages(&self) -> Vec<LogMessage> {
        lock(&self.log_messages).clone()
    }

    fn write_out(&self, text: &str) {
        let mut out = lock(&self.out);
        out.push_str(text);
        out.push('\n');
    }

    fn next_input(&self, label: &str) -> Result<String, UiError> {
        lock(&self.prompts).push(label.to_string());
        lock(&self.inputs).pop_front().ok_or(UiError::Closed)
    }
}

impl Ui for BufferUi {
    fn display_text(&self, text: &str) {
        self.write_out(text);
    }

    fn display_newline(&self) {
        lock(&self.out).push('\n');
    }

    fn display_ok(&self) {
        self.write_out("OK");
    }

    fn display_warning(&self, warning: &str) {
        let mut err = lock(&self.err);
        err.push_str(warning);
        err.push('\n');
    }

    fn display_text_prompt(&self, label: &str) -> Result<String, UiError> {
        self.next_input(label)
    }

    fn display_password_prompt(&self, label: &str) -> Result<String, UiError> {
        self.next_input(label)
    }

    fn display_bool_prompt(&self, label: &str, default: bool) -> Result<bool, UiError> {
        let input = self.next_input(label)?;
        Ok(match input.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => true,
            "n" | "no" => false,
            _ => default,
        })
    }

    /// Accepts a choice by name or 1-based number; blank input skips
    fn display_text_menu(&self, choices: &[String], label: &str) -> Result<Option<String>, UiError> {
        let input = self.next_input(label)?;
        let input = input.trim();
        if input.is_empty() {
            return Ok(None);
        }
        if let Ok(n) = input.parse::<usize>() {
            return Ok(n.checked_sub(1).and_then(|i| choices.get(i)).cloned());
        }
        Ok(choices.iter().find(|c| c.as_str() == input).cloned())
    }

    fn display_key_value_table(&self, rows: &[(String, String)]) {
        for (key, value) in rows {
            self.write_out(&format!("{key} {value}"));
        }
    }

    fn display_table(&self, headers: &[&str], rows: &[Vec<String>]) {
        self.write_out(&headers.join("   "));
        for row in rows {
            self.write_out(&row.join("   "));
        }
    }

    fn display_log_message(&self, message: &LogMessage) {
        self.write_out(&message.message);
        lock(&self.log_messages).push(message.clone());
    }
}

/// One recorded `authenticate` call
#[derive(Debug, Clone)]
pub struct AuthenticateCall {
    pub credentials: CredentialSet,
    pub origin: Option<String>,
    pub grant_type: GrantType,
}

/// What the fake restart producer reports before closing its channels
#[derive(Debug, Clone, Default)]
pub struct RestartScript {
    pub warnings: Vec<String>,
    pub states: Vec<AppStateChange>,
    pub error: Option<ActorError>,
}

/// What the fake log tailer sends before waiting for cancellation
#[derive(Debug, Clone, Default)]
pub struct LogScript {
    pub warnings: Warnings,
    pub messages: Vec<LogMessage>,
    pub errors: Vec<ActorError>,
    /// Close the message channels once everything was sent
    pub close_when_done: bool,
    /// Fail to start the stream instead
    pub start_error: Option<ActorError>,
}

/// Lifecycle points recorded by [`FakeActor`], in the order they happened
pub mod events {
    pub const RESTART_INVOKED: &str = "restart invoked";
    pub const RESTART_FINISHED: &str = "restart finished";
    pub const LOGS_STARTED: &str = "logs started";
    pub const LOGS_CANCELLED: &str = "logs cancelled";
    pub const REFRESH_SCHEDULED: &str = "refresh scheduled";
    pub const REFRESH_STOPPED: &str = "refresh stopped";
}

/// Scripted in-memory actor
///
/// Every call is recorded. Responses come from the scripts set up by the
/// test; unscripted calls fail with [`ActorError::Other`].
#[derive(Debug)]
pub struct FakeActor {
    login_prompts: Mutex<Result<Vec<AuthPrompt>, ActorError>>,
    login_prompt_calls: AtomicUsize,
    authenticate_results: Mutex<VecDeque<Result<String, ActorError>>>,
    authenticate_calls: Mutex<Vec<AuthenticateCall>>,

    target_result: Mutex<Result<(TargetInfo, Warnings), ActorError>>,
    target_calls: Mutex<Vec<TargetSettings>>,
    organizations: Mutex<Vec<Organization>>,
    spaces: Mutex<Vec<Space>>,

    applications: Mutex<Vec<Application>>,
    application_warnings: Mutex<Warnings>,
    restart: Mutex<RestartScript>,
    restart_calls: AtomicUsize,

    logs: Mutex<LogScript>,
    recent_logs: Mutex<Vec<LogMessage>>,
    recent_log_calls: AtomicUsize,
    log_cancellations: Arc<AtomicUsize>,

    refresh_schedule_error: Mutex<Option<ActorError>>,
    refresh_errors: Mutex<Vec<ActorError>>,
    late_refresh_errors: Mutex<Vec<ActorError>>,
    refresh_sender: Mutex<Option<mpsc::Sender<ActorError>>>,
    refresh_periods: Mutex<Vec<Duration>>,
    refresh_stops: Arc<AtomicUsize>,

    summary: Mutex<Option<Result<(ApplicationSummary, Warnings), ActorError>>>,
    summary_calls: Mutex<Vec<(String, String, bool)>>,

    events: Arc<Mutex<Vec<&'static str>>>,
}

impl Default for FakeActor {
    fn default() -> Self {
        Self {
            login_prompts: Mutex::new(Ok(Vec::new())),
            login_prompt_calls: AtomicUsize::new(0),
            authenticate_results: Mutex::default(),
            authenticate_calls: Mutex::default(),
            target_result: Mutex::new(Ok((TargetInfo::default(), Vec::new()))),
            target_calls: Mutex::default(),
            organizations: Mutex::default(),
            spaces: Mutex::default(),
            applications: Mutex::default(),
            application_warnings: Mutex::default(),
            restart: Mutex::default(),
            restart_calls: AtomicUsize::new(0),
            logs: Mutex::default(),
            recent_logs: Mutex::default(),
            recent_log_calls: AtomicUsize::new(0),
            log_cancellations: Arc::default(),
            refresh_schedule_error: Mutex::default(),
            refresh_errors: Mutex::default(),
            late_refresh_errors: Mutex::default(),
            refresh_sender: Mutex::default(),
            refresh_periods: Mutex::default(),
            refresh_stops: Arc::default(),
            summary: Mutex::default(),
            summary_calls: Mutex::default(),
            events: Arc::default(),
        }
    }
}

impl FakeActor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_login_prompts(&self, prompts: Vec<AuthPrompt>) {
        *lock(&self.login_prompts) = Ok(prompts);
    }

    pub fn set_login_prompts_error(&self, err: ActorError) {
        *lock(&self.login_prompts) = Err(err);
    }

    pub fn login_prompt_calls(&self) -> usize {
        self.login_prompt_calls.load(Ordering::SeqCst)
    }

    pub fn push_authenticate(&self, result: Result<String, ActorError>) {
        lock(&self.authenticate_results).push_back(result);
    }

    pub fn authenticate_calls(&self) -> Vec<AuthenticateCall> {
        lock(&self.authenticate_calls).clone()
    }

    pub fn set_target_result(&self, result: Result<(TargetInfo, Warnings), ActorError>) {
        *lock(&self.target_result) = result;
    }

    pub fn target_calls(&self) -> Vec<TargetSettings> {
        lock(&self.target_calls).clone()
    }

    pub fn set_organizations(&self, organizations: Vec<Organization>) {
        *lock(&self.organizations) = organizations;
    }

    pub fn set_spaces(&self, spaces: Vec<Space>) {
        *lock(&self.spaces) = spaces;
    }

    pub fn add_application(&self, app: Application) {
        lock(&self.applications).push(app);
    }

    pub fn set_application_warnings(&self, warnings: Warnings) {
        *lock(&self.application_warnings) = warnings;
    }

    pub fn set_restart(&self, script: RestartScript) {
        *lock(&self.restart) = script;
    }

    pub fn restart_calls(&self) -> usize {
        self.restart_calls.load(Ordering::SeqCst)
    }

    pub fn set_logs(&self, script: LogScript) {
        *lock(&self.logs) = script;
    }

    pub fn set_recent_logs(&self, messages: Vec<LogMessage>) {
        *lock(&self.recent_logs) = messages;
    }

    pub fn recent_log_calls(&self) -> usize {
        self.recent_log_calls.load(Ordering::SeqCst)
    }

    pub fn log_cancellations(&self) -> usize {
        self.log_cancellations.load(Ordering::SeqCst)
    }

    pub fn set_refresh_schedule_error(&self, err: ActorError) {
        *lock(&self.refresh_schedule_error) = Some(err);
    }

    /// Errors queued on the refresh channel as soon as it is scheduled
    pub fn set_refresh_errors(&self, errors: Vec<ActorError>) {
        *lock(&self.refresh_errors) = errors;
    }

    /// Errors the refresher reports once the restart producer's state
    /// changes have all been consumed
    pub fn set_refresh_errors_after_progress(&self, errors: Vec<ActorError>) {
        *lock(&self.late_refresh_errors) = errors;
    }

    pub fn refresh_periods(&self) -> Vec<Duration> {
        lock(&self.refresh_periods).clone()
    }

    pub fn refresh_stops(&self) -> usize {
        self.refresh_stops.load(Ordering::SeqCst)
    }

    pub fn set_summary(&self, result: Result<(ApplicationSummary, Warnings), ActorError>) {
        *lock(&self.summary) = Some(result);
    }

    pub fn summary_calls(&self) -> Vec<(String, String, bool)> {
        lock(&self.summary_calls).clone()
    }

    pub fn events(&self) -> Vec<&'static str> {
        lock(&self.events).clone()
    }

    fn record(&self, event: &'static str) {
        lock(&self.events).push(event);
    }
}

/// Wait until the receiving side has taken everything sent on `sender`
async fn drained<T>(sender: &mpsc::Sender<T>) {
    while sender.capacity() < sender.max_capacity() && !sender.is_closed() {
        tokio::task::yield_now().await;
    }
}

/// A started app named `name` in space `space_guid`
pub fn application(name: &str, space_guid: &str) -> Application {
    Application {
        guid: format!("{name}-guid"),
        name: name.to_string(),
        space_guid: space_guid.to_string(),
        state: ApplicationState::Started,
    }
}

/// A summary with no processes
pub fn empty_summary(name: &str) -> ApplicationSummary {
    ApplicationSummary {
        name: name.to_string(),
        state: ApplicationState::Started,
        routes: Vec::new(),
        processes: Vec::new(),
    }
}

fn unscripted(call: &str) -> ActorError {
    ActorError::Other(format!("unexpected call to {call}"))
}

#[async_trait]
impl AuthActor for FakeActor {
    async fn get_login_prompts(&self) -> Result<Vec<AuthPrompt>, ActorError> {
        self.login_prompt_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.login_prompts).clone()
    }

    async fn authenticate(
        &self,
        credentials: &CredentialSet,
        origin: Option<&str>,
        grant_type: GrantType,
    ) -> Result<String, ActorError> {
        lock(&self.authenticate_calls).push(AuthenticateCall {
            credentials: credentials.clone(),
            origin: origin.map(String::from),
            grant_type,
        });
        lock(&self.authenticate_results)
            .pop_front()
            .unwrap_or_else(|| Err(unscripted("authenticate")))
    }
}

#[async_trait]
impl TargetActor for FakeActor {
    async fn set_target(
        &self,
        settings: &TargetSettings,
    ) -> Result<(TargetInfo, Warnings), ActorError> {
        lock(&self.target_calls).push(settings.clone());
        lock(&self.target_result).clone()
    }

    async fn get_organization_by_name(
        &self,
        name: &str,
    ) -> Result<(Organization, Warnings), ActorError> {
        lock(&self.organizations)
            .iter()
            .find(|o| o.name == name)
            .cloned()
            .map(|o| (o, Vec::new()))
            .ok_or_else(|| ActorError::OrganizationNotFound {
                name: name.to_string(),
            })
    }

    async fn get_organizations(&self) -> Result<(Vec<Organization>, Warnings), ActorError> {
        Ok((lock(&self.organizations).clone(), Vec::new()))
    }

    async fn get_space_by_name_and_organization(
        &self,
        name: &str,
        _org_guid: &str,
    ) -> Result<(Space, Warnings), ActorError> {
        lock(&self.spaces)
            .iter()
            .find(|s| s.name == name)
            .cloned()
            .map(|s| (s, Vec::new()))
            .ok_or_else(|| ActorError::SpaceNotFound {
                name: name.to_string(),
            })
    }

    async fn get_organization_spaces(
        &self,
        _org_guid: &str,
    ) -> Result<(Vec<Space>, Warnings), ActorError> {
        Ok((lock(&self.spaces).clone(), Vec::new()))
    }
}

#[async_trait]
impl ApplicationActor for FakeActor {
    async fn get_application_by_name_and_space(
        &self,
        name: &str,
        space_guid: &str,
    ) -> Result<(Application, Warnings), ActorError> {
        let warnings = lock(&self.application_warnings).clone();
        lock(&self.applications)
            .iter()
            .find(|a| a.name == name && a.space_guid == space_guid)
            .cloned()
            .map(|a| (a, warnings))
            .ok_or_else(|| ActorError::ApplicationNotFound {
                name: name.to_string(),
            })
    }

    fn restart_application(&self, _app: &Application) -> OperationStreams {
        self.restart_calls.fetch_add(1, Ordering::SeqCst);
        self.record(events::RESTART_INVOKED);
        let script = lock(&self.restart).clone();
        let late_refresh_errors = std::mem::take(&mut *lock(&self.late_refresh_errors));
        let refresh_sender = lock(&self.refresh_sender).take();
        let recorded = Arc::clone(&self.events);
        let (senders, streams) = OperationStreams::channel();

        tokio::spawn(async move {
            for warning in script.warnings {
                let _ = senders.warnings.send(warning).await;
            }
            for state in script.states {
                let _ = senders.states.send(state).await;
            }
            if let Some(refresh) = refresh_sender.filter(|_| !late_refresh_errors.is_empty()) {
                drained(&senders.states).await;
                for err in late_refresh_errors {
                    let _ = refresh.send(err).await;
                }
                drained(&refresh).await;
            }
            if let Some(err) = script.error {
                let _ = senders.errors.send(err).await;
            }
            lock(&recorded).push(events::RESTART_FINISHED);
            drop(senders);
        });

        streams
    }
}

#[async_trait]
impl LogActor for FakeActor {
    async fn get_streaming_logs_for_application_by_name_and_space(
        &self,
        _app_name: &str,
        _space_guid: &str,
    ) -> Result<(LogStream, Warnings), ActorError> {
        let script = lock(&self.logs).clone();
        if let Some(err) = script.start_error {
            return Err(err);
        }
        self.record(events::LOGS_STARTED);

        let (senders, stream) = LogStream::channel();
        let recorded = Arc::clone(&self.events);
        let cancellations = Arc::clone(&self.log_cancellations);
        tokio::spawn(async move {
            let crate::actor::LogSenders {
                messages,
                errors,
                stop,
            } = senders;
            for message in script.messages {
                let _ = messages.send(message).await;
            }
            for err in script.errors {
                let _ = errors.send(err).await;
            }
            if script.close_when_done {
                drop(messages);
                drop(errors);
                stop.cancelled().await;
            } else {
                stop.cancelled().await;
                drop(messages);
                drop(errors);
            }
            cancellations.fetch_add(1, Ordering::SeqCst);
            lock(&recorded).push(events::LOGS_CANCELLED);
            stop.acknowledge();
        });

        Ok((stream, script.warnings))
    }

    async fn get_recent_logs_for_application_by_name_and_space(
        &self,
        _app_name: &str,
        _space_guid: &str,
    ) -> Result<(Vec<LogMessage>, Warnings), ActorError> {
        self.recent_log_calls.fetch_add(1, Ordering::SeqCst);
        Ok((lock(&self.recent_logs).clone(), Vec::new()))
    }
}

impl TokenRefresher for FakeActor {
    fn schedule_token_refresh(&self, period: Duration) -> Result<TokenRefreshStream, ActorError> {
        lock(&self.refresh_periods).push(period);
        if let Some(err) = lock(&self.refresh_schedule_error).clone() {
            return Err(err);
        }
        self.record(events::REFRESH_SCHEDULED);

        let (senders, stream) = TokenRefreshStream::channel();
        for err in lock(&self.refresh_errors).drain(..) {
            let _ = senders.errors.try_send(err);
        }
        *lock(&self.refresh_sender) = Some(senders.errors.clone());

        let recorded = Arc::clone(&self.events);
        let stops = Arc::clone(&self.refresh_stops);
        tokio::spawn(async move {
            senders.stop.cancelled().await;
            stops.fetch_add(1, Ordering::SeqCst);
            lock(&recorded).push(events::REFRESH_STOPPED);
            drop(senders.errors);
            senders.stop.acknowledge();
        });

        Ok(stream)
    }
}

#[async_trait]
impl ApplicationSummaryActor for FakeActor {
    async fn get_application_summary_by_name_and_space(
        &self,
        app_name: &str,
        space_guid: &str,
        obfuscate: bool,
    ) -> Result<(ApplicationSummary, Warnings), ActorError> {
        lock(&self.summary_calls).push((app_name.to_string(), space_guid.to_string(), obfuscate));
        lock(&self.summary)
            .clone()
            .unwrap_or_else(|| Ok((empty_summary(app_name), Vec::new())))
    }
}
