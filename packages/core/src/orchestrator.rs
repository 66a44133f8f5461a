//! Streamed operation orchestration
//!
//! Runs a long-lived app operation (restart) while tailing the app's logs and
//! keeping the access token fresh, and renders everything as it arrives.
//!
//! ```text
//! operation producer ──states/warnings/errors──┐
//! log tailer ──────────messages/errors─────────┼──> consumer (select!) ──> Ui
//! token refresher ─────errors──────────────────┘
//! ```
//!
//! The consumer is the only writer to the UI. Producers are stopped through
//! their [`StreamCanceller`](crate::actor::StreamCanceller), each exactly once.

use crate::actor::{Actor, Application, LogStream, OperationStreams, TokenRefreshStream};
use crate::error::{ActorError, CommandError};
use crate::summary::display_app_summary;
use crate::ui::Ui;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default period between token refreshes while streaming
pub const DEFAULT_REFRESH_PERIOD: Duration = Duration::from_secs(60);

pub struct OperationOrchestrator<'a, A: ?Sized, U: ?Sized> {
    actor: &'a A,
    ui: &'a U,
    binary_name: String,
    refresh_period: Duration,
    interrupt: CancellationToken,
}

impl<'a, A, U> OperationOrchestrator<'a, A, U>
where
    A: Actor + ?Sized,
    U: Ui + ?Sized,
{
    pub fn new(actor: &'a A, ui: &'a U, binary_name: impl Into<String>) -> Self {
        Self {
            actor,
            ui,
            binary_name: binary_name.into(),
            refresh_period: DEFAULT_REFRESH_PERIOD,
            interrupt: CancellationToken::new(),
        }
    }

    pub fn with_refresh_period(mut self, period: Duration) -> Self {
        self.refresh_period = period;
        self
    }

    /// Token that ends log following when cancelled (wired to Ctrl+C)
    pub fn with_interrupt(mut self, interrupt: CancellationToken) -> Self {
        self.interrupt = interrupt;
        self
    }

    fn translate(&self, err: ActorError) -> CommandError {
        CommandError::translate(err, &self.binary_name)
    }

    /// Restart `app`, streaming its logs, then show its summary
    pub async fn restart(&self, app: &Application) -> Result<(), CommandError> {
        let TokenRefreshStream {
            errors: mut refresh_errors,
            canceller: refresher,
        } = self
            .actor
            .schedule_token_refresh(self.refresh_period)
            .map_err(|e| self.translate(e))?;

        if let Ok(err) = refresh_errors.try_recv() {
            debug!(error = %err, "token refresh failed before restart");
            refresher.cancel().await;
            return Err(self.translate(err));
        }

        let (log_stream, warnings) = match self
            .actor
            .get_streaming_logs_for_application_by_name_and_space(&app.name, &app.space_guid)
            .await
        {
            Ok(started) => started,
            Err(err) => {
                refresher.cancel().await;
                return Err(self.translate(err));
            }
        };
        self.ui.display_warnings(&warnings);

        if let Ok(err) = refresh_errors.try_recv() {
            debug!(error = %err, "token refresh failed before restart");
            log_stream.canceller.cancel().await;
            refresher.cancel().await;
            return Err(self.translate(err));
        }

        debug!(app = %app.name, "invoking restart");
        let operation = self.actor.restart_application(app);
        let outcome = self
            .consume(operation, log_stream, &mut refresh_errors)
            .await;
        refresher.cancel().await;
        debug!(app = %app.name, ok = outcome.is_ok(), "restart stream finished");
        outcome?;

        let (summary, warnings) = self
            .actor
            .get_application_summary_by_name_and_space(&app.name, &app.space_guid, true)
            .await
            .map_err(|e| self.translate(e))?;
        self.ui.display_warnings(&warnings);
        display_app_summary(self.ui, &summary);
        Ok(())
    }

    /// Merge operation progress with the log tail until the operation ends
    async fn consume(
        &self,
        operation: OperationStreams,
        logs: LogStream,
        refresh_errors: &mut mpsc::Receiver<ActorError>,
    ) -> Result<(), CommandError> {
        let OperationStreams {
            mut states,
            mut warnings,
            mut errors,
        } = operation;
        let LogStream {
            messages: mut log_messages,
            errors: mut log_errors,
            canceller,
        } = logs;

        let (mut states_open, mut warnings_open, mut errors_open) = (true, true, true);
        let (mut messages_open, mut log_errors_open, mut refresh_open) = (true, true, true);
        let mut progressed = false;

        let outcome = loop {
            if !states_open && !warnings_open && !errors_open {
                break Ok(());
            }

            tokio::select! {
                state = states.recv(), if states_open => match state {
                    Some(state) => {
                        progressed = true;
                        self.ui.display_text(state.message());
                    }
                    None => states_open = false,
                },
                warning = warnings.recv(), if warnings_open => match warning {
                    Some(warning) => self.ui.display_warning(&warning),
                    None => warnings_open = false,
                },
                err = errors.recv(), if errors_open => match err {
                    Some(err) => {
                        debug!(error = %err, "operation failed");
                        break Err(self.translate(err));
                    }
                    None => errors_open = false,
                },
                message = log_messages.recv(), if messages_open => match message {
                    Some(message) => self.ui.display_log_message(&message),
                    None => messages_open = false,
                },
                err = log_errors.recv(), if log_errors_open => match err {
                    Some(err) => self.ui.display_warning(&err.to_string()),
                    None => log_errors_open = false,
                },
                err = refresh_errors.recv(), if refresh_open => match err {
                    Some(err) if !progressed => break Err(self.translate(err)),
                    Some(err) => self.ui.display_warning(&err.to_string()),
                    None => refresh_open = false,
                },
            }
        };

        while let Ok(warning) = warnings.try_recv() {
            self.ui.display_warning(&warning);
        }

        canceller.cancel().await;
        while let Ok(message) = log_messages.try_recv() {
            self.ui.display_log_message(&message);
        }

        outcome
    }

    /// Print recent logs, or follow the log stream until it ends or the
    /// interrupt token fires
    pub async fn stream_logs(
        &self,
        app_name: &str,
        space_guid: &str,
        recent: bool,
    ) -> Result<(), CommandError> {
        if recent {
            let (messages, warnings) = self
                .actor
                .get_recent_logs_for_application_by_name_and_space(app_name, space_guid)
                .await
                .map_err(|e| self.translate(e))?;
            self.ui.display_warnings(&warnings);
            for message in &messages {
                self.ui.display_log_message(message);
            }
            return Ok(());
        }

        let TokenRefreshStream {
            errors: mut refresh_errors,
            canceller: refresher,
        } = self
            .actor
            .schedule_token_refresh(self.refresh_period)
            .map_err(|e| self.translate(e))?;

        let (logs, warnings) = match self
            .actor
            .get_streaming_logs_for_application_by_name_and_space(app_name, space_guid)
            .await
        {
            Ok(started) => started,
            Err(err) => {
                refresher.cancel().await;
                return Err(self.translate(err));
            }
        };
        self.ui.display_warnings(&warnings);

        let LogStream {
            messages: mut log_messages,
            errors: mut log_errors,
            canceller,
        } = logs;
        let (mut messages_open, mut log_errors_open, mut refresh_open) = (true, true, true);

        while messages_open || log_errors_open {
            tokio::select! {
                _ = self.interrupt.cancelled() => {
                    debug!(app = app_name, "log streaming interrupted");
                    break;
                }
                message = log_messages.recv(), if messages_open => match message {
                    Some(message) => self.ui.display_log_message(&message),
                    None => messages_open = false,
                },
                err = log_errors.recv(), if log_errors_open => match err {
                    Some(err) => self.ui.display_warning(&err.to_string()),
                    None => log_errors_open = false,
                },
                err = refresh_errors.recv(), if refresh_open => match err {
                    Some(err) => self.ui.display_warning(&err.to_string()),
                    None => refresh_open = false,
                },
            }
        }

        canceller.cancel().await;
        while let Ok(message) = log_messages.try_recv() {
            self.ui.display_log_message(&message);
        }
        refresher.cancel().await;
        Ok(())
    }
}
