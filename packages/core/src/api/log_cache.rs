//! Log cache reads

use super::CloudClient;
use crate::actor::{ApplicationActor, LogActor, LogMessage, LogSenders, LogStream, Warnings};
use crate::error::ActorError;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Envelopes fetched for `--recent`
const RECENT_LOG_LIMIT: &str = "1000";
/// Seconds of history shown when a tail starts
const TAIL_LOOKBACK_SECS: i64 = 5;
const TAIL_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Deserialize)]
struct ReadResponse {
    envelopes: EnvelopeBatch,
}

#[derive(Debug, Default, Deserialize)]
struct EnvelopeBatch {
    #[serde(default)]
    batch: Vec<Envelope>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    /// Nanoseconds since the epoch, encoded as a string
    timestamp: serde_json::Value,
    #[serde(default)]
    instance_id: String,
    #[serde(default)]
    tags: HashMap<String, String>,
    log: Option<EnvelopeLog>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeLog {
    #[serde(default)]
    payload: String,
    #[serde(rename = "type", default = "default_log_type")]
    log_type: String,
}

fn default_log_type() -> String {
    "OUT".to_string()
}

impl Envelope {
    fn timestamp_nanos(&self) -> i64 {
        match &self.timestamp {
            serde_json::Value::String(s) => s.parse().unwrap_or_default(),
            serde_json::Value::Number(n) => n.as_i64().unwrap_or_default(),
            _ => 0,
        }
    }

    /// Log envelopes become messages; other envelope types are dropped
    fn into_message(self) -> Option<LogMessage> {
        let nanos = self.timestamp_nanos();
        let log = self.log?;
        let payload = STANDARD
            .decode(log.payload.as_bytes())
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or(log.payload);
        let source_type = self
            .tags
            .get("source_type")
            .cloned()
            .unwrap_or_default();
        Some(LogMessage::new(
            payload,
            log.log_type,
            DateTime::<Utc>::from_timestamp_nanos(nanos),
            source_type,
            self.instance_id,
        ))
    }
}

impl CloudClient {
    fn log_cache_url(&self) -> Result<String, ActorError> {
        self.config()
            .read(|c| c.log_cache_endpoint.clone())
            .ok_or_else(|| ActorError::Config("log cache endpoint unknown, log in again".to_string()))
    }

    /// Read log envelopes for `source_id`, oldest first
    async fn read_logs(
        &self,
        source_id: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<LogMessage>, ActorError> {
        let url = format!("{}/api/v1/read/{source_id}", self.log_cache_url()?);
        let mut query = query.to_vec();
        query.push(("envelope_types", "LOG"));
        let (response, _): (ReadResponse, Warnings) = self.get_json(&url, &query).await?;
        let mut messages: Vec<LogMessage> = response
            .envelopes
            .batch
            .into_iter()
            .filter_map(Envelope::into_message)
            .collect();
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }
}

/// Resume point of a tail
///
/// Reads are inclusive of `after`, so lines sharing the newest timestamp
/// are remembered and skipped when the next read returns them again.
#[derive(Debug)]
struct TailCursor {
    after: DateTime<Utc>,
    boundary: Vec<LogMessage>,
}

impl TailCursor {
    fn new(after: DateTime<Utc>) -> Self {
        Self {
            after,
            boundary: Vec::new(),
        }
    }

    fn start_time(&self) -> String {
        self.after.timestamp_nanos_opt().unwrap_or_default().to_string()
    }

    /// True when `message` was not shown yet
    fn admit(&mut self, message: &LogMessage) -> bool {
        if message.timestamp < self.after || self.boundary.contains(message) {
            return false;
        }
        if message.timestamp > self.after {
            self.after = message.timestamp;
            self.boundary.clear();
        }
        self.boundary.push(message.clone());
        true
    }
}

/// Poll the log cache for new envelopes until cancelled
async fn tail(client: CloudClient, source_id: String, senders: LogSenders) {
    let LogSenders {
        messages,
        errors,
        stop,
    } = senders;
    let mut cursor = TailCursor::new(Utc::now() - chrono::TimeDelta::seconds(TAIL_LOOKBACK_SECS));

    'poll: loop {
        let start_time = cursor.start_time();
        let query = [("start_time", start_time.as_str())];
        let read = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            read = client.read_logs(&source_id, &query) => read,
        };
        match read {
            Ok(batch) => {
                for message in batch {
                    if !cursor.admit(&message) {
                        continue;
                    }
                    tokio::select! {
                        biased;
                        _ = stop.cancelled() => break 'poll,
                        sent = messages.send(message) => if sent.is_err() { break 'poll },
                    }
                }
            }
            Err(err) => {
                debug!(error = %err, "log cache read failed");
                let _ = errors.try_send(err);
            }
        }

        tokio::select! {
            _ = stop.cancelled() => break,
            _ = tokio::time::sleep(TAIL_POLL_INTERVAL) => {}
        }
    }

    debug!(%source_id, "log tail stopped");
    drop(messages);
    drop(errors);
    stop.acknowledge();
}

#[async_trait]
impl LogActor for CloudClient {
    async fn get_streaming_logs_for_application_by_name_and_space(
        &self,
        app_name: &str,
        space_guid: &str,
    ) -> Result<(LogStream, Warnings), ActorError> {
        let (app, warnings) = self
            .get_application_by_name_and_space(app_name, space_guid)
            .await?;
        self.log_cache_url()?;

        let (senders, stream) = LogStream::channel();
        debug!(app = app_name, "starting log tail");
        tokio::spawn(tail(self.clone(), app.guid, senders));
        Ok((stream, warnings))
    }

    async fn get_recent_logs_for_application_by_name_and_space(
        &self,
        app_name: &str,
        space_guid: &str,
    ) -> Result<(Vec<LogMessage>, Warnings), ActorError> {
        let (app, warnings) = self
            .get_application_by_name_and_space(app_name, space_guid)
            .await?;
        let messages = self
            .read_logs(
                &app.guid,
                &[("descending", "true"), ("limit", RECENT_LOG_LIMIT)],
            )
            .await?;
        Ok((messages, warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_envelopes_become_messages() {
        let response: ReadResponse = serde_json::from_str(
            r#"{"envelopes":{"batch":[
                {"timestamp":"1581447006352020890","source_id":"app-guid","instance_id":"0",
                 "tags":{"source_type":"APP/PROC/WEB"},
                 "log":{"payload":"aGVsbG8gd29ybGQ=","type":"OUT"}},
                {"timestamp":"1581447006352020891","source_id":"app-guid","instance_id":"",
                 "tags":{"source_type":"STG"},
                 "log":{"payload":"U3RhZ2luZy4uLg==","type":"ERR"}},
                {"timestamp":"1581447006352020892","source_id":"app-guid",
                 "gauge":{"metrics":{}}}
            ]}}"#,
        )
        .unwrap();

        let messages: Vec<LogMessage> = response
            .envelopes
            .batch
            .into_iter()
            .filter_map(Envelope::into_message)
            .collect();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].message, "hello world");
        assert_eq!(messages[0].source_type, "APP/PROC/WEB");
        assert_eq!(messages[0].source_instance, "0");
        assert!(!messages[0].is_staging());
        assert_eq!(messages[1].message, "Staging...");
        assert!(messages[1].is_staging());
        assert!(messages[1].is_error());
        assert_eq!(
            messages[0].timestamp.timestamp_nanos_opt(),
            Some(1_581_447_006_352_020_890)
        );
    }

    #[test]
    fn numeric_timestamps_are_accepted() {
        let envelope: Envelope = serde_json::from_str(
            r#"{"timestamp":1000,"log":{"payload":"eA==","type":"OUT"}}"#,
        )
        .unwrap();
        assert_eq!(envelope.timestamp_nanos(), 1000);
    }

    fn line_at(nanos: i64, text: &str) -> LogMessage {
        LogMessage::new(
            text,
            "OUT",
            DateTime::<Utc>::from_timestamp_nanos(nanos),
            "APP/PROC/WEB",
            "0",
        )
    }

    #[test]
    fn tail_cursor_keeps_lines_sharing_a_timestamp() {
        let mut cursor = TailCursor::new(DateTime::<Utc>::from_timestamp_nanos(100));
        assert!(cursor.admit(&line_at(200, "first")));
        assert!(cursor.admit(&line_at(200, "second")));
        assert_eq!(cursor.start_time(), "200");

        // The next inclusive read returns both again plus a newcomer
        assert!(!cursor.admit(&line_at(200, "first")));
        assert!(!cursor.admit(&line_at(200, "second")));
        assert!(cursor.admit(&line_at(200, "third")));
        assert!(cursor.admit(&line_at(300, "fourth")));
        assert!(!cursor.admit(&line_at(250, "late")));
        assert_eq!(cursor.start_time(), "300");
    }

    #[tokio::test]
    async fn tail_stops_while_a_read_is_in_flight() {
        use crate::config::{Config, ConfigStore};
        use tokio::net::TcpListener;

        // Accepts connections but never answers
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = CloudClient::new(ConfigStore::in_memory(Config {
            log_cache_endpoint: Some(format!("http://{addr}")),
            access_token: Some("bearer some-token".to_string()),
            ..Config::default()
        }))
        .unwrap();
        let (senders, stream) = LogStream::channel();
        tokio::spawn(tail(client, "app-guid".to_string(), senders));
        // Let the first read reach the silent server
        tokio::time::sleep(Duration::from_millis(200)).await;

        tokio::time::timeout(Duration::from_secs(5), stream.canceller.cancel())
            .await
            .expect("tail should stop without waiting for the read");
        server.abort();
    }
}
