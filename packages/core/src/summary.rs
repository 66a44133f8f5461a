//! App summary rendering
//!
//! Shown after a successful restart.

use crate::actor::{ApplicationState, ApplicationSummary, ProcessInstance, ProcessSummary};
use crate::ui::Ui;
use chrono::{Local, Utc};

const INSTANCE_HEADERS: [&str; 7] = ["", "state", "since", "cpu", "memory", "disk", "details"];

/// Print name, requested state, routes and per-process details
pub fn display_app_summary<U: Ui + ?Sized>(ui: &U, summary: &ApplicationSummary) {
    ui.display_newline();
    ui.display_key_value_table(&[
        ("name:".to_string(), summary.name.clone()),
        (
            "requested state:".to_string(),
            requested_state(summary.state).to_string(),
        ),
        ("routes:".to_string(), summary.routes.join(", ")),
    ]);

    for process in &summary.processes {
        ui.display_newline();
        display_process(ui, process);
    }
}

fn display_process<U: Ui + ?Sized>(ui: &U, process: &ProcessSummary) {
    let mut rows = vec![
        ("type:".to_string(), process.process_type.clone()),
        (
            "instances:".to_string(),
            format!(
                "{}/{}",
                process.running_instances(),
                process.instances.len()
            ),
        ),
        (
            "memory usage:".to_string(),
            format!("{}M", process.memory_in_mb),
        ),
    ];
    if !process.command.is_empty() {
        rows.push(("start command:".to_string(), process.command.clone()));
    }
    ui.display_key_value_table(&rows);

    if process.running_instances() == 0 {
        ui.display_newline();
        ui.display_text("There are no running instances of this process.");
        return;
    }

    let rows: Vec<Vec<String>> = process.instances.iter().map(instance_row).collect();
    ui.display_table(&INSTANCE_HEADERS, &rows);
}

fn requested_state(state: ApplicationState) -> &'static str {
    match state {
        ApplicationState::Started => "started",
        ApplicationState::Stopped => "stopped",
    }
}

fn instance_row(instance: &ProcessInstance) -> Vec<String> {
    let since = chrono::Duration::from_std(instance.uptime)
        .ok()
        .and_then(|uptime| Utc::now().checked_sub_signed(uptime))
        .map(|started| {
            started
                .with_timezone(&Local)
                .format("%Y-%m-%dT%H:%M:%SZ")
                .to_string()
        })
        .unwrap_or_default();

    vec![
        format!("#{}", instance.index),
        instance.state.to_ascii_lowercase(),
        since,
        format!("{:.1}%", instance.cpu * 100.0),
        format!(
            "{} of {}",
            format_bytes(instance.memory_usage),
            format_bytes(instance.memory_quota)
        ),
        format!(
            "{} of {}",
            format_bytes(instance.disk_usage),
            format_bytes(instance.disk_quota)
        ),
        String::new(),
    ]
}

/// Human-readable size using binary units ("512K", "32M", "1G")
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [(&str, u64); 4] = [
        ("T", 1 << 40),
        ("G", 1 << 30),
        ("M", 1 << 20),
        ("K", 1 << 10),
    ];
    for (suffix, size) in UNITS {
        if bytes >= size {
            let value = bytes as f64 / size as f64;
            return if value.fract() == 0.0 {
                format!("{}{suffix}", value as u64)
            } else {
                format!("{value:.1}{suffix}")
            };
        }
    }
    format!("{bytes}B")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::BufferUi;
    use std::time::Duration;

    fn instance(index: u32, state: &str) -> ProcessInstance {
        ProcessInstance {
            index,
            state: state.to_string(),
            uptime: Duration::from_secs(60),
            cpu: 0.25,
            memory_usage: 12 * 1024 * 1024,
            memory_quota: 32 * 1024 * 1024,
            disk_usage: 10 * 1024 * 1024,
            disk_quota: 1024 * 1024 * 1024,
        }
    }

    fn summary(instances: Vec<ProcessInstance>) -> ApplicationSummary {
        ApplicationSummary {
            name: "some-app".to_string(),
            state: ApplicationState::Started,
            routes: vec![
                "route1.example.com".to_string(),
                "route2.example.com".to_string(),
            ],
            processes: vec![ProcessSummary {
                process_type: "web".to_string(),
                command: "bundle exec rackup".to_string(),
                memory_in_mb: 32,
                disk_in_mb: 1024,
                instances,
            }],
        }
    }

    #[test]
    fn shows_app_and_process_details() {
        let ui = BufferUi::new();
        display_app_summary(&ui, &summary(vec![instance(0, "RUNNING"), instance(1, "CRASHED")]));

        let out = ui.out();
        assert!(out.contains("name: some-app"));
        assert!(out.contains("requested state: started"));
        assert!(out.contains("routes: route1.example.com, route2.example.com"));
        assert!(out.contains("type: web"));
        assert!(out.contains("instances: 1/2"));
        assert!(out.contains("memory usage: 32M"));
        assert!(out.contains("start command: bundle exec rackup"));
        assert!(out.contains("#0   running"));
        assert!(out.contains("25.0%"));
        assert!(out.contains("12M of 32M"));
        assert!(out.contains("10M of 1G"));
    }

    #[test]
    fn no_running_instances_skips_table() {
        let ui = BufferUi::new();
        display_app_summary(&ui, &summary(vec![instance(0, "DOWN")]));

        let out = ui.out();
        assert!(out.contains("instances: 0/1"));
        assert!(out.contains("There are no running instances of this process."));
        assert!(!out.contains("since"));
    }

    #[test]
    fn byte_formatting() {
        assert_eq!(format_bytes(0), "0B");
        assert_eq!(format_bytes(512 * 1024), "512K");
        assert_eq!(format_bytes(32 * 1024 * 1024), "32M");
        assert_eq!(format_bytes(1536 * 1024 * 1024), "1.5G");
    }
}
