use std::fmt::{self, Write};

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use chrono::Utc;
use tracing::warn;

use uptime_core::{MonitoredResource, ResourceStatus};

use crate::state::AppState;

/// OpenMetrics text builder. Writing into a `String` cannot fail.
#[derive(Default)]
struct Exposition {
    out: String,
}

impl Exposition {
    fn family(&mut self, name: &str, kind: &str, help: &str) {
        let _ = writeln!(self.out, "# TYPE {} {}", name, kind);
        let _ = writeln!(self.out, "# HELP {} {}", name, help);
    }

    fn sample(&mut self, name: &str, labels: &[(&str, &str)], value: impl fmt::Display) {
        self.out.push_str(name);
        if !labels.is_empty() {
            self.out.push('{');
            for (i, (key, val)) in labels.iter().enumerate() {
                if i > 0 {
                    self.out.push(',');
                }
                let _ = write!(self.out, "{}=\"{}\"", key, escape(val));
            }
            self.out.push('}');
        }
        let _ = writeln!(self.out, " {}", value);
    }

    fn finish(mut self) -> String {
        self.out.push_str("# EOF\n");
        self.out
    }
}

fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.engine.status().await;
    let resources = load_resources(&state).await;
    let mut m = Exposition::default();

    m.family(
        "uptime_monitor_active_timers",
        "gauge",
        "Number of live per-website check timers",
    );
    m.sample("uptime_monitor_active_timers", &[], status.active_timer_count);

    m.family(
        "uptime_monitor_tracked_resources",
        "gauge",
        "Number of websites in the monitoring registry",
    );
    m.sample(
        "uptime_monitor_tracked_resources",
        &[],
        status.tracked_resource_count,
    );

    m.family(
        "uptime_monitor_process_uptime_seconds",
        "gauge",
        "Time since the API server started",
    );
    let uptime = (Utc::now() - state.started_at).num_milliseconds() as f64 / 1000.0;
    m.sample("uptime_monitor_process_uptime_seconds", &[], format!("{:.3}", uptime));

    m.family(
        "uptime_monitor_website_status",
        "stateset",
        "Last observed status of each website",
    );
    for r in &resources {
        for s in ResourceStatus::ALL {
            m.sample(
                "uptime_monitor_website_status",
                &[
                    ("owner_id", r.owner_id.as_str()),
                    ("website_id", r.id.as_str()),
                    ("uptime_monitor_website_status", s.as_str()),
                ],
                u8::from(r.status == s),
            );
        }
    }

    m.family(
        "uptime_monitor_website_response_time_milliseconds",
        "gauge",
        "Latency of the last completed check",
    );
    for r in &resources {
        m.sample(
            "uptime_monitor_website_response_time_milliseconds",
            &[("owner_id", r.owner_id.as_str()), ("website_id", r.id.as_str())],
            r.response_time_ms,
        );
    }

    m.family(
        "uptime_monitor_website_checks",
        "counter",
        "Completed checks per website by outcome",
    );
    for r in &resources {
        for (outcome, count) in [("success", r.successful_checks), ("failure", r.failed_checks)] {
            m.sample(
                "uptime_monitor_website_checks_total",
                &[
                    ("owner_id", r.owner_id.as_str()),
                    ("website_id", r.id.as_str()),
                    ("outcome", outcome),
                ],
                count,
            );
        }
    }

    m.family(
        "uptime_monitor_website_uptime_ratio",
        "gauge",
        "Share of successful checks, 0 to 1",
    );
    for r in &resources {
        m.sample(
            "uptime_monitor_website_uptime_ratio",
            &[("owner_id", r.owner_id.as_str()), ("website_id", r.id.as_str())],
            format!("{:.4}", r.uptime_percentage() / 100.0),
        );
    }

    m.family(
        "uptime_monitor_website_last_check_timestamp_seconds",
        "gauge",
        "Unix timestamp of the last completed check",
    );
    for r in &resources {
        if let Some(t) = r.last_checked_at {
            let secs = t.timestamp() as f64 + (t.timestamp_subsec_millis() as f64 / 1000.0);
            m.sample(
                "uptime_monitor_website_last_check_timestamp_seconds",
                &[("owner_id", r.owner_id.as_str()), ("website_id", r.id.as_str())],
                format!("{:.3}", secs),
            );
        }
    }

    (
        [(
            header::CONTENT_TYPE,
            "application/openmetrics-text; version=1.0.0; charset=utf-8",
        )],
        m.finish(),
    )
}

async fn load_resources(state: &AppState) -> Vec<MonitoredResource> {
    let owners = match state.store.list_owners().await {
        Ok(owners) => owners,
        Err(e) => {
            warn!(error = %e, "Failed to list owners for metrics");
            return Vec::new();
        }
    };
    let mut resources = Vec::new();
    for owner in owners {
        match state.store.list_for_owner(&owner).await {
            Ok(mut owned) => resources.append(&mut owned),
            Err(e) => warn!(owner_id = %owner, error = %e, "Failed to list websites for metrics"),
        }
    }
    resources
}
