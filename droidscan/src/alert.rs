//! Hands off a notification when a scan turns up suspicious apps

use std::ffi::OsStr;
use std::path::PathBuf;

use crate::command::run_shell_with_input;
use crate::model::{PackageRecord, ScanReport};

pub const ALERT_SUBJECT: &str = "Android Security Alert: Suspicious Apps Detected";

const SUMMARY_HEADER: &str = "Suspicious Apps Detected:\n";

/// Env vars handed to alert commands
pub const ALERT_SUBJECT_ENV: &str = "DROIDSCAN_ALERT_SUBJECT";
pub const ALERT_CSV_ENV: &str = "DROIDSCAN_ALERT_CSV";

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub subject: String,
    /// Suspicious apps only, in report order
    pub suspicious: Vec<PackageRecord>,
    pub total_apps: usize,
    /// An exported copy of the report to attach, if one was written
    pub report_csv: Option<PathBuf>,
}

impl Alert {
    /// Build the alert for a report. There is nothing to alert on if no app
    /// is suspicious.
    pub fn from_report(report: &ScanReport) -> Option<Self> {
        if !report.has_suspicious() {
            return None;
        }
        Some(Self {
            subject: ALERT_SUBJECT.into(),
            suspicious: report.suspicious().cloned().collect(),
            total_apps: report.apps.len(),
            report_csv: None,
        })
    }

    pub fn with_report_csv(mut self, path: PathBuf) -> Self {
        self.report_csv = Some(path);
        self
    }

    /// Plain text body of the alert
    pub fn summary(&self) -> String {
        let mut lines = vec![String::from(SUMMARY_HEADER)];
        for app in &self.suspicious {
            let perms = if app.dangerous_permissions.is_empty() {
                String::from(crate::export::NO_PERMISSIONS)
            } else {
                app.dangerous_permissions
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<&str>>()
                    .join(", ")
            };
            lines.push(format!("- {}: {}", app.package, perms));
        }
        lines.join("\n")
    }
}

/// Somewhere an [Alert] can be delivered to
pub trait AlertSink {
    fn send(&self, alert: &Alert) -> crate::Result<()>;
}

/// Writes the alert to the log at warning level
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn send(&self, alert: &Alert) -> crate::Result<()> {
        log::warn!("{}\n{}", alert.subject, alert.summary());
        Ok(())
    }
}

/// Pipes the alert summary into a shell command, for example a mailer.
///
/// The subject and the path of the exported CSV (if any) are passed in the
/// `DROIDSCAN_ALERT_SUBJECT` and `DROIDSCAN_ALERT_CSV` env vars.
pub struct CommandAlertSink {
    cmdline: String,
}

impl CommandAlertSink {
    pub fn new<S: Into<String>>(cmdline: S) -> Self {
        Self {
            cmdline: cmdline.into(),
        }
    }

    pub fn cmdline(&self) -> &str {
        &self.cmdline
    }
}

impl AlertSink for CommandAlertSink {
    fn send(&self, alert: &Alert) -> crate::Result<()> {
        let mut envs: Vec<(&str, &OsStr)> = vec![(ALERT_SUBJECT_ENV, OsStr::new(&alert.subject))];
        if let Some(path) = &alert.report_csv {
            envs.push((ALERT_CSV_ENV, path.as_os_str()));
        }
        let output = run_shell_with_input(&self.cmdline, &envs, alert.summary().as_bytes())?;
        output.err_on_status()?;
        log::info!("alert handed off to `{}`", self.cmdline);
        Ok(())
    }
}

/// Send an alert for the report if anything in it is suspicious. Returns
/// whether an alert was sent.
pub fn send_alert(
    report: &ScanReport,
    report_csv: Option<PathBuf>,
    sink: &dyn AlertSink,
) -> crate::Result<bool> {
    let alert = match Alert::from_report(report) {
        Some(v) => v,
        None => {
            log::debug!("no suspicious apps, not sending an alert");
            return Ok(false);
        }
    };
    let alert = match report_csv {
        Some(path) => alert.with_report_csv(path),
        None => alert,
    };
    sink.send(&alert)?;
    Ok(true)
}
