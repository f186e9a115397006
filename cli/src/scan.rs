use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as AnyhowContext;
use clap::{self, Args, ValueEnum};
use itertools::Itertools;

use droidscan::alert::{send_alert, AlertSink, CommandAlertSink, LogAlertSink};
use droidscan::config::{AdbConfig, ScanConfig};
use droidscan::export::{write_csv, write_csv_file, write_json};
use droidscan::task::EventMonitor;
use droidscan::{DefaultContext, ScanEvent, ScanOptions, ScanReport, Scanner, Status};

use crate::parsers::TimeoutValueParser;
use crate::printer::{color, Printer};
use crate::utils::{connect, open_output, task_canceller};

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

/// Prints coarse progress to stderr so stdout only carries the report
struct ProgressMonitor {
    quiet: bool,
}

impl EventMonitor<ScanEvent> for ProgressMonitor {
    fn on_event(&self, evt: ScanEvent) {
        match evt {
            ScanEvent::PackageClassified {
                package,
                status,
                dangerous_permissions,
            } => {
                log::debug!(
                    "{} is {} ({} dangerous permissions)",
                    package,
                    status,
                    dangerous_permissions
                );
            }
            _ if self.quiet => {}
            ScanEvent::Connected { devices } => {
                eprintln!("{} device(s) attached", devices)
            }
            ScanEvent::DeviceSelected { serial } => eprintln!("scanning {}", serial),
            ScanEvent::PackagesListed(n) => eprintln!("classifying {} packages", n),
            ScanEvent::Finished { total, suspicious } => {
                eprintln!("done: {} packages, {} suspicious", total, suspicious)
            }
        }
    }
}

/// Scan the attached device for apps that didn't come from the Play Store
#[derive(Args)]
pub struct Scan {
    /// Report format written to stdout or `--out`
    #[arg(short = 'F', long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Write the report to this file instead of stdout
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Also export the report as CSV to this file
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Only keep the first occurrence of each package
    #[arg(long, action = clap::ArgAction::SetTrue, default_value_t = false)]
    dedupe: bool,

    /// Extract permissions in parallel
    #[arg(long, action = clap::ArgAction::SetTrue, default_value_t = false)]
    parallel: bool,

    /// Per command timeout in seconds, 0 disables it
    #[arg(short, long, value_parser = TimeoutValueParser)]
    timeout: Option<Duration>,

    /// Pipe the alert for suspicious apps into this shell command
    #[arg(long)]
    alert_cmd: Option<String>,

    /// Don't send an alert even if suspicious apps are found
    #[arg(long, action = clap::ArgAction::SetTrue, default_value_t = false, conflicts_with = "alert_cmd")]
    no_alert: bool,

    /// Don't print progress to stderr
    #[arg(short, long, action = clap::ArgAction::SetTrue, default_value_t = false)]
    quiet: bool,
}

impl Scan {
    fn get_opts(&self, scan_cfg: &ScanConfig, adb_cfg: &AdbConfig) -> ScanOptions {
        let mut opts = ScanOptions::from_config(scan_cfg, adb_cfg);
        opts.dedupe |= self.dedupe;
        opts.parallel |= self.parallel;
        if let Some(timeout) = self.timeout {
            opts.command_timeout = Some(timeout).filter(|it| !it.is_zero());
        }
        opts
    }

    fn alert_sink(&self, scan_cfg: &ScanConfig) -> Option<Box<dyn AlertSink>> {
        if self.no_alert {
            return None;
        }
        let cmd = self.alert_cmd.as_ref().or(scan_cfg.alert_command.as_ref());
        let sink: Box<dyn AlertSink> = match cmd {
            Some(cmdline) => Box::new(CommandAlertSink::new(cmdline.as_str())),
            None => Box::new(LogAlertSink),
        };
        Some(sink)
    }

    pub fn run(&self) -> anyhow::Result<()> {
        let ctx = DefaultContext::new();
        let scan_cfg = ScanConfig::from_ctx(&ctx)?;
        let adb_cfg = AdbConfig::from_ctx(&ctx)?;

        let (_sigs, check) = task_canceller()?;
        let opts = self.get_opts(&scan_cfg, &adb_cfg).with_cancel(check);

        let conn = connect(&ctx, &opts)?;
        let scanner = Scanner::new(opts).with_monitor(Box::new(ProgressMonitor { quiet: self.quiet }));
        let report = scanner.scan(&conn)?;

        let dupes = report.duplicate_packages();
        if !dupes.is_empty() {
            log::warn!("device listed some packages more than once: {}", dupes.iter().join(", "));
        }

        self.write_report(&report)?;

        if let Some(path) = &self.csv {
            write_csv_file(&report, path)
                .with_context(|| format!("writing CSV report to {}", path.display()))?;
        }

        if let Some(sink) = self.alert_sink(&scan_cfg) {
            // The report is already out, a failed alert shouldn't fail the scan
            if let Err(e) = send_alert(&report, self.csv.clone(), sink.as_ref()) {
                log::error!("failed to send alert: {}", e);
                eprintln!("failed to send alert: {}", e);
            }
        }

        Ok(())
    }

    fn write_report(&self, report: &ScanReport) -> anyhow::Result<()> {
        if self.format == OutputFormat::Text && self.out.is_none() {
            print_text_report(report);
            return Ok(());
        }

        let mut out = open_output(self.out.as_deref())?;
        match self.format {
            OutputFormat::Json => {
                write_json(report, &mut out)?;
                writeln!(out)?;
            }
            OutputFormat::Csv => write_csv(report, &mut out)?,
            OutputFormat::Text => write_text_report(report, &mut out)?,
        }
        out.flush()?;
        if let Some(p) = &self.out {
            log::info!("wrote report to {}", p.display());
        }
        Ok(())
    }
}

fn print_text_report(report: &ScanReport) {
    let printer = Printer::new();
    let dev = &report.device;

    printer.println_bold(format!("{} ({})", dev.model, dev.serial));
    printer.println(format!("Android {}", dev.android_version));
    printer.print_divider(60);

    for app in &report.apps {
        match app.status {
            Status::Safe => printer.print_colored(format!("{:<11}", app.status), color::OK),
            Status::Suspicious => {
                printer.print_colored(format!("{:<11}", app.status), color::SUSPICIOUS)
            }
        }
        printer.print(format!("{} ", app.package));
        printer.println_colored(format!("[{}]", app.installer), color::GREY);
        for perm in &app.dangerous_permissions {
            printer.println_colored(format!("           {}", perm), color::INTERESTING);
        }
    }

    printer.print_divider(60);
    printer.println(format!(
        "{} packages, {} suspicious",
        report.apps.len(),
        report.suspicious_count()
    ));
}

/// Uncolored version of the text report for files
fn write_text_report<W: Write + ?Sized>(report: &ScanReport, out: &mut W) -> anyhow::Result<()> {
    let dev = &report.device;
    writeln!(out, "{} ({})", dev.model, dev.serial)?;
    writeln!(out, "Android {}", dev.android_version)?;
    for app in &report.apps {
        writeln!(
            out,
            "{:<11}{} [{}] {}",
            app.status,
            app.package,
            app.installer,
            app.permissions_display()
        )?;
    }
    writeln!(
        out,
        "{} packages, {} suspicious",
        report.apps.len(),
        report.suspicious_count()
    )?;
    Ok(())
}
