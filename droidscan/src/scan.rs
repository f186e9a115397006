//! Turns a device into a [ScanReport].
//!
//! A scan picks one attached device, captures its identity, lists its
//! packages and classifies each one by installer. Only suspicious packages
//! have their permissions inspected. The report keeps the order the device
//! listed packages in, even when permissions are extracted in parallel.
//!
//! Problems with a single package (a failing `dumpsys`, say) are logged and
//! give that package an empty permission set. Anything that means the device
//! or server is gone, a timeout, or a cancellation aborts the scan with no
//! report.

use std::collections::BTreeSet;
use std::time::Duration;

use itertools::Itertools;
use rayon::prelude::*;

use crate::adb::{Adb, DeviceHandle};
use crate::classify::{classify, filter_dangerous};
use crate::config::{AdbConfig, ScanConfig};
use crate::device::read_device_info;
use crate::model::{PackageEntry, PackageRecord, ScanReport, Status};
use crate::packages::list_packages;
use crate::permissions::extract_permissions;
use crate::task::{EventMonitor, NoopMonitor, TaskCancelCheck};
use crate::transport::{Connection, Transport};

/// Progress reported while a scan runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// The device list was read, `devices` is how many are attached
    Connected { devices: usize },
    DeviceSelected { serial: String },
    PackagesListed(usize),
    PackageClassified {
        package: String,
        status: Status,
        dangerous_permissions: usize,
    },
    Finished { total: usize, suspicious: usize },
}

#[derive(Clone, Default)]
pub struct ScanOptions {
    /// Keep only the first occurrence of each package id
    pub dedupe: bool,
    /// Extract permissions on the rayon pool
    pub parallel: bool,
    /// Deadline for each device command
    pub command_timeout: Option<Duration>,
    pub cancel: Option<TaskCancelCheck>,
}

impl ScanOptions {
    pub fn from_config(scan: &ScanConfig, adb: &AdbConfig) -> Self {
        Self {
            dedupe: scan.dedupe,
            parallel: scan.parallel,
            command_timeout: adb.command_timeout,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: TaskCancelCheck) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Apply the command limits to a connection
    pub fn configure(&self, conn: Connection) -> Connection {
        let conn = conn.with_timeout(self.command_timeout);
        match &self.cancel {
            Some(cancel) => conn.with_cancel(cancel.clone()),
            None => conn,
        }
    }
}

pub struct Scanner {
    options: ScanOptions,
    monitor: Box<dyn EventMonitor<ScanEvent>>,
}

impl Scanner {
    pub fn new(options: ScanOptions) -> Self {
        Self {
            options,
            monitor: Box::new(NoopMonitor::new()),
        }
    }

    pub fn with_monitor(mut self, monitor: Box<dyn EventMonitor<ScanEvent>>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    fn check_cancel(&self) -> crate::Result<()> {
        match &self.options.cancel {
            Some(cancel) => cancel.check(crate::Error::Cancelled),
            None => Ok(()),
        }
    }

    /// Run a full scan against the first (or configured) device
    pub fn scan(&self, transport: &dyn Transport) -> crate::Result<ScanReport> {
        self.check_cancel()?;

        let devices = transport.list_devices()?;
        self.monitor.on_event(ScanEvent::Connected {
            devices: devices.len(),
        });

        let preferred = transport.preferred_serial();
        let handle = select_device(&devices, preferred.as_deref())?;
        log::info!("scanning device {}", handle.serial);
        self.monitor.on_event(ScanEvent::DeviceSelected {
            serial: handle.serial.clone(),
        });

        let adb = transport.open_device(handle)?;
        let adb = adb.as_ref();

        let device = read_device_info(adb, &handle.serial)?;

        self.check_cancel()?;
        let mut entries = list_packages(adb)?;
        if self.options.dedupe {
            entries = dedupe_entries(entries);
        }
        self.monitor
            .on_event(ScanEvent::PackagesListed(entries.len()));

        let apps = if self.options.parallel {
            entries
                .par_iter()
                .map(|it| self.inspect(adb, it))
                .collect::<crate::Result<Vec<PackageRecord>>>()?
        } else {
            entries
                .iter()
                .map(|it| self.inspect(adb, it))
                .collect::<crate::Result<Vec<PackageRecord>>>()?
        };

        let report = ScanReport { device, apps };
        self.monitor.on_event(ScanEvent::Finished {
            total: report.apps.len(),
            suspicious: report.suspicious_count(),
        });
        Ok(report)
    }

    fn inspect(&self, adb: &dyn Adb, entry: &PackageEntry) -> crate::Result<PackageRecord> {
        self.check_cancel()?;

        let status = classify(&entry.installer);
        let dangerous_permissions = if status.is_suspicious() {
            self.dangerous_permissions(adb, &entry.package)?
        } else {
            BTreeSet::new()
        };

        self.monitor.on_event(ScanEvent::PackageClassified {
            package: entry.package.clone(),
            status,
            dangerous_permissions: dangerous_permissions.len(),
        });

        Ok(PackageRecord {
            package: entry.package.clone(),
            installer: entry.installer.clone(),
            status,
            dangerous_permissions,
        })
    }

    fn dangerous_permissions(&self, adb: &dyn Adb, package: &str) -> crate::Result<BTreeSet<String>> {
        match extract_permissions(adb, package) {
            Ok(raw) => Ok(filter_dangerous(&raw)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                log::warn!("failed to get permissions for {}: {}", package, e);
                Ok(BTreeSet::new())
            }
        }
    }
}

/// Pick the device to scan: the configured serial if there is one, else the
/// first attached device.
pub fn select_device<'d>(
    devices: &'d [DeviceHandle],
    preferred: Option<&str>,
) -> crate::Result<&'d DeviceHandle> {
    let attached = devices.iter().filter(|it| it.is_attached()).collect::<Vec<&DeviceHandle>>();

    if let Some(serial) = preferred {
        return attached
            .into_iter()
            .find(|it| it.serial == serial)
            .ok_or_else(|| crate::Error::AdbDeviceNotFound(serial.into()));
    }

    let first = attached.first().copied().ok_or(crate::Error::NoAdbDevice)?;
    if attached.len() > 1 {
        log::warn!(
            "{} devices attached, scanning {} (set ANDROID_SERIAL to pick another)",
            attached.len(),
            first.serial
        );
    }
    Ok(first)
}

fn dedupe_entries(entries: Vec<PackageEntry>) -> Vec<PackageEntry> {
    let before = entries.len();
    let deduped = entries
        .into_iter()
        .unique_by(|it| it.package.clone())
        .collect::<Vec<PackageEntry>>();
    if deduped.len() != before {
        log::debug!("dropped {} duplicate packages", before - deduped.len());
    }
    deduped
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::adb::DeviceState;
    use crate::task::{ChannelEventMonitor, TaskCanceller};
    use crate::testing::{mock_adb, mock_transport, MockAdb, MockTransport};
    use mockall::predicate::eq;
    use rstest::*;

    const PACKAGES: &str = "package:com.a installer=com.android.vending
package:com.b installer=evil.store
garbage
";

    const DUMPSYS_B: &str = "    requested permissions:
      android.permission.INTERNET
      android.permission.READ_SMS
      android.permission.CAMERA
    install permissions:
      android.permission.INTERNET: granted=true
";

    fn expect_identity(adb: &mut MockAdb) {
        adb.expect_run_command()
            .with(eq("getprop ro.product.model"))
            .returning(|_| Ok("Pixel 7\n".into()));
        adb.expect_run_command()
            .with(eq("getprop ro.build.version.release"))
            .returning(|_| Ok("14\n".into()));
        adb.expect_run_command()
            .with(eq("dumpsys battery"))
            .returning(|_| Ok("level: 80\n".into()));
    }

    fn expect_packages<S: Into<String>>(adb: &mut MockAdb, out: S) {
        let out = out.into();
        adb.expect_run_command()
            .with(eq("pm list packages -i"))
            .times(1)
            .returning(move |_| Ok(out.clone()));
    }

    fn with_device(transport: &mut MockTransport, serial: &'static str, adb: MockAdb) {
        transport
            .expect_list_devices()
            .returning(move || Ok(vec![DeviceHandle::new(serial)]));
        transport.expect_preferred_serial().returning(|| None);
        transport
            .expect_open_device()
            .times(1)
            .return_once(move |_| Ok(Box::new(adb)));
    }

    fn run(transport: &MockTransport, options: ScanOptions) -> crate::Result<ScanReport> {
        Scanner::new(options).scan(transport)
    }

    #[rstest]
    fn test_scan(mut mock_adb: MockAdb, mut mock_transport: MockTransport) {
        expect_identity(&mut mock_adb);
        expect_packages(&mut mock_adb, PACKAGES);
        mock_adb
            .expect_run_command()
            .with(eq("dumpsys package com.a"))
            .never();
        mock_adb
            .expect_run_command()
            .with(eq("dumpsys package com.b"))
            .times(1)
            .returning(|_| Ok(DUMPSYS_B.into()));
        with_device(&mut mock_transport, "2A1", mock_adb);

        let report = run(&mock_transport, ScanOptions::default()).unwrap();

        assert_eq!(report.device.model, "Pixel 7");
        assert_eq!(report.device.serial, "2A1");
        assert_eq!(report.device.android_version, "14");
        assert_eq!(report.device.battery_info, "level: 80");

        assert_eq!(report.apps.len(), 2);
        let a = &report.apps[0];
        assert_eq!(a.package, "com.a");
        assert_eq!(a.installer, "com.android.vending");
        assert_eq!(a.status, Status::Safe);
        assert!(a.dangerous_permissions.is_empty());

        let b = &report.apps[1];
        assert_eq!(b.package, "com.b");
        assert_eq!(b.installer, "evil.store");
        assert_eq!(b.status, Status::Suspicious);
        assert_eq!(
            b.dangerous_permissions.iter().map(String::as_str).collect::<Vec<&str>>(),
            vec!["android.permission.CAMERA", "android.permission.READ_SMS"]
        );
    }

    #[rstest]
    fn test_scan_no_devices(mut mock_transport: MockTransport) {
        mock_transport.expect_list_devices().returning(|| Ok(Vec::new()));
        mock_transport.expect_preferred_serial().returning(|| None);
        mock_transport.expect_open_device().never();
        assert!(matches!(
            run(&mock_transport, ScanOptions::default()),
            Err(crate::Error::NoAdbDevice)
        ));
    }

    #[rstest]
    fn test_scan_preferred_serial_missing(mut mock_transport: MockTransport) {
        mock_transport
            .expect_list_devices()
            .returning(|| Ok(vec![DeviceHandle::new("emulator-5554")]));
        mock_transport
            .expect_preferred_serial()
            .returning(|| Some("R58M".into()));
        assert!(matches!(
            run(&mock_transport, ScanOptions::default()),
            Err(crate::Error::AdbDeviceNotFound(serial)) if serial == "R58M"
        ));
    }

    #[rstest]
    fn test_scan_recovers_package_failure(mut mock_adb: MockAdb, mut mock_transport: MockTransport) {
        expect_identity(&mut mock_adb);
        expect_packages(
            &mut mock_adb,
            "package:com.b installer=evil.store\npackage:com.c\n",
        );
        mock_adb
            .expect_run_command()
            .with(eq("dumpsys package com.b"))
            .returning(|_| Err(crate::Error::CommandError(255, "error: closed".into())));
        mock_adb
            .expect_run_command()
            .with(eq("dumpsys package com.c"))
            .returning(|_| Ok(DUMPSYS_B.into()));
        with_device(&mut mock_transport, "2A1", mock_adb);

        let report = run(&mock_transport, ScanOptions::default()).unwrap();
        assert_eq!(report.apps.len(), 2);
        assert!(report.apps[0].dangerous_permissions.is_empty());
        assert_eq!(report.apps[0].status, Status::Suspicious);
        assert_eq!(report.apps[1].installer, "unknown");
        assert_eq!(report.apps[1].dangerous_permissions.len(), 2);
    }

    #[rstest]
    fn test_scan_timeout_aborts(mut mock_adb: MockAdb, mut mock_transport: MockTransport) {
        expect_identity(&mut mock_adb);
        expect_packages(&mut mock_adb, PACKAGES);
        mock_adb
            .expect_run_command()
            .with(eq("dumpsys package com.b"))
            .returning(|_| Err(crate::Error::Timeout(Duration::from_secs(5))));
        with_device(&mut mock_transport, "2A1", mock_adb);

        assert!(matches!(
            run(&mock_transport, ScanOptions::default()),
            Err(crate::Error::Timeout(_))
        ));
    }

    #[rstest]
    fn test_scan_listing_failure_aborts(mut mock_adb: MockAdb, mut mock_transport: MockTransport) {
        expect_identity(&mut mock_adb);
        mock_adb
            .expect_run_command()
            .with(eq("pm list packages -i"))
            .returning(|_| Err(crate::Error::CommandError(1, "pm died".into())));
        with_device(&mut mock_transport, "2A1", mock_adb);

        assert!(matches!(
            run(&mock_transport, ScanOptions::default()),
            Err(crate::Error::CommandError(1, _))
        ));
    }

    #[rstest]
    fn test_scan_cancelled(mut mock_transport: MockTransport) {
        let (mut canceller, check) = TaskCanceller::new();
        canceller.cancel();
        mock_transport.expect_list_devices().never();
        let opts = ScanOptions::default().with_cancel(check);
        assert!(matches!(
            run(&mock_transport, opts),
            Err(crate::Error::Cancelled)
        ));
    }

    #[rstest]
    fn test_scan_duplicates(mut mock_adb: MockAdb, mut mock_transport: MockTransport) {
        expect_identity(&mut mock_adb);
        expect_packages(
            &mut mock_adb,
            "package:com.a installer=com.android.vending\npackage:com.a installer=com.android.vending\n",
        );
        with_device(&mut mock_transport, "2A1", mock_adb);

        let report = run(&mock_transport, ScanOptions::default()).unwrap();
        assert_eq!(report.apps.len(), 2);
        assert_eq!(report.duplicate_packages(), vec!["com.a"]);
    }

    #[rstest]
    fn test_scan_dedupe(mut mock_adb: MockAdb, mut mock_transport: MockTransport) {
        expect_identity(&mut mock_adb);
        expect_packages(
            &mut mock_adb,
            "package:com.a installer=com.android.vending\npackage:com.z installer=com.android.vending\npackage:com.a installer=evil.store\n",
        );
        with_device(&mut mock_transport, "2A1", mock_adb);

        let opts = ScanOptions {
            dedupe: true,
            ..Default::default()
        };
        let report = run(&mock_transport, opts).unwrap();
        let pkgs = report.apps.iter().map(|it| it.package.as_str()).collect::<Vec<&str>>();
        assert_eq!(pkgs, vec!["com.a", "com.z"]);
        assert_eq!(report.apps[0].status, Status::Safe);
    }

    #[rstest]
    fn test_scan_parallel_keeps_order(mut mock_adb: MockAdb, mut mock_transport: MockTransport) {
        let listing = (0..20)
            .map(|i| format!("package:com.p{} installer=evil.store\n", i))
            .collect::<String>();

        expect_identity(&mut mock_adb);
        expect_packages(&mut mock_adb, listing);
        mock_adb
            .expect_run_command()
            .withf(|cmd: &str| cmd.starts_with("dumpsys package com.p"))
            .times(20)
            .returning(|_| Ok(DUMPSYS_B.into()));
        with_device(&mut mock_transport, "2A1", mock_adb);

        let opts = ScanOptions {
            parallel: true,
            ..Default::default()
        };
        let report = run(&mock_transport, opts).unwrap();
        let expected = (0..20).map(|i| format!("com.p{}", i)).collect::<Vec<String>>();
        let got = report.apps.iter().map(|it| it.package.clone()).collect::<Vec<String>>();
        assert_eq!(got, expected);
        assert!(report.apps.iter().all(|it| it.dangerous_permissions.len() == 2));
    }

    #[rstest]
    fn test_scan_events(mut mock_adb: MockAdb, mut mock_transport: MockTransport) {
        expect_identity(&mut mock_adb);
        expect_packages(&mut mock_adb, "package:com.a installer=com.android.vending\n");
        with_device(&mut mock_transport, "2A1", mock_adb);

        let (mon, rx) = ChannelEventMonitor::create();
        Scanner::new(ScanOptions::default())
            .with_monitor(Box::new(mon))
            .scan(&mock_transport)
            .unwrap();

        let events = rx.try_iter().collect::<Vec<ScanEvent>>();
        assert_eq!(
            events,
            vec![
                ScanEvent::Connected { devices: 1 },
                ScanEvent::DeviceSelected {
                    serial: "2A1".into()
                },
                ScanEvent::PackagesListed(1),
                ScanEvent::PackageClassified {
                    package: "com.a".into(),
                    status: Status::Safe,
                    dangerous_permissions: 0,
                },
                ScanEvent::Finished {
                    total: 1,
                    suspicious: 0
                },
            ]
        );
    }

    #[rstest]
    fn test_scan_events_not_drained(mut mock_adb: MockAdb, mut mock_transport: MockTransport) {
        let listing = (0..30)
            .map(|i| format!("package:com.app{} installer=com.android.vending\n", i))
            .collect::<String>();
        expect_identity(&mut mock_adb);
        expect_packages(&mut mock_adb, listing);
        with_device(&mut mock_transport, "2A1", mock_adb);

        // Nothing reads the channel until the scan is over
        let (mon, rx) = ChannelEventMonitor::create();
        let report = Scanner::new(ScanOptions::default())
            .with_monitor(Box::new(mon))
            .scan(&mock_transport)
            .unwrap();

        assert_eq!(report.apps.len(), 30);
        assert_eq!(rx.try_iter().count(), 34);
    }

    #[test]
    fn test_select_device() {
        let mut offline = DeviceHandle::new("off");
        offline.state = DeviceState::Offline;
        let devices = vec![offline, DeviceHandle::new("a"), DeviceHandle::new("b")];

        assert_eq!(select_device(&devices, None).unwrap().serial, "a");
        assert_eq!(select_device(&devices, Some("b")).unwrap().serial, "b");
        assert!(matches!(
            select_device(&devices, Some("off")),
            Err(crate::Error::AdbDeviceNotFound(_))
        ));
        assert!(matches!(
            select_device(&[], None),
            Err(crate::Error::NoAdbDevice)
        ));
    }
}
