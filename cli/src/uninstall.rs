use clap::{self, Args};

use droidscan::scan::select_device;
use droidscan::uninstall::uninstall;
use droidscan::{DefaultContext, ScanOptions, Transport};

use crate::parsers::PackageValueParser;
use crate::printer::{color, Printer};
use crate::utils::{confirm, connect, task_canceller};

/// Remove a package from the device for the current user
#[derive(Args)]
pub struct Uninstall {
    /// Package to remove
    #[arg(value_parser = PackageValueParser)]
    package: String,

    /// Don't ask for confirmation
    #[arg(short = 'y', long, action = clap::ArgAction::SetTrue, default_value_t = false)]
    yes: bool,
}

impl Uninstall {
    pub fn run(&self) -> anyhow::Result<()> {
        let ctx = DefaultContext::new();

        if !self.yes && !confirm(&format!("Uninstall {}?", self.package), false)? {
            return Ok(());
        }

        let (_sigs, check) = task_canceller()?;
        let adb_cfg = droidscan::config::AdbConfig::from_ctx(&ctx)?;
        let opts = ScanOptions {
            command_timeout: adb_cfg.command_timeout,
            ..ScanOptions::default()
        }
        .with_cancel(check);
        let conn = connect(&ctx, &opts)?;

        let devices = conn.list_devices()?;
        let preferred = conn.preferred_serial();
        let device = select_device(&devices, preferred.as_deref())?;
        let adb = conn.open_device(device)?;

        let res = uninstall(adb.as_ref(), &self.package)?;
        let printer = Printer::new();
        if res.success {
            printer.println_colored(format!("removed {} from {}", self.package, device.serial), color::OK);
            Ok(())
        } else {
            printer.println_colored(&res.response, color::ERROR);
            anyhow::bail!("failed to uninstall {}", self.package)
        }
    }
}
