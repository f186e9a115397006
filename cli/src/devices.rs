use clap::{self, Args};
use droidscan::adb::{Adb, DeviceState};
use droidscan::transport::Connection;
use droidscan::DefaultContext;

use crate::printer::{color, Printer};

/// List every device the adb server knows about
#[derive(Args)]
pub struct Devices {
    /// Only show devices that can be scanned
    #[arg(short, long, action = clap::ArgAction::SetTrue, default_value_t = false)]
    attached: bool,
}

impl Devices {
    pub fn run(&self) -> anyhow::Result<()> {
        let ctx = DefaultContext::new();
        let conn = Connection::connect(&ctx)?;
        let devices = conn.adb().get_connected_devices()?;
        let printer = Printer::new();

        let mut shown = 0;
        for dev in devices.iter().filter(|it| !self.attached || it.is_attached()) {
            let (state, col) = match &dev.state {
                DeviceState::Device => ("device", color::OK),
                DeviceState::Offline => ("offline", color::GREY),
                DeviceState::Unauthorized => ("unauthorized", color::INTERESTING),
                DeviceState::Other(s) => (s.as_str(), color::GREY),
            };
            printer.print(format!("{:<24}", dev.serial));
            printer.print_colored(format!("{:<14}", state), col);
            printer.println(dev.model.as_deref().unwrap_or(""));
            shown += 1;
        }

        if shown == 0 {
            printer.println_colored("no devices attached", color::INTERESTING);
        }
        Ok(())
    }
}
