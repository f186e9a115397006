use crate::adb::Adb;
use crate::markers::{ANDROID_VERSION_PROP_CMD, BATTERY_CMD, MODEL_PROP_CMD};
use crate::model::Device;

/// Run an identity command, degrading anything but a fatal error to an
/// empty string.
fn read_value(adb: &dyn Adb, cmd: &str) -> crate::Result<String> {
    match adb.run_command(cmd) {
        Ok(v) => Ok(v.trim().into()),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            log::warn!("failed to read `{}` from the device: {}", cmd, e);
            Ok(String::new())
        }
    }
}

/// Capture the identity of the device `adb` is bound to
pub fn read_device_info(adb: &dyn Adb, serial: &str) -> crate::Result<Device> {
    Ok(Device {
        model: read_value(adb, MODEL_PROP_CMD)?,
        serial: serial.into(),
        android_version: read_value(adb, ANDROID_VERSION_PROP_CMD)?,
        battery_info: read_value(adb, BATTERY_CMD)?,
    })
}
