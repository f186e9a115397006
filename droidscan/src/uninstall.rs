use crate::adb::{check_device_present, Adb};
use crate::markers::{is_uninstall_success, is_valid_package_name, uninstall_cmd};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallResult {
    pub success: bool,
    /// Everything the device said, stdout then stderr
    pub response: String,
}

/// Remove a package for the current user with `pm uninstall`.
///
/// A failed removal is reported through [UninstallResult::success], only
/// transport problems are errors.
pub fn uninstall(adb: &dyn Adb, package: &str) -> crate::Result<UninstallResult> {
    if !is_valid_package_name(package) {
        return Err(crate::Error::InvalidPackage(package.into()));
    }
    let output = adb.shell(&uninstall_cmd(package))?;
    check_device_present(&output)?;

    let mut response = output.stdout_utf8_lossy().trim().to_string();
    let stderr = output.stderr_utf8_lossy();
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        if !response.is_empty() {
            response.push('\n');
        }
        response.push_str(stderr);
    }

    let success = is_uninstall_success(&response);
    if success {
        log::info!("uninstalled {}", package);
    } else {
        log::warn!("failed to uninstall {}: {}", package, response);
    }
    Ok(UninstallResult { success, response })
}
