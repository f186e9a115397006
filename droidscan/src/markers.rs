//! Device command strings and the text heuristics used to read their output.
//!
//! The device shell only gives us text back, so every check that depends on
//! a magic string lives here as a named predicate.

use lazy_static::lazy_static;
use regex::Regex;

/// Lists every package along with its installer
pub const LIST_PACKAGES_CMD: &str = "pm list packages -i";
pub const MODEL_PROP_CMD: &str = "getprop ro.product.model";
pub const ANDROID_VERSION_PROP_CMD: &str = "getprop ro.build.version.release";
pub const BATTERY_CMD: &str = "dumpsys battery";

pub const PACKAGE_MARKER: &str = "package:";
pub const INSTALLER_MARKER: &str = " installer=";

pub const REQUESTED_PERMISSIONS_MARKER: &str = "requested permissions:";
pub const INSTALL_PERMISSIONS_MARKER: &str = "install permissions:";

pub const UNINSTALL_SUCCESS_MARKER: &str = "Success";

/// Installer value used when `pm` doesn't report one
pub const UNKNOWN_INSTALLER: &str = "unknown";

lazy_static! {
    static ref PACKAGE_NAME_RE: Regex =
        Regex::new(r"^[A-Za-z0-9_]+(\.[A-Za-z0-9_]+)*$").expect("valid package regex");
}

/// `dumpsys package <pkg>`
pub fn dumpsys_package_cmd(package: &str) -> String {
    format!("dumpsys package {}", package)
}

/// `pm uninstall <pkg>`
pub fn uninstall_cmd(package: &str) -> String {
    format!("pm uninstall {}", package)
}

#[inline]
pub fn is_package_line(line: &str) -> bool {
    line.contains(PACKAGE_MARKER)
}

#[inline]
pub fn is_requested_permissions_start(trimmed: &str) -> bool {
    trimmed == REQUESTED_PERMISSIONS_MARKER
}

#[inline]
pub fn is_install_permissions_start(trimmed: &str) -> bool {
    trimmed == INSTALL_PERMISSIONS_MARKER
}

#[inline]
pub fn is_uninstall_success(response: &str) -> bool {
    response.contains(UNINSTALL_SUCCESS_MARKER)
}

/// Whether adb's stderr says there is nothing attached
#[inline]
pub fn is_no_device_message(stderr: &str) -> bool {
    stderr.contains("no devices/emulators")
}

/// Package names are interpolated into shell commands, so only plain
/// Android package names are let through.
pub fn is_valid_package_name(package: &str) -> bool {
    PACKAGE_NAME_RE.is_match(package)
}
