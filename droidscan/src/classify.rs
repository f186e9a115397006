use std::collections::BTreeSet;

use lazy_static::lazy_static;

use crate::model::Status;
use crate::utils::Allowlist;

/// Installer id of the Play Store, the only installer considered safe
pub const OFFICIAL_STORE_INSTALLER: &str = "com.android.vending";

pub const DANGEROUS_PERMISSIONS: &[&str] = &[
    "android.permission.READ_SMS",
    "android.permission.RECEIVE_SMS",
    "android.permission.SEND_SMS",
    "android.permission.READ_CONTACTS",
    "android.permission.WRITE_CONTACTS",
    "android.permission.RECORD_AUDIO",
    "android.permission.CAMERA",
    "android.permission.READ_CALL_LOG",
    "android.permission.WRITE_CALL_LOG",
    "android.permission.ACCESS_FINE_LOCATION",
    "android.permission.ACCESS_COARSE_LOCATION",
    "android.permission.READ_PHONE_STATE",
    "android.permission.CALL_PHONE",
    "android.permission.PROCESS_OUTGOING_CALLS",
    "android.permission.WRITE_EXTERNAL_STORAGE",
    "android.permission.READ_EXTERNAL_STORAGE",
];

lazy_static! {
    static ref DANGEROUS_PERMISSION_SET: Allowlist<String> =
        Allowlist::from(DANGEROUS_PERMISSIONS.iter().copied());
}

/// The process wide set of high risk permissions
pub fn dangerous_permission_set() -> &'static Allowlist<String> {
    &DANGEROUS_PERMISSION_SET
}

#[inline]
pub fn is_dangerous(permission: &str) -> bool {
    DANGEROUS_PERMISSION_SET.allows(permission)
}

/// Anything not installed by the official store is suspicious, including
/// packages with no known installer. The comparison is exact.
pub fn classify(installer: &str) -> Status {
    if installer == OFFICIAL_STORE_INSTALLER {
        Status::Safe
    } else {
        Status::Suspicious
    }
}

/// Keep the dangerous permissions out of a raw permission list
pub fn filter_dangerous<S: AsRef<str>>(raw: &[S]) -> BTreeSet<String> {
    DANGEROUS_PERMISSION_SET.retain_allowed(raw.iter().map(|it| it.as_ref()))
}
