pub mod context;
pub use context::{Context, DefaultContext};

pub mod config;

pub mod errors;
pub use errors::{Error, Result};

pub mod adb;

pub mod command;
pub use command::run_cmd;

pub mod task;

pub mod transport;
pub use transport::{Connection, Transport};

pub mod markers;

pub mod model;
pub use model::{Device, PackageRecord, ScanReport, Status};

pub mod packages;
pub mod permissions;
pub mod classify;
pub mod device;

pub mod scan;
pub use scan::{ScanEvent, ScanOptions, Scanner};

pub mod export;
pub mod alert;
pub mod uninstall;

pub mod version;
pub use version::{Version, VERSION};

pub mod utils;

#[cfg(test)]
pub mod testing;
