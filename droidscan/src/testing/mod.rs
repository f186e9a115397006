mod adb;
pub use adb::*;

mod context;
pub use context::*;
