pub mod fs;
pub use fs::*;

pub mod allowlist;
pub use allowlist::*;
