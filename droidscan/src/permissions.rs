//! Reads the `requested permissions:` block out of `dumpsys package <pkg>`.
//!
//! The relevant part of the output looks like:
//!
//! ```txt
//!     requested permissions:
//!       android.permission.INTERNET
//!       android.permission.CAMERA
//!     install permissions:
//!       android.permission.INTERNET: granted=true
//! ```

use crate::adb::Adb;
use crate::markers::{
    dumpsys_package_cmd, is_install_permissions_start, is_requested_permissions_start,
    is_valid_package_name,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// Looking for the start marker
    Searching,
    /// Inside the requested permissions block
    Capturing,
    /// Block is over, nothing else is read
    Done,
}

/// Line driven parser for the requested permissions block
pub struct PermissionBlockParser {
    state: BlockState,
    permissions: Vec<String>,
}

impl Default for PermissionBlockParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PermissionBlockParser {
    pub fn new() -> Self {
        Self {
            state: BlockState::Searching,
            permissions: Vec::new(),
        }
    }

    pub fn state(&self) -> BlockState {
        self.state
    }

    /// Feed one line of output and return the state after it
    pub fn feed(&mut self, line: &str) -> BlockState {
        let trimmed = line.trim();
        self.state = match self.state {
            BlockState::Searching => {
                if is_requested_permissions_start(trimmed) {
                    BlockState::Capturing
                } else {
                    BlockState::Searching
                }
            }
            BlockState::Capturing => {
                if trimmed.is_empty() || is_install_permissions_start(trimmed) {
                    BlockState::Done
                } else {
                    self.permissions.push(trimmed.into());
                    BlockState::Capturing
                }
            }
            BlockState::Done => BlockState::Done,
        };
        self.state
    }

    pub fn finish(self) -> Vec<String> {
        self.permissions
    }
}

/// Parse the raw permission names out of `dumpsys package` output. No start
/// marker simply means no permissions.
pub fn parse_requested_permissions(output: &str) -> Vec<String> {
    let mut parser = PermissionBlockParser::new();
    for line in output.lines() {
        if parser.feed(line) == BlockState::Done {
            break;
        }
    }
    parser.finish()
}

/// Get the raw, unfiltered requested permissions for a package
pub fn extract_permissions(adb: &dyn Adb, package: &str) -> crate::Result<Vec<String>> {
    if !is_valid_package_name(package) {
        return Err(crate::Error::InvalidPackage(package.into()));
    }
    let output = adb.run_command(&dumpsys_package_cmd(package))?;
    Ok(parse_requested_permissions(&output))
}
