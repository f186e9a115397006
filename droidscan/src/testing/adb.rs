use std::process::ExitStatus;

use mockall::mock;
use rstest::fixture;

use crate::adb::DeviceHandle;
use crate::command::CmdOutput;

mock! {
    pub Adb {

    }

    impl crate::adb::Adb for Adb {
        fn get_connected_devices(&self) -> crate::Result<Vec<DeviceHandle>>;
        fn shell(&self, shell_cmd: &str) -> crate::Result<CmdOutput>;
        fn start_server(&self) -> crate::Result<()>;
        fn serial(&self) -> Option<String>;
        fn run_command(&self, shell_cmd: &str) -> crate::Result<String>;
    }
}

mock! {
    pub Transport {

    }

    impl crate::transport::Transport for Transport {
        fn list_devices(&self) -> crate::Result<Vec<DeviceHandle>>;
        fn open_device(&self, device: &DeviceHandle) -> crate::Result<Box<dyn crate::adb::Adb>>;
        fn preferred_serial(&self) -> Option<String>;
    }
}

#[fixture]
pub fn mock_adb() -> MockAdb {
    MockAdb::new()
}

#[fixture]
pub fn mock_transport() -> MockTransport {
    MockTransport::new()
}

#[cfg(unix)]
fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(code << 8)
}

#[cfg(windows)]
fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    ExitStatus::from_raw(code as u32)
}

/// Fake output of a finished command
pub fn cmd_output(code: i32, stdout: &str, stderr: &str) -> CmdOutput {
    CmdOutput {
        status: exit_status(code),
        stdout: stdout.as_bytes().to_vec(),
        stderr: stderr.as_bytes().to_vec(),
    }
}
