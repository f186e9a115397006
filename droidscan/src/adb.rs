use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;

use crate::command::{run_cmd_limited, spawn_detached, CmdLimits, CmdOutput};
use crate::config::AdbConfig;
use crate::markers::is_no_device_message;
use crate::task::TaskCancelCheck;
use crate::Context;

lazy_static! {
    static ref DEVICE_NOT_FOUND_RE: Regex =
        Regex::new(r"device\s+'([^']+)'\s+not\s+found").expect("valid device regex");
}

/// The state column of `adb devices -l`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceState {
    Device,
    Offline,
    Unauthorized,
    Other(String),
}

impl From<&str> for DeviceState {
    fn from(value: &str) -> Self {
        match value {
            "device" => Self::Device,
            "offline" => Self::Offline,
            "unauthorized" => Self::Unauthorized,
            _ => Self::Other(value.into()),
        }
    }
}

/// One entry of `adb devices -l`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    pub serial: String,
    pub state: DeviceState,
    pub model: Option<String>,
    pub product: Option<String>,
}

impl DeviceHandle {
    pub fn new(serial: &str) -> Self {
        Self {
            serial: serial.into(),
            state: DeviceState::Device,
            model: None,
            product: None,
        }
    }

    /// Only devices in the `device` state accept shell commands
    #[inline]
    pub fn is_attached(&self) -> bool {
        self.state == DeviceState::Device
    }
}

/// Parse the output of `adb devices -l`
///
/// ```txt
/// List of devices attached
/// emulator-5554          device product:sdk_gphone64_x86_64 model:sdk_gphone64_x86_64 transport_id:1
/// R58M12ABCDE            unauthorized usb:1-1 transport_id:2
/// ```
pub fn parse_device_list(output: &str) -> Vec<DeviceHandle> {
    let mut devices = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("List of devices") || line.starts_with('*') {
            continue;
        }
        let mut split = line.split_ascii_whitespace();
        let (serial, state) = match (split.next(), split.next()) {
            (Some(serial), Some(state)) => (serial, state),
            _ => continue,
        };
        let mut handle = DeviceHandle {
            serial: serial.into(),
            state: DeviceState::from(state),
            model: None,
            product: None,
        };
        for prop in split {
            if let Some((key, value)) = prop.split_once(':') {
                match key {
                    "model" => handle.model = Some(value.into()),
                    "product" => handle.product = Some(value.into()),
                    _ => {}
                }
            }
        }
        devices.push(handle);
    }
    devices
}

/// Pulls the serial out of adb's "device 'X' not found" message
pub fn device_not_found_serial(stderr: &str) -> Option<String> {
    DEVICE_NOT_FOUND_RE
        .captures(stderr)
        .and_then(|caps| caps.get(1))
        .map(|m| String::from(m.as_str()))
}

/// The Adb trait just abstracts some `adb` commands
pub trait Adb: Send + Sync {
    /// Returns every device `adb devices -l` knows about, attached or not
    fn get_connected_devices(&self) -> crate::Result<Vec<DeviceHandle>>;

    /// Essentially the same as running `adb shell '...'`
    fn shell(&self, shell_cmd: &str) -> crate::Result<CmdOutput>;

    /// Same as `adb start-server`, but the server is left to come up on its
    /// own
    fn start_server(&self) -> crate::Result<()>;

    /// The serial this implementation is bound to, if any
    fn serial(&self) -> Option<String>;

    /// Run a shell command and return its stdout as text.
    ///
    /// A non zero exit status is a [crate::Error::CommandError], unless adb
    /// itself complained that the device went away.
    fn run_command(&self, shell_cmd: &str) -> crate::Result<String> {
        let output = self.shell(shell_cmd)?;
        check_device_present(&output)?;
        Ok(output.err_on_status()?.stdout_utf8_lossy().into_owned())
    }
}

/// Turn adb's own complaints about a missing device into typed errors
pub fn check_device_present(output: &CmdOutput) -> crate::Result<()> {
    if output.ok() {
        return Ok(());
    }
    let stderr = output.stderr_utf8_lossy();
    if is_no_device_message(&stderr) {
        return Err(crate::Error::NoAdbDevice);
    }
    if let Some(serial) = device_not_found_serial(&stderr) {
        return Err(crate::Error::AdbDeviceNotFound(serial));
    }
    Ok(())
}

impl<T: Adb + ?Sized> Adb for Box<T> {
    fn get_connected_devices(&self) -> crate::Result<Vec<DeviceHandle>> {
        self.as_ref().get_connected_devices()
    }

    fn shell(&self, shell_cmd: &str) -> crate::Result<CmdOutput> {
        self.as_ref().shell(shell_cmd)
    }

    fn start_server(&self) -> crate::Result<()> {
        self.as_ref().start_server()
    }

    fn serial(&self) -> Option<String> {
        self.as_ref().serial()
    }

    fn run_command(&self, shell_cmd: &str) -> crate::Result<String> {
        self.as_ref().run_command(shell_cmd)
    }
}

#[derive(Clone)]
/// An `Adb` implementation that just invokes the external `adb` command.
pub struct ExecAdb {
    bin: String,
    serial: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    timeout: Option<Duration>,
    cancel: Option<TaskCancelCheck>,
}

impl ExecAdb {
    /// Creates a new `ExecAdb` from the given context.
    ///
    /// The `[adb]` table of the config file is used if present, with
    /// `ANDROID_SERIAL` and `ANDROID_ADB_SERVER_PORT` from the environment
    /// layered on top.
    pub fn new(ctx: &dyn Context) -> crate::Result<Self> {
        let cfg = AdbConfig::from_ctx(ctx)?;
        Self::try_from_adb_config(ctx, &cfg)
    }

    pub fn try_from_adb_config(ctx: &dyn Context, cfg: &AdbConfig) -> crate::Result<Self> {
        let bin = match &cfg.executable {
            Some(v) => v.clone(),
            None => ctx.get_bin("adb")?,
        };
        Ok(Self::builder()
            .with_bin(bin)
            .with_host(&cfg.host)
            .with_port(cfg.port)
            .with_timeout(cfg.command_timeout)
            .maybe_with_serial(cfg.serial.clone())
            .build())
    }

    pub fn has_serial(&self) -> bool {
        self.serial.is_some()
    }

    pub fn with_serial(mut self, serial: String) -> Self {
        self.serial = Some(serial);
        self
    }

    /// Drop the bound serial, returning it
    pub fn take_serial(&mut self) -> Option<String> {
        self.serial.take()
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancel(mut self, cancel: TaskCancelCheck) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn builder() -> Builder {
        Builder::default()
    }

    #[inline]
    fn limits(&self) -> CmdLimits {
        CmdLimits::new(self.timeout, self.cancel.as_ref())
    }

    fn server_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(host) = &self.host {
            args.push("-H".into());
            args.push(host.clone());
        }
        if let Some(port) = self.port {
            args.push("-P".into());
            args.push(port.to_string());
        }
        args
    }

    /// Run an adb subcommand against the bound device
    fn device_cmd(&self, args: &[&str]) -> crate::Result<CmdOutput> {
        let mut full = self.server_args();
        if let Some(ref serial) = self.serial {
            full.push("-s".into());
            full.push(serial.clone());
        }
        full.extend(args.iter().map(|it| String::from(*it)));
        run_cmd_limited(&self.bin, &full, self.limits())
    }

    /// Run an adb subcommand that talks to the server rather than a device
    fn server_cmd(&self, args: &[&str]) -> crate::Result<CmdOutput> {
        let mut full = self.server_args();
        full.extend(args.iter().map(|it| String::from(*it)));
        run_cmd_limited(&self.bin, &full, self.limits())
    }
}

impl Default for ExecAdb {
    fn default() -> Self {
        Builder::default().build()
    }
}

/// Used to build an Adb implementation.
pub struct Builder {
    bin: String,
    serial: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    timeout: Option<Duration>,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            bin: "adb".into(),
            serial: None,
            host: None,
            port: None,
            timeout: None,
        }
    }
}

impl Builder {
    pub fn with_bin(mut self, bin: String) -> Self {
        self.bin = bin;
        self
    }

    pub fn with_serial(mut self, serial: String) -> Self {
        self.serial = Some(serial);
        self
    }

    pub fn maybe_with_serial(mut self, serial: Option<String>) -> Self {
        self.serial = serial;
        self
    }

    /// Like the port, the default host is left to adb
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = if host == crate::transport::DEFAULT_ADB_HOST {
            None
        } else {
            Some(host.into())
        };
        self
    }

    /// The default server port doesn't need to be passed to adb
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = if port == crate::transport::DEFAULT_ADB_PORT {
            None
        } else {
            Some(port)
        };
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Consume the builder and return an Adb implementation
    pub fn build(self) -> ExecAdb {
        ExecAdb {
            bin: self.bin,
            serial: self.serial,
            host: self.host,
            port: self.port,
            timeout: self.timeout,
            cancel: None,
        }
    }
}

impl Adb for ExecAdb {
    fn get_connected_devices(&self) -> crate::Result<Vec<DeviceHandle>> {
        let output = self.server_cmd(&["devices", "-l"])?.err_on_status()?;
        Ok(parse_device_list(&output.stdout_utf8_lossy()))
    }

    fn shell(&self, shell_cmd: &str) -> crate::Result<CmdOutput> {
        self.device_cmd(&["shell", shell_cmd])
    }

    fn start_server(&self) -> crate::Result<()> {
        let args = self.server_args();
        let mut full: Vec<&str> = args.iter().map(String::as_str).collect();
        full.push("start-server");
        spawn_detached(&self.bin, &full)?;
        Ok(())
    }

    fn serial(&self) -> Option<String> {
        self.serial.clone()
    }
}
