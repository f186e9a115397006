//! Connection to the adb server.
//!
//! Liveness is checked by asking the server for its version through
//! `adb_client`. Device commands still go through the `adb` binary.

use std::io;
use std::net::{SocketAddr, SocketAddrV4, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use adb_client::ADBServer;

use crate::adb::{Adb, DeviceHandle, ExecAdb};
use crate::config::AdbConfig;
use crate::Context;

pub const DEFAULT_ADB_HOST: &str = "127.0.0.1";
pub const DEFAULT_ADB_PORT: u16 = 5037;

/// How long to give a freshly spawned server before the retry probe
pub const DEFAULT_START_SERVER_WAIT: Duration = Duration::from_millis(1000);

/// Resolve the configured host to the IPv4 socket the server listens on
pub fn server_socket(host: &str, port: u16) -> crate::Result<SocketAddrV4> {
    let found = (host, port).to_socket_addrs()?.find_map(|it| match it {
        SocketAddr::V4(v4) => Some(v4),
        SocketAddr::V6(_) => None,
    });
    found.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no IPv4 address for {}", host),
        )
        .into()
    })
}

/// Lightweight liveness check: ask the server for its version
pub fn probe_server(addr: SocketAddrV4) -> crate::Result<String> {
    let mut server = ADBServer::new(addr);
    let version = server.version()?;
    Ok(version.to_string())
}

/// Probe the server, and if that fails start it and probe exactly once more.
fn ensure_server<P, S>(addr: &str, mut probe: P, start: S, wait: Duration) -> crate::Result<String>
where
    P: FnMut() -> crate::Result<String>,
    S: FnOnce() -> crate::Result<()>,
{
    match probe() {
        Ok(v) => return Ok(v),
        Err(e) => log::info!("adb server at {} not answering ({}), starting it", addr, e),
    }

    if let Err(e) = start() {
        log::warn!("failed to spawn the adb server: {}", e);
    }

    if !wait.is_zero() {
        thread::sleep(wait);
    }

    probe().map_err(|e| {
        log::debug!("adb server retry probe failed: {}", e);
        crate::Error::AdbUnreachable(addr.into())
    })
}

/// Where the devices for a scan come from
pub trait Transport: Send + Sync {
    /// Devices that are attached and ready for shell commands
    fn list_devices(&self) -> crate::Result<Vec<DeviceHandle>>;

    /// An [Adb] bound to the given device
    fn open_device(&self, device: &DeviceHandle) -> crate::Result<Box<dyn Adb>>;

    /// Serial requested through configuration, if any
    fn preferred_serial(&self) -> Option<String> {
        None
    }
}

/// A live adb server plus the `adb` invocation used to reach devices through
/// it.
///
/// There is no global connection: callers acquire one per scan and pass it
/// down explicitly. The server itself is shared with every other adb user on
/// the machine and is never shut down from here.
pub struct Connection {
    adb: ExecAdb,
    addr: String,
    server_version: String,
    preferred_serial: Option<String>,
}

impl Connection {
    /// Connect using the context's configuration
    pub fn connect(ctx: &dyn Context) -> crate::Result<Self> {
        let cfg = AdbConfig::from_ctx(ctx)?;
        let adb = ExecAdb::try_from_adb_config(ctx, &cfg)?;
        Self::connect_with(adb, &cfg)
    }

    pub fn connect_with(mut adb: ExecAdb, cfg: &AdbConfig) -> crate::Result<Self> {
        let addr = cfg.server_addr();
        let sock = server_socket(&cfg.host, cfg.port).map_err(|e| {
            log::debug!("resolving {}: {}", addr, e);
            crate::Error::AdbUnreachable(addr.clone())
        })?;
        let server_version = ensure_server(
            &addr,
            || probe_server(sock),
            || adb.start_server(),
            cfg.start_server_wait,
        )?;
        log::debug!("adb server at {} is version {}", addr, server_version);
        let preferred_serial = adb.take_serial();
        Ok(Self {
            adb,
            addr,
            server_version,
            preferred_serial,
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    /// The server level `adb` invocation, not bound to any device
    pub fn adb(&self) -> &ExecAdb {
        &self.adb
    }

    /// Apply a per command deadline to everything run through this connection
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.adb = self.adb.with_timeout(timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: crate::task::TaskCancelCheck) -> Self {
        self.adb = self.adb.with_cancel(cancel);
        self
    }
}

impl Transport for Connection {
    fn list_devices(&self) -> crate::Result<Vec<DeviceHandle>> {
        let devices = self.adb.get_connected_devices()?;
        Ok(devices
            .into_iter()
            .filter(|it| {
                if !it.is_attached() {
                    log::info!("skipping device {} in state {:?}", it.serial, it.state);
                }
                it.is_attached()
            })
            .collect())
    }

    fn open_device(&self, device: &DeviceHandle) -> crate::Result<Box<dyn Adb>> {
        Ok(Box::new(self.adb.clone().with_serial(device.serial.clone())))
    }

    fn preferred_serial(&self) -> Option<String> {
        self.preferred_serial.clone()
    }
}
