use std::borrow::Cow;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Duration;

use toml::{Table, Value};

use crate::transport::{DEFAULT_ADB_HOST, DEFAULT_ADB_PORT, DEFAULT_START_SERVER_WAIT};
use crate::utils::{path_must_str, read_file};
use crate::Context;

#[derive(Debug)]
pub enum Error {
    InvalidType,
    MissingKey,
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::InvalidType => "InvalidType",
                Self::MissingKey => "MissingKey",
            }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub struct ConfigMap<'c> {
    path: &'c Path,
    name: Option<Cow<'c, str>>,
    table: &'c Table,
}

/// The raw `droidscan.toml` contents
#[derive(Clone)]
pub struct Config {
    path: PathBuf,
    base: Table,
}

impl Config {
    pub fn parse(source: &Path) -> crate::Result<Self> {
        let as_str = read_file(source)?;
        Self::parse_str(source, &as_str)
    }

    pub fn parse_str(source: &Path, content: &str) -> crate::Result<Self> {
        let path = PathBuf::from(source);

        let base: Table = match toml::from_str(content) {
            Ok(v) => v,
            Err(e) => return Err(crate::Error::new_cfg(source, &e)),
        };
        Ok(Self { base, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_map(&self) -> ConfigMap {
        ConfigMap {
            name: None,
            path: &self.path,
            table: &self.base,
        }
    }
}

impl<'c> ConfigMap<'c> {
    fn get_full_path<'a>(&'a self) -> Option<&'a str> {
        self.name.as_ref().map(|it| it.as_ref())
    }

    fn key_path<'a>(&self, key: &'a str) -> Cow<'a, str> {
        match self.get_full_path() {
            None => Cow::Borrowed(key),
            Some(v) => Cow::Owned(format!("{}.{}", v, key)),
        }
    }

    /// Helper to create a crate::Error for an invalid key
    pub fn invalid_key(&self, key: &str, expected: &str) -> crate::Error {
        let path = self.key_path(key);
        crate::Error::InvalidConfig(
            path_must_str(self.path).into(),
            format!(
                "invalid value for key: {} (expected type: {})",
                path, expected
            ),
        )
    }

    fn get(&self, key: &str) -> Option<&'c Value> {
        self.table.get(key)
    }

    pub fn maybe_get_int(&self, key: &str) -> Result<Option<i64>> {
        match self.get(key) {
            Some(v) => match v.as_integer() {
                Some(v) => Ok(Some(v)),
                None => Err(Error::InvalidType),
            },
            None => Ok(None),
        }
    }

    pub fn maybe_get_int_typecheck(&self, key: &str) -> crate::Result<Option<i64>> {
        self.maybe_get_int(key)
            .map_err(|_| self.invalid_key(key, "int"))
    }

    /// Like [maybe_get_int_typecheck] but also rejects negative values
    pub fn maybe_get_uint_typecheck(&self, key: &str) -> crate::Result<Option<u64>> {
        match self.maybe_get_int_typecheck(key)? {
            None => Ok(None),
            Some(v) => u64::try_from(v)
                .map(Some)
                .map_err(|_| self.invalid_key(key, "unsigned int")),
        }
    }

    pub fn maybe_get_str(&self, key: &str) -> Result<Option<&'c str>> {
        match self.get(key) {
            Some(v) => match v.as_str() {
                Some(v) => Ok(Some(v)),
                None => Err(Error::InvalidType),
            },
            None => Ok(None),
        }
    }

    pub fn maybe_get_str_typecheck(&self, key: &str) -> crate::Result<Option<&'c str>> {
        self.maybe_get_str(key)
            .map_err(|_| self.invalid_key(key, "string"))
    }

    pub fn maybe_get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            Some(v) => match v.as_bool() {
                Some(v) => Ok(Some(v)),
                None => Err(Error::InvalidType),
            },
            None => Ok(None),
        }
    }

    pub fn maybe_get_bool_typecheck(&self, key: &str) -> crate::Result<Option<bool>> {
        self.maybe_get_bool(key)
            .map_err(|_| self.invalid_key(key, "bool"))
    }

    pub fn maybe_get_map(&'c self, key: &'c str) -> Result<Option<ConfigMap<'c>>> {
        match self.get(key) {
            Some(v) => match v.as_table() {
                Some(table) => {
                    let name = match &self.get_full_path() {
                        Some(parents) => Cow::Owned(format!("{parents}.{key}")),
                        None => Cow::Borrowed(key),
                    };
                    Ok(Some(Self {
                        name: Some(name),
                        path: self.path,
                        table,
                    }))
                }
                None => Err(Error::InvalidType),
            },
            None => Ok(None),
        }
    }

    pub fn get_map(&'c self, key: &'c str) -> Result<ConfigMap<'c>> {
        self.maybe_get_map(key)?.ok_or(Error::MissingKey)
    }

    pub fn maybe_get_map_typecheck(&'c self, key: &'c str) -> crate::Result<Option<ConfigMap<'c>>> {
        self.maybe_get_map(key)
            .map_err(|_| self.invalid_key(key, "table"))
    }
}

/// The `[adb]` table
///
/// ```toml
/// [adb]
/// executable = "/opt/platform-tools/adb"
/// serial = "emulator-5554"
/// host = "127.0.0.1"
/// port = 5037
/// command-timeout = 30     # seconds
/// start-server-wait = 1000 # milliseconds
/// ```
///
/// `ANDROID_SERIAL` and `ANDROID_ADB_SERVER_PORT` take precedence over the
/// file, the same way they do for `adb` itself.
#[derive(Debug, Clone, PartialEq)]
pub struct AdbConfig {
    pub executable: Option<String>,
    pub serial: Option<String>,
    pub host: String,
    pub port: u16,
    pub command_timeout: Option<Duration>,
    pub start_server_wait: Duration,
}

impl Default for AdbConfig {
    fn default() -> Self {
        Self {
            executable: None,
            serial: None,
            host: DEFAULT_ADB_HOST.into(),
            port: DEFAULT_ADB_PORT,
            command_timeout: None,
            start_server_wait: DEFAULT_START_SERVER_WAIT,
        }
    }
}

impl AdbConfig {
    pub fn from_map(map: &ConfigMap) -> crate::Result<Self> {
        let mut cfg = Self::default();
        cfg.executable = map.maybe_get_str_typecheck("executable")?.map(String::from);
        cfg.serial = map.maybe_get_str_typecheck("serial")?.map(String::from);
        if let Some(host) = map.maybe_get_str_typecheck("host")? {
            cfg.host = host.into();
        }
        if let Some(port) = map.maybe_get_uint_typecheck("port")? {
            cfg.port = u16::try_from(port).map_err(|_| map.invalid_key("port", "port number"))?;
        }
        cfg.command_timeout = map
            .maybe_get_uint_typecheck("command-timeout")?
            .filter(|it| *it > 0)
            .map(Duration::from_secs);
        if let Some(wait) = map.maybe_get_uint_typecheck("start-server-wait")? {
            cfg.start_server_wait = Duration::from_millis(wait);
        }
        Ok(cfg)
    }

    /// Load the configuration from the context: config file first, then the
    /// environment on top of it.
    pub fn from_ctx(ctx: &dyn Context) -> crate::Result<Self> {
        let mut cfg = match ctx.get_config()? {
            Some(conf) => {
                let base = conf.get_map();
                match base.maybe_get_map_typecheck("adb")? {
                    Some(map) => Self::from_map(&map)?,
                    None => Self::default(),
                }
            }
            None => Self::default(),
        };

        if let Some(serial) = ctx.maybe_get_env("ANDROID_SERIAL") {
            if !serial.is_empty() {
                cfg.serial = Some(serial);
            }
        }

        if let Some(port) = ctx.maybe_get_env("ANDROID_ADB_SERVER_PORT") {
            cfg.port = port
                .parse::<u16>()
                .map_err(|e| crate::Error::InvalidEnv("ANDROID_ADB_SERVER_PORT".into(), e.to_string()))?;
        }

        Ok(cfg)
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// The `[scan]` table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanConfig {
    pub dedupe: bool,
    pub parallel: bool,
    pub alert_command: Option<String>,
}

impl ScanConfig {
    pub fn from_map(map: &ConfigMap) -> crate::Result<Self> {
        Ok(Self {
            dedupe: map.maybe_get_bool_typecheck("dedupe")?.unwrap_or(false),
            parallel: map.maybe_get_bool_typecheck("parallel")?.unwrap_or(false),
            alert_command: map
                .maybe_get_str_typecheck("alert-command")?
                .map(String::from),
        })
    }

    pub fn from_ctx(ctx: &dyn Context) -> crate::Result<Self> {
        let conf = match ctx.get_config()? {
            Some(v) => v,
            None => return Ok(Self::default()),
        };
        let base = conf.get_map();
        match base.maybe_get_map_typecheck("scan")? {
            Some(map) => Self::from_map(&map),
            None => Ok(Self::default()),
        }
    }
}
