use std::env;
use std::ops::DerefMut;
use std::path::PathBuf;
use std::sync::Mutex;

use blanket::blanket;
use directories::BaseDirs;
use once_cell::sync::OnceCell;
use which::{which, which_in};

use crate::config::Config;
use crate::Error;

/// Name of the config file looked up in the user config directory
pub const CONFIG_FILE_NAME: &str = "droidscan.toml";

#[derive(Clone)]
struct CachedBin {
    name: String,
    path: String,
}

fn wrapped_which(bin: &str) -> Option<PathBuf> {
    if let Ok(search_path) = env::var("DROIDSCAN_PATH") {
        let cwd = env::current_dir().ok()?;
        return which_in(bin, Some(&search_path), &cwd).ok();
    }
    which(bin).ok()
}

#[inline(always)]
fn find_program(prog: &str) -> Option<String> {
    wrapped_which(prog).map(|it| it.to_string_lossy().into())
}

/// Context is a trait for an object that can help standardize file locations,
/// find binaries, and lookup env vars.
///
/// Most methods on this trait have a default implementation that is perfectly
/// safe to leave unchanged.
#[blanket(derive(Ref, Box))]
pub trait Context: Send + Sync {
    fn maybe_get_env(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }

    fn maybe_get_bin(&self, bin: &str) -> Option<String> {
        find_program(bin)
    }

    fn has_bin(&self, bin: &str) -> bool {
        self.maybe_get_bin(bin).is_some()
    }

    fn get_bin(&self, bin: &str) -> crate::Result<String> {
        self.maybe_get_bin(bin)
            .ok_or_else(|| Error::MissingBin(bin.into()))
    }

    fn has_env(&self, key: &str) -> bool {
        self.maybe_get_env(key).is_some()
    }

    fn get_env(&self, key: &str) -> crate::Result<String> {
        self.maybe_get_env(key)
            .ok_or_else(|| Error::MissingEnv(key.into()))
    }

    /// `$DROIDSCAN_CONFIG` if set, otherwise `droidscan.toml` in the user
    /// config directory
    fn get_config_file(&self) -> crate::Result<PathBuf> {
        if let Some(path) = self.maybe_get_env("DROIDSCAN_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        self.get_user_config_dir()
            .map(|it| it.join(CONFIG_FILE_NAME))
    }

    /// The parsed config file, `None` if there isn't one
    fn get_config<'a>(&'a self) -> crate::Result<Option<&'a Config>>;

    fn get_user_local_dir(&self) -> crate::Result<PathBuf> {
        let bd = BaseDirs::new().ok_or(Error::NoBaseDirs)?;
        Ok(bd.data_local_dir().join("droidscan"))
    }

    fn get_user_config_dir(&self) -> crate::Result<PathBuf> {
        let bd = BaseDirs::new().ok_or(Error::NoBaseDirs)?;
        Ok(bd.config_dir().join("droidscan"))
    }

    fn get_log_dir(&self) -> crate::Result<PathBuf> {
        self.get_user_local_dir().map(|it| it.join("logs"))
    }
}

pub struct DefaultContext {
    bin_cache: Mutex<Vec<CachedBin>>,
    config: OnceCell<Option<Config>>,
}

impl Clone for DefaultContext {
    fn clone(&self) -> Self {
        let cache = match self.bin_cache.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        Self {
            bin_cache: Mutex::new(cache),
            config: self.config.clone(),
        }
    }
}

impl DefaultContext {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for DefaultContext {
    fn default() -> Self {
        Self {
            bin_cache: Mutex::new(Vec::new()),
            config: OnceCell::new(),
        }
    }
}

/// Shared by the [Context] implementations: parse the config file if it
/// exists.
pub(crate) fn load_config(ctx: &dyn Context) -> crate::Result<Option<Config>> {
    let path = ctx.get_config_file()?;
    if !path.exists() {
        log::debug!("no config file at {}", path.to_string_lossy());
        Ok(None)
    } else {
        log::debug!("using config file {}", path.to_string_lossy());
        Ok(Some(Config::parse(&path)?))
    }
}

impl Context for DefaultContext {
    fn get_config<'a>(&'a self) -> crate::Result<Option<&'a Config>> {
        let cfg = self.config.get_or_try_init(|| load_config(self))?;
        Ok(cfg.as_ref())
    }

    fn maybe_get_bin(&self, prog: &str) -> Option<String> {
        let mut cache_guard = match self.bin_cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let cache = cache_guard.deref_mut();
        if let Some(val) = cache.iter().find(|it| it.name == prog) {
            return Some(val.path.clone());
        }

        let found = find_program(prog)?;

        cache.push(CachedBin {
            name: prog.into(),
            path: found.clone(),
        });

        Some(found)
    }
}
