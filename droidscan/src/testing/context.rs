#![allow(unused)]
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::{env, fs};

use anyhow::Context as AnyhowContext;
use mockall::mock;
use once_cell::sync::OnceCell;
use rand::Rng;
use rstest::fixture;

use crate::config::Config;
use crate::context::load_config;
use crate::utils::ensure_dir_exists;
use crate::Context;

#[fixture]
pub fn tmp_context() -> TestContext {
    TestContext::default()
}

#[fixture]
pub fn mock_context() -> MockContext {
    MockContext::new()
}

/// A [Context] rooted in a fresh temporary directory that only sees the
/// env vars and binaries explicitly set on it.
pub struct TestContext {
    base_dir: PathBuf,
    env: HashMap<String, String>,
    bins: HashMap<String, String>,
    config: OnceCell<Option<Config>>,
}

impl TestContext {
    pub fn set_env<K: AsRef<str>, V: AsRef<str>>(&mut self, key: K, value: V) -> &mut Self {
        self.env.insert(key.as_ref().into(), value.as_ref().into());
        self
    }

    pub fn set_bin<K: AsRef<str>, V: AsRef<str>>(&mut self, key: K, bin: V) -> &mut Self {
        self.bins.insert(key.as_ref().into(), bin.as_ref().into());
        self
    }

    pub fn to_abs<P: AsRef<Path> + ?Sized>(&self, path: &P) -> PathBuf {
        self.base_dir.join(path)
    }

    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn get_temp_path(&self, suffix: Option<&str>) -> PathBuf {
        let mut rng = rand::thread_rng();
        let rand_name: u64 = rng.gen();
        let name = match suffix {
            Some(v) => format!("{}.{}", rand_name, v),
            None => rand_name.to_string(),
        };
        self.base_dir.join(name)
    }

    pub fn get_temp_dir(&self) -> PathBuf {
        self.get_temp_path(None)
    }

    pub fn new_tmp_file(&self, content: &str) -> anyhow::Result<PathBuf> {
        self.new_tmp_file_suffix(None, content)
    }

    pub fn new_tmp_file_suffix(
        &self,
        suffix: Option<&str>,
        content: &str,
    ) -> anyhow::Result<PathBuf> {
        let path = self.get_temp_path(suffix);
        fs::write(&path, content).with_context(|| "failed to write content to temp file")?;
        Ok(path)
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        let td = &self.base_dir;
        if td.exists() {
            fs::remove_dir_all(td).expect("failed to clear test dir");
        }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        let mut rng = rand::thread_rng();
        let rand_name: u64 = rng.gen();
        let td = env::temp_dir().join(format!("droidscan_test_base_{}", rand_name));

        if td.exists() {
            fs::remove_dir_all(&td).expect("failed to clear test dir");
        }

        ensure_dir_exists(&td).expect("failed to create default test dir");

        Self {
            base_dir: td,
            env: HashMap::new(),
            bins: HashMap::new(),
            config: OnceCell::new(),
        }
    }
}

impl Context for TestContext {
    fn maybe_get_env(&self, key: &str) -> Option<String> {
        self.env.get(key).map(String::from)
    }

    fn maybe_get_bin(&self, bin: &str) -> Option<String> {
        self.bins.get(bin).map(String::from)
    }

    fn get_user_config_dir(&self) -> crate::Result<PathBuf> {
        Ok(self.base_dir.join("config"))
    }

    fn get_user_local_dir(&self) -> crate::Result<PathBuf> {
        Ok(self.base_dir.join("local"))
    }

    fn get_config<'a>(&'a self) -> crate::Result<Option<&'a Config>> {
        let cfg = self.config.get_or_try_init(|| load_config(self))?;
        Ok(cfg.as_ref())
    }
}

mock! {
    pub Context {

    }

    impl crate::Context for Context {
        fn maybe_get_env(&self, key: &str) -> Option<String>;
        fn maybe_get_bin(&self, bin: &str) -> Option<String>;
        fn get_config<'a>(&'a self) -> crate::Result<Option<&'a Config>>;
    }
}
