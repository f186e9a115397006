use std::fmt;

use clap::{self, Args};
use droidscan::config::AdbConfig;
use droidscan::transport::{probe_server, server_socket};
use droidscan::{Context, DefaultContext};

/// Make sure everything a scan needs is in place
#[derive(Args)]
pub struct RunCheck {}

enum Importance {
    Optional,
    Required,
}

enum Status {
    Missing,
    Exists(String),
}

struct Info {
    name: String,
    status: Status,
    importance: Importance,
}

fn check_bin(ctx: &dyn Context, bin: &str, importance: Importance) -> Info {
    let status = match ctx.maybe_get_bin(bin) {
        None => Status::Missing,
        Some(path) => Status::Exists(path),
    };

    Info {
        name: bin.into(),
        status,
        importance,
    }
}

fn check_env(ctx: &dyn Context, env: &str, importance: Importance) -> Info {
    let status = match ctx.maybe_get_env(env) {
        None => Status::Missing,
        Some(env) => Status::Exists(env),
    };

    Info {
        name: env.into(),
        status,
        importance,
    }
}

fn check_server(cfg: &AdbConfig) -> Info {
    let addr = cfg.server_addr();
    let status = match server_socket(&cfg.host, cfg.port).and_then(probe_server) {
        Ok(version) => Status::Exists(format!("version {}", version)),
        Err(e) => {
            log::debug!("probing {}: {}", addr, e);
            Status::Missing
        }
    };
    Info {
        name: format!("adb server at {}", addr),
        status,
        // `scan` starts the server itself if needed
        importance: Importance::Optional,
    }
}

#[cfg(feature = "emoji")]
mod status {
    pub const FAIL: &'static str = "💩";
    pub const OK: &'static str = "🚀";
    pub const MEH: &'static str = "😒";
}

#[cfg(not(feature = "emoji"))]
mod status {
    pub const FAIL: &'static str = "Fail";
    pub const OK: &'static str = "Ok";
    pub const MEH: &'static str = "Meh";
}

use status::*;

impl RunCheck {
    pub fn run(&self) -> anyhow::Result<()> {
        let ctx = DefaultContext::new();
        let cfg = AdbConfig::from_ctx(&ctx)?;

        let adb = cfg.executable.as_deref().unwrap_or("adb");
        let checks = vec![check_bin(&ctx, adb, Importance::Required)];

        println!("External programs:");
        #[cfg(feature = "emoji")]
        {
            println!("\n{} = Present", OK);
            println!("{} = Required and missing", FAIL);
            println!("{} = Optional and missing\n", MEH);
        }
        for c in checks.iter() {
            println!("{}", c);
        }

        println!("\nEnvironmental variables:\n");
        let optional_envs = &["ANDROID_SERIAL", "ANDROID_ADB_SERVER_PORT", "DROIDSCAN_CONFIG"];
        for it in optional_envs {
            println!("{}", check_env(&ctx, it, Importance::Optional));
        }

        println!("\nServer:\n");
        println!("{}", check_server(&cfg));

        Ok(())
    }
}

impl fmt::Display for Info {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.status {
            Status::Missing => {
                write!(
                    f,
                    "{}: {}",
                    match self.importance {
                        Importance::Optional => MEH,
                        Importance::Required => FAIL,
                    },
                    self.name
                )
            }
            Status::Exists(path) => {
                write!(f, "{}: {} ({})", OK, self.name, path)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_display() {
        let info = Info {
            name: "adb".into(),
            status: Status::Exists("/usr/bin/adb".into()),
            importance: Importance::Required,
        };
        assert_eq!(info.to_string(), format!("{}: adb (/usr/bin/adb)", OK));

        let info = Info {
            name: "ANDROID_SERIAL".into(),
            status: Status::Missing,
            importance: Importance::Optional,
        };
        assert_eq!(info.to_string(), format!("{}: ANDROID_SERIAL", MEH));
    }
}
