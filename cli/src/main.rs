use std::borrow::Cow;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as AnyhowContext;
use clap::{Parser, Subcommand};
use flexi_logger::{FileSpec, LevelFilter, LogSpecification, Logger, LoggerHandle, WriteMode};

use droidscan::{Context, DefaultContext};

mod parsers;
mod printer;
mod utils;

mod check;
use check::RunCheck;

mod devices;
use devices::Devices;

mod export;
use export::Export;

mod scan;
use scan::Scan;

mod uninstall;
use uninstall::Uninstall;

const SIMPLE_VERSION_STRING: &'static str =
    include!(concat!(env!("OUT_DIR"), "/simple_version_string"));
const VERSION_STRING: &'static str = include!(concat!(env!("OUT_DIR"), "/version_string"));

#[derive(Parser)]
#[command(name = "droidscan")]
#[command(version(SIMPLE_VERSION_STRING))]
#[command(long_version(VERSION_STRING))]
struct Cli {
    /// `-e`, `--log-stderr`: Flag value, when enabled will cause logs to be output to `stderr`
    /// instead of a log file. Disabled by default (logs go to a file by default)
    #[arg(short = 'e', long, help = "Log to stderr instead of a file", action = clap::ArgAction::SetTrue, default_value_t = false)]
    log_stderr: bool,

    /// `-f`, `--log-file`: Path to desired log output file location. Optional, defaults to
    /// a `log` file in the user's local data directory
    #[arg(short = 'f', long, help = "Send log output to the given file")]
    log_file: Option<PathBuf>,

    /// `-s`, `--log-spec`: Debug options for [flexi_logger](https://docs.rs/flexi_logger/latest/flexi_logger/struct.LogSpecification.html)
    #[arg(short = 's', long, help = "Log spec for flexi_logger")]
    log_spec: Option<String>,

    /// `-l`, `--log-level`: Set the desired log verbosity. Defaults to 0, all values are listed
    /// below:
    ///
    /// | Value | Log Level |
    /// | ----- | --------- |
    /// | **0** | **Warn** |
    /// | 1 | Info |
    /// | 2 | Debug |
    /// | 3 | Trace |
    #[arg(
        short = 'l',
        long,
        help = "Set the log level, 0 = warn, 1 = info, etc",
        long_help = None,
        default_value_t = 0
    )]
    log_level: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display the full version string and exit
    #[command()]
    Version,

    /// List the devices known to the adb server
    #[command()]
    Devices(Devices),

    /// Scan a device for apps installed outside of the Play Store
    ///
    /// Exits with 2 if no usable device is attached, 3 if the adb server
    /// can't be reached and 4 if a device command timed out.
    #[command()]
    Scan(Scan),

    /// Uninstall a package from the device
    #[command()]
    Uninstall(Uninstall),

    /// Convert a saved JSON report to CSV
    #[command()]
    Export(Export),

    /// Check to see if you are able to use `droidscan`
    #[command()]
    Check(RunCheck),
}

impl Cli {
    fn configure_loggers(&self, ctx: &DefaultContext) -> anyhow::Result<LoggerHandle> {
        let log_spec = match &self.log_spec {
            Some(s) => {
                LogSpecification::parse(s).with_context(|| format!("parsing log spec {}", s))?
            }
            None => {
                if self.log_level > 0 {
                    let lvl = if self.log_level == 1 {
                        LevelFilter::Info
                    } else if self.log_level == 2 {
                        LevelFilter::Debug
                    } else {
                        LevelFilter::Trace
                    };
                    LogSpecification::builder()
                        .module("droidscan", lvl)
                        .build()
                } else {
                    LogSpecification::env().with_context(|| "getting log spec from env")?
                }
            }
        };

        let mut logger = Logger::with(log_spec);

        if !self.log_stderr {
            let path = match &self.log_file {
                Some(v) => {
                    if v.is_absolute() {
                        Some(Cow::Borrowed(v))
                    } else {
                        let full_path = std::env::current_dir()?.join(v);
                        Some(Cow::Owned(full_path))
                    }
                }
                None => ctx
                    .get_log_dir()
                    .and_then(|dir| {
                        droidscan::utils::ensure_dir_exists(&dir)?;
                        Ok(dir.join("log"))
                    })
                    .map(Cow::Owned)
                    .ok(),
            };

            if let Some(p) = &path {
                logger = logger
                    .log_to_file(
                        FileSpec::try_from(p.as_ref()).with_context(|| "creating filespec")?,
                    )
                    .append()
                    .write_mode(WriteMode::BufferAndFlush);
            }
        }

        Ok(logger.start().with_context(|| "starting logger")?)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Commands::Version = &cli.command {
        println!("{}", VERSION_STRING);
        return ExitCode::SUCCESS;
    }

    let ctx = DefaultContext::default();

    let log_handle = match cli.configure_loggers(&ctx) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Error: {:?}", e);
            return ExitCode::from(utils::exit::FAILURE);
        }
    };

    let res = match cli.command {
        Commands::Devices(c) => c.run(),
        Commands::Scan(c) => c.run(),
        Commands::Uninstall(c) => c.run(),
        Commands::Export(c) => c.run(),
        Commands::Check(c) => c.run(),

        Commands::Version => Ok(()),
    };

    log_handle.flush();
    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:?}", e);
            eprintln!("Error: {:?}", e);
            ExitCode::from(utils::exit_code_for(&e))
        }
    }
}
