use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::thread::JoinHandle;

use anyhow::Context as AnyhowContext;
use promptly::prompt_default;
use signal_hook::consts::TERM_SIGNALS;
use signal_hook::iterator::Handle;
use signal_hook::iterator::Signals;

use droidscan::config::AdbConfig;
use droidscan::task::{TaskCancelCheck, TaskCanceller};
use droidscan::{Connection, Context, ScanOptions};

/// Exit codes callers can script against
pub mod exit {
    pub const FAILURE: u8 = 1;
    pub const NO_DEVICE: u8 = 2;
    pub const TRANSPORT_UNAVAILABLE: u8 = 3;
    pub const TIMEOUT: u8 = 4;
}

/// Pick the exit code for an error by looking for a scanner error anywhere in
/// its chain
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    err
        .chain()
        .find_map(|it| it.downcast_ref::<droidscan::Error>())
        .map(|it| match it {
            droidscan::Error::NoAdbDevice | droidscan::Error::AdbDeviceNotFound(_) => {
                exit::NO_DEVICE
            }
            droidscan::Error::AdbUnreachable(_) => exit::TRANSPORT_UNAVAILABLE,
            droidscan::Error::Timeout(_) => exit::TIMEOUT,
            _ => exit::FAILURE,
        })
        .unwrap_or(exit::FAILURE)
}

/// Connect to the adb server with the scan's command limits applied
pub fn connect(ctx: &dyn Context, opts: &ScanOptions) -> anyhow::Result<Connection> {
    let conn = Connection::connect(ctx).with_context(|| {
        let addr = AdbConfig::from_ctx(ctx)
            .map(|it| it.server_addr())
            .unwrap_or_else(|_| String::from("the configured address"));
        format!("connecting to the adb server at {}", addr)
    })?;
    log::debug!(
        "connected to adb server {} (version {})",
        conn.addr(),
        conn.server_version()
    );
    Ok(opts.configure(conn))
}

/// Ask a yes/no question on the terminal
pub fn confirm(question: &str, default: bool) -> anyhow::Result<bool> {
    prompt_default(question, default).map_err(|e| anyhow::anyhow!("prompt failed: {}", e))
}

/// Either the given file or stdout
pub fn open_output(path: Option<&Path>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match path {
        Some(p) => {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(p)
                .with_context(|| format!("opening {} for writing", p.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(io::stdout()),
    })
}

pub struct HookedSignals {
    sig_handle: Handle,
    _join_handle: JoinHandle<()>,
}

impl Drop for HookedSignals {
    fn drop(&mut self) {
        if !self.sig_handle.is_closed() {
            self.sig_handle.close();
        }
    }
}

/// Cancel the task on the first termination signal, a second one falls back
/// to the default handler.
pub fn hook_to_signals(mut cancel: TaskCanceller) -> anyhow::Result<HookedSignals> {
    let mut sigs = Signals::new(TERM_SIGNALS)?;
    let sig_handle = sigs.handle();
    let _join_handle = std::thread::spawn(move || {
        let mut seen_exit = false;
        for sig in sigs.forever() {
            if seen_exit {
                _ = signal_hook::low_level::emulate_default_handler(sig);
            } else {
                log::info!("received signal {}, cancelling", sig);
                cancel.cancel();
                seen_exit = true;
            }
        }
    });

    Ok(HookedSignals {
        sig_handle,
        _join_handle,
    })
}

pub fn task_canceller() -> anyhow::Result<(HookedSignals, TaskCancelCheck)> {
    let (cancel, check) = TaskCanceller::new();
    Ok((hook_to_signals(cancel)?, check))
}
