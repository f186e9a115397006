use std::borrow::Cow;
use std::ffi::OsStr;
use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::Level::Debug;
use log::{debug, log_enabled};

use crate::task::TaskCancelCheck;

/// How often a limited command checks its deadline and cancellation flag
const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub struct CmdOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CmdOutput {
    /// Converts to a `Result` object that is `Ok` only if the [ExitStatus] is
    /// success.
    pub fn err_on_status(self) -> crate::Result<Self> {
        if self.status.success() {
            return Ok(self);
        }

        // Killed by a signal, there is no code to report
        let code = self.status.code().unwrap_or(-1);

        Err(crate::Error::CommandError(
            code,
            self.stderr_utf8_lossy().trim().to_string(),
        ))
    }

    #[inline]
    pub fn ok(&self) -> bool {
        self.status.success()
    }

    #[inline]
    pub fn stdout_utf8_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    #[inline]
    pub fn stderr_utf8_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }
}

impl From<Output> for CmdOutput {
    fn from(output: Output) -> Self {
        Self {
            status: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// Limits applied to a single command invocation
#[derive(Clone, Copy, Default)]
pub struct CmdLimits<'a> {
    pub timeout: Option<Duration>,
    pub cancel: Option<&'a TaskCancelCheck>,
}

impl<'a> CmdLimits<'a> {
    pub fn new(timeout: Option<Duration>, cancel: Option<&'a TaskCancelCheck>) -> Self {
        Self { timeout, cancel }
    }

    #[inline]
    pub fn is_unlimited(&self) -> bool {
        self.timeout.is_none() && self.cancel.is_none()
    }

    #[inline]
    fn was_cancelled(&self) -> bool {
        self.cancel.map_or(false, |it| it.was_cancelled())
    }
}

pub fn run_cmd<C, S>(cmd: C, args: &[S]) -> io::Result<CmdOutput>
where
    C: AsRef<OsStr>,
    S: AsRef<OsStr>,
{
    if log_enabled!(Debug) {
        log_cmd(&cmd, args);
    }
    Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map(|output| output.into())
}

/// Run a command, killing it if the deadline passes or the task is
/// cancelled while waiting on it.
pub fn run_cmd_limited<C, S>(cmd: C, args: &[S], limits: CmdLimits) -> crate::Result<CmdOutput>
where
    C: AsRef<OsStr>,
    S: AsRef<OsStr>,
{
    if limits.was_cancelled() {
        return Err(crate::Error::Cancelled);
    }

    if limits.is_unlimited() {
        return Ok(run_cmd(cmd, args)?);
    }

    if log_enabled!(Debug) {
        log_cmd(&cmd, args);
    }

    let mut child = Command::new(cmd)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .spawn()?;

    let out = drain(child.stdout.take());
    let err = drain(child.stderr.take());

    let started = Instant::now();

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }

        if limits.was_cancelled() {
            kill_child(&mut child);
            return Err(crate::Error::Cancelled);
        }

        if let Some(timeout) = limits.timeout {
            if started.elapsed() >= timeout {
                kill_child(&mut child);
                return Err(crate::Error::Timeout(timeout));
            }
        }

        thread::sleep(POLL_INTERVAL);
    };

    Ok(CmdOutput {
        status,
        stdout: join_drain(out)?,
        stderr: join_drain(err)?,
    })
}

/// Start a command and forget about it. Its output is discarded and it is
/// never waited on.
pub fn spawn_detached<C, S>(cmd: C, args: &[S]) -> io::Result<Child>
where
    C: AsRef<OsStr>,
    S: AsRef<OsStr>,
{
    if log_enabled!(Debug) {
        log_cmd(&cmd, args);
    }
    Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
}

/// Run a command with `input` written to its stdin and `envs` added to its
/// environment
pub fn run_cmd_with_input<C, S>(
    cmd: C,
    args: &[S],
    envs: &[(&str, &OsStr)],
    input: &[u8],
) -> io::Result<CmdOutput>
where
    C: AsRef<OsStr>,
    S: AsRef<OsStr>,
{
    if log_enabled!(Debug) {
        log_cmd(&cmd, args);
    }
    let mut child = Command::new(cmd)
        .args(args)
        .envs(envs.iter().copied())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let out = drain(child.stdout.take());
    let err = drain(child.stderr.take());

    if let Some(mut stdin) = child.stdin.take() {
        // A command that exits without reading its input is fine
        match stdin.write_all(input) {
            Err(e) if e.kind() != io::ErrorKind::BrokenPipe => return Err(e),
            _ => {}
        }
    }

    let status = child.wait()?;
    Ok(CmdOutput {
        status,
        stdout: join_drain(out)?,
        stderr: join_drain(err)?,
    })
}

/// Run a command line through the platform shell
pub fn run_shell_with_input(
    cmdline: &str,
    envs: &[(&str, &OsStr)],
    input: &[u8],
) -> io::Result<CmdOutput> {
    if cfg!(windows) {
        run_cmd_with_input("cmd", &["/C", cmdline], envs, input)
    } else {
        run_cmd_with_input("sh", &["-c", cmdline], envs, input)
    }
}

fn kill_child(child: &mut Child) {
    if let Err(e) = child.kill() {
        log::error!("failed to kill child: {}", e);
    }
    // Reap it so we don't leave a zombie around
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<io::Result<Vec<u8>>>> {
    let mut pipe = pipe?;
    Some(thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    }))
}

fn join_drain(handle: Option<JoinHandle<io::Result<Vec<u8>>>>) -> io::Result<Vec<u8>> {
    match handle {
        None => Ok(Vec::new()),
        Some(h) => h
            .join()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "pipe reader panicked"))?,
    }
}

pub fn log_cmd<C, S>(cmd: &C, args: &[S])
where
    C: AsRef<OsStr>,
    S: AsRef<OsStr>,
{
    let nargs = args.len();
    if nargs > 0 {
        let mut args_string = String::new();
        for (i, e) in args.iter().enumerate() {
            args_string.push_str(&e.as_ref().to_string_lossy());
            if i < nargs - 1 {
                args_string.push(' ');
            }
        }
        debug!(
            "Running command: `{} {}`",
            cmd.as_ref().to_string_lossy(),
            args_string
        );
    } else {
        debug!("Running command: `{}`", cmd.as_ref().to_string_lossy());
    }
}
