//! Child processes attached to a pseudo-terminal.
//!
//! Firmware consoles only emit their interactive prompts when talking to a
//! terminal device, so the child gets the slave side of a PTY as its
//! controlling terminal and stdio. The master side is non-blocking and
//! registered with tokio, and is exposed through `AsyncRead`/`AsyncWrite`.

use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, OwnedFd};
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use log::{debug, warn};
use nix::fcntl::{FcntlArg, OFlag, fcntl};
use nix::pty::{Winsize, openpty};
use nix::sys::termios::{LocalFlags, SetArg, tcgetattr, tcsetattr};
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::process::{Child, Command};

use crate::error::SpawnError;

/// Configuration for PTY process behavior.
#[derive(Debug, Clone)]
pub struct PtyConfig {
    /// Terminal width.
    pub terminal_width: u16,

    /// Terminal height.
    pub terminal_height: u16,

    /// Whether the terminal echoes input back to the master.
    pub echo: bool,

    /// How long `close` waits for the child to exit on its own before
    /// killing it.
    pub close_grace: Duration,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            terminal_width: 80,
            terminal_height: 24,
            echo: false,
            close_grace: Duration::from_secs(2),
        }
    }
}

/// A child process running on the slave side of a pseudo-terminal.
pub struct PtyProcess {
    /// The spawned child.
    child: Child,

    /// Non-blocking PTY master; `None` once closed.
    master: Option<AsyncFd<File>>,

    /// Exit status, once reaped.
    status: Option<ExitStatus>,

    /// Program name, for diagnostics.
    program: String,

    close_grace: Duration,
}

impl PtyProcess {
    /// Spawn `argv` on a fresh pseudo-terminal.
    ///
    /// Fails with [`SpawnError`] if the argument vector is empty, the PTY
    /// cannot be allocated, or the executable cannot be started. On failure
    /// both PTY descriptors are closed before returning.
    pub fn spawn<S: AsRef<OsStr>>(argv: &[S], config: &PtyConfig) -> Result<Self, SpawnError> {
        let (program, args) = argv.split_first().ok_or(SpawnError::EmptyCommand)?;
        let program_name = program.as_ref().to_string_lossy().into_owned();

        let winsize = Winsize {
            ws_row: config.terminal_height,
            ws_col: config.terminal_width,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        let pty = openpty(&winsize, None)?;

        if !config.echo {
            let mut termios = tcgetattr(&pty.slave)?;
            termios.local_flags.remove(LocalFlags::ECHO);
            tcsetattr(&pty.slave, SetArg::TCSANOW, &termios)?;
        }

        let exec_error = |source| SpawnError::Exec {
            program: program_name.clone(),
            source,
        };

        let slave = File::from(pty.slave);
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::from(slave.try_clone().map_err(exec_error)?))
            .stdout(Stdio::from(slave.try_clone().map_err(exec_error)?))
            .stderr(Stdio::from(slave))
            .kill_on_drop(true);

        // SAFETY: only async-signal-safe calls (setsid, ioctl) run between
        // fork and exec.
        unsafe {
            command.pre_exec(|| {
                nix::unistd::setsid()?;
                if nix::libc::ioctl(0, nix::libc::TIOCSCTTY as _, 0) < 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let child = command.spawn().map_err(exec_error)?;
        // The parent's copies of the slave must be closed, otherwise the
        // master never reports end-of-stream when the child exits.
        drop(command);

        set_nonblocking(&pty.master)?;
        let master = AsyncFd::new(File::from(pty.master)).map_err(exec_error)?;

        debug!(
            "Spawned '{}' (pid {:?}) on a {}x{} PTY",
            program_name,
            child.id(),
            config.terminal_width,
            config.terminal_height
        );

        Ok(Self {
            child,
            master: Some(master),
            status: None,
            program: program_name,
            close_grace: config.close_grace,
        })
    }

    /// Process id of the child, while it has not been reaped.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Check if the PTY master is still open.
    pub fn is_open(&self) -> bool {
        self.master.is_some()
    }

    /// Terminate and reap the child, and release the PTY.
    ///
    /// Waits up to the configured grace period for the child to exit on its
    /// own, then kills it. Calling this again, or after the child already
    /// exited, returns the recorded status.
    pub async fn close(&mut self) -> io::Result<ExitStatus> {
        self.master.take();

        if let Some(status) = self.status {
            return Ok(status);
        }

        let status = match self.child.try_wait()? {
            Some(status) => status,
            None => match tokio::time::timeout(self.close_grace, self.child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    warn!(
                        "'{}' still running after {:?}, killing it",
                        self.program, self.close_grace
                    );
                    self.child.kill().await?;
                    self.child.wait().await?
                }
            },
        };

        debug!("'{}' exited with {}", self.program, status);
        self.status = Some(status);
        Ok(status)
    }

    fn master(&self) -> io::Result<&AsyncFd<File>> {
        self.master
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "PTY closed"))
    }
}

fn set_nonblocking(fd: &OwnedFd) -> nix::Result<()> {
    let flags = OFlag::from_bits_truncate(fcntl(fd.as_raw_fd(), FcntlArg::F_GETFL)?);
    fcntl(fd.as_raw_fd(), FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))?;
    Ok(())
}

/// Linux reports `EIO` on the master once every slave descriptor is closed.
fn is_hangup(err: &io::Error) -> bool {
    err.raw_os_error() == Some(nix::libc::EIO)
}

impl AsyncRead for PtyProcess {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let master = match self.master() {
            Ok(master) => master,
            // Closed: behave like end-of-stream.
            Err(_) => return Poll::Ready(Ok(())),
        };

        loop {
            let mut guard = ready!(master.poll_read_ready(cx))?;
            let unfilled = buf.initialize_unfilled();
            match guard.try_io(|inner| {
                let mut file = inner.get_ref();
                file.read(unfilled)
            }) {
                Ok(Ok(n)) => {
                    buf.advance(n);
                    return Poll::Ready(Ok(()));
                }
                Ok(Err(e)) if is_hangup(&e) => return Poll::Ready(Ok(())),
                Ok(Err(e)) => return Poll::Ready(Err(e)),
                Err(_would_block) => continue,
            }
        }
    }
}

impl AsyncWrite for PtyProcess {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        let master = self.master()?;

        loop {
            let mut guard = ready!(master.poll_write_ready(cx))?;
            match guard.try_io(|inner| {
                let mut file = inner.get_ref();
                file.write(data)
            }) {
                Ok(Err(e)) if is_hangup(&e) => {
                    return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
                }
                Ok(result) => return Poll::Ready(result),
                Err(_would_block) => continue,
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

impl std::fmt::Debug for PtyProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyProcess")
            .field("program", &self.program)
            .field("pid", &self.child.id())
            .field("open", &self.master.is_some())
            .field("status", &self.status)
            .finish()
    }
}
