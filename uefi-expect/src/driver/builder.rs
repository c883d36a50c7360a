//! Builder for spawning console sessions.

use std::ffi::OsString;
use std::io::Write;
use std::time::Duration;

use log::info;

use super::session::{Session, SessionConfig};
use crate::channel::{PtyConfig, PtyProcess};
use crate::error::Result;

/// Builder for spawning a child on a PTY and wrapping it in a [`Session`].
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use uefi_expect::driver::SessionBuilder;
///
/// # async fn example() -> Result<(), uefi_expect::Error> {
/// let mut session = SessionBuilder::new(["qemu-system-x86_64", "-nodefaults"])
///     .close_grace(Duration::from_secs(5))
///     .debug(true)
///     .spawn()?;
///
/// session.send_line("reset -s").await?;
/// session.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    argv: Vec<OsString>,
    pty: PtyConfig,
    session: SessionConfig,
    transcript: Option<Box<dyn Write + Send>>,
}

impl SessionBuilder {
    /// Create a new builder for the given argument vector.
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            pty: PtyConfig::default(),
            session: SessionConfig::default(),
            transcript: None,
        }
    }

    /// Set the line ending used by `send_line` (default: `"\n"`).
    pub fn line_ending(mut self, line_ending: impl Into<String>) -> Self {
        self.session.line_ending = line_ending.into();
        self
    }

    /// Enable or disable escape sequence stripping (default: enabled).
    pub fn strip_ansi(mut self, strip: bool) -> Self {
        self.session.strip_ansi = strip;
        self
    }

    /// Enable or disable terminal echo of sent input (default: disabled).
    pub fn echo(mut self, echo: bool) -> Self {
        self.pty.echo = echo;
        self
    }

    /// Set terminal dimensions.
    pub fn terminal_size(mut self, width: u16, height: u16) -> Self {
        self.pty.terminal_width = width;
        self.pty.terminal_height = height;
        self
    }

    /// Set how long `close` waits for the child before killing it.
    pub fn close_grace(mut self, grace: Duration) -> Self {
        self.pty.close_grace = grace;
        self
    }

    /// Mirror the child's output to stdout.
    pub fn debug(self, enabled: bool) -> Self {
        if enabled {
            self.transcript(std::io::stdout())
        } else {
            self
        }
    }

    /// Mirror the child's output to an arbitrary writer.
    pub fn transcript(mut self, writer: impl Write + Send + 'static) -> Self {
        self.transcript = Some(Box::new(writer));
        self
    }

    /// Spawn the child and return the session.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self) -> Result<Session<PtyProcess>> {
        info!("Spawning {:?}", self.argv);
        let process = PtyProcess::spawn(self.argv.as_slice(), &self.pty)?;

        let mut session = Session::new(process, self.session);
        if let Some(transcript) = self.transcript {
            session.set_transcript(transcript);
        }
        Ok(session)
    }
}

impl std::fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("argv", &self.argv)
            .field("pty", &self.pty)
            .field("session", &self.session)
            .field("transcript", &self.transcript.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let builder = SessionBuilder::new(["true"]);
        assert_eq!(builder.argv, vec![OsString::from("true")]);
        assert_eq!(builder.session.line_ending, "\n");
        assert!(builder.session.strip_ansi);
        assert!(!builder.pty.echo);
        assert!(builder.transcript.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let builder = SessionBuilder::new(vec!["sh".to_string(), "-c".to_string()])
            .close_grace(Duration::from_secs(5))
            .line_ending("\r")
            .strip_ansi(false)
            .echo(true)
            .terminal_size(132, 50)
            .debug(true);

        assert_eq!(builder.pty.close_grace, Duration::from_secs(5));
        assert_eq!(builder.session.line_ending, "\r");
        assert!(!builder.session.strip_ansi);
        assert!(builder.pty.echo);
        assert_eq!(builder.pty.terminal_width, 132);
        assert_eq!(builder.pty.terminal_height, 50);
        assert!(builder.transcript.is_some());
    }

    #[tokio::test]
    async fn test_spawn_missing_executable() {
        let err = SessionBuilder::new(["/nonexistent/qemu-system-x86_64"])
            .spawn()
            .unwrap_err();
        assert!(matches!(err, crate::Error::Spawn(_)));
    }
}
