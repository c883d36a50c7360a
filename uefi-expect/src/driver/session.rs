//! Expect engine: wait for one of several patterns, then react.

use std::io::Write;
use std::process::ExitStatus;
use std::time::Duration;

use bytes::BytesMut;
use log::{debug, trace, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;

use super::response::{Match, MatchResult};
use crate::channel::{PatternBuffer, PatternSet, PtyProcess};
use crate::error::{ChannelError, Result};

/// Tunables for a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Appended by [`Session::send_line`].
    pub line_ending: String,

    /// Remove terminal escape sequences before matching.
    pub strip_ansi: bool,

    /// Maximum number of bytes requested per read.
    pub read_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            line_ending: "\n".to_string(),
            strip_ansi: true,
            read_size: 4096,
        }
    }
}

/// An interactive session over a terminal-like transport.
///
/// The transport is usually a [`PtyProcess`], but any `AsyncRead +
/// AsyncWrite` works, which is how scripted consoles are tested.
pub struct Session<T> {
    transport: T,

    /// Output not yet consumed by a match.
    buffer: PatternBuffer,

    /// Absolute stream offset of the first byte in `buffer`.
    offset: usize,

    /// Set once the transport reported end-of-stream.
    eof: bool,

    config: SessionConfig,

    /// Diagnostic copy of every byte read from the transport.
    transcript: Option<Box<dyn Write + Send>>,
}

impl<T> Session<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a session over `transport`.
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self {
            transport,
            buffer: PatternBuffer::new(config.strip_ansi),
            offset: 0,
            eof: false,
            config,
            transcript: None,
        }
    }

    /// Mirror all raw output to `writer`.
    ///
    /// The mirror sees bytes before escape stripping and has no effect on
    /// matching; write errors are logged and otherwise ignored.
    pub fn set_transcript(&mut self, writer: Box<dyn Write + Send>) {
        self.transcript = Some(writer);
    }

    /// Wait until one of `patterns` appears in the output.
    ///
    /// The unconsumed buffer is checked first, then the transport is read
    /// until a pattern matches, the transport reaches end-of-stream, or
    /// `timeout` elapses. On a match the buffer is consumed up to the end of
    /// the match, so later calls never see the same occurrence again.
    pub async fn expect(&mut self, patterns: &PatternSet, timeout: Duration) -> Result<MatchResult> {
        let start = Instant::now();
        let deadline = start.checked_add(timeout).unwrap_or_else(far_future);
        let mut chunk = BytesMut::with_capacity(self.config.read_size);

        loop {
            if let Some(found) = self.buffer.find(patterns) {
                let mut consumed = self.buffer.consume(found.span.end);
                let text = String::from_utf8_lossy(&consumed[found.span.clone()]).into_owned();
                consumed.truncate(found.span.start);
                let before = String::from_utf8_lossy(&consumed).into_owned();

                let span = self.offset + found.span.start..self.offset + found.span.end;
                self.offset += found.span.end;

                debug!("Matched pattern {} {:?} at {:?}", found.index, text, span);
                return Ok(MatchResult::Matched(Match {
                    index: found.index,
                    text,
                    before,
                    span,
                    elapsed: start.elapsed(),
                }));
            }

            if self.eof {
                debug!("End of stream with {} unmatched bytes", self.buffer.len());
                return Ok(MatchResult::Eof {
                    remaining: self.buffer.as_str_lossy().into_owned(),
                });
            }

            chunk.clear();
            match tokio::time::timeout_at(deadline, self.transport.read_buf(&mut chunk)).await {
                Err(_) => {
                    debug!("No pattern matched within {:?}", timeout);
                    return Ok(MatchResult::Timeout {
                        remaining: self.buffer.as_str_lossy().into_owned(),
                    });
                }
                Ok(Ok(0)) => self.eof = true,
                Ok(Ok(n)) => {
                    trace!("Read {} bytes: {:?}", n, String::from_utf8_lossy(&chunk));
                    self.mirror(&chunk);
                    self.buffer.extend(&chunk);
                }
                Ok(Err(e)) => return Err(ChannelError::Io(e).into()),
            }
        }
    }

    /// Write raw bytes to the transport.
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        trace!("Sending {:?}", String::from_utf8_lossy(data));
        self.transport
            .write_all(data)
            .await
            .map_err(ChannelError::Io)?;
        self.transport.flush().await.map_err(ChannelError::Io)?;
        Ok(())
    }

    /// Write `text` followed by the configured line ending.
    pub async fn send_line(&mut self, text: &str) -> Result<()> {
        let mut line = Vec::with_capacity(text.len() + self.config.line_ending.len());
        line.extend_from_slice(text.as_bytes());
        line.extend_from_slice(self.config.line_ending.as_bytes());
        self.send(&line).await
    }

    fn mirror(&mut self, data: &[u8]) {
        if let Some(transcript) = self.transcript.as_mut() {
            if let Err(e) = transcript.write_all(data).and_then(|_| transcript.flush()) {
                warn!("Failed to write transcript: {}", e);
            }
        }
    }
}

/// Deadline used when `now + timeout` does not fit in an `Instant`.
fn far_future() -> Instant {
    // Roughly 30 years, the same horizon tokio uses internally.
    Instant::now() + Duration::from_secs(86400 * 365 * 30)
}

impl<T> Session<T> {
    /// Check if the transport reached end-of-stream.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Get a reference to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl Session<PtyProcess> {
    /// Reap the child and release the terminal. Safe to call repeatedly.
    pub async fn close(&mut self) -> Result<ExitStatus> {
        Ok(self.transport.close().await.map_err(ChannelError::Io)?)
    }
}

impl<T> std::fmt::Debug for Session<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("transport", &self.transport)
            .field("buffer", &self.buffer)
            .field("offset", &self.offset)
            .field("eof", &self.eof)
            .field("config", &self.config)
            .field("transcript", &self.transcript.is_some())
            .finish()
    }
}
