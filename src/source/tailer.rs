//! Polling file follower.
//!
//! Remembers a byte offset into the file, polls for growth, and emits each
//! complete line into the raw-line channel. Survives truncation, rotation,
//! and recreation: a shrinking file resets the offset to zero, and a missing
//! file is waited on rather than treated as fatal (in follow mode).
//!
//! Partial trailing data is buffered until its newline arrives; a line is
//! only emitted once it is complete, except at end of input in no-follow
//! mode where the remainder is flushed as the final line.

use chrono::Utc;
use snafu::prelude::*;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::emit;
use crate::error::{OpenSnafu, ReadSnafu, SourceError};
use crate::metrics::events::LinesRead;
use crate::record::RawLine;

/// Upper bound on bytes read per poll iteration.
const MAX_READ_CHUNK_BYTES: usize = 64 * 1024;

/// Configuration for the line tailer.
#[derive(Debug, Clone)]
pub struct TailerConfig {
    /// Keep following the file after reaching end of file.
    pub follow: bool,
    /// Wait for the file to appear instead of failing (follow mode only).
    pub tolerate_missing: bool,
    /// Interval between polls for newly appended data.
    pub poll_interval: Duration,
}

impl Default for TailerConfig {
    fn default() -> Self {
        Self {
            follow: true,
            tolerate_missing: true,
            poll_interval: Duration::from_millis(1000),
        }
    }
}

/// Follows one append-only file and produces [`RawLine`]s.
pub struct LineTailer {
    path: PathBuf,
    config: TailerConfig,
}

impl LineTailer {
    pub fn new(path: PathBuf, config: TailerConfig) -> Self {
        Self { path, config }
    }

    /// Run the tailer until the source ends, the channel closes, or the
    /// cancellation token fires. Returns the number of lines emitted.
    pub async fn run(
        self,
        tx: async_channel::Sender<RawLine>,
        shutdown: CancellationToken,
    ) -> Result<u64, SourceError> {
        let path_display = self.path.display().to_string();
        info!(path = %path_display, follow = self.config.follow, "Starting tailer");

        // Offset of the first byte of `partial` (or of the next unread byte
        // when `partial` is empty).
        let mut line_offset: u64 = 0;
        let mut read_offset: u64 = 0;
        let mut partial: Vec<u8> = Vec::new();
        let mut lines_emitted: u64 = 0;

        loop {
            if shutdown.is_cancelled() {
                debug!("Tailer cancelled");
                break;
            }

            let size = match fs::metadata(&self.path).await {
                Ok(meta) => meta.len(),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    if self.config.follow && self.config.tolerate_missing {
                        debug!(path = %path_display, "Access log missing, waiting");
                        if !self.sleep_or_cancel(&shutdown).await {
                            break;
                        }
                        continue;
                    }
                    return Err(e).context(OpenSnafu { path: path_display });
                }
                Err(e) => return Err(e).context(OpenSnafu { path: path_display }),
            };

            if size < read_offset {
                warn!(
                    path = %path_display,
                    previous_offset = read_offset,
                    current_size = size,
                    "File truncated or rotated, restarting from the top"
                );
                read_offset = 0;
                line_offset = 0;
                partial.clear();
            }

            if size > read_offset {
                let chunk = self
                    .read_chunk(read_offset, size)
                    .await
                    .context(ReadSnafu {
                        path: path_display.clone(),
                    })?;
                if chunk.is_empty() {
                    // Raced a rotation; re-stat on the next iteration.
                    if !self.sleep_or_cancel(&shutdown).await {
                        break;
                    }
                    continue;
                }

                read_offset += chunk.len() as u64;
                partial.extend_from_slice(&chunk);

                while let Some(newline) = partial.iter().position(|&b| b == b'\n') {
                    let mut line: Vec<u8> = partial.drain(..=newline).collect();
                    line.pop(); // trailing \n
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                    let consumed = newline as u64 + 1;
                    let offset = line_offset;
                    line_offset += consumed;

                    if !self.emit_line(&tx, line, offset).await {
                        return Ok(lines_emitted);
                    }
                    lines_emitted += 1;
                }
                continue; // keep reading until caught up
            }

            // Caught up with the file.
            if !self.config.follow {
                if !partial.is_empty() {
                    // Final line without a trailing newline.
                    let line = std::mem::take(&mut partial);
                    if self.emit_line(&tx, line, line_offset).await {
                        lines_emitted += 1;
                    }
                }
                debug!(path = %path_display, lines = lines_emitted, "Reached end of file");
                break;
            }

            if !self.sleep_or_cancel(&shutdown).await {
                break;
            }
        }

        Ok(lines_emitted)
    }

    /// Send one line downstream. Returns false when the channel has closed.
    async fn emit_line(
        &self,
        tx: &async_channel::Sender<RawLine>,
        line: Vec<u8>,
        offset: u64,
    ) -> bool {
        let raw = RawLine {
            text: String::from_utf8_lossy(&line).into_owned(),
            offset,
            observed_at: Utc::now(),
        };
        if tx.send(raw).await.is_err() {
            debug!("Raw-line channel closed, stopping tailer");
            return false;
        }
        emit!(LinesRead { count: 1 });
        true
    }

    /// Read up to `MAX_READ_CHUNK_BYTES` newly appended bytes.
    async fn read_chunk(&self, offset: u64, size: u64) -> std::io::Result<Vec<u8>> {
        let available = size.saturating_sub(offset);
        let to_read = available.min(MAX_READ_CHUNK_BYTES as u64) as usize;

        let mut file = fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(offset)).await?;

        let mut buffer = vec![0u8; to_read];
        let mut total = 0usize;
        while total < to_read {
            let n = file.read(&mut buffer[total..]).await?;
            if n == 0 {
                break;
            }
            total += n;
        }
        buffer.truncate(total);
        Ok(buffer)
    }

    /// Wait one poll interval. Returns false if cancelled while waiting.
    async fn sleep_or_cancel(&self, shutdown: &CancellationToken) -> bool {
        tokio::select! {
            _ = shutdown.cancelled() => false,
            _ = tokio::time::sleep(self.config.poll_interval) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn no_follow_config() -> TailerConfig {
        TailerConfig {
            follow: false,
            tolerate_missing: false,
            poll_interval: Duration::from_millis(10),
        }
    }

    async fn collect_no_follow(content: &[u8]) -> (Vec<RawLine>, u64) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();

        let (tx, rx) = async_channel::bounded(64);
        let tailer = LineTailer::new(file.path().to_path_buf(), no_follow_config());
        let count = tailer.run(tx, CancellationToken::new()).await.unwrap();

        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        (lines, count)
    }

    #[tokio::test]
    async fn test_reads_complete_lines_with_offsets() {
        let (lines, count) = collect_no_follow(b"first\nsecond\nthird\n").await;
        assert_eq!(count, 3);
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, ["first", "second", "third"]);
        assert_eq!(lines[0].offset, 0);
        assert_eq!(lines[1].offset, 6);
        assert_eq!(lines[2].offset, 13);
    }

    #[tokio::test]
    async fn test_flushes_final_partial_line_at_eof() {
        let (lines, count) = collect_no_follow(b"one\ntwo").await;
        assert_eq!(count, 2);
        assert_eq!(lines[1].text, "two");
        assert_eq!(lines[1].offset, 4);
    }

    #[tokio::test]
    async fn test_strips_carriage_returns() {
        let (lines, _) = collect_no_follow(b"dos line\r\n").await;
        assert_eq!(lines[0].text, "dos line");
    }

    #[tokio::test]
    async fn test_empty_file_yields_nothing() {
        let (lines, count) = collect_no_follow(b"").await;
        assert!(lines.is_empty());
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_missing_file_fails_without_follow() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.log");
        let (tx, _rx) = async_channel::bounded(4);
        let tailer = LineTailer::new(path, no_follow_config());
        let err = tailer.run(tx, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SourceError::Open { .. }));
    }

    #[tokio::test]
    async fn test_follow_picks_up_appended_lines_and_truncation() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();
        std::fs::write(&path, b"early\n").unwrap();

        let config = TailerConfig {
            follow: true,
            tolerate_missing: true,
            poll_interval: Duration::from_millis(5),
        };
        let shutdown = CancellationToken::new();
        let (tx, rx) = async_channel::bounded(64);
        let handle = tokio::spawn(LineTailer::new(path.clone(), config).run(tx, shutdown.clone()));

        let recv = |rx: async_channel::Receiver<RawLine>| async move {
            tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for line")
                .expect("channel closed")
        };

        let first = recv(rx.clone()).await;
        assert_eq!(first.text, "early");

        // Append while following.
        {
            let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(b"appended\n").unwrap();
        }
        let second = recv(rx.clone()).await;
        assert_eq!(second.text, "appended");
        assert_eq!(second.offset, 6);

        // Truncate and write fresh content: offsets restart at zero.
        std::fs::write(&path, b"fresh\n").unwrap();
        let third = recv(rx.clone()).await;
        assert_eq!(third.text, "fresh");
        assert_eq!(third.offset, 0);

        shutdown.cancel();
        let emitted = handle.await.unwrap().unwrap();
        assert_eq!(emitted, 3);
    }
}
