//! FFmpeg transcoding over stdin/stdout pipes.
//!
//! The audio capability never touches the filesystem: input bytes are pumped
//! into the child's stdin while stdout is drained into a caller-owned buffer.
//! The child runs under a wall-clock timeout and is killed when it expires.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

/// Binary looked up on `PATH` when no explicit path is configured.
pub const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";

/// Wall-clock limit for a single transcode.
pub const DEFAULT_TRANSCODE_TIMEOUT: Duration = Duration::from_secs(20);

/// Typical upload length used to size the output buffer (minutes).
pub const TYPICAL_AUDIO_MINUTES: usize = 5;

/// Target bitrate of the down-sampled mp3 (kbit/s).
pub const TARGET_BITRATE_KBPS: usize = 128;

/// Maximum stderr captured from the child (64 KiB).
const MAX_STDERR_BYTES: u64 = 64 * 1024;

/// Error type for FFmpeg operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffmpeg binary could not be started: {0}")]
    NotFound(std::io::Error),

    #[error("ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("ffmpeg timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Output buffer size for [`TYPICAL_AUDIO_MINUTES`] of audio at
/// [`TARGET_BITRATE_KBPS`], rounded up to a whole MiB.
///
/// Five minutes at 128 kbit/s is ~4.8 MB, which rounds to 5 MiB.
pub fn typical_output_bytes(minutes: usize, bitrate_kbps: usize) -> usize {
    const MIB: usize = 1024 * 1024;
    let bytes = minutes * 60 * bitrate_kbps * 1000 / 8;
    bytes.div_ceil(MIB) * MIB
}

/// A fully specified transcoder invocation.
#[derive(Debug, Clone)]
pub struct TranscodeCommand {
    /// Program to execute.
    pub program: String,
    /// Arguments; the program must read stdin and write stdout.
    pub args: Vec<String>,
    /// Maximum wall-clock time before the child is killed.
    pub timeout: Duration,
}

impl TranscodeCommand {
    /// Down-sample any audio input to a 128k mp3 with metadata stripped.
    pub fn mp3_128k(program: impl Into<String>) -> Self {
        let args = [
            "-y",
            "-hide_banner",
            "-loglevel",
            "panic",
            "-i",
            "pipe:0",
            "-map_metadata",
            "-1",
            "-c:a",
            "libmp3lame",
            "-vsync",
            "2",
            "-b:a",
            "128k",
            "-f",
            "mp3",
            "pipe:1",
        ];
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout: DEFAULT_TRANSCODE_TIMEOUT,
        }
    }

    /// Override the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for TranscodeCommand {
    fn default() -> Self {
        Self::mp3_128k(DEFAULT_FFMPEG_PATH)
    }
}

/// Run `command`, feeding `input` to stdin and collecting stdout into
/// `output` (previous contents are discarded).
///
/// Stdin and stdout are serviced concurrently so large inputs cannot
/// deadlock on a full pipe. The child is killed if the timeout expires.
pub async fn transcode(
    command: &TranscodeCommand,
    input: &[u8],
    output: &mut Vec<u8>,
) -> Result<(), FfmpegError> {
    output.clear();

    let mut child = Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(FfmpegError::NotFound)?;

    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let start = Instant::now();

    let run = async {
        let write = async {
            if let Some(mut stdin) = stdin {
                // The child may exit before consuming all input; its exit
                // status is the authoritative result.
                let _ = stdin.write_all(input).await;
            }
        };
        let read = async {
            match stdout {
                Some(mut stdout) => stdout.read_to_end(output).await.map(|_| ()),
                None => Ok(()),
            }
        };
        let (_, read_result, stderr_bytes) = tokio::join!(write, read, read_capped(stderr));
        read_result?;

        let status = child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(FfmpegError::ExecutionFailed {
                exit_code: status.code(),
                stderr: String::from_utf8_lossy(&stderr_bytes).trim().to_string(),
            })
        }
    };

    match tokio::time::timeout(command.timeout, run).await {
        Ok(result) => result,
        // `child` is dropped on return, which kills the process.
        Err(_elapsed) => Err(FfmpegError::Timeout {
            elapsed_ms: start.elapsed().as_millis() as u64,
        }),
    }
}

/// Read a stream to its end, keeping at most [`MAX_STDERR_BYTES`].
async fn read_capped<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h).take(MAX_STDERR_BYTES).read_to_end(&mut buf).await;
        // Keep draining so the child never blocks on a full stderr pipe.
        let _ = tokio::io::copy(&mut h, &mut tokio::io::sink()).await;
    }
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
