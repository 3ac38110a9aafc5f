//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::progress::{is_progress_line, parse_progress_line, FfmpegProgress};

/// Number of trailing output lines kept for diagnostics.
const MAX_CAPTURED_LINES: usize = 64;

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output file path or pattern
    output: PathBuf,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
        }
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add a `-flag value` pair to the output arguments.
    pub fn option(self, flag: impl Into<String>, value: impl Into<String>) -> Self {
        self.output_arg(flag).output_arg(value)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.option("-c:v", codec)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.option("-c:a", codec)
    }

    /// Set CRF (quality).
    pub fn crf(self, crf: u8) -> Self {
        self.option("-crf", crf.to_string())
    }

    /// Set preset.
    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.option("-preset", preset)
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push("error".to_string());

        // Progress records go to stderr, interleaved with log lines
        args.push("-nostats".to_string());
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.clone());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Runner for FFmpeg commands with progress tracking and output capture.
///
/// The child is spawned with `kill_on_drop`, so dropping the future returned
/// by [`run`](Self::run) terminates the encode.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    /// FFmpeg binary name or path
    binary: String,
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRunner {
    /// Create a new runner using `ffmpeg` from `PATH`.
    pub fn new() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
            timeout_secs: None,
        }
    }

    /// Use a specific FFmpeg binary.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run an FFmpeg command.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run_with_progress(cmd, |_| {}).await
    }

    /// Run an FFmpeg command with progress callback.
    ///
    /// On failure the error carries the argument list and the tail of the
    /// combined stdout/stderr output.
    pub async fn run_with_progress<F>(&self, cmd: &FfmpegCommand, progress_callback: F) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        which::which(&self.binary).map_err(|_| MediaError::FfmpegNotFound(self.binary.clone()))?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: {} {}", self.binary, args.join(" "));

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let stdout_task = child.stdout.take().map(|out| tokio::spawn(forward_lines(out, line_tx.clone())));
        let stderr_task = child.stderr.take().map(|err| tokio::spawn(forward_lines(err, line_tx)));

        // Progress parsing and output capture run until both pipes close
        let collector = tokio::spawn(collect_output(line_rx, progress_callback));

        let status = self.wait_for_completion(&mut child, &args).await;

        for task in [stdout_task, stderr_task].into_iter().flatten() {
            let _ = task.await;
        }
        let output = collector.await.unwrap_or_default();

        let status = status?;
        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                &args,
                output,
                status.code(),
            ))
        }
    }

    /// Wait for child process with optional timeout.
    async fn wait_for_completion(&self, child: &mut Child, args: &[String]) -> MediaResult<std::process::ExitStatus> {
        match self.timeout_secs {
            Some(timeout_secs) => match tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait()).await {
                Ok(status) => Ok(status?),
                Err(_) => {
                    warn!(
                        "FFmpeg timed out after {} seconds, killing process: {}",
                        timeout_secs,
                        args.join(" ")
                    );
                    let _ = child.kill().await;
                    Err(MediaError::Timeout(timeout_secs))
                }
            },
            None => Ok(child.wait().await?),
        }
    }
}

async fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).is_err() {
            break;
        }
    }
}

async fn collect_output<F>(mut rx: mpsc::UnboundedReceiver<String>, progress_callback: F) -> String
where
    F: Fn(FfmpegProgress),
{
    let mut current = FfmpegProgress::default();
    let mut captured: VecDeque<String> = VecDeque::with_capacity(MAX_CAPTURED_LINES);

    while let Some(line) = rx.recv().await {
        if is_progress_line(&line) {
            if let Some(progress) = parse_progress_line(&line, &mut current) {
                progress_callback(progress);
            }
            continue;
        }
        if captured.len() == MAX_CAPTURED_LINES {
            captured.pop_front();
        }
        captured.push_back(line);
    }

    Vec::from(captured).join("\n")
}

/// Check that an FFmpeg binary is available.
pub fn check_ffmpeg(binary: &str) -> MediaResult<PathBuf> {
    which::which(binary).map_err(|_| MediaError::FfmpegNotFound(binary.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.mp4", "out/input.mp4")
            .video_codec("libx264")
            .crf(22);

        let args = cmd.build_args();
        assert_eq!(args.first().map(String::as_str), Some("-y"));
        assert!(args.windows(2).any(|w| w == ["-c:v", "libx264"]));
        assert!(args.windows(2).any(|w| w == ["-crf", "22"]));
        assert!(args.windows(2).any(|w| w == ["-progress", "pipe:2"]));
        assert_eq!(args.last().map(String::as_str), Some("out/input.mp4"));

        let input_pos = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input_pos + 1], "input.mp4");
    }

    #[tokio::test]
    async fn test_missing_binary_is_reported() {
        let runner = FfmpegRunner::new().with_binary("definitely-not-ffmpeg-7f3a");
        let cmd = FfmpegCommand::new("in.mp4", "out.mp4");

        let err = runner.run(&cmd).await.unwrap_err();
        assert!(matches!(err, MediaError::FfmpegNotFound(ref b) if b == "definitely-not-ffmpeg-7f3a"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_run_reports_args_and_output() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("fake-ffmpeg");
        std::fs::write(
            &binary,
            "#!/bin/sh\necho 'progress=continue' >&2\necho \"cannot open: $*\" >&2\nexit 3\n",
        )
        .unwrap();
        std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();

        let runner = FfmpegRunner::new().with_binary(binary.to_string_lossy());
        let cmd = FfmpegCommand::new("missing-input.mp4", "out.mp4").video_codec("libx264");

        match runner.run(&cmd).await.unwrap_err() {
            MediaError::FfmpegFailed {
                args,
                output,
                exit_code,
                ..
            } => {
                assert_eq!(exit_code, Some(3));
                assert!(args.contains("-i missing-input.mp4"), "{}", args);
                assert!(args.contains("-c:v libx264"), "{}", args);
                assert!(output.starts_with("cannot open: -y"), "{}", output);
                assert!(output.contains("missing-input.mp4"), "{}", output);
                assert!(!output.contains("progress="), "{}", output);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_check_ffmpeg_missing() {
        let err = check_ffmpeg("definitely-not-ffmpeg-7f3a").unwrap_err();
        assert!(matches!(err, MediaError::FfmpegNotFound(_)));
    }

    #[tokio::test]
    async fn test_collect_output_splits_progress_from_diagnostics() {
        let (tx, rx) = mpsc::unbounded_channel();
        for line in ["frame=1", "in.mp4: Invalid data found", "progress=end"] {
            tx.send(line.to_string()).unwrap();
        }
        drop(tx);

        let seen = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let seen_cb = seen.clone();
        let output = collect_output(rx, move |p| {
            if p.is_complete {
                seen_cb.store(true, std::sync::atomic::Ordering::SeqCst);
            }
        })
        .await;

        assert_eq!(output, "in.mp4: Invalid data found");
        assert!(seen.load(std::sync::atomic::Ordering::SeqCst));
    }
}
