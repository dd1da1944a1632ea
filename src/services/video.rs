//! Video normalization through an external ffmpeg process.
//!
//! [`VideoTranscoder`] owns the scratch file and output bookkeeping; the
//! actual encode goes through the [`VideoEncoder`] trait so tests can swap in
//! a fake. [`FfmpegEncoder`] is the real implementation: it finds the binary
//! with [`EncoderLocator`], spawns it non-interactively and enforces the
//! configured timeout, killing the child when it runs over.

use crate::config::VideoConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::models::MediaKind;
use crate::services::storage;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// Container extension of every stored video.
pub const OUTPUT_EXTENSION: &str = "mp4";

/// Directory below the uploads root where raw uploads wait for the encoder.
pub const SCRATCH_DIR: &str = ".scratch";

/// Install locations probed before falling back to `PATH`.
pub const DEFAULT_ENCODER_CANDIDATES: &[&str] = &[
    "/usr/bin/ffmpeg",
    "/usr/local/bin/ffmpeg",
    "/opt/homebrew/bin/ffmpeg",
    "/opt/ffmpeg/bin/ffmpeg",
    r"C:\ffmpeg\bin\ffmpeg.exe",
    r"C:\Program Files\ffmpeg\bin\ffmpeg.exe",
];

/// Cap on captured encoder diagnostics (64 KiB per stream).
const MAX_CAPTURED_OUTPUT: u64 = 64 * 1024;

/// Only the tail of stderr is carried in errors; ffmpeg puts the cause last.
const DIAGNOSTIC_TAIL_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq)]
pub struct EncodeConstraints {
    pub max_width: u32,
    pub max_height: u32,
    pub max_fps: u32,
    pub video_bitrate_kbps: u32,
    pub max_bitrate_kbps: u32,
    pub buffer_size_kbps: u32,
    pub audio_bitrate_kbps: u32,
    pub timeout: Duration,
}

impl Default for EncodeConstraints {
    fn default() -> Self {
        Self::from_config(&VideoConfig::default())
    }
}

impl EncodeConstraints {
    pub fn from_config(config: &VideoConfig) -> Self {
        Self {
            max_width: config.max_width,
            max_height: config.max_height,
            max_fps: config.max_fps,
            video_bitrate_kbps: config.video_bitrate_kbps,
            max_bitrate_kbps: config.max_bitrate_kbps,
            buffer_size_kbps: config.buffer_size_kbps,
            audio_bitrate_kbps: config.audio_bitrate_kbps,
            timeout: config.timeout(),
        }
    }
}

#[async_trait]
pub trait VideoEncoder: Send + Sync {
    /// Encodes `input` into `output`, honouring `constraints`.
    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        constraints: &EncodeConstraints,
    ) -> PipelineResult<()>;
}

/// Finds the ffmpeg binary. Probing is a handful of `stat` calls, so it runs
/// for every encode rather than being cached.
#[derive(Debug, Clone)]
pub struct EncoderLocator {
    candidates: Vec<PathBuf>,
    search_path: bool,
}

impl Default for EncoderLocator {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl EncoderLocator {
    /// Probes `extra` first, then the built-in candidates, then `PATH`.
    pub fn new(extra: &[PathBuf]) -> Self {
        let candidates = extra
            .iter()
            .cloned()
            .chain(DEFAULT_ENCODER_CANDIDATES.iter().map(PathBuf::from))
            .collect();
        Self {
            candidates,
            search_path: true,
        }
    }

    pub fn with_candidates(candidates: Vec<PathBuf>, search_path: bool) -> Self {
        Self {
            candidates,
            search_path,
        }
    }

    pub fn locate(&self) -> PipelineResult<PathBuf> {
        if let Some(found) = self.candidates.iter().find(|p| p.is_file()) {
            return Ok(found.clone());
        }
        if self.search_path {
            if let Some(found) = search_system_path() {
                return Ok(found);
            }
        }
        Err(PipelineError::EncoderUnavailable(format!(
            "ffmpeg not found in {} candidate location(s){}",
            self.candidates.len(),
            if self.search_path { " or PATH" } else { "" }
        )))
    }
}

fn search_system_path() -> Option<PathBuf> {
    let binary = if cfg!(windows) { "ffmpeg.exe" } else { "ffmpeg" };
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
}

pub struct FfmpegEncoder {
    locator: EncoderLocator,
}

impl FfmpegEncoder {
    pub fn new(locator: EncoderLocator) -> Self {
        Self { locator }
    }
}

#[async_trait]
impl VideoEncoder for FfmpegEncoder {
    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        constraints: &EncodeConstraints,
    ) -> PipelineResult<()> {
        let binary = self.locator.locate()?;
        let args = build_encoder_args(input, output, constraints);
        run_encoder(&binary, args, constraints.timeout).await
    }
}

/// Arguments for a normalizing H.264/AAC encode: bounded resolution and frame
/// rate, capped bitrate, stripped metadata and `moov` atom up front.
pub fn build_encoder_args(
    input: &Path,
    output: &Path,
    constraints: &EncodeConstraints,
) -> Vec<OsString> {
    let filter = format!(
        "scale=w='min({w},iw)':h='min({h},ih)':force_original_aspect_ratio=decrease:force_divisible_by=2",
        w = constraints.max_width,
        h = constraints.max_height,
    );

    let mut args: Vec<OsString> = [
        "-hide_banner",
        "-nostdin",
        "-y",
        "-loglevel",
        "error",
        "-i",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    args.push(input.as_os_str().to_owned());

    let options = [
        "-vf".to_string(),
        filter,
        // Caps the rate without duplicating frames of slower sources.
        "-fpsmax".to_string(),
        constraints.max_fps.to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        "veryfast".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-b:v".to_string(),
        format!("{}k", constraints.video_bitrate_kbps),
        "-maxrate".to_string(),
        format!("{}k", constraints.max_bitrate_kbps),
        "-bufsize".to_string(),
        format!("{}k", constraints.buffer_size_kbps),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        format!("{}k", constraints.audio_bitrate_kbps),
        "-map_metadata".to_string(),
        "-1".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
    ];
    args.extend(options.into_iter().map(OsString::from));
    args.push(output.as_os_str().to_owned());
    args
}

/// Runs the encoder to completion, or kills it once `timeout` elapses.
pub async fn run_encoder(
    binary: &Path,
    args: Vec<OsString>,
    timeout: Duration,
) -> PipelineResult<()> {
    let start = Instant::now();

    let mut child = Command::new(binary)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                PipelineError::EncoderUnavailable(format!(
                    "could not start {}: {}",
                    binary.display(),
                    e
                ))
            }
            _ => PipelineError::Io(e),
        })?;

    // Both pipes must be drained while waiting or a full pipe stalls the encoder.
    let stdout_task = tokio::spawn(read_capped(child.stdout.take()));
    let stderr_task = tokio::spawn(read_capped(child.stderr.take()));

    let wait_result = tokio::time::timeout(timeout, child.wait()).await;

    match wait_result {
        Ok(Ok(status)) if status.success() => {
            tracing::info!(
                duration_ms = start.elapsed().as_millis() as u64,
                "Video encode completed"
            );
            Ok(())
        }
        Ok(Ok(status)) => {
            let stderr = stderr_task.await.unwrap_or_default();
            let stdout = stdout_task.await.unwrap_or_default();
            let diagnostics = if stderr.is_empty() { stdout } else { stderr };
            Err(PipelineError::TranscodeFailed(format!(
                "encoder exited with {}: {}",
                status,
                diagnostic_tail(&diagnostics)
            )))
        }
        Ok(Err(e)) => Err(PipelineError::Io(e)),
        Err(_elapsed) => {
            if let Err(e) = child.kill().await {
                tracing::warn!("Failed to kill timed out encoder: {}", e);
            }
            tracing::warn!(
                timeout_secs = timeout.as_secs(),
                "Video encode timed out, process killed"
            );
            Err(PipelineError::TranscodeTimeout(timeout))
        }
    }
}

async fn read_capped<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(h) = handle {
        let mut capped = h.take(MAX_CAPTURED_OUTPUT);
        let _ = capped.read_to_end(&mut buf).await;
        // Discard anything past the cap.
        let mut rest = capped.into_inner();
        let _ = tokio::io::copy(&mut rest, &mut tokio::io::sink()).await;
    }
    buf
}

fn diagnostic_tail(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    let count = text.chars().count();
    if count <= DIAGNOSTIC_TAIL_CHARS {
        return text.to_string();
    }
    text.chars().skip(count - DIAGNOSTIC_TAIL_CHARS).collect()
}

#[derive(Clone)]
pub struct VideoTranscoder {
    encoder: Arc<dyn VideoEncoder>,
    constraints: EncodeConstraints,
}

impl VideoTranscoder {
    pub fn new(encoder: Arc<dyn VideoEncoder>, constraints: EncodeConstraints) -> Self {
        Self {
            encoder,
            constraints,
        }
    }

    pub fn constraints(&self) -> &EncodeConstraints {
        &self.constraints
    }

    /// Writes `data` to a scratch file, encodes it into `videos/` and returns
    /// the stored path of the result.
    ///
    /// The scratch file is a [`tempfile::NamedTempFile`], so it is removed on
    /// every return path. A partially written output is removed on failure.
    pub async fn transcode_to_file(
        &self,
        data: &[u8],
        upload_root: &Path,
        source_extension: Option<&str>,
    ) -> PipelineResult<String> {
        let scratch_dir = upload_root.join(SCRATCH_DIR);
        tokio::fs::create_dir_all(&scratch_dir).await?;

        let suffix = source_extension
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();
        let scratch = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&suffix)
            .tempfile_in(&scratch_dir)?;
        tokio::fs::write(scratch.path(), data).await?;

        let stored_path = storage::new_stored_path(MediaKind::Video.storage_dir(), OUTPUT_EXTENSION);
        let output = storage::resolve(upload_root, &stored_path)?;
        storage::ensure_parent(&output)?;

        let encoded = self
            .encoder
            .encode(scratch.path(), &output, &self.constraints)
            .await
            .and_then(|()| {
                if output.is_file() {
                    Ok(())
                } else {
                    Err(PipelineError::TranscodeFailed(
                        "encoder reported success but produced no output".to_string(),
                    ))
                }
            });

        if let Err(e) = encoded {
            storage::remove_best_effort(&output);
            return Err(e);
        }

        if let Err(e) = scratch.close() {
            tracing::warn!("Failed to remove scratch file: {}", e);
        }
        Ok(stored_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn args_as_strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_encoder_args_enforce_constraints() {
        let args = build_encoder_args(
            Path::new("in.mov"),
            Path::new("out.mp4"),
            &EncodeConstraints::default(),
        );
        let args = args_as_strings(&args);
        let joined = args.join(" ");

        assert_eq!(args.first().map(String::as_str), Some("-hide_banner"));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
        assert!(joined.contains("-i in.mov"));
        assert!(joined.contains("min(1920,iw)"));
        assert!(joined.contains("min(1080,ih)"));
        assert!(joined.contains("force_original_aspect_ratio=decrease"));
        assert!(joined.contains("-fpsmax 30"));
        assert!(!joined.contains("fps=30"));
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-maxrate 4000k"));
        assert!(joined.contains("-bufsize 8000k"));
        assert!(joined.contains("-c:a aac -b:a 128k"));
        assert!(joined.contains("-map_metadata -1"));
        assert!(joined.contains("-movflags +faststart"));
    }

    #[test]
    fn test_locator_prefers_first_existing_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("ffmpeg");
        std::fs::write(&fake, b"").unwrap();

        let locator = EncoderLocator::with_candidates(
            vec![dir.path().join("missing"), fake.clone()],
            false,
        );
        assert_eq!(locator.locate().unwrap(), fake);
    }

    #[test]
    fn test_locator_reports_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let locator = EncoderLocator::with_candidates(vec![dir.path().join("nope")], false);
        assert!(matches!(
            locator.locate(),
            Err(PipelineError::EncoderUnavailable(_))
        ));
    }

    #[test]
    fn test_diagnostic_tail_keeps_end() {
        let long = format!("{}the real cause", "x".repeat(5000));
        let tail = diagnostic_tail(long.as_bytes());
        assert_eq!(tail.chars().count(), DIAGNOSTIC_TAIL_CHARS);
        assert!(tail.ends_with("the real cause"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_encoder_non_zero_exit_carries_stderr() {
        let args = vec![
            OsString::from("-c"),
            OsString::from("echo 'Invalid data found' >&2; exit 3"),
        ];
        let result = run_encoder(Path::new("/bin/sh"), args, Duration::from_secs(10)).await;
        match result {
            Err(PipelineError::TranscodeFailed(msg)) => {
                assert!(msg.contains("Invalid data found"))
            }
            other => panic!("expected TranscodeFailed, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_encoder_times_out() {
        let args = vec![OsString::from("-c"), OsString::from("sleep 30")];
        let start = Instant::now();
        let result = run_encoder(Path::new("/bin/sh"), args, Duration::from_millis(200)).await;
        assert!(matches!(result, Err(PipelineError::TranscodeTimeout(_))));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_run_encoder_missing_binary() {
        let result = run_encoder(
            Path::new("/definitely/not/here/ffmpeg"),
            Vec::new(),
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(result, Err(PipelineError::EncoderUnavailable(_))));
    }

    /// Copies input to output and remembers what it was asked to do.
    struct CopyEncoder {
        seen_inputs: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl VideoEncoder for CopyEncoder {
        async fn encode(
            &self,
            input: &Path,
            output: &Path,
            _constraints: &EncodeConstraints,
        ) -> PipelineResult<()> {
            self.seen_inputs.lock().unwrap().push(input.to_path_buf());
            tokio::fs::copy(input, output).await?;
            Ok(())
        }
    }

    struct FailingEncoder;

    #[async_trait]
    impl VideoEncoder for FailingEncoder {
        async fn encode(
            &self,
            _input: &Path,
            output: &Path,
            _constraints: &EncodeConstraints,
        ) -> PipelineResult<()> {
            tokio::fs::write(output, b"partial").await?;
            Err(PipelineError::TranscodeFailed("boom".to_string()))
        }
    }

    fn scratch_entries(root: &Path) -> usize {
        std::fs::read_dir(root.join(SCRATCH_DIR))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    #[tokio::test]
    async fn test_transcode_success_removes_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let encoder = Arc::new(CopyEncoder {
            seen_inputs: Mutex::new(Vec::new()),
        });
        let transcoder = VideoTranscoder::new(encoder.clone(), EncodeConstraints::default());

        let stored = transcoder
            .transcode_to_file(b"raw video", dir.path(), Some("mov"))
            .await
            .unwrap();

        assert!(stored.starts_with("videos/"));
        assert!(stored.ends_with(".mp4"));
        let output = storage::resolve(dir.path(), &stored).unwrap();
        assert_eq!(std::fs::read(output).unwrap(), b"raw video");

        let seen = encoder.seen_inputs.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].to_string_lossy().ends_with(".mov"));
        assert!(!seen[0].exists());
        assert_eq!(scratch_entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_transcode_failure_cleans_up_everything() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = VideoTranscoder::new(Arc::new(FailingEncoder), EncodeConstraints::default());

        let result = transcoder
            .transcode_to_file(b"raw video", dir.path(), None)
            .await;

        assert!(matches!(result, Err(PipelineError::TranscodeFailed(_))));
        assert_eq!(scratch_entries(dir.path()), 0);
        let videos = std::fs::read_dir(dir.path().join("videos")).unwrap().count();
        assert_eq!(videos, 0);
    }
}
