//! ffmpeg adapter
//!
//! Stateless wrappers around the external media binary: argument
//! construction, subprocess supervision with a hard wall-clock timeout,
//! and the temp-storage staging that feeds it. Inputs are served to
//! ffmpeg over verified signed URLs because the storage backend can lag
//! behind its own upload acknowledgements.

use async_trait::async_trait;
use calma_common::{with_backoff, Error, Result, RetryPolicy};
use futures::future::join_all;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::media::{mastering, probe, MediaAdapter};
use crate::services::ObjectStore;

/// Hard wall-clock limit for any single ffmpeg invocation
const SUBPROCESS_TIMEOUT: Duration = Duration::from_secs(240);
/// Signed URLs live long enough to cover a full mixdown with retries
const SIGNED_URL_TTL_SECS: u32 = 600;
/// Parallel temp-uploads during concat staging
const MAX_PARALLEL_UPLOADS: usize = 6;
/// Mixdown subprocess retries (expensive, few attempts)
const MIX_ATTEMPTS: u32 = 3;

pub struct FfmpegAdapter {
    store: Arc<dyn ObjectStore>,
    binary: PathBuf,
    temp_bucket: String,
    output_bucket: String,
}

impl std::fmt::Debug for FfmpegAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegAdapter")
            .field("binary", &self.binary)
            .field("temp_bucket", &self.temp_bucket)
            .field("output_bucket", &self.output_bucket)
            .finish_non_exhaustive()
    }
}

impl FfmpegAdapter {
    /// Resolve the binary once at startup; a configured path that does not
    /// exist is a configuration error, a bare name is trusted to PATH.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        binary: PathBuf,
        temp_bucket: &str,
        output_bucket: &str,
    ) -> Result<Self> {
        if binary.components().count() > 1 && !binary.exists() {
            return Err(Error::Config(format!(
                "Media binary not found at {}. Install ffmpeg or set CALMA_MEDIA_BINARY.",
                binary.display()
            )));
        }

        Ok(Self {
            store,
            binary,
            temp_bucket: temp_bucket.to_string(),
            output_bucket: output_bucket.to_string(),
        })
    }

    /// Upload a buffer to the temp bucket and return a verified signed URL
    pub async fn upload_temp_buffer(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String> {
        self.store
            .upload(&self.temp_bucket, path, bytes, content_type)
            .await?;
        self.signed_url_with_retry(path).await
    }

    /// Create a signed URL and poll it with HEAD requests before trusting
    /// it. 404 means the storage backend has not propagated the object yet;
    /// 403 is unexpected but observed transiently after key rotation. Both
    /// retry; any other non-2xx fails once attempts are exhausted.
    pub async fn signed_url_with_retry(&self, path: &str) -> Result<String> {
        let url = with_backoff(
            "create signed url",
            RetryPolicy::quick(3),
            Error::is_transient,
            || async {
                self.store
                    .signed_url(&self.temp_bucket, path, SIGNED_URL_TTL_SECS)
                    .await
            },
        )
        .await?;

        self.verify_url(&url).await?;
        Ok(url)
    }

    async fn verify_url(&self, url: &str) -> Result<()> {
        with_backoff(
            "verify asset url",
            RetryPolicy::quick(5),
            Error::is_transient,
            || async {
                let status = self.store.head_status(url).await?;
                match status {
                    200..=299 => Ok(()),
                    404 => Err(Error::Transient(
                        "Storage propagation delay detected (404)".to_string(),
                    )),
                    403 => Err(Error::Transient(
                        "Signed URL invalidated unexpectedly (403)".to_string(),
                    )),
                    other => Err(Error::Http {
                        status: other,
                        body: format!("Unexpected status for {}", url),
                    }),
                }
            },
        )
        .await
    }

    /// Run ffmpeg with the given input URL and arguments, capturing stdout.
    ///
    /// Unless the arguments already name a pipe or output file, output is
    /// piped back as MP3. The subprocess is killed if it outlives the
    /// wall-clock timeout.
    pub async fn run(&self, input_url: Option<&str>, extra_args: &[String]) -> Result<Vec<u8>> {
        let mut args: Vec<String> = vec!["-y".to_string()];
        if let Some(url) = input_url {
            args.push("-i".to_string());
            args.push(url.to_string());
        }
        args.extend_from_slice(extra_args);
        if !args.iter().any(|a| a.starts_with("pipe:")) && !has_output_file(extra_args) {
            args.push("-f".to_string());
            args.push("mp3".to_string());
            args.push("pipe:1".to_string());
        }

        debug!(binary = %self.binary.display(), "Starting media subprocess");

        let child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Media {
                message: format!("Failed to spawn media binary: {}", e),
                stderr: String::new(),
            })?;

        let output = tokio::time::timeout(SUBPROCESS_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| {
                error!("Media subprocess timed out, killing");
                Error::Transient(format!(
                    "Media subprocess exceeded {}s timeout",
                    SUBPROCESS_TIMEOUT.as_secs()
                ))
            })?
            .map_err(Error::Io)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            error!(
                exit_code = output.status.code(),
                stderr = %stderr.chars().take(200).collect::<String>(),
                "Media subprocess failed"
            );
            return Err(Error::Media {
                message: format!(
                    "Media subprocess exited with code {:?}",
                    output.status.code()
                ),
                stderr,
            });
        }

        debug!(output_size = output.stdout.len(), "Media subprocess succeeded");
        Ok(output.stdout)
    }

    async fn stage_inputs(&self, buffers: &[Vec<u8>], prefix: &str) -> Result<Vec<String>> {
        let mut urls = Vec::with_capacity(buffers.len());

        for (batch_number, batch) in buffers.chunks(MAX_PARALLEL_UPLOADS).enumerate() {
            let uploads = batch.iter().enumerate().map(|(i, buffer)| {
                let index = batch_number * MAX_PARALLEL_UPLOADS + i;
                let path = format!("{}/input{}.mp3", prefix, index);
                async move { self.upload_temp_buffer(&path, buffer, "audio/mpeg").await }
            });

            for url in join_all(uploads).await {
                urls.push(url?);
            }
        }

        Ok(urls)
    }
}

fn has_output_file(args: &[String]) -> bool {
    // An output path is the only bare argument ffmpeg accepts at the end
    args.last()
        .map(|a| !a.starts_with('-') && (a.ends_with(".m4a") || a.ends_with(".mp3")))
        .unwrap_or(false)
}

#[async_trait]
impl MediaAdapter for FfmpegAdapter {
    async fn trim(&self, input: &[u8], seconds: f64, prefix: &str) -> Result<Vec<u8>> {
        let path = format!("{}/input_trim_{}.mp3", prefix, Uuid::new_v4().simple());
        let url = self.upload_temp_buffer(&path, input, "audio/mpeg").await?;

        let args = vec![
            "-ss".to_string(),
            "0".to_string(),
            "-t".to_string(),
            seconds.to_string(),
            "-c:a".to_string(),
            "copy".to_string(),
        ];
        self.run(Some(&url), &args).await
    }

    async fn concat(&self, buffers: Vec<Vec<u8>>, prefix: &str) -> Result<Vec<u8>> {
        info!(buffer_count = buffers.len(), "Concatenating audio buffers");
        let urls = self.stage_inputs(&buffers, &format!("{}/concat_{}", prefix, Uuid::new_v4().simple())).await?;

        let mut args = Vec::new();
        for url in &urls {
            args.push("-i".to_string());
            args.push(url.clone());
        }
        args.push("-filter_complex".to_string());
        args.push(format!("concat=n={}:v=0:a=1", urls.len()));
        args.push("-c:a".to_string());
        args.push("mp3".to_string());

        self.run(None, &args).await
    }

    async fn fade_out(
        &self,
        input: &[u8],
        total_seconds: f64,
        fade_seconds: f64,
        prefix: &str,
    ) -> Result<Vec<u8>> {
        let path = format!("{}/input_fade_{}.mp3", prefix, Uuid::new_v4().simple());
        let url = self.upload_temp_buffer(&path, input, "audio/mpeg").await?;

        let fade_start = (total_seconds - fade_seconds).max(0.0);
        let args = vec![
            "-vn".to_string(),
            "-af".to_string(),
            format!("afade=t=out:st={}:d={}", fade_start, fade_seconds),
            "-c:a".to_string(),
            "mp3".to_string(),
        ];
        self.run(Some(&url), &args).await
    }

    async fn measure_duration(&self, input: &[u8]) -> Result<f64> {
        probe::duration_seconds(input)
    }

    /// Mix voice over background through a seekable local intermediate so
    /// the container metadata is finalized, then upload the file under the
    /// owning user's folder.
    async fn mix_to_storage(
        &self,
        background: &[u8],
        voice: &[u8],
        duration_seconds: f64,
        prefix: &str,
        user_id: &str,
    ) -> Result<String> {
        let bg_path = format!("{}/bg.mp3", prefix);
        let voice_path = format!("{}/voice.mp3", prefix);
        let bg_url = self.upload_temp_buffer(&bg_path, background, "audio/mpeg").await?;
        let voice_url = self
            .upload_temp_buffer(&voice_path, voice, "audio/mpeg")
            .await?;

        let temp_dir = tempfile::tempdir()?;
        let output_file = temp_dir
            .path()
            .join(format!("meditation-{}.m4a", Uuid::new_v4().simple()));
        let output_str = output_file.to_string_lossy().to_string();

        let filter = format!(
            "[0:a]volume={}[bg]; [bg][1:a]amix=inputs=2:duration=first[mixed]; [mixed]volume={}[final]",
            mastering::BG_ATTENUATION,
            mastering::MIX_BOOST
        );
        let args: Vec<String> = vec![
            "-protocol_whitelist".into(),
            "file,http,https,tcp,tls".into(),
            "-vn".into(),
            "-i".into(),
            bg_url.clone(),
            "-i".into(),
            voice_url.clone(),
            "-filter_complex".into(),
            filter,
            "-map".into(),
            "[final]".into(),
            "-t".into(),
            duration_seconds.to_string(),
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            mastering::OUTPUT_BITRATE.into(),
            "-movflags".into(),
            "+faststart".into(),
            output_str,
        ];

        // Re-verify both upstream assets before each attempt: a mixdown
        // failure is often the storage backend dropping one of them.
        with_backoff(
            "mixdown",
            RetryPolicy::heavy(MIX_ATTEMPTS),
            |err| matches!(err, Error::Media { .. } | Error::Transient(_)),
            || async {
                self.verify_url(&bg_url).await?;
                self.verify_url(&voice_url).await?;
                self.run(None, &args).await?;
                Ok(())
            },
        )
        .await?;

        let finalized = std::fs::read(&output_file)?;
        info!(size = finalized.len(), "Finalized mix read from local intermediate");

        let file_name = format!("meditation-{}.m4a", chrono::Utc::now().timestamp_millis());
        let storage_path = format!("{}/{}", user_id, file_name);
        self.store
            .upload(&self.output_bucket, &storage_path, &finalized, "audio/mp4")
            .await?;
        info!(path = %storage_path, "Final audio uploaded");

        if let Err(e) = std::fs::remove_file(&output_file) {
            warn!(error = %e, "Failed to delete local intermediate");
        }

        Ok(storage_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_file_detection() {
        assert!(has_output_file(&["-t".into(), "300".into(), "/tmp/out.m4a".into()]));
        assert!(!has_output_file(&["-c:a".into(), "mp3".into()]));
        assert!(!has_output_file(&[]));
    }

    #[test]
    fn missing_configured_binary_is_config_error() {
        struct NullStore;

        #[async_trait]
        impl ObjectStore for NullStore {
            async fn upload(&self, _: &str, _: &str, _: &[u8], _: &str) -> Result<()> {
                Ok(())
            }
            async fn download(&self, _: &str, _: &str) -> Result<Vec<u8>> {
                Ok(Vec::new())
            }
            async fn signed_url(&self, _: &str, _: &str, _: u32) -> Result<String> {
                Ok(String::new())
            }
            async fn head_status(&self, _: &str) -> Result<u16> {
                Ok(200)
            }
            async fn list(&self, _: &str, _: &str) -> Result<Vec<String>> {
                Ok(Vec::new())
            }
            async fn delete(&self, _: &str, _: &[String]) -> Result<()> {
                Ok(())
            }
        }

        let err = FfmpegAdapter::new(
            Arc::new(NullStore),
            PathBuf::from("/nonexistent/path/to/ffmpeg"),
            "temp-files",
            "meditation-output",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        // A bare name is trusted to PATH
        assert!(FfmpegAdapter::new(
            Arc::new(NullStore),
            PathBuf::from("ffmpeg"),
            "temp-files",
            "meditation-output",
        )
        .is_ok());
    }
}
