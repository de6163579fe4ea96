//! ffmpeg/ffprobe driven transcoder.
//!
//! Argument and filter-graph construction are pure functions so they can be
//! checked without the binaries installed; only [`FfmpegTranscoder`] spawns
//! processes.

use ageline_core::config::ProviderConfig;
use ageline_core::error::{AgelineError, Result};
use ageline_core::provider::{AssemblyRequest, Transcoder};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Keeps the tail of a long stderr capture.
const MAX_STDERR_CHARS: usize = 4000;

/// Builds the `-filter_complex` graph for an assembly request.
///
/// Every input is scaled to fit the target box, padded to exactly
/// `width`x`height`, given square pixels and a common frame rate, then the
/// normalized streams are concatenated and retimed by `speed_factor`.
pub fn build_filter_graph(request: &AssemblyRequest) -> String {
    let (w, h, fps) = (request.width, request.height, request.fps);
    let mut graph = String::new();

    for index in 0..request.inputs.len() {
        graph.push_str(&format!(
            "[{index}:v]scale={w}:{h}:force_original_aspect_ratio=decrease,\
             pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps}[v{index}];"
        ));
    }
    for index in 0..request.inputs.len() {
        graph.push_str(&format!("[v{index}]"));
    }
    graph.push_str(&format!(
        "concat=n={}:v=1:a=0[cat];",
        request.inputs.len()
    ));

    if (request.speed_factor - 1.0).abs() < f64::EPSILON {
        graph.push_str("[cat]setpts=PTS-STARTPTS[out]");
    } else {
        graph.push_str(&format!(
            "[cat]setpts=PTS/{:.6}[out]",
            request.speed_factor
        ));
    }
    graph
}

/// Temporary output path next to the final file.
pub fn temp_output_path(output: &Path) -> PathBuf {
    let file_name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output.mp4".to_string());
    output.with_file_name(format!(".{file_name}.tmp.mp4"))
}

/// Full ffmpeg argument list writing to `output`.
pub fn build_assemble_args(request: &AssemblyRequest, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = ["-y", "-hide_banner", "-loglevel", "error"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    for input in &request.inputs {
        args.push("-i".to_string());
        args.push(input.to_string_lossy().into_owned());
    }

    args.extend([
        "-filter_complex".to_string(),
        build_filter_graph(request),
        "-map".to_string(),
        "[out]".to_string(),
        "-an".to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-r".to_string(),
        request.fps.to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        output.to_string_lossy().into_owned(),
    ]);
    args
}

/// ffprobe arguments printing only the container duration.
pub fn build_duration_args(clip: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-show_entries".to_string(),
        "format=duration".to_string(),
        "-of".to_string(),
        "default=noprint_wrappers=1:nokey=1".to_string(),
        clip.to_string_lossy().into_owned(),
    ]
}

/// Parses ffprobe's duration output.
pub fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
}

fn tail(text: &str) -> String {
    let count = text.chars().count();
    if count <= MAX_STDERR_CHARS {
        text.to_string()
    } else {
        text.chars().skip(count - MAX_STDERR_CHARS).collect()
    }
}

/// Transcoder spawning the configured ffmpeg and ffprobe binaries.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(config.ffmpeg_path.clone(), config.ffprobe_path.clone())
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn clip_duration(&self, clip: &Path) -> Result<f64> {
        let output = Command::new(&self.ffprobe)
            .args(build_duration_args(clip))
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                AgelineError::assembly(format!("Failed to run {}: {e}", self.ffprobe), "")
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(AgelineError::assembly(
                format!("ffprobe failed for {}", clip.display()),
                tail(&stderr),
            ));
        }

        parse_duration(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
            AgelineError::assembly(
                format!("ffprobe reported no duration for {}", clip.display()),
                tail(&stderr),
            )
        })
    }

    async fn assemble(&self, request: &AssemblyRequest) -> Result<()> {
        if request.inputs.is_empty() {
            return Err(AgelineError::invalid_state("no clips to assemble"));
        }
        if let Some(parent) = request.output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_output = temp_output_path(&request.output);
        let args = build_assemble_args(request, &tmp_output);
        tracing::debug!(
            "[Ffmpeg] Assembling {} clip(s) at speed {:.3} into {}",
            request.inputs.len(),
            request.speed_factor,
            request.output.display()
        );

        let output = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                AgelineError::assembly(format!("Failed to run {}: {e}", self.ffmpeg), "")
            })?;

        if !output.status.success() {
            let _ = tokio::fs::remove_file(&tmp_output).await;
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AgelineError::assembly(
                format!("ffmpeg exited with {}", output.status),
                tail(&stderr),
            ));
        }

        tokio::fs::rename(&tmp_output, &request.output).await?;
        Ok(())
    }
}
