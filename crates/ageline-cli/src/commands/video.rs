use ageline_application::AgeProgressionUseCase;
use ageline_core::job::JobStatus;
use anyhow::{Result, bail};

use super::POLL_INTERVAL;
use super::frames::progress_line;

/// Runs a video job to completion, printing stage changes.
pub async fn run(
    usecase: &AgeProgressionUseCase,
    session_id: &str,
    duration_secs: Option<f64>,
) -> Result<()> {
    let ticket = usecase.start_video_job(session_id, duration_secs).await?;
    println!("Video job {} started", ticket.job_id);

    let mut last_line = String::new();
    let snapshot = loop {
        let snapshot = usecase.video_job_status(&ticket.job_id)?;
        let line = format!("{:?} {}", snapshot.stage, progress_line(&snapshot.progress));
        if line != last_line {
            println!("{line}");
            last_line = line;
        }
        if snapshot.status.is_finished() {
            break snapshot;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    };

    if snapshot.status == JobStatus::Failed {
        bail!(
            "video job failed: {}",
            snapshot.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }
    if !snapshot.reused_pairs.is_empty() {
        println!("Reused {} transition(s)", snapshot.reused_pairs.len());
    }
    if let Some(video) = snapshot.final_video {
        println!(
            "{} ({:.1}s, x{:.2})",
            video.video_path.display(),
            video.duration_secs,
            video.speed_factor
        );
    }
    Ok(())
}
