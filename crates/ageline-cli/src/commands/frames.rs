use ageline_application::AgeProgressionUseCase;
use ageline_core::job::{JobProgress, JobStatus};
use anyhow::{Result, bail};

use super::POLL_INTERVAL;

pub(crate) fn progress_line(progress: &JobProgress) -> String {
    format!(
        "[{}/{}] {}",
        progress.completed, progress.total, progress.message
    )
}

/// Runs a frame job to completion, printing progress as it changes.
///
/// The speculative transitions it started are awaited before returning so
/// their clips land in the manifest before the process exits.
pub async fn run(usecase: &AgeProgressionUseCase, session_id: &str) -> Result<()> {
    let ticket = usecase.start_frame_job(session_id).await?;
    println!("Frame job {} started ({} steps)", ticket.job_id, ticket.total_steps);

    let mut last_line = String::new();
    let snapshot = loop {
        let snapshot = usecase.frame_job_status(&ticket.job_id)?;
        let line = progress_line(&snapshot.progress);
        if line != last_line {
            println!("{line}");
            last_line = line;
        }
        if snapshot.status.is_finished() {
            break snapshot;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    };

    let settled = usecase.persist_speculative(session_id).await?;
    if settled > 0 {
        println!("Recorded {settled} transition(s) from speculative generation");
    }

    if snapshot.status == JobStatus::Failed {
        bail!(
            "frame job failed: {}",
            snapshot.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }
    println!("Generated {} frame(s)", snapshot.frames.len());
    Ok(())
}
