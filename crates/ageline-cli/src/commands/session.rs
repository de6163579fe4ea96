use ageline_application::{AgeProgressionUseCase, CreateSessionRequest, SessionStatus};
use ageline_core::session::{Age, BackgroundMode, GenderHint};
use anyhow::{Context, Result};
use std::path::PathBuf;

pub async fn create(
    usecase: &AgeProgressionUseCase,
    image: PathBuf,
    ages: Vec<Age>,
    background_mode: BackgroundMode,
    gender_hint: GenderHint,
) -> Result<()> {
    let manifest = usecase
        .create_session(CreateSessionRequest {
            reference_image: image,
            ages,
            background_mode,
            gender_hint,
        })
        .await
        .context("Failed to create session")?;

    println!("{}", manifest.session_id);
    Ok(())
}

pub async fn list(usecase: &AgeProgressionUseCase) -> Result<()> {
    for session_id in usecase.session_ids().await? {
        println!("{session_id}");
    }
    Ok(())
}

pub async fn status(usecase: &AgeProgressionUseCase, session_id: &str, json: bool) -> Result<()> {
    let status = usecase.session_status(session_id).await?;
    if json {
        let value = serde_json::json!({
            "manifest": status.manifest,
            "frameJob": status.frame_job,
            "videoJob": status.video_job,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print_summary(&status);
    }
    Ok(())
}

fn print_summary(status: &SessionStatus) {
    let manifest = &status.manifest;
    println!("Session:     {}", manifest.session_id);
    println!("Backdrop:    {:?}", manifest.background_mode);
    println!("Gender hint: {:?}", manifest.gender_hint);
    println!(
        "Ages:        {}",
        manifest
            .ages
            .iter()
            .map(|age| age.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    if manifest.requires_source_frame() {
        let state = if manifest.source_frame.is_some() { "ready" } else { "missing" };
        println!("Source:      {state}");
    }
    println!("Frames:      {}/{}", manifest.frames.len(), manifest.ages.len());
    println!(
        "Transitions: {}/{}",
        manifest.transitions.len(),
        manifest.required_pairs().len()
    );
    match &manifest.final_video {
        Some(video) => println!(
            "Video:       {} ({:.1}s, x{:.2})",
            video.video_path.display(),
            video.duration_secs,
            video.speed_factor
        ),
        None => println!("Video:       none"),
    }

    let frame_job = &status.frame_job;
    println!(
        "Frame job:   {:?} [{}/{}]{}",
        frame_job.status,
        frame_job.progress.completed,
        frame_job.progress.total,
        frame_job
            .error
            .as_deref()
            .map(|e| format!(" {e}"))
            .unwrap_or_default()
    );
    let video_job = &status.video_job;
    println!(
        "Video job:   {:?} ({:?}){}",
        video_job.status,
        video_job.stage,
        video_job
            .error
            .as_deref()
            .map(|e| format!(" {e}"))
            .unwrap_or_default()
    );
}
