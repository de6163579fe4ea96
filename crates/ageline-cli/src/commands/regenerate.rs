use ageline_application::AgeProgressionUseCase;
use ageline_core::session::RegenerateTarget;
use anyhow::Result;

pub async fn run(
    usecase: &AgeProgressionUseCase,
    session_id: &str,
    target: RegenerateTarget,
) -> Result<()> {
    let regeneration = usecase.regenerate_frame(session_id, target).await?;
    let invalidation = &regeneration.invalidation;

    println!("Regenerated {target}");
    if !invalidation.removed_frames.is_empty() {
        println!("Dropped frames for ages {:?}", invalidation.removed_frames);
    }
    if !invalidation.removed_transitions.is_empty() {
        let keys: Vec<String> = invalidation
            .removed_transitions
            .iter()
            .map(|k| k.to_string())
            .collect();
        println!("Dropped transitions {}", keys.join(", "));
    }
    if invalidation.final_video_removed {
        println!("Dropped the final video");
    }
    println!("Removed {} file(s)", regeneration.removed_files);
    Ok(())
}
