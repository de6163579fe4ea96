//! Default prompt wording for the generation services.

use ageline_core::provider::{
    FramePromptContext, PromptBuilder, SourcePromptContext, TransitionPromptContext,
};
use ageline_core::session::{Age, BackgroundMode, GenderHint};

/// Plain-text prompt builder used when no custom wording is supplied.
#[derive(Debug, Clone, Default)]
pub struct DefaultPromptBuilder;

impl DefaultPromptBuilder {
    pub fn new() -> Self {
        Self
    }
}

fn subject(gender: GenderHint) -> &'static str {
    match gender {
        GenderHint::Male => "the same man",
        GenderHint::Female => "the same woman",
        GenderHint::Auto => "the same person",
    }
}

fn life_stage(age: Age) -> &'static str {
    match age {
        0..=2 => "a baby",
        3..=12 => "a child",
        13..=19 => "a teenager",
        20..=39 => "a young adult",
        40..=64 => "a middle-aged adult",
        _ => "an elderly person",
    }
}

impl PromptBuilder for DefaultPromptBuilder {
    fn source_prompt(&self, ctx: &SourcePromptContext) -> String {
        format!(
            "Portrait of {} from the reference photo, unchanged face and age, \
             centered, facing the camera, on a plain light-grey studio backdrop \
             with soft even lighting.",
            subject(ctx.gender_hint)
        )
    }

    fn frame_prompt(&self, ctx: &FramePromptContext) -> String {
        let mut prompt = format!(
            "Portrait of {} at age {}, shown as {}.",
            subject(ctx.gender_hint),
            ctx.age,
            life_stage(ctx.age)
        );

        match ctx.previous_age {
            Some(previous) => prompt.push_str(&format!(
                " Age the subject naturally from {previous} to {} years, keeping identity, \
                 face shape and eye color consistent with the input image.",
                ctx.age
            )),
            None => prompt.push_str(
                " Keep identity, face shape and eye color consistent with the input image.",
            ),
        }

        match (ctx.background_mode, ctx.narrative_track) {
            (BackgroundMode::Narrative, Some(track)) => prompt.push_str(&format!(
                " Scene {} of {} in a life story set in {}, with clothing and setting \
                 appropriate for the age.",
                ctx.index + 1,
                ctx.total,
                track.scene()
            )),
            _ => prompt.push_str(" Same framing and plain light-grey studio backdrop."),
        }
        prompt
    }

    fn transition_prompt(&self, ctx: &TransitionPromptContext) -> String {
        let setting = match (ctx.background_mode, ctx.narrative_track) {
            (BackgroundMode::Narrative, Some(track)) => {
                format!("while the scene in {} shifts smoothly", track.scene())
            }
            _ => "against a steady studio backdrop".to_string(),
        };
        format!(
            "Smooth continuous morph of one person aging from {} to {} years old {}, \
             steady camera, no cuts.",
            ctx.from_age, ctx.to_age, setting
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ageline_core::session::NarrativeTrack;

    fn frame_ctx(age: Age, previous_age: Option<Age>) -> FramePromptContext {
        FramePromptContext {
            age,
            previous_age,
            index: 1,
            total: 3,
            background_mode: BackgroundMode::Flat,
            gender_hint: GenderHint::Female,
            narrative_track: None,
        }
    }

    #[test]
    fn test_frame_prompt_mentions_age_and_subject() {
        let prompt = DefaultPromptBuilder::new().frame_prompt(&frame_ctx(30, Some(12)));
        assert!(prompt.contains("the same woman at age 30"));
        assert!(prompt.contains("from 12 to 30"));
        assert!(prompt.contains("studio backdrop"));
    }

    #[test]
    fn test_narrative_frame_prompt_uses_track() {
        let ctx = FramePromptContext {
            background_mode: BackgroundMode::Narrative,
            narrative_track: Some(NarrativeTrack::Seaside),
            ..frame_ctx(7, None)
        };
        let prompt = DefaultPromptBuilder::new().frame_prompt(&ctx);
        assert!(prompt.contains("Scene 2 of 3"));
        assert!(prompt.contains("a seaside town"));
    }

    #[test]
    fn test_transition_prompt() {
        let prompt = DefaultPromptBuilder::new().transition_prompt(&TransitionPromptContext {
            from_age: 7,
            to_age: 12,
            background_mode: BackgroundMode::Flat,
            narrative_track: None,
        });
        assert!(prompt.contains("from 7 to 12"));
    }
}
