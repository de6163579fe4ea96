//! Speculative transition scheduler.
//!
//! Starts transition generation for a frame pair in the background and
//! hands back a shareable handle, so frame generation never waits on video
//! synthesis while the video job can later await exactly the clips it needs.
//!
//! A semaphore caps the number of generation calls in flight. Callers beyond
//! the cap wait for a permit; nothing is rejected and nothing is queued
//! outside the semaphore's own wait list.

use ageline_core::Outcome;
use ageline_core::error::Result;
use ageline_core::job::SpeculativeStatus;
use ageline_core::provider::TransitionPromptContext;
use ageline_core::session::{BackgroundMode, Frame, NarrativeTrack, PairKey, Transition};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::context::PipelineContext;

/// Awaitable result of one scheduled transition. Cloning is cheap and every
/// clone resolves to the same outcome.
pub type TransitionHandle = Shared<BoxFuture<'static, Outcome<Transition>>>;

/// One frame pair to bridge.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub from: Frame,
    pub to: Frame,
    pub background_mode: BackgroundMode,
    pub narrative_track: Option<NarrativeTrack>,
}

impl TransitionRequest {
    pub fn key(&self) -> PairKey {
        PairKey::new(self.from.age, self.to.age)
    }
}

#[derive(Default)]
struct SchedulerState {
    /// Every started pair, with its current status.
    statuses: BTreeMap<PairKey, SpeculativeStatus>,
    completed: BTreeMap<PairKey, Transition>,
    handles: BTreeMap<PairKey, TransitionHandle>,
}

fn lock(state: &Mutex<SchedulerState>) -> MutexGuard<'_, SchedulerState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// Decrements the in-flight counter when a generation call ends, however it ends.
struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
}

impl InFlightGuard {
    fn enter(in_flight: Arc<AtomicUsize>, peak: &AtomicUsize) -> Self {
        let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(current, Ordering::SeqCst);
        Self { in_flight }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Bounded-concurrency transition scheduler owned by one job.
pub struct TransitionScheduler {
    session_id: String,
    ctx: PipelineContext,
    limit: usize,
    permits: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    state: Arc<Mutex<SchedulerState>>,
}

impl TransitionScheduler {
    /// Creates a scheduler using the configured concurrency limit.
    pub fn new(session_id: impl Into<String>, ctx: PipelineContext) -> Self {
        let permits = Arc::new(Semaphore::new(ctx.config.transition_concurrency()));
        Self::with_permits(session_id, ctx, permits)
    }

    /// Creates a scheduler that draws from an existing permit pool, so two
    /// schedulers for one session stay under a single cap.
    pub fn with_permits(
        session_id: impl Into<String>,
        ctx: PipelineContext,
        permits: Arc<Semaphore>,
    ) -> Self {
        let limit = ctx.config.transition_concurrency();
        Self {
            session_id: session_id.into(),
            ctx,
            limit,
            permits,
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            state: Arc::new(Mutex::new(SchedulerState::default())),
        }
    }

    /// Starts generation for `request` unless its pair was already started.
    ///
    /// Returns the handle for the pair; a repeated request gets the handle
    /// of the first one.
    pub fn schedule(&self, request: TransitionRequest) -> TransitionHandle {
        let key = request.key();
        let mut state = lock(&self.state);
        if let Some(handle) = state.handles.get(&key) {
            return handle.clone();
        }
        state.statuses.insert(key, SpeculativeStatus::Running);

        let ctx = self.ctx.clone();
        let session_id = self.session_id.clone();
        let permits = self.permits.clone();
        let in_flight = self.in_flight.clone();
        let peak = self.peak.clone();
        let task_state = self.state.clone();

        let join = tokio::spawn(async move {
            let outcome = match permits.acquire_owned().await {
                Ok(_permit) => {
                    let _guard = InFlightGuard::enter(in_flight, &peak);
                    Outcome::from(generate_transition(&ctx, &session_id, &request).await)
                }
                Err(e) => Outcome::Failed(format!("scheduler closed: {e}")),
            };
            record(&task_state, &session_id, key, &outcome);
            outcome
        });

        let handle: TransitionHandle = async move {
            match join.await {
                Ok(outcome) => outcome,
                Err(e) => Outcome::Failed(format!("transition task aborted: {e}")),
            }
        }
        .boxed()
        .shared();

        state.handles.insert(key, handle.clone());
        tracing::debug!(
            session_id = %self.session_id,
            pair = %key,
            "[TransitionScheduler] Scheduled transition"
        );
        handle
    }

    /// Awaits every scheduled transition, giving up on those still running
    /// when `timeout` elapses.
    ///
    /// Timed-out pairs are reported as [`Outcome::Skipped`]; their tasks keep
    /// running.
    pub async fn await_pending(&self, timeout: Duration) -> Vec<(PairKey, Outcome<Transition>)> {
        let handles = self.handles();
        let deadline = tokio::time::Instant::now() + timeout;
        let mut outcomes = Vec::with_capacity(handles.len());

        for (key, handle) in handles {
            let outcome = match tokio::time::timeout_at(deadline, handle).await {
                Ok(outcome) => outcome,
                Err(_) => Outcome::Skipped(format!(
                    "transition {key} still running after {}s",
                    timeout.as_secs()
                )),
            };
            outcomes.push((key, outcome));
        }
        outcomes
    }

    /// Awaits every scheduled transition to completion.
    pub async fn await_all(&self) -> Vec<(PairKey, Outcome<Transition>)> {
        let handles = self.handles();
        let keys: Vec<PairKey> = handles.iter().map(|(k, _)| *k).collect();
        let outcomes = futures::future::join_all(handles.into_iter().map(|(_, h)| h)).await;
        keys.into_iter().zip(outcomes).collect()
    }

    fn handles(&self) -> Vec<(PairKey, TransitionHandle)> {
        lock(&self.state)
            .handles
            .iter()
            .map(|(k, h)| (*k, h.clone()))
            .collect()
    }

    /// Whether the pair has been started by this scheduler.
    pub fn is_started(&self, key: PairKey) -> bool {
        lock(&self.state).statuses.contains_key(&key)
    }

    /// Successfully generated transitions, in pair order.
    pub fn completed(&self) -> Vec<Transition> {
        lock(&self.state).completed.values().cloned().collect()
    }

    /// Status per started pair keyed by `from-to`.
    pub fn status_map(&self) -> BTreeMap<String, SpeculativeStatus> {
        lock(&self.state)
            .statuses
            .iter()
            .map(|(k, s)| (k.to_string(), *s))
            .collect()
    }

    /// Started pairs that have not finished yet.
    pub fn pending_count(&self) -> usize {
        lock(&self.state)
            .statuses
            .values()
            .filter(|s| **s == SpeculativeStatus::Running)
            .count()
    }

    /// Generation calls currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous generation calls observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn permits(&self) -> Arc<Semaphore> {
        self.permits.clone()
    }
}

fn record(
    state: &Mutex<SchedulerState>,
    session_id: &str,
    key: PairKey,
    outcome: &Outcome<Transition>,
) {
    let mut state = lock(state);
    match outcome {
        Outcome::Succeeded(transition) => {
            state.statuses.insert(key, SpeculativeStatus::Completed);
            state.completed.insert(key, transition.clone());
            tracing::debug!(
                session_id = %session_id,
                pair = %key,
                "[TransitionScheduler] Transition completed"
            );
        }
        Outcome::Failed(reason) | Outcome::Skipped(reason) => {
            state.statuses.insert(key, SpeculativeStatus::Failed);
            tracing::warn!(
                session_id = %session_id,
                pair = %key,
                "[TransitionScheduler] Transition failed: {}",
                reason
            );
        }
    }
}

/// Generates one transition clip and downloads it to the pair's path.
pub async fn generate_transition(
    ctx: &PipelineContext,
    session_id: &str,
    request: &TransitionRequest,
) -> Result<Transition> {
    let key = request.key();
    let prompt = ctx
        .collaborators
        .prompts
        .transition_prompt(&TransitionPromptContext {
            from_age: key.from_age,
            to_age: key.to_age,
            background_mode: request.background_mode,
            narrative_track: request.narrative_track,
        });

    let url = ctx
        .collaborators
        .transitions
        .generate_transition(
            &request.from.image_path,
            &request.to.image_path,
            &prompt,
            ctx.config.transition_duration_secs,
            &ctx.config.aspect_ratio,
        )
        .await?;

    let dest = ctx.paths.transition_path(session_id, key);
    ctx.collaborators.transitions.download(&url, &dest).await?;

    Ok(Transition {
        from_age: key.from_age,
        to_age: key.to_age,
        from_frame_id: request.from.id.clone(),
        to_frame_id: request.to.id.clone(),
        video_path: dest,
        prompt,
        created_at: chrono::Utc::now().to_rfc3339(),
    })
}
