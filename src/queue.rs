//! Public entry point for the reconciliation engine.
//!
//! [`TranscriptQueue`] accepts segments and control operations, fans
//! enhancement work out under a concurrency cap, and republishes the
//! derived [`ReconciliationState`] on every change. All state mutation is
//! serialized through one reducer task consuming a command channel;
//! enhancement tasks never touch shared state, they report outcomes back
//! over their own channel.

use crate::config::ReconcilerConfig;
use crate::enhance::EnhancementService;
use crate::enhance::pipeline::{self, EnhancementContext, PipelineEvent};
use crate::error::{ProtoscribeError, Result};
use crate::segment::{SegmentInput, SegmentPatch, SegmentSource};
use crate::transcript::segmenter::split_long_segment;
use crate::transcript::state::{ReconciliationState, TranscriptStatistics};
use crate::transcript::store::ReconciliationStore;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc, oneshot, watch};
use tokio::task::AbortHandle;
use tracing::{debug, info};
use uuid::Uuid;

/// Placeholder text shown while a whole-recording transcription is in flight.
const FULL_RECORDING_PLACEHOLDER: &str = "[transcribing full recording]";

/// Operations accepted by the reducer.
enum Command {
    Add(SegmentInput),
    Update {
        id: String,
        patch: SegmentPatch,
    },
    Retry {
        id: String,
    },
    Clear,
    ProcessFullRecording {
        audio: Vec<u8>,
        session_id: String,
    },
    Statistics {
        reply: oneshot::Sender<TranscriptStatistics>,
    },
}

/// Handle to a running reconciliation engine.
///
/// Cheap to clone; all clones feed the same reducer. Dropping the last
/// clone closes the command channel and shuts the reducer down, aborting
/// in-flight enhancement tasks.
#[derive(Clone)]
pub struct TranscriptQueue {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ReconciliationState>,
}

impl TranscriptQueue {
    /// Spawns the reducer task and returns the facade.
    ///
    /// The enhancement service is an injected dependency so tests can swap
    /// in a scripted mock. Must be called within a tokio runtime.
    pub fn new(service: Arc<dyn EnhancementService>, config: ReconcilerConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(config.channel_capacity);
        let (event_tx, event_rx) = mpsc::channel(config.channel_capacity);
        let (state_tx, state_rx) = watch::channel(ReconciliationState::empty());

        let reducer = Reducer {
            store: ReconciliationStore::new(config.clone()),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_enhancements)),
            service,
            events: event_tx,
            state: state_tx,
            config,
            epoch: 0,
            tasks: Vec::new(),
        };
        tokio::spawn(reducer.run(command_rx, event_rx));

        Self {
            commands: command_tx,
            state: state_rx,
        }
    }

    /// Adds a segment, or replaces the segment with the same id.
    ///
    /// Oversized local segments are split before insertion; local segments
    /// carrying audio are submitted for enhancement. Returns `Err` only for
    /// invalid input shapes (inverted timing, confidence outside `[0, 1]`)
    /// or a shut-down queue.
    pub async fn add_segment(&self, input: SegmentInput) -> Result<()> {
        input.validate()?;
        self.send(Command::Add(input)).await
    }

    /// Merges fields into an existing segment; unknown ids are a no-op.
    pub async fn update_segment(&self, id: impl Into<String>, patch: SegmentPatch) -> Result<()> {
        let id = id.into();
        patch.validate(&id)?;
        self.send(Command::Update { id, patch }).await
    }

    /// Resets a failed local segment's retry budget and resubmits it.
    ///
    /// No-op for unknown ids, enhanced segments, and segments without
    /// retained audio.
    pub async fn retry_segment(&self, id: impl Into<String>) -> Result<()> {
        self.send(Command::Retry { id: id.into() }).await
    }

    /// Drops all segments and cancels in-flight enhancement work; results
    /// arriving for the cleared session are discarded.
    pub async fn clear(&self) -> Result<()> {
        self.send(Command::Clear).await
    }

    /// Submits the entire captured audio as one synthetic segment for
    /// holistic end-of-session re-transcription, bypassing segmentation.
    pub async fn process_full_recording(
        &self,
        audio: Vec<u8>,
        session_id: impl Into<String>,
    ) -> Result<()> {
        self.send(Command::ProcessFullRecording {
            audio,
            session_id: session_id.into(),
        })
        .await
    }

    /// Watch-style subscription; receives every published state.
    pub fn subscribe(&self) -> watch::Receiver<ReconciliationState> {
        self.state.clone()
    }

    /// The most recently published state.
    pub fn current_state(&self) -> ReconciliationState {
        self.state.borrow().clone()
    }

    /// Aggregate counters over the raw segment collection.
    pub async fn statistics(&self) -> Result<TranscriptStatistics> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Statistics { reply }).await?;
        rx.await.map_err(|_| ProtoscribeError::QueueClosed)
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ProtoscribeError::QueueClosed)
    }
}

/// Single writer over the reconciliation store.
struct Reducer {
    store: ReconciliationStore,
    service: Arc<dyn EnhancementService>,
    semaphore: Arc<Semaphore>,
    events: mpsc::Sender<PipelineEvent>,
    state: watch::Sender<ReconciliationState>,
    config: ReconcilerConfig,
    /// Session counter; bumped by clear() to invalidate in-flight results.
    epoch: u64,
    tasks: Vec<AbortHandle>,
}

impl Reducer {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::Receiver<PipelineEvent>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    // All facade handles dropped: shut down.
                    None => break,
                },
                Some(event) = events.recv() => self.handle_event(event),
            }
            self.tasks.retain(|task| !task.is_finished());
            self.publish();
        }

        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Add(input) => self.add_segment(input),
            Command::Update { id, patch } => {
                if !self.store.apply_patch(&id, patch) {
                    debug!(segment = %id, "update for unknown segment ignored");
                }
            }
            Command::Retry { id } => self.retry_segment(&id),
            Command::Clear => self.clear(),
            Command::ProcessFullRecording { audio, session_id } => {
                self.process_full_recording(audio, session_id);
            }
            Command::Statistics { reply } => {
                let _ = reply.send(self.store.statistics());
            }
        }
    }

    fn handle_event(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::Enhanced { id, epoch, text } => {
                if epoch != self.epoch {
                    debug!(segment = %id, "dropping enhancement result from cleared session");
                    return;
                }
                if self.store.apply_enhancement(&id, text) {
                    debug!(segment = %id, "segment enhanced");
                }
            }
            PipelineEvent::AttemptFailed { id, epoch } => {
                if epoch != self.epoch {
                    return;
                }
                self.store.record_attempt_failure(&id);
            }
            PipelineEvent::GaveUp { id, epoch, audio } => {
                if epoch != self.epoch {
                    return;
                }
                self.store.settle_failure(&id, Some(audio));
            }
            PipelineEvent::Degenerate { id, epoch } => {
                if epoch != self.epoch {
                    return;
                }
                self.store.settle_degenerate(&id);
            }
        }
    }

    fn add_segment(&mut self, input: SegmentInput) {
        let id = input
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let segment = input.into_segment(id.clone(), Utc::now());

        if segment.source == SegmentSource::Local
            && segment.word_count > self.config.max_segment_words
        {
            debug!(
                segment = %id,
                words = segment.word_count,
                limit = self.config.max_segment_words,
                "splitting oversized local segment"
            );
            for chunk in split_long_segment(&segment, self.config.max_segment_words) {
                self.store.upsert(chunk);
            }
            return;
        }

        let local = segment.source == SegmentSource::Local;
        self.store.upsert(segment);
        if local {
            self.dispatch(&id);
        }
    }

    /// Submits a segment's retained audio for enhancement if it is eligible:
    /// local, not already in flight, retry budget left.
    fn dispatch(&mut self, id: &str) {
        let Some(segment) = self.store.get(id) else {
            return;
        };
        if segment.source == SegmentSource::Enhanced
            || segment.is_pending
            || segment.retry_count >= self.config.max_enhancement_retries
        {
            return;
        }
        let Some(audio) = self.store.take_payload(id) else {
            return;
        };
        self.spawn_task(id.to_string(), audio);
    }

    fn retry_segment(&mut self, id: &str) {
        match self.store.begin_manual_retry(id) {
            Some(audio) => {
                info!(segment = %id, "manual enhancement retry");
                self.spawn_task(id.to_string(), audio);
            }
            None => {
                debug!(segment = %id, "retry ignored: unknown, enhanced, or no retained audio");
            }
        }
    }

    fn spawn_task(&mut self, id: String, audio: Vec<u8>) {
        // Pending is visible before the network call starts.
        self.store.set_pending(&id, true);
        debug!(segment = %id, service = self.service.name(), "dispatching enhancement");

        let ctx = EnhancementContext {
            service: self.service.clone(),
            semaphore: self.semaphore.clone(),
            events: self.events.clone(),
            max_retries: self.config.max_enhancement_retries,
            base_delay: self.config.retry_base_delay(),
        };
        let handle = tokio::spawn(pipeline::run(ctx, self.epoch, id, audio));
        self.tasks.push(handle.abort_handle());
    }

    fn clear(&mut self) {
        info!(segments = self.store.len(), "clearing session");
        self.epoch += 1;
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.store.clear();
    }

    fn process_full_recording(&mut self, audio: Vec<u8>, session_id: String) {
        let id = format!("full-recording-{session_id}");
        info!(segment = %id, bytes = audio.len(), "submitting full recording for transcription");

        let segment = SegmentInput::new(FULL_RECORDING_PLACEHOLDER)
            .with_start(0.0)
            .with_payload(audio)
            .into_segment(id.clone(), Utc::now());
        self.store.upsert(segment);
        self.dispatch(&id);
    }

    fn publish(&self) {
        let _ = self.state.send(self.store.derive());
    }
}
