use crate::foundation::core::display_path;
use crate::foundation::error::OverlordResult;
use crate::foundation::ticker::Ticker;
use crate::progress::estimator::{ProgressSample, ProgressTracker};
use crate::scan::scanner::{Artifact, Scanner};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

/// Notification pushed by the sampling loops.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// Periodic progress of the active session.
    Progress(ProgressSample),
    /// A different artifact is now the newest in the output tree.
    ArtifactUpdated(Artifact),
    /// The output tree is empty or unreadable. Sent once until an artifact appears.
    NoArtifacts,
}

/// Receiver of [`SessionEvent`]s.
///
/// Called from the sampling threads, so implementations must be cheap and must not block on the
/// controller.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SessionEvent);
}

/// Sink forwarding events into a std channel.
#[derive(Debug)]
pub struct ChannelSink {
    tx: Sender<SessionEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiving end the caller polls.
    pub fn new() -> (Self, Receiver<SessionEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: SessionEvent) {
        // A dropped receiver only means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

/// Sink that records every event, for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemoryEventSink {
    events: Mutex<Vec<SessionEvent>>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far.
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events
            .lock()
            .map(|g| g.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl EventSink for InMemoryEventSink {
    fn emit(&self, event: SessionEvent) {
        match self.events.lock() {
            Ok(mut g) => g.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Change detector behind the preview loop.
#[derive(Clone, Debug, Default)]
pub struct PreviewState {
    last_seen: Option<(PathBuf, SystemTime)>,
    reported_empty: bool,
}

impl PreviewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the newest artifact (or `None` when the tree is empty or unreadable).
    pub fn observe(&mut self, newest: Option<Artifact>) -> Option<SessionEvent> {
        match newest {
            Some(artifact) => {
                let seen = (artifact.path.clone(), artifact.modified);
                if self.last_seen.as_ref() == Some(&seen) {
                    return None;
                }
                self.last_seen = Some(seen);
                self.reported_empty = false;
                Some(SessionEvent::ArtifactUpdated(artifact))
            }
            None => {
                self.last_seen = None;
                if self.reported_empty {
                    return None;
                }
                self.reported_empty = true;
                Some(SessionEvent::NoArtifacts)
            }
        }
    }
}

/// Start the active-session loop: one [`SessionEvent::Progress`] per tick.
pub fn spawn_progress_loop(
    tracker: ProgressTracker,
    interval: Duration,
    sink: Arc<dyn EventSink>,
) -> OverlordResult<Ticker> {
    tracing::info!(
        output_dir = %display_path(&tracker.output_dir),
        expected = tracker.expected,
        baseline = tracker.baseline,
        "starting progress loop"
    );
    let mut last_logged: Option<u64> = None;
    Ticker::spawn("overlord-progress", interval, move || {
        let sample = tracker.sample();
        if last_logged != Some(sample.tree_artifacts) {
            tracing::info!(
                rendered = sample.rendered,
                remaining = sample.remaining,
                eta = %sample.eta.describe(),
                "progress"
            );
            last_logged = Some(sample.tree_artifacts);
        }
        sink.emit(SessionEvent::Progress(sample));
    })
}

/// Start the preview loop: reports when the newest artifact changes.
pub fn spawn_preview_loop(
    scanner: Scanner,
    output_dir: PathBuf,
    interval: Duration,
    sink: Arc<dyn EventSink>,
) -> OverlordResult<Ticker> {
    tracing::debug!(output_dir = %display_path(&output_dir), "starting preview loop");
    let mut state = PreviewState::new();
    Ticker::spawn("overlord-preview", interval, move || {
        let newest = scanner.newest(&output_dir, 1).into_iter().next();
        if let Some(event) = state.observe(newest) {
            if let SessionEvent::ArtifactUpdated(a) = &event {
                tracing::debug!(path = %display_path(&a.path), size = a.size, "newest artifact");
            }
            sink.emit(event);
        }
    })
}
