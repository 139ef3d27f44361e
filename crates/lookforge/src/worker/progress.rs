use serde::Serialize;
use tokio::sync::broadcast;

/// Running tally of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunProgress {
    pub succeeded: usize,
    pub failed: usize,
    pub total: usize,
}

impl RunProgress {
    pub fn done(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Events emitted by the bounded runner while a batch executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ProgressEvent {
    Started {
        total: usize,
        concurrency: usize,
    },
    /// One task finished. `slot` is its position in the submitted list.
    TaskFinished {
        slot: usize,
        ok: bool,
        progress: RunProgress,
    },
    Finished {
        progress: RunProgress,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Reports through `tracing`, one line per finished task.
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { total, concurrency } => {
                tracing::info!(total, concurrency, "batch started");
            }
            ProgressEvent::TaskFinished { slot, ok, progress } => {
                tracing::info!(
                    slot,
                    ok,
                    done = progress.done(),
                    total = progress.total,
                    "task finished"
                );
            }
            ProgressEvent::Finished { progress } => {
                tracing::info!(
                    succeeded = progress.succeeded,
                    failed = progress.failed,
                    total = progress.total,
                    "batch finished"
                );
            }
        }
    }
}

/// Forwards events to a broadcast channel. Sending with no subscribers is fine.
pub struct ChannelProgress {
    sender: broadcast::Sender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }
}

impl ProgressReporter for ChannelProgress {
    fn report(&self, event: ProgressEvent) {
        let _ = self.sender.send(event);
    }
}
