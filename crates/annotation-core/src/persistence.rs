//! Save and upload scheduling
//!
//! Mutations schedule a debounced flush of the whole document. The sink is
//! fire-and-forget: it reports back through [`SinkOutcome`] whenever the
//! request settles. Failures are surfaced but never retried here; the
//! in-memory document stays as it is and the next mutation or an explicit
//! flush sends it again.

use framemark_config::{AnnotatorSettings, Endpoints};
use framemark_shared::FramemarkError;

use crate::document::{AnnotationDocument, Snapshot, SnapshotId};

#[derive(Clone, Debug, PartialEq)]
pub struct SaveRequest {
    pub url: String,
    /// Serialized annotation document
    pub body: String,
    pub revision: u64,
    pub video_id: Option<String>,
    pub share_token: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotUpload {
    pub url: String,
    pub snapshot_id: SnapshotId,
    pub time: f64,
    /// Data URL of the captured still
    pub image: String,
    pub video_id: Option<String>,
    pub share_token: Option<String>,
}

/// Host-side transport for saves and uploads
pub trait SaveSink {
    fn save_document(&mut self, request: SaveRequest);
    fn upload_snapshot(&mut self, upload: SnapshotUpload);
}

/// Settled sink request, fed back into the annotator
#[derive(Clone, Debug, PartialEq)]
pub enum SinkOutcome {
    Saved {
        revision: u64,
    },
    SaveFailed {
        revision: u64,
        message: String,
    },
    /// `url` is the stored location when the endpoint returns one
    Uploaded {
        snapshot_id: SnapshotId,
        url: Option<String>,
    },
    UploadFailed {
        snapshot_id: SnapshotId,
        message: String,
    },
}

#[derive(Clone, Debug, PartialEq, Default)]
pub enum FlushStatus {
    #[default]
    Idle,
    Pending {
        due_at: f64,
    },
    InFlight {
        revision: u64,
    },
    Saved {
        revision: u64,
    },
    Failed {
        revision: u64,
        message: String,
    },
}

/// Trailing-edge debounce on the host's millisecond clock
#[derive(Clone, Debug, PartialEq)]
pub struct FlushScheduler {
    debounce_ms: f64,
    due_at: Option<f64>,
}

impl FlushScheduler {
    pub fn new(debounce_ms: f64) -> Self {
        Self {
            debounce_ms: debounce_ms.max(0.0),
            due_at: None,
        }
    }

    /// Pushes the deadline out to `now + debounce`
    pub fn schedule(&mut self, now: f64) -> f64 {
        let due = now + self.debounce_ms;
        self.due_at = Some(due);
        due
    }

    pub fn due_at(&self) -> Option<f64> {
        self.due_at
    }

    pub fn is_due(&self, now: f64) -> bool {
        self.due_at.is_some_and(|due| now >= due)
    }

    pub fn cancel(&mut self) {
        self.due_at = None;
    }
}

pub struct Persistence {
    sink: Option<Box<dyn SaveSink>>,
    endpoints: Endpoints,
    video_id: Option<String>,
    share_token: Option<String>,
    scheduler: FlushScheduler,
    status: FlushStatus,
    /// Revision most recently handed to the sink; the loaded document
    /// counts as the baseline
    sent_revision: Option<u64>,
    /// Sink revision of the loaded document; store revisions are offset by
    /// it so requests for a replaced document never alias newer ones
    baseline: u64,
    highest_sent: u64,
}

impl Persistence {
    pub fn new(settings: &AnnotatorSettings, sink: Option<Box<dyn SaveSink>>) -> Self {
        let sink = if settings.read_only {
            if sink.is_some() {
                log::debug!("Read-only annotator, dropping save sink");
            }
            None
        } else {
            sink
        };
        Self {
            sink,
            endpoints: settings.endpoints.clone(),
            video_id: settings.identity.video_id.clone(),
            share_token: settings.identity.share_token.clone(),
            scheduler: FlushScheduler::new(settings.save_debounce_ms),
            status: FlushStatus::Idle,
            sent_revision: Some(0),
            baseline: 0,
            highest_sent: 0,
        }
    }

    /// Forgets pending work after the document was replaced wholesale;
    /// outcomes of requests sent before this are ignored
    pub fn rebase(&mut self) {
        self.scheduler.cancel();
        self.status = FlushStatus::Idle;
        self.baseline = self.highest_sent.max(self.baseline) + 1;
        self.sent_revision = Some(self.baseline);
    }

    pub fn can_save(&self) -> bool {
        self.sink.is_some() && self.endpoints.annotation_save_url.is_some()
    }

    pub fn status(&self) -> &FlushStatus {
        &self.status
    }

    pub fn next_due(&self) -> Option<f64> {
        self.scheduler.due_at()
    }

    pub fn schedule(&mut self, now: f64) {
        if !self.can_save() {
            return;
        }
        let due_at = self.scheduler.schedule(now);
        self.status = FlushStatus::Pending { due_at };
    }

    /// Flushes when the debounce deadline has passed
    pub fn tick(&mut self, now: f64, document: &AnnotationDocument, revision: u64) -> bool {
        if !self.scheduler.is_due(now) {
            return false;
        }
        self.flush_now(document, revision)
    }

    /// Sends the document unless this revision already went out
    pub fn flush_now(&mut self, document: &AnnotationDocument, revision: u64) -> bool {
        self.scheduler.cancel();
        let revision = self.baseline + revision;
        let (Some(sink), Some(url)) = (self.sink.as_mut(), &self.endpoints.annotation_save_url)
        else {
            return false;
        };
        if self.sent_revision == Some(revision) {
            if matches!(self.status, FlushStatus::Pending { .. }) {
                self.status = FlushStatus::Idle;
            }
            return false;
        }

        log::debug!("Flushing annotation document revision {revision}");
        sink.save_document(SaveRequest {
            url: url.clone(),
            body: document.to_json(),
            revision,
            video_id: self.video_id.clone(),
            share_token: self.share_token.clone(),
        });
        self.sent_revision = Some(revision);
        self.highest_sent = self.highest_sent.max(revision);
        self.status = FlushStatus::InFlight { revision };
        true
    }

    pub fn upload_snapshot(&mut self, snapshot: &Snapshot) -> bool {
        let (Some(sink), Some(url)) = (self.sink.as_mut(), &self.endpoints.snapshot_upload_url)
        else {
            return false;
        };
        log::debug!("Uploading snapshot {}", snapshot.id);
        sink.upload_snapshot(SnapshotUpload {
            url: url.clone(),
            snapshot_id: snapshot.id.clone(),
            time: snapshot.time,
            image: snapshot.image.url.clone(),
            video_id: self.video_id.clone(),
            share_token: self.share_token.clone(),
        });
        true
    }

    /// Records a settled save; failures come back as errors for the host
    pub fn settle_save(&mut self, revision: u64, result: Result<(), String>) -> Option<FramemarkError> {
        if revision < self.baseline {
            log::debug!("Ignoring save outcome for revision {revision} of a replaced document");
            return None;
        }
        match result {
            Ok(()) => {
                if matches!(self.status, FlushStatus::InFlight { revision: r } if r == revision) {
                    self.status = FlushStatus::Saved { revision };
                }
                None
            }
            Err(message) => {
                log::error!("Saving revision {revision} failed: {message}");
                // Allow an explicit flush to resend the same revision
                if self.sent_revision == Some(revision) {
                    self.sent_revision = None;
                }
                if !matches!(self.status, FlushStatus::Pending { .. }) {
                    self.status = FlushStatus::Failed {
                        revision,
                        message: message.clone(),
                    };
                }
                Some(FramemarkError::network(
                    message,
                    self.endpoints.annotation_save_url.as_deref(),
                ))
            }
        }
    }

    pub fn upload_failed(&self, snapshot_id: &str, message: String) -> FramemarkError {
        log::error!("Uploading snapshot {snapshot_id} failed: {message}");
        FramemarkError::network(message, self.endpoints.snapshot_upload_url.as_deref())
    }
}
