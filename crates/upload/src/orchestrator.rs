//! Upload orchestrator: the batch state machine and its chunk scheduler.
//!
//! One driver task drains the queue chunk by chunk. Between chunks it checks
//! the stop flag, then the pause flag; on either it parks (exits) under the
//! state lock, and `resume()` spawns a fresh driver under the same lock.
//! A dispatched chunk always runs to completion.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use formbatch_protocol::{FormPreview, FormsList, Request, ValidationVerdict};
use formbatch_transfer::{ConcurrencyWindow, FileHandle, FileId, ThroughputMeter};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connection::{FormsConnection, ensure_success};
use crate::error::UploadError;
use crate::selection::Selection;
use crate::session::{
    SESSION_VERSION, SessionProgress, SessionRecorder, SessionStore, UploadSessionState,
};
use crate::status::{Controls, FileRow, FileStatus, StatusView};
use crate::transport::{Outcome, OutcomeKind, Transport};
use crate::types::{
    FileFailure, RecoveryNotice, UploadEvent, UploadSettings, UploadState, UploadSummary,
};

/// Drives a batch through the upload flow.
pub struct UploadOrchestrator {
    inner: Arc<Inner>,
    events_rx: Option<mpsc::UnboundedReceiver<UploadEvent>>,
}

struct Inner {
    conn: Arc<dyn FormsConnection>,
    transport: Transport,
    recorder: SessionRecorder,
    window: ConcurrencyWindow,
    meter: ThroughputMeter,
    core: Mutex<Core>,
    driver_watch: watch::Sender<bool>,
    events_tx: mpsc::UnboundedSender<UploadEvent>,
}

#[derive(Default)]
struct Core {
    state: UploadState,
    queue: Vec<FileHandle>,
    cursor: usize,
    processed: Vec<FileId>,
    succeeded: u32,
    failed: u32,
    failures: Vec<FileFailure>,
    validation_results: HashMap<FileId, ValidationVerdict>,
    all_valid: bool,
    rows: HashMap<FileId, FileStatus>,
    previews: HashMap<FileId, FormPreview>,
    paused: bool,
    stopped: bool,
    cancel: CancellationToken,
    /// Id of the most recently spawned driver.
    driver: u64,
    driver_active: bool,
}

impl Core {
    fn snapshot(&self) -> UploadSessionState {
        UploadSessionState {
            version: SESSION_VERSION,
            active: matches!(self.state, UploadState::Uploading | UploadState::Paused),
            paused: self.paused,
            stopped: self.stopped,
            queue: self.queue.iter().map(FileHandle::descriptor).collect(),
            processed: self.processed.clone(),
            cursor: self.cursor,
            progress: SessionProgress {
                current: self.cursor,
                total: self.queue.len(),
            },
            validation_results: self.validation_results.clone(),
            all_valid: self.all_valid,
            succeeded: self.succeeded,
            failed: self.failed,
            failures: self.failures.clone(),
            saved_at: Utc::now(),
        }
    }

    fn progress(&self) -> (usize, usize) {
        (self.cursor, self.queue.len())
    }
}

/// Clears `driver_active` if its driver exits without parking.
struct DriverGuard<'a> {
    inner: &'a Inner,
    id: u64,
}

impl Drop for DriverGuard<'_> {
    fn drop(&mut self) {
        let mut core = self.inner.core();
        if core.driver == self.id && core.driver_active {
            self.inner.set_driver(&mut core, false);
        }
    }
}

impl UploadOrchestrator {
    pub fn new(
        conn: Arc<dyn FormsConnection>,
        store: impl SessionStore + 'static,
        settings: UploadSettings,
    ) -> Self {
        // Unbounded: terminal events must reach a consumer that fell behind.
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (driver_watch, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                transport: Transport::new(Arc::clone(&conn)),
                conn,
                recorder: SessionRecorder::new(store).with_horizon(settings.staleness_horizon),
                window: ConcurrencyWindow::new(settings.max_concurrent),
                meter: ThroughputMeter::default(),
                core: Mutex::new(Core::default()),
                driver_watch,
                events_tx,
            }),
            events_rx: Some(events_rx),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<UploadEvent>> {
        self.events_rx.take()
    }

    pub fn state(&self) -> UploadState {
        self.inner.core().state
    }

    pub fn window(&self) -> ConcurrencyWindow {
        self.inner.window
    }

    /// Starts uploading the selection.
    ///
    /// Allowed from `Idle` or `Completed`, and only once validation
    /// reported every file valid. Must be called inside a tokio runtime.
    pub fn start(&self, selection: &Selection) -> Result<(), UploadError> {
        if selection.is_empty() {
            return Err(UploadError::EmptySelection);
        }
        if !selection.all_valid() {
            return Err(UploadError::NotValidated);
        }

        let queue = selection.files().snapshot();
        let total = queue.len();
        {
            let mut core = self.inner.core();
            if !matches!(core.state, UploadState::Idle | UploadState::Completed)
                || core.driver_active
            {
                return Err(UploadError::InvalidTransition {
                    action: "start",
                    state: core.state,
                });
            }

            let rows = queue.iter().map(|f| (f.id, FileStatus::Pending)).collect();
            let previews = queue
                .iter()
                .filter_map(|f| selection.preview(f.id).map(|p| (f.id, p.clone())))
                .collect();
            let driver = core.driver;
            *core = Core {
                state: UploadState::Uploading,
                queue,
                validation_results: selection.verdicts().clone(),
                all_valid: true,
                rows,
                previews,
                driver,
                ..Core::default()
            };
            self.inner.meter.start();
            self.inner.emit(UploadEvent::Started { total });
            Inner::spawn_driver(&self.inner, &mut core);
        }

        self.inner.persist();
        info!(files = total, window = self.inner.window.max_concurrent(), "upload started");
        Ok(())
    }

    /// Pauses after the in-flight chunk settles.
    ///
    /// Rejected once every chunk has settled; the batch is completing.
    pub fn pause(&self) -> Result<(), UploadError> {
        let (current, total) = {
            let mut core = self.inner.core();
            if core.state != UploadState::Uploading || core.cursor >= core.queue.len() {
                return Err(UploadError::InvalidTransition {
                    action: "pause",
                    state: core.state,
                });
            }
            core.paused = true;
            core.state = UploadState::Paused;
            core.progress()
        };

        self.inner.persist();
        self.inner.emit(UploadEvent::Paused { current, total });
        info!(current, total, "upload paused");
        Ok(())
    }

    /// Resumes from the cursor, relaunching the driver if it parked.
    pub fn resume(&self) -> Result<(), UploadError> {
        let (current, total) = {
            let mut core = self.inner.core();
            if core.state != UploadState::Paused {
                return Err(UploadError::InvalidTransition {
                    action: "resume",
                    state: core.state,
                });
            }
            core.paused = false;
            core.state = UploadState::Uploading;
            let (current, total) = core.progress();
            self.inner.emit(UploadEvent::Resumed { current, total });
            if !core.driver_active {
                self.inner.meter.start();
                Inner::spawn_driver(&self.inner, &mut core);
            }
            (current, total)
        };

        self.inner.persist();
        info!(current, total, "upload resumed");
        Ok(())
    }

    /// Stops the batch: no further chunks are dispatched, in-flight requests
    /// are signalled, and the call returns once the driver has exited and
    /// the session is cleared. Calling it when nothing runs is a no-op.
    pub async fn cancel(&self) -> Result<(), UploadError> {
        let first = {
            let mut core = self.inner.core();
            match core.state {
                UploadState::Uploading | UploadState::Paused => {
                    core.state = UploadState::Cancelled;
                    core.stopped = true;
                    core.paused = false;
                    core.cancel.cancel();
                    true
                }
                UploadState::Cancelled => false,
                UploadState::Idle | UploadState::Completed => return Ok(()),
            }
        };

        self.join().await;
        if !first {
            return Ok(());
        }

        let (current, total) = {
            let guard = self.inner.recorder.lock();
            let progress = {
                let mut core = self.inner.core();
                core.state = UploadState::Idle;
                for status in core.rows.values_mut() {
                    if matches!(status, FileStatus::Pending | FileStatus::InFlight) {
                        *status = FileStatus::Cancelled;
                    }
                }
                core.progress()
            };
            if let Err(e) = guard.clear() {
                warn!(error = %e, "could not clear upload session");
            }
            progress
        };

        self.inner.meter.reset();
        self.inner.emit(UploadEvent::Cancelled { current, total });
        info!(current, total, "upload cancelled");
        Ok(())
    }

    /// Waits until no driver task is running.
    pub async fn join(&self) {
        let mut rx = self.inner.driver_watch.subscribe();
        let _ = rx.wait_for(|active| !*active).await;
    }

    /// Loads a persisted session, if a live one exists, and holds it paused.
    ///
    /// Only acts while `Idle`. Nothing is dispatched until `resume()`.
    pub fn restore(&self) -> Option<RecoveryNotice> {
        {
            let core = self.inner.core();
            if core.state != UploadState::Idle || core.driver_active {
                return None;
            }
        }
        let snapshot = self.inner.recorder.restore()?;

        let queue: Vec<FileHandle> = snapshot
            .queue
            .into_iter()
            .map(FileHandle::from_descriptor)
            .collect();
        let failed: HashMap<FileId, String> = snapshot
            .failures
            .iter()
            .map(|f| (f.file_id, f.error.clone()))
            .collect();
        let rows = queue
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let status = if let Some(error) = failed.get(&f.id) {
                    FileStatus::Failed {
                        error: error.clone(),
                    }
                } else if i < snapshot.cursor {
                    FileStatus::Committed { form_id: None }
                } else {
                    FileStatus::Pending
                };
                (f.id, status)
            })
            .collect();

        let notice = RecoveryNotice {
            processed: snapshot.cursor,
            total: queue.len(),
            succeeded: snapshot.succeeded,
            failed: snapshot.failed,
            saved_at: snapshot.saved_at,
            unavailable: queue[snapshot.cursor..]
                .iter()
                .filter(|f| !f.is_readable())
                .count(),
        };

        {
            let mut core = self.inner.core();
            if core.state != UploadState::Idle || core.driver_active {
                return None;
            }
            let driver = core.driver;
            *core = Core {
                state: UploadState::Paused,
                queue,
                cursor: snapshot.cursor,
                processed: snapshot.processed,
                succeeded: snapshot.succeeded,
                failed: snapshot.failed,
                failures: snapshot.failures,
                validation_results: snapshot.validation_results,
                all_valid: snapshot.all_valid,
                rows,
                paused: true,
                driver,
                ..Core::default()
            };
        }

        info!(
            processed = notice.processed,
            total = notice.total,
            unavailable = notice.unavailable,
            "upload session recovered"
        );
        self.inner.emit(UploadEvent::Recovered(notice.clone()));
        Some(notice)
    }

    /// Display projection; `selection` supplies the files and verdicts
    /// shown before a batch is queued.
    pub fn status(&self, selection: &Selection) -> StatusView {
        let core = self.inner.core();
        let files = if core.queue.is_empty() {
            selection
                .files()
                .iter()
                .map(|f| FileRow {
                    id: f.id,
                    name: f.name.clone(),
                    status: match selection.verdict(f.id) {
                        Some(v) if v.valid => FileStatus::Valid,
                        Some(_) => FileStatus::Invalid,
                        None => FileStatus::Selected,
                    },
                    preview: selection.preview(f.id).cloned(),
                })
                .collect()
        } else {
            core.queue
                .iter()
                .map(|f| FileRow {
                    id: f.id,
                    name: f.name.clone(),
                    status: core.rows.get(&f.id).cloned().unwrap_or(FileStatus::Pending),
                    preview: core.previews.get(&f.id).cloned(),
                })
                .collect()
        };

        let (current, total) = core.progress();
        StatusView {
            state: core.state,
            current,
            total,
            succeeded: core.succeeded,
            failed: core.failed,
            eta: (core.state == UploadState::Uploading)
                .then(|| self.inner.meter.eta(total - current))
                .flatten(),
            files,
            controls: Controls::for_state(core.state, !selection.is_empty(), selection.all_valid()),
        }
    }
}

impl Inner {
    fn core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_driver(&self, core: &mut Core, active: bool) {
        core.driver_active = active;
        self.driver_watch.send_replace(active);
    }

    /// Spawns a driver. Caller holds the core lock.
    fn spawn_driver(inner: &Arc<Inner>, core: &mut Core) {
        core.driver += 1;
        inner.set_driver(core, true);
        tokio::spawn(drive(Arc::clone(inner), core.driver));
    }

    fn emit(&self, event: UploadEvent) {
        if self.events_tx.send(event).is_err() {
            debug!("no event receiver");
        }
    }

    /// Writes the current snapshot unless the batch was stopped.
    fn persist(&self) {
        let guard = self.recorder.lock();
        let snapshot = {
            let core = self.core();
            if core.stopped {
                return;
            }
            core.snapshot()
        };
        if let Err(e) = guard.save(&snapshot) {
            warn!(error = %e, "could not save upload session");
        }
    }

    /// Applies a settled chunk. Returns `false` if this driver was replaced.
    fn record_chunk(&self, id: u64, chunk_len: usize, outcomes: Vec<Outcome>) -> bool {
        let mut events = Vec::with_capacity(outcomes.len() + 1);
        let (current, total) = {
            let mut core = self.core();
            if core.driver != id {
                return false;
            }
            for outcome in outcomes {
                match outcome.kind {
                    OutcomeKind::Committed { form_id, previews } => {
                        core.succeeded += 1;
                        core.processed.push(outcome.file_id);
                        core.rows.insert(
                            outcome.file_id,
                            FileStatus::Committed {
                                form_id: form_id.clone(),
                            },
                        );
                        if let Some(preview) = previews.first() {
                            core.previews.insert(outcome.file_id, preview.clone());
                        }
                        debug!(file = %outcome.name, form_id = ?form_id, "file committed");
                        events.push(UploadEvent::FileCommitted {
                            file_id: outcome.file_id,
                            name: outcome.name,
                            form_id,
                            previews,
                        });
                    }
                    OutcomeKind::Failed { error } => {
                        core.failed += 1;
                        core.processed.push(outcome.file_id);
                        core.rows.insert(
                            outcome.file_id,
                            FileStatus::Failed {
                                error: error.clone(),
                            },
                        );
                        core.failures.push(FileFailure {
                            file_id: outcome.file_id,
                            name: outcome.name.clone(),
                            error: error.clone(),
                        });
                        events.push(UploadEvent::FileFailed {
                            file_id: outcome.file_id,
                            name: outcome.name,
                            error,
                        });
                    }
                    OutcomeKind::Cancelled => {
                        core.rows.insert(outcome.file_id, FileStatus::Cancelled);
                    }
                }
            }
            core.cursor += chunk_len;
            core.progress()
        };

        self.meter.add_sample(chunk_len as u32);
        events.push(UploadEvent::Progress { current, total });
        for event in events {
            self.emit(event);
        }
        true
    }

    /// Marks the batch completed, clears the session and reloads the list.
    async fn complete(&self, id: u64) {
        let summary = {
            let guard = self.recorder.lock();
            let summary = {
                let mut core = self.core();
                if core.driver != id || core.stopped {
                    return;
                }
                core.state = UploadState::Completed;
                core.paused = false;
                UploadSummary {
                    total: core.queue.len(),
                    succeeded: core.succeeded,
                    failed: core.failed,
                    failures: core.failures.clone(),
                }
            };
            if let Err(e) = guard.clear() {
                warn!(error = %e, "could not clear upload session");
            }
            summary
        };

        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "upload completed"
        );
        self.emit(UploadEvent::Completed(summary));

        match self.reload_forms().await {
            Ok(list) => self.emit(UploadEvent::FormsReloaded(list)),
            Err(e) => warn!(error = %e, "could not reload forms after upload"),
        }
    }

    async fn reload_forms(&self) -> Result<FormsList, UploadError> {
        let response = ensure_success(self.conn.send_request(Request::list_forms()).await?)?;
        Ok(response.parse_payload()?)
    }
}

/// Driver task: drains the queue from the cursor one chunk at a time.
async fn drive(inner: Arc<Inner>, id: u64) {
    let _guard = DriverGuard { inner: &inner, id };
    let k = inner.window.max_concurrent();

    loop {
        let (files, cancel, index) = {
            let mut core = inner.core();
            if core.driver != id {
                return;
            }
            if core.stopped {
                inner.set_driver(&mut core, false);
                debug!(cursor = core.cursor, "driver stopped");
                return;
            }
            if core.paused {
                inner.set_driver(&mut core, false);
                debug!(cursor = core.cursor, "driver parked");
                return;
            }
            let Some(range) = inner.window.next_chunk(core.cursor, core.queue.len()) else {
                break;
            };
            let index = range.start.div_ceil(k);
            let files = core.queue[range].to_vec();
            for f in &files {
                core.rows.insert(f.id, FileStatus::InFlight);
            }
            (files, core.cancel.clone(), index)
        };

        debug!(chunk = index, files = files.len(), "chunk dispatched");
        inner.emit(UploadEvent::ChunkStarted {
            index,
            files: files.iter().map(|f| f.id).collect(),
        });

        let outcomes =
            ConcurrencyWindow::settle(files.iter().map(|f| inner.transport.commit(f, &cancel)))
                .await;

        if !inner.record_chunk(id, files.len(), outcomes) {
            return;
        }
        debug!(chunk = index, "chunk settled");
        inner.persist();
    }

    inner.complete(id).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemoryStore;
    use formbatch_protocol::Response;
    use formbatch_transfer::XLSX_MIME;
    use std::future::Future;
    use std::pin::Pin;

    struct OkConn;

    impl FormsConnection for OkConn {
        fn send_request(
            &self,
            request: Request,
        ) -> Pin<Box<dyn Future<Output = Result<Response, UploadError>> + Send + '_>> {
            Box::pin(async move {
                let body = match request.endpoint {
                    formbatch_protocol::Endpoint::ListForms => r#"{"forms":[],"count":0}"#,
                    _ => r#"{"form":{"id":"x","title":"T"}}"#,
                };
                Ok(Response::new(200, body))
            })
        }
    }

    fn orchestrator() -> UploadOrchestrator {
        UploadOrchestrator::new(Arc::new(OkConn), MemoryStore::new(), UploadSettings::default())
    }

    fn validated(n: usize) -> Selection {
        let mut sel = Selection::new();
        sel.add((0..n).map(|i| FileHandle::from_bytes(format!("f{i}.xlsx"), XLSX_MIME, vec![1u8])));
        let ids: Vec<_> = sel.files().iter().map(|f| f.id).collect();
        for id in ids {
            sel.record(
                id,
                ValidationVerdict {
                    valid: true,
                    message: "ok".into(),
                    errors: vec![],
                    warnings: vec![],
                    metadata: None,
                },
            );
        }
        sel.recompute_all_valid();
        sel
    }

    #[tokio::test]
    async fn start_requires_validation() {
        let orch = orchestrator();
        let mut sel = Selection::new();
        assert!(matches!(orch.start(&sel), Err(UploadError::EmptySelection)));

        sel.add([FileHandle::from_bytes("a.xlsx", XLSX_MIME, vec![1u8])]);
        assert!(matches!(orch.start(&sel), Err(UploadError::NotValidated)));
        assert_eq!(orch.state(), UploadState::Idle);
    }

    #[tokio::test]
    async fn pause_and_resume_need_matching_state() {
        let orch = orchestrator();
        assert!(matches!(
            orch.pause(),
            Err(UploadError::InvalidTransition { action: "pause", state: UploadState::Idle })
        ));
        assert!(matches!(
            orch.resume(),
            Err(UploadError::InvalidTransition { action: "resume", .. })
        ));
    }

    #[tokio::test]
    async fn cancel_when_idle_is_noop() {
        let mut orch = orchestrator();
        let mut events = orch.take_events().unwrap();
        orch.cancel().await.unwrap();
        orch.cancel().await.unwrap();
        assert_eq!(orch.state(), UploadState::Idle);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn runs_to_completion_and_can_restart() {
        let orch = orchestrator();
        let sel = validated(4);
        orch.start(&sel).unwrap();
        assert!(matches!(
            orch.start(&sel),
            Err(UploadError::InvalidTransition { action: "start", .. })
        ));

        orch.join().await;
        assert_eq!(orch.state(), UploadState::Completed);
        let view = orch.status(&sel);
        assert_eq!((view.current, view.total), (4, 4));
        assert_eq!(view.succeeded, 4);
        assert!(view.controls.can_start);

        orch.start(&sel).unwrap();
        orch.join().await;
        assert_eq!(orch.state(), UploadState::Completed);
    }

    #[tokio::test]
    async fn status_before_start_reflects_verdicts() {
        let orch = orchestrator();
        let sel = validated(2);
        let view = orch.status(&sel);
        assert_eq!(view.state, UploadState::Idle);
        assert!(view.files.iter().all(|r| r.status == FileStatus::Valid));
        assert!(view.controls.can_start && view.controls.can_validate);
        assert!(!view.controls.can_pause);
    }

    #[tokio::test]
    async fn pause_rejected_once_queue_is_drained() {
        let mut orch = orchestrator();
        let mut events = orch.take_events().unwrap();
        {
            let mut core = orch.inner.core();
            core.state = UploadState::Uploading;
            core.queue = validated(2).files().snapshot();
            core.cursor = 2;
        }

        assert!(matches!(
            orch.pause(),
            Err(UploadError::InvalidTransition { action: "pause", .. })
        ));
        assert_eq!(orch.state(), UploadState::Uploading);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn completion_survives_a_consumer_that_never_reads() {
        let mut orch = orchestrator();
        let mut events = orch.take_events().unwrap();
        orch.start(&validated(300)).unwrap();
        orch.join().await;
        assert_eq!(orch.state(), UploadState::Completed);

        let mut received = 0;
        let mut summary = None;
        let mut reloaded = false;
        while let Ok(event) = events.try_recv() {
            received += 1;
            match event {
                UploadEvent::Completed(s) => summary = Some(s),
                UploadEvent::FormsReloaded(_) => reloaded = true,
                _ => {}
            }
        }
        // started + 100 chunks x (chunk started + 3 files + progress) + completed + reloaded
        assert_eq!(received, 1 + 100 * 5 + 2);
        let summary = summary.expect("completed event");
        assert_eq!((summary.total, summary.succeeded, summary.failed), (300, 300, 0));
        assert!(reloaded);
    }

    #[tokio::test]
    async fn take_events_once() {
        let mut orch = orchestrator();
        assert!(orch.take_events().is_some());
        assert!(orch.take_events().is_none());
    }
}
