//! Media transcode adapter.
//!
//! Owns one [`MediaEngine`] for the lifetime of a session, tracks its load
//! state and runs transcodes against it one at a time.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::metrics;

use super::error::ConverterError;
use super::traits::MediaEngine;
use super::types::{
    build_args, input_name, output_name, ConversionProgress, EngineLoadState, TranscodeJob,
    TranscodeOutput,
};

type LoadFuture = Shared<BoxFuture<'static, Result<(), String>>>;

enum LoadSlot {
    NotRequested,
    /// In-flight load, tagged with the attempt number that started it.
    Loading(u64, LoadFuture),
    Ready,
    Failed(String),
}

impl LoadSlot {
    fn state(&self) -> EngineLoadState {
        match self {
            Self::NotRequested => EngineLoadState::NotRequested,
            Self::Loading(..) => EngineLoadState::Loading,
            Self::Ready => EngineLoadState::Ready,
            Self::Failed(_) => EngineLoadState::Failed,
        }
    }
}

struct LoadTracker {
    slot: LoadSlot,
    attempts: u64,
}

/// Adapter between the dispatcher and an embedded media engine.
pub struct MediaTranscoder<E: MediaEngine + 'static> {
    engine: Arc<E>,
    load: Mutex<LoadTracker>,
    /// Held for the whole of a transcode, including buffer cleanup; the
    /// engine's namespace is shared.
    exec_lock: Arc<Mutex<()>>,
}

impl<E: MediaEngine + 'static> MediaTranscoder<E> {
    /// Creates an adapter around an engine that has not been loaded yet.
    pub fn new(engine: E) -> Self {
        Self::from_arc(Arc::new(engine))
    }

    /// Creates an adapter around a shared engine handle.
    pub fn from_arc(engine: Arc<E>) -> Self {
        Self {
            engine,
            load: Mutex::new(LoadTracker {
                slot: LoadSlot::NotRequested,
                attempts: 0,
            }),
            exec_lock: Arc::new(Mutex::new(())),
        }
    }

    /// The wrapped engine.
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// Current load state.
    pub async fn load_state(&self) -> EngineLoadState {
        self.load.lock().await.slot.state()
    }

    /// Reason of the last failed load, if the engine is in `Failed`.
    pub async fn load_error(&self) -> Option<String> {
        match &self.load.lock().await.slot {
            LoadSlot::Failed(reason) => Some(reason.clone()),
            _ => None,
        }
    }

    /// Loads the engine.
    ///
    /// Returns immediately once the engine is ready. Callers arriving while a
    /// load is in flight wait for that same load. A failed load is reported
    /// once; calling `load` again starts a new attempt.
    pub async fn load(&self) -> Result<(), ConverterError> {
        let (attempt, pending) = {
            let mut tracker = self.load.lock().await;
            match &tracker.slot {
                LoadSlot::Ready => return Ok(()),
                LoadSlot::Loading(attempt, pending) => (*attempt, pending.clone()),
                LoadSlot::NotRequested | LoadSlot::Failed(_) => {
                    tracker.attempts += 1;
                    let attempt = tracker.attempts;
                    info!(engine = self.engine.name(), attempt, "Loading media engine");

                    let engine = Arc::clone(&self.engine);
                    let pending: LoadFuture =
                        async move { engine.load().await.map_err(|e| e.to_string()) }
                            .boxed()
                            .shared();
                    tracker.slot = LoadSlot::Loading(attempt, pending.clone());
                    (attempt, pending)
                }
            }
        };

        let outcome = pending.await;

        let mut tracker = self.load.lock().await;
        if matches!(tracker.slot, LoadSlot::Loading(current, _) if current == attempt) {
            match &outcome {
                Ok(()) => {
                    info!(engine = self.engine.name(), "Media engine ready");
                    metrics::ENGINE_LOADS.with_label_values(&["success"]).inc();
                    tracker.slot = LoadSlot::Ready;
                }
                Err(reason) => {
                    warn!(engine = self.engine.name(), "Media engine failed to load: {}", reason);
                    metrics::ENGINE_LOADS.with_label_values(&["failed"]).inc();
                    tracker.slot = LoadSlot::Failed(reason.clone());
                }
            }
        }

        outcome.map_err(ConverterError::load_failed)
    }

    /// Transcodes without progress reporting.
    pub async fn transcode(&self, job: TranscodeJob) -> Result<TranscodeOutput, ConverterError> {
        self.run_transcode(job, None).await
    }

    /// Transcodes, sending percentage updates to `progress_tx`.
    ///
    /// Updates are non-decreasing. If the receiver is dropped the transcode
    /// continues without progress reporting.
    pub async fn transcode_with_progress(
        &self,
        job: TranscodeJob,
        progress_tx: mpsc::Sender<ConversionProgress>,
    ) -> Result<TranscodeOutput, ConverterError> {
        self.run_transcode(job, Some(progress_tx)).await
    }

    /// Releases the engine and returns to `NotRequested`.
    pub async fn terminate(&self) {
        let _exec = self.exec_lock.lock().await;
        let mut tracker = self.load.lock().await;
        self.engine.terminate().await;
        tracker.slot = LoadSlot::NotRequested;
    }

    async fn run_transcode(
        &self,
        job: TranscodeJob,
        progress_tx: Option<mpsc::Sender<ConversionProgress>>,
    ) -> Result<TranscodeOutput, ConverterError> {
        let state = self.load_state().await;
        if state != EngineLoadState::Ready {
            return Err(ConverterError::EngineNotReady { state });
        }

        let output = output_name(&job.target_format);
        let input = input_name(&job.source_name, &job.target_format);
        let args = build_args(job.category, &input, &output)?;

        let exec = Arc::clone(&self.exec_lock).lock_owned().await;
        let buffers = BufferGuard::new(
            Arc::clone(&self.engine),
            vec![input.clone(), output.clone()],
            exec,
        );
        let start = Instant::now();
        debug!(job_id = %job.job_id, input = %input, output = %output, "Starting transcode");

        let result = self
            .execute(&input, &output, &job.input, &args, progress_tx)
            .await;
        buffers.release().await;

        let data = result?;
        Ok(TranscodeOutput {
            job_id: job.job_id,
            data,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn execute(
        &self,
        input: &str,
        output: &str,
        data: &[u8],
        args: &[String],
        progress_tx: Option<mpsc::Sender<ConversionProgress>>,
    ) -> Result<Vec<u8>, ConverterError> {
        self.engine.write_file(input, data).await?;

        let mut events = self.engine.subscribe();
        let exec = self.engine.exec(args);
        tokio::pin!(exec);

        let mut last_percent = 0u8;
        let exec_result = loop {
            tokio::select! {
                result = &mut exec => break result,
                event = events.recv() => match event {
                    Ok(ratio) => {
                        let progress = ConversionProgress::from_ratio(ratio);
                        if progress.percent > last_percent {
                            last_percent = progress.percent;
                            if let Some(ref tx) = progress_tx {
                                // Non-blocking send
                                let _ = tx.try_send(progress);
                            }
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Progress receiver lagged");
                    }
                    Err(RecvError::Closed) => break (&mut exec).await,
                },
            }
        };
        exec_result?;

        self.engine.read_file(output).await
    }
}

/// Owns the exec lock and the buffer names of one transcode.
///
/// [`release`](Self::release) deletes the buffers and unlocks. If the
/// transcode future is dropped first, the same cleanup runs on a spawned
/// task that keeps the lock until it is done.
struct BufferGuard<E: MediaEngine + 'static> {
    engine: Arc<E>,
    names: Vec<String>,
    exec: Option<OwnedMutexGuard<()>>,
}

impl<E: MediaEngine + 'static> BufferGuard<E> {
    fn new(engine: Arc<E>, names: Vec<String>, exec: OwnedMutexGuard<()>) -> Self {
        Self {
            engine,
            names,
            exec: Some(exec),
        }
    }

    async fn release(mut self) {
        delete_buffers(self.engine.as_ref(), &self.names).await;
        self.exec.take();
    }
}

impl<E: MediaEngine + 'static> Drop for BufferGuard<E> {
    fn drop(&mut self) {
        let Some(exec) = self.exec.take() else {
            return;
        };

        warn!("Transcode abandoned, releasing engine buffers");
        let engine = Arc::clone(&self.engine);
        let names = std::mem::take(&mut self.names);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    delete_buffers(engine.as_ref(), &names).await;
                    drop(exec);
                });
            }
            Err(_) => warn!(buffers = ?names, "No runtime to release engine buffers"),
        }
    }
}

async fn delete_buffers<E: MediaEngine>(engine: &E, names: &[String]) {
    for name in names {
        if let Err(e) = engine.delete_file(name).await {
            warn!(buffer = %name, "Failed to remove engine buffer: {}", e);
        }
    }
}
