//! Conversion dispatcher implementation.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::catalog::{CatalogEntry, ConversionCategory};
use crate::converter::{EngineLoadState, MediaEngine, MediaTranscoder, TranscodeJob};
use crate::metrics;
use crate::text::{model3d, subtitle};

use super::error::DispatchError;
use super::source::SourceFile;
use super::types::{ConversionResult, DispatchSnapshot, DispatchState};

/// Progress reported when a text conversion has read its input.
const TEXT_READ_PERCENT: u8 = 30;
/// Progress reported when a text conversion has produced its output.
const TEXT_WRITTEN_PERCENT: u8 = 80;
/// Progress reported when a passthrough copy has read its input.
const PASSTHROUGH_PERCENT: u8 = 50;
/// Buffer between the media adapter and the progress watch channel.
const MEDIA_PROGRESS_BUFFER: usize = 32;
/// Error recorded when a running conversion is dropped by its caller.
const CANCELLED_MESSAGE: &str = "Conversion was cancelled before it finished";

struct DispatchInner {
    state: DispatchState,
    file: Option<Arc<dyn SourceFile>>,
    target: Option<String>,
    result: Option<ConversionResult>,
    error: Option<String>,
}

impl DispatchInner {
    fn mark_cancelled(&mut self) {
        if self.state == DispatchState::Converting {
            self.error = Some(CANCELLED_MESSAGE.to_string());
            self.state = DispatchState::Error;
        }
    }
}

/// Moves a dispatcher out of `Converting` if `convert` is dropped before it
/// records an outcome.
struct ConvertingGuard {
    inner: Arc<Mutex<DispatchInner>>,
    category: ConversionCategory,
    armed: bool,
}

impl ConvertingGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ConvertingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        warn!(category = %self.category, "Conversion dropped while running");
        metrics::CONVERSIONS_TOTAL
            .with_label_values(&[self.category.as_str(), "cancelled"])
            .inc();

        if let Ok(mut inner) = self.inner.try_lock() {
            inner.mark_cancelled();
            return;
        }
        let inner = Arc::clone(&self.inner);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    inner.lock().await.mark_cancelled();
                });
            }
            Err(_) => warn!("No runtime to reset the dispatcher state"),
        }
    }
}

/// Drives one category's conversions: file and format selection, routing to
/// the right engine, progress and the final result.
///
/// At most one conversion runs at a time; calls that arrive while one is
/// running are rejected with [`DispatchError::Busy`].
pub struct ConversionDispatcher<E: MediaEngine + 'static> {
    entry: CatalogEntry,
    media: Arc<MediaTranscoder<E>>,
    inner: Arc<Mutex<DispatchInner>>,
    progress_tx: watch::Sender<u8>,
}

impl<E: MediaEngine + 'static> ConversionDispatcher<E> {
    /// Creates a dispatcher for `entry`, sharing the session's media adapter.
    pub fn new(entry: CatalogEntry, media: Arc<MediaTranscoder<E>>) -> Self {
        let (progress_tx, _) = watch::channel(0);
        Self {
            entry,
            media,
            inner: Arc::new(Mutex::new(DispatchInner {
                state: DispatchState::Idle,
                file: None,
                target: None,
                result: None,
                error: None,
            })),
            progress_tx,
        }
    }

    pub fn category(&self) -> ConversionCategory {
        self.entry.category
    }

    pub fn entry(&self) -> &CatalogEntry {
        &self.entry
    }

    pub async fn state(&self) -> DispatchState {
        self.inner.lock().await.state
    }

    /// Loads the media engine for media categories. No-op otherwise.
    pub async fn prepare(&self) -> Result<(), DispatchError> {
        if self.entry.category.is_media() {
            self.media.load().await?;
        }
        Ok(())
    }

    /// Selects a new source file, discarding the format, result and error.
    pub async fn select_file(&self, file: impl SourceFile + 'static) -> Result<(), DispatchError> {
        let mut inner = self.inner.lock().await;
        if inner.state == DispatchState::Converting {
            return Err(DispatchError::Busy);
        }

        info!(
            category = %self.entry.category,
            file = file.name(),
            size = file.size(),
            "File selected"
        );
        inner.file = Some(Arc::new(file));
        inner.target = None;
        inner.result = None;
        inner.error = None;
        inner.state = DispatchState::FileSelected;
        Ok(())
    }

    /// Clears the selected file and everything derived from it.
    pub async fn clear_file(&self) -> Result<(), DispatchError> {
        let mut inner = self.inner.lock().await;
        if inner.state == DispatchState::Converting {
            return Err(DispatchError::Busy);
        }

        inner.file = None;
        inner.target = None;
        inner.result = None;
        inner.error = None;
        inner.state = DispatchState::Idle;
        Ok(())
    }

    /// Formats that may be chosen for the current file.
    ///
    /// Without a file every catalog format is offered; with one, its own
    /// format is left out.
    pub async fn available_targets(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        self.targets_for(inner.file.as_deref())
    }

    /// Selects the target format; moves to `Ready` and discards any result.
    pub async fn select_format(&self, format: &str) -> Result<(), DispatchError> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            DispatchState::Converting => return Err(DispatchError::Busy),
            DispatchState::Idle => {
                return Err(DispatchError::InvalidState {
                    expected: DispatchState::FileSelected,
                    actual: DispatchState::Idle,
                })
            }
            _ => {}
        }

        let format = format.trim().to_ascii_lowercase();
        if !self.entry.offers(&format) {
            return Err(DispatchError::UnsupportedFormat {
                format,
                category: self.entry.category,
            });
        }
        if let Some(file) = &inner.file {
            if file.extension() == format {
                return Err(DispatchError::SameFormat { format });
            }
        }

        inner.target = Some(format);
        inner.result = None;
        inner.error = None;
        inner.state = DispatchState::Ready;
        Ok(())
    }

    /// Runs the conversion for the selected file and format.
    ///
    /// Refusals (wrong state, busy, engine not ready) leave the state as it
    /// was. Failures inside a conversion move to `Error`, keeping the file
    /// and format so that re-selecting the format allows a retry. Dropping
    /// the returned future mid-conversion also ends in `Error`.
    pub async fn convert(&self) -> Result<(), DispatchError> {
        let (file, target) = {
            let mut inner = self.inner.lock().await;
            match inner.state {
                DispatchState::Ready => {}
                DispatchState::Converting => return Err(DispatchError::Busy),
                actual => {
                    return Err(DispatchError::InvalidState {
                        expected: DispatchState::Ready,
                        actual,
                    })
                }
            }

            let (Some(file), Some(target)) = (inner.file.clone(), inner.target.clone()) else {
                return Err(DispatchError::InvalidState {
                    expected: DispatchState::Ready,
                    actual: inner.state,
                });
            };

            if self.entry.category.is_media() {
                let state = self.media.load_state().await;
                if state != EngineLoadState::Ready {
                    return Err(DispatchError::EngineNotReady { state });
                }
            }

            inner.state = DispatchState::Converting;
            inner.result = None;
            inner.error = None;
            (file, target)
        };
        let mut guard = ConvertingGuard {
            inner: Arc::clone(&self.inner),
            category: self.entry.category,
            armed: true,
        };

        self.progress_tx.send_replace(0);

        let conversion_id = Uuid::new_v4().to_string();
        let category = self.entry.category;
        let span = info_span!(
            "conversion",
            id = %conversion_id,
            category = %category,
            target = %target
        );
        let start = Instant::now();
        let outcome = self
            .run(file.as_ref(), &target, &conversion_id)
            .instrument(span)
            .await;

        metrics::CONVERSION_DURATION
            .with_label_values(&[category.as_str()])
            .observe(start.elapsed().as_secs_f64());

        let mut inner = self.inner.lock().await;
        guard.disarm();
        match outcome {
            Ok(result) => {
                info!(
                    id = %conversion_id,
                    file = %result.file_name,
                    bytes = result.data.len(),
                    duration_ms = result.duration_ms,
                    "Conversion finished"
                );
                metrics::CONVERSIONS_TOTAL
                    .with_label_values(&[category.as_str(), "success"])
                    .inc();
                self.report(100);
                inner.result = Some(result);
                inner.state = DispatchState::Done;
                Ok(())
            }
            Err(e) => {
                warn!(id = %conversion_id, "Conversion failed: {}", e);
                metrics::CONVERSIONS_TOTAL
                    .with_label_values(&[category.as_str(), "failed"])
                    .inc();
                inner.error = Some(e.to_string());
                inner.state = DispatchState::Error;
                Err(e)
            }
        }
    }

    /// A copy of the finished result, if any.
    pub async fn result(&self) -> Option<ConversionResult> {
        self.inner.lock().await.result.clone()
    }

    /// Hands the finished result to the caller.
    pub async fn take_result(&self) -> Option<ConversionResult> {
        self.inner.lock().await.result.take()
    }

    /// Message of the last failed conversion.
    pub async fn error_message(&self) -> Option<String> {
        self.inner.lock().await.error.clone()
    }

    /// Subscribes to progress percentages.
    ///
    /// Values are non-decreasing within a conversion and reset to 0 when a
    /// new one starts. Drop the receiver to stop listening.
    pub fn subscribe_progress(&self) -> watch::Receiver<u8> {
        self.progress_tx.subscribe()
    }

    /// Last reported progress.
    pub fn progress(&self) -> u8 {
        *self.progress_tx.borrow()
    }

    /// Current state, for display.
    pub async fn snapshot(&self) -> DispatchSnapshot {
        let engine = if self.entry.category.is_media() {
            Some(self.media.load_state().await)
        } else {
            None
        };

        let inner = self.inner.lock().await;
        DispatchSnapshot {
            category: self.entry.category,
            state: inner.state,
            file_name: inner.file.as_ref().map(|f| f.name().to_string()),
            file_size: inner.file.as_ref().map(|f| f.size()),
            target_format: inner.target.clone(),
            available_targets: self.targets_for(inner.file.as_deref()),
            progress: self.progress(),
            engine,
            error: inner.error.clone(),
            result_file_name: inner.result.as_ref().map(|r| r.file_name.clone()),
            result_size: inner.result.as_ref().map(|r| r.data.len() as u64),
        }
    }

    fn targets_for(&self, file: Option<&dyn SourceFile>) -> Vec<String> {
        let source_ext = file.map(|f| f.extension()).unwrap_or_default();
        self.entry
            .formats
            .iter()
            .filter(|f| !f.eq_ignore_ascii_case(&source_ext))
            .cloned()
            .collect()
    }

    fn report(&self, percent: u8) {
        let percent = percent.min(100);
        self.progress_tx.send_if_modified(|current| {
            if percent > *current {
                *current = percent;
                true
            } else {
                false
            }
        });
    }

    async fn run(
        &self,
        file: &dyn SourceFile,
        target: &str,
        conversion_id: &str,
    ) -> Result<ConversionResult, DispatchError> {
        let start = Instant::now();
        let source_ext = file.extension();
        let data = file.read_bytes().await.map_err(DispatchError::SourceRead)?;

        let output = match self.entry.category {
            ConversionCategory::Image | ConversionCategory::Audio | ConversionCategory::Video => {
                self.run_media(file.name(), data, target, conversion_id)
                    .await?
            }
            ConversionCategory::Subtitle => {
                self.report(TEXT_READ_PERCENT);
                let text = String::from_utf8_lossy(&data);
                let converted = subtitle::convert(&text, &source_ext, target);
                self.report(TEXT_WRITTEN_PERCENT);
                converted.into_bytes()
            }
            ConversionCategory::Model3D => {
                self.report(TEXT_READ_PERCENT);
                let text = String::from_utf8_lossy(&data);
                let converted = model3d::convert(&text, &source_ext, target);
                self.report(TEXT_WRITTEN_PERCENT);
                converted.into_bytes()
            }
            ConversionCategory::Generic => {
                self.report(PASSTHROUGH_PERCENT);
                data
            }
        };

        Ok(ConversionResult::new(output, target, start.elapsed()))
    }

    async fn run_media(
        &self,
        source_name: &str,
        input: Vec<u8>,
        target: &str,
        conversion_id: &str,
    ) -> Result<Vec<u8>, DispatchError> {
        let job = TranscodeJob {
            job_id: conversion_id.to_string(),
            source_name: source_name.to_string(),
            input,
            category: self.entry.category,
            target_format: target.to_string(),
        };

        let (tx, mut rx) = mpsc::channel(MEDIA_PROGRESS_BUFFER);
        let transcode = self.media.transcode_with_progress(job, tx);
        tokio::pin!(transcode);

        let output = loop {
            tokio::select! {
                result = &mut transcode => break result?,
                Some(progress) = rx.recv() => self.report(progress.percent),
            }
        };

        while let Ok(progress) = rx.try_recv() {
            self.report(progress.percent);
        }

        Ok(output.data)
    }
}
