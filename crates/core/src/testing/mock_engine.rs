//! Mock media engine for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};

use crate::converter::{ConverterError, EngineLoadState, MediaEngine};

/// Mock implementation of the MediaEngine trait.
///
/// Provides controllable behavior for testing:
/// - Count loads and simulate slow or failing loads
/// - Record executed argument lists
/// - Simulate exec failures and progress ratios
/// - Inspect the in-memory buffer namespace
///
/// Clones share state, so a test can keep a handle after moving the engine
/// into a session.
///
/// # Example
///
/// ```rust,ignore
/// use uniconv_core::testing::MockEngine;
///
/// let engine = MockEngine::new();
/// engine.set_progress_steps(vec![0.25, 0.5, 1.0]).await;
/// engine.set_output(b"fake mp3".to_vec()).await;
///
/// let session = ConversionSession::new(FormatCatalog::builtin(), engine.clone());
/// // ...
/// assert_eq!(engine.load_count().await, 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockEngine {
    /// Number of times `load` ran to completion.
    load_count: Arc<RwLock<usize>>,
    /// Simulated load duration.
    load_delay: Arc<RwLock<Duration>>,
    /// If set, the next load fails with this reason.
    next_load_error: Arc<RwLock<Option<String>>>,
    /// If set, the next exec fails with this error.
    next_exec_error: Arc<RwLock<Option<ConverterError>>>,
    /// Pause after each progress step.
    step_delay: Arc<RwLock<Duration>>,
    /// Ratios published during exec.
    progress_steps: Arc<RwLock<Vec<f64>>>,
    /// Bytes written to the output buffer by exec.
    output: Arc<RwLock<Vec<u8>>>,
    /// Recorded exec argument lists.
    executions: Arc<RwLock<Vec<Vec<String>>>>,
    /// Engine file namespace.
    buffers: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    loaded: Arc<RwLock<bool>>,
    terminate_count: Arc<RwLock<usize>>,
    progress_tx: broadcast::Sender<f64>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Create a new mock engine.
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(64);
        Self {
            load_count: Arc::new(RwLock::new(0)),
            load_delay: Arc::new(RwLock::new(Duration::ZERO)),
            next_load_error: Arc::new(RwLock::new(None)),
            next_exec_error: Arc::new(RwLock::new(None)),
            step_delay: Arc::new(RwLock::new(Duration::from_millis(5))),
            progress_steps: Arc::new(RwLock::new(Vec::new())),
            output: Arc::new(RwLock::new(b"mock output".to_vec())),
            executions: Arc::new(RwLock::new(Vec::new())),
            buffers: Arc::new(RwLock::new(HashMap::new())),
            loaded: Arc::new(RwLock::new(false)),
            terminate_count: Arc::new(RwLock::new(0)),
            progress_tx,
        }
    }

    /// Number of completed loads, successful or not.
    pub async fn load_count(&self) -> usize {
        *self.load_count.read().await
    }

    /// Number of `terminate` calls.
    pub async fn terminate_count(&self) -> usize {
        *self.terminate_count.read().await
    }

    /// Set the simulated load duration.
    pub async fn set_load_delay(&self, delay: Duration) {
        *self.load_delay.write().await = delay;
    }

    /// Configure the next load to fail.
    pub async fn fail_next_load(&self, reason: impl Into<String>) {
        *self.next_load_error.write().await = Some(reason.into());
    }

    /// Configure the next exec to fail with the given error.
    pub async fn set_next_exec_error(&self, error: ConverterError) {
        *self.next_exec_error.write().await = Some(error);
    }

    /// Ratios to publish during each exec.
    pub async fn set_progress_steps(&self, steps: Vec<f64>) {
        *self.progress_steps.write().await = steps;
    }

    /// Pause after each progress step.
    pub async fn set_step_delay(&self, delay: Duration) {
        *self.step_delay.write().await = delay;
    }

    /// Bytes each exec writes to its output buffer.
    pub async fn set_output(&self, data: Vec<u8>) {
        *self.output.write().await = data;
    }

    /// Argument lists of every exec so far.
    pub async fn executions(&self) -> Vec<Vec<String>> {
        self.executions.read().await.clone()
    }

    /// Names of the buffers currently stored, sorted.
    pub async fn buffer_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.buffers.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    async fn ensure_loaded(&self) -> Result<(), ConverterError> {
        if *self.loaded.read().await {
            Ok(())
        } else {
            Err(ConverterError::EngineNotReady {
                state: EngineLoadState::NotRequested,
            })
        }
    }
}

#[async_trait]
impl MediaEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn load(&self) -> Result<(), ConverterError> {
        let delay = *self.load_delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        *self.load_count.write().await += 1;

        if let Some(reason) = self.next_load_error.write().await.take() {
            return Err(ConverterError::load_failed(reason));
        }

        *self.loaded.write().await = true;
        Ok(())
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), ConverterError> {
        self.ensure_loaded().await?;
        self.buffers
            .write()
            .await
            .insert(name.to_string(), data.to_vec());
        Ok(())
    }

    async fn exec(&self, args: &[String]) -> Result<(), ConverterError> {
        self.ensure_loaded().await?;
        self.executions.write().await.push(args.to_vec());

        let steps = self.progress_steps.read().await.clone();
        let step_delay = *self.step_delay.read().await;
        for ratio in steps {
            let _ = self.progress_tx.send(ratio);
            tokio::time::sleep(step_delay).await;
        }

        if let Some(err) = self.next_exec_error.write().await.take() {
            return Err(err);
        }

        if let Some(output) = args.last() {
            let data = self.output.read().await.clone();
            self.buffers.write().await.insert(output.clone(), data);
        }
        Ok(())
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, ConverterError> {
        self.buffers
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| ConverterError::BufferNotFound {
                name: name.to_string(),
            })
    }

    async fn delete_file(&self, name: &str) -> Result<(), ConverterError> {
        self.buffers.write().await.remove(name);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<f64> {
        self.progress_tx.subscribe()
    }

    async fn terminate(&self) {
        *self.loaded.write().await = false;
        *self.terminate_count.write().await += 1;
        self.buffers.write().await.clear();
    }
}
