//! Trait definitions for the converter module.

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::error::ConverterError;

/// An embedded media engine.
///
/// The engine is a black box with a private file namespace: callers write
/// named input buffers, execute an ffmpeg-style argument list against them,
/// and read named output buffers back. Progress is published as a ratio in
/// `[0, 1]` to every subscriber while `exec` runs.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Returns the name of this engine implementation.
    fn name(&self) -> &str;

    /// Initializes the engine. Called at most once per successful load.
    async fn load(&self) -> Result<(), ConverterError>;

    /// Stores `data` under `name` in the engine's namespace.
    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), ConverterError>;

    /// Runs the engine with the given argument list.
    async fn exec(&self, args: &[String]) -> Result<(), ConverterError>;

    /// Reads the buffer stored under `name`.
    async fn read_file(&self, name: &str) -> Result<Vec<u8>, ConverterError>;

    /// Removes the buffer stored under `name`. Missing buffers are not an error.
    async fn delete_file(&self, name: &str) -> Result<(), ConverterError>;

    /// Subscribes to progress ratios emitted during `exec`.
    ///
    /// Dropping the receiver detaches from updates; execution is unaffected.
    fn subscribe(&self) -> broadcast::Receiver<f64>;

    /// Releases the engine's resources. A later `load` starts afresh.
    async fn terminate(&self);
}
