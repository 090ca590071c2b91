//! Conversion session.

use std::sync::Arc;
use tracing::info;

use crate::catalog::{CatalogEntry, ConversionCategory, FormatCatalog};
use crate::converter::{MediaEngine, MediaTranscoder};

use super::error::DispatchError;
use super::runner::ConversionDispatcher;

/// One user session: a catalog plus the media adapter shared by every
/// dispatcher created from it.
///
/// The media engine is loaded at most once per session, no matter how many
/// dispatchers ask for it.
pub struct ConversionSession<E: MediaEngine + 'static> {
    catalog: FormatCatalog,
    media: Arc<MediaTranscoder<E>>,
}

impl<E: MediaEngine + 'static> ConversionSession<E> {
    pub fn new(catalog: FormatCatalog, engine: E) -> Self {
        Self {
            catalog,
            media: Arc::new(MediaTranscoder::new(engine)),
        }
    }

    pub fn catalog(&self) -> &FormatCatalog {
        &self.catalog
    }

    pub fn media(&self) -> &Arc<MediaTranscoder<E>> {
        &self.media
    }

    /// Creates a dispatcher for a category listed in the catalog.
    pub fn dispatcher(
        &self,
        category: ConversionCategory,
    ) -> Result<ConversionDispatcher<E>, DispatchError> {
        let entry = self
            .catalog
            .find(category)
            .cloned()
            .ok_or(DispatchError::UnknownCategory { category })?;
        Ok(self.dispatcher_for(entry))
    }

    /// Creates a dispatcher for an entry that need not be in the catalog.
    pub fn dispatcher_for(&self, entry: CatalogEntry) -> ConversionDispatcher<E> {
        ConversionDispatcher::new(entry, Arc::clone(&self.media))
    }

    /// Releases the media engine.
    pub async fn shutdown(&self) {
        info!("Shutting down conversion session");
        self.media.terminate().await;
    }
}
