use tracing::warn;

use super::{types::Config, ConfigError};
use crate::mime;

/// Validate configuration
/// Currently validates:
/// - Engine timeout is not 0
/// - Progress channel capacity is not 0
/// - Catalog (if given) has no empty or duplicated format lists
///
/// Formats without a known MIME type are accepted with a warning; their
/// results are labelled `application/octet-stream`.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.engine.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "engine.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.engine.progress_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "engine.progress_capacity cannot be 0".to_string(),
        ));
    }

    let catalog = config
        .build_catalog()
        .map_err(|e| ConfigError::ValidationError(format!("catalog: {}", e)))?;

    for entry in catalog.list_categories() {
        for format in &entry.formats {
            if !mime::is_known(format) {
                warn!(
                    category = %entry.category,
                    format = %format,
                    "Format has no known MIME type"
                );
            }
        }
    }

    Ok(())
}
