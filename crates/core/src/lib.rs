pub mod catalog;
pub mod config;
pub mod converter;
pub mod dispatcher;
pub mod metrics;
pub mod mime;
pub mod testing;
pub mod text;

pub use catalog::{AcceptMatcher, CatalogEntry, CatalogError, ConversionCategory, FormatCatalog};
pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config, ConfigError,
};
pub use converter::{ConverterError, EngineConfig, EngineLoadState, FfmpegEngine, MediaEngine};
pub use dispatcher::{
    ConversionDispatcher, ConversionResult, ConversionSession, DiskFile, DispatchError,
    DispatchSnapshot, DispatchState, MemoryFile, SourceFile,
};
